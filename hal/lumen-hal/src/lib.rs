//! Lumen Hardware Abstraction Layer
//!
//! This crate defines the seams between the board-agnostic controller logic
//! and the hardware it drives. Everything the core talks to sits behind one
//! of these traits, so the whole controller can be exercised on the host
//! against mocks.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  lumen-core (coordinator, dispatcher)   │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  lumen-hal (this crate - traits)        │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ lumen-drivers │       │ lumen-hal-    │
//! │ (modem, bus)  │       │    rp2040     │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`radio::LoraLink`] - LoRaWAN stack (join, uplink, continuous receive)
//! - [`dmx::DmxBus`] - DMX512 line driver (break, slot data)
//! - [`storage::SettingsStore`] - Persistent key-value storage

#![no_std]
#![deny(unsafe_code)]

pub mod dmx;
pub mod radio;
pub mod storage;

// Re-export key traits at crate root for convenience
pub use dmx::{BusConfig, DmxBus};
pub use radio::{Bandwidth, CodingRate, FrameInfo, LinkError, LinkEvent, LoraLink, RxParams};
pub use storage::{SettingsStore, StorageKey, StoreError};
