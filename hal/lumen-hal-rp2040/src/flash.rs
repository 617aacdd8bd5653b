//! Flash settings store for RP2040
//!
//! Wear-levelled key-value storage via sequential-storage in the last
//! 64KB of flash.

use embassy_rp::dma::Channel;
use embassy_rp::flash::{Async, Flash, ERASE_SIZE};
use embassy_rp::peripherals::FLASH;
use embassy_rp::Peri;
use sequential_storage::cache::NoCache;
use sequential_storage::map;

use lumen_hal::{SettingsStore, StorageKey, StoreError};

/// Flash layout
pub const FLASH_SIZE: usize = 2 * 1024 * 1024; // 2MB on the Pico
pub const SETTINGS_PARTITION_SIZE: usize = 64 * 1024;
pub const SETTINGS_PARTITION_START: usize = FLASH_SIZE - SETTINGS_PARTITION_SIZE;

/// Flash erase size for RP2040
pub const FLASH_ERASE_SIZE: usize = ERASE_SIZE;

/// Flash range of the settings partition
pub const SETTINGS_RANGE: core::ops::Range<u32> =
    (SETTINGS_PARTITION_START as u32)..(FLASH_SIZE as u32);

/// Scratch space for one stored item
const ITEM_BUFFER_SIZE: usize = 128;

/// RP2040 flash settings store
pub struct Rp2040FlashStore<'d> {
    flash: Flash<'d, FLASH, Async, FLASH_SIZE>,
}

impl<'d> Rp2040FlashStore<'d> {
    pub fn new(flash: Peri<'d, FLASH>, dma: Peri<'d, impl Channel>) -> Self {
        Self {
            flash: Flash::new(flash, dma),
        }
    }
}

impl<'d> SettingsStore for Rp2040FlashStore<'d> {
    async fn save(&mut self, key: StorageKey, data: &[u8]) -> Result<(), StoreError> {
        let mut item_buffer = [0u8; ITEM_BUFFER_SIZE];

        map::store_item(
            &mut self.flash,
            SETTINGS_RANGE,
            &mut NoCache::new(),
            &mut item_buffer,
            &key,
            &data,
        )
        .await
        .map_err(|e| match e {
            sequential_storage::Error::FullStorage => StoreError::Full,
            sequential_storage::Error::Corrupted { .. } => StoreError::Corrupted,
            _ => StoreError::Flash,
        })
    }

    async fn load(&mut self, key: StorageKey, buf: &mut [u8]) -> Result<Option<usize>, StoreError> {
        let mut item_buffer = [0u8; ITEM_BUFFER_SIZE];

        let result = map::fetch_item::<StorageKey, &[u8], _>(
            &mut self.flash,
            SETTINGS_RANGE,
            &mut NoCache::new(),
            &mut item_buffer,
            &key,
        )
        .await;

        match result {
            Ok(Some(data)) => {
                let len = data.len();
                if buf.len() < len {
                    return Err(StoreError::BufferTooSmall);
                }
                buf[..len].copy_from_slice(data);
                Ok(Some(len))
            }
            Ok(None) => Ok(None),
            Err(sequential_storage::Error::Corrupted { .. }) => Err(StoreError::Corrupted),
            Err(_) => Err(StoreError::Flash),
        }
    }
}
