//! Scripted hardware doubles for unit tests

use std::collections::VecDeque;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use lumen_hal::{
    Bandwidth, DmxBus, FrameInfo, LinkError, LinkEvent, LoraLink, RxParams, SettingsStore,
    StorageKey, StoreError,
};

/// One call made on [`MockLink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Join,
    Arm(Bandwidth),
    Send {
        port: u8,
        payload: Vec<u8>,
        confirmed: bool,
    },
    Read,
}

/// LoRaWAN link that answers from scripted queues and records every call
///
/// Joins and uplinks complete as soon as they are polled unless
/// `hold_completions` is set, which models a slow network.
pub struct MockLink {
    /// Whether each join request is accepted, `Ok` once exhausted
    pub join_results: VecDeque<Result<(), LinkError>>,
    /// Network answers to accepted joins, `Ok` once exhausted
    pub join_outcomes: VecDeque<Result<(), LinkError>>,
    pub joined: bool,
    pub address: u32,
    /// Bandwidths the radio refuses
    pub rejected: Vec<Bandwidth>,
    /// Fail every arm with this error
    pub arm_error: Option<LinkError>,
    /// Pending frames as (port, payload)
    pub frames: VecDeque<Result<(u8, Vec<u8>), LinkError>>,
    /// Whether each uplink is accepted, `Ok` once exhausted
    pub send_results: VecDeque<Result<(), LinkError>>,
    /// Delivery of accepted uplinks, `Ok` once exhausted
    pub delivery_results: VecDeque<Result<(), LinkError>>,
    /// Outcomes waiting to be polled
    pub completions: VecDeque<LinkEvent>,
    pub hold_completions: bool,
    pub calls: Vec<Call>,
}

impl MockLink {
    pub fn joinable(address: u32) -> Self {
        Self {
            join_results: VecDeque::new(),
            join_outcomes: VecDeque::new(),
            joined: true,
            address,
            rejected: Vec::new(),
            arm_error: None,
            frames: VecDeque::new(),
            send_results: VecDeque::new(),
            delivery_results: VecDeque::new(),
            completions: VecDeque::new(),
            hold_completions: false,
            calls: Vec::new(),
        }
    }

    pub fn arms(&self) -> Vec<Bandwidth> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Arm(bw) => Some(*bw),
                _ => None,
            })
            .collect()
    }

    /// Uplinks as (port, payload text)
    pub fn sent(&self) -> Vec<(u8, String)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Send { port, payload, .. } => {
                    Some((*port, String::from_utf8_lossy(payload).into_owned()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, f: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| f(c)).count()
    }
}

impl LoraLink for MockLink {
    async fn join(&mut self) -> Result<(), LinkError> {
        self.calls.push(Call::Join);
        self.join_results.pop_front().unwrap_or(Ok(()))?;
        let outcome = self.join_outcomes.pop_front().unwrap_or(Ok(()));
        self.completions.push_back(LinkEvent::JoinDone(outcome));
        Ok(())
    }

    async fn is_joined(&mut self) -> bool {
        self.joined
    }

    async fn assigned_address(&mut self) -> Result<u32, LinkError> {
        Ok(self.address)
    }

    async fn send_uplink(
        &mut self,
        payload: &[u8],
        port: u8,
        confirmed: bool,
    ) -> Result<(), LinkError> {
        self.calls.push(Call::Send {
            port,
            payload: payload.to_vec(),
            confirmed,
        });
        self.send_results.pop_front().unwrap_or(Ok(()))?;
        let outcome = self.delivery_results.pop_front().unwrap_or(Ok(()));
        self.completions.push_back(LinkEvent::UplinkDone(outcome));
        Ok(())
    }

    async fn poll_event(&mut self) -> Option<LinkEvent> {
        if self.hold_completions {
            return None;
        }
        self.completions.pop_front()
    }

    async fn arm_continuous_receive(&mut self, params: &RxParams) -> Result<(), LinkError> {
        self.calls.push(Call::Arm(params.bandwidth));
        if let Some(e) = self.arm_error {
            return Err(e);
        }
        if self.rejected.contains(&params.bandwidth) {
            return Err(LinkError::UnsupportedParameter);
        }
        Ok(())
    }

    async fn read_pending_frame(&mut self, buf: &mut [u8]) -> Result<FrameInfo, LinkError> {
        self.calls.push(Call::Read);
        let (port, payload) = self.frames.pop_front().ok_or(LinkError::NoFrame)??;
        if payload.len() > buf.len() {
            return Err(LinkError::PayloadTooLarge);
        }
        buf[..payload.len()].copy_from_slice(&payload);
        Ok(FrameInfo {
            port,
            len: payload.len(),
        })
    }
}

/// Settings store kept in memory
#[derive(Default)]
pub struct MemoryStore {
    pub value: Option<Vec<u8>>,
    pub fail: bool,
    pub saves: usize,
}

impl SettingsStore for MemoryStore {
    async fn save(&mut self, _key: StorageKey, data: &[u8]) -> Result<(), StoreError> {
        if self.fail {
            return Err(StoreError::Flash);
        }
        self.saves += 1;
        self.value = Some(data.to_vec());
        Ok(())
    }

    async fn load(&mut self, _key: StorageKey, buf: &mut [u8]) -> Result<Option<usize>, StoreError> {
        if self.fail {
            return Err(StoreError::Flash);
        }
        let Some(value) = &self.value else {
            return Ok(None);
        };
        if value.len() > buf.len() {
            return Err(StoreError::BufferTooSmall);
        }
        buf[..value.len()].copy_from_slice(value);
        Ok(Some(value.len()))
    }
}

/// Bus operation recorded by [`MockBus`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOp {
    Break(bool),
    Write(Vec<u8>),
    Flush,
}

/// DMX bus that records operations
#[derive(Default)]
pub struct MockBus {
    pub ops: Vec<BusOp>,
    pub fail_write: bool,
    pub fail_break: bool,
}

impl DmxBus for MockBus {
    type Error = ();

    fn set_break(&mut self, active: bool) -> Result<(), ()> {
        if self.fail_break && active {
            return Err(());
        }
        self.ops.push(BusOp::Break(active));
        Ok(())
    }

    async fn write_slots(&mut self, slots: &[u8]) -> Result<(), ()> {
        if self.fail_write {
            return Err(());
        }
        self.ops.push(BusOp::Write(slots.to_vec()));
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ()> {
        self.ops.push(BusOp::Flush);
        Ok(())
    }
}

/// Delay that records requested durations instead of waiting
#[derive(Default)]
pub struct RecordingDelay {
    pub delays_us: Vec<u32>,
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.delays_us.push(ns / 1_000);
    }

    fn delay_us(&mut self, us: u32) {
        self.delays_us.push(us);
    }
}
