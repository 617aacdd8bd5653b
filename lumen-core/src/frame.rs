//! DMX frame buffer
//!
//! A DMX512 frame is 513 slots: the start code followed by 512 channels.
//! Only the null start code is used, and nothing in this module can write
//! slot 0, so every frame handed to the output task starts with 0.

use core::cell::RefCell;

use critical_section::Mutex;

/// Slots in a DMX frame, start code included
pub const FRAME_SLOTS: usize = 513;

/// Highest channel number
pub const MAX_CHANNEL: u16 = 512;

/// Null start code (dimmer data)
pub const START_CODE: u8 = 0;

/// Errors from frame writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Channel 0 or a write running past channel 512
    OutOfRange,
}

/// One DMX frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    slots: [u8; FRAME_SLOTS],
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    /// All channels at zero
    pub const fn new() -> Self {
        Self {
            slots: [START_CODE; FRAME_SLOTS],
        }
    }

    /// Read a channel (1..=512)
    pub fn channel(&self, channel: u16) -> Option<u8> {
        if (1..=MAX_CHANNEL).contains(&channel) {
            Some(self.slots[channel as usize])
        } else {
            None
        }
    }

    /// Write a single channel (1..=512)
    pub fn set_channel(&mut self, channel: u16, value: u8) -> Result<(), FrameError> {
        self.write_channels(channel, &[value])
    }

    /// Write consecutive channels starting at `start`
    ///
    /// Nothing is written unless the whole range fits in 1..=512.
    pub fn write_channels(&mut self, start: u16, values: &[u8]) -> Result<(), FrameError> {
        let start = start as usize;
        let end = start + values.len();
        if start == 0 || end > FRAME_SLOTS {
            return Err(FrameError::OutOfRange);
        }
        self.slots[start..end].copy_from_slice(values);
        Ok(())
    }

    /// Zero every channel
    pub fn clear(&mut self) {
        self.slots = [START_CODE; FRAME_SLOTS];
    }

    /// The full frame, start code first
    pub fn as_slots(&self) -> &[u8; FRAME_SLOTS] {
        &self.slots
    }

    /// Channels 1..=512
    pub fn channels(&self) -> &[u8] {
        &self.slots[1..]
    }
}

/// Frame buffer shared between the dispatcher, the pattern engine and the
/// output task
///
/// Access goes through closures that run inside a critical section, so no
/// caller can keep the lock across an await point or a bus transfer.
pub struct SharedFrame {
    inner: Mutex<RefCell<FrameBuffer>>,
}

impl Default for SharedFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedFrame {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(FrameBuffer::new())),
        }
    }

    /// Run `f` with exclusive access to the frame
    pub fn with<R>(&self, f: impl FnOnce(&mut FrameBuffer) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }

    /// Copy the current frame into `out`
    pub fn snapshot_into(&self, out: &mut [u8; FRAME_SLOTS]) {
        critical_section::with(|cs| out.copy_from_slice(self.inner.borrow_ref(cs).as_slots()));
    }

    /// Copy of the current frame
    pub fn snapshot(&self) -> FrameBuffer {
        critical_section::with(|cs| self.inner.borrow_ref(cs).clone())
    }
}
