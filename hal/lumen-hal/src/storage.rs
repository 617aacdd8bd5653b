//! Persistent settings storage abstractions
//!
//! Provides a small key-value interface backed by flash on real hardware.
//! Wear levelling and integrity are the implementation's problem.

use core::future::Future;

/// Storage keys for persisted data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StorageKey {
    /// Controller settings (binary postcard format)
    Settings = 0,
}

impl StorageKey {
    /// Get the key as a byte value
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Create a key from a byte value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(StorageKey::Settings),
            _ => None,
        }
    }
}

/// Errors from storage operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// Underlying flash operation failed
    Flash,
    /// Buffer too small for the stored value
    BufferTooSmall,
    /// Stored data is unreadable
    Corrupted,
    /// No space left in the partition
    Full,
}

/// Key-value settings store
pub trait SettingsStore {
    /// Write `data` under `key`, replacing any previous value
    fn save(&mut self, key: StorageKey, data: &[u8]) -> impl Future<Output = Result<(), StoreError>>;

    /// Read the value stored under `key` into `buf`
    ///
    /// Returns `Ok(None)` if nothing is stored, otherwise the value length.
    fn load(
        &mut self,
        key: StorageKey,
        buf: &mut [u8],
    ) -> impl Future<Output = Result<Option<usize>, StoreError>>;
}

// Implement the sequential-storage Key trait when the feature is enabled
#[cfg(feature = "sequential-storage")]
impl sequential_storage::map::Key for StorageKey {
    fn serialize_into(
        &self,
        buffer: &mut [u8],
    ) -> Result<usize, sequential_storage::map::SerializationError> {
        if buffer.is_empty() {
            return Err(sequential_storage::map::SerializationError::BufferTooSmall);
        }
        buffer[0] = self.as_u8();
        Ok(1)
    }

    fn deserialize_from(
        buffer: &[u8],
    ) -> Result<(Self, usize), sequential_storage::map::SerializationError> {
        if buffer.is_empty() {
            return Err(sequential_storage::map::SerializationError::BufferTooSmall);
        }
        match StorageKey::from_u8(buffer[0]) {
            Some(key) => Ok((key, 1)),
            None => Err(sequential_storage::map::SerializationError::InvalidFormat),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_byte_mapping() {
        assert_eq!(StorageKey::Settings.as_u8(), 0);
        assert_eq!(StorageKey::from_u8(0), Some(StorageKey::Settings));
        assert_eq!(StorageKey::from_u8(7), None);
    }
}
