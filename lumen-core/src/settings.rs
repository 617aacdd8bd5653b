//! Persisted runtime settings
//!
//! Only what a downlink can change and should survive a power cycle: the
//! fixture count and the pattern that was running. Stored as postcard under
//! [`StorageKey::Settings`].

use lumen_hal::{SettingsStore, StorageKey, StoreError};
use lumen_protocol::PatternSpec;
use serde::{Deserialize, Serialize};

use crate::fixture::DEFAULT_FIXTURE_COUNT;

/// Bumped whenever the layout of [`Settings`] changes
pub const SETTINGS_VERSION: u8 = 1;

/// Upper bound of the encoded size
pub const MAX_SETTINGS_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settings {
    pub version: u8,
    pub fixture_count: u8,
    /// Pattern to resume at boot
    pub pattern: Option<PatternSpec>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            fixture_count: DEFAULT_FIXTURE_COUNT,
            pattern: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SettingsError {
    Store(StoreError),
    Encode,
    Decode,
    /// Stored settings were written by an incompatible firmware
    VersionMismatch(u8),
}

impl From<StoreError> for SettingsError {
    fn from(e: StoreError) -> Self {
        SettingsError::Store(e)
    }
}

impl Settings {
    pub fn new(fixture_count: u8, pattern: Option<PatternSpec>) -> Self {
        Self {
            version: SETTINGS_VERSION,
            fixture_count,
            pattern,
        }
    }

    /// Load settings, `None` if nothing was ever saved
    pub async fn load<S: SettingsStore>(store: &mut S) -> Result<Option<Self>, SettingsError> {
        let mut buf = [0u8; MAX_SETTINGS_SIZE];
        let Some(len) = store.load(StorageKey::Settings, &mut buf).await? else {
            return Ok(None);
        };
        let settings: Settings =
            postcard::from_bytes(&buf[..len]).map_err(|_| SettingsError::Decode)?;
        if settings.version != SETTINGS_VERSION {
            return Err(SettingsError::VersionMismatch(settings.version));
        }
        Ok(Some(settings))
    }

    pub async fn save<S: SettingsStore>(&self, store: &mut S) -> Result<(), SettingsError> {
        let mut buf = [0u8; MAX_SETTINGS_SIZE];
        let bytes = postcard::to_slice(self, &mut buf).map_err(|_| SettingsError::Encode)?;
        store.save(StorageKey::Settings, bytes).await?;
        Ok(())
    }
}
