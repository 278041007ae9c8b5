//! Device configuration
//!
//! A [`Config`] is built once at startup and handed by reference to the
//! components that need it. It carries the provisioning values of a tag:
//! the 12-bit identifier, the shared secret and its declared length, the
//! number of code digits and the resynchronization window.

use crate::{
    error::{ConfigError, Result},
    otp::Digits,
    setting::{Setting, SettingSource},
    verify::{DEFAULT_WINDOW, MAX_WINDOW},
};
use log::error;
use std::{fmt, path::Path};
use zeroize::Zeroizing;

/// Identifier of a factory-provisioned tag
pub const DEFAULT_ID: u32 = 0x000;

/// Shared secret of a factory-provisioned tag
pub const DEFAULT_KEY: &[u8] = b"secret";

/// Declared length of [`DEFAULT_KEY`]
pub const DEFAULT_KEY_LENGTH: usize = 6;

/// Prefix marking a hex-encoded `KEY` setting
const HEX_KEY_PREFIX: &str = "hex:";

/// Where each configuration value came from.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Sources {
    /// Source of the device identifier
    pub id: SettingSource,

    /// Source of the shared secret
    pub key: SettingSource,

    /// Source of the declared key length
    pub key_length: SettingSource,

    /// Source of the number of digits
    pub digits: SettingSource,

    /// Source of the resynchronization window
    pub window: SettingSource,
}

/// Tag configuration
#[derive(Clone)]
pub struct Config {
    /// Device identifier, validated against `0..=4095` by the secret store
    id: u32,

    /// Shared secret
    key: Zeroizing<Vec<u8>>,

    /// Declared byte length of the shared secret
    key_length: usize,

    /// Number of decimal digits in a code
    digits: u8,

    /// Number of counter values tolerated ahead of the persisted counter
    window: u64,

    /// Origin of each value
    sources: Sources,
}

impl Config {
    /// Create a configuration from explicit provisioning values.
    pub fn new(id: u32, key: impl AsRef<[u8]>, key_length: usize) -> Self {
        Self {
            id,
            key: Zeroizing::new(key.as_ref().to_vec()),
            key_length,
            digits: Digits::DEFAULT.get(),
            window: DEFAULT_WINDOW,
            sources: Sources::default(),
        }
    }

    /// Set the number of code digits.
    pub fn with_digits(mut self, digits: u8) -> Self {
        self.digits = digits;
        self
    }

    /// Set the resynchronization window.
    pub fn with_window(mut self, window: u64) -> Self {
        self.window = window;
        self
    }

    /// Load the configuration from `path` and `RFID_OTP_*` environment
    /// variables, falling back to the factory defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let id = Setting::get(path, "ID", &DEFAULT_ID.to_string());
        let key = Setting::get(path, "KEY", "");
        let key_length = Setting::get(path, "KEY_LENGTH", &DEFAULT_KEY_LENGTH.to_string());
        let digits = Setting::get(path, "DIGITS", &Digits::DEFAULT.get().to_string());
        let window = Setting::get(path, "WINDOW", &DEFAULT_WINDOW.to_string());

        let key_bytes = match key.source {
            SettingSource::Default => Zeroizing::new(DEFAULT_KEY.to_vec()),
            _ => parse_key(&key.value)?,
        };

        let config = Self {
            id: parse_id(&id.value)?,
            key: key_bytes,
            key_length: parse_number(&key_length.value, "KEY_LENGTH")?,
            digits: parse_number(&digits.value, "DIGITS")?,
            window: parse_number(&window.value, "WINDOW")?,
            sources: Sources {
                id: id.source,
                key: key.source,
                key_length: key_length.source,
                digits: digits.source,
                window: window.source,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the code format and window settings.
    ///
    /// Identifier and secret are checked when the secret store is loaded.
    pub fn validate(&self) -> Result<()> {
        Digits::try_from(self.digits)?;

        if self.window > MAX_WINDOW {
            error!(
                "resynchronization window {} exceeds the maximum of {}",
                self.window, MAX_WINDOW
            );
            return Err(ConfigError::Window {
                window: self.window,
            }
            .into());
        }

        Ok(())
    }

    /// Configured device identifier
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Declared key length
    pub fn key_length(&self) -> usize {
        self.key_length
    }

    /// Number of code digits
    pub fn digits(&self) -> u8 {
        self.digits
    }

    /// Resynchronization window
    pub fn window(&self) -> u64 {
        self.window
    }

    /// Origin of each configured value
    pub fn sources(&self) -> Sources {
        self.sources
    }

    /// Shared secret bytes
    pub(crate) fn key(&self) -> &[u8] {
        &self.key
    }
}

/// Factory provisioning values
impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_ID, DEFAULT_KEY, DEFAULT_KEY_LENGTH)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("id", &self.id)
            .field("key", &"[REDACTED]")
            .field("key_length", &self.key_length)
            .field("digits", &self.digits)
            .field("window", &self.window)
            .finish()
    }
}

/// Parse a device identifier given in decimal or `0x`-prefixed hex.
fn parse_id(value: &str) -> Result<u32> {
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };

    parsed.map_err(|_| {
        error!("could not parse device id setting");
        ConfigError::InvalidSetting { name: "ID" }.into()
    })
}

/// Parse a shared secret given as ASCII or as `hex:`-prefixed hex.
fn parse_key(value: &str) -> Result<Zeroizing<Vec<u8>>> {
    match value.strip_prefix(HEX_KEY_PREFIX) {
        Some(encoded) => hex::mixed::decode_vec(encoded)
            .map(Zeroizing::new)
            .map_err(|_| {
                error!("could not decode hex secret setting");
                ConfigError::InvalidSetting { name: "KEY" }.into()
            }),
        None => Ok(Zeroizing::new(value.as_bytes().to_vec())),
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, name: &'static str) -> Result<T> {
    value.parse().map_err(|_| {
        error!("could not parse {} setting", name);
        ConfigError::InvalidSetting { name }.into()
    })
}
