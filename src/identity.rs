//! Device identity and secret store

use crate::{
    config::Config,
    error::{ConfigError, Error, Result},
};
use log::{error, info};
use rand_core::{OsRng, RngCore};
use secrecy::{ExposeSecret, SecretVec};
use std::{
    fmt::{self, Display},
    str::FromStr,
};

/// Device identifier: a 12-bit value in `0..=4095`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct DeviceId(u16);

impl DeviceId {
    /// Largest valid identifier
    pub const MAX: u16 = 0x0fff;

    /// Canonical big-endian encoding used as keyed-hash input
    pub fn to_be_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

impl TryFrom<u32> for DeviceId {
    type Error = Error;

    fn try_from(id: u32) -> Result<Self> {
        if id > u32::from(Self::MAX) {
            error!("device id {} is outside 0..={}", id, Self::MAX);
            return Err(ConfigError::IdOutOfRange { id }.into());
        }

        Ok(DeviceId(id as u16))
    }
}

impl From<DeviceId> for u16 {
    fn from(id: DeviceId) -> u16 {
        id.0
    }
}

impl FromStr for DeviceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let id = match s.strip_prefix("0x") {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => s.parse(),
        }
        .map_err(|_| Error::ParseError)?;

        DeviceId::try_from(id)
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:03x}", self.0)
    }
}

/// Shared secret. Zeroized on drop and never printed.
pub struct Secret(SecretVec<u8>);

impl Secret {
    /// Wrap secret bytes.
    pub fn new(bytes: impl AsRef<[u8]>) -> Self {
        Secret(SecretVec::new(bytes.as_ref().to_vec()))
    }

    /// Generate a random secret of `len` bytes for provisioning a new tag.
    pub fn generate(len: usize) -> Result<Self> {
        if len == 0 {
            return Err(ConfigError::EmptyKey.into());
        }

        let mut bytes = vec![0u8; len];

        if OsRng.try_fill_bytes(&mut bytes).is_err() {
            error!("failed getting randomness for secret generation");
            return Err(Error::RandomnessError);
        }

        Ok(Secret(SecretVec::new(bytes)))
    }

    /// Byte length of the secret
    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    /// Is the secret empty?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Access the secret bytes
    pub fn expose(&self) -> &[u8] {
        self.0.expose_secret()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED; {}])", self.len())
    }
}

/// Immutable identity of a provisioned tag.
#[derive(Debug)]
pub struct DeviceIdentity {
    /// Device identifier
    pub id: DeviceId,

    /// Shared secret
    pub secret: Secret,
}

/// Holds the device identity for the lifetime of the firmware image.
#[derive(Debug)]
pub struct SecretStore {
    identity: DeviceIdentity,
}

impl SecretStore {
    /// Load the identity from the configuration.
    ///
    /// Fails when the identifier is out of range, the secret is empty, or the
    /// secret length differs from the declared key length.
    pub fn load(config: &Config) -> Result<Self> {
        let id = DeviceId::try_from(config.id())?;
        let key = config.key();

        if key.is_empty() {
            error!("shared secret for device {} is empty", id);
            return Err(ConfigError::EmptyKey.into());
        }

        if key.len() != config.key_length() {
            error!(
                "shared secret for device {} is {} bytes (expected {})",
                id,
                key.len(),
                config.key_length()
            );

            return Err(ConfigError::KeyLength {
                declared: config.key_length(),
                actual: key.len(),
            }
            .into());
        }

        info!("loaded identity for device {}", id);

        Ok(Self {
            identity: DeviceIdentity {
                id,
                secret: Secret::new(key),
            },
        })
    }

    /// Immutable device identity
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }
}
