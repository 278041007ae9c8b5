//! Error types

use std::{
    fmt::{self, Display},
    io,
};

/// Result type with [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Kinds of errors.
///
/// Per-attempt rejections (`MalformedInput`, `NoMatch`, `DesyncError`) are
/// recoverable and carry no code or key material. `Config` aborts
/// initialization and `CounterExhausted` requires the tag to be re-provisioned.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// Invalid device configuration
    Config(ConfigError),

    /// Presented code is empty or not in the public code format
    MalformedInput,

    /// Presented code matched no counter in the verification window
    NoMatch,

    /// Counter could not be advanced after a match
    DesyncError,

    /// Counter cannot move forward without wrapping
    CounterExhausted,

    /// Counter update does not move forward
    StaleUpdate {
        /// Counter value currently persisted
        current: u64,

        /// Counter value that was requested
        requested: u64,
    },

    /// Persistent storage failed
    Storage {
        /// Underlying I/O error kind
        kind: io::ErrorKind,
    },

    /// Persistent storage holds no valid counter record
    CorruptState,

    /// Parse error
    ParseError,

    /// Randomness error
    RandomnessError,

    /// Size error
    SizeError,
}

impl Error {
    /// Name of the error.
    ///
    /// These names map to the reason codes reported to a reader session.
    pub fn name(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::MalformedInput => "MALFORMED_INPUT",
            Error::NoMatch => "NO_MATCH",
            Error::DesyncError => "DESYNC_ERROR",
            Error::CounterExhausted => "COUNTER_EXHAUSTED",
            Error::StaleUpdate { .. } => "STALE_UPDATE",
            Error::Storage { .. } => "STORAGE_ERROR",
            Error::CorruptState => "CORRUPT_STATE",
            Error::ParseError => "PARSE_ERROR",
            Error::RandomnessError => "RANDOMNESS_ERROR",
            Error::SizeError => "SIZE_ERROR",
        }
    }

    /// Is this a per-attempt rejection the reader may recover from?
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::MalformedInput | Error::NoMatch | Error::DesyncError
        )
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(err) => write!(f, "configuration error: {}", err),
            Error::MalformedInput => f.write_str("malformed one-time code"),
            Error::NoMatch => f.write_str("one-time code rejected"),
            Error::DesyncError => f.write_str("counter resynchronization failed"),
            Error::CounterExhausted => f.write_str("counter exhausted; device must be re-provisioned"),
            Error::StaleUpdate { current, requested } => write!(
                f,
                "stale counter update: requested {} but {} is already persisted",
                requested, current
            ),
            Error::Storage { kind } => write!(f, "storage error: {:?}", kind),
            Error::CorruptState => f.write_str("no valid counter record in storage"),
            Error::ParseError => f.write_str("parse error"),
            Error::RandomnessError => f.write_str("randomness error"),
            Error::SizeError => f.write_str("size error"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Error {
        Error::Config(err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Storage { kind: err.kind() }
    }
}

/// Configuration errors, all fatal at boot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// Device identifier outside `0..=4095`
    IdOutOfRange {
        /// Configured identifier
        id: u32,
    },

    /// Secret length differs from the declared key length
    KeyLength {
        /// Declared key length
        declared: usize,

        /// Actual byte length of the secret
        actual: usize,
    },

    /// Secret is empty
    EmptyKey,

    /// Code length outside the supported range
    Digits {
        /// Configured number of digits
        digits: u8,
    },

    /// Resynchronization window larger than allowed
    Window {
        /// Configured window
        window: u64,
    },

    /// A setting could not be parsed
    InvalidSetting {
        /// Name of the setting
        name: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IdOutOfRange { id } => {
                write!(f, "device id {} is outside 0..=4095", id)
            }
            ConfigError::KeyLength { declared, actual } => write!(
                f,
                "secret is {} bytes but key length is declared as {}",
                actual, declared
            ),
            ConfigError::EmptyKey => f.write_str("secret is empty"),
            ConfigError::Digits { digits } => {
                write!(f, "{} digits is outside the supported 6..=8", digits)
            }
            ConfigError::Window { window } => {
                write!(f, "resynchronization window {} is too large", window)
            }
            ConfigError::InvalidSetting { name } => write!(f, "invalid value for {}", name),
        }
    }
}

impl std::error::Error for ConfigError {}
