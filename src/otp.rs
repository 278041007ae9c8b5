//! One-time code derivation
//!
//! Codes are derived HOTP-style: HMAC-SHA1 keyed with the device secret over
//! the canonical encoding `id (u16 BE) || counter (u64 BE)`, followed by the
//! dynamic truncation of [RFC 4226 section 5.3] and reduction to a fixed
//! number of decimal digits.
//!
//! [RFC 4226 section 5.3]: https://tools.ietf.org/html/rfc4226#section-5.3

use crate::{
    counter::CounterState,
    error::{ConfigError, Error, Result},
    identity::DeviceIdentity,
};
use hmac::{digest::KeyInit, Hmac, Mac};
use sha1::Sha1;
use std::fmt;
use subtle::{Choice, ConstantTimeEq};
use zeroize::Zeroizing;

type HmacSha1 = Hmac<Sha1>;

/// Length of the canonical `id || counter` message
const MESSAGE_LEN: usize = 2 + 8;

/// Number of decimal digits in a code.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Digits(u8);

impl Digits {
    /// Shortest supported code
    pub const MIN: u8 = 6;

    /// Longest supported code
    pub const MAX: u8 = 8;

    /// Code length of a factory-provisioned tag
    pub const DEFAULT: Digits = Digits(6);

    /// Number of digits
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Code length in bytes
    pub const fn len(self) -> usize {
        self.0 as usize
    }

    fn modulus(self) -> u32 {
        10u32.pow(u32::from(self.0))
    }
}

impl TryFrom<u8> for Digits {
    type Error = Error;

    fn try_from(digits: u8) -> Result<Self> {
        if !(Self::MIN..=Self::MAX).contains(&digits) {
            return Err(ConfigError::Digits { digits }.into());
        }

        Ok(Digits(digits))
    }
}

/// One-time code: ASCII decimal digits.
///
/// Codes are ephemeral. The buffer is zeroized on drop and the `Debug`
/// impl never prints the digits.
#[derive(Clone)]
pub struct OtpCode {
    buffer: Zeroizing<[u8; Self::MAX_LEN]>,
    length: usize,
}

impl OtpCode {
    /// Maximum code length in bytes
    pub const MAX_LEN: usize = Digits::MAX as usize;

    /// Copy a presented code received from the link layer.
    ///
    /// Only the size is checked here; the format is checked on verification.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        if data.len() > Self::MAX_LEN {
            return Err(Error::MalformedInput);
        }

        let mut code = Self::empty();
        code.buffer[..data.len()].copy_from_slice(data);
        code.length = data.len();
        Ok(code)
    }

    /// Render a truncated value as a zero-padded code.
    fn from_value(value: u32, digits: Digits) -> Self {
        let mut code = Self::empty();
        let mut rest = value % digits.modulus();

        for slot in code.buffer[..digits.len()].iter_mut().rev() {
            *slot = b'0' + (rest % 10) as u8;
            rest /= 10;
        }

        code.length = digits.len();
        code
    }

    fn empty() -> Self {
        Self {
            buffer: Zeroizing::new([0u8; Self::MAX_LEN]),
            length: 0,
        }
    }

    /// Code bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.length]
    }

    /// Code length in bytes
    pub fn len(&self) -> usize {
        self.length
    }

    /// Is the code empty?
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Is this code in the public format for `digits`?
    pub fn is_well_formed(&self, digits: Digits) -> bool {
        self.length == digits.len() && self.as_bytes().iter().all(u8::is_ascii_digit)
    }
}

impl ConstantTimeEq for OtpCode {
    fn ct_eq(&self, other: &Self) -> Choice {
        // lengths are public
        if self.length != other.length {
            return Choice::from(0);
        }

        self.as_bytes().ct_eq(other.as_bytes())
    }
}

impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OtpCode([REDACTED; {}])", self.length)
    }
}

/// Displays the code digits. Only for handing a code to its holder; never log it.
impl fmt::Display for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.as_bytes() {
            write!(f, "{}", char::from(b))?;
        }
        Ok(())
    }
}

/// Derive the code of `identity` at `counter`.
///
/// Pure function of its inputs: identical inputs give identical codes across
/// restarts.
pub fn derive(identity: &DeviceIdentity, counter: CounterState, digits: Digits) -> OtpCode {
    let mut message = [0u8; MESSAGE_LEN];
    message[..2].copy_from_slice(&identity.id.to_be_bytes());
    message[2..].copy_from_slice(&counter.value.to_be_bytes());

    let mut mac = <HmacSha1 as KeyInit>::new_from_slice(identity.secret.expose())
        .expect("HMAC accepts keys of any length");
    mac.update(&message);

    let tag = Zeroizing::new(mac.finalize().into_bytes().to_vec());
    OtpCode::from_value(truncate(&tag), digits)
}

/// Dynamic truncation: 31 bits read at the offset given by the low nibble of
/// the last byte.
pub(crate) fn truncate(tag: &[u8]) -> u32 {
    let offset = usize::from(tag[tag.len() - 1] & 0x0f);

    u32::from_be_bytes([
        tag[offset] & 0x7f,
        tag[offset + 1],
        tag[offset + 2],
        tag[offset + 3],
    ])
}
