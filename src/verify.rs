//! Code verification with a bounded look-ahead window
//!
//! A tag advances its counter every time it issues a code, but a reader only
//! learns about codes that were actually presented to it. Codes generated and
//! never presented put the tag ahead of the reader, so the reader accepts any
//! code derived from a counter in `[current, current + window]` and then
//! resynchronizes past the matching counter.

use crate::{
    config::Config,
    counter::{CounterKeeper, CounterState, CounterStore},
    error::{Error, Result},
    identity::DeviceIdentity,
    otp::{derive, Digits, OtpCode},
};
use log::{error, info, trace, warn};
use std::ops::RangeInclusive;
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};

/// Look-ahead window of a factory-provisioned reader
pub const DEFAULT_WINDOW: u64 = 10;

/// Largest look-ahead window a reader may be configured with
pub const MAX_WINDOW: u64 = 20;

/// Counter values scanned by one verification.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct VerificationWindow {
    low: u64,
    high: u64,
}

impl VerificationWindow {
    /// Window of `width` counters ahead of `from`.
    ///
    /// Fails with [`Error::CounterExhausted`] unless the counter following
    /// the last scanned one is representable, so acceptance can always
    /// advance the counter without wrapping.
    pub fn new(from: u64, width: u64) -> Result<Self> {
        let high = from
            .checked_add(width)
            .filter(|high| high.checked_add(1).is_some())
            .ok_or(Error::CounterExhausted)?;

        Ok(Self { low: from, high })
    }

    /// First counter in the window
    pub fn low(&self) -> u64 {
        self.low
    }

    /// Last counter in the window
    pub fn high(&self) -> u64 {
        self.high
    }

    /// Number of counters in the window
    pub fn len(&self) -> u64 {
        self.high - self.low + 1
    }

    /// Windows always contain at least the current counter
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Counters in ascending order
    pub fn iter(&self) -> RangeInclusive<u64> {
        self.low..=self.high
    }
}

/// Successful verification.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Authenticated {
    /// Distance of the matching counter from the reader's counter
    pub offset: u64,

    /// Counter value persisted after the match
    pub counter: u64,
}

/// Checks presented codes against the counter kept by a reader.
#[derive(Copy, Clone, Debug)]
pub struct Verifier {
    digits: Digits,
    window: u64,
}

impl Verifier {
    /// Create a verifier with the code format and window of `config`.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            digits: Digits::try_from(config.digits())?,
            window: config.window(),
        })
    }

    /// Expected code length
    pub fn digits(&self) -> Digits {
        self.digits
    }

    /// Look-ahead window
    pub fn window(&self) -> u64 {
        self.window
    }

    /// Verify `presented` for `identity`, advancing `counters` on success.
    ///
    /// Every counter in the window is derived and compared in constant time,
    /// whether or not an earlier one matched; the first match wins. The
    /// counter is then advanced past the matching value. If that fails the
    /// attempt is rejected with [`Error::DesyncError`] so a code is never
    /// accepted without its counter being consumed.
    pub fn verify<S: CounterStore>(
        &self,
        presented: &OtpCode,
        identity: &DeviceIdentity,
        counters: &mut CounterKeeper<S>,
    ) -> Result<Authenticated> {
        if presented.is_empty() || !presented.is_well_formed(self.digits) {
            warn!(
                "rejecting malformed code for device {} ({} bytes)",
                identity.id,
                presented.len()
            );
            return Err(Error::MalformedInput);
        }

        let current = counters.current().value;

        let window = VerificationWindow::new(current, self.window).map_err(|e| {
            error!("counter of device {} is exhausted", identity.id);
            e
        })?;

        trace!(
            "scanning counters {}..={} for device {}",
            window.low(),
            window.high(),
            identity.id
        );

        let mut found = Choice::from(0);
        let mut offset = 0u64;

        for (candidate_offset, counter) in (0u64..).zip(window.iter()) {
            let candidate = derive(identity, CounterState::new(counter), self.digits);
            let is_first_match = candidate.ct_eq(presented) & !found;
            offset.conditional_assign(&candidate_offset, is_first_match);
            found |= is_first_match;
        }

        if !bool::from(found) {
            warn!("no code in window matched for device {}", identity.id);
            return Err(Error::NoMatch);
        }

        // the window guarantees this cannot overflow
        let next = window.low() + offset + 1;

        counters.advance_to(next).map_err(|e| {
            error!(
                "matched code for device {} but could not advance counter: {}",
                identity.id, e
            );
            Error::DesyncError
        })?;

        info!(
            "authenticated device {} at offset {} (counter now {})",
            identity.id, offset, next
        );

        Ok(Authenticated {
            offset,
            counter: next,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{counter::MemoryStore, identity::SecretStore};

    fn setup(counter: Option<u64>) -> (Verifier, SecretStore, CounterKeeper<MemoryStore>) {
        let config = Config::default();
        let store = match counter {
            Some(value) => MemoryStore::with_value(value),
            None => MemoryStore::new(),
        };

        (
            Verifier::new(&config).unwrap(),
            SecretStore::load(&config).unwrap(),
            CounterKeeper::open(store).unwrap(),
        )
    }

    fn code(bytes: &[u8]) -> OtpCode {
        OtpCode::from_slice(bytes).unwrap()
    }

    #[test]
    fn window_bounds() {
        let window = VerificationWindow::new(5, 10).unwrap();
        assert_eq!(window.low(), 5);
        assert_eq!(window.high(), 15);
        assert_eq!(window.len(), 11);
        assert_eq!(window.iter().count(), 11);

        assert!(VerificationWindow::new(u64::MAX - 11, 10).is_ok());
        assert_eq!(
            VerificationWindow::new(u64::MAX - 10, 10),
            Err(Error::CounterExhausted)
        );
        assert_eq!(
            VerificationWindow::new(u64::MAX, 0),
            Err(Error::CounterExhausted)
        );
    }

    #[test]
    fn accepts_once_then_rejects_replay() {
        let (verifier, secrets, mut counters) = setup(None);

        let result = verifier
            .verify(&code(b"861827"), secrets.identity(), &mut counters)
            .unwrap();
        assert_eq!(
            result,
            Authenticated {
                offset: 0,
                counter: 1
            }
        );
        assert_eq!(counters.store().value(), Some(1));

        assert_eq!(
            verifier.verify(&code(b"861827"), secrets.identity(), &mut counters),
            Err(Error::NoMatch)
        );
        assert_eq!(counters.current().value, 1);
    }

    #[test]
    fn resynchronizes_ahead() {
        let (verifier, secrets, mut counters) = setup(None);

        // code issued at counter 3; codes 0..=2 were never presented
        let result = verifier
            .verify(&code(b"040068"), secrets.identity(), &mut counters)
            .unwrap();
        assert_eq!(result.offset, 3);
        assert_eq!(result.counter, 4);

        // an older code is now behind the window
        assert_eq!(
            verifier.verify(&code(b"224008"), secrets.identity(), &mut counters),
            Err(Error::NoMatch)
        );

        let result = verifier
            .verify(&code(b"740599"), secrets.identity(), &mut counters)
            .unwrap();
        assert_eq!(
            result,
            Authenticated {
                offset: 0,
                counter: 5
            }
        );
    }

    #[test]
    fn window_edge() {
        let (verifier, secrets, mut counters) = setup(None);
        assert_eq!(
            verifier.verify(&code(b"518874"), secrets.identity(), &mut counters),
            Err(Error::NoMatch)
        );
        assert_eq!(counters.current().value, 0);

        let result = verifier
            .verify(&code(b"387959"), secrets.identity(), &mut counters)
            .unwrap();
        assert_eq!(result.offset, DEFAULT_WINDOW);
        assert_eq!(result.counter, 11);
    }

    #[test]
    fn zero_window_only_accepts_current() {
        let config = Config::default().with_window(0);
        let verifier = Verifier::new(&config).unwrap();
        let secrets = SecretStore::load(&config).unwrap();
        let mut counters = CounterKeeper::open(MemoryStore::new()).unwrap();

        assert_eq!(
            verifier.verify(&code(b"224008"), secrets.identity(), &mut counters),
            Err(Error::NoMatch)
        );
        assert!(verifier
            .verify(&code(b"861827"), secrets.identity(), &mut counters)
            .is_ok());
    }

    #[test]
    fn failed_commit_is_desync() {
        let (verifier, secrets, _) = setup(None);
        let mut store = MemoryStore::new();
        store.fail_commits(true);
        let mut counters = CounterKeeper::open(store).unwrap();

        assert_eq!(
            verifier.verify(&code(b"861827"), secrets.identity(), &mut counters),
            Err(Error::DesyncError)
        );
        assert_eq!(counters.current().value, 0);
        assert_eq!(counters.store().value(), None);
    }

    #[test]
    fn exhausted_counter() {
        let (verifier, secrets, mut counters) = setup(Some(u64::MAX));
        assert_eq!(
            verifier.verify(&code(b"143039"), secrets.identity(), &mut counters),
            Err(Error::CounterExhausted)
        );

        let (verifier, secrets, mut counters) = setup(Some(u64::MAX - DEFAULT_WINDOW));
        assert_eq!(
            verifier.verify(&code(b"000000"), secrets.identity(), &mut counters),
            Err(Error::CounterExhausted)
        );
        assert_eq!(counters.current().value, u64::MAX - DEFAULT_WINDOW);
    }

    #[test]
    fn malformed_codes() {
        let (verifier, secrets, mut counters) = setup(None);

        for presented in [&b""[..], &b"86182"[..], &b"8618277"[..], &b"86182a"[..]] {
            assert_eq!(
                verifier.verify(&code(presented), secrets.identity(), &mut counters),
                Err(Error::MalformedInput)
            );
        }

        assert_eq!(counters.current().value, 0);
    }

    #[test]
    fn rejects_invalid_config() {
        assert!(Verifier::new(&Config::default().with_digits(9)).is_err());
        assert!(Verifier::new(&Config::default().with_window(MAX_WINDOW + 1)).is_err());
    }
}
