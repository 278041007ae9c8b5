//! Reader-side authentication of a single tag

use crate::{
    config::Config,
    counter::{CounterKeeper, CounterState, CounterStore},
    error::Result,
    identity::{DeviceIdentity, SecretStore},
    otp::OtpCode,
    verify::{Authenticated, Verifier},
};

/// Authenticates codes presented by one tag.
///
/// Wrap in a `Mutex` to share between reader sessions.
#[derive(Debug)]
pub struct Authenticator<S> {
    secrets: SecretStore,
    verifier: Verifier,
    counters: CounterKeeper<S>,
}

impl<S: CounterStore> Authenticator<S> {
    /// Load the identity described by `config` and open the counter in `store`.
    pub fn new(config: &Config, store: S) -> Result<Self> {
        let verifier = Verifier::new(config)?;
        let secrets = SecretStore::load(config)?;
        let counters = CounterKeeper::open(store)?;

        Ok(Self {
            secrets,
            verifier,
            counters,
        })
    }

    /// Authenticate the raw bytes received from the link layer.
    pub fn authenticate(&mut self, presented: &[u8]) -> Result<Authenticated> {
        let code = OtpCode::from_slice(presented)?;
        self.verifier
            .verify(&code, self.secrets.identity(), &mut self.counters)
    }

    /// Persisted counter
    pub fn counter(&self) -> CounterState {
        self.counters.current()
    }

    /// Identity of the authenticated tag
    pub fn identity(&self) -> &DeviceIdentity {
        self.secrets.identity()
    }

    /// Return the counter store
    pub fn into_inner(self) -> S {
        self.counters.into_inner()
    }
}
