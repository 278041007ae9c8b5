//! Tag-side code issuing

use crate::{
    config::Config,
    counter::{CounterKeeper, CounterState, CounterStore},
    error::{Error, Result},
    identity::{DeviceIdentity, SecretStore},
    otp::{derive, Digits, OtpCode},
};
use log::{debug, error};

/// A code handed out by a [`Token`].
#[derive(Clone, Debug)]
pub struct Issued {
    /// Counter the code was derived at
    pub counter: u64,

    /// The code
    pub code: OtpCode,
}

/// Issues codes for a tag, consuming one counter value per code.
#[derive(Debug)]
pub struct Token<S> {
    secrets: SecretStore,
    digits: Digits,
    counters: CounterKeeper<S>,
}

impl<S: CounterStore> Token<S> {
    /// Load the identity described by `config` and open the counter in `store`.
    pub fn new(config: &Config, store: S) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            secrets: SecretStore::load(config)?,
            digits: Digits::try_from(config.digits())?,
            counters: CounterKeeper::open(store)?,
        })
    }

    /// Issue the code for the current counter.
    ///
    /// The following counter is committed before the code is returned, so a
    /// code is never issued twice even across power loss.
    pub fn next_code(&mut self) -> Result<Issued> {
        let current = self.counters.current();

        let next = current.value.checked_add(1).ok_or_else(|| {
            error!("counter of device {} is exhausted", self.identity().id);
            Error::CounterExhausted
        })?;

        let code = derive(self.secrets.identity(), current, self.digits);
        self.counters.advance_to(next)?;

        debug!(
            "issued code for device {} at counter {}",
            self.identity().id,
            current.value
        );

        Ok(Issued {
            counter: current.value,
            code,
        })
    }

    /// Counter the next code will be derived at
    pub fn counter(&self) -> CounterState {
        self.counters.current()
    }

    /// Identity of this tag
    pub fn identity(&self) -> &DeviceIdentity {
        self.secrets.identity()
    }

    /// Return the counter store
    pub fn into_inner(self) -> S {
        self.counters.into_inner()
    }
}
