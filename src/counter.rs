//! Counter state keeping
//!
//! The moving factor of every derived code is a 64-bit counter. It only ever
//! moves forward, and every forward move is committed to a [`CounterStore`]
//! before it is observed, so a power loss can never roll it back to a value
//! whose codes were already consumed.

use crate::error::{Error, Result};
use log::{debug, error, warn};

/// Counter value together with whether it is durably stored.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CounterState {
    /// Counter value
    pub value: u64,

    /// Has this value been committed to storage?
    pub persisted: bool,
}

impl CounterState {
    /// Create an unpersisted counter state.
    pub const fn new(value: u64) -> Self {
        Self {
            value,
            persisted: false,
        }
    }
}

/// Durable storage of the counter, supplied by the platform.
///
/// `commit` must be atomic: after a power loss during a commit, `load`
/// returns either the previous or the new value, never anything else.
pub trait CounterStore {
    /// Load the last committed counter value, or `None` if nothing was ever
    /// committed.
    fn load(&mut self) -> Result<Option<u64>>;

    /// Durably commit `value`.
    fn commit(&mut self, value: u64) -> Result<()>;
}

impl<S: CounterStore + ?Sized> CounterStore for &mut S {
    fn load(&mut self) -> Result<Option<u64>> {
        (**self).load()
    }

    fn commit(&mut self, value: u64) -> Result<()> {
        (**self).commit(value)
    }
}

/// In-memory counter store.
///
/// Meant for tests and for platforms that keep the counter elsewhere.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    value: Option<u64>,
    fail_commits: bool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding a committed `value`.
    pub fn with_value(value: u64) -> Self {
        Self {
            value: Some(value),
            fail_commits: false,
        }
    }

    /// Make subsequent commits fail, as a worn-out or unplugged memory would.
    pub fn fail_commits(&mut self, fail: bool) {
        self.fail_commits = fail;
    }

    /// Last committed value
    pub fn value(&self) -> Option<u64> {
        self.value
    }
}

impl CounterStore for MemoryStore {
    fn load(&mut self) -> Result<Option<u64>> {
        Ok(self.value)
    }

    fn commit(&mut self, value: u64) -> Result<()> {
        if self.fail_commits {
            return Err(Error::Storage {
                kind: std::io::ErrorKind::Other,
            });
        }

        self.value = Some(value);
        Ok(())
    }
}

/// Holds the counter and advances it through its store.
///
/// `advance_to` takes `&mut self`, so a keeper shared between reader
/// sessions must sit behind a `Mutex`; the lock then serializes the
/// compare-and-persist.
#[derive(Debug)]
pub struct CounterKeeper<S> {
    store: S,
    state: CounterState,
}

impl<S: CounterStore> CounterKeeper<S> {
    /// Open the keeper, loading the last committed counter.
    ///
    /// A store that never committed starts the counter at zero.
    pub fn open(mut store: S) -> Result<Self> {
        let state = match store.load().map_err(|e| {
            error!("could not load counter state: {}", e);
            e
        })? {
            Some(value) => CounterState {
                value,
                persisted: true,
            },
            None => CounterState::new(0),
        };

        debug!("opened counter at {}", state.value);
        Ok(Self { store, state })
    }

    /// Last persisted counter state
    pub fn current(&self) -> CounterState {
        self.state
    }

    /// Persist `new_value` if it moves the counter forward.
    ///
    /// Fails with [`Error::StaleUpdate`] when `new_value` is not greater than
    /// the current value. The in-memory state only changes after the store
    /// committed.
    pub fn advance_to(&mut self, new_value: u64) -> Result<()> {
        if new_value <= self.state.value {
            warn!(
                "rejecting stale counter update to {} (current: {})",
                new_value, self.state.value
            );

            return Err(Error::StaleUpdate {
                current: self.state.value,
                requested: new_value,
            });
        }

        self.store.commit(new_value).map_err(|e| {
            error!("could not commit counter {}: {}", new_value, e);
            e
        })?;

        debug!("counter advanced {} -> {}", self.state.value, new_value);

        self.state = CounterState {
            value: new_value,
            persisted: true,
        };

        Ok(())
    }

    /// Underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Return the inner store
    pub fn into_inner(self) -> S {
        self.store
    }
}
