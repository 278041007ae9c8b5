#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod authenticator;
pub mod config;
pub mod counter;
mod error;
pub mod identity;
pub mod nvm;
pub mod otp;
pub mod setting;
pub mod token;
pub mod verify;

pub use crate::{
    authenticator::Authenticator,
    config::Config,
    counter::{CounterKeeper, CounterState, CounterStore, MemoryStore},
    error::{ConfigError, Error, Result},
    identity::{DeviceId, DeviceIdentity, Secret, SecretStore},
    nvm::{FileNvm, MemoryNvm, Nvm, SlotStore},
    otp::{derive, Digits, OtpCode},
    token::{Issued, Token},
    verify::{Authenticated, VerificationWindow, Verifier, DEFAULT_WINDOW, MAX_WINDOW},
};
