//! Verify codes as a reader

use crate::commands::open_state;
use clap::Parser;
use rfid_otp::{Authenticator, Config};
use std::{path::Path, process::exit};

/// The `verify` subcommand
#[derive(Debug, Parser)]
pub struct VerifyCmd {
    /// Code presented by the tag
    pub code: String,
}

impl VerifyCmd {
    /// Run the `verify` subcommand
    pub fn run(&self, config: &Config, state: &Path) {
        let mut reader = Authenticator::new(config, open_state(state)).unwrap_or_else(|e| {
            status_err!("couldn't open reader: {}", e);
            exit(1);
        });

        match reader.authenticate(self.code.trim().as_bytes()) {
            Ok(result) => {
                status_ok!(
                    "Accepted",
                    "device {} at offset {} (counter now {})",
                    reader.identity().id,
                    result.offset,
                    result.counter
                );
            }
            Err(e) => {
                status_err!("rejected: {} [{}]", e, e.name());
                exit(1);
            }
        }
    }
}
