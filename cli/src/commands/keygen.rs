//! Generate a shared secret for provisioning

use clap::Parser;
use rfid_otp::Secret;
use std::process::exit;

/// Default length of generated secrets: one SHA-1 block output
pub const DEFAULT_SECRET_LENGTH: usize = 20;

/// The `keygen` subcommand
#[derive(Debug, Parser)]
pub struct KeygenCmd {
    /// Secret length in bytes
    #[arg(short = 'l', long = "length", default_value_t = DEFAULT_SECRET_LENGTH)]
    pub length: usize,
}

impl KeygenCmd {
    /// Run the `keygen` subcommand
    pub fn run(&self) {
        let secret = Secret::generate(self.length).unwrap_or_else(|e| {
            status_err!("couldn't generate secret: {}", e);
            exit(1);
        });

        println!("KEY = hex:{}", hex::lower::encode_string(secret.expose()));
        println!("KEY_LENGTH = {}", secret.len());
    }
}
