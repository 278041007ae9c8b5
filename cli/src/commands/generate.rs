//! Issue codes as a tag

use crate::commands::open_state;
use clap::Parser;
use rfid_otp::{Config, Token};
use std::{path::Path, process::exit};

/// The `generate` subcommand
#[derive(Debug, Parser)]
pub struct GenerateCmd {
    /// Print only the code
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl GenerateCmd {
    /// Run the `generate` subcommand
    pub fn run(&self, config: &Config, state: &Path) {
        let mut token = Token::new(config, open_state(state)).unwrap_or_else(|e| {
            status_err!("couldn't open tag: {}", e);
            exit(1);
        });

        let issued = token.next_code().unwrap_or_else(|e| {
            status_err!("couldn't issue code: {}", e);
            exit(1);
        });

        if self.quiet {
            println!("{}", issued.code);
        } else {
            status_ok!("Issued", "{} (counter {})", issued.code, issued.counter);
        }
    }
}
