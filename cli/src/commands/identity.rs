//! Print the configured tag identity

use crate::terminal::{print_attr, STDOUT};
use clap::Parser;
use rfid_otp::{setting::SettingSource, Config, SecretStore};
use std::process::exit;
use termcolor::WriteColor;

/// The `identity` subcommand
#[derive(Debug, Parser)]
pub struct IdentityCmd {}

impl IdentityCmd {
    /// Run the `identity` subcommand
    pub fn run(&self, config: &Config) {
        let secrets = SecretStore::load(config).unwrap_or_else(|e| {
            status_err!("invalid tag identity: {}", e);
            exit(1);
        });

        let identity = secrets.identity();
        let sources = config.sources();

        {
            let mut s = STDOUT.lock();
            s.reset().unwrap();

            print_attr(
                &mut s,
                "device id",
                format!("{} ({})", identity.id, source(sources.id)),
            )
            .unwrap();
            print_attr(
                &mut s,
                "key length",
                format!("{} ({})", identity.secret.len(), source(sources.key_length)),
            )
            .unwrap();
            print_attr(
                &mut s,
                "digits",
                format!("{} ({})", config.digits(), source(sources.digits)),
            )
            .unwrap();
            print_attr(
                &mut s,
                "window",
                format!("{} ({})", config.window(), source(sources.window)),
            )
            .unwrap();
        }

        if sources.key == SettingSource::Default {
            status_warn!("tag uses the factory secret");
        }
    }
}

fn source(source: SettingSource) -> &'static str {
    match source {
        SettingSource::User => "environment",
        SettingSource::Admin => "config file",
        SettingSource::Default => "default",
    }
}
