//! Commands of the CLI application

pub mod generate;
pub mod identity;
pub mod keygen;
pub mod state;
pub mod verify;

use self::{
    generate::GenerateCmd, identity::IdentityCmd, keygen::KeygenCmd, state::StateCmd,
    verify::VerifyCmd,
};
use crate::terminal;
use clap::{Parser, Subcommand};
use rfid_otp::{setting::DEFAULT_CONFIG_FILE, Config, FileNvm, SlotStore};
use std::{
    env,
    path::{Path, PathBuf},
    process::exit,
};
use termcolor::ColorChoice;

/// Default location of the counter state file
pub const DEFAULT_STATE_FILE: &str = "rfid-otp.state";

/// The `rfid-otp` CLI utility
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct RfidOtpCli {
    /// Tag configuration file
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Counter state file
    #[arg(short = 's', long = "state", default_value = DEFAULT_STATE_FILE)]
    pub state: PathBuf,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl RfidOtpCli {
    /// Run the underlying command type or print usage info and exit
    pub fn run(&self) {
        terminal::set_color_choice(ColorChoice::Auto);

        // Only show logs if `RUST_LOG` is set
        if env::var("RUST_LOG").is_ok() {
            env_logger::builder().format_timestamp(None).init();
        }

        self.command.run(self)
    }

    /// Load the tag configuration
    fn config(&self) -> Config {
        Config::load(&self.config).unwrap_or_else(|e| {
            status_err!("couldn't load {}: {}", self.config.display(), e);
            exit(1);
        })
    }
}

/// Subcommands of this application
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// `version` subcommand
    #[command(about = "display version information")]
    Version(VersionOpts),

    /// `identity` subcommand
    #[command(about = "show the configured tag identity")]
    Identity(IdentityCmd),

    /// `keygen` subcommand
    #[command(about = "generate a random shared secret")]
    Keygen(KeygenCmd),

    /// `generate` subcommand
    #[command(about = "issue the next code and advance the counter")]
    Generate(GenerateCmd),

    /// `verify` subcommand
    #[command(about = "verify a presented code")]
    Verify(VerifyCmd),

    /// `state` subcommand
    #[command(about = "show the persisted counter")]
    State(StateCmd),
}

impl Commands {
    /// Run the given command
    pub fn run(&self, cli: &RfidOtpCli) {
        match self {
            Commands::Version(version) => version.run(),
            Commands::Identity(identity) => identity.run(&cli.config()),
            Commands::Keygen(keygen) => keygen.run(),
            Commands::Generate(generate) => generate.run(&cli.config(), &cli.state),
            Commands::Verify(verify) => verify.run(&cli.config(), &cli.state),
            Commands::State(state) => state.run(&cli.state),
        }
    }
}

/// Version options
#[derive(Debug, Parser)]
pub struct VersionOpts {}

impl VersionOpts {
    /// Display version information
    pub fn run(&self) {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    }
}

/// Open the counter state file, exiting on failure
pub(crate) fn open_state(path: &Path) -> SlotStore<FileNvm> {
    FileNvm::open(path)
        .and_then(SlotStore::open)
        .unwrap_or_else(|e| {
            status_err!("couldn't open counter state {}: {}", path.display(), e);
            exit(1);
        })
}
