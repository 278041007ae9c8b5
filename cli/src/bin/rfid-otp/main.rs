//! `rfid-otp` command-line utility

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    unused_lifetimes,
    unused_qualifications
)]

use clap::Parser;
use rfid_otp_cli::commands::RfidOtpCli;

fn main() {
    RfidOtpCli::parse().run()
}
