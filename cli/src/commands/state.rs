//! Print the persisted counter

use crate::{
    commands::open_state,
    terminal::{print_attr, STDOUT},
};
use clap::Parser;
use rfid_otp::CounterStore;
use std::{path::Path, process::exit};
use termcolor::WriteColor;

// String to use for `None`
const NONE_STR: &str = "<none>";

/// The `state` subcommand
#[derive(Debug, Parser)]
pub struct StateCmd {}

impl StateCmd {
    /// Run the `state` subcommand
    pub fn run(&self, state: &Path) {
        let mut store = open_state(state);

        let value = store.load().unwrap_or_else(|e| {
            status_err!("couldn't read counter state: {}", e);
            exit(1);
        });

        let mut s = STDOUT.lock();
        s.reset().unwrap();

        print_attr(&mut s, "state file", state.display()).unwrap();
        match value {
            Some(counter) => print_attr(&mut s, "counter", counter).unwrap(),
            None => print_attr(&mut s, "counter", NONE_STR).unwrap(),
        }
    }
}
