//! Colored status lines

use lazy_static::lazy_static;
use std::{
    io::{self, Write},
    sync::Mutex,
};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, StandardStreamLock, WriteColor};

/// Print a success line: a green right-aligned label and a message
#[macro_export]
macro_rules! status_ok {
    ($label:expr, $msg:expr) => {
        $crate::terminal::print_status($crate::terminal::Level::Ok, $label, $msg)
    };
    ($label:expr, $fmt:expr, $($arg:tt)+) => {
        $crate::status_ok!($label, format!($fmt, $($arg)+))
    };
}

/// Print a warning line to stdout
#[macro_export]
macro_rules! status_warn {
    ($msg:expr) => {
        $crate::terminal::print_status($crate::terminal::Level::Warn, "warning:", $msg)
    };
    ($fmt:expr, $($arg:tt)+) => {
        $crate::status_warn!(format!($fmt, $($arg)+))
    };
}

/// Print an error line to stderr
#[macro_export]
macro_rules! status_err {
    ($msg:expr) => {
        $crate::terminal::print_status($crate::terminal::Level::Err, "error:", $msg)
    };
    ($fmt:expr, $($arg:tt)+) => {
        $crate::status_err!(format!($fmt, $($arg)+))
    };
}

lazy_static! {
    /// Color configuration
    static ref COLOR_CHOICE: Mutex<Option<ColorChoice>> = Mutex::new(None);

    /// Standard output
    pub static ref STDOUT: StandardStream = StandardStream::stdout(color_choice());

    /// Standard error
    pub static ref STDERR: StandardStream = StandardStream::stderr(color_choice());
}

/// Panics if colors were never configured.
fn color_choice() -> ColorChoice {
    COLOR_CHOICE
        .lock()
        .unwrap()
        .expect("terminal stream accessed before initialized!")
}

/// Configure colors once, before the first line is printed.
pub(super) fn set_color_choice(color_choice: ColorChoice) {
    let mut choice = COLOR_CHOICE.lock().unwrap();
    assert!(choice.is_none(), "terminal colors already configured!");
    *choice = Some(color_choice);
}

/// Severity of a status line
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Level {
    /// Completed operation, e.g. an accepted code
    Ok,

    /// Something the operator should look at
    Warn,

    /// Failed operation
    Err,
}

impl Level {
    fn color(self) -> Color {
        match self {
            Level::Ok => Color::Green,
            Level::Warn => Color::Yellow,
            Level::Err => Color::Red,
        }
    }

    fn stream(self) -> &'static StandardStream {
        match self {
            Level::Err => &*STDERR,
            Level::Ok | Level::Warn => &*STDOUT,
        }
    }
}

/// Print `label` in the color of `level`, followed by `msg`.
///
/// Success labels are right-aligned so consecutive lines line up.
pub fn print_status(level: Level, label: &str, msg: impl AsRef<str>) {
    let mut s = level.stream().lock();
    write_status(&mut s, level, label, msg.as_ref()).expect("error writing status line!")
}

fn write_status(
    s: &mut StandardStreamLock<'_>,
    level: Level,
    label: &str,
    msg: &str,
) -> io::Result<()> {
    s.reset()?;
    s.set_color(ColorSpec::new().set_fg(Some(level.color())).set_bold(true))?;

    match level {
        Level::Ok => write!(s, "{:>12}", label)?,
        Level::Warn | Level::Err => write!(s, "{}", label)?,
    }

    s.reset()?;
    writeln!(s, " {}", msg)?;
    s.flush()
}

/// Print a named attribute, e.g. of a tag identity
pub fn print_attr(
    stream: &mut StandardStreamLock<'_>,
    name: &str,
    value: impl ToString,
) -> io::Result<()> {
    stream.set_color(ColorSpec::new().set_bold(true))?;
    write!(stream, "{:>12}:", name)?;
    stream.reset()?;
    writeln!(stream, " {}", value.to_string())?;
    stream.flush()
}
