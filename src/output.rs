//! Colored terminal messages.
//!
//! The backend only talks to the user during biometric setup; those
//! messages go to stderr so stdout stays clean for callers.

use console::style;

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    eprintln!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    eprintln!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}
