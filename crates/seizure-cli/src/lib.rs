//! Library side of the `seizure` command-line driver.
pub mod commands;
pub mod util;
