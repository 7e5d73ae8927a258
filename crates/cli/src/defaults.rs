//! Shared default values for the command line.

pub const CONFIG_FILE: &str = "pfix.json";
pub const OUTPUT_DB: &str = "pfix.db";

/// Default log filter per `-v` count.
pub fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}
