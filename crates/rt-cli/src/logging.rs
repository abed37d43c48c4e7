//! Log level selection

/// Filter directive for a verbosity level.
///
/// The more verbose of the `-v` count and the configured `log_level` wins.
pub fn level_for(verbose: u8, log_level: u8) -> &'static str {
    match verbose.max(log_level) {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
