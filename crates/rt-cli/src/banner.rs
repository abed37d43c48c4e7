//! Startup banner

use rt_core::config::TailConfig;
use rt_core::console::{paint, Tint};

const TITLE: &str = "remote-tail";
const SEPARATOR: &str = "-------------------------------------------";

/// One `user@host:tail_file` line per configured server, in name order
pub fn server_lines(config: &TailConfig) -> Vec<String> {
    config
        .servers
        .values()
        .map(|server| {
            format!(
                "{}@{}:{}",
                server.user,
                server.hostname,
                config.tail_file_for(server)
            )
        })
        .collect()
}

/// Full banner, colored for the terminal
pub fn render(config: &TailConfig) -> String {
    let mut out = String::new();
    out.push_str(&paint(Tint::Magenta, TITLE));
    out.push('\n');
    out.push_str(&paint(Tint::Magenta, SEPARATOR));
    out.push('\n');
    for line in server_lines(config) {
        out.push_str(&paint(Tint::Magenta, &line));
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&paint(Tint::Cyan, SEPARATOR));
    out.push('\n');
    out
}

/// Header printed before the usage text
pub fn usage_header() -> String {
    format!("{}\n{}\n", paint(Tint::Magenta, TITLE), paint(Tint::Magenta, SEPARATOR))
}
