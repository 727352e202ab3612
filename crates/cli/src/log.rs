//! Logging for the `richmark` binary. Output goes to stderr so it never mixes
//! with converted documents on stdout.
//!
//! The filter comes from `RICHMARK_LOG`, then `RUST_LOG`, and otherwise
//! defaults to `warn` globally and `info` for the richmark crates.

use std::env;

use tracing_subscriber::{EnvFilter, fmt};

const CRATES: [&str; 4] = [
    "richmark_core",
    "richmark_markdown",
    "richmark_email",
    "richmark_cli",
];

/// Installs the global subscriber. Calling it again is harmless.
pub fn init() {
    let _ = fmt()
        .with_env_filter(create_filter())
        .with_writer(std::io::stderr)
        .try_init();
}

fn create_filter() -> EnvFilter {
    if let Ok(level) = env::var("RICHMARK_LOG") {
        return EnvFilter::new(expand_richmark_log(&level));
    }
    if let Ok(rust_log) = env::var("RUST_LOG") {
        return EnvFilter::new(rust_log);
    }
    EnvFilter::new(expand_richmark_log("info"))
}

/// `RICHMARK_LOG=debug` applies the level to every richmark crate; anything
/// with directive syntax is used as is.
pub fn expand_richmark_log(value: &str) -> String {
    if value.contains(['=', ':', ',']) {
        return value.to_string();
    }
    let mut filter = String::from("warn");
    for krate in CRATES {
        filter.push_str(&format!(",{krate}={value}"));
    }
    filter
}
