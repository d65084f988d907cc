//! Logging initialization for the client.
//!
//! Everything goes to `~/.subreg/logs/client.jsonl` as JSON lines. Set
//! `SUBREG_LOG_STDERR=1` to mirror the stream on stderr while debugging.

use crate::Paths;

/// Initialize the logging system for `service_name`.
///
/// ```ignore
/// init_logging("cli", "info", &paths);
/// tracing::info!("subreg started");
/// ```
pub fn init_logging(service_name: &str, level: &str, paths: &Paths) {
    let also_stderr = std::env::var("SUBREG_LOG_STDERR")
        .map(|raw| matches!(raw.trim(), "1" | "true" | "yes"))
        .unwrap_or(false);

    observability::init_with_config(observability::LogConfig {
        service_name: service_name.into(),
        default_level: parse_level(level).to_string().to_lowercase(),
        log_path: Some(paths.client_log_file()),
        also_stderr,
    });
}

/// Parse a log level string into a tracing Level. Unknown names fall back to INFO.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_level_all_variants() {
        assert_eq!(parse_level("trace"), tracing::Level::TRACE);
        assert_eq!(parse_level("debug"), tracing::Level::DEBUG);
        assert_eq!(parse_level("info"), tracing::Level::INFO);
        assert_eq!(parse_level("warning"), tracing::Level::WARN);
        assert_eq!(parse_level("ERROR"), tracing::Level::ERROR);
    }

    #[test]
    fn parse_level_unknown_defaults_to_info() {
        assert_eq!(parse_level(""), tracing::Level::INFO);
        assert_eq!(parse_level("verbose"), tracing::Level::INFO);
    }
}
