//! Log output for the CLI.
//!
//! Logs go to stderr so stdout stays usable in pipes and with `--json`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Level used when neither the config nor the command line picks one.
const DEFAULT_LEVEL: &str = "warn";

/// Resolve the filter directive. `RUST_LOG`, when set, wins over all of these.
pub fn level_for(configured: Option<&str>, verbose: u8, quiet: bool) -> String {
    if quiet {
        return "error".to_string();
    }
    match verbose {
        0 => configured
            .map(str::trim)
            .filter(|level| !level.is_empty())
            .unwrap_or(DEFAULT_LEVEL)
            .to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(level: &str, ansi: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(ansi),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_wins() {
        assert_eq!(level_for(Some("debug"), 2, true), "error");
    }

    #[test]
    fn test_verbose_overrides_config() {
        assert_eq!(level_for(Some("info"), 1, false), "debug");
        assert_eq!(level_for(Some("info"), 3, false), "trace");
    }

    #[test]
    fn test_config_then_default() {
        assert_eq!(level_for(Some("info"), 0, false), "info");
        assert_eq!(level_for(Some("  "), 0, false), "warn");
        assert_eq!(level_for(None, 0, false), "warn");
    }
}
