//! `tracing` subscriber setup.
//!
//! Logs go to stderr so stdout stays free for `--json` summaries. `RUST_LOG`
//! overrides the default filter; `RUST_LOG_FORMAT=json` switches to one JSON
//! object per event.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "fgs_evidence=info";
pub const FORMAT_ENV: &str = "RUST_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

impl LogFormat {
    /// Anything other than a case-insensitive `json` is human output.
    #[must_use]
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value {
            Some(raw) if raw.trim().eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Human,
        }
    }
}

/// Filter used when `RUST_LOG` is unset or unparsable.
#[must_use]
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "fgs_evidence=debug"
    } else {
        DEFAULT_FILTER
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    let format = LogFormat::from_env_value(std::env::var(FORMAT_ENV).ok().as_deref());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Json => {
            let _ = subscriber.json().try_init();
        }
        LogFormat::Human => {
            let _ = subscriber.try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LogFormat, default_filter, init};

    #[test]
    fn init_twice_is_harmless() {
        init(false);
        init(true);
    }

    #[test]
    fn format_selection() {
        assert_eq!(LogFormat::from_env_value(None), LogFormat::Human);
        assert_eq!(LogFormat::from_env_value(Some("JSON")), LogFormat::Json);
        assert_eq!(LogFormat::from_env_value(Some(" json ")), LogFormat::Json);
        assert_eq!(LogFormat::from_env_value(Some("pretty")), LogFormat::Human);
    }

    #[test]
    fn verbose_lowers_default_level() {
        assert_eq!(default_filter(false), "fgs_evidence=info");
        assert_eq!(default_filter(true), "fgs_evidence=debug");
        assert!(tracing_subscriber::EnvFilter::try_new(default_filter(true)).is_ok());
    }
}
