//! Log output for analyzer runs.
//!
//! `PHZ_LOG` selects what is logged, with the same syntax as `RUST_LOG`
//! (which it falls back to). `PHZ_LOG_FORMAT` selects the layout:
//!
//! - `text` (default): flat `tracing-subscriber` lines
//! - `tree`: spans nested by indentation, via `tracing-tree`
//! - `json`: one JSON object per event
//!
//! ```bash
//! PHZ_LOG=debug PHZ_LOG_FORMAT=tree phz-host src/
//! PHZ_LOG="phz_checker::conditions=trace" phz-host src/
//! ```
//!
//! Nothing is installed unless one of the filter variables is set.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

const FILTER_VAR: &str = "PHZ_LOG";
const FORMAT_VAR: &str = "PHZ_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Tree,
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> LogFormat {
        match value.trim().to_ascii_lowercase().as_str() {
            "tree" => LogFormat::Tree,
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }

    fn from_env() -> LogFormat {
        LogFormat::parse(&std::env::var(FORMAT_VAR).unwrap_or_default())
    }
}

fn build_filter() -> EnvFilter {
    match std::env::var(FILTER_VAR) {
        Ok(directives) => EnvFilter::builder().parse_lossy(directives),
        Err(_) => EnvFilter::from_default_env(),
    }
}

/// Install the global subscriber, writing to stderr.
///
/// Returns `false` when neither `PHZ_LOG` nor `RUST_LOG` is set, or when a
/// subscriber was already installed.
pub fn init_tracing() -> bool {
    if std::env::var_os(FILTER_VAR).is_none() && std::env::var_os("RUST_LOG").is_none() {
        return false;
    }

    let filter = build_filter();
    let installed = match LogFormat::from_env() {
        LogFormat::Tree => {
            let layer = tracing_tree::HierarchicalLayer::default()
                .with_indent_amount(2)
                .with_indent_lines(true)
                .with_deferred_spans(true)
                .with_span_retrace(true)
                .with_targets(true);
            Registry::default().with(filter).with(layer).try_init()
        }
        LogFormat::Json => {
            let layer = fmt::layer().json().with_writer(std::io::stderr);
            Registry::default().with(filter).with(layer).try_init()
        }
        LogFormat::Text => {
            let layer = fmt::layer().with_writer(std::io::stderr);
            Registry::default().with(filter).with(layer).try_init()
        }
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("tree"), LogFormat::Tree);
        assert_eq!(LogFormat::parse(" JSON "), LogFormat::Json);
        assert_eq!(LogFormat::parse("text"), LogFormat::Text);
        assert_eq!(LogFormat::parse(""), LogFormat::Text);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Text);
    }
}
