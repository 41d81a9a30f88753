//! Subscriber installation for hosts that embed the engine.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Name of the environment variable holding the log filter.
pub const LOG_ENV_VAR: &str = "CXXGRAPH_LOG";

/// Directives used when `CXXGRAPH_LOG` is unset, blank or unparsable.
/// Targets are crate paths, so both engine crates are named.
pub const DEFAULT_FILTER: &str = "cxxgraph_core=info,cxxgraph_analysis=info";

/// Builds a filter from explicit directives such as
/// `cxxgraph_analysis::extraction=debug,cxxgraph_analysis::resolution=trace`.
/// Falls back to [`DEFAULT_FILTER`] when `directives` is missing or invalid.
pub fn filter_from(directives: Option<&str>) -> EnvFilter {
    match directives.map(str::trim).filter(|d| !d.is_empty()) {
        Some(directives) => {
            EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
        }
        None => EnvFilter::new(DEFAULT_FILTER),
    }
}

/// Filter for the current process, read from `CXXGRAPH_LOG`.
pub fn env_filter() -> EnvFilter {
    filter_from(std::env::var(LOG_ENV_VAR).ok().as_deref())
}

/// Installs a global fmt subscriber filtered by [`env_filter`].
///
/// The library never calls this itself. Calling it more than once is a
/// no-op, and a subscriber installed earlier by the host is left alone.
pub fn init_tracing() {
    INIT.call_once(|| {
        let installed = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(env_filter())
            .try_init();

        if installed.is_err() {
            tracing::debug!("global tracing subscriber already set");
        }
    });
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::filter::LevelFilter;

    use super::*;

    #[test]
    fn blank_directives_use_default() {
        assert_eq!(filter_from(None).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(filter_from(Some("  ")).max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn per_module_directives_raise_the_level() {
        let filter = filter_from(Some("cxxgraph_analysis::resolution=trace,cxxgraph_core=warn"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
    }
}
