//! Tracing setup for the `notepad` binary.
//!
//! Levels come from the `[logging]` settings table, keyed by module path
//! (`"notepad_sync::sync" = "debug"`). A set `RUST_LOG` replaces the table
//! entirely. Output goes to stderr so command output on stdout stays clean.

use std::sync::Once;

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Wall-clock time of day with milliseconds.
struct ClockTime;

impl FormatTime for ClockTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// `default,module=level,...` with modules in a stable order.
fn filter_directives(config: &LoggingConfig) -> String {
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();

    std::iter::once(config.default.clone())
        .chain(
            modules
                .into_iter()
                .map(|(module, level)| format!("{module}={level}")),
        )
        .collect::<Vec<_>>()
        .join(",")
}

fn build_filter(config: &LoggingConfig, rust_log: Option<&str>) -> EnvFilter {
    match rust_log {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::new(filter_directives(config)),
    }
}

/// Install the global subscriber. Later calls are no-ops, and a subscriber
/// installed elsewhere (e.g. by a test harness) is left in place.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let rust_log = std::env::var("RUST_LOG").ok();
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_timer(ClockTime)
            .with_target(true)
            .with_filter(build_filter(config, rust_log.as_deref()));

        let _ = tracing_subscriber::registry().with(layer).try_init();
    });
}

pub fn init() {
    init_with_config(&LoggingConfig::default());
}

/// Info-level event tagged with a `component` field.
///
/// ```ignore
/// log_event!("sync", "setup", "{} roots", roots.len());
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:expr, $event:expr) => {
        tracing::info!(component = $component, "{}", $event)
    };
    ($component:expr, $event:expr, $($arg:tt)+) => {
        tracing::info!(component = $component, "{}: {}", $event, format_args!($($arg)+))
    };
}

/// Debug-level counterpart of [`log_event!`].
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $event:expr) => {
        tracing::debug!(component = $component, "{}", $event)
    };
    ($component:expr, $event:expr, $($arg:tt)+) => {
        tracing::debug!(component = $component, "{}: {}", $event, format_args!($($arg)+))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(default: &str, modules: &[(&str, &str)]) -> LoggingConfig {
        LoggingConfig {
            default: default.to_string(),
            modules: modules
                .iter()
                .map(|(m, l)| (m.to_string(), l.to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn test_filter_directives() {
        let config = config(
            "info",
            &[("notepad_sync::sync", "trace"), ("notepad_sync::cli", "debug")],
        );
        assert_eq!(
            filter_directives(&config),
            "info,notepad_sync::cli=debug,notepad_sync::sync=trace"
        );
        assert_eq!(filter_directives(&self::config("warn", &[])), "warn");
    }

    #[test]
    fn test_rust_log_replaces_config() {
        let config = config("warn", &[("notepad_sync::sync", "trace")]);
        assert_eq!(
            build_filter(&config, Some("error")).to_string(),
            EnvFilter::new("error").to_string()
        );
        assert_eq!(
            build_filter(&config, None).to_string(),
            EnvFilter::new("warn,notepad_sync::sync=trace").to_string()
        );
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init();
        init_with_config(&config("debug", &[]));
        log_event!("test", "logged", "{} and {}", 1, 2);
        debug_event!("test", "plain");
    }
}
