//! Tracing subscriber setup
//!
//! Installs a global `tracing` subscriber with an `EnvFilter` and either a
//! human-readable or a JSON formatter. Safe to call from several tests: only
//! the first call installs anything.

use std::sync::Once;

use authloop_domain::impl_str_enum_conversions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,authloop=debug";

/// Output format of the log subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl_str_enum_conversions!(LogFormat {
    Pretty => "pretty",
    Json => "json",
});

/// Install the global subscriber
///
/// Logs go to stderr so stdout stays free for command output.
pub fn init_tracing(format: LogFormat) {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let registry = tracing_subscriber::registry().with(filter);

        // try_init: a subscriber installed elsewhere (e.g. a test harness) wins
        let installed = match format {
            LogFormat::Pretty => {
                registry.with(fmt::layer().with_writer(std::io::stderr).with_target(false)).try_init()
            }
            LogFormat::Json => registry
                .with(fmt::layer().json().with_writer(std::io::stderr).with_current_span(false))
                .try_init(),
        };

        if installed.is_ok() {
            tracing::debug!(%format, "Tracing initialized");
        }
    });
}
