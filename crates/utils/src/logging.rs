//! Tracing bootstrap shared by the server binaries.

use strum_macros::{Display, EnumString};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Keeps the sentry client alive for the lifetime of the process.
#[must_use]
pub struct LoggingGuard {
    _sentry: Option<sentry::ClientInitGuard>,
}

impl LoggingGuard {
    pub fn sentry_enabled(&self) -> bool {
        self._sentry.is_some()
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_level`. A second call is a no-op, which keeps
/// tests that boot the server more than once happy.
pub fn init(
    default_level: &str,
    format: LogFormat,
    sentry_dsn: Option<&str>,
    environment: &str,
) -> LoggingGuard {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let parsed_dsn = sentry_dsn.map(str::parse::<sentry::types::Dsn>);
    let sentry_guard = match &parsed_dsn {
        Some(Ok(dsn)) => Some(sentry::init(sentry::ClientOptions {
            dsn: Some(dsn.clone()),
            release: sentry::release_name!(),
            environment: Some(environment.to_owned().into()),
            ..Default::default()
        })),
        _ => None,
    };
    let sentry_layer = sentry_guard.as_ref().map(|_| sentry_tracing::layer());

    let (text_layer, json_layer) = match format {
        LogFormat::Text => (Some(fmt::layer().with_target(false)), None),
        LogFormat::Json => (None, Some(fmt::layer().json().flatten_event(true))),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .with(sentry_layer)
        .try_init()
        .is_ok();

    if installed {
        if let Some(Err(e)) = parsed_dsn {
            tracing::warn!(error = %e, "SENTRY_DSN is invalid, error reporting disabled");
        }
    }

    LoggingGuard {
        _sentry: sentry_guard,
    }
}
