use tracing_subscriber::{prelude::*, EnvFilter};

use crate::Environment;

/// Installs the global tracing subscriber.
///
/// - Production (`APP_ENV=production`): JSON lines without module targets.
/// - Development: compact human-readable output.
///
/// `RUST_LOG` overrides the default `info` filter. Later calls are no-ops,
/// which keeps tests and repeated initialization harmless.
pub fn init_tracing(environment: Environment) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if environment.is_production() {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init()
    };

    match result {
        Ok(()) => tracing::debug!(?environment, "tracing initialized"),
        Err(_) => tracing::debug!("tracing already initialized"),
    }
}
