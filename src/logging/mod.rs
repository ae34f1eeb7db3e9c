use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Installs the global subscriber with an `info` fallback filter. A second
/// call is ignored.
pub fn init_logging() {
    let _ = try_init_logging("info");
}

/// Installs the global subscriber. `RUST_LOG` wins over `fallback_filter`
/// when set. Fails if a subscriber is already installed.
pub fn try_init_logging(fallback_filter: &str) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let filter: EnvFilter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let formatting_layer = fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(true)
        .compact();

    let subscriber = Registry::default().with(filter).with(formatting_layer);

    tracing::subscriber::set_global_default(subscriber)
}
