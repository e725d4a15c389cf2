use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Installs the global subscriber once. An invalid filter directive degrades
/// to `info` and is reported through the subscriber it failed to configure.
pub fn init_tracing(filter: &str) {
    let (env_filter, rejected) = match EnvFilter::try_new(filter) {
        Ok(env_filter) => (env_filter, None),
        Err(err) => (EnvFilter::new("info"), Some(err)),
    };
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    if Registry::default()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        return;
    }
    if let Some(err) = rejected {
        tracing::warn!(filter, error = %err, "invalid RUST_LOG filter; using info");
    }
}
