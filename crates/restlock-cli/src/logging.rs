use restlock_core::Config;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Install the stderr subscriber.
///
/// `RESTLOCK_LOG` wins over the `log_filter` config value. The config file
/// is only read here; a missing one is not created.
pub fn init() {
    let config = Config::read();
    let filter = EnvFilter::try_from_env("RESTLOCK_LOG").unwrap_or_else(|_| {
        let directive = match &config {
            Ok(Some(cfg)) => cfg.log_filter.as_str(),
            _ => DEFAULT_FILTER,
        };
        EnvFilter::new(directive)
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(e) = config {
        warn!(error = %e, "unusable config, logging with the default filter");
    }
}
