use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingSettings;

/// Filter from `RUST_LOG`, else the configured level, else `info`.
fn filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|e| {
            eprintln!(
                "mediashelf: invalid logging.level {:?}, using info: {e}",
                settings.level
            );
            EnvFilter::new("info")
        })
}

/// Install the stderr subscriber. Only the first call in a process has effect.
pub fn init_logging(settings: &LoggingSettings) {
    let _ = tracing_subscriber::registry()
        .with(filter(settings))
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
