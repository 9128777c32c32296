use tracing_subscriber::EnvFilter;

pub const LOG_FILTER_ENV: &str = "WEATHERGRAPH_LOG";
const DEFAULT_LOG_FILTER: &str = "warn";

/// Installs the stderr subscriber. Safe to call more than once; later calls
/// leave the first subscriber in place.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(resolve_filter())
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .try_init();
}

fn resolve_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_FILTER_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}
