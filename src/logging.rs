use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "MATCH_FORECAST_LOG";

static INIT: OnceCell<()> = OnceCell::new();

/// Installs the fmt subscriber once. Filter comes from `MATCH_FORECAST_LOG`.
pub fn init_logging() {
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new("match_forecast=info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .try_init();
    });
}
