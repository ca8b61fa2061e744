use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info,tokio_postgres=warn";

/// Install the global subscriber
///
/// `RUST_LOG` overrides the filter. `LOG_FORMAT=json` switches to one JSON
/// object per line for log shippers.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = fmt().with_env_filter(env_filter).with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
