//! Process-wide tracing setup for the CLI and embedding hosts.

use tracing_subscriber::{fmt, EnvFilter};

const JSON_ENV: &str = "BEESPEND_LOG_JSON";

/// Install the global subscriber on stderr. `RUST_LOG` filters (default `info`);
/// `BEESPEND_LOG_JSON=1` switches to one JSON object per line. A second call is a no-op.
pub fn init_logging() {
    let builder = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr);

    let installed = if json_requested(std::env::var(JSON_ENV).ok().as_deref()) {
        builder.json().try_init()
    } else {
        builder.pretty().try_init()
    };
    if installed.is_ok() {
        tracing::debug!(json_env = JSON_ENV, "logging initialized");
    }
}

fn json_requested(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("1") | Some("true"))
}
