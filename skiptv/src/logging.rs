//! Console logging with local timezone timestamps.

use chrono::Local;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::{Error, Result};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "skiptv=info,lounge_client=info";

/// Filter used when debug logging is requested.
pub const DEBUG_LOG_FILTER: &str = "skiptv=debug,lounge_client=debug";

/// Timer that formats timestamps in the local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Pick the filter directive: an explicit filter wins, then debug mode,
/// then `RUST_LOG`, then the default.
fn build_filter(directive: Option<&str>, debug: bool) -> Result<EnvFilter> {
    if let Some(directive) = directive {
        return EnvFilter::try_new(directive)
            .map_err(|e| Error::config(format!("Invalid log filter '{directive}': {e}")));
    }
    if debug {
        return Ok(EnvFilter::new(DEBUG_LOG_FILTER));
    }
    Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
}

/// Install the global subscriber.
pub fn init(directive: Option<&str>, debug: bool) -> Result<()> {
    let filter = build_filter(directive, debug)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer))
        .try_init()
        .map_err(|e| Error::Other(format!("Failed to set global default subscriber: {e}")))?;

    Ok(())
}
