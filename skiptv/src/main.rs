use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use lounge_client::{LoungeClient, LoungeClientConfig};
use tokio::signal;
use tracing::{error, info, warn};

use skiptv::cache::{ChannelCache, SegmentCache};
use skiptv::config::{AppConfig, config_path};
use skiptv::logging;
use skiptv::orchestrator::DeviceOrchestrator;
use skiptv::providers::{
    ChannelLookup, SponsorBlockClient, ViewTracker, YouTubeDataClient, build_http_client,
};
use skiptv::segments::{ResolverParams, SegmentResolver};
use skiptv::session::{SessionDeps, SessionTiming};

#[derive(Parser, Debug)]
#[command(name = "skiptv", version, about = "Skip sponsor segments on YouTube TV screens")]
struct Args {
    /// Directory holding config.json
    #[arg(long, env = "SKIPTV_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Config file to use instead of <data-dir>/config.json (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Log filter directive, e.g. "skiptv=debug"
    #[arg(long, env = "SKIPTV_LOG")]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let path = config_path(&args.data_dir, args.config.as_deref());
    let config = AppConfig::load(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    logging::init(args.log_filter.as_deref(), args.debug || config.debug)?;

    let http = build_http_client()?;
    let sponsorblock = Arc::new(SponsorBlockClient::new(
        http.clone(),
        config.skip_categories.clone(),
    )?);

    let channels: Option<Arc<dyn ChannelLookup>> = if config.whitelist_enabled() {
        Some(Arc::new(YouTubeDataClient::new(http, config.apikey.clone())?))
    } else {
        if !config.channel_whitelist.is_empty() {
            warn!("Channel whitelist requires an API key, ignoring it");
        }
        None
    };

    let view_tracker: Option<Arc<dyn ViewTracker>> = config
        .skip_count_tracking
        .then(|| sponsorblock.clone() as Arc<dyn ViewTracker>);

    let resolver = Arc::new(SegmentResolver::new(ResolverParams {
        source: sponsorblock,
        channels,
        whitelist: config.whitelist(),
        segment_cache: Arc::new(SegmentCache::new()),
        channel_cache: Arc::new(ChannelCache::new()),
    }));

    let lounge = Arc::new(LoungeClient::new(LoungeClientConfig::with_name(
        config.join_name.clone(),
    ))?);

    let deps = SessionDeps {
        transport: lounge,
        resolver,
        view_tracker,
        policy: config.policy(),
        timing: SessionTiming::default(),
    };

    let orchestrator = DeviceOrchestrator::new(config.devices(), deps);
    orchestrator.start();
    info!(
        devices = orchestrator.device_count(),
        categories = ?config.skip_categories,
        "skiptv running"
    );

    shutdown_signal().await;
    orchestrator.shutdown().await;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
