use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;
use xior_watch::config::FetcherKind;
use xior_watch::notify::DesktopNotifier;
use xior_watch::scheduler::run_forever;
use xior_watch::scrapers::{ChromeFetcher, DebugSink, DirectorySink, HttpFetcher, NoopSink, PageFetcher};
use xior_watch::{store, Monitor, MonitorConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = MonitorConfig::from_env();

    info!("🏠 Xior Watch - {} student rooms", config.city);
    info!("==========================================");
    info!("Watching {} for rooms starting from {}", config.city, config.threshold.format("%d-%m-%Y"));

    // Without a page fetcher there is nothing to monitor
    let fetcher: Box<dyn PageFetcher> = match config.fetcher {
        FetcherKind::Chrome => Box::new(ChromeFetcher::launch(&config)?),
        FetcherKind::Http => Box::new(HttpFetcher::new(&config)?),
    };
    info!("Using {} fetcher", fetcher.fetcher_name());

    store::ensure_schema(&config.db_path)
        .with_context(|| format!("Failed to initialize {}", config.db_path.display()))?;

    let sink: Box<dyn DebugSink> = match &config.debug_dir {
        Some(dir) => {
            info!("Saving page snapshots to {}", dir.display());
            Box::new(DirectorySink::new(dir))
        }
        None => Box::new(NoopSink),
    };
    let notifier = DesktopNotifier::new("Housing Checker");

    let monitor = Monitor::new(&config, fetcher.as_ref(), &notifier, sink.as_ref());
    let monitor = &monitor;

    // run_forever polls this before the first check, so ctrl-c is caught from the start
    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    let runs = run_forever(config.check_period, config.poll_interval, shutdown, move || {
        monitor.run_once()
    })
    .await;

    info!("Stopped after {} runs", runs);
    Ok(())
}
