use anyhow::Result;
use classifieds_watch::notify::{self, Notifier, StdoutNotifier, TelegramNotifier};
use classifieds_watch::scrapers::ChromePageSource;
use classifieds_watch::{Config, Pipeline};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "CLASSIFIEDS_WATCH_CONFIG";

fn config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .unwrap_or_else(|| "watch.toml".to_string())
        .into()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = config_path();
    info!("🔎 Classifieds Watch - loading {}", path.display());
    let config = Config::load(&path)?;
    info!("{} searches configured", config.searches.len());

    let notifier: Box<dyn Notifier> = match TelegramNotifier::from_env()? {
        Some(telegram) => Box::new(telegram),
        None => {
            info!("TELEGRAM_BOT_TOKEN not set, printing report to stdout");
            Box::new(StdoutNotifier)
        }
    };

    let source = match ChromePageSource::new(config.browser.clone()) {
        Ok(source) => source,
        Err(e) => {
            error!("Browser unavailable: {:#}", e);
            let message = format!("[BOT] Browser non avviato, nessuna ricerca eseguita: {:#}", e);
            if let Err(send_err) = notifier.send(&message).await {
                error!("Could not report browser failure: {:#}", send_err);
            }
            return Err(e);
        }
    };

    let pipeline = Pipeline::new(&source, &config.site, &config.browser);
    let report = pipeline.run(&config.searches);

    for stats in &report.stats {
        info!(
            "{}: {} listings ({} network / {} structured / {} dom), {} new",
            stats.search, stats.merged, stats.network, stats.structured, stats.dom, stats.matched
        );
        for (reason, count) in &stats.rejected {
            info!("   {} rejected: {}", count, reason);
        }
    }

    notify::deliver(notifier.as_ref(), &report).await;

    info!(
        "✅ Done in {}s: {} new matches, {} failed searches",
        (report.finished_at - report.started_at).num_seconds(),
        report.new_match_count(),
        report.failures.len()
    );

    Ok(())
}
