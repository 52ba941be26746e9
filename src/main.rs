use anyhow::Result;
use car_watch::core::{self, Config};
use car_watch::notify::notifiers_from_config;
use car_watch::scanner::JsonFeedSource;
use car_watch::RunOrchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    core::logging::init_logging(&config.log_level);

    tracing::info!("🚗 Yad2 Car Watch starting...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Feed: {}", config.scraping.feed);

    let channels = config.enabled_channels();
    if channels.is_empty() {
        tracing::warn!("⚠️  No notification channels enabled, new listings will only be logged");
    } else {
        let names: Vec<String> = channels.iter().map(|c| c.to_string()).collect();
        tracing::info!("Notification channels: {}", names.join(", "));
    }

    let source = Box::new(JsonFeedSource::new(&config.scraping.feed));
    let notifiers = notifiers_from_config(&config)?;
    let orchestrator = RunOrchestrator::new(&config, source, notifiers);

    match std::env::args().nth(1).as_deref() {
        Some("watch") => {
            tracing::info!(
                "⏰ Checking every {} minutes",
                config.scraping.check_interval_minutes
            );
            orchestrator
                .run_forever(config.scraping.check_interval())
                .await;
            Ok(())
        }
        None | Some("once") => {
            let report = orchestrator.run_once().await?;
            tracing::info!("✅ Scrape completed successfully: {}", report.summary());
            Ok(())
        }
        Some(other) => Err(anyhow::anyhow!(
            "unknown mode `{}` (expected `once` or `watch`)",
            other
        )),
    }
}
