use chrono::Utc;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

use super::report::RunReport;
use crate::core::{Config, RunError};
use crate::listing::{ListingRecord, RawListing, RecordBuilder};
use crate::monitoring::{filter_new, truncate_batch, SeenStore};
use crate::notify::{compose, ChannelKind, Notifier};
use crate::scanner::ListingSource;

/// Sequences one check: load seen-set, acquire, build, filter, persist,
/// compose, dispatch. Owns its collaborators for its whole lifetime.
pub struct RunOrchestrator {
    source: Box<dyn ListingSource>,
    notifiers: Vec<Box<dyn Notifier>>,
    store: SeenStore,
    builder: RecordBuilder,
    max_results_per_check: usize,
    timeout: Duration,
    seen_warn_threshold: usize,
}

impl RunOrchestrator {
    pub fn new(
        config: &Config,
        source: Box<dyn ListingSource>,
        notifiers: Vec<Box<dyn Notifier>>,
    ) -> Self {
        Self {
            source,
            notifiers,
            store: SeenStore::new(config.scraping.seen_store_path.clone()),
            builder: RecordBuilder::default(),
            max_results_per_check: config.scraping.max_results_per_check,
            timeout: config.scraping.timeout(),
            seen_warn_threshold: config.scraping.seen_warn_threshold,
        }
    }

    pub fn with_builder(mut self, builder: RecordBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn channels(&self) -> Vec<ChannelKind> {
        self.notifiers.iter().map(|n| n.channel()).collect()
    }

    pub async fn run_once(&self) -> Result<RunReport, RunError> {
        let run_id = Uuid::new_v4();
        self.execute(run_id)
            .instrument(tracing::info_span!("run", %run_id))
            .await
    }

    /// Runs checks back to back; a check never starts before the previous
    /// one has finished.
    pub async fn run_forever(&self, every: Duration) {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match self.run_once().await {
                Ok(report) => tracing::info!("✅ Check completed: {}", report.summary()),
                Err(e) => tracing::error!("❌ Check failed: {}", e),
            }
        }
    }

    async fn execute(&self, run_id: Uuid) -> Result<RunReport, RunError> {
        let mut report = RunReport::new(run_id);
        let mut state = self.store.load().await.map_err(RunError::Load)?;

        // Nothing below mutates state until the whole batch is in hand.
        let raw = match tokio::time::timeout(self.timeout, self.source.fetch()).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return Err(RunError::Acquisition(e)),
            Err(_) => {
                return Err(RunError::Timeout {
                    minutes: self.timeout.as_secs() / 60,
                })
            }
        };
        report.acquired = raw.len();

        let raw = truncate_batch(raw, self.max_results_per_check);
        report.considered = raw.len();

        let records = self.build_records(&raw, &mut report);
        let new_records = filter_new(&mut state, records);
        report.new_ids = new_records.iter().map(|r| r.id().to_string()).collect();

        state.record_check(Utc::now());
        if state.len() > self.seen_warn_threshold {
            tracing::warn!(
                "⚠️  Seen-set holds {} ids (threshold {}); it is never pruned",
                state.len(),
                self.seen_warn_threshold
            );
        }
        self.store.save(&state).await.map_err(|e| {
            tracing::error!("❌ Could not persist seen-set, next run will re-notify: {}", e);
            RunError::Persistence(e)
        })?;

        if new_records.is_empty() {
            tracing::info!("😴 No new cars found");
        } else {
            tracing::info!("🚗 Found {} new cars!", new_records.len());
            self.dispatch(&new_records, &mut report).await;
        }

        report.finished_at = Utc::now();
        Ok(report)
    }

    fn build_records(&self, raw: &[RawListing], report: &mut RunReport) -> Vec<ListingRecord> {
        let mut records = Vec::with_capacity(raw.len());
        for (position, listing) in raw.iter().enumerate() {
            match self.builder.build(listing) {
                Ok(outcome) => {
                    if outcome.is_degraded() {
                        let reasons: Vec<String> = outcome
                            .degraded
                            .iter()
                            .map(|(field, reason)| format!("{}={}", field, reason))
                            .collect();
                        tracing::debug!(
                            "Listing {} built with defaults: {}",
                            outcome.record.id(),
                            reasons.join(", ")
                        );
                    }
                    records.push(outcome.record);
                }
                Err(e) => {
                    tracing::warn!("Dropping listing #{}: {}", position + 1, e);
                    report.rejected += 1;
                }
            }
        }
        records
    }

    /// Each channel is attempted regardless of the others' outcome.
    async fn dispatch(&self, new_records: &[ListingRecord], report: &mut RunReport) {
        let notifications = compose(new_records, &self.channels());

        for (notifier, notification) in self.notifiers.iter().zip(notifications.iter()) {
            let channel = notifier.channel();
            match notifier.send(notification).await {
                Ok(()) => report.notified.push(channel),
                Err(e) => {
                    tracing::error!("❌ Failed to send {} notification: {:#}", channel, e);
                    report.failed.push((channel, format!("{:#}", e)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ScrapingConfig;
    use crate::notify::MockNotifier;
    use crate::scanner::feed::MockListingSource;
    use std::path::PathBuf;

    fn config(store_path: PathBuf) -> Config {
        Config {
            scraping: ScrapingConfig {
                feed: "unused.json".to_string(),
                seen_store_path: store_path,
                max_results_per_check: 20,
                ..Default::default()
            },
            email: Default::default(),
            whatsapp: Default::default(),
            log_level: "info".to_string(),
        }
    }

    fn scratch_store() -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("car-watch-run-{}", uuid::Uuid::new_v4()));
        let path = dir.join("seen_cars.json");
        (dir, path)
    }

    fn raw(id: &str, model: &str) -> RawListing {
        RawListing::default()
            .with_model(model)
            .with_price("45,000")
            .with_link(&format!("https://www.yad2.co.il/item/{}?opened-from=feed", id))
    }

    fn source_returning(batch: Vec<RawListing>) -> Box<dyn ListingSource> {
        let mut source = MockListingSource::new();
        source.expect_fetch().returning(move || Ok(batch.clone()));
        Box::new(source)
    }

    fn notifier(channel: ChannelKind, expected_sends: usize, succeed: bool) -> Box<dyn Notifier> {
        let mut notifier = MockNotifier::new();
        notifier.expect_channel().return_const(channel);
        notifier
            .expect_send()
            .times(expected_sends)
            .returning(move |_| {
                if succeed {
                    Ok(())
                } else {
                    Err(anyhow::anyhow!("transport down"))
                }
            });
        Box::new(notifier)
    }

    #[tokio::test]
    async fn test_three_new_listings_one_notification_per_channel() {
        let (dir, path) = scratch_store();
        let batch = vec![raw("a1", "Peugeot 3008"), raw("b2", "Ford Focus"), raw("c3", "Suzuki Crossover")];

        let mut email = MockNotifier::new();
        email.expect_channel().return_const(ChannelKind::Email);
        email
            .expect_send()
            .times(1)
            .withf(|n| n.listing_count == 3 && n.subject == "🚗 3 New Cars Found on Yad2!")
            .returning(|_| Ok(()));

        let orchestrator = RunOrchestrator::new(
            &config(path.clone()),
            source_returning(batch),
            vec![Box::new(email), notifier(ChannelKind::WhatsApp, 1, true)],
        );

        let report = orchestrator.run_once().await.unwrap();
        assert_eq!(report.new_ids, vec!["a1", "b2", "c3"]);
        assert_eq!(report.notified, vec![ChannelKind::Email, ChannelKind::WhatsApp]);

        let state = SeenStore::new(&path).load().await.unwrap();
        assert_eq!(state.len(), 3);
        assert!(state.last_check().is_some());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_second_run_sends_nothing() {
        let (dir, path) = scratch_store();
        let batch = vec![raw("a1", "Peugeot 3008"), raw("b2", "Ford Focus")];

        let first = RunOrchestrator::new(
            &config(path.clone()),
            source_returning(batch.clone()),
            vec![notifier(ChannelKind::Email, 1, true)],
        );
        assert_eq!(first.run_once().await.unwrap().new_ids.len(), 2);

        let second = RunOrchestrator::new(
            &config(path.clone()),
            source_returning(batch),
            vec![notifier(ChannelKind::Email, 0, true)],
        );
        let report = second.run_once().await.unwrap();
        assert!(report.new_ids.is_empty());
        assert!(report.notified.is_empty());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_failed_channel_does_not_block_other_or_state() {
        let (dir, path) = scratch_store();

        let orchestrator = RunOrchestrator::new(
            &config(path.clone()),
            source_returning(vec![raw("xyz789", "Ford Focus")]),
            vec![
                notifier(ChannelKind::Email, 1, false),
                notifier(ChannelKind::WhatsApp, 1, true),
            ],
        );

        let report = orchestrator.run_once().await.unwrap();
        assert_eq!(report.notified, vec![ChannelKind::WhatsApp]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, ChannelKind::Email);

        // the listing stays seen even though email failed
        let state = SeenStore::new(&path).load().await.unwrap();
        assert!(state.contains("xyz789"));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_acquisition_failure_has_no_side_effects() {
        let (dir, path) = scratch_store();

        let mut source = MockListingSource::new();
        source
            .expect_fetch()
            .returning(|| Err(anyhow::anyhow!("connection reset")));

        let orchestrator = RunOrchestrator::new(
            &config(path.clone()),
            Box::new(source),
            vec![notifier(ChannelKind::Email, 0, true)],
        );

        let result = orchestrator.run_once().await;
        assert!(matches!(result, Err(RunError::Acquisition(_))));
        assert!(!path.exists());

        let _ = std::fs::remove_dir_all(dir);
    }

    struct StallingSource;

    #[async_trait::async_trait]
    impl ListingSource for StallingSource {
        async fn fetch(&self) -> anyhow::Result<Vec<RawListing>> {
            tokio::time::sleep(Duration::from_secs(60 * 60)).await;
            Ok(vec![raw("a1", "Peugeot 3008")])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquisition_timeout_has_no_side_effects() {
        let (dir, path) = scratch_store();

        let orchestrator = RunOrchestrator::new(
            &config(path.clone()),
            Box::new(StallingSource),
            vec![notifier(ChannelKind::Email, 0, true)],
        );

        let result = orchestrator.run_once().await;
        assert!(matches!(result, Err(RunError::Timeout { minutes: 3 })));
        assert!(!path.exists());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_cap_and_rejected_listings() {
        let (dir, path) = scratch_store();
        let mut cfg = config(path.clone());
        cfg.scraping.max_results_per_check = 3;

        let batch = vec![
            raw("a1", "Peugeot 3008"),
            RawListing::default().with_year("2019"),
            raw("a1", "Peugeot 3008"),
            raw("d4", "Ford Focus"),
        ];

        let orchestrator = RunOrchestrator::new(
            &cfg,
            source_returning(batch),
            vec![notifier(ChannelKind::Email, 1, true)],
        );

        let report = orchestrator.run_once().await.unwrap();
        assert_eq!(report.acquired, 4);
        assert_eq!(report.considered, 3);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.new_ids, vec!["a1"]);

        let _ = std::fs::remove_dir_all(dir);
    }
}
