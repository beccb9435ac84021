//! Packet feed: an append-only display log filled by a recurring poll.
//!
//! Each poll cycle appends whatever `GET /api/packets` returns. Records are
//! never deduplicated or pruned by the feed (only the operator's
//! [`PacketFeed::clear`] empties it), so repeated ids stay separate rows.
//!
//! The poll timer runs on a fixed interval. A cycle that fires while the
//! previous fetch is still in flight is skipped, so fetches never overlap.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::core::directory::CountryDirectory;
use crate::core::packet::{PacketRecord, PacketRow};
use crate::remote::PacketSource;

/// What a single poll cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Records appended to the log (possibly zero).
    Appended(usize),
    /// A previous fetch was still in flight.
    Skipped,
    /// The fetch failed; the message is kept as the feed's visible error.
    Failed(String),
}

/// Counters for the poll loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub cycles: u64,
    pub skipped: u64,
    pub failures: u64,
    pub records: usize,
}

pub struct PacketFeed {
    source: Arc<dyn PacketSource>,
    log: RwLock<Vec<PacketRecord>>,
    last_error: RwLock<Option<String>>,
    in_flight: AtomicBool,
    cycles: AtomicU64,
    skipped: AtomicU64,
    failures: AtomicU64,
}

/// Clears the in-flight flag when a cycle ends, even if the cycle is cancelled.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl PacketFeed {
    pub fn new(source: Arc<dyn PacketSource>) -> Self {
        Self {
            source,
            log: RwLock::new(Vec::new()),
            last_error: RwLock::new(None),
            in_flight: AtomicBool::new(false),
            cycles: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Run one fetch-and-append cycle, unless one is already running.
    pub async fn poll_once(&self) -> PollOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Packet fetch still in flight, skipping this cycle");
            return PollOutcome::Skipped;
        }
        let _guard = InFlightGuard(&self.in_flight);
        self.cycles.fetch_add(1, Ordering::Relaxed);

        match self.source.fetch_packets().await {
            Ok(batch) => {
                let count = batch.len();
                self.log
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend(batch);
                *self
                    .last_error
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = None;
                if count > 0 {
                    tracing::debug!("Appended {count} packet records");
                }
                PollOutcome::Appended(count)
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Packet fetch failed: {e}");
                let message = e.to_string();
                *self
                    .last_error
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = Some(message.clone());
                PollOutcome::Failed(message)
            }
        }
    }

    /// Every record received this session, in arrival order.
    pub fn records(&self) -> Vec<PacketRecord> {
        self.log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Display rows with countries resolved through the directory.
    pub fn rows(&self, directory: &CountryDirectory) -> Vec<PacketRow> {
        self.log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|record| PacketRow::from_record(record, directory))
            .collect()
    }

    /// Rows appended after the first `offset` records.
    pub fn rows_since(&self, offset: usize, directory: &CountryDirectory) -> Vec<PacketRow> {
        self.log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .skip(offset)
            .map(|record| PacketRow::from_record(record, directory))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.log.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Operator action: empty the display log.
    pub fn clear(&self) {
        let mut log = self.log.write().unwrap_or_else(PoisonError::into_inner);
        tracing::info!("Cleared {} packet records", log.len());
        log.clear();
    }

    /// Error of the most recent cycle, if it failed.
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_polling(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> FeedStats {
        FeedStats {
            cycles: self.cycles.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            records: self.len(),
        }
    }

    /// Spawn the recurring poll. The first cycle fires immediately.
    ///
    /// Each tick runs its cycle on its own task so the timer keeps a fixed
    /// cadence; the in-flight guard turns overlapping ticks into skips.
    pub fn start_polling(self: &Arc<Self>, interval: Duration) -> PollerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let feed = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let feed = Arc::clone(&feed);
                        tokio::spawn(async move {
                            feed.poll_once().await;
                        });
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("Packet poller stopped");
        });

        tracing::info!("Packet poller started ({}ms interval)", interval.as_millis());
        PollerHandle {
            shutdown: shutdown_tx,
            task: Some(task),
        }
    }
}

/// Handle to a running poll loop. Dropping it stops the loop.
pub struct PollerHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Stop scheduling cycles and wait for the loop to exit.
    /// A cycle already in flight is allowed to finish.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Packet poller task ended abnormally: {e}");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::remote::tests::{packet, FakePacketSource};

    #[tokio::test]
    async fn test_poll_appends_and_keeps_duplicate_ids() {
        let source = Arc::new(FakePacketSource::with_batches(vec![Ok(vec![
            packet("dup", "1.1.1.1", "FR", 10),
            packet("dup", "2.2.2.2", "JP", 10),
        ])]));
        let feed = PacketFeed::new(source);

        assert_eq!(feed.poll_once().await, PollOutcome::Appended(2));
        let records = feed.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, records[1].id);
        assert_eq!(records[0].source_country, "FR");
        assert_eq!(records[1].source_country, "JP");
    }

    #[tokio::test]
    async fn test_log_grows_across_cycles_without_dedupe() {
        let same = packet("a", "1.1.1.1", "FR", 10);
        let source = Arc::new(FakePacketSource::with_batches(vec![
            Ok(vec![same.clone()]),
            Ok(vec![same.clone()]),
        ]));
        let feed = PacketFeed::new(source);
        feed.poll_once().await;
        feed.poll_once().await;
        assert_eq!(feed.len(), 2);
        assert_eq!(feed.stats().cycles, 2);
    }

    #[tokio::test]
    async fn test_failure_is_visible_and_cleared_by_next_success() {
        let source = Arc::new(FakePacketSource::with_batches(vec![
            Err(AppError::RemoteUnavailable("HTTP 503 Service Unavailable".into())),
            Ok(vec![packet("a", "1.1.1.1", "FR", 10)]),
        ]));
        let feed = PacketFeed::new(source);

        assert_eq!(
            feed.poll_once().await,
            PollOutcome::Failed("HTTP 503 Service Unavailable".into())
        );
        assert_eq!(feed.last_error().as_deref(), Some("HTTP 503 Service Unavailable"));
        assert!(feed.is_empty());

        assert_eq!(feed.poll_once().await, PollOutcome::Appended(1));
        assert!(feed.last_error().is_none());
        assert_eq!(feed.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_overlapping_cycle_is_skipped() {
        let source = Arc::new(FakePacketSource::slow(Duration::from_millis(200)));
        let feed = Arc::new(PacketFeed::new(source.clone()));

        let first = {
            let feed = Arc::clone(&feed);
            tokio::spawn(async move { feed.poll_once().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(feed.is_polling());
        assert_eq!(feed.poll_once().await, PollOutcome::Skipped);

        assert_eq!(first.await.unwrap(), PollOutcome::Appended(0));
        assert!(!feed.is_polling());
        assert_eq!(source.calls(), 1);
        assert_eq!(feed.stats().skipped, 1);
    }

    #[tokio::test]
    async fn test_clear_empties_log() {
        let source = Arc::new(FakePacketSource::with_batches(vec![Ok(vec![packet(
            "a", "1.1.1.1", "FR", 10,
        )])]));
        let feed = PacketFeed::new(source);
        feed.poll_once().await;
        feed.clear();
        assert!(feed.is_empty());
    }

    #[tokio::test]
    async fn test_rows_resolve_countries_with_fallback() {
        let source = Arc::new(FakePacketSource::with_batches(vec![Ok(vec![
            packet("a", "1.1.1.1", "FR", 10),
            packet("b", "2.2.2.2", "QQ", 11),
        ])]));
        let feed = PacketFeed::new(source);
        feed.poll_once().await;

        let directory = CountryDirectory::from_entries(vec![(
            "FR".to_string(),
            crate::core::directory::CountryInfo {
                name: "France".into(),
                flag: "fr.svg".into(),
            },
        )]);
        let rows = feed.rows(&directory);
        assert_eq!(rows[0].source_country_name, "France");
        assert_eq!(rows[1].source_country_name, "QQ");
        assert_eq!(rows[1].source_flag, "");

        let tail = feed.rows_since(1, &directory);
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].id, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_ticks_on_interval_and_stops() {
        let source = Arc::new(FakePacketSource::default());
        let feed = Arc::new(PacketFeed::new(source.clone()));

        let handle = feed.start_polling(Duration::from_millis(100));
        assert!(handle.is_running());
        tokio::time::sleep(Duration::from_millis(350)).await;
        handle.stop().await;

        let calls = source.calls();
        assert!((3..=5).contains(&calls), "calls = {calls}");

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(source.calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_poller() {
        let source = Arc::new(FakePacketSource::default());
        let feed = Arc::new(PacketFeed::new(source.clone()));

        drop(feed.start_polling(Duration::from_millis(100)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let calls = source.calls();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(source.calls(), calls);
    }
}
