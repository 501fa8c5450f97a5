//! Eager loading of a whole frame sequence.
//!
//! Every activation gets a new generation. Completions are recorded against the
//! generation they were issued under, so a fetch that outlives its activation can never
//! count toward a newer one.

use crate::fetch::{AssetFetcher, FetchError};
use crate::sequence::{FrameAddress, FrameSequence};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PreloadProgress {
    pub generation: u64,
    /// Completed fetches, failures included.
    pub loaded: usize,
    pub failed: usize,
    pub total: usize,
    pub ready: bool,
}

impl PreloadProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.loaded as f64 / self.total as f64
        }
    }

    pub fn percentage(&self) -> u8 {
        (self.fraction() * 100.0).min(100.0) as u8
    }
}

impl fmt::Display for PreloadProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.loaded, self.total)?;
        if self.failed > 0 {
            write!(f, " ({} failed)", self.failed)?;
        }
        Ok(())
    }
}

/// Completion bookkeeping for one preload activation at a time.
#[derive(Debug, Default)]
pub struct PreloadTracker {
    generation: u64,
    completed: Vec<bool>,
    loaded: usize,
    failed: usize,
    ready: bool,
}

impl PreloadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new activation over `total` frames and returns its generation.
    pub fn begin(&mut self, total: usize) -> u64 {
        self.generation += 1;
        self.completed = vec![false; total];
        self.loaded = 0;
        self.failed = 0;
        self.ready = false;
        self.generation
    }

    /// Makes every outstanding completion stale without starting a new activation.
    pub fn invalidate(&mut self) {
        self.generation += 1;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Records the completion of frame `index`. Returns the new progress, or `None` when
    /// the completion was stale or already counted.
    pub fn record(&mut self, generation: u64, index: usize, success: bool) -> Option<PreloadProgress> {
        if generation != self.generation {
            return None;
        }

        let done = self.completed.get_mut(index)?;
        if *done {
            return None;
        }
        *done = true;

        self.loaded += 1;
        if !success {
            self.failed += 1;
        }
        if self.loaded == self.completed.len() {
            self.ready = true;
        }
        Some(self.progress())
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn progress(&self) -> PreloadProgress {
        PreloadProgress {
            generation: self.generation,
            loaded: self.loaded,
            failed: self.failed,
            total: self.completed.len(),
            ready: self.ready,
        }
    }
}

/// Fetches every frame of a sequence concurrently and publishes progress.
pub struct Preloader<F: AssetFetcher> {
    fetcher: Arc<F>,
    timeout: Option<Duration>,
    tracker: Arc<Mutex<PreloadTracker>>,
    progress: Arc<watch::Sender<PreloadProgress>>,
    tasks: JoinSet<()>,
}

impl<F: AssetFetcher> Preloader<F> {
    pub fn new(fetcher: Arc<F>) -> Self {
        let (progress, _) = watch::channel(PreloadProgress::default());
        Self {
            fetcher,
            timeout: Some(DEFAULT_FETCH_TIMEOUT),
            tracker: Arc::new(Mutex::new(PreloadTracker::new())),
            progress: Arc::new(progress),
            tasks: JoinSet::new(),
        }
    }

    /// Per-fetch time limit. A fetch that runs out of time counts as a failure.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<PreloadProgress> {
        self.progress.subscribe()
    }

    pub fn progress(&self) -> PreloadProgress {
        self.tracker.lock().progress()
    }

    pub fn is_ready(&self) -> bool {
        self.tracker.lock().is_ready()
    }

    /// Starts loading every frame of `sequence`, superseding any earlier activation.
    ///
    /// Must be called from within a tokio runtime.
    pub fn activate(&mut self, sequence: &FrameSequence) -> u64 {
        // Dropping the old set aborts whatever is still running and frees finished tasks.
        self.tasks = JoinSet::new();

        let generation = {
            let mut tracker = self.tracker.lock();
            let generation = tracker.begin(sequence.total_frames());
            self.progress.send_replace(tracker.progress());
            generation
        };

        log::debug!(
            "preload #{generation}: fetching {} frames",
            sequence.total_frames()
        );

        for (index, address) in sequence.addresses() {
            let fetcher = Arc::clone(&self.fetcher);
            let tracker = Arc::clone(&self.tracker);
            let progress = Arc::clone(&self.progress);
            let timeout = self.timeout;

            self.tasks.spawn(async move {
                let result = fetch_with_timeout(fetcher.as_ref(), &address, timeout).await;
                if let Err(e) = &result {
                    log::warn!("Failed to load frame {address}: {e}");
                }

                let mut tracker = tracker.lock();
                match tracker.record(generation, index, result.is_ok()) {
                    Some(update) => {
                        if update.ready {
                            log::info!("preload #{generation} ready: {update}");
                        }
                        progress.send_replace(update);
                    }
                    None => log::debug!("preload #{generation}: dropped stale completion for {address}"),
                }
            });
        }

        generation
    }

    /// Stops counting completions and abandons in-flight fetches.
    pub fn shutdown(&mut self) {
        self.tracker.lock().invalidate();
        self.tasks = JoinSet::new();
    }
}

impl<F: AssetFetcher> Drop for Preloader<F> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn fetch_with_timeout<F: AssetFetcher>(
    fetcher: &F,
    address: &FrameAddress,
    timeout: Option<Duration>,
) -> Result<(), FetchError> {
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, fetcher.fetch(address))
            .await
            .map_err(|_| FetchError::TimedOut {
                address: address.clone(),
                timeout,
            })?,
        None => fetcher.fetch(address).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tokio::sync::Semaphore;

    struct FlakyFetcher {
        broken: HashSet<String>,
    }

    impl AssetFetcher for FlakyFetcher {
        async fn fetch(&self, address: &FrameAddress) -> Result<(), FetchError> {
            tokio::task::yield_now().await;
            if self.broken.contains(address.as_str()) {
                return Err(FetchError::Empty(address.clone()));
            }
            Ok(())
        }
    }

    /// Holds every fetch until the gate is opened.
    struct GatedFetcher {
        gate: Semaphore,
    }

    impl AssetFetcher for GatedFetcher {
        async fn fetch(&self, _address: &FrameAddress) -> Result<(), FetchError> {
            let _ = self.gate.acquire().await;
            Ok(())
        }
    }

    struct StuckFetcher;

    impl AssetFetcher for StuckFetcher {
        async fn fetch(&self, _address: &FrameAddress) -> Result<(), FetchError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn sequence(total: usize) -> FrameSequence {
        FrameSequence::new("/box00/", "box", "jpeg", total, 3).unwrap()
    }

    #[test]
    fn test_tracker_restart_discards_stale_completions() {
        let mut tracker = PreloadTracker::new();
        let a = tracker.begin(10);
        let b = tracker.begin(5);
        assert_ne!(a, b);

        for i in 0..10 {
            assert_eq!(tracker.record(a, i, true), None);
        }
        assert_eq!(tracker.progress().loaded, 0);

        for i in 0..4 {
            let p = tracker.record(b, i, true).unwrap();
            assert!(!p.ready);
        }
        let p = tracker.record(b, 4, true).unwrap();
        assert!(p.ready);
        assert_eq!((p.loaded, p.total), (5, 5));
    }

    #[test]
    fn test_tracker_counts_failures_and_stays_ready() {
        let mut tracker = PreloadTracker::new();
        let g = tracker.begin(3);
        let mut last = 0;

        for (i, ok) in [(2, false), (0, true), (0, true), (7, true), (1, false)] {
            tracker.record(g, i, ok);
            let p = tracker.progress();
            assert!(p.loaded >= last);
            assert!(p.loaded <= p.total);
            assert_eq!(p.ready, p.loaded == p.total);
            last = p.loaded;
        }

        let p = tracker.progress();
        assert!(p.ready);
        assert_eq!(p.failed, 2);
        assert_eq!(tracker.record(g, 1, true), None);
        assert!(tracker.is_ready());
    }

    #[test]
    fn test_invalidate_stops_counting() {
        let mut tracker = PreloadTracker::new();
        let g = tracker.begin(2);
        tracker.record(g, 0, true);
        tracker.invalidate();
        assert_eq!(tracker.record(g, 1, true), None);
        assert!(!tracker.is_ready());
    }

    #[test]
    fn test_progress_display() {
        let p = PreloadProgress {
            generation: 1,
            loaded: 12,
            failed: 1,
            total: 36,
            ready: false,
        };
        assert_eq!(p.to_string(), "12/36 (1 failed)");
        assert_eq!(p.percentage(), 33);
    }

    #[tokio::test]
    async fn test_failures_do_not_block_readiness() {
        let seq = sequence(4);
        let fetcher = FlakyFetcher {
            broken: HashSet::from([seq.address(2).to_string()]),
        };
        let mut preloader = Preloader::new(Arc::new(fetcher));
        let mut rx = preloader.subscribe();
        preloader.activate(&seq);

        let p = *rx.wait_for(|p| p.ready).await.unwrap();
        assert_eq!((p.loaded, p.failed, p.total), (4, 1, 4));
        assert!(preloader.is_ready());
    }

    #[tokio::test]
    async fn test_reactivation_restarts_count() {
        let fetcher = Arc::new(GatedFetcher {
            gate: Semaphore::new(0),
        });
        let mut preloader = Preloader::new(Arc::clone(&fetcher));
        let mut rx = preloader.subscribe();

        let a = preloader.activate(&sequence(10));
        let b = preloader.activate(&sequence(5));
        assert_eq!(preloader.progress().total, 5);
        assert_eq!(preloader.progress().loaded, 0);

        fetcher.gate.add_permits(1);
        let p = *rx.wait_for(|p| p.ready).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(p.generation, b);
        assert_eq!((p.loaded, p.total), (5, 5));
    }

    #[tokio::test]
    async fn test_reactivation_does_not_accumulate_tasks() {
        let seq = sequence(4);
        let mut preloader = Preloader::new(Arc::new(FlakyFetcher {
            broken: HashSet::new(),
        }));
        let mut rx = preloader.subscribe();

        for _ in 0..5 {
            let generation = preloader.activate(&seq);
            rx.wait_for(|p| p.ready && p.generation == generation)
                .await
                .unwrap();
        }
        assert_eq!(preloader.tasks.len(), 4);

        preloader.shutdown();
        assert!(preloader.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let mut preloader =
            Preloader::new(Arc::new(StuckFetcher)).with_timeout(Some(Duration::from_millis(20)));
        let mut rx = preloader.subscribe();
        preloader.activate(&sequence(3));

        let p = *rx.wait_for(|p| p.ready).await.unwrap();
        assert_eq!((p.loaded, p.failed), (3, 3));
    }

    #[tokio::test]
    async fn test_shutdown_ignores_late_completions() {
        let fetcher = Arc::new(GatedFetcher {
            gate: Semaphore::new(0),
        });
        let mut preloader = Preloader::new(Arc::clone(&fetcher));
        preloader.activate(&sequence(3));
        preloader.shutdown();

        fetcher.gate.add_permits(1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(preloader.progress().loaded, 0);
        assert!(!preloader.is_ready());
    }
}
