//! Duplicate request suppression
//!
//! Remembers the text of recently admitted requests so a repeated identical prompt
//! (a user double-tapping a trigger, for example) does not start a second expensive
//! remote call while the first one is still considered fresh.
//!
//! Staleness is only enforced by [`Deduplicator::sweep`], which runs at most once
//! per window. An entry can therefore outlive its window until the next sweep, and a
//! request that runs longer than the window can be submitted again.

use crate::config::DedupSettings;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Outcome of an admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request was recorded and may proceed
    Admitted,
    /// An identical request is already in flight
    Duplicate,
}

/// Time-windowed set of in-flight request texts.
///
/// Not synchronized; owners running handlers concurrently must wrap it in a mutex.
#[derive(Debug)]
pub struct Deduplicator {
    recent: HashMap<String, DateTime<Utc>>,
    window: ChronoDuration,
    last_sweep: DateTime<Utc>,
}

impl Deduplicator {
    /// Create a deduplicator whose sweep schedule starts at `now`.
    #[must_use]
    pub fn new(window: Duration, now: DateTime<Utc>) -> Self {
        Self {
            recent: HashMap::new(),
            window: ChronoDuration::from_std(window).unwrap_or(ChronoDuration::MAX),
            last_sweep: now,
        }
    }

    /// Try to admit `text` at `now`.
    ///
    /// A pending sweep runs first; then the text is rejected if still present,
    /// otherwise it is recorded with timestamp `now`. A rejected duplicate keeps its
    /// original timestamp.
    pub fn try_admit(&mut self, text: &str, now: DateTime<Utc>) -> Admission {
        self.sweep(now);

        if self.recent.contains_key(text) {
            debug!(entries = self.recent.len(), "Duplicate request rejected");
            return Admission::Duplicate;
        }

        self.recent.insert(text.to_string(), now);
        Admission::Admitted
    }

    /// Drop stale entries if more than one window has passed since the last sweep.
    ///
    /// Returns the number of removed entries.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        if now - self.last_sweep <= self.window {
            return 0;
        }

        let before = self.recent.len();
        let window = self.window;
        self.recent.retain(|_, admitted| now - *admitted < window);
        self.last_sweep = now;

        let removed = before - self.recent.len();
        if removed > 0 {
            debug!(removed, remaining = self.recent.len(), "Swept stale requests");
        }
        removed
    }

    /// Forget `text` immediately, e.g. once its request has completed.
    ///
    /// Returns `true` if an entry was removed.
    pub fn release(&mut self, text: &str) -> bool {
        self.recent.remove(text).is_some()
    }

    /// Number of remembered requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.recent.len()
    }

    /// Whether no request is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    /// Configured suppression window.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window.to_std().unwrap_or(Duration::MAX)
    }
}

/// A [`Deduplicator`] shared by concurrent handlers of one plugin.
///
/// Reads the time from an injectable [`Clock`] and, when configured, forgets a
/// request as soon as it completes instead of waiting for the sweep.
pub struct RequestGate {
    inner: Mutex<Deduplicator>,
    clock: Arc<dyn Clock>,
    release_on_completion: bool,
}

impl RequestGate {
    /// Create a gate from the dedup settings.
    #[must_use]
    pub fn new(settings: &DedupSettings, clock: Arc<dyn Clock>) -> Self {
        let dedup = Deduplicator::new(settings.window(), clock.now());
        Self {
            inner: Mutex::new(dedup),
            clock,
            release_on_completion: settings.release_on_completion,
        }
    }

    /// Try to admit a request keyed by its full text.
    pub async fn admit(&self, key: &str) -> Admission {
        let now = self.clock.now();
        self.inner.lock().await.try_admit(key, now)
    }

    /// Mark the request keyed by `key` as finished.
    pub async fn complete(&self, key: &str) {
        if self.release_on_completion {
            self.inner.lock().await.release(key);
        }
    }

    /// Number of requests currently remembered.
    pub async fn pending(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const WINDOW: Duration = Duration::from_secs(240);

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn test_second_identical_request_is_duplicate() {
        let mut dedup = Deduplicator::new(WINDOW, t(0));

        assert_eq!(dedup.try_admit("唱生日快乐歌", t(1)), Admission::Admitted);
        assert_eq!(dedup.try_admit("唱生日快乐歌", t(2)), Admission::Duplicate);
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn test_different_texts_are_independent() {
        let mut dedup = Deduplicator::new(WINDOW, t(0));

        assert_eq!(dedup.try_admit("a", t(1)), Admission::Admitted);
        assert_eq!(dedup.try_admit("b", t(1)), Admission::Admitted);
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn test_admitted_again_after_window_and_sweep() {
        let mut dedup = Deduplicator::new(WINDOW, t(0));

        assert_eq!(dedup.try_admit("x", t(0)), Admission::Admitted);
        // Window elapsed; the sweep inside try_admit clears the entry
        assert_eq!(dedup.try_admit("x", t(241)), Admission::Admitted);
    }

    #[test]
    fn test_entry_outlives_window_until_sweep_is_due() {
        let mut dedup = Deduplicator::new(WINDOW, t(0));

        assert_eq!(dedup.try_admit("x", t(100)), Admission::Admitted);
        // Sweep due at t=241 clears nothing: "x" is only 141s old
        assert_eq!(dedup.try_admit("y", t(241)), Admission::Admitted);
        assert_eq!(dedup.len(), 2);
        // Next sweep is not due before t=481, so "x" is still rejected at t=400
        assert_eq!(dedup.try_admit("x", t(400)), Admission::Duplicate);
        // At t=482 the sweep removes both stale entries
        assert_eq!(dedup.try_admit("x", t(482)), Admission::Admitted);
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn test_duplicate_does_not_refresh_timestamp() {
        let mut dedup = Deduplicator::new(WINDOW, t(0));

        dedup.try_admit("x", t(0));
        assert_eq!(dedup.try_admit("x", t(200)), Admission::Duplicate);
        // Would still be rejected if the rejection at t=200 had refreshed it
        assert_eq!(dedup.try_admit("x", t(241)), Admission::Admitted);
    }

    #[test]
    fn test_sweep_respects_interval() {
        let mut dedup = Deduplicator::new(WINDOW, t(0));
        dedup.try_admit("x", t(0));

        assert_eq!(dedup.sweep(t(240)), 0);
        assert_eq!(dedup.len(), 1);
        assert_eq!(dedup.sweep(t(241)), 1);
        assert!(dedup.is_empty());
    }

    #[test]
    fn test_entry_exactly_window_old_is_removed() {
        let mut dedup = Deduplicator::new(WINDOW, t(0));
        dedup.try_admit("old", t(1));
        dedup.try_admit("young", t(2));

        assert_eq!(dedup.sweep(t(241)), 1);
        assert_eq!(dedup.try_admit("young", t(241)), Admission::Duplicate);
    }

    #[test]
    fn test_release_allows_immediate_resubmission() {
        let mut dedup = Deduplicator::new(WINDOW, t(0));

        dedup.try_admit("x", t(0));
        assert!(dedup.release("x"));
        assert!(!dedup.release("x"));
        assert_eq!(dedup.try_admit("x", t(1)), Admission::Admitted);
    }

    #[tokio::test]
    async fn test_gate_uses_injected_clock() {
        let clock = Arc::new(crate::testing::ManualClock::new(t(0)));
        let settings = DedupSettings {
            window_secs: 240,
            release_on_completion: false,
        };
        let gate = RequestGate::new(&settings, clock.clone());

        assert_eq!(gate.admit("x").await, Admission::Admitted);
        gate.complete("x").await;
        assert_eq!(gate.admit("x").await, Admission::Duplicate);

        clock.advance(Duration::from_secs(241));
        assert_eq!(gate.admit("x").await, Admission::Admitted);
    }

    #[tokio::test]
    async fn test_gate_releases_on_completion() {
        let clock = Arc::new(crate::testing::ManualClock::new(t(0)));
        let settings = DedupSettings {
            window_secs: 240,
            release_on_completion: true,
        };
        let gate = RequestGate::new(&settings, clock);

        assert_eq!(gate.admit("x").await, Admission::Admitted);
        assert_eq!(gate.pending().await, 1);
        gate.complete("x").await;
        assert_eq!(gate.pending().await, 0);
        assert_eq!(gate.admit("x").await, Admission::Admitted);
    }

    #[test]
    fn test_window_roundtrip() {
        let dedup = Deduplicator::new(WINDOW, t(0));
        assert_eq!(dedup.window(), WINDOW);
    }
}
