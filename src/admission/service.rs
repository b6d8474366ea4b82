//! Core admission service.

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use super::key::HistoryKey;
use super::registry::RuleRegistry;
use super::rule::Admit;
use super::store::HistoryStore;

/// Decides whether a caller may access a resource.
///
/// This struct is thread-safe and is meant to be constructed once at startup
/// and shared (usually behind an `Arc`) by every request handler.
pub struct AdmissionService {
    /// Rules per resource, read-only after construction
    registry: RuleRegistry,
    /// Request histories indexed by resource and caller
    histories: HistoryStore,
}

impl AdmissionService {
    /// Create a new admission service enforcing the given rules.
    pub fn new(registry: RuleRegistry) -> Self {
        Self {
            registry,
            histories: HistoryStore::new(),
        }
    }

    /// Check whether `caller` may access `resource` at `now`.
    ///
    /// Every rule configured for the resource is evaluated against the same
    /// history, even after one of them has rejected, because the count rule
    /// trims expired entries as it goes. The request is recorded only if all
    /// rules admit it.
    ///
    /// Resources without rules are always admitted and never get a history.
    pub fn check(&self, resource: &str, caller: &str, now: DateTime<Utc>) -> bool {
        let rules = self.registry.rules_for(resource);
        if rules.is_empty() {
            trace!(resource = %resource, "No rules configured, admitting");
            return true;
        }

        let key = HistoryKey::new(resource, caller);
        let handle = self.histories.get_or_create(&key);
        let mut history = handle.lock();

        let mut admitted = true;
        for rule in rules {
            admitted &= rule.admit(&mut history, now);
        }

        trace!(
            key = %key,
            admitted = admitted,
            history_len = history.len(),
            "Evaluated admission rules"
        );

        if admitted {
            history.record(now);
        } else {
            debug!(key = %key, "Request limit exceeded");
        }

        admitted
    }

    /// Check against the current wall-clock time.
    pub fn check_now(&self, resource: &str, caller: &str) -> bool {
        self.check(resource, caller, Utc::now())
    }

    /// Drop histories that can no longer influence any verdict.
    ///
    /// A history is dropped when it is empty, when its resource no longer has
    /// rules, or when its newest entry is older than the longest window or
    /// spacing configured for its resource. Histories in use by an in-flight
    /// check are kept. Returns the number of histories removed.
    pub fn sweep_idle(&self, now: DateTime<Utc>) -> usize {
        let removed = self.histories.retain(|key, history| {
            let horizon = self
                .registry
                .rules_for(&key.resource)
                .iter()
                .map(|rule| rule.horizon())
                .max();
            match (horizon, history.latest()) {
                (Some(horizon), Some(latest)) => now - latest <= horizon,
                _ => false,
            }
        });

        if removed > 0 {
            debug!(removed = removed, remaining = self.histories.len(), "Swept idle histories");
        }
        removed
    }

    /// Get the number of stored timestamps for a resource and caller.
    ///
    /// Returns `None` if no history exists for the pair.
    pub fn history_len(&self, resource: &str, caller: &str) -> Option<usize> {
        self.histories.history_len(&HistoryKey::new(resource, caller))
    }

    /// Get the number of tracked histories.
    pub fn history_count(&self) -> usize {
        self.histories.len()
    }

    /// The registry this service enforces.
    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::history::RequestHistory;
    use crate::admission::rule::Rule;
    use chrono::{TimeDelta, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn secs(s: i64) -> TimeDelta {
        TimeDelta::seconds(s)
    }

    fn service_with(resource: &str, rules: Vec<Rule>) -> AdmissionService {
        AdmissionService::new(RuleRegistry::builder().resource(resource, rules).build())
    }

    #[test]
    fn test_service_creation() {
        let service = AdmissionService::new(RuleRegistry::default());
        assert_eq!(service.history_count(), 0);
    }

    #[test]
    fn test_unconfigured_resource_admits_without_history() {
        let service = service_with(
            "/api",
            vec![Rule::count_in_window(1, Duration::from_secs(60)).unwrap()],
        );

        for _ in 0..10 {
            assert!(service.check("/health", "any-token", t0()));
        }
        assert_eq!(service.history_count(), 0);
        assert_eq!(service.history_len("/health", "any-token"), None);
    }

    #[test]
    fn test_empty_rule_list_admits_without_history() {
        let service = service_with("/health", Vec::new());

        assert!(service.check("/health", "any-token", t0()));
        assert!(service.check("/health", "any-token", t0()));
        assert_eq!(service.history_count(), 0);
    }

    #[test]
    fn test_single_request_per_minute() {
        let service = service_with(
            "/api",
            vec![Rule::count_in_window(1, Duration::from_secs(60)).unwrap()],
        );

        assert!(service.check("/api", "tok", t0()));
        assert!(!service.check("/api", "tok", t0() + secs(1)));
        assert!(service.check("/api", "otherTok", t0() + secs(1)));

        assert_eq!(service.history_len("/api", "tok"), Some(1));
        assert_eq!(service.history_len("/api", "otherTok"), Some(1));
    }

    #[test]
    fn test_rejected_requests_are_not_recorded() {
        let service = service_with(
            "/api",
            vec![Rule::count_in_window(2, Duration::from_secs(60)).unwrap()],
        );

        assert!(service.check("/api", "tok", t0()));
        assert!(service.check("/api", "tok", t0() + secs(1)));
        for i in 2..10 {
            assert!(!service.check("/api", "tok", t0() + secs(i)));
        }
        assert_eq!(service.history_len("/api", "tok"), Some(2));

        // Only admitted requests count, so the window frees up 60s after them.
        assert!(service.check("/api", "tok", t0() + secs(60)));
    }

    #[test]
    fn test_same_caller_on_different_resources_is_isolated() {
        let rule = Rule::count_in_window(1, Duration::from_secs(60)).unwrap();
        let registry = RuleRegistry::builder()
            .resource("/a", vec![rule])
            .resource("/b", vec![rule])
            .build();
        let service = AdmissionService::new(registry);

        assert!(service.check("/a", "tok", t0()));
        assert!(service.check("/b", "tok", t0()));
        assert!(!service.check("/a", "tok", t0()));
        assert_eq!(service.history_count(), 2);
    }

    #[test]
    fn test_all_rules_must_admit() {
        let service = service_with(
            "/api",
            vec![
                Rule::count_in_window(5, Duration::from_secs(60)).unwrap(),
                Rule::min_spacing(Duration::from_secs(10)).unwrap(),
            ],
        );

        assert!(service.check("/api", "tok", t0()));
        // Count allows it, spacing does not.
        assert!(!service.check("/api", "tok", t0() + secs(5)));
        assert!(service.check("/api", "tok", t0() + secs(11)));
        assert_eq!(service.history_len("/api", "tok"), Some(2));
    }

    #[test]
    fn test_matches_independent_rule_verdicts() {
        let count = Rule::count_in_window(2, Duration::from_secs(30)).unwrap();
        let spacing = Rule::min_spacing(Duration::from_secs(4)).unwrap();
        let service = service_with("/api", vec![count, spacing]);
        let mut shadow = RequestHistory::new();

        for step in [0, 1, 5, 6, 12, 20, 31, 33, 40, 70] {
            let now = t0() + secs(step);

            let mut count_view = shadow.clone();
            let mut spacing_view = shadow.clone();
            let expected = count.admit(&mut count_view, now) && spacing.admit(&mut spacing_view, now);

            assert_eq!(service.check("/api", "tok", now), expected, "step {}", step);

            shadow = count_view;
            if expected {
                shadow.record(now);
            }
        }
    }

    #[test]
    fn test_pruning_happens_even_when_rejected() {
        // The spacing rule runs first and rejects; the count rule must still
        // trim expired entries.
        let service = service_with(
            "/api",
            vec![
                Rule::min_spacing(Duration::from_secs(100)).unwrap(),
                Rule::count_in_window(10, Duration::from_secs(60)).unwrap(),
            ],
        );

        assert!(service.check("/api", "tok", t0()));
        assert!(!service.check("/api", "tok", t0() + secs(61)));
        assert_eq!(service.history_len("/api", "tok"), Some(0));
    }

    #[test]
    fn test_concurrent_same_key_admits_exactly_one() {
        let service = service_with(
            "/api",
            vec![Rule::count_in_window(1, Duration::from_secs(3600)).unwrap()],
        );
        let threads = 32;
        let barrier = Barrier::new(threads);
        let admitted = AtomicUsize::new(0);
        let now = t0();

        std::thread::scope(|s| {
            for _ in 0..threads {
                s.spawn(|| {
                    barrier.wait();
                    if service.check("/api", "tok", now) {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(admitted.load(Ordering::SeqCst), 1);
        assert_eq!(service.history_len("/api", "tok"), Some(1));
    }

    #[test]
    fn test_concurrent_distinct_callers_are_independent() {
        let service = service_with(
            "/api",
            vec![Rule::count_in_window(3, Duration::from_secs(3600)).unwrap()],
        );
        let callers: Vec<String> = (0..8).map(|i| format!("caller-{}", i)).collect();
        let now = t0();

        std::thread::scope(|s| {
            for caller in &callers {
                let service = &service;
                s.spawn(move || {
                    for _ in 0..10 {
                        service.check("/api", caller, now);
                    }
                });
            }
        });

        for caller in &callers {
            assert_eq!(service.history_len("/api", caller), Some(3));
        }
    }

    #[test]
    fn test_sweep_idle_drops_expired_histories() {
        let service = service_with(
            "/api",
            vec![
                Rule::count_in_window(5, Duration::from_secs(60)).unwrap(),
                Rule::min_spacing(Duration::from_secs(1)).unwrap(),
            ],
        );

        assert!(service.check("/api", "old", t0()));
        assert!(service.check("/api", "recent", t0() + secs(50)));

        assert_eq!(service.sweep_idle(t0() + secs(60)), 0);
        assert_eq!(service.sweep_idle(t0() + secs(61)), 1);
        assert_eq!(service.history_len("/api", "old"), None);
        assert_eq!(service.history_len("/api", "recent"), Some(1));
    }

    #[test]
    fn test_sweep_idle_drops_empty_histories() {
        let service = service_with(
            "/api",
            vec![
                Rule::min_spacing(Duration::from_secs(100)).unwrap(),
                Rule::count_in_window(10, Duration::from_secs(60)).unwrap(),
            ],
        );

        assert!(service.check("/api", "tok", t0()));
        assert!(!service.check("/api", "tok", t0() + secs(61)));
        assert_eq!(service.history_len("/api", "tok"), Some(0));

        assert_eq!(service.sweep_idle(t0() + secs(61)), 1);
        assert_eq!(service.history_count(), 0);
    }

    #[test]
    fn test_swept_caller_starts_fresh() {
        let service = service_with(
            "/api",
            vec![Rule::count_in_window(1, Duration::from_secs(60)).unwrap()],
        );

        assert!(service.check("/api", "tok", t0()));
        assert_eq!(service.sweep_idle(t0() + secs(120)), 1);
        assert!(service.check("/api", "tok", t0() + secs(120)));
    }

    #[tokio::test]
    async fn test_sweep_on_blocking_pool_alongside_checks() {
        let service = std::sync::Arc::new(service_with(
            "/api",
            vec![Rule::count_in_window(1, Duration::from_secs(60)).unwrap()],
        ));
        assert!(service.check("/api", "old", t0()));
        assert!(service.check("/api", "recent", t0() + secs(30)));

        let sweeper = service.clone();
        let sweep = tokio::task::spawn_blocking(move || sweeper.sweep_idle(t0() + secs(61)));
        assert!(!service.check("/api", "recent", t0() + secs(61)));

        assert_eq!(sweep.await.unwrap(), 1);
        assert_eq!(service.history_len("/api", "old"), None);
        assert_eq!(service.history_len("/api", "recent"), Some(1));
    }
}
