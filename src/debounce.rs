//! Pending-value overlay with per-key quiet periods.
//!
//! Continuous inputs (slider drags, color pickers) produce a burst of values.
//! Each burst is held here as "latest value + deadline" per key; every new
//! value for a key replaces the old one and restarts its timer. Once a key
//! has been quiet until its deadline, [`Debouncer::take_due`] hands the final
//! value over for commit.
//!
//! Reads during the window go through [`Debouncer::peek`], so the editor can
//! show the value under the pointer before it is committed.
//!
//! Time is always passed in, which keeps the type free of timers and
//! deterministic under test. Render coalescing uses the same type with a
//! single key.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Pending<V> {
    value: V,
    deadline: Instant,
}

#[derive(Debug, Clone)]
pub struct Debouncer<V> {
    pending: BTreeMap<String, Pending<V>>,
}

impl<V> Default for Debouncer<V> {
    fn default() -> Self {
        Self {
            pending: BTreeMap::new(),
        }
    }
}

impl<V> Debouncer<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold `value` for `key` until `now + delay`, cancelling any earlier
    /// pending value for the same key.
    pub fn push(&mut self, key: impl Into<String>, value: V, now: Instant, delay: Duration) {
        self.pending.insert(
            key.into(),
            Pending {
                value,
                deadline: now + delay,
            },
        );
    }

    /// The pending value for `key`, if any.
    pub fn peek(&self, key: &str) -> Option<&V> {
        self.pending.get(key).map(|p| &p.value)
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Pending keys and values, ordered by key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.pending.iter().map(|(key, p)| (key.as_str(), &p.value))
    }

    /// Earliest deadline among pending keys.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    /// Remove and return every entry whose deadline is at or before `now`,
    /// ordered by key.
    pub fn take_due(&mut self, now: Instant) -> Vec<(String, V)> {
        let due: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        due.into_iter()
            .filter_map(|key| self.pending.remove(&key).map(|p| (key, p.value)))
            .collect()
    }

    /// Remove and return every pending entry regardless of deadline.
    pub fn take_all(&mut self) -> Vec<(String, V)> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(key, p)| (key, p.value))
            .collect()
    }

    /// Drop the pending value for `key` without committing it.
    pub fn cancel(&mut self, key: &str) -> Option<V> {
        self.pending.remove(key).map(|p| p.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(100);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn value_is_held_until_quiet() {
        let t0 = Instant::now();
        let mut d = Debouncer::new();
        d.push("opacity", 10, t0, DELAY);

        assert!(d.take_due(t0 + ms(50)).is_empty());
        assert_eq!(d.peek("opacity"), Some(&10));
        assert_eq!(d.take_due(t0 + ms(100)), vec![("opacity".to_string(), 10)]);
        assert!(d.is_empty());
    }

    #[test]
    fn push_restarts_timer_and_keeps_latest() {
        let t0 = Instant::now();
        let mut d = Debouncer::new();
        d.push("opacity", 10, t0, DELAY);
        d.push("opacity", 20, t0 + ms(80), DELAY);
        d.push("opacity", 30, t0 + ms(160), DELAY);

        // The first deadline has long passed, but every push restarted it.
        assert!(d.take_due(t0 + ms(200)).is_empty());
        assert_eq!(d.peek("opacity"), Some(&30));
        assert_eq!(d.take_due(t0 + ms(260)), vec![("opacity".to_string(), 30)]);
    }

    #[test]
    fn keys_are_independent() {
        let t0 = Instant::now();
        let mut d = Debouncer::new();
        d.push("a", "x", t0, ms(50));
        d.push("b", "y", t0, ms(300));

        assert_eq!(d.next_deadline(), Some(t0 + ms(50)));
        assert_eq!(d.take_due(t0 + ms(60)), vec![("a".to_string(), "x")]);
        assert!(d.is_pending("b"));
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn take_all_flushes_everything() {
        let t0 = Instant::now();
        let mut d = Debouncer::new();
        d.push("b", 2, t0, DELAY);
        d.push("a", 1, t0, DELAY);
        assert_eq!(
            d.take_all(),
            vec![("a".to_string(), 1), ("b".to_string(), 2)]
        );
        assert!(d.is_empty());
        assert_eq!(d.next_deadline(), None);
    }

    #[test]
    fn cancel_drops_value() {
        let t0 = Instant::now();
        let mut d = Debouncer::new();
        d.push("a", 1, t0, DELAY);
        assert_eq!(d.cancel("a"), Some(1));
        assert!(d.take_due(t0 + ms(500)).is_empty());
    }
}
