use std::time::{Duration, Instant};

use chrono::Utc;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct Alert {
    pub id: i64,
    pub message: String,
    pub kind: AlertKind,
    deadline: Instant,
}

/// Transient notification queue. Entries are keyed by creation
/// timestamp (epoch millis) and drop on their deadline or on explicit
/// dismissal; expiry is checked on the UI tick, so dismissal leaves no
/// timer behind to fire on an already-removed entry.
#[derive(Debug)]
pub struct AlertQueue {
    ttl: Duration,
    entries: Vec<Alert>,
    last_id: i64,
}

impl Default for AlertQueue {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl AlertQueue {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Vec::new(),
            last_id: 0,
        }
    }

    pub fn success<S: Into<String>>(&mut self, message: S) -> i64 {
        self.push_at(message.into(), AlertKind::Success, Instant::now())
    }

    pub fn error<S: Into<String>>(&mut self, message: S) -> i64 {
        self.push_at(message.into(), AlertKind::Error, Instant::now())
    }

    fn push_at(&mut self, message: String, kind: AlertKind, now: Instant) -> i64 {
        // Two alerts inside the same millisecond would collide, so the
        // id is bumped to keep dismissal addressing exactly one entry.
        let mut id = Utc::now().timestamp_millis();
        if id <= self.last_id {
            id = self.last_id + 1;
        }
        self.last_id = id;
        self.entries.push(Alert {
            id,
            message,
            kind,
            deadline: now + self.ttl,
        });
        id
    }

    /// Drop expired entries. Returns true when anything was removed.
    pub fn prune(&mut self, now: Instant) -> bool {
        let before = self.entries.len();
        self.entries.retain(|alert| alert.deadline > now);
        self.entries.len() != before
    }

    /// Remove one entry immediately, regardless of remaining lifetime.
    /// Other entries are never affected.
    pub fn dismiss(&mut self, id: i64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|alert| alert.id != id);
        self.entries.len() != before
    }

    /// Dismiss the most recently raised alert.
    pub fn dismiss_latest(&mut self) -> bool {
        self.entries.pop().is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_expires_after_ttl() {
        let mut queue = AlertQueue::default();
        let start = Instant::now();
        queue.push_at("Post created successfully!".into(), AlertKind::Success, start);
        assert_eq!(queue.len(), 1);

        assert!(!queue.prune(start + Duration::from_millis(4999)));
        assert_eq!(queue.len(), 1);

        assert!(queue.prune(start + Duration::from_millis(5001)));
        assert!(queue.is_empty());
    }

    #[test]
    fn dismiss_removes_immediately_regardless_of_age() {
        let mut queue = AlertQueue::default();
        let start = Instant::now();
        let id = queue.push_at("fresh".into(), AlertKind::Error, start);
        assert!(queue.dismiss(id));
        assert!(queue.is_empty());
        // Pruning after the would-be deadline finds nothing left.
        assert!(!queue.prune(start + Duration::from_secs(10)));
    }

    #[test]
    fn dismissing_one_alert_leaves_the_others() {
        let mut queue = AlertQueue::default();
        let start = Instant::now();
        let first = queue.push_at("one".into(), AlertKind::Success, start);
        let second = queue.push_at("two".into(), AlertKind::Success, start);
        let third = queue.push_at("three".into(), AlertKind::Error, start);
        assert!(queue.dismiss(second));
        let remaining: Vec<i64> = queue.iter().map(|a| a.id).collect();
        assert_eq!(remaining, vec![first, third]);
    }

    #[test]
    fn ids_are_unique_within_the_same_millisecond() {
        let mut queue = AlertQueue::default();
        let start = Instant::now();
        let a = queue.push_at("a".into(), AlertKind::Success, start);
        let b = queue.push_at("b".into(), AlertKind::Success, start);
        let c = queue.push_at("c".into(), AlertKind::Success, start);
        assert!(a < b && b < c);
    }

    #[test]
    fn entries_coexist_independently() {
        let mut queue = AlertQueue::new(Duration::from_secs(5));
        let start = Instant::now();
        queue.push_at("early".into(), AlertKind::Success, start);
        queue.push_at("late".into(), AlertKind::Success, start + Duration::from_secs(3));

        assert!(queue.prune(start + Duration::from_millis(5001)));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.iter().next().unwrap().message, "late");
    }

    #[test]
    fn dismiss_latest_pops_the_newest() {
        let mut queue = AlertQueue::default();
        let start = Instant::now();
        queue.push_at("old".into(), AlertKind::Success, start);
        queue.push_at("new".into(), AlertKind::Error, start);
        assert!(queue.dismiss_latest());
        assert_eq!(queue.iter().next().unwrap().message, "old");
        assert!(queue.dismiss_latest());
        assert!(!queue.dismiss_latest());
    }
}
