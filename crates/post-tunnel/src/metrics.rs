//! Counters for engine activity.
//!
//! ## Usage
//!
//! ```ignore
//! let snapshot = engine.stats();
//! println!("{} posted, {} timed out", snapshot.posted, snapshot.timeouts);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters, one set per engine.
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Requests broadcast by `post`
    pub posted: AtomicU64,
    /// Answer futures resolved with data
    pub answers_received: AtomicU64,
    /// Answer futures rejected by timeout
    pub timeouts: AtomicU64,
    /// Own frames swallowed on their way back
    pub echoes_suppressed: AtomicU64,
    /// Frames that were not protocol traffic
    pub foreign_frames: AtomicU64,
    /// Envelopes dropped because they belong to another tunnel
    pub tunnel_filtered: AtomicU64,
    /// Answers that matched no responder
    pub orphan_answers: AtomicU64,
    /// Answers broadcast by local handlers
    pub answers_sent: AtomicU64,
}

impl EngineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            posted: self.posted.load(Ordering::Relaxed),
            answers_received: self.answers_received.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            echoes_suppressed: self.echoes_suppressed.load(Ordering::Relaxed),
            foreign_frames: self.foreign_frames.load(Ordering::Relaxed),
            tunnel_filtered: self.tunnel_filtered.load(Ordering::Relaxed),
            orphan_answers: self.orphan_answers.load(Ordering::Relaxed),
            answers_sent: self.answers_sent.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of `EngineStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub posted: u64,
    pub answers_received: u64,
    pub timeouts: u64,
    pub echoes_suppressed: u64,
    pub foreign_frames: u64,
    pub tunnel_filtered: u64,
    pub orphan_answers: u64,
    pub answers_sent: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = EngineStats::new();
        EngineStats::bump(&stats.posted);
        EngineStats::bump(&stats.posted);
        EngineStats::add(&stats.answers_received, 3);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.posted, 2);
        assert_eq!(snapshot.answers_received, 3);
        assert_eq!(snapshot.timeouts, 0);
    }

    #[test]
    fn test_default_snapshot_is_zero() {
        assert_eq!(EngineStats::default().snapshot(), StatsSnapshot::default());
    }
}
