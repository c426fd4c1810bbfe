use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Stream server statistics shared by all sessions
#[derive(Debug, Default)]
pub struct StreamStats {
    active_sessions: AtomicU64,
    total_sessions: AtomicU64,
    parts_sent: AtomicU64,
    bytes_sent: AtomicU64,
    encode_errors: AtomicU64,
}

/// Point-in-time copy of [`StreamStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamStatsSnapshot {
    pub active_sessions: u64,
    pub total_sessions: u64,
    pub parts_sent: u64,
    pub bytes_sent: u64,
    pub encode_errors: u64,
}

impl StreamStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new viewer. The session counts as active until the
    /// returned guard is dropped.
    pub fn open_session(self: &Arc<Self>) -> (u64, ActiveSession) {
        let id = self.total_sessions.fetch_add(1, Ordering::Relaxed) + 1;
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
        (
            id,
            ActiveSession {
                stats: Arc::clone(self),
            },
        )
    }

    pub fn record_part(&self, bytes: usize) {
        self.parts_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_encode_error(&self) {
        self.encode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn active_sessions(&self) -> u64 {
        self.active_sessions.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StreamStatsSnapshot {
        StreamStatsSnapshot {
            active_sessions: self.active_sessions(),
            total_sessions: self.total_sessions.load(Ordering::Relaxed),
            parts_sent: self.parts_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            encode_errors: self.encode_errors.load(Ordering::Relaxed),
        }
    }
}

/// Decrements the active session count on drop
#[derive(Debug)]
pub struct ActiveSession {
    stats: Arc<StreamStats>,
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.stats.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }
}
