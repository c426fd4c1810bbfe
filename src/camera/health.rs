use super::capture::CaptureState;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Camera status as seen from outside the capture loop.
///
/// Written only by the capture loop; read by status and health endpoints.
#[derive(Debug)]
pub struct CameraStatus {
    available: AtomicBool,
    frames_captured: AtomicU64,
    read_failures: AtomicU64,
    open_attempts: AtomicU64,
    state: Mutex<CaptureState>,
}

/// Point-in-time copy of [`CameraStatus`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraStatusSnapshot {
    pub available: bool,
    pub state: CaptureState,
    pub frames_captured: u64,
    pub read_failures: u64,
    pub open_attempts: u64,
}

impl CameraStatus {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(false),
            frames_captured: AtomicU64::new(0),
            read_failures: AtomicU64::new(0),
            open_attempts: AtomicU64::new(0),
            state: Mutex::new(CaptureState::WaitingForDevice),
        }
    }

    /// Whether the capture loop currently holds an open device
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> CaptureState {
        *self.state.lock()
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured.load(Ordering::Relaxed)
    }

    pub(crate) fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    pub(crate) fn set_state(&self, state: CaptureState) {
        *self.state.lock() = state;
    }

    pub(crate) fn record_frame(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_read_failure(&self) {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_open_attempt(&self) {
        self.open_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CameraStatusSnapshot {
        CameraStatusSnapshot {
            available: self.is_available(),
            state: self.state(),
            frames_captured: self.frames_captured(),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            open_attempts: self.open_attempts.load(Ordering::Relaxed),
        }
    }
}

impl Default for CameraStatus {
    fn default() -> Self {
        Self::new()
    }
}
