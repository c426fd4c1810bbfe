use crate::frame::Frame;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, trace};

/// Holder of the single most recent frame.
///
/// Publish and snapshot each take the lock for the duration of one `Option`
/// swap or `Arc` clone, so a reader sees either nothing or a frame whose
/// publish has fully completed. Nothing expensive ever runs under the lock.
pub struct SharedFrameSlot {
    latest: Mutex<Option<Frame>>,
    stats: SlotStats,
}

/// Counters for the health endpoint
#[derive(Debug, Default)]
pub struct SlotStats {
    pub frames_published: AtomicU64,
    pub snapshots_taken: AtomicU64,
}

/// Snapshot of slot statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotStatsSnapshot {
    pub frames_published: u64,
    pub snapshots_taken: u64,
    pub latest_frame_id: Option<u64>,
}

impl SharedFrameSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self {
            latest: Mutex::new(None),
            stats: SlotStats::default(),
        }
    }

    /// Replace the current frame
    pub fn publish(&self, frame: Frame) {
        trace!("Publishing frame {} to shared slot", frame.id);
        *self.latest.lock() = Some(frame);
        self.stats.frames_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Most recent frame, if one was ever published
    pub fn snapshot(&self) -> Option<Frame> {
        let frame = self.latest.lock().clone();
        self.stats.snapshots_taken.fetch_add(1, Ordering::Relaxed);
        frame
    }

    /// Whether the slot has ever been populated
    pub fn has_frame(&self) -> bool {
        self.latest.lock().is_some()
    }

    pub fn stats(&self) -> SlotStatsSnapshot {
        SlotStatsSnapshot {
            frames_published: self.stats.frames_published.load(Ordering::Relaxed),
            snapshots_taken: self.stats.snapshots_taken.load(Ordering::Relaxed),
            latest_frame_id: self.latest.lock().as_ref().map(|f| f.id),
        }
    }
}

impl Default for SharedFrameSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// One-way latch flipped when the camera produces its first frame
pub struct ReadinessSignal {
    tx: watch::Sender<bool>,
}

impl ReadinessSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Set the latch. Returns `true` only for the call that flipped it.
    pub fn set(&self) -> bool {
        let flipped = self.tx.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        });
        if flipped {
            debug!("Readiness signal set");
        }
        flipped
    }

    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait up to `timeout` for the latch. Returns whether it is set.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let mut rx = self.tx.subscribe();
        let woke = tokio::time::timeout(timeout, async {
            rx.wait_for(|ready| *ready).await.is_ok()
        })
        .await;

        // Sender lives in self, so the channel cannot close while we wait
        matches!(woke, Ok(true)) || self.is_set()
    }
}

impl Default for ReadinessSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FRAME_HEIGHT, FRAME_WIDTH};
    use image::{Rgb, RgbImage};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::time::SystemTime;

    fn uniform_frame(id: u64) -> Frame {
        let value = (id % 251) as u8;
        Frame::new(
            id,
            SystemTime::now(),
            RgbImage::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, Rgb([value, value, value])),
        )
    }

    #[test]
    fn test_empty_slot() {
        let slot = SharedFrameSlot::new();

        assert!(slot.snapshot().is_none());
        assert!(!slot.has_frame());
        assert_eq!(slot.stats().latest_frame_id, None);
    }

    #[test]
    fn test_publish_replaces_previous_frame() {
        let slot = SharedFrameSlot::new();
        slot.publish(uniform_frame(1));
        slot.publish(uniform_frame(2));

        let frame = slot.snapshot().unwrap();
        assert_eq!(frame.id, 2);
        assert!(slot.has_frame());

        let stats = slot.stats();
        assert_eq!(stats.frames_published, 2);
        assert_eq!(stats.latest_frame_id, Some(2));
    }

    #[test]
    fn test_concurrent_readers_never_observe_torn_frames() {
        let slot = Arc::new(SharedFrameSlot::new());
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let slot = Arc::clone(&slot);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                for id in 1..=300 {
                    slot.publish(uniform_frame(id));
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let slot = Arc::clone(&slot);
                let done = Arc::clone(&done);
                std::thread::spawn(move || {
                    let mut last_id = 0;
                    while !done.load(Ordering::SeqCst) {
                        if let Some(frame) = slot.snapshot() {
                            assert_eq!(frame.width(), FRAME_WIDTH);
                            assert_eq!(frame.height(), FRAME_HEIGHT);
                            let expected = (frame.id % 251) as u8;
                            assert!(frame.image.pixels().all(|p| p.0 == [expected; 3]));
                            // A single reader only ever moves forward
                            assert!(frame.id >= last_id);
                            last_id = frame.id;
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }

        assert_eq!(slot.snapshot().unwrap().id, 300);
    }

    #[test]
    fn test_readiness_flips_exactly_once_across_threads() {
        let readiness = Arc::new(ReadinessSignal::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let readiness = Arc::clone(&readiness);
                std::thread::spawn(move || (0..50).filter(|_| readiness.set()).count())
            })
            .collect();

        let flips: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(flips, 1);
        assert!(readiness.is_set());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_when_never_set() {
        let readiness = ReadinessSignal::new();

        let started = tokio::time::Instant::now();
        assert!(!readiness.wait(Duration::from_secs(10)).await);
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_returns_when_set_later() {
        let readiness = Arc::new(ReadinessSignal::new());

        let setter = {
            let readiness = Arc::clone(&readiness);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(2)).await;
                readiness.set();
            })
        };

        let started = tokio::time::Instant::now();
        assert!(readiness.wait(Duration::from_secs(10)).await);
        assert!(started.elapsed() < Duration::from_secs(10));
        setter.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_every_waiter_wakes_on_a_single_set() {
        let readiness = Arc::new(ReadinessSignal::new());

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let readiness = Arc::clone(&readiness);
                tokio::spawn(async move { readiness.wait(Duration::from_secs(5)).await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(readiness.set());

        for waiter in waiters {
            assert!(waiter.await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_wait_is_immediate_when_already_set() {
        let readiness = ReadinessSignal::new();
        readiness.set();

        assert!(readiness.wait(Duration::ZERO).await);
    }
}
