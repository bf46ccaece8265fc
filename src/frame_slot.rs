use crate::frame::Frame;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Single-slot, overwrite-on-full frame channel between the camera and a consumer.
///
/// Only the most recently published frame is ever observable: publishing while a
/// frame is still pending replaces it, so the consumer never sees a queue.
#[derive(Clone)]
pub struct FrameSlot {
    sender: Sender<Frame>,
    receiver: Receiver<Frame>,
    stats: Arc<FrameSlotStats>,
}

#[derive(Debug, Default)]
pub struct FrameSlotStats {
    pub frames_published: AtomicU64,
    pub frames_taken: AtomicU64,
    pub frames_dropped: AtomicU64,
}

/// Snapshot of slot statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSlotStatsSnapshot {
    pub frames_published: u64,
    pub frames_taken: u64,
    pub frames_dropped: u64,
}

impl FrameSlot {
    pub fn new() -> Self {
        let (sender, receiver) = channel::bounded(1);
        Self {
            sender,
            receiver,
            stats: Arc::new(FrameSlotStats::default()),
        }
    }

    /// Publish a frame, replacing any frame the consumer has not taken yet
    pub fn publish(&self, frame: Frame) {
        let mut pending = frame;
        loop {
            match self.sender.try_send(pending) {
                Ok(()) => break,
                Err(TrySendError::Full(frame)) => {
                    if let Ok(stale) = self.receiver.try_recv() {
                        trace!("Dropping unconsumed frame {}", stale.id);
                        self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    pending = frame;
                }
                // Both ends live in self, the channel cannot disconnect
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
        self.stats.frames_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Take the pending frame without blocking
    pub fn take_latest(&self) -> Option<Frame> {
        let frame = self.receiver.try_recv().ok()?;
        self.stats.frames_taken.fetch_add(1, Ordering::Relaxed);
        Some(frame)
    }

    /// Block until a frame is published or the timeout elapses
    pub fn wait_latest(&self, timeout: Duration) -> Option<Frame> {
        match self.receiver.recv_timeout(timeout) {
            Ok(frame) => {
                self.stats.frames_taken.fetch_add(1, Ordering::Relaxed);
                Some(frame)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn stats(&self) -> FrameSlotStatsSnapshot {
        FrameSlotStatsSnapshot {
            frames_published: self.stats.frames_published.load(Ordering::Relaxed),
            frames_taken: self.stats.frames_taken.load(Ordering::Relaxed),
            frames_dropped: self.stats.frames_dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::time::SystemTime;

    fn frame(id: u64) -> Frame {
        Frame::new(id, SystemTime::now(), RgbImage::new(2, 2))
    }

    #[test]
    fn test_empty_slot() {
        let slot = FrameSlot::new();
        assert!(slot.take_latest().is_none());
        assert!(slot.wait_latest(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn test_last_frame_wins() {
        let slot = FrameSlot::new();
        for id in 1..=5 {
            slot.publish(frame(id));
        }

        assert_eq!(slot.take_latest().unwrap().id, 5);
        assert!(slot.take_latest().is_none());

        let stats = slot.stats();
        assert_eq!(stats.frames_published, 5);
        assert_eq!(stats.frames_dropped, 4);
        assert_eq!(stats.frames_taken, 1);
    }

    #[test]
    fn test_frame_is_taken_once() {
        let slot = FrameSlot::new();
        slot.publish(frame(1));
        assert_eq!(slot.take_latest().unwrap().id, 1);
        assert!(slot.take_latest().is_none());

        slot.publish(frame(2));
        assert_eq!(slot.wait_latest(Duration::from_millis(10)).unwrap().id, 2);
    }

    #[test]
    fn test_cross_thread_delivery() {
        let slot = FrameSlot::new();
        let producer = slot.clone();
        let handle = std::thread::spawn(move || {
            for id in 0..100 {
                producer.publish(frame(id));
            }
        });
        handle.join().unwrap();

        assert_eq!(slot.take_latest().unwrap().id, 99);
    }
}
