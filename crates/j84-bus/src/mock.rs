//! Mock CAN bus for testing.
//!
//! Supports scripted frame queues and frame recording. An empty queue
//! sleeps for the full receive timeout on the tokio clock before reporting
//! a timeout, so tests with a paused clock see realistic timing.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{J1939Error, J1939Result};
use crate::interface::Bus;
use crate::types::CanFrame;

/// Mock bus with scripted frames and sent-frame recording.
pub struct MockBus {
    /// Queued frames returned by `recv_frame` (FIFO order).
    frames: Mutex<Vec<CanFrame>>,
    /// All frames passed to `send_frame` (for test assertions).
    sent_frames: Mutex<Vec<CanFrame>>,
}

impl MockBus {
    /// Create a new mock with no queued frames.
    pub fn new() -> Self {
        Self {
            frames: Mutex::new(Vec::new()),
            sent_frames: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock pre-loaded with frames.
    pub fn with_frames(frames: Vec<CanFrame>) -> Self {
        Self {
            frames: Mutex::new(frames),
            sent_frames: Mutex::new(Vec::new()),
        }
    }

    /// Queue an additional frame.
    pub fn queue_frame(&self, frame: CanFrame) {
        self.frames.lock().unwrap().push(frame);
    }

    /// Queue several frames.
    pub fn queue_frames(&self, frames: impl IntoIterator<Item = CanFrame>) {
        self.frames.lock().unwrap().extend(frames);
    }

    /// Get copies of all frames that were sent.
    pub fn sent_frames(&self) -> Vec<CanFrame> {
        self.sent_frames.lock().unwrap().clone()
    }

    /// Get the last sent frame, if any.
    pub fn last_sent(&self) -> Option<CanFrame> {
        self.sent_frames.lock().unwrap().last().cloned()
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Bus for MockBus {
    async fn send_frame(&self, frame: &CanFrame) -> J1939Result<()> {
        self.sent_frames.lock().unwrap().push(frame.clone());
        Ok(())
    }

    async fn recv_frame(&self, timeout: Duration) -> J1939Result<CanFrame> {
        let next = {
            let mut frames = self.frames.lock().unwrap();
            if frames.is_empty() {
                None
            } else {
                Some(frames.remove(0))
            }
        };
        match next {
            Some(frame) => Ok(frame),
            None => {
                tokio::time::sleep(timeout).await;
                Err(J1939Error::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_sent_frames() {
        let mock = MockBus::new();
        let frame = CanFrame::new(0x18EA00F9, vec![0xCE, 0xFE, 0x00]);
        mock.send_frame(&frame).await.unwrap();

        let sent = mock.sent_frames();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, 0x18EA00F9);
        assert_eq!(mock.last_sent(), Some(frame));
    }

    #[tokio::test]
    async fn returns_queued_frames() {
        let frame = CanFrame::new(0x18FECE00, vec![0, 0, 0x13, 0, 0, 0, 0, 0]);
        let mock = MockBus::with_frames(vec![frame.clone()]);

        let received = mock.recv_frame(Duration::from_millis(100)).await.unwrap();
        assert_eq!(received, frame);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_when_empty() {
        let mock = MockBus::new();
        let start = tokio::time::Instant::now();
        let result = mock.recv_frame(Duration::from_millis(100)).await;
        assert!(matches!(result, Err(J1939Error::Timeout { timeout_ms: 100 })));
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn queue_after_construction() {
        let mock = MockBus::new();
        let frame = CanFrame::new(0x18FECA00, vec![0x00, 0xFF]);
        mock.queue_frame(frame.clone());

        let received = mock.recv_frame(Duration::from_millis(100)).await.unwrap();
        assert_eq!(received, frame);
    }
}
