//! Frame markers and render wakeups
//!
//! The source marks the start and end of compound updates. Only a frame
//! end wakes the render side; starts are markers for latency accounting
//! further downstream.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{trace, warn};

use crate::sink::FrameAcknowledger;

/// Action carried by a frame marker order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameAction {
    Start,
    End,
}

pub struct FrameCoordinator {
    wakeup: Notify,
    completed: AtomicU64,
    shutdown: AtomicBool,
    ack_threshold: u32,
    acknowledger: Option<Arc<dyn FrameAcknowledger>>,
}

impl FrameCoordinator {
    /// `ack_threshold` of 0 disables frame acknowledgement.
    pub fn new(ack_threshold: u32, acknowledger: Option<Arc<dyn FrameAcknowledger>>) -> Self {
        Self {
            wakeup: Notify::new(),
            completed: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
            ack_threshold,
            acknowledger,
        }
    }

    pub fn mark_frame(&self, starting: bool) {
        if starting {
            trace!("frame start");
            return;
        }
        let frames = self.completed.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(frames, "frame complete");
        self.wakeup.notify_one();
    }

    /// Frame marker primary order.
    pub fn frame_marker(&self, action: FrameAction) {
        self.mark_frame(action == FrameAction::Start);
    }

    /// Surface frame marker command. Anything other than an explicit end
    /// counts as a start. Every marker is acknowledged upstream when
    /// acknowledgement is enabled.
    pub fn surface_frame_marker(&self, frame_id: u32, action: FrameAction) {
        self.mark_frame(action != FrameAction::End);

        if self.ack_threshold == 0 {
            return;
        }
        if let Some(acknowledger) = &self.acknowledger {
            if let Err(e) = acknowledger.acknowledge(frame_id) {
                warn!(frame_id, "frame acknowledgement failed: {e:#}");
            }
        }
    }

    /// Wake the render side without completing a frame, for sources that
    /// never send frame markers.
    pub fn notify_modified(&self) {
        self.wakeup.notify_one();
    }

    pub fn completed_frames(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// Wait for the next wakeup. Returns false once shut down. Wakeups that
    /// arrive while nobody waits are kept, so none is lost.
    pub async fn wait_for_frame(&self) -> bool {
        if self.is_shut_down() {
            return false;
        }
        self.wakeup.notified().await;
        !self.is_shut_down()
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.wakeup.notify_one();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for FrameCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCoordinator")
            .field("completed", &self.completed_frames())
            .field("shutdown", &self.is_shut_down())
            .field("ack_threshold", &self.ack_threshold)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Acks(Mutex<Vec<u32>>);

    impl FrameAcknowledger for Acks {
        fn acknowledge(&self, frame_id: u32) -> anyhow::Result<()> {
            self.0.lock().push(frame_id);
            Ok(())
        }
    }

    #[test]
    fn test_only_end_counts() {
        let frames = FrameCoordinator::new(0, None);
        frames.mark_frame(true);
        assert_eq!(frames.completed_frames(), 0);
        frames.frame_marker(FrameAction::End);
        assert_eq!(frames.completed_frames(), 1);
    }

    #[tokio::test]
    async fn test_wakeup_before_wait_is_kept() {
        let frames = FrameCoordinator::new(0, None);
        frames.mark_frame(false);
        let woke = tokio::time::timeout(Duration::from_secs(1), frames.wait_for_frame()).await;
        assert_eq!(woke.ok(), Some(true));
    }

    #[tokio::test]
    async fn test_start_does_not_wake() {
        let frames = FrameCoordinator::new(0, None);
        frames.mark_frame(true);
        let woke = tokio::time::timeout(Duration::from_millis(50), frames.wait_for_frame()).await;
        assert!(woke.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_ends_wait() {
        let frames = Arc::new(FrameCoordinator::new(0, None));
        let waiter = {
            let frames = Arc::clone(&frames);
            tokio::spawn(async move { frames.wait_for_frame().await })
        };
        frames.shutdown();
        assert!(!waiter.await.unwrap());
        assert!(!frames.wait_for_frame().await);
    }

    #[test]
    fn test_acknowledgement_needs_threshold() {
        let acks = Arc::new(Acks::default());
        let shared: Arc<dyn FrameAcknowledger> = acks.clone();
        let disabled = FrameCoordinator::new(0, Some(shared.clone()));
        disabled.surface_frame_marker(7, FrameAction::End);
        assert!(acks.0.lock().is_empty());

        let enabled = FrameCoordinator::new(2, Some(shared));
        enabled.surface_frame_marker(8, FrameAction::Start);
        enabled.surface_frame_marker(8, FrameAction::End);
        assert_eq!(*acks.0.lock(), vec![8, 8]);
        assert_eq!(enabled.completed_frames(), 1);
    }
}
