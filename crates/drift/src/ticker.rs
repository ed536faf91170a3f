//! Schedules the engine's frames on tokio's clock, at the user's configured frame rate.

use particle_field::scheduler::{FrameRequest, Scheduler};

/// The number of microseconds in a second.
const ONE_SECOND_IN_MICROSECONDS: u64 = 1_000_000;

/// A frame scheduler that fires at most one frame at a time, roughly every `1 / frame_rate`
/// seconds.
pub(crate) struct FrameTicker {
    /// The target frame rate.
    frame_rate: u32,
    /// The time at which the previous frame fired.
    last_frame_tick: std::time::Instant,
    /// The ID for the next request.
    next_id: u64,
    /// The request waiting to fire.
    pending: Option<FrameRequest>,
}

impl FrameTicker {
    /// Instantiate
    pub fn new(frame_rate: u32) -> Self {
        Self {
            frame_rate: frame_rate.max(1),
            last_frame_tick: std::time::Instant::now(),
            next_id: 0,
            pending: None,
        }
    }

    /// Change the frame rate. Takes effect from the next frame.
    pub fn set_frame_rate(&mut self, frame_rate: u32) {
        self.frame_rate = frame_rate.max(1);
    }

    /// The time between frames.
    pub fn interval(&self) -> std::time::Duration {
        let micros = ONE_SECOND_IN_MICROSECONDS.wrapping_div(self.frame_rate.into());
        std::time::Duration::from_micros(micros)
    }

    /// Sleep until the pending request is due and hand it over. Returns `None` straight away when
    /// nothing has been requested.
    ///
    /// It's safe to drop this future before it completes, eg in a `tokio::select!`. The request
    /// stays pending.
    pub async fn due(&mut self) -> Option<FrameRequest> {
        let request = self.pending?;
        if let Some(wait) = self.interval().checked_sub(self.last_frame_tick.elapsed()) {
            tokio::time::sleep(wait).await;
        }
        self.last_frame_tick = std::time::Instant::now();
        self.pending = None;
        Some(request)
    }
}

impl Scheduler for FrameTicker {
    fn request_frame(&mut self) -> FrameRequest {
        let request = FrameRequest(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        if let Some(previous) = self.pending.replace(request) {
            tracing::trace!("Frame request {previous:?} replaced by {request:?}");
        }
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if self.pending == Some(request) {
            self.pending = None;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn interval_follows_the_frame_rate() {
        let mut ticker = FrameTicker::new(50);
        assert_eq!(ticker.interval(), std::time::Duration::from_millis(20));
        ticker.set_frame_rate(0);
        assert_eq!(ticker.interval(), std::time::Duration::from_secs(1));
    }

    #[tokio::test]
    async fn fires_requested_frames_once() {
        let mut ticker = FrameTicker::new(1000);
        assert_eq!(ticker.due().await, None);

        let request = ticker.request_frame();
        assert_eq!(ticker.due().await, Some(request));
        assert_eq!(ticker.due().await, None);
    }

    #[tokio::test]
    async fn waits_for_the_next_frame() {
        let mut ticker = FrameTicker::new(20);
        ticker.request_frame();
        ticker.due().await;

        let start = std::time::Instant::now();
        ticker.request_frame();
        ticker.due().await;
        assert!(start.elapsed() >= std::time::Duration::from_millis(40));
    }

    #[tokio::test]
    async fn cancelled_frames_never_fire() {
        let mut ticker = FrameTicker::new(1000);
        let request = ticker.request_frame();
        ticker.cancel_frame(request);
        assert_eq!(ticker.due().await, None);

        let other = ticker.request_frame();
        ticker.cancel_frame(request);
        assert_eq!(ticker.due().await, Some(other));
    }
}
