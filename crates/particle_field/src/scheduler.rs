//! Frame scheduling. The engine never decides when frames happen, it asks its host for them.

/// A handle to a requested frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameRequest(pub u64);

/// Something that can call the engine back once, at roughly the next display refresh.
pub trait Scheduler {
    /// Request a single frame callback.
    fn request_frame(&mut self) -> FrameRequest;

    /// Cancel a previously requested frame. Cancelling a frame that has already happened, or
    /// was never requested, does nothing.
    fn cancel_frame(&mut self, request: FrameRequest);
}

/// A scheduler that is stepped by hand. Useful for tests and for rendering without a display.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    /// The ID of the next request.
    next_id: u64,
    /// Requests that haven't been run or cancelled yet.
    pending: Vec<FrameRequest>,
    /// The total number of requests ever made.
    pub requested: usize,
    /// The total number of requests ever cancelled.
    pub cancelled: usize,
}

impl ManualScheduler {
    /// Instantiate
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the oldest outstanding request, as if its frame has just become due.
    pub fn take_due(&mut self) -> Option<FrameRequest> {
        if self.pending.is_empty() {
            return None;
        }
        Some(self.pending.remove(0))
    }

    /// Requests that are still waiting to run.
    #[must_use]
    pub fn pending(&self) -> &[FrameRequest] {
        &self.pending
    }
}

impl Scheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameRequest {
        let request = FrameRequest(self.next_id);
        self.next_id += 1;
        self.requested += 1;
        self.pending.push(request);
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        let before = self.pending.len();
        self.pending.retain(|pending| *pending != request);
        if self.pending.len() < before {
            self.cancelled += 1;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn requests_are_taken_in_order() {
        let mut scheduler = ManualScheduler::new();
        let first = scheduler.request_frame();
        let second = scheduler.request_frame();
        assert_ne!(first, second);
        assert_eq!(scheduler.take_due(), Some(first));
        assert_eq!(scheduler.take_due(), Some(second));
        assert_eq!(scheduler.take_due(), None);
        assert_eq!(scheduler.requested, 2);
    }

    #[test]
    fn cancelled_requests_never_become_due() {
        let mut scheduler = ManualScheduler::new();
        let request = scheduler.request_frame();
        scheduler.cancel_frame(request);
        scheduler.cancel_frame(request);
        assert_eq!(scheduler.take_due(), None);
        assert_eq!(scheduler.cancelled, 1);
    }
}
