//! Last-request-wins bookkeeping for background tasks.

use crate::cancel::CancelToken;

/// Tracks the newest request of one kind.
///
/// Starting a request cancels the previous one. Results carry the sequence
/// number they were started with; anything but the newest is stale.
#[derive(Debug, Default)]
pub(crate) struct TaskSlot {
    sequence: u64,
    in_flight: Option<CancelToken>,
}

impl TaskSlot {
    /// Cancel the running request, if any, and start a new one.
    pub(crate) fn begin(&mut self) -> (u64, CancelToken) {
        self.cancel();
        self.sequence += 1;
        let token = CancelToken::new();
        self.in_flight = Some(token.clone());
        (self.sequence, token)
    }

    /// Accept the result of request `sequence`; `false` when it is stale.
    pub(crate) fn complete(&mut self, sequence: u64) -> bool {
        if sequence != self.sequence || self.in_flight.is_none() {
            return false;
        }
        self.in_flight = None;
        true
    }

    pub(crate) fn cancel(&mut self) {
        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.in_flight.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_request_cancels_previous() {
        let mut slot = TaskSlot::default();
        let (first, first_token) = slot.begin();
        let (second, second_token) = slot.begin();

        assert!(first_token.is_cancelled());
        assert!(!second_token.is_cancelled());
        assert!(!slot.complete(first));
        assert!(slot.complete(second));
        assert!(!slot.is_running());
    }

    #[test]
    fn test_result_delivered_once() {
        let mut slot = TaskSlot::default();
        let (sequence, _) = slot.begin();
        assert!(slot.complete(sequence));
        assert!(!slot.complete(sequence));
    }

    #[test]
    fn test_cancel_makes_result_stale() {
        let mut slot = TaskSlot::default();
        let (sequence, token) = slot.begin();
        slot.cancel();
        assert!(token.is_cancelled());
        assert!(!slot.complete(sequence));
    }
}
