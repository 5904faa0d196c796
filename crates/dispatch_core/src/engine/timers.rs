use std::collections::HashMap;

use tokio::task::AbortHandle;

use crate::requests::RequestId;

/// An armed offer timeout. `attempt` is the request's offer attempt the timer
/// was armed for; a timer firing for an older attempt is stale.
#[derive(Debug)]
struct OfferTimer {
    attempt: u32,
    handle: AbortHandle,
}

/// At most one armed timer per request.
#[derive(Debug, Default)]
pub(crate) struct OfferTimers {
    armed: HashMap<RequestId, OfferTimer>,
}

impl OfferTimers {
    /// Track a freshly spawned timer, aborting any timer it replaces.
    pub(crate) fn arm(&mut self, id: RequestId, attempt: u32, handle: AbortHandle) {
        if let Some(previous) = self.armed.insert(id, OfferTimer { attempt, handle }) {
            previous.handle.abort();
        }
    }

    /// Abort and forget the timer for `id`.
    pub(crate) fn cancel(&mut self, id: &RequestId) -> bool {
        match self.armed.remove(id) {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Abort the timer for `id` only if it was armed for `attempt`.
    #[cfg(feature = "test-helpers")]
    pub(crate) fn cancel_attempt(&mut self, id: &RequestId, attempt: u32) {
        if self.armed.get(id).is_some_and(|timer| timer.attempt == attempt) {
            self.cancel(id);
        }
    }

    /// Forget the timer for `id` without aborting it. Called from inside the
    /// firing timer task, which must not abort itself.
    pub(crate) fn disarm_fired(&mut self, id: &RequestId, attempt: u32) {
        if self.armed.get(id).is_some_and(|timer| timer.attempt == attempt) {
            self.armed.remove(id);
        }
    }

    pub(crate) fn cancel_all(&mut self) -> usize {
        let count = self.armed.len();
        for (_, timer) in self.armed.drain() {
            timer.handle.abort();
        }
        count
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self, id: &RequestId) -> bool {
        self.armed.contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.armed.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn id(sequence: u64) -> RequestId {
        RequestId {
            created_ms: 0,
            sequence,
        }
    }

    fn sleeper() -> tokio::task::JoinHandle<()> {
        tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        })
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_aborts_the_previous_timer() {
        let mut timers = OfferTimers::default();
        let first = sleeper();
        timers.arm(id(1), 1, first.abort_handle());
        let second = sleeper();
        timers.arm(id(1), 2, second.abort_handle());

        assert!(first.await.is_err_and(|e| e.is_cancelled()));
        assert_eq!(timers.len(), 1);
        assert!(timers.cancel(&id(1)));
        assert!(second.await.is_err_and(|e| e.is_cancelled()));
        assert!(!timers.cancel(&id(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_fired_ignores_other_attempts() {
        let mut timers = OfferTimers::default();
        let task = sleeper();
        timers.arm(id(7), 2, task.abort_handle());

        timers.disarm_fired(&id(7), 1);
        assert!(timers.is_armed(&id(7)));
        timers.disarm_fired(&id(7), 2);
        assert!(!timers.is_armed(&id(7)));

        task.abort();
        assert_eq!(timers.cancel_all(), 0);
    }
}
