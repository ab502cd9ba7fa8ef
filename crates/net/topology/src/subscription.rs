use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Handle on a topology's event task. Dropping it stops the task.
#[derive(Debug)]
#[must_use = "dropping the subscription detaches the topology"]
pub struct TopologySubscription {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl TopologySubscription {
    pub(crate) fn new(token: CancellationToken, handle: JoinHandle<()>) -> Self {
        Self {
            token,
            handle: Some(handle),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled() && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the event task and wait for it to exit. No event is processed
    /// after this returns.
    ///
    /// Returns whether the task exited cleanly. A task that panicked, for
    /// example inside a handler callback, is logged and reported as `false`.
    pub async fn detach(mut self) -> bool {
        self.token.cancel();
        let Some(handle) = self.handle.take() else {
            return true;
        };
        match handle.await {
            Ok(()) => true,
            Err(e) => {
                warn!(target: "topology", error = %e, panicked = e.is_panic(), "topology event task failed");
                false
            }
        }
    }
}

impl Drop for TopologySubscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
