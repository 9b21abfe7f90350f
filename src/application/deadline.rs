//! Abort plumbing for a render pass and the single-shot shell deadline.

use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, task::JoinHandle};
use tracing::info;

/// Create a linked abort handle and signal for one render pass.
pub fn abort_pair() -> (AbortHandle, AbortSignal) {
    let (sender, receiver) = watch::channel(false);
    (
        AbortHandle {
            sender: Arc::new(sender),
        },
        AbortSignal { receiver },
    )
}

/// Requests that a render pass stop producing fragments.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl AbortHandle {
    /// Abort the pass. Returns `true` only for the call that flipped the state.
    pub fn abort(&self) -> bool {
        self.sender.send_if_modified(|aborted| {
            if *aborted {
                false
            } else {
                *aborted = true;
                true
            }
        })
    }

    pub fn is_aborted(&self) -> bool {
        *self.sender.borrow()
    }
}

/// Observes abort requests from inside the render pass.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    receiver: watch::Receiver<bool>,
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once the pass has been aborted. Never resolves if every
    /// handle is gone without aborting.
    pub async fn aborted(&mut self) {
        let closed = self.receiver.wait_for(|aborted| *aborted).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

/// Single-shot deadline for shell readiness.
///
/// On expiry the timer aborts the pass exactly once. Disarming or dropping
/// the timer before expiry cancels it, and expiry after the pass was already
/// aborted does nothing.
#[derive(Debug)]
pub struct FallbackTimer {
    task: Option<JoinHandle<()>>,
}

impl FallbackTimer {
    /// Arm the deadline. Must be called from within a tokio runtime.
    pub fn arm(delay: Duration, abort: AbortHandle) -> Self {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if abort.abort() {
                info!(
                    target = "sheetstream::render::deadline",
                    deadline_ms = delay.as_millis() as u64,
                    "render deadline elapsed; handing rendering over to the client"
                );
            }
        });
        Self { task: Some(task) }
    }

    /// Cancel the deadline; called once the pass has completed.
    pub fn disarm(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for FallbackTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_flips_state_once() {
        let (handle, signal) = abort_pair();
        assert!(!signal.is_aborted());

        assert!(handle.abort());
        assert!(!handle.clone().abort());
        assert!(handle.is_aborted());
        assert!(signal.is_aborted());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_aborts_after_its_delay() {
        let (handle, mut signal) = abort_pair();
        let started = tokio::time::Instant::now();
        let _timer = FallbackTimer::arm(Duration::from_millis(250), handle.clone());

        signal.aborted().await;

        assert!(started.elapsed() >= Duration::from_millis(250));
        assert!(handle.is_aborted());
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_timer_never_fires() {
        let (handle, _signal) = abort_pair();
        let timer = FallbackTimer::arm(Duration::from_millis(250), handle.clone());
        timer.disarm();

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(!handle.is_aborted());
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_after_manual_abort_is_a_no_op() {
        let (handle, _signal) = abort_pair();
        let _timer = FallbackTimer::arm(Duration::from_millis(250), handle.clone());
        assert!(handle.abort());

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(handle.is_aborted());
        assert!(!handle.abort());
    }
}
