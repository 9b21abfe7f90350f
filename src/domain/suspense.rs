//! Simulated data dependency consulted synchronously by the render pass.
//!
//! A read never blocks: it reports [`DataState::Pending`] with a wait handle
//! while the simulated fetch is in flight, and the render pass decides how to
//! wait on it.

use std::{
    fmt,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::sync::watch;
use tracing::debug;

use crate::util::lock::mutex_lock;

const SOURCE: &str = "domain::suspense";

/// Outcome of reading a suspending data source.
#[derive(Debug, Clone)]
pub enum DataState {
    /// The data is available; rendering may continue past this read.
    Ready,
    /// The data is not ready; resume the read once the handle resolves.
    Pending(WaitHandle),
}

impl DataState {
    pub fn is_ready(&self) -> bool {
        matches!(self, DataState::Ready)
    }
}

/// Shared, resolvable token identifying one in-flight wait.
///
/// Clones compare equal to each other and to nothing else.
#[derive(Clone)]
pub struct WaitHandle {
    inner: Arc<watch::Sender<bool>>,
}

impl WaitHandle {
    pub(crate) fn new() -> Self {
        let (sender, _receiver) = watch::channel(false);
        Self {
            inner: Arc::new(sender),
        }
    }

    /// Wait until the handle resolves. Returns immediately if it already has.
    pub async fn wait(&self) {
        let mut receiver = self.inner.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting.
        let _ = receiver.wait_for(|ready| *ready).await;
    }

    pub fn is_resolved(&self) -> bool {
        *self.inner.borrow()
    }

    pub(crate) fn resolve(&self) {
        self.inner.send_replace(true);
    }
}

impl PartialEq for WaitHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for WaitHandle {}

impl fmt::Debug for WaitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitHandle")
            .field("id", &Arc::as_ptr(&self.inner))
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[derive(Debug)]
enum FetchState {
    Idle,
    InFlight(WaitHandle),
    Done,
}

/// Data source that becomes ready a fixed delay after its first read.
///
/// One instance per render session; clones share the same fetch state.
#[derive(Debug, Clone)]
pub struct ServerData {
    delay: Duration,
    state: Arc<Mutex<FetchState>>,
}

impl ServerData {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: Arc::new(Mutex::new(FetchState::Idle)),
        }
    }

    /// Read the data.
    ///
    /// The first read starts the simulated fetch and suspends; reads while
    /// the fetch is in flight suspend on the same handle; once the delay has
    /// elapsed every read is [`DataState::Ready`].
    ///
    /// Must be called from within a tokio runtime.
    pub fn read(&self) -> DataState {
        let mut state = mutex_lock(&self.state, SOURCE, "read");
        match &*state {
            FetchState::Done => DataState::Ready,
            FetchState::InFlight(handle) => DataState::Pending(handle.clone()),
            FetchState::Idle => {
                let handle = WaitHandle::new();
                *state = FetchState::InFlight(handle.clone());
                self.spawn_fetch(handle.clone());
                DataState::Pending(handle)
            }
        }
    }

    fn spawn_fetch(&self, handle: WaitHandle) {
        let state = Arc::clone(&self.state);
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            *mutex_lock(&state, SOURCE, "resolve") = FetchState::Done;
            handle.resolve();
            debug!(
                target = "sheetstream::data",
                delay_ms = delay.as_millis() as u64,
                "simulated fetch completed"
            );
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(500);

    fn expect_pending(state: DataState) -> WaitHandle {
        match state {
            DataState::Pending(handle) => handle,
            DataState::Ready => panic!("expected the read to suspend"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_read_always_suspends() {
        let data = ServerData::new(DELAY);
        let handle = expect_pending(data.read());
        assert!(!handle.is_resolved());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_delay_still_suspends_once() {
        let data = ServerData::new(Duration::ZERO);
        let handle = expect_pending(data.read());
        handle.wait().await;
        assert!(data.read().is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn reads_before_the_delay_share_one_handle() {
        let data = ServerData::new(DELAY);
        let first = expect_pending(data.read());

        tokio::time::sleep(DELAY / 2).await;
        let second = expect_pending(data.read());

        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn reads_after_the_delay_are_ready_from_then_on() {
        let data = ServerData::new(DELAY);
        let handle = expect_pending(data.read());

        tokio::time::sleep(DELAY + Duration::from_millis(1)).await;

        assert!(handle.is_resolved());
        assert!(data.read().is_ready());
        assert!(data.read().is_ready());
        assert!(data.clone().read().is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_on_the_handle_resumes_after_the_delay() {
        let data = ServerData::new(DELAY);
        let handle = expect_pending(data.read());
        let started = tokio::time::Instant::now();

        handle.wait().await;

        assert!(started.elapsed() >= DELAY);
        assert!(data.read().is_ready());
        handle.wait().await;
    }

    #[test]
    fn distinct_handles_are_not_equal() {
        assert_ne!(WaitHandle::new(), WaitHandle::new());
    }
}
