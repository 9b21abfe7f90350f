//! Per-request render session state.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use metrics::counter;
use tracing::error;

use crate::{
    config::RenderSettings,
    domain::{error::RenderError, styles::StyleCollector, suspense::ServerData},
};

use super::deadline::{AbortHandle, AbortSignal, abort_pair};

/// Everything one request's render owns: the style collector, the data
/// source, the abort pair and the error flag. Never shared across requests.
#[derive(Debug)]
pub struct RenderSession {
    styles: StyleCollector,
    data: ServerData,
    abort: AbortHandle,
    signal: AbortSignal,
    observer: ErrorObserver,
}

impl RenderSession {
    pub fn new(
        request_id: impl Into<String>,
        url: impl Into<String>,
        settings: &RenderSettings,
    ) -> Self {
        let (abort, signal) = abort_pair();
        Self {
            styles: StyleCollector::new(),
            data: ServerData::new(settings.data_delay),
            abort,
            signal,
            observer: ErrorObserver::new(request_id.into(), url.into()),
        }
    }

    pub fn styles(&self) -> StyleCollector {
        self.styles.clone()
    }

    pub fn data(&self) -> ServerData {
        self.data.clone()
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn abort_signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    pub fn observer(&self) -> ErrorObserver {
        self.observer.clone()
    }

    pub fn had_error(&self) -> bool {
        self.observer.had_error()
    }

    pub fn was_aborted(&self) -> bool {
        self.abort.is_aborted()
    }

    pub fn request_id(&self) -> &str {
        &self.observer.inner.request_id
    }

    pub fn url(&self) -> &str {
        &self.observer.inner.url
    }

    /// Record that headers have been committed. Errors observed from now on
    /// can no longer change the response status.
    pub fn mark_shell_sent(&self) {
        self.observer.inner.shell_sent.store(true, Ordering::SeqCst);
    }

    /// Release session resources once the response has ended.
    ///
    /// The collector is closed here and not on abort: the takeover shell and
    /// the abort tail are rendered after the deadline and still need their CSS.
    pub fn teardown(&self) {
        self.styles.close();
    }
}

#[derive(Debug)]
struct ObserverState {
    request_id: String,
    url: String,
    had_error: AtomicBool,
    shell_sent: AtomicBool,
}

/// Receives render errors for a session, sets its error flag and logs them.
#[derive(Debug, Clone)]
pub struct ErrorObserver {
    inner: Arc<ObserverState>,
}

impl ErrorObserver {
    fn new(request_id: String, url: String) -> Self {
        Self {
            inner: Arc::new(ObserverState {
                request_id,
                url,
                had_error: AtomicBool::new(false),
                shell_sent: AtomicBool::new(false),
            }),
        }
    }

    pub fn observe(&self, err: &RenderError) {
        self.inner.had_error.store(true, Ordering::SeqCst);
        counter!("sheetstream_render_error_total").increment(1);

        if self.inner.shell_sent.load(Ordering::SeqCst) {
            error!(
                target = "sheetstream::render::session",
                request_id = %self.inner.request_id,
                url = %self.inner.url,
                error = %err,
                "render error after shell; status already committed"
            );
        } else {
            error!(
                target = "sheetstream::render::session",
                request_id = %self.inner.request_id,
                url = %self.inner.url,
                error = %err,
                "render error before shell"
            );
        }
    }

    pub fn had_error(&self) -> bool {
        self.inner.had_error.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn session() -> RenderSession {
        let settings = RenderSettings {
            data_delay: Duration::from_millis(10),
            abort_delay: Duration::from_millis(50),
        };
        RenderSession::new("req-1", "/post", &settings)
    }

    #[test]
    fn collector_keeps_draining_after_abort() {
        let session = session();
        let styles = session.styles();
        assert!(session.abort_handle().abort());
        assert!(session.was_aborted());

        styles.record_rule(".sc-a{color:red;}");
        let css = styles.drain_css();
        assert!(css.contains(".sc-a{color:red;}"));
        styles.clear_drained();
        assert_eq!(styles.pending_len(), 0);
        assert!(!styles.is_closed());
    }

    #[test]
    fn teardown_closes_collector() {
        let session = session();
        let styles = session.styles();
        styles.record_rule(".sc-b{color:green;}");

        session.teardown();

        assert!(styles.is_closed());
        assert_eq!(styles.drain_css(), "");
        styles.record_rule(".sc-c{color:blue;}");
        assert_eq!(styles.len(), 1);
    }
}
