//! Per-session collection of CSS rules emitted by styled markup.
//!
//! The render pass records rules as a side effect of serializing styled
//! elements; the chunk rewriter drains them in two steps (`drain_css`, then
//! `clear_drained`) so that rules are only consumed once they have actually
//! been placed into an outgoing fragment.

use std::sync::{Arc, Mutex};

use crate::util::lock::mutex_lock;

const SOURCE: &str = "domain::styles";

/// Opening tag of every injected style block.
pub const STYLE_BLOCK_OPEN: &str = r#"<style data-styled="true">"#;
/// Closing tag of every injected style block.
pub const STYLE_BLOCK_CLOSE: &str = "</style>";

#[derive(Debug, Default)]
struct SheetState {
    rules: Vec<String>,
    /// Index of the first rule not yet committed as consumed.
    cursor: usize,
    /// End index of the most recent `drain_css` call.
    drained_through: usize,
    closed: bool,
}

/// Append-only, ordered set of collected CSS rules with a drain cursor.
///
/// Cloning yields another handle onto the same session-owned set.
#[derive(Debug, Clone, Default)]
pub struct StyleCollector {
    inner: Arc<Mutex<SheetState>>,
}

impl StyleCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule. Ignored once the collector has been closed.
    pub fn record_rule(&self, rule: impl Into<String>) {
        let mut state = mutex_lock(&self.inner, SOURCE, "record_rule");
        if state.closed {
            return;
        }
        state.rules.push(rule.into());
    }

    /// Serialize every rule recorded since the last committed drain as a
    /// ready-to-inject style block, or return an empty string when nothing is
    /// pending.
    ///
    /// Calling this repeatedly without [`clear_drained`](Self::clear_drained)
    /// returns the same rules again (plus any recorded in between).
    pub fn drain_css(&self) -> String {
        let mut state = mutex_lock(&self.inner, SOURCE, "drain_css");
        if state.closed {
            return String::new();
        }

        let end = state.rules.len();
        state.drained_through = end;
        let pending = &state.rules[state.cursor..end];
        if pending.is_empty() {
            return String::new();
        }

        let body_len: usize = pending.iter().map(String::len).sum();
        let mut css =
            String::with_capacity(STYLE_BLOCK_OPEN.len() + body_len + STYLE_BLOCK_CLOSE.len());
        css.push_str(STYLE_BLOCK_OPEN);
        for rule in pending {
            css.push_str(rule);
        }
        css.push_str(STYLE_BLOCK_CLOSE);
        css
    }

    /// Commit the rules returned by the most recent `drain_css` as consumed.
    ///
    /// Rules recorded after that drain stay pending.
    pub fn clear_drained(&self) {
        let mut state = mutex_lock(&self.inner, SOURCE, "clear_drained");
        if state.closed {
            return;
        }
        state.cursor = state.cursor.max(state.drained_through);
    }

    /// Stop collecting. Subsequent drains are empty and clears are no-ops.
    pub fn close(&self) {
        mutex_lock(&self.inner, SOURCE, "close").closed = true;
    }

    pub fn is_closed(&self) -> bool {
        mutex_lock(&self.inner, SOURCE, "is_closed").closed
    }

    /// Number of rules recorded but not yet committed as consumed.
    pub fn pending_len(&self) -> usize {
        let state = mutex_lock(&self.inner, SOURCE, "pending_len");
        state.rules.len() - state.cursor
    }

    /// Total number of rules recorded over the session.
    pub fn len(&self) -> usize {
        mutex_lock(&self.inner, SOURCE, "len").rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
