//! The streaming render pass.
//!
//! Serializes a component tree into an ordered sequence of [`Fragment`]s:
//! first the shell, then one fragment per suspense boundary as its data
//! resolves, then the document postamble. Suspension is cooperative: a
//! component that reads pending data returns its wait handle, the pass awaits
//! it (or the abort signal) and retries. Styled elements record their rules
//! into the session's [`StyleCollector`] as they are serialized.
//!
//! The stream is pull driven. Nothing past a yielded fragment is produced
//! until the consumer polls again, which keeps style collection in lockstep
//! with the fragment that carries it.

use std::{
    collections::{HashSet, VecDeque},
    fmt::Write as _,
    sync::Arc,
};

use async_stream::stream;
use futures::Stream;
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::domain::{
    assets::AssetManifest,
    error::RenderError,
    fragment::Fragment,
    styles::StyleCollector,
    suspense::{ServerData, WaitHandle},
    view::{Component, Node, RenderScope, Rendered},
};

use super::{deadline::AbortSignal, session::ErrorObserver};

const DOCTYPE: &str = "<!DOCTYPE html>";
const STYLED_CLASS_PREFIX: &str = "sc-";
const STYLED_CLASS_HASH_LEN: usize = 8;

/// Marker left where a suspended component was skipped after an abort.
pub const CLIENT_RENDER_MARKER: &str = "<template data-client-render></template>";

/// Inline client runtime sent ahead of the first streamed boundary.
///
/// `$RC` swaps a boundary's fallback for its streamed content; `$RX` flags a
/// boundary for client rendering.
pub const CLIENT_RUNTIME: &str = concat!(
    "<script>",
    "$RC=function(b,s){var t=document.getElementById(b),c=document.getElementById(s);",
    "if(!t||!c)return;c.parentNode.removeChild(c);var p=t.parentNode,e=t.nextSibling;",
    "while(e&&e.nodeType!==8){var n=e.nextSibling;p.removeChild(e);e=n}",
    "while(c.firstChild)p.insertBefore(c.firstChild,e);p.removeChild(t)};",
    "$RX=function(b){var t=document.getElementById(b);if(t)t.setAttribute(\"data-client-render\",\"\")};",
    "</script>"
);

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// One render pass over a session's component tree.
pub struct RenderPass {
    root: Arc<dyn Component>,
    assets: Arc<AssetManifest>,
    data: ServerData,
    styles: StyleCollector,
    signal: AbortSignal,
    observer: ErrorObserver,
}

impl RenderPass {
    pub fn new(
        root: Arc<dyn Component>,
        assets: Arc<AssetManifest>,
        data: ServerData,
        styles: StyleCollector,
        signal: AbortSignal,
        observer: ErrorObserver,
    ) -> Self {
        Self {
            root,
            assets,
            data,
            styles,
            signal,
            observer,
        }
    }

    /// Turn the pass into its fragment stream.
    ///
    /// The first item is the shell. If the stream ends without yielding
    /// anything, the shell failed and the failure was reported to the
    /// session's error observer.
    pub fn into_stream(self) -> impl Stream<Item = Fragment> + Send + 'static {
        let RenderPass {
            root,
            assets,
            data,
            styles,
            mut signal,
            observer,
        } = self;

        stream! {
            let mut tree = TreeState::default();
            let root = Node::Component(root);

            let shell = loop {
                tree.next_boundary = 0;
                let mode = if signal.is_aborted() {
                    Mode::ClientTakeover
                } else {
                    Mode::Stream
                };
                let attempt = {
                    let scope = RenderScope::new(&assets, &data);
                    serialize(&root, scope, &styles, &mut tree, mode, true)
                };
                match attempt {
                    Attempt::Complete(output) => break output,
                    Attempt::Suspended(handle) => {
                        trace!(target = "sheetstream::render::pass", "shell suspended on data");
                        tokio::select! {
                            _ = handle.wait() => {}
                            _ = signal.aborted() => {}
                        }
                    }
                    Attempt::Failed(err) => {
                        observer.observe(&err);
                        return;
                    }
                }
            };

            for err in &shell.errors {
                observer.observe(err);
            }
            let client_takeover = shell.mode == Mode::ClientTakeover;
            debug!(
                target = "sheetstream::render::pass",
                client_takeover,
                pending_boundaries = shell.boundaries.len(),
                "shell ready"
            );

            let mut html = String::with_capacity(DOCTYPE.len() + shell.html.len());
            html.push_str(DOCTYPE);
            html.push_str(&shell.html);
            push_bootstrap_script(&mut html, &assets);
            yield Fragment::from(html);

            let postamble = shell.postamble;
            let mut pending: VecDeque<PendingBoundary> = shell.boundaries.into();
            let mut runtime_sent = false;

            while let Some(boundary) = pending.pop_front() {
                let resumed = tokio::select! {
                    biased;
                    _ = signal.aborted() => false,
                    _ = boundary.handle.wait() => true,
                };
                if !resumed {
                    pending.push_front(boundary);
                    break;
                }

                let attempt = {
                    let scope = RenderScope::new(&assets, &data);
                    let content = Node::Component(Arc::clone(&boundary.content));
                    serialize(&content, scope, &styles, &mut tree, Mode::Stream, false)
                };
                match attempt {
                    Attempt::Complete(output) => {
                        for err in &output.errors {
                            observer.observe(err);
                        }
                        let mut html = String::new();
                        if !runtime_sent {
                            html.push_str(CLIENT_RUNTIME);
                            runtime_sent = true;
                        }
                        let id = boundary.id;
                        let _ = write!(html, r#"<div hidden id="S:{id}">"#);
                        html.push_str(&output.html);
                        let _ = write!(html, r#"</div><script>$RC("B:{id}","S:{id}")</script>"#);
                        pending.extend(output.boundaries);
                        trace!(target = "sheetstream::render::pass", boundary = id, "boundary resolved");
                        yield Fragment::from(html);
                    }
                    Attempt::Suspended(handle) => {
                        pending.push_back(PendingBoundary { handle, ..boundary });
                    }
                    Attempt::Failed(err) => {
                        observer.observe(&err);
                        let mut html = String::new();
                        if !runtime_sent {
                            html.push_str(CLIENT_RUNTIME);
                            runtime_sent = true;
                        }
                        push_client_render(&mut html, boundary.id);
                        yield Fragment::from(html);
                    }
                }
            }

            let mut tail = String::new();
            if !pending.is_empty() {
                debug!(
                    target = "sheetstream::render::pass",
                    boundaries = pending.len(),
                    "render aborted; remaining boundaries handed to the client"
                );
                if !runtime_sent {
                    tail.push_str(CLIENT_RUNTIME);
                }
                for boundary in &pending {
                    push_client_render(&mut tail, boundary.id);
                }
            }
            tail.push_str(&postamble);
            yield Fragment::from(tail);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Suspended content waits for its data.
    Stream,
    /// The pass was aborted: suspended content is left for the client.
    ClientTakeover,
}

#[derive(Default)]
struct TreeState {
    classes: HashSet<String>,
    next_boundary: usize,
}

struct PendingBoundary {
    id: usize,
    content: Arc<dyn Component>,
    handle: WaitHandle,
}

struct Output {
    html: String,
    postamble: String,
    boundaries: Vec<PendingBoundary>,
    errors: Vec<RenderError>,
    mode: Mode,
}

enum Attempt {
    Complete(Output),
    Suspended(WaitHandle),
    Failed(RenderError),
}

enum Interrupt {
    Suspended(WaitHandle),
    Failed(RenderError),
}

fn serialize(
    node: &Node,
    scope: RenderScope<'_>,
    styles: &StyleCollector,
    tree: &mut TreeState,
    mode: Mode,
    defer_document_closes: bool,
) -> Attempt {
    let mut serializer = Serializer {
        scope,
        styles,
        tree,
        mode,
        defer_document_closes,
        html: String::new(),
        postamble: Vec::new(),
        boundaries: Vec::new(),
        errors: Vec::new(),
    };
    match serializer.write(node) {
        Ok(()) => Attempt::Complete(serializer.finish()),
        Err(Interrupt::Suspended(handle)) => Attempt::Suspended(handle),
        Err(Interrupt::Failed(err)) => Attempt::Failed(err),
    }
}

struct Serializer<'s, 'a> {
    scope: RenderScope<'a>,
    styles: &'s StyleCollector,
    tree: &'s mut TreeState,
    mode: Mode,
    /// `</body>` and `</html>` are held back until every boundary has streamed.
    defer_document_closes: bool,
    html: String,
    postamble: Vec<&'static str>,
    boundaries: Vec<PendingBoundary>,
    errors: Vec<RenderError>,
}

impl Serializer<'_, '_> {
    fn write(&mut self, node: &Node) -> Result<(), Interrupt> {
        match node {
            Node::Text(text) => escape_text_into(&mut self.html, text),
            Node::Raw(html) => self.html.push_str(html),
            Node::Fragment(children) => {
                for child in children {
                    self.write(child)?;
                }
            }
            Node::Element {
                tag,
                attrs,
                children,
            } => {
                let attrs: Vec<(&str, &str)> = attrs
                    .iter()
                    .map(|(name, value)| (*name, value.as_str()))
                    .collect();
                self.write_element(*tag, &attrs, children)?;
            }
            Node::Styled { tag, css, children } => {
                let class = self.register_style(css);
                self.write_element(*tag, &[("class", class.as_str())], children)?;
            }
            Node::Component(component) => match component.render(&self.scope) {
                Rendered::Ready(node) => self.write(&node)?,
                Rendered::Pending(handle) => match self.mode {
                    Mode::Stream => return Err(Interrupt::Suspended(handle)),
                    Mode::ClientTakeover => self.html.push_str(CLIENT_RENDER_MARKER),
                },
                Rendered::Failed(err) => return Err(Interrupt::Failed(err)),
            },
            Node::Suspense { fallback, content } => self.write_suspense(fallback, content)?,
        }
        Ok(())
    }

    fn write_element(
        &mut self,
        tag: &'static str,
        attrs: &[(&str, &str)],
        children: &[Node],
    ) -> Result<(), Interrupt> {
        self.html.push('<');
        self.html.push_str(tag);
        for (name, value) in attrs {
            self.html.push(' ');
            self.html.push_str(name);
            self.html.push_str("=\"");
            escape_attr_into(&mut self.html, value);
            self.html.push('"');
        }
        self.html.push('>');

        if VOID_ELEMENTS.contains(&tag) {
            if !children.is_empty() {
                return Err(Interrupt::Failed(RenderError::invalid_markup(format!(
                    "void element <{tag}> cannot have children"
                ))));
            }
            return Ok(());
        }

        for child in children {
            self.write(child)?;
        }

        let close = match tag {
            "body" => Some("</body>"),
            "html" => Some("</html>"),
            _ => None,
        };
        match close {
            Some(close) if self.defer_document_closes => self.postamble.push(close),
            _ => {
                self.html.push_str("</");
                self.html.push_str(tag);
                self.html.push('>');
            }
        }
        Ok(())
    }

    fn write_suspense(
        &mut self,
        fallback: &Node,
        content: &Arc<dyn Component>,
    ) -> Result<(), Interrupt> {
        let id = self.tree.next_boundary;
        self.tree.next_boundary += 1;

        let attempt = serialize(
            &Node::Component(Arc::clone(content)),
            self.scope,
            self.styles,
            self.tree,
            Mode::Stream,
            false,
        );
        match attempt {
            Attempt::Complete(output) => {
                self.html.push_str(&output.html);
                self.boundaries.extend(output.boundaries);
                self.errors.extend(output.errors);
            }
            Attempt::Suspended(handle) if self.mode == Mode::Stream => {
                let _ = write!(self.html, r#"<!--$?--><template id="B:{id}"></template>"#);
                self.write(fallback)?;
                self.html.push_str("<!--/$-->");
                trace!(
                    target = "sheetstream::render::pass",
                    boundary = id,
                    component = content.name(),
                    "boundary suspended"
                );
                self.boundaries.push(PendingBoundary {
                    id,
                    content: Arc::clone(content),
                    handle,
                });
            }
            Attempt::Suspended(_) => self.write_client_boundary(id, fallback)?,
            Attempt::Failed(err) => {
                self.errors.push(err);
                self.write_client_boundary(id, fallback)?;
            }
        }
        Ok(())
    }

    fn write_client_boundary(&mut self, id: usize, fallback: &Node) -> Result<(), Interrupt> {
        let _ = write!(
            self.html,
            r#"<!--$!--><template id="B:{id}" data-client-render></template>"#
        );
        self.write(fallback)?;
        self.html.push_str("<!--/$-->");
        Ok(())
    }

    fn register_style(&mut self, css: &str) -> String {
        let class = styled_class_name(css);
        if self.tree.classes.insert(class.clone()) {
            self.styles.record_rule(format!(".{class}{{{css}}}"));
        }
        class
    }

    fn finish(self) -> Output {
        Output {
            html: self.html,
            postamble: self.postamble.concat(),
            boundaries: self.boundaries,
            errors: self.errors,
            mode: self.mode,
        }
    }
}

/// Deterministic class name for a styled element's CSS.
pub fn styled_class_name(css: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(css.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{STYLED_CLASS_PREFIX}{}", &digest[..STYLED_CLASS_HASH_LEN])
}

fn push_bootstrap_script(html: &mut String, assets: &AssetManifest) {
    if let Some(src) = assets.bootstrap_script() {
        html.push_str("<script src=\"");
        escape_attr_into(html, src);
        html.push_str("\" async=\"\"></script>");
    }
}

fn push_client_render(html: &mut String, id: usize) {
    let _ = write!(html, r#"<script>$RX("B:{id}")</script>"#);
}

fn escape_text_into(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr_into(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}
