//! The render tree seam between the streaming renderer and the UI it renders.
//!
//! Components produce [`Node`] trees. A component that depends on data reads
//! a [`ServerData`] through its [`RenderScope`] and returns
//! [`Rendered::Pending`] when the read suspends; the render pass retries the
//! component once the wait handle resolves.

use std::sync::Arc;

use super::{
    assets::AssetManifest,
    error::RenderError,
    suspense::{DataState, ServerData, WaitHandle},
};

/// A renderable unit of UI.
pub trait Component: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    fn render(&self, scope: &RenderScope<'_>) -> Rendered;
}

/// Result of rendering one component.
pub enum Rendered {
    Ready(Node),
    Pending(WaitHandle),
    Failed(RenderError),
}

impl From<Node> for Rendered {
    fn from(node: Node) -> Self {
        Rendered::Ready(node)
    }
}

/// Per-request values a component may consult while rendering.
#[derive(Clone, Copy)]
pub struct RenderScope<'a> {
    assets: &'a AssetManifest,
    data: &'a ServerData,
}

impl<'a> RenderScope<'a> {
    pub fn new(assets: &'a AssetManifest, data: &'a ServerData) -> Self {
        Self { assets, data }
    }

    pub fn assets(&self) -> &'a AssetManifest {
        self.assets
    }

    /// Read the session's data source.
    pub fn read(&self) -> DataState {
        self.data.read()
    }
}

/// Markup tree produced by components.
#[derive(Clone)]
pub enum Node {
    Element {
        tag: &'static str,
        attrs: Vec<(&'static str, String)>,
        children: Vec<Node>,
    },
    /// Element whose CSS is collected into the session's style sheet and
    /// referenced through a generated class name.
    Styled {
        tag: &'static str,
        css: String,
        children: Vec<Node>,
    },
    /// Escaped text content.
    Text(String),
    /// Trusted markup written verbatim.
    Raw(String),
    Fragment(Vec<Node>),
    /// Region whose content may suspend. The fallback is sent in its place
    /// and the content streams in once it can be rendered.
    Suspense {
        fallback: Box<Node>,
        content: Arc<dyn Component>,
    },
    Component(Arc<dyn Component>),
}

impl Node {
    pub fn element(tag: &'static str, children: impl IntoIterator<Item = Node>) -> Self {
        Node::Element {
            tag,
            attrs: Vec::new(),
            children: children.into_iter().collect(),
        }
    }

    pub fn element_with(
        tag: &'static str,
        attrs: impl IntoIterator<Item = (&'static str, String)>,
        children: impl IntoIterator<Item = Node>,
    ) -> Self {
        Node::Element {
            tag,
            attrs: attrs.into_iter().collect(),
            children: children.into_iter().collect(),
        }
    }

    pub fn styled(
        tag: &'static str,
        css: impl Into<String>,
        children: impl IntoIterator<Item = Node>,
    ) -> Self {
        Node::Styled {
            tag,
            css: css.into(),
            children: children.into_iter().collect(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    pub fn raw(html: impl Into<String>) -> Self {
        Node::Raw(html.into())
    }

    pub fn fragment(children: impl IntoIterator<Item = Node>) -> Self {
        Node::Fragment(children.into_iter().collect())
    }

    pub fn suspense(fallback: Node, content: Arc<dyn Component>) -> Self {
        Node::Suspense {
            fallback: Box::new(fallback),
            content,
        }
    }

    pub fn component(component: Arc<dyn Component>) -> Self {
        Node::Component(component)
    }
}
