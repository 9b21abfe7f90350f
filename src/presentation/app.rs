//! Demo page rendered by the server: a post with styled paragraphs and a
//! comments section that waits on the session's data source.

use std::sync::Arc;

use crate::domain::{
    suspense::DataState,
    view::{Component, Node, RenderScope, Rendered},
};

const FIRST_PARAGRAPH_CSS: &str = "background-color: red;";
const SECOND_PARAGRAPH_CSS: &str = "background-color: green;";
const THIRD_PARAGRAPH_CSS: &str = "background-color: yellow;";
const COMMENT_CSS: &str = "border-left: 4px solid #999; padding-left: 8px;";

const COMMENTS: &[&str] = &[
    "Wait, it doesn't wait for the comments to load?",
    "How does this even work?",
    "I like marshmallows.",
];

/// Root document component.
#[derive(Debug, Default)]
pub struct DemoApp;

impl DemoApp {
    pub fn new() -> Self {
        Self
    }
}

impl Component for DemoApp {
    fn name(&self) -> &'static str {
        "DemoApp"
    }

    fn render(&self, scope: &RenderScope<'_>) -> Rendered {
        let assets = scope.assets();
        let mut head = vec![
            Node::element_with("meta", [("charset", "utf-8".to_string())], []),
            Node::element_with(
                "meta",
                [
                    ("name", "viewport".to_string()),
                    ("content", "width=device-width, initial-scale=1".to_string()),
                ],
                [],
            ),
        ];
        if let Some(href) = assets.stylesheet() {
            head.push(Node::element_with(
                "link",
                [("rel", "stylesheet".to_string()), ("href", href.to_string())],
                [],
            ));
        }
        head.push(Node::element("title", [Node::text("Hello")]));

        let body = [
            Node::element(
                "noscript",
                [Node::element_with(
                    "b",
                    [],
                    [Node::text(
                        "Enable JavaScript to see the comments once the server gives up waiting.",
                    )],
                )],
            ),
            Node::element(
                "nav",
                [Node::element_with(
                    "a",
                    [("href", "/".to_string())],
                    [Node::text("Home")],
                )],
            ),
            Node::element(
                "main",
                [Node::element(
                    "article",
                    [
                        Node::component(Arc::new(Post)),
                        Node::element(
                            "section",
                            [
                                Node::element("h2", [Node::text("Comments")]),
                                Node::suspense(spinner(), Arc::new(Comments)),
                            ],
                        ),
                    ],
                )],
            ),
        ];

        Rendered::Ready(Node::element_with(
            "html",
            [("lang", "en".to_string())],
            [Node::element("head", head), Node::element("body", body)],
        ))
    }
}

fn spinner() -> Node {
    Node::element_with(
        "div",
        [
            ("class", "spinner".to_string()),
            ("role", "progressbar".to_string()),
            ("aria-busy", "true".to_string()),
        ],
        [],
    )
}

/// Static post body with three styled paragraphs.
#[derive(Debug, Default)]
pub struct Post;

impl Component for Post {
    fn name(&self) -> &'static str {
        "Post"
    }

    fn render(&self, _scope: &RenderScope<'_>) -> Rendered {
        Rendered::Ready(Node::fragment([
            Node::element("h1", [Node::text("Hello world")]),
            Node::styled(
                "p",
                FIRST_PARAGRAPH_CSS,
                [
                    Node::text("This demo is "),
                    Node::element("b", [Node::text("artificially slowed down")]),
                    Node::text(". Adjust the data delay to change how long comments take."),
                ],
            ),
            Node::styled(
                "p",
                SECOND_PARAGRAPH_CSS,
                [Node::text(
                    "Notice how HTML for comments streams in before the client script has loaded.",
                )],
            ),
            Node::styled(
                "p",
                THIRD_PARAGRAPH_CSS,
                [Node::text(
                    "Styles for each streamed chunk arrive together with the markup that uses them.",
                )],
            ),
        ]))
    }
}

/// Comment list that is only available once the data source resolves.
#[derive(Debug, Default)]
pub struct Comments;

impl Component for Comments {
    fn name(&self) -> &'static str {
        "Comments"
    }

    fn render(&self, scope: &RenderScope<'_>) -> Rendered {
        if let DataState::Pending(handle) = scope.read() {
            return Rendered::Pending(handle);
        }
        Rendered::Ready(Node::fragment(
            COMMENTS
                .iter()
                .map(|comment| Node::styled("p", COMMENT_CSS, [Node::text(*comment)])),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::domain::{assets::AssetManifest, suspense::ServerData};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn comments_suspend_until_data_is_ready() {
        let assets = AssetManifest::default();
        let data = ServerData::new(Duration::from_millis(10));
        let scope = RenderScope::new(&assets, &data);

        let handle = match Comments.render(&scope) {
            Rendered::Pending(handle) => handle,
            _ => panic!("comments should suspend on first render"),
        };
        handle.wait().await;

        assert!(matches!(Comments.render(&scope), Rendered::Ready(_)));
    }

    #[tokio::test]
    async fn demo_app_renders_document_root() {
        let assets = AssetManifest::default();
        let data = ServerData::new(Duration::ZERO);
        let scope = RenderScope::new(&assets, &data);

        match DemoApp::new().render(&scope) {
            Rendered::Ready(Node::Element { tag, children, .. }) => {
                assert_eq!(tag, "html");
                assert_eq!(children.len(), 2);
            }
            _ => panic!("demo app should render an <html> element"),
        }
    }
}
