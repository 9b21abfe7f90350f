//! Per-fragment transform that splices freshly collected CSS into the
//! outgoing HTML stream.
//!
//! Placement is a heuristic over the current fragment only. There is no
//! parsing and no lookahead: a closing tag split across two fragments, or text
//! that happens to look like a closing tag, can move the style block. Those
//! misplacements are tolerated; buffering the document would defeat streaming.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use crate::domain::{fragment::Fragment, styles::StyleCollector};

const HEAD_CLOSE: &str = "</head>";

static CLOSING_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</[a-z]*>").expect("closing tag pattern compiles"));

/// Where a style block was placed within a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionPoint {
    /// Immediately before the first literal `</head>`.
    BeforeHeadClose(usize),
    /// Immediately after the first closing tag.
    AfterClosingTag(usize),
    /// At the very front of the fragment.
    Front,
}

impl InjectionPoint {
    /// Choose the injection point for `html`.
    pub fn locate(html: &str) -> Self {
        if let Some(offset) = html.find(HEAD_CLOSE) {
            return InjectionPoint::BeforeHeadClose(offset);
        }
        match CLOSING_TAG.find(html) {
            Some(found) => InjectionPoint::AfterClosingTag(found.end()),
            None => InjectionPoint::Front,
        }
    }

    pub fn offset(self) -> usize {
        match self {
            InjectionPoint::BeforeHeadClose(offset) | InjectionPoint::AfterClosingTag(offset) => {
                offset
            }
            InjectionPoint::Front => 0,
        }
    }

    fn label(self) -> &'static str {
        match self {
            InjectionPoint::BeforeHeadClose(_) => "before_head_close",
            InjectionPoint::AfterClosingTag(_) => "after_closing_tag",
            InjectionPoint::Front => "front",
        }
    }
}

/// Insert `css` into `html` at the point chosen by [`InjectionPoint::locate`].
pub fn inject(html: &str, css: &str) -> String {
    splice(html, InjectionPoint::locate(html), css)
}

fn splice(html: &str, point: InjectionPoint, css: &str) -> String {
    let offset = point.offset();
    let mut out = String::with_capacity(html.len() + css.len());
    out.push_str(&html[..offset]);
    out.push_str(css);
    out.push_str(&html[offset..]);
    out
}

/// Stateful rewriter bound to one session's style collector.
///
/// Fragments must be passed in production order, one at a time, before the
/// render pass produces the next one.
#[derive(Debug)]
pub struct ChunkRewriter {
    styles: StyleCollector,
    injected_blocks: usize,
}

impl ChunkRewriter {
    pub fn new(styles: StyleCollector) -> Self {
        Self {
            styles,
            injected_blocks: 0,
        }
    }

    /// Rewrite one fragment, consuming every rule recorded since the last one.
    pub fn rewrite(&mut self, fragment: Fragment) -> Fragment {
        let css = self.styles.drain_css();
        if css.is_empty() {
            return fragment;
        }

        let point = InjectionPoint::locate(fragment.as_str());
        let rewritten = splice(fragment.as_str(), point, &css);

        self.styles.clear_drained();
        self.injected_blocks += 1;
        trace!(
            target = "sheetstream::render::rewrite",
            injection = point.label(),
            offset = point.offset(),
            css_bytes = css.len(),
            "injected collected styles"
        );
        Fragment::from(rewritten)
    }

    /// Number of style blocks injected so far.
    pub fn injected_blocks(&self) -> usize {
        self.injected_blocks
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::styles::{STYLE_BLOCK_CLOSE, STYLE_BLOCK_OPEN};

    use super::*;

    fn block(css: &str) -> String {
        format!("{STYLE_BLOCK_OPEN}{css}{STYLE_BLOCK_CLOSE}")
    }

    fn strip_style_blocks(html: &str) -> String {
        let mut out = String::with_capacity(html.len());
        let mut rest = html;
        while let Some(start) = rest.find(STYLE_BLOCK_OPEN) {
            out.push_str(&rest[..start]);
            let after_open = &rest[start..];
            let end = after_open
                .find(STYLE_BLOCK_CLOSE)
                .expect("injected block is closed");
            rest = &after_open[end + STYLE_BLOCK_CLOSE.len()..];
        }
        out.push_str(rest);
        out
    }

    #[test]
    fn passes_fragment_through_when_nothing_is_pending() {
        let mut rewriter = ChunkRewriter::new(StyleCollector::new());
        let fragment = Fragment::from("<div><p>hello</p></div>");
        assert_eq!(rewriter.rewrite(fragment.clone()), fragment);
        assert_eq!(rewriter.injected_blocks(), 0);
    }

    #[test]
    fn places_styles_before_head_close() {
        let styles = StyleCollector::new();
        styles.record_rule(".a{color:red}");
        let mut rewriter = ChunkRewriter::new(styles);

        let out = rewriter.rewrite(Fragment::from("<html><head><title>x</title></head><body>"));

        assert_eq!(
            out.as_str(),
            format!(
                "<html><head><title>x</title>{}</head><body>",
                block(".a{color:red}")
            )
        );
    }

    #[test]
    fn head_close_wins_over_earlier_closing_tags() {
        let point = InjectionPoint::locate("<title>x</title><meta></head>");
        assert_eq!(point, InjectionPoint::BeforeHeadClose(22));
    }

    #[test]
    fn places_styles_after_first_closing_tag() {
        let out = inject("<p>one</p><p>two</p>", "<style>s</style>");
        assert_eq!(out, "<p>one</p><style>s</style><p>two</p>");
    }

    #[test]
    fn closing_tag_match_is_case_insensitive() {
        assert_eq!(
            InjectionPoint::locate("<DIV>x</DIV>"),
            InjectionPoint::AfterClosingTag(12)
        );
    }

    #[test]
    fn prepends_when_fragment_has_no_closing_tag() {
        let out = inject("<section><p>open text", "<style>s</style>");
        assert_eq!(out, "<style>s</style><section><p>open text");
    }

    #[test]
    fn closing_tag_split_across_fragments_falls_back_to_front() {
        assert_eq!(InjectionPoint::locate("text</di"), InjectionPoint::Front);
        assert_eq!(
            InjectionPoint::locate("v><p>more</p>"),
            InjectionPoint::AfterClosingTag(13)
        );
    }

    #[test]
    fn three_rules_before_first_fragment_then_none() {
        let styles = StyleCollector::new();
        let mut rewriter = ChunkRewriter::new(styles.clone());
        styles.record_rule("a{}");
        styles.record_rule("b{}");
        styles.record_rule("c{}");

        let first = rewriter.rewrite(Fragment::from("<p>1</p>"));
        let second = Fragment::from("<p>2</p>");
        let second_out = rewriter.rewrite(second.clone());

        assert_eq!(first.as_str(), format!("<p>1</p>{}", block("a{}b{}c{}")));
        assert_eq!(second_out, second);
    }

    #[test]
    fn stripping_injected_blocks_restores_original_stream() {
        let fragments = [
            "<!DOCTYPE html><html><head><title>t</title>",
            "</head><body><div>",
            "plain text without tags",
            "<p>para</p><span>s</span>",
            "tail</di",
            "v></body></html>",
        ];
        let rules_before: [&[&str]; 6] = [
            &[".x{}"],
            &[".y{}", ".z{}"],
            &[".w{}"],
            &[],
            &[".v{}"],
            &[".u{}", ".t{}"],
        ];

        let styles = StyleCollector::new();
        let mut rewriter = ChunkRewriter::new(styles.clone());
        let mut original = String::new();
        let mut rewritten = String::new();
        for (fragment, rules) in fragments.iter().zip(rules_before) {
            for rule in rules {
                styles.record_rule(*rule);
            }
            original.push_str(fragment);
            rewritten.push_str(rewriter.rewrite(Fragment::from(*fragment)).as_str());
        }

        assert_eq!(strip_style_blocks(&rewritten), original);
        for rule in [".x{}", ".y{}", ".z{}", ".w{}", ".v{}", ".u{}", ".t{}"] {
            assert_eq!(rewritten.matches(rule).count(), 1, "rule {rule} once");
        }
        assert_eq!(rewriter.injected_blocks(), 5);
        assert_eq!(styles.pending_len(), 0);
    }

    #[test]
    fn rewriting_after_close_leaves_fragments_untouched() {
        let styles = StyleCollector::new();
        styles.record_rule("a{}");
        styles.close();
        let mut rewriter = ChunkRewriter::new(styles);

        let fragment = Fragment::from("<p>x</p>");
        assert_eq!(rewriter.rewrite(fragment.clone()), fragment);
    }
}
