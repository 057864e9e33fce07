//! Copy-on-sanitize cleanup of an extracted container.
//!
//! Cleaning never touches the parsed document: it walks the container and
//! builds a new [`Fragment`]. In that single pass
//!
//! - descendants matching a [`DenyRule`] are dropped with their subtree,
//! - elements outside [`ALLOWED_TAGS`] are unwrapped (children kept),
//! - only allow-listed attributes survive, URL attributes only with safe schemes,
//! - comments and processing instructions are discarded.

use scraper::node::Element;
use scraper::{ElementRef, Html, Node};
use url::Url;

use crate::fragment::{Fragment, FragmentElement, FragmentNode};

/// Subtrees deeper than this are dropped.
const MAX_DEPTH: usize = 256;

/// A structural pattern whose matches are removed with their subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyRule {
    Tag(&'static str),
    Class(&'static str),
}

impl DenyRule {
    pub fn matches(&self, el: &Element) -> bool {
        match self {
            DenyRule::Tag(tag) => el.name().eq_ignore_ascii_case(tag),
            DenyRule::Class(class) => el.classes().any(|c| c.eq_ignore_ascii_case(class)),
        }
    }
}

pub const DEFAULT_DENY: &[DenyRule] = &[
    DenyRule::Tag("script"),
    DenyRule::Tag("style"),
    DenyRule::Tag("iframe"),
    DenyRule::Class("ads"),
    DenyRule::Class("advertisement"),
    DenyRule::Tag("nav"),
    DenyRule::Tag("header"),
    DenyRule::Tag("footer"),
    // Embedded/active content and foreign markup; unwrapping these would leak their internals.
    DenyRule::Tag("noscript"),
    DenyRule::Tag("object"),
    DenyRule::Tag("embed"),
    DenyRule::Tag("applet"),
    DenyRule::Tag("frame"),
    DenyRule::Tag("frameset"),
    DenyRule::Tag("template"),
    DenyRule::Tag("form"),
    DenyRule::Tag("button"),
    DenyRule::Tag("input"),
    DenyRule::Tag("select"),
    DenyRule::Tag("textarea"),
    DenyRule::Tag("svg"),
    DenyRule::Tag("math"),
    DenyRule::Tag("link"),
    DenyRule::Tag("meta"),
    DenyRule::Tag("base"),
];

pub const ALLOWED_TAGS: &[&str] = &[
    "p", "br", "hr", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "dl", "dt", "dd",
    "a", "img", "strong", "b", "em", "i", "u", "s", "sub", "sup", "small", "mark", "abbr",
    "time", "blockquote", "q", "cite", "pre", "code", "kbd", "figure", "figcaption", "table",
    "thead", "tbody", "tfoot", "tr", "th", "td", "caption", "col", "colgroup", "div", "span",
    "section", "article", "aside",
];

/// Attributes kept on any allowed element.
const GLOBAL_ATTRS: &[&str] = &["title"];

fn tag_attrs(tag: &str) -> &'static [&'static str] {
    match tag {
        "a" => &["href"],
        "img" => &["src", "alt", "width", "height"],
        "td" | "th" => &["colspan", "rowspan"],
        "ol" => &["start"],
        "col" | "colgroup" => &["span"],
        "time" => &["datetime"],
        _ => &[],
    }
}

/// Counters for one cleaning pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanStats {
    pub removed: usize,
    pub unwrapped: usize,
    pub dropped_attrs: usize,
}

#[derive(Debug, Clone)]
pub struct Sanitizer {
    deny: Vec<DenyRule>,
    base: Option<Url>,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sanitizer {
    pub fn new() -> Self {
        Self {
            deny: DEFAULT_DENY.to_vec(),
            base: None,
        }
    }

    /// Resolve relative `href`/`src` values against `base`.
    pub fn with_base(mut self, base: Url) -> Self {
        self.base = Some(base);
        self
    }

    pub fn is_denied(&self, el: &Element) -> bool {
        self.deny.iter().any(|r| r.matches(el))
    }

    /// Clean the children of `root` into a new fragment.
    pub fn clean(&self, root: ElementRef<'_>) -> Fragment {
        self.clean_with_stats(root).0
    }

    pub fn clean_with_stats(&self, root: ElementRef<'_>) -> (Fragment, CleanStats) {
        let mut stats = CleanStats::default();
        let first = Fragment::new(self.children(root, 0, &mut stats));
        tracing::debug!(
            removed = stats.removed,
            unwrapped = stats.unwrapped,
            dropped_attrs = stats.dropped_attrs,
            "content.sanitize.done"
        );
        (self.settle(&first), stats)
    }

    /// Removing and unwrapping can leave shapes the HTML parser never builds,
    /// such as an `li` directly inside an `li` or nested headings. One round
    /// trip through the parser gives the tree any later parse of the output
    /// will produce. The second pass only copies allowed nodes.
    fn settle(&self, cleaned: &Fragment) -> Fragment {
        if cleaned.is_empty() {
            return cleaned.clone();
        }
        let doc = Html::parse_fragment(&cleaned.to_html());
        let mut ignored = CleanStats::default();
        Fragment::new(self.children(doc.root_element(), 0, &mut ignored))
    }

    /// Cleaned inner markup of `root`.
    ///
    /// ```
    /// use escola_content::extract::Extractor;
    /// use escola_content::sanitize::Sanitizer;
    ///
    /// let doc = Extractor::parse("<article><p>Hello</p><script>evil()</script></article>");
    /// let hit = Extractor::new().extract(&doc).unwrap();
    /// assert_eq!(Sanitizer::new().sanitize(hit.element), "<p>Hello</p>");
    /// ```
    pub fn sanitize(&self, root: ElementRef<'_>) -> String {
        self.clean(root).to_html()
    }

    /// Parse `markup` as a body fragment and sanitize it.
    pub fn sanitize_html(&self, markup: &str) -> String {
        let doc = Html::parse_fragment(markup);
        self.sanitize(doc.root_element())
    }

    fn children(&self, parent: ElementRef<'_>, depth: usize, stats: &mut CleanStats) -> Vec<FragmentNode> {
        let mut out = Vec::new();
        if depth >= MAX_DEPTH {
            stats.removed += 1;
            return out;
        }
        for child in parent.children() {
            match child.value() {
                Node::Text(text) => {
                    let s: &str = text;
                    push_text(&mut out, s);
                }
                Node::Element(el) => {
                    let Some(child_ref) = ElementRef::wrap(child) else {
                        continue;
                    };
                    if self.is_denied(el) {
                        stats.removed += 1;
                        continue;
                    }
                    let kids = self.children(child_ref, depth + 1, stats);
                    let tag = el.name().to_ascii_lowercase();
                    if ALLOWED_TAGS.contains(&tag.as_str()) {
                        let attrs = self.attrs(&tag, el, stats);
                        out.push(FragmentNode::Element(FragmentElement {
                            tag,
                            attrs,
                            children: kids,
                        }));
                    } else {
                        stats.unwrapped += 1;
                        for k in kids {
                            match k {
                                FragmentNode::Text(t) => push_text(&mut out, &t),
                                other => out.push(other),
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        out
    }

    fn attrs(&self, tag: &str, el: &Element, stats: &mut CleanStats) -> Vec<(String, String)> {
        let allowed = tag_attrs(tag);
        let mut out = Vec::new();
        for (name, value) in el.attrs() {
            let name = name.to_ascii_lowercase();
            if !(GLOBAL_ATTRS.contains(&name.as_str()) || allowed.contains(&name.as_str())) {
                stats.dropped_attrs += 1;
                continue;
            }
            let value = match name.as_str() {
                "href" => self.safe_url(value, &["http", "https", "mailto"]),
                "src" => self.safe_url(value, &["http", "https"]),
                _ => Some(value.to_string()),
            };
            match value {
                Some(v) => out.push((name, v)),
                None => stats.dropped_attrs += 1,
            }
        }
        // Attribute storage order is not guaranteed by the parser.
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// `Some(url)` when `raw` is relative or uses one of `schemes`.
    fn safe_url(&self, raw: &str, schemes: &[&str]) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match Url::parse(raw) {
            Ok(abs) if schemes.contains(&abs.scheme()) => Some(abs.to_string()),
            Ok(_) => None,
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.base {
                Some(base) => base.join(raw).ok().map(|u| u.to_string()),
                None => Some(raw.to_string()),
            },
            Err(_) => None,
        }
    }
}

/// Append text, merging with a preceding text node so unwrapping never leaves
/// adjacent text nodes behind (the parser would merge them on a second pass).
fn push_text(out: &mut Vec<FragmentNode>, s: &str) {
    if s.is_empty() {
        return;
    }
    if let Some(FragmentNode::Text(prev)) = out.last_mut() {
        prev.push_str(s);
    } else {
        out.push(FragmentNode::Text(s.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Extractor;

    fn clean_article(body: &str) -> String {
        let doc = Extractor::parse(&format!("<article>{body}</article>"));
        let hit = Extractor::new().extract(&doc).unwrap();
        Sanitizer::new().sanitize(hit.element)
    }

    #[test]
    fn deny_listed_tags_and_classes_are_removed() {
        let out = clean_article(
            r#"<header>site</header><nav><a href="/">home</a></nav>
<p>Keep <b>this</b></p><style>p{}</style><iframe src="https://ads.example"></iframe>
<div class="ads">buy</div><aside class="sidebar Advertisement">buy more</aside>
<footer>foot</footer><script>evil()</script>"#,
        );
        for needle in [
            "<script", "<style", "<iframe", "<nav", "<header", "<footer", "buy", "site", "foot",
        ] {
            assert!(!out.contains(needle), "{needle} leaked into {out}");
        }
        assert!(out.contains("<p>Keep <b>this</b></p>"));
    }

    #[test]
    fn event_handlers_and_styles_are_dropped() {
        let out = clean_article(
            r#"<p onclick="steal()" style="color:red" class="lead" title="t">x</p>"#,
        );
        assert_eq!(out, r#"<p title="t">x</p>"#);
    }

    #[test]
    fn unsafe_url_schemes_are_dropped() {
        let out = clean_article(
            r#"<a href="javascript:alert(1)">a</a><a href="java&#10;script:alert(1)">b</a><img src="data:image/png;base64,AAAA" alt="d"><a href="mailto:x@y.z">m</a>"#,
        );
        assert!(!out.to_lowercase().contains("javascript"));
        assert!(!out.contains("data:"));
        assert!(out.contains(r#"<a>a</a>"#));
        assert!(out.contains(r#"<img alt="d">"#));
        assert!(out.contains(r#"href="mailto:x@y.z""#));
    }

    #[test]
    fn relative_urls_resolve_against_base() {
        let doc = Extractor::parse(r#"<article><a href="/aula/2">next</a><img src="img/f.png"></article>"#);
        let hit = Extractor::new().extract(&doc).unwrap();
        let base = Url::parse("https://blog.example.com/aula/1").unwrap();
        let out = Sanitizer::new().with_base(base).sanitize(hit.element);
        assert_eq!(
            out,
            r#"<a href="https://blog.example.com/aula/2">next</a><img src="https://blog.example.com/aula/img/f.png">"#
        );
    }

    #[test]
    fn unknown_elements_are_unwrapped() {
        let out = clean_article("<p><font color=red>red</font> <blink>text</blink></p><!-- note -->");
        assert_eq!(out, "<p>red text</p>");
    }

    #[test]
    fn stats_count_each_kind_of_change() {
        let doc = Extractor::parse(
            r#"<article><script>x</script><font>a</font><p onclick="y">b</p></article>"#,
        );
        let hit = Extractor::new().extract(&doc).unwrap();
        let (_, stats) = Sanitizer::new().clean_with_stats(hit.element);
        assert_eq!(
            stats,
            CleanStats {
                removed: 1,
                unwrapped: 1,
                dropped_attrs: 1
            }
        );
    }

    #[test]
    fn source_document_is_not_mutated() {
        let doc = Extractor::parse("<article><p>a</p><script>evil()</script><nav>n</nav></article>");
        let hit = Extractor::new().extract(&doc).unwrap();
        let cleaned = Sanitizer::new().sanitize(hit.element);
        assert!(!cleaned.contains("<script>"));

        let original = doc.html();
        assert!(original.contains("<script>evil()</script>"));
        assert!(original.contains("<nav>n</nav>"));
        assert!(hit.inner_html().contains("<script>"));
    }

    #[test]
    fn sanitizing_twice_is_stable() {
        let first = clean_article(
            r#"<h2>T&amp;C</h2><p>a&nbsp;b <em>c</em><script>x</script></p>
<pre>
fn main() {}</pre><table><tr><td colspan="2">cell</td></tr></table><ul><li>one<li>two</ul>
<p><span class="ads">ad</span><font>unwrapped</font> tail</p><img src="/a.png" onerror="x()">"#,
        );
        let second = Sanitizer::new().sanitize_html(&first);
        assert_eq!(first, second);
        let third = Sanitizer::new().sanitize_html(&second);
        assert_eq!(second, third);
    }

    #[test]
    fn unwrapping_never_leaves_shapes_the_parser_rebuilds() {
        let cases = [
            (
                "<ul><li>a<menu><li>b</li></menu></li></ul>",
                "<ul><li>a</li><li>b</li></ul>",
            ),
            ("<h2>a<blink><h3>b</h3></blink></h2>", "<h2>a</h2><h3>b</h3>"),
            ("<dl><dt>a<blink><dd>b</dd></blink></dt></dl>", "<dl><dt>a</dt><dd>b</dd></dl>"),
            ("<p>a<font>b</font><script>x</script>c</p>", "<p>abc</p>"),
        ];
        for (input, expected) in cases {
            let first = clean_article(input);
            assert_eq!(first, expected, "first pass of {input}");
            assert_eq!(Sanitizer::new().sanitize_html(&first), first, "second pass of {input}");
        }

        // Markup the parser restructures on the way in must also be a fixed point.
        for input in [
            r#"<a href="/x">a<blink><a href="/y">b</a></blink></a>"#,
            "<table><tr><font>loose</font><td>c</td></tr></table>",
            "<p>a<blink><div>b</div></blink>c</p>",
            "<p>a<font><nav>n</nav>b</font></p>",
        ] {
            let first = clean_article(input);
            let second = Sanitizer::new().sanitize_html(&first);
            assert_eq!(first, second, "{input}");
        }
    }

    #[test]
    fn deeply_nested_markup_is_bounded() {
        let depth = MAX_DEPTH + 50;
        let body = format!("{}deep{}", "<div>".repeat(depth), "</div>".repeat(depth));
        let out = clean_article(&body);
        assert!(!out.contains("deep"));
        assert!(out.starts_with("<div>"));
    }
}
