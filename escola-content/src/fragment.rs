//! Structured, already-sanitized markup.
//!
//! A [`Fragment`] is what renderers receive instead of raw remote HTML. It
//! only ever holds elements and attributes that passed the sanitizer, so
//! serializing it back with [`Fragment::to_html`] cannot reintroduce markup
//! that was stripped.

use std::fmt::Write as _;

/// Tags serialized without a closing tag.
const VOID_TAGS: &[&str] = &["br", "hr", "img", "col", "wbr"];

/// Tags that start a new line in the text rendering.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "aside", "blockquote", "pre", "figure", "figcaption",
    "table", "thead", "tbody", "tfoot", "tr", "caption", "ul", "ol", "dl", "dt", "dd", "hr",
    "h1", "h2", "h3", "h4", "h5", "h6",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentNode {
    Element(FragmentElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentElement {
    /// Lowercase tag name.
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<FragmentNode>,
}

impl FragmentElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub nodes: Vec<FragmentNode>,
}

impl Fragment {
    pub fn new(nodes: Vec<FragmentNode>) -> Self {
        Self { nodes }
    }

    /// True when there is no element and no non-whitespace text.
    pub fn is_empty(&self) -> bool {
        fn blank(nodes: &[FragmentNode]) -> bool {
            nodes.iter().all(|n| match n {
                FragmentNode::Text(t) => t.trim().is_empty(),
                FragmentNode::Element(_) => false,
            })
        }
        blank(&self.nodes)
    }

    /// Depth-first walk over every element.
    pub fn elements(&self) -> Vec<&FragmentElement> {
        fn walk<'a>(nodes: &'a [FragmentNode], out: &mut Vec<&'a FragmentElement>) {
            for n in nodes {
                if let FragmentNode::Element(el) = n {
                    out.push(el);
                    walk(&el.children, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.nodes, &mut out);
        out
    }

    /// Serialize back to HTML markup.
    ///
    /// ```
    /// use escola_content::fragment::{Fragment, FragmentElement, FragmentNode};
    ///
    /// let p = FragmentElement {
    ///     tag: "p".into(),
    ///     attrs: vec![],
    ///     children: vec![FragmentNode::Text("1 < 2 & 3".into())],
    /// };
    /// let frag = Fragment::new(vec![FragmentNode::Element(p)]);
    /// assert_eq!(frag.to_html(), "<p>1 &lt; 2 &amp; 3</p>");
    /// ```
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_nodes(&self.nodes, &mut out);
        out
    }

    /// Readable plain text for terminals.
    pub fn to_text(&self) -> String {
        let mut w = TextWriter::default();
        w.nodes(&self.nodes, false);
        w.finish()
    }
}

fn write_nodes(nodes: &[FragmentNode], out: &mut String) {
    for n in nodes {
        match n {
            FragmentNode::Text(t) => escape_text(t, out),
            FragmentNode::Element(el) => write_element(el, out),
        }
    }
}

fn write_element(el: &FragmentElement, out: &mut String) {
    out.push('<');
    out.push_str(&el.tag);
    for (k, v) in &el.attrs {
        let _ = write!(out, " {k}=\"");
        escape_attr(v, out);
        out.push('"');
    }
    out.push('>');
    if VOID_TAGS.contains(&el.tag.as_str()) {
        return;
    }
    // The parser eats one newline right after <pre>; emit an extra one so it survives.
    if el.tag == "pre" {
        if let Some(FragmentNode::Text(t)) = el.children.first() {
            if t.starts_with('\n') {
                out.push('\n');
            }
        }
    }
    write_nodes(&el.children, out);
    let _ = write!(out, "</{}>", el.tag);
}

pub(crate) fn escape_text(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

pub(crate) fn escape_attr(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

#[derive(Default)]
struct TextWriter {
    out: String,
}

impl TextWriter {
    fn nodes(&mut self, nodes: &[FragmentNode], pre: bool) {
        for n in nodes {
            match n {
                FragmentNode::Text(t) if pre => self.out.push_str(t),
                FragmentNode::Text(t) => self.inline(t),
                FragmentNode::Element(el) => self.element(el, pre),
            }
        }
    }

    fn element(&mut self, el: &FragmentElement, pre: bool) {
        let tag = el.tag.as_str();
        match tag {
            "br" => self.out.push('\n'),
            "img" => {
                if let Some(alt) = el.attr("alt").filter(|a| !a.trim().is_empty()) {
                    self.inline(&format!(" [{}]", alt.trim()));
                }
            }
            "li" => {
                self.line_break();
                self.out.push_str("- ");
                self.nodes(&el.children, pre);
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.paragraph_break();
                let level = tag[1..].parse::<usize>().unwrap_or(1);
                self.out.push_str(&"#".repeat(level));
                self.out.push(' ');
                self.nodes(&el.children, pre);
                self.paragraph_break();
            }
            "a" => {
                let start = self.out.len();
                self.nodes(&el.children, pre);
                let label = self.out[start..].trim().to_string();
                if let Some(href) = el.attr("href") {
                    if !href.is_empty() && label != href {
                        self.inline(&format!(" ({href})"));
                    }
                }
            }
            "td" | "th" => {
                self.nodes(&el.children, pre);
                self.out.push('\t');
            }
            "pre" => {
                self.paragraph_break();
                self.nodes(&el.children, true);
                self.paragraph_break();
            }
            _ if BLOCK_TAGS.contains(&tag) => {
                self.paragraph_break();
                self.nodes(&el.children, pre);
                self.paragraph_break();
            }
            _ => self.nodes(&el.children, pre),
        }
    }

    fn inline(&mut self, text: &str) {
        for c in text.chars() {
            if c.is_whitespace() {
                if !(self.out.is_empty() || self.out.ends_with([' ', '\n', '\t'])) {
                    self.out.push(' ');
                }
            } else {
                self.out.push(c);
            }
        }
    }

    fn trim_trailing_spaces(&mut self) {
        while self.out.ends_with(' ') {
            self.out.pop();
        }
    }

    fn line_break(&mut self) {
        self.trim_trailing_spaces();
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn paragraph_break(&mut self) {
        self.line_break();
        if !self.out.is_empty() && !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }

    fn finish(self) -> String {
        self.out.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(tag: &str, attrs: &[(&str, &str)], children: Vec<FragmentNode>) -> FragmentNode {
        FragmentNode::Element(FragmentElement {
            tag: tag.into(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            children,
        })
    }

    fn text(s: &str) -> FragmentNode {
        FragmentNode::Text(s.into())
    }

    #[test]
    fn void_tags_have_no_closing_tag() {
        let frag = Fragment::new(vec![
            el("img", &[("src", "a.png"), ("alt", "x\"y")], vec![]),
            el("br", &[], vec![]),
        ]);
        assert_eq!(frag.to_html(), r#"<img src="a.png" alt="x&quot;y"><br>"#);
    }

    #[test]
    fn leading_newline_in_pre_is_preserved() {
        let frag = Fragment::new(vec![el("pre", &[], vec![text("\nfn main() {}")])]);
        assert_eq!(frag.to_html(), "<pre>\n\nfn main() {}</pre>");
    }

    #[test]
    fn text_rendering_keeps_structure() {
        let frag = Fragment::new(vec![
            el("h2", &[], vec![text("Equações")]),
            el("p", &[], vec![text("  Uma   equação\n é uma igualdade. ")]),
            el(
                "ul",
                &[],
                vec![
                    el("li", &[], vec![text("primeiro grau")]),
                    el("li", &[], vec![text("segundo grau")]),
                ],
            ),
            el(
                "p",
                &[],
                vec![el("a", &[("href", "https://x.example/eq")], vec![text("mais")])],
            ),
        ]);
        assert_eq!(
            frag.to_text(),
            "## Equações\n\nUma equação é uma igualdade.\n\n- primeiro grau\n- segundo grau\n\nmais (https://x.example/eq)"
        );
    }

    #[test]
    fn whitespace_only_fragment_is_empty() {
        assert!(Fragment::new(vec![text(" \n ")]).is_empty());
        assert!(!Fragment::new(vec![el("hr", &[], vec![])]).is_empty());
    }
}
