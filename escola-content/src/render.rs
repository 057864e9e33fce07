//! Display surfaces for a cleaned material page.
//!
//! Renderers receive a [`Fragment`] built by the sanitizer, never raw remote
//! markup, and wrap it in a bounded container together with the title and a
//! link back to the original page.

use escola_common::Locale;
use url::Url;

use crate::extract::ContainerKind;
use crate::fragment::{Fragment, escape_attr, escape_text};

/// Everything a renderer may show for one view.
#[derive(Debug, Clone, Copy)]
pub struct RenderInput<'a> {
    pub title: &'a str,
    pub source: &'a Url,
    pub container: ContainerKind,
    pub fragment: &'a Fragment,
    pub locale: Locale,
}

pub trait Renderer: Send + Sync {
    fn render(&self, input: &RenderInput<'_>) -> String;
}

/// Bounded HTML container, safe to embed in a page.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlRenderer;

impl Renderer for HtmlRenderer {
    fn render(&self, input: &RenderInput<'_>) -> String {
        let msgs = input.locale.messages();
        let mut out = String::new();
        out.push_str("<section class=\"material-view\" data-container=\"");
        out.push_str(input.container.label());
        out.push_str("\">\n<h1>");
        escape_text(input.title, &mut out);
        out.push_str("</h1>\n<div class=\"material-body\">");
        out.push_str(&input.fragment.to_html());
        out.push_str("</div>\n<a class=\"material-source\" href=\"");
        escape_attr(input.source.as_str(), &mut out);
        out.push_str("\" target=\"_blank\" rel=\"noopener noreferrer\">");
        escape_text(msgs.open_original, &mut out);
        out.push_str("</a>\n</section>\n");
        out
    }
}

/// Plain text for terminals.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextRenderer;

impl Renderer for TextRenderer {
    fn render(&self, input: &RenderInput<'_>) -> String {
        let msgs = input.locale.messages();
        let title = input.title.trim();
        let rule = "=".repeat(title.chars().count().max(3));
        format!(
            "{title}\n{rule}\n\n{body}\n\n{}: {}\n",
            msgs.open_original,
            input.source,
            body = input.fragment.to_text(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::{FragmentElement, FragmentNode};

    fn sample() -> (Url, Fragment) {
        let url = Url::parse("https://blog.example.com/aula?x=1&y=2").unwrap();
        let frag = Fragment::new(vec![FragmentNode::Element(FragmentElement {
            tag: "p".into(),
            attrs: vec![],
            children: vec![FragmentNode::Text("Olá".into())],
        })]);
        (url, frag)
    }

    #[test]
    fn html_output_escapes_title_and_source() {
        let (url, frag) = sample();
        let out = HtmlRenderer.render(&RenderInput {
            title: "<b>Física</b> & mais",
            source: &url,
            container: ContainerKind::PostBody,
            fragment: &frag,
            locale: Locale::Pt,
        });
        assert!(out.starts_with(r#"<section class="material-view" data-container="post-body">"#));
        assert!(out.contains("<h1>&lt;b&gt;Física&lt;/b&gt; &amp; mais</h1>"));
        assert!(out.contains(r#"<div class="material-body"><p>Olá</p></div>"#));
        assert!(out.contains(r#"href="https://blog.example.com/aula?x=1&amp;y=2""#));
        assert!(out.contains(">Abrir Original</a>"));
    }

    #[test]
    fn text_output_has_title_rule_and_link() {
        let (url, frag) = sample();
        let out = TextRenderer.render(&RenderInput {
            title: "Química",
            source: &url,
            container: ContainerKind::Article,
            fragment: &frag,
            locale: Locale::En,
        });
        assert_eq!(
            out,
            "Química\n=======\n\nOlá\n\nOpen original: https://blog.example.com/aula?x=1&y=2\n"
        );
    }
}
