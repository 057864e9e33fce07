//! Main-content selection for third-party material pages.
//!
//! Blog engines wrap the readable part of a page in a handful of well-known
//! containers. [`Extractor`] tries them in [`CONTAINER_PRIORITY`] order and
//! reports which one hit, so callers can log or test the decision.

use scraper::{ElementRef, Html, Node, Selector};
use serde::Serialize;
use thiserror::Error;

use crate::sanitize::DEFAULT_DENY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainerKind {
    Article,
    PostBody,
    EntryContent,
    Main,
    Content,
}

impl ContainerKind {
    pub fn selector(self) -> &'static str {
        match self {
            ContainerKind::Article => "article",
            ContainerKind::PostBody => ".post-body",
            ContainerKind::EntryContent => ".entry-content",
            ContainerKind::Main => "main",
            ContainerKind::Content => ".content",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ContainerKind::Article => "article",
            ContainerKind::PostBody => "post-body",
            ContainerKind::EntryContent => "entry-content",
            ContainerKind::Main => "main",
            ContainerKind::Content => "content",
        }
    }
}

/// Containers in the order they are tried.
pub const CONTAINER_PRIORITY: [ContainerKind; 5] = [
    ContainerKind::Article,
    ContainerKind::PostBody,
    ContainerKind::EntryContent,
    ContainerKind::Main,
    ContainerKind::Content,
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("content not found")]
    ContentNotFound,
}

/// The chosen container, borrowed from its parsed document.
#[derive(Debug, Clone, Copy)]
pub struct Extracted<'a> {
    pub kind: ContainerKind,
    pub element: ElementRef<'a>,
}

impl Extracted<'_> {
    pub fn inner_html(&self) -> String {
        self.element.inner_html()
    }
}

pub struct Extractor {
    matchers: Vec<(ContainerKind, Selector)>,
    title: Selector,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    pub fn new() -> Self {
        let matchers = CONTAINER_PRIORITY
            .iter()
            .map(|&kind| {
                let sel = Selector::parse(kind.selector())
                    .expect("built-in container selectors are valid CSS");
                (kind, sel)
            })
            .collect();
        let title = Selector::parse("title").expect("`title` is a valid selector");
        Self { matchers, title }
    }

    pub fn parse(html: &str) -> Html {
        Html::parse_document(html)
    }

    /// First non-empty match, trying container kinds in priority order.
    ///
    /// ```
    /// use escola_content::extract::{ContainerKind, Extractor};
    ///
    /// let doc = Extractor::parse(
    ///     r#"<main><div class="entry-content"><p>Olá</p></div></main>"#,
    /// );
    /// let hit = Extractor::new().extract(&doc).unwrap();
    /// assert_eq!(hit.kind, ContainerKind::EntryContent);
    /// assert_eq!(hit.inner_html(), "<p>Olá</p>");
    /// ```
    pub fn extract<'a>(&self, doc: &'a Html) -> Result<Extracted<'a>, ExtractError> {
        for (kind, sel) in &self.matchers {
            let candidates = doc.select(sel).count();
            if let Some(element) = doc.select(sel).find(|el| has_content(*el)) {
                tracing::debug!(
                    container = kind.label(),
                    candidates,
                    "content.extract.hit"
                );
                return Ok(Extracted {
                    kind: *kind,
                    element,
                });
            }
            if candidates > 0 {
                tracing::trace!(container = kind.label(), candidates, "content.extract.empty");
            }
        }
        tracing::debug!("content.extract.miss");
        Err(ExtractError::ContentNotFound)
    }

    /// Text of the document's `<title>`, if present and non-blank.
    pub fn page_title(&self, doc: &Html) -> Option<String> {
        let title = doc.select(&self.title).next()?;
        let text = title.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        (!text.is_empty()).then_some(text)
    }
}

/// Non-blank text or any element that survives the deny-list.
fn has_content(el: ElementRef<'_>) -> bool {
    el.children().any(|child| match child.value() {
        Node::Text(text) => !text.trim().is_empty(),
        Node::Element(e) => !DEFAULT_DENY.iter().any(|rule| rule.matches(e)),
        _ => false,
    })
}
