//! Per-view state machine: fetch → extract → sanitize → render.
//!
//! ```text
//! Idle → Fetching → { NetworkError | ExtractionError | Extracted }
//!      Extracted → Sanitizing → Rendered
//! NetworkError | ExtractionError --retry--> Fetching
//! ```
//!
//! Failures are states, not `Err`s: [`ContentView::load`] only errors on an
//! invalid transition (loading twice, retrying a rendered view).

use std::sync::Arc;

use escola_common::Locale;
use thiserror::Error;
use url::Url;

use crate::extract::{ContainerKind, ExtractError, Extractor};
use crate::fetch::{FetchError, PageFetcher};
use crate::fragment::Fragment;
use crate::render::{RenderInput, Renderer};
use crate::sanitize::Sanitizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Fetching,
    Extracted,
    Sanitizing,
    Rendered,
    NetworkError,
    ExtractionError,
}

impl Phase {
    pub fn is_error(self) -> bool {
        matches!(self, Phase::NetworkError | Phase::ExtractionError)
    }

    pub fn is_terminal(self) -> bool {
        self.is_error() || self == Phase::Rendered
    }
}

#[derive(Debug, Clone)]
pub struct RenderedView {
    pub title: String,
    pub source: Url,
    pub container: ContainerKind,
    pub fragment: Fragment,
    /// Renderer output.
    pub output: String,
    /// blake3 of the fetched body.
    pub checksum: String,
}

#[derive(Debug, Clone)]
pub enum ViewState {
    Idle,
    Fetching,
    Extracted { container: ContainerKind },
    Sanitizing,
    Rendered(RenderedView),
    NetworkError(FetchError),
    ExtractionError(ExtractError),
}

impl ViewState {
    pub fn phase(&self) -> Phase {
        match self {
            ViewState::Idle => Phase::Idle,
            ViewState::Fetching => Phase::Fetching,
            ViewState::Extracted { .. } => Phase::Extracted,
            ViewState::Sanitizing => Phase::Sanitizing,
            ViewState::Rendered(_) => Phase::Rendered,
            ViewState::NetworkError(_) => Phase::NetworkError,
            ViewState::ExtractionError(_) => Phase::ExtractionError,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("cannot {action} a view in state {from:?}")]
    InvalidTransition { from: Phase, action: &'static str },
}

/// What the UI shows for a failed view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNotice {
    pub message: &'static str,
    pub retry_label: &'static str,
    /// Technical cause, for logs and verbose output.
    pub detail: String,
}

/// The components one view runs through.
pub struct Pipeline {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Extractor,
    sanitizer: Sanitizer,
    renderer: Arc<dyn Renderer>,
    locale: Locale,
}

impl Pipeline {
    pub fn new(fetcher: Arc<dyn PageFetcher>, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            fetcher,
            extractor: Extractor::new(),
            sanitizer: Sanitizer::new(),
            renderer,
            locale: Locale::default(),
        }
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }
}

/// One material page being viewed.
#[derive(Debug)]
pub struct ContentView {
    url: Url,
    title: Option<String>,
    state: ViewState,
    history: Vec<Phase>,
    attempts: u32,
}

impl ContentView {
    pub fn new(url: Url, title: Option<String>) -> Self {
        let title = title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        Self {
            url,
            title,
            state: ViewState::Idle,
            history: vec![Phase::Idle],
            attempts: 0,
        }
    }

    /// Build a view from navigation parameters.
    pub fn from_params(url: &str, title: Option<&str>) -> Result<Self, FetchError> {
        let url = Url::parse(url.trim()).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }
        Ok(Self::new(url, title.map(str::to_string)))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Every phase entered so far, starting with `Idle`.
    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    /// Number of fetches issued.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn rendered(&self) -> Option<&RenderedView> {
        match &self.state {
            ViewState::Rendered(view) => Some(view),
            _ => None,
        }
    }

    /// Run the pipeline once from `Idle`.
    pub async fn load(&mut self, pipeline: &Pipeline) -> Result<&ViewState, PipelineError> {
        if self.phase() != Phase::Idle {
            return Err(PipelineError::InvalidTransition {
                from: self.phase(),
                action: "load",
            });
        }
        self.run(pipeline).await;
        Ok(&self.state)
    }

    /// Re-run the pipeline from scratch after a failure.
    pub async fn retry(&mut self, pipeline: &Pipeline) -> Result<&ViewState, PipelineError> {
        if !self.phase().is_error() {
            return Err(PipelineError::InvalidTransition {
                from: self.phase(),
                action: "retry",
            });
        }
        tracing::info!(url = %self.url, attempt = self.attempts + 1, "content.view.retry");
        self.run(pipeline).await;
        Ok(&self.state)
    }

    /// Localized message and retry label when the view failed.
    pub fn error_notice(&self, locale: Locale) -> Option<ErrorNotice> {
        let msgs = locale.messages();
        let (message, detail) = match &self.state {
            ViewState::NetworkError(e) => (msgs.network_error, e.to_string()),
            ViewState::ExtractionError(e) => (msgs.extraction_error, e.to_string()),
            _ => return None,
        };
        Some(ErrorNotice {
            message,
            retry_label: msgs.try_again,
            detail,
        })
    }

    async fn run(&mut self, pipeline: &Pipeline) {
        self.attempts += 1;
        self.transition(ViewState::Fetching);

        let doc = match pipeline.fetcher.fetch(&self.url).await {
            Ok(doc) => doc,
            Err(err) => {
                tracing::warn!(url = %self.url, error = %err, "content.view.fetch_failed");
                self.transition(ViewState::NetworkError(err));
                return;
            }
        };

        // The parsed document stays inside this block; nothing below awaits.
        let cleaned = {
            let html = Extractor::parse(&doc.body);
            match pipeline.extractor.extract(&html) {
                Ok(hit) => {
                    self.transition(ViewState::Extracted {
                        container: hit.kind,
                    });
                    self.transition(ViewState::Sanitizing);
                    let fragment = pipeline
                        .sanitizer
                        .clone()
                        .with_base(doc.url.clone())
                        .clean(hit.element);
                    Ok((hit.kind, fragment, pipeline.extractor.page_title(&html)))
                }
                Err(err) => Err(err),
            }
        };

        let (container, fragment, page_title) = match cleaned {
            Ok(parts) => parts,
            Err(err) => {
                tracing::warn!(url = %doc.url, error = %err, "content.view.extract_failed");
                self.transition(ViewState::ExtractionError(err));
                return;
            }
        };

        let title = self
            .title
            .clone()
            .or(page_title)
            .unwrap_or_else(|| doc.url.to_string());
        let output = pipeline.renderer.render(&RenderInput {
            title: &title,
            source: &self.url,
            container,
            fragment: &fragment,
            locale: pipeline.locale,
        });
        self.transition(ViewState::Rendered(RenderedView {
            title,
            source: self.url.clone(),
            container,
            fragment,
            output,
            checksum: doc.checksum,
        }));
    }

    fn transition(&mut self, next: ViewState) {
        let from = self.phase();
        let to = next.phase();
        tracing::debug!(url = %self.url, ?from, ?to, "content.view.state");
        self.state = next;
        self.history.push(to);
    }
}
