//! Material viewer: turns a third-party lesson page into a safe, bounded view.
//!
//! - [`fetch`]: page retrieval behind the [`fetch::PageFetcher`] trait
//! - [`extract`]: main-content container selection in fixed priority order
//! - [`sanitize`]: copy-on-sanitize deny-list + allow-list cleanup
//! - [`fragment`]: the structured markup renderers consume
//! - [`render`]: HTML and plain-text renderers
//! - [`pipeline`]: the per-view state machine tying them together

pub mod extract;
pub mod fetch;
pub mod fragment;
pub mod pipeline;
pub mod render;
pub mod sanitize;

pub use extract::{ContainerKind, ExtractError, Extractor};
pub use fetch::{FetchError, HttpFetcher, PageFetcher, RemoteDocument};
pub use pipeline::{ContentView, ErrorNotice, Phase, Pipeline, PipelineError, ViewState};
pub use render::{HtmlRenderer, Renderer, TextRenderer};
pub use sanitize::Sanitizer;
