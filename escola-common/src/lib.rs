//! Common types and utilities shared across Escola crates.
//!
//! This crate holds the pieces every other crate needs without pulling in
//! heavy transitive dependencies: the user-facing [`Locale`] with its
//! message table, and the [`observability`] helpers that set up `tracing`.
//!
//! # Examples
//!
//! ```rust
//! use escola_common::Locale;
//!
//! let locale = Locale::default();
//! assert_eq!(locale, Locale::Pt);
//! assert_eq!(locale.messages().try_again, "Tentar novamente");
//! ```
use serde::{Deserialize, Serialize};

pub mod observability;

/// Language used for messages shown to students.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// Portuguese (Mozambique), the portal's primary audience.
    #[default]
    Pt,
    En,
}

/// Fixed strings for one locale.
#[derive(Debug, Clone, Copy)]
pub struct Messages {
    pub network_error: &'static str,
    pub extraction_error: &'static str,
    pub try_again: &'static str,
    pub open_original: &'static str,
    pub loading: &'static str,
}

const PT: Messages = Messages {
    network_error: "Não foi possível carregar o conteúdo. Verifique a sua ligação.",
    extraction_error: "Conteúdo não encontrado nesta página.",
    try_again: "Tentar novamente",
    open_original: "Abrir Original",
    loading: "A carregar…",
};

const EN: Messages = Messages {
    network_error: "Could not load the content. Check your connection.",
    extraction_error: "Content not found on this page.",
    try_again: "Try again",
    open_original: "Open original",
    loading: "Loading…",
};

impl Locale {
    pub fn messages(self) -> &'static Messages {
        match self {
            Locale::Pt => &PT,
            Locale::En => &EN,
        }
    }

    /// Whether a free-form answer means "yes" in this locale (`s`/`sim`, `y`/`yes`).
    pub fn is_affirmative(self, answer: &str) -> bool {
        let a = answer.trim().to_lowercase();
        match self {
            Locale::Pt => matches!(a.as_str(), "s" | "sim"),
            Locale::En => matches!(a.as_str(), "y" | "yes"),
        }
    }
}
