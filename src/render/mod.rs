//! Structured text renderer.
//!
//! Converts the constrained markdown dialect produced by the answer
//! stream, plus out-of-band citation metadata, into escaped display
//! markup. Pure: the same input always yields byte-identical output.

mod blocks;
mod citations;
mod inline;
mod math;

pub use math::{MathDelimiters, MathTypesetter, NoopTypesetter};

use crate::search::Citation;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;

lazy_static! {
    // Internal reasoning spans are never meant for display.
    static ref THINK_SPAN_RE: Regex =
        Regex::new(r"(?s)<think>.*?</think>").expect("invalid think-span regex");
    // Normalize display-math bracket spacing so delimiter detection is
    // insensitive to incidental whitespace.
    static ref DISPLAY_MATH_RE: Regex =
        Regex::new(r"(?s)\\\[\s*(.*?)\s*\\\]").expect("invalid display-math regex");
}

/// Renderer behavior toggles.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Emit citation badges for `[n]` markers instead of only stripping
    /// them. Off by default.
    pub render_citations: bool,
}

/// The structured text renderer.
pub struct Renderer {
    options: RenderOptions,
    typesetter: Arc<dyn MathTypesetter>,
}

impl Renderer {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            typesetter: Arc::new(NoopTypesetter),
        }
    }

    /// Use a math typesetter implementation instead of the pass-through
    /// default.
    pub fn with_typesetter(options: RenderOptions, typesetter: Arc<dyn MathTypesetter>) -> Self {
        Self {
            options,
            typesetter,
        }
    }

    /// Render raw answer text to display markup.
    pub fn render(&self, raw_text: &str, citations: &[Citation]) -> String {
        let stripped = THINK_SPAN_RE.replace_all(raw_text, "");
        let normalized = DISPLAY_MATH_RE.replace_all(&stripped, r"\[ ${1} \]");
        let markup = blocks::assemble(&normalized, citations, &self.options);
        self.typesetter.typeset(&markup)
    }
}

/// Render with default options: citation markers stripped, math spans
/// passed through untouched.
pub fn render(raw_text: &str, citations: &[Citation]) -> String {
    Renderer::new(RenderOptions::default()).render(raw_text, citations)
}
