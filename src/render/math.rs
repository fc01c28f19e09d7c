//! Math typesetting seam.
//!
//! The renderer leaves `\[ ... \]` (display) and `\( ... \)` (inline)
//! spans untouched in the assembled markup; a typesetter implementation
//! may replace them with rendered output. The default implementation
//! passes markup through unchanged.

/// Delimiter configuration handed to typesetter implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MathDelimiters {
    pub display_open: &'static str,
    pub display_close: &'static str,
    pub inline_open: &'static str,
    pub inline_close: &'static str,
}

impl Default for MathDelimiters {
    fn default() -> Self {
        Self {
            display_open: r"\[",
            display_close: r"\]",
            inline_open: r"\(",
            inline_close: r"\)",
        }
    }
}

/// Replaces delimited math spans in assembled markup with rendered output.
pub trait MathTypesetter: Send + Sync {
    fn typeset(&self, markup: &str) -> String;
}

/// Typesetter that leaves the markup untouched.
pub struct NoopTypesetter;

impl MathTypesetter for NoopTypesetter {
    fn typeset(&self, markup: &str) -> String {
        markup.to_string()
    }
}
