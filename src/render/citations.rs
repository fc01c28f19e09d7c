//! Citation marker extraction and badge markup.
//!
//! `[n]` tokens in answer text reference the n-th entry of the
//! out-of-band citation list. Markers are always stripped from the
//! visible text; the badge markup they resolve to is emitted only when
//! citation rendering is enabled.

use lazy_static::lazy_static;
use regex::Regex;

use super::inline;
use super::RenderOptions;
use crate::search::Citation;

lazy_static! {
    static ref MARKER_RE: Regex = Regex::new(r"\[(\d+)\]").expect("invalid citation marker regex");
}

/// Strip `[n]` markers from `text`, resolving each against the 1-based
/// citation list. Returns the cleaned text and the badge markup (empty
/// when citation rendering is disabled or nothing resolves).
pub(super) fn extract(
    text: &str,
    citations: &[Citation],
    options: &RenderOptions,
) -> (String, String) {
    let mut resolved: Vec<&Citation> = Vec::new();
    for capture in MARKER_RE.captures_iter(text) {
        if let Ok(index) = capture[1].parse::<usize>() {
            if let Some(citation) = index.checked_sub(1).and_then(|i| citations.get(i)) {
                resolved.push(citation);
            }
        }
    }

    let cleaned = MARKER_RE.replace_all(text, "").into_owned();
    let badges = if options.render_citations {
        resolved.iter().map(|c| badge(c)).collect::<String>()
    } else {
        String::new()
    };

    (cleaned, badges)
}

/// Badge markup: the short domain as the visible chip, the title inside a
/// hover tooltip, linking out to the source.
fn badge(citation: &Citation) -> String {
    format!(
        "<a class=\"citation\" href=\"{}\" target=\"_blank\" rel=\"noopener\">\
<span class=\"citation-domain\">{}</span>\
<span class=\"citation-tooltip\">{}</span></a>",
        inline::escape_html(&citation.site_url),
        inline::escape_html(&citation.domain_short),
        inline::escape_html(&citation.title),
    )
}
