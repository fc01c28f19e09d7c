//! Inline formatting.
//!
//! A single left-to-right tokenizing pass: inline-code spans are
//! recognized first and their contents stay opaque, so emphasis markers
//! inside backticks are never expanded. Bold and italic nest through
//! recursion; unmatched markers render literally.

/// Apply inline formatting to a text fragment, HTML-escaping everything
/// outside the generated tags.
pub(super) fn apply(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut rest = text;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('`') {
            match after.find('`') {
                Some(end) => {
                    out.push_str("<code>");
                    out.push_str(&escape_html(&after[..end]));
                    out.push_str("</code>");
                    rest = &after[end + 1..];
                }
                None => {
                    out.push('`');
                    rest = after;
                }
            }
        } else if let Some(after) = rest.strip_prefix("**") {
            match after.find("**") {
                Some(end) if end > 0 => {
                    out.push_str("<strong>");
                    out.push_str(&apply(&after[..end]));
                    out.push_str("</strong>");
                    rest = &after[end + 2..];
                }
                _ => {
                    out.push_str("**");
                    rest = after;
                }
            }
        } else if let Some(after) = rest.strip_prefix('*') {
            match after.find('*') {
                Some(end) if end > 0 => {
                    out.push_str("<em>");
                    out.push_str(&apply(&after[..end]));
                    out.push_str("</em>");
                    rest = &after[end + 1..];
                }
                _ => {
                    out.push('*');
                    rest = after;
                }
            }
        } else {
            // Plain run up to the next marker.
            let next = rest
                .find(|c| c == '`' || c == '*')
                .unwrap_or(rest.len());
            out.push_str(&escape_html(&rest[..next]));
            rest = &rest[next..];
        }
    }

    out
}

/// Escape the HTML-significant characters of a text fragment.
pub(super) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
