//! Block-level assembly.
//!
//! One top-to-bottom pass over newline-split lines with three block
//! states: inside-list, inside-table, inside-code. Table rows are
//! buffered and rendered when the table closes (blank line, heading,
//! rule, or end of input). An unterminated code fence is flushed at end
//! of input so no content is lost.

use super::citations;
use super::inline;
use super::RenderOptions;
use crate::search::Citation;

pub(super) fn assemble(text: &str, citation_meta: &[Citation], options: &RenderOptions) -> String {
    let mut out = String::new();
    let mut in_list = false;
    let mut in_code = false;
    let mut code_language = String::new();
    let mut code_lines: Vec<&str> = Vec::new();
    let mut table_rows: Vec<&str> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();

        if in_code {
            if trimmed == "```" {
                flush_code(&mut out, &code_language, &code_lines);
                code_lines.clear();
                in_code = false;
            } else {
                code_lines.push(line);
            }
            continue;
        }

        if trimmed == "---" {
            close_list(&mut out, &mut in_list);
            flush_table(&mut out, &mut table_rows);
            out.push_str("<hr />");
            continue;
        }

        if let Some(fence_rest) = trimmed.strip_prefix("```") {
            close_list(&mut out, &mut in_list);
            in_code = true;
            code_language = if fence_rest.trim().is_empty() {
                "plaintext".to_string()
            } else {
                fence_rest.trim().to_string()
            };
            continue;
        }

        if trimmed.is_empty() {
            close_list(&mut out, &mut in_list);
            flush_table(&mut out, &mut table_rows);
            continue;
        }

        if let Some((level, heading)) = parse_heading(trimmed) {
            close_list(&mut out, &mut in_list);
            flush_table(&mut out, &mut table_rows);
            out.push_str(&format!(
                "<h{level}>{}</h{level}>",
                inline::apply(heading)
            ));
            continue;
        }

        if let Some(item) = trimmed.strip_prefix("- ") {
            if !in_list {
                out.push_str("<ul>");
                in_list = true;
            }
            let (cleaned, badges) = citations::extract(item, citation_meta, options);
            out.push_str(&format!("<li>{}{}</li>", inline::apply(&cleaned), badges));
            continue;
        }

        if is_table_row(trimmed) {
            close_list(&mut out, &mut in_list);
            table_rows.push(trimmed);
            continue;
        }

        close_list(&mut out, &mut in_list);
        let (cleaned, badges) = citations::extract(trimmed, citation_meta, options);
        out.push_str(&format!("<p>{}{}</p>", inline::apply(&cleaned), badges));
    }

    close_list(&mut out, &mut in_list);
    flush_table(&mut out, &mut table_rows);
    if in_code {
        flush_code(&mut out, &code_language, &code_lines);
    }

    out
}

fn close_list(out: &mut String, in_list: &mut bool) {
    if *in_list {
        out.push_str("</ul>");
        *in_list = false;
    }
}

fn parse_heading(line: &str) -> Option<(usize, &str)> {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    line[hashes..].strip_prefix(' ').map(|rest| (hashes, rest))
}

fn is_table_row(line: &str) -> bool {
    line.len() > 1 && line.starts_with('|') && line.ends_with('|')
}

/// Render buffered table rows: first row is the header, second row is the
/// alignment separator (discarded), the rest are body rows. Fewer than
/// two buffered rows render as nothing.
fn flush_table(out: &mut String, rows: &mut Vec<&str>) {
    if rows.len() < 2 {
        rows.clear();
        return;
    }

    out.push_str("<div class=\"table-scroll\"><table><thead><tr>");
    for cell in split_cells(rows[0]) {
        out.push_str(&format!("<th>{}</th>", inline::apply(cell)));
    }
    out.push_str("</tr></thead><tbody>");
    for row in &rows[2..] {
        out.push_str("<tr>");
        for cell in split_cells(row) {
            out.push_str(&format!("<td>{}</td>", inline::apply(cell)));
        }
        out.push_str("</tr>");
    }
    out.push_str("</tbody></table></div>");
    rows.clear();
}

/// Cells are split naively on `|`; an escaped pipe inside a cell will
/// misalign columns.
fn split_cells(row: &str) -> Vec<&str> {
    row.trim_start_matches('|')
        .trim_end_matches('|')
        .split('|')
        .map(str::trim)
        .collect()
}

fn flush_code(out: &mut String, language: &str, lines: &[&str]) {
    out.push_str(&format!(
        "<pre><code class=\"language-{}\">{}</code></pre>",
        inline::escape_html(language),
        inline::escape_html(&lines.join("\n"))
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(text: &str) -> String {
        assemble(text, &[], &RenderOptions::default())
    }

    #[test]
    fn test_heading_then_paragraph() {
        assert_eq!(
            render("# Title\n\nSome text"),
            "<h1>Title</h1><p>Some text</p>"
        );
    }

    #[test]
    fn test_heading_levels() {
        assert_eq!(render("### Deep"), "<h3>Deep</h3>");
        assert_eq!(render("###### Deepest"), "<h6>Deepest</h6>");
        // Seven hashes is not a heading.
        assert_eq!(render("####### Nope"), "<p>####### Nope</p>");
        // No space after the hashes is not a heading either.
        assert_eq!(render("#Nope"), "<p>#Nope</p>");
    }

    #[test]
    fn test_list_opens_and_closes() {
        assert_eq!(
            render("- one\n- two\nafter"),
            "<ul><li>one</li><li>two</li></ul><p>after</p>"
        );
    }

    #[test]
    fn test_rule_closes_list() {
        assert_eq!(render("- one\n---"), "<ul><li>one</li></ul><hr />");
    }

    #[test]
    fn test_table_renders_header_and_body() {
        let markup = render("| A | B |\n| - | - |\n| 1 | 2 |");
        assert_eq!(
            markup,
            "<div class=\"table-scroll\"><table><thead><tr><th>A</th><th>B</th></tr></thead>\
<tbody><tr><td>1</td><td>2</td></tr></tbody></table></div>"
        );
    }

    #[test]
    fn test_table_with_single_row_renders_nothing() {
        assert_eq!(render("| only | row |"), "");
    }

    #[test]
    fn test_table_closed_by_heading() {
        let markup = render("| A |\n| - |\n| 1 |\n# Next");
        assert!(markup.starts_with("<div class=\"table-scroll\">"));
        assert!(markup.ends_with("<h1>Next</h1>"));
    }

    #[test]
    fn test_code_block_with_language() {
        assert_eq!(
            render("```rust\nlet x = 1;\n```"),
            "<pre><code class=\"language-rust\">let x = 1;</code></pre>"
        );
    }

    #[test]
    fn test_code_block_defaults_to_plaintext() {
        assert_eq!(
            render("```\nraw\n```"),
            "<pre><code class=\"language-plaintext\">raw</code></pre>"
        );
    }

    #[test]
    fn test_code_block_content_is_verbatim_and_escaped() {
        let markup = render("```\n**not bold** <tag>\n```");
        assert_eq!(
            markup,
            "<pre><code class=\"language-plaintext\">**not bold** &lt;tag&gt;</code></pre>"
        );
    }

    #[test]
    fn test_unterminated_code_fence_is_flushed() {
        let markup = render("```python\nprint(1)\nprint(2)");
        assert_eq!(
            markup,
            "<pre><code class=\"language-python\">print(1)\nprint(2)</code></pre>"
        );
    }

    #[test]
    fn test_paragraphs_one_per_line() {
        assert_eq!(render("first\nsecond"), "<p>first</p><p>second</p>");
    }

    #[test]
    fn test_inline_formatting_in_heading_and_list() {
        assert_eq!(render("## **Bold** title"), "<h2><strong>Bold</strong> title</h2>");
        assert_eq!(
            render("- has `code`"),
            "<ul><li>has <code>code</code></li></ul>"
        );
    }

    #[test]
    fn test_table_cells_get_inline_formatting() {
        let markup = render("| **A** | B |\n| - | - |\n| `x` | y |");
        assert!(markup.contains("<th><strong>A</strong></th>"));
        assert!(markup.contains("<td><code>x</code></td>"));
    }
}
