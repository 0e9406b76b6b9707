//! Markdown Stripping
//!
//! Chat answers from the engine are written in markdown; the widget renders
//! plain text.

use pulldown_cmark::{Event, Parser, Tag, TagEnd};

/// Render markdown to plain text.
///
/// Block elements end up on their own lines, link and image text is kept,
/// URLs and raw HTML are dropped.
pub fn strip_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());

    for event in Parser::new(text) {
        match event {
            Event::Text(t) | Event::Code(t) => out.push_str(&t),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::Start(Tag::Item)
            | Event::Rule
            | Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::CodeBlock
                | TagEnd::BlockQuote(_),
            ) => line_break(&mut out),
            _ => {}
        }
    }

    out.trim().to_string()
}

fn line_break(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}
