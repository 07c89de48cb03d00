//! Post body and tag formatting.
//!
//! Any change to the output here must come with a bump of
//! [`GENERATOR_VERSION`](crate::model::GENERATOR_VERSION), otherwise topics
//! published earlier keep the old format.

use crate::model::Event;

/// Markdown body of an event's first post.
///
/// Authors in italics, then the description with single line breaks widened
/// to paragraph breaks, then the goals section if present.
pub fn post_body(event: &Event) -> String {
    let mut body = String::new();
    if !event.authors.is_empty() {
        body.push_str(&format!("*{}*\n\n", event.authors.join(", ")));
    }
    body.push_str(&paragraphs(&event.description));

    if let Some(goals) = event.goals.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
        body.push_str("\n\n### Goals\n\n");
        body.push_str(&paragraphs(goals));
    }
    body
}

/// Topic tags for an event.
pub fn tags(event: &Event) -> Vec<String> {
    vec![event.track.clone()]
}

/// Collapse runs of blank lines and separate every remaining line as its own
/// paragraph.
fn paragraphs(text: &str) -> String {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
