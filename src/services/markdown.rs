//! Markdown rendering for post bodies
//!
//! Uses pulldown-cmark with tables, strikethrough and task lists. Raw HTML
//! in the source is escaped rather than passed through, and link targets
//! with script-capable schemes are dropped.

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};

#[derive(Debug, Clone, Default)]
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self
    }

    fn options() -> Options {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options
    }

    /// Render Markdown into HTML that is safe to embed in a page
    pub fn render(&self, source: &str) -> String {
        let parser = Parser::new_ext(source, Self::options()).map(|event| match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            }) => Event::Start(Tag::Link {
                link_type,
                dest_url: safe_url(dest_url),
                title,
                id,
            }),
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) => Event::Start(Tag::Image {
                link_type,
                dest_url: safe_url(dest_url),
                title,
                id,
            }),
            other => other,
        });

        let mut output = String::with_capacity(source.len() * 3 / 2);
        html::push_html(&mut output, parser);
        output
    }

    /// Plain-text excerpt of at most `max_chars` characters
    pub fn excerpt(&self, source: &str, max_chars: usize) -> String {
        let mut text = String::new();
        for event in Parser::new_ext(source, Self::options()) {
            match event {
                Event::Text(t) | Event::Code(t) => text.push_str(&t),
                Event::SoftBreak | Event::HardBreak | Event::End(_) => {
                    if !text.ends_with(' ') && !text.is_empty() {
                        text.push(' ');
                    }
                }
                _ => {}
            }
        }
        let text = text.trim();
        if text.chars().count() <= max_chars {
            return text.to_string();
        }
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    }
}

fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    let scheme = url.trim_start().to_ascii_lowercase();
    if scheme.starts_with("javascript:") || scheme.starts_with("vbscript:") || scheme.starts_with("data:") {
        CowStr::Borrowed("#")
    } else {
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_markdown() {
        let html = MarkdownRenderer::new().render("# Title\n\nSome **bold** and ~~old~~ text.");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<del>old</del>"));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let html = MarkdownRenderer::new().render("Hello <script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_block_html_is_escaped() {
        let html = MarkdownRenderer::new().render("<div onclick=\"x()\">hi</div>\n");
        assert!(!html.contains("<div"));
    }

    #[test]
    fn test_javascript_links_dropped() {
        let html = MarkdownRenderer::new().render("[click](javascript:alert(1))");
        assert!(html.contains("href=\"#\""));
        let html = MarkdownRenderer::new().render("[ok](https://example.com)");
        assert!(html.contains("href=\"https://example.com\""));
    }

    #[test]
    fn test_excerpt() {
        let renderer = MarkdownRenderer::new();
        assert_eq!(renderer.excerpt("# Hi\n\nthere", 50), "Hi there");
        assert_eq!(renderer.excerpt("abcdefghij", 4), "abcd...");
    }
}
