//! Plain text extraction from raw content.

use scraper::{ElementRef, Html, Node, Selector};
use serde::{Deserialize, Serialize};

use crate::models::Document;
use crate::pipeline::{DocumentProcessor, ProcessorError, Reporter};

use super::mimetype_matches;

/// Elements whose text never reaches the output.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements that end a line of text.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p",
    "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Content types decoded as UTF-8 text as-is.
const PLAIN_TYPES: &[&str] = &[
    "text/*",
    "application/json",
    "application/xml",
    "application/javascript",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Drop documents whose content cannot be turned into text.
    #[serde(default)]
    pub drop_unsupported: bool,
    /// Keep raw bytes after extraction.
    #[serde(default = "default_true")]
    pub keep_raw: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            name: None,
            drop_unsupported: false,
            keep_raw: true,
        }
    }
}

/// Fills `Document::text` from `raw_content`.
pub struct TextExtractor {
    name: String,
    config: TextConfig,
}

impl TextExtractor {
    pub fn new(name: String, config: TextConfig) -> Self {
        Self { name, config }
    }
}

impl DocumentProcessor for TextExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(
        &mut self,
        mut doc: Document,
        reporter: &dyn Reporter,
    ) -> Result<Vec<Document>, ProcessorError> {
        let Some(raw) = doc.raw_content.as_deref() else {
            if doc.text.is_none() && self.config.drop_unsupported {
                reporter.incr("text.unsupported", 1);
                return Ok(Vec::new());
            }
            return Ok(vec![doc]);
        };

        let mime = doc
            .content_type
            .clone()
            .or_else(|| infer::get(raw).map(|t| t.mime_type().to_string()))
            .unwrap_or_default();
        let extracted = extract(raw, &mime);

        match extracted {
            Some((title, text)) => {
                reporter.incr("text.extracted", 1);
                if let Some(title) = title {
                    doc.metadata.set("html.title", title);
                }
                doc.text = Some(text);
                if doc.content_type.is_none() && !mime.is_empty() {
                    doc.content_type = Some(mime);
                }
                if !self.config.keep_raw {
                    doc.raw_content = None;
                }
                Ok(vec![doc])
            }
            None if self.config.drop_unsupported => {
                tracing::debug!("Dropping {} ({}): no text extractor", doc.url, mime);
                reporter.incr("text.unsupported", 1);
                Ok(Vec::new())
            }
            None => Ok(vec![doc]),
        }
    }
}

/// Text (and HTML title) for `raw`, or `None` when `mime` has no extractor.
fn extract(raw: &[u8], mime: &str) -> Option<(Option<String>, String)> {
    if is_html(mime) {
        Some(html_to_text(&String::from_utf8_lossy(raw)))
    } else if PLAIN_TYPES.iter().any(|p| mimetype_matches(p, mime)) {
        Some((None, String::from_utf8_lossy(raw).into_owned()))
    } else {
        None
    }
}

fn is_html(mime: &str) -> bool {
    mimetype_matches("text/html", mime) || mimetype_matches("application/xhtml+xml", mime)
}

/// Extract the `<title>` and the visible body text of an HTML page.
///
/// Block elements end a line; runs of whitespace inside a line collapse to
/// one space.
pub fn html_to_text(html: &str) -> (Option<String>, String) {
    let document = Html::parse_document(html);

    let title = Selector::parse("title")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let mut raw = String::new();
    let root = Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .unwrap_or_else(|| document.root_element());
    walk(root, &mut raw);

    let text = raw
        .lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    (title, text)
}

fn walk(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let tag = el.name();
                if SKIPPED_ELEMENTS.contains(&tag) {
                    continue;
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    walk(child_el, out);
                }
                if BLOCK_ELEMENTS.contains(&tag) {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
