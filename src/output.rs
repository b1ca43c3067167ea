//! Rendering of paragraph sequences.
//!
//! [`OutputFormatter`] is a pure mapping: the same paragraphs and settings
//! always give byte-identical output.

use itertools::Itertools;
use url::Url;

use crate::definitions::{Document, JsonDocument, JsonParagraph};
use crate::wikitext::cleaner::{Paragraph, ParagraphKind, ParagraphLine};
use crate::wikitext::enums::OutputFormat;
use crate::wikitext::errors::Result;
use crate::wikitext::html::HtmlSanitizer;

/// A rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// One string per paragraph.
    Plain(Vec<String>),
    Markdown(String),
    Html(String),
    Json(JsonDocument),
}

impl Output {
    /// The output as one string: plain paragraphs separated by blank lines,
    /// JSON on a single line.
    pub fn render(&self) -> Result<String> {
        Ok(match self {
            Output::Plain(paragraphs) => paragraphs.join("\n\n"),
            Output::Markdown(s) | Output::Html(s) => s.clone(),
            Output::Json(doc) => serde_json::to_string(doc)?,
        })
    }
}

/// Page URL: `url_base?curid=id`.
pub fn page_url(url_base: &str, id: &str) -> String {
    if url_base.is_empty() {
        return String::new();
    }
    match Url::parse(url_base) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("curid", id);
            url.to_string()
        }
        Err(_) => format!("{}?curid={}", url_base, id),
    }
}

fn heading_text(title: &str, level: usize, mark_headers: bool) -> String {
    if mark_headers {
        return format!("{} {}", "#".repeat(level), title);
    }
    if title.ends_with(['.', '!', '?', ':']) {
        title.to_string()
    } else {
        format!("{}.", title)
    }
}

/// Markdown/plain prefix for one list item. `counters` numbers ordered items
/// per depth.
fn list_prefix(line: &ParagraphLine, counters: &mut Vec<usize>) -> String {
    let depth = line.depth().max(1);
    counters.resize(depth, 0);
    let indent = "  ".repeat(depth - 1);
    match line.marker.as_deref().and_then(|m| m.chars().last()) {
        Some('#') => {
            counters[depth - 1] += 1;
            format!("{}{}. ", indent, counters[depth - 1])
        }
        Some(';') | Some(':') if depth == 1 => String::new(),
        _ => format!("{}- ", indent),
    }
}

fn list_tags(marker: char) -> (&'static str, &'static str) {
    match marker {
        '#' => ("ol", "li"),
        ';' => ("dl", "dt"),
        ':' => ("dl", "dd"),
        _ => ("ul", "li"),
    }
}

/// Nested `<ul>`/`<ol>`/`<dl>` markup for a list paragraph.
fn html_list(lines: &[ParagraphLine]) -> String {
    let mut out = String::new();
    let mut open: Vec<char> = Vec::new();

    for line in lines {
        let markers: Vec<char> = line.marker.as_deref().unwrap_or("*").chars().collect();
        let depth = markers.len();
        let common = open
            .iter()
            .zip(&markers)
            .take_while(|(a, b)| list_tags(**a).0 == list_tags(**b).0)
            .count();

        if common == depth {
            while open.len() > depth {
                if let Some(m) = open.pop() {
                    let (list, item) = list_tags(m);
                    out.push_str(&format!("</{}></{}>", item, list));
                }
            }
            let (_, old_item) = list_tags(open[depth - 1]);
            let (_, new_item) = list_tags(markers[depth - 1]);
            out.push_str(&format!("</{}><{}>", old_item, new_item));
            open[depth - 1] = markers[depth - 1];
        } else {
            while open.len() > common {
                if let Some(m) = open.pop() {
                    let (list, item) = list_tags(m);
                    out.push_str(&format!("</{}></{}>", item, list));
                }
            }
            for &m in &markers[common..] {
                let (list, item) = list_tags(m);
                out.push_str(&format!("<{}><{}>", list, item));
                open.push(m);
            }
        }
        out.push_str(&line.text);
    }
    while let Some(m) = open.pop() {
        let (list, item) = list_tags(m);
        out.push_str(&format!("</{}></{}>", item, list));
    }
    out
}

/// Renders paragraphs for one output format.
pub struct OutputFormatter<'a> {
    format: OutputFormat,
    mark_headers: bool,
    sanitizer: Option<&'a dyn HtmlSanitizer>,
}

impl<'a> OutputFormatter<'a> {
    pub fn new(format: OutputFormat, mark_headers: bool) -> Self {
        Self {
            format,
            mark_headers,
            sanitizer: None,
        }
    }

    /// Run HTML output through `sanitizer` as a final pass.
    pub fn with_sanitizer(mut self, sanitizer: &'a dyn HtmlSanitizer) -> Self {
        self.sanitizer = Some(sanitizer);
        self
    }

    pub fn format(&self, document: &Document, paragraphs: &[Paragraph]) -> Output {
        match self.format {
            OutputFormat::Text => Output::Plain(self.plain(paragraphs)),
            OutputFormat::Markdown => Output::Markdown(self.markdown(paragraphs)),
            OutputFormat::Html => Output::Html(self.html(paragraphs)),
            OutputFormat::Json => Output::Json(self.json(document, paragraphs)),
        }
    }

    /// Each paragraph rendered on its own in the formatter's format. JSON
    /// paragraphs are given as plain text.
    pub fn paragraph_strings(&self, paragraphs: &[Paragraph]) -> Vec<String> {
        match self.format {
            OutputFormat::Markdown => paragraphs
                .iter()
                .map(|p| self.markdown(std::slice::from_ref(p)))
                .collect(),
            OutputFormat::Html => paragraphs
                .iter()
                .map(|p| self.html(std::slice::from_ref(p)))
                .collect(),
            OutputFormat::Text | OutputFormat::Json => self.plain(paragraphs),
        }
    }

    pub fn plain(&self, paragraphs: &[Paragraph]) -> Vec<String> {
        paragraphs
            .iter()
            .map(|p| match p.kind {
                ParagraphKind::Heading { level } => {
                    heading_text(&p.joined(" "), level, self.mark_headers)
                }
                ParagraphKind::Text => p.joined(" "),
                ParagraphKind::List => {
                    let mut counters = Vec::new();
                    p.lines
                        .iter()
                        .map(|l| format!("{}{}", list_prefix(l, &mut counters), l.text))
                        .join("\n")
                }
                ParagraphKind::Table => p.joined("\n"),
            })
            .collect()
    }

    pub fn markdown(&self, paragraphs: &[Paragraph]) -> String {
        paragraphs
            .iter()
            .map(|p| match p.kind {
                ParagraphKind::Heading { level } => {
                    format!("{} {}", "#".repeat(level), p.joined(" "))
                }
                ParagraphKind::Text | ParagraphKind::Table => p.joined("\n"),
                ParagraphKind::List => {
                    let mut counters = Vec::new();
                    p.lines
                        .iter()
                        .map(|l| {
                            if l.depth() == 1 && l.marker.as_deref() == Some(";") {
                                format!("**{}**", l.text)
                            } else {
                                format!("{}{}", list_prefix(l, &mut counters), l.text)
                            }
                        })
                        .join("\n")
                }
            })
            .join("\n\n")
    }

    pub fn html(&self, paragraphs: &[Paragraph]) -> String {
        let html = paragraphs
            .iter()
            .map(|p| match p.kind {
                ParagraphKind::Heading { level } => {
                    format!("<h{0}>{1}</h{0}>", level, p.joined(" "))
                }
                ParagraphKind::Text | ParagraphKind::Table => format!("<p>{}</p>", p.joined(" ")),
                ParagraphKind::List => html_list(&p.lines),
            })
            .join("\n");
        match self.sanitizer {
            Some(s) => s.sanitize(&html),
            None => html,
        }
    }

    pub fn json(&self, document: &Document, paragraphs: &[Paragraph]) -> JsonDocument {
        let paragraphs = paragraphs
            .iter()
            .map(|p| JsonParagraph {
                text: match p.kind {
                    ParagraphKind::List | ParagraphKind::Table => p.joined("\n"),
                    _ => p.joined(" "),
                },
                section_title: p.section_title.clone(),
                section_level: p.section_level,
                links: p.links.clone(),
            })
            .collect();
        JsonDocument {
            id: document.id.clone(),
            revid: document.revid.clone(),
            url: page_url(&document.url_base, &document.id),
            title: document.title.clone(),
            paragraphs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wikitext::html::TagBalancer;

    fn sample() -> Vec<Paragraph> {
        let mut text = Paragraph::heading(2, "History");
        text.kind = ParagraphKind::Text;
        text.lines = vec![ParagraphLine::text("Old times.")];
        let mut list = text.clone();
        list.kind = ParagraphKind::List;
        list.lines = vec![
            ParagraphLine::item("one", "*"),
            ParagraphLine::item("sub", "**"),
            ParagraphLine::item("two", "*"),
        ];
        vec![Paragraph::heading(2, "History"), text, list]
    }

    #[test]
    fn plain_paragraphs() {
        let f = OutputFormatter::new(OutputFormat::Text, false);
        assert_eq!(
            f.plain(&sample()),
            vec!["History.", "Old times.", "- one\n  - sub\n- two"]
        );
        let marked = OutputFormatter::new(OutputFormat::Text, true);
        assert_eq!(marked.plain(&sample())[0], "## History");
    }

    #[test]
    fn markdown_document() {
        let f = OutputFormatter::new(OutputFormat::Markdown, false);
        assert_eq!(
            f.markdown(&sample()),
            "## History\n\nOld times.\n\n- one\n  - sub\n- two"
        );
    }

    #[test]
    fn ordered_items_numbered() {
        let mut counters = Vec::new();
        let a = ParagraphLine::item("a", "#");
        let b = ParagraphLine::item("b", "#");
        assert_eq!(list_prefix(&a, &mut counters), "1. ");
        assert_eq!(list_prefix(&b, &mut counters), "2. ");
    }

    #[test]
    fn html_fragment() {
        let balancer = TagBalancer;
        let f = OutputFormatter::new(OutputFormat::Html, false).with_sanitizer(&balancer);
        assert_eq!(
            f.html(&sample()),
            "<h2>History</h2>\n<p>Old times.</p>\n<ul><li>one<ul><li>sub</li></ul></li><li>two</li></ul>"
        );
    }

    #[test]
    fn json_document() {
        let mut doc = Document::new("12", "Page", "");
        doc.revid = "34".to_string();
        doc.url_base = "https://en.wikipedia.org/wiki".to_string();
        let f = OutputFormatter::new(OutputFormat::Json, false);
        let json = f.json(&doc, &sample());
        assert_eq!(json.url, "https://en.wikipedia.org/wiki?curid=12");
        assert_eq!(json.paragraphs.len(), 3);
        assert_eq!(json.paragraphs[1].section_title.as_deref(), Some("History"));
        let line = Output::Json(json).render().unwrap();
        assert!(line.starts_with("{\"id\":\"12\",\"revid\":\"34\""));
        assert!(!line.contains("links"));
    }

    #[test]
    fn formatting_is_idempotent() {
        let doc = Document::new("1", "T", "");
        for format in [
            OutputFormat::Text,
            OutputFormat::Markdown,
            OutputFormat::Html,
            OutputFormat::Json,
        ] {
            let f = OutputFormatter::new(format, false);
            assert_eq!(f.format(&doc, &sample()), f.format(&doc, &sample()));
        }
    }

    #[test]
    fn urls() {
        assert_eq!(page_url("", "1"), "");
        assert_eq!(page_url("not a url", "1"), "not a url?curid=1");
    }
}
