/*!
Link resolution.

`[[Target|Display]]` internal links and `[url label]` external links become
display text, or a formatted reference when links are kept:
- Markdown: `[Display](Target)`
- HTML and plain text: `<a href="Target">Display</a>`
- JSON: an inline marker that paragraph assembly turns into a
  `{target, display}` record (see [`take_link_markers`])

File, image, media and category links are metadata, not prose, and are
always removed; so are interlanguage links. A leading colon (`[[:Category:X]]`)
escapes that rule and the link is displayed.
*/

use crate::definitions::LinkRecord;
use crate::wikitext::enums::{LinkType, OutputFormat};
use crate::wikitext::magic_words::wiki_encode;
use crate::wikitext::scanner::{BracketScanner, Span, SpanKind, split_top_level};

/// Marker opening a kept internal link in JSON mode.
pub const INTERNAL_MARK: char = '\u{e000}';
/// Marker opening a kept external link in JSON mode.
pub const EXTERNAL_MARK: char = '\u{e003}';
/// Separates target and display inside a marker.
pub const MID_MARK: char = '\u{e001}';
/// Closes a marker.
pub const END_MARK: char = '\u{e002}';

/// How deep link labels containing further links are resolved.
const MAX_LINK_NESTING: usize = 8;

/// Namespaces whose links are dropped (English plus common localized names).
const DISCARD_NAMESPACES: &[&str] = &[
    "file",
    "image",
    "media",
    "category",
    "datei",
    "bild",
    "kategorie",
    "fichier",
    "catégorie",
    "archivo",
    "imagen",
    "categoría",
    "categoria",
    "ficheiro",
    "immagine",
    "bestand",
    "categorie",
    "plik",
    "kategoria",
    "файл",
    "категория",
];

/// Does `prefix` look like an interlanguage prefix (`fr`, `zh-yue`, `simple`)?
fn is_language_prefix(prefix: &str) -> bool {
    if prefix == "simple" {
        return true;
    }
    let mut parts = prefix.split('-');
    let head = parts.next().unwrap_or_default();
    (2..=3).contains(&head.len())
        && head.bytes().all(|b| b.is_ascii_lowercase())
        && parts.all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_lowercase()))
}

/// Alphabetic characters directly after `]]` that join the link label.
fn link_trail(after: &str) -> &str {
    let len = after
        .char_indices()
        .find(|(_, c)| !c.is_alphabetic())
        .map(|(i, _)| i)
        .unwrap_or(after.len());
    &after[..len]
}

/// Label produced by an empty pipe (`[[Help:Foo (bar)|]]` gives `Foo`).
fn pipe_trick(target: &str) -> String {
    let page = match target.find(':') {
        Some(i) => &target[i + 1..],
        None => target,
    };
    let page = match page.rfind(" (") {
        Some(i) if page.ends_with(')') => &page[..i],
        _ => page,
    };
    let page = match page.find(", ") {
        Some(i) => &page[..i],
        None => page,
    };
    page.trim().to_string()
}

/// Link resolver for one configuration.
#[derive(Debug, Clone, Copy)]
pub struct LinkProcessor {
    keep_links: bool,
    format: OutputFormat,
}

impl LinkProcessor {
    pub fn new(keep_links: bool, format: OutputFormat) -> Self {
        Self { keep_links, format }
    }

    /// Whether an (unescaped) internal target is metadata to drop.
    pub fn is_discarded_target(target: &str) -> bool {
        let Some(colon) = target.find(':') else {
            return false;
        };
        if colon == 0 {
            return false;
        }
        let prefix = target[..colon].trim();
        let lower = prefix.to_lowercase();
        DISCARD_NAMESPACES.contains(&lower.as_str()) || is_language_prefix(prefix)
    }

    /// Resolve a single link span of `text`. `None` means the link is
    /// removed from the body text.
    pub fn resolve(&self, span: Span, text: &str) -> Option<String> {
        match span.kind {
            SpanKind::InternalLink => self.internal(span.inner(text), "", 0),
            SpanKind::ExternalLink => Some(self.external(span.inner(text), 0)),
            _ => Some(span.slice(text).to_string()),
        }
    }

    /// Resolve every link in `text`.
    pub fn process(&self, text: &str) -> String {
        self.process_at(text, 0)
    }

    fn process_at(&self, text: &str, depth: usize) -> String {
        if !text.contains('[') {
            return text.to_string();
        }
        let mut out = String::with_capacity(text.len());
        let mut skip = 0usize;

        for span in BracketScanner::new(text).segments() {
            let raw = span.slice(text);
            match span.kind {
                SpanKind::Plain => {
                    out.push_str(&raw[skip.min(raw.len())..]);
                    skip = 0;
                }
                SpanKind::InternalLink => {
                    let trail = link_trail(&text[span.end..]);
                    if let Some(resolved) = self.internal(span.inner(text), trail, depth) {
                        out.push_str(&resolved);
                        skip = trail.len();
                    }
                }
                SpanKind::ExternalLink => out.push_str(&self.external(span.inner(text), depth)),
                _ => out.push_str(raw),
            }
        }
        out
    }

    fn internal(&self, inner: &str, trail: &str, depth: usize) -> Option<String> {
        let parts = split_top_level(inner, '|');
        let target_raw = parts.first().copied().unwrap_or_default().trim();
        let (escaped, target) = match target_raw.strip_prefix(':') {
            Some(t) => (true, t.trim_start()),
            None => (false, target_raw),
        };
        if !escaped && Self::is_discarded_target(target) {
            return None;
        }

        let label = match parts.len() {
            0 | 1 => target.to_string(),
            2 if parts[1].trim().is_empty() => pipe_trick(target),
            n => parts[n - 1].trim().to_string(),
        };
        let label = if depth < MAX_LINK_NESTING {
            self.process_at(&label, depth + 1)
        } else {
            label
        };
        let display = format!("{}{}", label, trail);

        if !self.keep_links || target.is_empty() {
            return Some(display);
        }
        Some(match self.format {
            OutputFormat::Markdown => format!("[{}]({})", display, target.replace(' ', "_")),
            OutputFormat::Json => format!(
                "{}{}{}{}{}",
                INTERNAL_MARK, target, MID_MARK, display, END_MARK
            ),
            OutputFormat::Html | OutputFormat::Text => {
                format!("<a href=\"{}\">{}</a>", wiki_encode(target), display)
            }
        })
    }

    fn external(&self, inner: &str, depth: usize) -> String {
        let inner = inner.trim_start();
        let (url, label) = match inner.find(char::is_whitespace) {
            Some(i) => (&inner[..i], inner[i..].trim()),
            None => (inner, ""),
        };
        let label = if label.is_empty() {
            url.to_string()
        } else if depth < MAX_LINK_NESTING {
            self.process_at(label, depth + 1)
        } else {
            label.to_string()
        };

        if !self.keep_links {
            return label;
        }
        match self.format {
            OutputFormat::Markdown => format!("[{}]({})", label, url),
            OutputFormat::Json => format!("{}{}{}{}{}", EXTERNAL_MARK, url, MID_MARK, label, END_MARK),
            OutputFormat::Html | OutputFormat::Text => format!(
                "<a href=\"{}\">{}</a>",
                html_escape::encode_double_quoted_attribute(url),
                label
            ),
        }
    }
}

/// Strip JSON link markers from `line`, returning the display text and the
/// link records in order of appearance. A marker left open is dropped and its
/// text kept.
pub fn take_link_markers(line: &str) -> (String, Vec<LinkRecord>) {
    let mut text = String::with_capacity(line.len());
    let mut links = Vec::new();
    let mut rest = line;

    while let Some(open) = rest.find([INTERNAL_MARK, EXTERNAL_MARK]) {
        text.push_str(&rest[..open]);
        let mark = rest[open..].chars().next().unwrap_or(INTERNAL_MARK);
        let body = &rest[open + mark.len_utf8()..];
        let parsed = body.find(END_MARK).and_then(|end| {
            let (target, display) = body[..end].split_once(MID_MARK)?;
            Some((target, display, end))
        });
        match parsed {
            Some((target, display, end)) => {
                text.push_str(display);
                links.push(LinkRecord {
                    target: target.to_string(),
                    display: display.to_string(),
                    link_type: if mark == EXTERNAL_MARK {
                        LinkType::External
                    } else {
                        LinkType::Internal
                    },
                });
                rest = &body[end + END_MARK.len_utf8()..];
            }
            None => rest = body,
        }
    }
    text.push_str(rest);
    let text = text.replace([MID_MARK, END_MARK], "");
    (text, links)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(s: &str) -> String {
        LinkProcessor::new(false, OutputFormat::Text).process(s)
    }

    #[test]
    fn display_or_target() {
        assert_eq!(plain("see [[Target|Display]] now"), "see Display now");
        assert_eq!(plain("see [[Target]] now"), "see Target now");
        assert_eq!(plain("[[A|b|c]]"), "c");
    }

    #[test]
    fn trails_and_pipe_trick() {
        assert_eq!(plain("[[dog]]s bark"), "dogs bark");
        assert_eq!(plain("[[Foo (bar)|]]"), "Foo");
        assert_eq!(plain("[[Help:Editing|]]"), "Editing");
    }

    #[test]
    fn metadata_links_removed() {
        assert_eq!(plain("a[[Category:Birds]]b"), "ab");
        assert_eq!(plain("a[[File:x.jpg|thumb|A [[bird]]]]b"), "ab");
        assert_eq!(plain("a[[de:Vogel]]b"), "ab");
        assert_eq!(plain("a[[Kategorie:Vögel]]b"), "ab");
        assert_eq!(plain("[[:Category:Birds]]"), "Category:Birds");
        assert_eq!(plain("[[Wikipedia:Policy|policy]]"), "policy");
    }

    #[test]
    fn external_links() {
        assert_eq!(plain("[http://example.com Example site]"), "Example site");
        assert_eq!(plain("[http://example.com]"), "http://example.com");
        let md = LinkProcessor::new(true, OutputFormat::Markdown);
        assert_eq!(md.process("[http://e.com E]"), "[E](http://e.com)");
    }

    #[test]
    fn kept_links_per_format() {
        let md = LinkProcessor::new(true, OutputFormat::Markdown);
        assert_eq!(md.process("[[Target|Display]]"), "[Display](Target)");
        assert_eq!(md.process("[[New York|NY]]"), "[NY](New_York)");
        let html = LinkProcessor::new(true, OutputFormat::Html);
        assert_eq!(html.process("[[A b|c]]"), "<a href=\"A_b\">c</a>");
    }

    #[test]
    fn json_markers_round_trip() {
        let json = LinkProcessor::new(true, OutputFormat::Json);
        let line = json.process("go to [[Paris|the city]] or [http://x.org X]");
        let (text, links) = take_link_markers(&line);
        assert_eq!(text, "go to the city or X");
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].target, "Paris");
        assert_eq!(links[0].display, "the city");
        assert_eq!(links[1].link_type, LinkType::External);
    }

    #[test]
    fn unbalanced_is_plain() {
        assert_eq!(plain("[[broken link"), "[[broken link");
        assert_eq!(plain("a ]] b"), "a ]] b");
    }

    #[test]
    fn resolve_single_span() {
        let text = "[[Category:X]]";
        let span = BracketScanner::new(text).next_construct().unwrap();
        let lp = LinkProcessor::new(false, OutputFormat::Text);
        assert_eq!(lp.resolve(span, text), None);
    }

    #[test]
    fn language_prefixes() {
        assert!(is_language_prefix("fr"));
        assert!(is_language_prefix("zh-yue"));
        assert!(!is_language_prefix("w"));
        assert!(!is_language_prefix("Help"));
    }
}
