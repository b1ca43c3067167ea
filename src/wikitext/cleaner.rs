/*
wikitext/cleaner.rs

The cleanup pipeline. `TextCleaner::clean` runs, in order:
  1. template expansion (`TemplateEngine`)
  2. tables (dropped, or Markdown tables)
  3. behavior switches
  4. `<math>` (`MathProcessor`)
  5. HTML elements, bold/italic and entities (`HtmlCleaner`)
  6. optional escaping of plain output (`html_safe`)
  7. links (`LinkProcessor`)
  8. whitespace and punctuation tidying
and then `compact` splits the result into paragraphs, walking the section
state machine and applying the section discard set.
*/

use std::collections::HashSet;

use lazy_regex::{regex_captures, regex_replace_all};

use crate::definitions::{ExtractorConfig, LinkRecord};
use crate::wikitext::argument::normalize_key;
use crate::wikitext::enums::{ListType, MathMode, OutputFormat};
use crate::wikitext::html::{HtmlCleaner, escape_text};
use crate::wikitext::links::{EXTERNAL_MARK, INTERNAL_MARK, LinkProcessor, take_link_markers};
use crate::wikitext::magic_words::remove_behavior_switches;
use crate::wikitext::math::MathProcessor;
use crate::wikitext::tables::process_tables;
use crate::wikitext::template_engine::{ExpansionContext, TemplateEngine};

/// What a paragraph holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParagraphKind {
    Heading { level: usize },
    Text,
    List,
    Table,
}

/// One source line of a paragraph. List items carry their marker run
/// (`*`, `#`, `**`, `;`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParagraphLine {
    pub text: String,
    pub marker: Option<String>,
}

impl ParagraphLine {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marker: None,
        }
    }

    pub fn item(text: impl Into<String>, marker: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marker: Some(marker.into()),
        }
    }

    /// Nesting depth of a list item (1 for a top-level item).
    pub fn depth(&self) -> usize {
        self.marker.as_ref().map(|m| m.chars().count()).unwrap_or(0)
    }

    /// List type of the innermost marker.
    pub fn list_type(&self) -> Option<ListType> {
        self.marker
            .as_ref()
            .and_then(|m| m.chars().last())
            .and_then(ListType::from_marker)
    }
}

/// A unit of output, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    pub kind: ParagraphKind,
    pub lines: Vec<ParagraphLine>,
    /// Title of the enclosing section (the heading's own title for headings).
    pub section_title: Option<String>,
    pub section_level: Option<usize>,
    /// Links kept in JSON mode.
    pub links: Vec<LinkRecord>,
}

impl Paragraph {
    pub fn heading(level: usize, title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            kind: ParagraphKind::Heading { level },
            lines: vec![ParagraphLine::text(title.clone())],
            section_title: Some(title),
            section_level: Some(level),
            links: Vec::new(),
        }
    }

    fn empty(kind: ParagraphKind, section: &Option<(String, usize)>) -> Self {
        Self {
            kind,
            lines: Vec::new(),
            section_title: section.as_ref().map(|(t, _)| t.clone()),
            section_level: section.as_ref().map(|(_, l)| *l),
            links: Vec::new(),
        }
    }

    pub fn is_heading(&self) -> bool {
        matches!(self.kind, ParagraphKind::Heading { .. })
    }

    /// Text of all lines joined by `sep`.
    pub fn joined(&self, sep: &str) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join(sep)
    }
}

/// Settings of the cleanup passes, derived once from the configuration.
#[derive(Debug, Clone, Default)]
pub struct CleanerOptions {
    pub format: OutputFormat,
    pub keep_links: bool,
    pub keep_sections: bool,
    pub html_safe: bool,
    pub math_mode: MathMode,
    /// Normalized section titles (see [`normalize_key`]).
    pub discard_sections: HashSet<String>,
}

impl From<&ExtractorConfig> for CleanerOptions {
    fn from(config: &ExtractorConfig) -> Self {
        Self {
            format: config.output_format(),
            keep_links: config.keep_links,
            keep_sections: config.keep_sections,
            html_safe: config.html_safe,
            math_mode: config.math_mode,
            discard_sections: config
                .discard_sections
                .iter()
                .map(|s| normalize_key(s))
                .collect(),
        }
    }
}

/// Runs the passes over one document.
pub struct TextCleaner<'a> {
    engine: TemplateEngine<'a>,
    options: &'a CleanerOptions,
    links: LinkProcessor,
    math: MathProcessor,
    html: HtmlCleaner,
}

impl<'a> TextCleaner<'a> {
    pub fn new(engine: TemplateEngine<'a>, options: &'a CleanerOptions) -> Self {
        Self {
            engine,
            links: LinkProcessor::new(options.keep_links, options.format),
            math: MathProcessor::new(options.math_mode),
            html: HtmlCleaner::new(options.format),
            options,
        }
    }

    /// Expand, strip and segment `raw` into paragraphs.
    pub fn clean(&self, raw: &str, ctx: &mut ExpansionContext) -> Vec<Paragraph> {
        let expanded = self.engine.expand_document(raw, ctx);
        let text = self.strip_markup(&expanded);
        compact(&text, self.options)
    }

    /// Steps 2 to 8 on already expanded text.
    pub fn strip_markup(&self, expanded: &str) -> String {
        let text = process_tables(expanded, self.options.format);
        let text = remove_behavior_switches(&text);
        let text = self.math.process(&text);
        let text = self.html.clean(&text);
        let text = if self.options.html_safe && self.options.format != OutputFormat::Html {
            escape_text(&text)
        } else {
            text
        };
        let text = self.links.process(&text);
        tidy_text(&text)
    }
}

/// Whitespace and punctuation fixes left behind by removed markup.
pub fn tidy_text(text: &str) -> String {
    let t = text.replace('\t', " ");
    let t = regex_replace_all!(r"\([ ]*[,;]?[ ]*\)", &t, "");
    let t = regex_replace_all!(r" {2,}", &t, " ");
    let t = regex_replace_all!(r"\.{4,}", &t, "...");
    let t = regex_replace_all!(r" ([,:.;)\]\u{bb}])", &t, "${1}");
    let t = regex_replace_all!(r"([\[(\u{ab}]) ", &t, "${1}");
    let t = regex_replace_all!(r",{2,}", &t, ",");
    let t = regex_replace_all!(r",\.", &t, ".");
    t.into_owned()
}

/// `== Title ==` lines: `(level, title)`. The level is the shorter of the
/// two `=` runs, clamped to 1..=6.
pub fn parse_heading(line: &str) -> Option<(usize, String)> {
    let (_, open, title, close) = regex_captures!(r"^(=+)[ \t]*(.*?)[ \t]*(=+)[ \t]*$", line)?;
    let title = title.trim();
    if title.is_empty() {
        return None;
    }
    let level = open.len().min(close.len()).clamp(1, 6);
    Some((level, title.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Scanning,
    InSection { title: String, level: usize },
    Skipping { level: usize },
    Done,
}

/// What a body line turns into.
enum LineClass {
    Text(String),
    Item { marker: String, text: String },
    TableRow(String),
    Drop,
}

fn classify(line: &str, format: OutputFormat) -> LineClass {
    let line = line.trim();
    if line.is_empty() {
        return LineClass::Drop;
    }
    if format == OutputFormat::Markdown && line.starts_with('|') && line.ends_with('|') {
        return LineClass::TableRow(line.to_string());
    }

    let marker_len = line
        .find(|c: char| !matches!(c, '*' | '#' | ';' | ':'))
        .unwrap_or(line.len());
    let (marker, rest) = line.split_at(marker_len);
    let rest = rest.trim();
    if rest.is_empty() {
        return LineClass::Drop;
    }
    if !marker.is_empty() && !marker.chars().all(|c| c == ':') {
        return LineClass::Item {
            marker: marker.to_string(),
            text: rest.to_string(),
        };
    }

    // Table residue. Braces left after expansion are literal text from
    // malformed or limited markup and stay.
    if rest.starts_with('|') {
        return LineClass::Drop;
    }
    if rest.starts_with('(') && rest.ends_with(')') {
        return LineClass::Drop;
    }
    if !rest.chars().any(char::is_alphanumeric) {
        return LineClass::Drop;
    }
    LineClass::Text(rest.to_string())
}

fn strip_markers(text: &str, links: &mut Vec<LinkRecord>) -> String {
    if !text.contains([INTERNAL_MARK, EXTERNAL_MARK]) {
        return text.to_string();
    }
    let (plain, found) = take_link_markers(text);
    links.extend(found);
    plain
}

/// Accumulates paragraphs while walking the lines of one document.
struct Compactor<'o> {
    options: &'o CleanerOptions,
    state: State,
    out: Vec<Paragraph>,
    pending_headings: Vec<Paragraph>,
    current: Option<Paragraph>,
}

impl<'o> Compactor<'o> {
    fn new(options: &'o CleanerOptions) -> Self {
        Self {
            options,
            state: State::Scanning,
            out: Vec::new(),
            pending_headings: Vec::new(),
            current: None,
        }
    }

    fn section(&self) -> Option<(String, usize)> {
        match &self.state {
            State::InSection { title, level } => Some((title.clone(), *level)),
            _ => None,
        }
    }

    fn flush(&mut self) {
        if let Some(p) = self.current.take()
            && !p.lines.is_empty()
        {
            self.out.push(p);
        }
    }

    fn heading(&mut self, level: usize, title: String) {
        self.flush();
        if let State::Skipping { level: skipped } = self.state
            && level > skipped
        {
            return;
        }
        // headings whose sections stayed empty
        self.pending_headings.retain(|h| match h.kind {
            ParagraphKind::Heading { level: l } => l < level,
            _ => true,
        });

        let mut links = Vec::new();
        let title = strip_markers(&title, &mut links);
        if self.options.discard_sections.contains(&normalize_key(&title)) {
            self.state = State::Skipping { level };
            return;
        }
        if self.options.keep_sections {
            self.pending_headings.push(Paragraph::heading(level, title.clone()));
        }
        self.state = State::InSection { title, level };
    }

    fn push_line(&mut self, kind: ParagraphKind, line: ParagraphLine, links: Vec<LinkRecord>) {
        if self.current.as_ref().is_some_and(|p| p.kind != kind) {
            self.flush();
        }
        if self.current.is_none() {
            self.out.append(&mut self.pending_headings);
            self.current = Some(Paragraph::empty(kind, &self.section()));
        }
        if let Some(p) = self.current.as_mut() {
            p.lines.push(line);
            p.links.extend(links);
        }
    }

    fn line(&mut self, raw: &str) {
        if let Some((level, title)) = parse_heading(raw.trim()) {
            self.heading(level, title);
            return;
        }
        if matches!(self.state, State::Skipping { .. }) {
            return;
        }
        if raw.trim().is_empty() {
            self.flush();
            return;
        }

        let mut links = Vec::new();
        match classify(raw, self.options.format) {
            LineClass::Drop => {}
            LineClass::Text(t) => {
                let t = strip_markers(&t, &mut links);
                self.push_line(ParagraphKind::Text, ParagraphLine::text(t), links);
            }
            LineClass::Item { marker, text } => {
                let t = strip_markers(&text, &mut links);
                self.push_line(ParagraphKind::List, ParagraphLine::item(t, marker), links);
            }
            LineClass::TableRow(row) => {
                self.push_line(ParagraphKind::Table, ParagraphLine::text(row), links);
            }
        }
    }

    fn finish(mut self) -> Vec<Paragraph> {
        self.flush();
        self.state = State::Done;
        self.out
    }
}

/// Split cleaned text into paragraphs.
///
/// Blank lines end a paragraph. A heading whose normalized title is in the
/// discard set hides everything up to the next heading of the same or a
/// shallower level. Headings are only emitted once their section has content.
pub fn compact(text: &str, options: &CleanerOptions) -> Vec<Paragraph> {
    let mut compactor = Compactor::new(options);
    for line in text.split('\n') {
        compactor.line(line);
    }
    compactor.finish()
}
