use chrono::{DateTime, Utc};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::wikitext::enums::{LinkType, MathMode, OutputFormat};
use crate::wikitext::errors::{Result, WtError};
use crate::wikitext::template_engine::{MAX_EXPANSION_SIZE, MAX_PARAMETER_DEPTH, MAX_TEMPLATE_DEPTH};

/// An article to extract. The extractor only ever reads it.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub revid: String,
    /// Base of article URLs, e.g. `https://en.wikipedia.org/wiki`.
    #[serde(default, rename = "url")]
    pub url_base: String,
    pub title: String,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            text: text.into(),
            ..Default::default()
        }
    }
}

/// A link kept in JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LinkRecord {
    pub target: String,
    pub display: String,
    #[serde(rename = "type")]
    pub link_type: LinkType,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct JsonParagraph {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_level: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<LinkRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct JsonDocument {
    pub id: String,
    pub revid: String,
    pub url: String,
    pub title: String,
    pub paragraphs: Vec<JsonParagraph>,
}

/// Extraction settings. Immutable once built; pass it to
/// [`Extractor::new`](crate::extractor::Extractor::new).
#[derive(Debug, Clone, Builder)]
#[builder(setter(into), default)]
pub struct ExtractorConfig {
    /// Keep links as Markdown links, anchors or JSON link records.
    pub keep_links: bool,
    /// Emit section headings as their own paragraphs.
    pub keep_sections: bool,
    pub html_formatting: bool,
    pub markdown: bool,
    pub to_json: bool,
    /// Content language, also the magic word table language.
    pub language: String,
    /// Section titles whose content is dropped (case and whitespace
    /// insensitive).
    pub discard_sections: HashSet<String>,
    /// Template names that expand to nothing.
    pub discard_templates: HashSet<String>,
    /// Expand template bodies from the template store. When off, unknown
    /// templates are dropped.
    pub expand_templates: bool,
    /// Prefix headings with format markers in plain text output.
    pub mark_headers: bool,
    /// Escape `&`, `<` and `>` in non-HTML output.
    pub html_safe: bool,
    pub math_mode: MathMode,
    pub max_depth: usize,
    pub max_parameter_depth: usize,
    pub max_expansion_size: usize,
    /// Fixed clock for `CURRENT*` magic words.
    #[builder(setter(into, strip_option))]
    pub current_time: Option<DateTime<Utc>>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            keep_links: false,
            keep_sections: true,
            html_formatting: false,
            markdown: false,
            to_json: false,
            language: "en".to_string(),
            discard_sections: HashSet::new(),
            discard_templates: HashSet::new(),
            expand_templates: true,
            mark_headers: false,
            html_safe: false,
            math_mode: MathMode::Drop,
            max_depth: MAX_TEMPLATE_DEPTH,
            max_parameter_depth: MAX_PARAMETER_DEPTH,
            max_expansion_size: MAX_EXPANSION_SIZE,
            current_time: None,
        }
    }
}

impl ExtractorConfig {
    pub fn builder() -> ExtractorConfigBuilder {
        ExtractorConfigBuilder::default()
    }

    /// The single output format selected by the format flags.
    pub fn output_format(&self) -> OutputFormat {
        if self.to_json {
            OutputFormat::Json
        } else if self.markdown {
            OutputFormat::Markdown
        } else if self.html_formatting {
            OutputFormat::Html
        } else {
            OutputFormat::Text
        }
    }

    /// Set the format flags for `format`, clearing the others.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.html_formatting = format == OutputFormat::Html;
        self.markdown = format == OutputFormat::Markdown;
        self.to_json = format == OutputFormat::Json;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let flags = [
            ("html_formatting", self.html_formatting),
            ("markdown", self.markdown),
            ("to_json", self.to_json),
        ];
        let set: Vec<&str> = flags.iter().filter(|(_, on)| *on).map(|(n, _)| *n).collect();
        if set.len() > 1 {
            return Err(WtError::config(format!(
                "conflicting output formats: {}",
                set.join(", ")
            )));
        }
        if self.max_depth == 0 || self.max_parameter_depth == 0 || self.max_expansion_size == 0 {
            return Err(WtError::config("expansion limits must be greater than zero"));
        }
        if self.language.trim().is_empty() {
            return Err(WtError::config("language must not be empty"));
        }
        Ok(())
    }
}
