//! Enums used by the wikitext module.
//!
//! This module defines the small enum types referenced by other submodules:
//! - `OutputFormat`: the shape of the final output.
//! - `LinkType`: distinguishes internal vs external links.
//! - `ListType`: common list kinds used in MediaWiki wikitext.
//! - `MathMode`: what happens to `<math>` spans.
//!
//! Each type implements `Debug`, `Clone`, `PartialEq`, `Eq` and `Display`, and
//! `FromStr` so configuration can be read from plain strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Requested output representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One plain string per paragraph.
    #[default]
    Text,
    /// A Markdown document.
    Markdown,
    /// A lightly-tagged HTML fragment.
    Html,
    /// A JSON document with paragraph records.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Markdown => write!(f, "markdown"),
            OutputFormat::Html => write!(f, "html"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "txt" | "plain" => Ok(OutputFormat::Text),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "html" => Ok(OutputFormat::Html),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown OutputFormat '{}'", other)),
        }
    }
}

/// The kind of link encountered in wikitext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    /// Internal wiki link using `[[...]]`.
    Internal,
    /// External link using `[http://...]` or similar.
    External,
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkType::Internal => write!(f, "Internal"),
            LinkType::External => write!(f, "External"),
        }
    }
}

impl FromStr for LinkType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "internal" | "int" | "i" => Ok(LinkType::Internal),
            "external" | "ext" | "e" => Ok(LinkType::External),
            other => Err(format!("unknown LinkType '{}'", other)),
        }
    }
}

/// The kind of list line in wikitext.
///
/// Common tokens:
/// - `*` unordered
/// - `#` ordered (numbered)
/// - `;` definition term
/// - `:` definition description / indent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListType {
    /// Unordered list (bulleted): `*`
    Unordered,
    /// Ordered (numbered) list: `#`
    Ordered,
    /// Definition term: `;`
    Term,
    /// Definition description: `:`
    Definition,
}

impl ListType {
    /// Map a single list marker character to its list type.
    pub fn from_marker(c: char) -> Option<Self> {
        match c {
            '*' => Some(ListType::Unordered),
            '#' => Some(ListType::Ordered),
            ';' => Some(ListType::Term),
            ':' => Some(ListType::Definition),
            _ => None,
        }
    }
}

impl fmt::Display for ListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListType::Unordered => write!(f, "Unordered"),
            ListType::Ordered => write!(f, "Ordered"),
            ListType::Term => write!(f, "Term"),
            ListType::Definition => write!(f, "Definition"),
        }
    }
}

impl FromStr for ListType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "*" | "unordered" | "bullet" => Ok(ListType::Unordered),
            "#" | "ordered" | "numbered" => Ok(ListType::Ordered),
            ";" | "term" => Ok(ListType::Term),
            ":" | "definition" | "def" => Ok(ListType::Definition),
            other => Err(format!("unknown ListType '{}'", other)),
        }
    }
}

/// What to do with `<math>...</math>` spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MathMode {
    /// Remove the formula entirely.
    #[default]
    Drop,
    /// Replace each formula with `formula_N`.
    Placeholder,
    /// Keep a normalized LaTeX rendering wrapped in `$`.
    Latex,
}

impl fmt::Display for MathMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MathMode::Drop => write!(f, "drop"),
            MathMode::Placeholder => write!(f, "placeholder"),
            MathMode::Latex => write!(f, "latex"),
        }
    }
}

impl FromStr for MathMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop" | "none" | "" => Ok(MathMode::Drop),
            "placeholder" | "formula" => Ok(MathMode::Placeholder),
            "latex" | "tex" => Ok(MathMode::Latex),
            other => Err(format!("unknown MathMode '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_fromstr_and_display() {
        assert_eq!(OutputFormat::from_str("md").unwrap(), OutputFormat::Markdown);
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert!(OutputFormat::from_str("pdf").is_err());
        assert_eq!(format!("{}", OutputFormat::Html), "html");
    }

    #[test]
    fn linktype_fromstr_and_display() {
        assert_eq!(LinkType::from_str("internal").unwrap(), LinkType::Internal);
        assert_eq!(LinkType::from_str("EXT").unwrap(), LinkType::External);
        assert_eq!(format!("{}", LinkType::External), "External");
    }

    #[test]
    fn listtype_markers() {
        assert_eq!(ListType::from_marker('*'), Some(ListType::Unordered));
        assert_eq!(ListType::from_marker('#'), Some(ListType::Ordered));
        assert_eq!(ListType::from_marker('x'), None);
        assert_eq!(ListType::from_str(":").unwrap(), ListType::Definition);
    }

    #[test]
    fn math_mode_parse() {
        assert_eq!(MathMode::from_str("latex").unwrap(), MathMode::Latex);
        assert_eq!(MathMode::default(), MathMode::Drop);
    }
}
