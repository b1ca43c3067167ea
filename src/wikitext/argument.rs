//! Template invocation parsing.
//!
//! `TemplateInvocation::parse` takes the inside of a `{{...}}` span and splits
//! it into a name and an argument list. Splitting is top-level aware: `|` and
//! `=` characters inside nested templates, parameters, links, tags or comments
//! never split the outer invocation.
//!
//! Values are kept as unexpanded markup; expansion is the engine's job.

use itertools::Itertools;

use crate::wikitext::scanner::{find_top_level, split_top_level};

/// Prefixes that do not change what a template name refers to.
const NAME_PREFIXES: &[&str] = &["subst:", "safesubst:", "template:"];

/// One argument of a template invocation: `value` or `name=value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateArgument {
    pub name: Option<String>,
    pub value: String,
}

/// A parsed `{{Name|arg|key=value}}` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateInvocation {
    /// Raw (trimmed, not yet expanded or normalized) name part.
    pub name: String,
    /// Arguments in source order.
    pub arguments: Vec<TemplateArgument>,
}

impl TemplateInvocation {
    /// Parse the inside of a template span (without the surrounding braces).
    ///
    /// A trailing `|` yields an empty positional argument. Whitespace around
    /// values is trimmed unless the value contains a link close (`]]`).
    pub fn parse(inner: &str) -> Self {
        let mut parts = split_top_level(inner, '|').into_iter();
        let name = parts.next().unwrap_or_default().trim().to_string();

        let arguments = parts
            .map(|part| match find_top_level(part, '=') {
                Some(eq) => TemplateArgument {
                    name: Some(part[..eq].trim().to_string()),
                    value: trim_value(&part[eq + 1..]).to_string(),
                },
                None => TemplateArgument {
                    name: None,
                    value: trim_value(part).to_string(),
                },
            })
            .collect();

        Self { name, arguments }
    }

    /// Arguments keyed the way a template body addresses them.
    ///
    /// Positional arguments are numbered from 1, counting only unnamed
    /// arguments, so named arguments interleaved between them do not shift the
    /// numbering. Entries are in source order; a consumer that inserts them
    /// into a map in order gets last-assignment-wins semantics.
    pub fn keyed(&self) -> Vec<(String, &str)> {
        let mut counter = 0usize;
        self.arguments
            .iter()
            .map(|arg| match arg.name {
                Some(ref n) => (n.clone(), arg.value.as_str()),
                None => {
                    counter += 1;
                    (counter.to_string(), arg.value.as_str())
                }
            })
            .collect()
    }

    /// Unnamed argument values in order.
    pub fn positional(&self) -> Vec<&str> {
        self.arguments
            .iter()
            .filter(|a| a.name.is_none())
            .map(|a| a.value.as_str())
            .collect()
    }

    /// Value of a parameter by key (`"1"`, `"title"`), last assignment wins.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.keyed()
            .into_iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Like [`get`](Self::get) but matches the key case-insensitively.
    pub fn get_ignore_case(&self, key: &str) -> Option<&str> {
        self.keyed()
            .into_iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }
}

fn trim_value(v: &str) -> &str {
    if v.contains("]]") { v } else { v.trim() }
}

/// Collapse runs of whitespace (and underscores, which MediaWiki treats as
/// spaces in titles) into single spaces and trim.
pub fn collapse_title(s: &str) -> String {
    s.replace('_', " ").split_whitespace().join(" ")
}

/// Normalize an expanded template name into the form used for lookups:
/// `subst:`/`safesubst:`/`Template:` prefixes stripped, whitespace collapsed
/// and the first letter upper-cased.
pub fn normalize_template_name(raw: &str) -> String {
    let mut name = collapse_title(raw);
    loop {
        let stripped = NAME_PREFIXES.iter().find_map(|p| {
            name.get(..p.len())
                .filter(|head| head.eq_ignore_ascii_case(p))
                .map(|_| name[p.len()..].trim_start().to_string())
        });
        match stripped {
            Some(rest) => name = rest,
            None => break,
        }
    }
    if let Some(rest) = name.strip_prefix(':') {
        name = rest.trim_start().to_string();
    }
    ucfirst(&name)
}

/// Key used to compare names against the configured discard sets:
/// case-folded with whitespace normalized.
pub fn normalize_key(s: &str) -> String {
    collapse_title(s).to_lowercase()
}

/// Upper-case the first character, leaving the rest untouched.
pub fn ucfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lower-case the first character, leaving the rest untouched.
pub fn lcfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
