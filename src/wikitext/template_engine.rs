//! Template expansion.
//!
//! `TemplateEngine::expand` walks a buffer with the bracket scanner and
//! replaces every template invocation and parameter reference with its
//! expansion. Expansion is an explicit depth-counted recursion; the counters
//! live in an [`ExpansionContext`] owned by one top-level call.
//!
//! Resource limits never produce errors. When a limit is hit the offending
//! construct (or, for the size limit, the rest of the buffer) is emitted
//! verbatim and a warning is logged.

use std::collections::{HashMap, HashSet};

use lazy_regex::regex_replace_all;
use log::{debug, warn};

use crate::wikitext::argument::{TemplateInvocation, normalize_key, normalize_template_name};
use crate::wikitext::enums::OutputFormat;
use crate::wikitext::known_templates;
use crate::wikitext::magic_words::{self, MagicWord, MagicWordTable, PageContext};
use crate::wikitext::scanner::{BracketScanner, SpanKind, find_top_level, split_top_level};

/// Default template recursion limit.
pub const MAX_TEMPLATE_DEPTH: usize = 30;
/// Default nesting limit for `{{{param|default}}}` substitution.
pub const MAX_PARAMETER_DEPTH: usize = 16;
/// Default cap on the total number of bytes produced by expansions.
pub const MAX_EXPANSION_SIZE: usize = 4 * 1024 * 1024;

/// Source of template bodies, keyed by normalized template name
/// (`"Cite web"`, `"Infobox person"`).
pub trait TemplateStore: Send + Sync {
    fn body(&self, name: &str) -> Option<&str>;
}

/// A store that knows no templates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTemplates;

impl TemplateStore for NoTemplates {
    fn body(&self, _name: &str) -> Option<&str> {
        None
    }
}

/// In-memory template store.
///
/// Bodies are stored as they will be transcluded: `<noinclude>` blocks are
/// removed, `<includeonly>` markers are dropped, and when `<onlyinclude>`
/// sections exist only their content is kept.
#[derive(Debug, Default, Clone)]
pub struct MemoryTemplateStore {
    bodies: HashMap<String, String>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) a template.
    pub fn insert(&mut self, name: &str, body: &str) {
        self.bodies
            .insert(normalize_template_name(name), transclusion_body(body));
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: &str, body: &str) -> Self {
        self.insert(name, body);
        self
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

impl TemplateStore for MemoryTemplateStore {
    fn body(&self, name: &str) -> Option<&str> {
        self.bodies.get(name).map(String::as_str)
    }
}

fn transclusion_body(body: &str) -> String {
    let body = regex_replace_all!(r"(?is)<noinclude>.*?</noinclude>", body, "");
    let only: Vec<&str> = lazy_regex::regex!(r"(?is)<onlyinclude>(.*?)</onlyinclude>")
        .captures_iter(&body)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    let body = if only.is_empty() {
        body.to_string()
    } else {
        only.concat()
    };
    regex_replace_all!(r"(?i)</?includeonly>", &body, "").into_owned()
}

/// Bounds applied to one expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionLimits {
    pub max_depth: usize,
    pub max_parameter_depth: usize,
    pub max_expansion_size: usize,
}

impl Default for ExpansionLimits {
    fn default() -> Self {
        Self {
            max_depth: MAX_TEMPLATE_DEPTH,
            max_parameter_depth: MAX_PARAMETER_DEPTH,
            max_expansion_size: MAX_EXPANSION_SIZE,
        }
    }
}

/// Counters collected while expanding one document.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionStats {
    pub invocations: usize,
    pub depth_limited: usize,
    pub size_limited: usize,
    pub cycles: usize,
}

/// Mutable state of one top-level expansion.
#[derive(Debug, Default)]
pub struct ExpansionContext {
    pub depth: usize,
    pub parameter_depth: usize,
    pub expanded_size: usize,
    /// Templates currently being expanded, outermost first.
    pub in_progress: Vec<String>,
    pub stats: ExpansionStats,
    size_exhausted: bool,
}

impl ExpansionContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Configuration the engine needs, derived once from the extractor config.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub expand_templates: bool,
    /// Normalized keys (see [`normalize_key`]).
    pub discard_templates: HashSet<String>,
    pub limits: ExpansionLimits,
    pub format: OutputFormat,
}

/// Parameter values of the template being expanded.
pub type Frame = HashMap<String, String>;

/// Template expander bound to its collaborators.
pub struct TemplateEngine<'a> {
    magic: &'a MagicWordTable,
    store: &'a dyn TemplateStore,
    page: &'a PageContext,
    options: &'a EngineOptions,
}

impl<'a> TemplateEngine<'a> {
    pub fn new(
        magic: &'a MagicWordTable,
        store: &'a dyn TemplateStore,
        page: &'a PageContext,
        options: &'a EngineOptions,
    ) -> Self {
        Self {
            magic,
            store,
            page,
            options,
        }
    }

    /// Expand a whole document (no enclosing template frame).
    pub fn expand_document(&self, text: &str, ctx: &mut ExpansionContext) -> String {
        self.expand(text, None, ctx)
    }

    /// Expand every construct in `text` within `frame`.
    pub fn expand(&self, text: &str, frame: Option<&Frame>, ctx: &mut ExpansionContext) -> String {
        let mut out = String::with_capacity(text.len());

        for span in BracketScanner::new(text).segments() {
            if ctx.expanded_size >= self.options.limits.max_expansion_size {
                if !ctx.size_exhausted {
                    warn!(
                        "expansion size limit of {} bytes reached, emitting the rest unexpanded",
                        self.options.limits.max_expansion_size
                    );
                    ctx.size_exhausted = true;
                    ctx.stats.size_limited += 1;
                }
                out.push_str(&text[span.start..]);
                break;
            }

            let raw = span.slice(text);
            match span.kind {
                SpanKind::Plain | SpanKind::Math | SpanKind::Tag => out.push_str(raw),
                SpanKind::Comment => {}
                SpanKind::Template => {
                    out.push_str(&self.expand_template(span.inner(text), raw, frame, ctx))
                }
                SpanKind::Parameter => {
                    out.push_str(&self.expand_parameter(span.inner(text), raw, frame, ctx))
                }
                SpanKind::InternalLink | SpanKind::ExternalLink => {
                    if ctx.depth >= self.options.limits.max_depth {
                        out.push_str(raw);
                        continue;
                    }
                    let (open, close) = if span.kind == SpanKind::InternalLink {
                        ("[[", "]]")
                    } else {
                        ("[", "]")
                    };
                    ctx.depth += 1;
                    let inner = self.expand(span.inner(text), frame, ctx);
                    ctx.depth -= 1;
                    out.push_str(open);
                    out.push_str(&inner);
                    out.push_str(close);
                }
            }
        }

        out
    }

    fn expand_template(
        &self,
        inner: &str,
        raw: &str,
        frame: Option<&Frame>,
        ctx: &mut ExpansionContext,
    ) -> String {
        if ctx.depth >= self.options.limits.max_depth {
            warn!(
                "template depth limit {} reached, leaving {} unexpanded",
                self.options.limits.max_depth,
                preview(raw)
            );
            ctx.stats.depth_limited += 1;
            return raw.to_string();
        }

        ctx.depth += 1;
        let out = self.invoke(inner, raw, frame, ctx);
        ctx.depth -= 1;
        ctx.expanded_size += out.len();
        out
    }

    fn invoke(
        &self,
        inner: &str,
        raw: &str,
        frame: Option<&Frame>,
        ctx: &mut ExpansionContext,
    ) -> String {
        ctx.stats.invocations += 1;
        let parts = split_top_level(inner, '|');
        let name_raw = parts.first().copied().unwrap_or_default();
        let rest = parts.get(1..).unwrap_or_default();

        // Parser functions: `{{#if:test|then|else}}`. The text after the colon
        // is the first argument and, like the others, is expanded lazily.
        // Every part of the name is expanded exactly once.
        let expanded_name = match find_top_level(name_raw, ':') {
            Some(colon) => {
                let head = self.expand(&name_raw[..colon], frame, ctx);
                let trimmed = head.trim();
                if self.is_discarded(trimmed) {
                    return String::new();
                }
                if let Some(word) = self.magic.lookup(trimmed) {
                    let mut args = Vec::with_capacity(rest.len() + 1);
                    args.push(&name_raw[colon + 1..]);
                    args.extend_from_slice(rest);
                    return self.call_magic(word, &args, frame, ctx);
                }
                let tail = self.expand(&name_raw[colon + 1..], frame, ctx);
                format!("{}:{}", head, tail)
            }
            None => self.expand(name_raw, frame, ctx),
        };
        let name = expanded_name.trim();
        if name.is_empty() || name.contains(['<', '>', '[', ']', '{', '}', '\n']) {
            return raw.to_string();
        }
        if self.is_discarded(name) {
            debug!("discarding template {}", name);
            return String::new();
        }
        if let Some((word, first)) = self.magic.resolve(name) {
            let args: Vec<&str> = first.into_iter().chain(rest.iter().copied()).collect();
            return self.call_magic(word, &args, frame, ctx);
        }

        let normalized = normalize_template_name(name);
        debug!("expanding template {}", normalized);

        let body = if self.options.expand_templates {
            self.store.body(&normalized)
        } else {
            None
        };

        if let Some(body) = body {
            if ctx.in_progress.contains(&normalized) {
                warn!(
                    "template loop detected: {} -> {}",
                    ctx.in_progress.join(" -> "),
                    normalized
                );
                ctx.stats.cycles += 1;
                return raw.to_string();
            }

            let invocation = self.expanded_invocation(inner, normalized.clone(), frame, ctx);
            let params: Frame = invocation
                .keyed()
                .into_iter()
                .map(|(k, v)| (k, v.to_string()))
                .collect();

            ctx.in_progress.push(normalized);
            let out = self.expand(body, Some(&params), ctx);
            ctx.in_progress.pop();
            return out;
        }

        if !self.options.expand_templates {
            return String::new();
        }

        let invocation = self.expanded_invocation(inner, normalized, frame, ctx);
        match known_templates::render(&invocation, self.options.format) {
            Some(text) => text,
            None => invocation
                .positional()
                .into_iter()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Parse `inner` and expand argument names and values in the caller's frame.
    fn expanded_invocation(
        &self,
        inner: &str,
        name: String,
        frame: Option<&Frame>,
        ctx: &mut ExpansionContext,
    ) -> TemplateInvocation {
        let mut invocation = TemplateInvocation::parse(inner);
        invocation.name = name;
        for arg in invocation.arguments.iter_mut() {
            if let Some(n) = arg.name.as_mut() {
                *n = self.expand(n, frame, ctx).trim().to_string();
            }
            arg.value = self.expand(&arg.value, frame, ctx);
        }
        invocation
    }

    fn call_magic(
        &self,
        word: MagicWord,
        args: &[&str],
        frame: Option<&Frame>,
        ctx: &mut ExpansionContext,
    ) -> String {
        let mut expand = |s: &str| self.expand(s, frame, ctx);
        magic_words::evaluate(word, args, self.page, &mut expand)
    }

    fn expand_parameter(
        &self,
        inner: &str,
        raw: &str,
        frame: Option<&Frame>,
        ctx: &mut ExpansionContext,
    ) -> String {
        if ctx.parameter_depth >= self.options.limits.max_parameter_depth {
            warn!(
                "parameter nesting limit {} reached, leaving {} unexpanded",
                self.options.limits.max_parameter_depth,
                preview(raw)
            );
            ctx.stats.depth_limited += 1;
            return raw.to_string();
        }

        ctx.parameter_depth += 1;
        let parts = split_top_level(inner, '|');
        let name = self.expand(parts.first().copied().unwrap_or_default(), frame, ctx);
        let out = match frame.and_then(|f| f.get(name.trim())) {
            Some(value) => value.clone(),
            None => match parts.get(1) {
                Some(default) => self.expand(default, frame, ctx),
                None => raw.to_string(),
            },
        };
        ctx.parameter_depth -= 1;
        out
    }

    fn is_discarded(&self, name: &str) -> bool {
        !self.options.discard_templates.is_empty()
            && self
                .options
                .discard_templates
                .contains(&normalize_key(&normalize_template_name(name)))
    }
}

/// Short form of a construct for log lines.
fn preview(raw: &str) -> String {
    const MAX: usize = 60;
    match raw.char_indices().nth(MAX) {
        Some((i, _)) => format!("{}...", &raw[..i]),
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> EngineOptions {
        EngineOptions {
            expand_templates: true,
            ..EngineOptions::default()
        }
    }

    fn run_with(text: &str, store: &dyn TemplateStore, opts: &EngineOptions) -> (String, ExpansionStats) {
        let magic = MagicWordTable::default();
        let page = PageContext {
            title: "Sample page".to_string(),
            ..PageContext::default()
        };
        let engine = TemplateEngine::new(&magic, store, &page, opts);
        let mut ctx = ExpansionContext::new();
        let out = engine.expand_document(text, &mut ctx);
        assert_eq!(ctx.depth, 0);
        assert_eq!(ctx.parameter_depth, 0);
        assert!(ctx.in_progress.is_empty());
        (out, ctx.stats)
    }

    fn run(text: &str, store: &dyn TemplateStore) -> String {
        run_with(text, store, &options()).0
    }

    #[test]
    fn magic_words_without_store() {
        assert_eq!(run("say {{UC:hello}}!", &NoTemplates), "say HELLO!");
        assert_eq!(run("{{#if:{{PAGENAME}}|has title|none}}", &NoTemplates), "has title");
        assert_eq!(run("{{#expr: 2 * (3 + 4)}}", &NoTemplates), "14");
    }

    #[test]
    fn body_with_parameters() {
        let store = MemoryTemplateStore::new()
            .with("Greet", "Hello, {{{1}}}! You are {{{mood|fine}}}.")
            .with("Wrap", "[{{Greet|{{{who}}}|mood={{{m}}}}}]");
        assert_eq!(run("{{greet|Ann}}", &store), "Hello, Ann! You are fine.");
        assert_eq!(
            run("{{Wrap|who=Bob|m=glad}}", &store),
            "[Hello, Bob! You are glad.]"
        );
    }

    #[test]
    fn self_reference_is_literal() {
        let store = MemoryTemplateStore::new().with("A", "{{A}}");
        let (out, stats) = run_with("Before {{A}} after", &store, &options());
        assert_eq!(out, "Before {{A}} after");
        assert_eq!(stats.cycles, 1);
    }

    #[test]
    fn mutual_recursion_terminates() {
        let store = MemoryTemplateStore::new()
            .with("Ping", "p {{Pong}}")
            .with("Pong", "q {{Ping}}");
        assert_eq!(run("{{Ping}}", &store), "p q {{Ping}}");
    }

    #[test]
    fn depth_limit_emits_raw() {
        let mut store = MemoryTemplateStore::new();
        for i in 1..=10 {
            store.insert(&format!("T{}", i), &format!("{}{{{{T{}}}}}", i, i + 1));
        }
        let opts = EngineOptions {
            limits: ExpansionLimits {
                max_depth: 5,
                ..ExpansionLimits::default()
            },
            ..options()
        };
        let (out, stats) = run_with("{{T1}}", &store, &opts);
        assert_eq!(out, "12345{{T6}}");
        assert_eq!(stats.depth_limited, 1);
    }

    fn nested_colon_names(levels: usize) -> String {
        let mut text = "{{a:}}".to_string();
        for _ in 0..levels {
            text = format!("{{{{ {}:}}}}", text);
        }
        text
    }

    #[test]
    fn colon_names_expand_once_per_level() {
        for levels in [4, 12, 24] {
            let (_, stats) = run_with(&nested_colon_names(levels), &NoTemplates, &options());
            assert_eq!(stats.invocations, levels + 1);
            assert_eq!(stats.depth_limited, 0);
        }
    }

    #[test]
    fn size_limit_stops_growth() {
        let mut store = MemoryTemplateStore::new().with("L0", "abcdefghij");
        for i in 1..12 {
            let prev = format!("{{{{L{}}}}}", i - 1);
            store.insert(&format!("L{}", i), &prev.repeat(4));
        }
        let opts = EngineOptions {
            limits: ExpansionLimits {
                max_expansion_size: 10_000,
                ..ExpansionLimits::default()
            },
            ..options()
        };
        let (out, stats) = run_with("{{L11}}", &store, &opts);
        assert!(out.len() < 200_000);
        assert_eq!(stats.size_limited, 1);
    }

    #[test]
    fn discard_and_fallback() {
        let mut opts = options();
        opts.discard_templates.insert("infobox person".to_string());
        let (out, _) = run_with("a{{Infobox_person|name=X}}b{{nowrap|c d}}e{{Unknown|p|k=v|q}}", &NoTemplates, &opts);
        assert_eq!(out, "abc dep q");
    }

    #[test]
    fn expand_templates_off_drops_bodies() {
        let store = MemoryTemplateStore::new().with("T", "body");
        let opts = EngineOptions::default();
        let (out, _) = run_with("x{{T}}y{{lc:Z}}", &store, &opts);
        assert_eq!(out, "xyz");
    }

    #[test]
    fn unbalanced_and_comments() {
        assert_eq!(run("{{unterminated", &NoTemplates), "{{unterminated");
        assert_eq!(run("a<!-- {{UC:x}} -->b", &NoTemplates), "ab");
        assert_eq!(run("<nowiki>{{UC:x}}</nowiki>", &NoTemplates), "<nowiki>{{UC:x}}</nowiki>");
    }

    #[test]
    fn top_level_parameters() {
        assert_eq!(run("{{{1}}}", &NoTemplates), "{{{1}}}");
        assert_eq!(run("{{{1|dflt}}}", &NoTemplates), "dflt");
    }

    #[test]
    fn links_are_expanded_inside() {
        assert_eq!(run("[[{{UC:a}}|b]]", &NoTemplates), "[[A|b]]");
    }

    #[test]
    fn tag_function_produces_markup() {
        assert_eq!(run("{{#tag:math|x^2}}", &NoTemplates), "<math>x^2</math>");
    }

    #[test]
    fn store_strips_noinclude() {
        let store = MemoryTemplateStore::new().with(
            "Doc",
            "shown<noinclude>[[Category:Templates]]</noinclude><includeonly> too</includeonly>",
        );
        assert_eq!(run("{{Doc}}", &store), "shown too");
        let only = MemoryTemplateStore::new().with("O", "junk<onlyinclude>kept</onlyinclude>junk");
        assert_eq!(run("{{O}}", &only), "kept");
    }

    #[test]
    fn pathological_nesting_terminates() {
        let text = format!("{}x{}", "{{a|".repeat(2000), "}}".repeat(2000));
        let (out, stats) = run_with(&text, &NoTemplates, &options());
        assert!(!out.is_empty());
        assert!(stats.depth_limited >= 1);
        let links = format!("{}x{}", "[[".repeat(3000), "]]".repeat(3000));
        let (out, _) = run_with(&links, &NoTemplates, &options());
        assert_eq!(out.len(), links.len());
    }
}
