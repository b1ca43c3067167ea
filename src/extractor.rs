//! Entry point tying the passes together.
//!
//! An [`Extractor`] is built once from an [`ExtractorConfig`] and then used
//! for any number of documents. It holds no per-document state, so one
//! extractor can be shared between threads.

use chrono::Utc;
use log::info;

use crate::definitions::{Document, ExtractorConfig};
use crate::output::{Output, OutputFormatter};
use crate::wikitext::argument::{normalize_key, normalize_template_name};
use crate::wikitext::cleaner::{CleanerOptions, Paragraph, TextCleaner};
use crate::wikitext::errors::Result;
use crate::wikitext::html::{HtmlSanitizer, TagBalancer};
use crate::wikitext::magic_words::{MagicWordTable, PageContext};
use crate::wikitext::template_engine::{
    EngineOptions, ExpansionContext, ExpansionLimits, NoTemplates, TemplateEngine, TemplateStore,
};

pub struct Extractor {
    config: ExtractorConfig,
    magic: MagicWordTable,
    templates: Box<dyn TemplateStore>,
    sanitizer: Box<dyn HtmlSanitizer>,
    engine_options: EngineOptions,
    cleaner_options: CleanerOptions,
}

fn engine_options(config: &ExtractorConfig) -> EngineOptions {
    EngineOptions {
        expand_templates: config.expand_templates,
        discard_templates: config
            .discard_templates
            .iter()
            .map(|name| normalize_key(&normalize_template_name(name)))
            .collect(),
        limits: ExpansionLimits {
            max_depth: config.max_depth,
            max_parameter_depth: config.max_parameter_depth,
            max_expansion_size: config.max_expansion_size,
        },
        format: config.output_format(),
    }
}

impl Extractor {
    /// Validate `config` and build an extractor with no template bodies, the
    /// generic magic words of the configured language and the default
    /// [`TagBalancer`] sanitizer.
    pub fn new(config: ExtractorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            magic: MagicWordTable::new(config.language.clone()),
            templates: Box::new(NoTemplates),
            sanitizer: Box::new(TagBalancer),
            engine_options: engine_options(&config),
            cleaner_options: CleanerOptions::from(&config),
            config,
        })
    }

    /// Use `store` for template bodies.
    pub fn with_templates(mut self, store: impl TemplateStore + 'static) -> Self {
        self.templates = Box::new(store);
        self
    }

    /// Replace the magic word table (e.g. one with localized aliases).
    pub fn with_magic_words(mut self, table: MagicWordTable) -> Self {
        self.magic = table;
        self
    }

    /// Replace the HTML sanitizer applied to HTML output.
    pub fn with_sanitizer(mut self, sanitizer: impl HtmlSanitizer + 'static) -> Self {
        self.sanitizer = Box::new(sanitizer);
        self
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    fn page_context(&self, document: &Document) -> PageContext {
        PageContext {
            title: document.title.clone(),
            id: document.id.clone(),
            revid: document.revid.clone(),
            url_base: document.url_base.clone(),
            language: self.config.language.clone(),
            now: self.config.current_time.unwrap_or_else(Utc::now),
            ..PageContext::default()
        }
    }

    fn formatter(&self) -> OutputFormatter<'_> {
        OutputFormatter::new(self.config.output_format(), self.config.mark_headers)
            .with_sanitizer(self.sanitizer.as_ref())
    }

    /// Paragraphs of `document`, in source order.
    pub fn paragraphs(&self, document: &Document) -> Vec<Paragraph> {
        let page = self.page_context(document);
        let engine = TemplateEngine::new(
            &self.magic,
            self.templates.as_ref(),
            &page,
            &self.engine_options,
        );
        let cleaner = TextCleaner::new(engine, &self.cleaner_options);
        let mut ctx = ExpansionContext::new();
        let paragraphs = cleaner.clean(&document.text, &mut ctx);

        let stats = ctx.stats;
        info!(
            "{} ({}): {} paragraphs, {} template invocations, {} depth-limited, {} size-limited, {} cycles",
            document.title,
            document.id,
            paragraphs.len(),
            stats.invocations,
            stats.depth_limited,
            stats.size_limited,
            stats.cycles
        );
        paragraphs
    }

    /// Clean raw markup that has no document metadata around it. Each string
    /// is one paragraph in the configured format.
    pub fn clean_text(&self, raw: &str) -> Vec<String> {
        let document = Document {
            text: raw.to_string(),
            ..Default::default()
        };
        let paragraphs = self.paragraphs(&document);
        self.formatter().paragraph_strings(&paragraphs)
    }

    /// Extract `document` in the configured format.
    pub fn extract(&self, document: &Document) -> Output {
        let paragraphs = self.paragraphs(document);
        self.formatter().format(document, &paragraphs)
    }

    /// [`extract`](Self::extract) rendered to a single string.
    pub fn extract_to_string(&self, document: &Document) -> Result<String> {
        self.extract(document).render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wikitext::enums::{LinkType, OutputFormat};
    use crate::wikitext::template_engine::MemoryTemplateStore;
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn extractor(config: ExtractorConfig) -> Extractor {
        Extractor::new(config).unwrap()
    }

    fn joined(out: &[String]) -> String {
        out.join("\n")
    }

    #[test]
    fn self_reference_terminates_as_literal() {
        let ex = extractor(ExtractorConfig::default())
            .with_templates(MemoryTemplateStore::new().with("A", "x {{A}} y"));
        let out = joined(&ex.clean_text("Before {{A}} after"));
        assert_eq!(out, "Before x {{A}} y after");
    }

    #[test]
    fn internal_link_display() {
        let ex = extractor(ExtractorConfig::default());
        let out = joined(&ex.clean_text("See [[Target|Display]] here."));
        assert!(out.contains("Display"));
        assert!(!out.contains("Target"));
        assert!(!out.contains('['));
    }

    #[test]
    fn markdown_keeps_links() {
        let config = ExtractorConfig {
            keep_links: true,
            ..Default::default()
        }
        .with_format(OutputFormat::Markdown);
        let out = joined(&extractor(config).clean_text("See [[Target|Display]] here."));
        assert!(out.contains("[Display](Target)"));
    }

    #[test]
    fn discarded_section_is_hidden() {
        let config = ExtractorConfig {
            discard_sections: HashSet::from(["Secret".to_string()]),
            ..Default::default()
        };
        let out = extractor(config)
            .clean_text("== Secret ==\nHidden text\n== Public ==\nVisible text");
        assert!(out.iter().any(|p| p.contains("Visible text")));
        assert!(out.iter().all(|p| !p.contains("Hidden text")));
    }

    #[test]
    fn uppercase_magic_word() {
        let ex = extractor(ExtractorConfig::default());
        assert!(joined(&ex.clean_text("Say {{UC:hello}} now")).contains("HELLO"));
    }

    #[test]
    fn unterminated_template_is_plain_text() {
        let ex = extractor(ExtractorConfig::default());
        let first = ex.clean_text("{{unterminated");
        assert_eq!(first, vec!["{{unterminated"]);
        assert_eq!(first, ex.clean_text("{{unterminated"));
        assert_eq!(
            ex.clean_text("Intro.\n\n{{unterminated and more prose"),
            vec!["Intro.", "{{unterminated and more prose"]
        );
        assert_eq!(ex.clean_text("Text before {{unterminated"), vec!["Text before {{unterminated"]);
    }

    #[test]
    fn standalone_cycle_is_literal() {
        let ex = extractor(ExtractorConfig::default())
            .with_templates(MemoryTemplateStore::new().with("A", "{{A}}"));
        assert_eq!(ex.clean_text("{{A}}"), vec!["{{A}}"]);
    }

    #[test]
    fn depth_limit_leaves_rest_literal() {
        let mut store = MemoryTemplateStore::new();
        for i in 1..=10 {
            store.insert(&format!("T{}", i), &format!("{}{{{{T{}}}}}", i, i + 1));
        }
        let config = ExtractorConfig {
            max_depth: 5,
            ..Default::default()
        };
        let ex = extractor(config).with_templates(store);
        assert_eq!(ex.clean_text("Count {{T1}}"), vec!["Count 12345{{T6}}"]);
    }

    #[test]
    fn size_limit_bounds_output() {
        let mut store = MemoryTemplateStore::new().with("L0", "abcdefghij");
        for i in 1..=8 {
            let prev = format!("{{{{L{}}}}}", i - 1);
            store.insert(&format!("L{}", i), &prev.repeat(4));
        }
        let config = ExtractorConfig {
            max_expansion_size: 1000,
            ..Default::default()
        };
        let out = extractor(config).with_templates(store).clean_text("Start {{L8}} end");
        assert_eq!(out.len(), 1);
        assert!(out[0].starts_with("Start abcdefghij"));
        assert!(out[0].ends_with("end"));
        assert!(out[0].contains("{{L"));
        assert!(out[0].len() < 5000);
    }

    #[test]
    fn nested_colon_names_terminate() {
        let mut text = "{{a:}}".to_string();
        for _ in 0..28 {
            text = format!("{{{{ {}:}}}}", text);
        }
        let ex = extractor(ExtractorConfig::default());
        assert!(ex.clean_text(&text).is_empty());
    }

    #[test]
    fn nested_template_argument_stays_whole() {
        let store = MemoryTemplateStore::new()
            .with("Name", "{{{a}}}/{{{b}}}")
            .with("X", "x{{{1}}}");
        let ex = extractor(ExtractorConfig::default()).with_templates(store);
        assert_eq!(ex.clean_text("Value {{Name|a={{X|1}}|b=2}}"), vec!["Value x1/2"]);
    }

    #[test]
    fn extraction_is_repeatable() {
        let doc = Document::new("7", "Page", "Intro.\n== Part ==\n* a\n* b\n");
        for format in [OutputFormat::Text, OutputFormat::Markdown, OutputFormat::Html, OutputFormat::Json] {
            let ex = extractor(ExtractorConfig::default().with_format(format));
            assert_eq!(ex.extract(&doc), ex.extract(&doc));
        }
    }

    #[test]
    fn json_output_with_links() {
        let config = ExtractorConfig {
            keep_links: true,
            ..Default::default()
        }
        .with_format(OutputFormat::Json);
        let mut doc = Document::new("12", "Paris", "== Overview ==\nCapital of [[France|the country]].");
        doc.url_base = "https://en.wikipedia.org/wiki".to_string();
        let Output::Json(json) = extractor(config).extract(&doc) else {
            panic!("expected JSON output");
        };
        assert_eq!(json.url, "https://en.wikipedia.org/wiki?curid=12");
        let body = &json.paragraphs[1];
        assert_eq!(body.text, "Capital of the country.");
        assert_eq!(body.section_title.as_deref(), Some("Overview"));
        assert_eq!(body.links[0].target, "France");
        assert_eq!(body.links[0].link_type, LinkType::Internal);
    }

    #[test]
    fn html_output_is_balanced() {
        let ex = extractor(ExtractorConfig::default().with_format(OutputFormat::Html));
        let doc = Document::new("1", "T", "Some '''bold <i>text''' here");
        let html = ex.extract_to_string(&doc).unwrap();
        assert_eq!(html.matches("<i>").count(), html.matches("</i>").count());
        assert!(html.starts_with("<p>"));
    }

    #[test]
    fn fixed_clock_makes_dates_deterministic() {
        let config = ExtractorConfig::builder()
            .current_time(Utc.with_ymd_and_hms(2020, 5, 17, 0, 0, 0).unwrap())
            .build()
            .unwrap();
        let out = extractor(config).clean_text("Year {{CURRENTYEAR}}.");
        assert_eq!(out, vec!["Year 2020."]);
    }

    #[test]
    fn conflicting_config_is_rejected() {
        let config = ExtractorConfig {
            markdown: true,
            html_formatting: true,
            ..Default::default()
        };
        assert!(Extractor::new(config).is_err());
    }

    #[test]
    fn discarded_templates_and_no_expansion() {
        let store = MemoryTemplateStore::new().with("Infobox", "BOX");
        let config = ExtractorConfig {
            discard_templates: HashSet::from(["infobox".to_string()]),
            ..Default::default()
        };
        let ex = extractor(config).with_templates(store.clone());
        assert_eq!(ex.clean_text("A {{Infobox}} b"), vec!["A b"]);

        let off = ExtractorConfig {
            expand_templates: false,
            ..Default::default()
        };
        let ex = extractor(off).with_templates(store);
        assert_eq!(ex.clean_text("A {{Infobox}} b {{lc:X}}"), vec!["A b x"]);
    }

    #[test]
    fn shared_between_threads() {
        let ex = extractor(ExtractorConfig::default());
        let docs = [
            Document::new("1", "One", "First [[page]]."),
            Document::new("2", "Two", "Second {{UC:page}}."),
        ];
        let ex = &ex;
        let outputs: Vec<Output> = std::thread::scope(|s| {
            let handles: Vec<_> = docs.iter().map(|d| s.spawn(move || ex.extract(d))).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(outputs[0], Output::Plain(vec!["First page.".to_string()]));
        assert_eq!(outputs[1], Output::Plain(vec!["Second PAGE.".to_string()]));
    }
}
