//! Wikitext module root
//!
//! Declares the submodules of the markup engine and re-exports the items
//! callers reach for most. The passes are leaf-first:
//! `scanner` → `argument` → `magic_words`/`expr` → `template_engine` →
//! `links`/`math`/`html`/`tables` → `cleaner`.

pub mod argument;
pub mod cleaner;
pub mod enums;
pub mod errors;
pub mod expr;
pub mod html;
pub mod known_templates;
pub mod links;
pub mod magic_words;
pub mod math;
pub mod scanner;
pub mod tables;
pub mod template_engine;

// Re-export commonly used types for ergonomic access.
pub use argument::{TemplateArgument, TemplateInvocation};
pub use cleaner::{Paragraph, ParagraphKind, TextCleaner};
pub use enums::{LinkType, ListType, MathMode, OutputFormat};
pub use errors::{Result, WtError};
pub use html::{HtmlSanitizer, TagBalancer};
pub use links::LinkProcessor;
pub use magic_words::{MagicWord, MagicWordTable, PageContext};
pub use math::MathProcessor;
pub use scanner::{BracketScanner, Span, SpanKind};
pub use template_engine::{
    ExpansionContext, MemoryTemplateStore, NoTemplates, TemplateEngine, TemplateStore,
};
