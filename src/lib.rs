//! Extraction of readable text from wiki markup.
//!
//! ```
//! use wiki_extractor::{Extractor, ExtractorConfig};
//!
//! let extractor = Extractor::new(ExtractorConfig::default()).unwrap();
//! let paragraphs = extractor.clean_text("'''Rust''' is a [[programming language]].");
//! assert_eq!(paragraphs, vec!["Rust is a programming language."]);
//! ```

pub mod definitions;
pub mod extractor;
pub mod output;
pub mod wikitext;

pub use definitions::{Document, ExtractorConfig, ExtractorConfigBuilder, LinkRecord};
pub use extractor::Extractor;
pub use output::{Output, OutputFormatter};
