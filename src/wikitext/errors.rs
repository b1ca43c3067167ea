//! Error types for the extractor.
//!
//! Markup itself never produces an error: malformed or hostile wikitext always
//! degrades to literal text. The variants here cover the few things that can
//! actually go wrong around the engine.
//!
//! Exported items:
//! - `WtError` - main error enum (configuration, invalid arguments, I/O and
//!    serialization).
//! - `Result<T>` - convenient alias `std::result::Result<T, WtError>`.

use std::error::Error;
use std::fmt;

/// The canonical result type used across the crate.
pub type Result<T> = std::result::Result<T, WtError>;

/// Extractor error.
///
/// - `Config` - the configuration is unusable (conflicting output flags, zero
///    limits, ...). Reported once when an `Extractor` is built.
/// - `InvalidArgument` - a caller passed a value that makes no sense, e.g. an
///    unknown output format name.
/// - `Io` - wrapper for underlying I/O errors (binary only).
/// - `Serialization` - JSON rendering failed.
#[derive(Debug)]
pub enum WtError {
    Config {
        msg: String,
    },
    InvalidArgument {
        msg: String,
    },
    Io {
        msg: String,
        source: Option<Box<dyn Error + Send + Sync + 'static>>,
    },
    Serialization {
        msg: String,
        source: Option<Box<dyn Error + Send + Sync + 'static>>,
    },
}

impl WtError {
    /// Construct a configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        WtError::Config { msg: msg.into() }
    }

    /// Construct an invalid argument error.
    pub fn invalid_arg<S: Into<String>>(msg: S) -> Self {
        WtError::InvalidArgument { msg: msg.into() }
    }

    /// Wrap a std::io::Error or other error as an Io variant.
    pub fn io_err<E: Error + Send + Sync + 'static>(msg: impl Into<String>, e: E) -> Self {
        WtError::Io {
            msg: msg.into(),
            source: Some(Box::new(e)),
        }
    }

    /// Returns a short, user-friendly description of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            WtError::Config { .. } => "Config",
            WtError::InvalidArgument { .. } => "InvalidArgument",
            WtError::Io { .. } => "Io",
            WtError::Serialization { .. } => "Serialization",
        }
    }

    /// If the error has an underlying source, return it (if any).
    pub fn source_opt(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WtError::Io { source, .. } | WtError::Serialization { source, .. } => {
                source.as_ref().map(|b| b.as_ref() as &dyn Error)
            }
            _ => None,
        }
    }
}

impl fmt::Display for WtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WtError::Config { msg } => write!(f, "Invalid configuration: {}", msg),
            WtError::InvalidArgument { msg } => write!(f, "Invalid argument: {}", msg),
            WtError::Io { msg, source } => {
                if let Some(s) = source {
                    write!(f, "IO error: {} (cause: {})", msg, s)
                } else {
                    write!(f, "IO error: {}", msg)
                }
            }
            WtError::Serialization { msg, source } => {
                if let Some(s) = source {
                    write!(f, "Serialization error: {} (cause: {})", msg, s)
                } else {
                    write!(f, "Serialization error: {}", msg)
                }
            }
        }
    }
}

impl Error for WtError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source_opt()
    }
}

/* Common conversions to make error propagation ergonomic. */

impl From<std::io::Error> for WtError {
    fn from(e: std::io::Error) -> Self {
        WtError::io_err("I/O error", e)
    }
}

impl From<serde_json::Error> for WtError {
    fn from(e: serde_json::Error) -> Self {
        WtError::Serialization {
            msg: "failed to render JSON".to_string(),
            source: Some(Box::new(e)),
        }
    }
}

impl From<crate::definitions::ExtractorConfigBuilderError> for WtError {
    fn from(e: crate::definitions::ExtractorConfigBuilderError) -> Self {
        WtError::config(e.to_string())
    }
}
