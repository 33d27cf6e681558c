//! Unified error type for fontmatch
//!
//! A single `FontconfigError` covers document loading, tree manipulation and
//! rule serialization, with a `From` impl for I/O so `?` works at file
//! boundaries.

use std::fmt;

/// Top-level error type for fontmatch operations
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FontconfigError {
    /// Malformed XML handed to the document parser
    Parse(String),
    /// The document has no root element with the required tag
    MissingRoot {
        /// Tag name that was expected on the root element.
        tag: String,
    },
    /// A tree operation received a node handle it cannot act on
    InvalidNode(String),
    /// A configured parse limit was exceeded
    LimitExceeded {
        /// Which limit was hit (e.g. "depth", "nodes").
        kind: &'static str,
        /// Configured maximum.
        limit: usize,
    },
    /// I/O error (description only, since `std::io::Error` is not `Clone`)
    Io(String),
}

impl fmt::Display for FontconfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontconfigError::Parse(msg) => write!(f, "Parse error: {}", msg),
            FontconfigError::MissingRoot { tag } => {
                write!(f, "Document has no <{}> root element", tag)
            }
            FontconfigError::InvalidNode(msg) => write!(f, "Invalid node: {}", msg),
            FontconfigError::LimitExceeded { kind, limit } => {
                write!(f, "Document exceeds {} limit ({})", kind, limit)
            }
            FontconfigError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for FontconfigError {}

impl From<std::io::Error> for FontconfigError {
    fn from(err: std::io::Error) -> Self {
        FontconfigError::Io(err.to_string())
    }
}
