//! fontmatch -- read and write fontconfig font substitution rules
//!
//! Maps between [`FontMatchRule`] values and the `<match>` elements of a
//! fontconfig XML file. The rule code only sees the narrow
//! [`XmlTree`]/[`XmlTreeMut`] interface; [`Document`] is the bundled
//! implementation, and [`RuleSet`] manages the list of rules in one file.
//!
//! # Features
//!
//! - `cli` -- builds the `fontmatch` command-line tool

#![warn(missing_docs)]
#![deny(clippy::redundant_clone)]
#![warn(
    clippy::needless_collect,
    clippy::map_clone,
    clippy::implicit_clone,
    clippy::inefficient_to_string
)]

pub mod dom;
pub mod error;
pub mod rule;
pub mod ruleset;
pub mod tree;

// Re-export key types for convenience
pub use dom::{Declaration, Document, NodeId, NodeKind, ParseOptions, WriteOptions};
pub use error::FontconfigError;
pub use rule::{is_default_language, FontMatchRule, DEFAULT_LANGUAGE, FONTCONFIG_ROOT};
pub use ruleset::RuleSet;
pub use tree::{XmlTree, XmlTreeMut};
