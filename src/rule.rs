//! Font substitution rules and their fontconfig `<match>` representation
//!
//! A [`FontMatchRule`] says "when a request asks for family X (optionally in
//! language L), try families A, B, ... first". In fontconfig XML that is:
//!
//! ```xml
//! <match>
//!   <test name="family"><string>Arial</string></test>
//!   <test name="lang"><string>ja</string></test>
//!   <edit name="family" binding="strong" mode="prepend">
//!     <string>Noto Sans CJK JP</string>
//!     <string>Noto Sans</string>
//!   </edit>
//! </match>
//! ```
//!
//! # Usage
//!
//! ```rust
//! use fontmatch::dom::Document;
//! use fontmatch::rule::FontMatchRule;
//!
//! # fn example() -> Result<(), fontmatch::error::FontconfigError> {
//! let mut doc = Document::new_fontconfig();
//! let rule = FontMatchRule::substitute("Arial", Some("ja"), ["Noto Sans CJK JP"]);
//! let node = rule.build(&mut doc)?.expect("complete rule");
//!
//! let reparsed = FontMatchRule::from_node(&doc, node);
//! assert_eq!(reparsed, rule);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

use crate::error::FontconfigError;
use crate::tree::{XmlTree, XmlTreeMut};

/// Tag name of the fontconfig document root.
pub const FONTCONFIG_ROOT: &str = "fontconfig";

/// Language code treated as the implicit fallback and never written out.
pub const DEFAULT_LANGUAGE: &str = "en";

const MATCH_TAG: &str = "match";
const TEST_TAG: &str = "test";
const EDIT_TAG: &str = "edit";
const STRING_TAG: &str = "string";

/// Whether `lang` is the default language (compared case-insensitively).
pub fn is_default_language(lang: &str) -> bool {
    lang.eq_ignore_ascii_case(DEFAULT_LANGUAGE)
}

/// One family substitution rule
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FontMatchRule {
    /// Family the request must ask for (`<test name="family">`)
    pub family_test: Option<String>,
    /// Language the request must carry (`<test name="lang">`)
    pub lang_test: Option<String>,
    /// Families to prepend, highest priority first (`<edit name="family">`)
    pub family_edit: Option<Vec<String>>,
}

impl FontMatchRule {
    /// Create a rule with every field absent
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a rule from explicit field values.
    ///
    /// No validation happens here; see [`is_empty`](Self::is_empty).
    pub fn with_fields(
        family_test: Option<String>,
        lang_test: Option<String>,
        family_edit: Option<Vec<String>>,
    ) -> Self {
        Self {
            family_test,
            lang_test,
            family_edit,
        }
    }

    /// Shorthand for a complete rule built from borrowed strings.
    pub fn substitute<I, S>(family: &str, lang: Option<&str>, prefer: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            family_test: Some(family.to_string()),
            lang_test: lang.map(str::to_string),
            family_edit: Some(prefer.into_iter().map(Into::into).collect()),
        }
    }

    /// Read a rule out of a `<match>` element (or any element whose children
    /// are `<test>`/`<edit>` nodes).
    ///
    /// Never fails: unknown or incomplete children simply leave the
    /// corresponding field absent. The tree is not modified.
    pub fn from_node<T: XmlTree>(tree: &T, node: T::Node) -> Self {
        let mut rule = Self::new();

        for child in tree.children(node) {
            if !tree.has_attributes(child) {
                continue;
            }
            let Some(tag) = tree.tag_name(child) else {
                continue;
            };
            let name = tree.attribute(child, "name").unwrap_or_default();
            let strings = collect_strings(tree, child);
            if strings.is_empty() {
                continue;
            }

            match (tag, name) {
                (TEST_TAG, "family") => rule.family_test = strings.into_iter().next(),
                (TEST_TAG, "lang") => rule.lang_test = strings.into_iter().next(),
                (EDIT_TAG, "family") => rule.family_edit = Some(strings),
                _ => {}
            }
        }

        log::debug!(
            "Parsed match rule: family={:?} lang={:?} prefer={:?}",
            rule.family_test,
            rule.lang_test,
            rule.family_edit
        );
        rule
    }

    /// Reset this rule and repopulate it from `node`.
    ///
    /// Equivalent to `*self = FontMatchRule::from_node(tree, node)`.
    pub fn parse<T: XmlTree>(&mut self, tree: &T, node: T::Node) {
        *self = Self::from_node(tree, node);
    }

    /// Append this rule as a new `<match>` element under the `fontconfig` root.
    ///
    /// Returns `Ok(None)` without touching the tree when the rule
    /// [`is_empty`](Self::is_empty). A language test equal to
    /// [`DEFAULT_LANGUAGE`] is not written. The `<match>` is attached only
    /// once it is complete, so a failing tree call leaves the root as it was.
    pub fn build<T: XmlTreeMut>(&self, tree: &mut T) -> Result<Option<T::Node>, FontconfigError> {
        if self.is_empty() {
            log::trace!("Skipping empty match rule");
            return Ok(None);
        }

        let root = tree
            .root_element(FONTCONFIG_ROOT)
            .ok_or_else(|| FontconfigError::MissingRoot {
                tag: FONTCONFIG_ROOT.to_string(),
            })?;

        let Some(match_el) = self.build_detached(tree)? else {
            return Ok(None);
        };
        tree.append_child(root, match_el)?;
        Ok(Some(match_el))
    }

    /// Create the `<match>` element for this rule without attaching it.
    ///
    /// Same output as [`build`](Self::build), but the caller decides where the
    /// element goes. Returns `Ok(None)` for an empty rule.
    pub fn build_detached<T: XmlTreeMut>(
        &self,
        tree: &mut T,
    ) -> Result<Option<T::Node>, FontconfigError> {
        let (Some(family), Some(prefer)) = (&self.family_test, &self.family_edit) else {
            return Ok(None);
        };

        let match_el = tree.create_element(MATCH_TAG);
        append_test(tree, match_el, "family", family)?;

        if let Some(lang) = self.lang_test.as_deref().filter(|l| !is_default_language(l)) {
            append_test(tree, match_el, "lang", lang)?;
        }

        let edit = tree.create_element(EDIT_TAG);
        tree.set_attribute(edit, "name", "family")?;
        tree.set_attribute(edit, "binding", "strong")?;
        tree.set_attribute(edit, "mode", "prepend")?;
        tree.append_child(match_el, edit)?;
        for value in prefer {
            append_string(tree, edit, value)?;
        }

        log::debug!(
            "Built match rule for '{}' ({} substitute(s))",
            family,
            prefer.len()
        );
        Ok(Some(match_el))
    }

    /// True when the family test or the family edit is absent.
    ///
    /// A present but zero-length `family_edit` does not count as empty.
    pub fn is_empty(&self) -> bool {
        self.family_test.is_none() || self.family_edit.is_none()
    }

    /// Whether the rule restricts matching to a non-default language.
    pub fn has_lang_restriction(&self) -> bool {
        self.lang_test
            .as_deref()
            .is_some_and(|lang| !is_default_language(lang))
    }
}

/// Text of every immediate `<string>` child of `node`, in order
fn collect_strings<T: XmlTree>(tree: &T, node: T::Node) -> Vec<String> {
    tree.children(node)
        .into_iter()
        .filter(|child| tree.tag_name(*child) == Some(STRING_TAG))
        .map(|child| tree.text_content(child))
        .collect()
}

fn append_test<T: XmlTreeMut>(
    tree: &mut T,
    parent: T::Node,
    name: &str,
    value: &str,
) -> Result<(), FontconfigError> {
    let test = tree.create_element(TEST_TAG);
    tree.set_attribute(test, "name", name)?;
    tree.append_child(parent, test)?;
    append_string(tree, test, value)
}

fn append_string<T: XmlTreeMut>(
    tree: &mut T,
    parent: T::Node,
    value: &str,
) -> Result<(), FontconfigError> {
    let string = tree.create_element(STRING_TAG);
    tree.set_text_content(string, value)?;
    tree.append_child(parent, string)
}
