//! Ordered list of substitution rules backed by a fontconfig document
//!
//! [`RuleSet::from_document`] pulls every `<match>` that forms a complete
//! [`FontMatchRule`] out of the `fontconfig` root and remembers which nodes it
//! took them from. After editing the list, [`RuleSet::write_to_document`]
//! rebuilds each surviving rule in place of its old node, drops the nodes of
//! removed rules and appends new rules at the end of the root. Any other
//! content (aliases, `<dir>` entries, `<match>` elements that are not plain
//! family substitutions) is left where it was, so the relative order of
//! pattern matches does not change.
//!
//! A `<match>` only joins the set when rebuilding it would not lose anything:
//!
//! - no attributes besides `target="pattern"`
//! - at most one family test and one language test, each holding a single
//!   `<string>` and no `compare`/`qual` other than `eq`/`any`
//! - exactly one family edit with `mode="prepend"` and a `strong` (or absent)
//!   binding, holding only `<string>` values
//! - nothing else inside but whitespace

use crate::dom::{Document, NodeId, NodeKind};
use crate::error::FontconfigError;
use crate::rule::{is_default_language, FontMatchRule, FONTCONFIG_ROOT};
use crate::tree::{XmlTree, XmlTreeMut};

/// Substitution rules of one document, in document order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<FontMatchRule>,
    /// Node each rule currently lives in, parallel to `rules`
    slots: Vec<Option<NodeId>>,
    /// Every `<match>` node this set has taken over
    owned: Vec<NodeId>,
}

impl RuleSet {
    /// Create an empty rule set not tied to any nodes
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract every complete rule under the `fontconfig` root
    pub fn from_document(doc: &Document) -> Result<Self, FontconfigError> {
        let root = doc
            .root_element(FONTCONFIG_ROOT)
            .ok_or_else(|| FontconfigError::MissingRoot {
                tag: FONTCONFIG_ROOT.to_string(),
            })?;

        let mut set = Self::new();
        for node in doc.element_children(root) {
            if doc.tag_name(node) != Some("match") {
                continue;
            }
            let rule = FontMatchRule::from_node(doc, node);
            if rule.is_empty() {
                if rule.family_test.is_some() || rule.family_edit.is_some() {
                    log::warn!(
                        "Leaving incomplete family match in place (family={:?})",
                        rule.family_test
                    );
                }
                continue;
            }
            if !is_plain_substitution(doc, node) {
                log::debug!(
                    "Leaving family match with extra conditions in place (family={:?})",
                    rule.family_test
                );
                continue;
            }
            set.rules.push(rule);
            set.slots.push(Some(node));
            set.owned.push(node);
        }

        log::debug!("Found {} substitution rule(s)", set.rules.len());
        Ok(set)
    }

    /// Rules in order
    pub fn rules(&self) -> &[FontMatchRule] {
        &self.rules
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if there are no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Append a rule at the end
    pub fn push(&mut self, rule: FontMatchRule) {
        self.rules.push(rule);
        self.slots.push(None);
    }

    /// Position of the rule for `family` and `lang`.
    ///
    /// Languages compare case-insensitively and the default language matches
    /// an absent one, mirroring what [`FontMatchRule::build`] writes.
    pub fn position(&self, family: &str, lang: Option<&str>) -> Option<usize> {
        let wanted = effective_lang(lang);
        self.rules.iter().position(|rule| {
            rule.family_test.as_deref() == Some(family)
                && same_lang(effective_lang(rule.lang_test.as_deref()), wanted)
        })
    }

    /// Rule for `family` and `lang`, if any
    pub fn find(&self, family: &str, lang: Option<&str>) -> Option<&FontMatchRule> {
        self.position(family, lang).map(|idx| &self.rules[idx])
    }

    /// Replace the rule with the same family and language, or append.
    ///
    /// Returns the rule that was replaced.
    pub fn upsert(&mut self, rule: FontMatchRule) -> Option<FontMatchRule> {
        let existing = rule
            .family_test
            .as_deref()
            .and_then(|family| self.position(family, rule.lang_test.as_deref()));
        match existing {
            Some(idx) => Some(core::mem::replace(&mut self.rules[idx], rule)),
            None => {
                self.push(rule);
                None
            }
        }
    }

    /// Remove and return the rule for `family` and `lang`
    pub fn remove(&mut self, family: &str, lang: Option<&str>) -> Option<FontMatchRule> {
        let idx = self.position(family, lang)?;
        self.slots.remove(idx);
        Some(self.rules.remove(idx))
    }

    /// Replace the document's rules with this list.
    ///
    /// A rule read from the document is rebuilt in place of its `<match>`;
    /// `<match>` nodes whose rule was removed are dropped; rules added since
    /// are appended after all other root content, in list order. Returns how
    /// many `<match>` elements the set now owns (empty rules write nothing).
    pub fn write_to_document(&mut self, doc: &mut Document) -> Result<usize, FontconfigError> {
        let root = doc
            .root_element(FONTCONFIG_ROOT)
            .ok_or_else(|| FontconfigError::MissingRoot {
                tag: FONTCONFIG_ROOT.to_string(),
            })?;

        for node in self.owned.drain(..) {
            if !self.slots.contains(&Some(node)) && doc.parent(node) == Some(root) {
                doc.remove_child(root, node)?;
            }
        }

        for (rule, slot) in self.rules.iter().zip(self.slots.iter_mut()) {
            let old = slot.take().filter(|node| doc.parent(*node) == Some(root));
            let new = match old {
                Some(old) => match rule.build_detached(doc)? {
                    Some(new) => {
                        doc.replace_child(root, old, new)?;
                        Some(new)
                    }
                    None => {
                        doc.remove_child(root, old)?;
                        None
                    }
                },
                None => rule.build(doc)?,
            };
            if let Some(node) = new {
                self.owned.push(node);
            }
            *slot = new;
        }

        log::debug!("Wrote {} substitution rule(s)", self.owned.len());
        Ok(self.owned.len())
    }
}

impl FromIterator<FontMatchRule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = FontMatchRule>>(iter: I) -> Self {
        let rules: Vec<FontMatchRule> = iter.into_iter().collect();
        Self {
            slots: vec![None; rules.len()],
            rules,
            owned: Vec::new(),
        }
    }
}

/// A `<match>` that rebuilding from its parsed rule would reproduce exactly.
fn is_plain_substitution(doc: &Document, node: NodeId) -> bool {
    if !only_attributes(doc, node, &[("target", "pattern")]) {
        return false;
    }

    let mut seen: Vec<(&str, &str)> = Vec::new();
    for child in doc.children(node) {
        match doc.node_kind(child) {
            NodeKind::Element { .. } => {}
            NodeKind::Text(text) if text.trim().is_empty() => continue,
            _ => return false,
        }
        let key = match (doc.tag_name(child), doc.attribute(child, "name")) {
            (Some("test"), Some(name @ ("family" | "lang")))
                if only_attributes(
                    doc,
                    child,
                    &[("name", name), ("compare", "eq"), ("qual", "any")],
                ) && string_count(doc, child) == Some(1) =>
            {
                ("test", name)
            }
            (Some("edit"), Some("family"))
                if doc.attribute(child, "mode") == Some("prepend")
                    && only_attributes(
                        doc,
                        child,
                        &[("name", "family"), ("mode", "prepend"), ("binding", "strong")],
                    )
                    && string_count(doc, child).is_some() =>
            {
                ("edit", "family")
            }
            _ => return false,
        };
        if seen.contains(&key) {
            return false;
        }
        seen.push(key);
    }
    seen.contains(&("edit", "family"))
}

/// Every attribute of `node` is one of the `allowed` name/value pairs
fn only_attributes(doc: &Document, node: NodeId, allowed: &[(&str, &str)]) -> bool {
    match doc.node_kind(node) {
        NodeKind::Element { attributes, .. } => attributes
            .iter()
            .all(|(key, value)| allowed.contains(&(key.as_str(), value.as_str()))),
        _ => false,
    }
}

/// Number of `<string>` children when `node` holds nothing else but
/// whitespace, and each string holds plain text.
fn string_count(doc: &Document, node: NodeId) -> Option<usize> {
    let mut count = 0;
    for child in doc.children(node) {
        match doc.node_kind(child) {
            NodeKind::Element { name, attributes }
                if name == "string" && attributes.is_empty() && is_plain_text(doc, child) =>
            {
                count += 1;
            }
            NodeKind::Text(text) if text.trim().is_empty() => {}
            _ => return None,
        }
    }
    Some(count)
}

fn is_plain_text(doc: &Document, node: NodeId) -> bool {
    doc.children(node)
        .into_iter()
        .all(|child| matches!(doc.node_kind(child), NodeKind::Text(_) | NodeKind::CData(_)))
}

fn effective_lang(lang: Option<&str>) -> Option<&str> {
    lang.filter(|l| !is_default_language(l))
}

fn same_lang(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        (None, None) => true,
        _ => false,
    }
}
