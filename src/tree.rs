//! Narrow tree interface used by rule parsing and building
//!
//! [`FontMatchRule`](crate::rule::FontMatchRule) never talks to a concrete XML
//! engine. It reads through [`XmlTree`] and writes through [`XmlTreeMut`], so
//! the same logic runs against [`Document`](crate::dom::Document) or any other
//! tree a caller already owns.

use core::fmt::Debug;

use crate::error::FontconfigError;

/// Read access to an XML-like tree.
pub trait XmlTree {
    /// Lightweight handle identifying one node of the tree.
    type Node: Copy + Eq + Debug;

    /// Direct children of `node`, in document order.
    fn children(&self, node: Self::Node) -> Vec<Self::Node>;

    /// Whether `node` is an element carrying at least one attribute.
    fn has_attributes(&self, node: Self::Node) -> bool;

    /// Value of attribute `name` on `node`, if present.
    fn attribute(&self, node: Self::Node, name: &str) -> Option<&str>;

    /// Tag name of `node`; `None` for text, comments and other non-elements.
    fn tag_name(&self, node: Self::Node) -> Option<&str>;

    /// Concatenated text of `node` and all of its descendants.
    fn text_content(&self, node: Self::Node) -> String;
}

/// Write access to an XML-like tree.
pub trait XmlTreeMut: XmlTree {
    /// Allocate a detached element named `tag`.
    fn create_element(&mut self, tag: &str) -> Self::Node;

    /// Set (or overwrite) attribute `name` on element `node`.
    fn set_attribute(
        &mut self,
        node: Self::Node,
        name: &str,
        value: &str,
    ) -> Result<(), FontconfigError>;

    /// Replace all children of `node` with a single text node.
    fn set_text_content(&mut self, node: Self::Node, text: &str) -> Result<(), FontconfigError>;

    /// Append `child` as the last child of `parent`.
    fn append_child(&mut self, parent: Self::Node, child: Self::Node)
        -> Result<(), FontconfigError>;

    /// The document's root element, if it is tagged `tag`.
    fn root_element(&self, tag: &str) -> Option<Self::Node>;
}
