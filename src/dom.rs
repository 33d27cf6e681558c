//! In-memory XML document for fontconfig files
//!
//! Loads a document with quick-xml into an arena of nodes addressed by
//! [`NodeId`], implements the [`XmlTree`]/[`XmlTreeMut`] interface the rule
//! code is written against, and writes the tree back out.
//!
//! Whitespace text and comments are kept, so a document that is loaded and
//! written with [`WriteOptions::preserve`] comes back unchanged apart from
//! top-level line breaks (one newline is always written after each prolog
//! item and after the root element).

use std::io::Write;
use std::path::Path;

use quick_xml::escape::{partial_escape, unescape};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use crate::error::FontconfigError;
use crate::rule::FONTCONFIG_ROOT;
use crate::tree::{XmlTree, XmlTreeMut};

/// Default maximum element nesting depth
const DEFAULT_MAX_DEPTH: usize = 256;

/// Default maximum number of nodes in one document
const DEFAULT_MAX_NODES: usize = 1 << 20;

/// DOCTYPE written by [`Document::new_fontconfig`]
const FONTCONFIG_DOCTYPE: &str = "fontconfig SYSTEM \"urn:fontconfig:fonts.dtd\"";

/// Handle to a node of a [`Document`].
///
/// Handles are only meaningful for the document that created them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Content of a single node
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum NodeKind {
    /// The synthetic document node owning all top-level nodes
    Document,
    /// An element with its attributes in source order
    Element {
        /// Tag name, including any namespace prefix
        name: String,
        /// `(name, value)` pairs, values unescaped
        attributes: Vec<(String, String)>,
    },
    /// Character data, entities resolved
    Text(String),
    /// `<![CDATA[...]]>` section
    CData(String),
    /// `<!-- ... -->` comment
    Comment(String),
    /// `<?target ...?>` processing instruction
    ProcessingInstruction(String),
    /// `<!DOCTYPE ...>` declaration (content only)
    DocType(String),
}

#[derive(Clone, Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// The `<?xml ...?>` declaration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    /// `version` pseudo-attribute
    pub version: String,
    /// `encoding` pseudo-attribute
    pub encoding: Option<String>,
    /// `standalone` pseudo-attribute
    pub standalone: Option<String>,
}

impl Default for Declaration {
    fn default() -> Self {
        Self {
            version: String::from("1.0"),
            encoding: None,
            standalone: None,
        }
    }
}

/// Safety limits applied while parsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseOptions {
    /// Maximum element nesting depth.
    pub max_depth: usize,
    /// Maximum number of nodes created.
    pub max_nodes: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
        }
    }
}

impl ParseOptions {
    /// Set the maximum nesting depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the maximum node count.
    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }
}

/// Output formatting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteOptions {
    /// Re-indent element-only content with this many spaces per level.
    ///
    /// `None` writes every node exactly as stored.
    pub indent: Option<usize>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { indent: Some(2) }
    }
}

impl WriteOptions {
    /// Write the tree as stored, whitespace included.
    pub fn preserve() -> Self {
        Self { indent: None }
    }

    /// Re-indent with `width` spaces per level.
    pub fn with_indent(mut self, width: usize) -> Self {
        self.indent = Some(width);
        self
    }
}

/// An XML document held in memory
#[derive(Clone, Debug)]
pub struct Document {
    nodes: Vec<NodeData>,
    declaration: Option<Declaration>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    const ROOT: NodeId = NodeId(0);

    /// Create a document with no declaration and no root element
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
            declaration: None,
        }
    }

    /// Create an empty fontconfig file: declaration, DOCTYPE and `<fontconfig/>`
    pub fn new_fontconfig() -> Self {
        let mut doc = Self::new();
        doc.declaration = Some(Declaration::default());
        let doctype = doc.push_node(NodeKind::DocType(FONTCONFIG_DOCTYPE.to_string()));
        doc.attach(Self::ROOT, doctype);
        let root = doc.create_element(FONTCONFIG_ROOT);
        doc.attach(Self::ROOT, root);
        doc
    }

    /// Parse a document with default [`ParseOptions`]
    pub fn parse(content: &[u8]) -> Result<Self, FontconfigError> {
        Self::parse_with_options(content, ParseOptions::default())
    }

    /// Parse a document with explicit limits
    pub fn parse_with_options(
        content: &[u8],
        options: ParseOptions,
    ) -> Result<Self, FontconfigError> {
        let mut reader = Reader::from_reader(content);
        reader.config_mut().trim_text(false);

        let mut doc = Self::new();
        let mut buf = Vec::new();
        let mut stack: Vec<NodeId> = Vec::new();

        loop {
            let parent = stack.last().copied().unwrap_or(Self::ROOT);
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    if stack.len() >= options.max_depth {
                        return Err(FontconfigError::LimitExceeded {
                            kind: "depth",
                            limit: options.max_depth,
                        });
                    }
                    let id = doc.push_element(&e, &reader, parent, &options)?;
                    stack.push(id);
                }
                Ok(Event::Empty(e)) => {
                    doc.push_element(&e, &reader, parent, &options)?;
                }
                Ok(Event::End(_)) => {
                    if stack.pop().is_none() {
                        return Err(FontconfigError::Parse("unexpected closing tag".into()));
                    }
                }
                Ok(Event::Text(e)) => {
                    let text = e
                        .decode()
                        .map_err(|e| FontconfigError::Parse(format!("Decode error: {:?}", e)))?;
                    doc.push_text(parent, &text, &options)?;
                }
                Ok(Event::GeneralRef(e)) => {
                    let entity_name = e
                        .decode()
                        .map_err(|e| FontconfigError::Parse(format!("Decode error: {:?}", e)))?;
                    let entity = format!("&{};", entity_name);
                    let resolved = unescape(&entity)
                        .map_err(|e| FontconfigError::Parse(format!("Unescape error: {:?}", e)))?;
                    doc.push_text(parent, &resolved, &options)?;
                }
                Ok(Event::CData(e)) => {
                    let text = decode_bytes(&e, &reader)?;
                    doc.push_leaf(parent, NodeKind::CData(text), &options)?;
                }
                Ok(Event::Comment(e)) => {
                    let text = e
                        .decode()
                        .map_err(|e| FontconfigError::Parse(format!("Decode error: {:?}", e)))?
                        .to_string();
                    doc.push_leaf(parent, NodeKind::Comment(text), &options)?;
                }
                Ok(Event::PI(e)) => {
                    let text = decode_bytes(&e, &reader)?;
                    doc.push_leaf(parent, NodeKind::ProcessingInstruction(text), &options)?;
                }
                Ok(Event::DocType(e)) => {
                    let text = e
                        .decode()
                        .map_err(|e| FontconfigError::Parse(format!("Decode error: {:?}", e)))?
                        .trim()
                        .to_string();
                    doc.push_leaf(parent, NodeKind::DocType(text), &options)?;
                }
                Ok(Event::Decl(e)) => {
                    doc.declaration = Some(read_declaration(&e)?);
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(FontconfigError::Parse(format!("XML parse error: {:?}", e))),
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(FontconfigError::Parse(format!(
                "{} unclosed element(s) at end of input",
                stack.len()
            )));
        }
        if doc.document_element().is_none() {
            return Err(FontconfigError::Parse("document has no root element".into()));
        }

        log::debug!("Parsed XML document ({} nodes)", doc.nodes.len());
        Ok(doc)
    }

    /// Read and parse a file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FontconfigError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let doc = Self::parse(&bytes)?;
        log::debug!("Loaded {}", path.display());
        Ok(doc)
    }

    /// Serialize and write to a file
    pub fn save<P: AsRef<Path>>(
        &self,
        path: P,
        options: &WriteOptions,
    ) -> Result<(), FontconfigError> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)?;
        self.write_to(std::io::BufWriter::new(file), options)?;
        log::debug!("Saved {}", path.display());
        Ok(())
    }

    /// The `<?xml ...?>` declaration, if any
    pub fn declaration(&self) -> Option<&Declaration> {
        self.declaration.as_ref()
    }

    /// Replace or drop the XML declaration
    pub fn set_declaration(&mut self, declaration: Option<Declaration>) {
        self.declaration = declaration;
    }

    /// The single top-level element
    pub fn document_element(&self) -> Option<NodeId> {
        self.nodes[Self::ROOT.0]
            .children
            .iter()
            .copied()
            .find(|id| matches!(self.nodes[id.0].kind, NodeKind::Element { .. }))
    }

    /// The node's content.
    ///
    /// # Panics
    ///
    /// Panics if `node` was not created by this document.
    pub fn node_kind(&self, node: NodeId) -> &NodeKind {
        &self.nodes[node.0].kind
    }

    /// Parent of `node`; `None` for the document node and detached nodes
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|data| data.parent)
    }

    /// Element children of `node`, skipping text, comments and the like
    pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.data(node)
            .map(|data| {
                data.children
                    .iter()
                    .copied()
                    .filter(|id| matches!(self.nodes[id.0].kind, NodeKind::Element { .. }))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Detach `child` from `parent`.
    ///
    /// Whitespace-only text directly before the child is removed too, so
    /// repeated removals do not leave blank lines behind.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), FontconfigError> {
        let siblings = &self.nodes[self.checked(parent)?.0].children;
        let Some(pos) = siblings.iter().position(|id| *id == child) else {
            return Err(FontconfigError::InvalidNode(format!(
                "{:?} is not a child of {:?}",
                child, parent
            )));
        };
        let leading_ws = pos > 0 && self.is_whitespace_text(siblings[pos - 1]);

        let mut removed = vec![child];
        let children = &mut self.nodes[parent.0].children;
        children.remove(pos);
        if leading_ws {
            removed.push(children.remove(pos - 1));
        }
        for id in removed {
            self.nodes[id.0].parent = None;
        }
        Ok(())
    }

    /// Put `new` in the place of `old` among the children of `parent`.
    ///
    /// `new` is detached from any previous parent first; `old` ends up
    /// detached.
    pub fn replace_child(
        &mut self,
        parent: NodeId,
        old: NodeId,
        new: NodeId,
    ) -> Result<(), FontconfigError> {
        let parent = self.checked(parent)?;
        let new = self.checked(new)?;
        if old == new {
            return Ok(());
        }
        if new == Self::ROOT || self.is_ancestor_or_self(new, parent) {
            return Err(FontconfigError::InvalidNode(format!(
                "placing {:?} under {:?} would create a cycle",
                new, parent
            )));
        }
        if !self.nodes[parent.0].children.contains(&old) {
            return Err(FontconfigError::InvalidNode(format!(
                "{:?} is not a child of {:?}",
                old, parent
            )));
        }
        if let Some(previous) = self.nodes[new.0].parent {
            self.nodes[previous.0].children.retain(|id| *id != new);
        }
        // position taken after detaching, `new` may have been an earlier sibling
        let children = &mut self.nodes[parent.0].children;
        if let Some(pos) = children.iter().position(|id| *id == old) {
            children[pos] = new;
        }
        self.nodes[new.0].parent = Some(parent);
        self.nodes[old.0].parent = None;
        Ok(())
    }

    /// Serialize to a string
    pub fn to_xml_string(&self, options: &WriteOptions) -> Result<String, FontconfigError> {
        let mut out = Vec::new();
        self.write_to(&mut out, options)?;
        String::from_utf8(out).map_err(|e| FontconfigError::Io(e.to_string()))
    }

    /// Serialize into any writer
    pub fn write_to<W: Write>(
        &self,
        out: W,
        options: &WriteOptions,
    ) -> Result<(), FontconfigError> {
        let mut writer = Writer::new(out);

        if let Some(decl) = &self.declaration {
            writer
                .write_event(Event::Decl(BytesDecl::new(
                    &decl.version,
                    decl.encoding.as_deref(),
                    decl.standalone.as_deref(),
                )))
                .map_err(write_err)?;
            write_raw(&mut writer, "\n")?;
        }

        for child in &self.nodes[Self::ROOT.0].children {
            if self.is_whitespace_text(*child) {
                continue;
            }
            self.write_node(&mut writer, *child, 0, options)?;
            write_raw(&mut writer, "\n")?;
        }

        writer.get_mut().flush()?;
        Ok(())
    }

    fn write_node<W: Write>(
        &self,
        writer: &mut Writer<W>,
        node: NodeId,
        depth: usize,
        options: &WriteOptions,
    ) -> Result<(), FontconfigError> {
        let data = &self.nodes[node.0];
        match &data.kind {
            NodeKind::Document => {
                for child in &data.children {
                    self.write_node(writer, *child, depth, options)?;
                }
            }
            NodeKind::Element { name, attributes } => {
                let mut start = BytesStart::new(name.as_str());
                for (key, value) in attributes {
                    start.push_attribute((key.as_str(), value.as_str()));
                }
                if data.children.is_empty() {
                    return writer.write_event(Event::Empty(start)).map_err(write_err);
                }
                writer.write_event(Event::Start(start)).map_err(write_err)?;

                match options.indent {
                    Some(width) if self.is_block(node) => {
                        for child in &data.children {
                            if self.is_whitespace_text(*child) {
                                continue;
                            }
                            write_indent(writer, width, depth + 1)?;
                            self.write_node(writer, *child, depth + 1, options)?;
                        }
                        write_indent(writer, width, depth)?;
                    }
                    _ => {
                        for child in &data.children {
                            self.write_node(writer, *child, depth + 1, options)?;
                        }
                    }
                }

                writer
                    .write_event(Event::End(BytesEnd::new(name.as_str())))
                    .map_err(write_err)?;
            }
            NodeKind::Text(text) => {
                writer
                    .write_event(Event::Text(BytesText::from_escaped(partial_escape(text))))
                    .map_err(write_err)?;
            }
            NodeKind::CData(text) => {
                writer
                    .write_event(Event::CData(BytesCData::new(text.as_str())))
                    .map_err(write_err)?;
            }
            NodeKind::Comment(text) => {
                writer
                    .write_event(Event::Comment(BytesText::from_escaped(text.as_str())))
                    .map_err(write_err)?;
            }
            NodeKind::ProcessingInstruction(text) => {
                writer
                    .write_event(Event::PI(BytesPI::new(text.as_str())))
                    .map_err(write_err)?;
            }
            NodeKind::DocType(text) => {
                writer
                    .write_event(Event::DocType(BytesText::from_escaped(text.as_str())))
                    .map_err(write_err)?;
            }
        }
        Ok(())
    }

    /// Element whose only character data is indentation
    fn is_block(&self, node: NodeId) -> bool {
        let children = &self.nodes[node.0].children;
        let mut has_structure = false;
        for child in children {
            match &self.nodes[child.0].kind {
                NodeKind::Text(text) if !text.trim().is_empty() => return false,
                NodeKind::Text(_) => {}
                NodeKind::CData(_) => return false,
                _ => has_structure = true,
            }
        }
        has_structure
    }

    fn is_whitespace_text(&self, node: NodeId) -> bool {
        matches!(&self.nodes[node.0].kind, NodeKind::Text(text) if text.trim().is_empty())
    }

    fn data(&self, node: NodeId) -> Option<&NodeData> {
        self.nodes.get(node.0)
    }

    fn checked(&self, node: NodeId) -> Result<NodeId, FontconfigError> {
        if node.0 < self.nodes.len() {
            Ok(node)
        } else {
            Err(FontconfigError::InvalidNode(format!("{:?} does not exist", node)))
        }
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.nodes[id.0].parent;
        }
        false
    }

    fn check_capacity(&self, options: &ParseOptions) -> Result<(), FontconfigError> {
        if self.nodes.len() >= options.max_nodes {
            return Err(FontconfigError::LimitExceeded {
                kind: "nodes",
                limit: options.max_nodes,
            });
        }
        Ok(())
    }

    fn push_element(
        &mut self,
        e: &BytesStart,
        reader: &Reader<&[u8]>,
        parent: NodeId,
        options: &ParseOptions,
    ) -> Result<NodeId, FontconfigError> {
        if parent == Self::ROOT && self.document_element().is_some() {
            return Err(FontconfigError::Parse("multiple root elements".into()));
        }
        self.check_capacity(options)?;

        let name = decode_bytes(e.name().as_ref(), reader)?;
        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|e| FontconfigError::Parse(format!("Attr error: {:?}", e)))?;
            let key = decode_bytes(attr.key.as_ref(), reader)?;
            let raw = decode_bytes(&attr.value, reader)?;
            let value = unescape(&raw)
                .map_err(|e| FontconfigError::Parse(format!("Unescape error: {:?}", e)))?
                .to_string();
            attributes.push((key, value));
        }

        let id = self.push_node(NodeKind::Element { name, attributes });
        self.attach(parent, id);
        Ok(id)
    }

    /// Append text under `parent`, merging with a preceding text node
    fn push_text(
        &mut self,
        parent: NodeId,
        text: &str,
        options: &ParseOptions,
    ) -> Result<(), FontconfigError> {
        if text.is_empty() {
            return Ok(());
        }
        if parent == Self::ROOT {
            if text.trim().is_empty() {
                return Ok(());
            }
            return Err(FontconfigError::Parse(
                "character data outside the root element".into(),
            ));
        }
        if let Some(last) = self.nodes[parent.0].children.last().copied() {
            if let NodeKind::Text(existing) = &mut self.nodes[last.0].kind {
                existing.push_str(text);
                return Ok(());
            }
        }
        self.push_leaf(parent, NodeKind::Text(text.to_string()), options)
    }

    fn push_leaf(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        options: &ParseOptions,
    ) -> Result<(), FontconfigError> {
        self.check_capacity(options)?;
        let id = self.push_node(kind);
        self.attach(parent, id);
        Ok(())
    }
}

impl XmlTree for Document {
    type Node = NodeId;

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.data(node)
            .map(|data| data.children.clone())
            .unwrap_or_default()
    }

    fn has_attributes(&self, node: NodeId) -> bool {
        matches!(
            self.data(node).map(|data| &data.kind),
            Some(NodeKind::Element { attributes, .. }) if !attributes.is_empty()
        )
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.data(node)?.kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        match &self.data(node)?.kind {
            NodeKind::Element { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        collect_text(self, node, &mut out);
        out
    }
}

impl XmlTreeMut for Document {
    fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(NodeKind::Element {
            name: tag.to_string(),
            attributes: Vec::new(),
        })
    }

    fn set_attribute(
        &mut self,
        node: NodeId,
        name: &str,
        value: &str,
    ) -> Result<(), FontconfigError> {
        let node = self.checked(node)?;
        let NodeKind::Element { attributes, .. } = &mut self.nodes[node.0].kind else {
            return Err(FontconfigError::InvalidNode(format!(
                "{:?} is not an element",
                node
            )));
        };
        match attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => attributes.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    fn set_text_content(&mut self, node: NodeId, text: &str) -> Result<(), FontconfigError> {
        let node = self.checked(node)?;
        if !matches!(self.nodes[node.0].kind, NodeKind::Element { .. }) {
            return Err(FontconfigError::InvalidNode(format!(
                "{:?} is not an element",
                node
            )));
        }
        for child in core::mem::take(&mut self.nodes[node.0].children) {
            self.nodes[child.0].parent = None;
        }
        if !text.is_empty() {
            let id = self.push_node(NodeKind::Text(text.to_string()));
            self.attach(node, id);
        }
        Ok(())
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), FontconfigError> {
        let parent = self.checked(parent)?;
        let child = self.checked(child)?;
        if !matches!(
            self.nodes[parent.0].kind,
            NodeKind::Element { .. } | NodeKind::Document
        ) {
            return Err(FontconfigError::InvalidNode(format!(
                "{:?} cannot have children",
                parent
            )));
        }
        if child == Self::ROOT || self.is_ancestor_or_self(child, parent) {
            return Err(FontconfigError::InvalidNode(format!(
                "appending {:?} under {:?} would create a cycle",
                child, parent
            )));
        }
        if let Some(old) = self.nodes[child.0].parent {
            self.nodes[old.0].children.retain(|id| *id != child);
        }
        self.attach(parent, child);
        Ok(())
    }

    fn root_element(&self, tag: &str) -> Option<NodeId> {
        self.document_element()
            .filter(|root| self.tag_name(*root) == Some(tag))
    }
}

fn collect_text(doc: &Document, node: NodeId, out: &mut String) {
    let Some(data) = doc.data(node) else {
        return;
    };
    match &data.kind {
        NodeKind::Text(text) | NodeKind::CData(text) => out.push_str(text),
        NodeKind::Element { .. } | NodeKind::Document => {
            for child in &data.children {
                collect_text(doc, *child, out);
            }
        }
        _ => {}
    }
}

fn read_declaration(e: &BytesDecl) -> Result<Declaration, FontconfigError> {
    fn text(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    let version = e
        .version()
        .map_err(|e| FontconfigError::Parse(format!("Declaration error: {:?}", e)))?;
    let encoding = match e.encoding() {
        Some(Ok(value)) => Some(text(value.as_ref())),
        Some(Err(err)) => {
            return Err(FontconfigError::Parse(format!(
                "Declaration error: {:?}",
                err
            )))
        }
        None => None,
    };
    let standalone = match e.standalone() {
        Some(Ok(value)) => Some(text(value.as_ref())),
        Some(Err(err)) => {
            return Err(FontconfigError::Parse(format!(
                "Declaration error: {:?}",
                err
            )))
        }
        None => None,
    };
    Ok(Declaration {
        version: text(version.as_ref()),
        encoding,
        standalone,
    })
}

fn decode_bytes(bytes: &[u8], reader: &Reader<&[u8]>) -> Result<String, FontconfigError> {
    reader
        .decoder()
        .decode(bytes)
        .map_err(|e| FontconfigError::Parse(format!("Decode error: {:?}", e)))
        .map(|s| s.to_string())
}

fn write_indent<W: Write>(
    writer: &mut Writer<W>,
    width: usize,
    depth: usize,
) -> Result<(), FontconfigError> {
    let mut pad = String::with_capacity(1 + width * depth);
    pad.push('\n');
    pad.extend(core::iter::repeat_n(' ', width * depth));
    write_raw(writer, &pad)
}

fn write_raw<W: Write>(writer: &mut Writer<W>, text: &str) -> Result<(), FontconfigError> {
    writer
        .write_event(Event::Text(BytesText::from_escaped(text)))
        .map_err(write_err)
}

fn write_err<E: core::fmt::Display>(err: E) -> FontconfigError {
    FontconfigError::Io(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE fontconfig SYSTEM "urn:fontconfig:fonts.dtd">
<fontconfig>
  <!-- Prefer Noto for Arial -->
  <match target="pattern">
    <test name="family"><string>Arial</string></test>
    <edit name="family" binding="strong" mode="prepend">
      <string>Noto Sans</string>
    </edit>
  </match>
  <dir>~/.fonts</dir>
</fontconfig>
"#;

    #[test]
    fn test_parse_sample() {
        let doc = Document::parse(SAMPLE.as_bytes()).unwrap();
        let root = doc.document_element().unwrap();
        assert_eq!(doc.tag_name(root), Some("fontconfig"));
        assert_eq!(doc.element_children(root).len(), 2);

        let decl = doc.declaration().unwrap();
        assert_eq!(decl.version, "1.0");
        assert_eq!(decl.encoding.as_deref(), Some("UTF-8"));
    }

    #[test]
    fn test_preserve_round_trip() {
        let doc = Document::parse(SAMPLE.as_bytes()).unwrap();
        let out = doc.to_xml_string(&WriteOptions::preserve()).unwrap();
        assert_eq!(out, SAMPLE);
    }

    #[test]
    fn test_pretty_output_of_built_elements() {
        let mut doc = Document::new_fontconfig();
        let root = doc.document_element().unwrap();
        let dir = doc.create_element("dir");
        doc.set_text_content(dir, "/usr/share/fonts").unwrap();
        doc.append_child(root, dir).unwrap();

        let out = doc.to_xml_string(&WriteOptions::default()).unwrap();
        assert_eq!(
            out,
            "<?xml version=\"1.0\"?>\n\
             <!DOCTYPE fontconfig SYSTEM \"urn:fontconfig:fonts.dtd\">\n\
             <fontconfig>\n  <dir>/usr/share/fonts</dir>\n</fontconfig>\n"
        );
    }

    #[test]
    fn test_new_fontconfig_has_empty_root() {
        let doc = Document::new_fontconfig();
        let root = doc.root_element("fontconfig").unwrap();
        assert!(doc.children(root).is_empty());
        let out = doc.to_xml_string(&WriteOptions::default()).unwrap();
        assert!(out.ends_with("<fontconfig/>\n"));
    }

    #[test]
    fn test_entities_resolved_and_escaped() {
        let doc = Document::parse(
            br#"<fontconfig><alias note="a &amp; b"><family>Foo &amp; Bar &#x41;</family></alias></fontconfig>"#,
        )
        .unwrap();
        let root = doc.document_element().unwrap();
        let alias = doc.element_children(root)[0];
        assert_eq!(doc.attribute(alias, "note"), Some("a & b"));
        assert_eq!(doc.text_content(alias), "Foo & Bar A");

        let out = doc.to_xml_string(&WriteOptions::preserve()).unwrap();
        assert!(out.contains("Foo &amp; Bar A"));
        assert!(out.contains(r#"note="a &amp; b""#));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            Document::parse(b"<fontconfig><match></fontconfig>"),
            Err(FontconfigError::Parse(_))
        ));
        assert!(matches!(
            Document::parse(b"<fontconfig>"),
            Err(FontconfigError::Parse(_))
        ));
        assert!(matches!(
            Document::parse(b"<a/><b/>"),
            Err(FontconfigError::Parse(_))
        ));
        assert!(matches!(
            Document::parse(b"   "),
            Err(FontconfigError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_limits() {
        let deep = b"<a><b><c><d/></c></b></a>";
        let err = Document::parse_with_options(deep, ParseOptions::default().with_max_depth(2))
            .unwrap_err();
        assert_eq!(
            err,
            FontconfigError::LimitExceeded {
                kind: "depth",
                limit: 2
            }
        );

        let err = Document::parse_with_options(deep, ParseOptions::default().with_max_nodes(3))
            .unwrap_err();
        assert!(matches!(err, FontconfigError::LimitExceeded { kind: "nodes", .. }));
    }

    #[test]
    fn test_append_child_rejects_cycles() {
        let mut doc = Document::new_fontconfig();
        let root = doc.document_element().unwrap();
        let a = doc.create_element("match");
        doc.append_child(root, a).unwrap();
        assert!(doc.append_child(a, root).is_err());
        assert!(doc.append_child(a, a).is_err());
    }

    #[test]
    fn test_append_child_moves_node() {
        let mut doc = Document::new_fontconfig();
        let root = doc.document_element().unwrap();
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        doc.append_child(root, a).unwrap();
        doc.append_child(root, b).unwrap();
        doc.append_child(b, a).unwrap();
        assert_eq!(doc.children(root), vec![b]);
        assert_eq!(doc.parent(a), Some(b));
    }

    #[test]
    fn test_replace_child_keeps_position() {
        let mut doc = Document::parse(b"<fontconfig>\n  <a/>\n  <b/>\n</fontconfig>").unwrap();
        let root = doc.document_element().unwrap();
        let a = doc.element_children(root)[0];
        let c = doc.create_element("c");
        doc.replace_child(root, a, c).unwrap();
        assert_eq!(doc.parent(a), None);
        assert_eq!(doc.parent(c), Some(root));
        let out = doc.to_xml_string(&WriteOptions::preserve()).unwrap();
        assert_eq!(out, "<fontconfig>\n  <c/>\n  <b/>\n</fontconfig>\n");
        assert!(doc.replace_child(root, a, c).is_err());
        assert!(doc.replace_child(c, c, root).is_err());
    }

    #[test]
    fn test_read_side_tolerates_foreign_handles() {
        let doc = Document::new_fontconfig();
        let foreign = NodeId(10_000);
        assert!(doc.children(foreign).is_empty());
        assert!(doc.element_children(foreign).is_empty());
        assert!(!doc.has_attributes(foreign));
        assert_eq!(doc.attribute(foreign, "name"), None);
        assert_eq!(doc.tag_name(foreign), None);
        assert_eq!(doc.text_content(foreign), "");
        assert_eq!(doc.parent(foreign), None);
    }

    #[test]
    fn test_set_attribute_overwrites() {
        let mut doc = Document::new();
        let el = doc.create_element("edit");
        doc.set_attribute(el, "mode", "append").unwrap();
        doc.set_attribute(el, "mode", "prepend").unwrap();
        assert_eq!(doc.attribute(el, "mode"), Some("prepend"));
        assert!(doc.has_attributes(el));
    }

    #[test]
    fn test_remove_child_drops_leading_whitespace() {
        let mut doc = Document::parse(b"<fontconfig>\n  <a/>\n  <b/>\n</fontconfig>").unwrap();
        let root = doc.document_element().unwrap();
        let a = doc.element_children(root)[0];
        doc.remove_child(root, a).unwrap();
        assert_eq!(doc.parent(a), None);
        let out = doc.to_xml_string(&WriteOptions::preserve()).unwrap();
        assert_eq!(out, "<fontconfig>\n  <b/>\n</fontconfig>\n");
        assert!(doc.remove_child(root, a).is_err());
    }

    #[test]
    fn test_text_content_skips_comments() {
        let doc = Document::parse(b"<s>a<!-- x -->b<![CDATA[<c>]]></s>").unwrap();
        let root = doc.document_element().unwrap();
        assert_eq!(doc.text_content(root), "ab<c>");
    }

    #[test]
    fn test_root_element_checks_tag() {
        let doc = Document::parse(b"<other/>").unwrap();
        assert!(doc.root_element("fontconfig").is_none());
        assert!(doc.root_element("other").is_some());
    }
}
