//! Raw XML tree used for every part the engine reads or rewrites

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::BufRead;

use crate::error::{Error, Result};

/// Position of an element inside a tree, as child indices from the root.
///
/// The empty path addresses the root element itself.
pub type NodePath = Vec<usize>;

/// Raw XML node
#[derive(Clone, Debug, PartialEq)]
pub enum RawXmlNode {
    /// Element node
    Element(RawXmlElement),
    /// Text node
    Text(String),
    /// CDATA section
    CData(String),
    /// Comment node
    Comment(String),
}

/// Raw XML element with attributes and children
#[derive(Clone, Debug, PartialEq)]
pub struct RawXmlElement {
    /// Full element name (with prefix, e.g., "p:sldId")
    pub name: String,
    /// Attributes as (name, value) pairs, unescaped
    pub attributes: Vec<(String, String)>,
    /// Child nodes
    pub children: Vec<RawXmlNode>,
    /// Whether this was a self-closing element
    pub self_closing: bool,
}

/// A parsed XML part: declaration flags plus the root element
#[derive(Clone, Debug, PartialEq)]
pub struct XmlDocument {
    /// `standalone` value of the XML declaration, if one was present
    pub standalone: Option<String>,
    /// Document element
    pub root: RawXmlElement,
}

impl XmlDocument {
    /// Create a document around a root element
    pub fn new(root: RawXmlElement) -> Self {
        Self {
            standalone: Some("yes".into()),
            root,
        }
    }

    /// Parse a complete document from bytes
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        let mut buf = Vec::new();
        let mut standalone = None;
        let mut root = None;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Decl(decl) => {
                    if let Some(Ok(value)) = decl.standalone() {
                        standalone = Some(String::from_utf8_lossy(&value).to_string());
                    }
                }
                Event::Start(e) if root.is_none() => {
                    root = Some(RawXmlElement::from_reader(&mut reader, &e)?);
                }
                Event::Empty(e) if root.is_none() => {
                    root = Some(RawXmlElement::from_empty(&e));
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        let root = root.ok_or_else(|| Error::InvalidDocument("no document element".into()))?;
        Ok(Self { standalone, root })
    }

    /// Serialize the document, declaration included
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new(
            "1.0",
            Some("UTF-8"),
            self.standalone.as_deref(),
        )))?;
        self.root.write_to(&mut writer)?;
        Ok(writer.into_inner())
    }

    /// All elements named `name` in document order (root included)
    pub fn elements_by_tag(&self, name: &str) -> Vec<&RawXmlElement> {
        self.root.find_all(name)
    }
}

impl RawXmlElement {
    /// Create a new empty element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            self_closing: true,
        }
    }

    /// Read a complete element from XML reader (starting after the start tag was read)
    pub fn from_reader<R: BufRead>(reader: &mut Reader<R>, start: &BytesStart) -> Result<Self> {
        let name = String::from_utf8_lossy(start.name().as_ref()).to_string();
        let attributes = read_attributes(start);

        let mut children = Vec::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    let child = Self::from_reader(reader, &e)?;
                    children.push(RawXmlNode::Element(child));
                }
                Event::Empty(e) => {
                    children.push(RawXmlNode::Element(Self::from_empty(&e)));
                }
                Event::Text(t) => {
                    let text = t.unescape()?.to_string();
                    if !text.is_empty() {
                        children.push(RawXmlNode::Text(text));
                    }
                }
                Event::CData(c) => {
                    children.push(RawXmlNode::CData(
                        String::from_utf8_lossy(&c.into_inner()).to_string(),
                    ));
                }
                Event::Comment(c) => {
                    children.push(RawXmlNode::Comment(String::from_utf8_lossy(&c).to_string()));
                }
                Event::End(e) => {
                    let end_name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    if end_name == name {
                        break;
                    }
                }
                Event::Eof => return Err(Error::InvalidDocument("Unexpected EOF".into())),
                _ => {}
            }
            buf.clear();
        }

        Ok(Self {
            name,
            attributes,
            children,
            self_closing: false,
        })
    }

    /// Create from empty element tag
    pub fn from_empty(e: &BytesStart) -> Self {
        Self {
            name: String::from_utf8_lossy(e.name().as_ref()).to_string(),
            attributes: read_attributes(e),
            children: Vec::new(),
            self_closing: true,
        }
    }

    /// Write element to XML writer
    pub fn write_to<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let mut start = BytesStart::new(&self.name);
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() && self.self_closing {
            writer.write_event(Event::Empty(start))?;
        } else {
            writer.write_event(Event::Start(start))?;
            for child in &self.children {
                child.write_to(writer)?;
            }
            writer.write_event(Event::End(BytesEnd::new(&self.name)))?;
        }

        Ok(())
    }

    /// Add an attribute
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Add a child element
    pub fn with_child(mut self, child: RawXmlElement) -> Self {
        self.push_child(child);
        self
    }

    /// Add a text child
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(RawXmlNode::Text(text.into()));
        self.self_closing = false;
        self
    }

    /// Get an attribute value by qualified name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, replacing an existing value in place
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Remove an attribute
    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(key, _)| key == name)?;
        Some(self.attributes.remove(pos).1)
    }

    /// Append a child element
    pub fn push_child(&mut self, child: RawXmlElement) {
        self.children.push(RawXmlNode::Element(child));
        self.self_closing = false;
    }

    /// Insert a child element at a node index (clamped to the child count)
    pub fn insert_child(&mut self, index: usize, child: RawXmlElement) {
        let index = index.min(self.children.len());
        self.children.insert(index, RawXmlNode::Element(child));
        self.self_closing = false;
    }

    /// Direct child elements
    pub fn elements(&self) -> impl Iterator<Item = &RawXmlElement> {
        self.children.iter().filter_map(|node| match node {
            RawXmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Direct child elements, mutably
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut RawXmlElement> {
        self.children.iter_mut().filter_map(|node| match node {
            RawXmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    /// First direct child with the given name
    pub fn child(&self, name: &str) -> Option<&RawXmlElement> {
        self.elements().find(|e| e.name == name)
    }

    /// First direct child with the given name, mutably
    pub fn child_mut(&mut self, name: &str) -> Option<&mut RawXmlElement> {
        self.elements_mut().find(|e| e.name == name)
    }

    /// Node indices of the direct children named `name`
    pub fn child_positions(&self, name: &str) -> Vec<usize> {
        self.children
            .iter()
            .enumerate()
            .filter_map(|(i, node)| match node {
                RawXmlNode::Element(e) if e.name == name => Some(i),
                _ => None,
            })
            .collect()
    }

    /// All elements named `name` in document order, this element included
    pub fn find_all(&self, name: &str) -> Vec<&RawXmlElement> {
        let mut out = Vec::new();
        self.collect_named(name, &mut out);
        out
    }

    fn collect_named<'a>(&'a self, name: &str, out: &mut Vec<&'a RawXmlElement>) {
        if self.name == name {
            out.push(self);
        }
        for child in self.elements() {
            child.collect_named(name, out);
        }
    }

    /// First element named `name` in document order
    pub fn find_first(&self, name: &str) -> Option<&RawXmlElement> {
        if self.name == name {
            return Some(self);
        }
        self.elements().find_map(|child| child.find_first(name))
    }

    /// First element named `name` in document order, mutably
    pub fn find_first_mut(&mut self, name: &str) -> Option<&mut RawXmlElement> {
        let path = self.find_paths(name).into_iter().next()?;
        self.at_path_mut(&path)
    }

    /// Paths of all elements named `name` in document order
    pub fn find_paths(&self, name: &str) -> Vec<NodePath> {
        self.find_paths_where(|e| e.name == name)
    }

    /// Paths of all elements matching `predicate` in document order
    pub fn find_paths_where<F>(&self, predicate: F) -> Vec<NodePath>
    where
        F: Fn(&RawXmlElement) -> bool,
    {
        let mut out = Vec::new();
        let mut prefix = Vec::new();
        self.collect_paths(&predicate, &mut prefix, &mut out);
        out
    }

    fn collect_paths<F>(&self, predicate: &F, prefix: &mut NodePath, out: &mut Vec<NodePath>)
    where
        F: Fn(&RawXmlElement) -> bool,
    {
        if predicate(self) {
            out.push(prefix.clone());
        }
        for (i, node) in self.children.iter().enumerate() {
            if let RawXmlNode::Element(e) = node {
                prefix.push(i);
                e.collect_paths(predicate, prefix, out);
                prefix.pop();
            }
        }
    }

    /// Element at `path`
    pub fn at_path(&self, path: &[usize]) -> Option<&RawXmlElement> {
        let mut current = self;
        for &index in path {
            current = match current.children.get(index)? {
                RawXmlNode::Element(e) => e,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Element at `path`, mutably
    pub fn at_path_mut(&mut self, path: &[usize]) -> Option<&mut RawXmlElement> {
        let mut current = self;
        for &index in path {
            current = match current.children.get_mut(index)? {
                RawXmlNode::Element(e) => e,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Detach the element at `path` from its parent.
    ///
    /// Detaching shifts later siblings; callers removing several paths must go in
    /// reverse document order.
    pub fn detach(&mut self, path: &[usize]) -> Option<RawXmlElement> {
        let (&last, parent_path) = path.split_last()?;
        let parent = self.at_path_mut(parent_path)?;
        if !matches!(parent.children.get(last), Some(RawXmlNode::Element(_))) {
            return None;
        }
        match parent.children.remove(last) {
            RawXmlNode::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Replace the element at `path`, returning the previous one
    pub fn replace_at(&mut self, path: &[usize], element: RawXmlElement) -> Option<RawXmlElement> {
        let target = self.at_path_mut(path)?;
        Some(std::mem::replace(target, element))
    }

    /// Concatenated text of this element and its descendants
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                RawXmlNode::Text(t) | RawXmlNode::CData(t) => out.push_str(t),
                RawXmlNode::Element(e) => e.collect_text(out),
                RawXmlNode::Comment(_) => {}
            }
        }
    }

    /// Replace all children with a single text node
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![RawXmlNode::Text(text.into())];
        self.self_closing = false;
    }
}

impl RawXmlNode {
    /// Write node to XML writer
    pub fn write_to<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        match self {
            RawXmlNode::Element(e) => e.write_to(writer),
            RawXmlNode::Text(t) => {
                writer.write_event(Event::Text(BytesText::new(t)))?;
                Ok(())
            }
            RawXmlNode::CData(t) => {
                writer.write_event(Event::CData(BytesCData::new(t.as_str())))?;
                Ok(())
            }
            RawXmlNode::Comment(c) => {
                writer.write_event(Event::Comment(BytesText::from_escaped(c.as_str())))?;
                Ok(())
            }
        }
    }
}

fn read_attributes(start: &BytesStart) -> Vec<(String, String)> {
    start
        .attributes()
        .filter_map(|a| a.ok())
        .map(|a| {
            let key = String::from_utf8_lossy(a.key.as_ref()).to_string();
            let value = a
                .unescape_value()
                .map(|v| v.to_string())
                .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).to_string());
            (key, value)
        })
        .collect()
}
