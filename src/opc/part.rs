//! Part representation for OPC packages

use crate::error::{Error, Result};
use crate::xml::XmlDocument;
use std::borrow::Cow;

/// Stored form of a part
#[derive(Clone, Debug)]
pub enum PartContent {
    /// Bytes as read from the container or written by a copy
    Raw(Vec<u8>),
    /// Parsed tree; authoritative until the archive is serialized
    Xml(XmlDocument),
}

/// A part within an archive
#[derive(Clone, Debug)]
pub struct Part {
    /// Path inside the container, without a leading '/'
    name: String,
    /// Raw bytes or parsed tree
    content: PartContent,
}

impl Part {
    /// Create a part from raw bytes
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content: PartContent::Raw(data),
        }
    }

    /// Create a part from a parsed tree
    pub fn from_xml(name: impl Into<String>, doc: XmlDocument) -> Self {
        Self {
            name: name.into(),
            content: PartContent::Xml(doc),
        }
    }

    /// Get the part name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the part is held as a parsed tree
    pub fn is_xml(&self) -> bool {
        matches!(self.content, PartContent::Xml(_))
    }

    /// Current bytes of the part; a cached tree is serialized on the fly
    pub fn data(&self) -> Result<Cow<'_, [u8]>> {
        match &self.content {
            PartContent::Raw(data) => Ok(Cow::Borrowed(data)),
            PartContent::Xml(doc) => Ok(Cow::Owned(doc.to_bytes()?)),
        }
    }

    /// Parsed copy of the part, leaving the stored form untouched
    pub fn to_xml(&self) -> Result<XmlDocument> {
        match &self.content {
            PartContent::Raw(data) => XmlDocument::parse(data),
            PartContent::Xml(doc) => Ok(doc.clone()),
        }
    }

    /// The live tree of the part, parsing and caching it on first access
    pub fn xml_mut(&mut self) -> Result<&mut XmlDocument> {
        if let PartContent::Raw(data) = &self.content {
            let doc = XmlDocument::parse(data)?;
            self.content = PartContent::Xml(doc);
        }
        match &mut self.content {
            PartContent::Xml(doc) => Ok(doc),
            PartContent::Raw(_) => Err(Error::InvalidDocument(format!(
                "{} is held as raw bytes",
                self.name
            ))),
        }
    }

    /// Replace the content with raw bytes
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.content = PartContent::Raw(data);
    }

    /// Replace the content with a tree
    pub fn set_xml(&mut self, doc: XmlDocument) {
        self.content = PartContent::Xml(doc);
    }

    /// Collapse a cached tree back into bytes
    pub fn flush(&mut self) -> Result<()> {
        if let PartContent::Xml(doc) = &self.content {
            let data = doc.to_bytes()?;
            self.content = PartContent::Raw(data);
        }
        Ok(())
    }
}
