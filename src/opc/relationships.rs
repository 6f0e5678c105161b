//! Relationships handling for OPC packages
//!
//! Typed views over `.rels` parts. The parts themselves stay XML trees inside the
//! archive; every mutation goes through the tree.

use crate::error::{Error, Result};
use crate::opc::part_uri::{decompose_file_name, FileNameParts};
use crate::xml::{RawXmlElement, XmlDocument, PR};

/// Collection of relationships declared in one `.rels` part, in document order
#[derive(Clone, Debug, Default)]
pub struct Relationships {
    items: Vec<Relationship>,
}

/// A single relationship
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relationship {
    /// Relationship ID (e.g., "rId1")
    pub id: String,
    /// Relationship type URI
    pub rel_type: String,
    /// Target path (relative or absolute)
    pub target: String,
    /// Target mode
    pub target_mode: TargetMode,
}

/// Target mode for relationships
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TargetMode {
    /// Internal target (part within the package)
    #[default]
    Internal,
    /// External target (hyperlink, etc.)
    External,
}

/// A relationship decorated with the numbering of its target file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    /// Raw `Target` attribute
    pub file: String,
    /// Relationship ID
    pub r_id: String,
    /// Relationship type URI
    pub rel_type: String,
    /// The prefix this target was matched against
    pub prefix: String,
    /// Last segment of the prefix (`chart` for `../charts/chart`)
    pub subtype: String,
    /// File name of the target (`chart3.xml`)
    pub filename: String,
    /// Numbering of the file name
    pub parts: FileNameParts,
}

impl Relationships {
    /// Create empty relationships
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from XML bytes
    pub fn from_xml(xml: &[u8]) -> Result<Self> {
        let doc = XmlDocument::parse(xml)?;
        Self::from_document(&doc)
    }

    /// Read every `Relationship` element of a parsed `.rels` part
    pub fn from_document(doc: &XmlDocument) -> Result<Self> {
        let items = doc
            .elements_by_tag("Relationship")
            .into_iter()
            .map(Relationship::from_element)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { items })
    }

    /// A fresh, empty `.rels` document
    pub fn empty_document() -> XmlDocument {
        XmlDocument::new(RawXmlElement::new("Relationships").with_attr("xmlns", PR))
    }

    /// Get a relationship by ID
    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.id == id)
    }

    /// Get a relationship by type (returns first match)
    pub fn by_type(&self, rel_type: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.rel_type == rel_type)
    }

    /// Get all relationships of a given type
    pub fn all_by_type(&self, rel_type: &str) -> Vec<&Relationship> {
        self.items.iter().filter(|r| r.rel_type == rel_type).collect()
    }

    /// Iterate over all relationships
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.items.iter()
    }

    /// Number of relationships
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Relationship {
    /// Parse a `Relationship` element
    pub fn from_element(element: &RawXmlElement) -> Result<Self> {
        let required = |attr: &str| {
            element
                .attr(attr)
                .map(str::to_string)
                .ok_or_else(|| Error::MissingAttribute {
                    element: "Relationship".into(),
                    attr: attr.into(),
                })
        };

        let target_mode = match element.attr("TargetMode") {
            Some("External") => TargetMode::External,
            _ => TargetMode::Internal,
        };

        Ok(Relationship {
            id: required("Id")?,
            rel_type: required("Type")?,
            target: required("Target")?,
            target_mode,
        })
    }

    /// Build the `Relationship` element for this relationship
    pub fn to_element(&self) -> RawXmlElement {
        let mut element = RawXmlElement::new("Relationship")
            .with_attr("Id", self.id.as_str())
            .with_attr("Type", self.rel_type.as_str())
            .with_attr("Target", self.target.as_str());
        if self.target_mode == TargetMode::External {
            element.set_attr("TargetMode", "External");
        }
        element
    }

    /// Last path segment of the relationship type (`chart`, `image`, ...)
    pub fn kind(&self) -> &str {
        type_segment(&self.rel_type)
    }

    /// Whether the target lives inside the package
    pub fn is_internal(&self) -> bool {
        self.target_mode == TargetMode::Internal
    }
}

impl Target {
    /// Decorate a relationship element with the numbering of its target
    pub fn from_relationship(rel: &Relationship, prefix: &str) -> Self {
        let filename = rel.target.rsplit('/').next().unwrap_or(&rel.target).to_string();
        Self {
            file: rel.target.clone(),
            r_id: rel.id.clone(),
            rel_type: rel.rel_type.clone(),
            prefix: prefix.to_string(),
            subtype: type_segment(prefix).to_string(),
            parts: decompose_file_name(&filename),
            filename,
        }
    }

    /// Whether a relationship matches a target prefix.
    ///
    /// Embedded packages always match; otherwise the relationship type must end in
    /// the prefix's last segment and the target must start with the prefix.
    pub fn matches(rel: &Relationship, prefix: &str) -> bool {
        let kind = rel.kind();
        if kind == "package" {
            return true;
        }
        kind == type_segment(prefix) && rel.target.starts_with(prefix)
    }
}

/// Last `/`-separated segment of a type URI or path prefix
pub fn type_segment(value: &str) -> &str {
    value.rsplit('/').next().unwrap_or(value)
}

// Well-known relationship types
pub mod rel_types {
    pub const OFFICE_DOCUMENT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
    pub const SLIDE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
    pub const SLIDE_LAYOUT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
    pub const SLIDE_MASTER: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster";
    pub const NOTES_SLIDE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesSlide";
    pub const CHART: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/chart";
    pub const CHART_EX: &str = "http://schemas.microsoft.com/office/2014/relationships/chartEx";
    pub const CHART_STYLE: &str =
        "http://schemas.microsoft.com/office/2011/relationships/chartStyle";
    pub const CHART_COLOR_STYLE: &str =
        "http://schemas.microsoft.com/office/2011/relationships/chartColorStyle";
    pub const IMAGE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
    pub const PACKAGE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/package";
    pub const HYPERLINK: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
    pub const THEME: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme";
}
