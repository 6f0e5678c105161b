//! Error types for linch-pptx-rs

use thiserror::Error;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Part not found: {0}")]
    PartNotFound(String),

    #[error("Counter {0} not found")]
    CounterNotFound(String),

    #[error("Relationship '{id}' referenced from {part} is not declared")]
    RelationshipUnresolved { part: String, id: String },

    #[error("Graft incomplete: {dependency} required by {part} is missing")]
    GraftIncomplete { part: String, dependency: String },

    #[error("Reorder index {index} is out of range for a collection of {len}")]
    InvalidReorderIndex { index: usize, len: usize },

    #[error("Shape '{name}' not found on slide {slide}")]
    ShapeNotFound { slide: u32, name: String },

    #[error("Invalid part URI: {0}")]
    InvalidPartUri(String),

    #[error("Missing attribute '{attr}' on element '{element}'")]
    MissingAttribute { element: String, attr: String },

    #[error("Assertion failed on {file}: {message}")]
    AssertionFailed { file: String, message: String },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
