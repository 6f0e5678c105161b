//! Open Packaging Convention (OPC) implementation
//!
//! This module handles the ZIP-based container format used by PPTX files and by the
//! workbooks embedded in their charts.

mod archive;
pub mod content_types;
mod part;
mod part_uri;
mod relationships;

pub use archive::{Archive, ArchivedFile, OutputOptions};
pub use content_types::ContentTypes;
pub use part::{Part, PartContent};
pub use part_uri::{decompose_file_name, well_known, FileNameParts, PartUri};
pub use relationships::{rel_types, type_segment, Relationship, Relationships, Target, TargetMode};
