//! XML namespaces used in PresentationML packages

/// PresentationML main namespace
pub const P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
/// Relationships namespace (for `r:id` attributes)
pub const R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
/// DrawingML main namespace
pub const A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
/// DrawingML chart namespace
pub const C: &str = "http://schemas.openxmlformats.org/drawingml/2006/chart";
/// SpreadsheetML main namespace
pub const SSML: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
/// Content Types namespace
pub const CT: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
/// Package Relationships namespace
pub const PR: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
