//! Content Types handling for OPC packages
//!
//! Read view over `[Content_Types].xml` plus the content types the engine registers.

use crate::error::{Error, Result};
use crate::opc::PartUri;
use crate::xml::{RawXmlElement, XmlDocument};
use std::collections::HashMap;

/// Content types definition for an OPC package
#[derive(Clone, Debug, Default)]
pub struct ContentTypes {
    /// Default extension mappings (extension -> content type)
    defaults: HashMap<String, String>,
    /// Override mappings (part URI -> content type)
    overrides: HashMap<PartUri, String>,
}

impl ContentTypes {
    /// Parse from XML bytes
    pub fn from_xml(xml: &[u8]) -> Result<Self> {
        let doc = XmlDocument::parse(xml)?;
        Self::from_document(&doc)
    }

    /// Read `Default` and `Override` declarations from a parsed registry
    pub fn from_document(doc: &XmlDocument) -> Result<Self> {
        let mut ct = Self::default();

        for element in doc.root.elements() {
            match element.name.as_str() {
                "Default" => {
                    let ext = get_attr(element, "Extension")?;
                    let content_type = get_attr(element, "ContentType")?;
                    ct.defaults.insert(ext.to_lowercase(), content_type);
                }
                "Override" => {
                    let part_name = get_attr(element, "PartName")?;
                    let content_type = get_attr(element, "ContentType")?;
                    ct.overrides.insert(PartUri::new(&part_name)?, content_type);
                }
                _ => {}
            }
        }

        Ok(ct)
    }

    /// Get the content type for a part
    pub fn get(&self, uri: &PartUri) -> Option<&str> {
        if let Some(ct) = self.overrides.get(uri) {
            return Some(ct);
        }

        uri.extension()
            .and_then(|ext| self.defaults.get(&ext.to_lowercase()))
            .map(|s| s.as_str())
    }

    /// The override declared for a part, ignoring defaults
    pub fn override_for(&self, uri: &PartUri) -> Option<&str> {
        self.overrides.get(uri).map(|s| s.as_str())
    }

    /// Whether a default is declared for an extension
    pub fn has_default(&self, extension: &str) -> bool {
        self.defaults.contains_key(&extension.to_lowercase())
    }

    /// Number of overrides declaring `content_type`
    pub fn count_overrides(&self, content_type: &str) -> usize {
        self.overrides.values().filter(|ct| *ct == content_type).count()
    }
}

/// Content type for a media extension, used when registering `Default` entries
pub fn for_extension(extension: &str) -> &'static str {
    match extension.to_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "svg" => "image/svg+xml",
        "emf" => "image/x-emf",
        "wmf" => "image/x-wmf",
        "xlsx" => SPREADSHEET,
        "xml" => XML,
        "rels" => RELATIONSHIPS,
        _ => "application/octet-stream",
    }
}

fn get_attr(element: &RawXmlElement, name: &str) -> Result<String> {
    element
        .attr(name)
        .map(str::to_string)
        .ok_or_else(|| Error::MissingAttribute {
            element: element.name.clone(),
            attr: name.to_string(),
        })
}

// Well-known content types
pub const RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";
pub const XML: &str = "application/xml";
pub const SLIDE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";
pub const CHART: &str = "application/vnd.openxmlformats-officedocument.drawingml.chart+xml";
pub const CHART_EX: &str = "application/vnd.ms-office.chartex+xml";
pub const CHART_STYLE: &str = "application/vnd.ms-office.chartstyle+xml";
pub const CHART_COLOR_STYLE: &str = "application/vnd.ms-office.chartcolorstyle+xml";
pub const SPREADSHEET: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="PNG" ContentType="image/png"/>
  <Override PartName="/ppt/slides/slide1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>
  <Override PartName="/ppt/charts/chart1.xml" ContentType="application/vnd.openxmlformats-officedocument.drawingml.chart+xml"/>
  <Override PartName="/ppt/charts/chart2.xml" ContentType="application/vnd.openxmlformats-officedocument.drawingml.chart+xml"/>
</Types>"#;

    #[test]
    fn test_parse_content_types() {
        let ct = ContentTypes::from_xml(REGISTRY.as_bytes()).unwrap();

        let slide = PartUri::new("/ppt/slides/slide1.xml").unwrap();
        assert_eq!(ct.get(&slide), Some(SLIDE));
        assert_eq!(ct.override_for(&slide), Some(SLIDE));
        assert_eq!(ct.count_overrides(CHART), 2);
    }

    #[test]
    fn test_get_by_extension() {
        let ct = ContentTypes::from_xml(REGISTRY.as_bytes()).unwrap();
        let uri = PartUri::new("/ppt/media/image1.png").unwrap();
        assert_eq!(ct.get(&uri), Some("image/png"));
        assert!(ct.has_default("png"));
        assert!(ct.override_for(&uri).is_none());
    }

    #[test]
    fn test_for_extension() {
        assert_eq!(for_extension("JPG"), "image/jpeg");
        assert_eq!(for_extension("xlsx"), SPREADSHEET);
        assert_eq!(for_extension("bin"), "application/octet-stream");
    }
}
