//! XML tree utilities shared by every part of a package

mod namespace;
mod raw;

pub use namespace::*;
pub use raw::{NodePath, RawXmlElement, RawXmlNode, XmlDocument};

/// Parse the numeric part of an id such as `rId12`, ignoring any decoration
pub fn numeric_id(value: &str) -> Option<u32> {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
