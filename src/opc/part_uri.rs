//! Part URI handling for OPC packages

use crate::error::{Error, Result};
use std::fmt;

/// Represents a URI to a part within an OPC package.
///
/// Part URIs are always absolute paths starting with '/'.
/// Example: `/ppt/slides/slide1.xml`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartUri {
    path: String,
}

impl PartUri {
    /// Create a new PartUri from a string.
    ///
    /// The path will be normalized (leading '/' ensured, no trailing '/').
    pub fn new(path: &str) -> Result<Self> {
        let path = path.trim();

        if path.is_empty() {
            return Err(Error::InvalidPartUri("empty path".into()));
        }

        let normalized = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        let normalized = normalized.trim_end_matches('/').to_string();

        if normalized.is_empty() {
            return Err(Error::InvalidPartUri(format!("invalid path '{}'", path)));
        }

        if normalized.contains("//") {
            return Err(Error::InvalidPartUri(format!(
                "invalid path '{}': contains double slashes",
                path
            )));
        }

        Ok(Self { path: normalized })
    }

    /// Get the path as a string slice
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Path as stored in the ZIP container (no leading '/')
    pub fn zip_path(&self) -> &str {
        &self.path[1..]
    }

    /// Get the file name portion
    pub fn file_name(&self) -> Option<&str> {
        self.path.rsplit('/').next()
    }

    /// Get the file extension
    pub fn extension(&self) -> Option<&str> {
        self.file_name()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
    }

    /// Get the parent directory URI
    pub fn parent(&self) -> Option<PartUri> {
        let pos = self.path.rfind('/')?;
        if pos == 0 {
            None
        } else {
            Some(PartUri {
                path: self.path[..pos].to_string(),
            })
        }
    }

    /// Directory of the part in ZIP form (`ppt/slides`), empty at the package root
    pub fn directory(&self) -> &str {
        match self.zip_path().rfind('/') {
            Some(pos) => &self.zip_path()[..pos],
            None => "",
        }
    }

    /// Get the relationships URI for this part.
    ///
    /// For `/ppt/slides/slide1.xml`, returns `/ppt/slides/_rels/slide1.xml.rels`
    pub fn relationships_uri(&self) -> PartUri {
        let file_name = self.file_name().unwrap_or("");
        let parent = self.parent().map(|p| p.path).unwrap_or_default();

        let rels_path = format!("{}/_rels/{}.rels", parent, file_name);
        PartUri { path: rels_path }
    }

    /// The part a relationships file belongs to.
    ///
    /// For `/ppt/slides/_rels/slide1.xml.rels`, returns `/ppt/slides/slide1.xml`.
    /// Package-level relationships (`/_rels/.rels`) have no source part.
    pub fn relationships_source(&self) -> Option<PartUri> {
        if !self.is_relationships() {
            return None;
        }
        let file_name = self.file_name()?.strip_suffix(".rels")?;
        if file_name.is_empty() {
            return None;
        }
        let rels_dir = self.parent()?;
        let dir = rels_dir.parent().map(|p| p.path).unwrap_or_default();
        Some(PartUri {
            path: format!("{}/{}", dir, file_name),
        })
    }

    /// Resolve a relative path against this URI.
    ///
    /// For `/ppt/slides/slide1.xml` and `../media/image1.png`, returns `/ppt/media/image1.png`
    pub fn resolve(&self, relative: &str) -> Result<PartUri> {
        // Targets may carry a fragment (`slide2.xml#id`); part names never do.
        let relative = relative.split('#').next().unwrap_or(relative);

        if relative.starts_with('/') {
            return PartUri::new(relative);
        }

        let base_dir = self.parent().map(|p| p.path).unwrap_or_default();
        let mut parts: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();

        for segment in relative.split('/') {
            match segment {
                "" | "." => continue,
                ".." => {
                    parts.pop();
                }
                s => parts.push(s),
            }
        }

        let resolved = format!("/{}", parts.join("/"));
        PartUri::new(&resolved)
    }

    /// Check if this URI points to a relationships file
    pub fn is_relationships(&self) -> bool {
        self.path.contains("_rels/") && self.path.ends_with(".rels")
    }
}

impl fmt::Display for PartUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

impl std::str::FromStr for PartUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        PartUri::new(s)
    }
}

/// A file name split into its instance numbering
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileNameParts {
    /// Name without the trailing number and extension (`image` for `image3.png`)
    pub base: String,
    /// Trailing number, `0` when the name carries none
    pub number: u32,
    /// Extension without the dot, empty when there is none
    pub extension: String,
}

/// Split a file name into base, trailing number and extension.
///
/// `image3.png` gives `("image", 3, "png")`. A name without trailing digits gets
/// number `0`; the base always keeps at least one character, so `42.xml` gives
/// `("4", 2, "xml")`.
pub fn decompose_file_name(file_name: &str) -> FileNameParts {
    let file_name = file_name.rsplit('/').next().unwrap_or(file_name);
    let (stem, extension) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, ext),
        _ => (file_name, ""),
    };

    let digits = stem
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .count()
        .min(stem.len().saturating_sub(1));
    let (base, number) = stem.split_at(stem.len() - digits);

    FileNameParts {
        base: base.to_string(),
        number: number.parse().unwrap_or(0),
        extension: extension.to_string(),
    }
}

/// Well-known part paths in PresentationML packages (ZIP form)
pub mod well_known {
    pub const CONTENT_TYPES: &str = "[Content_Types].xml";
    pub const PACKAGE_RELS: &str = "_rels/.rels";
    pub const PRESENTATION: &str = "ppt/presentation.xml";
    pub const PRESENTATION_RELS: &str = "ppt/_rels/presentation.xml.rels";
    pub const SLIDES_DIR: &str = "ppt/slides";
    pub const SLIDE_LAYOUTS_DIR: &str = "ppt/slideLayouts";
    pub const SLIDE_MASTERS_DIR: &str = "ppt/slideMasters";
    pub const CHARTS_DIR: &str = "ppt/charts";
    pub const MEDIA_DIR: &str = "ppt/media";
    pub const EMBEDDINGS_DIR: &str = "ppt/embeddings";

    pub fn slide(number: u32) -> String {
        format!("ppt/slides/slide{}.xml", number)
    }

    pub fn slide_rels(number: u32) -> String {
        format!("ppt/slides/_rels/slide{}.xml.rels", number)
    }

    pub fn chart(base: &str, number: u32) -> String {
        format!("ppt/charts/{}{}.xml", base, number)
    }

    pub fn chart_rels(base: &str, number: u32) -> String {
        format!("ppt/charts/_rels/{}{}.xml.rels", base, number)
    }
}
