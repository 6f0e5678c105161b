//! Archive: a virtual filesystem over a ZIP container
//!
//! Parts are kept as raw bytes until first parsed; a parsed tree stays authoritative
//! for its path until the archive is serialized.

use crate::error::{Error, Result};
use crate::opc::part_uri::well_known;
use crate::opc::Part;
use crate::xml::XmlDocument;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::Path;
use zip::read::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

/// An OPC container (PPTX, or an embedded XLSX) held in memory
#[derive(Clone, Debug, Default)]
pub struct Archive {
    /// Label used in diagnostics (file name or nested part path)
    label: String,
    /// All parts by container path
    parts: BTreeMap<String, Part>,
}

/// A file listed from an archive directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchivedFile {
    /// Full path inside the container
    pub name: String,
    /// Path relative to the listed directory
    pub relative_path: String,
}

/// Serialization options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OutputOptions {
    /// `None` deflates at the default level, `Some(0)` stores, `Some(n)` deflates at level `n`
    pub compression_level: Option<i64>,
}

impl OutputOptions {
    /// Options with an explicit compression level
    pub fn with_compression(level: i64) -> Self {
        Self {
            compression_level: Some(level),
        }
    }

    fn file_options(&self) -> SimpleFileOptions {
        match self.compression_level {
            Some(0) => SimpleFileOptions::default().compression_method(CompressionMethod::Stored),
            level => SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(level),
        }
    }
}

impl Archive {
    /// Create a new empty archive
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            parts: BTreeMap::new(),
        }
    }

    /// Open an archive from a file path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let label = path.as_ref().display().to_string();
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Self::from_reader(label, reader)
    }

    /// Open an archive from bytes
    pub fn from_bytes(label: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        Self::from_reader(label, Cursor::new(bytes))
    }

    /// Open an archive from a reader
    pub fn from_reader<R: Read + Seek>(label: impl Into<String>, reader: R) -> Result<Self> {
        let mut zip = ZipArchive::new(reader)?;
        let mut archive = Self::new(label);

        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();

            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            archive.parts.insert(name.clone(), Part::new(name, data));
        }

        log::debug!("loaded {} parts from {}", archive.parts.len(), archive.label);
        Ok(archive)
    }

    /// Label used in diagnostics
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Current bytes of a part
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        Ok(self.part(path)?.data()?.into_owned())
    }

    /// Parsed copy of a part that leaves the archive untouched.
    ///
    /// Used for read-only access to source archives.
    pub fn xml(&self, path: &str) -> Result<XmlDocument> {
        self.part(path)?.to_xml()
    }

    /// The live tree of a part, parsed and cached on first read.
    ///
    /// Repeated reads of one path return the same tree, so edits accumulate until
    /// the archive is serialized.
    pub fn read_xml(&mut self, path: &str) -> Result<&mut XmlDocument> {
        let key = normalize(path);
        self.parts
            .get_mut(key)
            .ok_or_else(|| Error::PartNotFound(key.to_string()))?
            .xml_mut()
    }

    /// Make `doc` the authoritative content of `path`
    pub fn write_xml(&mut self, path: &str, doc: XmlDocument) {
        let key = normalize(path).to_string();
        match self.parts.get_mut(&key) {
            Some(part) => part.set_xml(doc),
            None => {
                self.parts.insert(key.clone(), Part::from_xml(key, doc));
            }
        }
    }

    /// Write raw bytes, creating the part if needed
    pub fn write(&mut self, path: &str, data: Vec<u8>) {
        let key = normalize(path).to_string();
        match self.parts.get_mut(&key) {
            Some(part) => part.set_data(data),
            None => {
                self.parts.insert(key.clone(), Part::new(key, data));
            }
        }
    }

    /// Remove a part; returns whether it existed
    pub fn remove(&mut self, path: &str) -> bool {
        self.parts.remove(normalize(path)).is_some()
    }

    /// Whether a part exists
    pub fn exists(&self, path: &str) -> bool {
        self.parts.contains_key(normalize(path))
    }

    /// Direct children of a directory (not recursive)
    pub fn list(&self, dir: &str) -> Vec<ArchivedFile> {
        let dir = normalize(dir).trim_end_matches('/');
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{}/", dir)
        };

        self.parts
            .keys()
            .filter_map(|name| {
                let relative = name.strip_prefix(prefix.as_str())?;
                if relative.is_empty() || relative.contains('/') {
                    return None;
                }
                Some(ArchivedFile {
                    name: name.clone(),
                    relative_path: relative.to_string(),
                })
            })
            .collect()
    }

    /// Part names matching a predicate
    pub fn filter<F>(&self, predicate: F) -> Vec<&str>
    where
        F: Fn(&str) -> bool,
    {
        self.parts
            .keys()
            .map(String::as_str)
            .filter(|name| predicate(name))
            .collect()
    }

    /// Number of parts matching a predicate
    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        self.filter(predicate).len()
    }

    /// Iterate over all part names
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    /// Open a part that is itself a container (an embedded workbook)
    pub fn extract(&self, path: &str) -> Result<Archive> {
        let data = self.read(path)?;
        Archive::from_bytes(normalize(path), &data)
    }

    /// Serialize the archive to bytes
    pub fn to_bytes(&self, options: &OutputOptions) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_to(&mut cursor, options)?;
        Ok(cursor.into_inner())
    }

    /// Save the archive to a file
    pub fn save<P: AsRef<Path>>(&self, path: P, options: &OutputOptions) -> Result<()> {
        let file = File::create(path)?;
        self.write_to(file, options)
    }

    /// Write the archive to a writer; `[Content_Types].xml` goes first
    pub fn write_to<W: Write + Seek>(&self, writer: W, options: &OutputOptions) -> Result<()> {
        let mut zip = ZipWriter::new(writer);
        let file_options = options.file_options();

        let ordered = self
            .parts
            .get(well_known::CONTENT_TYPES)
            .into_iter()
            .chain(
                self.parts
                    .iter()
                    .filter(|(name, _)| name.as_str() != well_known::CONTENT_TYPES)
                    .map(|(_, part)| part),
            );

        for part in ordered {
            zip.start_file(part.name(), file_options)?;
            zip.write_all(&part.data()?)?;
        }

        zip.finish()?;
        Ok(())
    }

    fn part(&self, path: &str) -> Result<&Part> {
        let key = normalize(path);
        self.parts
            .get(key)
            .ok_or_else(|| Error::PartNotFound(key.to_string()))
    }
}

fn normalize(path: &str) -> &str {
    path.trim_start_matches('/')
}
