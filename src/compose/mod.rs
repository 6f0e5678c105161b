//! Composition of a target presentation from template parts
//!
//! A [`Composition`] owns the target [`Archive`] together with the per-build
//! [`Counters`], [`ContentTracker`] and [`RelIdAllocator`]. Sources are only ever
//! read. Operations mutate the target in place and are not transactional: when a
//! step fails, the parts it already wrote stay in the archive, and the build should
//! be discarded.

pub mod cleanup;
mod counter;
pub mod file_helper;
mod slides;
mod tracker;
pub mod xml_helper;

pub use cleanup::CleanupReport;
pub use counter::{CounterKind, Counters};
pub use tracker::ContentTracker;
pub use xml_helper::{AttributeValue, HelperElement, ParentLocator, RelIdAllocator};

use std::path::Path;

use crate::error::Result;
use crate::opc::{well_known, Archive, OutputOptions, Relationship, Relationships};
use crate::xml::{RawXmlElement, XmlDocument};

/// One build of a target presentation
#[derive(Debug)]
pub struct Composition {
    pub(crate) archive: Archive,
    pub(crate) counters: Counters,
    pub(crate) tracker: ContentTracker,
    pub(crate) rel_ids: RelIdAllocator,
    slide_order: Option<Vec<usize>>,
}

impl Composition {
    /// Start a build on a root template; counters are seeded from it
    pub fn new(archive: Archive) -> Result<Self> {
        let counters = Counters::from_archive(&archive)?;
        log::info!("composing on {}", archive.label());
        Ok(Self {
            archive,
            counters,
            tracker: ContentTracker::new(),
            rel_ids: RelIdAllocator::new(),
            slide_order: None,
        })
    }

    /// Open a root template from disk and start a build on it
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(Archive::open(path)?)
    }

    /// The target archive
    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    /// The target archive, mutably
    pub fn archive_mut(&mut self) -> &mut Archive {
        &mut self.archive
    }

    /// Counters of this build
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Advance a counter of this build
    pub fn increment_counter(&mut self, kind: CounterKind) -> Result<u32> {
        self.counters.increment(kind)
    }

    /// Tracker of this build
    pub fn tracker(&self) -> &ContentTracker {
        &self.tracker
    }

    /// Number of slides listed in the presentation
    pub fn slide_count(&self) -> Result<usize> {
        Ok(self
            .archive
            .xml(well_known::PRESENTATION)?
            .root
            .find_all("p:sldId")
            .len())
    }

    /// Reorder slides on output by a one-based sequence of current positions
    pub fn sort_slides(&mut self, order: Vec<usize>) {
        self.slide_order = Some(order);
    }

    /// Run the cleanup passes without serializing
    pub fn cleanup(&mut self) -> Result<CleanupReport> {
        cleanup::run(
            &mut self.archive,
            &mut self.tracker,
            self.slide_order.as_deref(),
        )
    }

    /// Clean up and serialize the build; the composition is consumed
    pub fn write(mut self, options: &OutputOptions) -> Result<Vec<u8>> {
        self.cleanup()?;
        self.archive.to_bytes(options)
    }

    /// Clean up and save the build to a file; the composition is consumed
    pub fn save<P: AsRef<Path>>(mut self, path: P, options: &OutputOptions) -> Result<()> {
        self.cleanup()?;
        self.archive.save(path, options)
    }

    /// Copy a file from a source archive into the target
    pub(crate) fn copy_file(&mut self, source: &Archive, from: &str, to: &str) -> Result<()> {
        file_helper::zip_copy(source, from, &mut self.archive, to, &mut self.tracker)
    }

    pub(crate) fn append(&mut self, element: HelperElement) -> Result<RawXmlElement> {
        xml_helper::append(&mut self.archive, &mut self.tracker, element)
    }

    pub(crate) fn append_if(&mut self, element: HelperElement) -> Result<Option<RawXmlElement>> {
        xml_helper::append_if(&mut self.archive, &mut self.tracker, element)
    }

    /// Next free relationship id of a `.rels` part, creating the part when missing
    pub(crate) fn next_rel_id(&mut self, rels_file: &str) -> Result<String> {
        self.ensure_relationships(rels_file);
        self.rel_ids.next_rel_id(&mut self.archive, rels_file)
    }

    /// Append a relationship whose id came from [`Composition::next_rel_id`]
    pub(crate) fn append_relationship(&mut self, rels_file: &str, rel: &Relationship) -> Result<()> {
        self.ensure_relationships(rels_file);
        let id = rel.id.clone();
        let element = xml_helper::relationship_child(rels_file, rel).assert_with(move |doc| {
            if xml_helper::find_by_attribute(doc, "Relationship", "Id", &id) {
                Err(format!("relationship id {} is already declared", id))
            } else {
                Ok(())
            }
        });
        let appended = self.append(element);
        self.rel_ids.release(rels_file, &rel.id);
        appended.map(|_| ())
    }

    /// Register a `Default` content type unless the extension already has one
    pub(crate) fn ensure_default(&mut self, extension: &str, content_type: &str) -> Result<()> {
        self.append_if(
            xml_helper::content_type_default(extension, content_type)
                .when(xml_helper::missing_default(extension)),
        )?;
        Ok(())
    }

    /// Register an `Override` content type unless the part already has one
    pub(crate) fn ensure_override(&mut self, part_name: &str, content_type: &str) -> Result<()> {
        let part_name = format!("/{}", part_name.trim_start_matches('/'));
        self.append_if(
            xml_helper::content_type_override(&part_name, content_type)
                .when(xml_helper::missing_override(&part_name)),
        )?;
        Ok(())
    }

    fn ensure_relationships(&mut self, rels_file: &str) {
        if !self.archive.exists(rels_file) {
            self.archive
                .write_xml(rels_file, Relationships::empty_document());
            self.tracker.track_file(rels_file);
        }
    }

    /// The live tree of a target part
    pub(crate) fn xml_mut(&mut self, path: &str) -> Result<&mut XmlDocument> {
        self.archive.read_xml(path)
    }
}
