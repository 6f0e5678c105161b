//! Slide-level operations: append a slide from a source archive, remove a slide

use std::collections::HashSet;

use crate::compose::file_helper::{relative_target, suffixed_path};
use crate::compose::{Composition, CounterKind};
use crate::compose::xml_helper::{max_id, remove_if};
use crate::error::{Error, Result};
use crate::opc::{
    content_types, decompose_file_name, rel_types, well_known, Archive, ContentTypes, PartUri,
    Relationship, Relationships, TargetMode,
};
use crate::shapes::Shape;
use crate::xml::{RawXmlElement, RawXmlNode, XmlDocument};

/// Children of `p:presentation` that precede `p:sldIdLst`
const BEFORE_SLIDE_LIST: [&str; 3] = ["p:sldMasterIdLst", "p:notesMasterIdLst", "p:handoutMasterIdLst"];

impl Composition {
    /// Append slide `source_slide` of `source` to the target; returns the new slide number.
    ///
    /// Charts and images on the slide are grafted with fresh part names. Other
    /// internal parts are copied, renamed when the target already has the name.
    /// Notes are not carried over.
    pub fn append_slide(&mut self, source: &Archive, source_slide: u32) -> Result<u32> {
        let source_path = well_known::slide(source_slide);
        if !source.exists(&source_path) {
            return Err(Error::PartNotFound(format!("{} in {}", source_path, source.label())));
        }

        let number = self.counters.increment(CounterKind::Slides)?;
        let target_path = well_known::slide(number);
        let target_rels = well_known::slide_rels(number);
        self.copy_file(source, &source_path, &target_path)?;

        let source_rels_path = well_known::slide_rels(source_slide);
        let source_rels = if source.exists(&source_rels_path) {
            Relationships::from_document(&source.xml(&source_rels_path)?)?
        } else {
            Relationships::new()
        };
        let source_uri = PartUri::new(&source_path)?;
        let source_types = ContentTypes::from_document(&source.xml(well_known::CONTENT_TYPES)?)?;

        let mut rels_doc = Relationships::empty_document();
        let mut regrafted = Vec::new();
        for rel in source_rels.iter() {
            if !rel.is_internal() {
                rels_doc.root.push_child(rel.to_element());
                continue;
            }
            match rel.rel_type.as_str() {
                rel_types::SLIDE_LAYOUT => {
                    let layout = self.matching_layout(&source_uri, rel)?;
                    rels_doc.root.push_child(
                        Relationship {
                            target: relative_target(&target_path, &layout),
                            ..rel.clone()
                        }
                        .to_element(),
                    );
                }
                rel_types::CHART | rel_types::CHART_EX | rel_types::IMAGE => {
                    regrafted.push(rel.clone());
                }
                rel_types::NOTES_SLIDE => {
                    log::debug!("notes of {} are not carried over", source_path);
                }
                _ => {
                    let copied = self.copy_through(source, &source_types, &source_uri, rel, number)?;
                    rels_doc.root.push_child(
                        Relationship {
                            target: relative_target(&target_path, &copied),
                            ..rel.clone()
                        }
                        .to_element(),
                    );
                }
            }
        }

        self.archive.write_xml(&target_rels, rels_doc);
        self.tracker.track_file(&target_rels);
        let written = Relationships::from_document(self.archive.read_xml(&target_rels)?)?;
        for rel in written.iter() {
            self.tracker.track_relation(&target_rels, rel);
        }

        // ids still used inside the copied slide must not be handed out again
        for rel in &regrafted {
            self.rel_ids.reserve(&target_rels, &rel.id);
        }
        let grafted = regrafted.iter().try_for_each(|rel| {
            Shape::from_relationship(source, source_slide, rel)?.modify_on_added_slide(self, number)
        });
        for rel in &regrafted {
            self.rel_ids.release(&target_rels, &rel.id);
        }
        grafted?;

        self.ensure_override(&target_path, content_types::SLIDE)?;
        self.register_slide(number)?;

        log::info!(
            "appended slide {} of {} as slide {}",
            source_slide,
            source.label(),
            number
        );
        Ok(number)
    }

    /// Remove slide `number` from the presentation.
    ///
    /// The slide part and the parts only it reached are left for cleanup to prune.
    pub fn remove_slide(&mut self, number: u32) -> Result<()> {
        let slide = PartUri::new(&well_known::slide(number))?;
        let presentation = PartUri::new(well_known::PRESENTATION)?;

        let removed = remove_if(
            &mut self.archive,
            well_known::PRESENTATION_RELS,
            "Relationship",
            |_, element| {
                element.attr("Type") == Some(rel_types::SLIDE)
                    && element
                        .attr("Target")
                        .and_then(|target| presentation.resolve(target).ok())
                        .as_ref()
                        == Some(&slide)
            },
        )?;
        if removed.is_empty() {
            return Err(Error::PartNotFound(slide.zip_path().to_string()));
        }

        let ids: HashSet<String> = removed
            .iter()
            .filter_map(|e| e.attr("Id").map(str::to_string))
            .collect();
        remove_if(&mut self.archive, well_known::PRESENTATION, "p:sldId", |_, element| {
            element.attr("r:id").is_some_and(|rid| ids.contains(rid))
        })?;

        self.tracker.untrack_file(slide.zip_path());
        self.tracker
            .untrack_file(slide.relationships_uri().zip_path());
        log::info!("removed slide {}", number);
        Ok(())
    }

    /// Layout of the target matching the source slide's layout by path, else the first one
    fn matching_layout(&self, source_slide: &PartUri, rel: &Relationship) -> Result<String> {
        let wanted = source_slide.resolve(&rel.target)?;
        if self.archive.exists(wanted.zip_path()) {
            return Ok(wanted.zip_path().to_string());
        }

        let fallback = self
            .archive
            .list(well_known::SLIDE_LAYOUTS_DIR)
            .into_iter()
            .filter(|file| file.relative_path.ends_with(".xml"))
            .min_by_key(|file| decompose_file_name(&file.relative_path).number)
            .map(|file| file.name)
            .ok_or_else(|| Error::PartNotFound(well_known::SLIDE_LAYOUTS_DIR.to_string()))?;

        log::warn!(
            "layout {} is missing from {}, using {}",
            wanted,
            self.archive.label(),
            fallback
        );
        Ok(fallback)
    }

    /// Copy a part a slide depends on; returns its path in the target
    fn copy_through(
        &mut self,
        source: &Archive,
        source_types: &ContentTypes,
        source_slide: &PartUri,
        rel: &Relationship,
        slide_number: u32,
    ) -> Result<String> {
        let from = source_slide.resolve(&rel.target)?;
        if !source.exists(from.zip_path()) {
            return Err(Error::GraftIncomplete {
                part: source_slide.zip_path().to_string(),
                dependency: from.zip_path().to_string(),
            });
        }

        let to = if self.archive.exists(from.zip_path()) {
            suffixed_path(from.zip_path(), &format!("-slide{}", slide_number))?
        } else {
            from.zip_path().to_string()
        };
        self.copy_file(source, from.zip_path(), &to)?;

        let from_rels = from.relationships_uri();
        if source.exists(from_rels.zip_path()) {
            let to_rels = PartUri::new(&to)?.relationships_uri();
            self.copy_file(source, from_rels.zip_path(), to_rels.zip_path())?;
        }

        if let Some(content_type) = source_types.override_for(&from) {
            self.ensure_override(&to, content_type)?;
        } else if let Some(extension) = from.extension() {
            if let Some(content_type) = source_types.get(&from) {
                self.ensure_default(extension, content_type)?;
            }
        }
        Ok(to)
    }

    /// Add the presentation relationship and `p:sldId` entry of a new slide
    fn register_slide(&mut self, number: u32) -> Result<()> {
        let id = self.next_rel_id(well_known::PRESENTATION_RELS)?;
        self.append_relationship(
            well_known::PRESENTATION_RELS,
            &Relationship {
                id: id.clone(),
                rel_type: rel_types::SLIDE.to_string(),
                target: relative_target(well_known::PRESENTATION, &well_known::slide(number)),
                target_mode: TargetMode::Internal,
            },
        )?;

        let presentation = self.xml_mut(well_known::PRESENTATION)?;
        let slide_id = (max_id(presentation.root.find_all("p:sldId"), "id") + 1).max(256);
        slide_list(presentation)?.push_child(
            RawXmlElement::new("p:sldId")
                .with_attr("id", slide_id.to_string())
                .with_attr("r:id", id),
        );
        Ok(())
    }
}

/// The `p:sldIdLst` of a presentation, created in schema position when absent
fn slide_list(presentation: &mut XmlDocument) -> Result<&mut RawXmlElement> {
    let root = &mut presentation.root;
    let position = match root.child_positions("p:sldIdLst").first() {
        Some(&position) => position,
        None => {
            let after = root
                .children
                .iter()
                .rposition(|node| {
                    matches!(node, RawXmlNode::Element(e) if BEFORE_SLIDE_LIST.contains(&e.name.as_str()))
                })
                .map(|p| p + 1)
                .unwrap_or(0);
            root.insert_child(after, RawXmlElement::new("p:sldIdLst"));
            after
        }
    };
    root.at_path_mut(&[position])
        .ok_or_else(|| Error::InvalidDocument("presentation has no slide list".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::test_support::deck;
    use pretty_assertions::assert_eq;

    fn source_with_tag() -> Archive {
        let mut source = deck(1);
        let rels = well_known::slide_rels(1);
        source.write(
            &rels,
            format!(
                r#"<Relationships><Relationship Id="rId1" Type="{}" Target="../slideLayouts/slideLayout3.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/tags" Target="../tags/tag1.xml"/><Relationship Id="rId3" Type="{}" Target="../notesSlides/notesSlide1.xml"/><Relationship Id="rId4" Type="{}" Target="https://example.com" TargetMode="External"/></Relationships>"#,
                rel_types::SLIDE_LAYOUT,
                rel_types::NOTES_SLIDE,
                rel_types::HYPERLINK
            )
            .into_bytes(),
        );
        source.write("ppt/tags/tag1.xml", b"<p:tagLst/>".to_vec());
        source
    }

    #[test]
    fn test_append_slide_registers_everything() {
        let mut composition = Composition::new(deck(2)).unwrap();
        let number = composition.append_slide(&source_with_tag(), 1).unwrap();
        assert_eq!(number, 3);
        assert_eq!(composition.slide_count().unwrap(), 3);

        let archive = composition.archive();
        assert!(archive.exists("ppt/slides/slide3.xml"));
        assert!(archive.exists("ppt/tags/tag1.xml"));

        let rels = Relationships::from_document(&archive.xml("ppt/slides/_rels/slide3.xml.rels").unwrap())
            .unwrap();
        assert_eq!(
            rels.by_type(rel_types::SLIDE_LAYOUT).unwrap().target,
            "../slideLayouts/slideLayout1.xml"
        );
        assert!(rels.by_type(rel_types::NOTES_SLIDE).is_none());
        assert!(!rels.by_type(rel_types::HYPERLINK).unwrap().is_internal());

        let presentation = archive.xml(well_known::PRESENTATION).unwrap();
        let last = presentation.root.find_all("p:sldId").last().copied().cloned().unwrap();
        assert_eq!(last.attr("id"), Some("258"));
        assert_eq!(last.attr("r:id"), Some("rId4"));

        let registry = ContentTypes::from_document(&archive.xml(well_known::CONTENT_TYPES).unwrap()).unwrap();
        assert_eq!(
            registry.override_for(&PartUri::new("/ppt/slides/slide3.xml").unwrap()),
            Some(content_types::SLIDE)
        );
    }

    #[test]
    fn test_append_slide_renames_colliding_parts() {
        let mut target = deck(1);
        target.write("ppt/tags/tag1.xml", b"<p:tagLst/>".to_vec());
        let mut composition = Composition::new(target).unwrap();

        composition.append_slide(&source_with_tag(), 1).unwrap();
        assert!(composition.archive().exists("ppt/tags/tag1-slide2.xml"));
    }

    #[test]
    fn test_append_missing_slide() {
        let mut composition = Composition::new(deck(1)).unwrap();
        assert!(matches!(
            composition.append_slide(&deck(1), 4),
            Err(Error::PartNotFound(_))
        ));
    }

    #[test]
    fn test_remove_slide() {
        let mut composition = Composition::new(deck(3)).unwrap();
        composition.remove_slide(2).unwrap();
        assert_eq!(composition.slide_count().unwrap(), 2);
        assert!(matches!(composition.remove_slide(2), Err(Error::PartNotFound(_))));
    }

    #[test]
    fn test_slide_list_created_after_masters() {
        let mut presentation =
            XmlDocument::parse(b"<p:presentation><p:sldMasterIdLst/><p:sldSz/></p:presentation>").unwrap();
        slide_list(&mut presentation).unwrap().push_child(RawXmlElement::new("p:sldId"));

        let names: Vec<_> = presentation.root.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["p:sldMasterIdLst", "p:sldIdLst", "p:sldSz"]);
    }
}
