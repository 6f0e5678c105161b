//! Picture grafting: the media file is copied under the next image number

use crate::compose::file_helper::relative_target;
use crate::compose::{Composition, CounterKind};
use crate::error::{Error, Result};
use crate::opc::{content_types, well_known, Archive, PartUri, Relationship};
use crate::shapes::Shape;

/// A picture's media relinked into the target slide
pub(super) struct ImageGraft {
    attribute: &'static str,
    created_rid: String,
}

impl ImageGraft {
    pub(super) fn prepare(shape: &Shape<'_>, composition: &mut Composition, slide: u32) -> Result<Self> {
        let (rid, rel) = shape.source_relationship()?;
        let attribute = match shape.element.find_first("a:blip") {
            Some(blip) if blip.attr("r:link") == Some(rid.as_str()) => "r:link",
            _ => "r:embed",
        };

        let target_slide = well_known::slide(slide);
        let target = if rel.is_internal() {
            let source_slide = PartUri::new(&well_known::slide(shape.source_slide))?;
            let media = copy_media(composition, shape.source, &source_slide, &rel)?;
            relative_target(&target_slide, &media)
        } else {
            rel.target.clone()
        };

        let slide_rels = well_known::slide_rels(slide);
        let created_rid = composition.next_rel_id(&slide_rels)?;
        composition.append_relationship(
            &slide_rels,
            &Relationship {
                id: created_rid.clone(),
                target,
                ..rel
            },
        )?;

        Ok(Self {
            attribute,
            created_rid,
        })
    }

    pub(super) fn attribute(&self) -> &'static str {
        self.attribute
    }

    pub(super) fn created_rid(&self) -> &str {
        &self.created_rid
    }
}

/// Copy the media file behind `rel` as `ppt/media/image{N}.{ext}`; returns its path
pub(super) fn copy_media(
    composition: &mut Composition,
    source: &Archive,
    owner: &PartUri,
    rel: &Relationship,
) -> Result<String> {
    let from = owner.resolve(&rel.target)?;
    if !source.exists(from.zip_path()) {
        return Err(Error::GraftIncomplete {
            part: owner.zip_path().to_string(),
            dependency: from.zip_path().to_string(),
        });
    }

    let number = composition.counters.increment(CounterKind::Images)?;
    let to = match from.extension() {
        Some(extension) => {
            composition.ensure_default(extension, content_types::for_extension(extension))?;
            format!("{}/image{}.{}", well_known::MEDIA_DIR, number, extension)
        }
        None => format!("{}/image{}", well_known::MEDIA_DIR, number),
    };
    composition.copy_file(source, from.zip_path(), &to)?;

    log::debug!("copied media {} as {}", from, to);
    Ok(to)
}
