//! Shapes grafted from a source slide into the target presentation
//!
//! A [`Shape`] is a node of a source slide's shape tree plus the archive it came
//! from. Its [`ShapeKind`] decides which parts travel with it: charts bring their
//! chart part, styles, images and embedded workbook; pictures bring their media;
//! tables and other shapes bring nothing but external links.

mod chart;
mod image;

pub use chart::{ChartSubtype, Workbook};

use crate::compose::file_helper::relative_target;
use crate::compose::xml_helper::{find_by_name, max_id, remove_if};
use crate::compose::{Composition, CounterKind};
use crate::error::{Error, Result};
use crate::opc::{rel_types, well_known, Archive, PartUri, Relationship, Relationships};
use crate::xml::{NodePath, RawXmlElement, XmlDocument};

use chart::ChartGraft;
use image::ImageGraft;

/// Attributes holding relationship ids inside a shape tree
const REL_ATTRS: [&str; 3] = ["r:id", "r:embed", "r:link"];

/// Callback run on the grafted shape node before it is placed
pub type ElementCallback = Box<dyn Fn(&mut RawXmlElement) -> Result<()>>;

/// Callback run on the grafted chart part and its workbook
pub type ChartCallback = Box<dyn Fn(&mut XmlDocument, Option<&mut Workbook>) -> Result<()>>;

/// The closed set of shape variants
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeKind {
    Chart(ChartSubtype),
    Image,
    Table,
    Generic,
}

impl ShapeKind {
    /// Classify a shape node by its content
    pub fn detect(element: &RawXmlElement) -> Self {
        if element.find_first(ChartSubtype::Chart.element_tag()).is_some() {
            ShapeKind::Chart(ChartSubtype::Chart)
        } else if element.find_first(ChartSubtype::ChartEx.element_tag()).is_some() {
            ShapeKind::Chart(ChartSubtype::ChartEx)
        } else if element.find_first("a:tbl").is_some() {
            ShapeKind::Table
        } else if element.name == "p:pic" {
            ShapeKind::Image
        } else {
            ShapeKind::Generic
        }
    }

    /// Kind of the shape a slide relationship points at
    pub fn from_relationship(rel: &Relationship) -> Self {
        match rel.rel_type.as_str() {
            rel_types::CHART => ShapeKind::Chart(ChartSubtype::Chart),
            rel_types::CHART_EX => ShapeKind::Chart(ChartSubtype::ChartEx),
            rel_types::IMAGE => ShapeKind::Image,
            _ => ShapeKind::Generic,
        }
    }

    /// The element and attribute carrying the shape's primary relationship
    fn primary_reference(&self) -> Option<(&'static str, &'static str)> {
        match self {
            ShapeKind::Chart(subtype) => Some((subtype.element_tag(), "r:id")),
            ShapeKind::Image => Some(("a:blip", "r:embed")),
            ShapeKind::Table | ShapeKind::Generic => None,
        }
    }
}

/// A shape of a source slide, ready to be grafted
pub struct Shape<'a> {
    source: &'a Archive,
    source_slide: u32,
    element: RawXmlElement,
    name: String,
    kind: ShapeKind,
    source_rid: Option<String>,
    callbacks: Vec<ElementCallback>,
    chart_callbacks: Vec<ChartCallback>,
}

impl<'a> Shape<'a> {
    /// Find a shape by its `p:cNvPr` name on a source slide
    pub fn from_slide(source: &'a Archive, slide: u32, name: &str) -> Result<Self> {
        let doc = source.xml(&well_known::slide(slide))?;
        let element = find_by_name(&doc.root, name)
            .and_then(|path| doc.root.at_path(&path).cloned())
            .ok_or_else(|| Error::ShapeNotFound {
                slide,
                name: name.to_string(),
            })?;
        Ok(Self::from_element(source, slide, element))
    }

    /// Wrap an already resolved shape node of a source slide
    pub fn from_element(source: &'a Archive, slide: u32, element: RawXmlElement) -> Self {
        let kind = ShapeKind::detect(&element);
        let name = element
            .find_first("p:cNvPr")
            .and_then(|c| c.attr("name"))
            .unwrap_or_default()
            .to_string();
        let source_rid = match kind {
            ShapeKind::Image => element
                .find_first("a:blip")
                .and_then(|blip| blip.attr("r:embed").or_else(|| blip.attr("r:link")))
                .map(str::to_string),
            _ => kind
                .primary_reference()
                .and_then(|(tag, attr)| element.find_first(tag).and_then(|e| e.attr(attr)))
                .map(str::to_string),
        };

        Self {
            source,
            source_slide: slide,
            element,
            name,
            kind,
            source_rid,
            callbacks: Vec::new(),
            chart_callbacks: Vec::new(),
        }
    }

    /// The shape a relationship of a source slide points at
    pub(crate) fn from_relationship(source: &'a Archive, slide: u32, rel: &Relationship) -> Result<Self> {
        let doc = source.xml(&well_known::slide(slide))?;
        let element = doc
            .root
            .find_paths_where(|e| REL_ATTRS.iter().any(|attr| e.attr(attr) == Some(rel.id.as_str())))
            .first()
            .and_then(|path| doc.root.at_path(path).cloned())
            .unwrap_or_else(|| RawXmlElement::new("p:sp"));

        Ok(Self {
            source,
            source_slide: slide,
            element,
            name: String::new(),
            kind: ShapeKind::from_relationship(rel),
            source_rid: Some(rel.id.clone()),
            callbacks: Vec::new(),
            chart_callbacks: Vec::new(),
        })
    }

    /// Run `callback` on the grafted node before it is placed
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut RawXmlElement) -> Result<()> + 'static,
    {
        self.callbacks.push(Box::new(callback));
        self
    }

    /// Run `callback` on the grafted chart part and workbook; ignored for other kinds
    pub fn with_chart_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut XmlDocument, Option<&mut Workbook>) -> Result<()> + 'static,
    {
        self.chart_callbacks.push(Box::new(callback));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    pub fn element(&self) -> &RawXmlElement {
        &self.element
    }

    /// Graft the shape in place of the target shape with the same name
    pub fn modify(&self, composition: &mut Composition, slide: u32) -> Result<RawXmlElement> {
        let slide_path = target_slide(composition, slide)?;
        let path = find_by_name(&composition.xml_mut(&slide_path)?.root, &self.name).ok_or_else(|| {
            Error::ShapeNotFound {
                slide,
                name: self.name.clone(),
            }
        })?;

        let graft = Graft::prepare(self, composition, slide)?;
        let element = self.build(composition, slide, &graft)?;

        composition
            .xml_mut(&slide_path)?
            .root
            .replace_at(&path, element.clone());
        log::debug!("modified '{}' on slide {}", self.name, slide);
        Ok(element)
    }

    /// Graft the shape as a new node of the target slide's shape tree
    pub fn append(&self, composition: &mut Composition, slide: u32) -> Result<RawXmlElement> {
        let slide_path = target_slide(composition, slide)?;

        let graft = Graft::prepare(self, composition, slide)?;
        let mut element = self.build(composition, slide, &graft)?;

        let doc = composition.xml_mut(&slide_path)?;
        let next_id = max_id(doc.root.find_all("p:cNvPr"), "id") + 1;
        if let Some(properties) = element.find_first_mut("p:cNvPr") {
            properties.set_attr("id", next_id.to_string());
        }
        doc.root
            .find_first_mut("p:spTree")
            .ok_or_else(|| Error::InvalidDocument(format!("{} has no shape tree", slide_path)))?
            .push_child(element.clone());

        log::debug!("appended '{}' to slide {} as shape {}", self.name, slide, next_id);
        Ok(element)
    }

    /// Detach the target shape with this shape's name and its slide-side link.
    ///
    /// Parts the shape pointed at become orphans and are swept by cleanup.
    pub fn remove(&self, composition: &mut Composition, slide: u32) -> Result<RawXmlElement> {
        let slide_path = target_slide(composition, slide)?;
        let doc = composition.xml_mut(&slide_path)?;
        let removed = find_by_name(&doc.root, &self.name)
            .and_then(|path| doc.root.detach(&path))
            .ok_or_else(|| Error::ShapeNotFound {
                slide,
                name: self.name.clone(),
            })?;

        let reference = ShapeKind::detect(&removed)
            .primary_reference()
            .and_then(|(tag, attr)| removed.find_first(tag).and_then(|e| e.attr(attr)))
            .map(str::to_string);
        if let Some(rid) = reference {
            let still_used = !doc
                .root
                .find_paths_where(|e| REL_ATTRS.iter().any(|a| e.attr(a) == Some(rid.as_str())))
                .is_empty();
            if !still_used {
                unlink(composition, slide, &rid)?;
            }
        }

        log::debug!("removed '{}' from slide {}", self.name, slide);
        Ok(removed)
    }

    /// Re-graft the dependencies of a slide appended as a whole.
    ///
    /// The slide tree was copied verbatim; references to this shape's source
    /// relationship are pointed at the freshly grafted parts.
    pub fn modify_on_added_slide(&self, composition: &mut Composition, slide: u32) -> Result<()> {
        target_slide(composition, slide)?;
        let graft = Graft::prepare(self, composition, slide)?;
        graft.relink_added_slide(self, composition, slide)
    }

    /// Clone the node and point every reference in it at the target
    fn build(&self, composition: &mut Composition, slide: u32, graft: &Graft) -> Result<RawXmlElement> {
        let mut element = self.element.clone();

        let primary: Vec<NodePath> = match (graft.primary(), &self.source_rid) {
            (Some((tag, attr)), Some(rid)) => element
                .find_paths_where(|e| e.name == tag && e.attr(attr) == Some(rid.as_str())),
            _ => Vec::new(),
        };

        self.relink_references(composition, slide, &mut element, &primary)?;
        graft.apply(self, composition, &mut element, &primary)?;

        for callback in &self.callbacks {
            callback(&mut element)?;
        }
        Ok(element)
    }

    /// Point secondary references (hyperlinks, extra images) at the target slide's relationships
    fn relink_references(
        &self,
        composition: &mut Composition,
        slide: u32,
        element: &mut RawXmlElement,
        primary: &[NodePath],
    ) -> Result<()> {
        let paths: Vec<NodePath> = element
            .find_paths_where(|e| REL_ATTRS.iter().any(|attr| e.attr(attr).is_some()))
            .into_iter()
            .filter(|path| !primary.contains(path))
            .collect();
        if paths.is_empty() {
            return Ok(());
        }

        let source_rels = self.source_relationships()?;
        let source_part = PartUri::new(&well_known::slide(self.source_slide))?;
        let target_rels = well_known::slide_rels(slide);

        for path in paths {
            let Some(node) = element.at_path(&path) else {
                continue;
            };
            let tag = node.name.clone();
            let references: Vec<(&str, String)> = REL_ATTRS
                .iter()
                .filter_map(|attr| node.attr(attr).map(|rid| (*attr, rid.to_string())))
                .collect();

            for (attr, rid) in references {
                let replacement = match source_rels.get(&rid) {
                    Some(rel) if !rel.is_internal() => {
                        let id = composition.next_rel_id(&target_rels)?;
                        composition.append_relationship(
                            &target_rels,
                            &Relationship {
                                id: id.clone(),
                                ..rel.clone()
                            },
                        )?;
                        Some(id)
                    }
                    Some(rel) if rel.rel_type == rel_types::IMAGE => {
                        let media = image::copy_media(composition, self.source, &source_part, rel)?;
                        let id = composition.next_rel_id(&target_rels)?;
                        composition.append_relationship(
                            &target_rels,
                            &Relationship {
                                id: id.clone(),
                                target: relative_target(&well_known::slide(slide), &media),
                                ..rel.clone()
                            },
                        )?;
                        Some(id)
                    }
                    Some(rel) => {
                        log::warn!(
                            "dropping {} on <{}>: {} part {} is not grafted",
                            rid,
                            tag,
                            rel.kind(),
                            rel.target
                        );
                        None
                    }
                    None => {
                        log::warn!("dropping undeclared {} on <{}>", rid, tag);
                        None
                    }
                };

                if let Some(node) = element.at_path_mut(&path) {
                    match replacement {
                        Some(id) => node.set_attr(attr, id),
                        None => {
                            node.remove_attr(attr);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn source_relationships(&self) -> Result<Relationships> {
        let path = well_known::slide_rels(self.source_slide);
        if !self.source.exists(&path) {
            return Ok(Relationships::new());
        }
        Relationships::from_document(&self.source.xml(&path)?)
    }

    /// The source relationship a primary reference points at
    fn source_relationship(&self) -> Result<(String, Relationship)> {
        let part = well_known::slide(self.source_slide);
        let rid = self.source_rid.clone().ok_or_else(|| Error::MissingAttribute {
            element: self
                .kind
                .primary_reference()
                .map(|(tag, _)| tag.to_string())
                .unwrap_or_else(|| self.element.name.clone()),
            attr: "r:id".into(),
        })?;
        let rel = self
            .source_relationships()?
            .get(&rid)
            .cloned()
            .ok_or_else(|| Error::RelationshipUnresolved {
                part: format!("{} in {}", part, self.source.label()),
                id: rid.clone(),
            })?;
        Ok((rid, rel))
    }
}

/// Dependencies grafted for one shape
enum Graft {
    Chart(ChartGraft),
    Image(ImageGraft),
    Plain,
}

impl Graft {
    fn prepare(shape: &Shape<'_>, composition: &mut Composition, slide: u32) -> Result<Self> {
        match shape.kind {
            ShapeKind::Chart(subtype) => {
                ChartGraft::prepare(shape, subtype, composition, slide).map(Graft::Chart)
            }
            ShapeKind::Image => ImageGraft::prepare(shape, composition, slide).map(Graft::Image),
            ShapeKind::Table => {
                composition.counters.increment(CounterKind::Tables)?;
                Ok(Graft::Plain)
            }
            ShapeKind::Generic => Ok(Graft::Plain),
        }
    }

    fn primary(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Graft::Chart(chart) => Some((chart.subtype().element_tag(), "r:id")),
            Graft::Image(image) => Some(("a:blip", image.attribute())),
            Graft::Plain => None,
        }
    }

    fn created_rid(&self) -> Option<&str> {
        match self {
            Graft::Chart(chart) => Some(chart.created_rid()),
            Graft::Image(image) => Some(image.created_rid()),
            Graft::Plain => None,
        }
    }

    /// Finish the graft on a cloned node
    fn apply(
        &self,
        shape: &Shape<'_>,
        composition: &mut Composition,
        element: &mut RawXmlElement,
        primary: &[NodePath],
    ) -> Result<()> {
        if let Graft::Chart(chart) = self {
            chart.apply_data(shape, composition)?;
        }
        if let (Some((_, attr)), Some(rid)) = (self.primary(), self.created_rid()) {
            for path in primary {
                if let Some(node) = element.at_path_mut(path) {
                    node.set_attr(attr, rid);
                }
            }
        }
        Ok(())
    }

    /// Finish the graft on a slide copied as a whole
    fn relink_added_slide(&self, shape: &Shape<'_>, composition: &mut Composition, slide: u32) -> Result<()> {
        if let Graft::Chart(chart) = self {
            chart.apply_data(shape, composition)?;
        }
        let (Some(old), Some(new)) = (shape.source_rid.as_deref(), self.created_rid()) else {
            return Ok(());
        };
        let attrs: &[&str] = match self {
            Graft::Chart(_) => &["r:id"],
            _ => &["r:embed", "r:link"],
        };
        let tag = match self {
            Graft::Chart(chart) => Some(chart.subtype().element_tag()),
            _ => None,
        };

        let doc = composition.xml_mut(&well_known::slide(slide))?;
        let paths = doc.root.find_paths_where(|e| {
            tag.map_or(true, |t| e.name == t) && attrs.iter().any(|a| e.attr(a) == Some(old))
        });
        for path in paths {
            if let Some(node) = doc.root.at_path_mut(&path) {
                for attr in attrs {
                    if node.attr(attr) == Some(old) {
                        node.set_attr(*attr, new);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Zip path of a target slide, which must exist
fn target_slide(composition: &Composition, slide: u32) -> Result<String> {
    let path = well_known::slide(slide);
    if composition.archive().exists(&path) {
        Ok(path)
    } else {
        Err(Error::PartNotFound(path))
    }
}

/// Drop a relationship from a target slide and forget the file it pointed at
fn unlink(composition: &mut Composition, slide: u32, rid: &str) -> Result<()> {
    let rels_path = well_known::slide_rels(slide);
    if !composition.archive().exists(&rels_path) {
        return Ok(());
    }
    let removed = remove_if(
        &mut composition.archive,
        &rels_path,
        "Relationship",
        |_, e| e.attr("Id") == Some(rid),
    )?;

    let slide_part = PartUri::new(&well_known::slide(slide))?;
    for element in removed {
        let rel = Relationship::from_element(&element)?;
        if rel.is_internal() {
            let target = slide_part.resolve(&rel.target)?;
            composition.tracker.untrack_file(target.zip_path());
        }
    }
    Ok(())
}
