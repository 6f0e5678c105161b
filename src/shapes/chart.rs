//! Chart grafting: chart part, style and color parts, chart images and the
//! embedded workbook are copied under the next chart number and relinked.

use crate::compose::file_helper::{relative_target, suffixed_path};
use crate::compose::{Composition, CounterKind};
use crate::error::{Error, Result};
use crate::opc::{
    content_types, decompose_file_name, rel_types, well_known, Archive, ContentTypes,
    OutputOptions, PartUri, Relationship, Relationships, TargetMode,
};
use crate::shapes::Shape;
use crate::xml::XmlDocument;

/// The two chart flavours; they differ in part names and registered types
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChartSubtype {
    /// Classic DrawingML chart (`c:chart`)
    Chart,
    /// Extended chart (`cx:chart`): waterfall, treemap, sunburst and friends
    ChartEx,
}

impl ChartSubtype {
    /// File name base of the chart part (`chart3.xml`, `chartEx3.xml`)
    pub fn base(self) -> &'static str {
        match self {
            ChartSubtype::Chart => "chart",
            ChartSubtype::ChartEx => "chartEx",
        }
    }

    /// Slide element carrying the chart's relationship id
    pub fn element_tag(self) -> &'static str {
        match self {
            ChartSubtype::Chart => "c:chart",
            ChartSubtype::ChartEx => "cx:chart",
        }
    }

    pub fn rel_type(self) -> &'static str {
        match self {
            ChartSubtype::Chart => rel_types::CHART,
            ChartSubtype::ChartEx => rel_types::CHART_EX,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ChartSubtype::Chart => content_types::CHART,
            ChartSubtype::ChartEx => content_types::CHART_EX,
        }
    }
}

/// Worksheet holding the chart data inside an embedded workbook
pub const SHEET: &str = "xl/worksheets/sheet1.xml";
/// Shared strings of an embedded workbook
pub const SHARED_STRINGS: &str = "xl/sharedStrings.xml";
const SHEET_RELS: &str = "xl/worksheets/_rels/sheet1.xml.rels";

/// The embedded workbook behind a chart, opened for editing
#[derive(Debug)]
pub struct Workbook {
    archive: Archive,
    table_path: Option<String>,
    /// First worksheet
    pub sheet: XmlDocument,
    /// Shared strings table
    pub shared_strings: XmlDocument,
    /// Table defined on the first worksheet, if any
    pub table: Option<XmlDocument>,
}

impl Workbook {
    /// Open the data parts of a workbook archive
    pub fn from_archive(archive: Archive) -> Result<Self> {
        let sheet = archive.xml(SHEET)?;
        let shared_strings = archive.xml(SHARED_STRINGS)?;

        let mut table_path = None;
        if archive.exists(SHEET_RELS) {
            let sheet_uri = PartUri::new(SHEET)?;
            let rels = Relationships::from_document(&archive.xml(SHEET_RELS)?)?;
            let table_rel = rels.iter().find(|r| r.kind() == "table").cloned();
            if let Some(rel) = table_rel {
                let path = sheet_uri.resolve(&rel.target)?;
                if archive.exists(path.zip_path()) {
                    table_path = Some(path.zip_path().to_string());
                }
            }
        }
        let table = match &table_path {
            Some(path) => Some(archive.xml(path)?),
            None => None,
        };

        Ok(Self {
            archive,
            table_path,
            sheet,
            shared_strings,
            table,
        })
    }

    /// Serialize the workbook with its edited parts
    pub fn into_bytes(mut self) -> Result<Vec<u8>> {
        self.archive.write_xml(SHEET, self.sheet);
        self.archive.write_xml(SHARED_STRINGS, self.shared_strings);
        if let (Some(path), Some(table)) = (self.table_path, self.table) {
            self.archive.write_xml(&path, table);
        }
        self.archive.to_bytes(&OutputOptions::default())
    }
}

/// A chart copied into the target under a fresh number
pub(super) struct ChartGraft {
    subtype: ChartSubtype,
    chart: String,
    workbook: Option<String>,
    created_rid: String,
}

impl ChartGraft {
    pub(super) fn prepare(
        shape: &Shape<'_>,
        subtype: ChartSubtype,
        composition: &mut Composition,
        slide: u32,
    ) -> Result<Self> {
        let (_, rel) = shape.source_relationship()?;
        let source_slide = PartUri::new(&well_known::slide(shape.source_slide))?;
        let source_chart = source_slide.resolve(&rel.target)?;
        if !shape.source.exists(source_chart.zip_path()) {
            return Err(Error::GraftIncomplete {
                part: source_slide.zip_path().to_string(),
                dependency: source_chart.zip_path().to_string(),
            });
        }

        let number = composition.counters.increment(CounterKind::Charts)?;
        let chart = well_known::chart(subtype.base(), number);
        composition.copy_file(shape.source, source_chart.zip_path(), &chart)?;
        composition.ensure_override(&chart, subtype.content_type())?;

        let workbook = copy_dependencies(shape.source, &source_chart, subtype, number, composition)?;

        let slide_rels = well_known::slide_rels(slide);
        let created_rid = composition.next_rel_id(&slide_rels)?;
        composition.append_relationship(
            &slide_rels,
            &Relationship {
                id: created_rid.clone(),
                rel_type: subtype.rel_type().to_string(),
                target: relative_target(&well_known::slide(slide), &chart),
                target_mode: TargetMode::Internal,
            },
        )?;

        log::debug!(
            "grafted {} of {} as {} ({})",
            source_chart,
            shape.source.label(),
            chart,
            created_rid
        );
        Ok(Self {
            subtype,
            chart,
            workbook,
            created_rid,
        })
    }

    pub(super) fn subtype(&self) -> ChartSubtype {
        self.subtype
    }

    pub(super) fn created_rid(&self) -> &str {
        &self.created_rid
    }

    /// Run the shape's chart callbacks on the copied chart and workbook
    pub(super) fn apply_data(&self, shape: &Shape<'_>, composition: &mut Composition) -> Result<()> {
        if shape.chart_callbacks.is_empty() {
            return Ok(());
        }

        let mut workbook = match &self.workbook {
            Some(path) => {
                let nested = composition.archive().extract(path)?;
                Some(Workbook::from_archive(nested).map_err(|e| match e {
                    Error::PartNotFound(missing) => Error::GraftIncomplete {
                        part: path.clone(),
                        dependency: missing,
                    },
                    other => other,
                })?)
            }
            None => None,
        };

        let chart = composition.xml_mut(&self.chart)?;
        for callback in &shape.chart_callbacks {
            callback(&mut *chart, workbook.as_mut())?;
        }

        if let (Some(path), Some(workbook)) = (&self.workbook, workbook) {
            let bytes = workbook.into_bytes()?;
            composition.archive_mut().write(path, bytes);
        }
        Ok(())
    }
}

/// Copy the parts a chart depends on and repatch the copied chart relationships.
///
/// Returns the target path of the embedded workbook, if the chart has one.
fn copy_dependencies(
    source: &Archive,
    source_chart: &PartUri,
    subtype: ChartSubtype,
    number: u32,
    composition: &mut Composition,
) -> Result<Option<String>> {
    let source_rels = source_chart.relationships_uri();
    if !source.exists(source_rels.zip_path()) {
        return Ok(None);
    }

    let chart = well_known::chart(subtype.base(), number);
    let chart_rels = well_known::chart_rels(subtype.base(), number);
    composition.copy_file(source, source_rels.zip_path(), &chart_rels)?;

    let source_types = ContentTypes::from_document(&source.xml(well_known::CONTENT_TYPES)?)?;
    let rels = Relationships::from_document(&source.xml(source_rels.zip_path())?)?;

    let mut workbook = None;
    let mut retargeted = Vec::new();
    for rel in rels.iter().filter(|r| r.is_internal()) {
        let dependency = source_chart.resolve(&rel.target)?;
        if !source.exists(dependency.zip_path()) {
            return Err(Error::GraftIncomplete {
                part: source_chart.zip_path().to_string(),
                dependency: dependency.zip_path().to_string(),
            });
        }

        let target = dependency_target(rel, &dependency, number)?;
        composition.copy_file(source, dependency.zip_path(), &target)?;

        match rel.rel_type.as_str() {
            rel_types::CHART_STYLE => composition.ensure_override(&target, content_types::CHART_STYLE)?,
            rel_types::CHART_COLOR_STYLE => {
                composition.ensure_override(&target, content_types::CHART_COLOR_STYLE)?
            }
            _ => match source_types.override_for(&dependency) {
                Some(content_type) => composition.ensure_override(&target, content_type)?,
                None => {
                    if let Some(extension) = dependency.extension() {
                        let content_type = source_types
                            .get(&dependency)
                            .unwrap_or_else(|| content_types::for_extension(extension));
                        composition.ensure_default(extension, content_type)?;
                    }
                }
            },
        }

        if rel.rel_type == rel_types::PACKAGE {
            workbook = Some(target.clone());
        }
        retargeted.push((rel.id.clone(), relative_target(&chart, &target)));
    }

    let doc = composition.xml_mut(&chart_rels)?;
    for element in doc.root.elements_mut() {
        let Some(id) = element.attr("Id") else {
            continue;
        };
        if let Some((_, target)) = retargeted.iter().find(|(rid, _)| rid == id) {
            element.set_attr("Target", target.as_str());
        }
    }
    let patched = Relationships::from_document(doc)?;
    for rel in patched.iter() {
        composition.tracker.track_relation(&chart_rels, rel);
    }

    Ok(workbook)
}

/// Target path of a chart dependency under chart number `number`
fn dependency_target(rel: &Relationship, dependency: &PartUri, number: u32) -> Result<String> {
    match rel.rel_type.as_str() {
        rel_types::CHART_STYLE => Ok(format!("{}/style{}.xml", well_known::CHARTS_DIR, number)),
        rel_types::CHART_COLOR_STYLE => Ok(format!("{}/colors{}.xml", well_known::CHARTS_DIR, number)),
        rel_types::PACKAGE => {
            let parts = decompose_file_name(dependency.zip_path());
            let name = match parts.extension.as_str() {
                "" => format!("{}-chart{}", parts.base, number),
                ext => format!("{}-chart{}.{}", parts.base, number, ext),
            };
            Ok(format!("{}/{}", well_known::EMBEDDINGS_DIR, name))
        }
        _ => suffixed_path(dependency.zip_path(), &format!("-chart{}", number)),
    }
}
