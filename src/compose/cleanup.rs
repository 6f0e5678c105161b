//! Post-composition cleanup: orphaned files, stale registry entries, unused media,
//! slide id normalization and slide ordering.

use crate::compose::file_helper::remove_from_directory;
use crate::compose::xml_helper::{remove_if, sort_collection};
use crate::compose::ContentTracker;
use crate::error::Result;
use crate::opc::{well_known, Archive, PartUri};

/// Directories never pruned as orphans; masters and layouts stay complete.
///
/// Layouts and masters referenced only by deleted slides therefore survive cleanup.
pub const SKIP_DIRS: [&str; 4] = [
    "ppt/slideMasters",
    "ppt/slideMasters/_rels",
    "ppt/slideLayouts",
    "ppt/slideLayouts/_rels",
];

/// Extensions considered by [`remove_unused_images`]
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "svg", "emf"];

/// First slide id PowerPoint accepts
pub const FIRST_SLIDE_ID: u32 = 256;

/// What a cleanup pass removed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub files: Vec<String>,
    pub content_types: Vec<String>,
    pub images: Vec<String>,
}

impl CleanupReport {
    /// Whether the pass changed nothing
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.content_types.is_empty() && self.images.is_empty()
    }
}

/// Run every cleanup step in order; `order` is an optional one-based slide sequence
pub fn run(
    archive: &mut Archive,
    tracker: &mut ContentTracker,
    order: Option<&[usize]>,
) -> Result<CleanupReport> {
    analyze(archive, tracker)?;

    let report = CleanupReport {
        files: remove_unused_files(archive, tracker),
        content_types: remove_unused_content_types(archive)?,
        images: remove_unused_images(archive, tracker)?,
    };

    if let Some(order) = order {
        sort_slides(archive, order)?;
    }
    normalize_slide_ids(archive)?;

    log::info!(
        "cleanup removed {} files, {} content types, {} images",
        report.files.len(),
        report.content_types.len(),
        report.images.len()
    );
    Ok(report)
}

/// Walk the package, then everything reachable from the parts in [`SKIP_DIRS`]
fn analyze(archive: &Archive, tracker: &mut ContentTracker) -> Result<()> {
    tracker.analyze_contents(archive)?;
    tracker.analyze_from(archive, retained_parts(archive))
}

fn retained_parts(archive: &Archive) -> Vec<PartUri> {
    archive
        .filter(|name| {
            let dir = name.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
            SKIP_DIRS.contains(&dir) && !name.ends_with(".rels")
        })
        .into_iter()
        .filter_map(|name| PartUri::new(name).ok())
        .collect()
}

/// Remove files in tracked directories that the tracker does not require.
///
/// After [`ContentTracker::analyze_contents`] a tracked file nothing reaches is
/// removed as well, so parts left behind by shape or slide removal go too.
pub fn remove_unused_files(archive: &mut Archive, tracker: &ContentTracker) -> Vec<String> {
    let dirs: Vec<String> = tracker
        .directories()
        .filter(|dir| !dir.is_empty() && !SKIP_DIRS.contains(dir))
        .map(str::to_string)
        .collect();

    let mut removed = Vec::new();
    for dir in dirs {
        removed.extend(remove_from_directory(archive, &dir, |file| {
            !tracker.is_required(&file.name)
        }));
    }
    removed
}

/// Remove `Override` entries whose part no longer exists
pub fn remove_unused_content_types(archive: &mut Archive) -> Result<Vec<String>> {
    let existing: Vec<String> = archive.part_names().map(str::to_string).collect();

    let removed = remove_if(archive, well_known::CONTENT_TYPES, "Override", |_, element| {
        match element.attr("PartName") {
            Some(part_name) => !existing
                .iter()
                .any(|name| name == part_name.trim_start_matches('/')),
            None => false,
        }
    })?;

    Ok(removed
        .iter()
        .filter_map(|e| e.attr("PartName").map(str::to_string))
        .collect())
}

/// Remove media no slide, layout, master or chart refers to
pub fn remove_unused_images(
    archive: &mut Archive,
    tracker: &mut ContentTracker,
) -> Result<Vec<String>> {
    analyze(archive, tracker)?;

    let mut keep = Vec::new();
    for dir in [
        well_known::SLIDES_DIR,
        well_known::SLIDE_MASTERS_DIR,
        well_known::SLIDE_LAYOUTS_DIR,
        well_known::CHARTS_DIR,
    ] {
        tracker.collect(dir, "image", &mut keep);
    }

    Ok(remove_from_directory(archive, well_known::MEDIA_DIR, |file| {
        let is_image = PartUri::new(&file.name)
            .ok()
            .and_then(|uri| uri.extension().map(str::to_lowercase))
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()));
        is_image && !keep.contains(&file.relative_path)
    }))
}

/// Renumber `p:sldId` ids to 256, 257, ... in document order
pub fn normalize_slide_ids(archive: &mut Archive) -> Result<()> {
    let presentation = archive.read_xml(well_known::PRESENTATION)?;
    let paths = presentation.root.find_paths("p:sldId");
    for (i, path) in paths.iter().enumerate() {
        if let Some(slide_id) = presentation.root.at_path_mut(path) {
            slide_id.set_attr("id", (FIRST_SLIDE_ID + i as u32).to_string());
        }
    }
    Ok(())
}

/// Reorder `p:sldIdLst` by a one-based sequence of current slide positions
pub fn sort_slides(archive: &mut Archive, order: &[usize]) -> Result<()> {
    let zero_based: Vec<usize> = order
        .iter()
        .map(|position| position.checked_sub(1).unwrap_or(usize::MAX))
        .collect();

    let presentation = archive.read_xml(well_known::PRESENTATION)?;
    if let Some(list) = presentation.root.find_first_mut("p:sldIdLst") {
        sort_collection(list, "p:sldId", &zero_based);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opc::rel_types;
    use pretty_assertions::assert_eq;

    fn slide_ids(archive: &mut Archive) -> Vec<(String, String)> {
        archive
            .read_xml(well_known::PRESENTATION)
            .unwrap()
            .root
            .find_all("p:sldId")
            .iter()
            .map(|e| {
                (
                    e.attr("id").unwrap_or_default().to_string(),
                    e.attr("r:id").unwrap_or_default().to_string(),
                )
            })
            .collect()
    }

    fn presentation(ids: &[(u32, &str)]) -> Archive {
        let list: String = ids
            .iter()
            .map(|(id, rid)| format!(r#"<p:sldId id="{}" r:id="{}"/>"#, id, rid))
            .collect();
        let mut archive = Archive::new("deck.pptx");
        archive.write(
            well_known::PRESENTATION,
            format!("<p:presentation><p:sldIdLst>{}</p:sldIdLst></p:presentation>", list).into_bytes(),
        );
        archive
    }

    #[test]
    fn test_normalize_slide_ids() {
        let mut archive = presentation(&[(12, "rId2"), (99, "rId3"), (5, "rId4")]);
        normalize_slide_ids(&mut archive).unwrap();

        let ids: Vec<_> = slide_ids(&mut archive).into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["256", "257", "258"]);
    }

    #[test]
    fn test_sort_slides_one_based() {
        let mut archive = presentation(&[(256, "rId2"), (257, "rId3"), (258, "rId4")]);
        sort_slides(&mut archive, &[3, 1, 2]).unwrap();

        let rids: Vec<_> = slide_ids(&mut archive).into_iter().map(|(_, rid)| rid).collect();
        assert_eq!(rids, vec!["rId4", "rId2", "rId3"]);
    }

    #[test]
    fn test_sort_slides_ignores_invalid_positions() {
        let mut archive = presentation(&[(256, "rId2"), (257, "rId3")]);
        sort_slides(&mut archive, &[0, 2, 5]).unwrap();

        let rids: Vec<_> = slide_ids(&mut archive).into_iter().map(|(_, rid)| rid).collect();
        assert_eq!(rids, vec!["rId2", "rId3"]);
    }

    #[test]
    fn test_remove_unused_content_types() {
        let mut archive = Archive::new("deck.pptx");
        archive.write(
            well_known::CONTENT_TYPES,
            br#"<Types><Default Extension="xml" ContentType="application/xml"/><Override PartName="/ppt/slides/slide1.xml" ContentType="s"/><Override PartName="/ppt/charts/chart3.xml" ContentType="c"/></Types>"#.to_vec(),
        );
        archive.write("ppt/slides/slide1.xml", b"<p:sld/>".to_vec());

        let removed = remove_unused_content_types(&mut archive).unwrap();
        assert_eq!(removed, vec!["/ppt/charts/chart3.xml"]);

        let again = remove_unused_content_types(&mut archive).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_remove_unused_images_keeps_chart_images() {
        let mut archive = Archive::new("deck.pptx");
        archive.write(
            well_known::PACKAGE_RELS,
            format!(
                r#"<Relationships><Relationship Id="rId1" Type="{}" Target="ppt/presentation.xml"/></Relationships>"#,
                rel_types::OFFICE_DOCUMENT
            )
            .into_bytes(),
        );
        archive.write(well_known::PRESENTATION, b"<p:presentation/>".to_vec());
        archive.write(
            well_known::PRESENTATION_RELS,
            format!(
                r#"<Relationships><Relationship Id="rId2" Type="{}" Target="slides/slide1.xml"/></Relationships>"#,
                rel_types::SLIDE
            )
            .into_bytes(),
        );
        archive.write("ppt/slides/slide1.xml", b"<p:sld/>".to_vec());
        archive.write(
            "ppt/slides/_rels/slide1.xml.rels",
            format!(
                r#"<Relationships><Relationship Id="rId2" Type="{}" Target="../charts/chart1.xml"/></Relationships>"#,
                rel_types::CHART
            )
            .into_bytes(),
        );
        archive.write("ppt/charts/chart1.xml", b"<c:chartSpace/>".to_vec());
        archive.write(
            "ppt/charts/_rels/chart1.xml.rels",
            format!(
                r#"<Relationships><Relationship Id="rId1" Type="{}" Target="../media/image1-chart1.png"/></Relationships>"#,
                rel_types::IMAGE
            )
            .into_bytes(),
        );
        archive.write("ppt/media/image1-chart1.png", vec![0]);
        archive.write("ppt/media/image7.png", vec![0]);
        archive.write("ppt/media/media1.mp4", vec![0]);

        let mut tracker = ContentTracker::new();
        let removed = remove_unused_images(&mut archive, &mut tracker).unwrap();

        assert_eq!(removed, vec!["ppt/media/image7.png"]);
        assert!(archive.exists("ppt/media/image1-chart1.png"));
        assert!(archive.exists("ppt/media/media1.mp4"));
    }

    #[test]
    fn test_remove_unused_files_skips_layouts() {
        let mut archive = Archive::new("deck.pptx");
        archive.write("ppt/slideLayouts/slideLayout1.xml", vec![]);
        archive.write("ppt/slideLayouts/slideLayout2.xml", vec![]);
        archive.write("ppt/charts/chart1.xml", vec![]);
        archive.write("ppt/charts/chart2.xml", vec![]);

        let mut tracker = ContentTracker::new();
        tracker.track_file("ppt/slideLayouts/slideLayout1.xml");
        tracker.track_file("ppt/charts/chart2.xml");

        let removed = remove_unused_files(&mut archive, &tracker);
        assert_eq!(removed, vec!["ppt/charts/chart1.xml"]);
        assert!(archive.exists("ppt/slideLayouts/slideLayout2.xml"));
    }
    #[test]
    fn test_remove_unused_files_drops_unreachable_tracked_parts() {
        let mut archive = Archive::new("deck.pptx");
        archive.write(
            well_known::PACKAGE_RELS,
            format!(
                r#"<Relationships><Relationship Id="rId1" Type="{}" Target="ppt/presentation.xml"/></Relationships>"#,
                rel_types::OFFICE_DOCUMENT
            )
            .into_bytes(),
        );
        archive.write(well_known::PRESENTATION, b"<p:presentation/>".to_vec());
        archive.write(
            well_known::PRESENTATION_RELS,
            format!(
                r#"<Relationships><Relationship Id="rId2" Type="{}" Target="charts/chart1.xml"/></Relationships>"#,
                rel_types::CHART
            )
            .into_bytes(),
        );
        archive.write("ppt/charts/chart1.xml", b"<c:chartSpace/>".to_vec());
        archive.write("ppt/charts/chart2.xml", b"<c:chartSpace/>".to_vec());
        archive.write("ppt/charts/style2.xml", b"<cs:chartStyle/>".to_vec());
        archive.write(
            "ppt/charts/_rels/chart2.xml.rels",
            format!(
                r#"<Relationships><Relationship Id="rId1" Type="{}" Target="style2.xml"/></Relationships>"#,
                rel_types::CHART_STYLE
            )
            .into_bytes(),
        );

        let mut tracker = ContentTracker::new();
        for file in [
            "ppt/charts/chart2.xml",
            "ppt/charts/style2.xml",
            "ppt/charts/_rels/chart2.xml.rels",
        ] {
            tracker.track_file(file);
        }
        tracker.analyze_contents(&archive).unwrap();

        let mut removed = remove_unused_files(&mut archive, &tracker);
        removed.sort();
        assert_eq!(
            removed,
            vec![
                "ppt/charts/_rels/chart2.xml.rels",
                "ppt/charts/chart2.xml",
                "ppt/charts/style2.xml",
            ]
        );
        assert!(archive.exists("ppt/charts/chart1.xml"));
    }

    #[test]
    fn test_run_keeps_media_of_retained_layouts() {
        let mut archive = Archive::new("deck.pptx");
        archive.write(
            well_known::PACKAGE_RELS,
            format!(
                r#"<Relationships><Relationship Id="rId1" Type="{}" Target="ppt/presentation.xml"/></Relationships>"#,
                rel_types::OFFICE_DOCUMENT
            )
            .into_bytes(),
        );
        archive.write(
            well_known::CONTENT_TYPES,
            br#"<Types><Default Extension="png" ContentType="image/png"/></Types>"#.to_vec(),
        );
        archive.write(well_known::PRESENTATION, b"<p:presentation/>".to_vec());
        archive.write("ppt/slideLayouts/slideLayout2.xml", b"<p:sldLayout/>".to_vec());
        archive.write(
            "ppt/slideLayouts/_rels/slideLayout2.xml.rels",
            format!(
                r#"<Relationships><Relationship Id="rId1" Type="{}" Target="../media/image4.png"/></Relationships>"#,
                rel_types::IMAGE
            )
            .into_bytes(),
        );
        archive.write("ppt/media/image4.png", vec![0]);
        archive.write("ppt/media/image5.png", vec![0]);

        let mut tracker = ContentTracker::new();
        tracker.track_file("ppt/media/image4.png");
        tracker.track_file("ppt/media/image5.png");
        let report = run(&mut archive, &mut tracker, None).unwrap();

        assert_eq!(report.files, vec!["ppt/media/image5.png"]);
        assert!(archive.exists("ppt/slideLayouts/slideLayout2.xml"));
        assert!(archive.exists("ppt/media/image4.png"));
    }
}
