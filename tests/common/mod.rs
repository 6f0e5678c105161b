//! In-memory presentations shared by the integration tests

#![allow(dead_code)]

use linch_pptx_rs::opc::{content_types, rel_types, well_known, Relationships};
use linch_pptx_rs::xml::XmlDocument;
use linch_pptx_rs::{Archive, OutputOptions, PartUri};

const TABLE_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/table";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn relationships(entries: &[(&str, &str, &str)]) -> Vec<u8> {
    let body: String = entries
        .iter()
        .map(|(id, rel_type, target)| {
            if target.starts_with("http") {
                format!(
                    r#"<Relationship Id="{}" Type="{}" Target="{}" TargetMode="External"/>"#,
                    id, rel_type, target
                )
            } else {
                format!(
                    r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
                    id, rel_type, target
                )
            }
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
        body
    )
    .into_bytes()
}

fn slide_xml(shapes: &str) -> Vec<u8> {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{}</p:spTree></p:cSld></p:sld>"#,
        shapes
    )
    .into_bytes()
}

/// A presentation with `slides` slides holding one title shape each
pub fn root_deck(slides: u32) -> Archive {
    let mut archive = Archive::new("root.pptx");
    let overrides: String = (1..=slides)
        .map(|n| {
            format!(
                r#"<Override PartName="/ppt/slides/slide{}.xml" ContentType="{}"/>"#,
                n,
                content_types::SLIDE
            )
        })
        .collect();
    archive.write(
        well_known::CONTENT_TYPES,
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="{}"/><Default Extension="xml" ContentType="{}"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/><Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/>{}</Types>"#,
            content_types::RELATIONSHIPS,
            content_types::XML,
            overrides
        )
        .into_bytes(),
    );
    archive.write(
        well_known::PACKAGE_RELS,
        relationships(&[("rId1", rel_types::OFFICE_DOCUMENT, "ppt/presentation.xml")]),
    );

    let ids: String = (1..=slides)
        .map(|n| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 255 + n, n + 1))
        .collect();
    archive.write(
        well_known::PRESENTATION,
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:presentation xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:sldMasterIdLst/><p:sldIdLst>{}</p:sldIdLst><p:sldSz cx="12192000" cy="6858000"/></p:presentation>"#,
            ids
        )
        .into_bytes(),
    );
    let targets: Vec<(String, String)> = (1..=slides)
        .map(|n| (format!("rId{}", n + 1), format!("slides/slide{}.xml", n)))
        .collect();
    let entries: Vec<(&str, &str, &str)> = targets
        .iter()
        .map(|(id, target)| (id.as_str(), rel_types::SLIDE, target.as_str()))
        .collect();
    archive.write(well_known::PRESENTATION_RELS, relationships(&entries));

    archive.write(
        "ppt/slideLayouts/slideLayout1.xml",
        br#"<p:sldLayout xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"/>"#.to_vec(),
    );
    for n in 1..=slides {
        archive.write(
            &well_known::slide(n),
            slide_xml(&format!(
                r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Title {}"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:txBody><a:p><a:r><a:t>Slide {}</a:t></a:r></a:p></p:txBody></p:sp>"#,
                n, n
            )),
        );
        archive.write(
            &well_known::slide_rels(n),
            relationships(&[("rId1", rel_types::SLIDE_LAYOUT, "../slideLayouts/slideLayout1.xml")]),
        );
    }
    archive
}

/// An embedded workbook with a sheet, shared strings and a table on the sheet
pub fn workbook() -> Vec<u8> {
    let mut xlsx = Archive::new("workbook.xlsx");
    xlsx.write(
        well_known::CONTENT_TYPES,
        br#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/></Types>"#.to_vec(),
    );
    xlsx.write(
        "xl/workbook.xml",
        br#"<workbook><sheets><sheet name="Sheet1" sheetId="1"/></sheets></workbook>"#.to_vec(),
    );
    xlsx.write(
        "xl/worksheets/sheet1.xml",
        br#"<worksheet><dimension ref="A1:C3"/><sheetData><row r="1"><c r="B1" t="s"><v>0</v></c><c r="C1" t="s"><v>1</v></c></row></sheetData></worksheet>"#.to_vec(),
    );
    xlsx.write(
        "xl/worksheets/_rels/sheet1.xml.rels",
        relationships(&[("rId1", TABLE_REL, "../tables/table1.xml")]),
    );
    xlsx.write(
        "xl/sharedStrings.xml",
        br#"<sst count="2" uniqueCount="2"><si><t>Series 1</t></si><si><t>Series 2</t></si></sst>"#.to_vec(),
    );
    xlsx.write(
        "xl/tables/table1.xml",
        br#"<table id="1" ref="A1:C3"><autoFilter ref="A1:C3"/><tableColumns count="3"><tableColumn id="1" name=" "/><tableColumn id="2" name="Series 1"/><tableColumn id="3" name="Series 2"/></tableColumns></table>"#.to_vec(),
    );
    xlsx.to_bytes(&OutputOptions::default())
        .expect("workbook serializes")
}

const CHART: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><c:chartSpace xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><c:chart><c:plotArea><c:barChart><c:grouping val="stacked"/><c:ser><c:idx val="0"/><c:order val="0"/><c:tx><c:strRef><c:f>Sheet1!$B$1</c:f></c:strRef></c:tx><c:cat><c:strRef><c:f>Sheet1!$A$2:$A$3</c:f></c:strRef></c:cat><c:val><c:numRef><c:f>Sheet1!$B$2:$B$3</c:f><c:numCache><c:formatCode>General</c:formatCode><c:ptCount val="2"/></c:numCache></c:numRef></c:val></c:ser><c:ser><c:idx val="1"/><c:order val="1"/><c:tx><c:strRef><c:f>Sheet1!$C$1</c:f></c:strRef></c:tx><c:cat><c:strRef><c:f>Sheet1!$A$2:$A$3</c:f></c:strRef></c:cat><c:val><c:numRef><c:f>Sheet1!$C$2:$C$3</c:f></c:numRef></c:val></c:ser></c:barChart></c:plotArea></c:chart><c:externalData r:id="rId1"/></c:chartSpace>"#;

/// A template deck whose first slide holds a chart, a picture, a table and a linked text box.
///
/// Part numbers deliberately differ from what a fresh target would allocate.
pub fn template() -> Archive {
    let mut archive = root_deck(1);

    let mut types = archive.xml(well_known::CONTENT_TYPES).expect("content types");
    for (part, content_type) in [
        ("/ppt/charts/chart3.xml", content_types::CHART),
        ("/ppt/charts/style3.xml", content_types::CHART_STYLE),
        ("/ppt/charts/colors3.xml", content_types::CHART_COLOR_STYLE),
    ] {
        types.root.push_child(
            linch_pptx_rs::xml::RawXmlElement::new("Override")
                .with_attr("PartName", part)
                .with_attr("ContentType", content_type),
        );
    }
    for (extension, content_type) in [("xlsx", content_types::SPREADSHEET), ("png", "image/png")] {
        types.root.push_child(
            linch_pptx_rs::xml::RawXmlElement::new("Default")
                .with_attr("Extension", extension)
                .with_attr("ContentType", content_type),
        );
    }
    archive.write_xml(well_known::CONTENT_TYPES, types);

    archive.write(
        &well_known::slide(1),
        slide_xml(concat!(
            r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="4" name="BarsStacked"/><p:cNvGraphicFramePr/><p:nvPr/></p:nvGraphicFramePr><p:xfrm/><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/chart"><c:chart xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart" r:id="rId2"/></a:graphicData></a:graphic></p:graphicFrame>"#,
            r#"<p:pic><p:nvPicPr><p:cNvPr id="5" name="Logo"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId3"/></p:blipFill><p:spPr/></p:pic>"#,
            r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="6" name="Figures"/><p:cNvGraphicFramePr/><p:nvPr/></p:nvGraphicFramePr><p:xfrm/><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/table"><a:tbl><a:tblPr/><a:tblGrid><a:gridCol w="100"/><a:gridCol w="100"/><a:gridCol w="100"/></a:tblGrid>"#,
            r#"<a:tr h="10"><a:tc><a:txBody><a:bodyPr/><a:p><a:r><a:t>h1</a:t></a:r></a:p></a:txBody></a:tc><a:tc><a:txBody><a:bodyPr/><a:p><a:r><a:t>h2</a:t></a:r></a:p></a:txBody></a:tc><a:tc><a:txBody><a:bodyPr/><a:p><a:r><a:t>h3</a:t></a:r></a:p></a:txBody></a:tc></a:tr>"#,
            r#"<a:tr h="10"><a:tc><a:txBody><a:bodyPr/><a:p><a:r><a:t>a</a:t></a:r></a:p></a:txBody></a:tc><a:tc><a:txBody><a:bodyPr/><a:p><a:r><a:t>b</a:t></a:r></a:p></a:txBody></a:tc><a:tc><a:txBody><a:bodyPr/><a:p><a:r><a:t>c</a:t></a:r></a:p></a:txBody></a:tc></a:tr>"#,
            r#"<a:tr h="10"><a:tc><a:txBody><a:bodyPr/><a:p><a:r><a:t>d</a:t></a:r></a:p></a:txBody></a:tc><a:tc><a:txBody><a:bodyPr/><a:p><a:r><a:t>e</a:t></a:r></a:p></a:txBody></a:tc><a:tc><a:txBody><a:bodyPr/><a:p><a:r><a:t>f</a:t></a:r></a:p></a:txBody></a:tc></a:tr>"#,
            r#"</a:tbl></a:graphicData></a:graphic></p:graphicFrame>"#,
            r#"<p:sp><p:nvSpPr><p:cNvPr id="7" name="Link"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:txBody><a:p><a:r><a:rPr><a:hlinkClick r:id="rId4"/></a:rPr><a:t>docs</a:t></a:r></a:p></p:txBody></p:sp>"#
        )),
    );
    archive.write(
        &well_known::slide_rels(1),
        relationships(&[
            ("rId1", rel_types::SLIDE_LAYOUT, "../slideLayouts/slideLayout1.xml"),
            ("rId2", rel_types::CHART, "../charts/chart3.xml"),
            ("rId3", rel_types::IMAGE, "../media/image7.png"),
            ("rId4", rel_types::HYPERLINK, "https://example.com/docs"),
            ("rId5", rel_types::NOTES_SLIDE, "../notesSlides/notesSlide1.xml"),
        ]),
    );
    archive.write(
        "ppt/notesSlides/notesSlide1.xml",
        br#"<p:notes xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"/>"#.to_vec(),
    );

    archive.write("ppt/charts/chart3.xml", CHART.as_bytes().to_vec());
    archive.write(
        "ppt/charts/_rels/chart3.xml.rels",
        relationships(&[
            ("rId1", rel_types::PACKAGE, "../embeddings/Microsoft_Excel_Worksheet3.xlsx"),
            ("rId2", rel_types::CHART_STYLE, "style3.xml"),
            ("rId3", rel_types::CHART_COLOR_STYLE, "colors3.xml"),
        ]),
    );
    archive.write("ppt/charts/style3.xml", b"<cs:chartStyle/>".to_vec());
    archive.write("ppt/charts/colors3.xml", b"<cs:colorStyle/>".to_vec());
    archive.write("ppt/embeddings/Microsoft_Excel_Worksheet3.xlsx", workbook());
    archive.write("ppt/media/image7.png", vec![0x89, b'P', b'N', b'G']);
    archive
}

/// Serialize and reopen, as a consumer of the output would see it
pub fn reopen(bytes: &[u8]) -> Archive {
    Archive::from_bytes("out.pptx", bytes).expect("output is a readable package")
}

/// Relationship ids referenced by a part
fn referenced_ids(doc: &XmlDocument) -> Vec<String> {
    let root = &doc.root;
    root.find_paths_where(|_| true)
        .iter()
        .filter_map(|path| root.at_path(path))
        .flat_map(|element| {
            ["r:id", "r:embed", "r:link"]
                .into_iter()
                .filter_map(|attr| element.attr(attr).map(str::to_string))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Every `.rels` has its part, every id a part uses is declared, every internal target
/// exists, and every Override names a part
pub fn assert_consistent(archive: &Archive) {
    let rels_files: Vec<String> = archive
        .filter(|name| name.ends_with(".rels"))
        .into_iter()
        .map(str::to_string)
        .collect();

    for rels_file in &rels_files {
        let rels = Relationships::from_document(&archive.xml(rels_file).expect("rels parse"))
            .expect("rels read");
        let source = PartUri::new(rels_file).unwrap().relationships_source();

        for rel in rels.iter().filter(|r| r.is_internal()) {
            let target = match &source {
                Some(part) => part.resolve(&rel.target).unwrap(),
                None => PartUri::new(&rel.target).unwrap(),
            };
            assert!(
                archive.exists(target.zip_path()),
                "{} {} points at missing {}",
                rels_file,
                rel.id,
                target
            );
        }

        if let Some(part) = source {
            assert!(
                archive.exists(part.zip_path()),
                "{} belongs to missing {}",
                rels_file,
                part
            );
            if part.extension() != Some("xml") {
                continue;
            }
            let doc = archive.xml(part.zip_path()).expect("part parses");
            for id in referenced_ids(&doc) {
                assert!(
                    rels.get(&id).is_some(),
                    "{} references undeclared {}",
                    part,
                    id
                );
            }
        }
    }

    let types = archive.xml(well_known::CONTENT_TYPES).expect("content types");
    for element in types.root.find_all("Override") {
        let part = element.attr("PartName").unwrap_or_default();
        assert!(
            archive.exists(part.trim_start_matches('/')),
            "override for missing {}",
            part
        );
    }
}

/// Part names registered with an Override of `content_type`
pub fn overrides_of(archive: &Archive, content_type: &str) -> Vec<String> {
    archive
        .xml(well_known::CONTENT_TYPES)
        .expect("content types")
        .root
        .find_all("Override")
        .into_iter()
        .filter(|e| e.attr("ContentType") == Some(content_type))
        .filter_map(|e| e.attr("PartName").map(str::to_string))
        .collect()
}

/// Relationships declared by a part's `.rels` file
pub fn relationships_of(archive: &Archive, rels_file: &str) -> Relationships {
    Relationships::from_document(&archive.xml(rels_file).expect("rels present")).expect("rels read")
}
