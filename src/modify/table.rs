//! Table data substitution on a `a:tbl` inside a graphic frame

use crate::compose::xml_helper::slice_collection;
use crate::error::{Error, Result};
use crate::xml::{RawXmlElement, RawXmlNode};

/// Rows of cell texts, header row included when the table has one
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableData {
    pub body: Vec<TableRow>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableRow {
    pub values: Vec<String>,
}

impl TableData {
    pub fn from_rows<R, S>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            body: rows
                .into_iter()
                .map(|row| TableRow {
                    values: row.into_iter().map(Into::into).collect(),
                })
                .collect(),
        }
    }

    /// Widest row
    pub fn columns(&self) -> usize {
        self.body.iter().map(|row| row.values.len()).max().unwrap_or(0)
    }
}

/// Element callback filling a table shape with `data`
pub fn set_table(data: TableData) -> impl Fn(&mut RawXmlElement) -> Result<()> + 'static {
    move |element: &mut RawXmlElement| update_table(element, &data)
}

/// Write cell texts, then cut rows and columns the data does not cover.
///
/// Rows are never added; data beyond the template's rows is dropped with a warning.
pub fn update_table(element: &mut RawXmlElement, data: &TableData) -> Result<()> {
    let table = element
        .find_first_mut("a:tbl")
        .ok_or_else(|| Error::InvalidDocument("shape holds no a:tbl".into()))?;

    let rows = table.child_positions("a:tr");
    if data.body.len() > rows.len() {
        log::warn!(
            "table has {} rows, {} given; extra rows are dropped",
            rows.len(),
            data.body.len()
        );
    }

    for (row, &position) in data.body.iter().zip(rows.iter()) {
        let RawXmlNode::Element(tr) = &mut table.children[position] else {
            continue;
        };
        let cells = tr.child_positions("a:tc");
        for (value, &cell) in row.values.iter().zip(cells.iter()) {
            if let RawXmlNode::Element(tc) = &mut tr.children[cell] {
                set_cell_text(tc, value);
            }
        }
    }

    slice_collection(table, "a:tr", data.body.len(), None);

    let columns = data.columns();
    if columns > 0 {
        for tr in table.elements_mut().filter(|e| e.name == "a:tr") {
            slice_collection(tr, "a:tc", columns, None);
        }
        if let Some(grid) = table.child_mut("a:tblGrid") {
            slice_collection(grid, "a:gridCol", columns, None);
        }
    }
    Ok(())
}

/// Put `value` into the first text run of a cell and empty the others
fn set_cell_text(cell: &mut RawXmlElement, value: &str) {
    let texts = cell.find_paths("a:t");
    if let Some((first, rest)) = texts.split_first() {
        if let Some(text) = cell.at_path_mut(first) {
            text.set_text(value);
        }
        for path in rest {
            if let Some(text) = cell.at_path_mut(path) {
                text.set_text("");
            }
        }
        return;
    }

    let run = RawXmlElement::new("a:r").with_child(RawXmlElement::new("a:t").with_text(value));
    match cell.find_first_mut("a:p") {
        Some(paragraph) => {
            let at = paragraph
                .child_positions("a:endParaRPr")
                .first()
                .copied()
                .unwrap_or(paragraph.children.len());
            paragraph.insert_child(at, run);
        }
        None => cell.insert_child(
            0,
            RawXmlElement::new("a:txBody")
                .with_child(RawXmlElement::new("a:bodyPr"))
                .with_child(RawXmlElement::new("a:lstStyle"))
                .with_child(RawXmlElement::new("a:p").with_child(run)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::XmlDocument;
    use pretty_assertions::assert_eq;

    fn frame(rows: usize, columns: usize) -> RawXmlElement {
        let grid: String = (0..columns).map(|_| r#"<a:gridCol w="100"/>"#).collect();
        let row: String = (0..columns)
            .map(|c| format!("<a:tc><a:txBody><a:bodyPr/><a:p><a:r><a:t>c{}</a:t></a:r></a:p></a:txBody></a:tc>", c))
            .collect();
        let body: String = (0..rows)
            .map(|r| format!(r#"<a:tr h="370" id="{}">{}</a:tr>"#, r, row))
            .collect();
        XmlDocument::parse(
            format!(
                "<p:graphicFrame><a:graphic><a:graphicData><a:tbl><a:tblPr/><a:tblGrid>{}</a:tblGrid>{}</a:tbl></a:graphicData></a:graphic></p:graphicFrame>",
                grid, body
            )
            .as_bytes(),
        )
        .unwrap()
        .root
    }

    fn texts(element: &RawXmlElement) -> Vec<Vec<String>> {
        element
            .find_all("a:tr")
            .iter()
            .map(|tr| tr.find_all("a:tc").iter().map(|tc| tc.text()).collect())
            .collect()
    }

    #[test]
    fn test_truncates_rows_from_the_tail() {
        let mut element = frame(6, 2);
        let data = TableData::from_rows([["a", "b"], ["c", "d"], ["e", "f"]]);
        update_table(&mut element, &data).unwrap();

        let ids: Vec<_> = element
            .find_all("a:tr")
            .iter()
            .filter_map(|tr| tr.attr("id"))
            .collect();
        assert_eq!(ids, vec!["0", "1", "2"]);
        assert_eq!(texts(&element)[2], vec!["e", "f"]);
    }

    #[test]
    fn test_cuts_columns_and_grid() {
        let mut element = frame(2, 4);
        let data = TableData::from_rows([vec!["x", "y"], vec!["z"]]);
        update_table(&mut element, &data).unwrap();

        assert_eq!(element.find_all("a:gridCol").len(), 2);
        assert_eq!(texts(&element), vec![vec!["x", "y"], vec!["z", "c1"]]);
    }

    #[test]
    fn test_empty_cell_gets_a_run() {
        let mut cell = XmlDocument::parse(
            b"<a:tc><a:txBody><a:bodyPr/><a:p><a:endParaRPr lang=\"en-US\"/></a:p></a:txBody></a:tc>",
        )
        .unwrap()
        .root;
        set_cell_text(&mut cell, "new");

        let paragraph = cell.find_first("a:p").unwrap();
        let names: Vec<_> = paragraph.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a:r", "a:endParaRPr"]);
        assert_eq!(cell.text(), "new");
    }

    #[test]
    fn test_missing_table() {
        let mut element = XmlDocument::parse(b"<p:sp/>").unwrap().root;
        assert!(update_table(&mut element, &TableData::default()).is_err());
    }
}
