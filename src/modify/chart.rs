//! Chart data substitution: series caches in the chart part, cells and shared
//! strings in the embedded workbook.

use crate::compose::xml_helper::append_shared_string;
use crate::error::Result;
use crate::shapes::Workbook;
use crate::xml::{RawXmlElement, RawXmlNode, XmlDocument};

/// Name of the worksheet chart formulas point at
const SHEET_NAME: &str = "Sheet1";

/// Table of chart values: one column per series, one row per category
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChartData {
    pub series: Vec<ChartSeries>,
    pub categories: Vec<ChartCategory>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChartSeries {
    pub label: String,
}

/// A category label with one value per series; `None` leaves the point empty
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChartCategory {
    pub label: String,
    pub values: Vec<Option<f64>>,
}

impl ChartData {
    pub fn new(series: &[&str]) -> Self {
        Self {
            series: series
                .iter()
                .map(|label| ChartSeries {
                    label: label.to_string(),
                })
                .collect(),
            categories: Vec::new(),
        }
    }

    /// Append a category row
    pub fn category(mut self, label: &str, values: &[Option<f64>]) -> Self {
        self.categories.push(ChartCategory {
            label: label.to_string(),
            values: values.to_vec(),
        });
        self
    }

    fn value(&self, category: usize, series: usize) -> Option<f64> {
        self.categories
            .get(category)
            .and_then(|c| c.values.get(series).copied().flatten())
    }

    /// Worksheet range covered by the data, header row included
    pub fn range(&self) -> String {
        format!(
            "A1:{}{}",
            column_letter(self.series.len()),
            self.categories.len() + 1
        )
    }
}

/// Chart callback replacing the chart's data with `data`
pub fn set_chart_data(
    data: ChartData,
) -> impl Fn(&mut XmlDocument, Option<&mut Workbook>) -> Result<()> + 'static {
    move |chart: &mut XmlDocument, workbook: Option<&mut Workbook>| {
        update_chart(chart, &data);
        match workbook {
            Some(workbook) => update_workbook(workbook, &data),
            None => log::warn!("chart has no embedded workbook; only the caches were updated"),
        }
        Ok(())
    }
}

/// Rewrite series labels, categories and values; series beyond the data are removed
pub fn update_chart(chart: &mut XmlDocument, data: &ChartData) {
    let series_paths = chart.root.find_paths("c:ser");
    if series_paths.is_empty() {
        log::warn!("chart holds no c:ser to fill");
        return;
    }

    let rows = data.categories.len();
    for (index, path) in series_paths.iter().enumerate().take(data.series.len()) {
        let Some(series) = chart.root.at_path_mut(path) else {
            continue;
        };
        let column = column_letter(index + 1);

        if let Some(tx) = series.child_mut("c:tx") {
            replace_children(
                tx,
                string_reference(
                    format!("{}!${}$1", SHEET_NAME, column),
                    &[data.series[index].label.as_str()],
                ),
            );
        }

        let labels: Vec<&str> = data.categories.iter().map(|c| c.label.as_str()).collect();
        for tag in ["c:cat", "c:xVal"] {
            if let Some(categories) = series.child_mut(tag) {
                replace_children(
                    categories,
                    string_reference(format!("{}!$A$2:$A${}", SHEET_NAME, rows + 1), &labels),
                );
            }
        }

        for tag in ["c:val", "c:yVal"] {
            if let Some(values) = series.child_mut(tag) {
                let format = values
                    .find_first("c:formatCode")
                    .cloned()
                    .unwrap_or_else(|| RawXmlElement::new("c:formatCode").with_text("General"));
                let points = (0..rows).map(|row| data.value(row, index)).collect::<Vec<_>>();
                replace_children(
                    values,
                    number_reference(
                        format!("{}!${}$2:${}${}", SHEET_NAME, column, column, rows + 1),
                        format,
                        &points,
                    ),
                );
            }
        }
    }

    for path in series_paths.iter().skip(data.series.len()).rev() {
        chart.root.detach(path);
    }
}

/// Rebuild the worksheet cells, shared strings and table range from `data`
pub fn update_workbook(workbook: &mut Workbook, data: &ChartData) {
    let mut strings: Vec<String> = Vec::new();
    let mut references = 0;
    let mut shared = |value: &str| {
        references += 1;
        match strings.iter().position(|s| s == value) {
            Some(index) => index,
            None => {
                strings.push(value.to_string());
                strings.len() - 1
            }
        }
    };

    let mut header = RawXmlElement::new("row").with_attr("r", "1");
    for (index, series) in data.series.iter().enumerate() {
        header.push_child(string_cell(
            format!("{}1", column_letter(index + 1)),
            shared(&series.label),
        ));
    }
    let mut rows = vec![header];
    for (row, category) in data.categories.iter().enumerate() {
        let r = row + 2;
        let mut element = RawXmlElement::new("row").with_attr("r", r.to_string());
        element.push_child(string_cell(format!("A{}", r), shared(&category.label)));
        for series in 0..data.series.len() {
            if let Some(value) = data.value(row, series) {
                element.push_child(
                    RawXmlElement::new("c")
                        .with_attr("r", format!("{}{}", column_letter(series + 1), r))
                        .with_child(RawXmlElement::new("v").with_text(value.to_string())),
                );
            }
        }
        rows.push(element);
    }

    match workbook.sheet.root.find_first_mut("sheetData") {
        Some(sheet_data) => {
            sheet_data.children = rows.into_iter().map(RawXmlNode::Element).collect();
            sheet_data.self_closing = sheet_data.children.is_empty();
        }
        None => log::warn!("worksheet has no sheetData"),
    }
    if let Some(dimension) = workbook.sheet.root.find_first_mut("dimension") {
        dimension.set_attr("ref", data.range());
    }

    let sst = &mut workbook.shared_strings;
    sst.root
        .children
        .retain(|node| !matches!(node, RawXmlNode::Element(e) if e.name == "si"));
    for value in &strings {
        append_shared_string(sst, value);
    }
    sst.root.set_attr("count", references.to_string());
    sst.root.set_attr("uniqueCount", strings.len().to_string());

    if let Some(table) = workbook.table.as_mut() {
        update_table_definition(&mut table.root, data);
    }
}

fn update_table_definition(table: &mut RawXmlElement, data: &ChartData) {
    let range = data.range();
    table.set_attr("ref", range.as_str());
    if let Some(filter) = table.child_mut("autoFilter") {
        filter.set_attr("ref", range.as_str());
    }

    let Some(columns) = table.child_mut("tableColumns") else {
        return;
    };
    let first = columns
        .find_first("tableColumn")
        .and_then(|c| c.attr("name"))
        .filter(|name| !name.is_empty())
        .unwrap_or(" ")
        .to_string();

    let mut names: Vec<String> = vec![first];
    for series in &data.series {
        let mut name = series.label.clone();
        let mut suffix = 2;
        while names.contains(&name) {
            name = format!("{} {}", series.label, suffix);
            suffix += 1;
        }
        names.push(name);
    }

    columns.children.clear();
    for (index, name) in names.iter().enumerate() {
        columns.push_child(
            RawXmlElement::new("tableColumn")
                .with_attr("id", (index + 1).to_string())
                .with_attr("name", name.as_str()),
        );
    }
    columns.set_attr("count", names.len().to_string());
}

/// Spreadsheet column name for a zero-based index: 0 is `A`, 26 is `AA`
pub fn column_letter(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

fn replace_children(parent: &mut RawXmlElement, child: RawXmlElement) {
    parent.children = vec![RawXmlNode::Element(child)];
    parent.self_closing = false;
}

fn string_cell(reference: String, index: usize) -> RawXmlElement {
    RawXmlElement::new("c")
        .with_attr("r", reference)
        .with_attr("t", "s")
        .with_child(RawXmlElement::new("v").with_text(index.to_string()))
}

fn string_reference(formula: String, values: &[&str]) -> RawXmlElement {
    let mut cache = RawXmlElement::new("c:strCache")
        .with_child(RawXmlElement::new("c:ptCount").with_attr("val", values.len().to_string()));
    for (index, value) in values.iter().enumerate() {
        cache.push_child(
            RawXmlElement::new("c:pt")
                .with_attr("idx", index.to_string())
                .with_child(RawXmlElement::new("c:v").with_text(*value)),
        );
    }
    RawXmlElement::new("c:strRef")
        .with_child(RawXmlElement::new("c:f").with_text(formula))
        .with_child(cache)
}

fn number_reference(formula: String, format: RawXmlElement, points: &[Option<f64>]) -> RawXmlElement {
    let mut cache = RawXmlElement::new("c:numCache")
        .with_child(format)
        .with_child(RawXmlElement::new("c:ptCount").with_attr("val", points.len().to_string()));
    for (index, point) in points.iter().enumerate() {
        if let Some(value) = point {
            cache.push_child(
                RawXmlElement::new("c:pt")
                    .with_attr("idx", index.to_string())
                    .with_child(RawXmlElement::new("c:v").with_text(value.to_string())),
            );
        }
    }
    RawXmlElement::new("c:numRef")
        .with_child(RawXmlElement::new("c:f").with_text(formula))
        .with_child(cache)
}
