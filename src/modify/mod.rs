//! Ready-made callbacks for grafted shapes
//!
//! Chart callbacks receive the chart part and, when the chart embeds one, the
//! extracted workbook. Table callbacks receive the graphic frame element.

pub mod chart;
pub mod table;

pub use chart::{column_letter, set_chart_data, ChartCategory, ChartData, ChartSeries};
pub use table::{set_table, TableData, TableRow};
