//! # linch-pptx-rs
//!
//! Compose PowerPoint (PPTX) packages from template decks while keeping
//! every relationship, content type and embedded workbook consistent.
//!
//! ## Features
//!
//! - Graft charts, images, tables and plain shapes between decks
//! - Append whole slides with their charts and media
//! - Rewrite chart series and the embedded xlsx behind them
//! - Drop unreferenced parts and stale content types before writing
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use linch_pptx_rs::{Archive, ChartData, Composition, OutputOptions, Shape};
//! use linch_pptx_rs::modify::set_chart_data;
//!
//! let template = Archive::open("charts.pptx")?;
//! let mut deck = Composition::open("root.pptx")?;
//!
//! let data = ChartData::new(&["Revenue", "Cost"])
//!     .category("Q1", &[Some(10.0), Some(4.0)])
//!     .category("Q2", &[Some(12.5), None]);
//!
//! Shape::from_slide(&template, 2, "BarsStacked")?
//!     .with_chart_callback(set_chart_data(data))
//!     .append(&mut deck, 1)?;
//!
//! deck.append_slide(&template, 3)?;
//! deck.save("out.pptx", &OutputOptions::default())?;
//! ```

pub mod compose;
pub mod error;
pub mod modify;
pub mod opc;
pub mod shapes;
pub mod xml;

pub use compose::{CleanupReport, Composition, ContentTracker, CounterKind, Counters};
pub use error::{Error, Result};
pub use modify::{ChartData, TableData};
pub use opc::{Archive, OutputOptions, PartUri};
pub use shapes::{ChartSubtype, Shape, ShapeKind, Workbook};
