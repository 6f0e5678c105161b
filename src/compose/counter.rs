//! Per-build counters for slides, charts, images and tables

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::opc::{content_types, decompose_file_name, well_known, Archive, ContentTypes};

/// What a counter counts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CounterKind {
    Slides,
    Charts,
    Images,
    Tables,
}

impl CounterKind {
    /// Every kind, in initialization order
    pub const ALL: [CounterKind; 4] = [
        CounterKind::Slides,
        CounterKind::Charts,
        CounterKind::Images,
        CounterKind::Tables,
    ];

    /// Name used in diagnostics and for lookups by string
    pub fn name(&self) -> &'static str {
        match self {
            CounterKind::Slides => "slides",
            CounterKind::Charts => "charts",
            CounterKind::Images => "images",
            CounterKind::Tables => "tables",
        }
    }
}

impl fmt::Display for CounterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CounterKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CounterKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| Error::CounterNotFound(s.to_string()))
    }
}

/// Monotonic counters seeded from the target archive.
///
/// A counter starts at the higher of the number of existing instances and the
/// highest instance number found in file names, so a freshly incremented value
/// never names an existing file.
#[derive(Clone, Debug, Default)]
pub struct Counters {
    counts: BTreeMap<CounterKind, u32>,
}

impl Counters {
    /// Counters with nothing initialized
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed every counter from `archive`
    pub fn from_archive(archive: &Archive) -> Result<Self> {
        let mut counters = Self::new();
        for kind in CounterKind::ALL {
            counters.initialize(kind, archive)?;
        }
        Ok(counters)
    }

    /// Seed one counter from `archive`, returning the seed
    pub fn initialize(&mut self, kind: CounterKind, archive: &Archive) -> Result<u32> {
        let seed = match kind {
            CounterKind::Slides => count_slides(archive)?,
            CounterKind::Charts => count_charts(archive)?,
            CounterKind::Images => count_images(archive),
            CounterKind::Tables => count_tables(archive)?,
        };
        log::debug!("counter {} seeded with {}", kind, seed);
        self.counts.insert(kind, seed);
        Ok(seed)
    }

    /// Advance a counter and return the new value
    pub fn increment(&mut self, kind: CounterKind) -> Result<u32> {
        let count = self
            .counts
            .get_mut(&kind)
            .ok_or_else(|| Error::CounterNotFound(kind.to_string()))?;
        *count += 1;
        Ok(*count)
    }

    /// Advance a counter looked up by name
    pub fn increment_by_name(&mut self, name: &str) -> Result<u32> {
        self.increment(name.parse()?)
    }

    /// Current value of a counter
    pub fn get(&self, kind: CounterKind) -> Result<u32> {
        self.counts
            .get(&kind)
            .copied()
            .ok_or_else(|| Error::CounterNotFound(kind.to_string()))
    }
}

/// Highest trailing number among files in `dir` whose base is one of `bases`
fn highest_file_number(archive: &Archive, dir: &str, bases: &[&str]) -> u32 {
    archive
        .list(dir)
        .iter()
        .map(|file| decompose_file_name(&file.relative_path))
        .filter(|parts| bases.contains(&parts.base.as_str()))
        .map(|parts| parts.number)
        .max()
        .unwrap_or(0)
}

fn count_slides(archive: &Archive) -> Result<u32> {
    let presentation = archive.xml(well_known::PRESENTATION)?;
    let listed = presentation.root.find_all("p:sldId").len() as u32;
    Ok(listed.max(highest_file_number(archive, well_known::SLIDES_DIR, &["slide"])))
}

fn count_charts(archive: &Archive) -> Result<u32> {
    let registry = ContentTypes::from_document(&archive.xml(well_known::CONTENT_TYPES)?)?;
    let declared = (registry.count_overrides(content_types::CHART)
        + registry.count_overrides(content_types::CHART_EX)) as u32;
    Ok(declared.max(highest_file_number(
        archive,
        well_known::CHARTS_DIR,
        &["chart", "chartEx"],
    )))
}

fn count_images(archive: &Archive) -> u32 {
    let files = archive.list(well_known::MEDIA_DIR);
    let present = files
        .iter()
        .filter(|file| file.relative_path.starts_with("image"))
        .count() as u32;
    present.max(highest_file_number(archive, well_known::MEDIA_DIR, &["image"]))
}

fn count_tables(archive: &Archive) -> Result<u32> {
    let mut tables = 0;
    for file in archive.list(well_known::SLIDES_DIR) {
        if !file.relative_path.ends_with(".xml") {
            continue;
        }
        tables += archive.xml(&file.name)?.root.find_all("a:tbl").len() as u32;
    }
    Ok(tables)
}
