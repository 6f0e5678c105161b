//! File-level operations between archives

use crate::compose::ContentTracker;
use crate::error::{Error, Result};
use crate::opc::{Archive, ArchivedFile, PartUri};

/// Copy a file from `source` into `target`, marking the copy as required
pub fn zip_copy(
    source: &Archive,
    source_file: &str,
    target: &mut Archive,
    target_file: &str,
    tracker: &mut ContentTracker,
) -> Result<()> {
    if !source.exists(source_file) {
        return Err(Error::PartNotFound(format!(
            "{} in {}",
            source_file.trim_start_matches('/'),
            source.label()
        )));
    }

    let data = source.read(source_file)?;
    target.write(target_file, data);
    tracker.track_file(target_file);

    log::trace!("copied {}:{} to {}", source.label(), source_file, target_file);
    Ok(())
}

/// Remove the direct children of `dir` matching `predicate`; returns the removed paths
pub fn remove_from_directory<F>(archive: &mut Archive, dir: &str, predicate: F) -> Vec<String>
where
    F: Fn(&ArchivedFile) -> bool,
{
    let doomed: Vec<String> = archive
        .list(dir)
        .into_iter()
        .filter(|file| predicate(file))
        .map(|file| file.name)
        .collect();

    for name in &doomed {
        archive.remove(name);
        log::debug!("removed {}", name);
    }
    doomed
}

/// `{dir}/{stem}{suffix}.{ext}` for an existing part path
pub fn suffixed_path(path: &str, suffix: &str) -> Result<String> {
    let uri = PartUri::new(path)?;
    let file_name = uri.file_name().unwrap_or_default();
    let name = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}{}.{}", stem, suffix, ext),
        _ => format!("{}{}", file_name, suffix),
    };
    Ok(match uri.directory() {
        "" => name,
        dir => format!("{}/{}", dir, name),
    })
}

/// Relative reference from `from` (a part) to `to` (a part), as used in `.rels` targets
pub fn relative_target(from: &str, to: &str) -> String {
    let from_dir: Vec<&str> = from
        .trim_start_matches('/')
        .split('/')
        .collect::<Vec<_>>()
        .split_last()
        .map(|(_, dir)| dir.to_vec())
        .unwrap_or_default();
    let to_parts: Vec<&str> = to.trim_start_matches('/').split('/').collect();

    let common = from_dir
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count()
        .min(to_parts.len().saturating_sub(1));

    let mut segments: Vec<&str> = vec![".."; from_dir.len() - common];
    segments.extend_from_slice(&to_parts[common..]);
    segments.join("/")
}
