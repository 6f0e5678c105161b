//! Content tracking: which files a build needs and which relationships reference them

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use crate::error::Result;
use crate::opc::{well_known, Archive, PartUri, Relationship, Relationships};

/// Records the files a composition requires and the relationships leading to them.
///
/// Files are grouped by directory so orphan cleanup can ask what a directory must
/// keep. One tracker belongs to one build.
#[derive(Clone, Debug, Default)]
pub struct ContentTracker {
    /// Directory (ZIP form) -> tracked file names
    files: BTreeMap<String, BTreeSet<String>>,
    /// Source part (ZIP form, empty for the package) -> declared relationships
    relations: BTreeMap<String, Vec<Relationship>>,
    /// Files found by the last package walk; `None` before the first one
    reachable: Option<BTreeSet<String>>,
}

impl ContentTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a file as required
    pub fn track_file(&mut self, path: &str) {
        let (dir, name) = split_path(path);
        self.files
            .entry(dir.to_string())
            .or_default()
            .insert(name.to_string());
    }

    /// Forget a file, e.g. after the shape that needed it was removed
    pub fn untrack_file(&mut self, path: &str) {
        let (dir, name) = split_path(path);
        if let Some(names) = self.files.get_mut(dir) {
            names.remove(name);
        }
    }

    /// Whether a file is marked as required
    pub fn is_tracked(&self, path: &str) -> bool {
        let (dir, name) = split_path(path);
        self.files.get(dir).is_some_and(|names| names.contains(name))
    }

    /// Whether the last package walk reached a file
    pub fn is_reachable(&self, path: &str) -> bool {
        self.reachable
            .as_ref()
            .is_some_and(|found| found.contains(path.trim_start_matches('/')))
    }

    /// Whether a file must stay in the package.
    ///
    /// Once the package has been walked, a tracked file nothing reaches anymore is
    /// no longer required.
    pub fn is_required(&self, path: &str) -> bool {
        self.is_tracked(path) && (self.reachable.is_none() || self.is_reachable(path))
    }

    /// Directories holding at least one required file
    pub fn directories(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Record a relationship declared in `rels_file`.
    ///
    /// Internal targets are resolved against the owning part and tracked as files.
    pub fn track_relation(&mut self, rels_file: &str, rel: &Relationship) {
        let source = PartUri::new(rels_file)
            .ok()
            .and_then(|uri| uri.relationships_source());
        self.record(source.as_ref(), rel);
    }

    fn record(&mut self, source: Option<&PartUri>, rel: &Relationship) {
        let key = source.map(|s| s.zip_path().to_string()).unwrap_or_default();
        let relations = self.relations.entry(key).or_default();
        match relations.iter_mut().find(|r| r.id == rel.id) {
            Some(existing) => *existing = rel.clone(),
            None => relations.push(rel.clone()),
        }

        if rel.is_internal() {
            if let Some(target) = resolve_target(source, &rel.target) {
                self.track_file(target.zip_path());
            }
        }
    }

    /// Relationships recorded for a part
    pub fn relations_of(&self, part: &str) -> &[Relationship] {
        self.relations
            .get(part.trim_start_matches('/'))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Walk the package from `_rels/.rels` and track every reachable part.
    ///
    /// Recorded relationships and the reachable set are rebuilt from the archive.
    /// Tracked files stay tracked, but only reachable ones remain required.
    pub fn analyze_contents(&mut self, archive: &Archive) -> Result<()> {
        self.relations.clear();
        self.reachable = Some(BTreeSet::new());
        let visited = self.walk(archive, VecDeque::from([None]))?;

        log::debug!("{} parts reachable in {}", visited, archive.label());
        Ok(())
    }

    /// Extend the last walk with everything reachable from `roots`
    pub fn analyze_from(
        &mut self,
        archive: &Archive,
        roots: impl IntoIterator<Item = PartUri>,
    ) -> Result<()> {
        if self.reachable.is_none() {
            self.reachable = Some(BTreeSet::new());
        }
        let queue = roots
            .into_iter()
            .filter(|root| archive.exists(root.zip_path()))
            .map(Some)
            .collect();
        self.walk(archive, queue)?;
        Ok(())
    }

    fn walk(&mut self, archive: &Archive, mut queue: VecDeque<Option<PartUri>>) -> Result<usize> {
        let mut visited: HashSet<PartUri> = queue.iter().flatten().cloned().collect();

        while let Some(source) = queue.pop_front() {
            let rels_path = match &source {
                Some(part) => {
                    self.mark_reachable(part.zip_path());
                    part.relationships_uri().zip_path().to_string()
                }
                None => well_known::PACKAGE_RELS.to_string(),
            };
            if !archive.exists(&rels_path) {
                continue;
            }
            self.mark_reachable(&rels_path);

            let rels = Relationships::from_document(&archive.xml(&rels_path)?)?;
            for rel in rels.iter() {
                self.record(source.as_ref(), rel);
                if !rel.is_internal() {
                    continue;
                }
                let Some(target) = resolve_target(source.as_ref(), &rel.target) else {
                    continue;
                };
                if archive.exists(target.zip_path()) && visited.insert(target.clone()) {
                    queue.push_back(Some(target));
                }
            }
        }
        Ok(visited.len())
    }

    fn mark_reachable(&mut self, path: &str) {
        self.track_file(path);
        if let Some(found) = self.reachable.as_mut() {
            found.insert(path.trim_start_matches('/').to_string());
        }
    }

    /// Push the target file names of relationships of kind `kind` declared by parts in `dir`
    pub fn collect(&self, dir: &str, kind: &str, out: &mut Vec<String>) {
        let dir = dir.trim_end_matches('/');
        for (source, relations) in &self.relations {
            let source_dir = source.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
            if source_dir != dir {
                continue;
            }
            for rel in relations.iter().filter(|r| r.kind() == kind) {
                let name = rel.target.rsplit('/').next().unwrap_or(&rel.target);
                if !out.iter().any(|known| known == name) {
                    out.push(name.to_string());
                }
            }
        }
    }

    /// Drop everything tracked so far
    pub fn reset(&mut self) {
        self.files.clear();
        self.relations.clear();
        self.reachable = None;
    }
}

fn split_path(path: &str) -> (&str, &str) {
    let path = path.trim_start_matches('/');
    path.rsplit_once('/').unwrap_or(("", path))
}

fn resolve_target(source: Option<&PartUri>, target: &str) -> Option<PartUri> {
    match source {
        Some(part) => part.resolve(target).ok(),
        None => PartUri::new(target.split('#').next().unwrap_or(target)).ok(),
    }
}
