//! Generic primitives over parsed parts: append, conditional append, removal,
//! reordering, slicing, relationship-id allocation and target resolution.

use std::collections::{BTreeSet, HashMap};

use crate::compose::ContentTracker;
use crate::error::{Error, Result};
use crate::opc::{well_known, Archive, Relationship, Relationships, Target};
use crate::xml::{numeric_id, NodePath, RawXmlElement, RawXmlNode, XmlDocument};

/// Clause deciding whether a conditional append runs
pub type Clause = Box<dyn Fn(&XmlDocument) -> bool>;

/// Check run against the tree before an append is applied; `Err` aborts the append
pub type Assertion = Box<dyn Fn(&XmlDocument) -> std::result::Result<(), String>>;

/// Value of an attribute on an element about to be appended
pub enum AttributeValue {
    /// Fixed value
    Literal(String),
    /// Value computed from the current tree (e.g. a freshly allocated id)
    Computed(Box<dyn Fn(&XmlDocument) -> String>),
}

/// Where a new element is attached
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParentLocator {
    /// The document element
    Root,
    /// The first element with this qualified name
    FirstByTag(String),
}

/// Description of an element to append to a part
pub struct HelperElement {
    /// Part the element is appended to
    pub file: String,
    /// Parent of the new element
    pub parent: ParentLocator,
    /// Qualified tag of the new element
    pub tag: String,
    /// Attributes in output order
    pub attributes: Vec<(String, AttributeValue)>,
    /// Validation run before the mutation
    pub assert: Option<Assertion>,
    /// Guard for [`append_if`]
    pub clause: Option<Clause>,
}

impl HelperElement {
    /// New element under the document root of `file`
    pub fn new(file: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            parent: ParentLocator::Root,
            tag: tag.into(),
            attributes: Vec::new(),
            assert: None,
            clause: None,
        }
    }

    /// Attach under the first element named `tag` instead of the root
    pub fn under(mut self, tag: impl Into<String>) -> Self {
        self.parent = ParentLocator::FirstByTag(tag.into());
        self
    }

    /// Add a literal attribute
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .push((name.into(), AttributeValue::Literal(value.into())));
        self
    }

    /// Add an attribute computed from the tree at append time
    pub fn computed_attr<F>(mut self, name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&XmlDocument) -> String + 'static,
    {
        self.attributes
            .push((name.into(), AttributeValue::Computed(Box::new(compute))));
        self
    }

    /// Validate the tree before the element is appended
    pub fn assert_with<F>(mut self, check: F) -> Self
    where
        F: Fn(&XmlDocument) -> std::result::Result<(), String> + 'static,
    {
        self.assert = Some(Box::new(check));
        self
    }

    /// Only append when `clause` holds (see [`append_if`])
    pub fn when<F>(mut self, clause: F) -> Self
    where
        F: Fn(&XmlDocument) -> bool + 'static,
    {
        self.clause = Some(Box::new(clause));
        self
    }
}

/// Append a new element to a part.
///
/// Relationship-shaped elements (`Id`, `Type`, `Target`) are recorded in the tracker
/// for the owning part once the element is in place. The assertion runs before the
/// tree or the tracker is touched.
pub fn append(
    archive: &mut Archive,
    tracker: &mut ContentTracker,
    element: HelperElement,
) -> Result<RawXmlElement> {
    let doc = archive.read_xml(&element.file)?;

    let mut created = RawXmlElement::new(element.tag.as_str());
    for (name, value) in &element.attributes {
        let value = match value {
            AttributeValue::Literal(v) => v.clone(),
            AttributeValue::Computed(compute) => compute(&*doc),
        };
        created.set_attr(name.as_str(), value);
    }

    if let Some(check) = &element.assert {
        check(&*doc).map_err(|message| Error::AssertionFailed {
            file: element.file.clone(),
            message,
        })?;
    }

    let parent = match &element.parent {
        ParentLocator::Root => &mut doc.root,
        ParentLocator::FirstByTag(tag) => doc.root.find_first_mut(tag).ok_or_else(|| {
            Error::InvalidDocument(format!("{}: no <{}> to append to", element.file, tag))
        })?,
    };
    parent.push_child(created.clone());

    if created.attr("Target").is_some() {
        if let Ok(rel) = Relationship::from_element(&created) {
            tracker.track_relation(&element.file, &rel);
        }
    }

    log::debug!("appended <{}> to {}", element.tag, element.file);
    Ok(created)
}

/// Append only when the element's clause holds; `None` means the append was skipped
pub fn append_if(
    archive: &mut Archive,
    tracker: &mut ContentTracker,
    element: HelperElement,
) -> Result<Option<RawXmlElement>> {
    if let Some(clause) = &element.clause {
        let doc = archive.read_xml(&element.file)?;
        if !clause(&*doc) {
            log::trace!("skipped <{}> on {}", element.tag, element.file);
            return Ok(None);
        }
    }
    append(archive, tracker, element).map(Some)
}

/// Remove every element named `tag` for which `clause` holds.
///
/// The whole tree is scanned before anything is detached. Removed elements are
/// returned in document order.
pub fn remove_if<F>(
    archive: &mut Archive,
    file: &str,
    tag: &str,
    clause: F,
) -> Result<Vec<RawXmlElement>>
where
    F: Fn(&XmlDocument, &RawXmlElement) -> bool,
{
    let doc = archive.read_xml(file)?;

    let view: &XmlDocument = &*doc;
    let doomed: Vec<NodePath> = view
        .root
        .find_paths(tag)
        .into_iter()
        .filter(|path| {
            view.root
                .at_path(path)
                .map(|element| clause(view, element))
                .unwrap_or(false)
        })
        .collect();

    let mut removed = Vec::with_capacity(doomed.len());
    for path in doomed.iter().rev() {
        if path.is_empty() {
            continue;
        }
        if let Some(element) = doc.root.detach(path) {
            removed.push(element);
        }
    }
    removed.reverse();

    if !removed.is_empty() {
        log::debug!("removed {} <{}> from {}", removed.len(), tag, file);
    }
    Ok(removed)
}

/// Re-append the children named `tag` of `parent` in the sequence given by `order`.
///
/// `order` holds zero-based indices into the original collection. Each listed
/// element moves to the end of `parent`; out-of-range indices are logged and skipped.
pub fn sort_collection(parent: &mut RawXmlElement, tag: &str, order: &[usize]) {
    let positions = parent.child_positions(tag);
    if positions.is_empty() {
        return;
    }

    let mut slots: Vec<Option<usize>> = vec![None; parent.children.len()];
    for (index, &pos) in positions.iter().enumerate() {
        slots[pos] = Some(index);
    }

    for &index in order {
        if index >= positions.len() {
            log::warn!(
                "{}",
                Error::InvalidReorderIndex {
                    index,
                    len: positions.len()
                }
            );
            continue;
        }
        let Some(current) = slots.iter().position(|slot| *slot == Some(index)) else {
            continue;
        };
        let node = parent.children.remove(current);
        let slot = slots.remove(current);
        parent.children.push(node);
        slots.push(slot);
    }
}

/// Truncate the children named `tag` of `parent`.
///
/// With `from`, removes collection indices `from..length`; without it, trims from
/// the tail down to `length` elements. Returns the number of removed elements.
pub fn slice_collection(
    parent: &mut RawXmlElement,
    tag: &str,
    length: usize,
    from: Option<usize>,
) -> usize {
    let positions = parent.child_positions(tag);
    let doomed: Vec<usize> = match from {
        Some(from) => positions
            .iter()
            .enumerate()
            .filter(|(i, _)| *i >= from && *i < length)
            .map(|(_, pos)| *pos)
            .collect(),
        None => positions.iter().skip(length).copied().collect(),
    };

    for &pos in doomed.iter().rev() {
        parent.children.remove(pos);
    }
    doomed.len()
}

/// Highest numeric value of `attribute` across `elements`, decorations ignored
pub fn max_id<'a, I>(elements: I, attribute: &str) -> u32
where
    I: IntoIterator<Item = &'a RawXmlElement>,
{
    elements
        .into_iter()
        .filter_map(|e| e.attr(attribute).and_then(numeric_id))
        .max()
        .unwrap_or(0)
}

/// Allocates relationship ids per `.rels` part for one build.
///
/// Ids handed out but not yet written stay pending, so a second allocation before
/// the first relationship lands never collides.
#[derive(Debug, Default)]
pub struct RelIdAllocator {
    pending: HashMap<String, BTreeSet<u32>>,
}

impl RelIdAllocator {
    /// Create an empty allocator
    pub fn new() -> Self {
        Self::default()
    }

    /// Next free `rIdN` for a relationships part
    pub fn next_rel_id(&mut self, archive: &mut Archive, rels_file: &str) -> Result<String> {
        let doc = archive.read_xml(rels_file)?;
        let existing = max_id(doc.root.find_all("Relationship"), "Id");

        let pending = self.pending.entry(rels_file.to_string()).or_default();
        let reserved = pending.iter().next_back().copied().unwrap_or(0);
        let next = existing.max(reserved) + 1;
        pending.insert(next);

        log::trace!("allocated rId{} for {}", next, rels_file);
        Ok(format!("rId{}", next))
    }

    /// Keep an id from being handed out until released
    pub fn reserve(&mut self, rels_file: &str, id: &str) {
        if let Some(n) = numeric_id(id) {
            self.pending.entry(rels_file.to_string()).or_default().insert(n);
        }
    }

    /// Drop an id from the pending set once it is written (or abandoned)
    pub fn release(&mut self, rels_file: &str, id: &str) {
        if let (Some(set), Some(n)) = (self.pending.get_mut(rels_file), numeric_id(id)) {
            set.remove(&n);
        }
    }

    /// Whether an id is pending for a part
    pub fn is_pending(&self, rels_file: &str, id: &str) -> bool {
        match (self.pending.get(rels_file), numeric_id(id)) {
            (Some(set), Some(n)) => set.contains(&n),
            _ => false,
        }
    }
}

/// Relationships of a `.rels` tree whose type or target prefix matches one of `prefixes`
pub fn targets_from_relationships(doc: &XmlDocument, prefixes: &[&str]) -> Result<Vec<Target>> {
    let rels = Relationships::from_document(doc)?;
    Ok(rels
        .iter()
        .filter_map(|rel| {
            prefixes
                .iter()
                .find(|prefix| Target::matches(rel, prefix))
                .map(|prefix| Target::from_relationship(rel, prefix))
        })
        .collect())
}

/// Relationships of a `.rels` tree with exactly the given type
pub fn targets_by_relationship_type(doc: &XmlDocument, rel_type: &str) -> Result<Vec<Relationship>> {
    let rels = Relationships::from_document(doc)?;
    Ok(rels.all_by_type(rel_type).into_iter().cloned().collect())
}

/// Whether any element named `tag` carries `attribute == value`
pub fn find_by_attribute(doc: &XmlDocument, tag: &str, attribute: &str, value: &str) -> bool {
    doc.root
        .find_all(tag)
        .iter()
        .any(|e| e.attr(attribute) == Some(value))
}

/// Rewrite `attribute` from `value` to `replacement` on every element named `tag`.
///
/// Relationship-shaped elements of the part are re-tracked afterwards.
pub fn replace_attribute(
    archive: &mut Archive,
    tracker: &mut ContentTracker,
    file: &str,
    tag: &str,
    attribute: &str,
    value: &str,
    replacement: &str,
) -> Result<usize> {
    let doc = archive.read_xml(file)?;
    let mut replaced = 0;
    for path in doc.root.find_paths(tag) {
        if let Some(element) = doc.root.at_path_mut(&path) {
            if element.attr(attribute) == Some(value) {
                element.set_attr(attribute, replacement);
                replaced += 1;
            }
            if let Ok(rel) = Relationship::from_element(element) {
                tracker.track_relation(file, &rel);
            }
        }
    }
    Ok(replaced)
}

/// `Override` registry entry, not yet appended
pub fn content_type_override(part_name: &str, content_type: &str) -> HelperElement {
    HelperElement::new(well_known::CONTENT_TYPES, "Override")
        .attr("PartName", part_name)
        .attr("ContentType", content_type)
}

/// `Default` registry entry, not yet appended
pub fn content_type_default(extension: &str, content_type: &str) -> HelperElement {
    HelperElement::new(well_known::CONTENT_TYPES, "Default")
        .attr("Extension", extension)
        .attr("ContentType", content_type)
}

/// Clause for [`append_if`]: no `Default` declared for `extension` yet
pub fn missing_default(extension: &str) -> impl Fn(&XmlDocument) -> bool + 'static {
    let extension = extension.to_lowercase();
    move |doc: &XmlDocument| {
        !doc.root.elements().any(|e| {
            e.name == "Default"
                && e.attr("Extension").map(str::to_lowercase).as_deref() == Some(extension.as_str())
        })
    }
}

/// Clause for [`append_if`]: no `Override` declared for `part_name` yet
pub fn missing_override(part_name: &str) -> impl Fn(&XmlDocument) -> bool + 'static {
    let part_name = part_name.to_string();
    move |doc: &XmlDocument| !find_by_attribute(doc, "Override", "PartName", &part_name)
}

/// `Relationship` entry for a `.rels` part, not yet appended
pub fn relationship_child(rels_file: &str, rel: &Relationship) -> HelperElement {
    let mut element = HelperElement::new(rels_file, "Relationship")
        .attr("Id", rel.id.as_str())
        .attr("Type", rel.rel_type.as_str())
        .attr("Target", rel.target.as_str());
    if !rel.is_internal() {
        element = element.attr("TargetMode", "External");
    }
    element
}

/// Append a string to a shared-strings table, returning its index
pub fn append_shared_string(shared_strings: &mut XmlDocument, value: &str) -> usize {
    let item = RawXmlElement::new("si").with_child(RawXmlElement::new("t").with_text(value));
    shared_strings.root.push_child(item);
    shared_strings.root.child_positions("si").len() - 1
}

/// Path of the shape whose `p:cNvPr` carries `name`
pub fn find_by_name(root: &RawXmlElement, name: &str) -> Option<NodePath> {
    root.find_paths_where(|e| e.name == "p:cNvPr" && e.attr("name") == Some(name))
        .into_iter()
        .find(|path| path.len() >= 2)
        .map(|mut path| {
            path.truncate(path.len() - 2);
            path
        })
}

/// Names of the direct child elements, text nodes skipped
pub fn element_names(parent: &RawXmlElement) -> Vec<&str> {
    parent
        .children
        .iter()
        .filter_map(|node| match node {
            RawXmlNode::Element(e) => Some(e.name.as_str()),
            _ => None,
        })
        .collect()
}
