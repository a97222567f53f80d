//! # Document Snapshot
//!
//! Read-only projection of the document store at one revision. Built from
//! the raw key/value state of the CRDT and memoized by the store until the
//! next committed transaction.
//!
//! ## Raw layout
//!
//! ```text
//! nodes   "<id>/type"            -> "frame"
//!         "<id>/parent"          -> {"parent": "<id>" | null, "index": 1.5}
//!         "<id>/name"            -> "Header"
//! styles  "<idPath>/<field>"     -> <field value>
//! images  "<hash>"               -> {"type", "url", ...}
//! meta    "componentUrls"        -> ["...", ...]
//! ```
//!
//! Every value is JSON text, so concurrent edits converge per field.
//!
//! Only nodes reachable from a root (a parentless page or component) are
//! part of the tree. Nodes caught in a cycle produced by a concurrent merge,
//! or whose parent was deleted remotely, stay in storage but are hidden.

use crate::images::ImageDescriptor;
use crate::style::{PartialStyle, StyleRecord};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use tracing::warn;

pub(crate) const TYPE_FIELD: &str = "type";
pub(crate) const PARENT_FIELD: &str = "parent";
pub(crate) const NAME_FIELD: &str = "name";
pub(crate) const COMPONENT_URLS_KEY: &str = "componentUrls";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Frame,
    Text,
    Component,
    Instance,
    Page,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Frame => "frame",
            NodeType::Text => "text",
            NodeType::Component => "component",
            NodeType::Instance => "instance",
            NodeType::Page => "page",
        }
    }

    /// Whether a parentless node of this type is a root
    pub fn is_root_type(&self) -> bool {
        matches!(self, NodeType::Page | NodeType::Component)
    }

    pub fn can_contain(&self, child: NodeType) -> bool {
        matches!(self, NodeType::Frame | NodeType::Component | NodeType::Page)
            && child != NodeType::Page
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which CRDT map a raw key lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapName {
    Nodes,
    Styles,
    Images,
    Meta,
}

impl MapName {
    pub const ALL: [MapName; 4] = [MapName::Nodes, MapName::Styles, MapName::Images, MapName::Meta];

    pub fn as_str(&self) -> &'static str {
        match self {
            MapName::Nodes => "nodes",
            MapName::Styles => "styles",
            MapName::Images => "images",
            MapName::Meta => "meta",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RawKey {
    pub map: MapName,
    pub key: String,
}

impl RawKey {
    pub fn new(map: MapName, key: impl Into<String>) -> Self {
        Self {
            map,
            key: key.into(),
        }
    }

    pub fn node(id: &str, field: &str) -> Self {
        Self::new(MapName::Nodes, format!("{}/{}", id, field))
    }

    pub fn style(path_key: &str, field: &str) -> Self {
        Self::new(MapName::Styles, format!("{}/{}", path_key, field))
    }

    pub fn image(hash: &str) -> Self {
        Self::new(MapName::Images, hash)
    }

    pub fn meta(name: &str) -> Self {
        Self::new(MapName::Meta, name)
    }

    /// `(owner, field)` for node and style keys
    pub fn split(&self) -> Option<(&str, &str)> {
        match self.map {
            MapName::Nodes | MapName::Styles => self.key.rsplit_once('/'),
            _ => None,
        }
    }

    /// Id of the node this key belongs to, if any
    pub fn node_id(&self) -> Option<&str> {
        let (owner, _) = self.split()?;
        owner.split(':').next()
    }
}

impl fmt::Display for RawKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.map.as_str(), self.key)
    }
}

/// Raw CRDT contents: every key with its JSON text value
pub type RawState = BTreeMap<RawKey, String>;

/// Keys of `raw` whose value differs between `before` and `after`
pub(crate) fn diff_raw(before: &RawState, after: &RawState) -> Vec<RawKey> {
    let mut keys: Vec<RawKey> = before
        .iter()
        .filter(|(key, value)| after.get(*key) != Some(*value))
        .map(|(key, _)| key.clone())
        .collect();
    keys.extend(
        after
            .keys()
            .filter(|key| !before.contains_key(*key))
            .cloned(),
    );
    keys.sort();
    keys
}

/// Value of a node's `parent` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ParentEntry {
    pub parent: Option<String>,
    pub index: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub id: String,
    pub node_type: NodeType,
    pub parent: Option<String>,
    /// Fractional sort key among siblings
    pub index: f64,
    pub name: Option<String>,
}

impl NodeRecord {
    pub(crate) fn new(id: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            node_type,
            parent: None,
            index: 0.0,
            name: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none() && self.node_type.is_root_type()
    }
}

/// Sibling order: index, then id
pub(crate) fn sibling_order(a: &NodeRecord, b: &NodeRecord) -> Ordering {
    a.index.total_cmp(&b.index).then_with(|| a.id.cmp(&b.id))
}

#[derive(Debug, Default)]
pub struct Snapshot {
    revision: u64,
    raw: RawState,
    nodes: HashMap<String, NodeRecord>,
    children: HashMap<String, Vec<String>>,
    roots: Vec<String>,
    attached: HashSet<String>,
    styles: HashMap<String, PartialStyle>,
    images: BTreeMap<String, ImageDescriptor>,
    component_urls: Vec<String>,
}

impl Snapshot {
    pub(crate) fn from_raw(revision: u64, raw: RawState) -> Self {
        let mut snapshot = Snapshot {
            revision,
            ..Default::default()
        };

        let mut parents: HashMap<String, ParentEntry> = HashMap::new();
        let mut names: HashMap<String, String> = HashMap::new();

        for (key, value) in &raw {
            match key.map {
                MapName::Nodes => {
                    let Some((id, field)) = key.split() else {
                        continue;
                    };
                    match field {
                        TYPE_FIELD => match serde_json::from_str::<NodeType>(value) {
                            Ok(node_type) => {
                                snapshot
                                    .nodes
                                    .insert(id.to_string(), NodeRecord::new(id, node_type));
                            }
                            Err(e) => warn!(node = %id, error = %e, "ignoring node with unknown type"),
                        },
                        PARENT_FIELD => match serde_json::from_str::<ParentEntry>(value) {
                            Ok(entry) if entry.index.is_finite() => {
                                parents.insert(id.to_string(), entry);
                            }
                            Ok(_) => warn!(node = %id, "ignoring non-finite sibling index"),
                            Err(e) => warn!(node = %id, error = %e, "ignoring malformed parent"),
                        },
                        NAME_FIELD => {
                            if let Ok(name) = serde_json::from_str::<String>(value) {
                                names.insert(id.to_string(), name);
                            }
                        }
                        _ => {}
                    }
                }
                MapName::Styles => {
                    let Some((path, field)) = key.split() else {
                        continue;
                    };
                    let parsed = serde_json::from_str(value)
                        .and_then(|value| PartialStyle::from_field(field, value));
                    match parsed {
                        Ok(partial) => snapshot
                            .styles
                            .entry(path.to_string())
                            .or_default()
                            .overlay(&partial),
                        Err(e) => {
                            warn!(path = %path, field = %field, error = %e, "ignoring invalid style field")
                        }
                    }
                }
                MapName::Images => match serde_json::from_str::<ImageDescriptor>(value) {
                    Ok(descriptor) => {
                        snapshot.images.insert(key.key.clone(), descriptor);
                    }
                    Err(e) => warn!(hash = %key.key, error = %e, "ignoring malformed image"),
                },
                MapName::Meta => {
                    if key.key == COMPONENT_URLS_KEY {
                        match serde_json::from_str(value) {
                            Ok(urls) => snapshot.component_urls = urls,
                            Err(e) => warn!(error = %e, "ignoring malformed component urls"),
                        }
                    }
                }
            }
        }

        for (id, node) in snapshot.nodes.iter_mut() {
            if let Some(entry) = parents.remove(id) {
                node.parent = entry.parent;
                node.index = entry.index;
            }
            node.name = names.remove(id);
        }

        for node in snapshot.nodes.values() {
            match &node.parent {
                Some(parent) => snapshot
                    .children
                    .entry(parent.clone())
                    .or_default()
                    .push(node.id.clone()),
                None if node.node_type.is_root_type() => snapshot.roots.push(node.id.clone()),
                None => {}
            }
        }

        let nodes = &snapshot.nodes;
        let by_order = |a: &String, b: &String| sibling_order(&nodes[a], &nodes[b]);
        snapshot.roots.sort_by(by_order);
        for children in snapshot.children.values_mut() {
            children.sort_by(by_order);
        }

        let mut queue: VecDeque<&String> = snapshot.roots.iter().collect();
        while let Some(id) = queue.pop_front() {
            if snapshot.attached.insert(id.clone()) {
                if let Some(children) = snapshot.children.get(id) {
                    queue.extend(children.iter());
                }
            }
        }

        snapshot.raw = raw;
        snapshot
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn raw(&self) -> &RawState {
        &self.raw
    }

    /// Node by id, attached or not
    pub fn node(&self, id: &str) -> Option<&NodeRecord> {
        self.nodes.get(id)
    }

    /// Whether the node is reachable from a root
    pub fn is_attached(&self, id: &str) -> bool {
        self.attached.contains(id)
    }

    pub fn parent(&self, id: &str) -> Option<&NodeRecord> {
        let parent = self.nodes.get(id)?.parent.as_deref()?;
        self.nodes.get(parent)
    }

    pub fn child_ids(&self, id: &str) -> &[String] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn children(&self, id: &str) -> impl Iterator<Item = &NodeRecord> + '_ {
        self.child_ids(id).iter().filter_map(|id| self.nodes.get(id))
    }

    /// Ids of the nodes sharing `id`'s parent, in order
    fn siblings(&self, id: &str) -> &[String] {
        match self.nodes.get(id).and_then(|node| node.parent.as_deref()) {
            Some(parent) => self.child_ids(parent),
            None => &self.roots,
        }
    }

    pub fn next_sibling(&self, id: &str) -> Option<&NodeRecord> {
        let siblings = self.siblings(id);
        let position = siblings.iter().position(|s| s == id)?;
        siblings.get(position + 1).and_then(|s| self.nodes.get(s))
    }

    pub fn previous_sibling(&self, id: &str) -> Option<&NodeRecord> {
        let siblings = self.siblings(id);
        let position = siblings.iter().position(|s| s == id)?;
        position
            .checked_sub(1)
            .and_then(|p| siblings.get(p))
            .and_then(|s| self.nodes.get(s))
    }

    /// Parent first, root last
    pub fn ancestors(&self, id: &str) -> Vec<&NodeRecord> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            if !seen.insert(node.id.as_str()) {
                break;
            }
            out.push(node);
            current = self.parent(&node.id);
        }
        out
    }

    /// Depth-first, pre-order, excluding `id` itself
    pub fn descendants(&self, id: &str) -> Vec<&NodeRecord> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut stack: Vec<&String> = self.child_ids(id).iter().rev().collect();
        while let Some(child) = stack.pop() {
            if !seen.insert(child.as_str()) {
                continue;
            }
            if let Some(node) = self.nodes.get(child) {
                out.push(node);
            }
            stack.extend(self.child_ids(child).iter().rev());
        }
        out
    }

    /// Whether `ancestor` is a strict ancestor of `id`
    pub fn is_ancestor(&self, ancestor: &str, id: &str) -> bool {
        self.ancestors(id).iter().any(|node| node.id == ancestor)
    }

    pub fn root_ids(&self) -> &[String] {
        &self.roots
    }

    pub fn roots(&self) -> impl Iterator<Item = &NodeRecord> + '_ {
        self.roots.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn pages(&self) -> impl Iterator<Item = &NodeRecord> + '_ {
        self.roots().filter(|node| node.node_type == NodeType::Page)
    }

    pub fn components(&self) -> impl Iterator<Item = &NodeRecord> + '_ {
        self.roots()
            .chain(self.roots().flat_map(|root| self.descendants(&root.id)))
            .filter(|node| node.node_type == NodeType::Component)
    }

    /// Every node reachable from a root, in no particular order
    pub fn attached_nodes(&self) -> impl Iterator<Item = &NodeRecord> + '_ {
        self.attached.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Explicitly set style fields stored under a path key
    pub fn style(&self, path_key: &str) -> Option<&PartialStyle> {
        self.styles.get(path_key)
    }

    /// Defaults with the node's own partial style applied
    pub fn node_style(&self, id: &str) -> StyleRecord {
        self.styles
            .get(id)
            .map(StyleRecord::from_partial)
            .unwrap_or_default()
    }

    /// Override records stored below `path_key` (an instance id, or a path
    /// through instances), keyed relative to it
    pub fn overrides(&self, path_key: &str) -> BTreeMap<String, PartialStyle> {
        let prefix = format!("{}:", path_key);
        self.styles
            .iter()
            .filter_map(|(key, style)| {
                key.strip_prefix(&prefix)
                    .map(|suffix| (suffix.to_string(), style.clone()))
            })
            .collect()
    }

    /// The component an instance renders, when it exists
    pub fn main_component(&self, instance_id: &str) -> Option<&NodeRecord> {
        let node = self.nodes.get(instance_id)?;
        if node.node_type != NodeType::Instance {
            return None;
        }
        let component_id = self.styles.get(instance_id)?.main_component.clone()??;
        self.nodes
            .get(&component_id)
            .filter(|component| component.node_type == NodeType::Component)
    }

    pub fn images(&self) -> &BTreeMap<String, ImageDescriptor> {
        &self.images
    }

    pub fn component_urls(&self) -> &[String] {
        &self.component_urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(entries: &[(MapName, &str, &str)]) -> RawState {
        entries
            .iter()
            .map(|(map, key, value)| (RawKey::new(*map, *key), value.to_string()))
            .collect()
    }

    fn sample() -> Snapshot {
        use MapName::*;
        Snapshot::from_raw(
            3,
            raw(&[
                (Nodes, "p/type", r#""page""#),
                (Nodes, "a/type", r#""frame""#),
                (Nodes, "a/parent", r#"{"parent":"p","index":2.0}"#),
                (Nodes, "a/name", r#""Header""#),
                (Nodes, "b/type", r#""text""#),
                (Nodes, "b/parent", r#"{"parent":"p","index":1.0}"#),
                (Nodes, "c/type", r#""text""#),
                (Nodes, "c/parent", r#"{"parent":"a","index":0.0}"#),
                (Nodes, "loose/type", r#""frame""#),
                (Styles, "a/opacity", "0.5"),
                (Styles, "a/bogus", "1"),
                (Meta, "componentUrls", r#"["https://example.com/lib.json"]"#),
            ]),
        )
    }

    #[test]
    fn test_tree_navigation() {
        let snapshot = sample();
        assert_eq!(snapshot.revision(), 3);
        assert_eq!(snapshot.child_ids("p"), ["b".to_string(), "a".to_string()]);
        assert_eq!(snapshot.next_sibling("b").map(|n| n.id.as_str()), Some("a"));
        assert_eq!(snapshot.previous_sibling("b"), None);
        assert_eq!(snapshot.parent("c").map(|n| n.id.as_str()), Some("a"));
        assert_eq!(snapshot.node("a").and_then(|n| n.name.as_deref()), Some("Header"));

        let ancestors: Vec<_> = snapshot.ancestors("c").iter().map(|n| n.id.clone()).collect();
        assert_eq!(ancestors, vec!["a", "p"]);

        let descendants: Vec<_> = snapshot.descendants("p").iter().map(|n| n.id.clone()).collect();
        assert_eq!(descendants, vec!["b", "a", "c"]);
        assert!(snapshot.is_ancestor("p", "c"));
        assert!(!snapshot.is_ancestor("c", "p"));
    }

    #[test]
    fn test_detached_nodes_are_hidden() {
        let snapshot = sample();
        assert!(snapshot.node("loose").is_some());
        assert!(!snapshot.is_attached("loose"));
        assert_eq!(snapshot.attached_nodes().count(), 4);
        assert_eq!(snapshot.pages().count(), 1);
    }

    #[test]
    fn test_merged_cycle_is_hidden() {
        use MapName::*;
        let snapshot = Snapshot::from_raw(
            1,
            raw(&[
                (Nodes, "p/type", r#""page""#),
                (Nodes, "x/type", r#""frame""#),
                (Nodes, "x/parent", r#"{"parent":"y","index":0.0}"#),
                (Nodes, "y/type", r#""frame""#),
                (Nodes, "y/parent", r#"{"parent":"x","index":0.0}"#),
            ]),
        );
        assert!(!snapshot.is_attached("x"));
        assert!(!snapshot.is_attached("y"));
        assert_eq!(snapshot.ancestors("x").len(), 2);
        assert_eq!(snapshot.descendants("x").len(), 2);
    }

    #[test]
    fn test_invalid_style_fields_are_skipped() {
        let snapshot = sample();
        let style = snapshot.style("a").unwrap();
        assert_eq!(style.opacity, Some(0.5));
        assert_eq!(snapshot.node_style("a").opacity, 0.5);
        assert_eq!(snapshot.node_style("b"), StyleRecord::default());
        assert_eq!(snapshot.component_urls(), ["https://example.com/lib.json".to_string()]);
    }

    #[test]
    fn test_raw_diff() {
        use MapName::*;
        let before = raw(&[(Nodes, "a/type", "1"), (Nodes, "b/type", "2")]);
        let after = raw(&[(Nodes, "b/type", "3"), (Nodes, "c/type", "4")]);
        let keys: Vec<String> = diff_raw(&before, &after).iter().map(|k| k.key.clone()).collect();
        assert_eq!(keys, vec!["a/type", "b/type", "c/type"]);
    }

    #[test]
    fn test_raw_key_owner() {
        assert_eq!(RawKey::style("i:c", "fills").node_id(), Some("i"));
        assert_eq!(RawKey::node("n", "parent").node_id(), Some("n"));
        assert_eq!(RawKey::image("abc").node_id(), None);
    }
}
