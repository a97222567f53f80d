//! # Document Operations
//!
//! Primitive operations on the document store and the tree operations
//! built from them.
//!
//! ## Semantics
//!
//! ### Transactions
//! - Operations are staged against the state the transaction has built so
//!   far, so later operations see earlier ones
//! - Any failing operation discards the whole transaction
//!
//! ### SetParent
//! - Pages never have a parent; only pages and components may be roots
//! - Fails if the node would become its own ancestor
//! - Order among siblings is a fractional index, ties broken by id
//!
//! ### DeleteNode
//! - Only childless nodes; `remove` deletes whole subtrees leaf first
//! - Drops the node's own style and every override stored on it
//!
//! ### SetStyle
//! - Last write wins per field
//! - Paths longer than one segment are overrides and must start at an
//!   instance

use crate::document::{
    sibling_order, MapName, NodeRecord, NodeType, ParentEntry, RawKey, Snapshot,
    COMPONENT_URLS_KEY, NAME_FIELD, PARENT_FIELD, TYPE_FIELD,
};
use crate::errors::{EditorError, EditorResult, SerializationError};
use crate::id::{is_valid_id, IdGenerator, IdPath};
use crate::images::{ImageBlob, ImageDescriptor};
use crate::style::{is_field_name, PartialStyle, StyleRecord};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

/// Primitive store operation
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Create a detached node
    CreateNode { id: String, node_type: NodeType },

    /// Place a node under `parent` (or at root level) at a sibling index
    SetParent {
        id: String,
        parent: Option<String>,
        index: f64,
    },

    SetName { id: String, name: Option<String> },

    /// Delete a childless node
    DeleteNode { id: String },

    /// Set (`Some`) or clear (`None`) one style field at a path
    SetStyle {
        path: IdPath,
        field: String,
        value: Option<serde_json::Value>,
    },

    /// Add an image; no-op if the hash is present
    PutImage {
        hash: String,
        descriptor: ImageDescriptor,
    },

    SetComponentUrls { urls: Vec<String> },
}

pub(crate) fn encode<T: Serialize + ?Sized>(value: &T) -> EditorResult<String> {
    serde_json::to_string(value).map_err(|e| EditorError::from(SerializationError::from(e)))
}

/// Staged writes of one store transaction
pub struct Transaction<'a> {
    base: Rc<Snapshot>,
    ids: &'a mut IdGenerator,
    /// Staged node records; `None` marks a deletion
    nodes: HashMap<String, Option<NodeRecord>>,
    writes: BTreeMap<RawKey, Option<String>>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(base: Rc<Snapshot>, ids: &'a mut IdGenerator) -> Self {
        Self {
            base,
            ids,
            nodes: HashMap::new(),
            writes: BTreeMap::new(),
        }
    }

    pub(crate) fn into_writes(self) -> BTreeMap<RawKey, Option<String>> {
        self.writes
    }

    /// State at the start of the transaction
    pub fn base(&self) -> &Snapshot {
        &self.base
    }

    pub fn new_id(&mut self) -> String {
        self.ids.new_id()
    }

    pub fn apply(&mut self, op: Op) -> EditorResult<()> {
        match op {
            Op::CreateNode { id, node_type } => self.create_node(id, node_type),
            Op::SetParent { id, parent, index } => self.set_parent(&id, parent, index),
            Op::SetName { id, name } => self.set_node_name(&id, name),
            Op::DeleteNode { id } => {
                if self.node(&id).is_none() {
                    return Err(unknown_node(&id));
                }
                if !self.children(&id).is_empty() {
                    return Err(EditorError::invalid(format!(
                        "cannot delete `{}` while it has children",
                        id
                    )));
                }
                self.purge_overrides_into(&HashSet::from([id.clone()]));
                self.stage_delete(&id);
                Ok(())
            }
            Op::SetStyle { path, field, value } => self.set_style_field(&path, field, value),
            Op::PutImage { hash, descriptor } => self.put_image(hash, descriptor),
            Op::SetComponentUrls { urls } => {
                let value = encode(&urls)?;
                self.write(RawKey::meta(COMPONENT_URLS_KEY), Some(value));
                Ok(())
            }
        }
    }

    // ---- staged reads ----

    /// Node as staged so far
    pub fn node(&self, id: &str) -> Option<&NodeRecord> {
        match self.nodes.get(id) {
            Some(staged) => staged.as_ref(),
            None => self.base.node(id),
        }
    }

    /// Ordered child ids of `parent`
    pub fn children(&self, parent: &str) -> Vec<String> {
        self.staged_children(Some(parent))
    }

    /// Ordered root ids (pages and components)
    pub fn roots(&self) -> Vec<String> {
        self.staged_children(None)
    }

    fn staged_children(&self, parent: Option<&str>) -> Vec<String> {
        let base_ids = match parent {
            Some(parent) => self.base.child_ids(parent),
            None => self.base.root_ids(),
        };

        let mut records: Vec<&NodeRecord> = base_ids
            .iter()
            .filter(|id| !self.nodes.contains_key(*id))
            .filter_map(|id| self.base.node(id))
            .collect();
        records.extend(self.nodes.values().flatten().filter(|node| {
            node.parent.as_deref() == parent && (parent.is_some() || node.node_type.is_root_type())
        }));
        records.sort_by(|a, b| sibling_order(a, b));
        records.into_iter().map(|node| node.id.clone()).collect()
    }

    /// Explicitly set fields stored under `path_key`, as staged
    pub fn style(&self, path_key: &str) -> PartialStyle {
        let prefix = format!("{}/", path_key);
        let start = RawKey::new(MapName::Styles, prefix.clone());
        let in_range = |key: &RawKey| key.map == MapName::Styles && key.key.starts_with(&prefix);

        let mut values: BTreeMap<&str, Option<&String>> = self
            .base
            .raw()
            .range(start.clone()..)
            .take_while(|(key, _)| in_range(key))
            .map(|(key, value)| (&key.key[prefix.len()..], Some(value)))
            .collect();
        for (key, value) in self.writes.range(start..).take_while(|(key, _)| in_range(key)) {
            values.insert(&key.key[prefix.len()..], value.as_ref());
        }

        let mut style = PartialStyle::default();
        for (field, value) in values {
            let Some(value) = value else {
                continue;
            };
            if let Ok(partial) = serde_json::from_str(value)
                .and_then(|value| PartialStyle::from_field(field, value))
            {
                style.overlay(&partial);
            }
        }
        style
    }

    /// Defaults with the staged partial style of `path_key` applied
    pub fn style_record(&self, path_key: &str) -> StyleRecord {
        StyleRecord::from_partial(&self.style(path_key))
    }

    pub fn has_image(&self, hash: &str) -> bool {
        match self.writes.get(&RawKey::image(hash)) {
            Some(staged) => staged.is_some(),
            None => self.base.images().contains_key(hash),
        }
    }

    // ---- primitive ops ----

    fn write(&mut self, key: RawKey, value: Option<String>) {
        self.writes.insert(key, value);
    }

    fn create_node(&mut self, id: String, node_type: NodeType) -> EditorResult<()> {
        if !is_valid_id(&id) {
            return Err(EditorError::invalid(format!("invalid node id `{}`", id)));
        }
        if self.node(&id).is_some() {
            return Err(EditorError::invalid(format!("node `{}` already exists", id)));
        }

        let value = encode(&node_type)?;
        self.write(RawKey::node(&id, TYPE_FIELD), Some(value));
        self.nodes
            .insert(id.clone(), Some(NodeRecord::new(id, node_type)));
        Ok(())
    }

    fn set_parent(&mut self, id: &str, parent: Option<String>, index: f64) -> EditorResult<()> {
        let mut node = self.node(id).cloned().ok_or_else(|| unknown_node(id))?;
        if !index.is_finite() {
            return Err(EditorError::invalid(format!(
                "sibling index of `{}` must be finite",
                id
            )));
        }

        match parent.as_deref() {
            None if !node.node_type.is_root_type() => {
                return Err(EditorError::invalid(format!(
                    "`{}` is a {} and cannot be a root",
                    id, node.node_type
                )));
            }
            None => {}
            Some(parent_id) => {
                if node.node_type == NodeType::Page {
                    return Err(EditorError::invalid(format!(
                        "page `{}` cannot have a parent",
                        id
                    )));
                }
                let parent_node = self.node(parent_id).ok_or_else(|| unknown_node(parent_id))?;
                if parent_id != id && !parent_node.node_type.can_contain(node.node_type) {
                    return Err(EditorError::invalid(format!(
                        "a {} cannot contain a {}",
                        parent_node.node_type, node.node_type
                    )));
                }
                self.check_cycle(id, parent_id)?;
            }
        }

        let value = encode(&ParentEntry {
            parent: parent.clone(),
            index,
        })?;
        self.write(RawKey::node(id, PARENT_FIELD), Some(value));
        node.parent = parent;
        node.index = index;
        self.nodes.insert(id.to_string(), Some(node));
        Ok(())
    }

    /// Fails if `id` is `parent_id` or one of its ancestors
    fn check_cycle(&self, id: &str, parent_id: &str) -> EditorResult<()> {
        let mut visited = HashSet::new();
        let mut current = Some(parent_id);
        while let Some(ancestor) = current {
            if ancestor == id {
                return Err(EditorError::Cycle {
                    node: id.to_string(),
                    parent: parent_id.to_string(),
                });
            }
            if !visited.insert(ancestor) {
                break;
            }
            current = self.node(ancestor).and_then(|node| node.parent.as_deref());
        }
        Ok(())
    }

    fn set_node_name(&mut self, id: &str, name: Option<String>) -> EditorResult<()> {
        let mut node = self.node(id).cloned().ok_or_else(|| unknown_node(id))?;
        let value = name.as_ref().map(encode).transpose()?;
        self.write(RawKey::node(id, NAME_FIELD), value);
        node.name = name;
        self.nodes.insert(id.to_string(), Some(node));
        Ok(())
    }

    fn stage_delete(&mut self, id: &str) {
        for field in [TYPE_FIELD, PARENT_FIELD, NAME_FIELD] {
            self.write(RawKey::node(id, field), None);
        }
        for key in self.style_keys_of(id) {
            self.write(key, None);
        }
        self.nodes.insert(id.to_string(), None);
    }

    /// Style keys of the node itself and of every override stored on it
    fn style_keys_of(&self, id: &str) -> Vec<RawKey> {
        let mut keys = Vec::new();
        for prefix in [format!("{}/", id), format!("{}:", id)] {
            let start = RawKey::new(MapName::Styles, prefix.clone());
            let in_range =
                |key: &RawKey| key.map == MapName::Styles && key.key.starts_with(&prefix);
            keys.extend(
                self.base
                    .raw()
                    .range(start.clone()..)
                    .take_while(|(key, _)| in_range(key))
                    .map(|(key, _)| key.clone()),
            );
            keys.extend(
                self.writes
                    .range(start..)
                    .take_while(|(key, _)| in_range(key))
                    .map(|(key, _)| key.clone()),
            );
        }
        keys
    }

    fn set_style_field(
        &mut self,
        path: &IdPath,
        field: String,
        value: Option<serde_json::Value>,
    ) -> EditorResult<()> {
        if let Some(bad) = path.ids().iter().find(|id| !is_valid_id(id)) {
            return Err(EditorError::invalid(format!("invalid node id `{}`", bad)));
        }
        let owner = self
            .node(path.first())
            .ok_or_else(|| unknown_node(path.first()))?;
        if path.len() > 1 && owner.node_type != NodeType::Instance {
            return Err(EditorError::invalid(format!(
                "overrides can only be stored on instances, `{}` is a {}",
                owner.id, owner.node_type
            )));
        }

        let key = RawKey::style(&path.key(), &field);
        match value {
            Some(value) => {
                PartialStyle::from_field(&field, value.clone()).map_err(|e| {
                    EditorError::invalid(format!("invalid value for style field `{}`: {}", field, e))
                })?;
                let encoded = encode(&value)?;
                self.write(key, Some(encoded));
            }
            None => {
                if !is_field_name(&field) {
                    return Err(EditorError::invalid(format!("unknown style field `{}`", field)));
                }
                self.write(key, None);
            }
        }
        Ok(())
    }

    fn put_image(&mut self, hash: String, descriptor: ImageDescriptor) -> EditorResult<()> {
        if hash.is_empty() {
            return Err(EditorError::invalid("image hash must not be empty"));
        }
        if self.has_image(&hash) {
            return Ok(());
        }
        let value = encode(&descriptor)?;
        self.write(RawKey::image(&hash), Some(value));
        Ok(())
    }

    /// Stage every key of the base state for deletion
    pub(crate) fn purge(&mut self) {
        let keys: Vec<RawKey> = self.base.raw().keys().cloned().collect();
        for key in keys {
            self.write(key, None);
        }
        let ids: Vec<String> = self.nodes.keys().cloned().collect();
        for id in ids {
            self.nodes.insert(id, None);
        }
        let base_ids: Vec<String> = self
            .base
            .raw()
            .keys()
            .filter(|key| key.map == MapName::Nodes)
            .filter_map(|key| key.node_id().map(str::to_string))
            .collect();
        for id in base_ids {
            self.nodes.insert(id, None);
        }
    }

    // ---- tree operations ----

    /// Create a detached node with a fresh id
    pub fn create(&mut self, node_type: NodeType) -> EditorResult<String> {
        // A loaded document may already use ids from this seed
        let mut id = self.new_id();
        while self.nodes.contains_key(&id)
            || self.base.raw().contains_key(&RawKey::node(&id, TYPE_FIELD))
        {
            id = self.new_id();
        }
        self.apply(Op::CreateNode {
            id: id.clone(),
            node_type,
        })?;
        Ok(id)
    }

    pub fn append(&mut self, parent: &str, nodes: &[String]) -> EditorResult<()> {
        self.insert_before(Some(parent), nodes, None)
    }

    /// Move `nodes` (in order) under `parent`, before `before` or last.
    /// `parent = None` targets the root level.
    pub fn insert_before(
        &mut self,
        parent: Option<&str>,
        nodes: &[String],
        before: Option<&str>,
    ) -> EditorResult<()> {
        if nodes.is_empty() {
            return Ok(());
        }

        let mut moving = HashSet::new();
        for id in nodes {
            if !moving.insert(id.as_str()) {
                return Err(EditorError::invalid(format!("`{}` is inserted twice", id)));
            }
        }
        if let Some(before) = before {
            if moving.contains(before) {
                return Err(EditorError::invalid(format!(
                    "cannot insert `{}` before itself",
                    before
                )));
            }
        }

        let siblings: Vec<String> = self
            .staged_children(parent)
            .into_iter()
            .filter(|id| !moving.contains(id.as_str()))
            .collect();
        let position = match before {
            Some(before) => siblings.iter().position(|s| s == before).ok_or_else(|| {
                EditorError::invalid(format!(
                    "`{}` is not a child of `{}`",
                    before,
                    parent.unwrap_or("<root>")
                ))
            })?,
            None => siblings.len(),
        };

        let lower = position
            .checked_sub(1)
            .and_then(|p| siblings.get(p))
            .and_then(|id| self.node(id))
            .map(|node| node.index);
        let upper = siblings
            .get(position)
            .and_then(|id| self.node(id))
            .map(|node| node.index);
        let parent_owned = parent.map(str::to_string);

        match spaced_indices(lower, upper, nodes.len()) {
            Some(indices) => {
                for (id, index) in nodes.iter().zip(indices) {
                    self.apply(Op::SetParent {
                        id: id.clone(),
                        parent: parent_owned.clone(),
                        index,
                    })?;
                }
            }
            None => {
                // Out of precision: renumber the whole sibling list
                let mut ordered = siblings;
                ordered.splice(position..position, nodes.iter().cloned());
                for (i, id) in ordered.iter().enumerate() {
                    let index = i as f64;
                    let unchanged = !moving.contains(id.as_str())
                        && self.node(id).is_some_and(|node| node.index == index);
                    if !unchanged {
                        self.apply(Op::SetParent {
                            id: id.clone(),
                            parent: parent_owned.clone(),
                            index,
                        })?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Delete `nodes` together with all their descendants
    pub fn remove(&mut self, nodes: &[String]) -> EditorResult<()> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        for id in nodes {
            if self.node(id).is_none() {
                return Err(unknown_node(id));
            }
            self.collect_post_order(id, &mut order, &mut seen);
        }
        self.purge_overrides_into(&seen);
        for id in order {
            self.stage_delete(&id);
        }
        Ok(())
    }

    /// Drop override style keys on instances that point into one of `removed`
    fn purge_overrides_into(&mut self, removed: &HashSet<String>) {
        let points_into = |key: &RawKey| {
            key.map == MapName::Styles
                && key.split().is_some_and(|(owner, _)| {
                    owner.split(':').skip(1).any(|id| removed.contains(id))
                })
        };
        let staged = self
            .writes
            .iter()
            .filter(|(_, value)| value.is_some())
            .map(|(key, _)| key);
        let mut keys: Vec<RawKey> = self
            .base
            .raw()
            .keys()
            .chain(staged)
            .filter(|key| points_into(key))
            .cloned()
            .collect();
        keys.sort();
        keys.dedup();
        for key in keys {
            self.write(key, None);
        }
    }

    fn collect_post_order(&self, id: &str, out: &mut Vec<String>, seen: &mut HashSet<String>) {
        if !seen.insert(id.to_string()) {
            return;
        }
        for child in self.children(id) {
            self.collect_post_order(&child, out, seen);
        }
        out.push(id.to_string());
    }

    pub fn reparent(&mut self, node: &str, parent: Option<&str>, before: Option<&str>) -> EditorResult<()> {
        self.insert_before(parent, &[node.to_string()], before)
    }

    pub fn set_name(&mut self, id: &str, name: Option<String>) -> EditorResult<()> {
        self.apply(Op::SetName {
            id: id.to_string(),
            name,
        })
    }

    /// Set every field present in `style` at `path`
    pub fn set_style(&mut self, path: &IdPath, style: &PartialStyle) -> EditorResult<()> {
        let fields = style
            .to_fields()
            .map_err(|e| EditorError::from(SerializationError::from(e)))?;
        for (field, value) in fields {
            self.apply(Op::SetStyle {
                path: path.clone(),
                field,
                value: Some(value),
            })?;
        }
        Ok(())
    }

    pub fn clear_style(&mut self, path: &IdPath, field: &str) -> EditorResult<()> {
        self.apply(Op::SetStyle {
            path: path.clone(),
            field: field.to_string(),
            value: None,
        })
    }

    /// Store an image under its content hash
    pub fn insert_image(&mut self, blob: &ImageBlob) -> EditorResult<String> {
        let hash = blob.hash();
        self.apply(Op::PutImage {
            hash: hash.clone(),
            descriptor: blob.to_descriptor(),
        })?;
        Ok(hash)
    }

    pub fn set_component_urls(&mut self, urls: Vec<String>) -> EditorResult<()> {
        self.apply(Op::SetComponentUrls { urls })
    }
}

fn unknown_node(id: &str) -> EditorError {
    EditorError::invalid(format!("unknown node `{}`", id))
}

/// `count` increasing indices strictly between `lower` and `upper`, or
/// `None` when floating point precision cannot separate them
fn spaced_indices(lower: Option<f64>, upper: Option<f64>, count: usize) -> Option<Vec<f64>> {
    let n = count as f64;
    let indices: Vec<f64> = match (lower, upper) {
        (None, None) => (0..count).map(|i| i as f64).collect(),
        (Some(lo), None) => (1..=count).map(|i| lo + i as f64).collect(),
        (None, Some(hi)) => (0..count).map(|i| hi - (n - i as f64)).collect(),
        (Some(lo), Some(hi)) => {
            let step = (hi - lo) / (n + 1.0);
            (1..=count).map(|i| lo + step * i as f64).collect()
        }
    };

    let mut previous = lower;
    for &index in &indices {
        if !index.is_finite() || previous.is_some_and(|p| index <= p) {
            return None;
        }
        previous = Some(index);
    }
    match (previous, upper) {
        (Some(last), Some(hi)) if last >= hi => None,
        _ => Some(indices),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::SizeConstraint;
    use serde_json::json;

    fn with_tx<T>(f: impl FnOnce(&mut Transaction) -> T) -> T {
        let mut ids = IdGenerator::from_seed("t");
        let mut tx = Transaction::new(Rc::new(Snapshot::default()), &mut ids);
        f(&mut tx)
    }

    #[test]
    fn test_spaced_indices() {
        assert_eq!(spaced_indices(None, None, 2), Some(vec![0.0, 1.0]));
        assert_eq!(spaced_indices(Some(3.0), None, 2), Some(vec![4.0, 5.0]));
        assert_eq!(spaced_indices(None, Some(0.0), 2), Some(vec![-2.0, -1.0]));
        assert_eq!(spaced_indices(Some(0.0), Some(1.0), 1), Some(vec![0.5]));
        assert_eq!(spaced_indices(Some(1.0), Some(1.0), 1), None);
        assert_eq!(
            spaced_indices(Some(1.0), Some(1.0 + f64::EPSILON), 3),
            None
        );
    }

    #[test]
    fn test_staged_tree() {
        with_tx(|tx| {
            let page = tx.create(NodeType::Page).unwrap();
            tx.reparent(&page, None, None).unwrap();
            let a = tx.create(NodeType::Frame).unwrap();
            let b = tx.create(NodeType::Text).unwrap();
            let c = tx.create(NodeType::Text).unwrap();

            tx.append(&page, &[a.clone(), c.clone()]).unwrap();
            tx.insert_before(Some(&page), &[b.clone()], Some(&c)).unwrap();
            assert_eq!(tx.children(&page), vec![a.clone(), b.clone(), c.clone()]);
            assert_eq!(tx.roots(), vec![page.clone()]);

            tx.reparent(&c, Some(&a), None).unwrap();
            assert_eq!(tx.children(&page), vec![a.clone(), b.clone()]);
            assert_eq!(tx.children(&a), vec![c.clone()]);
        });
    }

    #[test]
    fn test_cycle_rejected() {
        with_tx(|tx| {
            let page = tx.create(NodeType::Page).unwrap();
            let outer = tx.create(NodeType::Frame).unwrap();
            let inner = tx.create(NodeType::Frame).unwrap();
            tx.append(&page, &[outer.clone()]).unwrap();
            tx.append(&outer, &[inner.clone()]).unwrap();

            let err = tx.append(&inner, &[outer.clone()]).unwrap_err();
            assert!(matches!(err, EditorError::Cycle { .. }));
            let err = tx.append(&outer, &[outer.clone()]).unwrap_err();
            assert!(matches!(err, EditorError::Cycle { .. }));
        });
    }

    #[test]
    fn test_structural_rules() {
        with_tx(|tx| {
            let page = tx.create(NodeType::Page).unwrap();
            let other = tx.create(NodeType::Page).unwrap();
            let text = tx.create(NodeType::Text).unwrap();
            let frame = tx.create(NodeType::Frame).unwrap();

            assert!(tx.append(&page, &[other.clone()]).is_err());
            assert!(tx.reparent(&frame, None, None).is_err());
            tx.append(&page, &[text.clone()]).unwrap();
            assert!(tx.append(&text, &[frame.clone()]).is_err());
            assert!(tx.append("missing", &[frame.clone()]).is_err());
            assert!(tx
                .insert_before(Some(&page), &[frame.clone()], Some(&frame))
                .is_err());
            assert!(tx
                .apply(Op::CreateNode {
                    id: "a:b".to_string(),
                    node_type: NodeType::Frame
                })
                .is_err());
            assert!(tx
                .apply(Op::CreateNode {
                    id: page.clone(),
                    node_type: NodeType::Frame
                })
                .is_err());
        });
    }

    #[test]
    fn test_remove_cascades() {
        with_tx(|tx| {
            let page = tx.create(NodeType::Page).unwrap();
            let frame = tx.create(NodeType::Frame).unwrap();
            let text = tx.create(NodeType::Text).unwrap();
            tx.append(&page, &[frame.clone()]).unwrap();
            tx.append(&frame, &[text.clone()]).unwrap();
            tx.set_style(
                &IdPath::single(&text),
                &PartialStyle {
                    opacity: Some(0.5),
                    ..Default::default()
                },
            )
            .unwrap();

            assert!(tx
                .apply(Op::DeleteNode { id: frame.clone() })
                .is_err());
            tx.remove(&[frame.clone()]).unwrap();
            assert!(tx.node(&frame).is_none());
            assert!(tx.node(&text).is_none());
            assert!(tx.children(&page).is_empty());
            assert!(tx.style(&text).is_empty());
        });
    }

    #[test]
    fn test_remove_drops_overrides_into_removed_nodes() {
        with_tx(|tx| {
            let component = tx.create(NodeType::Component).unwrap();
            tx.reparent(&component, None, None).unwrap();
            let body = tx.create(NodeType::Frame).unwrap();
            let label = tx.create(NodeType::Text).unwrap();
            let icon = tx.create(NodeType::Frame).unwrap();
            tx.append(&component, &[body.clone(), icon.clone()]).unwrap();
            tx.append(&body, &[label.clone()]).unwrap();
            let instance = tx.create(NodeType::Instance).unwrap();

            let faded = PartialStyle {
                opacity: Some(0.5),
                ..Default::default()
            };
            let instance_path = IdPath::single(&instance);
            for target in [&body, &label, &icon] {
                tx.set_style(&instance_path.child(target), &faded).unwrap();
            }
            tx.set_style(&instance_path, &faded).unwrap();

            tx.remove(&[body.clone()]).unwrap();
            assert!(tx.style(&instance_path.child(&body).key()).is_empty());
            assert!(tx.style(&instance_path.child(&label).key()).is_empty());
            assert!(!tx.style(&instance_path.child(&icon).key()).is_empty());
            assert!(!tx.style(&instance).is_empty());

            tx.apply(Op::DeleteNode { id: icon.clone() }).unwrap();
            assert!(tx.style(&instance_path.child(&icon).key()).is_empty());
            assert!(!tx.style(&instance).is_empty());
        });
    }

    #[test]
    fn test_style_staging() {
        with_tx(|tx| {
            let frame = tx.create(NodeType::Frame).unwrap();
            let path = IdPath::single(&frame);
            tx.apply(Op::SetStyle {
                path: path.clone(),
                field: "width".to_string(),
                value: Some(json!({"type": "fill"})),
            })
            .unwrap();
            assert_eq!(tx.style_record(&frame).width, SizeConstraint::Fill);

            tx.clear_style(&path, "width").unwrap();
            assert_eq!(tx.style(&frame).width, None);

            assert!(tx
                .apply(Op::SetStyle {
                    path: path.clone(),
                    field: "opacity".to_string(),
                    value: Some(json!("opaque")),
                })
                .is_err());
            assert!(tx.clear_style(&path, "nonsense").is_err());
            assert!(tx
                .set_style(
                    &path.child("other"),
                    &PartialStyle {
                        gap: Some(1.0),
                        ..Default::default()
                    }
                )
                .is_err());
        });
    }

    #[test]
    fn test_images_dedupe() {
        with_tx(|tx| {
            let blob = ImageBlob::new(vec![9, 9, 9], "image/png");
            let first = tx.insert_image(&blob).unwrap();
            let second = tx.insert_image(&blob).unwrap();
            assert_eq!(first, second);
            assert!(tx.has_image(&first));
        });
    }
}
