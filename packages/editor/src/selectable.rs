//! # Selectable Layer
//!
//! A [`Selectable`] is a visual element addressed by an [`IdPath`]. Paths
//! of length one point at document nodes; longer paths cross instance
//! boundaries into the subtree of the component an instance renders:
//!
//! ```text
//! page
//! └── card-instance          [instance]
//!     └── (component) ─┐     [instance, title]
//!         title  ◄─────┘
//! ```
//!
//! Selectables are derived from one snapshot and never stored. Elements
//! inside an instance are read-only structurally but may carry style
//! overrides, stored on the outermost instance under the full path key.

use crate::clipboard::ClipboardNode;
use crate::document::{NodeRecord, NodeType, Snapshot};
use crate::errors::{EditorError, EditorResult};
use crate::id::IdPath;
use crate::mutations::Transaction;
use crate::resolve::{resolve, ConcreteAttributes};
use crate::style::{PartialStyle, PositionConstraint, PositionConstraints, StackDirection, StyleRecord};
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Selectable {
    snapshot: Rc<Snapshot>,
    path: IdPath,
    node: NodeRecord,
}

impl PartialEq for Selectable {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.snapshot.revision() == other.snapshot.revision()
    }
}

impl Selectable {
    /// Resolve `path` against `snapshot`. Each segment before the last must
    /// be an expandable instance, and the segment after it must lie inside
    /// that instance's main component. Detached nodes never resolve.
    pub fn from_path(snapshot: Rc<Snapshot>, path: IdPath) -> Option<Self> {
        if !snapshot.is_attached(path.first()) {
            return None;
        }
        let node = snapshot.node(path.first())?.clone();
        let mut current = Selectable {
            snapshot,
            path: IdPath::single(path.first()),
            node,
        };
        for id in &path.ids()[1..] {
            let inside = current
                .main_component()
                .is_some_and(|component| current.snapshot.is_ancestor(&component.id, id));
            if !inside {
                return None;
            }
            current = current.at(current.path.child(id))?;
        }
        Some(current)
    }

    pub fn root(snapshot: Rc<Snapshot>, id: &str) -> Option<Self> {
        Self::from_path(snapshot, IdPath::single(id))
    }

    pub fn path(&self) -> &IdPath {
        &self.path
    }

    /// Id of the addressed node
    pub fn id(&self) -> &str {
        self.path.last()
    }

    pub fn node(&self) -> &NodeRecord {
        &self.node
    }

    pub fn node_type(&self) -> NodeType {
        self.node().node_type
    }

    pub fn snapshot(&self) -> &Rc<Snapshot> {
        &self.snapshot
    }

    /// Whether the element lives inside an instance expansion
    pub fn is_in_instance(&self) -> bool {
        self.path.len() > 1
    }

    fn at(&self, path: IdPath) -> Option<Selectable> {
        let node = self.snapshot.node(path.last())?.clone();
        Some(Selectable {
            snapshot: Rc::clone(&self.snapshot),
            path,
            node,
        })
    }

    /// The component rendered by this element, if it is an instance that
    /// may be expanded here
    pub fn main_component(&self) -> Option<&NodeRecord> {
        let component = self.snapshot.main_component(self.id())?;

        // An instance inside its own component would expand forever
        if self.snapshot.is_ancestor(&component.id, self.id()) {
            return None;
        }
        let ids = self.path.ids();
        let already_expanded = ids[..ids.len() - 1].iter().any(|outer| {
            self.snapshot
                .main_component(outer)
                .is_some_and(|outer_component| outer_component.id == component.id)
        });
        if already_expanded {
            return None;
        }
        Some(component)
    }

    fn child_paths(&self) -> Vec<IdPath> {
        if self.node_type() == NodeType::Instance {
            return match self.main_component() {
                Some(component) => self
                    .snapshot
                    .child_ids(&component.id)
                    .iter()
                    .map(|child| self.path.child(child))
                    .collect(),
                None => Vec::new(),
            };
        }
        self.snapshot
            .child_ids(self.id())
            .iter()
            .map(|child| self.path.sibling(child))
            .collect()
    }

    pub fn children(&self) -> Vec<Selectable> {
        self.child_paths()
            .into_iter()
            .filter_map(|path| self.at(path))
            .collect()
    }

    pub fn parent(&self) -> Option<Selectable> {
        let parent_id = self.node().parent.as_deref()?;
        if let Some(instance) = self.path.prefix().and_then(|prefix| self.at(prefix)) {
            let expanded = instance
                .main_component()
                .is_some_and(|component| component.id == parent_id);
            if expanded {
                return Some(instance);
            }
        }
        self.at(self.path.sibling(parent_id))
    }

    /// Number of ancestors
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent();
        while let Some(parent) = current {
            depth += 1;
            current = parent.parent();
        }
        depth
    }

    /// Ancestor at `depth` (1 = child of a root), or self if shallower
    pub fn ancestor_at_depth(&self, depth: usize) -> Selectable {
        let mut chain = vec![self.clone()];
        let mut current = self.parent();
        while let Some(parent) = current {
            current = parent.parent();
            chain.push(parent);
        }
        chain.reverse();
        chain.get(depth).cloned().unwrap_or_else(|| self.clone())
    }

    /// Depth-first, pre-order, excluding self
    pub fn descendants(&self) -> Vec<Selectable> {
        let mut out = Vec::new();
        let mut stack: Vec<Selectable> = self.children().into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            stack.extend(next.children().into_iter().rev());
            out.push(next);
        }
        out
    }

    /// Selected elements at or below this one. A selected element is not
    /// descended into.
    pub fn selected_descendants(&self, selection: &SelectionSet) -> Vec<Selectable> {
        if selection.contains(&self.path) {
            return vec![self.clone()];
        }
        self.children()
            .iter()
            .flat_map(|child| child.selected_descendants(selection))
            .collect()
    }

    /// Explicitly set fields after applying every enclosing instance's
    /// override, innermost first
    pub fn effective_partial(&self) -> PartialStyle {
        let mut style = self
            .snapshot
            .style(self.id())
            .cloned()
            .unwrap_or_default();
        for start in (0..self.path.len() - 1).rev() {
            if let Some(over) = self.snapshot.style(&self.path.suffix_key(start)) {
                style.overlay(over);
            }
        }
        style
    }

    pub fn style(&self) -> StyleRecord {
        StyleRecord::from_partial(&self.effective_partial())
    }

    /// Stack direction this element is laid out along, if any
    pub fn parent_stack_direction(&self) -> Option<StackDirection> {
        let parent = self.parent()?;
        if parent.node_type() != NodeType::Frame {
            return None;
        }
        parent.style().child_stack_direction()
    }

    pub fn resolve(&self) -> ConcreteAttributes {
        resolve(self.node_type(), &self.style(), self.parent_stack_direction())
    }

    /// Overrides that apply inside this instance's expansion, keyed relative
    /// to it
    fn collected_overrides(&self) -> BTreeMap<String, PartialStyle> {
        let mut overrides = BTreeMap::new();
        for start in (0..self.path.len()).rev() {
            for (key, style) in self.snapshot.overrides(&self.path.suffix_key(start)) {
                overrides
                    .entry(key)
                    .or_insert_with(PartialStyle::default)
                    .overlay(&style);
            }
        }
        overrides
    }

    /// Self-contained copy of this element and its subtree
    pub fn to_json(&self) -> ClipboardNode {
        let node = self.node();
        let is_instance = node.node_type == NodeType::Instance;
        ClipboardNode {
            id: node.id.clone(),
            node_type: node.node_type,
            name: node.name.clone(),
            style: self.effective_partial(),
            overrides: if is_instance {
                self.collected_overrides()
            } else {
                BTreeMap::new()
            },
            children: if is_instance {
                Vec::new()
            } else {
                self.children().iter().map(Selectable::to_json).collect()
            },
        }
    }
}

/// Selected paths in selection order, kept outside the tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    paths: Vec<IdPath>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `path` as the most recent selection. Returns false if it was
    /// already selected, in which case it moves to the end.
    pub fn insert(&mut self, path: IdPath) -> bool {
        let added = !self.remove(&path);
        self.paths.push(path);
        added
    }

    pub fn remove(&mut self, path: &IdPath) -> bool {
        let before = self.paths.len();
        self.paths.retain(|selected| selected != path);
        self.paths.len() != before
    }

    pub fn toggle(&mut self, path: IdPath) {
        if !self.remove(&path) {
            self.paths.push(path);
        }
    }

    pub fn contains(&self, path: &IdPath) -> bool {
        self.paths.contains(path)
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &IdPath> {
        self.paths.iter()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Drop paths that no longer resolve in `snapshot`
    pub fn retain_valid(&mut self, snapshot: &Rc<Snapshot>) {
        self.paths
            .retain(|path| Selectable::from_path(Rc::clone(snapshot), path.clone()).is_some());
    }
}

impl FromIterator<IdPath> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = IdPath>>(iter: I) -> Self {
        let mut selection = Self::new();
        for path in iter {
            selection.insert(path);
        }
        selection
    }
}

/// Options for [`insert_selectables`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOptions {
    /// Translate start offsets so elements keep their place on the canvas
    /// when their parent changes
    pub fix_position: bool,
}

/// Materialize a copied element as a detached node with fresh ids
pub fn from_json(tx: &mut Transaction<'_>, json: &ClipboardNode) -> EditorResult<IdPath> {
    if json.node_type == NodeType::Page {
        return Err(EditorError::invalid("pages cannot be inserted as nodes"));
    }

    let id = tx.create(json.node_type)?;
    let path = IdPath::single(&id);
    if json.name.is_some() {
        tx.set_name(&id, json.name.clone())?;
    }
    tx.set_style(&path, &json.style)?;

    if json.node_type == NodeType::Instance {
        for (key, style) in &json.overrides {
            let override_path = IdPath::from_key(&format!("{}:{}", id, key))
                .ok_or_else(|| EditorError::invalid(format!("invalid override key `{}`", key)))?;
            tx.set_style(&override_path, style)?;
        }
        if !json.children.is_empty() {
            warn!(node = %json.id, "ignoring structural children of copied instance");
        }
        return Ok(path);
    }

    if !json.overrides.is_empty() {
        return Err(EditorError::invalid(format!(
            "`{}` is a {} and cannot carry overrides",
            json.id, json.node_type
        )));
    }
    for child in &json.children {
        let child_path = from_json(tx, child)?;
        tx.append(&id, &[child_path.last().to_string()])?;
    }
    Ok(path)
}

/// Sum of the start offsets of `id` and its staged ancestors
fn accumulated_offset(tx: &Transaction<'_>, id: Option<&str>) -> (f64, f64) {
    let mut offset = (0.0, 0.0);
    let mut seen = HashSet::new();
    let mut current = id.map(str::to_string);
    while let Some(node_id) = current {
        if !seen.insert(node_id.clone()) {
            break;
        }
        let position = tx.style_record(&node_id).position;
        if let PositionConstraint::Start { start } = position.x {
            offset.0 += start;
        }
        if let PositionConstraint::Start { start } = position.y {
            offset.1 += start;
        }
        current = tx.node(&node_id).and_then(|node| node.parent.clone());
    }
    offset
}

fn shift(constraint: PositionConstraint, delta: f64) -> PositionConstraint {
    match constraint {
        PositionConstraint::Start { start } => PositionConstraint::Start {
            start: start + delta,
        },
        end => end,
    }
}

/// Insert elements under `parent`, before `before` or last.
///
/// Only document nodes can be moved: every path must have length one.
pub fn insert_selectables(
    tx: &mut Transaction<'_>,
    parent: &IdPath,
    selectables: &[IdPath],
    before: Option<&IdPath>,
    options: InsertOptions,
) -> EditorResult<()> {
    let structural = std::iter::once(parent)
        .chain(selectables.iter())
        .chain(before);
    for path in structural {
        if path.len() > 1 {
            return Err(EditorError::invalid(format!(
                "`{}` is inside an instance and cannot be restructured",
                path
            )));
        }
    }

    let ids: Vec<String> = selectables.iter().map(|p| p.last().to_string()).collect();

    let mut moved_positions = Vec::new();
    if options.fix_position {
        let new_offset = accumulated_offset(tx, Some(parent.last()));
        for id in &ids {
            let old_parent = tx.node(id).and_then(|node| node.parent.clone());
            let old_offset = accumulated_offset(tx, old_parent.as_deref());
            let position = tx.style_record(id).position;
            let shifted = PositionConstraints {
                x: shift(position.x, old_offset.0 - new_offset.0),
                y: shift(position.y, old_offset.1 - new_offset.1),
            };
            if shifted != position {
                moved_positions.push((id.clone(), shifted));
            }
        }
    }

    tx.insert_before(Some(parent.last()), &ids, before.map(IdPath::last))?;

    for (id, position) in moved_positions {
        tx.set_style(
            &IdPath::single(&id),
            &PartialStyle {
                position: Some(position),
                ..Default::default()
            },
        )?;
    }
    Ok(())
}
