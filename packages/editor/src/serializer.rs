//! # Project Serializer
//!
//! Canonical JSON form of a document:
//!
//! ```json
//! {
//!   "nodes": {
//!     "a-1": { "type": "page", "index": 0.0, "name": "Page 1" },
//!     "a-2": { "type": "frame", "parent": "a-1", "index": 0.0, "style": { "opacity": 0.5 } },
//!     "a-3": { "type": "instance", "parent": "a-1", "index": 1.0,
//!              "style": { "mainComponent": "a-4" },
//!              "overrides": { "a-5": { "textContent": "Hi" } } }
//!   },
//!   "componentUrls": ["..."],
//!   "images": { "<sha256>": { "type": "image/png", "url": "data:..." } }
//! }
//! ```
//!
//! Only nodes attached to a root are written. Loading validates the whole
//! input before touching the store and replaces its contents in one
//! transaction.

use crate::crdt::DocumentStore;
use crate::document::{NodeType, Snapshot};
use crate::errors::{EditorResult, SerializationError};
use crate::id::{is_valid_id, IdPath};
use crate::images::ImageDescriptor;
use crate::mutations::Op;
use crate::style::PartialStyle;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NodeJson {
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Sort key among siblings
    pub index: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "PartialStyle::is_empty")]
    pub style: PartialStyle,
    /// Instance overrides keyed by path relative to the instance
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<String, PartialStyle>,
}

impl NodeJson {
    pub fn new(node_type: NodeType, parent: Option<&str>, index: f64) -> Self {
        Self {
            node_type,
            parent: parent.map(str::to_string),
            index,
            name: None,
            style: PartialStyle::default(),
            overrides: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectJson {
    pub nodes: BTreeMap<String, NodeJson>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub component_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub images: BTreeMap<String, ImageDescriptor>,
}

impl ProjectJson {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SerializationError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializationError> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/// Canonical JSON of the attached part of `snapshot`
pub fn to_json(snapshot: &Snapshot) -> ProjectJson {
    let nodes = snapshot
        .attached_nodes()
        .map(|node| {
            let overrides = if node.node_type == NodeType::Instance {
                snapshot.overrides(&node.id)
            } else {
                BTreeMap::new()
            };
            let json = NodeJson {
                node_type: node.node_type,
                parent: node.parent.clone(),
                index: node.index,
                name: node.name.clone(),
                style: snapshot.style(&node.id).cloned().unwrap_or_default(),
                overrides,
            };
            (node.id.clone(), json)
        })
        .collect();

    ProjectJson {
        nodes,
        component_urls: snapshot.component_urls().to_vec(),
        images: snapshot.images().clone(),
    }
}

/// Check every node of `json` without touching any document
pub fn validate(json: &ProjectJson) -> Result<(), SerializationError> {
    for (id, node) in &json.nodes {
        if !is_valid_id(id) {
            return Err(SerializationError::InvalidId(id.clone()));
        }
        if !node.index.is_finite() {
            return Err(SerializationError::InvalidIndex(id.clone()));
        }

        match &node.parent {
            None if !node.node_type.is_root_type() => {
                return Err(SerializationError::InvalidRoot(id.clone()));
            }
            None => {}
            Some(_) if node.node_type == NodeType::Page => {
                return Err(SerializationError::PageNotRoot(id.clone()));
            }
            Some(parent) => {
                let parent_node =
                    json.nodes
                        .get(parent)
                        .ok_or_else(|| SerializationError::UnknownParent {
                            node: id.clone(),
                            parent: parent.clone(),
                        })?;
                if !parent_node.node_type.can_contain(node.node_type) {
                    return Err(SerializationError::InvalidParent {
                        node: id.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }

        if !node.overrides.is_empty() && node.node_type != NodeType::Instance {
            return Err(SerializationError::OverridesOnNonInstance(id.clone()));
        }
        for key in node.overrides.keys() {
            if IdPath::from_key(key).is_none() {
                return Err(SerializationError::InvalidOverrideKey {
                    node: id.clone(),
                    key: key.clone(),
                });
            }
        }
    }

    for id in json.nodes.keys() {
        let mut seen = HashSet::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            if !seen.insert(node_id) {
                return Err(SerializationError::Cycle(id.clone()));
            }
            current = json.nodes.get(node_id).and_then(|node| node.parent.as_ref());
        }
    }

    Ok(())
}

/// Replace the contents of `store` with `json`.
///
/// All-or-nothing: on error the store is untouched. An empty node map
/// yields a single page named `default_page_name`. History is cleared.
#[instrument(skip(store, json), fields(nodes = json.nodes.len()))]
pub fn load_json(
    store: &mut DocumentStore,
    json: &ProjectJson,
    default_page_name: &str,
) -> EditorResult<()> {
    validate(json)?;

    store.transact(|tx| {
        tx.purge();

        if json.nodes.is_empty() {
            let page = tx.create(NodeType::Page)?;
            tx.reparent(&page, None, None)?;
            tx.set_name(&page, Some(default_page_name.to_string()))?;
        }

        for (id, node) in &json.nodes {
            tx.apply(Op::CreateNode {
                id: id.clone(),
                node_type: node.node_type,
            })?;
            if node.name.is_some() {
                tx.set_name(id, node.name.clone())?;
            }
            tx.set_style(&IdPath::single(id), &node.style)?;
            for (key, style) in &node.overrides {
                let path = IdPath::from_key(&format!("{}:{}", id, key)).ok_or_else(|| {
                    SerializationError::InvalidOverrideKey {
                        node: id.clone(),
                        key: key.clone(),
                    }
                })?;
                tx.set_style(&path, style)?;
            }
        }

        for (id, node) in &json.nodes {
            tx.apply(Op::SetParent {
                id: id.clone(),
                parent: node.parent.clone(),
                index: node.index,
            })?;
        }

        for (hash, descriptor) in &json.images {
            tx.apply(Op::PutImage {
                hash: hash.clone(),
                descriptor: descriptor.clone(),
            })?;
        }
        if !json.component_urls.is_empty() {
            tx.set_component_urls(json.component_urls.clone())?;
        }
        Ok(())
    })?;

    store.clear_history();
    info!(revision = store.revision(), "loaded project");
    Ok(())
}
