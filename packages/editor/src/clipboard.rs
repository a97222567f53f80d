//! # Clipboard
//!
//! Portable copies of selected elements:
//!
//! ```json
//! { "version": "0.0.1", "type": "nodes", "nodes": [...], "images": { "<hash>": {...} } }
//! ```
//!
//! A payload owns its data: pasting always creates fresh ids. Images the
//! target document lacks are fetched while pasting; a failed fetch is
//! reported but does not undo the inserted nodes.

use crate::crdt::DocumentStore;
use crate::document::{NodeType, Snapshot};
use crate::errors::{EditorError, EditorResult};
use crate::id::IdPath;
use crate::images::{ImageDescriptor, ImageFetcher};
use crate::mutations::Op;
use crate::selectable::{from_json, insert_selectables, InsertOptions, Selectable};
use crate::style::PartialStyle;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, instrument, warn};

/// One copied element and its subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipboardNode {
    /// Id in the source document, informational only
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Effective style, instance overrides applied
    #[serde(default, skip_serializing_if = "PartialStyle::is_empty")]
    pub style: PartialStyle,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<String, PartialStyle>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ClipboardNode>,
}

impl ClipboardNode {
    /// Image hashes referenced anywhere in this subtree
    fn collect_image_hashes(&self, out: &mut Vec<String>) {
        let styles = std::iter::once(&self.style).chain(self.overrides.values());
        for style in styles {
            if let Some(Some(hash)) = &style.image_hash {
                if !out.contains(hash) {
                    out.push(hash.clone());
                }
            }
        }
        for child in &self.children {
            child.collect_image_hashes(out);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadType {
    Nodes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipboardPayload {
    pub version: String,
    #[serde(rename = "type")]
    pub payload_type: PayloadType,
    pub nodes: Vec<ClipboardNode>,
    #[serde(default)]
    pub images: BTreeMap<String, ImageDescriptor>,
}

impl ClipboardPayload {
    pub fn from_json_str(text: &str) -> EditorResult<Self> {
        serde_json::from_str(text).map_err(|e| EditorError::from(crate::errors::SerializationError::from(e)))
    }

    pub fn to_json_string(&self) -> EditorResult<String> {
        crate::mutations::encode(self)
    }
}

/// Copy `selected` into a payload. A selected component is copied as its
/// first child, since the component wrapper itself is never painted.
pub fn extract(snapshot: &Snapshot, selected: &[Selectable], version: &str) -> ClipboardPayload {
    let nodes: Vec<ClipboardNode> = selected
        .iter()
        .filter_map(|selectable| {
            if selectable.node_type() == NodeType::Component {
                selectable.children().into_iter().next()
            } else {
                Some(selectable.clone())
            }
        })
        .map(|selectable| selectable.to_json())
        .collect();

    let mut hashes = Vec::new();
    for node in &nodes {
        node.collect_image_hashes(&mut hashes);
    }
    let images = hashes
        .into_iter()
        .filter_map(|hash| {
            let descriptor = snapshot.images().get(&hash)?.clone();
            Some((hash, descriptor))
        })
        .collect();

    ClipboardPayload {
        version: version.to_string(),
        payload_type: PayloadType::Nodes,
        nodes,
        images,
    }
}

/// Where pasted nodes go. The last selected element is lifted out of any
/// instance expansion, then the paste lands in its parent right after it.
/// Without a usable selection the nodes are appended to the page.
pub fn paste_anchor(
    snapshot: &Rc<Snapshot>,
    page_id: &str,
    last_selected: Option<&IdPath>,
) -> (IdPath, Option<IdPath>) {
    let page = IdPath::single(page_id);

    let mut current = last_selected
        .and_then(|path| Selectable::from_path(Rc::clone(snapshot), path.clone()));
    while let Some(selectable) = current.as_ref().filter(|s| s.path().len() > 1) {
        current = selectable.parent();
    }

    let Some(anchor) = current else {
        return (page, None);
    };
    let Some(parent) = anchor.parent() else {
        return (page, None);
    };

    let before = snapshot
        .next_sibling(anchor.id())
        .map(|next| IdPath::single(&next.id));
    (parent.path().clone(), before)
}

/// Outcome of a paste
#[derive(Debug, Default)]
pub struct PasteReport {
    /// Paths of the inserted top-level nodes
    pub inserted: Vec<IdPath>,
    /// Hashes of images added to the document
    pub images_added: Vec<String>,
    /// One `AssetFetch` error per image that could not be retrieved
    pub image_errors: Vec<EditorError>,
}

/// Insert `payload` into `page_id`, then fetch the images it references
/// that the document does not have yet.
///
/// Node insertion is one undoable transaction. Image fetches run
/// concurrently; each fetched image is stored as soon as it arrives.
#[instrument(skip_all, fields(page = %page_id, nodes = payload.nodes.len(), images = payload.images.len()))]
pub async fn paste(
    store: &mut DocumentStore,
    page_id: &str,
    last_selected: Option<&IdPath>,
    payload: &ClipboardPayload,
    fetcher: &dyn ImageFetcher,
) -> EditorResult<PasteReport> {
    let snapshot = store.snapshot()?;
    let (parent, before) = paste_anchor(&snapshot, page_id, last_selected);

    let inserted = store.transact(|tx| {
        let mut paths = Vec::with_capacity(payload.nodes.len());
        for node in &payload.nodes {
            paths.push(from_json(tx, node)?);
        }
        insert_selectables(tx, &parent, &paths, before.as_ref(), InsertOptions::default())?;
        Ok(paths)
    })?;
    debug!(inserted = inserted.len(), "pasted nodes");

    let mut report = PasteReport {
        inserted,
        ..Default::default()
    };

    let snapshot = store.snapshot()?;
    let mut pending: FuturesUnordered<_> = payload
        .images
        .iter()
        .filter(|(hash, _)| !snapshot.images().contains_key(*hash))
        .map(|(hash, descriptor)| async move {
            let result = fetcher.fetch(&descriptor.url).await;
            (hash, descriptor, result)
        })
        .collect();
    drop(snapshot);

    while let Some((hash, descriptor, result)) = pending.next().await {
        let blob = match result {
            Ok(blob) => blob,
            Err(e) => {
                warn!(hash = %hash, error = %e, "failed to fetch pasted image");
                report.image_errors.push(EditorError::AssetFetch {
                    hash: hash.clone(),
                    url: descriptor.url.clone(),
                    message: e.to_string(),
                });
                continue;
            }
        };
        if blob.hash() != *hash {
            warn!(hash = %hash, "fetched image does not match its hash");
        }

        let mut stored = blob.to_descriptor();
        stored.width = stored.width.or(descriptor.width);
        stored.height = stored.height.or(descriptor.height);
        store.transact_untracked(|tx| {
            tx.apply(Op::PutImage {
                hash: hash.clone(),
                descriptor: stored,
            })
        })?;
        report.images_added.push(hash.clone());
    }

    Ok(report)
}
