//! # CRDT-backed Document Store
//!
//! Wraps a Yjs document (via `yrs`) holding the node, style, image and
//! meta maps described in [`crate::document`].
//!
//! ## Key Principles
//!
//! 1. **CRDT is source of truth**: the tree is derived from CRDT state
//! 2. **Snapshots are views**: rebuilt on demand, memoized per revision
//! 3. **Transactions are atomic**: validated in full before any write
//! 4. **Undo is local**: only this session's writes are reverted

use crate::config::EditorConfig;
use crate::document::{diff_raw, MapName, NodeType, RawKey, RawState, Snapshot};
use crate::errors::{EditorError, EditorResult};
use crate::id::{IdGenerator, IdPath};
use crate::images::ImageBlob;
use crate::mutations::{Op, Transaction};
use crate::style::PartialStyle;
use crate::undo_stack::{HistoryEntry, KeyChange, UndoStack};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, instrument, warn};
use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{Any, Doc, Map, MapRef, Out, ReadTxn, StateVector, Transact, Update};

pub type SubscriptionId = u64;

/// Where a committed change came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    Local,
    Remote,
    Undo,
    Redo,
}

/// Batched notification sent after every committed transaction
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub revision: u64,
    pub origin: ChangeOrigin,
    /// Raw keys whose value changed
    pub keys: Vec<RawKey>,
}

impl ChangeEvent {
    /// Ids of the nodes whose record or style changed
    pub fn touched_nodes(&self) -> BTreeSet<&str> {
        self.keys.iter().filter_map(RawKey::node_id).collect()
    }
}

type Subscriber = Box<dyn FnMut(&ChangeEvent)>;

/// Replicated document state for one editing session
pub struct DocumentStore {
    doc: Doc,
    nodes: MapRef,
    styles: MapRef,
    images: MapRef,
    meta: MapRef,
    ids: IdGenerator,
    revision: u64,
    snapshot: RefCell<Option<Rc<Snapshot>>>,
    history: UndoStack,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: SubscriptionId,
    /// Updates produced by local commits, waiting to be broadcast
    outgoing: Vec<Vec<u8>>,
    disposed: bool,
}

impl DocumentStore {
    /// Create an empty store with a random client id
    pub fn new(config: &EditorConfig) -> Self {
        Self::from_doc(Doc::new(), config)
    }

    pub fn with_client_id(client_id: u64, config: &EditorConfig) -> Self {
        Self::from_doc(Doc::with_client_id(client_id), config)
    }

    fn from_doc(doc: Doc, config: &EditorConfig) -> Self {
        let nodes = doc.get_or_insert_map(MapName::Nodes.as_str());
        let styles = doc.get_or_insert_map(MapName::Styles.as_str());
        let images = doc.get_or_insert_map(MapName::Images.as_str());
        let meta = doc.get_or_insert_map(MapName::Meta.as_str());
        let ids = IdGenerator::for_client(doc.client_id());

        Self {
            doc,
            nodes,
            styles,
            images,
            meta,
            ids,
            revision: 0,
            snapshot: RefCell::new(None),
            history: UndoStack::with_max_levels(config.max_undo_levels),
            subscribers: Vec::new(),
            next_subscription: 0,
            outgoing: Vec::new(),
            disposed: false,
        }
    }

    pub fn client_id(&self) -> u64 {
        self.doc.client_id()
    }

    /// Incremented by every committed transaction
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn ensure_live(&self) -> EditorResult<()> {
        if self.disposed {
            Err(EditorError::DisposedStore)
        } else {
            Ok(())
        }
    }

    fn map(&self, name: MapName) -> &MapRef {
        match name {
            MapName::Nodes => &self.nodes,
            MapName::Styles => &self.styles,
            MapName::Images => &self.images,
            MapName::Meta => &self.meta,
        }
    }

    fn read_raw(&self) -> RawState {
        let txn = self.doc.transact();
        let mut raw = RawState::new();
        for name in MapName::ALL {
            for (key, value) in self.map(name).iter(&txn) {
                match value {
                    Out::Any(Any::String(text)) => {
                        raw.insert(RawKey::new(name, key), text.to_string());
                    }
                    _ => warn!(map = name.as_str(), key = %key, "ignoring non-string entry"),
                }
            }
        }
        raw
    }

    /// Read view of the current revision
    pub fn snapshot(&self) -> EditorResult<Rc<Snapshot>> {
        self.ensure_live()?;
        if let Some(snapshot) = self.snapshot.borrow().as_ref() {
            return Ok(Rc::clone(snapshot));
        }
        let snapshot = Rc::new(Snapshot::from_raw(self.revision, self.read_raw()));
        *self.snapshot.borrow_mut() = Some(Rc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Run `f` as one atomic transaction and one undo step.
    ///
    /// If `f` fails nothing is written.
    pub fn transact<T>(
        &mut self,
        f: impl FnOnce(&mut Transaction<'_>) -> EditorResult<T>,
    ) -> EditorResult<T> {
        let base = self.snapshot()?;
        let (value, writes) = {
            let mut tx = Transaction::new(base, &mut self.ids);
            let value = f(&mut tx)?;
            (value, tx.into_writes())
        };
        let changes = self.commit(writes, ChangeOrigin::Local)?;
        self.history.record(HistoryEntry::new(changes));
        Ok(value)
    }

    /// Like [`transact`](Self::transact) but never recorded in undo history.
    /// Used for content that arrives after the edit that requested it.
    pub(crate) fn transact_untracked<T>(
        &mut self,
        f: impl FnOnce(&mut Transaction<'_>) -> EditorResult<T>,
    ) -> EditorResult<T> {
        let base = self.snapshot()?;
        let (value, writes) = {
            let mut tx = Transaction::new(base, &mut self.ids);
            let value = f(&mut tx)?;
            (value, tx.into_writes())
        };
        self.commit(writes, ChangeOrigin::Local)?;
        Ok(value)
    }

    /// Apply one primitive operation as its own transaction
    pub fn apply(&mut self, op: Op) -> EditorResult<()> {
        self.transact(|tx| tx.apply(op))
    }

    fn commit(
        &mut self,
        writes: BTreeMap<RawKey, Option<String>>,
        origin: ChangeOrigin,
    ) -> EditorResult<Vec<KeyChange>> {
        let current = self.snapshot()?;
        let changes: Vec<KeyChange> = writes
            .into_iter()
            .filter_map(|(key, after)| {
                let before = current.raw().get(&key).cloned();
                (before != after).then_some(KeyChange { key, before, after })
            })
            .collect();
        drop(current);

        if changes.is_empty() {
            return Ok(changes);
        }

        let state_vector = self.doc.transact().state_vector();
        {
            let mut txn = self.doc.transact_mut();
            for change in &changes {
                let map = self.map(change.key.map);
                match &change.after {
                    Some(value) => {
                        map.insert(&mut txn, change.key.key.as_str(), value.clone());
                    }
                    None => {
                        map.remove(&mut txn, &change.key.key);
                    }
                }
            }
        }
        let update = self.doc.transact().encode_state_as_update_v1(&state_vector);
        self.outgoing.push(update);

        let keys = changes.iter().map(|change| change.key.clone()).collect();
        self.advance(origin, keys);
        Ok(changes)
    }

    fn advance(&mut self, origin: ChangeOrigin, keys: Vec<RawKey>) {
        self.revision += 1;
        self.snapshot.replace(None);

        let event = ChangeEvent {
            revision: self.revision,
            origin,
            keys,
        };
        debug!(
            revision = event.revision,
            origin = ?event.origin,
            keys = event.keys.len(),
            "committed transaction"
        );
        for (_, subscriber) in self.subscribers.iter_mut() {
            subscriber(&event);
        }
    }

    // ---- change subscription ----

    pub fn subscribe(&mut self, callback: impl FnMut(&ChangeEvent) + 'static) -> SubscriptionId {
        self.next_subscription += 1;
        let id = self.next_subscription;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        self.subscribers.len() != before
    }

    // ---- replication ----

    /// Full document state as one update
    pub fn encode_state(&self) -> EditorResult<Vec<u8>> {
        self.ensure_live()?;
        let txn = self.doc.transact();
        Ok(txn.encode_state_as_update_v1(&StateVector::default()))
    }

    pub fn state_vector(&self) -> EditorResult<Vec<u8>> {
        self.ensure_live()?;
        let txn = self.doc.transact();
        Ok(txn.state_vector().encode_v1())
    }

    /// Everything the holder of `state_vector` is missing
    pub fn encode_diff(&self, state_vector: &[u8]) -> EditorResult<Vec<u8>> {
        self.ensure_live()?;
        let sv = StateVector::decode_v1(state_vector).map_err(|e| EditorError::Crdt(e.to_string()))?;
        let txn = self.doc.transact();
        Ok(txn.encode_state_as_update_v1(&sv))
    }

    /// Drain updates produced by local commits since the last call
    pub fn take_outgoing(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.outgoing)
    }

    /// Apply an update from another replica as a remote transaction
    #[instrument(skip(self, update), fields(bytes = update.len()))]
    pub fn apply_update(&mut self, update: &[u8]) -> EditorResult<()> {
        let before = self.snapshot()?;
        let update = Update::decode_v1(update).map_err(|e| EditorError::Crdt(e.to_string()))?;
        {
            let mut txn = self.doc.transact_mut();
            txn.apply_update(update)
                .map_err(|e| EditorError::Crdt(e.to_string()))?;
        }

        let keys = diff_raw(before.raw(), &self.read_raw());
        if !keys.is_empty() {
            self.advance(ChangeOrigin::Remote, keys);
        }
        Ok(())
    }

    // ---- history ----

    /// Revert the last local transaction. Returns `false` if there was none.
    pub fn undo(&mut self) -> EditorResult<bool> {
        self.ensure_live()?;
        let Some(entry) = self.history.pop_undo() else {
            return Ok(false);
        };
        let writes = entry.revert_writes(self.snapshot()?.raw());
        self.commit(writes, ChangeOrigin::Undo)?;
        self.history.push_redo(entry);
        Ok(true)
    }

    pub fn redo(&mut self) -> EditorResult<bool> {
        self.ensure_live()?;
        let Some(entry) = self.history.pop_redo() else {
            return Ok(false);
        };
        let writes = entry.reapply_writes(self.snapshot()?.raw());
        self.commit(writes, ChangeOrigin::Redo)?;
        self.history.push_undo(entry);
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Group the following transactions into one undo step
    pub fn begin_batch(&mut self) {
        self.history.begin_batch();
    }

    pub fn end_batch(&mut self) {
        self.history.end_batch();
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    // ---- lifecycle ----

    /// Tear the store down. Every later read or mutation fails.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        debug!(client_id = self.client_id(), "disposing document store");
        self.disposed = true;
        self.subscribers.clear();
        self.history.clear();
        self.outgoing.clear();
        self.snapshot.replace(None);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // ---- single-transaction tree operations ----

    pub fn create(&mut self, node_type: NodeType) -> EditorResult<String> {
        self.transact(|tx| tx.create(node_type))
    }

    pub fn append(&mut self, parent: &str, nodes: &[String]) -> EditorResult<()> {
        self.transact(|tx| tx.append(parent, nodes))
    }

    pub fn insert_before(
        &mut self,
        parent: Option<&str>,
        nodes: &[String],
        before: Option<&str>,
    ) -> EditorResult<()> {
        self.transact(|tx| tx.insert_before(parent, nodes, before))
    }

    pub fn remove(&mut self, nodes: &[String]) -> EditorResult<()> {
        self.transact(|tx| tx.remove(nodes))
    }

    pub fn reparent(
        &mut self,
        node: &str,
        parent: Option<&str>,
        before: Option<&str>,
    ) -> EditorResult<()> {
        self.transact(|tx| tx.reparent(node, parent, before))
    }

    pub fn set_name(&mut self, id: &str, name: Option<String>) -> EditorResult<()> {
        self.transact(|tx| tx.set_name(id, name))
    }

    pub fn set_style(&mut self, path: &IdPath, style: &PartialStyle) -> EditorResult<()> {
        self.transact(|tx| tx.set_style(path, style))
    }

    pub fn insert_image(&mut self, blob: &ImageBlob) -> EditorResult<String> {
        self.transact(|tx| tx.insert_image(blob))
    }
}

impl fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore")
            .field("client_id", &self.doc.client_id())
            .field("revision", &self.revision)
            .field("subscribers", &self.subscribers.len())
            .field("disposed", &self.disposed)
            .finish()
    }
}
