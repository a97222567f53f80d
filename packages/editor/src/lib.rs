//! # Trellis Editor
//!
//! Document engine for Trellis designs: pages, frames, text, components
//! and instances held in a replicated store, plus a pure resolver that
//! turns declarative styles into concrete layout attributes.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ session: page, selection, copy/paste        │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ project: pages, components, load/save       │
//! │  - serializer: canonical project JSON       │
//! │  - clipboard: portable node payloads        │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ selectable: id paths, instance expansion    │
//! │  → resolve: style record → concrete attrs   │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ crdt: yrs document, transactions, undo      │
//! │  → document: per-revision snapshot          │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **CRDT is source of truth**: trees and selectables are derived views
//! 2. **Per-field convergence**: every node field and style field is its
//!    own last-writer-wins entry
//! 3. **Validated transactions**: a failing operation discards the whole
//!    transaction
//! 4. **Local undo**: undo never reverts another replica's edit
//!
//! ## Usage
//!
//! ```rust,ignore
//! use trellis_editor::{EditorConfig, NodeType, Project};
//!
//! let mut project = Project::new(EditorConfig::default());
//! let page = project.create_page("Home")?;
//! let frame = project.store_mut().transact(|tx| {
//!     let frame = tx.create(NodeType::Frame)?;
//!     tx.append(&page, &[frame.clone()])?;
//!     Ok(frame)
//! })?;
//!
//! // Send to other replicas
//! for update in project.store_mut().take_outgoing() {
//!     channel.broadcast(update);
//! }
//! ```

mod clipboard;
mod config;
mod crdt;
mod document;
mod errors;
mod id;
mod images;
mod mutations;
mod project;
mod resolve;
mod selectable;
mod serializer;
mod session;
mod style;
mod undo_stack;

pub use clipboard::{extract, paste, paste_anchor, ClipboardNode, ClipboardPayload, PasteReport, PayloadType};
pub use config::EditorConfig;
pub use crdt::{ChangeEvent, ChangeOrigin, DocumentStore, SubscriptionId};
pub use document::{MapName, NodeRecord, NodeType, RawKey, Snapshot};
pub use errors::{EditorError, EditorResult, SerializationError};
pub use id::{is_valid_id, IdGenerator, IdPath};
pub use images::{
    content_hash, data_url, decode_data_url, DataUrlFetcher, FetchError, ImageBlob,
    ImageDescriptor, ImageFetcher, ImageStore,
};
pub use mutations::{Op, Transaction};
pub use project::{incremental_unique_name, Project};
pub use resolve::{
    resolve, AlignSelf, BorderStyle, ConcreteAttributes, Dimension, Display, FlexAlign,
    FlexDirection, Overflow, Position, TextAlign, WhiteSpace,
};
pub use selectable::{from_json, insert_selectables, InsertOptions, Selectable, SelectionSet};
pub use serializer::{load_json, to_json, validate, NodeJson, ProjectJson};
pub use session::EditSession;
pub use style::{
    Color, Layout, PartialStyle, PositionConstraint, PositionConstraints, SizeConstraint,
    StackAlign, StackDirection, StackJustify, StyleRecord, TextHorizontalAlign, TextVerticalAlign,
};
pub use undo_stack::{HistoryEntry, KeyChange, UndoStack};
