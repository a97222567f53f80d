//! Error types for the editor

use thiserror::Error;
use trellis_common::CommonError;

pub type EditorResult<T> = Result<T, EditorError>;

#[derive(Error, Debug)]
pub enum EditorError {
    /// Malformed or referentially inconsistent mutation; nothing was applied
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Structural mutation would make a node its own ancestor; nothing was applied
    #[error("Would create cycle: `{node}` cannot be placed under `{parent}`")]
    Cycle { node: String, parent: String },

    #[error("Document store has been disposed")]
    DisposedStore,

    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("Failed to fetch image {hash} from {url}: {message}")]
    AssetFetch {
        hash: String,
        url: String,
        message: String,
    },

    #[error("CRDT error: {0}")]
    Crdt(String),

    #[error("File error: {0}")]
    File(#[from] CommonError),
}

impl EditorError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        EditorError::InvalidOperation(message.into())
    }
}

/// Problems found while hydrating a document from JSON.
///
/// Loading is all-or-nothing: any of these aborts the load and leaves the
/// document untouched.
#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid node id `{0}`")]
    InvalidId(String),

    #[error("Node `{node}` references unknown parent `{parent}`")]
    UnknownParent { node: String, parent: String },

    #[error("Node `{parent}` cannot contain `{node}`")]
    InvalidParent { node: String, parent: String },

    #[error("Node `{0}` is part of a parent cycle")]
    Cycle(String),

    #[error("Page `{0}` must not have a parent")]
    PageNotRoot(String),

    #[error("Node `{0}` has no parent but is not a page or component")]
    InvalidRoot(String),

    #[error("Node `{0}` has overrides but is not an instance")]
    OverridesOnNonInstance(String),

    #[error("Node `{node}` has an invalid override key `{key}`")]
    InvalidOverrideKey { node: String, key: String },

    #[error("Node `{0}` has a non-finite index")]
    InvalidIndex(String),
}
