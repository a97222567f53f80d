//! # Content-Addressed Image Store
//!
//! Images are keyed by the SHA-256 of their bytes and stored inline as
//! `data:` URLs so a document (and a clipboard payload) owns its images.
//! Inserting a hash that is already present is a no-op.

use crate::document::Snapshot;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::rc::Rc;
use thiserror::Error;

/// How to retrieve an image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    /// MIME type
    #[serde(rename = "type")]
    pub mime: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Raw image bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub data: Vec<u8>,
    pub mime: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ImageBlob {
    pub fn new(data: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            data,
            mime: mime.into(),
            width: None,
            height: None,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn hash(&self) -> String {
        content_hash(&self.data)
    }

    pub fn to_descriptor(&self) -> ImageDescriptor {
        ImageDescriptor {
            mime: self.mime.clone(),
            url: data_url(&self.mime, &self.data),
            width: self.width,
            height: self.height,
        }
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Unsupported image URL: {0}")]
    UnsupportedUrl(String),

    #[error("Malformed data URL: {0}")]
    InvalidDataUrl(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Hex SHA-256 of `data`
pub fn content_hash(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

pub fn data_url(mime: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(data))
}

/// Split a base64 `data:` URL into its MIME type and bytes
pub fn decode_data_url(url: &str) -> Result<(String, Vec<u8>), FetchError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| FetchError::UnsupportedUrl(url.to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| FetchError::InvalidDataUrl("missing ','".to_string()))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| FetchError::InvalidDataUrl("only base64 payloads are supported".to_string()))?;
    let data = STANDARD
        .decode(payload)
        .map_err(|e| FetchError::InvalidDataUrl(e.to_string()))?;
    Ok((mime.to_string(), data))
}

/// Retrieves image bytes for a URL
#[async_trait(?Send)]
pub trait ImageFetcher {
    async fn fetch(&self, url: &str) -> Result<ImageBlob, FetchError>;
}

/// Resolves `data:` URLs locally; anything else is unsupported
#[derive(Debug, Default, Clone, Copy)]
pub struct DataUrlFetcher;

#[async_trait(?Send)]
impl ImageFetcher for DataUrlFetcher {
    async fn fetch(&self, url: &str) -> Result<ImageBlob, FetchError> {
        let (mime, data) = decode_data_url(url)?;
        Ok(ImageBlob::new(data, mime))
    }
}

/// Read view of the images held by one document revision
#[derive(Debug, Clone)]
pub struct ImageStore {
    snapshot: Rc<Snapshot>,
}

impl ImageStore {
    pub(crate) fn new(snapshot: Rc<Snapshot>) -> Self {
        Self { snapshot }
    }

    pub fn has(&self, hash: &str) -> bool {
        self.snapshot.images().contains_key(hash)
    }

    pub fn get(&self, hash: &str) -> Option<&ImageDescriptor> {
        self.snapshot.images().get(hash)
    }

    /// Decode the stored bytes of an image
    pub fn blob(&self, hash: &str) -> Option<Result<ImageBlob, FetchError>> {
        let descriptor = self.get(hash)?;
        Some(decode_data_url(&descriptor.url).map(|(mime, data)| ImageBlob {
            data,
            mime,
            width: descriptor.width,
            height: descriptor.height,
        }))
    }

    pub fn all(&self) -> &BTreeMap<String, ImageDescriptor> {
        self.snapshot.images()
    }

    pub fn len(&self) -> usize {
        self.snapshot.images().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.images().is_empty()
    }
}
