//! Node identity.
//!
//! Node ids are `<seed>-<counter>`, where the seed is derived from the
//! replica's CRDT client id, so two sessions never hand out the same id.
//! An [`IdPath`] addresses a visual element across instance boundaries.

use std::fmt;

/// Sequential ID generator for nodes created by one replica
#[derive(Debug, Clone)]
pub struct IdGenerator {
    seed: String,
    count: u64,
}

impl IdGenerator {
    pub fn from_seed(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            count: 0,
        }
    }

    /// Seed from a CRDT client id
    pub fn for_client(client_id: u64) -> Self {
        Self::from_seed(format!("{:x}", client_id))
    }

    /// Generate next sequential ID
    pub fn new_id(&mut self) -> String {
        self.count += 1;
        format!("{}-{}", self.seed, self.count)
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }
}

/// Characters reserved by path keys and store keys
const RESERVED: [char; 2] = [':', '/'];

/// Whether `id` can be used as a node id
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && !id.contains(RESERVED)
}

/// Ordered sequence of node ids: zero or more instance ids followed by the
/// addressed node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdPath(Vec<String>);

impl IdPath {
    /// Returns `None` for an empty path
    pub fn new(ids: Vec<String>) -> Option<Self> {
        if ids.is_empty() {
            None
        } else {
            Some(Self(ids))
        }
    }

    pub fn single(id: impl Into<String>) -> Self {
        Self(vec![id.into()])
    }

    /// Parse a `:`-joined key
    pub fn from_key(key: &str) -> Option<Self> {
        let ids: Vec<String> = key.split(':').map(str::to_string).collect();
        if ids.iter().all(|id| is_valid_id(id)) {
            Self::new(ids)
        } else {
            None
        }
    }

    pub fn key(&self) -> String {
        self.0.join(":")
    }

    pub fn ids(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Paths are never empty
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn first(&self) -> &str {
        &self.0[0]
    }

    /// The addressed node
    pub fn last(&self) -> &str {
        &self.0[self.0.len() - 1]
    }

    /// Path without its last segment
    pub fn prefix(&self) -> Option<IdPath> {
        IdPath::new(self.0[..self.0.len() - 1].to_vec())
    }

    /// `self ++ [id]`
    pub fn child(&self, id: &str) -> IdPath {
        let mut ids = self.0.clone();
        ids.push(id.to_string());
        IdPath(ids)
    }

    /// Path with the last segment replaced
    pub fn sibling(&self, id: &str) -> IdPath {
        let mut ids = self.0.clone();
        let last = ids.len() - 1;
        ids[last] = id.to_string();
        IdPath(ids)
    }

    /// Key of the segments from `start` on
    pub fn suffix_key(&self, start: usize) -> String {
        self.0[start..].join(":")
    }
}

impl fmt::Display for IdPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids() {
        let mut gen = IdGenerator::for_client(255);

        let id1 = gen.new_id();
        let id2 = gen.new_id();

        assert_eq!(id1, "ff-1");
        assert_eq!(id2, "ff-2");
        assert_eq!(gen.seed(), "ff");
    }

    #[test]
    fn test_path_keys() {
        let path = IdPath::from_key("inst-1:inner-2:leaf-3").unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.first(), "inst-1");
        assert_eq!(path.last(), "leaf-3");
        assert_eq!(path.suffix_key(1), "inner-2:leaf-3");
        assert_eq!(path.prefix().unwrap().key(), "inst-1:inner-2");
        assert_eq!(path.sibling("other").key(), "inst-1:inner-2:other");
        assert_eq!(IdPath::single("a").prefix(), None);
    }

    #[test]
    fn test_reserved_characters_rejected() {
        assert!(IdPath::from_key("a::b").is_none());
        assert!(IdPath::from_key("a/b").is_none());
        assert!(!is_valid_id(""));
        assert!(is_valid_id("node_1-x"));
    }
}
