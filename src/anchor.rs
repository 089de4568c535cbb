//! Anchor index: deterministic, discoverable category trees.
//!
//! An anchor is a tiny canonical entry whose address any party can compute
//! from `(category, label)` alone. Anchors form a two-level tree: a single
//! root (the category of categories), one node per category, and one leaf
//! per label. Because every node's address is derived from its content,
//! independent writers converge on the same tree without coordination.
//!
//! A category node is simply the anchor with an empty label, and the root is
//! the category node of the reserved [`ROOT_CATEGORY`].

use crate::store::{ContentStore, StoreError};
use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Reserved category under which all category nodes are linked.
pub const ROOT_CATEGORY: &str = "categories";

/// Canonical identity of an anchor: a category plus a label within it.
///
/// Equality is byte equality; whatever canonicalization the category calls
/// for (case folding, stringified integers) happens before a key is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnchorKey {
    pub category: String,
    pub label: String,
}

impl AnchorKey {
    pub fn new(category: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            label: label.into(),
        }
    }

    /// Canonical entry bytes. The serialized key is the anchor entry.
    fn canonical_bytes(&self) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Index of anchors in a content store.
pub struct AnchorIndex {
    store: Arc<dyn ContentStore>,
}

impl AnchorIndex {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Address of the anchor for `key`, whether or not it exists yet.
    pub fn address_of(&self, key: &AnchorKey) -> Result<Address, StoreError> {
        Ok(self.store.address_of(&key.canonical_bytes()?))
    }

    /// Return the anchor's address, creating it (and its category node, and
    /// the root) if missing.
    ///
    /// Idempotent at every step: existence checks are advisory, commits
    /// collapse to the same address under races, and duplicate links are
    /// deduplicated by [`list`](Self::list). Never fails because an anchor
    /// already exists.
    pub async fn ensure(&self, key: &AnchorKey) -> Result<Address, StoreError> {
        let leaf_bytes = key.canonical_bytes()?;
        let leaf_address = self.store.address_of(&leaf_bytes);
        if self.store.get(&leaf_address).await?.is_some() {
            return Ok(leaf_address);
        }

        let category_key = AnchorKey::new(key.category.clone(), "");
        let category_bytes = category_key.canonical_bytes()?;
        let category_address = self.store.address_of(&category_bytes);
        if self.store.get(&category_address).await?.is_none() {
            let root_bytes = AnchorKey::new(ROOT_CATEGORY, "").canonical_bytes()?;
            let root_address = self.store.address_of(&root_bytes);
            if self.store.get(&root_address).await?.is_none() {
                self.store.put(&root_bytes).await?;
            }
            self.store.put(&category_bytes).await?;
            self.store
                .link(&root_address, &category_address, &key.category)
                .await?;
            debug!(category = %key.category, "Created category anchor");
        }

        self.store.put(&leaf_bytes).await?;
        self.store
            .link(&category_address, &leaf_address, &key.label)
            .await?;
        debug!(category = %key.category, label = %key.label, "Created anchor");
        Ok(leaf_address)
    }

    /// Whether the anchor for `key` has been published by anyone.
    pub async fn exists(&self, key: &AnchorKey) -> Result<bool, StoreError> {
        let address = self.address_of(key)?;
        Ok(self.store.get(&address).await?.is_some())
    }

    /// Addresses of all anchors in a category, deduplicated. An absent
    /// category is an empty list, not an error.
    pub async fn list(&self, category: &str) -> Result<Vec<Address>, StoreError> {
        let category_key = AnchorKey::new(category, "");
        let category_address = self.store.address_of(&category_key.canonical_bytes()?);
        let links = self.store.links_from(&category_address, None).await?;
        let mut seen = HashSet::new();
        Ok(links
            .into_iter()
            .filter(|link| seen.insert(link.target.clone()))
            .map(|link| link.target)
            .collect())
    }

    /// Decode the anchor at an address, if the address holds one.
    pub async fn key_at(&self, address: &Address) -> Result<Option<AnchorKey>, StoreError> {
        match self.store.get(address).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes).ok()),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn index() -> AnchorIndex {
        AnchorIndex::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let index = index();
        let key = AnchorKey::new("tag", "42");
        let first = index.ensure(&key).await.unwrap();
        let second = index.ensure(&key).await.unwrap();
        assert_eq!(first, second);

        // Listed exactly once even after repeated ensures
        let listed = index.list("tag").await.unwrap();
        assert_eq!(listed, vec![first]);
    }

    #[tokio::test]
    async fn test_concurrent_ensure_converges() {
        let store = Arc::new(MemoryStore::new());
        let a = AnchorIndex::new(store.clone());
        let b = AnchorIndex::new(store);
        let key = AnchorKey::new("tag", "7");

        let (left, right) = tokio::join!(a.ensure(&key), b.ensure(&key));
        assert_eq!(left.unwrap(), right.unwrap());

        // Duplicate links from the race are deduplicated on read
        let listed = a.list("tag").await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_exists_and_missing_category() {
        let index = index();
        let key = AnchorKey::new("tag", "1");
        assert!(!index.exists(&key).await.unwrap());
        assert!(index.list("tag").await.unwrap().is_empty());

        index.ensure(&key).await.unwrap();
        assert!(index.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_categories_discoverable_from_root() {
        let index = index();
        index.ensure(&AnchorKey::new("tag", "1")).await.unwrap();
        index.ensure(&AnchorKey::new("author", "alice")).await.unwrap();

        // The root lists one node per category
        let categories = index.list(ROOT_CATEGORY).await.unwrap();
        assert_eq!(categories.len(), 2);
    }

    #[tokio::test]
    async fn test_key_at_roundtrip() {
        let index = index();
        let key = AnchorKey::new("tag", "9");
        let address = index.ensure(&key).await.unwrap();
        assert_eq!(index.key_at(&address).await.unwrap(), Some(key));
    }
}
