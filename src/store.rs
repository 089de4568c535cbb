//! Content store seam and in-memory backend.
//!
//! The forum core never talks to a concrete network store. Everything goes
//! through the [`ContentStore`] trait: content-addressed `put`/`get` plus a
//! link graph of tagged edges. Any backend works as long as addressing is
//! deterministic (same bytes, same address) and `links_from` eventually
//! reflects all committed links.
//!
//! [`MemoryStore`] is the bundled backend for tests and local use.

use crate::types::Address;
use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::debug;

/// Store operation errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached or refused the operation. Transient;
    /// callers own the retry policy.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Entry bytes could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Identifier of a committed link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(pub u64);

/// A tagged edge in the link graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Edge tag the link was created under.
    pub tag: String,
    /// Address the link points at.
    pub target: Address,
}

/// Content-addressed store with link-based indexing.
///
/// Commits are idempotent: re-putting the same bytes lands on the same
/// address. Duplicate links are tolerated; readers deduplicate.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Deterministic address for the given canonical bytes, without
    /// committing anything.
    fn address_of(&self, bytes: &[u8]) -> Address;

    /// Commit bytes, returning their address.
    async fn put(&self, bytes: &[u8]) -> Result<Address, StoreError>;

    /// Fetch the bytes at an address, if present.
    async fn get(&self, address: &Address) -> Result<Option<Vec<u8>>, StoreError>;

    /// Create a tagged link from `base` to `target`.
    async fn link(
        &self,
        base: &Address,
        target: &Address,
        tag: &str,
    ) -> Result<LinkId, StoreError>;

    /// Enumerate links from `base`, optionally restricted to one edge tag.
    /// Unknown bases yield an empty list.
    async fn links_from(
        &self,
        base: &Address,
        tag_filter: Option<&str>,
    ) -> Result<Vec<Link>, StoreError>;
}

/// Compute the `sha256-<hex>` address of entry bytes.
pub fn compute_address(bytes: &[u8]) -> Address {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Address::new(format!("sha256-{}", hex::encode(hasher.finalize())))
}

/// In-memory content store.
///
/// Backs unit tests and offline use. Link order is insertion order, which
/// gives deterministic enumeration in single-writer tests; callers must not
/// rely on it beyond that.
#[derive(Default)]
pub struct MemoryStore {
    blobs: DashMap<Address, Vec<u8>>,
    links: DashMap<Address, Vec<Link>>,
    next_link_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct committed entries.
    pub fn entry_count(&self) -> usize {
        self.blobs.len()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    fn address_of(&self, bytes: &[u8]) -> Address {
        compute_address(bytes)
    }

    async fn put(&self, bytes: &[u8]) -> Result<Address, StoreError> {
        let address = compute_address(bytes);
        if self.blobs.insert(address.clone(), bytes.to_vec()).is_none() {
            debug!(address = %address, size = bytes.len(), "Committed entry");
        }
        Ok(address)
    }

    async fn get(&self, address: &Address) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.blobs.get(address).map(|entry| entry.value().clone()))
    }

    async fn link(
        &self,
        base: &Address,
        target: &Address,
        tag: &str,
    ) -> Result<LinkId, StoreError> {
        self.links.entry(base.clone()).or_default().push(Link {
            tag: tag.to_owned(),
            target: target.clone(),
        });
        Ok(LinkId(self.next_link_id.fetch_add(1, Ordering::Relaxed)))
    }

    async fn links_from(
        &self,
        base: &Address,
        tag_filter: Option<&str>,
    ) -> Result<Vec<Link>, StoreError> {
        let links = match self.links.get(base) {
            Some(entry) => entry.value().clone(),
            None => return Ok(Vec::new()),
        };
        Ok(match tag_filter {
            Some(tag) => links.into_iter().filter(|l| l.tag == tag).collect(),
            None => links,
        })
    }
}
