//! Agora Core - decentralized forum discovery and ranking.
//!
//! The forum lives in a shared content-addressed store with link-based
//! indexing; this crate implements everything needed to find and rank
//! content in it without any central index or shared reputation oracle.
//!
//! ## Architecture
//!
//! - **Anchor index**: canonical `(category, label)` entries whose
//!   addresses anyone can derive, forming a discoverable two-level tree.
//! - **Tag queries**: a recursive boolean query language over per-item tag
//!   sets that reports *which* tags justified each match.
//! - **Vote ledger**: append-only scoped votes with last-write-wins
//!   resolution, so revotes shadow rather than destroy history.
//! - **Karma**: a viewer-private trust ledger built from the viewer's own
//!   votes. Shared facts, private trust: two viewers can rank the same
//!   item differently and both are right.
//!
//! The store itself is a collaborator behind the [`ContentStore`] trait;
//! [`MemoryStore`] is the bundled in-memory backend.

// Shared identifiers and records
pub mod types;

// Content store seam + in-memory backend
pub mod store;

// Canonical discovery anchors
pub mod anchor;

// Boolean tag queries
pub mod query;

// Vote casting and resolution
pub mod votes;

// Viewer-local trust
pub mod karma;

// Facade gluing the layers together per viewer
pub mod forum;

// Re-exports
pub use anchor::{AnchorIndex, AnchorKey, ROOT_CATEGORY};
pub use forum::{Forum, Session};
pub use karma::{KarmaConfig, KarmaLedger, DEFAULT_MAX_WEIGHT};
pub use query::{search, ItemTags, Query, QueryError, SearchMatch};
pub use store::{compute_address, ContentStore, Link, LinkId, MemoryStore, StoreError};
pub use types::{Address, AgentId, ItemRecord, TagId, TagScope, Vote};
pub use votes::{VoteError, VoteLedger};
