//! Core identifiers and records shared across the crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Content address of an entry in the shared store.
///
/// Addresses derive purely from entry bytes, so the same content commits to
/// the same address everywhere. The bundled in-memory store uses the
/// `sha256-<hex>` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Address {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for Address {
    fn from(raw: &str) -> Self {
        Self(raw.to_owned())
    }
}

/// Key hash identifying an author or voter.
pub type AgentId = String;

/// Integer topic identifier. Tags are numbers rather than strings so display
/// names can be localized independently of the index.
pub type TagId = u64;

/// Canonicalized set of tags a vote or lookup is scoped to.
///
/// Construction sorts and deduplicates, so `{2, 1}` and `{1, 2}` are the
/// same scope and resolve to the same key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagScope(BTreeSet<TagId>);

impl TagScope {
    pub fn new(tags: impl IntoIterator<Item = TagId>) -> Self {
        Self(tags.into_iter().collect())
    }

    /// Scope containing a single tag.
    pub fn single(tag: TagId) -> Self {
        Self::new([tag])
    }

    /// Tags in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = TagId> + '_ {
        self.0.iter().copied()
    }

    pub fn contains(&self, tag: TagId) -> bool {
        self.0.contains(&tag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<TagId> for TagScope {
    fn from_iter<I: IntoIterator<Item = TagId>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// A post or comment as the ranking core reads it.
///
/// `original_tags` is fixed when the item is created. Crosspost tags
/// accumulate as links in the store and never touch the record itself, which
/// keeps the record's content address stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Key hash of the item's author.
    pub author: AgentId,
    /// Item body. Owned by the CRUD layer; opaque to this crate.
    pub body: String,
    /// Tags assigned at creation.
    pub original_tags: TagScope,
    /// Creation time. Also keeps otherwise-identical items at distinct
    /// addresses.
    pub created_at: DateTime<Utc>,
}

/// A fractional vote on an item, scoped to a set of tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    /// Key hash of the voter.
    pub voter: AgentId,
    /// Address of the item voted on.
    pub target: Address,
    /// Tags this vote was cast in terms of: a cat picture can score well on
    /// a cat tag and poorly on a dog tag at the same time.
    pub in_terms_of: TagScope,
    /// Vote magnitude in `[-1, 1]`; positive approves, negative disapproves.
    pub fraction: f32,
    /// When the vote was cast. A later cast supersedes an earlier one for
    /// the same `(voter, target, in_terms_of)` identity.
    pub cast_at: DateTime<Utc>,
}
