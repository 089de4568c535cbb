//! Forum facade: item indexing, discovery, search, and per-viewer ranking.
//!
//! Ties the pieces together the way a reading client uses them: items are
//! indexed under tag anchors, a query's tags seed candidate discovery, the
//! query engine filters the candidates, and a per-viewer [`Session`] scores
//! what survives with that viewer's own karma ledger.

use crate::anchor::{AnchorIndex, AnchorKey};
use crate::karma::{KarmaConfig, KarmaLedger};
use crate::query::{self, ItemTags, Query, SearchMatch};
use crate::store::{ContentStore, StoreError};
use crate::types::{Address, AgentId, ItemRecord, TagId, TagScope};
use crate::votes::{VoteError, VoteLedger};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Anchor category holding one leaf per tag, labeled by the decimal tag.
pub const TAG_CATEGORY: &str = "tag";
/// Anchor category holding one leaf per author, labeled by key hash.
pub const AUTHOR_CATEGORY: &str = "author";

/// Edge tag between an item and the tags it was created under.
pub const ORIGINAL_LINK: &str = "original";
/// Edge tag between an item and tags added by crossposting.
pub const CROSSPOST_LINK: &str = "crosspost";
/// Edge tag from an author anchor to the author's items.
pub const AUTHOR_LINK: &str = "author";

/// Store-backed forum services shared by all viewers.
pub struct Forum {
    store: Arc<dyn ContentStore>,
    anchors: AnchorIndex,
    ledger: VoteLedger,
}

impl Forum {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self {
            anchors: AnchorIndex::new(store.clone()),
            ledger: VoteLedger::new(store.clone()),
            store,
        }
    }

    pub fn anchors(&self) -> &AnchorIndex {
        &self.anchors
    }

    pub fn ledger(&self) -> &VoteLedger {
        &self.ledger
    }

    /// Anchor address for a tag, created on first use.
    pub async fn tag_anchor(&self, tag: TagId) -> Result<Address, StoreError> {
        self.anchors
            .ensure(&AnchorKey::new(TAG_CATEGORY, tag.to_string()))
            .await
    }

    /// Commit an item record and index it: linked to and from each original
    /// tag's anchor, and from its author's anchor.
    pub async fn index_item(&self, item: &ItemRecord) -> Result<Address, StoreError> {
        let bytes = serde_json::to_vec(item)?;
        let address = self.store.put(&bytes).await?;

        for tag in item.original_tags.iter() {
            let anchor = self.tag_anchor(tag).await?;
            self.store.link(&anchor, &address, ORIGINAL_LINK).await?;
            self.store.link(&address, &anchor, ORIGINAL_LINK).await?;
        }

        let author_anchor = self
            .anchors
            .ensure(&AnchorKey::new(AUTHOR_CATEGORY, item.author.clone()))
            .await?;
        self.store.link(&author_anchor, &address, AUTHOR_LINK).await?;

        info!(address = %address, author = %item.author, "Indexed item");
        Ok(address)
    }

    /// Crosspost an item to more tags. Tags only accumulate; the item
    /// record itself never changes, so its address stays stable.
    pub async fn crosspost(&self, item: &Address, tags: &TagScope) -> Result<(), StoreError> {
        for tag in tags.iter() {
            let anchor = self.tag_anchor(tag).await?;
            self.store.link(&anchor, item, CROSSPOST_LINK).await?;
            self.store.link(item, &anchor, CROSSPOST_LINK).await?;
        }
        Ok(())
    }

    /// Load an item record.
    pub async fn item(&self, address: &Address) -> Result<Option<ItemRecord>, StoreError> {
        match self.store.get(address).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Load an item's tag membership: original tags from the record,
    /// crosspost tags from its outgoing links.
    pub async fn item_tags(&self, address: &Address) -> Result<Option<ItemTags>, StoreError> {
        let record = match self.item(address).await? {
            Some(record) => record,
            None => return Ok(None),
        };
        let crosspost = self.linked_tags(address, CROSSPOST_LINK).await?;
        Ok(Some(ItemTags {
            address: address.clone(),
            original: record.original_tags,
            crosspost,
        }))
    }

    /// Tags reachable from an item through one kind of outgoing link,
    /// decoded from the linked tag anchors. Links to anything that isn't a
    /// tag anchor are ignored.
    async fn linked_tags(&self, item: &Address, edge: &str) -> Result<TagScope, StoreError> {
        let links = self.store.links_from(item, Some(edge)).await?;
        let mut tags = Vec::with_capacity(links.len());
        for link in links {
            if let Some(key) = self.anchors.key_at(&link.target).await? {
                if key.category == TAG_CATEGORY {
                    if let Ok(tag) = key.label.parse::<TagId>() {
                        tags.push(tag);
                    }
                }
            }
        }
        Ok(TagScope::new(tags))
    }

    /// Addresses of all items indexed under an author, deduplicated.
    pub async fn items_by_author(&self, author: &str) -> Result<Vec<Address>, StoreError> {
        let anchor = self
            .anchors
            .address_of(&AnchorKey::new(AUTHOR_CATEGORY, author))?;
        let links = self.store.links_from(&anchor, Some(AUTHOR_LINK)).await?;
        let mut seen = HashSet::new();
        Ok(links
            .into_iter()
            .filter(|link| seen.insert(link.target.clone()))
            .map(|link| link.target)
            .collect())
    }

    /// Candidate item addresses carrying any of the given tags, in
    /// first-seen order, deduplicated across tags.
    pub async fn discover(
        &self,
        tags: impl IntoIterator<Item = TagId>,
        exclude_crossposts: bool,
    ) -> Result<Vec<Address>, StoreError> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for tag in tags {
            let anchor = self.tag_anchor(tag).await?;
            let mut links = self.store.links_from(&anchor, Some(ORIGINAL_LINK)).await?;
            if !exclude_crossposts {
                links.extend(self.store.links_from(&anchor, Some(CROSSPOST_LINK)).await?);
            }
            for link in links {
                if seen.insert(link.target.clone()) {
                    candidates.push(link.target);
                }
            }
        }
        Ok(candidates)
    }

    /// End-to-end search: discover candidates from the query's tags, load
    /// their tag membership concurrently, and keep the matches with their
    /// justifying tags.
    pub async fn search(
        &self,
        query: &Query,
        exclude_crossposts: bool,
    ) -> Result<Vec<SearchMatch>, StoreError> {
        let candidates = self
            .discover(query.mentioned_tags(), exclude_crossposts)
            .await?;
        let loads = candidates.iter().map(|address| self.item_tags(address));
        let items: Vec<ItemTags> = try_join_all(loads)
            .await?
            .into_iter()
            .flatten()
            .collect();
        Ok(query::search(&items, query, exclude_crossposts))
    }
}

/// One viewer's session: identity plus their private karma ledger.
///
/// Sessions are independent; two sessions over the same forum can rank the
/// same item differently, by design.
pub struct Session {
    viewer: AgentId,
    karma: KarmaLedger,
}

impl Session {
    pub fn new(viewer: impl Into<AgentId>) -> Self {
        Self {
            viewer: viewer.into(),
            karma: KarmaLedger::new(),
        }
    }

    pub fn with_config(viewer: impl Into<AgentId>, config: KarmaConfig) -> Self {
        Self {
            viewer: viewer.into(),
            karma: KarmaLedger::with_config(config),
        }
    }

    pub fn viewer(&self) -> &str {
        &self.viewer
    }

    pub fn karma(&self) -> &KarmaLedger {
        &self.karma
    }

    /// Wipe the viewer's karma ledger. Explicit user action only.
    pub fn reset_karma(&mut self) {
        self.karma.reset();
    }

    /// Cast (or revise) this viewer's vote on an item, folding it into the
    /// karma ledger only after the store confirms the cast. A rejected or
    /// failed cast leaves the ledger untouched, so karma never diverges
    /// from persisted votes.
    pub async fn cast_vote(
        &mut self,
        forum: &Forum,
        target: &Address,
        in_terms_of: TagScope,
        fraction: f32,
        cast_at: DateTime<Utc>,
    ) -> Result<Address, VoteError> {
        let author = match forum.item(target).await {
            Ok(Some(record)) => Some(record.author),
            // Votable targets that aren't item records (or aren't visible
            // yet) still get a vote, just no karma contribution
            _ => None,
        };
        let prior = forum
            .ledger()
            .effective_vote(&self.viewer, target, &in_terms_of)
            .await?;

        let address = forum
            .ledger()
            .cast(&self.viewer, target, in_terms_of.clone(), fraction, cast_at)
            .await?;

        if let Some(author) = author {
            match prior {
                Some(previous) => {
                    self.karma
                        .record_revote(&author, &in_terms_of, previous.fraction, fraction)
                }
                None => self.karma.record_vote(&author, &in_terms_of, fraction),
            }
        }
        Ok(address)
    }

    /// Score an item for this viewer: effective votes weighted by the
    /// viewer's trust in each voter under the scope.
    pub async fn score_item(
        &self,
        forum: &Forum,
        target: &Address,
        in_terms_of: &TagScope,
    ) -> Result<f32, VoteError> {
        let votes = forum.ledger().votes_for(target).await?;
        Ok(self.karma.score(&votes, in_terms_of))
    }

    /// Search and rank: each match is scored under its own justifying tags,
    /// highest score first.
    pub async fn rank(
        &self,
        forum: &Forum,
        query: &Query,
        exclude_crossposts: bool,
    ) -> Result<Vec<(SearchMatch, f32)>, VoteError> {
        let matches = forum.search(query, exclude_crossposts).await?;
        let mut ranked = Vec::with_capacity(matches.len());
        for matched in matches {
            let scope = TagScope::new(matched.in_terms_of.iter().copied());
            let score = self.score_item(forum, &matched.address, &scope).await?;
            ranked.push((matched, score));
        }
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(ranked)
    }
}
