//! Vote ledger: casting and resolving scoped votes.
//!
//! Votes are ordinary content-addressed entries linked from their target
//! under the `"vote"` edge tag. Casting never deletes anything; a revote
//! adds a newer record that shadows the older one when readers resolve the
//! effective set. History stays auditable in the store while readers get
//! simple current-state semantics.

use crate::store::{ContentStore, StoreError};
use crate::types::{Address, AgentId, TagScope, Vote};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Edge tag linking a target to its votes.
pub const VOTE_LINK: &str = "vote";

/// Vote casting and resolution errors.
#[derive(Error, Debug)]
pub enum VoteError {
    /// Fraction outside `[-1, 1]`. Nothing is committed.
    #[error("Vote fraction must be between -1 and 1, got {0}")]
    InvalidFraction(f32),

    /// The vote target does not resolve in the store. Nothing is committed.
    #[error("Vote target not found: {0}")]
    TargetNotFound(Address),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Ledger of votes in a content store.
pub struct VoteLedger {
    store: Arc<dyn ContentStore>,
}

impl VoteLedger {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Cast a vote, returning the committed record's address.
    ///
    /// The fraction must lie in `[-1, 1]` and the target must resolve;
    /// either violation rejects the vote without committing. Re-casting for
    /// the same `(voter, target, scope)` identity supersedes the earlier
    /// vote once `cast_at` is newer.
    pub async fn cast(
        &self,
        voter: &str,
        target: &Address,
        in_terms_of: TagScope,
        fraction: f32,
        cast_at: DateTime<Utc>,
    ) -> Result<Address, VoteError> {
        if !(-1.0..=1.0).contains(&fraction) {
            return Err(VoteError::InvalidFraction(fraction));
        }
        if self.store.get(target).await?.is_none() {
            return Err(VoteError::TargetNotFound(target.clone()));
        }

        let vote = Vote {
            voter: voter.to_owned(),
            target: target.clone(),
            in_terms_of,
            fraction,
            cast_at,
        };
        let bytes = serde_json::to_vec(&vote).map_err(StoreError::from)?;
        let address = self.store.put(&bytes).await?;
        self.store.link(target, &address, VOTE_LINK).await?;
        debug!(voter = %vote.voter, target = %target, fraction, "Cast vote");
        Ok(address)
    }

    /// Effective votes on a target: one per `(voter, scope)` identity,
    /// resolved last-write-wins by `cast_at` with the record address as a
    /// stable tie-break. Ordered by voter then scope for determinism.
    pub async fn votes_for(&self, target: &Address) -> Result<Vec<Vote>, VoteError> {
        let records = self.raw_votes(target).await?;

        let mut effective: HashMap<(AgentId, TagScope), (Address, Vote)> = HashMap::new();
        for (address, vote) in records {
            let identity = (vote.voter.clone(), vote.in_terms_of.clone());
            match effective.entry(identity) {
                Entry::Vacant(slot) => {
                    slot.insert((address, vote));
                }
                Entry::Occupied(mut slot) => {
                    let (winner_address, winner) = slot.get();
                    if (vote.cast_at, &address) > (winner.cast_at, winner_address) {
                        slot.insert((address, vote));
                    }
                }
            }
        }

        let mut votes: Vec<Vote> = effective.into_values().map(|(_, vote)| vote).collect();
        votes.sort_by(|a, b| {
            (&a.voter, &a.in_terms_of).cmp(&(&b.voter, &b.in_terms_of))
        });
        Ok(votes)
    }

    /// The currently-effective vote for one `(voter, target, scope)`
    /// identity, if any.
    pub async fn effective_vote(
        &self,
        voter: &str,
        target: &Address,
        in_terms_of: &TagScope,
    ) -> Result<Option<Vote>, VoteError> {
        Ok(self
            .votes_for(target)
            .await?
            .into_iter()
            .find(|vote| vote.voter == voter && &vote.in_terms_of == in_terms_of))
    }

    /// Load all physical vote records linked from a target. Dangling or
    /// undecodable links are skipped; the store is eventually consistent
    /// and a link can land before its entry is visible.
    async fn raw_votes(&self, target: &Address) -> Result<Vec<(Address, Vote)>, VoteError> {
        let links = self.store.links_from(target, Some(VOTE_LINK)).await?;
        let fetches = links
            .iter()
            .map(|link| self.store.get(&link.target));
        let entries = try_join_all(fetches).await?;

        let mut records = Vec::with_capacity(entries.len());
        for (link, entry) in links.into_iter().zip(entries) {
            match entry {
                Some(bytes) => match serde_json::from_slice::<Vote>(&bytes) {
                    Ok(vote) => records.push((link.target, vote)),
                    Err(_) => warn!(address = %link.target, "Skipping undecodable vote record"),
                },
                None => warn!(address = %link.target, "Skipping dangling vote link"),
            }
        }
        Ok(records)
    }
}
