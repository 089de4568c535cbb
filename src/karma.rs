//! Viewer-local trust ledger.
//!
//! Karma is not a shared or consensus value. Each viewer builds their own
//! ledger purely from their own votes: voting on an author's item under a
//! tag is simultaneously an opinion about the item and an adjustment to how
//! much that viewer will trust the author's future votes under that tag.
//! Two viewers can legitimately compute different scores for the same item
//! from the same votes, because their ledgers differ. Nothing here is ever
//! written to the store or sent to another party.

use crate::types::{AgentId, TagId, TagScope, Vote};
use std::collections::HashMap;

/// Default maximum trust magnitude.
pub const DEFAULT_MAX_WEIGHT: f32 = 15.0;

/// Karma ledger settings.
#[derive(Debug, Clone)]
pub struct KarmaConfig {
    /// Cap on the absolute trust weight of any single author within a
    /// scope. Applied once to the sum across the scope's tags, so activity
    /// across many tags cannot compound past it.
    pub max_weight: f32,
}

impl Default for KarmaConfig {
    fn default() -> Self {
        Self {
            max_weight: DEFAULT_MAX_WEIGHT,
        }
    }
}

/// One viewer's private `(author, tag) -> weight` ledger.
///
/// Owned by the viewing context, one per viewer or session; never a
/// process-wide singleton. Callers serialize mutation themselves.
#[derive(Debug, Default)]
pub struct KarmaLedger {
    weights: HashMap<AgentId, HashMap<TagId, f32>>,
    config: KarmaConfig,
}

impl KarmaLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: KarmaConfig) -> Self {
        Self {
            weights: HashMap::new(),
            config,
        }
    }

    /// Fold a newly-cast vote into the ledger: each tag in the scope gains
    /// the vote's fraction toward the author.
    pub fn record_vote(&mut self, author: &str, in_terms_of: &TagScope, fraction: f32) {
        let per_tag = self.weights.entry(author.to_owned()).or_default();
        for tag in in_terms_of.iter() {
            *per_tag.entry(tag).or_insert(0.0) += fraction;
        }
    }

    /// Fold a revote into the ledger. Only the delta applies; the old
    /// fraction is already baked in.
    pub fn record_revote(
        &mut self,
        author: &str,
        in_terms_of: &TagScope,
        old_fraction: f32,
        new_fraction: f32,
    ) {
        self.record_vote(author, in_terms_of, new_fraction - old_fraction);
    }

    /// Trust weight for an author within a scope: the sum of the author's
    /// per-tag weights across the scope, capped once at the configured
    /// maximum magnitude.
    pub fn trust_weight(&self, author: &str, in_terms_of: &TagScope) -> f32 {
        let sum: f32 = match self.weights.get(author) {
            Some(per_tag) => in_terms_of
                .iter()
                .filter_map(|tag| per_tag.get(&tag))
                .sum(),
            None => 0.0,
        };
        sum.clamp(-self.config.max_weight, self.config.max_weight)
    }

    /// Score a resolved vote set: each vote contributes its fraction
    /// weighted by the viewer's trust in the voter under the scope.
    pub fn score(&self, votes: &[Vote], in_terms_of: &TagScope) -> f32 {
        votes
            .iter()
            .map(|vote| vote.fraction * self.trust_weight(&vote.voter, in_terms_of))
            .sum()
    }

    /// Wipe the ledger. Explicit user action only.
    pub fn reset(&mut self) {
        self.weights.clear();
    }

    /// Whether any weight has been recorded.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Address;
    use chrono::{TimeZone, Utc};

    fn vote(voter: &str, fraction: f32) -> Vote {
        Vote {
            voter: voter.to_owned(),
            target: Address::from("sha256-item"),
            in_terms_of: TagScope::single(1),
            fraction,
            cast_at: Utc.timestamp_opt(0, 0).unwrap(),
        }
    }

    #[test]
    fn test_weight_caps_on_scope_sum() {
        let mut karma = KarmaLedger::new();
        let scope = TagScope::single(1);
        for _ in 0..100 {
            karma.record_vote("alice", &scope, 1.0);
        }
        assert_eq!(karma.trust_weight("alice", &scope), 15.0);

        for _ in 0..200 {
            karma.record_vote("alice", &scope, -1.0);
        }
        assert_eq!(karma.trust_weight("alice", &scope), -15.0);
    }

    #[test]
    fn test_cap_applies_across_tags_not_per_tag() {
        let mut karma = KarmaLedger::new();
        // 10 per tag: under the cap individually, over it summed
        for tag in [1, 2] {
            for _ in 0..10 {
                karma.record_vote("alice", &TagScope::single(tag), 1.0);
            }
        }
        assert_eq!(karma.trust_weight("alice", &TagScope::single(1)), 10.0);
        assert_eq!(karma.trust_weight("alice", &TagScope::new([1, 2])), 15.0);
    }

    #[test]
    fn test_unknown_author_has_zero_weight() {
        let karma = KarmaLedger::new();
        assert_eq!(karma.trust_weight("nobody", &TagScope::single(1)), 0.0);
    }

    #[test]
    fn test_revote_applies_delta_only() {
        let mut karma = KarmaLedger::new();
        let scope = TagScope::single(1);
        karma.record_vote("alice", &scope, 1.0);
        karma.record_revote("alice", &scope, 1.0, 0.25);
        assert_eq!(karma.trust_weight("alice", &scope), 0.25);
    }

    #[test]
    fn test_score_linearity() {
        let mut karma = KarmaLedger::new();
        let scope = TagScope::single(1);
        karma.record_vote("alice", &scope, 1.0);
        karma.record_vote("alice", &scope, 1.0);
        karma.record_vote("bob", &scope, 1.0);

        // f * w per vote
        assert_eq!(karma.score(&[vote("alice", 0.5)], &scope), 0.5 * 2.0);
        // Additive over the list
        let votes = [vote("alice", 0.5), vote("bob", -1.0)];
        assert_eq!(karma.score(&votes, &scope), 0.5 * 2.0 + -1.0 * 1.0);
    }

    #[test]
    fn test_scores_are_subjective() {
        let scope = TagScope::single(1);
        let mut viewer_a = KarmaLedger::new();
        let mut viewer_b = KarmaLedger::new();

        viewer_a.record_vote("carol", &scope, 1.0);
        viewer_b.record_vote("carol", &scope, -1.0);

        let votes = [vote("carol", 1.0)];
        assert_eq!(viewer_a.score(&votes, &scope), 1.0);
        assert_eq!(viewer_b.score(&votes, &scope), -1.0);
    }

    #[test]
    fn test_reset_wipes_everything() {
        let mut karma = KarmaLedger::new();
        let scope = TagScope::single(1);
        karma.record_vote("alice", &scope, 1.0);
        assert!(!karma.is_empty());

        karma.reset();
        assert!(karma.is_empty());
        assert_eq!(karma.trust_weight("alice", &scope), 0.0);
    }

    #[test]
    fn test_custom_cap() {
        let mut karma = KarmaLedger::with_config(KarmaConfig { max_weight: 2.0 });
        let scope = TagScope::single(1);
        for _ in 0..5 {
            karma.record_vote("alice", &scope, 1.0);
        }
        assert_eq!(karma.trust_weight("alice", &scope), 2.0);
    }
}
