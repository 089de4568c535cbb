//! Recursive boolean queries over per-item tag sets.
//!
//! A [`Query`] is a closed tree of five variants. Evaluation is pure: it
//! takes a tag-membership function and returns no-match, or the set of tags
//! that justify the match. `Or(vec![Exactly(1), Exactly(2)])` reports `{1}`
//! for an item tagged only `1`, `{2}` for one tagged only `2`, and `{1, 2}`
//! for one tagged both.
//!
//! `Not` and `Xor` are strictly binary; the arity is fixed in the type and
//! enforced when parsing the wire form.

use crate::types::{Address, TagId, TagScope};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Query errors.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The wire form was not a well-formed query (unknown variant, wrong
    /// arity for `not`/`xor`, malformed tag).
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// A search query over item tags.
///
/// The wire form is `{"type": ..., "values": ...}` with lowercase variant
/// names: `exactly` takes a single tag, `and`/`or` a list of subqueries,
/// `not`/`xor` exactly two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "values")]
pub enum Query {
    /// Matches when every subquery matches. An empty list is vacuously true.
    And(Vec<Query>),
    /// Matches when at least one subquery matches.
    Or(Vec<Query>),
    /// Matches when exactly one of the two operands matches. Both matching
    /// is no match at all, not a symmetric difference of tag sets.
    Xor(Box<Query>, Box<Query>),
    /// Matches when the first operand matches and the second does not.
    Not(Box<Query>, Box<Query>),
    /// Matches when the item carries this tag.
    Exactly(TagId),
}

impl Query {
    pub fn exactly(tag: TagId) -> Self {
        Query::Exactly(tag)
    }

    pub fn and(subqueries: Vec<Query>) -> Self {
        Query::And(subqueries)
    }

    pub fn or(subqueries: Vec<Query>) -> Self {
        Query::Or(subqueries)
    }

    pub fn not(matching: Query, excluding: Query) -> Self {
        Query::Not(Box::new(matching), Box::new(excluding))
    }

    pub fn xor(a: Query, b: Query) -> Self {
        Query::Xor(Box::new(a), Box::new(b))
    }

    /// Parse the wire form, rejecting malformed queries before evaluation.
    pub fn from_json(json: &str) -> Result<Self, QueryError> {
        serde_json::from_str(json).map_err(|e| QueryError::InvalidQuery(e.to_string()))
    }

    /// Evaluate against a tag-membership function.
    ///
    /// Returns `None` on no match, or the justifying tags on match. Pure
    /// and total: the result only depends on `tags_of` over the tags the
    /// query mentions.
    pub fn evaluate<F>(&self, tags_of: &F) -> Option<BTreeSet<TagId>>
    where
        F: Fn(TagId) -> bool,
    {
        match self {
            Query::Exactly(tag) => {
                if tags_of(*tag) {
                    Some(BTreeSet::from([*tag]))
                } else {
                    None
                }
            }
            Query::And(subqueries) => {
                let mut in_terms_of = BTreeSet::new();
                for subquery in subqueries {
                    in_terms_of.extend(subquery.evaluate(tags_of)?);
                }
                Some(in_terms_of)
            }
            Query::Or(subqueries) => {
                // No short-circuit: every matching subquery contributes to
                // the justification
                let mut matched = false;
                let mut in_terms_of = BTreeSet::new();
                for subquery in subqueries {
                    if let Some(tags) = subquery.evaluate(tags_of) {
                        matched = true;
                        in_terms_of.extend(tags);
                    }
                }
                matched.then_some(in_terms_of)
            }
            Query::Not(matching, excluding) => {
                let in_terms_of = matching.evaluate(tags_of)?;
                match excluding.evaluate(tags_of) {
                    Some(_) => None,
                    None => Some(in_terms_of),
                }
            }
            Query::Xor(a, b) => match (a.evaluate(tags_of), b.evaluate(tags_of)) {
                (Some(tags), None) | (None, Some(tags)) => Some(tags),
                _ => None,
            },
        }
    }

    /// All tags named by `Exactly` leaves. Used to seed candidate discovery.
    pub fn mentioned_tags(&self) -> BTreeSet<TagId> {
        let mut tags = BTreeSet::new();
        self.collect_tags(&mut tags);
        tags
    }

    fn collect_tags(&self, tags: &mut BTreeSet<TagId>) {
        match self {
            Query::Exactly(tag) => {
                tags.insert(*tag);
            }
            Query::And(subqueries) | Query::Or(subqueries) => {
                for subquery in subqueries {
                    subquery.collect_tags(tags);
                }
            }
            Query::Xor(a, b) | Query::Not(a, b) => {
                a.collect_tags(tags);
                b.collect_tags(tags);
            }
        }
    }
}

/// An item's tag membership, as loaded by the caller.
#[derive(Debug, Clone)]
pub struct ItemTags {
    pub address: Address,
    /// Tags the item was created under.
    pub original: TagScope,
    /// Tags accumulated by crossposting.
    pub crosspost: TagScope,
}

/// A matching item and the tags that justified the match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchMatch {
    pub address: Address,
    pub in_terms_of: BTreeSet<TagId>,
}

/// Evaluate `query` against each item, keeping the matches in input order.
///
/// With `exclude_crossposts`, membership means the original tag set only;
/// otherwise the original and crosspost sets together.
pub fn search(items: &[ItemTags], query: &Query, exclude_crossposts: bool) -> Vec<SearchMatch> {
    items
        .iter()
        .filter_map(|item| {
            let tags_of = |tag: TagId| {
                item.original.contains(tag)
                    || (!exclude_crossposts && item.crosspost.contains(tag))
            };
            query.evaluate(&tags_of).map(|in_terms_of| SearchMatch {
                address: item.address.clone(),
                in_terms_of,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Item tagged {1, 2} originally and {3, 4} by crosspost
    fn tags_of(tag: TagId) -> bool {
        [1, 2].contains(&tag)
    }

    fn item() -> ItemTags {
        ItemTags {
            address: Address::from("sha256-item"),
            original: TagScope::new([1, 2]),
            crosspost: TagScope::new([3, 4]),
        }
    }

    fn justified(tags: &[TagId]) -> Option<BTreeSet<TagId>> {
        Some(tags.iter().copied().collect())
    }

    #[test]
    fn test_exactly() {
        assert_eq!(Query::exactly(1).evaluate(&tags_of), justified(&[1]));
        assert_eq!(Query::exactly(5).evaluate(&tags_of), None);
    }

    #[test]
    fn test_or_collects_only_matching_justifications() {
        let query = Query::or(vec![Query::exactly(5), Query::exactly(1)]);
        assert_eq!(query.evaluate(&tags_of), justified(&[1]));

        let both = Query::or(vec![Query::exactly(1), Query::exactly(2)]);
        assert_eq!(both.evaluate(&tags_of), justified(&[1, 2]));

        let neither = Query::or(vec![Query::exactly(5), Query::exactly(6)]);
        assert_eq!(neither.evaluate(&tags_of), None);
    }

    #[test]
    fn test_and_requires_all() {
        let query = Query::and(vec![Query::exactly(1), Query::exactly(2)]);
        assert_eq!(query.evaluate(&tags_of), justified(&[1, 2]));

        let partial = Query::and(vec![Query::exactly(1), Query::exactly(5)]);
        assert_eq!(partial.evaluate(&tags_of), None);
    }

    #[test]
    fn test_vacuous_cases() {
        // Empty And is vacuously true with empty justification
        assert_eq!(Query::and(vec![]).evaluate(&tags_of), justified(&[]));
        // Empty Or is vacuously false
        assert_eq!(Query::or(vec![]).evaluate(&tags_of), None);
    }

    #[test]
    fn test_not() {
        let query = Query::not(Query::exactly(2), Query::exactly(5));
        assert_eq!(query.evaluate(&tags_of), justified(&[2]));

        // Both present: excluded
        let query = Query::not(Query::exactly(1), Query::exactly(2));
        assert_eq!(query.evaluate(&tags_of), None);

        // First operand missing: no match regardless of the second
        let query = Query::not(Query::exactly(5), Query::exactly(6));
        assert_eq!(query.evaluate(&tags_of), None);
    }

    #[test]
    fn test_xor_truth_table() {
        let query = Query::xor(Query::exactly(5), Query::exactly(2));
        assert_eq!(query.evaluate(&tags_of), justified(&[2]));

        // Both matching is no match at all
        let query = Query::xor(Query::exactly(1), Query::exactly(2));
        assert_eq!(query.evaluate(&tags_of), None);

        let query = Query::xor(Query::exactly(5), Query::exactly(6));
        assert_eq!(query.evaluate(&tags_of), None);
    }

    #[test]
    fn test_nested() {
        // (1 or 5) and not(2, 9)
        let query = Query::and(vec![
            Query::or(vec![Query::exactly(1), Query::exactly(5)]),
            Query::not(Query::exactly(2), Query::exactly(9)),
        ]);
        assert_eq!(query.evaluate(&tags_of), justified(&[1, 2]));
    }

    #[test]
    fn test_search_crosspost_flag() {
        let items = [item()];
        let query = Query::and(vec![Query::exactly(3), Query::exactly(4)]);

        let matches = search(&items, &query, false);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].in_terms_of, BTreeSet::from([3, 4]));

        assert!(search(&items, &query, true).is_empty());
    }

    #[test]
    fn test_search_preserves_input_order() {
        let mut second = item();
        second.address = Address::from("sha256-item2");
        let items = [item(), second];

        let matches = search(&items, &Query::exactly(1), false);
        let addresses: Vec<_> = matches.iter().map(|m| m.address.as_str()).collect();
        assert_eq!(addresses, vec!["sha256-item", "sha256-item2"]);
    }

    #[test]
    fn test_wire_form_roundtrip() {
        let query = Query::not(
            Query::xor(Query::exactly(9), Query::exactly(3)),
            Query::exactly(6),
        );
        let json = serde_json::to_string(&query).unwrap();
        assert_eq!(
            json,
            r#"{"type":"not","values":[{"type":"xor","values":[{"type":"exactly","values":9},{"type":"exactly","values":3}]},{"type":"exactly","values":6}]}"#
        );
        assert_eq!(Query::from_json(&json).unwrap(), query);
    }

    #[test]
    fn test_parse_rejects_bad_arity() {
        // xor with three operands
        let json = r#"{"type":"xor","values":[
            {"type":"exactly","values":1},
            {"type":"exactly","values":2},
            {"type":"exactly","values":3}]}"#;
        assert!(matches!(
            Query::from_json(json),
            Err(QueryError::InvalidQuery(_))
        ));

        // not with a single operand
        let json = r#"{"type":"not","values":[{"type":"exactly","values":1}]}"#;
        assert!(matches!(
            Query::from_json(json),
            Err(QueryError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_mentioned_tags() {
        let query = Query::and(vec![
            Query::or(vec![Query::exactly(1), Query::exactly(5)]),
            Query::not(Query::exactly(2), Query::exactly(9)),
        ]);
        assert_eq!(query.mentioned_tags(), BTreeSet::from([1, 2, 5, 9]));
    }
}
