//! Directional like edges and reciprocity detection

use serde::{Deserialize, Serialize};

use crate::models::{LikeEdges, LikeMap, Match, RecordId};

/// Like edges of every actor known to a region
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct LikeBook {
    edges: LikeMap,
}

/// Result of recording a like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeRecord {
    /// The target was not in `liked` before
    pub added: bool,

    /// The target already likes the actor back
    pub reciprocal: bool,
}

impl LikeBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `target` to `actor`'s liked set and check the reverse edge.
    ///
    /// Reciprocity is reported on every call, including repeated likes.
    pub fn record_like(&mut self, actor: RecordId, target: RecordId) -> LikeRecord {
        let added = self.edges.entry(actor).or_default().add_liked(target);
        let reciprocal = self
            .edges
            .get(&target)
            .is_some_and(|edges| edges.likes(actor));
        LikeRecord { added, reciprocal }
    }

    /// Add `target` to `actor`'s unliked set. `liked` is left untouched.
    pub fn record_unlike(&mut self, actor: RecordId, target: RecordId) -> bool {
        self.edges.entry(actor).or_default().add_unliked(target)
    }

    /// Edges of `actor`, empty if it never liked anything
    pub fn edges(&self, actor: RecordId) -> LikeEdges {
        self.edges.get(&actor).cloned().unwrap_or_default()
    }

    pub fn remove(&mut self, actor: RecordId) -> Option<LikeEdges> {
        self.edges.remove(&actor)
    }

    pub fn insert(&mut self, actor: RecordId, edges: LikeEdges) {
        self.edges.insert(actor, edges);
    }

    pub fn as_map(&self) -> &LikeMap {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Answer of `POST /like`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LikeOutcome {
    #[serde(rename = "match")]
    pub is_match: bool,

    #[serde(rename = "newMatch", default, skip_serializing_if = "Option::is_none")]
    pub new_match: Option<Match>,
}

impl LikeOutcome {
    pub fn no_match() -> Self {
        Self {
            is_match: false,
            new_match: None,
        }
    }

    pub fn matched(new_match: Match) -> Self {
        Self {
            is_match: true,
            new_match: Some(new_match),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_sided_like_is_not_reciprocal() {
        let mut book = LikeBook::new();
        let record = book.record_like(1, 2);

        assert!(record.added);
        assert!(!record.reciprocal);
        assert_eq!(book.edges(1).liked, vec![2]);
    }

    #[test]
    fn test_reverse_like_is_reciprocal() {
        let mut book = LikeBook::new();
        book.record_like(1, 2);
        let record = book.record_like(2, 1);

        assert!(record.reciprocal);
    }

    #[test]
    fn test_repeated_like_stays_reciprocal() {
        let mut book = LikeBook::new();
        book.record_like(1, 2);
        book.record_like(2, 1);
        let again = book.record_like(2, 1);

        assert!(!again.added);
        assert!(again.reciprocal);
        assert_eq!(book.edges(2).liked, vec![1]);
    }

    #[test]
    fn test_unlike_does_not_remove_like() {
        let mut book = LikeBook::new();
        book.record_like(1, 2);

        assert!(book.record_unlike(1, 2));
        assert!(!book.record_unlike(1, 2));

        let edges = book.edges(1);
        assert_eq!(edges.liked, vec![2]);
        assert_eq!(edges.unliked, vec![2]);
    }

    #[test]
    fn test_unknown_actor_has_empty_edges() {
        let book = LikeBook::new();
        assert_eq!(book.edges(7), LikeEdges::default());
        assert!(book.is_empty());
    }

    #[test]
    fn test_outcome_wire_format() {
        let outcome = LikeOutcome::no_match();
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value, serde_json::json!({ "match": false }));

        let outcome = LikeOutcome::matched(Match {
            id: 5,
            animals: [1, 2],
            city: "Toulouse".to_string(),
        });
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["match"], true);
        assert_eq!(value["newMatch"]["animals"], serde_json::json!([1, 2]));
    }
}
