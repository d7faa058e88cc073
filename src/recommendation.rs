//! Ranked result records handed back to callers.

use crate::features::Feature;
use crate::track::Track;
use serde::Serialize;
use std::collections::BTreeMap;

/// A recommended track plus whichever score produced it.
///
/// Serializes flat: the track fields followed by `similarity_score`,
/// `hybrid_score` or `match_details` when present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    #[serde(flatten)]
    pub track: Track,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hybrid_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_details: Option<BTreeMap<Feature, f64>>,
}

impl Recommendation {
    /// Unscored result (mood and genre sampling).
    #[must_use]
    pub fn plain(track: Track) -> Self {
        Self {
            track,
            similarity_score: None,
            hybrid_score: None,
            match_details: None,
        }
    }

    #[must_use]
    pub fn similar(track: Track, score: f64) -> Self {
        Self {
            similarity_score: Some(score),
            ..Self::plain(track)
        }
    }

    #[must_use]
    pub fn hybrid(track: Track, score: f64) -> Self {
        Self {
            hybrid_score: Some(score),
            ..Self::plain(track)
        }
    }

    #[must_use]
    pub fn with_match_details(mut self, details: BTreeMap<Feature, f64>) -> Self {
        self.match_details = Some(details);
        self
    }

    #[must_use]
    pub fn track_id(&self) -> &str {
        &self.track.track_id
    }

    /// The score this result was ranked by, if any.
    #[must_use]
    pub fn score(&self) -> Option<f64> {
        self.hybrid_score.or(self.similarity_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialization_omits_absent_scores() {
        let rec = Recommendation::similar(Track::placeholder("t"), 0.75);
        let json = serde_json::to_value(&rec).expect("serializable");

        assert_eq!(json["track_id"], "t");
        assert_eq!(json["similarity_score"], 0.75);
        assert!(json.get("hybrid_score").is_none());
        assert!(json.get("match_details").is_none());
    }

    #[test]
    fn test_match_details_keyed_by_feature_name() {
        let details = BTreeMap::from([(Feature::Energy, 0.9), (Feature::TimeSignature, 1.0)]);
        let rec = Recommendation::similar(Track::placeholder("t"), 0.5).with_match_details(details);
        let json = serde_json::to_value(&rec).expect("serializable");

        assert_eq!(json["match_details"]["energy"], 0.9);
        assert_eq!(json["match_details"]["time_signature"], 1.0);
    }
}
