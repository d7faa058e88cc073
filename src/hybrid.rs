//! Personalized recommendations blending listening overlap with audio
//! similarity.
//!
//! # Algorithm
//!
//! For a listener with history `H`:
//!
//! ```text
//! weight(u)   = |H ∩ tracks(u)|                  for every other user u
//! score_c(t)  = Σ weight(u)  over u that played t,  t ∉ H
//! score_v(t)  = cosine(seed, t)                   seed = last track of H
//! final(t)    = collaborative · score_c(t) + content · score_v(t)
//! ```
//!
//! The two signals live on different scales and are not normalized against
//! each other. [`BlendWeights`] exposes the coefficients instead of
//! pretending the sum is calibrated.
//!
//! A listener without history gets the most popular tracks of the most
//! popular genres.

use crate::recommendation::Recommendation;
use crate::similarity::{Ranked, SimilarityEngine};
use crate::store::FeatureStore;
use crate::track::{ListeningEvent, Track};
use crate::trends::rank_genres_by_popularity;
use log::{debug, info};
use std::collections::{HashMap, HashSet};

/// Coefficients of the additive blend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendWeights {
    pub collaborative: f64,
    pub content: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            collaborative: 0.5,
            content: 1.0,
        }
    }
}

impl BlendWeights {
    #[must_use]
    pub fn combine(&self, collaborative: f64, content: f64) -> f64 {
        self.collaborative * collaborative + self.content * content
    }
}

#[derive(Debug, Default)]
struct Candidate {
    track: Option<Track>,
    collaborative: f64,
    content: f64,
}

/// Hybrid collaborative + content recommender.
pub struct HybridRecommender<'e, 's> {
    similarity: &'e SimilarityEngine<'s>,
    weights: BlendWeights,
}

impl<'e, 's> HybridRecommender<'e, 's> {
    #[must_use]
    pub fn new(similarity: &'e SimilarityEngine<'s>) -> Self {
        Self::with_weights(similarity, BlendWeights::default())
    }

    #[must_use]
    pub fn with_weights(similarity: &'e SimilarityEngine<'s>, weights: BlendWeights) -> Self {
        Self { similarity, weights }
    }

    fn store(&self) -> &'s FeatureStore {
        self.similarity.store()
    }

    /// Up to `limit` tracks for `user_id`, never one already in `history`.
    ///
    /// `history` is the listener's plays, oldest first. `events` is the
    /// cross-user history table; rows belonging to `user_id` itself are
    /// ignored.
    #[must_use]
    pub fn recommend(
        &self,
        user_id: &str,
        history: &[String],
        events: &[ListeningEvent],
        limit: usize,
    ) -> Ranked {
        if limit == 0 {
            return Vec::new();
        }
        let Some(seed) = history.last() else {
            info!("No listening history for `{user_id}`, falling back to popular genres");
            return self.cold_start(limit);
        };

        let listened: HashSet<&str> = history.iter().map(String::as_str).collect();
        let mut order: Vec<String> = Vec::new();
        let mut candidates: HashMap<String, Candidate> = HashMap::new();

        for rec in self.similarity.recommend(seed, limit.saturating_mul(2)) {
            if listened.contains(rec.track_id()) {
                continue;
            }
            let score = rec.similarity_score.unwrap_or(0.0);
            let id = rec.track.track_id.clone();
            order.push(id.clone());
            candidates.insert(
                id,
                Candidate {
                    track: Some(rec.track),
                    content: score,
                    ..Candidate::default()
                },
            );
        }

        for (track_id, score) in collaborative_scores(user_id, &listened, events) {
            let entry = candidates.entry(track_id.to_string()).or_insert_with(|| {
                order.push(track_id.to_string());
                Candidate::default()
            });
            entry.collaborative = score;
        }
        debug!("{} hybrid candidates for `{user_id}`", order.len());

        let mut ranked: Vec<Recommendation> = order
            .into_iter()
            .filter_map(|id| {
                let candidate = candidates.remove(&id)?;
                let score = self.weights.combine(candidate.collaborative, candidate.content);
                let track = candidate
                    .track
                    .or_else(|| self.store().get_track(&id).cloned())
                    .unwrap_or_else(|| Track::placeholder(&id));
                Some(Recommendation::hybrid(track, score))
            })
            .collect();

        ranked.sort_by(|a, b| b.hybrid_score.unwrap_or(0.0).total_cmp(&a.hybrid_score.unwrap_or(0.0)));
        ranked.truncate(limit);
        ranked
    }

    /// Round-robin over genres ranked by mean popularity, taking each
    /// genre's next most popular track per round.
    ///
    /// Scores are `popularity / 100`.
    #[must_use]
    pub fn cold_start(&self, limit: usize) -> Ranked {
        let tracks = self.store().tracks();
        let genres = rank_genres_by_popularity(tracks);

        let mut buckets: Vec<_> = genres
            .iter()
            .map(|g| {
                let mut members: Vec<&Track> =
                    tracks.iter().filter(|t| t.track_genre == g.genre).collect();
                members.sort_by(|a, b| b.popularity.cmp(&a.popularity));
                members.into_iter()
            })
            .collect();

        let mut picks = Vec::with_capacity(limit.min(tracks.len()));
        let mut progressed = true;
        while picks.len() < limit && progressed {
            progressed = false;
            for bucket in &mut buckets {
                if picks.len() == limit {
                    break;
                }
                if let Some(track) = bucket.next() {
                    progressed = true;
                    let score = f64::from(track.popularity) / 100.0;
                    picks.push(Recommendation::hybrid(track.clone(), score));
                }
            }
        }
        picks
    }
}

/// Collaborative score per candidate, in first-seen order.
fn collaborative_scores<'a>(
    user_id: &str,
    listened: &HashSet<&str>,
    events: &'a [ListeningEvent],
) -> Vec<(&'a str, f64)> {
    let mut per_user: HashMap<&str, HashSet<&str>> = HashMap::new();
    for event in events.iter().filter(|e| e.user_id != user_id) {
        per_user
            .entry(event.user_id.as_str())
            .or_default()
            .insert(event.track_id.as_str());
    }

    let overlap: HashMap<&str, usize> = per_user
        .iter()
        .map(|(user, played)| (*user, played.iter().filter(|t| listened.contains(*t)).count()))
        .filter(|(_, shared)| *shared > 0)
        .collect();

    let mut counted: HashSet<(&str, &str)> = HashSet::new();
    let mut order: Vec<&str> = Vec::new();
    let mut scores: HashMap<&str, f64> = HashMap::new();

    for event in events {
        let (user, track) = (event.user_id.as_str(), event.track_id.as_str());
        let Some(&weight) = overlap.get(user) else {
            continue;
        };
        if listened.contains(track) || !counted.insert((user, track)) {
            continue;
        }
        let score = scores.entry(track).or_insert_with(|| {
            order.push(track);
            0.0
        });
        *score += weight as f64;
    }

    order
        .into_iter()
        .map(|track| (track, scores.get(track).copied().unwrap_or(0.0)))
        .collect()
}
