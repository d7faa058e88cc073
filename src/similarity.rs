//! Nearest-neighbour retrieval over normalized feature vectors.
//!
//! Two backends answer the same question, "which tracks point in the same
//! direction as this one":
//!
//! - **Local**: exact cosine similarity against every corpus vector, computed
//!   in parallel with rayon and ranked with a stable sort so ties keep corpus
//!   order.
//! - **Remote**: an optional approximate index ([`VectorIndex`]). The first
//!   failure opens a one-way [`CircuitBreaker`]; from then on, for the rest of
//!   the process, every call goes to the local backend.
//!
//! Remote results that also resolve locally carry a per-feature
//! `match_details` map.

use crate::error::{BackendError, EngineError};
use crate::features::{Feature, FeatureVector};
use crate::recommendation::Recommendation;
use crate::remote::{RemoteMatch, VectorIndex};
use crate::store::FeatureStore;
use crate::track::Track;
use log::{debug, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Ranked recommendations, best first.
pub type Ranked = Vec<Recommendation>;

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Remote calls allowed.
    Closed,
    /// Remote disabled for the rest of the process.
    Open,
}

/// One-shot latch guarding the remote backend.
///
/// Starts closed, opens on the first reported failure and never closes
/// again. Opening is a single compare-and-swap, so when several threads
/// observe a failure at once exactly one of them performs the transition.
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    open: AtomicBool,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> BreakerState {
        if self.open.load(Ordering::Acquire) {
            BreakerState::Open
        } else {
            BreakerState::Closed
        }
    }

    #[must_use]
    pub fn allows_requests(&self) -> bool {
        self.state() == BreakerState::Closed
    }

    /// Open the breaker. Returns `true` only for the caller that actually
    /// moved it from closed to open.
    pub fn trip(&self) -> bool {
        self.open
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Cosine-rank every vector against `target`.
///
/// Returns `(corpus position, score)` pairs, best first, skipping `exclude`.
/// Equal scores keep corpus order.
#[must_use]
pub fn rank_by_cosine(
    vectors: &[FeatureVector],
    target: &FeatureVector,
    exclude: Option<usize>,
    limit: usize,
) -> Vec<(usize, f64)> {
    if limit == 0 {
        return Vec::new();
    }

    // Parallel map, but `collect` keeps corpus order.
    let scores: Vec<f64> = vectors
        .par_iter()
        .map(|candidate| target.cosine_similarity(candidate))
        .collect();

    let mut ranked: Vec<(usize, f64)> = scores
        .into_iter()
        .enumerate()
        .filter(|(position, _)| Some(*position) != exclude)
        .collect();

    // `sort_by` is stable.
    ranked.sort_by(|(_, a), (_, b)| b.total_cmp(a));
    ranked.truncate(limit);
    ranked
}

/// Per-feature closeness `1 - |seed - candidate|`, rounded to 3 decimals.
#[must_use]
pub fn match_details(seed: &FeatureVector, candidate: &FeatureVector) -> BTreeMap<Feature, f64> {
    Feature::ALL
        .into_iter()
        .map(|feature| {
            let closeness = 1.0 - (seed.get(feature) - candidate.get(feature)).abs();
            (feature, (closeness * 1000.0).round() / 1000.0)
        })
        .collect()
}

/// Seed-track similarity search with optional remote acceleration.
pub struct SimilarityEngine<'s> {
    store: &'s FeatureStore,
    remote: Option<Box<dyn VectorIndex>>,
    breaker: CircuitBreaker,
}

impl<'s> SimilarityEngine<'s> {
    /// Local-only engine.
    #[must_use]
    pub fn new(store: &'s FeatureStore) -> Self {
        Self {
            store,
            remote: None,
            breaker: CircuitBreaker::new(),
        }
    }

    /// Engine that tries `remote` first until it fails once.
    #[must_use]
    pub fn with_remote(store: &'s FeatureStore, remote: Box<dyn VectorIndex>) -> Self {
        Self {
            store,
            remote: Some(remote),
            breaker: CircuitBreaker::new(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &'s FeatureStore {
        self.store
    }

    #[must_use]
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Whether the next call would try the remote backend.
    #[must_use]
    pub fn remote_active(&self) -> bool {
        self.remote.is_some() && self.breaker.allows_requests()
    }

    /// Up to `limit` tracks most similar to `track_id`, excluding the seed.
    ///
    /// Unknown seeds and an empty corpus give an empty list.
    #[must_use]
    pub fn recommend(&self, track_id: &str, limit: usize) -> Ranked {
        let (position, seed) = match self.seed(track_id) {
            Ok(found) => found,
            Err(e) => {
                debug!("{e}");
                return Vec::new();
            }
        };
        if limit == 0 {
            return Vec::new();
        }

        if let Some(remote) = self.remote.as_deref() {
            if self.breaker.allows_requests() {
                match self.query_remote(remote, track_id, seed, limit) {
                    Ok(ranked) => return ranked,
                    Err(e) => self.record_failure(&e),
                }
            }
        }

        self.rank_local(position, seed, limit)
    }

    /// Exact local ranking, bypassing any remote backend.
    #[must_use]
    pub fn recommend_local(&self, track_id: &str, limit: usize) -> Ranked {
        match self.seed(track_id) {
            Ok((position, seed)) => self.rank_local(position, seed, limit),
            Err(e) => {
                debug!("{e}");
                Vec::new()
            }
        }
    }

    fn seed(&self, track_id: &str) -> Result<(usize, &'s FeatureVector), EngineError> {
        let store: &'s FeatureStore = self.store;
        store
            .position(track_id)
            .map(|position| (position, &store.vectors()[position]))
            .ok_or_else(|| EngineError::TrackNotFound(track_id.to_string()))
    }

    fn rank_local(&self, position: usize, seed: &FeatureVector, limit: usize) -> Ranked {
        rank_by_cosine(self.store.vectors(), seed, Some(position), limit)
            .into_iter()
            .map(|(i, score)| Recommendation::similar(self.store.tracks()[i].clone(), score))
            .collect()
    }

    fn query_remote(
        &self,
        remote: &dyn VectorIndex,
        seed_id: &str,
        seed: &FeatureVector,
        limit: usize,
    ) -> Result<Ranked, BackendError> {
        // One extra so the seed itself can be dropped.
        let matches = remote.query(seed, limit.saturating_add(1))?;

        Ok(matches
            .into_iter()
            .filter(|m| m.id != seed_id)
            .take(limit)
            .map(|m| self.resolve_remote(m, seed))
            .collect())
    }

    fn resolve_remote(&self, remote_match: RemoteMatch, seed: &FeatureVector) -> Recommendation {
        let score = remote_match.score.clamp(0.0, 1.0);

        match self.store.position(&remote_match.id) {
            Some(i) => Recommendation::similar(self.store.tracks()[i].clone(), score)
                .with_match_details(match_details(seed, &self.store.vectors()[i])),
            None => {
                let metadata = remote_match.metadata.unwrap_or_default();
                let track = Track {
                    track_id: remote_match.id,
                    track_name: metadata.track_name.unwrap_or_default(),
                    artists: metadata.artists.unwrap_or_default(),
                    track_genre: metadata.track_genre.unwrap_or_default(),
                    popularity: metadata
                        .popularity
                        .map_or(0, |p| p.round().clamp(0.0, 100.0) as u32),
                    ..Track::default()
                };
                Recommendation::similar(track, score)
            }
        }
    }

    fn record_failure(&self, error: &BackendError) {
        if self.breaker.trip() {
            warn!("Remote index failed ({error}); using local similarity for the rest of this process");
        } else {
            debug!("Remote index failed after breaker already open: {error}");
        }
    }
}
