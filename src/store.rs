//! The in-memory corpus and its frozen normalization.
//!
//! A [`FeatureStore`] is built once per process. Construction never fails: a
//! missing or unreadable corpus produces an empty store, and every query on an
//! empty store answers with an empty result.

use crate::db;
use crate::error::{self, EngineError};
use crate::features::{FeatureVector, MinMaxScaler};
use crate::track::Track;
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Immutable corpus, normalized vectors and lookup index.
#[derive(Debug, Clone)]
pub struct FeatureStore {
    tracks: Vec<Track>,
    vectors: Vec<FeatureVector>,
    index: HashMap<String, usize>,
    scaler: MinMaxScaler,
}

impl Default for FeatureStore {
    fn default() -> Self {
        Self::from_tracks(Vec::new())
    }
}

impl FeatureStore {
    /// Fit the scaler over `tracks` and freeze everything.
    ///
    /// Ids are expected to be unique; if one repeats, the first row keeps the
    /// lookup and later rows are still part of the corpus.
    #[must_use]
    pub fn from_tracks(tracks: Vec<Track>) -> Self {
        let scaler = MinMaxScaler::fit(tracks.iter().map(|t| &t.features));
        let vectors = tracks.iter().map(|t| scaler.transform(&t.features)).collect();

        let mut index = HashMap::with_capacity(tracks.len());
        for (position, track) in tracks.iter().enumerate() {
            if index.contains_key(&track.track_id) {
                warn!("Duplicate track id `{}` at row {position}", track.track_id);
                continue;
            }
            index.insert(track.track_id.clone(), position);
        }

        Self {
            tracks,
            vectors,
            index,
            scaler,
        }
    }

    /// Load the corpus from the SQLite database at `db_path`.
    ///
    /// Never fails: an unavailable corpus is logged and an empty store is
    /// returned in its place.
    pub fn load(db_path: &Path) -> Self {
        match Self::try_load(db_path) {
            Ok(store) => store,
            Err(e) => {
                warn!("Starting with an empty corpus: {e}");
                Self::default()
            }
        }
    }

    /// Like [`FeatureStore::load`] but reports why the corpus was unavailable.
    pub fn try_load(db_path: &Path) -> error::Result<Self> {
        let conn = db::open_read_only(db_path)?;
        let tracks = db::load_tracks(&conn).map_err(|e| EngineError::DataUnavailable {
            path: db_path.to_path_buf(),
            reason: e.to_string(),
        })?;
        info!("Loaded {} tracks from {}", tracks.len(), db_path.display());
        Ok(Self::from_tracks(tracks))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// All tracks in corpus order.
    #[must_use]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Normalized vectors, parallel to [`FeatureStore::tracks`].
    #[must_use]
    pub fn vectors(&self) -> &[FeatureVector] {
        &self.vectors
    }

    #[must_use]
    pub fn scaler(&self) -> &MinMaxScaler {
        &self.scaler
    }

    /// Corpus position of `track_id`.
    #[must_use]
    pub fn position(&self, track_id: &str) -> Option<usize> {
        self.index.get(track_id).copied()
    }

    #[must_use]
    pub fn get_track(&self, track_id: &str) -> Option<&Track> {
        self.position(track_id).map(|i| &self.tracks[i])
    }

    #[must_use]
    pub fn get_vector(&self, track_id: &str) -> Option<&FeatureVector> {
        self.position(track_id).map(|i| &self.vectors[i])
    }

    /// Case-insensitive substring search over track name and artists.
    ///
    /// Returns the first `limit` matches in corpus order.
    #[must_use]
    pub fn search(&self, query: &str, limit: usize) -> Vec<&Track> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        self.tracks
            .iter()
            .filter(|t| {
                t.track_name.to_lowercase().contains(&needle)
                    || t.artists.to_lowercase().contains(&needle)
            })
            .take(limit)
            .collect()
    }

    /// Distinct genres, sorted alphabetically. Blank genres are left out.
    #[must_use]
    pub fn list_genres(&self) -> Vec<String> {
        self.tracks
            .iter()
            .map(|t| t.track_genre.as_str())
            .filter(|g| !g.trim().is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Random sample of up to `limit` tracks whose genre matches `genre`
    /// case-insensitively. Unknown genres give an empty result.
    pub fn tracks_by_genre<R: Rng + ?Sized>(
        &self,
        genre: &str,
        limit: usize,
        rng: &mut R,
    ) -> Vec<&Track> {
        let wanted = genre.trim().to_lowercase();
        let matching: Vec<&Track> = self
            .tracks
            .iter()
            .filter(|t| t.track_genre.to_lowercase() == wanted)
            .collect();

        if matching.is_empty() {
            debug!("No tracks for genre `{genre}`");
        }
        sample(&matching, limit, rng)
    }
}

/// Uniform sample without replacement of `min(limit, items.len())` items.
pub fn sample<'a, T, R>(items: &[&'a T], limit: usize, rng: &mut R) -> Vec<&'a T>
where
    R: Rng + ?Sized,
{
    items.choose_multiple(rng, limit).copied().collect()
}
