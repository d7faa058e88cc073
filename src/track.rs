//! Track and listening-history records supplied by the corpus owner.

use crate::features::{Feature, FEATURE_COUNT};
use serde::{Deserialize, Serialize};

/// Raw (unnormalized) audio features of a track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub danceability: f64,
    pub energy: f64,
    /// Pitch class, 0–11.
    pub key: i32,
    /// Decibels, usually negative.
    pub loudness: f64,
    /// 1 = major, 0 = minor.
    pub mode: i32,
    pub speechiness: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
    pub valence: f64,
    /// Beats per minute.
    pub tempo: f64,
    pub time_signature: i32,
}

impl AudioFeatures {
    #[must_use]
    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Danceability => self.danceability,
            Feature::Energy => self.energy,
            Feature::Key => f64::from(self.key),
            Feature::Loudness => self.loudness,
            Feature::Mode => f64::from(self.mode),
            Feature::Speechiness => self.speechiness,
            Feature::Acousticness => self.acousticness,
            Feature::Instrumentalness => self.instrumentalness,
            Feature::Liveness => self.liveness,
            Feature::Valence => self.valence,
            Feature::Tempo => self.tempo,
            Feature::TimeSignature => f64::from(self.time_signature),
        }
    }

    /// Raw values in [`Feature::ALL`] order.
    #[must_use]
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        Feature::ALL.map(|feature| self.get(feature))
    }
}

/// One row of the track corpus. Immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub track_id: String,
    pub track_name: String,
    pub artists: String,
    pub album_name: String,
    pub track_genre: String,
    /// 0–100.
    pub popularity: u32,
    pub duration_ms: u64,
    pub explicit: bool,
    #[serde(flatten)]
    pub features: AudioFeatures,
}

impl Track {
    /// Stand-in for ids the corpus cannot resolve.
    #[must_use]
    pub fn placeholder(track_id: &str) -> Self {
        Self {
            track_id: track_id.to_string(),
            track_name: "Unknown Track".to_string(),
            artists: "Unknown Artist".to_string(),
            ..Self::default()
        }
    }
}

/// A play of `track_id` by `user_id`. Owned by the history collaborator and
/// never mutated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListeningEvent {
    pub user_id: String,
    pub track_id: String,
    /// Seconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
}

impl ListeningEvent {
    pub fn new(user_id: impl Into<String>, track_id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            user_id: user_id.into(),
            track_id: track_id.into(),
            timestamp,
        }
    }
}
