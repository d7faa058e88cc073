//! Audio feature vectors and the corpus-wide min-max transform.
//!
//! Every consumer sees the same twelve dimensions in the same order, defined
//! once by [`Feature::ALL`]. A [`MinMaxScaler`] is fit once over the whole
//! corpus and has no way to be refit afterwards; every vector handed out by
//! the crate, including synthetic targets, goes through those frozen bounds.

use crate::track::AudioFeatures;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of audio features per track.
pub const FEATURE_COUNT: usize = 12;

/// One of the twelve audio descriptors, in vector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Danceability,
    Energy,
    Key,
    Loudness,
    Mode,
    Speechiness,
    Acousticness,
    Instrumentalness,
    Liveness,
    Valence,
    Tempo,
    TimeSignature,
}

impl Feature {
    /// All features in vector order.
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::Danceability,
        Feature::Energy,
        Feature::Key,
        Feature::Loudness,
        Feature::Mode,
        Feature::Speechiness,
        Feature::Acousticness,
        Feature::Instrumentalness,
        Feature::Liveness,
        Feature::Valence,
        Feature::Tempo,
        Feature::TimeSignature,
    ];

    /// Position of this feature inside a [`FeatureVector`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Column name as used in the corpus schema.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Feature::Danceability => "danceability",
            Feature::Energy => "energy",
            Feature::Key => "key",
            Feature::Loudness => "loudness",
            Feature::Mode => "mode",
            Feature::Speechiness => "speechiness",
            Feature::Acousticness => "acousticness",
            Feature::Instrumentalness => "instrumentalness",
            Feature::Liveness => "liveness",
            Feature::Valence => "valence",
            Feature::Tempo => "tempo",
            Feature::TimeSignature => "time_signature",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Feature::ALL
            .into_iter()
            .find(|feature| feature.name() == wanted)
            .ok_or_else(|| format!("unknown audio feature `{s}`"))
    }
}

/// Normalized, fixed-length feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

macro_rules! named_accessors {
    ($($name:ident => $feature:ident),* $(,)?) => {
        $(
            #[must_use]
            pub fn $name(&self) -> f64 {
                self.get(Feature::$feature)
            }
        )*
    };
}

impl FeatureVector {
    #[must_use]
    pub const fn new(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    /// Vector with every dimension set to `value`.
    #[must_use]
    pub const fn splat(value: f64) -> Self {
        Self([value; FEATURE_COUNT])
    }

    #[must_use]
    pub fn get(&self, feature: Feature) -> f64 {
        self.0[feature.index()]
    }

    named_accessors! {
        danceability => Danceability,
        energy => Energy,
        key => Key,
        loudness => Loudness,
        mode => Mode,
        speechiness => Speechiness,
        acousticness => Acousticness,
        instrumentalness => Instrumentalness,
        liveness => Liveness,
        valence => Valence,
        tempo => Tempo,
        time_signature => TimeSignature,
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    #[must_use]
    pub fn norm(&self) -> f64 {
        self.0.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Cosine similarity clamped to `[0, 1]`.
    ///
    /// Normalized vectors are non-negative, so the lower clamp only absorbs
    /// rounding noise. A zero vector has no direction and scores 0 against
    /// everything.
    #[must_use]
    pub fn cosine_similarity(&self, other: &FeatureVector) -> f64 {
        let denominator = self.norm() * other.norm();
        if denominator == 0.0 {
            return 0.0;
        }
        let dot: f64 = self.0.iter().zip(other.0.iter()).map(|(a, b)| a * b).sum();
        (dot / denominator).clamp(0.0, 1.0)
    }
}

/// Per-dimension min/max bounds, fit once over the whole corpus.
///
/// The fields are private and there is no mutating method: once a scaler
/// exists its bounds are frozen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MinMaxScaler {
    min: [f64; FEATURE_COUNT],
    max: [f64; FEATURE_COUNT],
}

impl MinMaxScaler {
    /// Fit bounds over `rows`. An empty corpus yields zero-width bounds.
    pub fn fit<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a AudioFeatures>,
    {
        let mut min = [f64::INFINITY; FEATURE_COUNT];
        let mut max = [f64::NEG_INFINITY; FEATURE_COUNT];
        let mut seen = false;

        for row in rows {
            seen = true;
            for (i, value) in row.to_array().into_iter().enumerate() {
                min[i] = min[i].min(value);
                max[i] = max[i].max(value);
            }
        }

        if !seen {
            return Self {
                min: [0.0; FEATURE_COUNT],
                max: [0.0; FEATURE_COUNT],
            };
        }

        Self { min, max }
    }

    #[must_use]
    pub fn bounds(&self, feature: Feature) -> (f64, f64) {
        let i = feature.index();
        (self.min[i], self.max[i])
    }

    /// Rescale one raw value into `[0, 1]`.
    ///
    /// Values outside the fitted range are clamped; a dimension with zero
    /// range and a NaN value both map to 0.
    #[must_use]
    pub fn scale_value(&self, feature: Feature, raw: f64) -> f64 {
        let (lo, hi) = self.bounds(feature);
        let range = hi - lo;
        if range <= 0.0 || !range.is_finite() || raw.is_nan() {
            return 0.0;
        }
        ((raw - lo) / range).clamp(0.0, 1.0)
    }

    #[must_use]
    pub fn transform(&self, features: &AudioFeatures) -> FeatureVector {
        let mut values = [0.0; FEATURE_COUNT];
        for feature in Feature::ALL {
            values[feature.index()] = self.scale_value(feature, features.get(feature));
        }
        FeatureVector::new(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(energy: f64, tempo: f64) -> AudioFeatures {
        AudioFeatures {
            energy,
            tempo,
            ..AudioFeatures::default()
        }
    }

    #[test]
    fn test_feature_order_is_stable() {
        for (i, feature) in Feature::ALL.iter().enumerate() {
            assert_eq!(feature.index(), i);
        }
        assert_eq!(Feature::ALL[10], Feature::Tempo);
        assert_eq!(Feature::ALL[11], Feature::TimeSignature);
    }

    #[test]
    fn test_feature_parsing() {
        assert_eq!("Energy".parse::<Feature>(), Ok(Feature::Energy));
        assert_eq!(" time_signature ".parse::<Feature>(), Ok(Feature::TimeSignature));
        assert!("bassiness".parse::<Feature>().is_err());
    }

    #[test]
    fn test_scaler_maps_corpus_into_unit_range() {
        let rows = vec![features(0.2, 80.0), features(0.6, 120.0), features(1.0, 160.0)];
        let scaler = MinMaxScaler::fit(&rows);

        let middle = scaler.transform(&rows[1]);
        assert!((middle.energy() - 0.5).abs() < 1e-12);
        assert!((middle.tempo() - 0.5).abs() < 1e-12);

        let top = scaler.transform(&rows[2]);
        assert_eq!(top.energy(), 1.0);
        // Every row shares danceability 0.0, so that column has zero range.
        assert_eq!(top.danceability(), 0.0);
    }

    #[test]
    fn test_scaler_clamps_out_of_range_values() {
        let rows = vec![features(0.2, 80.0), features(1.0, 160.0)];
        let scaler = MinMaxScaler::fit(&rows);

        assert_eq!(scaler.scale_value(Feature::Tempo, 500.0), 1.0);
        assert_eq!(scaler.scale_value(Feature::Tempo, 10.0), 0.0);
        assert_eq!(scaler.scale_value(Feature::Tempo, f64::NAN), 0.0);
        assert_eq!(scaler.scale_value(Feature::Tempo, f64::INFINITY), 1.0);
    }

    #[test]
    fn test_empty_fit_is_valid() {
        let scaler = MinMaxScaler::fit(std::iter::empty());
        assert_eq!(scaler.bounds(Feature::Loudness), (0.0, 0.0));
        let vector = scaler.transform(&features(0.5, 100.0));
        assert_eq!(vector.norm(), 0.0);
    }

    #[test]
    fn test_cosine_similarity_bounds() {
        let a = FeatureVector::new([1.0, 0.5, 0.0, 0.2, 1.0, 0.1, 0.3, 0.0, 0.4, 0.9, 0.6, 0.75]);
        assert!((a.cosine_similarity(&a) - 1.0).abs() < 1e-12);

        let zero = FeatureVector::splat(0.0);
        assert_eq!(a.cosine_similarity(&zero), 0.0);

        let mut orthogonal = [0.0; FEATURE_COUNT];
        orthogonal[Feature::Key.index()] = 1.0;
        let b = FeatureVector::new(orthogonal);
        assert_eq!(a.cosine_similarity(&b), 0.0);
    }
}
