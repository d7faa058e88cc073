//! Recommendations toward a user-described feature profile.

use crate::features::{Feature, FeatureVector, MinMaxScaler, FEATURE_COUNT};
use crate::recommendation::Recommendation;
use crate::similarity::{rank_by_cosine, Ranked};
use crate::store::FeatureStore;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// A partial set of desired raw feature values.
///
/// Given values go through the corpus' frozen scaler, so `tempo: 120` means
/// 120 BPM. Features left out sit at the neutral midpoint of the normalized
/// range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureTarget(BTreeMap<Feature, f64>);

impl FeatureTarget {
    /// Normalized value used for every unspecified feature.
    pub const NEUTRAL: f64 = 0.5;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a desired value. A NaN or infinite value is dropped and the
    /// feature stays neutral.
    #[must_use]
    pub fn with(mut self, feature: Feature, value: f64) -> Self {
        if value.is_finite() {
            self.0.insert(feature, value);
        } else {
            debug!("Ignoring non-finite target for {feature}: {value}");
        }
        self
    }

    #[must_use]
    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.0.get(&feature).copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build the full target vector in the same space as the corpus vectors.
    #[must_use]
    pub fn to_vector(&self, scaler: &MinMaxScaler) -> FeatureVector {
        let mut values = [Self::NEUTRAL; FEATURE_COUNT];
        for (&feature, &raw) in &self.0 {
            values[feature.index()] = scaler.scale_value(feature, raw);
        }
        FeatureVector::new(values)
    }
}

impl FromIterator<(Feature, f64)> for FeatureTarget {
    fn from_iter<I: IntoIterator<Item = (Feature, f64)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |target, (feature, value)| target.with(feature, value))
    }
}

/// Parses `feature=value` pairs separated by commas, e.g.
/// `energy=0.8,tempo=128`.
impl FromStr for FeatureTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (name, value) = pair
                    .split_once('=')
                    .ok_or_else(|| format!("expected feature=value, got `{pair}`"))?;
                let feature = name.parse::<Feature>()?;
                let value = value
                    .trim()
                    .parse::<f64>()
                    .map_err(|e| format!("bad value for {feature}: {e}"))?;
                if !value.is_finite() {
                    return Err(format!("bad value for {feature}: {value}"));
                }
                Ok((feature, value))
            })
            .collect()
    }
}

/// Ranks the corpus against a synthetic target vector.
pub struct FeatureTargetRecommender<'s> {
    store: &'s FeatureStore,
}

impl<'s> FeatureTargetRecommender<'s> {
    #[must_use]
    pub fn new(store: &'s FeatureStore) -> Self {
        Self { store }
    }

    /// Top `limit` tracks by cosine similarity to `target`.
    ///
    /// The target is not a corpus row, so nothing is excluded.
    #[must_use]
    pub fn recommend(&self, target: &FeatureTarget, limit: usize) -> Ranked {
        let vector = target.to_vector(self.store.scaler());
        debug!("Target vector: {:?}", vector.as_slice());

        rank_by_cosine(self.store.vectors(), &vector, None, limit)
            .into_iter()
            .map(|(i, score)| Recommendation::similar(self.store.tracks()[i].clone(), score))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{features, track};
    use crate::track::Track;

    /// Tracks spread evenly over valence, energy and tempo.
    fn uniform_store() -> FeatureStore {
        let tracks: Vec<Track> = (0..=10)
            .map(|i| {
                let v = f64::from(i) / 10.0;
                track(&format!("u{i}"), "x", 50, features(v, 1.0 - v, 60.0 + 12.0 * f64::from(i)))
            })
            .collect();
        FeatureStore::from_tracks(tracks)
    }

    #[test]
    fn test_neutral_target_vector() {
        let store = uniform_store();
        let vector = FeatureTarget::new().to_vector(store.scaler());
        assert_eq!(vector, FeatureVector::splat(0.5));
    }

    #[test]
    fn test_given_values_use_frozen_bounds() {
        let store = uniform_store();
        let vector = FeatureTarget::new()
            .with(Feature::Tempo, 120.0)
            .with(Feature::Valence, 5.0)
            .to_vector(store.scaler());

        assert!((vector.tempo() - 0.5).abs() < 1e-12);
        assert_eq!(vector.valence(), 1.0, "out-of-range input is clamped");
        assert_eq!(vector.energy(), FeatureTarget::NEUTRAL);
    }

    #[test]
    fn test_default_target_ranking_is_deterministic() {
        let store = uniform_store();
        let recommender = FeatureTargetRecommender::new(&store);
        let target = FeatureTarget::new();

        let first = recommender.recommend(&target, 5);
        let second = recommender.recommend(&target, 5);
        assert_eq!(first.len(), 5);
        assert_eq!(first, second);

        let scores: Vec<f64> = first.iter().filter_map(Recommendation::score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_target_prefers_matching_tracks() {
        let store = uniform_store();
        let target = FeatureTarget::new()
            .with(Feature::Valence, 1.0)
            .with(Feature::Energy, 0.0)
            .with(Feature::Tempo, 180.0);

        let top = FeatureTargetRecommender::new(&store).recommend(&target, 1);
        assert_eq!(top[0].track_id(), "u10");
    }

    #[test]
    fn test_parse_pairs() {
        let target: FeatureTarget = "energy=0.8, Tempo=128".parse().expect("valid");
        assert_eq!(target.get(Feature::Energy), Some(0.8));
        assert_eq!(target.get(Feature::Tempo), Some(128.0));
        assert_eq!(target.get(Feature::Valence), None);

        assert!("".parse::<FeatureTarget>().expect("empty ok").is_empty());
        assert!("energy".parse::<FeatureTarget>().is_err());
        assert!("loudness_db=1".parse::<FeatureTarget>().is_err());
        assert!("energy=high".parse::<FeatureTarget>().is_err());
    }

    #[test]
    fn test_non_finite_values_stay_neutral() {
        let target = FeatureTarget::new()
            .with(Feature::Energy, f64::NAN)
            .with(Feature::Tempo, f64::INFINITY)
            .with(Feature::Valence, 0.9);
        assert_eq!(target.get(Feature::Energy), None);
        assert_eq!(target.get(Feature::Tempo), None);
        assert_eq!(target.get(Feature::Valence), Some(0.9));

        let collected: FeatureTarget = [(Feature::Energy, f64::NAN)].into_iter().collect();
        assert!(collected.is_empty());
    }

    #[test]
    fn test_empty_corpus() {
        let store = FeatureStore::default();
        assert!(FeatureTargetRecommender::new(&store)
            .recommend(&FeatureTarget::new(), 5)
            .is_empty());
    }
}
