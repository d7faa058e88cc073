//! Mood-based filtering.
//!
//! Each of the eight moods is a fixed conjunction of threshold rules over a
//! track's audio features. A request filters the corpus by those rules and
//! returns a uniform random sample of the survivors.
//!
//! Rules read the raw feature values: the descriptive features already live
//! in `[0, 1]`, and the workout rule's tempo threshold is in BPM.

use crate::error::EngineError;
use crate::features::Feature;
use crate::recommendation::Recommendation;
use crate::store::{sample, FeatureStore};
use crate::track::Track;
use log::{debug, warn};
use rand::Rng;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// The fixed set of moods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Sad,
    Energetic,
    Calm,
    Focused,
    Party,
    Workout,
    Chill,
}

impl Mood {
    pub const ALL: [Mood; 8] = [
        Mood::Happy,
        Mood::Sad,
        Mood::Energetic,
        Mood::Calm,
        Mood::Focused,
        Mood::Party,
        Mood::Workout,
        Mood::Chill,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Sad => "sad",
            Mood::Energetic => "energetic",
            Mood::Calm => "calm",
            Mood::Focused => "focused",
            Mood::Party => "party",
            Mood::Workout => "workout",
            Mood::Chill => "chill",
        }
    }

    /// The rules a track must all satisfy to match this mood.
    #[must_use]
    pub fn rules(self) -> &'static [Rule] {
        match self {
            Mood::Happy => HAPPY,
            Mood::Sad => SAD,
            Mood::Energetic => ENERGETIC,
            Mood::Calm => CALM,
            Mood::Focused => FOCUSED,
            Mood::Party => PARTY,
            Mood::Workout => WORKOUT,
            Mood::Chill => CHILL,
        }
    }

    #[must_use]
    pub fn matches(self, track: &Track) -> bool {
        self.rules().iter().all(|rule| rule.holds(track))
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mood {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Mood::ALL
            .into_iter()
            .find(|mood| mood.name() == wanted)
            .ok_or_else(|| EngineError::UnknownMood(s.to_string()))
    }
}

/// Strict comparison against a fixed value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Threshold {
    Above(f64),
    Below(f64),
}

/// One `feature <op> value` condition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rule {
    pub feature: Feature,
    pub threshold: Threshold,
}

impl Rule {
    const fn new(feature: Feature, threshold: Threshold) -> Self {
        Self { feature, threshold }
    }

    #[must_use]
    pub fn holds(&self, track: &Track) -> bool {
        let value = track.features.get(self.feature);
        match self.threshold {
            Threshold::Above(limit) => value > limit,
            Threshold::Below(limit) => value < limit,
        }
    }
}

const fn above(feature: Feature, value: f64) -> Rule {
    Rule::new(feature, Threshold::Above(value))
}

const fn below(feature: Feature, value: f64) -> Rule {
    Rule::new(feature, Threshold::Below(value))
}

const HAPPY: &[Rule] = &[above(Feature::Valence, 0.6), above(Feature::Energy, 0.6)];
const SAD: &[Rule] = &[below(Feature::Valence, 0.4), below(Feature::Energy, 0.4)];
const ENERGETIC: &[Rule] = &[above(Feature::Energy, 0.7), above(Feature::Danceability, 0.6)];
const CALM: &[Rule] = &[below(Feature::Energy, 0.4), above(Feature::Acousticness, 0.5)];
const FOCUSED: &[Rule] = &[
    above(Feature::Instrumentalness, 0.5),
    below(Feature::Speechiness, 0.3),
];
const PARTY: &[Rule] = &[
    above(Feature::Danceability, 0.7),
    above(Feature::Energy, 0.7),
    above(Feature::Valence, 0.6),
];
const WORKOUT: &[Rule] = &[above(Feature::Energy, 0.8), above(Feature::Tempo, 120.0)];
const CHILL: &[Rule] = &[below(Feature::Energy, 0.5), above(Feature::Acousticness, 0.4)];

/// Random mood-matched picks from the corpus.
pub struct MoodRuleEngine<'s> {
    store: &'s FeatureStore,
}

impl<'s> MoodRuleEngine<'s> {
    #[must_use]
    pub fn new(store: &'s FeatureStore) -> Self {
        Self { store }
    }

    /// Every corpus track matching `mood`, in corpus order.
    #[must_use]
    pub fn matching(&self, mood: Mood) -> Vec<&'s Track> {
        let store: &'s FeatureStore = self.store;
        store.tracks().iter().filter(|t| mood.matches(t)).collect()
    }

    /// Sample up to `limit` tracks for a mood given by name.
    ///
    /// Names are matched case-insensitively. An unknown name is not an error:
    /// it is logged and yields an empty list. Callers that want to reject
    /// bad input up front can check against [`Mood::ALL`].
    pub fn recommend<R: Rng + ?Sized>(&self, mood: &str, limit: usize, rng: &mut R) -> Vec<Recommendation> {
        match mood.parse::<Mood>() {
            Ok(mood) => self.recommend_mood(mood, limit, rng),
            Err(e) => {
                warn!("{e}; returning no recommendations");
                Vec::new()
            }
        }
    }

    pub fn recommend_mood<R: Rng + ?Sized>(&self, mood: Mood, limit: usize, rng: &mut R) -> Vec<Recommendation> {
        let candidates = self.matching(mood);
        debug!("{} tracks match mood `{mood}`", candidates.len());

        sample(&candidates, limit, rng)
            .into_iter()
            .map(|t| Recommendation::plain(t.clone()))
            .collect()
    }
}
