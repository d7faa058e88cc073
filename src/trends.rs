//! Corpus-wide aggregates: genre popularity, feature statistics and
//! listening summaries.
//!
//! # Simulated series
//!
//! The corpus has no time dimension. [`TrendReport::simulated_trends`] is a
//! synthetic six-point series per top genre, produced by jittering the genre's
//! mean popularity. Every series carries `simulated: true` so it is never
//! mistaken for measured data.

use crate::features::Feature;
use crate::store::FeatureStore;
use crate::track::Track;
use log::debug;
use rand::Rng;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Genres listed in [`TrendReport::top_genres`].
pub const TOP_GENRES: usize = 10;
/// Genres that get a simulated series.
pub const SIMULATED_GENRES: usize = 5;
pub const SIMULATED_POINTS: usize = 6;
/// Maximum jitter, in popularity points, applied to each simulated point.
pub const SIMULATED_NOISE: f64 = 5.0;

/// Features averaged by [`TrendAnalyzer::listening_summary`].
pub const SUMMARY_FEATURES: [Feature; 7] = [
    Feature::Danceability,
    Feature::Energy,
    Feature::Valence,
    Feature::Acousticness,
    Feature::Instrumentalness,
    Feature::Speechiness,
    Feature::Tempo,
];

/// Basic descriptive statistics.
pub mod statistics {
    /// Arithmetic mean; `None` for no values.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Pearson correlation coefficient of two equally long samples.
    ///
    /// `None` when fewer than two pairs exist or either side has zero
    /// variance.
    #[must_use]
    pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
        if xs.len() != ys.len() || xs.len() < 2 {
            return None;
        }
        let mean_x = mean(xs)?;
        let mean_y = mean(ys)?;

        let (mut covariance, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
        for (x, y) in xs.iter().zip(ys) {
            let (dx, dy) = (x - mean_x, y - mean_y);
            covariance += dx * dy;
            var_x += dx * dx;
            var_y += dy * dy;
        }

        let denominator = (var_x * var_y).sqrt();
        if denominator == 0.0 || !denominator.is_finite() {
            return None;
        }
        Some((covariance / denominator).clamp(-1.0, 1.0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenrePopularity {
    pub genre: String,
    pub mean_popularity: f64,
    pub track_count: usize,
}

/// All genres ranked by mean popularity, highest first; ties by name.
#[must_use]
pub fn rank_genres_by_popularity(tracks: &[Track]) -> Vec<GenrePopularity> {
    let mut totals: BTreeMap<&str, (u64, usize)> = BTreeMap::new();
    for track in tracks.iter().filter(|t| !t.track_genre.trim().is_empty()) {
        let entry = totals.entry(track.track_genre.as_str()).or_default();
        entry.0 += u64::from(track.popularity);
        entry.1 += 1;
    }

    #[allow(clippy::cast_precision_loss)]
    let mut ranked: Vec<GenrePopularity> = totals
        .into_iter()
        .map(|(genre, (sum, count))| GenrePopularity {
            genre: genre.to_string(),
            mean_popularity: sum as f64 / count as f64,
            track_count: count,
        })
        .collect();

    // BTreeMap order already sorts by name; the stable sort keeps it for ties.
    ranked.sort_by(|a, b| b.mean_popularity.total_cmp(&a.mean_popularity));
    ranked
}

/// Mean popularity of explicit and clean tracks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExplicitSplit {
    pub explicit: Option<f64>,
    pub clean: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub label: String,
    pub popularity: f64,
}

/// Synthetic popularity series. Not derived from any timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatedSeries {
    pub genre: String,
    pub simulated: bool,
    pub points: Vec<TrendPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendReport {
    pub track_count: usize,
    pub top_genres: Vec<GenrePopularity>,
    pub feature_means: BTreeMap<Feature, f64>,
    /// Correlation of popularity with each feature; `None` where undefined.
    pub popularity_correlations: BTreeMap<Feature, Option<f64>>,
    pub explicit_popularity: ExplicitSplit,
    pub simulated_trends: Vec<SimulatedSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenreAnalytics {
    pub genre: String,
    pub track_count: usize,
    pub mean_popularity: f64,
    pub feature_means: BTreeMap<Feature, f64>,
    /// Share of explicit tracks, 0 to 1.
    pub explicit_ratio: f64,
    pub top_tracks: Vec<Track>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenreCount {
    pub genre: String,
    pub plays: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListeningSummary {
    pub total_plays: usize,
    pub top_genres: Vec<GenreCount>,
    pub feature_means: BTreeMap<Feature, f64>,
}

pub struct TrendAnalyzer<'s> {
    store: &'s FeatureStore,
}

impl<'s> TrendAnalyzer<'s> {
    #[must_use]
    pub fn new(store: &'s FeatureStore) -> Self {
        Self { store }
    }

    /// Full report over the corpus. `rng` only drives the simulated series.
    pub fn analyze<R: Rng + ?Sized>(&self, rng: &mut R) -> TrendReport {
        let tracks = self.store.tracks();
        let ranked = rank_genres_by_popularity(tracks);
        let popularity: Vec<f64> = tracks.iter().map(|t| f64::from(t.popularity)).collect();

        let mut feature_means = BTreeMap::new();
        let mut popularity_correlations = BTreeMap::new();
        for feature in Feature::ALL {
            let values: Vec<f64> = tracks.iter().map(|t| t.features.get(feature)).collect();
            if let Some(mean) = statistics::mean(&values) {
                feature_means.insert(feature, mean);
            }
            popularity_correlations.insert(feature, statistics::pearson(&popularity, &values));
        }

        let split = |explicit: bool| {
            let values: Vec<f64> = tracks
                .iter()
                .filter(|t| t.explicit == explicit)
                .map(|t| f64::from(t.popularity))
                .collect();
            statistics::mean(&values)
        };
        let explicit_popularity = ExplicitSplit {
            explicit: split(true),
            clean: split(false),
        };

        let simulated_trends = ranked
            .iter()
            .take(SIMULATED_GENRES)
            .map(|g| simulate_series(g, rng))
            .collect();

        debug!("Trend report over {} tracks, {} genres", tracks.len(), ranked.len());
        TrendReport {
            track_count: tracks.len(),
            top_genres: ranked.into_iter().take(TOP_GENRES).collect(),
            feature_means,
            popularity_correlations,
            explicit_popularity,
            simulated_trends,
        }
    }

    /// Statistics for one genre, matched case-insensitively.
    #[must_use]
    pub fn genre_analytics(&self, genre: &str) -> Option<GenreAnalytics> {
        let wanted = genre.trim().to_lowercase();
        let members: Vec<&Track> = self
            .store
            .tracks()
            .iter()
            .filter(|t| t.track_genre.to_lowercase() == wanted)
            .collect();
        let first = members.first()?;

        let popularity: Vec<f64> = members.iter().map(|t| f64::from(t.popularity)).collect();
        #[allow(clippy::cast_precision_loss)]
        let explicit_ratio = members.iter().filter(|t| t.explicit).count() as f64 / members.len() as f64;

        let feature_means = Feature::ALL
            .into_iter()
            .filter_map(|feature| {
                let values: Vec<f64> = members.iter().map(|t| t.features.get(feature)).collect();
                statistics::mean(&values).map(|m| (feature, m))
            })
            .collect();

        let mut top_tracks = members.clone();
        top_tracks.sort_by(|a, b| b.popularity.cmp(&a.popularity));

        Some(GenreAnalytics {
            genre: first.track_genre.clone(),
            track_count: members.len(),
            mean_popularity: statistics::mean(&popularity).unwrap_or(0.0),
            feature_means,
            explicit_ratio,
            top_tracks: top_tracks.into_iter().take(5).cloned().collect(),
        })
    }

    /// Summary of a listener's plays, given as track ids.
    ///
    /// Ids missing from the corpus count as plays but contribute no genre or
    /// feature data.
    #[must_use]
    pub fn listening_summary(&self, history: &[String]) -> ListeningSummary {
        let played: Vec<&Track> = history.iter().filter_map(|id| self.store.get_track(id)).collect();

        let mut plays: HashMap<&str, usize> = HashMap::new();
        for track in played.iter().filter(|t| !t.track_genre.trim().is_empty()) {
            *plays.entry(track.track_genre.as_str()).or_default() += 1;
        }
        let mut top_genres: Vec<GenreCount> = plays
            .into_iter()
            .map(|(genre, plays)| GenreCount {
                genre: genre.to_string(),
                plays,
            })
            .collect();
        top_genres.sort_by(|a, b| b.plays.cmp(&a.plays).then_with(|| a.genre.cmp(&b.genre)));
        top_genres.truncate(5);

        let feature_means = SUMMARY_FEATURES
            .into_iter()
            .filter_map(|feature| {
                let values: Vec<f64> = played.iter().map(|t| t.features.get(feature)).collect();
                statistics::mean(&values).map(|m| (feature, m))
            })
            .collect();

        ListeningSummary {
            total_plays: history.len(),
            top_genres,
            feature_means,
        }
    }
}

fn simulate_series<R: Rng + ?Sized>(genre: &GenrePopularity, rng: &mut R) -> SimulatedSeries {
    let points = (1..=SIMULATED_POINTS)
        .map(|month| {
            let noisy = genre.mean_popularity + rng.gen_range(-SIMULATED_NOISE..=SIMULATED_NOISE);
            TrendPoint {
                label: format!("month_{month}"),
                popularity: (noisy.clamp(0.0, 100.0) * 10.0).round() / 10.0,
            }
        })
        .collect();

    SimulatedSeries {
        genre: genre.genre.clone(),
        simulated: true,
        points,
    }
}

#[cfg(test)]
mod tests {
    use super::statistics::{mean, pearson};
    use super::*;
    use crate::store::tests::{features, track};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn store() -> FeatureStore {
        FeatureStore::from_tracks(vec![
            track("a", "pop", 80, features(0.9, 0.8, 120.0)),
            track("b", "pop", 60, features(0.7, 0.6, 110.0)),
            Track {
                explicit: true,
                ..track("c", "rap", 90, features(0.5, 0.9, 95.0))
            },
            track("d", "jazz", 20, features(0.3, 0.2, 80.0)),
            track("e", "", 99, features(0.1, 0.1, 60.0)),
        ])
    }

    #[test]
    fn test_mean_and_pearson() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), Some(2.0));

        let r = pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).expect("defined");
        assert!((r - 1.0).abs() < 1e-12);
        let r = pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).expect("defined");
        assert!((r + 1.0).abs() < 1e-12);

        assert_eq!(pearson(&[1.0, 2.0], &[5.0, 5.0]), None, "zero variance");
        assert_eq!(pearson(&[1.0], &[1.0]), None);
    }

    #[test]
    fn test_rank_genres_by_popularity() {
        let store = store();
        let ranked = rank_genres_by_popularity(store.tracks());
        let genres: Vec<&str> = ranked.iter().map(|g| g.genre.as_str()).collect();
        assert_eq!(genres, vec!["rap", "pop", "jazz"]);
        assert_eq!(ranked[1].mean_popularity, 70.0);
        assert_eq!(ranked[1].track_count, 2);
    }

    #[test]
    fn test_genre_ties_break_by_name() {
        let tracks = vec![
            track("1", "zydeco", 50, features(0.5, 0.5, 100.0)),
            track("2", "ambient", 50, features(0.5, 0.5, 100.0)),
        ];
        let ranked = rank_genres_by_popularity(&tracks);
        assert_eq!(ranked[0].genre, "ambient");
    }

    #[test]
    fn test_report_aggregates() {
        let store = store();
        let mut rng = StdRng::seed_from_u64(5);
        let report = TrendAnalyzer::new(&store).analyze(&mut rng);

        assert_eq!(report.track_count, 5);
        assert_eq!(report.feature_means[&Feature::Tempo], 93.0);
        assert_eq!(report.explicit_popularity.explicit, Some(90.0));
        assert_eq!(report.explicit_popularity.clean, Some(64.75));
        // Danceability is constant across the fixture.
        assert_eq!(report.popularity_correlations[&Feature::Danceability], None);
        assert!(report.popularity_correlations[&Feature::Energy].is_some());
    }

    #[test]
    fn test_simulated_series_is_labelled_and_bounded() {
        let store = store();
        let mut rng = StdRng::seed_from_u64(11);
        let report = TrendAnalyzer::new(&store).analyze(&mut rng);

        assert_eq!(report.simulated_trends.len(), 3);
        for series in &report.simulated_trends {
            assert!(series.simulated);
            assert_eq!(series.points.len(), SIMULATED_POINTS);
            assert_eq!(series.points[0].label, "month_1");
            let mean = report
                .top_genres
                .iter()
                .find(|g| g.genre == series.genre)
                .map(|g| g.mean_popularity)
                .expect("series genre is ranked");
            for point in &series.points {
                assert!((0.0..=100.0).contains(&point.popularity));
                assert!((point.popularity - mean).abs() <= SIMULATED_NOISE + 0.05);
            }
        }

        let json = serde_json::to_value(&report.simulated_trends[0]).expect("serializable");
        assert_eq!(json["simulated"], true);
    }

    #[test]
    fn test_genre_analytics() {
        let store = store();
        let analyzer = TrendAnalyzer::new(&store);

        let pop = analyzer.genre_analytics("POP").expect("pop exists");
        assert_eq!(pop.genre, "pop");
        assert_eq!(pop.track_count, 2);
        assert_eq!(pop.mean_popularity, 70.0);
        assert_eq!(pop.explicit_ratio, 0.0);
        assert_eq!(pop.top_tracks[0].track_id, "a");
        assert!((pop.feature_means[&Feature::Energy] - 0.7).abs() < 1e-12);

        assert!(analyzer.genre_analytics("polka").is_none());
    }

    #[test]
    fn test_listening_summary() {
        let store = store();
        let analyzer = TrendAnalyzer::new(&store);
        let history: Vec<String> = ["a", "b", "c", "a", "missing"].iter().map(|s| s.to_string()).collect();

        let summary = analyzer.listening_summary(&history);
        assert_eq!(summary.total_plays, 5);
        assert_eq!(
            summary.top_genres,
            vec![
                GenreCount { genre: "pop".to_string(), plays: 3 },
                GenreCount { genre: "rap".to_string(), plays: 1 },
            ]
        );
        assert_eq!(summary.feature_means.len(), SUMMARY_FEATURES.len());
        assert!(!summary.feature_means.contains_key(&Feature::Key));

        assert_eq!(analyzer.listening_summary(&[]), ListeningSummary::default());
    }

    #[test]
    fn test_empty_corpus_report() {
        let store = FeatureStore::default();
        let mut rng = StdRng::seed_from_u64(0);
        let report = TrendAnalyzer::new(&store).analyze(&mut rng);
        assert_eq!(report.track_count, 0);
        assert!(report.top_genres.is_empty());
        assert!(report.feature_means.is_empty());
        assert!(report.simulated_trends.is_empty());
        assert_eq!(report.explicit_popularity.explicit, None);
    }
}
