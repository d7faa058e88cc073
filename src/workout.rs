//! Phased workout playlists.
//!
//! A workout is three consecutive segments: warm-up, peak and cool-down.
//! Each segment draws from a tempo and energy window; the peak window
//! depends on the chosen [`Intensity`]. The segment order is the playback
//! order and is never re-sorted.

use crate::store::{sample, FeatureStore};
use crate::track::Track;
use clap::ValueEnum;
use log::{debug, warn};
use rand::Rng;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Assumed average track length.
pub const AVERAGE_TRACK_MINUTES: f64 = 3.5;

/// Smallest playlist ever produced.
pub const MIN_TRACKS: usize = 5;

/// BPM added on each side of the tempo window when a phase comes up empty.
pub const TEMPO_RELAXATION: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Low,
    Medium,
    High,
}

impl Intensity {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Intensity::Low => "low",
            Intensity::Medium => "medium",
            Intensity::High => "high",
        }
    }

    #[must_use]
    fn label(self) -> &'static str {
        match self {
            Intensity::Low => "Low",
            Intensity::Medium => "Medium",
            Intensity::High => "High",
        }
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    WarmUp,
    Peak,
    CoolDown,
}

impl Phase {
    /// Playback order.
    pub const ORDER: [Phase; 3] = [Phase::WarmUp, Phase::Peak, Phase::CoolDown];

    /// Tempo and energy window for this phase at `intensity`.
    #[must_use]
    pub fn window(self, intensity: Intensity) -> PhaseWindow {
        match (self, intensity) {
            (Phase::WarmUp, _) => PhaseWindow::new(90.0, 120.0, 0.3, 0.7),
            (Phase::Peak, Intensity::Low) => PhaseWindow::new(120.0, 150.0, 0.6, 1.0),
            (Phase::Peak, Intensity::Medium) => PhaseWindow::new(130.0, 180.0, 0.7, 1.0),
            (Phase::Peak, Intensity::High) => PhaseWindow::new(140.0, 190.0, 0.8, 1.0),
            (Phase::CoolDown, _) => PhaseWindow::new(60.0, 100.0, 0.0, 0.5),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::WarmUp => "warm-up",
            Phase::Peak => "peak",
            Phase::CoolDown => "cool-down",
        })
    }
}

/// Inclusive tempo (BPM) and energy bounds. `energy: None` means any energy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhaseWindow {
    pub tempo: (f64, f64),
    pub energy: Option<(f64, f64)>,
}

impl PhaseWindow {
    #[must_use]
    pub const fn new(tempo_min: f64, tempo_max: f64, energy_min: f64, energy_max: f64) -> Self {
        Self {
            tempo: (tempo_min, tempo_max),
            energy: Some((energy_min, energy_max)),
        }
    }

    /// Wider tempo range, no energy constraint.
    #[must_use]
    pub fn relaxed(&self) -> Self {
        Self {
            tempo: (self.tempo.0 - TEMPO_RELAXATION, self.tempo.1 + TEMPO_RELAXATION),
            energy: None,
        }
    }

    #[must_use]
    pub fn contains(&self, track: &Track) -> bool {
        let tempo = track.features.tempo;
        let energy = track.features.energy;
        let (lo, hi) = self.tempo;
        (lo..=hi).contains(&tempo)
            && self.energy.map_or(true, |(e_lo, e_hi)| (e_lo..=e_hi).contains(&energy))
    }
}

/// One phase of a generated playlist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseSegment {
    pub phase: Phase,
    /// Whether the relaxed window had to be used.
    pub relaxed: bool,
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkoutPlaylist {
    pub name: String,
    pub duration_minutes: u32,
    pub intensity: Intensity,
    pub total_tracks: usize,
    pub segments: Vec<PhaseSegment>,
}

impl WorkoutPlaylist {
    /// All tracks in playback order.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.segments.iter().flat_map(|s| s.tracks.iter())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.iter().map(|s| s.tracks.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Number of tracks for a workout of `duration_minutes`.
#[must_use]
pub fn track_count(duration_minutes: u32) -> usize {
    let fitted = (f64::from(duration_minutes) / AVERAGE_TRACK_MINUTES).floor() as usize;
    fitted.max(MIN_TRACKS)
}

/// Split `total` into (warm-up, peak, cool-down) counts.
///
/// ```text
/// warm-up   = max(⌊0.2·total⌋, 1)
/// peak      = max(⌊0.6·total⌋, 3)
/// cool-down = max(total − warm-up − peak, 1)
/// ```
#[must_use]
pub fn phase_counts(total: usize) -> (usize, usize, usize) {
    let warm_up = (total * 2 / 10).max(1);
    let peak = (total * 6 / 10).max(3);
    let cool_down = total.saturating_sub(warm_up + peak).max(1);
    (warm_up, peak, cool_down)
}

pub struct WorkoutSequencer<'s> {
    store: &'s FeatureStore,
}

impl<'s> WorkoutSequencer<'s> {
    #[must_use]
    pub fn new(store: &'s FeatureStore) -> Self {
        Self { store }
    }

    /// Build a warm-up, peak, cool-down playlist.
    ///
    /// A phase with no track in its window retries once with the relaxed
    /// window; if that is empty too the phase stays short. A track appears at
    /// most once in the whole playlist.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        duration_minutes: u32,
        intensity: Intensity,
        rng: &mut R,
    ) -> WorkoutPlaylist {
        let total = track_count(duration_minutes);
        let (warm_up, peak, cool_down) = phase_counts(total);
        debug!("Workout of {duration_minutes} min: {warm_up}+{peak}+{cool_down} tracks");

        let mut used: HashSet<&str> = HashSet::new();
        let segments = Phase::ORDER
            .into_iter()
            .zip([warm_up, peak, cool_down])
            .map(|(phase, count)| {
                let (relaxed, picks) = self.fill_phase(phase, intensity, count, &used, rng);
                used.extend(picks.iter().copied().map(|t| t.track_id.as_str()));
                PhaseSegment {
                    phase,
                    relaxed,
                    tracks: picks.into_iter().cloned().collect(),
                }
            })
            .collect();

        WorkoutPlaylist {
            name: format!("My {} workout", intensity.label()),
            duration_minutes,
            intensity,
            total_tracks: total,
            segments,
        }
    }

    fn fill_phase<R: Rng + ?Sized>(
        &self,
        phase: Phase,
        intensity: Intensity,
        count: usize,
        used: &HashSet<&str>,
        rng: &mut R,
    ) -> (bool, Vec<&'s Track>) {
        let window = phase.window(intensity);
        let mut relaxed = false;
        let mut pool = self.candidates(&window, used);

        if pool.is_empty() {
            relaxed = true;
            pool = self.candidates(&window.relaxed(), used);
            if pool.is_empty() {
                warn!("No tracks available for the {phase} phase");
            } else {
                debug!("Relaxed {phase} window to {} candidates", pool.len());
            }
        }

        (relaxed, sample(&pool, count, rng))
    }

    fn candidates(&self, window: &PhaseWindow, used: &HashSet<&str>) -> Vec<&'s Track> {
        let store: &'s FeatureStore = self.store;
        store
            .tracks()
            .iter()
            .filter(|t| window.contains(t) && !used.contains(t.track_id.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{features, track};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Plenty of tracks for every window.
    fn gym_store() -> FeatureStore {
        let mut tracks = Vec::new();
        for i in 0..10 {
            tracks.push(track(&format!("w{i}"), "x", 50, features(0.5, 0.5, 101.0 + f64::from(i))));
            tracks.push(track(&format!("p{i}"), "x", 50, features(0.5, 0.9, 150.0 + f64::from(i))));
            tracks.push(track(&format!("c{i}"), "x", 50, features(0.5, 0.2, 70.0 + f64::from(i))));
        }
        FeatureStore::from_tracks(tracks)
    }

    #[test]
    fn test_track_count() {
        assert_eq!(track_count(0), 5);
        assert_eq!(track_count(10), 5);
        assert_eq!(track_count(35), 10);
        assert_eq!(track_count(60), 17);
    }

    #[test]
    fn test_phase_counts_sum_to_total() {
        assert_eq!(phase_counts(5), (1, 3, 1));
        assert_eq!(phase_counts(10), (2, 6, 2));
        for total in MIN_TRACKS..200 {
            let (w, p, c) = phase_counts(total);
            assert_eq!(w + p + c, total, "total {total}");
            assert!(w >= 1 && p >= 3 && c >= 1);
        }
    }

    #[test]
    fn test_phases_in_order_and_within_windows() {
        let store = gym_store();
        let mut rng = StdRng::seed_from_u64(3);
        let playlist = WorkoutSequencer::new(&store).generate(35, Intensity::Medium, &mut rng);

        assert_eq!(playlist.name, "My Medium workout");
        assert_eq!(playlist.len(), playlist.total_tracks);
        let phases: Vec<Phase> = playlist.segments.iter().map(|s| s.phase).collect();
        assert_eq!(phases, Phase::ORDER);

        for segment in &playlist.segments {
            let window = segment.phase.window(Intensity::Medium);
            assert!(!segment.relaxed);
            assert!(segment.tracks.iter().all(|t| window.contains(t)), "{}", segment.phase);
        }
        assert!(playlist.segments[0].tracks.iter().all(|t| t.track_id.starts_with('w')));
        assert!(playlist.segments[1].tracks.iter().all(|t| t.track_id.starts_with('p')));
        assert!(playlist.segments[2].tracks.iter().all(|t| t.track_id.starts_with('c')));
    }

    #[test]
    fn test_relaxes_empty_window() {
        // Nothing reaches 0.8 energy, and tempo 135 sits just outside 140-190.
        let store = FeatureStore::from_tracks(vec![
            track("almost", "x", 50, features(0.5, 0.4, 135.0)),
            track("w", "x", 50, features(0.5, 0.5, 100.0)),
            track("c", "x", 50, features(0.5, 0.2, 70.0)),
        ]);
        let mut rng = StdRng::seed_from_u64(0);
        let playlist = WorkoutSequencer::new(&store).generate(20, Intensity::High, &mut rng);

        let peak = &playlist.segments[1];
        assert!(peak.relaxed);
        assert_eq!(peak.tracks.len(), 1);
        assert_eq!(peak.tracks[0].track_id, "almost");
    }

    #[test]
    fn test_no_track_repeats() {
        // One track fits both warm-up and the relaxed cool-down window.
        let store = FeatureStore::from_tracks(vec![
            track("both", "x", 50, features(0.5, 0.5, 95.0)),
            track("peak", "x", 50, features(0.5, 0.9, 140.0)),
        ]);
        let mut rng = StdRng::seed_from_u64(0);
        let playlist = WorkoutSequencer::new(&store).generate(10, Intensity::Low, &mut rng);

        let ids: Vec<&str> = playlist.tracks().map(|t| t.track_id.as_str()).collect();
        let unique: HashSet<&str> = ids.iter().copied().collect();
        assert_eq!(ids.len(), unique.len());
    }

    #[test]
    fn test_empty_corpus() {
        let store = FeatureStore::default();
        let mut rng = StdRng::seed_from_u64(0);
        let playlist = WorkoutSequencer::new(&store).generate(30, Intensity::Low, &mut rng);
        assert!(playlist.is_empty());
        assert_eq!(playlist.segments.len(), 3);
    }
}
