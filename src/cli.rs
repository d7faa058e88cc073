//! # Command-Line Interface Module
//!
//! Clap derive definitions for the `soundscope` binary.
//!
//! ## Commands
//!
//! - `import-tracks` / `import-history`: load CSV exports into the corpus database
//! - `search`, `track`, `genres`, `genre-tracks`: browse the corpus
//! - `similar`, `mood`, `custom`, `personal`: recommendations
//! - `workout`: phased workout playlist
//! - `trends`, `genre-stats`, `listening-summary`: aggregates
//!
//! ## Examples
//!
//! ```bash
//! soundscope import-tracks dataset.csv
//! soundscope similar 5SuOikwiRyPMVoIQDJUgSV --limit 10
//! soundscope --seed 7 mood happy
//! soundscope custom "energy=0.9,tempo=128"
//! soundscope workout 45 --intensity high
//! ```

use crate::target::FeatureTarget;
use crate::workout::Intensity;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Top-level arguments. Global flags apply to every subcommand.
#[derive(Parser, Debug)]
#[command(name = "soundscope")]
#[command(about = "Soundscope: audio-feature music recommendations, moods & workout playlists")]
#[command(version)]
pub struct Args {
    /// Corpus database to use instead of the default data directory
    #[arg(long, global = true, env = "SOUNDSCOPE_DB", value_hint = clap::ValueHint::FilePath)]
    pub db: Option<PathBuf>,

    /// Base URL of a remote vector index used for similarity queries
    #[arg(long, global = true, env = "SOUNDSCOPE_INDEX_URL")]
    pub index_url: Option<String>,

    /// API key sent to the remote vector index
    #[arg(long, global = true, env = "SOUNDSCOPE_INDEX_API_KEY", hide_env_values = true)]
    pub index_api_key: Option<String>,

    /// Seed for random sampling, for reproducible output
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import a track corpus CSV export
    ///
    /// The CSV needs a header with the track fields (track_id, track_name,
    /// artists, album_name, track_genre, popularity, duration_ms, explicit)
    /// and the twelve audio features. Rows whose track_id already exists are
    /// skipped.
    ImportTracks {
        /// Path to the CSV file
        #[arg(value_hint = clap::ValueHint::FilePath)]
        csv: PathBuf,
    },

    /// Import a listening-history CSV export (user_id, track_id, timestamp)
    ImportHistory {
        /// Path to the CSV file
        #[arg(value_hint = clap::ValueHint::FilePath)]
        csv: PathBuf,
    },

    /// Search tracks by name or artist
    ///
    /// Case-insensitive substring match, results in corpus order.
    Search {
        query: String,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Show a single track
    Track { track_id: String },

    /// Tracks that sound like a seed track
    ///
    /// Ranks the corpus by cosine similarity of normalized audio features.
    /// When a remote index is configured it is tried first; after its first
    /// failure all queries are answered locally.
    Similar {
        track_id: String,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
        /// Skip the remote index even if one is configured
        #[arg(long)]
        local: bool,
    },

    /// Random tracks matching a mood
    ///
    /// Moods: happy, sad, energetic, calm, focused, party, workout, chill.
    /// An unknown mood prints nothing.
    Mood {
        #[arg(value_hint = clap::ValueHint::Other)]
        mood: String,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Tracks closest to a described feature profile
    ///
    /// Features are given as comma-separated `name=value` pairs using raw
    /// units (e.g. `energy=0.8,tempo=128`). Unlisted features are neutral.
    Custom {
        /// Feature profile, e.g. "energy=0.8,valence=0.6"
        features: Option<FeatureTarget>,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Personalized picks from a user's listening history
    ///
    /// Blends what similar listeners played with tracks that sound like the
    /// user's most recent play. Users without history get popular tracks
    /// from the most popular genres.
    Personal {
        user_id: String,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Build a warm-up, peak and cool-down workout playlist
    Workout {
        /// Workout length in minutes
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        duration: u32,
        #[arg(short, long, value_enum, default_value_t = Intensity::Medium)]
        intensity: Intensity,
    },

    /// List all genres
    Genres,

    /// Random tracks from one genre
    GenreTracks {
        #[arg(value_hint = clap::ValueHint::Other)]
        genre: String,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Statistics for one genre
    GenreStats {
        #[arg(value_hint = clap::ValueHint::Other)]
        genre: String,
    },

    /// Corpus-wide popularity and feature trends
    ///
    /// The monthly series in this report are simulated and labelled so.
    Trends,

    /// Summary of a user's listening history
    ListeningSummary { user_id: String },

    /// Generate shell completions
    ///
    /// Usage: soundscope completion bash > ~/.local/share/bash-completion/completions/soundscope
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },

    /// List genres for completion (hidden command)
    #[command(hide = true)]
    CompleteGenres {
        /// Format for this shell
        #[arg(long)]
        shell: Option<Shell>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Feature;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_custom_profile() {
        let args = Args::try_parse_from(["soundscope", "custom", "energy=0.9,tempo=128", "-l", "5"])
            .expect("valid args");
        match args.command {
            Command::Custom { features, limit } => {
                let features = features.expect("profile given");
                assert_eq!(features.get(Feature::Energy), Some(0.9));
                assert_eq!(limit, 5);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from(["soundscope", "mood", "happy", "--seed", "3", "--json"])
            .expect("valid args");
        assert_eq!(args.seed, Some(3));
        assert!(args.json);
    }

    #[test]
    fn test_workout_rejects_zero_minutes() {
        assert!(Args::try_parse_from(["soundscope", "workout", "0"]).is_err());
        let args = Args::try_parse_from(["soundscope", "workout", "30", "-i", "high"]).expect("valid");
        assert!(matches!(
            args.command,
            Command::Workout { duration: 30, intensity: Intensity::High }
        ));
    }
}
