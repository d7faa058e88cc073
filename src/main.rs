//! Soundscope command-line entry point.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use soundscope::cli::{self, Command};
use soundscope::completion;
use soundscope::config::RuntimeConfig;
use soundscope::db;
use soundscope::hybrid::HybridRecommender;
use soundscope::mood::MoodRuleEngine;
use soundscope::recommendation::Recommendation;
use soundscope::remote::HttpVectorIndex;
use soundscope::similarity::SimilarityEngine;
use soundscope::store::FeatureStore;
use soundscope::target::{FeatureTarget, FeatureTargetRecommender};
use soundscope::track::{ListeningEvent, Track};
use soundscope::trends::TrendAnalyzer;
use soundscope::workout::WorkoutSequencer;
use std::path::Path;

/// Main entry point for the Soundscope application.
///
/// Initializes logging, parses command-line arguments and dispatches to the
/// engine components. Logging is controlled via `RUST_LOG`:
/// - `RUST_LOG=debug soundscope similar <id>` - Enable debug logging
/// - `RUST_LOG=soundscope::similarity=trace soundscope similar <id>` - Module-specific logging
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();
    let config = load_config(&args)?;
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let json = args.json;

    match args.command {
        Command::ImportTracks { csv } => {
            info!("Importing tracks from: {}", csv.display());
            let mut conn = db::connect(&config.db_path)?;
            let report = db::import_tracks_csv(&mut conn, &csv)?;
            println!(
                "Imported {} tracks ({} duplicates skipped, {} malformed rows)",
                report.inserted, report.duplicates, report.malformed
            );
        }
        Command::ImportHistory { csv } => {
            info!("Importing listening history from: {}", csv.display());
            let mut conn = db::connect(&config.db_path)?;
            let report = db::import_history_csv(&mut conn, &csv)?;
            println!(
                "Imported {} listening events ({} malformed rows)",
                report.inserted, report.malformed
            );
        }
        Command::Search { query, limit } => {
            let store = FeatureStore::load(&config.db_path);
            let hits: Vec<&Track> = store.search(&query, limit);
            emit(json, &hits, || print_tracks(&hits))?;
        }
        Command::Track { track_id } => {
            let store = FeatureStore::load(&config.db_path);
            match store.get_track(&track_id) {
                Some(track) => emit(json, track, || print_track_detail(track))?,
                None => {
                    warn!("Track not found: {track_id}");
                    emit(json, &Option::<Track>::None, || println!("Track not found: {track_id}"))?;
                }
            }
        }
        Command::Similar { track_id, limit, local } => {
            let store = FeatureStore::load(&config.db_path);
            let engine = similarity_engine(&store, &config, local);
            let recs = engine.recommend(&track_id, limit);
            emit(json, &recs, || print_recommendations(&recs))?;
        }
        Command::Mood { mood, limit } => {
            let store = FeatureStore::load(&config.db_path);
            let recs = MoodRuleEngine::new(&store).recommend(&mood, limit, &mut rng);
            emit(json, &recs, || print_recommendations(&recs))?;
        }
        Command::Custom { features, limit } => {
            let store = FeatureStore::load(&config.db_path);
            let target = features.unwrap_or_else(FeatureTarget::new);
            let recs = FeatureTargetRecommender::new(&store).recommend(&target, limit);
            emit(json, &recs, || print_recommendations(&recs))?;
        }
        Command::Personal { user_id, limit } => {
            let store = FeatureStore::load(&config.db_path);
            let (history, events) = load_listening(&config.db_path, &user_id);
            let engine = similarity_engine(&store, &config, false);
            let recs = HybridRecommender::new(&engine).recommend(&user_id, &history, &events, limit);
            emit(json, &recs, || print_recommendations(&recs))?;
        }
        Command::Workout { duration, intensity } => {
            let store = FeatureStore::load(&config.db_path);
            let playlist = WorkoutSequencer::new(&store).generate(duration, intensity, &mut rng);
            emit(json, &playlist, || {
                println!("{} ({} min, {} tracks)", playlist.name, duration, playlist.len());
                for segment in &playlist.segments {
                    let note = if segment.relaxed { " (relaxed)" } else { "" };
                    println!("\n{}{note}:", segment.phase);
                    for track in &segment.tracks {
                        println!(
                            "  {} - {}  [{:.0} BPM, energy {:.2}]",
                            track.artists, track.track_name, track.features.tempo, track.features.energy
                        );
                    }
                }
            })?;
        }
        Command::Genres => {
            let store = FeatureStore::load(&config.db_path);
            let genres = store.list_genres();
            emit(json, &genres, || genres.iter().for_each(|g| println!("{g}")))?;
        }
        Command::GenreTracks { genre, limit } => {
            let store = FeatureStore::load(&config.db_path);
            let tracks = store.tracks_by_genre(&genre, limit, &mut rng);
            emit(json, &tracks, || print_tracks(&tracks))?;
        }
        Command::GenreStats { genre } => {
            let store = FeatureStore::load(&config.db_path);
            let stats = TrendAnalyzer::new(&store).genre_analytics(&genre);
            emit(json, &stats, || match &stats {
                Some(stats) => {
                    println!(
                        "{}: {} tracks, mean popularity {:.1}, {:.0}% explicit",
                        stats.genre,
                        stats.track_count,
                        stats.mean_popularity,
                        stats.explicit_ratio * 100.0
                    );
                    for (feature, mean) in &stats.feature_means {
                        println!("  {feature:<17} {mean:.3}");
                    }
                    println!("Top tracks:");
                    for track in &stats.top_tracks {
                        println!("  [{:>3}] {} - {}", track.popularity, track.artists, track.track_name);
                    }
                }
                None => println!("Unknown genre: {genre}"),
            })?;
        }
        Command::Trends => {
            let store = FeatureStore::load(&config.db_path);
            let report = TrendAnalyzer::new(&store).analyze(&mut rng);
            emit(json, &report, || {
                println!("Top genres by mean popularity:");
                for g in &report.top_genres {
                    println!("  {:<20} {:>5.1}  ({} tracks)", g.genre, g.mean_popularity, g.track_count);
                }
                println!("\nPopularity correlation:");
                for (feature, r) in &report.popularity_correlations {
                    match r {
                        Some(r) => println!("  {feature:<17} {r:+.3}"),
                        None => println!("  {feature:<17}    n/a"),
                    }
                }
                let fmt = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}"));
                println!(
                    "\nMean popularity: explicit {}, clean {}",
                    fmt(report.explicit_popularity.explicit),
                    fmt(report.explicit_popularity.clean)
                );
                println!("\nSimulated monthly series (not measured data):");
                for series in &report.simulated_trends {
                    let points: Vec<String> = series.points.iter().map(|p| format!("{:.1}", p.popularity)).collect();
                    println!("  {:<20} {}", series.genre, points.join(" "));
                }
            })?;
        }
        Command::ListeningSummary { user_id } => {
            let store = FeatureStore::load(&config.db_path);
            let (history, _) = load_listening(&config.db_path, &user_id);
            let summary = TrendAnalyzer::new(&store).listening_summary(&history);
            emit(json, &summary, || {
                println!("{user_id}: {} plays", summary.total_plays);
                for g in &summary.top_genres {
                    println!("  {:<20} {}", g.genre, g.plays);
                }
                for (feature, mean) in &summary.feature_means {
                    println!("  {feature:<17} {mean:.3}");
                }
            })?;
        }
        Command::Completion { shell } => {
            print!("{}", completion::completion_script(shell, &mut cli::Args::command()));
        }
        Command::CompleteGenres { shell } => {
            completion::print_genre_completions_for_shell(&config.db_path, shell);
        }
    }

    Ok(())
}

/// Config file plus command-line/environment overrides.
///
/// With an explicit `--db` the data directory is optional.
fn load_config(args: &cli::Args) -> Result<RuntimeConfig> {
    let base = match RuntimeConfig::load() {
        Ok(config) => config,
        Err(e) => match &args.db {
            Some(path) => {
                debug!("Ignoring config file: {e:#}");
                RuntimeConfig::with_db_path(path.clone())
            }
            None => return Err(e).context("Could not determine the corpus location"),
        },
    };
    Ok(base.with_overrides(args.db.clone(), args.index_url.clone(), args.index_api_key.clone()))
}

fn similarity_engine<'s>(store: &'s FeatureStore, config: &RuntimeConfig, local_only: bool) -> SimilarityEngine<'s> {
    let Some(remote) = config.remote_index.as_ref().filter(|_| !local_only) else {
        return SimilarityEngine::new(store);
    };
    match HttpVectorIndex::new(remote) {
        Ok(index) => {
            debug!("Using remote index at {}", remote.endpoint);
            SimilarityEngine::with_remote(store, Box::new(index))
        }
        Err(e) => {
            warn!("Remote index unavailable ({e:#}); using local similarity");
            SimilarityEngine::new(store)
        }
    }
}

/// The user's own plays and the full history table. Degrades to empty.
fn load_listening(db_path: &Path, user_id: &str) -> (Vec<String>, Vec<ListeningEvent>) {
    let loaded = db::open_read_only(db_path).and_then(|conn| {
        let history = db::load_user_history(&conn, user_id)?;
        let events = db::load_history(&conn)?;
        Ok((history, events))
    });
    loaded.unwrap_or_else(|e| {
        warn!("Listening history unavailable: {e}");
        (Vec::new(), Vec::new())
    })
}

fn emit<T: Serialize + ?Sized>(json: bool, value: &T, human: impl FnOnce()) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
    } else {
        human();
    }
    Ok(())
}

fn print_tracks(tracks: &[&Track]) {
    if tracks.is_empty() {
        println!("No tracks found");
        return;
    }
    for track in tracks {
        println!(
            "{:<24} {} - {} [{}]",
            track.track_id, track.artists, track.track_name, track.track_genre
        );
    }
}

fn print_recommendations(recs: &[Recommendation]) {
    if recs.is_empty() {
        println!("No recommendations");
        return;
    }
    for (rank, rec) in recs.iter().enumerate() {
        let score = rec.score().map(|s| format!("{s:.3}")).unwrap_or_default();
        println!(
            "{:>3}. {:<6} {} - {} [{}]  {}",
            rank + 1,
            score,
            rec.track.artists,
            rec.track.track_name,
            rec.track.track_genre,
            rec.track.track_id
        );
    }
}

fn print_track_detail(track: &Track) {
    println!("{} - {}", track.artists, track.track_name);
    println!("  id:         {}", track.track_id);
    println!("  album:      {}", track.album_name);
    println!("  genre:      {}", track.track_genre);
    println!("  popularity: {}", track.popularity);
    println!("  duration:   {}:{:02}", track.duration_ms / 60_000, (track.duration_ms / 1000) % 60);
    println!("  explicit:   {}", track.explicit);
    for feature in soundscope::features::Feature::ALL {
        println!("  {:<17} {}", format!("{feature}:"), track.features.get(feature));
    }
}
