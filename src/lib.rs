//! Audio-feature music recommendations.
//!
//! Soundscope loads a track corpus once, normalizes every track's twelve
//! audio features against frozen corpus-wide bounds, and answers
//! recommendation queries from that immutable state.
//!
//! Core modules:
//! - [`store`] - The corpus, its normalized vectors and lookups
//! - [`similarity`] - Cosine nearest neighbours, optional remote index with a circuit breaker
//! - [`mood`] - Rule-based mood filtering
//! - [`target`] - Recommendations toward a feature profile
//! - [`hybrid`] - Collaborative + content blend over listening history
//! - [`workout`] - Phased workout playlists
//! - [`trends`] - Genre and feature aggregates
//!
//! ### Supporting Modules
//!
//! - [`features`] / [`track`] - Record and vector types
//! - [`db`] - SQLite schema, CSV import and loading
//! - [`remote`] - HTTP client for a hosted vector index
//! - [`config`] - Data directory and runtime settings
//! - [`cli`] / [`completion`] - Command-line interface
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use soundscope::mood::MoodRuleEngine;
//! use soundscope::similarity::SimilarityEngine;
//! use soundscope::store::FeatureStore;
//!
//! let store = FeatureStore::load(&soundscope::config::get_db_path()?);
//!
//! let similar = SimilarityEngine::new(&store).recommend("5SuOikwiRyPMVoIQDJUgSV", 10);
//! for rec in &similar {
//!     println!("{} ({:.3})", rec.track.track_name, rec.similarity_score.unwrap_or_default());
//! }
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let happy = MoodRuleEngine::new(&store).recommend("happy", 5, &mut rng);
//! println!("{} happy tracks", happy.len());
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Recommendation operations do not return errors. A missing corpus, an
//! unknown track id or mood, and a failing remote index all degrade to an
//! empty (or locally computed) result and a log line. Import and
//! configuration functions return `anyhow::Result`.

pub mod cli;
pub mod completion;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod hybrid;
pub mod mood;
pub mod recommendation;
pub mod remote;
pub mod similarity;
pub mod store;
pub mod target;
pub mod track;
pub mod trends;
pub mod workout;
