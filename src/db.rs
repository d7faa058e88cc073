//! SQLite access to the corpus and listening history.
//!
//! Both tables are owned by external collaborators. This module only creates
//! the schema, bulk-imports CSV exports into it, and reads rows back in
//! insertion order.

use crate::error::EngineError;
use crate::track::{AudioFeatures, ListeningEvent, Track};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use rusqlite::{params, Connection, OpenFlags};
use serde::{Deserialize, Deserializer};
use std::path::Path;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS tracks (
        track_id         TEXT    PRIMARY KEY,
        track_name       TEXT    NOT NULL DEFAULT '',
        artists          TEXT    NOT NULL DEFAULT '',
        album_name       TEXT    NOT NULL DEFAULT '',
        track_genre      TEXT    NOT NULL DEFAULT '',
        popularity       INTEGER NOT NULL DEFAULT 0,
        duration_ms      INTEGER NOT NULL DEFAULT 0,
        explicit         INTEGER NOT NULL DEFAULT 0,
        danceability     REAL    NOT NULL,
        energy           REAL    NOT NULL,
        key              INTEGER NOT NULL,
        loudness         REAL    NOT NULL,
        mode             INTEGER NOT NULL,
        speechiness      REAL    NOT NULL,
        acousticness     REAL    NOT NULL,
        instrumentalness REAL    NOT NULL,
        liveness         REAL    NOT NULL,
        valence          REAL    NOT NULL,
        tempo            REAL    NOT NULL,
        time_signature   INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS listening_history (
        id        INTEGER PRIMARY KEY,
        user_id   TEXT    NOT NULL,
        track_id  TEXT    NOT NULL,
        played_at INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_history_user ON listening_history(user_id);
";

const SELECT_TRACKS: &str = "
    SELECT track_id, track_name, artists, album_name, track_genre, popularity,
           duration_ms, explicit, danceability, energy, key, loudness, mode,
           speechiness, acousticness, instrumentalness, liveness, valence,
           tempo, time_signature
    FROM tracks
    ORDER BY rowid";

/// Outcome of a bulk import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: usize,
    /// Rows whose `track_id` was already present.
    pub duplicates: usize,
    /// Rows that could not be parsed.
    pub malformed: usize,
}

/// Open (and create if needed) the database at `path`, with the schema in
/// place.
pub fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open corpus database at {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Open an existing database without ever creating it.
pub fn open_read_only(path: &Path) -> std::result::Result<Connection, EngineError> {
    if !path.exists() {
        return Err(EngineError::DataUnavailable {
            path: path.to_path_buf(),
            reason: "file does not exist".to_string(),
        });
    }
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .context("Invalid SQL when creating the corpus schema")?;
    Ok(())
}

/// Insert already-parsed tracks. Duplicate ids are ignored.
pub fn insert_tracks(conn: &mut Connection, tracks: &[Track]) -> Result<ImportReport> {
    let tx = conn.transaction()?;
    let mut report = ImportReport::default();

    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO tracks VALUES
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
              ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
        )?;

        for track in tracks {
            let f = &track.features;
            let changed = stmt
                .execute(params![
                    track.track_id,
                    track.track_name,
                    track.artists,
                    track.album_name,
                    track.track_genre,
                    i64::from(track.popularity),
                    i64::try_from(track.duration_ms).unwrap_or(i64::MAX),
                    track.explicit,
                    f.danceability,
                    f.energy,
                    f.key,
                    f.loudness,
                    f.mode,
                    f.speechiness,
                    f.acousticness,
                    f.instrumentalness,
                    f.liveness,
                    f.valence,
                    f.tempo,
                    f.time_signature,
                ])
                .with_context(|| format!("Failed to INSERT track `{}`", track.track_id))?;

            if changed == 0 {
                debug!("Skipping duplicate track id `{}`", track.track_id);
                report.duplicates += 1;
            } else {
                report.inserted += 1;
            }
        }
    }

    tx.commit().context("Committing track import failed")?;
    Ok(report)
}

/// Append listening events in the given order.
pub fn insert_events(conn: &mut Connection, events: &[ListeningEvent]) -> Result<usize> {
    let tx = conn.transaction()?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO listening_history (user_id, track_id, played_at) VALUES (?1, ?2, ?3)",
        )?;
        for event in events {
            stmt.execute(params![event.user_id, event.track_id, event.timestamp])
                .with_context(|| format!("Failed to INSERT listening event {event:?}"))?;
        }
    }

    tx.commit().context("Committing history import failed")?;
    Ok(events.len())
}

/// Import a corpus CSV export (one row per track, header required).
///
/// Malformed rows are logged and counted rather than aborting the import.
pub fn import_tracks_csv(conn: &mut Connection, csv_path: &Path) -> Result<ImportReport> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open track CSV {}", csv_path.display()))?;

    let mut tracks = Vec::new();
    let mut malformed = 0;
    for (line, record) in reader.deserialize::<TrackRow>().enumerate() {
        match record {
            Ok(row) => tracks.push(Track::from(row)),
            Err(e) => {
                warn!("Skipping malformed track row {}: {e}", line + 2);
                malformed += 1;
            }
        }
    }

    let mut report = insert_tracks(conn, &tracks)?;
    report.malformed = malformed;
    info!(
        "Imported {} tracks from {} ({} duplicates, {} malformed)",
        report.inserted,
        csv_path.display(),
        report.duplicates,
        report.malformed
    );
    Ok(report)
}

/// Import a listening-history CSV export with `user_id,track_id[,timestamp]`.
pub fn import_history_csv(conn: &mut Connection, csv_path: &Path) -> Result<ImportReport> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open history CSV {}", csv_path.display()))?;

    let mut events = Vec::new();
    let mut malformed = 0;
    for (line, record) in reader.deserialize::<ListeningEvent>().enumerate() {
        match record {
            Ok(event) => events.push(event),
            Err(e) => {
                warn!("Skipping malformed history row {}: {e}", line + 2);
                malformed += 1;
            }
        }
    }

    let inserted = insert_events(conn, &events)?;
    info!("Imported {inserted} listening events from {}", csv_path.display());
    Ok(ImportReport {
        inserted,
        duplicates: 0,
        malformed,
    })
}

/// Every track, in insertion order.
pub fn load_tracks(conn: &Connection) -> std::result::Result<Vec<Track>, EngineError> {
    let mut stmt = conn.prepare(SELECT_TRACKS)?;
    let rows = stmt.query_map([], |row| {
        let popularity: i64 = row.get(5)?;
        let duration_ms: i64 = row.get(6)?;
        Ok(Track {
            track_id: row.get(0)?,
            track_name: row.get(1)?,
            artists: row.get(2)?,
            album_name: row.get(3)?,
            track_genre: row.get(4)?,
            popularity: u32::try_from(popularity.clamp(0, 100)).unwrap_or_default(),
            duration_ms: u64::try_from(duration_ms).unwrap_or_default(),
            explicit: row.get(7)?,
            features: AudioFeatures {
                danceability: row.get(8)?,
                energy: row.get(9)?,
                key: row.get(10)?,
                loudness: row.get(11)?,
                mode: row.get(12)?,
                speechiness: row.get(13)?,
                acousticness: row.get(14)?,
                instrumentalness: row.get(15)?,
                liveness: row.get(16)?,
                valence: row.get(17)?,
                tempo: row.get(18)?,
                time_signature: row.get(19)?,
            },
        })
    })?;

    // Could use collect, but this keeps the per-row error visible in logs.
    let mut tracks = Vec::new();
    for track in rows {
        tracks.push(track?);
    }
    Ok(tracks)
}

/// The full cross-user history table, oldest first.
pub fn load_history(conn: &Connection) -> std::result::Result<Vec<ListeningEvent>, EngineError> {
    let mut stmt = conn.prepare(
        "SELECT user_id, track_id, played_at FROM listening_history ORDER BY played_at, id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(ListeningEvent {
            user_id: row.get(0)?,
            track_id: row.get(1)?,
            timestamp: row.get(2)?,
        })
    })?;

    let mut events = Vec::new();
    for event in rows {
        events.push(event?);
    }
    Ok(events)
}

/// Track ids played by `user_id`, oldest first.
pub fn load_user_history(
    conn: &Connection,
    user_id: &str,
) -> std::result::Result<Vec<String>, EngineError> {
    let mut stmt = conn.prepare(
        "SELECT track_id FROM listening_history WHERE user_id = ?1 ORDER BY played_at, id",
    )?;
    let rows = stmt.query_map([user_id], |row| row.get(0))?;

    let mut history = Vec::new();
    for track_id in rows {
        history.push(track_id?);
    }
    Ok(history)
}

/// CSV shape of a corpus row. Exports from dataframe tools write flags as
/// `True`/`False` and sometimes integers as `5.0`, so those columns are
/// parsed leniently. `nan` and `inf` are rejected everywhere.
#[derive(Debug, Deserialize)]
struct TrackRow {
    track_id: String,
    #[serde(default)]
    track_name: String,
    #[serde(default)]
    artists: String,
    #[serde(default)]
    album_name: String,
    #[serde(default)]
    track_genre: String,
    #[serde(deserialize_with = "lenient_int")]
    popularity: i64,
    #[serde(deserialize_with = "lenient_int")]
    duration_ms: i64,
    #[serde(deserialize_with = "flag")]
    explicit: bool,
    #[serde(deserialize_with = "finite")]
    danceability: f64,
    #[serde(deserialize_with = "finite")]
    energy: f64,
    #[serde(deserialize_with = "lenient_int")]
    key: i64,
    #[serde(deserialize_with = "finite")]
    loudness: f64,
    #[serde(deserialize_with = "lenient_int")]
    mode: i64,
    #[serde(deserialize_with = "finite")]
    speechiness: f64,
    #[serde(deserialize_with = "finite")]
    acousticness: f64,
    #[serde(deserialize_with = "finite")]
    instrumentalness: f64,
    #[serde(deserialize_with = "finite")]
    liveness: f64,
    #[serde(deserialize_with = "finite")]
    valence: f64,
    #[serde(deserialize_with = "finite")]
    tempo: f64,
    #[serde(deserialize_with = "lenient_int")]
    time_signature: i64,
}

impl From<TrackRow> for Track {
    fn from(row: TrackRow) -> Self {
        let small = |v: i64| i32::try_from(v).unwrap_or_default();
        Self {
            track_id: row.track_id,
            track_name: row.track_name,
            artists: row.artists,
            album_name: row.album_name,
            track_genre: row.track_genre,
            popularity: u32::try_from(row.popularity.clamp(0, 100)).unwrap_or_default(),
            duration_ms: u64::try_from(row.duration_ms).unwrap_or_default(),
            explicit: row.explicit,
            features: AudioFeatures {
                danceability: row.danceability,
                energy: row.energy,
                key: small(row.key),
                loudness: row.loudness,
                mode: small(row.mode),
                speechiness: row.speechiness,
                acousticness: row.acousticness,
                instrumentalness: row.instrumentalness,
                liveness: row.liveness,
                valence: row.valence,
                tempo: row.tempo,
                time_signature: small(row.time_signature),
            },
        }
    }
}

fn lenient_int<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim();
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| {
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(|v| v.round() as i64)
        })
        .ok_or_else(|| serde::de::Error::custom(format!("invalid integer `{trimmed}`")))
}

fn finite<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(serde::de::Error::custom(format!("non-finite value `{value}`")))
    }
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        other => Err(serde::de::Error::custom(format!("invalid boolean `{other}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "track_id,track_name,artists,album_name,track_genre,popularity,duration_ms,explicit,danceability,energy,key,loudness,mode,speechiness,acousticness,instrumentalness,liveness,valence,tempo,time_signature";

    fn write_csv(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).expect("create csv");
        writeln!(file, "{body}").expect("write csv");
        path
    }

    #[test]
    fn test_import_and_load_tracks_in_order() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let csv = write_csv(
            &dir,
            "tracks.csv",
            &format!(
                "{HEADER}\n\
                 b,Second,Artist B,Album,rock,50,200000,False,0.5,0.6,5.0,-6.0,1,0.05,0.1,0.0,0.1,0.7,120.0,4\n\
                 a,First,Artist A,Album,pop,70,180000,True,0.7,0.8,2,-4.5,0,0.04,0.2,0.0,0.2,0.9,128.0,4\n\
                 a,Dupe,Artist A,Album,pop,70,180000,True,0.7,0.8,2,-4.5,0,0.04,0.2,0.0,0.2,0.9,128.0,4\n\
                 c,Broken,Artist C,Album,pop,not-a-number,1,False,0.1,0.1,1,-1,1,0.1,0.1,0.1,0.1,0.1,90,4"
            ),
        );

        let mut conn = connect(&dir.path().join("corpus.db"))?;
        let report = import_tracks_csv(&mut conn, &csv)?;
        assert_eq!(
            report,
            ImportReport {
                inserted: 2,
                duplicates: 1,
                malformed: 1
            }
        );

        let tracks = load_tracks(&conn)?;
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].track_id, "b");
        assert_eq!(tracks[0].features.key, 5);
        assert!(!tracks[0].explicit);
        assert_eq!(tracks[1].track_name, "First");
        assert!(tracks[1].explicit);
        Ok(())
    }

    #[test]
    fn test_non_finite_values_are_malformed() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let csv = write_csv(
            &dir,
            "tracks.csv",
            &format!(
                "{HEADER}\n\
                 ok,Fine,Artist,Album,pop,50,200000,False,0.5,0.6,5,-6.0,1,0.05,0.1,0.0,0.1,0.7,120.0,4\n\
                 n,NaN Dance,Artist,Album,pop,50,200000,False,nan,0.6,5,-6.0,1,0.05,0.1,0.0,0.1,0.7,120.0,4\n\
                 i,Inf Tempo,Artist,Album,pop,50,200000,False,0.5,0.6,5,-6.0,1,0.05,0.1,0.0,0.1,0.7,inf,4\n\
                 p,NaN Popularity,Artist,Album,pop,NaN,200000,False,0.5,0.6,5,-6.0,1,0.05,0.1,0.0,0.1,0.7,120.0,4"
            ),
        );

        let mut conn = connect(&dir.path().join("corpus.db"))?;
        let report = import_tracks_csv(&mut conn, &csv)?;
        assert_eq!(
            report,
            ImportReport {
                inserted: 1,
                duplicates: 0,
                malformed: 3
            }
        );

        let tracks = load_tracks(&conn)?;
        assert_eq!(tracks.len(), 1);
        assert!(tracks[0].features.tempo.is_finite());
        Ok(())
    }

    #[test]
    fn test_history_round_trip_orders_by_time() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let csv = write_csv(
            &dir,
            "history.csv",
            "user_id,track_id,timestamp\nu1,b,20\nu1,a,10\nu2,a,15",
        );

        let mut conn = connect(&dir.path().join("corpus.db"))?;
        let report = import_history_csv(&mut conn, &csv)?;
        assert_eq!(report.inserted, 3);

        assert_eq!(load_user_history(&conn, "u1")?, vec!["a", "b"]);
        let all = load_history(&conn)?;
        assert_eq!(all.len(), 3);
        assert_eq!(all[1], ListeningEvent::new("u2", "a", 15));
        Ok(())
    }

    #[test]
    fn test_open_read_only_missing_file() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let missing = dir.path().join("nope.db");
        let err = open_read_only(&missing).expect_err("missing corpus must fail");
        assert!(matches!(err, EngineError::DataUnavailable { .. }));
        assert!(!missing.exists(), "read-only open must not create the file");
    }
}
