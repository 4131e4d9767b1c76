use crate::curve::Curve;
use crate::error::ProviderError;
use crate::provider::TrajectoryProvider;
use crate::trajectory::{Trajectory, TrajectoryPoint};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::path::Path;

/// SQLite-based trajectory provider.
///
/// Stores datasets as one row per sample (positions as a JSON array) plus
/// computed curves keyed by dataset and curve name. Creates the schema on
/// first use.
#[derive(Debug)]
pub struct SqliteTrajectoryProvider {
    conn: Connection,
}

impl SqliteTrajectoryProvider {
    /// Opens (or creates) a file-based database.
    pub fn new<P: AsRef<Path>>(db_path: P) -> SqliteResult<Self> {
        let conn = Connection::open(db_path)?;
        let provider = SqliteTrajectoryProvider { conn };
        provider.ensure_schema()?;
        Ok(provider)
    }

    /// Creates a provider backed by an in-memory database.
    pub fn new_in_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        let provider = SqliteTrajectoryProvider { conn };
        provider.ensure_schema()?;
        Ok(provider)
    }

    fn ensure_schema(&self) -> SqliteResult<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS datasets (
                name TEXT PRIMARY KEY,
                n_tracks INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS samples (
                dataset TEXT NOT NULL,
                track INTEGER NOT NULL,
                seq INTEGER NOT NULL,
                t REAL NOT NULL,
                position TEXT NOT NULL,
                PRIMARY KEY (dataset, track, seq)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_samples_dataset ON samples(dataset)",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS curves (
                dataset TEXT NOT NULL,
                name TEXT NOT NULL,
                curve TEXT NOT NULL,
                PRIMARY KEY (dataset, name)
            )",
            [],
        )?;

        Ok(())
    }

    fn table_exists(&self, table_name: &str) -> SqliteResult<bool> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name=?1")?;
        stmt.exists([table_name])
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Replaces the stored tracks of `dataset` in a single transaction.
    pub fn store_tracks(&mut self, dataset: &str, tracks: &[Trajectory]) -> Result<(), ProviderError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM samples WHERE dataset = ?1", [dataset])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO samples (dataset, track, seq, t, position) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (track_idx, track) in tracks.iter().enumerate() {
                for (seq, point) in track.points().iter().enumerate() {
                    let position = serde_json::to_string(&point.position)?;
                    insert.execute(params![
                        dataset,
                        track_idx as i64,
                        seq as i64,
                        point.t,
                        position
                    ])?;
                }
            }
        }
        tx.execute(
            "INSERT OR REPLACE INTO datasets (name, n_tracks) VALUES (?1, ?2)",
            params![dataset, tracks.len() as i64],
        )?;
        tx.commit()?;

        log::info!("Stored {} tracks for dataset '{}'", tracks.len(), dataset);
        Ok(())
    }

    /// Saves a computed curve as JSON under `(dataset, name)`.
    pub fn store_curve(&self, dataset: &str, name: &str, curve: &Curve) -> Result<(), ProviderError> {
        let json = curve.to_json()?;
        self.conn.execute(
            "INSERT OR REPLACE INTO curves (dataset, name, curve) VALUES (?1, ?2, ?3)",
            params![dataset, name, json],
        )?;
        Ok(())
    }

    /// Loads a curve stored with [`store_curve`](Self::store_curve), if any.
    pub fn load_curve(&self, dataset: &str, name: &str) -> Result<Option<Curve>, ProviderError> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT curve FROM curves WHERE dataset = ?1 AND name = ?2",
                params![dataset, name],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

impl TrajectoryProvider for SqliteTrajectoryProvider {
    fn load_tracks(&self, dataset: &str) -> Result<Vec<Trajectory>, ProviderError> {
        let n_tracks: Option<i64> = self
            .conn
            .query_row(
                "SELECT n_tracks FROM datasets WHERE name = ?1",
                [dataset],
                |row| row.get(0),
            )
            .optional()?;
        let n_tracks = n_tracks.ok_or_else(|| ProviderError::DatasetNotFound(dataset.to_string()))?;

        let mut stmt = self.conn.prepare(
            "SELECT track, t, position FROM samples WHERE dataset = ?1 ORDER BY track, seq",
        )?;
        let rows = stmt.query_map([dataset], |row| {
            let track: i64 = row.get(0)?;
            let t: f64 = row.get(1)?;
            let position: String = row.get(2)?;
            Ok((track, t, position))
        })?;

        let mut grouped: Vec<Vec<TrajectoryPoint>> = vec![Vec::new(); n_tracks.max(0) as usize];
        for row_result in rows {
            let (track, t, position) = row_result?;
            let position: Vec<f64> = serde_json::from_str(&position)?;
            let slot = grouped.get_mut(track as usize).ok_or_else(|| {
                ProviderError::Malformed(format!(
                    "sample references track {} but dataset '{}' has {} tracks",
                    track, dataset, n_tracks
                ))
            })?;
            slot.push(TrajectoryPoint::new(t, position));
        }

        let tracks = grouped
            .into_iter()
            .map(|points| {
                Trajectory::new(points).map_err(|e| ProviderError::Malformed(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        log::info!("Loaded {} tracks from dataset '{}'", tracks.len(), dataset);
        Ok(tracks)
    }
}
