use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use contracts::{Drive, EngineConfig, TriggerEvent, SCHEMA_VERSION_V1};
use drive_core::{DriveRegistry, TriggerLog};
use rusqlite::{params, Connection};
use tracing::warn;

#[derive(Debug)]
pub enum PersistenceError {
    Sqlite(rusqlite::Error),
    Serde(serde_json::Error),
    Io(std::io::Error),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
            Self::Serde(err) => write!(f, "serde error: {err}"),
            Self::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<rusqlite::Error> for PersistenceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

impl From<std::io::Error> for PersistenceError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// What `load` had to do beyond reading rows back: first-run bootstrap,
/// re-created or repaired drives, rows it could not use at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecoveryReport {
    /// True when the store held no drive rows at all.
    pub bootstrapped: bool,
    pub recreated_drives: Vec<String>,
    pub repaired_drives: Vec<String>,
    pub dropped_rows: Vec<String>,
    pub dropped_events: usize,
}

impl RecoveryReport {
    pub fn is_clean(&self) -> bool {
        self.repaired_drives.is_empty() && self.dropped_rows.is_empty() && self.dropped_events == 0
    }
}

#[derive(Debug)]
pub struct SqliteStateStore {
    conn: Connection,
}

impl SqliteStateStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    /// Opens `path`, quarantining the file and starting fresh when sqlite
    /// refuses to read it as a database. Drive state is reconstructible from
    /// config, so an unreadable store never blocks the engine.
    pub fn open_or_recover(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        match Self::open(path) {
            Ok(store) => Ok(store),
            Err(err) if is_not_a_database(&err) => {
                let quarantine = quarantine_path(path);
                warn!(
                    path = %path.display(),
                    quarantined = %quarantine.display(),
                    "state file is not a readable database, starting over"
                );
                std::fs::rename(path, &quarantine)?;
                Self::open(path)
            }
            Err(err) => Err(err),
        }
    }

    /// Upserts every drive and appends events not yet present, in one
    /// transaction. Events already stored under the same event_id are
    /// skipped, so replaying a save is harmless.
    pub fn save(
        &mut self,
        registry: &DriveRegistry,
        new_events: &[TriggerEvent],
        now: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let tx = self.conn.transaction()?;

        for drive in registry.iter() {
            let payload_json = serde_json::to_string(drive)?;
            tx.execute(
                "INSERT INTO drives (name, schema_version, payload_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(name) DO UPDATE SET
                    schema_version = excluded.schema_version,
                    payload_json = excluded.payload_json,
                    updated_at = excluded.updated_at",
                params![
                    drive.name.as_str(),
                    SCHEMA_VERSION_V1,
                    payload_json,
                    now.to_rfc3339(),
                ],
            )?;
        }

        for event in new_events {
            let payload_json = serde_json::to_string(event)?;
            tx.execute(
                "INSERT OR IGNORE INTO trigger_events (event_id, drive_name, fired_at, payload_json)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    event.event_id.as_str(),
                    event.drive_name.as_str(),
                    event.fired_at.to_rfc3339(),
                    payload_json,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Reads the full drive map and trigger log back, repairing as it goes:
    /// a drive row that fails validation is replaced from its configured
    /// spec, a row with no spec to fall back on is deleted, and configured
    /// drives missing entirely are re-created at zero pressure. Event rows
    /// that no longer parse are skipped but left on disk.
    pub fn load(
        &self,
        config: &EngineConfig,
    ) -> Result<(DriveRegistry, TriggerLog, RecoveryReport), PersistenceError> {
        let mut report = RecoveryReport::default();
        let mut registry = DriveRegistry::new();

        let mut row_count = 0_usize;
        {
            let mut stmt = self
                .conn
                .prepare("SELECT name, schema_version, payload_json FROM drives ORDER BY name ASC")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;

            for row in rows {
                let (name, schema_version, payload) = row?;
                row_count += 1;
                match recover_drive_row(&name, &schema_version, &payload, config) {
                    RowOutcome::Valid(drive) => registry.replace(drive),
                    RowOutcome::Repaired(drive, why) => {
                        warn!(drive = %name, why = %why, "replacing persisted drive with configured defaults");
                        report.repaired_drives.push(name);
                        registry.replace(drive);
                    }
                    RowOutcome::Dropped(why) => {
                        warn!(drive = %name, why = %why, "dropping unrecoverable drive row");
                        report.dropped_rows.push(name);
                    }
                }
            }
        }
        for name in &report.dropped_rows {
            self.conn
                .execute("DELETE FROM drives WHERE name = ?1", params![name.as_str()])?;
        }
        report.bootstrapped = row_count == 0;
        report.recreated_drives = registry.ensure_configured(config);

        let mut events = Vec::new();
        {
            let mut stmt = self
                .conn
                .prepare("SELECT payload_json FROM trigger_events ORDER BY seq ASC")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

            for row in rows {
                let payload = row?;
                match serde_json::from_str::<TriggerEvent>(&payload) {
                    Ok(event) => events.push(event),
                    Err(err) => {
                        warn!(error = %err, "skipping unreadable trigger event row");
                        report.dropped_events += 1;
                    }
                }
            }
        }

        Ok((registry, TriggerLog::from_events(events), report))
    }

    fn configure(&mut self) -> Result<(), PersistenceError> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        self.conn
            .busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(())
    }

    fn migrate(&mut self) -> Result<(), PersistenceError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS drives (
                name TEXT PRIMARY KEY,
                schema_version TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS trigger_events (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id TEXT NOT NULL UNIQUE,
                drive_name TEXT NOT NULL,
                fired_at TEXT NOT NULL,
                payload_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_trigger_events_drive_fired
                ON trigger_events(drive_name, fired_at);
            ",
        )?;

        self.conn.execute(
            "INSERT OR IGNORE INTO schema_migrations(version, name, applied_at)
             VALUES(1, 'initial_v1', ?1)",
            params![Utc::now().to_rfc3339()],
        )?;

        Ok(())
    }
}

fn is_not_a_database(err: &PersistenceError) -> bool {
    matches!(
        err,
        PersistenceError::Sqlite(rusqlite::Error::SqliteFailure(code, _))
            if code.code == rusqlite::ErrorCode::NotADatabase
    )
}

fn quarantine_path(path: &Path) -> PathBuf {
    path.with_extension(format!("corrupt-{}", Utc::now().timestamp_millis()))
}

enum RowOutcome {
    Valid(Drive),
    Repaired(Drive, String),
    Dropped(String),
}

/// One drive row, validated. Anything out of range falls back to the
/// configured spec for that name; without a spec the row is unusable.
fn recover_drive_row(
    name: &str,
    schema_version: &str,
    payload: &str,
    config: &EngineConfig,
) -> RowOutcome {
    let fallback = |why: String| match config.spec_for(name) {
        Some(spec) => RowOutcome::Repaired(spec.to_drive(), why),
        None => RowOutcome::Dropped(why),
    };

    if schema_version != SCHEMA_VERSION_V1 {
        return fallback(format!("unsupported schema_version {schema_version}"));
    }

    let drive = match serde_json::from_str::<Drive>(payload) {
        Ok(drive) => drive,
        Err(err) => return fallback(format!("unreadable payload: {err}")),
    };

    if drive.name != name {
        return fallback(format!("payload is for {} but filed under {name}", drive.name));
    }
    if !drive.pressure.is_finite() || drive.pressure < 0.0 {
        return fallback(format!("pressure {} out of range", drive.pressure));
    }
    if !drive.threshold.is_finite() || drive.threshold <= 0.0 {
        return fallback(format!("threshold {} out of range", drive.threshold));
    }
    if !drive.gain_rate.is_finite() || drive.gain_rate < 0.0 {
        return fallback(format!("gain_rate {} out of range", drive.gain_rate));
    }
    if !drive.decay_rate.is_finite() || drive.decay_rate < 0.0 {
        return fallback(format!("decay_rate {} out of range", drive.decay_rate));
    }

    RowOutcome::Valid(drive)
}
