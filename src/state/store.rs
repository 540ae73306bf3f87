use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::data::ValveRecord;
use crate::photo::Photo;

/// Bumped whenever the table layout changes. A database with any other
/// version is wiped and recreated, there are no migrations.
pub(crate) const SCHEMA_VERSION: i64 = 2;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The database could not be opened, read or written (missing dir, disk full, locked...)
    #[error("almacenamiento no disponible: {0}")]
    Unavailable(String),
    #[error("no existe la hoja {0}")]
    NotFound(String),
    /// A stored row could not be turned back into a record
    #[error("registro dañado: {0}")]
    Corrupt(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Unavailable(format!("Task join error: {}", e))
    }
}

/// The sheet catalog, keyed by serial number
///
/// Only the database path is held. Every operation runs on the blocking pool
/// with its own connection, so a `Store` is cheap to clone and can be moved
/// into any background task.
#[derive(Clone)]
pub struct Store {
    db_path: PathBuf,
}

impl Store {
    /// Open (or create) the database at `db_path` and make sure the schema is current
    pub fn open(db_path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!(
                    "no se pudo crear {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = open_connection(&db_path)?;
        init_schema(&conn)?;

        info!("📁 Database initialized at: {}", db_path.display());

        Ok(Store { db_path })
    }

    /// Get the path to the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Run `job` against a fresh connection on the blocking pool
    pub(crate) async fn with_conn<T, F>(&self, job: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = open_connection(&db_path)?;
            job(&mut conn)
        })
        .await?
    }

    /// Insert a sheet, or replace the one with the same serial number
    pub async fn put(&self, record: ValveRecord) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO hojas (
                    serie, cliente, tag, marca, modelo, tamano, set_presion,
                    ubicacion, fecha, obs, foto, foto_placa, created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(serie) DO UPDATE SET
                    cliente = excluded.cliente,
                    tag = excluded.tag,
                    marca = excluded.marca,
                    modelo = excluded.modelo,
                    tamano = excluded.tamano,
                    set_presion = excluded.set_presion,
                    ubicacion = excluded.ubicacion,
                    fecha = excluded.fecha,
                    obs = excluded.obs,
                    foto = excluded.foto,
                    foto_placa = excluded.foto_placa,
                    created_at = excluded.created_at",
                params![
                    record.serial_number,
                    record.client,
                    record.tag,
                    record.brand,
                    record.model,
                    record.size,
                    record.pressure_set,
                    record.location,
                    record.date,
                    record.observations,
                    record.photo_valve.as_ref().map(Photo::as_data_uri),
                    record.photo_plate.as_ref().map(Photo::as_data_uri),
                    record.created_at,
                ],
            )?;
            debug!("💾 Saved sheet {}", record.serial_number);
            Ok(())
        })
        .await
    }

    /// All sheets, most recent first
    pub async fn get_all(&self) -> Result<Vec<ValveRecord>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM hojas ORDER BY created_at DESC, serie ASC",
                RECORD_COLUMNS
            ))?;
            let rows = stmt.query_map([], |row| Ok(record_from_row(row, 0)))?;

            let mut records = Vec::new();
            for row in rows {
                records.push(row??);
            }
            Ok(records)
        })
        .await
    }

    /// One sheet by serial number
    pub async fn get(&self, serial: &str) -> Result<ValveRecord, StoreError> {
        let serial = serial.to_string();
        self.with_conn(move |conn| {
            let found = conn
                .query_row(
                    &format!("SELECT {} FROM hojas WHERE serie = ?1", RECORD_COLUMNS),
                    [&serial],
                    |row| Ok(record_from_row(row, 0)),
                )
                .optional()?;

            match found {
                Some(record) => record,
                None => Err(StoreError::NotFound(serial)),
            }
        })
        .await
    }

    /// Remove a sheet. Removing a serial that is not stored is not an error.
    pub async fn delete(&self, serial: &str) -> Result<(), StoreError> {
        let serial = serial.to_string();
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM hojas WHERE serie = ?1", [&serial])?;
            if removed == 0 {
                debug!("Delete of unknown sheet {} ignored", serial);
            } else {
                info!("🗑 Deleted sheet {}", serial);
            }
            Ok(())
        })
        .await
    }

    /// Number of stored sheets
    pub async fn count(&self) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM hojas", [], |row| row.get(0))?;
            Ok(count)
        })
        .await
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("db_path", &self.db_path)
            .finish()
    }
}

/// Column list shared by every query that materializes a `ValveRecord`
pub(crate) const RECORD_COLUMNS: &str = "serie, cliente, tag, marca, modelo, tamano, set_presion, \
     ubicacion, fecha, obs, foto, foto_placa, created_at";

/// Read a record starting at column `offset` (laid out as `RECORD_COLUMNS`)
pub(crate) fn record_from_row(row: &Row<'_>, offset: usize) -> Result<ValveRecord, StoreError> {
    let photo = |idx: usize| -> Result<Option<Photo>, StoreError> {
        let raw: Option<String> = row.get(offset + idx)?;
        raw.map(|uri| {
            Photo::from_data_uri(uri).map_err(|e| StoreError::Corrupt(e.to_string()))
        })
        .transpose()
    };

    Ok(ValveRecord {
        serial_number: row.get(offset)?,
        client: row.get(offset + 1)?,
        tag: row.get(offset + 2)?,
        brand: row.get(offset + 3)?,
        model: row.get(offset + 4)?,
        size: row.get(offset + 5)?,
        pressure_set: row.get(offset + 6)?,
        location: row.get(offset + 7)?,
        date: row.get(offset + 8)?,
        observations: row.get(offset + 9)?,
        photo_valve: photo(10)?,
        photo_plate: photo(11)?,
        created_at: row.get(offset + 12)?,
    })
}

pub(crate) fn open_connection(db_path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

/// Create the tables, recreating them when the on-disk schema is from another version
fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if version != SCHEMA_VERSION {
        if version != 0 {
            warn!(
                "⚠️  Schema version {} found, expected {}. Recreating tables.",
                version, SCHEMA_VERSION
            );
        }
        conn.execute_batch(
            "DROP TABLE IF EXISTS hojas;
             DROP TABLE IF EXISTS pendientes;",
        )?;
    }

    // Sheets keyed by serial number. Photos are inline data URIs.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS hojas (
            serie           TEXT PRIMARY KEY NOT NULL,
            cliente         TEXT NOT NULL,
            tag             TEXT NOT NULL,
            marca           TEXT NOT NULL,
            modelo          TEXT NOT NULL,
            tamano          TEXT NOT NULL,
            set_presion     TEXT NOT NULL,
            ubicacion       TEXT NOT NULL,
            fecha           TEXT NOT NULL,
            obs             TEXT NOT NULL,
            foto            TEXT,
            foto_placa      TEXT,
            created_at      TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_hojas_created_at
         ON hojas(created_at DESC)",
        [],
    )?;

    // Outbound queue, one row per (serie, created_at)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS pendientes (
            serie           TEXT NOT NULL,
            cliente         TEXT NOT NULL,
            tag             TEXT NOT NULL,
            marca           TEXT NOT NULL,
            modelo          TEXT NOT NULL,
            tamano          TEXT NOT NULL,
            set_presion     TEXT NOT NULL,
            ubicacion       TEXT NOT NULL,
            fecha           TEXT NOT NULL,
            obs             TEXT NOT NULL,
            foto            TEXT,
            foto_placa      TEXT,
            created_at      TEXT NOT NULL,
            status          TEXT NOT NULL DEFAULT 'queued',
            attempts        INTEGER NOT NULL DEFAULT 0,
            last_error      TEXT,
            enqueued_at     TEXT NOT NULL,
            PRIMARY KEY (serie, created_at)
        )",
        [],
    )?;

    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

    debug!("✅ Database schema initialized");
    Ok(())
}

#[cfg(test)]
pub(crate) fn temp_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("valvulas.db")).unwrap();
    (dir, store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photo::test_photo;
    use crate::state::data::sample_record;
    use crate::state::form::ValveForm;

    #[tokio::test]
    async fn test_put_then_get_round_trip() {
        let (_dir, store) = temp_store();
        let mut record = sample_record("SN-1");
        record.photo_valve = Some(test_photo(16, 12));

        store.put(record.clone()).await.unwrap();

        assert_eq!(store.get("SN-1").await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_put_same_key_replaces() {
        let (_dir, store) = temp_store();
        let first = sample_record("SN-1");
        let mut second = sample_record("SN-1");
        second.client = "Globex".to_string();
        second.observations = "Fuga en el asiento".to_string();

        store.put(first).await.unwrap();
        store.put(second.clone()).await.unwrap();

        let all = store.get_all().await.unwrap();
        assert_eq!(all, vec![second]);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (_dir, store) = temp_store();
        assert_eq!(
            store.get("SN-404").await,
            Err(StoreError::NotFound("SN-404".to_string()))
        );
    }

    #[tokio::test]
    async fn test_delete_absent_key_is_noop() {
        let (_dir, store) = temp_store();
        store.put(sample_record("SN-1")).await.unwrap();
        let before = store.get_all().await.unwrap();

        store.delete("SN-404").await.unwrap();

        assert_eq!(store.get_all().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_get_all_most_recent_first() {
        let (_dir, store) = temp_store();
        let mut old = sample_record("SN-OLD");
        old.created_at = "2024-01-01T08:00:00+00:00".to_string();
        let mut new = sample_record("SN-NEW");
        new.created_at = "2024-06-01T08:00:00+00:00".to_string();

        store.put(old).await.unwrap();
        store.put(new).await.unwrap();

        let serials: Vec<_> = store
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.serial_number)
            .collect();
        assert_eq!(serials, vec!["SN-NEW", "SN-OLD"]);
    }

    #[tokio::test]
    async fn test_submit_form_without_photos() {
        let (_dir, store) = temp_store();
        let mut form = ValveForm::new();
        form.serial_number = "SN-100".to_string();
        form.client = "Acme".to_string();

        store
            .put(form.to_record(chrono::Utc::now()).unwrap())
            .await
            .unwrap();

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].serial_number, "SN-100");
        assert_eq!(all[0].client, "Acme");
        assert_eq!(all[0].photo_count(), 0);
        assert!(!all[0].created_at.is_empty());
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("valvulas.db");

        let store = Store::open(path.clone()).unwrap();
        store.put(sample_record("SN-1")).await.unwrap();
        drop(store);

        let reopened = Store::open(path).unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_other_schema_version_is_recreated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("valvulas.db");

        let store = Store::open(path.clone()).unwrap();
        store.put(sample_record("SN-1")).await.unwrap();
        {
            let conn = Connection::open(&path).unwrap();
            conn.pragma_update(None, "user_version", 1).unwrap();
        }

        let reopened = Store::open(path).unwrap();
        assert_eq!(reopened.count().await.unwrap(), 0);
    }

    #[test]
    fn test_open_in_unwritable_location_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let result = Store::open(blocker.join("valvulas.db"));
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
