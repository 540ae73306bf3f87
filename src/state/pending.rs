/// Outbound queue for sheets the user asked to send
///
/// Lives in the same database as the catalog (`pendientes` table). Items are
/// keyed by `(serie, created_at)`, so re-sending an unchanged sheet does not
/// queue it twice while a newer save of the same serial gets its own entry.

use chrono::Utc;
use rusqlite::params;
use tracing::{debug, info};

use super::data::{PendingSend, SendStatus, ValveRecord};
use super::store::{record_from_row, StoreError, Store, RECORD_COLUMNS};
use crate::photo::Photo;

/// Handle to the pending-send table
#[derive(Debug, Clone)]
pub struct PendingQueue {
    store: Store,
}

impl PendingQueue {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Queue a sheet for sending. Queuing the same `(serie, created_at)` again
    /// refreshes the payload but keeps its place and attempt count.
    pub async fn enqueue(&self, record: ValveRecord) -> Result<(), StoreError> {
        let enqueued_at = Utc::now().to_rfc3339();
        self.store
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO pendientes (
                        serie, cliente, tag, marca, modelo, tamano, set_presion,
                        ubicacion, fecha, obs, foto, foto_placa, created_at,
                        status, attempts, enqueued_at
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 'queued', 0, ?14)
                     ON CONFLICT(serie, created_at) DO UPDATE SET
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
                        foto_placa = excluded.foto_placa",
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
                        enqueued_at,
                    ],
                )?;
                info!("📤 Queued sheet {} for sending", record.serial_number);
                Ok(())
            })
            .await
    }

    /// Everything in the queue, oldest first
    pub async fn list(&self) -> Result<Vec<PendingSend>, StoreError> {
        self.store
            .with_conn(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {}, status, attempts, last_error, enqueued_at
                     FROM pendientes
                     ORDER BY enqueued_at ASC, rowid ASC",
                    RECORD_COLUMNS
                ))?;
                let rows = stmt.query_map([], |row| {
                    let record = record_from_row(row, 0);
                    let status: String = row.get(13)?;
                    let attempts: u32 = row.get(14)?;
                    let last_error: Option<String> = row.get(15)?;
                    let enqueued_at: String = row.get(16)?;
                    Ok(record.map(|record| PendingSend {
                        record,
                        status: SendStatus::parse(&status),
                        attempts,
                        last_error,
                        enqueued_at,
                    }))
                })?;

                let mut items = Vec::new();
                for row in rows {
                    items.push(row??);
                }
                Ok(items)
            })
            .await
    }

    pub async fn len(&self) -> Result<usize, StoreError> {
        self.store
            .with_conn(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM pendientes", [], |row| row.get(0))?;
                Ok(usize::try_from(count).unwrap_or(0))
            })
            .await
    }

    /// Claim a queued item: move it to `Sending` and count the attempt.
    /// Returns false when the item is gone or another pass already holds it.
    pub async fn mark_sending(&self, serial: &str, created_at: &str) -> Result<bool, StoreError> {
        let (serial, created_at) = (serial.to_string(), created_at.to_string());
        self.store
            .with_conn(move |conn| {
                let claimed = conn.execute(
                    "UPDATE pendientes
                     SET status = 'sending', attempts = attempts + 1
                     WHERE serie = ?1 AND created_at = ?2 AND status = 'queued'",
                    params![serial, created_at],
                )?;
                if claimed == 0 {
                    debug!("{} ({}) not claimable, skipping", serial, created_at);
                }
                Ok(claimed > 0)
            })
            .await
    }

    /// A failed send goes back to `Queued` with the error kept for display
    pub async fn mark_failed(
        &self,
        serial: &str,
        created_at: &str,
        error: &str,
    ) -> Result<(), StoreError> {
        let (serial, created_at, error) =
            (serial.to_string(), created_at.to_string(), error.to_string());
        self.store
            .with_conn(move |conn| {
                conn.execute(
                    "UPDATE pendientes
                     SET status = 'queued', last_error = ?3
                     WHERE serie = ?1 AND created_at = ?2",
                    params![serial, created_at, error],
                )?;
                Ok(())
            })
            .await
    }

    /// Drop a delivered item. Unknown keys are ignored.
    pub async fn remove(&self, serial: &str, created_at: &str) -> Result<(), StoreError> {
        let (serial, created_at) = (serial.to_string(), created_at.to_string());
        self.store
            .with_conn(move |conn| {
                conn.execute(
                    "DELETE FROM pendientes WHERE serie = ?1 AND created_at = ?2",
                    params![serial, created_at],
                )?;
                debug!("Removed {} ({}) from queue", serial, created_at);
                Ok(())
            })
            .await
    }

    /// Items left in `Sending` by a run that never finished go back to `Queued`
    pub async fn reset_interrupted(&self) -> Result<usize, StoreError> {
        self.store
            .with_conn(|conn| {
                let reset = conn.execute(
                    "UPDATE pendientes SET status = 'queued' WHERE status = 'sending'",
                    [],
                )?;
                if reset > 0 {
                    info!("🔄 Reset {} interrupted sends to queued", reset);
                }
                Ok(reset)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::sample_record;
    use crate::state::store::temp_store;

    #[tokio::test]
    async fn test_enqueue_and_remove_by_composite_key() {
        let (_dir, store) = temp_store();
        let queue = PendingQueue::new(store);

        let first = sample_record("SN-1");
        let mut resaved = sample_record("SN-1");
        resaved.created_at = "2024-05-02T10:00:00+00:00".to_string();

        queue.enqueue(first.clone()).await.unwrap();
        queue.enqueue(resaved.clone()).await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 2);

        queue
            .remove(&first.serial_number, &first.created_at)
            .await
            .unwrap();

        let left = queue.list().await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].record, resaved);
        assert_eq!(left[0].status, SendStatus::Queued);
    }

    #[tokio::test]
    async fn test_enqueue_same_key_does_not_duplicate() {
        let (_dir, store) = temp_store();
        let queue = PendingQueue::new(store);
        let record = sample_record("SN-1");

        queue.enqueue(record.clone()).await.unwrap();
        queue.enqueue(record).await.unwrap();

        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_queue_is_independent_from_catalog() {
        let (_dir, store) = temp_store();
        let queue = PendingQueue::new(store.clone());
        let record = sample_record("SN-1");

        store.put(record.clone()).await.unwrap();
        queue.enqueue(record).await.unwrap();
        store.delete("SN-1").await.unwrap();

        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let (_dir, store) = temp_store();
        let queue = PendingQueue::new(store);
        let record = sample_record("SN-1");
        queue.enqueue(record.clone()).await.unwrap();

        assert!(queue
            .mark_sending(&record.serial_number, &record.created_at)
            .await
            .unwrap());
        let item = &queue.list().await.unwrap()[0];
        assert_eq!(item.status, SendStatus::Sending);
        assert_eq!(item.attempts, 1);

        // Already in flight, a second claim must lose
        assert!(!queue
            .mark_sending(&record.serial_number, &record.created_at)
            .await
            .unwrap());
        assert_eq!(queue.list().await.unwrap()[0].attempts, 1);

        queue
            .mark_failed(&record.serial_number, &record.created_at, "sin conexión")
            .await
            .unwrap();
        let item = &queue.list().await.unwrap()[0];
        assert_eq!(item.status, SendStatus::Queued);
        assert_eq!(item.last_error.as_deref(), Some("sin conexión"));
    }

    #[tokio::test]
    async fn test_reset_interrupted() {
        let (_dir, store) = temp_store();
        let queue = PendingQueue::new(store);
        let record = sample_record("SN-1");
        queue.enqueue(record.clone()).await.unwrap();
        queue
            .mark_sending(&record.serial_number, &record.created_at)
            .await
            .unwrap();

        assert_eq!(queue.reset_interrupted().await.unwrap(), 1);
        assert_eq!(queue.list().await.unwrap()[0].status, SendStatus::Queued);
    }
}
