/// Background jobs launched by the UI
///
/// Each job takes owned handles so it can run inside `Task::perform`, does
/// its work and returns a single line for the status bar. Errors are mapped
/// to `ActionError` and shown the same way, nothing here panics.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::export::archive::{build_photo_archive, ArchiveError};
use crate::export::document::{DocumentRenderer, RenderError};
use crate::export::outbox::Outbox;
use crate::export::render_batch;
use crate::export::share::{save_files, share_or_save, ShareError, ShareOutcome, ShareSink};
use crate::selection::{bulk_delete, resolve};
use crate::state::data::ValveRecord;
use crate::state::form::ValidationError;
use crate::state::pending::PendingQueue;
use crate::state::store::{Store, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Share(#[from] ShareError),
    #[error("Las hojas seleccionadas ya no existen.")]
    NothingResolved,
}

pub type ActionResult = Result<String, ActionError>;

pub async fn load_all(store: Store) -> Result<Vec<ValveRecord>, StoreError> {
    store.get_all().await
}

pub async fn load_one(store: Store, serial: String) -> Result<ValveRecord, StoreError> {
    store.get(&serial).await
}

pub async fn pending_count(queue: PendingQueue) -> Result<usize, StoreError> {
    queue.len().await
}

/// Put sends interrupted by a previous run back in the queue
pub async fn recover_queue(queue: PendingQueue) -> Result<usize, StoreError> {
    queue.reset_interrupted().await
}

/// Resolve the selection, failing only when none of it still exists
async fn resolve_some(store: &Store, keys: &[String]) -> Result<Vec<ValveRecord>, ActionError> {
    let records = resolve(store, keys).await?;
    if records.is_empty() {
        return Err(ActionError::NothingResolved);
    }
    Ok(records)
}

pub async fn save(store: Store, record: ValveRecord) -> ActionResult {
    let serial = record.serial_number.clone();
    store.put(record).await?;
    Ok(format!("✅ Hoja {} guardada.", serial))
}

/// Save the form's sheet, then queue and send it
pub async fn save_and_send(store: Store, outbox: Outbox, record: ValveRecord) -> ActionResult {
    store.put(record.clone()).await?;
    let report = outbox.send(vec![record]).await?;
    Ok(report.summary())
}

/// Queue the selected sheets and send the whole queue
pub async fn send_selected(store: Store, outbox: Outbox, keys: Vec<String>) -> ActionResult {
    let records = resolve_some(&store, &keys).await?;
    let report = outbox.send(records).await?;
    Ok(report.summary())
}

pub async fn send_pending(outbox: Outbox) -> ActionResult {
    let report = outbox.flush().await?;
    if report.is_empty() {
        if report.skipped > 0 {
            return Ok("Ya hay un envío en curso.".to_string());
        }
        return Ok("No hay envíos pendientes.".to_string());
    }
    Ok(report.summary())
}

pub async fn delete(store: Store, keys: Vec<String>) -> ActionResult {
    let report = bulk_delete(&store, &keys).await;
    match report.failed.first() {
        None => Ok("🗑 Eliminadas correctamente.".to_string()),
        Some((serial, e)) => Ok(format!(
            "🗑 Eliminadas {}, {} con error ({}: {})",
            report.deleted,
            report.failed.len(),
            serial,
            e
        )),
    }
}

/// One PDF per selected sheet, written to `export_dir`
pub async fn generate_pdfs(
    store: Store,
    renderer: Arc<dyn DocumentRenderer>,
    export_dir: PathBuf,
    keys: Vec<String>,
) -> ActionResult {
    let records = resolve_some(&store, &keys).await?;
    let batch = render_batch(renderer, records).await;
    if batch.files.is_empty() {
        if let Some(e) = batch.failed.first().cloned() {
            return Err(e.into());
        }
    }

    let dir = export_dir.clone();
    let files = batch.files;
    let written = tokio::task::spawn_blocking(move || save_files(&dir, &files))
        .await
        .map_err(|e| StoreError::Unavailable(format!("Task join error: {}", e)))??;

    info!("📄 Wrote {} PDF(s) to {}", written.len(), export_dir.display());
    let mut notice = format!(
        "📄 {} PDF(s) guardados en {}",
        written.len(),
        export_dir.display()
    );
    if !batch.failed.is_empty() {
        notice.push_str(&format!(" ({} con error)", batch.failed.len()));
    }
    Ok(notice)
}

/// Render the selection and share it, or save it when sharing is unsupported
pub async fn share(
    store: Store,
    renderer: Arc<dyn DocumentRenderer>,
    sink: Arc<dyn ShareSink>,
    export_dir: PathBuf,
    keys: Vec<String>,
) -> ActionResult {
    let records = resolve_some(&store, &keys).await?;
    let batch = render_batch(renderer, records).await;
    if batch.files.is_empty() {
        if let Some(e) = batch.failed.first().cloned() {
            return Err(e.into());
        }
    }

    let files = batch.files;
    let outcome = tokio::task::spawn_blocking(move || share_or_save(sink.as_ref(), &export_dir, &files))
        .await
        .map_err(|e| ShareError::Failed(format!("Task join error: {}", e)))??;

    Ok(match outcome {
        ShareOutcome::Shared(count) => format!("📤 {} hoja(s) compartidas.", count),
        ShareOutcome::Saved { dir, count } => format!(
            "⚠️ El sistema no soporta compartir archivos. {} PDF(s) guardados en {}",
            count,
            dir.display()
        ),
    })
}

/// Zip the photos of the selection into `export_dir/fotos_valvulas.zip`
pub async fn export_photos(store: Store, export_dir: PathBuf, keys: Vec<String>) -> ActionResult {
    let records = resolve_some(&store, &keys).await?;

    let result = tokio::task::spawn_blocking(move || {
        let archive = build_photo_archive(&records)?;
        save_files(&export_dir, std::slice::from_ref(&archive.file))?;
        Ok::<_, ActionError>((archive.photo_count, export_dir.join(&archive.file.name)))
    })
    .await
    .map_err(|e| ArchiveError::Zip(format!("Task join error: {}", e)))?;

    let (count, path) = result?;
    Ok(format!("📸 Se exportaron {} fotos en {}", count, path.display()))
}
