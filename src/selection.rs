/// Selection of saved sheets and the bulk operations that act on it
///
/// The UI keeps a `Selection` of serial numbers in the order the user ticked
/// them. Bulk actions turn that selection into records through `resolve`,
/// which silently drops serials deleted in the meantime.

use thiserror::Error;
use tracing::{debug, warn};

use crate::state::data::ValveRecord;
use crate::state::store::{Store, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("Selecciona al menos una hoja.")]
    Empty,
}

/// Operations that can run over the ticked sheets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    GeneratePdf,
    Delete,
    Share,
    ExportPhotos,
    Send,
}

impl BulkAction {
    pub fn label(self) -> &'static str {
        match self {
            BulkAction::GeneratePdf => "PDF seleccionadas",
            BulkAction::Delete => "Eliminar seleccionadas",
            BulkAction::Share => "Compartir seleccionadas",
            BulkAction::ExportPhotos => "Exportar fotos",
            BulkAction::Send => "Enviar seleccionadas",
        }
    }
}

/// Ordered set of ticked serial numbers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    keys: Vec<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tick or untick a serial. Ticking twice keeps the first position.
    pub fn toggle(&mut self, key: &str, checked: bool) {
        if checked {
            if !self.contains(key) {
                self.keys.push(key.to_string());
            }
        } else {
            self.keys.retain(|k| k != key);
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    /// Forget serials that are no longer in the displayed list
    pub fn retain_existing(&mut self, records: &[ValveRecord]) {
        self.keys
            .retain(|k| records.iter().any(|r| &r.serial_number == k));
    }

    /// The keys to act on, or `Empty` when nothing is ticked
    pub fn require(&self) -> Result<Vec<String>, SelectionError> {
        if self.keys.is_empty() {
            return Err(SelectionError::Empty);
        }
        Ok(self.keys.clone())
    }
}

/// Look up every key concurrently and return the records that still exist,
/// in the same order as `keys`
pub async fn resolve(store: &Store, keys: &[String]) -> Result<Vec<ValveRecord>, StoreError> {
    let lookups: Vec<_> = keys
        .iter()
        .map(|key| {
            let store = store.clone();
            let key = key.clone();
            tokio::spawn(async move { store.get(&key).await })
        })
        .collect();

    let mut records = Vec::with_capacity(lookups.len());
    for lookup in lookups {
        match lookup.await? {
            Ok(record) => records.push(record),
            Err(StoreError::NotFound(key)) => {
                debug!("Selected sheet {} no longer exists, skipping", key);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(records)
}

/// Outcome of deleting several sheets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkDeleteReport {
    pub deleted: usize,
    pub failed: Vec<(String, StoreError)>,
}

/// Delete each key on its own. One failure does not stop or undo the others.
pub async fn bulk_delete(store: &Store, keys: &[String]) -> BulkDeleteReport {
    let mut report = BulkDeleteReport::default();
    for key in keys {
        match store.delete(key).await {
            Ok(()) => report.deleted += 1,
            Err(e) => {
                warn!("⚠️  Could not delete {}: {}", key, e);
                report.failed.push((key.clone(), e));
            }
        }
    }
    report
}
