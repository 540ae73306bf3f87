/// Export module
///
/// Everything that turns stored sheets into something leaving the app:
/// - Page layout and PDF rendering (layout.rs, pdf.rs)
/// - Photo ZIP archives (archive.rs)
/// - Share sink and export folder (share.rs)
/// - Mail transport and the pending-send flush (mail.rs, outbox.rs)

pub mod archive;
pub mod document;
pub mod layout;
pub mod mail;
pub mod outbox;
pub mod pdf;
pub mod share;

use std::sync::Arc;
use tracing::warn;

use crate::state::data::ValveRecord;
use document::{DocumentRenderer, NamedFile, RenderError};

/// Render one sheet on the blocking pool
pub async fn render_one(
    renderer: Arc<dyn DocumentRenderer>,
    record: ValveRecord,
) -> Result<NamedFile, RenderError> {
    let serial = record.serial_number.clone();
    tokio::task::spawn_blocking(move || renderer.render_record(&record))
        .await
        .map_err(|e| RenderError::Document {
            serial,
            reason: format!("Task join error: {}", e),
        })?
}

/// Documents produced by a batch render, plus the sheets that failed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderBatch {
    pub files: Vec<NamedFile>,
    pub failed: Vec<RenderError>,
}

/// Render sheets one after another in a single blocking job, so only one
/// document is being built at a time. Output keeps the input order and a
/// failed sheet is skipped.
pub async fn render_batch(
    renderer: Arc<dyn DocumentRenderer>,
    records: Vec<ValveRecord>,
) -> RenderBatch {
    let job = tokio::task::spawn_blocking(move || {
        let mut batch = RenderBatch::default();
        for record in &records {
            match renderer.render_record(record) {
                Ok(file) => batch.files.push(file),
                Err(e) => {
                    warn!("⚠️  {}", e);
                    batch.failed.push(e);
                }
            }
        }
        batch
    });

    match job.await {
        Ok(batch) => batch,
        Err(e) => RenderBatch {
            files: Vec::new(),
            failed: vec![RenderError::Document {
                serial: String::new(),
                reason: format!("Task join error: {}", e),
            }],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::sample_record;
    use document::SheetDocument;

    /// Fails on one serial, renders the rest as their serial bytes
    struct PickyRenderer;

    impl DocumentRenderer for PickyRenderer {
        fn render(&self, doc: &SheetDocument) -> Result<Vec<u8>, RenderError> {
            if doc.serial == "SN-BAD" {
                return Err(RenderError::Document {
                    serial: doc.serial.clone(),
                    reason: "boom".to_string(),
                });
            }
            Ok(doc.serial.as_bytes().to_vec())
        }

        fn mime(&self) -> &'static str {
            "text/plain"
        }
    }

    #[tokio::test]
    async fn test_batch_skips_failed_documents_in_order() {
        let records = vec![
            sample_record("SN-2"),
            sample_record("SN-BAD"),
            sample_record("SN-1"),
        ];

        let batch = render_batch(Arc::new(PickyRenderer), records).await;

        let names: Vec<_> = batch.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Valvula_SN-2.pdf", "Valvula_SN-1.pdf"]);
        assert_eq!(batch.failed.len(), 1);
    }

    #[tokio::test]
    async fn test_render_one_pdf() {
        let file = render_one(Arc::new(pdf::PdfRenderer), sample_record("SN-100"))
            .await
            .unwrap();
        assert_eq!(file.name, "Valvula_SN-100.pdf");
        assert_eq!(file.mime, "application/pdf");
        assert!(file.bytes.starts_with(b"%PDF"));
    }
}
