/// Delivery of queued sheets
///
/// A flush walks the pending queue oldest-first. Each item goes
/// `Queued -> Sending`, then is removed on success or put back to `Queued`
/// with its error on failure. A failed item never stops the pass: the next
/// one is still attempted. No backoff and no retry limit.

use std::sync::Arc;
use tracing::{info, warn};

use super::document::DocumentRenderer;
use super::mail::{MailTransport, OutgoingMail, TransportError};
use super::render_one;
use crate::state::data::ValveRecord;
use crate::state::pending::PendingQueue;
use crate::state::store::StoreError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub delivered: usize,
    pub failed: Vec<(String, TransportError)>,
    /// Queue writes that failed mid-pass. The item is left as it was and the
    /// pass moves on.
    pub store_errors: Vec<(String, StoreError)>,
    /// Items another pass was already sending
    pub skipped: usize,
}

impl FlushReport {
    pub fn is_empty(&self) -> bool {
        self.delivered == 0 && self.failed.is_empty() && self.store_errors.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut summary = format!("📨 Enviadas {} hoja(s).", self.delivered);
        if let Some((_, e)) = self.failed.first() {
            summary = format!(
                "📨 Enviadas {} hoja(s), {} pendiente(s): {}",
                self.delivered,
                self.failed.len(),
                e
            );
        }
        if let Some((serial, e)) = self.store_errors.first() {
            summary.push_str(&format!(" Error de cola en {}: {}", serial, e));
        }
        summary
    }
}

/// Everything a send needs, cheap to clone into a background task
#[derive(Clone)]
pub struct Outbox {
    pub queue: PendingQueue,
    pub transport: Arc<dyn MailTransport>,
    pub renderer: Arc<dyn DocumentRenderer>,
    pub recipient: String,
}

impl std::fmt::Debug for Outbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outbox")
            .field("queue", &self.queue)
            .field("recipient", &self.recipient)
            .finish()
    }
}

impl Outbox {
    /// Queue sheets and immediately try to deliver the whole queue
    pub async fn send(&self, records: Vec<ValveRecord>) -> Result<FlushReport, StoreError> {
        for record in records {
            self.queue.enqueue(record).await?;
        }
        self.flush().await
    }

    /// Try every queued sheet once, oldest first
    pub async fn flush(&self) -> Result<FlushReport, StoreError> {
        let items = self.queue.list().await?;
        let mut report = FlushReport::default();

        if items.is_empty() {
            return Ok(report);
        }
        info!("📤 Sending {} queued sheet(s)", items.len());

        for item in items {
            let (serial, created_at) = item.key();
            match self.queue.mark_sending(serial, created_at).await {
                Ok(true) => {}
                Ok(false) => {
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!("⚠️  Could not claim {}: {}", serial, e);
                    report.store_errors.push((serial.to_string(), e));
                    continue;
                }
            }

            let pdf = match render_one(self.renderer.clone(), item.record.clone()).await {
                Ok(file) => Some(file),
                Err(e) => {
                    warn!("⚠️  Sending {} without PDF: {}", serial, e);
                    None
                }
            };
            let mail = OutgoingMail::for_record(&self.recipient, &item.record, pdf);

            match self.transport.send(&mail).await {
                Ok(()) => {
                    report.delivered += 1;
                    // Left in `Sending` if this fails, and requeued on next start
                    if let Err(e) = self.queue.remove(serial, created_at).await {
                        warn!("⚠️  {} delivered but still queued: {}", serial, e);
                        report.store_errors.push((serial.to_string(), e));
                    }
                }
                Err(e) => {
                    warn!("⚠️  Send of {} failed: {}", serial, e);
                    if let Err(store_error) =
                        self.queue.mark_failed(serial, created_at, &e.to_string()).await
                    {
                        report.store_errors.push((serial.to_string(), store_error));
                    }
                    report.failed.push((serial.to_string(), e));
                }
            }
        }

        info!(
            "📊 Send pass: {} delivered, {} still queued, {} queue errors, {} skipped",
            report.delivered,
            report.failed.len(),
            report.store_errors.len(),
            report.skipped
        );
        Ok(report)
    }
}
