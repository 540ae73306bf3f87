/// State management module
///
/// This module handles all persisted application state:
/// - Sheet records and queue items (data.rs)
/// - The transient form being filled in (form.rs)
/// - The SQLite sheet catalog (store.rs)
/// - The outbound pending-send queue (pending.rs)

pub mod data;
pub mod form;
pub mod pending;
pub mod store;
