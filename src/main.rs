use iced::widget::{column, container, row, text, vertical_rule};
use iced::{Element, Length, Subscription, Task, Theme};
use rfd::{FileDialog, MessageButtons, MessageDialog, MessageDialogResult, MessageLevel};
use std::sync::Arc;
use chrono::Utc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod actions;
mod config;
mod export;
mod net;
mod photo;
mod selection;
mod state;
mod ui;

use actions::{ActionError, ActionResult};
use config::Config;
use export::document::DocumentRenderer;
use export::mail::{HttpMailTransport, MailTransport, UnconfiguredTransport};
use export::outbox::Outbox;
use export::pdf::PdfRenderer;
use export::share::{DesktopShare, ShareSink};
use net::Connectivity;
use photo::{Photo, PhotoError};
use selection::{BulkAction, Selection};
use state::data::ValveRecord;
use state::form::{PhotoSlot, ValveForm};
use state::pending::PendingQueue;
use state::store::{Store, StoreError};
use ui::form::FormField;

/// Main application state
struct Valvulas {
    config: Config,
    store: Store,
    outbox: Outbox,
    renderer: Arc<dyn DocumentRenderer>,
    share: Arc<dyn ShareSink>,
    /// Host probed to detect when the network comes back
    probe_host: Option<String>,
    connectivity: Connectivity,
    form: ValveForm,
    saved: Vec<ValveRecord>,
    selection: Selection,
    pending: usize,
    /// A send or flush is in flight
    flushing: bool,
    /// Status message to display to the user
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    Field(FormField, String),
    PickPhoto(PhotoSlot),
    PhotoLoaded(PhotoSlot, Result<Photo, PhotoError>),
    ClearPhoto(PhotoSlot),
    ClearForm,
    Save,
    SendNow,
    SendPending,
    /// Checkbox on one saved sheet
    Toggle(String, bool),
    SelectAll(bool),
    /// Action over the current selection
    Bulk(BulkAction),
    /// Action from a single row's buttons
    Single(BulkAction, String),
    Edit(String),
    /// The form's sheet was stored (and possibly sent)
    Saved(ActionResult),
    EditLoaded(Result<ValveRecord, StoreError>),
    /// A background job finished, reload the lists
    Finished(ActionResult),
    /// A send or flush finished
    Sent(ActionResult),
    /// "Enviar ahora" finished
    FormSent(ActionResult),
    Loaded(Result<Vec<ValveRecord>, StoreError>),
    PendingCounted(Result<usize, StoreError>),
    QueueRecovered(Result<usize, StoreError>),
    ProbeTick,
    Probed(bool),
}

impl Valvulas {
    fn new(config: Config, store: Store) -> (Self, Task<Message>) {
        let renderer: Arc<dyn DocumentRenderer> = Arc::new(PdfRenderer);
        let (transport, recipient): (Arc<dyn MailTransport>, String) = match &config.mail {
            Some(mail) => (Arc::new(HttpMailTransport::new(mail.clone())), mail.to.clone()),
            None => {
                warn!("✉️  Mail not configured, sheets will stay queued");
                (Arc::new(UnconfiguredTransport), String::new())
            }
        };
        let probe_host = transport.probe_host();

        let outbox = Outbox {
            queue: PendingQueue::new(store.clone()),
            transport,
            renderer: renderer.clone(),
            recipient,
        };

        info!("📋 Valvulas started, catalog at {}", store.path().display());

        let app = Valvulas {
            config,
            store,
            outbox,
            renderer,
            share: Arc::new(DesktopShare),
            probe_host,
            connectivity: Connectivity::new(),
            form: ValveForm::new(),
            saved: Vec::new(),
            selection: Selection::new(),
            pending: 0,
            flushing: false,
            status: "Listo.".to_string(),
        };

        let recover = Task::perform(
            actions::recover_queue(app.outbox.queue.clone()),
            Message::QueueRecovered,
        );
        let tasks = Task::batch([app.reload(), recover, Task::done(Message::ProbeTick)]);
        (app, tasks)
    }

    /// Refresh the saved list and the pending counter
    fn reload(&self) -> Task<Message> {
        Task::batch([
            Task::perform(actions::load_all(self.store.clone()), Message::Loaded),
            Task::perform(
                actions::pending_count(self.outbox.queue.clone()),
                Message::PendingCounted,
            ),
        ])
    }

    /// Mark a send as started. Only one send or flush runs at a time.
    fn begin_send(&mut self) -> bool {
        if self.flushing {
            self.status = "Ya hay un envío en curso.".to_string();
            return false;
        }
        self.flushing = true;
        self.status = "Enviando...".to_string();
        true
    }

    /// Launch `action` over `keys`, which are already known to be non-empty
    fn run(&mut self, action: BulkAction, keys: Vec<String>) -> Task<Message> {
        let store = self.store.clone();
        let export_dir = self.config.export_dir.clone();

        match action {
            BulkAction::Delete => {
                let confirmed = MessageDialog::new()
                    .set_level(MessageLevel::Warning)
                    .set_title("Eliminar hojas")
                    .set_description(format!("¿Eliminar {} hoja(s)?", keys.len()))
                    .set_buttons(MessageButtons::YesNo)
                    .show();
                if confirmed != MessageDialogResult::Yes {
                    return Task::none();
                }
                self.status = "Eliminando...".to_string();
                Task::perform(actions::delete(store, keys), Message::Finished)
            }
            BulkAction::GeneratePdf => {
                self.status = "Generando PDF...".to_string();
                Task::perform(
                    actions::generate_pdfs(store, self.renderer.clone(), export_dir, keys),
                    Message::Finished,
                )
            }
            BulkAction::Share => {
                self.status = "Preparando archivos...".to_string();
                Task::perform(
                    actions::share(store, self.renderer.clone(), self.share.clone(), export_dir, keys),
                    Message::Finished,
                )
            }
            BulkAction::ExportPhotos => {
                self.status = "Comprimiendo fotos...".to_string();
                Task::perform(actions::export_photos(store, export_dir, keys), Message::Finished)
            }
            BulkAction::Send => {
                if !self.begin_send() {
                    return Task::none();
                }
                Task::perform(
                    actions::send_selected(store, self.outbox.clone(), keys),
                    Message::Sent,
                )
            }
        }
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Field(field, value) => {
                field.apply(&mut self.form, value);
                Task::none()
            }
            Message::PickPhoto(slot) => {
                let picked = FileDialog::new()
                    .set_title("Seleccionar foto")
                    .add_filter("Imágenes", &["jpg", "jpeg", "png", "webp", "bmp"])
                    .pick_file();

                if let Some(path) = picked {
                    self.status = "Procesando foto...".to_string();
                    return Task::perform(
                        photo::load_photo_async(path, self.config.photo_max_side),
                        move |result| Message::PhotoLoaded(slot, result),
                    );
                }
                Task::none()
            }
            Message::PhotoLoaded(slot, Ok(photo)) => {
                self.form.set_photo(slot, Some(photo));
                self.status = "Foto adjunta.".to_string();
                Task::none()
            }
            Message::PhotoLoaded(_, Err(e)) => {
                warn!("⚠️  Photo rejected: {}", e);
                self.status = format!("⚠️ {}", e);
                Task::none()
            }
            Message::ClearPhoto(slot) => {
                self.form.set_photo(slot, None);
                Task::none()
            }
            Message::ClearForm => {
                self.form.reset();
                Task::none()
            }
            Message::Save => match self.form.to_record(Utc::now()) {
                Ok(record) => Task::perform(actions::save(self.store.clone(), record), Message::Saved),
                Err(e) => {
                    self.status = format!("⚠️ {}", ActionError::from(e));
                    Task::none()
                }
            },
            Message::SendNow => match self.form.to_record(Utc::now()) {
                Ok(record) => {
                    if !self.begin_send() {
                        return Task::none();
                    }
                    Task::perform(
                        actions::save_and_send(self.store.clone(), self.outbox.clone(), record),
                        Message::FormSent,
                    )
                }
                Err(e) => {
                    self.status = format!("⚠️ {}", ActionError::from(e));
                    Task::none()
                }
            },
            Message::Saved(result) => {
                // A send failure still leaves the sheet saved and queued
                if !matches!(result, Err(ActionError::Storage(_))) {
                    self.form.reset();
                }
                self.update(Message::Finished(result))
            }
            Message::SendPending => {
                if !self.begin_send() {
                    return Task::none();
                }
                Task::perform(actions::send_pending(self.outbox.clone()), Message::Sent)
            }
            Message::Sent(result) => {
                self.flushing = false;
                self.update(Message::Finished(result))
            }
            Message::FormSent(result) => {
                self.flushing = false;
                self.update(Message::Saved(result))
            }
            Message::Toggle(key, checked) => {
                self.selection.toggle(&key, checked);
                Task::none()
            }
            Message::SelectAll(checked) => {
                if checked {
                    for record in &self.saved {
                        self.selection.toggle(&record.serial_number, true);
                    }
                } else {
                    self.selection.clear();
                }
                Task::none()
            }
            Message::Bulk(action) => match self.selection.require() {
                Ok(keys) => self.run(action, keys),
                Err(e) => {
                    self.status = e.to_string();
                    Task::none()
                }
            },
            Message::Single(action, key) => self.run(action, vec![key]),
            Message::Edit(key) => Task::perform(
                actions::load_one(self.store.clone(), key),
                Message::EditLoaded,
            ),
            Message::EditLoaded(Ok(record)) => {
                self.form = ValveForm::from_record(&record);
                self.status = format!("Editando hoja {}.", record.serial_number);
                Task::none()
            }
            Message::EditLoaded(Err(e)) => {
                self.status = format!("⚠️ {}", e);
                self.reload()
            }
            Message::Finished(result) => {
                self.status = match result {
                    Ok(notice) => notice,
                    Err(e) => {
                        warn!("⚠️  Action failed: {}", e);
                        format!("⚠️ {}", e)
                    }
                };
                self.reload()
            }
            Message::Loaded(Ok(records)) => {
                self.saved = records;
                self.selection.retain_existing(&self.saved);
                Task::none()
            }
            Message::Loaded(Err(e)) => {
                error!("❌ Could not load sheets: {}", e);
                self.status = format!("⚠️ {}", e);
                Task::none()
            }
            Message::PendingCounted(Ok(count)) => {
                self.pending = count;
                Task::none()
            }
            Message::PendingCounted(Err(e)) => {
                warn!("⚠️  Could not count queued sheets: {}", e);
                Task::none()
            }
            Message::QueueRecovered(Ok(count)) => {
                if count > 0 {
                    info!("🔁 Requeued {} interrupted send(s)", count);
                }
                Task::perform(
                    actions::pending_count(self.outbox.queue.clone()),
                    Message::PendingCounted,
                )
            }
            Message::QueueRecovered(Err(e)) => {
                warn!("⚠️  Could not recover send queue: {}", e);
                Task::none()
            }
            Message::ProbeTick => match self.probe_host.clone() {
                Some(host) => Task::perform(net::is_reachable(host), Message::Probed),
                None => Task::none(),
            },
            Message::Probed(online) => {
                if self.connectivity.observe(online) && self.pending > 0 && !self.flushing {
                    info!("🌐 Back online, flushing {} queued sheet(s)", self.pending);
                    self.flushing = true;
                    return Task::perform(
                        actions::send_pending(self.outbox.clone()),
                        Message::Sent,
                    );
                }
                Task::none()
            }
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let network = match self.connectivity.is_online() {
            Some(true) => "🟢 En línea",
            Some(false) => "🔴 Sin conexión",
            None => "",
        };

        let panes = row![
            ui::form::view(&self.form),
            vertical_rule(1),
            ui::saved_list::view(&self.saved, &self.selection, self.pending),
        ]
        .height(Length::Fill);

        let footer = row![
            text(&self.status).size(14).width(Length::Fill),
            text(network).size(14),
        ]
        .padding(10);

        container(column![panes, footer])
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn subscription(&self) -> Subscription<Message> {
        if self.probe_host.is_some() {
            iced::time::every(self.config.probe_interval).map(|_| Message::ProbeTick)
        } else {
            Subscription::none()
        }
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Light
    }
}

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn main() -> iced::Result {
    let config = Config::from_env();
    init_tracing(config.log_json);

    // Without its catalog the app cannot do anything, report and quit
    let store = match Store::open(config.db_path()) {
        Ok(store) => store,
        Err(e) => {
            error!("❌ Could not open catalog at {}: {}", config.db_path().display(), e);
            MessageDialog::new()
                .set_level(MessageLevel::Error)
                .set_title("Levantamiento de Válvulas")
                .set_description(format!("No se pudo abrir la base de datos: {}", e))
                .set_buttons(MessageButtons::Ok)
                .show();
            return Ok(());
        }
    };

    iced::application("Levantamiento de Válvulas", Valvulas::update, Valvulas::view)
        .subscription(Valvulas::subscription)
        .theme(Valvulas::theme)
        .centered()
        .run_with(move || Valvulas::new(config, store))
}
