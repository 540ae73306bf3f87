/// Saved sheets pane: the list, its checkboxes and the bulk action bar

use iced::widget::{button, checkbox, column, horizontal_space, row, scrollable, text, Column, Row};
use iced::{Alignment, Element, Length};

use crate::selection::{BulkAction, Selection};
use crate::state::data::ValveRecord;
use crate::Message;

const BULK_ACTIONS: [BulkAction; 5] = [
    BulkAction::GeneratePdf,
    BulkAction::Share,
    BulkAction::ExportPhotos,
    BulkAction::Send,
    BulkAction::Delete,
];

fn record_row<'a>(record: &'a ValveRecord, selection: &Selection) -> Element<'a, Message> {
    let serial = record.serial_number.clone();
    let toggled = serial.clone();

    let summary = column![
        text(&record.serial_number).size(16),
        text(format!("{} · {} · {}", record.client, record.location, record.date)).size(12),
    ]
    .spacing(2);

    row![
        checkbox("", selection.contains(&record.serial_number))
            .on_toggle(move |checked| Message::Toggle(toggled.clone(), checked)),
        summary,
        horizontal_space(),
        button("PDF")
            .on_press(Message::Single(BulkAction::GeneratePdf, serial.clone()))
            .padding(6),
        button("Compartir")
            .on_press(Message::Single(BulkAction::Share, serial.clone()))
            .padding(6),
        button("Editar").on_press(Message::Edit(serial.clone())).padding(6),
        button("🗑")
            .on_press(Message::Single(BulkAction::Delete, serial))
            .padding(6),
    ]
    .spacing(10)
    .align_y(Alignment::Center)
    .into()
}

pub fn view<'a>(
    records: &'a [ValveRecord],
    selection: &'a Selection,
    pending: usize,
) -> Element<'a, Message> {
    let all_selected = !records.is_empty() && selection.len() == records.len();

    let header = row![
        text(format!("Hojas guardadas ({})", records.len())).size(24),
        horizontal_space(),
        checkbox("Todas", all_selected).on_toggle(Message::SelectAll),
    ]
    .align_y(Alignment::Center);

    let mut bulk: Row<Message> = row![].spacing(8);
    for action in BULK_ACTIONS {
        bulk = bulk.push(button(action.label()).on_press(Message::Bulk(action)).padding(8));
    }

    let outbox = row![
        text(format!("Pendientes de envío: {}", pending)).size(14),
        button("Enviar pendientes")
            .on_press_maybe((pending > 0).then_some(Message::SendPending))
            .padding(8),
    ]
    .spacing(10)
    .align_y(Alignment::Center);

    let list: Element<Message> = if records.is_empty() {
        text("No hay hojas guardadas.").size(14).into()
    } else {
        let mut list: Column<Message> = column![].spacing(8);
        for record in records {
            list = list.push(record_row(record, selection));
        }
        scrollable(list).height(Length::Fill).into()
    };

    column![header, bulk, outbox, list]
        .spacing(12)
        .padding(20)
        .width(Length::FillPortion(3))
        .into()
}
