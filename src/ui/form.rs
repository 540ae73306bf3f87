/// Sheet form pane

use iced::widget::{button, column, row, scrollable, text, text_input, Column};
use iced::{Alignment, Element, Length};

use crate::state::form::{PhotoSlot, ValveForm};
use crate::Message;

/// Text inputs of the form, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Client,
    Tag,
    Brand,
    Model,
    Size,
    SerialNumber,
    PressureSet,
    Location,
    Date,
    Observations,
}

impl FormField {
    pub const ALL: [FormField; 10] = [
        FormField::Client,
        FormField::Tag,
        FormField::Brand,
        FormField::Model,
        FormField::Size,
        FormField::SerialNumber,
        FormField::PressureSet,
        FormField::Location,
        FormField::Date,
        FormField::Observations,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FormField::Client => "Cliente",
            FormField::Tag => "TAG",
            FormField::Brand => "Marca",
            FormField::Model => "Modelo",
            FormField::Size => "Tamaño",
            FormField::SerialNumber => "Serie *",
            FormField::PressureSet => "Set de presión",
            FormField::Location => "Ubicación",
            FormField::Date => "Fecha (AAAA-MM-DD)",
            FormField::Observations => "Observaciones",
        }
    }

    pub fn value(self, form: &ValveForm) -> &str {
        match self {
            FormField::Client => &form.client,
            FormField::Tag => &form.tag,
            FormField::Brand => &form.brand,
            FormField::Model => &form.model,
            FormField::Size => &form.size,
            FormField::SerialNumber => &form.serial_number,
            FormField::PressureSet => &form.pressure_set,
            FormField::Location => &form.location,
            FormField::Date => &form.date,
            FormField::Observations => &form.observations,
        }
    }

    pub fn apply(self, form: &mut ValveForm, value: String) {
        let target = match self {
            FormField::Client => &mut form.client,
            FormField::Tag => &mut form.tag,
            FormField::Brand => &mut form.brand,
            FormField::Model => &mut form.model,
            FormField::Size => &mut form.size,
            FormField::SerialNumber => &mut form.serial_number,
            FormField::PressureSet => &mut form.pressure_set,
            FormField::Location => &mut form.location,
            FormField::Date => &mut form.date,
            FormField::Observations => &mut form.observations,
        };
        *target = value;
    }
}

fn photo_row(form: &ValveForm, slot: PhotoSlot) -> Element<'_, Message> {
    let label = match slot {
        PhotoSlot::Valve => "📷 Foto válvula",
        PhotoSlot::Plate => "📷 Foto placa",
    };
    let attached = form.photo(slot).is_some();

    row![
        button(label).on_press(Message::PickPhoto(slot)).padding(8),
        text(if attached { "✔ adjunta" } else { "sin foto" }).size(14),
        button("Quitar")
            .on_press_maybe(attached.then_some(Message::ClearPhoto(slot)))
            .padding(8),
    ]
    .spacing(10)
    .align_y(Alignment::Center)
    .into()
}

pub fn view(form: &ValveForm) -> Element<'_, Message> {
    let mut fields: Column<Message> = column![].spacing(8);
    for field in FormField::ALL {
        fields = fields.push(
            column![
                text(field.label()).size(14),
                text_input(field.label(), field.value(form))
                    .on_input(move |value| Message::Field(field, value))
                    .padding(6),
            ]
            .spacing(4),
        );
    }

    let actions = row![
        button("Guardar").on_press(Message::Save).padding(10),
        button("Enviar ahora").on_press(Message::SendNow).padding(10),
        button("Limpiar").on_press(Message::ClearForm).padding(10),
    ]
    .spacing(10);

    let content = column![
        text("Nueva hoja").size(24),
        fields,
        photo_row(form, PhotoSlot::Valve),
        photo_row(form, PhotoSlot::Plate),
        actions,
    ]
    .spacing(16)
    .padding(20);

    scrollable(content).width(Length::FillPortion(2)).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_field_round_trips_through_the_form() {
        let mut form = ValveForm::default();
        for (i, field) in FormField::ALL.into_iter().enumerate() {
            field.apply(&mut form, format!("v{}", i));
        }
        for (i, field) in FormField::ALL.into_iter().enumerate() {
            assert_eq!(field.value(&form), format!("v{}", i));
        }
        assert_eq!(form.serial_number, "v5");
    }
}
