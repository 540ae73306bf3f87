/// Shared data structures for the application state
///
/// These structs represent the data model that flows between
/// the database layer, the export layer and the UI layer.

use serde::{Deserialize, Serialize};

use crate::photo::Photo;

/// One valve inspection sheet ("hoja de vida")
///
/// Serialized with the Spanish field names used by the mail templates
/// and JSON dumps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValveRecord {
    #[serde(rename = "cliente")]
    pub client: String,
    pub tag: String,
    #[serde(rename = "marca")]
    pub brand: String,
    #[serde(rename = "modelo")]
    pub model: String,
    #[serde(rename = "tamano")]
    pub size: String,
    /// Identity key, never empty once persisted
    #[serde(rename = "serie")]
    pub serial_number: String,
    #[serde(rename = "set")]
    pub pressure_set: String,
    #[serde(rename = "ubicacion")]
    pub location: String,
    /// Inspection date, `YYYY-MM-DD`
    #[serde(rename = "fecha")]
    pub date: String,
    #[serde(rename = "obs")]
    pub observations: String,
    #[serde(rename = "foto", default, skip_serializing_if = "Option::is_none")]
    pub photo_valve: Option<Photo>,
    #[serde(rename = "fotoPlaca", default, skip_serializing_if = "Option::is_none")]
    pub photo_plate: Option<Photo>,
    /// RFC 3339 timestamp of submission
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

impl ValveRecord {
    /// Labelled text fields in display order (photos excluded)
    pub fn labelled_fields(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("Cliente", self.client.as_str()),
            ("Serie", self.serial_number.as_str()),
            ("TAG", self.tag.as_str()),
            ("Marca", self.brand.as_str()),
            ("Modelo", self.model.as_str()),
            ("Tamaño", self.size.as_str()),
            ("Set de presión", self.pressure_set.as_str()),
            ("Ubicación", self.location.as_str()),
            ("Fecha", self.date.as_str()),
            ("Observaciones", self.observations.as_str()),
        ]
    }

    pub fn photo_count(&self) -> usize {
        self.photo_valve.iter().count() + self.photo_plate.iter().count()
    }

    /// File name used for this sheet's PDF
    pub fn pdf_file_name(&self) -> String {
        format!("Valvula_{}.pdf", sanitize_file_stem(&self.serial_number))
    }
}

/// Keep serial numbers usable as file names on every platform
pub fn sanitize_file_stem(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Queue state of an outbound sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Queued,
    Sending,
}

impl SendStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SendStatus::Queued => "queued",
            SendStatus::Sending => "sending",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "sending" => SendStatus::Sending,
            _ => SendStatus::Queued,
        }
    }
}

/// A sheet waiting for confirmed delivery
///
/// Identified by `(record.serial_number, record.created_at)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSend {
    pub record: ValveRecord,
    pub status: SendStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub enqueued_at: String,
}

impl PendingSend {
    pub fn key(&self) -> (&str, &str) {
        (self.record.serial_number.as_str(), self.record.created_at.as_str())
    }
}

#[cfg(test)]
pub(crate) fn sample_record(serial: &str) -> ValveRecord {
    ValveRecord {
        client: "Acme".to_string(),
        tag: "PSV-01".to_string(),
        brand: "Farris".to_string(),
        model: "2600".to_string(),
        size: "1\" x 2\"".to_string(),
        serial_number: serial.to_string(),
        pressure_set: "150 psi".to_string(),
        location: "Planta norte".to_string(),
        date: "2024-05-01".to_string(),
        observations: "Sin novedad".to_string(),
        photo_valve: None,
        photo_plate: None,
        created_at: "2024-05-01T10:00:00+00:00".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_with_form_field_names() {
        let record = sample_record("SN-1");
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["serie"], "SN-1");
        assert_eq!(json["cliente"], "Acme");
        assert_eq!(json["createdAt"], "2024-05-01T10:00:00+00:00");
        assert!(json.get("foto").is_none());

        let back: ValveRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_pdf_file_name_is_sanitized() {
        let mut record = sample_record("SN/7:A");
        assert_eq!(record.pdf_file_name(), "Valvula_SN_7_A.pdf");
        record.serial_number = "SN-100".to_string();
        assert_eq!(record.pdf_file_name(), "Valvula_SN-100.pdf");
    }

    #[test]
    fn test_labelled_fields_order() {
        let record = sample_record("SN-1");
        let labels: Vec<_> = record.labelled_fields().into_iter().map(|(l, _)| l).collect();
        assert_eq!(labels.first(), Some(&"Cliente"));
        assert_eq!(labels.last(), Some(&"Observaciones"));
        assert_eq!(labels.len(), 10);
    }
}
