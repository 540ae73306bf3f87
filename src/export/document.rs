use thiserror::Error;

use crate::photo::Photo;
use crate::state::data::ValveRecord;

pub const SHEET_TITLE: &str = "Levantamiento de Válvulas";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("no se pudo generar el documento de {serial}: {reason}")]
    Document { serial: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentImage {
    pub caption: String,
    pub photo: Photo,
}

/// Renderer-neutral description of one sheet
#[derive(Debug, Clone, PartialEq)]
pub struct SheetDocument {
    pub serial: String,
    pub title: String,
    pub fields: Vec<(String, String)>,
    pub images: Vec<DocumentImage>,
}

impl SheetDocument {
    pub fn from_record(record: &ValveRecord) -> Self {
        let fields = record
            .labelled_fields()
            .into_iter()
            .map(|(label, value)| (label.to_string(), value.to_string()))
            .collect();

        let images = [
            ("Foto válvula", &record.photo_valve),
            ("Foto placa", &record.photo_plate),
        ]
        .into_iter()
        .filter_map(|(caption, photo)| {
            photo.as_ref().map(|photo| DocumentImage {
                caption: caption.to_string(),
                photo: photo.clone(),
            })
        })
        .collect();

        Self {
            serial: record.serial_number.clone(),
            title: SHEET_TITLE.to_string(),
            fields,
            images,
        }
    }
}

/// A rendered file ready to be saved, shared or attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedFile {
    pub name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

/// Turns a sheet into a paginated document
///
/// Implementations must drop images they cannot decode instead of failing.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, doc: &SheetDocument) -> Result<Vec<u8>, RenderError>;

    fn mime(&self) -> &'static str;

    /// Render a record into a named file (`Valvula_<serie>.pdf`)
    fn render_record(&self, record: &ValveRecord) -> Result<NamedFile, RenderError> {
        let bytes = self.render(&SheetDocument::from_record(record))?;
        Ok(NamedFile {
            name: record.pdf_file_name(),
            mime: self.mime(),
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photo::test_photo;
    use crate::state::data::sample_record;

    #[test]
    fn test_document_from_record() {
        let mut record = sample_record("SN-5");
        record.photo_plate = Some(test_photo(4, 4));

        let doc = SheetDocument::from_record(&record);

        assert_eq!(doc.serial, "SN-5");
        assert_eq!(doc.fields[1], ("Serie".to_string(), "SN-5".to_string()));
        assert_eq!(doc.images.len(), 1);
        assert_eq!(doc.images[0].caption, "Foto placa");
    }
}
