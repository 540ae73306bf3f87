/// ZIP export of the photos attached to selected sheets

use std::io::{Cursor, Write};
use thiserror::Error;
use tracing::warn;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::document::NamedFile;
use crate::state::data::{sanitize_file_stem, ValveRecord};

pub const PHOTO_ARCHIVE_NAME: &str = "fotos_valvulas.zip";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArchiveError {
    #[error("No hay fotos para exportar.")]
    NoPhotos,
    #[error("no se pudo crear el ZIP: {0}")]
    Zip(String),
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(e: zip::result::ZipError) -> Self {
        ArchiveError::Zip(e.to_string())
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(e: std::io::Error) -> Self {
        ArchiveError::Zip(e.to_string())
    }
}

/// Archive plus the number of photos written into it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoArchive {
    pub file: NamedFile,
    pub photo_count: usize,
}

/// `(file name, jpeg bytes)` for every photo on the records.
/// Photos whose payload cannot be decoded are skipped.
pub fn collect_photos(records: &[ValveRecord]) -> Vec<(String, Vec<u8>)> {
    let mut entries = Vec::new();
    for record in records {
        let stem = sanitize_file_stem(&record.serial_number);
        let slots = [
            ("valvula", &record.photo_valve),
            ("placa", &record.photo_plate),
        ];
        for (suffix, photo) in slots {
            let Some(photo) = photo else { continue };
            match photo.to_bytes() {
                Ok(bytes) => entries.push((format!("{}_{}.jpg", stem, suffix), bytes)),
                Err(e) => warn!("⚠️  Skipping {} photo of {}: {}", suffix, record.serial_number, e),
            }
        }
    }
    entries
}

/// Pack `(file name, bytes)` pairs into a single ZIP
pub fn build_archive(name: &str, entries: &[(String, Vec<u8>)]) -> Result<NamedFile, ArchiveError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    // JPEGs don't shrink, store them as-is
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for (file_name, bytes) in entries {
        zip.start_file(file_name.as_str(), options)?;
        zip.write_all(bytes)?;
    }

    let bytes = zip.finish()?.into_inner();
    Ok(NamedFile {
        name: name.to_string(),
        mime: "application/zip",
        bytes,
    })
}

/// Build `fotos_valvulas.zip` from the selected records
pub fn build_photo_archive(records: &[ValveRecord]) -> Result<PhotoArchive, ArchiveError> {
    let entries = collect_photos(records);
    if entries.is_empty() {
        return Err(ArchiveError::NoPhotos);
    }
    let file = build_archive(PHOTO_ARCHIVE_NAME, &entries)?;
    Ok(PhotoArchive {
        file,
        photo_count: entries.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photo::test_photo;
    use crate::state::data::sample_record;
    use std::io::Read;

    #[test]
    fn test_archive_names_and_contents() {
        let mut first = sample_record("SN-1");
        first.photo_valve = Some(test_photo(8, 8));
        first.photo_plate = Some(test_photo(6, 6));
        let mut second = sample_record("SN-2");
        second.photo_plate = Some(test_photo(4, 4));
        let third = sample_record("SN-3");

        let archive = build_photo_archive(&[first.clone(), second, third]).unwrap();

        assert_eq!(archive.photo_count, 3);
        assert_eq!(archive.file.name, "fotos_valvulas.zip");

        let mut zip = zip::ZipArchive::new(Cursor::new(archive.file.bytes)).unwrap();
        let mut names: Vec<_> = zip.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["SN-1_placa.jpg", "SN-1_valvula.jpg", "SN-2_placa.jpg"]
        );

        let mut stored = Vec::new();
        zip.by_name("SN-1_valvula.jpg")
            .unwrap()
            .read_to_end(&mut stored)
            .unwrap();
        assert_eq!(stored, first.photo_valve.unwrap().to_bytes().unwrap());
    }

    #[test]
    fn test_no_photos_is_reported() {
        let result = build_photo_archive(&[sample_record("SN-1")]);
        assert_eq!(result, Err(ArchiveError::NoPhotos));
        assert_eq!(
            ArchiveError::NoPhotos.to_string(),
            "No hay fotos para exportar."
        );
    }
}
