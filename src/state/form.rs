/// Transient form state for a sheet being edited
///
/// The form has no identity until it is submitted. `to_record` is the only
/// way into the store and is where required fields are checked.

use chrono::{DateTime, Local, Utc};
use thiserror::Error;

use super::data::ValveRecord;
use crate::photo::Photo;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("La serie es obligatoria.")]
    MissingSerial,
}

/// Which photo slot a picked image goes into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoSlot {
    Valve,
    Plate,
}

/// Text fields of the form plus the two optional photos
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValveForm {
    pub client: String,
    pub tag: String,
    pub brand: String,
    pub model: String,
    pub size: String,
    pub serial_number: String,
    pub pressure_set: String,
    pub location: String,
    pub date: String,
    pub observations: String,
    pub photo_valve: Option<Photo>,
    pub photo_plate: Option<Photo>,
}

impl ValveForm {
    /// Empty form with today's date filled in
    pub fn new() -> Self {
        Self {
            date: Local::now().date_naive().format("%Y-%m-%d").to_string(),
            ..Self::default()
        }
    }

    /// Load a saved sheet back into the form for editing.
    /// Saving it again replaces the stored sheet with the same serial.
    pub fn from_record(record: &ValveRecord) -> Self {
        Self {
            client: record.client.clone(),
            tag: record.tag.clone(),
            brand: record.brand.clone(),
            model: record.model.clone(),
            size: record.size.clone(),
            serial_number: record.serial_number.clone(),
            pressure_set: record.pressure_set.clone(),
            location: record.location.clone(),
            date: record.date.clone(),
            observations: record.observations.clone(),
            photo_valve: record.photo_valve.clone(),
            photo_plate: record.photo_plate.clone(),
        }
    }

    pub fn set_photo(&mut self, slot: PhotoSlot, photo: Option<Photo>) {
        match slot {
            PhotoSlot::Valve => self.photo_valve = photo,
            PhotoSlot::Plate => self.photo_plate = photo,
        }
    }

    pub fn photo(&self, slot: PhotoSlot) -> Option<&Photo> {
        match slot {
            PhotoSlot::Valve => self.photo_valve.as_ref(),
            PhotoSlot::Plate => self.photo_plate.as_ref(),
        }
    }

    /// Build the record to persist, stamped with `now`
    pub fn to_record(&self, now: DateTime<Utc>) -> Result<ValveRecord, ValidationError> {
        let serial_number = self.serial_number.trim();
        if serial_number.is_empty() {
            return Err(ValidationError::MissingSerial);
        }

        Ok(ValveRecord {
            client: self.client.trim().to_string(),
            tag: self.tag.trim().to_string(),
            brand: self.brand.trim().to_string(),
            model: self.model.trim().to_string(),
            size: self.size.trim().to_string(),
            serial_number: serial_number.to_string(),
            pressure_set: self.pressure_set.trim().to_string(),
            location: self.location.trim().to_string(),
            date: self.date.trim().to_string(),
            observations: self.observations.trim().to_string(),
            photo_valve: self.photo_valve.clone(),
            photo_plate: self.photo_plate.clone(),
            created_at: now.to_rfc3339(),
        })
    }

    /// Clear everything except the date
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_missing_serial_is_rejected() {
        let mut form = ValveForm::new();
        form.client = "Acme".to_string();
        assert_eq!(form.to_record(Utc::now()), Err(ValidationError::MissingSerial));

        form.serial_number = "   ".to_string();
        assert_eq!(form.to_record(Utc::now()), Err(ValidationError::MissingSerial));
    }

    #[test]
    fn test_to_record_trims_and_stamps() {
        let mut form = ValveForm::new();
        form.serial_number = "  SN-100 ".to_string();
        form.client = "Acme ".to_string();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();

        let record = form.to_record(now).unwrap();

        assert_eq!(record.serial_number, "SN-100");
        assert_eq!(record.client, "Acme");
        assert_eq!(record.created_at, "2024-05-01T10:00:00+00:00");
        assert_eq!(record.photo_count(), 0);
    }

    #[test]
    fn test_new_form_has_today() {
        let form = ValveForm::new();
        assert_eq!(form.date.len(), 10);
        assert!(chrono::NaiveDate::parse_from_str(&form.date, "%Y-%m-%d").is_ok());
    }

    #[test]
    fn test_record_round_trips_through_form() {
        let mut record = crate::state::data::sample_record("SN-9");
        record.photo_plate = Some(crate::photo::test_photo(8, 8));

        let form = ValveForm::from_record(&record);
        assert_eq!(form.photo(PhotoSlot::Plate), record.photo_plate.as_ref());
        assert_eq!(form.photo(PhotoSlot::Valve), None);

        let again = form.to_record(Utc::now()).unwrap();
        assert_eq!(again.serial_number, record.serial_number);
        assert_eq!(again.photo_plate, record.photo_plate);
    }

    #[test]
    fn test_reset_clears_fields() {
        let mut form = ValveForm::new();
        form.serial_number = "SN-1".to_string();
        form.set_photo(PhotoSlot::Valve, Some(crate::photo::test_photo(4, 4)));
        form.reset();
        assert!(form.serial_number.is_empty());
        assert!(form.photo_valve.is_none());
    }
}
