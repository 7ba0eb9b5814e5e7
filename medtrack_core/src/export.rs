//! CSV export of the dose agenda.
//!
//! One row per (date, reminder time, medicine). Appends to an existing file
//! without repeating the header, and syncs the file before returning.

use crate::calendar::CalendarIndex;
use crate::{Medicine, Result};
use chrono::NaiveDate;
use std::fs::OpenOptions;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow<'a> {
    date: String,
    time: String,
    medicine_id: String,
    name: &'a str,
    dosage: &'a str,
    strength: &'a str,
    condition: &'a str,
}

/// Write every dose in `from..=to` to `csv_path`; returns the row count
pub fn export_agenda_csv(
    medicines: &[Medicine],
    from: NaiveDate,
    to: NaiveDate,
    csv_path: &Path,
) -> Result<usize> {
    let index = CalendarIndex::build(medicines, from, to);

    // Ensure parent directory exists
    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;

    // Only a fresh file gets a header row
    let needs_headers = file.metadata()?.len() == 0;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);

    let mut count = 0;
    for (date, rows) in index.iter() {
        for entry in rows {
            writer.serialize(CsvRow {
                date: date.format("%Y-%m-%d").to_string(),
                time: entry.time.format("%H:%M").to_string(),
                medicine_id: entry.medicine_id.to_string(),
                name: &entry.name,
                dosage: &entry.dosage,
                strength: &entry.strength,
                condition: &entry.condition,
            })?;
            count += 1;
        }
    }

    // Flush and sync to disk
    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Exported {} doses to {:?}", count, csv_path);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DurationUnit, MedicineInput, WeekdayMask};
    use chrono::NaiveTime;
    use uuid::Uuid;

    fn create_test_medicine(name: &str) -> Medicine {
        Medicine::new(
            Uuid::new_v4(),
            MedicineInput {
                name: name.into(),
                picture_id: None,
                dosage: "1".into(),
                strength: "500".into(),
                condition: "after meal".into(),
                start_date: NaiveDate::from_ymd_opt(2023, 5, 20).unwrap(),
                duration_amount: 1,
                duration_unit: DurationUnit::Weeks,
                reminder_times: vec![
                    NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                    NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
                ],
                selected_days: WeekdayMask::WEEKENDS,
            },
        )
        .unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 5, d).unwrap()
    }

    #[test]
    fn test_export_creates_file_with_header() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("out/agenda.csv");

        let medicines = vec![create_test_medicine("Aspirin")];
        // 1 week from Saturday 2023-05-20: weekend days 20 and 21
        let count = export_agenda_csv(&medicines, day(1), day(31), &csv_path).unwrap();
        assert_eq!(count, 4);

        let content = std::fs::read_to_string(&csv_path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("date,time,medicine_id,name,dosage,strength,condition")
        );
        assert!(lines.next().unwrap().starts_with("2023-05-20,08:00,"));
    }

    #[test]
    fn test_export_appends_without_second_header() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("agenda.csv");
        let medicines = vec![create_test_medicine("Aspirin")];

        export_agenda_csv(&medicines, day(20), day(20), &csv_path).unwrap();
        export_agenda_csv(&medicines, day(21), day(21), &csv_path).unwrap();

        let reader = csv::Reader::from_path(&csv_path).unwrap();
        assert_eq!(reader.into_records().count(), 4);
    }

    #[test]
    fn test_export_empty_window() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("agenda.csv");
        let medicines = vec![create_test_medicine("Aspirin")];

        let count = export_agenda_csv(&medicines, day(22), day(25), &csv_path).unwrap();
        assert_eq!(count, 0);
    }
}
