//! Calendar index over a visible date window.
//!
//! Expands every medicine's rule for the window only and groups the
//! resulting dose slots by date, which is what a month view needs: which
//! cells get an indicator, and what goes in the agenda for a selected day.

use crate::recurrence::expand_occurrences;
use crate::Medicine;
use chrono::{Datelike, Months, NaiveDate, NaiveTime};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One agenda row: a medicine due at a specific time
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgendaEntry {
    pub medicine_id: Uuid,
    pub name: String,
    pub dosage: String,
    pub strength: String,
    pub condition: String,
    pub time: NaiveTime,
}

#[derive(Clone, Debug)]
pub struct CalendarIndex {
    start: NaiveDate,
    end: NaiveDate,
    days: BTreeMap<NaiveDate, Vec<AgendaEntry>>,
}

impl CalendarIndex {
    /// Build the index for the inclusive window `start..=end`
    pub fn build(medicines: &[Medicine], start: NaiveDate, end: NaiveDate) -> Self {
        let mut days: BTreeMap<NaiveDate, Vec<AgendaEntry>> = BTreeMap::new();

        for medicine in medicines {
            let rule = match medicine.rule() {
                Ok(rule) => rule,
                Err(e) => {
                    tracing::warn!("Skipping medicine {} with invalid rule: {}", medicine.id, e);
                    continue;
                }
            };

            for slot in expand_occurrences(&rule, Some(start), Some(end)).dose_slots() {
                days.entry(slot.date).or_default().push(AgendaEntry {
                    medicine_id: medicine.id,
                    name: medicine.input.name.clone(),
                    dosage: medicine.input.dosage.clone(),
                    strength: medicine.input.strength.clone(),
                    condition: medicine.input.condition.clone(),
                    time: slot.time,
                });
            }
        }

        for entries in days.values_mut() {
            entries.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.name.cmp(&b.name)));
        }

        tracing::debug!(
            "Built calendar index for {}..={} with {} marked dates",
            start,
            end,
            days.len()
        );
        Self { start, end, days }
    }

    /// Build the index for one calendar month
    pub fn for_month(medicines: &[Medicine], year: i32, month: u32) -> Option<Self> {
        let (start, end) = month_window(year, month)?;
        Some(Self::build(medicines, start, end))
    }

    pub fn window(&self) -> (NaiveDate, NaiveDate) {
        (self.start, self.end)
    }

    /// Dates with at least one dose, ascending
    pub fn marked_dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.keys().copied()
    }

    pub fn is_marked(&self, date: NaiveDate) -> bool {
        self.days.contains_key(&date)
    }

    /// Agenda rows for a date, sorted by time then name
    pub fn agenda(&self, date: NaiveDate) -> &[AgendaEntry] {
        self.days.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every (date, rows) pair in the window, ascending
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &[AgendaEntry])> + '_ {
        self.days.iter().map(|(date, rows)| (*date, rows.as_slice()))
    }

    /// Total number of dose rows in the window
    pub fn dose_count(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }
}

/// First and last day of a calendar month
pub fn month_window(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = first.checked_add_months(Months::new(1))?.pred_opt()?;
    Some((first, last))
}

/// Month window containing `date`
pub fn month_of(date: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    month_window(date.year(), date.month())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DurationUnit, MedicineInput, WeekdayMask};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn medicine(name: &str, days: u32, mask: WeekdayMask, times: Vec<NaiveTime>) -> Medicine {
        Medicine::new(
            Uuid::new_v4(),
            MedicineInput {
                name: name.into(),
                picture_id: None,
                dosage: "1".into(),
                strength: "100".into(),
                condition: String::new(),
                start_date: date(2023, 5, 20),
                duration_amount: days,
                duration_unit: DurationUnit::Days,
                reminder_times: times,
                selected_days: mask,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_month_window() {
        assert_eq!(month_window(2024, 2), Some((date(2024, 2, 1), date(2024, 2, 29))));
        assert_eq!(month_window(2023, 12), Some((date(2023, 12, 1), date(2023, 12, 31))));
        assert_eq!(month_window(2023, 13), None);
        assert_eq!(month_of(date(2023, 5, 20)), month_window(2023, 5));
    }

    #[test]
    fn test_marked_dates_and_agenda() {
        let medicines = vec![
            medicine("Ibuprofen", 2, WeekdayMask::EVERYDAY, vec![time(14)]),
            medicine("Aspirin", 2, WeekdayMask::EVERYDAY, vec![time(14), time(8)]),
            medicine("Vitamin D", 10, WeekdayMask::WEEKDAYS, vec![time(9)]),
        ];
        let index = CalendarIndex::for_month(&medicines, 2023, 5).unwrap();

        let marked: Vec<_> = index.marked_dates().collect();
        assert_eq!(marked.first(), Some(&date(2023, 5, 20)));
        // Vitamin D runs 20..=29 on weekdays: 22-26 and 29
        assert_eq!(marked.len(), 2 + 6);

        let agenda: Vec<_> = index
            .agenda(date(2023, 5, 20))
            .iter()
            .map(|e| (e.name.as_str(), e.time))
            .collect();
        assert_eq!(
            agenda,
            vec![("Aspirin", time(8)), ("Aspirin", time(14)), ("Ibuprofen", time(14))]
        );

        assert!(index.agenda(date(2023, 5, 27)).is_empty());
        assert!(!index.is_marked(date(2023, 5, 27)));
        assert_eq!(index.dose_count(), 2 + 4 + 6);
    }

    #[test]
    fn test_window_clips_courses() {
        let medicines = vec![medicine("Aspirin", 30, WeekdayMask::EVERYDAY, vec![time(8)])];
        let index = CalendarIndex::for_month(&medicines, 2023, 6).unwrap();
        // Course runs 2023-05-20..=2023-06-18
        assert_eq!(index.marked_dates().count(), 18);
        assert_eq!(index.window(), (date(2023, 6, 1), date(2023, 6, 30)));
    }
}
