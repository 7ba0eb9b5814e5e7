//! Recurrence engine: turns a schedule rule into calendar occurrences.
//!
//! Everything here is pure. Occurrences are never stored; callers expand the
//! rule again for whatever window they are displaying.

use crate::{DurationUnit, FrequencyTag, MedicineScheduleRule, WeekdayMask};
use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime};
use std::iter::FusedIterator;

/// Classify a weekday mask into its frequency tag
pub fn classify_frequency(mask: &WeekdayMask) -> FrequencyTag {
    let days = mask.days();
    let midweek = &days[1..6];

    if days.iter().all(|d| *d) {
        FrequencyTag::Everyday
    } else if midweek.iter().all(|d| *d) && !days[0] && !days[6] {
        FrequencyTag::Weekdays
    } else if days[0] && days[6] && !midweek.iter().any(|d| *d) {
        FrequencyTag::Weekends
    } else {
        FrequencyTag::Custom
    }
}

/// Canonical mask for a frequency tag
///
/// `Custom` has no canonical mask; the caller keeps whatever days it had.
pub fn mask_for_frequency(tag: FrequencyTag) -> Option<WeekdayMask> {
    match tag {
        FrequencyTag::Everyday => Some(WeekdayMask::EVERYDAY),
        FrequencyTag::Weekdays => Some(WeekdayMask::WEEKDAYS),
        FrequencyTag::Weekends => Some(WeekdayMask::WEEKENDS),
        FrequencyTag::Custom => None,
    }
}

/// Fixed day count for a duration, if the unit has one
///
/// Months and years have no fixed length; use [`add_duration`] for those.
pub fn days_from_duration(amount: u32, unit: DurationUnit) -> Option<u32> {
    match unit {
        DurationUnit::Days => Some(amount),
        DurationUnit::Weeks => amount.checked_mul(7),
        DurationUnit::Months | DurationUnit::Years => None,
    }
}

/// Add a duration to a date using calendar arithmetic
///
/// Month addition clamps to the last day of the target month (Jan 31 + 1
/// month = Feb 28/29). Years are twelve months, so Feb 29 + 1 year = Feb 28.
/// Returns `None` if the result leaves chrono's date range.
pub fn add_duration(start: NaiveDate, amount: u32, unit: DurationUnit) -> Option<NaiveDate> {
    match unit {
        DurationUnit::Days | DurationUnit::Weeks => {
            let days = days_from_duration(amount, unit)?;
            start.checked_add_days(chrono::Days::new(u64::from(days)))
        }
        DurationUnit::Months => start.checked_add_months(Months::new(amount)),
        DurationUnit::Years => start.checked_add_months(Months::new(amount.checked_mul(12)?)),
    }
}

/// Inclusive last day of a course starting on `start`
///
/// A course of N days covers N calendar days. A zero-length course still
/// covers its start day, so the result is never before `start`.
pub fn end_date(start: NaiveDate, amount: u32, unit: DurationUnit) -> Option<NaiveDate> {
    let exclusive_end = add_duration(start, amount, unit)?;
    Some(
        exclusive_end
            .pred_opt()
            .filter(|last| *last >= start)
            .unwrap_or(start),
    )
}

/// A calendar date on which a dose is due
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Occurrence<'a> {
    pub date: NaiveDate,
    pub reminder_times: &'a [NaiveTime],
}

impl<'a> Occurrence<'a> {
    /// One slot per reminder time on this date
    pub fn dose_slots(&self) -> impl Iterator<Item = DoseSlot> + 'a {
        let date = self.date;
        let times: &'a [NaiveTime] = self.reminder_times;
        times.iter().map(move |time| DoseSlot { date, time: *time })
    }
}

/// A single (date, reminder time) pair
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DoseSlot {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl DoseSlot {
    pub fn at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}

/// Lazy, finite iterator over a rule's occurrences in ascending date order
///
/// Cloning yields an independent iterator from the same position.
#[derive(Clone, Debug)]
pub struct Occurrences<'a> {
    rule: &'a MedicineScheduleRule,
    next: Option<NaiveDate>,
    last: NaiveDate,
    everyday: bool,
}

impl<'a> Occurrences<'a> {
    /// Flatten into one slot per (date, reminder time)
    pub fn dose_slots(self) -> impl Iterator<Item = DoseSlot> + 'a {
        self.flat_map(|occurrence| occurrence.dose_slots())
    }

    /// Just the dates
    pub fn dates(self) -> impl Iterator<Item = NaiveDate> + 'a {
        self.map(|occurrence| occurrence.date)
    }
}

impl<'a> Iterator for Occurrences<'a> {
    type Item = Occurrence<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let date = self.next?;
            if date > self.last {
                self.next = None;
                return None;
            }
            self.next = date.succ_opt();

            // All-true masks skip the weekday lookup
            if self.everyday || self.rule.selected_days().is_selected(date.weekday()) {
                return Some(Occurrence {
                    date,
                    reminder_times: self.rule.reminder_times(),
                });
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.next {
            Some(next) if next <= self.last => {
                let remaining = (self.last - next).num_days() as usize + 1;
                let lower = if self.everyday { remaining } else { 0 };
                (lower, Some(remaining))
            }
            _ => (0, Some(0)),
        }
    }
}

impl FusedIterator for Occurrences<'_> {}

/// Expand a rule into its occurrences, optionally limited to a window
///
/// Both bounds are inclusive. Iteration starts at the later of the rule's
/// start and `range_start`, so the cost follows the window rather than the
/// whole course. An inverted or disjoint window yields nothing.
pub fn expand_occurrences(
    rule: &MedicineScheduleRule,
    range_start: Option<NaiveDate>,
    range_end: Option<NaiveDate>,
) -> Occurrences<'_> {
    let first = range_start.map_or(rule.start_date(), |start| start.max(rule.start_date()));
    let last = range_end.map_or(rule.end_date(), |end| end.min(rule.end_date()));

    Occurrences {
        rule,
        next: (first <= last).then_some(first),
        last,
        everyday: classify_frequency(rule.selected_days()) == FrequencyTag::Everyday,
    }
}

/// Whether a dose is due on `date`
pub fn is_due_on(rule: &MedicineScheduleRule, date: NaiveDate) -> bool {
    expand_occurrences(rule, Some(date), Some(date)).next().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DurationSpec;
    use chrono::Weekday;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn rule(
        start: NaiveDate,
        amount: u32,
        unit: DurationUnit,
        mask: WeekdayMask,
    ) -> MedicineScheduleRule {
        MedicineScheduleRule::new(
            start,
            DurationSpec::new(amount, unit),
            mask,
            vec![time(8, 0), time(20, 0)],
        )
        .unwrap()
    }

    fn all_masks() -> impl Iterator<Item = WeekdayMask> {
        (0u8..128).map(|bits| {
            let mut days = [false; 7];
            for (i, day) in days.iter_mut().enumerate() {
                *day = bits & (1 << i) != 0;
            }
            WeekdayMask::new(days)
        })
    }

    #[test]
    fn test_classify_named_masks() {
        assert_eq!(classify_frequency(&WeekdayMask::new([true; 7])), FrequencyTag::Everyday);
        assert_eq!(
            classify_frequency(&WeekdayMask::new([false, true, true, true, true, true, false])),
            FrequencyTag::Weekdays
        );
        assert_eq!(
            classify_frequency(&WeekdayMask::new([true, false, false, false, false, false, true])),
            FrequencyTag::Weekends
        );
        assert_eq!(
            classify_frequency(&WeekdayMask::new([true, true, false, false, false, false, false])),
            FrequencyTag::Custom
        );
        assert_eq!(classify_frequency(&WeekdayMask::NONE), FrequencyTag::Custom);
    }

    #[test]
    fn test_classify_is_total_and_exclusive() {
        let mut counts = std::collections::HashMap::new();
        for mask in all_masks() {
            *counts.entry(classify_frequency(&mask)).or_insert(0) += 1;
        }

        assert_eq!(counts[&FrequencyTag::Everyday], 1);
        assert_eq!(counts[&FrequencyTag::Weekdays], 1);
        assert_eq!(counts[&FrequencyTag::Weekends], 1);
        assert_eq!(counts[&FrequencyTag::Custom], 125);
    }

    #[test]
    fn test_mask_for_frequency_inverts_classify() {
        for tag in FrequencyTag::ALL {
            match mask_for_frequency(tag) {
                Some(mask) => assert_eq!(classify_frequency(&mask), tag),
                None => assert_eq!(tag, FrequencyTag::Custom),
            }
        }
    }

    #[test]
    fn test_days_from_duration() {
        assert_eq!(days_from_duration(5, DurationUnit::Days), Some(5));
        assert_eq!(days_from_duration(3, DurationUnit::Weeks), Some(21));
        assert_eq!(days_from_duration(1, DurationUnit::Months), None);
        assert_eq!(days_from_duration(1, DurationUnit::Years), None);
        assert_eq!(days_from_duration(u32::MAX, DurationUnit::Weeks), None);
    }

    #[test]
    fn test_add_duration_calendar_arithmetic() {
        assert_eq!(add_duration(date(2023, 1, 31), 1, DurationUnit::Months), Some(date(2023, 2, 28)));
        assert_eq!(add_duration(date(2024, 1, 31), 1, DurationUnit::Months), Some(date(2024, 2, 29)));
        assert_eq!(add_duration(date(2024, 2, 29), 1, DurationUnit::Years), Some(date(2025, 2, 28)));
        assert_eq!(add_duration(date(2023, 5, 20), 2, DurationUnit::Weeks), Some(date(2023, 6, 3)));
        assert_eq!(add_duration(date(2023, 12, 15), 3, DurationUnit::Months), Some(date(2024, 3, 15)));
    }

    #[test]
    fn test_end_date_is_inclusive() {
        assert_eq!(end_date(date(2023, 5, 20), 2, DurationUnit::Days), Some(date(2023, 5, 21)));
        assert_eq!(end_date(date(2023, 5, 20), 1, DurationUnit::Weeks), Some(date(2023, 5, 26)));
        assert_eq!(end_date(date(2023, 5, 20), 1, DurationUnit::Months), Some(date(2023, 6, 19)));
        assert_eq!(end_date(date(2023, 5, 20), 1, DurationUnit::Years), Some(date(2024, 5, 19)));
    }

    #[test]
    fn test_zero_duration_covers_start_day() {
        for unit in DurationUnit::ALL {
            assert_eq!(end_date(date(2023, 5, 20), 0, unit), Some(date(2023, 5, 20)));

            let r = rule(date(2023, 5, 20), 0, unit, WeekdayMask::EVERYDAY);
            let dates: Vec<_> = expand_occurrences(&r, None, None).dates().collect();
            assert_eq!(dates, vec![date(2023, 5, 20)]);
        }
    }

    #[test]
    fn test_two_day_everyday_course() {
        crate::logging::init_test();
        let r = rule(date(2023, 5, 20), 2, DurationUnit::Days, WeekdayMask::EVERYDAY);
        let dates: Vec<_> = expand_occurrences(&r, None, None).dates().collect();
        assert_eq!(dates, vec![date(2023, 5, 20), date(2023, 5, 21)]);
    }

    #[test]
    fn test_weekday_mask_skips_weekend() {
        // 2023-05-20 is a Saturday
        let r = rule(date(2023, 5, 20), 7, DurationUnit::Days, WeekdayMask::WEEKDAYS);
        let dates: Vec<_> = expand_occurrences(&r, None, None).dates().collect();

        assert_eq!(
            dates,
            vec![
                date(2023, 5, 22),
                date(2023, 5, 23),
                date(2023, 5, 24),
                date(2023, 5, 25),
                date(2023, 5, 26),
            ]
        );
        assert!(dates
            .iter()
            .all(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun)));
    }

    #[test]
    fn test_occurrences_respect_mask_and_bounds() {
        let start = date(2024, 2, 1);
        for mask in all_masks() {
            let r = rule(start, 2, DurationUnit::Months, mask);
            for occurrence in expand_occurrences(&r, None, None) {
                assert!(occurrence.date >= r.start_date());
                assert!(occurrence.date <= r.end_date());
                assert!(mask.is_selected_on(occurrence.date));
            }
        }
    }

    #[test]
    fn test_everyday_shortcut_matches_mask_check() {
        let r = rule(date(2023, 1, 1), 1, DurationUnit::Years, WeekdayMask::EVERYDAY);
        let fast: Vec<_> = expand_occurrences(&r, None, None).dates().collect();
        let checked: Vec<_> = r
            .start_date()
            .iter_days()
            .take_while(|d| *d <= r.end_date())
            .filter(|d| r.selected_days().is_selected_on(*d))
            .collect();
        assert_eq!(fast, checked);
        assert_eq!(fast.len(), 365);
    }

    #[test]
    fn test_expansion_is_idempotent() {
        let r = rule(date(2023, 5, 1), 6, DurationUnit::Weeks, WeekdayMask::WEEKENDS);
        let first: Vec<_> = expand_occurrences(&r, None, None).collect();
        let second: Vec<_> = expand_occurrences(&r, None, None).collect();
        assert_eq!(first, second);

        let iter = expand_occurrences(&r, None, None);
        let cloned: Vec<_> = iter.clone().collect();
        let original: Vec<_> = iter.collect();
        assert_eq!(cloned, original);
    }

    #[test]
    fn test_windowed_equals_filtered() {
        let custom = WeekdayMask::from_weekdays(&[Weekday::Mon, Weekday::Thu]);
        let r = rule(date(2023, 5, 3), 3, DurationUnit::Months, custom);
        let full: Vec<_> = expand_occurrences(&r, None, None).collect();

        let windows = [
            (date(2023, 6, 1), date(2023, 6, 30)),
            (date(2023, 4, 1), date(2023, 5, 10)),
            (date(2023, 7, 20), date(2023, 9, 1)),
            (date(2023, 5, 8), date(2023, 5, 8)),
        ];
        for (from, to) in windows {
            let windowed: Vec<_> = expand_occurrences(&r, Some(from), Some(to)).collect();
            let filtered: Vec<_> = full
                .iter()
                .filter(|o| from <= o.date && o.date <= to)
                .copied()
                .collect();
            assert_eq!(windowed, filtered, "window {}..={}", from, to);
        }
    }

    #[test]
    fn test_inverted_or_disjoint_window_is_empty() {
        let r = rule(date(2023, 5, 20), 10, DurationUnit::Days, WeekdayMask::EVERYDAY);
        assert_eq!(
            expand_occurrences(&r, Some(date(2023, 5, 25)), Some(date(2023, 5, 22))).count(),
            0
        );
        assert_eq!(
            expand_occurrences(&r, Some(date(2024, 1, 1)), None).count(),
            0
        );
        assert_eq!(
            expand_occurrences(&r, None, Some(date(2023, 1, 1))).count(),
            0
        );
    }

    #[test]
    fn test_window_cost_follows_window() {
        let r = rule(date(2020, 1, 1), 10, DurationUnit::Years, WeekdayMask::EVERYDAY);
        let window = expand_occurrences(&r, Some(date(2025, 3, 1)), Some(date(2025, 3, 31)));
        assert_eq!(window.size_hint(), (31, Some(31)));
    }

    #[test]
    fn test_occurrence_carries_all_reminders() {
        let r = rule(date(2023, 5, 20), 2, DurationUnit::Days, WeekdayMask::EVERYDAY);
        let occurrence = expand_occurrences(&r, None, None).next().unwrap();
        assert_eq!(occurrence.reminder_times, &[time(8, 0), time(20, 0)]);

        let slots: Vec<_> = expand_occurrences(&r, None, None).dose_slots().collect();
        assert_eq!(slots.len(), 4);
        assert_eq!(slots[0].at(), date(2023, 5, 20).and_time(time(8, 0)));
        assert_eq!(slots[3].at(), date(2023, 5, 21).and_time(time(20, 0)));
    }

    #[test]
    fn test_is_due_on() {
        let r = rule(date(2023, 5, 20), 7, DurationUnit::Days, WeekdayMask::WEEKDAYS);
        assert!(!is_due_on(&r, date(2023, 5, 20)));
        assert!(is_due_on(&r, date(2023, 5, 22)));
        assert!(!is_due_on(&r, date(2023, 5, 29)));
    }
}
