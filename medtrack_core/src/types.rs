//! Core domain types for the medication schedule tracker.
//!
//! This module defines the fundamental types used throughout the system:
//! - Duration units and weekday selection masks
//! - The immutable schedule rule a medicine is evaluated with
//! - The medicine input record, stored medicine documents and user profiles

use crate::{Error, Result};
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Duration
// ============================================================================

/// Unit a medicine's course duration is expressed in
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    Days,
    Weeks,
    Months,
    Years,
}

impl DurationUnit {
    pub const ALL: [DurationUnit; 4] = [
        DurationUnit::Days,
        DurationUnit::Weeks,
        DurationUnit::Months,
        DurationUnit::Years,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DurationUnit::Days => "days",
            DurationUnit::Weeks => "weeks",
            DurationUnit::Months => "months",
            DurationUnit::Years => "years",
        }
    }
}

impl fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DurationUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "day" | "days" => Ok(DurationUnit::Days),
            "week" | "weeks" => Ok(DurationUnit::Weeks),
            "month" | "months" => Ok(DurationUnit::Months),
            "year" | "years" => Ok(DurationUnit::Years),
            other => Err(Error::InvalidRule(format!(
                "unknown duration unit '{}'",
                other
            ))),
        }
    }
}

/// A course duration such as "2 weeks"
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DurationSpec {
    pub amount: u32,
    pub unit: DurationUnit,
}

impl DurationSpec {
    pub fn new(amount: u32, unit: DurationUnit) -> Self {
        Self { amount, unit }
    }

    /// Build from a signed amount, rejecting negatives
    pub fn from_signed(amount: i64, unit: DurationUnit) -> Result<Self> {
        let amount = u32::try_from(amount).map_err(|_| {
            Error::InvalidRule(format!(
                "duration amount must be a non-negative integer, got {}",
                amount
            ))
        })?;
        Ok(Self { amount, unit })
    }
}

impl fmt::Display for DurationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.unit)
    }
}

impl FromStr for DurationSpec {
    type Err = Error;

    /// Parses the "<amount> <unit>" label stored on medicine documents
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let (Some(amount), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(Error::InvalidRule(format!(
                "expected '<amount> <unit>', got '{}'",
                s
            )));
        };

        let amount: i64 = amount
            .parse()
            .map_err(|_| Error::InvalidRule(format!("invalid duration amount '{}'", amount)))?;
        Self::from_signed(amount, unit.parse()?)
    }
}

// ============================================================================
// Weekday selection
// ============================================================================

/// Short weekday labels, Sunday first
pub const WEEKDAY_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Seven-entry weekday selection, index 0 = Sunday .. 6 = Saturday
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<bool>", into = "Vec<bool>")]
pub struct WeekdayMask([bool; 7]);

impl WeekdayMask {
    pub const EVERYDAY: WeekdayMask = WeekdayMask([true; 7]);
    pub const WEEKDAYS: WeekdayMask = WeekdayMask([false, true, true, true, true, true, false]);
    pub const WEEKENDS: WeekdayMask = WeekdayMask([true, false, false, false, false, false, true]);
    pub const NONE: WeekdayMask = WeekdayMask([false; 7]);

    pub fn new(days: [bool; 7]) -> Self {
        Self(days)
    }

    /// Build a mask from a slice, which must hold exactly seven entries
    pub fn from_slice(days: &[bool]) -> Result<Self> {
        let days: [bool; 7] = days.try_into().map_err(|_| {
            Error::InvalidRule(format!(
                "selected days must have exactly 7 entries, got {}",
                days.len()
            ))
        })?;
        Ok(Self(days))
    }

    /// Build a mask that selects exactly the given weekdays
    pub fn from_weekdays(weekdays: &[Weekday]) -> Self {
        let mut days = [false; 7];
        for weekday in weekdays {
            days[weekday.num_days_from_sunday() as usize] = true;
        }
        Self(days)
    }

    pub fn days(&self) -> &[bool; 7] {
        &self.0
    }

    pub fn get(&self, index: usize) -> bool {
        self.0.get(index).copied().unwrap_or(false)
    }

    pub fn is_selected(&self, weekday: Weekday) -> bool {
        self.0[weekday.num_days_from_sunday() as usize]
    }

    pub fn is_selected_on(&self, date: NaiveDate) -> bool {
        self.is_selected(date.weekday())
    }

    pub fn all(&self) -> bool {
        self.0.iter().all(|d| *d)
    }

    pub fn is_empty(&self) -> bool {
        !self.0.iter().any(|d| *d)
    }

    /// Return a copy with the entry at `index` flipped
    pub fn toggled(mut self, index: usize) -> Self {
        if let Some(day) = self.0.get_mut(index) {
            *day = !*day;
        }
        self
    }
}

impl Default for WeekdayMask {
    fn default() -> Self {
        Self::EVERYDAY
    }
}

impl TryFrom<Vec<bool>> for WeekdayMask {
    type Error = Error;

    fn try_from(days: Vec<bool>) -> Result<Self> {
        Self::from_slice(&days)
    }
}

impl From<WeekdayMask> for Vec<bool> {
    fn from(mask: WeekdayMask) -> Self {
        mask.0.to_vec()
    }
}

impl fmt::Display for WeekdayMask {
    /// Comma-separated short labels, or "None" for an empty mask
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = WEEKDAY_LABELS
            .iter()
            .zip(self.0.iter())
            .filter(|(_, selected)| **selected)
            .map(|(label, _)| *label)
            .collect();

        if labels.is_empty() {
            f.write_str("None")
        } else {
            f.write_str(&labels.join(", "))
        }
    }
}

/// Human-facing summary of a weekday selection
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyTag {
    Everyday,
    Weekdays,
    Weekends,
    Custom,
}

impl FrequencyTag {
    pub const ALL: [FrequencyTag; 4] = [
        FrequencyTag::Everyday,
        FrequencyTag::Weekdays,
        FrequencyTag::Weekends,
        FrequencyTag::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FrequencyTag::Everyday => "everyday",
            FrequencyTag::Weekdays => "weekdays",
            FrequencyTag::Weekends => "weekends",
            FrequencyTag::Custom => "custom",
        }
    }
}

impl fmt::Display for FrequencyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrequencyTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "everyday" => Ok(FrequencyTag::Everyday),
            "weekdays" => Ok(FrequencyTag::Weekdays),
            "weekends" => Ok(FrequencyTag::Weekends),
            "custom" => Ok(FrequencyTag::Custom),
            other => Err(Error::InvalidRule(format!("unknown frequency '{}'", other))),
        }
    }
}

// ============================================================================
// Schedule rule
// ============================================================================

/// Immutable recurrence rule for one medicine
///
/// Construction validates every input, so the recurrence engine never sees
/// an inconsistent rule. `end_date` is inclusive and never before
/// `start_date`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MedicineScheduleRule {
    start_date: NaiveDate,
    duration: DurationSpec,
    selected_days: WeekdayMask,
    reminder_times: Vec<NaiveTime>,
    end_date: NaiveDate,
}

impl MedicineScheduleRule {
    pub fn new(
        start_date: NaiveDate,
        duration: DurationSpec,
        selected_days: WeekdayMask,
        reminder_times: Vec<NaiveTime>,
    ) -> Result<Self> {
        if reminder_times.is_empty() {
            return Err(Error::InvalidRule(
                "at least one reminder time is required".into(),
            ));
        }

        let end_date = crate::recurrence::end_date(start_date, duration.amount, duration.unit)
            .ok_or_else(|| {
                Error::InvalidRule(format!(
                    "duration {} from {} overflows the supported date range",
                    duration, start_date
                ))
            })?;

        Ok(Self {
            start_date,
            duration,
            selected_days,
            reminder_times,
            end_date,
        })
    }

    /// Build a rule from unvalidated form values
    pub fn from_raw(
        start_date: NaiveDate,
        duration_amount: i64,
        duration_unit: &str,
        selected_days: &[bool],
        reminder_times: Vec<NaiveTime>,
    ) -> Result<Self> {
        let duration = DurationSpec::from_signed(duration_amount, duration_unit.parse()?)?;
        let mask = WeekdayMask::from_slice(selected_days)?;
        Self::new(start_date, duration, mask, reminder_times)
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn duration(&self) -> DurationSpec {
        self.duration
    }

    pub fn selected_days(&self) -> &WeekdayMask {
        &self.selected_days
    }

    pub fn reminder_times(&self) -> &[NaiveTime] {
        &self.reminder_times
    }

    pub fn frequency(&self) -> FrequencyTag {
        crate::recurrence::classify_frequency(&self.selected_days)
    }
}

// ============================================================================
// Medicine records
// ============================================================================

/// Validated form output describing one medicine
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MedicineInput {
    pub name: String,
    #[serde(default)]
    pub picture_id: Option<String>,
    pub dosage: String,
    pub strength: String,
    #[serde(default)]
    pub condition: String,
    pub start_date: NaiveDate,
    pub duration_amount: u32,
    pub duration_unit: DurationUnit,
    pub reminder_times: Vec<NaiveTime>,
    pub selected_days: WeekdayMask,
}

impl MedicineInput {
    pub fn duration(&self) -> DurationSpec {
        DurationSpec::new(self.duration_amount, self.duration_unit)
    }

    /// Build the schedule rule, validating the record on the way
    pub fn rule(&self) -> Result<MedicineScheduleRule> {
        MedicineScheduleRule::new(
            self.start_date,
            self.duration(),
            self.selected_days,
            self.reminder_times.clone(),
        )
    }

    /// Check every field the store relies on
    pub fn validate(&self) -> Result<MedicineScheduleRule> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidRule("medicine name is required".into()));
        }
        if let Some(ref picture_id) = self.picture_id {
            if crate::catalog::find_picture(picture_id).is_none() {
                return Err(Error::Catalog(format!("unknown picture id '{}'", picture_id)));
            }
        }
        self.rule()
    }
}

/// A medicine document as persisted for one owner
///
/// `frequency` is written for readers that only want the label. On read it
/// is re-derived from `selected_days`, so a stale stored tag is ignored.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(from = "StoredMedicine")]
pub struct Medicine {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub frequency: FrequencyTag,
    #[serde(flatten)]
    pub input: MedicineInput,
}

#[derive(Deserialize)]
struct StoredMedicine {
    id: Uuid,
    owner_id: Uuid,
    created_at: DateTime<Utc>,
    #[serde(flatten)]
    input: MedicineInput,
}

impl From<StoredMedicine> for Medicine {
    fn from(stored: StoredMedicine) -> Self {
        Self {
            id: stored.id,
            owner_id: stored.owner_id,
            created_at: stored.created_at,
            frequency: crate::recurrence::classify_frequency(&stored.input.selected_days),
            input: stored.input,
        }
    }
}

impl Medicine {
    /// Create a new document for `owner_id`, validating the input
    pub fn new(owner_id: Uuid, input: MedicineInput) -> Result<Self> {
        let rule = input.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            owner_id,
            created_at: Utc::now(),
            frequency: rule.frequency(),
            input,
        })
    }

    pub fn rule(&self) -> Result<MedicineScheduleRule> {
        self.input.rule()
    }

    pub fn name(&self) -> &str {
        &self.input.name
    }
}

/// Locally registered user profile
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}
