//! Three-step add-medicine wizard.
//!
//! The form state is a single `MedicineDraft` value carried through explicit
//! transitions:
//!
//! ```text
//! Identity -> Dosing -> Schedule -> Submitted(MedicineInput)
//! ```
//!
//! Each `next()` validates the step being left. Edits consume the draft and
//! return a new one.

use crate::recurrence::{classify_frequency, end_date, mask_for_frequency};
use crate::{
    catalog, DurationUnit, Error, FrequencyTag, MedicineInput, Result, WeekdayMask,
};
use chrono::{NaiveDate, NaiveTime};

/// Accumulated form values
#[derive(Clone, Debug, PartialEq)]
pub struct MedicineDraft {
    pub name: String,
    pub picture_id: Option<String>,
    pub dosage: String,
    pub strength: String,
    pub condition: String,
    pub start_date: NaiveDate,
    pub duration_amount: u32,
    pub duration_unit: DurationUnit,
    /// Frequency option the user picked; `Custom` keeps the mask as edited
    pub frequency: FrequencyTag,
    pub selected_days: WeekdayMask,
    pub reminder_times: Vec<NaiveTime>,
}

impl MedicineDraft {
    pub fn new(start_date: NaiveDate, default_reminder: NaiveTime) -> Self {
        Self {
            name: String::new(),
            picture_id: None,
            dosage: "0".into(),
            strength: "0".into(),
            condition: String::new(),
            start_date,
            duration_amount: 0,
            duration_unit: DurationUnit::Days,
            frequency: FrequencyTag::Everyday,
            selected_days: WeekdayMask::EVERYDAY,
            reminder_times: vec![default_reminder],
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_picture(mut self, picture_id: Option<String>) -> Self {
        self.picture_id = picture_id;
        self
    }

    pub fn with_dosage(mut self, dosage: impl Into<String>) -> Self {
        self.dosage = dosage.into();
        self
    }

    pub fn with_strength(mut self, strength: impl Into<String>) -> Self {
        self.strength = strength.into();
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = condition.into();
        self
    }

    pub fn with_start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = start_date;
        self
    }

    pub fn with_duration(mut self, amount: u32, unit: DurationUnit) -> Self {
        self.duration_amount = amount;
        self.duration_unit = unit;
        self
    }

    /// Pick a frequency option; named options overwrite the weekday mask
    pub fn with_frequency(mut self, frequency: FrequencyTag) -> Self {
        self.frequency = frequency;
        if let Some(mask) = mask_for_frequency(frequency) {
            self.selected_days = mask;
        }
        self
    }

    /// Replace the weekday mask and re-derive the frequency option
    pub fn with_selected_days(mut self, mask: WeekdayMask) -> Self {
        self.selected_days = mask;
        self.frequency = classify_frequency(&mask);
        self
    }

    /// Flip one weekday (0 = Sunday) and re-derive the frequency option
    pub fn toggle_day(self, index: usize) -> Self {
        let mask = self.selected_days.toggled(index);
        self.with_selected_days(mask)
    }

    pub fn add_reminder(mut self, time: NaiveTime) -> Self {
        self.reminder_times.push(time);
        self
    }

    pub fn set_reminder(mut self, index: usize, time: NaiveTime) -> Self {
        if let Some(slot) = self.reminder_times.get_mut(index) {
            *slot = time;
        }
        self
    }

    pub fn remove_reminder(mut self, index: usize) -> Self {
        if index < self.reminder_times.len() {
            self.reminder_times.remove(index);
        }
        self
    }

    fn to_input(&self) -> MedicineInput {
        let mut reminder_times = self.reminder_times.clone();
        reminder_times.sort();
        reminder_times.dedup();

        MedicineInput {
            name: self.name.trim().to_string(),
            picture_id: self.picture_id.clone(),
            dosage: self.dosage.trim().to_string(),
            strength: self.strength.trim().to_string(),
            condition: self.condition.trim().to_string(),
            start_date: self.start_date,
            duration_amount: self.duration_amount,
            duration_unit: self.duration_unit,
            reminder_times,
            selected_days: self.selected_days,
        }
    }
}

/// Wizard position
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WizardStep {
    Identity,
    Dosing,
    Schedule,
    Submitted,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Wizard {
    Identity(MedicineDraft),
    Dosing(MedicineDraft),
    Schedule(MedicineDraft),
    Submitted(MedicineInput),
}

impl Wizard {
    pub fn start(draft: MedicineDraft) -> Self {
        Wizard::Identity(draft)
    }

    pub fn step(&self) -> WizardStep {
        match self {
            Wizard::Identity(_) => WizardStep::Identity,
            Wizard::Dosing(_) => WizardStep::Dosing,
            Wizard::Schedule(_) => WizardStep::Schedule,
            Wizard::Submitted(_) => WizardStep::Submitted,
        }
    }

    pub fn draft(&self) -> Option<&MedicineDraft> {
        match self {
            Wizard::Identity(d) | Wizard::Dosing(d) | Wizard::Schedule(d) => Some(d),
            Wizard::Submitted(_) => None,
        }
    }

    /// Apply an edit to the draft; a submitted wizard is returned unchanged
    pub fn edit<F>(self, f: F) -> Self
    where
        F: FnOnce(MedicineDraft) -> MedicineDraft,
    {
        match self {
            Wizard::Identity(d) => Wizard::Identity(f(d)),
            Wizard::Dosing(d) => Wizard::Dosing(f(d)),
            Wizard::Schedule(d) => Wizard::Schedule(f(d)),
            submitted @ Wizard::Submitted(_) => submitted,
        }
    }

    /// Check the current step without moving
    pub fn validate_current(&self) -> Result<()> {
        match self {
            Wizard::Identity(d) => validate_identity(d),
            Wizard::Dosing(d) => validate_dosing(d),
            Wizard::Schedule(d) => validate_schedule(d).map(|_| ()),
            Wizard::Submitted(_) => Err(Error::Wizard("medicine already submitted".into())),
        }
    }

    /// Validate the current step and advance
    ///
    /// The wizard is consumed; clone it first, or call
    /// [`Wizard::validate_current`], to keep the state on failure.
    pub fn next(self) -> Result<Self> {
        match self {
            Wizard::Identity(d) => {
                validate_identity(&d)?;
                Ok(Wizard::Dosing(d))
            }
            Wizard::Dosing(d) => {
                validate_dosing(&d)?;
                Ok(Wizard::Schedule(d))
            }
            Wizard::Schedule(d) => {
                let input = validate_schedule(&d)?;
                tracing::debug!("Wizard submitted medicine '{}'", input.name);
                Ok(Wizard::Submitted(input))
            }
            Wizard::Submitted(_) => Err(Error::Wizard("medicine already submitted".into())),
        }
    }

    /// Step back; `None` means the user backed out of the first step
    pub fn back(self) -> Option<Self> {
        match self {
            Wizard::Identity(_) => None,
            Wizard::Dosing(d) => Some(Wizard::Identity(d)),
            Wizard::Schedule(d) => Some(Wizard::Dosing(d)),
            submitted @ Wizard::Submitted(_) => Some(submitted),
        }
    }

    pub fn into_submitted(self) -> Option<MedicineInput> {
        match self {
            Wizard::Submitted(input) => Some(input),
            _ => None,
        }
    }

    /// Drive every step in order, returning the submitted input
    pub fn complete(draft: MedicineDraft) -> Result<MedicineInput> {
        let mut wizard = Wizard::start(draft);
        while wizard.step() != WizardStep::Submitted {
            wizard = wizard.next()?;
        }
        wizard
            .into_submitted()
            .ok_or_else(|| Error::Wizard("wizard did not submit".into()))
    }
}

fn validate_identity(draft: &MedicineDraft) -> Result<()> {
    if draft.name.trim().is_empty() {
        return Err(Error::Wizard("medicine name is required".into()));
    }
    if let Some(ref picture_id) = draft.picture_id {
        if catalog::find_picture(picture_id).is_none() {
            return Err(Error::Catalog(format!("unknown picture id '{}'", picture_id)));
        }
    }
    Ok(())
}

fn validate_quantity(label: &str, value: &str) -> Result<()> {
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(()),
        _ => Err(Error::Wizard(format!(
            "{} must be a non-negative number, got '{}'",
            label, value
        ))),
    }
}

fn validate_dosing(draft: &MedicineDraft) -> Result<()> {
    validate_quantity("dosage", &draft.dosage)?;
    validate_quantity("strength", &draft.strength)?;
    end_date(draft.start_date, draft.duration_amount, draft.duration_unit).ok_or_else(|| {
        Error::InvalidRule(format!(
            "{} {} from {} overflows the supported date range",
            draft.duration_amount, draft.duration_unit, draft.start_date
        ))
    })?;
    Ok(())
}

fn validate_schedule(draft: &MedicineDraft) -> Result<MedicineInput> {
    if draft.reminder_times.is_empty() {
        return Err(Error::Wizard("add at least one reminder time".into()));
    }
    if draft.selected_days.is_empty() {
        tracing::warn!("No weekdays selected; '{}' will never be due", draft.name.trim());
    }

    let input = draft.to_input();
    input.validate()?;
    Ok(input)
}
