#![forbid(unsafe_code)]

//! Core domain model and business logic for Medtrack.
//!
//! This crate provides:
//! - Domain types (schedule rules, weekday masks, medicine records)
//! - Recurrence engine (frequency tags, calendar occurrences)
//! - Add-medicine wizard
//! - Persistence (JSONL medicine store, session state)
//! - Calendar index, reminder planning and CSV export

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod recurrence;
pub mod wizard;
pub mod lockfile;
pub mod store;
pub mod session;
pub mod client;
pub mod calendar;
pub mod notify;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use recurrence::{
    classify_frequency, days_from_duration, expand_occurrences, mask_for_frequency, DoseSlot,
    Occurrence, Occurrences,
};
pub use wizard::{MedicineDraft, Wizard, WizardStep};
pub use store::{JsonlStore, MedicineStore};
pub use session::{Registration, SessionState};
pub use client::ClientContext;
pub use calendar::{AgendaEntry, CalendarIndex};
pub use notify::{plan_notifications, NotificationRequest, NotificationScheduler};
