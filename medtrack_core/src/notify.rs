//! Reminder notification planning.
//!
//! Turns medicines into the `(date, time, name, id)` tuples a platform alarm
//! API needs. Delivery sits behind [`NotificationScheduler`]; callers decide
//! when to hand requests over.

use crate::config::NotificationConfig;
use crate::recurrence::expand_occurrences;
use crate::{Medicine, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

/// One reminder to register with the platform
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationRequest {
    pub occurrence_date: NaiveDate,
    pub reminder_time: NaiveTime,
    pub medicine_name: String,
    pub medicine_id: Uuid,
}

impl NotificationRequest {
    pub fn fires_at(&self) -> NaiveDateTime {
        self.occurrence_date.and_time(self.reminder_time)
    }

    pub fn message(&self) -> String {
        format!("Time to take your {}", self.medicine_name)
    }
}

/// Collect every reminder due in `from..=to`, in firing order
pub fn plan_notifications(
    medicines: &[Medicine],
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<NotificationRequest> {
    let mut requests = Vec::new();

    for medicine in medicines {
        let Ok(rule) = medicine.rule() else {
            tracing::warn!("Not scheduling medicine {} with invalid rule", medicine.id);
            continue;
        };

        requests.extend(
            expand_occurrences(&rule, Some(from), Some(to))
                .dose_slots()
                .map(|slot| NotificationRequest {
                    occurrence_date: slot.date,
                    reminder_time: slot.time,
                    medicine_name: medicine.input.name.clone(),
                    medicine_id: medicine.id,
                }),
        );
    }

    requests.sort_by(|a, b| {
        a.fires_at()
            .cmp(&b.fires_at())
            .then_with(|| a.medicine_name.cmp(&b.medicine_name))
    });
    requests
}

/// Platform notification seam
pub trait NotificationScheduler {
    fn schedule(&mut self, request: &NotificationRequest) -> Result<()>;
}

/// Scheduler that only records and logs what it was asked to do
#[derive(Debug)]
pub struct LogScheduler {
    config: NotificationConfig,
    scheduled: Vec<NotificationRequest>,
}

impl LogScheduler {
    pub fn new(config: NotificationConfig) -> Self {
        Self {
            config,
            scheduled: Vec::new(),
        }
    }

    pub fn scheduled(&self) -> &[NotificationRequest] {
        &self.scheduled
    }
}

impl NotificationScheduler for LogScheduler {
    fn schedule(&mut self, request: &NotificationRequest) -> Result<()> {
        tracing::info!(
            channel = %self.config.channel_id,
            medicine_id = %request.medicine_id,
            "{}: {} at {}",
            self.config.title,
            request.message(),
            request.fires_at()
        );
        self.scheduled.push(request.clone());
        Ok(())
    }
}

/// Hand every request to the scheduler; returns how many were scheduled
pub fn schedule_all<S: NotificationScheduler>(
    scheduler: &mut S,
    requests: &[NotificationRequest],
) -> Result<usize> {
    for request in requests {
        scheduler.schedule(request)?;
    }
    Ok(requests.len())
}
