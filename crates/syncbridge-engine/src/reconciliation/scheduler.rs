//! Reconciliation scheduling for automatic runs.
//!
//! Computes the next run time for a schedule and drives triggered runs until
//! shutdown is signalled.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use super::runner::ReconciliationScope;
use super::trigger::ReconciliationTrigger;

/// Schedule frequency options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleFrequency {
    /// Every hour.
    Hourly,
    /// Every day.
    Daily,
    /// Every week.
    Weekly,
}

impl std::fmt::Display for ScheduleFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hourly => write!(f, "hourly"),
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
        }
    }
}

impl std::str::FromStr for ScheduleFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            _ => Err(format!("Invalid schedule frequency: {s}")),
        }
    }
}

/// Configuration for a reconciliation schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Schedule frequency.
    pub frequency: ScheduleFrequency,
    /// Hour of day (0-23 UTC).
    pub hour_of_day: u8,
    /// Day of week for weekly (0=Sunday, 6=Saturday).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<u8>,
    /// Scope of each scheduled run.
    pub scope: ReconciliationScope,
}

impl ScheduleConfig {
    #[must_use]
    pub fn new(frequency: ScheduleFrequency, scope: ReconciliationScope) -> Self {
        Self {
            frequency,
            hour_of_day: 2, // Default: 2 AM UTC
            day_of_week: None,
            scope,
        }
    }

    /// Set day of week for weekly schedule.
    #[must_use]
    pub fn with_day_of_week(mut self, day: u8) -> Self {
        self.day_of_week = Some(day.min(6));
        self
    }

    /// Set hour of day.
    #[must_use]
    pub fn with_hour(mut self, hour: u8) -> Self {
        self.hour_of_day = hour.min(23);
        self
    }

    /// Validate the schedule configuration.
    pub fn validate(&self) -> Result<(), String> {
        match self.frequency {
            ScheduleFrequency::Weekly if self.day_of_week.is_none() => {
                Err("day_of_week is required for weekly schedule".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// `hour`:00 UTC on the calendar day of `at`.
fn at_hour(at: DateTime<Utc>, hour: u8) -> Option<DateTime<Utc>> {
    at.date_naive()
        .and_hms_opt(u32::from(hour), 0, 0)
        .map(|naive| naive.and_utc())
}

/// Scheduler for reconciliation runs.
pub struct ReconciliationScheduler;

impl ReconciliationScheduler {
    /// First scheduled instant strictly after `from`.
    #[must_use]
    pub fn calculate_next_run(
        config: &ScheduleConfig,
        from: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let (anchor, period) = match config.frequency {
            ScheduleFrequency::Hourly => (
                from.with_minute(0)?.with_second(0)?.with_nanosecond(0)?,
                Duration::hours(1),
            ),
            ScheduleFrequency::Daily => (at_hour(from, config.hour_of_day)?, Duration::days(1)),
            ScheduleFrequency::Weekly => {
                let wanted = i64::from(config.day_of_week.unwrap_or(0).min(6));
                let today = i64::from(from.weekday().num_days_from_sunday());
                (
                    at_hour(from, config.hour_of_day)? + Duration::days(wanted - today),
                    Duration::weeks(1),
                )
            }
        };

        // The anchor is less than one period before `from`.
        Some(if anchor > from { anchor } else { anchor + period })
    }

    /// Trigger runs on schedule until `shutdown` flips to `true` or its sender
    /// is dropped. Runs are not awaited; an overrunning report overlaps the next.
    pub async fn run(
        trigger: ReconciliationTrigger,
        config: ScheduleConfig,
        mut shutdown: watch::Receiver<bool>,
    ) {
        if let Err(reason) = config.validate() {
            warn!(reason = %reason, "Invalid reconciliation schedule, scheduler not started");
            return;
        }

        loop {
            if *shutdown.borrow() {
                break;
            }

            let now = Utc::now();
            let Some(next_run) = Self::calculate_next_run(&config, now) else {
                warn!(frequency = %config.frequency, "Could not compute next run time");
                return;
            };
            let wait = (next_run - now).to_std().unwrap_or_default();

            info!(
                reconciliation = %trigger.runner().kind().name(),
                frequency = %config.frequency,
                next_run = %next_run,
                "Next reconciliation scheduled"
            );

            tokio::select! {
                () = tokio::time::sleep(wait) => {
                    let accepted = trigger.trigger(config.scope.clone());
                    info!(run_id = %accepted.run_id, "Scheduled reconciliation started");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Reconciliation scheduler stopped");
    }
}
