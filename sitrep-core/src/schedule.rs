use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

/// Fires once per UTC day for the routine broadcast report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutineSchedule {
    last_day: NaiveDate,
}

impl RoutineSchedule {
    /// The day containing `now` counts as already reported
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            last_day: now.date_naive(),
        }
    }

    pub fn last_day(&self) -> NaiveDate {
        self.last_day
    }

    /// On the first check of a new day, returns the report timestamp (0000Z of that day)
    pub fn due(&mut self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = now.date_naive();
        if today <= self.last_day {
            return None;
        }
        self.last_day = today;
        info!("SITREP: new day {today} started, routine report due");
        today.and_hms_opt(0, 0, 0).map(|midnight| midnight.and_utc())
    }
}
