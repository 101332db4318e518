// libs/clinic-cell/src/models.rs
use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clinic {
    pub id: Uuid,
    pub name: String,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Opening window for a single weekday. Open is inclusive, close exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayHours {
    pub opens_at: NaiveTime,
    pub closes_at: NaiveTime,
}

/// One entry per weekday, indexed 0 (Sunday) through 6 (Saturday).
/// `None` marks the clinic closed that day.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeeklyHours {
    pub days: [Option<DayHours>; 7],
}

impl WeeklyHours {
    /// A schedule with every day closed. Hours are opted into per weekday.
    pub fn closed() -> Self {
        Self::default()
    }

    pub fn on(&self, weekday: Weekday) -> Option<DayHours> {
        self.days[weekday.num_days_from_sunday() as usize]
    }

    pub fn set(&mut self, day_of_week: usize, hours: Option<DayHours>) {
        self.days[day_of_week] = hours;
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterClinicRequest {
    pub name: String,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetHoursRequest {
    /// 0 (Sunday) through 6 (Saturday).
    pub day_of_week: i32,
    /// `None` closes the clinic on that day.
    pub hours: Option<DayHours>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ClinicError {
    #[error("Clinic not found")]
    NotFound,

    #[error("Day of week must be between 0 (Sunday) and 6 (Saturday), got {0}")]
    InvalidDay(i32),

    #[error("Invalid hours: {0}")]
    InvalidHours(String),
}
