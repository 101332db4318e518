// libs/clinic-cell/src/services/directory.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Utc, Weekday};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    Clinic, ClinicError, DayHours, RegisterClinicRequest, SetHoursRequest, WeeklyHours,
};

#[derive(Debug)]
struct ClinicRecord {
    clinic: Clinic,
    hours: WeeklyHours,
}

/// Registry of clinics and their weekly operating hours. The conflict
/// resolver consults it for every reschedule; admins maintain it over HTTP.
pub struct ClinicDirectoryService {
    clinics: Arc<RwLock<HashMap<Uuid, ClinicRecord>>>,
}

impl ClinicDirectoryService {
    pub fn new() -> Self {
        Self {
            clinics: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a clinic. New clinics start closed on every weekday.
    pub async fn register(&self, request: RegisterClinicRequest) -> Clinic {
        let now = Utc::now();
        let clinic = Clinic {
            id: Uuid::new_v4(),
            name: request.name,
            timezone: request.timezone.unwrap_or_else(|| "UTC".to_string()),
            created_at: now,
            updated_at: now,
        };

        let mut clinics = self.clinics.write().await;
        clinics.insert(
            clinic.id,
            ClinicRecord {
                clinic: clinic.clone(),
                hours: WeeklyHours::closed(),
            },
        );

        info!("Registered clinic {} ({})", clinic.id, clinic.name);
        clinic
    }

    pub async fn get(&self, clinic_id: Uuid) -> Result<Clinic, ClinicError> {
        let clinics = self.clinics.read().await;
        clinics
            .get(&clinic_id)
            .map(|record| record.clinic.clone())
            .ok_or(ClinicError::NotFound)
    }

    pub async fn list(&self) -> Vec<Clinic> {
        let clinics = self.clinics.read().await;
        let mut all: Vec<Clinic> = clinics.values().map(|r| r.clinic.clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub async fn set_hours(
        &self,
        clinic_id: Uuid,
        request: SetHoursRequest,
    ) -> Result<WeeklyHours, ClinicError> {
        if !(0..=6).contains(&request.day_of_week) {
            return Err(ClinicError::InvalidDay(request.day_of_week));
        }

        if let Some(hours) = &request.hours {
            if hours.opens_at >= hours.closes_at {
                return Err(ClinicError::InvalidHours(
                    "Opening time must be before closing time".to_string(),
                ));
            }
        }

        let mut clinics = self.clinics.write().await;
        let record = clinics.get_mut(&clinic_id).ok_or(ClinicError::NotFound)?;

        record.hours.set(request.day_of_week as usize, request.hours);
        record.clinic.updated_at = Utc::now();

        debug!(
            "Updated hours for clinic {} on day {}",
            clinic_id, request.day_of_week
        );
        Ok(record.hours.clone())
    }

    pub async fn weekly_hours(&self, clinic_id: Uuid) -> Result<WeeklyHours, ClinicError> {
        let clinics = self.clinics.read().await;
        clinics
            .get(&clinic_id)
            .map(|record| record.hours.clone())
            .ok_or(ClinicError::NotFound)
    }

    /// Opening window for the given weekday, `None` when closed that day.
    pub async fn hours_on(
        &self,
        clinic_id: Uuid,
        weekday: Weekday,
    ) -> Result<Option<DayHours>, ClinicError> {
        let clinics = self.clinics.read().await;
        clinics
            .get(&clinic_id)
            .map(|record| record.hours.on(weekday))
            .ok_or(ClinicError::NotFound)
    }
}

impl Default for ClinicDirectoryService {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ClinicDirectoryService {
    fn clone(&self) -> Self {
        Self {
            clinics: Arc::clone(&self.clinics),
        }
    }
}
