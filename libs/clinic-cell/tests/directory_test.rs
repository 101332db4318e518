use assert_matches::assert_matches;
use chrono::{NaiveTime, Weekday};
use uuid::Uuid;

use clinic_cell::models::{ClinicError, DayHours, RegisterClinicRequest, SetHoursRequest};
use clinic_cell::ClinicDirectoryService;

fn at(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

fn weekday_hours(opens: NaiveTime, closes: NaiveTime) -> Option<DayHours> {
    Some(DayHours {
        opens_at: opens,
        closes_at: closes,
    })
}

#[tokio::test]
async fn register_then_get_round_trips() {
    let directory = ClinicDirectoryService::new();
    let clinic = directory
        .register(RegisterClinicRequest {
            name: "Northgate Clinic".to_string(),
            timezone: Some("Europe/Berlin".to_string()),
        })
        .await;

    let fetched = directory.get(clinic.id).await.unwrap();
    assert_eq!(fetched.name, "Northgate Clinic");
    assert_eq!(fetched.timezone, "Europe/Berlin");

    assert_matches!(
        directory.get(Uuid::new_v4()).await,
        Err(ClinicError::NotFound)
    );
}

#[tokio::test]
async fn new_clinics_start_closed_every_day() {
    let directory = ClinicDirectoryService::new();
    let clinic = directory
        .register(RegisterClinicRequest {
            name: "Southside Clinic".to_string(),
            timezone: None,
        })
        .await;

    for weekday in [
        Weekday::Sun,
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
    ] {
        assert!(directory.hours_on(clinic.id, weekday).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn set_hours_validates_day_and_window() {
    let directory = ClinicDirectoryService::new();
    let clinic = directory
        .register(RegisterClinicRequest {
            name: "Eastpark Clinic".to_string(),
            timezone: None,
        })
        .await;

    assert_matches!(
        directory
            .set_hours(
                clinic.id,
                SetHoursRequest {
                    day_of_week: 7,
                    hours: weekday_hours(at(9, 0), at(17, 0)),
                },
            )
            .await,
        Err(ClinicError::InvalidDay(7))
    );

    assert_matches!(
        directory
            .set_hours(
                clinic.id,
                SetHoursRequest {
                    day_of_week: 1,
                    hours: weekday_hours(at(17, 0), at(9, 0)),
                },
            )
            .await,
        Err(ClinicError::InvalidHours(_))
    );

    assert_matches!(
        directory
            .set_hours(
                Uuid::new_v4(),
                SetHoursRequest {
                    day_of_week: 1,
                    hours: weekday_hours(at(9, 0), at(17, 0)),
                },
            )
            .await,
        Err(ClinicError::NotFound)
    );
}

#[tokio::test]
async fn hours_report_per_weekday() {
    let directory = ClinicDirectoryService::new();
    let clinic = directory
        .register(RegisterClinicRequest {
            name: "Westbrook Clinic".to_string(),
            timezone: None,
        })
        .await;

    // Monday is day 1 counted from Sunday
    directory
        .set_hours(
            clinic.id,
            SetHoursRequest {
                day_of_week: 1,
                hours: weekday_hours(at(8, 30), at(16, 30)),
            },
        )
        .await
        .unwrap();

    let monday = directory
        .hours_on(clinic.id, Weekday::Mon)
        .await
        .unwrap()
        .expect("Monday should be open");
    assert_eq!(monday.opens_at, at(8, 30));
    assert_eq!(monday.closes_at, at(16, 30));

    assert!(directory
        .hours_on(clinic.id, Weekday::Tue)
        .await
        .unwrap()
        .is_none());

    // Closing a day again removes the window
    directory
        .set_hours(
            clinic.id,
            SetHoursRequest {
                day_of_week: 1,
                hours: None,
            },
        )
        .await
        .unwrap();
    assert!(directory
        .hours_on(clinic.id, Weekday::Mon)
        .await
        .unwrap()
        .is_none());
}
