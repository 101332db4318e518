use std::sync::Arc;
use std::time::Duration as StdDuration;

use assert_matches::assert_matches;
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use booking_cell::models::{
    Booking, BookingError, BookingStatus, CreateBookingRequest, SlotUnavailableReason,
    TransitionAction, TransitionOutcome,
};
use booking_cell::services::authority::TransitionAuthority;
use booking_cell::services::notifier::ChangeNotifier;
use booking_cell::services::resolver::ConflictResolver;
use booking_cell::services::store::BookingStore;
use clinic_cell::models::{DayHours, RegisterClinicRequest, SetHoursRequest};
use clinic_cell::ClinicDirectoryService;
use shared_models::auth::Actor;

struct Harness {
    directory: Arc<ClinicDirectoryService>,
    store: Arc<BookingStore>,
    authority: TransitionAuthority,
    clinic_id: Uuid,
}

async fn harness() -> Harness {
    let directory = Arc::new(ClinicDirectoryService::new());
    let clinic = directory
        .register(RegisterClinicRequest {
            name: "Riverside Clinic".to_string(),
            timezone: None,
        })
        .await;

    // Open every weekday 08:00-18:00 so relative test dates always land on
    // an open day; individual tests close days as needed.
    for day in 0..7 {
        directory
            .set_hours(
                clinic.id,
                SetHoursRequest {
                    day_of_week: day,
                    hours: Some(DayHours {
                        opens_at: at(8, 0),
                        closes_at: at(18, 0),
                    }),
                },
            )
            .await
            .unwrap();
    }

    let store = Arc::new(BookingStore::new());
    let notifier = ChangeNotifier::new(64);
    let authority = TransitionAuthority::new(
        Arc::clone(&store),
        ConflictResolver::new(Arc::clone(&directory)),
        notifier,
        StdDuration::from_secs(5),
    );

    Harness {
        directory,
        store,
        authority,
        clinic_id: clinic.id,
    }
}

fn at(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

fn days_ahead(days: i64) -> NaiveDate {
    (Utc::now() + Duration::days(days)).date_naive()
}

async fn pending_booking(h: &Harness, patient: &Actor) -> Booking {
    h.authority
        .create_booking(
            patient,
            CreateBookingRequest {
                patient_id: patient.id,
                clinic_id: h.clinic_id,
                doctor_id: Uuid::new_v4(),
                appointment_date: days_ahead(1),
                appointment_time: at(9, 0),
                note: None,
            },
        )
        .await
        .unwrap()
}

async fn confirmed_booking(h: &Harness, patient: &Actor, admin: &Actor) -> Booking {
    let booking = pending_booking(h, patient).await;
    h.authority
        .request_transition(booking.id, admin, TransitionAction::Approve)
        .await
        .unwrap()
        .into_booking()
}

#[tokio::test]
async fn creation_is_reserved_to_the_owning_patient() {
    let h = harness().await;
    let patient = Actor::patient(Uuid::new_v4());
    let admin = Actor::clinic_admin(Uuid::new_v4(), h.clinic_id);

    let request = CreateBookingRequest {
        patient_id: patient.id,
        clinic_id: h.clinic_id,
        doctor_id: Uuid::new_v4(),
        appointment_date: days_ahead(1),
        appointment_time: at(9, 0),
        note: None,
    };

    assert_matches!(
        h.authority.create_booking(&admin, request.clone()).await,
        Err(BookingError::Forbidden(_))
    );

    let booking = h.authority.create_booking(&patient, request).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);
    assert!(booking.confirmed_at.is_none());
}

#[tokio::test]
async fn clinic_admin_approves_a_pending_booking() {
    let h = harness().await;
    let patient = Actor::patient(Uuid::new_v4());
    let admin = Actor::clinic_admin(Uuid::new_v4(), h.clinic_id);

    let booking = pending_booking(&h, &patient).await;
    let outcome = h
        .authority
        .request_transition(booking.id, &admin, TransitionAction::Approve)
        .await
        .unwrap();

    assert!(outcome.was_applied());
    assert_eq!(outcome.booking().status, BookingStatus::Confirmed);
    assert!(outcome.booking().confirmed_at.is_some());
}

#[tokio::test]
async fn patients_may_not_approve() {
    let h = harness().await;
    let patient = Actor::patient(Uuid::new_v4());

    let booking = pending_booking(&h, &patient).await;
    assert_matches!(
        h.authority
            .request_transition(booking.id, &patient, TransitionAction::Approve)
            .await,
        Err(BookingError::Forbidden(_))
    );

    let unchanged = h.store.get(booking.id).await.unwrap();
    assert_eq!(unchanged.status, BookingStatus::Pending);
}

#[tokio::test]
async fn admins_of_other_clinics_are_out_of_scope() {
    let h = harness().await;
    let patient = Actor::patient(Uuid::new_v4());
    let foreign_admin = Actor::clinic_admin(Uuid::new_v4(), Uuid::new_v4());

    let booking = pending_booking(&h, &patient).await;
    assert_matches!(
        h.authority
            .request_transition(booking.id, &foreign_admin, TransitionAction::Approve)
            .await,
        Err(BookingError::Forbidden(_))
    );
}

#[tokio::test]
async fn approving_twice_is_idempotent() {
    let h = harness().await;
    let patient = Actor::patient(Uuid::new_v4());
    let admin = Actor::clinic_admin(Uuid::new_v4(), h.clinic_id);

    let booking = pending_booking(&h, &patient).await;
    let first = h
        .authority
        .request_transition(booking.id, &admin, TransitionAction::Approve)
        .await
        .unwrap();
    let stamp = first.booking().confirmed_at.unwrap();
    let version = first.booking().version;

    let second = h
        .authority
        .request_transition(booking.id, &admin, TransitionAction::Approve)
        .await
        .unwrap();

    assert_matches!(second, TransitionOutcome::AlreadyApplied(_));
    assert_eq!(second.booking().confirmed_at, Some(stamp));
    assert_eq!(second.booking().version, version);
}

#[tokio::test]
async fn cancelling_a_completed_booking_is_illegal() {
    let h = harness().await;
    let patient = Actor::patient(Uuid::new_v4());
    let admin = Actor::clinic_admin(Uuid::new_v4(), h.clinic_id);

    let booking = confirmed_booking(&h, &patient, &admin).await;
    h.authority
        .request_transition(booking.id, &admin, TransitionAction::Complete)
        .await
        .unwrap();

    assert_matches!(
        h.authority
            .request_transition(booking.id, &admin, TransitionAction::Cancel)
            .await,
        Err(BookingError::IllegalTransition { .. })
    );

    let unchanged = h.store.get(booking.id).await.unwrap();
    assert_eq!(unchanged.status, BookingStatus::Completed);
}

#[tokio::test]
async fn patients_cancel_only_their_own_bookings() {
    let h = harness().await;
    let patient = Actor::patient(Uuid::new_v4());
    let stranger = Actor::patient(Uuid::new_v4());

    let booking = pending_booking(&h, &patient).await;
    assert_matches!(
        h.authority
            .request_transition(booking.id, &stranger, TransitionAction::Cancel)
            .await,
        Err(BookingError::Forbidden(_))
    );

    let outcome = h
        .authority
        .request_transition(booking.id, &patient, TransitionAction::Cancel)
        .await
        .unwrap();
    assert_eq!(outcome.booking().status, BookingStatus::Cancelled);
}

#[tokio::test]
async fn reschedule_to_a_closed_day_is_rejected_unchanged() {
    let h = harness().await;
    let patient = Actor::patient(Uuid::new_v4());
    let admin = Actor::clinic_admin(Uuid::new_v4(), h.clinic_id);

    let booking = confirmed_booking(&h, &patient, &admin).await;

    // Close the weekday two days out; it always differs from tomorrow's.
    let target = days_ahead(2);
    h.directory
        .set_hours(
            h.clinic_id,
            SetHoursRequest {
                day_of_week: target.weekday().num_days_from_sunday() as i32,
                hours: None,
            },
        )
        .await
        .unwrap();

    let result = h
        .authority
        .request_transition(
            booking.id,
            &admin,
            TransitionAction::Reschedule {
                new_date: target,
                new_time: at(10, 0),
            },
        )
        .await;

    assert_matches!(
        result,
        Err(BookingError::SlotUnavailable(
            SlotUnavailableReason::ClinicClosedThatDay
        ))
    );

    let unchanged = h.store.get(booking.id).await.unwrap();
    assert_eq!(unchanged.status, BookingStatus::Confirmed);
    assert_eq!(unchanged.appointment_date, booking.appointment_date);
    assert_eq!(unchanged.appointment_time, booking.appointment_time);
}

#[tokio::test]
async fn reschedule_to_a_past_date_is_rejected() {
    let h = harness().await;
    let patient = Actor::patient(Uuid::new_v4());
    let admin = Actor::clinic_admin(Uuid::new_v4(), h.clinic_id);

    let booking = confirmed_booking(&h, &patient, &admin).await;
    let result = h
        .authority
        .request_transition(
            booking.id,
            &admin,
            TransitionAction::Reschedule {
                new_date: days_ahead(-1),
                new_time: at(10, 0),
            },
        )
        .await;

    assert_matches!(
        result,
        Err(BookingError::SlotUnavailable(SlotUnavailableReason::PastDate))
    );
}

#[tokio::test]
async fn reschedule_outside_operating_hours_is_rejected() {
    let h = harness().await;
    let patient = Actor::patient(Uuid::new_v4());
    let admin = Actor::clinic_admin(Uuid::new_v4(), h.clinic_id);

    let booking = confirmed_booking(&h, &patient, &admin).await;
    let result = h
        .authority
        .request_transition(
            booking.id,
            &admin,
            TransitionAction::Reschedule {
                new_date: days_ahead(2),
                new_time: at(22, 0),
            },
        )
        .await;

    assert_matches!(
        result,
        Err(BookingError::SlotUnavailable(
            SlotUnavailableReason::OutsideOperatingHours
        ))
    );
}

#[tokio::test]
async fn re_approval_belongs_to_the_patient_alone() {
    let h = harness().await;
    let patient = Actor::patient(Uuid::new_v4());
    let admin = Actor::clinic_admin(Uuid::new_v4(), h.clinic_id);
    let root = Actor::super_admin(Uuid::new_v4());

    let booking = confirmed_booking(&h, &patient, &admin).await;
    let rescheduled = h
        .authority
        .request_transition(
            booking.id,
            &admin,
            TransitionAction::Reschedule {
                new_date: days_ahead(3),
                new_time: at(10, 0),
            },
        )
        .await
        .unwrap();
    assert_eq!(rescheduled.booking().status, BookingStatus::Rescheduled);

    // Neither the initiating admin nor a super admin can re-approve
    assert_matches!(
        h.authority
            .request_transition(booking.id, &admin, TransitionAction::ReApprove)
            .await,
        Err(BookingError::Forbidden(_))
    );
    assert_matches!(
        h.authority
            .request_transition(booking.id, &root, TransitionAction::ReApprove)
            .await,
        Err(BookingError::Forbidden(_))
    );

    let outcome = h
        .authority
        .request_transition(booking.id, &patient, TransitionAction::ReApprove)
        .await
        .unwrap();
    assert_eq!(outcome.booking().status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn concurrent_approvals_confirm_exactly_once() {
    let h = harness().await;
    let patient = Actor::patient(Uuid::new_v4());
    let admin_one = Actor::clinic_admin(Uuid::new_v4(), h.clinic_id);
    let admin_two = Actor::clinic_admin(Uuid::new_v4(), h.clinic_id);

    let booking = pending_booking(&h, &patient).await;

    let (first, second) = tokio::join!(
        h.authority
            .request_transition(booking.id, &admin_one, TransitionAction::Approve),
        h.authority
            .request_transition(booking.id, &admin_two, TransitionAction::Approve),
    );

    let first = first.unwrap();
    let second = second.unwrap();

    // Exactly one underlying commit; the other observes the applied state
    assert_eq!(
        [first.was_applied(), second.was_applied()]
            .iter()
            .filter(|applied| **applied)
            .count(),
        1
    );
    assert_eq!(first.booking().status, BookingStatus::Confirmed);
    assert_eq!(second.booking().status, BookingStatus::Confirmed);

    let stored = h.store.get(booking.id).await.unwrap();
    assert_eq!(stored.status, BookingStatus::Confirmed);
    assert_eq!(stored.version, 2);
    assert!(stored.confirmed_at.is_some());
}

#[tokio::test]
async fn approval_after_cancellation_is_illegal() {
    let h = harness().await;
    let patient = Actor::patient(Uuid::new_v4());
    let admin = Actor::clinic_admin(Uuid::new_v4(), h.clinic_id);

    let booking = pending_booking(&h, &patient).await;
    h.authority
        .request_transition(booking.id, &patient, TransitionAction::Cancel)
        .await
        .unwrap();

    assert_matches!(
        h.authority
            .request_transition(booking.id, &admin, TransitionAction::Approve)
            .await,
        Err(BookingError::IllegalTransition { .. })
    );
}

#[tokio::test]
async fn purged_booking_surfaces_not_found() {
    let h = harness().await;
    let patient = Actor::patient(Uuid::new_v4());
    let admin = Actor::clinic_admin(Uuid::new_v4(), h.clinic_id);
    let root = Actor::super_admin(Uuid::new_v4());

    let booking = pending_booking(&h, &patient).await;

    assert_matches!(
        h.authority.purge(&admin, booking.id).await,
        Err(BookingError::Forbidden(_))
    );

    h.authority.purge(&root, booking.id).await.unwrap();

    assert_matches!(
        h.authority
            .request_transition(booking.id, &admin, TransitionAction::Approve)
            .await,
        Err(BookingError::NotFound)
    );
}

#[tokio::test]
async fn annotation_is_admin_only() {
    let h = harness().await;
    let patient = Actor::patient(Uuid::new_v4());
    let admin = Actor::clinic_admin(Uuid::new_v4(), h.clinic_id);

    let booking = pending_booking(&h, &patient).await;

    assert_matches!(
        h.authority
            .annotate(&patient, booking.id, "self-note".to_string())
            .await,
        Err(BookingError::Forbidden(_))
    );

    let annotated = h
        .authority
        .annotate(&admin, booking.id, "bring referral letter".to_string())
        .await
        .unwrap();
    assert_eq!(annotated.note.as_deref(), Some("bring referral letter"));
    assert_eq!(annotated.status, BookingStatus::Pending);
}

#[tokio::test]
async fn full_lifecycle_scenario() {
    let h = harness().await;
    let patient = Actor::patient(Uuid::new_v4());
    let admin = Actor::clinic_admin(Uuid::new_v4(), h.clinic_id);
    let root = Actor::super_admin(Uuid::new_v4());

    // Patient books
    let booking = pending_booking(&h, &patient).await;
    assert_eq!(booking.status, BookingStatus::Pending);

    // Clinic admin approves
    let confirmed = h
        .authority
        .request_transition(booking.id, &admin, TransitionAction::Approve)
        .await
        .unwrap();
    assert_eq!(confirmed.booking().status, BookingStatus::Confirmed);
    assert!(confirmed.booking().confirmed_at.is_some());

    // Clinic admin reschedules to a valid slot
    let new_date = days_ahead(3);
    let rescheduled = h
        .authority
        .request_transition(
            booking.id,
            &admin,
            TransitionAction::Reschedule {
                new_date,
                new_time: at(10, 0),
            },
        )
        .await
        .unwrap();
    assert_eq!(rescheduled.booking().status, BookingStatus::Rescheduled);
    assert_eq!(rescheduled.booking().appointment_date, new_date);
    assert_eq!(rescheduled.booking().appointment_time, at(10, 0));

    // Patient re-approves the new slot
    let reconfirmed = h
        .authority
        .request_transition(booking.id, &patient, TransitionAction::ReApprove)
        .await
        .unwrap();
    assert_eq!(reconfirmed.booking().status, BookingStatus::Confirmed);

    // Super admin cancels; the state is terminal from here
    let cancelled = h
        .authority
        .request_transition(booking.id, &root, TransitionAction::Cancel)
        .await
        .unwrap();
    assert_eq!(cancelled.booking().status, BookingStatus::Cancelled);

    assert_matches!(
        h.authority
            .request_transition(booking.id, &admin, TransitionAction::Approve)
            .await,
        Err(BookingError::IllegalTransition { .. })
    );
}
