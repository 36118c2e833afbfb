//! Appointment conflict detection and free-slot suggestion.
//!
//! Every check is a linear scan over one day's appointments for one dentist.
//! An appointment occupies the half-open minute interval
//! `[start, start + duration)`, so back-to-back bookings do not conflict.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{Appointment, AppointmentStatus};

/// 08:00
pub const WORK_START_MIN: u32 = 8 * 60;
/// 18:00
pub const WORK_END_MIN: u32 = 18 * 60;
pub const SLOT_STEP_MIN: u32 = 30;
pub const DEFAULT_SLOT_DURATION_MIN: u32 = 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TimeOfDayError {
    #[error("time must be HH:MM, got {0:?}")]
    Malformed(String),
    #[error("time out of range: {0:?}")]
    OutOfRange(String),
}

impl From<TimeOfDayError> for ApiError {
    fn from(e: TimeOfDayError) -> Self {
        ApiError::BadRequest("VALIDATION_ERROR", e.to_string())
    }
}

/// Minutes since midnight for an `"HH:MM"` string.
pub fn parse_time_of_day(value: &str) -> Result<u32, TimeOfDayError> {
    let malformed = || TimeOfDayError::Malformed(value.to_string());

    let (h, m) = value.trim().split_once(':').ok_or_else(malformed)?;
    let is_part = |s: &str| (1..=2).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit());
    if !is_part(h) || !is_part(m) {
        return Err(malformed());
    }

    let hours: u32 = h.parse().map_err(|_| malformed())?;
    let minutes: u32 = m.parse().map_err(|_| malformed())?;
    if hours > 23 || minutes > 59 {
        return Err(TimeOfDayError::OutOfRange(value.to_string()));
    }
    Ok(hours * 60 + minutes)
}

pub fn format_time_of_day(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: u32,
    pub end: u32,
}

impl Interval {
    pub fn new(start: u32, duration: u32) -> Self {
        Interval {
            start,
            end: start.saturating_add(duration),
        }
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && self.end > other.start
    }
}

/// Interval a stored appointment blocks. Appointments with an unreadable
/// time or a non-positive duration block nothing.
fn occupied(apt: &Appointment) -> Option<Interval> {
    let start = match parse_time_of_day(&apt.appointment_time) {
        Ok(start) => start,
        Err(e) => {
            tracing::warn!(appointment_id = %apt.id, error = %e, "skipping appointment with bad time");
            return None;
        }
    };
    let duration = u32::try_from(apt.duration).ok()?;
    Some(Interval::new(start, duration))
}

/// Appointments of `dentist` that still hold their slot.
fn blocking<'a>(
    day: &'a [Appointment],
    dentist: &str,
    exclude: Option<Uuid>,
) -> impl Iterator<Item = (&'a Appointment, Interval)> {
    day.iter()
        .filter(move |apt| Some(apt.id) != exclude)
        .filter(move |apt| apt.dentist == dentist)
        .filter(|apt| apt.status != AppointmentStatus::Cancelado)
        .filter_map(|apt| occupied(apt).map(|iv| (apt, iv)))
}

/// Appointments in `day` that overlap a booking of `dentist` at `time` for
/// `duration` minutes.
pub fn find_conflicts<'a>(
    day: &'a [Appointment],
    time: &str,
    duration: u32,
    dentist: &str,
    exclude: Option<Uuid>,
) -> Result<Vec<&'a Appointment>, TimeOfDayError> {
    let wanted = Interval::new(parse_time_of_day(time)?, duration);

    Ok(blocking(day, dentist, exclude)
        .filter(|(_, iv)| wanted.overlaps(iv))
        .map(|(apt, _)| apt)
        .collect())
}

/// Start times between 08:00 and 18:00, on the 30 minute grid, at which
/// `dentist` is free for `duration` minutes.
pub fn available_slots(day: &[Appointment], dentist: &str, duration: u32) -> Vec<String> {
    let taken: Vec<Interval> = blocking(day, dentist, None).map(|(_, iv)| iv).collect();

    let mut slots = Vec::new();
    let mut start = WORK_START_MIN;
    while start.saturating_add(duration) <= WORK_END_MIN {
        let candidate = Interval::new(start, duration);
        if !taken.iter().any(|iv| candidate.overlaps(iv)) {
            slots.push(format_time_of_day(start));
        }
        start += SLOT_STEP_MIN;
    }
    slots
}

/// Source of the appointments booked on a given day.
#[async_trait]
pub trait DayAgenda: Send + Sync {
    async fn appointments_on(&self, date: NaiveDate) -> Result<Vec<Appointment>, ApiError>;
}

pub async fn check_time_conflicts<A>(
    agenda: &A,
    date: NaiveDate,
    time: &str,
    duration: u32,
    dentist: &str,
    exclude: Option<Uuid>,
) -> Result<Vec<Appointment>, ApiError>
where
    A: DayAgenda + ?Sized,
{
    // reject bad input before touching the store
    parse_time_of_day(time)?;

    let day = agenda.appointments_on(date).await?;
    let conflicts = find_conflicts(&day, time, duration, dentist, exclude)?
        .into_iter()
        .cloned()
        .collect::<Vec<_>>();

    if !conflicts.is_empty() {
        tracing::debug!(%date, time, dentist, count = conflicts.len(), "schedule conflict");
    }
    Ok(conflicts)
}

pub async fn get_available_slots<A>(
    agenda: &A,
    date: NaiveDate,
    dentist: &str,
    duration: u32,
) -> Result<Vec<String>, ApiError>
where
    A: DayAgenda + ?Sized,
{
    let day = agenda.appointments_on(date).await?;
    Ok(available_slots(&day, dentist, duration))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use chrono::Utc;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 12).unwrap()
    }

    fn apt(dentist: &str, time: &str, duration: i32, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_name: "Ana Silva".into(),
            patient_phone: "(11) 91234-5678".into(),
            patient_email: None,
            appointment_date: day(),
            appointment_time: time.into(),
            duration,
            service: "Limpeza".into(),
            dentist: dentist.into(),
            notes: None,
            status,
            priority: Priority::Normal,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    struct MemoryAgenda(Vec<Appointment>);

    #[async_trait]
    impl DayAgenda for MemoryAgenda {
        async fn appointments_on(&self, date: NaiveDate) -> Result<Vec<Appointment>, ApiError> {
            Ok(self
                .0
                .iter()
                .filter(|a| a.appointment_date == date)
                .cloned()
                .collect())
        }
    }

    #[test]
    fn parses_and_formats_times() {
        assert_eq!(parse_time_of_day("09:30"), Ok(570));
        assert_eq!(parse_time_of_day("9:05"), Ok(545));
        assert_eq!(parse_time_of_day("00:00"), Ok(0));
        assert_eq!(format_time_of_day(570), "09:30");
        assert_eq!(format_time_of_day(8 * 60), "08:00");
    }

    #[test]
    fn rejects_bad_times() {
        assert!(matches!(parse_time_of_day(""), Err(TimeOfDayError::Malformed(_))));
        assert!(matches!(parse_time_of_day("0930"), Err(TimeOfDayError::Malformed(_))));
        assert!(matches!(parse_time_of_day("9:3a"), Err(TimeOfDayError::Malformed(_))));
        assert!(matches!(parse_time_of_day("24:00"), Err(TimeOfDayError::OutOfRange(_))));
        assert!(matches!(parse_time_of_day("12:60"), Err(TimeOfDayError::OutOfRange(_))));
    }

    #[test]
    fn overlapping_booking_same_dentist_conflicts() {
        let day = vec![apt("Dr. A", "09:00", 60, AppointmentStatus::Agendado)];

        let hits = find_conflicts(&day, "09:30", 30, "Dr. A", None).unwrap();
        assert_eq!(hits.len(), 1);

        let hits = find_conflicts(&day, "09:30", 30, "Dr. B", None).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn touching_intervals_do_not_conflict() {
        let day = vec![apt("Dr. A", "09:00", 60, AppointmentStatus::Confirmado)];
        assert!(find_conflicts(&day, "10:00", 30, "Dr. A", None).unwrap().is_empty());
        assert!(find_conflicts(&day, "08:30", 30, "Dr. A", None).unwrap().is_empty());
        assert_eq!(find_conflicts(&day, "08:30", 31, "Dr. A", None).unwrap().len(), 1);
    }

    #[test]
    fn cancelled_and_excluded_are_ignored() {
        let cancelled = apt("Dr. A", "09:00", 60, AppointmentStatus::Cancelado);
        let own = apt("Dr. A", "11:00", 60, AppointmentStatus::Agendado);
        let own_id = own.id;
        let day = vec![cancelled, own];

        assert!(find_conflicts(&day, "09:15", 30, "Dr. A", None).unwrap().is_empty());
        assert!(find_conflicts(&day, "11:30", 30, "Dr. A", Some(own_id)).unwrap().is_empty());
        assert_eq!(find_conflicts(&day, "11:30", 30, "Dr. A", None).unwrap().len(), 1);
    }

    #[test]
    fn enclosing_booking_conflicts() {
        let day = vec![apt("Dr. A", "10:00", 15, AppointmentStatus::Agendado)];
        assert_eq!(find_conflicts(&day, "09:00", 180, "Dr. A", None).unwrap().len(), 1);
    }

    #[test]
    fn empty_day_offers_every_slot() {
        let slots = available_slots(&[], "Dr. A", 60);
        assert_eq!(slots.first().map(String::as_str), Some("08:00"));
        assert_eq!(slots.last().map(String::as_str), Some("17:00"));
        assert_eq!(slots.len(), 19);

        let slots = available_slots(&[], "Dr. A", 30);
        assert_eq!(slots.last().map(String::as_str), Some("17:30"));
        assert_eq!(slots.len(), 20);
    }

    #[test]
    fn slots_skip_booked_time() {
        let day = vec![
            apt("Dr. A", "09:00", 60, AppointmentStatus::Agendado),
            apt("Dr. B", "10:00", 60, AppointmentStatus::Agendado),
            apt("Dr. A", "14:00", 30, AppointmentStatus::Cancelado),
        ];
        let slots = available_slots(&day, "Dr. A", 60);

        assert!(slots.contains(&"08:00".to_string()));
        assert!(!slots.contains(&"08:30".to_string()));
        assert!(!slots.contains(&"09:00".to_string()));
        assert!(!slots.contains(&"09:30".to_string()));
        assert!(slots.contains(&"10:00".to_string()));
        assert!(slots.contains(&"14:00".to_string()));

        for slot in &slots {
            let start = parse_time_of_day(slot).unwrap();
            assert_eq!(start % SLOT_STEP_MIN, 0);
            assert!(start >= WORK_START_MIN && start + 60 <= WORK_END_MIN);
        }
    }

    #[test]
    fn long_duration_leaves_no_slots() {
        assert!(available_slots(&[], "Dr. A", 11 * 60).is_empty());
        assert_eq!(available_slots(&[], "Dr. A", 10 * 60), vec!["08:00".to_string()]);
    }

    #[test]
    fn huge_duration_saturates_instead_of_wrapping() {
        assert!(available_slots(&[], "Dr. A", u32::MAX).is_empty());

        let day = vec![apt("Dr. A", "17:00", 30, AppointmentStatus::Agendado)];
        let hits = find_conflicts(&day, "09:00", u32::MAX, "Dr. A", None).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(find_conflicts(&[], "09:00", u32::MAX, "Dr. A", None).unwrap().is_empty());
    }

    #[test]
    fn unreadable_stored_time_blocks_nothing() {
        let day = vec![apt("Dr. A", "nine", 60, AppointmentStatus::Agendado)];
        assert!(find_conflicts(&day, "09:00", 60, "Dr. A", None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn agenda_conflict_check_only_sees_that_day() {
        let mut other_day = apt("Dr. A", "09:00", 60, AppointmentStatus::Agendado);
        other_day.appointment_date = day().succ_opt().unwrap();
        let agenda = MemoryAgenda(vec![
            apt("Dr. A", "09:00", 60, AppointmentStatus::Agendado),
            other_day,
        ]);

        let hits = check_time_conflicts(&agenda, day(), "09:30", 30, "Dr. A", None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].appointment_date, day());
    }

    #[tokio::test]
    async fn agenda_rejects_malformed_time() {
        let agenda = MemoryAgenda(vec![]);
        let err = check_time_conflicts(&agenda, day(), "25:00", 30, "Dr. A", None).await;
        assert!(matches!(err, Err(ApiError::BadRequest("VALIDATION_ERROR", _))));
    }

    #[tokio::test]
    async fn agenda_slots() {
        let agenda = MemoryAgenda(vec![apt("Dr. A", "08:00", 600, AppointmentStatus::Agendado)]);
        let slots = get_available_slots(&agenda, day(), "Dr. A", 30).await.unwrap();
        assert!(slots.is_empty());

        let slots = get_available_slots(&agenda, day(), "Dr. B", 30).await.unwrap();
        assert_eq!(slots.len(), 20);
    }
}
