//! Counters shown on the dashboard and the list views.

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::models::{Appointment, AppointmentStatus, Consultation, ConsultationStatus};
use crate::scheduling::parse_time_of_day;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppointmentStats {
    pub total: usize,
    pub confirmed: usize,
    pub pending: usize,
    pub cancelled: usize,
    pub today: usize,
    pub this_week: usize,
    pub confirmation_rate: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsultationStats {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub cancelled: usize,
    pub today: usize,
    pub this_week: usize,
    pub completion_rate: u32,
}

/// Sunday..=Saturday week containing `today`.
pub fn week_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = today - Duration::days(i64::from(today.weekday().num_days_from_sunday()));
    (start, start + Duration::days(6))
}

/// Percentage of `part` among the non-cancelled records, rounded.
/// Zero when every record is cancelled.
pub fn rate(part: usize, total: usize, cancelled: usize) -> u32 {
    let active = total.saturating_sub(cancelled);
    if active == 0 {
        return 0;
    }
    (part as f64 * 100.0 / active as f64).round() as u32
}

fn in_week(date: NaiveDate, (start, end): (NaiveDate, NaiveDate)) -> bool {
    date >= start && date <= end
}

pub fn appointment_stats(appointments: &[Appointment], today: NaiveDate) -> AppointmentStats {
    let week = week_bounds(today);
    let count = |status: AppointmentStatus| {
        appointments.iter().filter(|a| a.status == status).count()
    };

    let total = appointments.len();
    let confirmed = count(AppointmentStatus::Confirmado);
    let cancelled = count(AppointmentStatus::Cancelado);

    AppointmentStats {
        total,
        confirmed,
        pending: count(AppointmentStatus::Agendado),
        cancelled,
        today: appointments
            .iter()
            .filter(|a| a.appointment_date == today)
            .count(),
        this_week: appointments
            .iter()
            .filter(|a| in_week(a.appointment_date, week))
            .count(),
        confirmation_rate: rate(confirmed, total, cancelled),
    }
}

pub fn consultation_stats(consultations: &[Consultation], today: NaiveDate) -> ConsultationStats {
    let week = week_bounds(today);
    let count = |status: ConsultationStatus| {
        consultations.iter().filter(|c| c.status == status).count()
    };

    let total = consultations.len();
    let completed = count(ConsultationStatus::Concluida);
    let cancelled = count(ConsultationStatus::Cancelada);

    ConsultationStats {
        total,
        completed,
        in_progress: count(ConsultationStatus::EmAndamento),
        cancelled,
        today: consultations
            .iter()
            .filter(|c| c.consultation_date == today)
            .count(),
        this_week: consultations
            .iter()
            .filter(|c| in_week(c.consultation_date, week))
            .count(),
        completion_rate: rate(completed, total, cancelled),
    }
}

/// Appointments on `today`, earliest first. Unreadable times sort last.
pub fn todays_schedule(appointments: &[Appointment], today: NaiveDate) -> Vec<Appointment> {
    let mut out: Vec<Appointment> = appointments
        .iter()
        .filter(|a| a.appointment_date == today)
        .cloned()
        .collect();
    out.sort_by_key(|a| parse_time_of_day(&a.appointment_time).unwrap_or(u32::MAX));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use chrono::Utc;
    use uuid::Uuid;

    // a Wednesday
    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 13).unwrap()
    }

    fn apt(date: NaiveDate, time: &str, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_name: "Ana".into(),
            patient_phone: "11912345678".into(),
            patient_email: None,
            appointment_date: date,
            appointment_time: time.into(),
            duration: 30,
            service: "Avaliação".into(),
            dentist: "Dr. A".into(),
            notes: None,
            status,
            priority: Priority::Normal,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn consultation(date: NaiveDate, status: ConsultationStatus) -> Consultation {
        Consultation {
            id: Uuid::new_v4(),
            patient_id: "p1".into(),
            patient_name: "Ana".into(),
            appointment_id: None,
            consultation_date: date,
            consultation_time: "10:00".into(),
            dentist: "Dr. A".into(),
            specialty: "Endodontia".into(),
            chief_complaint: "dor".into(),
            symptoms: vec![],
            diagnosis: "cárie".into(),
            treatment: "canal".into(),
            prescription: None,
            notes: None,
            status,
            priority: Priority::Alta,
            follow_up_date: None,
            follow_up_notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn week_starts_on_sunday() {
        let (start, end) = week_bounds(today());
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 3, 16).unwrap());

        let sunday = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(week_bounds(sunday).0, sunday);
    }

    #[test]
    fn rate_excludes_cancelled() {
        assert_eq!(rate(1, 4, 1), 33);
        assert_eq!(rate(2, 4, 1), 67);
        assert_eq!(rate(0, 0, 0), 0);
        assert_eq!(rate(0, 3, 3), 0);
    }

    #[test]
    fn appointment_counters() {
        let t = today();
        let list = vec![
            apt(t, "09:00", AppointmentStatus::Confirmado),
            apt(t, "10:00", AppointmentStatus::Agendado),
            apt(t - Duration::days(3), "10:00", AppointmentStatus::Cancelado),
            apt(t + Duration::days(4), "10:00", AppointmentStatus::Confirmado),
        ];
        let s = appointment_stats(&list, t);
        assert_eq!(s.total, 4);
        assert_eq!(s.confirmed, 2);
        assert_eq!(s.pending, 1);
        assert_eq!(s.cancelled, 1);
        assert_eq!(s.today, 2);
        // Sunday the 10th through Saturday the 16th
        assert_eq!(s.this_week, 3);
        assert_eq!(s.confirmation_rate, 67);
    }

    #[test]
    fn consultation_counters() {
        let t = today();
        let list = vec![
            consultation(t, ConsultationStatus::Concluida),
            consultation(t, ConsultationStatus::EmAndamento),
            consultation(t - Duration::days(10), ConsultationStatus::Cancelada),
        ];
        let s = consultation_stats(&list, t);
        assert_eq!(s.total, 3);
        assert_eq!(s.completed, 1);
        assert_eq!(s.in_progress, 1);
        assert_eq!(s.cancelled, 1);
        assert_eq!(s.today, 2);
        assert_eq!(s.this_week, 2);
        assert_eq!(s.completion_rate, 50);
    }

    #[test]
    fn empty_lists_are_zero() {
        assert_eq!(appointment_stats(&[], today()), AppointmentStats::default());
        assert_eq!(consultation_stats(&[], today()), ConsultationStats::default());
    }

    #[test]
    fn todays_schedule_is_sorted_by_time() {
        let t = today();
        let list = vec![
            apt(t, "14:00", AppointmentStatus::Agendado),
            apt(t - Duration::days(1), "08:00", AppointmentStatus::Agendado),
            apt(t, "08:30", AppointmentStatus::Confirmado),
        ];
        let times: Vec<String> = todays_schedule(&list, t)
            .into_iter()
            .map(|a| a.appointment_time)
            .collect();
        assert_eq!(times, vec!["08:30".to_string(), "14:00".to_string()]);
    }
}
