//! Free-text filters applied to list results. Status, date and specialty
//! filters run in SQL before these.

use crate::models::{Appointment, Consultation, Patient};

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

fn needle(term: &str) -> Option<String> {
    let t = term.trim();
    (!t.is_empty()).then(|| t.to_lowercase())
}

pub fn patient_matches(patient: &Patient, term: &str) -> bool {
    let Some(lower) = needle(term) else {
        return true;
    };
    let raw = term.trim();

    contains_ci(&patient.full_name, &lower)
        || patient.phone.contains(raw)
        || patient
            .email
            .as_deref()
            .is_some_and(|e| contains_ci(e, &lower))
        || patient.cpf.as_deref().is_some_and(|c| c.contains(raw))
}

pub fn filter_patients(patients: Vec<Patient>, term: &str) -> Vec<Patient> {
    patients
        .into_iter()
        .filter(|p| patient_matches(p, term))
        .collect()
}

pub fn filter_appointments(appointments: Vec<Appointment>, term: &str) -> Vec<Appointment> {
    let Some(n) = needle(term) else {
        return appointments;
    };
    appointments
        .into_iter()
        .filter(|a| {
            contains_ci(&a.patient_name, &n)
                || contains_ci(&a.dentist, &n)
                || contains_ci(&a.service, &n)
        })
        .collect()
}

pub fn filter_consultations(consultations: Vec<Consultation>, term: &str) -> Vec<Consultation> {
    let Some(n) = needle(term) else {
        return consultations;
    };
    consultations
        .into_iter()
        .filter(|c| {
            contains_ci(&c.patient_name, &n)
                || contains_ci(&c.dentist, &n)
                || contains_ci(&c.specialty, &n)
                || contains_ci(&c.chief_complaint, &n)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentStatus, ConsultationStatus, Priority};
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn patient(name: &str, phone: &str, email: Option<&str>, cpf: Option<&str>) -> Patient {
        Patient {
            id: Uuid::new_v4(),
            full_name: name.into(),
            email: email.map(Into::into),
            phone: phone.into(),
            birth_date: None,
            gender: None,
            cpf: cpf.map(Into::into),
            address: None,
            emergency_contact: None,
            medical_info: None,
            dental_info: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            created_by: "u1".into(),
        }
    }

    fn apt(patient: &str, dentist: &str, service: &str, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_name: patient.into(),
            patient_phone: "11912345678".into(),
            patient_email: None,
            appointment_date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            appointment_time: "09:00".into(),
            duration: 30,
            service: service.into(),
            dentist: dentist.into(),
            notes: None,
            status,
            priority: Priority::Baixa,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn patients_by_name_phone_email_cpf() {
        let list = vec![
            patient("Ana Silva", "(11) 2345-6789", Some("ana@clinic.com"), None),
            patient("Bruno Costa", "(21) 98888-7777", None, Some("123.456.789-01")),
        ];
        assert_eq!(filter_patients(list.clone(), "silva").len(), 1);
        assert_eq!(filter_patients(list.clone(), "98888").len(), 1);
        assert_eq!(filter_patients(list.clone(), "CLINIC").len(), 1);
        assert_eq!(filter_patients(list.clone(), "456.789")[0].full_name, "Bruno Costa");
        assert_eq!(filter_patients(list.clone(), "  ").len(), 2);
        assert!(filter_patients(list, "zzz").is_empty());
    }

    #[test]
    fn appointments_by_patient_dentist_or_service() {
        let list = vec![
            apt("Ana", "Dr. João", "Limpeza", AppointmentStatus::Agendado),
            apt("Bruno", "Dra. Maria", "Extração", AppointmentStatus::Cancelado),
        ];
        assert_eq!(filter_appointments(list.clone(), "maria")[0].patient_name, "Bruno");
        assert_eq!(filter_appointments(list.clone(), "LIMP")[0].patient_name, "Ana");
        assert_eq!(filter_appointments(list.clone(), "ana")[0].patient_name, "Ana");
        assert_eq!(filter_appointments(list.clone(), "ana").len(), 1);
        assert_eq!(filter_appointments(list.clone(), " ").len(), 2);
        assert!(filter_appointments(list, "canal").is_empty());
    }

    #[test]
    fn consultations_by_name_dentist_specialty_or_complaint() {
        let make = |complaint: &str, specialty: &str, status: ConsultationStatus| Consultation {
            id: Uuid::new_v4(),
            patient_id: "p1".into(),
            patient_name: "Carla".into(),
            appointment_id: None,
            consultation_date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            consultation_time: "10:00".into(),
            dentist: "Dr. João".into(),
            specialty: specialty.into(),
            chief_complaint: complaint.into(),
            symptoms: vec![],
            diagnosis: "x".into(),
            treatment: "y".into(),
            prescription: None,
            notes: None,
            status,
            priority: Priority::Normal,
            follow_up_date: None,
            follow_up_notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let list = vec![
            make("Dor de dente", "Endodontia", ConsultationStatus::Concluida),
            make("Aparelho solto", "Ortodontia", ConsultationStatus::Agendada),
        ];

        assert_eq!(filter_consultations(list.clone(), "dor").len(), 1);
        assert_eq!(
            filter_consultations(list.clone(), "ORTO")[0].chief_complaint,
            "Aparelho solto"
        );
        assert_eq!(filter_consultations(list.clone(), "carla").len(), 2);
        assert!(filter_consultations(list, "implante").is_empty());
    }
}
