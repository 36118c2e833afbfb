use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub session_ttl_hours: i64,
}

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

/* -------------------------
   Enumerations
--------------------------*/

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Text-backed enum: stored and sent on the wire as its Portuguese label.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

text_enum!(AppointmentStatus, "appointment status", {
    Agendado => "agendado",
    Confirmado => "confirmado",
    EmAndamento => "em-andamento",
    Concluido => "concluido",
    Cancelado => "cancelado",
});

text_enum!(ConsultationStatus, "consultation status", {
    Agendada => "agendada",
    EmAndamento => "em-andamento",
    Concluida => "concluida",
    Cancelada => "cancelada",
});

text_enum!(Priority, "priority", {
    Baixa => "baixa",
    Normal => "normal",
    Alta => "alta",
    Urgente => "urgente",
});

text_enum!(Gender, "gender", {
    Masculino => "masculino",
    Feminino => "feminino",
    Outro => "outro",
});

/// Status filters accept `"all"` as "no filter".
pub fn parse_status_filter<T: FromStr<Err = UnknownVariant>>(
    raw: Option<&str>,
) -> Result<Option<T>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(s) => s
            .parse::<T>()
            .map(Some)
            .map_err(|e| ApiError::BadRequest("VALIDATION_ERROR", e.to_string())),
    }
}

fn decode<T: FromStr<Err = UnknownVariant>>(raw: &str) -> Result<T, ApiError> {
    raw.parse::<T>()
        .map_err(|e| ApiError::Internal(format!("row decode error: {e}")))
}

/* -------------------------
   Auth DTOs
--------------------------*/

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponseData {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct MeResponseData {
    pub user: UserProfile,
    pub session: SessionInfo,
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        UserProfile {
            id: row.user_id,
            full_name: row.full_name,
            phone: row.phone,
            email: row.email,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct SessionTokenRow {
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/* -------------------------
   Patients
--------------------------*/

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    pub relationship: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicalInfo {
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub medications: Vec<String>,
    #[serde(default)]
    pub medical_conditions: Vec<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DentalInfo {
    pub last_visit: Option<NaiveDate>,
    pub next_appointment: Option<NaiveDate>,
    #[serde(default)]
    pub treatment_history: Vec<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: String,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub cpf: Option<String>,
    pub address: Option<Address>,
    pub emergency_contact: Option<EmergencyContact>,
    pub medical_info: Option<MedicalInfo>,
    pub dental_info: Option<DentalInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
}

#[derive(Debug, FromRow)]
pub struct PatientRow {
    pub patient_id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: String,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub cpf: Option<String>,
    pub address: Option<Json<Address>>,
    pub emergency_contact: Option<Json<EmergencyContact>>,
    pub medical_info: Option<Json<MedicalInfo>>,
    pub dental_info: Option<Json<DentalInfo>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PatientRow> for Patient {
    type Error = ApiError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        Ok(Patient {
            id: row.patient_id,
            full_name: row.full_name,
            email: row.email,
            phone: row.phone,
            birth_date: row.birth_date,
            gender: row.gender.as_deref().map(decode::<Gender>).transpose()?,
            cpf: row.cpf,
            address: row.address.map(|j| j.0),
            emergency_contact: row.emergency_contact.map(|j| j.0),
            medical_info: row.medical_info.map(|j| j.0),
            dental_info: row.dental_info.map(|j| j.0),
            created_at: row.created_at,
            updated_at: row.updated_at,
            created_by: row.created_by,
        })
    }
}

/* -------------------------
   Appointments
--------------------------*/

#[derive(Debug, Clone, Serialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_name: String,
    pub patient_phone: String,
    pub patient_email: Option<String>,
    pub appointment_date: NaiveDate,
    /// "HH:MM"
    pub appointment_time: String,
    /// minutes
    pub duration: i32,
    pub service: String,
    pub dentist: String,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct AppointmentRow {
    pub appointment_id: Uuid,
    pub patient_name: String,
    pub patient_phone: String,
    pub patient_email: Option<String>,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub duration: i32,
    pub service: String,
    pub dentist: String,
    pub notes: Option<String>,
    pub status: String,
    pub priority: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = ApiError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        Ok(Appointment {
            id: row.appointment_id,
            patient_name: row.patient_name,
            patient_phone: row.patient_phone,
            patient_email: row.patient_email,
            appointment_date: row.appointment_date,
            appointment_time: row.appointment_time,
            duration: row.duration,
            service: row.service,
            dentist: row.dentist,
            notes: row.notes,
            status: decode(&row.status)?,
            priority: decode(&row.priority)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/* -------------------------
   Consultations
--------------------------*/

#[derive(Debug, Clone, Serialize)]
pub struct Consultation {
    pub id: Uuid,
    pub patient_id: String,
    pub patient_name: String,
    pub appointment_id: Option<String>,
    pub consultation_date: NaiveDate,
    pub consultation_time: String,
    pub dentist: String,
    pub specialty: String,
    pub chief_complaint: String,
    pub symptoms: Vec<String>,
    pub diagnosis: String,
    pub treatment: String,
    pub prescription: Option<String>,
    pub notes: Option<String>,
    pub status: ConsultationStatus,
    pub priority: Priority,
    pub follow_up_date: Option<NaiveDate>,
    pub follow_up_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct ConsultationRow {
    pub consultation_id: Uuid,
    pub patient_id: String,
    pub patient_name: String,
    pub appointment_id: Option<String>,
    pub consultation_date: NaiveDate,
    pub consultation_time: String,
    pub dentist: String,
    pub specialty: String,
    pub chief_complaint: String,
    pub symptoms: Vec<String>,
    pub diagnosis: String,
    pub treatment: String,
    pub prescription: Option<String>,
    pub notes: Option<String>,
    pub status: String,
    pub priority: String,
    pub follow_up_date: Option<NaiveDate>,
    pub follow_up_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ConsultationRow> for Consultation {
    type Error = ApiError;

    fn try_from(row: ConsultationRow) -> Result<Self, Self::Error> {
        Ok(Consultation {
            id: row.consultation_id,
            patient_id: row.patient_id,
            patient_name: row.patient_name,
            appointment_id: row.appointment_id,
            consultation_date: row.consultation_date,
            consultation_time: row.consultation_time,
            dentist: row.dentist,
            specialty: row.specialty,
            chief_complaint: row.chief_complaint,
            symptoms: row.symptoms,
            diagnosis: row.diagnosis,
            treatment: row.treatment,
            prescription: row.prescription,
            notes: row.notes,
            status: decode(&row.status)?,
            priority: decode(&row.priority)?,
            follow_up_date: row.follow_up_date,
            follow_up_notes: row.follow_up_notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Converts a batch of rows, failing on the first undecodable one.
pub fn rows_into<R, T>(rows: Vec<R>) -> Result<Vec<T>, ApiError>
where
    T: TryFrom<R, Error = ApiError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_labels_round_trip_through_serde() {
        let json = serde_json::to_string(&AppointmentStatus::EmAndamento).unwrap();
        assert_eq!(json, "\"em-andamento\"");
        let back: ConsultationStatus = serde_json::from_str("\"concluida\"").unwrap();
        assert_eq!(back, ConsultationStatus::Concluida);
        assert_eq!(Priority::Urgente.as_str(), "urgente");
    }

    #[test]
    fn unknown_label_is_rejected() {
        let err = "pending".parse::<AppointmentStatus>().unwrap_err();
        assert_eq!(err.kind, "appointment status");
        assert!("cancelado".parse::<ConsultationStatus>().is_err());
    }

    #[test]
    fn status_filter_all_means_none() {
        let f: Option<AppointmentStatus> = parse_status_filter(Some("all")).unwrap();
        assert!(f.is_none());
        let f: Option<AppointmentStatus> = parse_status_filter(Some("confirmado")).unwrap();
        assert_eq!(f, Some(AppointmentStatus::Confirmado));
        assert!(parse_status_filter::<AppointmentStatus>(Some("nope")).is_err());
    }
}
