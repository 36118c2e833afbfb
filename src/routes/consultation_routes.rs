// src/routes/consultation_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::*,
    routes::deserialize_double_option,
    scheduling::{format_time_of_day, parse_time_of_day},
    search::filter_consultations,
    stats::{consultation_stats, ConsultationStats},
    validation::{non_blank, normalize_symptoms, validate_consultation, ConsultationForm},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/consultations", get(list_consultations).post(create_consultation))
        .route("/consultations/stats", get(get_stats))
        .route(
            "/consultations/{consultation_id}",
            get(get_consultation)
                .patch(update_consultation)
                .delete(delete_consultation),
        )
}

#[derive(Debug, Deserialize)]
pub struct CreateConsultationRequest {
    pub patient_id: String,
    pub patient_name: String,
    pub appointment_id: Option<String>,
    pub consultation_date: NaiveDate,
    pub consultation_time: String,
    pub dentist: String,
    pub specialty: String,
    pub chief_complaint: String,
    #[serde(default)]
    pub symptoms: Vec<String>,
    pub diagnosis: String,
    pub treatment: String,
    pub prescription: Option<String>,
    pub notes: Option<String>,
    pub status: Option<ConsultationStatus>,
    pub priority: Option<Priority>,
    pub follow_up_date: Option<NaiveDate>,
    pub follow_up_notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateConsultationRequest {
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub appointment_id: Option<Option<String>>,
    pub consultation_date: Option<NaiveDate>,
    pub consultation_time: Option<String>,
    pub dentist: Option<String>,
    pub specialty: Option<String>,
    pub chief_complaint: Option<String>,
    pub symptoms: Option<Vec<String>>,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub prescription: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub notes: Option<Option<String>>,
    pub status: Option<ConsultationStatus>,
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub follow_up_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub follow_up_notes: Option<Option<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConsultationListQuery {
    pub date: Option<NaiveDate>,
    pub status: Option<String>,
    pub patient_id: Option<String>,
    pub specialty: Option<String>,
    pub dentist: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Clone)]
struct ConsultationFields {
    patient_id: String,
    patient_name: String,
    appointment_id: Option<String>,
    consultation_date: NaiveDate,
    consultation_time: String,
    dentist: String,
    specialty: String,
    chief_complaint: String,
    symptoms: Vec<String>,
    diagnosis: String,
    treatment: String,
    prescription: Option<String>,
    notes: Option<String>,
    status: ConsultationStatus,
    priority: Priority,
    follow_up_date: Option<NaiveDate>,
    follow_up_notes: Option<String>,
}

impl ConsultationFields {
    fn from_create(req: CreateConsultationRequest) -> Self {
        ConsultationFields {
            patient_id: req.patient_id,
            patient_name: req.patient_name,
            appointment_id: req.appointment_id,
            consultation_date: req.consultation_date,
            consultation_time: req.consultation_time,
            dentist: req.dentist,
            specialty: req.specialty,
            chief_complaint: req.chief_complaint,
            symptoms: req.symptoms,
            diagnosis: req.diagnosis,
            treatment: req.treatment,
            prescription: req.prescription,
            notes: req.notes,
            status: req.status.unwrap_or(ConsultationStatus::Agendada),
            priority: req.priority.unwrap_or(Priority::Normal),
            follow_up_date: req.follow_up_date,
            follow_up_notes: req.follow_up_notes,
        }
    }

    fn merge(existing: Consultation, req: UpdateConsultationRequest) -> Self {
        ConsultationFields {
            patient_id: req.patient_id.unwrap_or(existing.patient_id),
            patient_name: req.patient_name.unwrap_or(existing.patient_name),
            appointment_id: req.appointment_id.unwrap_or(existing.appointment_id),
            consultation_date: req.consultation_date.unwrap_or(existing.consultation_date),
            consultation_time: req.consultation_time.unwrap_or(existing.consultation_time),
            dentist: req.dentist.unwrap_or(existing.dentist),
            specialty: req.specialty.unwrap_or(existing.specialty),
            chief_complaint: req.chief_complaint.unwrap_or(existing.chief_complaint),
            symptoms: req.symptoms.unwrap_or(existing.symptoms),
            diagnosis: req.diagnosis.unwrap_or(existing.diagnosis),
            treatment: req.treatment.unwrap_or(existing.treatment),
            prescription: req.prescription.unwrap_or(existing.prescription),
            notes: req.notes.unwrap_or(existing.notes),
            status: req.status.unwrap_or(existing.status),
            priority: req.priority.unwrap_or(existing.priority),
            follow_up_date: req.follow_up_date.unwrap_or(existing.follow_up_date),
            follow_up_notes: req.follow_up_notes.unwrap_or(existing.follow_up_notes),
        }
    }

    fn validated(self) -> Result<Self, ApiError> {
        validate_consultation(&ConsultationForm {
            patient_name: &self.patient_name,
            consultation_time: &self.consultation_time,
            dentist: &self.dentist,
            specialty: &self.specialty,
            chief_complaint: &self.chief_complaint,
            diagnosis: &self.diagnosis,
            treatment: &self.treatment,
        })?;

        let minutes = parse_time_of_day(&self.consultation_time)?;
        Ok(ConsultationFields {
            patient_id: self.patient_id.trim().to_string(),
            patient_name: self.patient_name.trim().to_string(),
            appointment_id: non_blank(self.appointment_id),
            consultation_time: format_time_of_day(minutes),
            dentist: self.dentist.trim().to_string(),
            specialty: self.specialty.trim().to_string(),
            chief_complaint: self.chief_complaint.trim().to_string(),
            symptoms: normalize_symptoms(self.symptoms),
            diagnosis: self.diagnosis.trim().to_string(),
            treatment: self.treatment.trim().to_string(),
            prescription: non_blank(self.prescription),
            notes: non_blank(self.notes),
            follow_up_notes: non_blank(self.follow_up_notes),
            ..self
        })
    }
}

pub(crate) async fn fetch_consultations(
    db: &PgPool,
    q: &ConsultationListQuery,
    status: Option<ConsultationStatus>,
) -> Result<Vec<Consultation>, ApiError> {
    let rows: Vec<ConsultationRow> = sqlx::query_as::<_, ConsultationRow>(
        r#"
        SELECT consultation_id, patient_id, patient_name, appointment_id, consultation_date,
               consultation_time, dentist, specialty, chief_complaint, symptoms, diagnosis,
               treatment, prescription, notes, status, priority, follow_up_date,
               follow_up_notes, created_at, updated_at
        FROM consultations
        WHERE ($1::date IS NULL OR consultation_date = $1)
          AND ($2::text IS NULL OR status = $2)
          AND ($3::text IS NULL OR patient_id = $3)
          AND ($4::text IS NULL OR specialty = $4)
          AND ($5::text IS NULL OR dentist = $5)
        ORDER BY consultation_date DESC, consultation_time DESC
        "#,
    )
    .bind(q.date)
    .bind(status.map(ConsultationStatus::as_str))
    .bind(q.patient_id.as_deref())
    .bind(q.specialty.as_deref())
    .bind(q.dentist.as_deref())
    .fetch_all(db)
    .await
    .map_err(ApiError::db)?;

    let mut consultations: Vec<Consultation> = rows_into(rows)?;
    // a single day reads top to bottom, earliest first
    if q.date.is_some() {
        consultations.reverse();
    }
    Ok(consultations)
}

async fn fetch_consultation(
    state: &AppState,
    consultation_id: Uuid,
) -> Result<Consultation, ApiError> {
    let row: ConsultationRow = sqlx::query_as::<_, ConsultationRow>(
        r#"
        SELECT consultation_id, patient_id, patient_name, appointment_id, consultation_date,
               consultation_time, dentist, specialty, chief_complaint, symptoms, diagnosis,
               treatment, prescription, notes, status, priority, follow_up_date,
               follow_up_notes, created_at, updated_at
        FROM consultations
        WHERE consultation_id = $1
        "#,
    )
    .bind(consultation_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("consultation"))?;

    row.try_into()
}

pub async fn create_consultation(
    State(state): State<AppState>,
    _auth: AuthContext,
    Json(req): Json<CreateConsultationRequest>,
) -> Result<Json<ApiOk<Consultation>>, ApiError> {
    let f = ConsultationFields::from_create(req).validated()?;

    let row: ConsultationRow = sqlx::query_as::<_, ConsultationRow>(
        r#"
        INSERT INTO consultations (
          consultation_id, patient_id, patient_name, appointment_id, consultation_date,
          consultation_time, dentist, specialty, chief_complaint, symptoms, diagnosis,
          treatment, prescription, notes, status, priority, follow_up_date, follow_up_notes,
          created_at, updated_at
        )
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18, now(), now())
        RETURNING consultation_id, patient_id, patient_name, appointment_id, consultation_date,
                  consultation_time, dentist, specialty, chief_complaint, symptoms, diagnosis,
                  treatment, prescription, notes, status, priority, follow_up_date,
                  follow_up_notes, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&f.patient_id)
    .bind(&f.patient_name)
    .bind(f.appointment_id.as_deref())
    .bind(f.consultation_date)
    .bind(&f.consultation_time)
    .bind(&f.dentist)
    .bind(&f.specialty)
    .bind(&f.chief_complaint)
    .bind(&f.symptoms)
    .bind(&f.diagnosis)
    .bind(&f.treatment)
    .bind(f.prescription.as_deref())
    .bind(f.notes.as_deref())
    .bind(f.status.as_str())
    .bind(f.priority.as_str())
    .bind(f.follow_up_date)
    .bind(f.follow_up_notes.as_deref())
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    tracing::info!(consultation_id = %row.consultation_id, "consultation created");

    Ok(Json(ApiOk { data: row.try_into()? }))
}

pub async fn list_consultations(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<ConsultationListQuery>,
) -> Result<Json<ApiOk<Vec<Consultation>>>, ApiError> {
    let status = parse_status_filter::<ConsultationStatus>(q.status.as_deref())?;
    let consultations = fetch_consultations(&state.db, &q, status).await?;

    let consultations = match q.q.as_deref() {
        Some(term) => filter_consultations(consultations, term),
        None => consultations,
    };

    Ok(Json(ApiOk {
        data: consultations,
    }))
}

pub async fn get_consultation(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(consultation_id): Path<Uuid>,
) -> Result<Json<ApiOk<Consultation>>, ApiError> {
    Ok(Json(ApiOk {
        data: fetch_consultation(&state, consultation_id).await?,
    }))
}

pub async fn update_consultation(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(consultation_id): Path<Uuid>,
    Json(req): Json<UpdateConsultationRequest>,
) -> Result<Json<ApiOk<Consultation>>, ApiError> {
    let existing = fetch_consultation(&state, consultation_id).await?;
    let f = ConsultationFields::merge(existing, req).validated()?;

    let row: ConsultationRow = sqlx::query_as::<_, ConsultationRow>(
        r#"
        UPDATE consultations
        SET patient_id = $2,
            patient_name = $3,
            appointment_id = $4,
            consultation_date = $5,
            consultation_time = $6,
            dentist = $7,
            specialty = $8,
            chief_complaint = $9,
            symptoms = $10,
            diagnosis = $11,
            treatment = $12,
            prescription = $13,
            notes = $14,
            status = $15,
            priority = $16,
            follow_up_date = $17,
            follow_up_notes = $18,
            updated_at = now()
        WHERE consultation_id = $1
        RETURNING consultation_id, patient_id, patient_name, appointment_id, consultation_date,
                  consultation_time, dentist, specialty, chief_complaint, symptoms, diagnosis,
                  treatment, prescription, notes, status, priority, follow_up_date,
                  follow_up_notes, created_at, updated_at
        "#,
    )
    .bind(consultation_id)
    .bind(&f.patient_id)
    .bind(&f.patient_name)
    .bind(f.appointment_id.as_deref())
    .bind(f.consultation_date)
    .bind(&f.consultation_time)
    .bind(&f.dentist)
    .bind(&f.specialty)
    .bind(&f.chief_complaint)
    .bind(&f.symptoms)
    .bind(&f.diagnosis)
    .bind(&f.treatment)
    .bind(f.prescription.as_deref())
    .bind(f.notes.as_deref())
    .bind(f.status.as_str())
    .bind(f.priority.as_str())
    .bind(f.follow_up_date)
    .bind(f.follow_up_notes.as_deref())
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("consultation"))?;

    Ok(Json(ApiOk { data: row.try_into()? }))
}

pub async fn delete_consultation(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(consultation_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let deleted: Option<Uuid> = sqlx::query_scalar(
        r#"
        DELETE FROM consultations
        WHERE consultation_id = $1
        RETURNING consultation_id
        "#,
    )
    .bind(consultation_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?;

    if deleted.is_none() {
        return Err(ApiError::not_found("consultation"));
    }
    tracing::info!(%consultation_id, "consultation deleted");

    Ok(Json(ApiOk {
        data: OkData { ok: true },
    }))
}

pub async fn get_stats(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<ConsultationStats>>, ApiError> {
    let all = fetch_consultations(&state.db, &ConsultationListQuery::default(), None).await?;
    Ok(Json(ApiOk {
        data: consultation_stats(&all, Local::now().date_naive()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_body() -> &'static str {
        r#"{
            "patient_id": "p-1",
            "patient_name": "Bruno",
            "consultation_date": "2024-07-01",
            "consultation_time": "14:00",
            "dentist": "Dra. Maria",
            "specialty": "Endodontia",
            "chief_complaint": "dor ao mastigar",
            "symptoms": ["dor", " dor ", "sensibilidade", ""],
            "diagnosis": "pulpite",
            "treatment": "tratamento de canal"
        }"#
    }

    #[test]
    fn create_normalizes_symptoms_and_defaults() {
        let req: CreateConsultationRequest = serde_json::from_str(create_body()).unwrap();
        let f = ConsultationFields::from_create(req).validated().unwrap();
        assert_eq!(f.symptoms, vec!["dor".to_string(), "sensibilidade".to_string()]);
        assert_eq!(f.status, ConsultationStatus::Agendada);
        assert_eq!(f.priority, Priority::Normal);
        assert_eq!(f.follow_up_date, None);
    }

    #[test]
    fn missing_clinical_fields_are_reported() {
        let req: CreateConsultationRequest = serde_json::from_str(create_body()).unwrap();
        let mut f = ConsultationFields::from_create(req);
        f.diagnosis = "  ".into();
        f.treatment = String::new();

        match f.validated() {
            Err(ApiError::Validation(errors)) => {
                assert!(errors.get("diagnosis").is_some());
                assert!(errors.get("treatment").is_some());
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn follow_up_can_be_set_and_cleared() {
        let req: CreateConsultationRequest = serde_json::from_str(create_body()).unwrap();
        let base = ConsultationFields::from_create(req).validated().unwrap();
        let existing = Consultation {
            id: Uuid::new_v4(),
            patient_id: base.patient_id,
            patient_name: base.patient_name,
            appointment_id: None,
            consultation_date: base.consultation_date,
            consultation_time: base.consultation_time,
            dentist: base.dentist,
            specialty: base.specialty,
            chief_complaint: base.chief_complaint,
            symptoms: base.symptoms,
            diagnosis: base.diagnosis,
            treatment: base.treatment,
            prescription: None,
            notes: None,
            status: base.status,
            priority: base.priority,
            follow_up_date: NaiveDate::from_ymd_opt(2024, 7, 15),
            follow_up_notes: Some("retorno".into()),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        let req: UpdateConsultationRequest =
            serde_json::from_str(r#"{"follow_up_date": null, "status": "concluida"}"#).unwrap();
        let f = ConsultationFields::merge(existing, req).validated().unwrap();
        assert_eq!(f.follow_up_date, None);
        assert_eq!(f.follow_up_notes.as_deref(), Some("retorno"));
        assert_eq!(f.status, ConsultationStatus::Concluida);
    }
}
