// src/routes/patient_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::types::Json as DbJson;
use uuid::Uuid;

use crate::{
    error::ApiError,
    masks::{format_cpf, format_phone},
    middleware::auth_context::AuthContext,
    models::*,
    routes::deserialize_double_option,
    search::filter_patients,
    validation::{non_blank, validate_patient, PatientForm},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/patients", get(list_patients).post(create_patient))
        .route("/patients/lookup", get(lookup_patient))
        .route(
            "/patients/{patient_id}",
            get(get_patient).patch(update_patient).delete(delete_patient),
        )
}

#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
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
}

/// Absent field keeps the stored value; explicit `null` clears optional ones.
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePatientRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub birth_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub gender: Option<Option<Gender>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub cpf: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub address: Option<Option<Address>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub emergency_contact: Option<Option<EmergencyContact>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub medical_info: Option<Option<MedicalInfo>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub dental_info: Option<Option<DentalInfo>>,
}

#[derive(Debug, Deserialize)]
pub struct PatientListQuery {
    /// free-text filter over name, phone, email and CPF
    pub q: Option<String>,
    /// name prefix, ordered by name
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PatientLookupQuery {
    pub cpf: Option<String>,
    pub phone: Option<String>,
}

/// Stored form of a patient after request normalization.
#[derive(Debug, Clone, PartialEq)]
struct PatientFields {
    full_name: String,
    email: Option<String>,
    phone: String,
    birth_date: Option<NaiveDate>,
    gender: Option<Gender>,
    cpf: Option<String>,
    address: Option<Address>,
    emergency_contact: Option<EmergencyContact>,
    medical_info: Option<MedicalInfo>,
    dental_info: Option<DentalInfo>,
}

impl PatientFields {
    fn validate(&self) -> Result<(), ApiError> {
        validate_patient(&PatientForm {
            full_name: &self.full_name,
            phone: &self.phone,
            email: self.email.as_deref(),
            cpf: self.cpf.as_deref(),
        })?;
        Ok(())
    }

    /// Phone and CPF are kept in their display masks.
    fn normalized(mut self) -> Self {
        self.full_name = self.full_name.trim().to_string();
        self.phone = format_phone(&self.phone);
        self.email = non_blank(self.email);
        self.cpf = non_blank(self.cpf).map(|c| format_cpf(&c));
        self
    }

    fn from_create(req: CreatePatientRequest) -> Self {
        PatientFields {
            full_name: req.full_name,
            email: req.email,
            phone: req.phone,
            birth_date: req.birth_date,
            gender: req.gender,
            cpf: req.cpf,
            address: req.address,
            emergency_contact: req.emergency_contact,
            medical_info: req.medical_info,
            dental_info: req.dental_info,
        }
    }

    fn merge(existing: Patient, req: UpdatePatientRequest) -> Self {
        PatientFields {
            full_name: req.full_name.unwrap_or(existing.full_name),
            phone: req.phone.unwrap_or(existing.phone),
            email: req.email.unwrap_or(existing.email),
            birth_date: req.birth_date.unwrap_or(existing.birth_date),
            gender: req.gender.unwrap_or(existing.gender),
            cpf: req.cpf.unwrap_or(existing.cpf),
            address: req.address.unwrap_or(existing.address),
            emergency_contact: req.emergency_contact.unwrap_or(existing.emergency_contact),
            medical_info: req.medical_info.unwrap_or(existing.medical_info),
            dental_info: req.dental_info.unwrap_or(existing.dental_info),
        }
    }
}

async fn fetch_patient(state: &AppState, patient_id: Uuid) -> Result<Patient, ApiError> {
    let row: PatientRow = sqlx::query_as::<_, PatientRow>(
        r#"
        SELECT patient_id, full_name, email, phone, birth_date, gender, cpf, address,
               emergency_contact, medical_info, dental_info, created_by, created_at, updated_at
        FROM patients
        WHERE patient_id = $1
        "#,
    )
    .bind(patient_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("patient"))?;

    row.try_into()
}

pub async fn create_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreatePatientRequest>,
) -> Result<Json<ApiOk<Patient>>, ApiError> {
    let fields = PatientFields::from_create(req);
    fields.validate()?;
    let f = fields.normalized();

    let row: PatientRow = sqlx::query_as::<_, PatientRow>(
        r#"
        INSERT INTO patients (patient_id, full_name, email, phone, birth_date, gender, cpf, address,
                              emergency_contact, medical_info, dental_info, created_by, created_at, updated_at)
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12, now(), now())
        RETURNING patient_id, full_name, email, phone, birth_date, gender, cpf, address,
                  emergency_contact, medical_info, dental_info, created_by, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&f.full_name)
    .bind(f.email.as_deref())
    .bind(&f.phone)
    .bind(f.birth_date)
    .bind(f.gender.map(Gender::as_str))
    .bind(f.cpf.as_deref())
    .bind(f.address.map(DbJson))
    .bind(f.emergency_contact.map(DbJson))
    .bind(f.medical_info.map(DbJson))
    .bind(f.dental_info.map(DbJson))
    .bind(auth.user_id.to_string())
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    tracing::info!(patient_id = %row.patient_id, "patient created");

    Ok(Json(ApiOk { data: row.try_into()? }))
}

pub async fn list_patients(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<PatientListQuery>,
) -> Result<Json<ApiOk<Vec<Patient>>>, ApiError> {
    let name = q.name.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let rows: Vec<PatientRow> = if let Some(prefix) = name {
        sqlx::query_as::<_, PatientRow>(
            r#"
            SELECT patient_id, full_name, email, phone, birth_date, gender, cpf, address,
                   emergency_contact, medical_info, dental_info, created_by, created_at, updated_at
            FROM patients
            WHERE starts_with(full_name, $1)
            ORDER BY full_name ASC
            "#,
        )
        .bind(prefix)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?
    } else {
        sqlx::query_as::<_, PatientRow>(
            r#"
            SELECT patient_id, full_name, email, phone, birth_date, gender, cpf, address,
                   emergency_contact, medical_info, dental_info, created_by, created_at, updated_at
            FROM patients
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?
    };

    let patients: Vec<Patient> = rows_into(rows)?;
    let patients = match q.q.as_deref() {
        Some(term) => filter_patients(patients, term),
        None => patients,
    };

    Ok(Json(ApiOk { data: patients }))
}

/// First patient with the given CPF or phone. Both are matched in their
/// masked form, so callers may send raw digits.
pub async fn lookup_patient(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<PatientLookupQuery>,
) -> Result<Json<ApiOk<Patient>>, ApiError> {
    let (column, value) = match (non_blank(q.cpf), non_blank(q.phone)) {
        (Some(cpf), _) => ("cpf", format_cpf(&cpf)),
        (None, Some(phone)) => ("phone", format_phone(&phone)),
        (None, None) => {
            return Err(ApiError::BadRequest(
                "VALIDATION_ERROR",
                "cpf or phone is required".into(),
            ));
        }
    };

    // column comes from the fixed set above
    let sql = format!(
        r#"
        SELECT patient_id, full_name, email, phone, birth_date, gender, cpf, address,
               emergency_contact, medical_info, dental_info, created_by, created_at, updated_at
        FROM patients
        WHERE {column} = $1
        ORDER BY created_at ASC
        LIMIT 1
        "#
    );

    let row: PatientRow = sqlx::query_as::<_, PatientRow>(&sql)
        .bind(&value)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::not_found("patient"))?;

    Ok(Json(ApiOk { data: row.try_into()? }))
}

pub async fn get_patient(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ApiOk<Patient>>, ApiError> {
    Ok(Json(ApiOk {
        data: fetch_patient(&state, patient_id).await?,
    }))
}

pub async fn update_patient(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(patient_id): Path<Uuid>,
    Json(req): Json<UpdatePatientRequest>,
) -> Result<Json<ApiOk<Patient>>, ApiError> {
    let existing = fetch_patient(&state, patient_id).await?;

    let fields = PatientFields::merge(existing, req);
    fields.validate()?;
    let f = fields.normalized();

    let row: PatientRow = sqlx::query_as::<_, PatientRow>(
        r#"
        UPDATE patients
        SET full_name = $2,
            email = $3,
            phone = $4,
            birth_date = $5,
            gender = $6,
            cpf = $7,
            address = $8,
            emergency_contact = $9,
            medical_info = $10,
            dental_info = $11,
            updated_at = now()
        WHERE patient_id = $1
        RETURNING patient_id, full_name, email, phone, birth_date, gender, cpf, address,
                  emergency_contact, medical_info, dental_info, created_by, created_at, updated_at
        "#,
    )
    .bind(patient_id)
    .bind(&f.full_name)
    .bind(f.email.as_deref())
    .bind(&f.phone)
    .bind(f.birth_date)
    .bind(f.gender.map(Gender::as_str))
    .bind(f.cpf.as_deref())
    .bind(f.address.map(DbJson))
    .bind(f.emergency_contact.map(DbJson))
    .bind(f.medical_info.map(DbJson))
    .bind(f.dental_info.map(DbJson))
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("patient"))?;

    Ok(Json(ApiOk { data: row.try_into()? }))
}

pub async fn delete_patient(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let deleted: Option<Uuid> = sqlx::query_scalar(
        r#"
        DELETE FROM patients
        WHERE patient_id = $1
        RETURNING patient_id
        "#,
    )
    .bind(patient_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?;

    if deleted.is_none() {
        return Err(ApiError::not_found("patient"));
    }
    tracing::info!(%patient_id, "patient deleted");

    Ok(Json(ApiOk {
        data: OkData { ok: true },
    }))
}
