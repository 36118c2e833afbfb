// src/routes/appointment_routes.rs

use async_trait::async_trait;
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
    scheduling::{
        check_time_conflicts, format_time_of_day, get_available_slots, parse_time_of_day,
        DayAgenda, DEFAULT_SLOT_DURATION_MIN,
    },
    search::filter_appointments,
    stats::{appointment_stats, AppointmentStats},
    validation::{non_blank, validate_appointment, AppointmentForm},
};

const MAX_QUERY_DURATION_MIN: u32 = 24 * 60;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", get(list_appointments).post(create_appointment))
        .route("/appointments/conflicts", get(get_conflicts))
        .route("/appointments/available_slots", get(get_slots))
        .route("/appointments/stats", get(get_stats))
        .route(
            "/appointments/{appointment_id}",
            get(get_appointment)
                .patch(update_appointment)
                .delete(delete_appointment),
        )
}

/* ============================================================
   Store access
   ============================================================ */

#[async_trait]
impl DayAgenda for PgPool {
    async fn appointments_on(&self, date: NaiveDate) -> Result<Vec<Appointment>, ApiError> {
        let rows: Vec<AppointmentRow> = sqlx::query_as::<_, AppointmentRow>(
            r#"
            SELECT appointment_id, patient_name, patient_phone, patient_email, appointment_date,
                   appointment_time, duration, service, dentist, notes, status, priority,
                   created_at, updated_at
            FROM appointments
            WHERE appointment_date = $1
            ORDER BY appointment_time ASC
            "#,
        )
        .bind(date)
        .fetch_all(self)
        .await
        .map_err(ApiError::db)?;

        rows_into(rows)
    }
}

pub(crate) async fn fetch_appointments(
    db: &PgPool,
    date: Option<NaiveDate>,
    status: Option<AppointmentStatus>,
) -> Result<Vec<Appointment>, ApiError> {
    let rows: Vec<AppointmentRow> = sqlx::query_as::<_, AppointmentRow>(
        r#"
        SELECT appointment_id, patient_name, patient_phone, patient_email, appointment_date,
               appointment_time, duration, service, dentist, notes, status, priority,
               created_at, updated_at
        FROM appointments
        WHERE ($1::date IS NULL OR appointment_date = $1)
          AND ($2::text IS NULL OR status = $2)
        ORDER BY appointment_date ASC, appointment_time ASC
        "#,
    )
    .bind(date)
    .bind(status.map(AppointmentStatus::as_str))
    .fetch_all(db)
    .await
    .map_err(ApiError::db)?;

    rows_into(rows)
}

async fn fetch_appointment(state: &AppState, appointment_id: Uuid) -> Result<Appointment, ApiError> {
    let row: AppointmentRow = sqlx::query_as::<_, AppointmentRow>(
        r#"
        SELECT appointment_id, patient_name, patient_phone, patient_email, appointment_date,
               appointment_time, duration, service, dentist, notes, status, priority,
               created_at, updated_at
        FROM appointments
        WHERE appointment_id = $1
        "#,
    )
    .bind(appointment_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("appointment"))?;

    row.try_into()
}

/* ============================================================
   Requests
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_name: String,
    pub patient_phone: String,
    pub patient_email: Option<String>,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub duration: i32,
    pub service: String,
    pub dentist: String,
    pub notes: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub priority: Option<Priority>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub patient_name: Option<String>,
    pub patient_phone: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub patient_email: Option<Option<String>>,
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<String>,
    pub duration: Option<i32>,
    pub service: Option<String>,
    pub dentist: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub notes: Option<Option<String>>,
    pub status: Option<AppointmentStatus>,
    pub priority: Option<Priority>,
}

impl UpdateAppointmentRequest {
    /// Whether the change can move the booking onto someone else's time.
    fn touches_schedule(&self) -> bool {
        self.appointment_date.is_some()
            || self.appointment_time.is_some()
            || self.duration.is_some()
            || self.dentist.is_some()
    }
}

#[derive(Debug, Deserialize)]
pub struct AppointmentListQuery {
    pub date: Option<NaiveDate>,
    /// a status label, or "all"
    pub status: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConflictQuery {
    pub date: NaiveDate,
    pub time: String,
    pub duration: u32,
    pub dentist: String,
    pub exclude_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
    pub dentist: String,
    pub duration: Option<u32>,
}

/// Appointment fields as they will be written.
#[derive(Debug, Clone)]
struct AppointmentFields {
    patient_name: String,
    patient_phone: String,
    patient_email: Option<String>,
    appointment_date: NaiveDate,
    appointment_time: String,
    duration: i32,
    service: String,
    dentist: String,
    notes: Option<String>,
    status: AppointmentStatus,
    priority: Priority,
}

impl AppointmentFields {
    fn from_create(req: CreateAppointmentRequest) -> Self {
        AppointmentFields {
            patient_name: req.patient_name,
            patient_phone: req.patient_phone,
            patient_email: req.patient_email,
            appointment_date: req.appointment_date,
            appointment_time: req.appointment_time,
            duration: req.duration,
            service: req.service,
            dentist: req.dentist,
            notes: req.notes,
            status: req.status.unwrap_or(AppointmentStatus::Agendado),
            priority: req.priority.unwrap_or(Priority::Normal),
        }
    }

    fn merge(existing: Appointment, req: UpdateAppointmentRequest) -> Self {
        AppointmentFields {
            patient_name: req.patient_name.unwrap_or(existing.patient_name),
            patient_phone: req.patient_phone.unwrap_or(existing.patient_phone),
            patient_email: req.patient_email.unwrap_or(existing.patient_email),
            appointment_date: req.appointment_date.unwrap_or(existing.appointment_date),
            appointment_time: req.appointment_time.unwrap_or(existing.appointment_time),
            duration: req.duration.unwrap_or(existing.duration),
            service: req.service.unwrap_or(existing.service),
            dentist: req.dentist.unwrap_or(existing.dentist),
            notes: req.notes.unwrap_or(existing.notes),
            status: req.status.unwrap_or(existing.status),
            priority: req.priority.unwrap_or(existing.priority),
        }
    }

    /// Validates, then trims text and rewrites the time as zero-padded `HH:MM`.
    fn validated(self) -> Result<Self, ApiError> {
        validate_appointment(&AppointmentForm {
            patient_name: &self.patient_name,
            patient_phone: &self.patient_phone,
            patient_email: self.patient_email.as_deref(),
            appointment_time: &self.appointment_time,
            duration: self.duration,
            service: &self.service,
            dentist: &self.dentist,
        })?;

        let minutes = parse_time_of_day(&self.appointment_time)?;
        Ok(AppointmentFields {
            patient_name: self.patient_name.trim().to_string(),
            patient_phone: self.patient_phone.trim().to_string(),
            patient_email: non_blank(self.patient_email),
            appointment_time: format_time_of_day(minutes),
            service: self.service.trim().to_string(),
            dentist: self.dentist.trim().to_string(),
            notes: non_blank(self.notes),
            ..self
        })
    }

    fn duration_minutes(&self) -> u32 {
        // validated to be at least the minimum duration
        u32::try_from(self.duration).unwrap_or(0)
    }
}

async fn ensure_free<A>(
    agenda: &A,
    f: &AppointmentFields,
    exclude: Option<Uuid>,
) -> Result<(), ApiError>
where
    A: DayAgenda + ?Sized,
{
    let conflicts = check_time_conflicts(
        agenda,
        f.appointment_date,
        &f.appointment_time,
        f.duration_minutes(),
        &f.dentist,
        exclude,
    )
    .await?;

    if conflicts.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Conflict(
            "SCHEDULE_CONFLICT",
            "time conflict detected, choose another time".into(),
        ))
    }
}

/// Durations taken from query strings must fit inside one day.
fn query_duration(duration: u32) -> Result<u32, ApiError> {
    if duration == 0 || duration > MAX_QUERY_DURATION_MIN {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            format!("duration must be between 1 and {MAX_QUERY_DURATION_MIN} minutes"),
        ));
    }
    Ok(duration)
}

/* ============================================================
   Handlers
   ============================================================ */

pub async fn create_appointment(
    State(state): State<AppState>,
    _auth: AuthContext,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let f = AppointmentFields::from_create(req).validated()?;
    ensure_free(&state.db, &f, None).await?;

    let row: AppointmentRow = sqlx::query_as::<_, AppointmentRow>(
        r#"
        INSERT INTO appointments (
          appointment_id, patient_name, patient_phone, patient_email, appointment_date,
          appointment_time, duration, service, dentist, notes, status, priority,
          created_at, updated_at
        )
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12, now(), now())
        RETURNING appointment_id, patient_name, patient_phone, patient_email, appointment_date,
                  appointment_time, duration, service, dentist, notes, status, priority,
                  created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&f.patient_name)
    .bind(&f.patient_phone)
    .bind(f.patient_email.as_deref())
    .bind(f.appointment_date)
    .bind(&f.appointment_time)
    .bind(f.duration)
    .bind(&f.service)
    .bind(&f.dentist)
    .bind(f.notes.as_deref())
    .bind(f.status.as_str())
    .bind(f.priority.as_str())
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    tracing::info!(
        appointment_id = %row.appointment_id,
        date = %row.appointment_date,
        time = %row.appointment_time,
        "appointment created"
    );

    Ok(Json(ApiOk { data: row.try_into()? }))
}

pub async fn list_appointments(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<AppointmentListQuery>,
) -> Result<Json<ApiOk<Vec<Appointment>>>, ApiError> {
    let status = parse_status_filter::<AppointmentStatus>(q.status.as_deref())?;
    let appointments = fetch_appointments(&state.db, q.date, status).await?;

    let appointments = match q.q.as_deref() {
        Some(term) => filter_appointments(appointments, term),
        None => appointments,
    };

    Ok(Json(ApiOk { data: appointments }))
}

pub async fn get_appointment(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    Ok(Json(ApiOk {
        data: fetch_appointment(&state, appointment_id).await?,
    }))
}

pub async fn update_appointment(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<UpdateAppointmentRequest>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let existing = fetch_appointment(&state, appointment_id).await?;

    let recheck = req.touches_schedule();
    let f = AppointmentFields::merge(existing, req).validated()?;
    if recheck {
        ensure_free(&state.db, &f, Some(appointment_id)).await?;
    }

    // status is set as given; no transition rules apply
    let row: AppointmentRow = sqlx::query_as::<_, AppointmentRow>(
        r#"
        UPDATE appointments
        SET patient_name = $2,
            patient_phone = $3,
            patient_email = $4,
            appointment_date = $5,
            appointment_time = $6,
            duration = $7,
            service = $8,
            dentist = $9,
            notes = $10,
            status = $11,
            priority = $12,
            updated_at = now()
        WHERE appointment_id = $1
        RETURNING appointment_id, patient_name, patient_phone, patient_email, appointment_date,
                  appointment_time, duration, service, dentist, notes, status, priority,
                  created_at, updated_at
        "#,
    )
    .bind(appointment_id)
    .bind(&f.patient_name)
    .bind(&f.patient_phone)
    .bind(f.patient_email.as_deref())
    .bind(f.appointment_date)
    .bind(&f.appointment_time)
    .bind(f.duration)
    .bind(&f.service)
    .bind(&f.dentist)
    .bind(f.notes.as_deref())
    .bind(f.status.as_str())
    .bind(f.priority.as_str())
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("appointment"))?;

    Ok(Json(ApiOk { data: row.try_into()? }))
}

pub async fn delete_appointment(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let deleted: Option<Uuid> = sqlx::query_scalar(
        r#"
        DELETE FROM appointments
        WHERE appointment_id = $1
        RETURNING appointment_id
        "#,
    )
    .bind(appointment_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?;

    if deleted.is_none() {
        return Err(ApiError::not_found("appointment"));
    }
    tracing::info!(%appointment_id, "appointment deleted");

    Ok(Json(ApiOk {
        data: OkData { ok: true },
    }))
}

pub async fn get_conflicts(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<ConflictQuery>,
) -> Result<Json<ApiOk<Vec<Appointment>>>, ApiError> {
    let conflicts = check_time_conflicts(
        &state.db,
        q.date,
        &q.time,
        query_duration(q.duration)?,
        q.dentist.trim(),
        q.exclude_id,
    )
    .await?;

    Ok(Json(ApiOk { data: conflicts }))
}

pub async fn get_slots(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<SlotQuery>,
) -> Result<Json<ApiOk<Vec<String>>>, ApiError> {
    let duration = query_duration(q.duration.unwrap_or(DEFAULT_SLOT_DURATION_MIN))?;

    let slots = get_available_slots(&state.db, q.date, q.dentist.trim(), duration).await?;
    Ok(Json(ApiOk { data: slots }))
}

pub async fn get_stats(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<AppointmentStats>>, ApiError> {
    let all = fetch_appointments(&state.db, None, None).await?;
    Ok(Json(ApiOk {
        data: appointment_stats(&all, Local::now().date_naive()),
    }))
}
