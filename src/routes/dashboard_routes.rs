use axum::{Json, Router, extract::State, routing::get};
use chrono::Local;
use serde::Serialize;

use crate::error::ApiError;
use crate::middleware::auth_context::AuthContext;
use crate::models::{ApiOk, AppState, Appointment};
use crate::routes::{appointment_routes, consultation_routes};
use crate::stats::{
    AppointmentStats, ConsultationStats, appointment_stats, consultation_stats, todays_schedule,
};

#[derive(Debug, Serialize)]
pub struct DashboardData {
    pub patients: i64,
    pub appointments: AppointmentStats,
    pub consultations: ConsultationStats,
    pub today_appointments: Vec<Appointment>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}

pub async fn dashboard(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<DashboardData>>, ApiError> {
    let today = Local::now().date_naive();

    let patients: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM patients"#)
        .fetch_one(&state.db)
        .await
        .map_err(ApiError::db)?;

    let appointments = appointment_routes::fetch_appointments(&state.db, None, None).await?;
    let consultations = consultation_routes::fetch_consultations(
        &state.db,
        &consultation_routes::ConsultationListQuery::default(),
        None,
    )
    .await?;

    Ok(Json(ApiOk {
        data: DashboardData {
            patients,
            appointments: appointment_stats(&appointments, today),
            consultations: consultation_stats(&consultations, today),
            today_appointments: todays_schedule(&appointments, today),
        },
    }))
}
