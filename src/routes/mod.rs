use crate::models::AppState;
use axum::Router;
use serde::{Deserialize, de::Deserializer};

pub mod appointment_routes;
pub mod auth_routes;
pub mod consultation_routes;
pub mod dashboard_routes;
pub mod patient_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1/auth", auth_routes::router())
        .nest("/api/v1", patient_routes::router())
        .nest("/api/v1", appointment_routes::router())
        .nest("/api/v1", consultation_routes::router())
        .nest("/api/v1", dashboard_routes::router())
        .with_state(state)
}

/// Lets PATCH bodies tell an absent field (`None`) from an explicit
/// `null` (`Some(None)`). Use with `#[serde(default)]`.
pub(crate) fn deserialize_double_option<'de, D, T>(
    deserializer: D,
) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    // only called when the field is present, even if it is null
    let inner = Option::<T>::deserialize(deserializer)?;
    Ok(Some(inner))
}
