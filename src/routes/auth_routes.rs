use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    auth::{SessionToken, hash_password, password_matches},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::*,
    validation::{validate_sign_in, validate_sign_up},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/logout", post(logout))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn email_in_use() -> ApiError {
    ApiError::Conflict(
        "EMAIL_IN_USE",
        "an account with this email already exists".into(),
    )
}

/// A concurrent sign-up with the same email loses on the UNIQUE index.
fn insert_user_error(e: sqlx::Error) -> ApiError {
    if ApiError::is_unique_violation(&e) {
        email_in_use()
    } else {
        ApiError::db(e)
    }
}

async fn create_session(
    state: &AppState,
    user_id: Uuid,
) -> Result<(String, SessionTokenRow), ApiError> {
    let token = SessionToken::issue();
    let expires_at = Utc::now() + Duration::hours(state.session_ttl_hours);

    let session: SessionTokenRow = sqlx::query_as::<_, SessionTokenRow>(
        r#"
        INSERT INTO session_token (session_token_id, user_id, session_token_hash, expires_at)
        VALUES ($1, $2, $3, $4)
        RETURNING session_token_id, expires_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(&token.digest)
    .bind(expires_at)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok((token.bearer, session))
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<ApiOk<LoginResponseData>>, ApiError> {
    validate_sign_up(&req.full_name, &req.email, &req.password, &req.confirm_password)?;

    let email = normalize_email(&req.email);

    let taken: Option<Uuid> = sqlx::query_scalar(
        r#"
        SELECT user_id
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(&email)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?;

    if taken.is_some() {
        return Err(email_in_use());
    }

    let password_hash = hash_password(&req.password)?;

    let user: UserRow = sqlx::query_as::<_, UserRow>(
        r#"
        INSERT INTO users (user_id, full_name, phone, email, password_hash, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, now(), now())
        RETURNING user_id, full_name, phone, email, password_hash, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.full_name.trim())
    .bind(req.phone.trim())
    .bind(&email)
    .bind(&password_hash)
    .fetch_one(&state.db)
    .await
    .map_err(insert_user_error)?;

    tracing::info!(user_id = %user.user_id, "user registered");

    let (access_token, session) = create_session(&state, user.user_id).await?;

    Ok(Json(ApiOk {
        data: LoginResponseData {
            access_token,
            expires_at: session.expires_at,
            user: user.into(),
        },
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiOk<LoginResponseData>>, ApiError> {
    validate_sign_in(&req.email, &req.password)?;

    let user: UserRow = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT user_id, full_name, phone, email, password_hash, created_at, updated_at
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(normalize_email(&req.email))
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::invalid_credentials)?;

    if !password_matches(&req.password, &user.password_hash) {
        tracing::info!(user_id = %user.user_id, "rejected sign-in");
        return Err(ApiError::invalid_credentials());
    }

    let (access_token, session) = create_session(&state, user.user_id).await?;

    Ok(Json(ApiOk {
        data: LoginResponseData {
            access_token,
            expires_at: session.expires_at,
            user: user.into(),
        },
    }))
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<MeResponseData>>, ApiError> {
    let user: UserRow = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT user_id, full_name, phone, email, password_hash, created_at, updated_at
        FROM users
        WHERE user_id = $1
        "#,
    )
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::session_expired)?;

    let session: SessionTokenRow = sqlx::query_as::<_, SessionTokenRow>(
        r#"
        SELECT session_token_id, expires_at
        FROM session_token
        WHERE session_token_id = $1
          AND revoked_at IS NULL
          AND expires_at > now()
        "#,
    )
    .bind(auth.session_token_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::session_expired)?;

    Ok(Json(ApiOk {
        data: MeResponseData {
            user: user.into(),
            session: SessionInfo {
                session_token_id: session.session_token_id,
                expires_at: session.expires_at,
            },
        },
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    sqlx::query(
        r#"
        UPDATE session_token
        SET revoked_at = now()
        WHERE session_token_id = $1
          AND revoked_at IS NULL
        "#,
    )
    .bind(auth.session_token_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk {
        data: OkData { ok: true },
    }))
}
