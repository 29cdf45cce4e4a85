use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use devboostly_order::account::normalize_email;
use devboostly_order::{RepositoryError, Role, ServiceError, User};
use serde::{Deserialize, Serialize};
use crate::{error::AppError, middleware::auth::{issue_token, AuthSession}, state::AppState};

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
}

fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    use argon2::password_hash::SaltString;
    use argon2::password_hash::rand_core::OsRng;
    use argon2::{Argon2, PasswordHasher};
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let email = normalize_email(&payload.email);
    if !email.contains('@') {
        return Err(AppError::ValidationError("A valid email is required".to_string()));
    }
    if payload.name.trim().is_empty() {
        return Err(AppError::ValidationError("Name is required".to_string()));
    }
    if payload.password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::ValidationError(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    let role = role_for(&state, &email).await?;
    let password_hash = hash_password(&payload.password)
        .map_err(|e| AppError::InternalServerError(format!("Password hashing failed: {}", e)))?;
    let user = User::new(&email, payload.name.trim().to_string(), password_hash, role);

    state.store.insert_user(&user).await.map_err(|e| match e {
        RepositoryError::Duplicate(_) => AppError::ConflictError("An account already exists for this email".to_string()),
        other => ServiceError::from(other).into(),
    })?;
    tracing::info!("Registered user {} ({})", user.id, role.as_str());

    let token = issue_token(&state.auth, &user.session())?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// The bootstrap email only yields an admin while the instance has none.
async fn role_for(state: &AppState, email: &str) -> Result<Role, AppError> {
    let Some(bootstrap) = &state.auth.bootstrap_admin_email else {
        return Ok(Role::Client);
    };
    if normalize_email(bootstrap) != email {
        return Ok(Role::Client);
    }

    let users = state.store.list_users().await.map_err(ServiceError::from)?;
    if users.iter().any(|user| user.role == Role::Admin) {
        tracing::warn!("Bootstrap admin email registered but an admin already exists; granting client role");
        return Ok(Role::Client);
    }
    Ok(Role::Admin)
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let invalid = || AppError::AuthenticationError("Invalid email or password".to_string());

    let user = state.store.find_user_by_email(&payload.email).await
        .map_err(ServiceError::from)?
        .ok_or_else(invalid)?;
    if !verify_password(&payload.password, &user.password_hash) {
        return Err(invalid());
    }

    let token = issue_token(&state.auth, &user.session())?;
    Ok(Json(AuthResponse { token, user }))
}

async fn me(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> Result<Json<User>, AppError> {
    let user = state.store.get_user(session.user_id).await
        .map_err(ServiceError::from)?
        .ok_or_else(|| AppError::NotFoundError("User not found".to_string()))?;
    Ok(Json(user))
}
