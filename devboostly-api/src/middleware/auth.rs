use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use devboostly_order::{Role, Session};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::{AppState, AuthConfig};

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub exp: usize,
}

impl Claims {
    fn into_session(self) -> Session {
        Session {
            user_id: self.sub,
            email: self.email,
            role: self.role,
        }
    }
}

pub fn issue_token(auth: &AuthConfig, session: &Session) -> Result<String, AppError> {
    let claims = Claims {
        sub: session.user_id,
        email: session.email.clone(),
        role: session.role,
        exp: (Utc::now() + Duration::seconds(auth.expiration as i64)).timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.secret.as_bytes()))
        .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))
}

fn verify_token(auth: &AuthConfig, token: &str) -> Result<Session, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthenticationError("Invalid or expired token".to_string()))?;

    Ok(token_data.claims.into_session())
}

// ============================================================================
// Session middleware
// ============================================================================

/// Turns a bearer token into a `Session` request extension.
///
/// Requests without a token pass through anonymously; handlers that need a
/// caller extract [`AuthSession`]. A malformed or expired token is refused.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(|value| {
            value
                .strip_prefix("Bearer ")
                .ok_or_else(|| AppError::AuthenticationError("Expected a Bearer token".to_string()))
        })
        .transpose()?;

    if let Some(token) = token {
        let session = verify_token(&state.auth, token)?;
        req.extensions_mut().insert(session);
    }

    Ok(next.run(req).await)
}

/// Guards the `/admin` routes.
pub async fn admin_auth_middleware(req: Request, next: Next) -> Result<Response, AppError> {
    match req.extensions().get::<Session>() {
        Some(session) if session.is_admin() => Ok(next.run(req).await),
        Some(_) => Err(AppError::AuthorizationError("Admin access required".to_string())),
        None => Err(AppError::AuthenticationError("Authentication required".to_string())),
    }
}

// ============================================================================
// Extractors
// ============================================================================

/// The signed-in caller. Rejects with 401 when the request is anonymous.
#[derive(Debug, Clone)]
pub struct AuthSession(pub Session);

impl<S: Send + Sync> FromRequestParts<S> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .map(AuthSession)
            .ok_or_else(|| AppError::AuthenticationError("Authentication required".to_string()))
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<Session>().cloned().map(AuthSession))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            secret: "test-secret-test-secret".to_string(),
            expiration: 3600,
            bootstrap_admin_email: None,
        }
    }

    #[test]
    fn test_token_round_trip_keeps_role() {
        let session = Session {
            user_id: Uuid::new_v4(),
            email: "admin@example.com".to_string(),
            role: Role::Admin,
        };
        let token = issue_token(&config(), &session).unwrap();
        let back = verify_token(&config(), &token).unwrap();

        assert_eq!(back.user_id, session.user_id);
        assert!(back.is_admin());
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let session = Session {
            user_id: Uuid::new_v4(),
            email: "client@example.com".to_string(),
            role: Role::Client,
        };
        let mut other = config();
        other.secret = "another-secret-another".to_string();
        let token = issue_token(&other, &session).unwrap();

        assert!(matches!(verify_token(&config(), &token), Err(AppError::AuthenticationError(_))));
    }
}
