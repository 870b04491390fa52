use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, ForgotPasswordRequest, GoogleLoginRequest, LoginRequest,
            MessageResponse, PublicUser, RegisterRequest, ResetPasswordRequest,
        },
        jwt::JwtKeys,
        password::{hash_password, verify_password, MIN_PASSWORD_LEN},
        repo_types::{NewUser, User},
        reset,
        services::{self, is_valid_email},
    },
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Acknowledgement for forgot-password. Identical whether or not the
/// account exists, so the endpoint cannot reveal which emails are registered.
const FORGOT_PASSWORD_ACK: &str =
    "If a user with that email exists, a password reset link will be sent.";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/google-login", post(google_login))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password/:token", put(reset_password))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    payload.email = payload.email.trim().to_lowercase();

    if payload.name.trim().is_empty()
        || payload.email.is_empty()
        || payload.phone.trim().is_empty()
        || payload.password.is_empty()
    {
        return Err(ApiError::Validation("Please fill all fields".into()));
    }

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation(
            "Please enter a valid email address".into(),
        ));
    }

    if payload.password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(ApiError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    if User::find_by_email(&state.db, &payload.email)
        .await?
        .is_some()
    {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("User already exists".into()));
    }

    let hash = hash_password(&payload.password)?;

    // The unique index still backstops a concurrent registration that
    // slipped between the check above and this insert.
    let user = User::create(
        &state.db,
        NewUser::Local {
            name: payload.name.trim(),
            email: &payload.email,
            phone: payload.phone.trim(),
            password_hash: &hash,
        },
    )
    .await?;

    let token = JwtKeys::from_ref(&state).sign(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: PublicUser::from(&user),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    payload.email = payload.email.trim().to_lowercase();

    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::Validation(
            "Please provide email and password".into(),
        ));
    }

    // Unknown email and wrong password take the same exit.
    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::Authentication("Invalid credentials".into()));
        }
    };

    let ok = verify_password(&payload.password, user.password_hash.as_deref())?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::Authentication("Invalid credentials".into()));
    }

    let token = JwtKeys::from_ref(&state).sign(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn google_login(
    State(state): State<AppState>,
    Json(payload): Json<GoogleLoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    if payload.id_token.trim().is_empty() {
        return Err(ApiError::Validation("Missing Google token".into()));
    }

    let identity = match state.verifier.verify(&payload.id_token).await {
        Ok(identity) => identity,
        Err(e) => {
            warn!(error = %e, "google token rejected");
            return Err(ApiError::Authentication(
                "Google authentication failed".into(),
            ));
        }
    };

    let user = services::resolve_federated(&state, &identity).await?;
    let token = JwtKeys::from_ref(&state).sign(user.id)?;

    info!(user_id = %user.id, "user logged in via google");
    Ok(Json(AuthResponse {
        token,
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(mut payload): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    payload.email = payload.email.trim().to_lowercase();

    let Some(user) = User::find_by_email(&state.db, &payload.email).await? else {
        info!("forgot-password for unknown email");
        return Ok(Json(MessageResponse::new(FORGOT_PASSWORD_ACK)));
    };

    services::issue_and_deliver_reset(&state, &user).await?;

    Ok(Json(MessageResponse::new(FORGOT_PASSWORD_ACK)))
}

// The plaintext token stays out of the span.
#[instrument(skip(state, payload, token))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    // Confirmation mismatch fails before the store is touched.
    if payload.password != payload.confirm_password {
        return Err(ApiError::Validation("Passwords do not match".into()));
    }

    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let token_hash = reset::hash_token(&token);
    let now = OffsetDateTime::now_utc();

    // Unknown, consumed and expired tokens all surface the same way.
    let Some(user) = User::find_by_reset_token(&state.db, &token_hash, now).await? else {
        warn!("reset token rejected");
        return Err(ApiError::Authentication(
            "Invalid or expired reset token".into(),
        ));
    };

    let hash = hash_password(&payload.password)?;
    User::reset_password(&state.db, user.id, &hash).await?;

    info!(user_id = %user.id, "password reset completed");
    Ok(Json(MessageResponse::new("Password updated successfully!")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_state() -> AppState {
        AppState::fake()
    }

    #[tokio::test]
    async fn register_rejects_blank_fields() {
        let err = register(
            State(fake_state()),
            Json(RegisterRequest {
                name: "  ".into(),
                email: "jane@example.com".into(),
                phone: "+10000000000".into(),
                password: "secret1".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(msg) if msg == "Please fill all fields"));
    }

    #[tokio::test]
    async fn register_rejects_invalid_email() {
        let err = register(
            State(fake_state()),
            Json(RegisterRequest {
                name: "Jane".into(),
                email: "janeexample.com".into(),
                phone: "+10000000000".into(),
                password: "secret1".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(msg) if msg.contains("valid email")));
    }

    #[tokio::test]
    async fn register_rejects_short_password() {
        let err = register(
            State(fake_state()),
            Json(RegisterRequest {
                name: "Jane".into(),
                email: "jane@example.com".into(),
                phone: "+10000000000".into(),
                password: "abc".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(msg) if msg.contains("at least 6")));
    }

    #[tokio::test]
    async fn login_requires_email_and_password() {
        let err = login(
            State(fake_state()),
            Json(LoginRequest {
                email: "jane@example.com".into(),
                password: String::new(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn google_login_requires_a_token() {
        let err = google_login(
            State(fake_state()),
            Json(GoogleLoginRequest {
                id_token: "   ".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn reset_password_rejects_mismatched_confirmation() {
        let err = reset_password(
            State(fake_state()),
            Path("0123456789abcdef0123456789abcdef01234567".into()),
            Json(ResetPasswordRequest {
                password: "secret1".into(),
                confirm_password: "secret2".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(msg) if msg == "Passwords do not match"));
    }

    #[tokio::test]
    async fn reset_password_rejects_short_replacement() {
        let err = reset_password(
            State(fake_state()),
            Path("0123456789abcdef0123456789abcdef01234567".into()),
            Json(ResetPasswordRequest {
                password: "abc".into(),
                confirm_password: "abc".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(msg) if msg.contains("at least 6")));
    }

    #[test]
    fn auth_response_exposes_only_public_fields() {
        let user = PublicUser {
            id: uuid::Uuid::new_v4(),
            name: "Jane".into(),
            email: "jane@example.com".into(),
        };
        let json = serde_json::to_string(&AuthResponse {
            token: "signed.jwt.here".into(),
            user,
        })
        .unwrap();
        assert!(json.contains("jane@example.com"));
        assert!(json.contains("signed.jwt.here"));
        assert!(!json.contains("password"));
    }
}
