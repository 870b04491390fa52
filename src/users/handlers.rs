use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{
        dto::MessageResponse,
        extractors::AuthUser,
        password::{hash_password, MIN_PASSWORD_LEN},
        repo_types::{User, UserChanges},
        services::is_valid_email,
    },
    error::{ApiError, ApiResult},
    state::AppState,
};

use super::dto::{UpdateUserRequest, UserResponse};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(state, _caller))]
pub async fn list_users(
    State(state): State<AppState>,
    _caller: AuthUser,
) -> ApiResult<Json<Vec<UserResponse>>> {
    let users = User::list(&state.db).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[instrument(skip(state, _caller))]
pub async fn get_user(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserResponse>> {
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(UserResponse::from(user)))
}

#[instrument(skip(state, caller, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    let email = match payload.email {
        Some(email) => {
            let email = email.trim().to_lowercase();
            if !is_valid_email(&email) {
                return Err(ApiError::Validation(
                    "Please enter a valid email address".into(),
                ));
            }
            Some(email)
        }
        None => None,
    };

    // Only a newly supplied plaintext is hashed; saves without a password
    // never touch the stored digest.
    let password_hash = match payload.password.as_deref() {
        Some(plain) if plain.len() < MIN_PASSWORD_LEN => {
            return Err(ApiError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Some(plain) => Some(hash_password(plain)?),
        None => None,
    };

    let changes = UserChanges {
        name: payload.name,
        email,
        phone: payload.phone,
        password_hash,
    };

    let user = User::update(&state.db, id, &changes)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    info!(user_id = %user.id, updated_by = %caller.id, "user updated");
    Ok(Json(UserResponse::from(user)))
}

#[instrument(skip(state, caller))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let deleted = User::delete(&state.db, id).await?;
    if !deleted {
        return Err(ApiError::NotFound("User not found".into()));
    }

    info!(user_id = %id, deleted_by = %caller.id, "user deleted");
    Ok(Json(MessageResponse::new("User deleted successfully")))
}
