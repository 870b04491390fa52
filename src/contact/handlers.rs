use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::{info, instrument};

use crate::{
    auth::{dto::MessageResponse, services::is_valid_email},
    error::{ApiError, ApiResult},
    state::AppState,
};

use super::dto::ContactRequest;
use super::repo_types::Contact;

pub fn routes() -> Router<AppState> {
    Router::new().route("/contact", post(submit_contact))
}

#[instrument(skip(state, payload))]
pub async fn submit_contact(
    State(state): State<AppState>,
    Json(mut payload): Json<ContactRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    payload.email = payload.email.trim().to_lowercase();

    if payload.name.trim().is_empty()
        || payload.email.is_empty()
        || payload.message.trim().is_empty()
    {
        return Err(ApiError::Validation("Please fill in all fields".into()));
    }

    if !is_valid_email(&payload.email) {
        return Err(ApiError::Validation(
            "Please provide a valid email address".into(),
        ));
    }

    let contact = Contact::create(
        &state.db,
        payload.name.trim(),
        &payload.email,
        payload.message.trim(),
    )
    .await?;

    info!(contact_id = %contact.id, "contact message received");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(
            "Message received! We'll get back to you soon.",
        )),
    ))
}
