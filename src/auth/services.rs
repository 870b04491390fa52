use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info};

use crate::auth::federated::VerifiedIdentity;
use crate::auth::repo_types::{NewUser, User};
use crate::auth::reset::{self, RESET_TOKEN_TTL_MINUTES};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Where the email points the user: the client app's reset page with the
/// plaintext token in the path.
pub(crate) fn reset_link(client_url: &str, token: &str) -> String {
    format!("{}/resetpassword/{}", client_url.trim_end_matches('/'), token)
}

/// Mint a reset token for `user`, persist its digest, then hand the
/// plaintext to the mail channel. The store write completes before the
/// plaintext leaves the process; if delivery fails the digest is cleared
/// again so no unreachable token stays live.
pub async fn issue_and_deliver_reset(state: &AppState, user: &User) -> ApiResult<()> {
    let issued = reset::issue();

    User::set_reset_token(&state.db, user.id, &issued.token_hash, issued.expires_at).await?;

    let link = reset_link(&state.config.client_url, &issued.token);
    let body = format!(
        "You are receiving this email because you (or someone else) has requested \
         the reset of a password. Please click on this link to reset your password:\n\n\
         {link}\n\nThis link is valid for {RESET_TOKEN_TTL_MINUTES} minutes. \
         If you did not request this, please ignore this email and your password \
         will remain unchanged."
    );

    if let Err(e) = state
        .mailer
        .send(&user.email, "Password Reset Request", &body)
        .await
    {
        error!(error = %e, user_id = %user.id, "reset email failed, clearing token");
        User::clear_reset_token(&state.db, user.id).await?;
        return Err(ApiError::Delivery("Email could not be sent".into()));
    }

    info!(user_id = %user.id, "password reset email sent");
    Ok(())
}

/// Find-or-create for a verified federated identity: match on the
/// provider subject first, then link by email for accounts that
/// registered locally, then create a fresh federated account.
pub async fn resolve_federated(state: &AppState, identity: &VerifiedIdentity) -> ApiResult<User> {
    if let Some(user) = User::find_by_google_id(&state.db, &identity.subject).await? {
        return Ok(user);
    }

    if let Some(existing) = User::find_by_email(&state.db, &identity.email).await? {
        info!(user_id = %existing.id, "linking federated subject to existing account");
        let user = User::link_google(
            &state.db,
            existing.id,
            &identity.subject,
            identity.picture.as_deref(),
        )
        .await?;
        return Ok(user);
    }

    let user = User::create(
        &state.db,
        NewUser::Federated {
            name: &identity.name,
            email: &identity.email,
            subject: &identity.subject,
            picture: identity.picture.as_deref(),
        },
    )
    .await?;
    info!(user_id = %user.id, "federated account created");
    Ok(user)
}
