use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Collected at local registration, absent on federated accounts.
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    /// Stable subject id at the federated provider.
    pub google_id: Option<String>,
    pub picture: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token_hash: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Creation payload. Every variant carries a credential, so a row can
/// never be inserted without one.
#[derive(Debug)]
pub enum NewUser<'a> {
    Local {
        name: &'a str,
        email: &'a str,
        phone: &'a str,
        password_hash: &'a str,
    },
    Federated {
        name: &'a str,
        email: &'a str,
        subject: &'a str,
        picture: Option<&'a str>,
    },
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
}
