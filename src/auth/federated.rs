use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::Deserialize;

/// Identity asserted by the external provider for a verified login token.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    /// Provider-scoped stable subject identifier.
    pub subject: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}

/// Verifies a provider-issued ID token and extracts the identity it
/// asserts. A failure here is an authentication failure, not a server
/// error.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> anyhow::Result<VerifiedIdentity>;
}

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Checks Google ID tokens against the tokeninfo endpoint, which validates
/// the signature and expiry on Google's side. Audience is checked here.
pub struct GoogleTokenVerifier {
    http: reqwest::Client,
    client_id: String,
}

impl GoogleTokenVerifier {
    pub fn new(client_id: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: client_id.to_string(),
        }
    }
}

/// Subset of the tokeninfo response we care about. Google serializes
/// every claim as a string.
#[derive(Debug, Deserialize)]
struct GoogleTokenInfo {
    aud: String,
    sub: String,
    email: Option<String>,
    email_verified: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

fn into_verified(info: GoogleTokenInfo, expected_aud: &str) -> anyhow::Result<VerifiedIdentity> {
    if info.aud != expected_aud {
        bail!("token audience does not match the configured client id");
    }
    if info.email_verified.as_deref() != Some("true") {
        bail!("provider has not verified the email on this token");
    }
    let email = info
        .email
        .context("token carries no email claim")?
        .trim()
        .to_lowercase();
    let name = match info.name {
        Some(name) if !name.trim().is_empty() => name,
        _ => email.split('@').next().unwrap_or(&email).to_string(),
    };
    Ok(VerifiedIdentity {
        subject: info.sub,
        email,
        name,
        picture: info.picture,
    })
}

#[async_trait]
impl IdentityVerifier for GoogleTokenVerifier {
    async fn verify(&self, id_token: &str) -> anyhow::Result<VerifiedIdentity> {
        let info: GoogleTokenInfo = self
            .http
            .get(TOKENINFO_URL)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .context("tokeninfo request failed")?
            .error_for_status()
            .context("tokeninfo rejected the token")?
            .json()
            .await
            .context("tokeninfo response did not parse")?;

        into_verified(info, &self.client_id)
    }
}
