use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

/// Validity window of a password-reset token.
pub const RESET_TOKEN_TTL_MINUTES: i64 = 15;

const RESET_TOKEN_BYTES: usize = 20;

/// A freshly minted reset token. The plaintext goes out by email and is
/// never stored; only `token_hash` and `expires_at` are written to the
/// user row, replacing any earlier unused token.
#[derive(Debug)]
pub struct IssuedReset {
    pub token: String,
    pub token_hash: String,
    pub expires_at: OffsetDateTime,
}

pub fn issue() -> IssuedReset {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let token = hex::encode(bytes);
    IssuedReset {
        token_hash: hash_token(&token),
        expires_at: OffsetDateTime::now_utc() + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
        token,
    }
}

/// Unsalted digest used to look a token up by equality. Unlike the
/// password digest, the same plaintext always hashes to the same value.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
