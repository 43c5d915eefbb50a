use crate::clock::parse_db_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: Option<String>,
}

/// Verification state attached one-to-one to a [`User`].
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub email_verified: bool,
    /// Empty when no token is outstanding.
    pub verification_token: String,
    pub token_expiry: Option<String>,
}

impl Profile {
    pub fn has_pending_token(&self) -> bool {
        !self.verification_token.is_empty()
    }

    pub fn token_expiry_at(&self) -> Result<Option<DateTime<Utc>>, chrono::ParseError> {
        self.token_expiry
            .as_deref()
            .map(parse_db_timestamp)
            .transpose()
    }
}

/// Row used by the CLI listing.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub email_verified: bool,
    pub has_pending_token: bool,
    pub created_at: Option<String>,
}
