use crate::clock::{to_db_precision, Clock};
use crate::error::{FlowError, FlowResult};
use crate::models::User;
use crate::repositories::user_repository::UserRepository;
use std::sync::Arc;

fn token_prefix(token: &str) -> String {
    token.chars().take(8).collect()
}

pub struct VerificationService {
    user_repository: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
}

impl VerificationService {
    pub fn new(user_repository: Arc<dyn UserRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            user_repository,
            clock,
        }
    }

    /// Consumes a verification token and activates its user.
    ///
    /// Yields exactly one of `Ok(user)`, [`FlowError::InvalidToken`] or
    /// [`FlowError::ExpiredToken`] for a readable store. An expired token is
    /// left in place for the cleanup job.
    pub async fn verify(&self, token: &str) -> FlowResult<User> {
        match self.consume(token).await {
            Err(FlowError::Internal(detail)) => {
                tracing::error!("Error during email verification: {}", detail);
                Err(FlowError::Internal(detail))
            }
            other => other,
        }
    }

    async fn consume(&self, token: &str) -> FlowResult<User> {
        let profile = match self.user_repository.find_profile_by_token(token).await? {
            Some(profile) => profile,
            None => {
                tracing::warn!("Invalid verification token attempt: {}...", token_prefix(token));
                return Err(FlowError::InvalidToken);
            }
        };

        let expiry = profile
            .token_expiry_at()
            .map_err(|e| FlowError::Internal(format!("Unreadable token expiry: {}", e)))?;

        let now = to_db_precision(self.clock.now());
        let still_valid = matches!(expiry, Some(expires_at) if now <= expires_at);
        if !still_valid {
            tracing::warn!("Expired verification token attempt: {}...", token_prefix(token));
            return Err(FlowError::ExpiredToken);
        }

        if !self
            .user_repository
            .complete_verification(profile.user_id, token)
            .await?
        {
            // Cleared between the lookup and the update.
            tracing::warn!(
                "Verification token no longer present: {}...",
                token_prefix(token)
            );
            return Err(FlowError::InvalidToken);
        }

        let user = self
            .user_repository
            .find_by_id(profile.user_id)
            .await?
            .ok_or_else(|| {
                FlowError::Internal(format!("User {} vanished during verification", profile.user_id))
            })?;

        tracing::info!("Email verified for user: {}", user.email);
        Ok(user)
    }
}
