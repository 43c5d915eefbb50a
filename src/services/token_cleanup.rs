use crate::clock::{to_db_timestamp, Clock};
use crate::error::{FlowError, FlowResult};
use crate::repositories::user_repository::UserRepository;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Clears verification tokens whose expiry has passed.
pub struct TokenCleanupService {
    user_repository: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
}

impl TokenCleanupService {
    pub fn new(user_repository: Arc<dyn UserRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            user_repository,
            clock,
        }
    }

    /// Runs one bulk cleanup and returns how many tokens were cleared.
    ///
    /// Failures are logged here; callers only see a generic internal error.
    pub async fn cleanup_expired_tokens(&self) -> FlowResult<u64> {
        let now = to_db_timestamp(self.clock.now());

        match self.user_repository.clear_expired_tokens(&now).await {
            Ok(count) => {
                tracing::info!("Cleaned up {} expired verification tokens", count);
                Ok(count)
            }
            Err(e) => {
                tracing::error!("Error during token cleanup: {}", e);
                Err(FlowError::Internal(e.to_string()))
            }
        }
    }

    /// Runs the cleanup every `every`, one run at a time.
    pub fn spawn_periodic(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                // Already logged by cleanup_expired_tokens.
                let _ = self.cleanup_expired_tokens().await;
            }
        })
    }
}
