pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod flash;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

use clock::Clock;
use config::AppConfig;
use repositories::{SqliteUserRepository, UserRepository};
use services::{
    EmailService, InMemoryRateLimiter, SignupService, TokenCleanupService, UserService,
    VerificationService,
};
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub signup_service: Arc<SignupService>,
    pub verification_service: Arc<VerificationService>,
    pub cleanup_service: Arc<TokenCleanupService>,
}

impl AppState {
    /// Wires repositories and services over `pool`.
    pub fn new(
        pool: &SqlitePool,
        config: &AppConfig,
        email_service: Arc<dyn EmailService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let user_repository: Arc<dyn UserRepository> =
            Arc::new(SqliteUserRepository::new(pool.clone()));

        let user_service = Arc::new(UserService::new(user_repository.clone()));
        let rate_limiter = Arc::new(InMemoryRateLimiter::new(
            clock.clone(),
            config.signup.max_attempts,
            config.signup.attempt_window,
        ));
        let signup_service = Arc::new(SignupService::new(
            user_service,
            user_repository.clone(),
            email_service,
            rate_limiter,
            clock.clone(),
            config.signup.clone(),
            config.base_url.clone(),
        ));
        let verification_service = Arc::new(VerificationService::new(
            user_repository.clone(),
            clock.clone(),
        ));
        let cleanup_service = Arc::new(TokenCleanupService::new(user_repository, clock));

        Self {
            signup_service,
            verification_service,
            cleanup_service,
        }
    }
}
