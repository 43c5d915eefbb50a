pub mod test_helpers {
    use crate::models::User;
    use crate::repositories::{SqliteUserRepository, UserRepository};
    use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

    /// Create a new in-memory SQLite database for testing
    pub async fn create_test_db() -> Result<SqlitePool, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(pool)
    }

    /// Insert a test user (and its profile) with a hashed password
    pub async fn insert_test_user(
        pool: &SqlitePool,
        username: &str,
        email: &str,
        password: &str,
        active: bool,
    ) -> Result<User, sqlx::Error> {
        use argon2::{
            password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
            Argon2,
        };

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                sqlx::Error::Configuration(format!("Password hashing failed: {}", e).into())
            })?
            .to_string();

        SqliteUserRepository::new(pool.clone())
            .create_user_with_profile(username, email, &password_hash, active)
            .await
            .map_err(|e| sqlx::Error::Protocol(e.to_string()))
    }

    /// Give `user_id` a pending verification token expiring at `expires_at`
    pub async fn set_test_token(
        pool: &SqlitePool,
        user_id: i64,
        token: &str,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), sqlx::Error> {
        SqliteUserRepository::new(pool.clone())
            .set_verification_token(user_id, token, &crate::clock::to_db_timestamp(expires_at))
            .await
            .map_err(|e| sqlx::Error::Protocol(e.to_string()))
    }
}

pub mod email {
    use crate::services::email_service::{
        verification_body, EmailError, EmailService, VERIFICATION_SUBJECT,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SentEmail {
        pub to: String,
        pub subject: String,
        pub body: String,
        pub verification_url: String,
    }

    impl SentEmail {
        /// The path segment after `/verify/`.
        pub fn token(&self) -> Option<&str> {
            self.verification_url
                .rsplit_once("/verify/")
                .map(|(_, token)| token)
        }
    }

    /// Keeps every message instead of sending it.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingEmailService {
        sent: Arc<Mutex<Vec<SentEmail>>>,
    }

    impl RecordingEmailService {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn sent(&self) -> Vec<SentEmail> {
            self.sent.lock().clone()
        }

        pub fn last(&self) -> Option<SentEmail> {
            self.sent.lock().last().cloned()
        }
    }

    #[async_trait]
    impl EmailService for RecordingEmailService {
        async fn send_verification_email(
            &self,
            to_email: &str,
            verification_url: &str,
        ) -> Result<(), EmailError> {
            self.sent.lock().push(SentEmail {
                to: to_email.to_string(),
                subject: VERIFICATION_SUBJECT.to_string(),
                body: verification_body(verification_url),
                verification_url: verification_url.to_string(),
            });
            Ok(())
        }
    }

    /// Fails every send, like an unreachable SMTP relay.
    #[derive(Debug, Clone, Default)]
    pub struct FailingEmailService;

    #[async_trait]
    impl EmailService for FailingEmailService {
        async fn send_verification_email(
            &self,
            _to_email: &str,
            _verification_url: &str,
        ) -> Result<(), EmailError> {
            Err(EmailError::SendFailed("connection refused".to_string()))
        }
    }
}

pub mod app {
    use crate::clock::Clock;
    use crate::config::{AppConfig, SessionConfig, SignupSettings};
    use crate::routes::build_router;
    use crate::services::EmailService;
    use crate::AppState;
    use axum::Router;
    use sqlx::SqlitePool;
    use std::net::IpAddr;
    use std::sync::Arc;
    use tower_sessions_sqlx_store::SqliteStore;

    pub const TEST_BASE_URL: &str = "http://testserver";

    pub fn test_config() -> AppConfig {
        AppConfig {
            database_url: ":memory:".to_string(),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 8080,
            base_url: TEST_BASE_URL.to_string(),
            signup: SignupSettings::default(),
            cleanup_interval: None,
        }
    }

    /// Full router over `pool` with a SQLite-backed session layer.
    pub async fn build_test_app(
        pool: SqlitePool,
        email_service: Arc<dyn EmailService>,
        clock: Arc<dyn Clock>,
    ) -> Result<(Router, AppState), Box<dyn std::error::Error>> {
        let state = AppState::new(&pool, &test_config(), email_service, clock);

        let session_store = SqliteStore::new(pool).with_table_name("sessions")?;
        session_store.migrate().await?;
        let session_layer = SessionConfig::from_env().create_layer(session_store);

        Ok((build_router(state.clone(), session_layer), state))
    }
}

pub use app::{build_test_app, test_config, TEST_BASE_URL};
pub use email::{FailingEmailService, RecordingEmailService, SentEmail};

// Re-export commonly used test functions at module level for convenience
// Note: This is test-only code. Panic on error is acceptable in tests.
#[cfg(test)]
pub async fn create_test_pool() -> sqlx::SqlitePool {
    match test_helpers::create_test_db().await {
        Ok(pool) => pool,
        Err(e) => panic!("Failed to create test pool: {}", e),
    }
}
