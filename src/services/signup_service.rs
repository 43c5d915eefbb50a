use crate::clock::{to_db_precision, to_db_timestamp, Clock};
use crate::config::SignupSettings;
use crate::error::{FlowError, FlowResult};
use crate::models::{SignupForm, SignupRequest, User};
use crate::repositories::user_repository::UserRepository;
use crate::services::email_service::EmailService;
use crate::services::rate_limiter::{signup_attempts_key, RateLimiter};
use crate::services::user_service::UserService;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use std::sync::Arc;

const TOKEN_BYTES: usize = 32;

/// 32 random bytes, base64url without padding (43 characters).
pub fn generate_verification_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub struct SignupService {
    user_service: Arc<UserService>,
    user_repository: Arc<dyn UserRepository>,
    email_service: Arc<dyn EmailService>,
    rate_limiter: Arc<dyn RateLimiter>,
    clock: Arc<dyn Clock>,
    settings: SignupSettings,
    base_url: String,
}

impl SignupService {
    pub fn new(
        user_service: Arc<UserService>,
        user_repository: Arc<dyn UserRepository>,
        email_service: Arc<dyn EmailService>,
        rate_limiter: Arc<dyn RateLimiter>,
        clock: Arc<dyn Clock>,
        settings: SignupSettings,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            user_service,
            user_repository,
            email_service,
            rate_limiter,
            clock,
            settings,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn is_rate_limited(&self, client_ip: &str) -> bool {
        self.rate_limiter
            .attempts(&signup_attempts_key(client_ip))
            .await
            >= self.settings.max_attempts
    }

    /// Registers a new inactive account and mails its verification link.
    ///
    /// The attempt is counted against `client_ip` up front and handed back if
    /// the signup does not complete, so only successful signups stay counted.
    pub async fn signup(&self, client_ip: &str, form: SignupForm) -> FlowResult<User> {
        let key = signup_attempts_key(client_ip);

        if self.rate_limiter.try_acquire(&key).await.is_err() {
            return Err(FlowError::RateLimited);
        }

        match self.register(form).await {
            Ok(user) => {
                tracing::info!("New user signup: {}", user.email);
                Ok(user)
            }
            Err(err) => {
                self.rate_limiter.release(&key).await;
                if let FlowError::Internal(detail) = &err {
                    tracing::error!("Error during signup: {}", detail);
                }
                Err(err)
            }
        }
    }

    pub fn verification_url(&self, token: &str) -> String {
        format!("{}/verify/{}", self.base_url, token)
    }

    async fn register(&self, form: SignupForm) -> FlowResult<User> {
        let request = SignupRequest::from(form);
        let user = self.user_service.create_inactive_user(&request).await?;

        // No rollback past this point: a failed send leaves the inactive user in place.
        self.issue_token(&user).await?;

        Ok(user)
    }

    async fn issue_token(&self, user: &User) -> FlowResult<String> {
        let token = generate_verification_token();
        let expires_at = to_db_precision(self.clock.now()) + self.settings.token_lifetime;

        self.user_repository
            .set_verification_token(user.id, &token, &to_db_timestamp(expires_at))
            .await?;

        let verification_url = self.verification_url(&token);
        self.email_service
            .send_verification_email(&user.email, &verification_url)
            .await?;

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::repositories::SqliteUserRepository;
    use crate::services::email_service::{EmailError, MockEmailService};
    use crate::services::rate_limiter::InMemoryRateLimiter;
    use crate::test_utils::test_helpers;
    use chrono::{Duration, TimeZone, Utc};
    use mockall::predicate::*;

    fn form(username: &str, email: &str) -> SignupForm {
        SignupForm {
            username: username.to_string(),
            email: email.to_string(),
            password: "correct-horse".to_string(),
            password_confirm: "correct-horse".to_string(),
        }
    }

    async fn service_with(
        email_service: MockEmailService,
    ) -> (SignupService, Arc<InMemoryRateLimiter>, Arc<dyn UserRepository>) {
        let pool = test_helpers::create_test_db().await.unwrap();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap(),
        ));
        let repository: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(pool));
        let settings = SignupSettings::default();
        let limiter = Arc::new(InMemoryRateLimiter::new(
            clock.clone(),
            settings.max_attempts,
            settings.attempt_window,
        ));
        let service = SignupService::new(
            Arc::new(UserService::new(repository.clone())),
            repository.clone(),
            Arc::new(email_service),
            limiter.clone(),
            clock,
            settings,
            "http://testserver/",
        );
        (service, limiter, repository)
    }

    #[test]
    fn test_token_is_43_url_safe_chars() {
        let token = generate_verification_token();
        assert_eq!(token.len(), 43);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(token, generate_verification_token());
    }

    #[tokio::test]
    async fn test_email_sent_exactly_once() {
        let mut email = MockEmailService::new();
        email
            .expect_send_verification_email()
            .with(eq("carol@example.com"), always())
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(()) }));

        let (service, limiter, _repo) = service_with(email).await;
        let user = service
            .signup("192.0.2.1", form("carol", "carol@example.com"))
            .await
            .expect("signup succeeds");

        assert!(!user.is_active);
        assert_eq!(
            limiter.attempts(&signup_attempts_key("192.0.2.1")).await,
            1
        );
    }

    #[tokio::test]
    async fn test_email_failure_is_internal_and_uncounted() {
        let mut email = MockEmailService::new();
        email
            .expect_send_verification_email()
            .times(1)
            .returning(|_, _| {
                Box::pin(async { Err(EmailError::SendFailed("connection refused".to_string())) })
            });

        let (service, limiter, repo) = service_with(email).await;
        let result = service
            .signup("192.0.2.2", form("dave", "dave@example.com"))
            .await;

        assert!(matches!(result, Err(FlowError::Internal(_))));
        assert_eq!(
            limiter.attempts(&signup_attempts_key("192.0.2.2")).await,
            0
        );

        // The inactive user is not rolled back.
        let user = repo.find_by_username("dave").await.unwrap().unwrap();
        assert!(!user.is_active);
    }

    #[tokio::test]
    async fn test_validation_error_sends_nothing() {
        let mut email = MockEmailService::new();
        email.expect_send_verification_email().times(0);

        let (service, limiter, repo) = service_with(email).await;
        let mut bad = form("erin", "erin@example.com");
        bad.password_confirm = "different-pass".to_string();

        let result = service.signup("192.0.2.3", bad).await;

        assert!(matches!(result, Err(FlowError::Validation(_))));
        assert!(repo.find_by_username("erin").await.unwrap().is_none());
        assert_eq!(
            limiter.attempts(&signup_attempts_key("192.0.2.3")).await,
            0
        );
    }

    #[tokio::test]
    async fn test_verification_url_joins_base_url() {
        let (service, _limiter, _repo) = service_with(MockEmailService::new()).await;
        assert_eq!(
            service.verification_url("abc"),
            "http://testserver/verify/abc"
        );
    }

    #[tokio::test]
    async fn test_token_lives_exactly_24_hours_with_sub_microsecond_clock() {
        use crate::services::verification_service::VerificationService;

        let pool = test_helpers::create_test_db().await.unwrap();
        let issued_at =
            Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap() + Duration::nanoseconds(987_654_321);
        let clock = Arc::new(ManualClock::new(issued_at));
        let repository: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(pool));
        let settings = SignupSettings::default();

        let mut email = MockEmailService::new();
        email
            .expect_send_verification_email()
            .returning(|_, _| Box::pin(async { Ok(()) }));

        let service = SignupService::new(
            Arc::new(UserService::new(repository.clone())),
            repository.clone(),
            Arc::new(email),
            Arc::new(InMemoryRateLimiter::new(
                clock.clone(),
                settings.max_attempts,
                settings.attempt_window,
            )),
            clock.clone(),
            settings,
            "http://testserver",
        );

        let user = service
            .signup("192.0.2.4", form("grace", "grace@example.com"))
            .await
            .unwrap();
        let profile = repository.find_profile_by_user_id(user.id).await.unwrap().unwrap();
        let expiry = profile.token_expiry_at().unwrap().unwrap();
        assert_eq!(expiry, to_db_precision(issued_at) + Duration::hours(24));

        clock.advance(Duration::hours(24));
        let verification = VerificationService::new(repository, clock);
        let verified = verification
            .verify(&profile.verification_token)
            .await
            .expect("token still valid 24 hours after issuance");
        assert!(verified.is_active);
    }
}
