pub mod email_service;
pub mod rate_limiter;
pub mod signup_service;
pub mod token_cleanup;
pub mod user_service;
pub mod verification_service;

pub use email_service::{
    create_email_service, ConsoleEmailService, EmailError, EmailService, SmtpEmailService,
};
pub use rate_limiter::{signup_attempts_key, InMemoryRateLimiter, RateLimitExceeded, RateLimiter};
pub use signup_service::{generate_verification_token, SignupService};
pub use token_cleanup::TokenCleanupService;
pub use user_service::{UserService, UserServiceError};
pub use verification_service::VerificationService;
