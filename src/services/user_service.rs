use crate::models::{FormErrors, SignupRequest, User, UserSummary};
use crate::repositories::user_repository::{RepositoryError, UserRepository};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

// Hardcoded regex pattern - guaranteed to be valid at compile time
#[allow(clippy::unwrap_used)]
static USERNAME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.@+-]+$").unwrap());

const USERNAME_MAX_LEN: usize = 150;
const EMAIL_MAX_LEN: usize = 254;
const PASSWORD_MIN_LEN: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Invalid signup data: {0}")]
    Invalid(FormErrors),
    #[error("Password hashing failed: {0}")]
    HashingError(String),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

pub struct UserService {
    repository: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }

    /// Validates the request, then creates an inactive user and its profile.
    pub async fn create_inactive_user(
        &self,
        request: &SignupRequest,
    ) -> Result<User, UserServiceError> {
        self.validate_signup(request).await?;

        let password_hash = self.hash_password(&request.password)?;

        match self
            .repository
            .create_user_with_profile(&request.username, &request.email, &password_hash, false)
            .await
        {
            Ok(user) => Ok(user),
            // Lost a race with a concurrent signup for the same name or address.
            Err(RepositoryError::AlreadyExists) => Err(UserServiceError::Invalid(
                FormErrors::single("username", "A user with that username or email already exists."),
            )),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    /// Applies the signup form rules and the uniqueness checks.
    pub async fn validate_signup(&self, request: &SignupRequest) -> Result<(), UserServiceError> {
        let mut errors = FormErrors::new();

        validate_username(&request.username, &mut errors);
        validate_email(&request.email, &mut errors);
        validate_password(&request.password, &request.password_confirm, &mut errors);

        if !errors.has_field("username")
            && self
                .repository
                .find_by_username(&request.username)
                .await?
                .is_some()
        {
            errors.add("username", "A user with that username already exists.");
        }

        if !errors.has_field("email")
            && self
                .repository
                .find_by_email(&request.email)
                .await?
                .is_some()
        {
            errors.add("email", "A user with that email already exists.");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(UserServiceError::Invalid(errors))
        }
    }

    pub async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<UserSummary>, UserServiceError> {
        Ok(self.repository.list_users(limit, offset).await?)
    }

    fn hash_password(&self, password: &str) -> Result<String, UserServiceError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| UserServiceError::HashingError(e.to_string()))
    }
}

fn validate_username(username: &str, errors: &mut FormErrors) {
    if username.is_empty() {
        errors.add("username", "This field is required.");
    } else if username.chars().count() > USERNAME_MAX_LEN {
        errors.add(
            "username",
            format!("Ensure this value has at most {} characters.", USERNAME_MAX_LEN),
        );
    } else if !USERNAME_PATTERN.is_match(username) {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }
}

fn validate_email(email: &str, errors: &mut FormErrors) {
    if email.is_empty() {
        errors.add("email", "This field is required.");
        return;
    }

    let well_formed = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !well_formed || email.len() > EMAIL_MAX_LEN {
        errors.add("email", "Enter a valid email address.");
    }
}

fn validate_password(password: &str, confirm: &str, errors: &mut FormErrors) {
    if password.is_empty() {
        errors.add("password", "This field is required.");
        return;
    }

    if password.chars().count() < PASSWORD_MIN_LEN {
        errors.add(
            "password",
            format!(
                "This password is too short. It must contain at least {} characters.",
                PASSWORD_MIN_LEN
            ),
        );
    }

    if password.chars().all(|c| c.is_ascii_digit()) {
        errors.add("password", "This password is entirely numeric.");
    }

    if password != confirm {
        errors.add("password_confirm", "The two password fields didn't match.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::user_repository::MockUserRepository;
    use mockall::predicate::*;

    fn request(username: &str, email: &str, password: &str, confirm: &str) -> SignupRequest {
        SignupRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            password_confirm: confirm.to_string(),
        }
    }

    fn sample_user() -> User {
        User {
            id: 1,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "hash".to_string(),
            is_active: false,
            created_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_inactive_user_success() {
        let mut mock_repo = MockUserRepository::new();

        mock_repo
            .expect_find_by_username()
            .with(eq("alice"))
            .times(1)
            .returning(|_| Box::pin(async { Ok(None) }));
        mock_repo
            .expect_find_by_email()
            .with(eq("alice@example.com"))
            .times(1)
            .returning(|_| Box::pin(async { Ok(None) }));

        let user = sample_user();
        mock_repo
            .expect_create_user_with_profile()
            .with(eq("alice"), eq("alice@example.com"), always(), eq(false))
            .times(1)
            .returning(move |_, _, _, _| {
                let user = user.clone();
                Box::pin(async move { Ok(user) })
            });

        let service = UserService::new(Arc::new(mock_repo));
        let result = service
            .create_inactive_user(&request(
                "alice",
                "alice@example.com",
                "s3cret-pass",
                "s3cret-pass",
            ))
            .await;

        let user = result.expect("Expected Ok result");
        assert_eq!(user.username, "alice");
        assert!(!user.is_active);
    }

    #[tokio::test]
    async fn test_taken_username_is_a_form_error() {
        let mut mock_repo = MockUserRepository::new();

        mock_repo
            .expect_find_by_username()
            .returning(|_| Box::pin(async { Ok(Some(sample_user())) }));
        mock_repo
            .expect_find_by_email()
            .returning(|_| Box::pin(async { Ok(None) }));
        mock_repo.expect_create_user_with_profile().times(0);

        let service = UserService::new(Arc::new(mock_repo));
        let result = service
            .create_inactive_user(&request(
                "alice",
                "other@example.com",
                "s3cret-pass",
                "s3cret-pass",
            ))
            .await;

        match result {
            Err(UserServiceError::Invalid(errors)) => assert!(errors.has_field("username")),
            other => panic!("expected a form error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_form_rules_collect_every_error() {
        let mock_repo = MockUserRepository::new();
        let service = UserService::new(Arc::new(mock_repo));

        let result = service
            .validate_signup(&request("bad name!", "not-an-email", "1234567", "7654321"))
            .await;

        match result {
            Err(UserServiceError::Invalid(errors)) => {
                assert!(errors.has_field("username"));
                assert!(errors.has_field("email"));
                assert!(errors.has_field("password"));
                assert!(errors.has_field("password_confirm"));
            }
            other => panic!("expected form errors, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_numeric_password_rejected() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo
            .expect_find_by_username()
            .returning(|_| Box::pin(async { Ok(None) }));
        mock_repo
            .expect_find_by_email()
            .returning(|_| Box::pin(async { Ok(None) }));

        let service = UserService::new(Arc::new(mock_repo));
        let result = service
            .validate_signup(&request("bob", "bob@example.com", "1234567890", "1234567890"))
            .await;

        assert!(matches!(result, Err(UserServiceError::Invalid(e)) if e.has_field("password")));
    }

    #[test]
    fn test_email_shape() {
        let mut errors = FormErrors::new();
        validate_email("a@example.com", &mut errors);
        assert!(errors.is_empty());

        for bad in ["@example.com", "a@", "a b@example.com", "a@b@c"] {
            let mut errors = FormErrors::new();
            validate_email(bad, &mut errors);
            assert!(errors.has_field("email"), "{} should be rejected", bad);
        }
    }
}
