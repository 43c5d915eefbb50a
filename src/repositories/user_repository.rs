use crate::models::{Profile, User, UserSummary};
use async_trait::async_trait;
use sqlx::SqlitePool;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("User not found")]
    NotFound,
    #[error("User already exists")]
    AlreadyExists,
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

fn map_unique_violation(err: sqlx::Error) -> RepositoryError {
    match err.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => RepositoryError::AlreadyExists,
        _ => RepositoryError::Database(err),
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, is_active, created_at";
const PROFILE_COLUMNS: &str = "id, user_id, email_verified, verification_token, token_expiry";

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait UserRepository: Send + Sync {
    /// Inserts the user and its profile in a single transaction.
    async fn create_user_with_profile(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        is_active: bool,
    ) -> RepositoryResult<User>;
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;
    async fn find_profile_by_user_id(&self, user_id: i64) -> RepositoryResult<Option<Profile>>;
    /// Never matches the empty string.
    async fn find_profile_by_token(&self, token: &str) -> RepositoryResult<Option<Profile>>;
    async fn set_verification_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: &str,
    ) -> RepositoryResult<()>;
    /// Activates the user and consumes `token`.
    ///
    /// Returns `Ok(false)` when the profile no longer carries `token`.
    async fn complete_verification(&self, user_id: i64, token: &str) -> RepositoryResult<bool>;
    /// Clears every non-empty token whose expiry is before `now`.
    async fn clear_expired_tokens(&self, now: &str) -> RepositoryResult<u64>;
    async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> RepositoryResult<Vec<UserSummary>>;
}

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create_user_with_profile(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        is_active: bool,
    ) -> RepositoryResult<User> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO users (username, email, password_hash, is_active) VALUES (?, ?, ?, ?)",
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(is_active)
        .execute(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        let user_id = inserted.last_insert_rowid();

        sqlx::query("INSERT INTO profiles (user_id) VALUES (?)")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ? COLLATE NOCASE"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_profile_by_user_id(&self, user_id: i64) -> RepositoryResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ?"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn find_profile_by_token(&self, token: &str) -> RepositoryResult<Option<Profile>> {
        if token.is_empty() {
            return Ok(None);
        }

        let profile = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE verification_token = ?"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn set_verification_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: &str,
    ) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE profiles SET verification_token = ?, token_expiry = ? WHERE user_id = ?",
        )
        .bind(token)
        .bind(expires_at)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn complete_verification(&self, user_id: i64, token: &str) -> RepositoryResult<bool> {
        let mut tx = self.pool.begin().await?;

        let consumed = sqlx::query(
            r#"
            UPDATE profiles
            SET email_verified = 1, verification_token = ''
            WHERE user_id = ? AND verification_token = ? AND verification_token <> ''
            "#,
        )
        .bind(user_id)
        .bind(token)
        .execute(&mut *tx)
        .await?;

        if consumed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        let activated = sqlx::query("UPDATE users SET is_active = 1 WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if activated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;

        Ok(true)
    }

    async fn clear_expired_tokens(&self, now: &str) -> RepositoryResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET verification_token = ''
            WHERE token_expiry < ? AND verification_token <> ''
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> RepositoryResult<Vec<UserSummary>> {
        let limit = limit.unwrap_or(100);
        let offset = offset.unwrap_or(0);

        let rows = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT
                u.id,
                u.username,
                u.email,
                u.is_active,
                p.email_verified,
                (p.verification_token <> '') AS has_pending_token,
                u.created_at
            FROM users u
            JOIN profiles p ON p.user_id = u.id
            ORDER BY u.id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
