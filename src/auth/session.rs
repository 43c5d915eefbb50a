use crate::models::User;
use tower_sessions::{session, Session};

pub const SESSION_USER_ID: &str = "user_id";
pub const SESSION_USERNAME: &str = "username";
const SESSION_AUTH_TIMESTAMP: &str = "auth_timestamp";

/// Signs `user` in on this session.
///
/// The session id is cycled first so an id issued before authentication is
/// never reused after it.
pub async fn login(session: &Session, user: &User) -> Result<(), session::Error> {
    session.cycle_id().await?;
    session.insert(SESSION_USER_ID, user.id).await?;
    session.insert(SESSION_USERNAME, &user.username).await?;
    session
        .insert(SESSION_AUTH_TIMESTAMP, chrono::Utc::now().timestamp())
        .await?;
    Ok(())
}

pub async fn current_username(session: &Session) -> Option<String> {
    session
        .get::<String>(SESSION_USERNAME)
        .await
        .ok()
        .flatten()
}

pub async fn logout(session: &Session) -> Result<(), session::Error> {
    session.flush().await
}
