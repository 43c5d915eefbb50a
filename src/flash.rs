//! One-shot messages carried across a redirect in the session.

use serde::{Deserialize, Serialize};
use tower_sessions::{session, Session};

const FLASH_KEY: &str = "_flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlashLevel {
    Success,
    Error,
}

impl FlashLevel {
    pub fn css_class(&self) -> &'static str {
        match self {
            FlashLevel::Success => "success",
            FlashLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: FlashLevel,
    pub text: String,
}

pub async fn push(
    session: &Session,
    level: FlashLevel,
    text: impl Into<String>,
) -> Result<(), session::Error> {
    let mut messages = session
        .get::<Vec<FlashMessage>>(FLASH_KEY)
        .await?
        .unwrap_or_default();
    messages.push(FlashMessage {
        level,
        text: text.into(),
    });
    session.insert(FLASH_KEY, messages).await
}

pub async fn success(session: &Session, text: impl Into<String>) {
    if let Err(e) = push(session, FlashLevel::Success, text).await {
        tracing::warn!("Failed to store flash message: {}", e);
    }
}

pub async fn error(session: &Session, text: impl Into<String>) {
    if let Err(e) = push(session, FlashLevel::Error, text).await {
        tracing::warn!("Failed to store flash message: {}", e);
    }
}

/// Returns and clears the pending messages.
pub async fn take(session: &Session) -> Vec<FlashMessage> {
    match session.remove::<Vec<FlashMessage>>(FLASH_KEY).await {
        Ok(messages) => messages.unwrap_or_default(),
        Err(e) => {
            tracing::warn!("Failed to read flash messages: {}", e);
            Vec::new()
        }
    }
}
