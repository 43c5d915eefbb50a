use crate::auth;
use crate::error::FlowError;
use crate::flash;
use crate::AppState;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect},
};
use tower_sessions::Session;

pub const VERIFIED_MESSAGE: &str = "Email verified successfully!";
pub const INVALID_LINK_MESSAGE: &str = "Invalid verification link";
pub const EXPIRED_LINK_MESSAGE: &str = "Verification link has expired";
pub const VERIFICATION_FAILED_MESSAGE: &str =
    "An error occurred during verification. Please try again.";

/// Every outcome ends on the home page with exactly one flash message.
pub async fn verify_email_handler(
    State(state): State<AppState>,
    session: Session,
    Path(token): Path<String>,
) -> impl IntoResponse {
    match state.verification_service.verify(&token).await {
        Ok(user) => match auth::login(&session, &user).await {
            Ok(()) => flash::success(&session, VERIFIED_MESSAGE).await,
            Err(e) => {
                // The account is active at this point; only the sign-in failed.
                tracing::error!("Failed to sign in user {} after verification: {}", user.id, e);
                flash::error(&session, VERIFICATION_FAILED_MESSAGE).await;
            }
        },
        Err(FlowError::InvalidToken) => flash::error(&session, INVALID_LINK_MESSAGE).await,
        Err(FlowError::ExpiredToken) => flash::error(&session, EXPIRED_LINK_MESSAGE).await,
        Err(_) => flash::error(&session, VERIFICATION_FAILED_MESSAGE).await,
    }

    Redirect::to("/")
}
