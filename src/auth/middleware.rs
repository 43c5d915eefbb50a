use super::session::SESSION_USER_ID;
use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

/// Sends signed-in users back to the home page instead of the signup form.
pub async fn redirect_if_authenticated(session: Session, request: Request, next: Next) -> Response {
    if let Ok(Some(_user_id)) = session.get::<i64>(SESSION_USER_ID).await {
        Redirect::to("/").into_response()
    } else {
        next.run(request).await
    }
}
