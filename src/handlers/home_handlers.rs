use super::render_page;
use crate::auth;
use crate::flash::{self, FlashMessage};
use askama::Template;
use askama_web::WebTemplate;
use axum::response::{IntoResponse, Redirect};
use tower_sessions::Session;

#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
struct HomeTemplate {
    username: Option<String>,
    messages: Vec<FlashMessage>,
}

pub async fn home_handler(session: Session) -> impl IntoResponse {
    let template = HomeTemplate {
        username: auth::current_username(&session).await,
        messages: flash::take(&session).await,
    };
    render_page(&template)
}

pub async fn logout_handler(session: Session) -> impl IntoResponse {
    if let Err(e) = auth::logout(&session).await {
        tracing::warn!("Failed to clear session on logout: {}", e);
    }
    Redirect::to("/")
}
