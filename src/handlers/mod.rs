pub mod home_handlers;
pub mod signup_handlers;
pub mod verification_handlers;

pub use home_handlers::{home_handler, logout_handler};
pub use signup_handlers::{signup_page, signup_submit};
pub use verification_handlers::verify_email_handler;

use askama::Template;
use axum::response::Html;

pub(crate) fn render_page<T: Template>(template: &T) -> Html<String> {
    Html(template.render().unwrap_or_else(|e| {
        tracing::error!("Template rendering failed: {}", e);
        "<html><body><h1>Error rendering page</h1></body></html>".to_string()
    }))
}
