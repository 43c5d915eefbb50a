use crate::config::SessionLayer;
use crate::{auth, handlers, middleware as app_middleware, AppState};
use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

/// Builds the full application router around an already configured session layer.
pub fn build_router(state: AppState, session_layer: SessionLayer) -> Router {
    let signup_routes = Router::new()
        .route(
            "/signup",
            get(handlers::signup_page).post(handlers::signup_submit),
        )
        .layer(middleware::from_fn(auth::middleware::redirect_if_authenticated));

    Router::new()
        .route("/", get(handlers::home_handler))
        .route("/verify/{token}", get(handlers::verify_email_handler))
        .route("/logout", get(handlers::logout_handler))
        .merge(signup_routes)
        .layer(session_layer)
        .layer(middleware::from_fn(app_middleware::add_security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
