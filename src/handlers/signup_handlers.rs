use super::render_page;
use crate::error::FlowError;
use crate::flash::{self, FlashMessage};
use crate::middleware::ClientIp;
use crate::models::{FieldError, SignupForm};
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Form, State},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

pub const RATE_LIMITED_MESSAGE: &str = "Too many signup attempts. Please try again later.";
pub const SIGNUP_SUCCESS_MESSAGE: &str =
    "Account created! Please check your email to verify your account.";
pub const SIGNUP_FAILED_MESSAGE: &str = "An error occurred during signup. Please try again.";

#[derive(Template, WebTemplate)]
#[template(path = "auth/signup.html")]
struct SignupTemplate {
    messages: Vec<FlashMessage>,
    errors: Vec<FieldError>,
    username: String,
    email: String,
}

pub async fn signup_page(
    State(state): State<AppState>,
    session: Session,
    ClientIp(client_ip): ClientIp,
) -> Response {
    if state.signup_service.is_rate_limited(&client_ip).await {
        flash::error(&session, RATE_LIMITED_MESSAGE).await;
        return Redirect::to("/").into_response();
    }

    render_page(&SignupTemplate {
        messages: flash::take(&session).await,
        errors: Vec::new(),
        username: String::new(),
        email: String::new(),
    })
    .into_response()
}

pub async fn signup_submit(
    State(state): State<AppState>,
    session: Session,
    ClientIp(client_ip): ClientIp,
    Form(form): Form<SignupForm>,
) -> Response {
    // Kept for re-rendering; passwords are never echoed back.
    let username = form.username.clone();
    let email = form.email.clone();

    match state.signup_service.signup(&client_ip, form).await {
        Ok(_user) => {
            flash::success(&session, SIGNUP_SUCCESS_MESSAGE).await;
            Redirect::to("/").into_response()
        }
        Err(FlowError::Validation(errors)) => render_page(&SignupTemplate {
            messages: Vec::new(),
            errors: errors.into_vec(),
            username,
            email,
        })
        .into_response(),
        Err(FlowError::RateLimited) => {
            flash::error(&session, RATE_LIMITED_MESSAGE).await;
            Redirect::to("/").into_response()
        }
        Err(_) => {
            flash::error(&session, SIGNUP_FAILED_MESSAGE).await;
            Redirect::to("/signup").into_response()
        }
    }
}
