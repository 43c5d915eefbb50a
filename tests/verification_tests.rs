use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, Response, StatusCode},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use mailgate::{
    clock::{Clock, ManualClock},
    models::User,
    repositories::{SqliteUserRepository, UserRepository},
    test_utils::{build_test_app, test_helpers, RecordingEmailService},
    AppState,
};
use sqlx::SqlitePool;
use tower::ServiceExt;

const VERIFIED: &str = "Email verified successfully!";
const INVALID: &str = "Invalid verification link";
const EXPIRED: &str = "Verification link has expired";
const TOKEN: &str = "Zm9vYmFyYmF6cXV4cXV1eGNvcmdlZ3JhdWx0Z2FycGx5";

struct TestApp {
    router: Router,
    state: AppState,
    pool: SqlitePool,
    clock: Arc<ManualClock>,
    recorder: RecordingEmailService,
}

async fn setup() -> TestApp {
    let pool = test_helpers::create_test_db().await.unwrap();
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap(),
    ));
    let recorder = RecordingEmailService::new();
    let (router, state) = build_test_app(pool.clone(), Arc::new(recorder.clone()), clock.clone())
        .await
        .unwrap();
    TestApp {
        router,
        state,
        pool,
        clock,
        recorder,
    }
}

/// An inactive user whose token expires 24 hours from now.
async fn pending_user(app: &TestApp) -> User {
    let user = test_helpers::insert_test_user(&app.pool, "alice", "alice@example.com", "pw", false)
        .await
        .unwrap();
    test_helpers::set_test_token(
        &app.pool,
        user.id,
        TOKEN,
        app.clock.now() + Duration::hours(24),
    )
    .await
    .unwrap();
    user
}

async fn get(app: &TestApp, uri: &str, cookie: Option<&str>) -> Response<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let mut request = builder.body(Body::empty()).unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 40000))));
    app.router.clone().oneshot(request).await.unwrap()
}

fn session_cookie(response: &Response<Body>) -> String {
    let raw = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie to be issued")
        .to_str()
        .unwrap();
    let cookie = tower_sessions::cookie::Cookie::parse(raw.to_string()).unwrap();
    format!("{}={}", cookie.name(), cookie.value())
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Visits the verification link and returns the home page shown afterwards.
async fn verify(app: &TestApp, token: &str) -> (String, String) {
    let response = get(app, &format!("/verify/{}", token), None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");

    let cookie = session_cookie(&response);
    let html = body_text(get(app, "/", Some(&cookie)).await).await;
    (html, cookie)
}

#[tokio::test]
async fn test_valid_token_activates_and_signs_in() {
    let app = setup().await;
    let user = pending_user(&app).await;

    let (html, cookie) = verify(&app, TOKEN).await;
    assert!(html.contains(VERIFIED));
    assert!(html.contains("Signed in as alice"));

    let repo = SqliteUserRepository::new(app.pool.clone());
    let user = repo.find_by_id(user.id).await.unwrap().unwrap();
    let profile = repo.find_profile_by_user_id(user.id).await.unwrap().unwrap();
    assert!(user.is_active);
    assert!(profile.email_verified);
    assert_eq!(profile.verification_token, "");

    // Signed-in users are sent away from the signup form.
    let response = get(&app, "/signup", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
}

#[tokio::test]
async fn test_replayed_token_is_invalid() {
    let app = setup().await;
    pending_user(&app).await;

    let (html, _) = verify(&app, TOKEN).await;
    assert!(html.contains(VERIFIED));

    let (html, _) = verify(&app, TOKEN).await;
    assert!(html.contains(INVALID));
    assert!(!html.contains("Signed in as"));
}

#[tokio::test]
async fn test_unknown_token_is_invalid() {
    let app = setup().await;
    pending_user(&app).await;

    let (html, _) = verify(&app, "not-a-real-token").await;
    assert!(html.contains(INVALID));
}

#[tokio::test]
async fn test_token_valid_until_expiry_instant() {
    let app = setup().await;
    pending_user(&app).await;

    app.clock.advance(Duration::hours(24));
    let (html, _) = verify(&app, TOKEN).await;
    assert!(html.contains(VERIFIED));
}

#[tokio::test]
async fn test_expired_token_stays_expired_until_cleanup() {
    let app = setup().await;
    let user = pending_user(&app).await;

    app.clock.advance(Duration::hours(24) + Duration::seconds(1));

    for _ in 0..2 {
        let (html, _) = verify(&app, TOKEN).await;
        assert!(html.contains(EXPIRED));
    }

    let repo = SqliteUserRepository::new(app.pool.clone());
    let profile = repo.find_profile_by_user_id(user.id).await.unwrap().unwrap();
    assert_eq!(profile.verification_token, TOKEN, "expired token is left for cleanup");
    assert!(!repo.find_by_id(user.id).await.unwrap().unwrap().is_active);

    let cleared = app.state.cleanup_service.cleanup_expired_tokens().await.unwrap();
    assert_eq!(cleared, 1);

    let (html, _) = verify(&app, TOKEN).await;
    assert!(html.contains(INVALID));
}

#[tokio::test]
async fn test_signup_then_verify_from_email() {
    let app = setup().await;

    let body = serde_urlencoded::to_string([
        ("username", "bob"),
        ("email", "bob@example.com"),
        ("password", "correct-horse"),
        ("password_confirm", "correct-horse"),
    ])
    .unwrap();
    let mut request = Request::builder()
        .method("POST")
        .uri("/signup")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 5], 40000))));
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let email = app.recorder.last().expect("verification email sent");
    let token = email.token().unwrap().to_string();

    let (html, _) = verify(&app, &token).await;
    assert!(html.contains(VERIFIED));
    assert!(html.contains("Signed in as bob"));
}

#[tokio::test]
async fn test_logout_clears_session() {
    let app = setup().await;
    pending_user(&app).await;

    let (_, cookie) = verify(&app, TOKEN).await;

    let response = get(&app, "/logout", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let html = body_text(get(&app, "/", Some(&cookie)).await).await;
    assert!(!html.contains("Signed in as"));
}
