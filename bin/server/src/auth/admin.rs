//! Local-credential login for administrators.
//!
//! Step one checks email and password, stores a one-time code and queues
//! the email carrying it; step two trades email and code for an access
//! token. The code is consumed atomically, so it works once.

use axum::{extract::State, http::HeaderMap};
use chrono::{Duration, Utc};
use jobby_platform_access::{
    AuthenticationError, AuthorizationError, generate_otp, require_password, verify_password,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use super::AppState;
use super::routes::is_mobile_client;
use crate::db::users::Credentials;
use crate::error::ApiError;
use crate::extract::{ValidateJson, not_blank};
use crate::notify::{NotificationJob, TriggerEvent};
use crate::response::ApiResponse;

/// How long an emailed login code stays valid.
fn otp_lifetime() -> Duration {
    Duration::hours(24)
}

/// Body of `login-admin`.
#[derive(Debug, Deserialize, Validate)]
pub struct AdminLogin {
    #[validate(email(message = "a valid email is required"))]
    pub email: String,
    pub password: String,
}

/// Body of `confirm-login-admin`.
#[derive(Debug, Deserialize, Validate)]
pub struct OtpConfirmation {
    #[validate(email(message = "a valid email is required"))]
    pub email: String,
    #[validate(custom(function = "not_blank", message = "otp is required"))]
    pub otp: String,
}

/// Checks an administrator's password and emails a login code.
pub async fn login_admin(
    State(state): State<Arc<AppState>>,
    ValidateJson(body): ValidateJson<AdminLogin>,
) -> Result<ApiResponse<()>, ApiError> {
    let Credentials {
        user,
        password_hash,
    } = state
        .users
        .find_credentials_by_email(body.email.trim())
        .await?
        .ok_or_else(|| AuthenticationError::UserNotFound {
            provider_id: body.email.clone(),
        })?;

    if !user.role().is_admin() {
        return Err(AuthorizationError::NotAdministrator.into());
    }

    let password = require_password(&body.password)?;
    let matches = password_hash
        .as_deref()
        .is_some_and(|hash| verify_password(password, hash));
    if !matches {
        return Err(AuthenticationError::InvalidCredentials.into());
    }

    let otp = generate_otp();
    state
        .users
        .set_verification_token(user.id(), &otp, Utc::now() + otp_lifetime())
        .await?;

    let queued = state
        .notifications
        .dispatch(NotificationJob::Trigger(TriggerEvent::otp(&user, &otp)));
    tracing::info!(user_id = %user.id(), queued, "Stored login code");

    Ok(ApiResponse::ok("Successfully sent OTP", ()))
}

/// Exchanges an emailed login code for an access token.
pub async fn confirm_login_admin(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidateJson(body): ValidateJson<OtpConfirmation>,
) -> Result<ApiResponse<String>, ApiError> {
    let user = state
        .users
        .consume_verification_token(body.email.trim(), body.otp.trim())
        .await?
        .ok_or(AuthenticationError::InvalidOtp)?;

    let issued = state
        .tokens
        .issue(user.provider_id(), is_mobile_client(&headers))?;
    tracing::info!(user_id = %user.id(), "Administrator logged in");

    Ok(ApiResponse::ok("Successfully loggedIn", issued.token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing;
    use crate::cache::memory::MemoryUserCache;
    use crate::db::UserRepository;
    use axum::{
        Router,
        body::Body,
        extract::Request,
        http::{StatusCode, header},
        routing::post,
    };
    use jobby_platform_access::{Role, User, hash_password};
    use sqlx::PgPool;
    use tower::ServiceExt;

    fn routes(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/login-admin", post(login_admin))
            .route("/confirm-login-admin", post(confirm_login_admin))
            .with_state(state)
    }

    fn app() -> Router {
        let (state, _jobs) = testing::state(Arc::new(MemoryUserCache::default()));
        routes(state)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    fn json_request(uri: &str, body: &str) -> Request<Body> {
        axum::http::Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[test]
    fn codes_live_for_a_day() {
        assert_eq!(otp_lifetime().num_hours(), 24);
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let response = app()
            .oneshot(json_request("/login-admin", r#"{"email": 1}"#))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(json["statusCode"], 400);
    }

    #[tokio::test]
    async fn confirm_requires_otp_field() {
        let response = app()
            .oneshot(json_request("/confirm-login-admin", "{}"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn confirm_requires_the_email_as_well() {
        let response = app()
            .oneshot(json_request("/confirm-login-admin", r#"{"otp":"0042"}"#))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app()
            .oneshot(json_request(
                "/confirm-login-admin",
                r#"{"email":"root@example.com","otp":"  "}"#,
            ))
            .await
            .expect("response");
        assert_eq!(body_json(response).await["message"], "otp is required");
    }

    #[tokio::test]
    async fn login_rejects_malformed_email_before_lookup() {
        let response = app()
            .oneshot(json_request(
                "/login-admin",
                r#"{"email":"root","password":"0042"}"#,
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["message"], "a valid email is required");
    }

    #[sqlx::test]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn login_code_is_stored_then_queued(pool: PgPool) {
        let hash = hash_password("s3cret").expect("hash");
        let admin = User::new("admin|root".to_string(), Role::Admin).with_email("root@example.com");
        UserRepository::new(pool.clone())
            .create(&admin, Some(&hash))
            .await
            .expect("create")
            .expect("not taken");

        let (state, mut jobs) = testing::with_pool(pool, Arc::new(MemoryUserCache::default()));
        let response = routes(state.clone())
            .oneshot(json_request(
                "/login-admin",
                r#"{"email":"root@example.com","password":"s3cret"}"#,
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        // Queued before the response was written.
        let Ok(NotificationJob::Trigger(event)) = jobs.try_recv() else {
            panic!("no otp notification queued");
        };
        assert_eq!(event.name, "otp");
        let otp = event.payload["otp"].as_str().expect("otp").to_string();

        let wrong_email = routes(state.clone())
            .oneshot(json_request(
                "/confirm-login-admin",
                &format!(r#"{{"email":"other@example.com","otp":"{otp}"}}"#),
            ))
            .await
            .expect("response");
        assert_eq!(wrong_email.status(), StatusCode::BAD_REQUEST);

        let confirmed = routes(state)
            .oneshot(json_request(
                "/confirm-login-admin",
                &format!(r#"{{"email":"root@example.com","otp":"{otp}"}}"#),
            ))
            .await
            .expect("response");
        assert_eq!(confirmed.status(), StatusCode::OK);
        assert!(body_json(confirmed).await["data"].is_string());
    }
}
