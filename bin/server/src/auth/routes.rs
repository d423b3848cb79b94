//! Authentication routes for login, callback, authorize, and logout.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, header},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use base64::Engine;
use jobby_platform_access::{
    AuthenticationError, Role, SessionState, User, is_mobile_user_agent, split_subject,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::Duration as TimeDuration;

use super::{AppState, CookieKey};
use crate::db::FindOrCreate;
use crate::error::ApiError;
use crate::notify::NotificationJob;
use crate::response::ApiResponse;

/// Encrypted cookies keyed by the application's cookie secret.
type SessionJar = PrivateCookieJar<CookieKey>;

/// Session cookie name.
const SESSION_COOKIE: &str = "auth-session";

/// Where `callback` sends the browser once the identity is verified.
const AUTHORIZE_PATH: &str = "/api/v1/auth/authorize";

const STATE_BYTES: usize = 32;

/// Query parameters for the login redirect.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    #[serde(rename = "type", default)]
    login_type: String,
}

/// Query parameters for the OIDC callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    code: String,
    #[serde(default)]
    state: String,
}

/// Body of a successful `authorize`.
#[derive(Debug, Serialize)]
pub struct Authorized {
    pub profile: User,
    pub subject: String,
    pub access_token: String,
}

/// Starts the OIDC login flow by redirecting to the identity provider.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LoginQuery>,
    jar: SessionJar,
) -> Result<(SessionJar, Redirect), ApiError> {
    let requested_role = Role::from_login_type(&query.login_type)?;

    let login_state = random_state();
    let request = state.oidc_client.authorization_url(&login_state);
    let session = SessionState::LoginPending {
        state: login_state,
        requested_role,
        nonce: request.nonce,
        pkce_verifier: request.pkce_verifier,
    };

    let jar = jar.add(session_cookie(&session, state.secure_cookies)?);
    Ok((jar, Redirect::temporary(&request.url)))
}

/// Handles the provider's redirect back after the user authenticates.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
    jar: SessionJar,
) -> Result<(SessionJar, Redirect), ApiError> {
    let session = read_session(&jar).ok_or(AuthenticationError::MissingLoginState)?;
    let (requested_role, nonce, pkce_verifier) = session.verify_callback_state(&query.state)?;

    let login = state
        .oidc_client
        .exchange_code(&query.code, nonce, pkce_verifier)
        .await
        .map_err(AuthenticationError::from)?;

    let (prefix, opaque_id) = split_subject(&login.subject);
    if opaque_id.is_empty() {
        return Err(AuthenticationError::MalformedClaims {
            provider: prefix.to_string(),
            reason: "subject has no provider id".to_string(),
        }
        .into());
    }
    let identity = state.providers.decode(&login.subject, login.raw_claims)?;
    tracing::info!(subject = %login.subject, "Verified provider login");

    let session = SessionState::Authenticated {
        requested_role,
        access_token: login.access_token,
        subject: login.subject,
        identity,
    };
    let jar = jar.add(session_cookie(&session, state.secure_cookies)?);
    Ok((jar, Redirect::temporary(AUTHORIZE_PATH)))
}

/// Resolves the verified identity to a user and issues an access token.
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: SessionJar,
) -> Result<Response, ApiError> {
    let Some(SessionState::Authenticated {
        requested_role,
        subject,
        identity,
        ..
    }) = read_session(&jar)
    else {
        return Ok(Redirect::temporary("/").into_response());
    };

    let candidate = User::new(identity.provider_id().to_string(), requested_role)
        .with_name(identity.name())
        .with_email(identity.email())
        .with_picture(identity.picture());

    let (user, is_new) = match state.users.find_or_create(&candidate).await? {
        FindOrCreate::Existing(user) => (user, false),
        FindOrCreate::Created(user) => (user, true),
        FindOrCreate::Rejected(err) => return Err(err.into()),
    };

    let issued = state
        .tokens
        .issue(user.provider_id(), is_mobile_client(&headers))?;

    if is_new {
        tracing::info!(user_id = %user.id(), role = %user.role(), "Created user on first login");
        state.notifications.dispatch(NotificationJob::onboard(&user));
    }

    Ok(ApiResponse::ok(
        "Successfully authorized",
        Authorized {
            profile: user,
            subject,
            access_token: issued.token,
        },
    )
    .into_response())
}

/// Clears the session and signs the user out at the provider.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: SessionJar,
) -> Result<(SessionJar, Redirect), ApiError> {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or(if state.secure_cookies { "https" } else { "http" });
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("missing Host header"))?;

    let logout_url = provider_logout_url(state.oidc_client.config(), scheme, host)?;
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, Redirect::temporary(&logout_url)))
}

/// Returns true if the request comes from a mobile app or browser.
pub(crate) fn is_mobile_client(headers: &HeaderMap) -> bool {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(is_mobile_user_agent)
}

fn random_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn provider_logout_url(
    config: &jobby_platform_access::OidcConfig,
    scheme: &str,
    host: &str,
) -> Result<String, ApiError> {
    let mut url = url::Url::parse(&config.logout_endpoint()).map_err(ApiError::internal)?;
    url.query_pairs_mut()
        .append_pair("returnTo", &format!("{scheme}://{host}"))
        .append_pair("client_id", config.client_id());
    Ok(url.to_string())
}

fn session_cookie(session: &SessionState, secure: bool) -> Result<Cookie<'static>, ApiError> {
    let value = serde_json::to_string(session).map_err(ApiError::internal)?;
    Ok(Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::minutes(10))
        .build())
}

fn read_session(jar: &SessionJar) -> Option<SessionState> {
    let cookie = jar.get(SESSION_COOKIE)?;
    match serde_json::from_str(cookie.value()) {
        Ok(session) => Some(session),
        Err(e) => {
            tracing::debug!(error = %e, "Discarding unreadable session cookie");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::oidc::testing as oidc_testing;
    use crate::auth::testing;
    use crate::cache::memory::MemoryUserCache;
    use axum::{Router, body::Body, extract::Request, http::StatusCode, routing::get};
    use crate::notify::NotificationJob;
    use jobby_platform_access::ExternalIdentity;
    use sqlx::PgPool;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<AppState>) {
        let (state, _jobs) = testing::state(Arc::new(MemoryUserCache::default()));
        let router = Router::new()
            .route("/api/v1/auth/login", get(login))
            .route("/api/v1/auth/callback", get(callback))
            .route("/api/v1/auth/authorize", get(authorize))
            .route("/api/v1/auth/logout", get(logout))
            .with_state(state.clone());
        (router, state)
    }

    fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = axum::http::Request::builder().uri(uri).header(header::HOST, "jobby.test");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).expect("request")
    }

    fn session_cookie_header(state: &AppState, session: &SessionState) -> String {
        let jar = PrivateCookieJar::new(state.cookie_key.clone())
            .add(session_cookie(session, false).expect("cookie"));
        let response = (jar, "").into_response();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .expect("set-cookie");
        set_cookie.split(';').next().expect("pair").to_string()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[test]
    fn state_is_32_random_bytes() {
        let a = random_state();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&a)
            .expect("base64");
        assert_eq!(decoded.len(), STATE_BYTES);
        assert_ne!(a, random_state());
    }

    #[test]
    fn logout_url_returns_to_origin() {
        let url = provider_logout_url(&oidc_testing::config(), "https", "jobby.test")
            .expect("url");
        assert_eq!(
            url,
            "https://jobby.test.auth0.com/v2/logout?returnTo=https%3A%2F%2Fjobby.test&client_id=client-id"
        );
    }

    #[test]
    fn mobile_client_is_read_from_user_agent() {
        let mut headers = HeaderMap::new();
        assert!(!is_mobile_client(&headers));
        headers.insert(
            header::USER_AGENT,
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)".parse().expect("ua"),
        );
        assert!(is_mobile_client(&headers));
    }

    #[tokio::test]
    async fn login_requires_a_type() {
        let (app, _) = app();
        let response = app
            .oneshot(get_request("/api/v1/auth/login", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["message"], "user type is required");
    }

    #[tokio::test]
    async fn login_rejects_admin_type() {
        let (app, _) = app();
        let response = app
            .oneshot(get_request("/api/v1/auth/login?type=admin", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(header::LOCATION).is_none());
    }

    #[tokio::test]
    async fn login_redirects_with_session_cookie() {
        let (app, _) = app();
        let response = app
            .oneshot(get_request("/api/v1/auth/login?type=poster", None))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .expect("location");
        assert!(location.starts_with("https://jobby.test.auth0.com/authorize?"));

        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .expect("cookie");
        assert!(set_cookie.starts_with("auth-session="));
        assert!(set_cookie.contains("HttpOnly"));
    }

    #[tokio::test]
    async fn callback_without_session_is_rejected() {
        let (app, _) = app();
        let response = app
            .oneshot(get_request("/api/v1/auth/callback?state=x&code=y", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["message"], "Invalid state parameter.");
    }

    #[tokio::test]
    async fn callback_with_wrong_state_is_rejected_before_exchange() {
        let (app, state) = app();
        let pending = SessionState::LoginPending {
            state: "expected".to_string(),
            requested_role: Role::User,
            nonce: "n".to_string(),
            pkce_verifier: "v".to_string(),
        };
        let cookie = session_cookie_header(&state, &pending);

        let response = app
            .oneshot(get_request(
                "/api/v1/auth/callback?state=forged&code=y",
                Some(&cookie),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["message"], "Invalid state parameter.");
    }

    #[tokio::test]
    async fn authorize_without_session_goes_home() {
        let (app, _) = app();
        let response = app
            .oneshot(get_request("/api/v1/auth/authorize", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers().get(header::LOCATION).expect("location"),
            "/"
        );
    }

    #[tokio::test]
    async fn authorize_with_pending_session_goes_home() {
        let (app, state) = app();
        let pending = SessionState::LoginPending {
            state: "s".to_string(),
            requested_role: Role::User,
            nonce: "n".to_string(),
            pkce_verifier: "v".to_string(),
        };
        let cookie = session_cookie_header(&state, &pending);
        let response = app
            .oneshot(get_request("/api/v1/auth/authorize", Some(&cookie)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    }

    #[sqlx::test]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn first_authorize_onboards_once(pool: PgPool) {
        let (state, mut jobs) = testing::with_pool(pool, Arc::new(MemoryUserCache::default()));
        let app = Router::new()
            .route("/api/v1/auth/authorize", get(authorize))
            .with_state(state.clone());
        let authenticated = SessionState::Authenticated {
            requested_role: Role::Poster,
            access_token: "at".to_string(),
            subject: "google-oauth2|77".to_string(),
            identity: ExternalIdentity::new("google-oauth2", "google-oauth2|77")
                .with_name("Ada")
                .with_email("ada@example.com"),
        };
        let cookie = session_cookie_header(&state, &authenticated);

        let first = app
            .clone()
            .oneshot(get_request("/api/v1/auth/authorize", Some(&cookie)))
            .await
            .expect("response");
        assert_eq!(first.status(), StatusCode::OK);
        let json = body_json(first).await;
        assert_eq!(json["message"], "Successfully authorized");
        assert_eq!(json["data"]["profile"]["role"], "poster");
        assert!(matches!(jobs.try_recv(), Ok(NotificationJob::Onboard { .. })));

        let second = app
            .oneshot(get_request("/api/v1/auth/authorize", Some(&cookie)))
            .await
            .expect("response");
        assert_eq!(second.status(), StatusCode::OK);
        assert!(jobs.try_recv().is_err());
    }

    #[tokio::test]
    async fn logout_clears_session_and_redirects_to_provider() {
        let (app, state) = app();
        let authenticated = SessionState::Authenticated {
            requested_role: Role::User,
            access_token: "at".to_string(),
            subject: "auth0|1".to_string(),
            identity: ExternalIdentity::new("auth0", "auth0|1"),
        };
        let cookie = session_cookie_header(&state, &authenticated);

        let response = app
            .oneshot(get_request("/api/v1/auth/logout", Some(&cookie)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .expect("location");
        assert!(location.starts_with("https://jobby.test.auth0.com/v2/logout?returnTo=http"));
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .expect("removal");
        assert!(set_cookie.starts_with("auth-session="));
        assert!(set_cookie.contains("Max-Age=0"));
    }
}
