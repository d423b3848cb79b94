//! HTTP route table.
//!
//! Everything is mounted under `/api/v1`. The auth flow is public; every
//! `/users` route runs behind [`authenticate`], and routes with an
//! allow-list add [`require_roles`] on top.

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{MethodRouter, get, patch, post},
};
use jobby_platform_access::RoleAllowList;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState, authenticate, require_roles};
use crate::error::ApiError;
use crate::handlers::{awards, profiles, users};

type Route = MethodRouter<Arc<AppState>>;

/// Restricts a route to callers whose role is in `allowed`.
fn gated(route: Route, allowed: RoleAllowList) -> Route {
    route.route_layer(from_fn_with_state(allowed, require_roles))
}

fn auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", get(auth::login))
        .route("/callback", get(auth::callback))
        .route("/authorize", get(auth::authorize))
        .route("/logout", get(auth::logout))
        .route("/login-admin", post(auth::login_admin))
        .route("/confirm-login-admin", post(auth::confirm_login_admin))
}

fn user_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            gated(
                get(users::list_users).post(users::create_admin),
                RoleAllowList::ADMINS,
            ),
        )
        .route(
            "/user",
            get(users::get_me)
                .patch(users::update_me)
                .delete(users::delete_me),
        )
        .route(
            "/user/{id}",
            gated(patch(users::reinstate_user), RoleAllowList::ADMINS),
        )
        .route(
            "/profiles",
            gated(post(profiles::create_profile), RoleAllowList::EVERYBODY)
                .merge(gated(get(profiles::list_profiles), RoleAllowList::ADMINS)),
        )
        .route(
            "/profiles/{id}",
            gated(
                get(profiles::get_profile)
                    .patch(profiles::update_profile)
                    .delete(profiles::delete_profile),
                RoleAllowList::EVERYBODY,
            ),
        )
        .route(
            "/profiles/awards",
            gated(post(awards::create_award), RoleAllowList::EVERYBODY)
                .merge(gated(get(awards::list_awards), RoleAllowList::ADMINS)),
        )
        .route(
            "/profiles/awards/{id}",
            gated(
                get(awards::get_award)
                    .patch(awards::update_award)
                    .delete(awards::delete_award),
                RoleAllowList::EVERYBODY,
            ),
        )
        .route_layer(from_fn_with_state(state, authenticate))
}

async fn route_not_found() -> ApiError {
    ApiError::not_found("route not found")
}

/// Builds the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .nest("/auth", auth_routes())
        .nest("/users", user_routes(state.clone()));

    Router::new()
        .nest("/api/v1", api)
        .fallback(route_not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
