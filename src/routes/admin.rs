use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Admin Router Module
///
/// Defines the routes exclusively accessible to sessions with the ADMIN role:
/// the account administration surface.
///
/// Access Control:
/// This entire router is wrapped in the `admin_guard` middleware layer, which
/// first resolves the session (redirecting anonymous callers to the login
/// page) and then requires the ADMIN role, answering a plain-text 403 denial
/// otherwise. Handlers therefore never see a non-admin request, though the
/// self-service rules (own role, own account) still live in the handlers.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /api/usuarios      Every account, hashes excluded.
        // POST /api/usuarios     Direct account creation, bypassing access codes.
        .route(
            "/api/usuarios",
            get(handlers::get_users).post(handlers::create_user),
        )
        // PUT/DELETE /api/usuarios/{id}
        // Account edit and removal, with the self-service refusals (an admin may
        // not change their own role nor delete their own account).
        .route(
            "/api/usuarios/{id}",
            put(handlers::update_user).delete(handlers::delete_user),
        )
}
