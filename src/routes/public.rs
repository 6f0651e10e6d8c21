use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints that are **unauthenticated** and accessible to any client.
/// These are the gateway functions of the identity flow: registration, login
/// and the liveness probe.
///
/// GET / also lives here even though it requires a session: its CurrentUser
/// extractor self-guards and redirects anonymous visitors to the login page,
/// which is exactly the behavior the landing page wants.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // Sends a logged-in browser to its role page (admin.html, asistente.html
        // or auditor.html); anonymous visitors land on login.html.
        .route("/", get(handlers::landing))
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load balancer checks.
        .route("/health", get(handlers::health))
        // POST /registro
        // New account creation from the registration form. The access code in the
        // body decides the role; failures answer with a small HTML error page.
        .route("/registro", post(handlers::register))
        // POST /login
        // Credential check and session creation. On success the response carries
        // the session cookie and redirects to the caller's role page.
        .route("/login", post(handlers::login))
        // GET /logout
        // Session destruction, reachable by a plain link. Deliberately public so
        // a browser holding a stale or expired cookie can still clear it.
        .route("/logout", get(handlers::logout))
}
