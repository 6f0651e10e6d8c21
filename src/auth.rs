use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    errors::ApiError,
    models::{Role, SessionUser},
    session::{SessionStore, token_from_headers},
};

/// CurrentUser Extractor Result
///
/// This struct represents the resolved identity of an authenticated request.
/// It is the core output of the CurrentUser extractor implementation.
/// Handlers will use it to retrieve the caller's ID and verify permissions.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub SessionUser);

/// CurrentUser Extractor Implementation
///
/// Implements Axum's FromRequestParts trait, making CurrentUser usable as a
/// function argument in any authenticated handler. This cleanly separates
/// authentication (extractor) from business logic (the handler).
///
/// The entire process involves:
/// 1. Dependency Resolution: Accessing the SessionStore from the application state.
/// 2. Token Extraction: Reading the session cookie from the request headers.
/// 3. Session Lookup: Resolving the token to a live, unexpired session.
///
/// Rejection: Redirects to /login.html on any failure. The frontend is a set
/// of server-rendered pages, so an expired or missing session sends the
/// browser back to the login form rather than answering 401.
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    SessionStore: FromRef<S>,
{
    type Rejection = AuthRedirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let sessions = SessionStore::from_ref(state);

        let token = token_from_headers(&parts.headers).ok_or(AuthRedirect)?;

        let user = sessions.get(&token).ok_or(AuthRedirect)?;

        Ok(CurrentUser(user))
    }
}

/// AuthRedirect
///
/// The rejection type of the CurrentUser extractor. Converts into a 303
/// redirect pointing the browser at the login page.
#[derive(Debug)]
pub struct AuthRedirect;

impl IntoResponse for AuthRedirect {
    fn into_response(self) -> Response {
        Redirect::to("/login.html").into_response()
    }
}

/// session_guard
///
/// Route-layer gate for the authenticated router. The CurrentUser extractor
/// argument does all the work: if it rejects, the request never reaches the
/// inner service. Applied with `middleware::from_fn_with_state` so the
/// extractor can reach the SessionStore.
pub async fn session_guard(_user: CurrentUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// admin_guard
///
/// Route-layer gate for the admin router. Requires a live session AND the
/// ADMIN role. Non-admin callers receive the plain-text 403 denial; callers
/// without a session are redirected to the login page like everywhere else.
pub async fn admin_guard(user: CurrentUser, request: Request, next: Next) -> Response {
    if user.0.tipo_usuario != Role::Admin {
        return ApiError::AccessDenied.into_response();
    }
    next.run(request).await
}

/// hash_password
///
/// Hashes a plaintext password with Argon2id using a freshly generated salt.
/// Hashing is CPU-bound, so it runs on the blocking thread pool to keep the
/// async runtime responsive.
pub async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| ApiError::PasswordHash)
    })
    .await
    .map_err(|_| ApiError::PasswordHash)?
}

/// verify_password
///
/// Checks a plaintext candidate against a stored Argon2 hash on the blocking
/// thread pool. Returns Ok(false) for a mismatch; Err only for unusable
/// stored hashes or pool failures.
pub async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&hash).map_err(|_| ApiError::PasswordHash)?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|_| ApiError::PasswordHash)?
}
