/// Router Module Index
///
/// Organizes the application's routing logic into security-segregated modules,
/// enforcing a Defense-in-Depth strategy. This structure ensures that
/// access control is applied explicitly at the module level (via Axum layers),
/// preventing accidental exposure of protected endpoints.
///
/// The three modules map directly to the session tiers.

/// Routes accessible without a session (login, registration, liveness).
pub mod public;

/// Routes protected by the session gate middleware.
/// Requires a live, unexpired session cookie.
pub mod authenticated;

/// Routes restricted exclusively to sessions with the ADMIN role.
/// Implements mandatory authorization checks.
pub mod admin;
