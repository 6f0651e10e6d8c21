use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Defines the routes accessible to any user who has passed the session gate.
/// This module implements the whole inventory feature set: listing, search,
/// editing and the bulk import/export flows.
///
/// Access Control Strategy:
/// Every handler in this module relies on the session gate middleware being
/// present on the router layer above it. Role distinctions finer than
/// "has a session" (ADMIN-only creation and deletion, the ASISTENTE
/// maintenance rule) are enforced inside the handlers, because those routes
/// share their paths with methods every role may call.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/usuario-actual
        // The identity snapshot captured at login.
        .route("/api/usuario-actual", get(handlers::current_user))
        // GET /api/tipo-usuario
        // Just the role; the frontend uses it to decide which controls to render.
        .route("/api/tipo-usuario", get(handlers::current_role))
        // --- Inventory ---
        // GET /api/instrumentos        Full listing, any role.
        // POST /api/instrumentos       Creation; the handler restricts it to ADMIN.
        .route(
            "/api/instrumentos",
            get(handlers::get_instruments).post(handlers::create_instrument),
        )
        // GET /api/instrumentos/buscar?q=...
        // Substring search; a blank query matches every row, name-ordered.
        .route("/api/instrumentos/buscar", get(handlers::search_instruments))
        // PUT/DELETE /api/instrumentos/{id}
        // Editing is open to every role (with the ASISTENTE maintenance rule and
        // the restricted non-admin column set); deletion is ADMIN-only, checked
        // in the handler since the path is shared.
        .route(
            "/api/instrumentos/{id}",
            put(handlers::update_instrument).delete(handlers::delete_instrument),
        )
        // --- Bulk transfer ---
        // GET /descargar-instrumentos
        // The whole inventory as an xlsx attachment, built in memory.
        .route("/descargar-instrumentos", get(handlers::export_instruments))
        // POST /cargar-instrumentos
        // Bulk load from an uploaded workbook. The session gate sits strictly
        // before the multipart body is touched.
        .route("/cargar-instrumentos", post(handlers::import_instruments))
}
