use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Roles ---

/// Role
///
/// The three canonical permission tiers. The tag values ("ADMIN", "ASISTENTE",
/// "AUDITOR") are exactly the strings stored in the `usuarios.rol` column and
/// returned on the wire, so the enum serializes to them directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub enum Role {
    #[serde(rename = "ADMIN")]
    Admin,
    #[serde(rename = "ASISTENTE")]
    Asistente,
    #[serde(rename = "AUDITOR")]
    Auditor,
}

impl Role {
    /// The single role-normalization step for access codes.
    ///
    /// Access codes were seeded with a mix of spellings ("admin",
    /// "Administrador", "asistente", ...). Matching is case-insensitive on the
    /// role family; anything unrecognized grants ASISTENTE.
    pub fn from_access_code(raw: &str) -> Role {
        match raw.trim().to_lowercase().as_str() {
            "admin" | "administrador" => Role::Admin,
            "asistente" => Role::Asistente,
            "auditor" => Role::Auditor,
            _ => Role::Asistente,
        }
    }

    /// Parses a stored canonical tag. Returns None for anything else.
    pub fn parse(raw: &str) -> Option<Role> {
        match raw {
            "ADMIN" => Some(Role::Admin),
            "ASISTENTE" => Some(Role::Asistente),
            "AUDITOR" => Some(Role::Auditor),
            _ => None,
        }
    }

    /// Reads a `usuarios.rol` value. Rows written before the canonical-tag
    /// constraint may hold arbitrary text; those coerce to ASISTENTE, the same
    /// default the access-code normalization uses.
    pub fn parse_or_default(raw: &str) -> Role {
        Role::parse(raw).unwrap_or(Role::Asistente)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Asistente => "ASISTENTE",
            Role::Auditor => "AUDITOR",
        }
    }
}

// --- Session ---

/// SessionUser
///
/// The identity snapshot copied into the session store at login time. It is
/// deliberately NOT a live view of the `usuarios` row: edits to the account
/// after login do not reach an active session until the user logs in again.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionUser {
    pub id: i32,
    pub nombre: String,
    pub correo: String,
    pub tipo_usuario: Role,
}

// --- Users ---

/// UserRecord
///
/// A raw `usuarios` row. The password hash never leaves the repository layer;
/// handlers map this into `UserResponse` before serializing.
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: i32,
    pub nombre: String,
    pub correo: String,
    pub password_hash: String,
    pub rol: String,
}

/// UserResponse
///
/// Output schema for the admin user listing (GET /api/usuarios).
///
/// `created_at` is a synthesized placeholder: the `usuarios` table has no
/// creation-time column, so the service stamps the current instant on every
/// call. It is NOT the true creation time and changes between requests.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserResponse {
    pub id: i32,
    pub nombre: String,
    pub correo: String,
    pub rol: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Input payload for POST /api/usuarios.
///
/// `rol` arrives as a raw string so the handler can produce the documented
/// 400 validation response instead of a deserialization rejection.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateUserRequest {
    pub nombre: String,
    pub correo: String,
    pub password: String,
    pub rol: String,
}

/// Input payload for PUT /api/usuarios/{id}. Password is not editable here.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateUserRequest {
    pub nombre: String,
    pub correo: String,
    pub rol: Role,
}

// --- Instruments ---

/// Instrument
///
/// The normalized wire shape of an `instrumentos` row. Normalization happens
/// exactly once, at the repository boundary: a NULL id becomes 0, NULL text
/// fields become "", and a NULL estado becomes "DISPONIBLE".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Instrument {
    pub id: i32,
    pub nombre: String,
    pub categoria: String,
    pub estado: String,
    pub ubicacion: String,
    pub descripcion: String,
    pub marca: String,
    pub modelo: String,
}

/// Default estado applied when a row has none recorded.
pub const ESTADO_DISPONIBLE: &str = "DISPONIBLE";

/// The estado value with special permission handling: assistants may not set
/// it. Matched case-sensitively, exact.
pub const ESTADO_MANTENIMIENTO: &str = "MANTENIMIENTO";

/// Input payload for POST /api/instrumentos.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateInstrumentRequest {
    pub nombre: String,
    pub categoria: String,
    pub estado: String,
    pub ubicacion: String,
    pub descripcion: Option<String>,
    pub marca: Option<String>,
    pub modelo: Option<String>,
}

/// Input payload for PUT /api/instrumentos/{id}.
///
/// All seven fields may be supplied by any caller; which of them are persisted
/// depends on the caller's role (non-ADMIN updates drop marca/modelo).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateInstrumentRequest {
    pub nombre: String,
    pub categoria: String,
    pub estado: String,
    pub ubicacion: String,
    pub descripcion: Option<String>,
    pub marca: Option<String>,
    pub modelo: Option<String>,
}

// --- Operation responses ---

/// Response for a successful instrument creation.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreatedResponse {
    pub success: bool,
    pub id: i32,
}

/// Response for a successful update, carrying the affected-row count.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdatedResponse {
    pub success: bool,
    pub message: String,
    #[serde(rename = "affectedRows")]
    pub affected_rows: u64,
}

/// Response for a successful deletion.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DeletedResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Response for GET /api/tipo-usuario.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RoleResponse {
    pub tipo_usuario: Role,
}

/// ImportReport
///
/// Per-row outcome summary for the spreadsheet import. Every row insert is
/// awaited and counted; failed rows are logged but do not abort the rest
/// (best-effort import, now with an observable result).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ImportReport {
    pub total: usize,
    pub insertados: usize,
    pub fallidos: usize,
}
