use crate::{
    AppState,
    auth::{self, CurrentUser},
    errors::ApiError,
    excel::{self, ExcelError},
    models::{
        CreateInstrumentRequest, CreateUserRequest, CreatedResponse, DeletedResponse,
        ESTADO_MANTENIMIENTO, ImportReport, Instrument, Role, RoleResponse, SessionUser,
        UpdateInstrumentRequest, UpdateUserRequest, UpdatedResponse, UserResponse,
    },
    repository::RepoError,
    session::{clear_session_cookie, session_cookie, token_from_headers},
};
use axum::{
    Form, Json,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::Deserialize;

// --- Form & Filter Structs ---

/// RegisterForm
///
/// Body of the registration form posted by registro.html. The field names are
/// the form's, not the column names: `username` lands in `usuarios.nombre`,
/// and `codigos_de_acceso` is the access code that decides the new account's
/// role; the user never picks a role directly.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct RegisterForm {
    pub username: String,
    pub correo: String,
    pub password: String,
    pub codigos_de_acceso: String,
}

/// LoginForm
///
/// Body of the login form posted by login.html.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct LoginForm {
    pub correo: String,
    pub password: String,
}

/// SearchFilter
///
/// Query parameters of the instrument search endpoint. An absent or blank
/// `q` degrades to the full listing.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct SearchFilter {
    pub q: Option<String>,
}

// --- HTML helpers ---

/// Renders the small self-contained error page the auth forms link back from.
/// The frontend is plain HTML forms, so validation failures answer with a
/// page, not JSON.
fn error_page(status: StatusCode, titulo: &str, mensaje: &str, back_href: &str) -> Response {
    let body = format!(
        "<!DOCTYPE html>\n<html lang=\"es\">\n<head><meta charset=\"utf-8\"><title>{titulo}</title></head>\n\
         <body>\n<h1>{titulo}</h1>\n<p>{mensaje}</p>\n<a href=\"{back_href}\">Volver</a>\n</body>\n</html>"
    );
    (status, Html(body)).into_response()
}

fn register_error(status: StatusCode, mensaje: &str) -> Response {
    error_page(status, "Error de registro", mensaje, "/registro.html")
}

fn login_error(status: StatusCode, mensaje: &str) -> Response {
    error_page(status, "Error de inicio de sesión", mensaje, "/login.html")
}

/// The page each role lands on after login.
fn role_home(role: Role) -> &'static str {
    match role {
        Role::Admin => "/admin.html",
        Role::Asistente => "/asistente.html",
        Role::Auditor => "/auditor.html",
    }
}

// --- Landing & identity ---

/// landing
///
/// [Authenticated Route] GET /. Sends the browser to the page matching the
/// caller's role. The CurrentUser extractor already bounces anonymous
/// visitors to the login page.
pub async fn landing(CurrentUser(user): CurrentUser) -> Redirect {
    Redirect::to(role_home(user.tipo_usuario))
}

/// health
///
/// [Public Route] Liveness probe.
#[utoipa::path(get, path = "/health", responses((status = 200, description = "Alive")))]
pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// current_user
///
/// [Authenticated Route] Returns the identity snapshot captured at login.
/// Account edits made after login are NOT reflected here until re-login.
#[utoipa::path(
    get,
    path = "/api/usuario-actual",
    responses((status = 200, description = "Session identity", body = SessionUser))
)]
pub async fn current_user(CurrentUser(user): CurrentUser) -> Json<SessionUser> {
    Json(user)
}

/// current_role
///
/// [Authenticated Route] Returns only the caller's role. The frontend uses
/// this to decide which controls to render.
#[utoipa::path(
    get,
    path = "/api/tipo-usuario",
    responses((status = 200, description = "Session role", body = RoleResponse))
)]
pub async fn current_role(CurrentUser(user): CurrentUser) -> Json<RoleResponse> {
    Json(RoleResponse {
        tipo_usuario: user.tipo_usuario,
    })
}

// --- Auth flows ---

/// register
///
/// [Public Route] Creates an account from the registration form.
///
/// The flow:
/// 1. All four fields must be present.
/// 2. The access code must exist; its stored role text is normalized into
///    one of the three canonical roles (unknown spellings grant ASISTENTE).
/// 3. The password is hashed with Argon2 before the insert.
/// 4. A duplicate correo answers 400; success redirects to the login page.
#[utoipa::path(
    post,
    path = "/registro",
    responses(
        (status = 303, description = "Account created, redirect to login"),
        (status = 400, description = "Missing fields, bad code or duplicate email")
    )
)]
pub async fn register(State(state): State<AppState>, Form(form): Form<RegisterForm>) -> Response {
    if form.codigos_de_acceso.trim().is_empty() {
        return register_error(StatusCode::BAD_REQUEST, "Ingresa un código de acceso");
    }
    if form.username.trim().is_empty()
        || form.correo.trim().is_empty()
        || form.password.is_empty()
    {
        return register_error(StatusCode::BAD_REQUEST, "Todos los campos son requeridos");
    }

    let raw_role = match state.repo.find_access_code(form.codigos_de_acceso.trim()).await {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            return register_error(StatusCode::BAD_REQUEST, "Código de acceso inválido");
        }
        Err(err) => {
            tracing::error!(error = %err, "access code lookup failed");
            return register_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error al registrar usuario",
            );
        }
    };
    let role = Role::from_access_code(&raw_role);

    let hash = match auth::hash_password(form.password).await {
        Ok(hash) => hash,
        Err(err) => {
            tracing::error!(error = %err, "password hashing failed");
            return register_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error al registrar usuario",
            );
        }
    };

    match state
        .repo
        .create_user(form.username.trim(), form.correo.trim(), &hash, role)
        .await
    {
        Ok(id) => {
            tracing::info!(user_id = id, rol = role.as_str(), "account registered");
            Redirect::to("/login.html").into_response()
        }
        Err(RepoError::Duplicate) => {
            register_error(StatusCode::BAD_REQUEST, "El correo ya está registrado")
        }
        Err(err) => {
            tracing::error!(error = %err, "account insert failed");
            register_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error al registrar usuario",
            )
        }
    }
}

/// login
///
/// [Public Route] Verifies the credentials, mints a session and redirects to
/// the caller's role page. The failure message never distinguishes an unknown
/// correo from a wrong password.
#[utoipa::path(
    post,
    path = "/login",
    responses(
        (status = 303, description = "Session created, redirect to role page"),
        (status = 400, description = "Missing credentials"),
        (status = 401, description = "Unknown email or wrong password")
    )
)]
pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    if form.correo.trim().is_empty() || form.password.is_empty() {
        return login_error(StatusCode::BAD_REQUEST, "Ingresa correo y contraseña");
    }

    let record = match state.repo.find_user_by_email(form.correo.trim()).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            return login_error(StatusCode::UNAUTHORIZED, "Correo o contraseña incorrectos");
        }
        Err(err) => {
            tracing::error!(error = %err, "login lookup failed");
            return login_error(StatusCode::INTERNAL_SERVER_ERROR, "Error en la base de datos");
        }
    };

    match auth::verify_password(form.password, record.password_hash.clone()).await {
        Ok(true) => {}
        Ok(false) => {
            return login_error(StatusCode::UNAUTHORIZED, "Correo o contraseña incorrectos");
        }
        Err(err) => {
            tracing::error!(error = %err, user_id = record.id, "password verification failed");
            return login_error(StatusCode::UNAUTHORIZED, "Correo o contraseña incorrectos");
        }
    }

    let role = Role::parse_or_default(&record.rol);
    let token = state.sessions.insert(SessionUser {
        id: record.id,
        nombre: record.nombre,
        correo: record.correo,
        tipo_usuario: role,
    });
    tracing::info!(user_id = record.id, rol = role.as_str(), "session opened");

    let mut response = Redirect::to(role_home(role)).into_response();
    if let Ok(cookie) = HeaderValue::from_str(&session_cookie(token)) {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    response
}

/// logout
///
/// [Public Route] Destroys the session and clears the cookie. Deliberately
/// outside the session gate, so a stale tab can always log out.
#[utoipa::path(
    get,
    path = "/logout",
    responses((status = 303, description = "Session destroyed, redirect to login"))
)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = token_from_headers(&headers) {
        state.sessions.remove(&token);
    }
    let mut response = Redirect::to("/login.html").into_response();
    if let Ok(cookie) = HeaderValue::from_str(&clear_session_cookie()) {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    response
}

// --- Instruments ---

/// get_instruments
///
/// [Authenticated Route] Full inventory listing, id-ordered. All three roles
/// may read.
#[utoipa::path(
    get,
    path = "/api/instrumentos",
    responses((status = 200, description = "Inventory", body = [Instrument]))
)]
pub async fn get_instruments(State(state): State<AppState>) -> Result<Json<Vec<Instrument>>, ApiError> {
    let instruments = state.repo.list_instruments().await?;
    Ok(Json(instruments))
}

/// search_instruments
///
/// [Authenticated Route] Substring search over nombre, categoria, estado and
/// ubicacion, name-ordered. A blank query matches every row; a non-blank
/// query is matched verbatim, interior and edge spaces included.
#[utoipa::path(
    get,
    path = "/api/instrumentos/buscar",
    params(SearchFilter),
    responses((status = 200, description = "Matching instruments", body = [Instrument]))
)]
pub async fn search_instruments(
    State(state): State<AppState>,
    Query(filter): Query<SearchFilter>,
) -> Result<Json<Vec<Instrument>>, ApiError> {
    let q = filter.q.unwrap_or_default();
    let instruments = state.repo.search_instruments(&q).await?;
    Ok(Json(instruments))
}

fn validate_instrument_fields(
    nombre: &str,
    categoria: &str,
    estado: &str,
    ubicacion: &str,
) -> Result<(), ApiError> {
    if nombre.trim().is_empty()
        || categoria.trim().is_empty()
        || estado.trim().is_empty()
        || ubicacion.trim().is_empty()
    {
        return Err(ApiError::Validation(
            "Todos los campos son requeridos".to_string(),
        ));
    }
    Ok(())
}

/// create_instrument
///
/// [Authenticated Route] Adds an instrument. The route sits behind the
/// session gate; the handler itself further restricts creation to ADMIN.
#[utoipa::path(
    post,
    path = "/api/instrumentos",
    request_body = CreateInstrumentRequest,
    responses(
        (status = 200, description = "Created", body = CreatedResponse),
        (status = 400, description = "Missing required fields"),
        (status = 403, description = "Caller is not an administrator")
    )
)]
pub async fn create_instrument(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateInstrumentRequest>,
) -> Result<Json<CreatedResponse>, ApiError> {
    if user.tipo_usuario != Role::Admin {
        return Err(ApiError::Forbidden(
            "Solo administradores pueden crear instrumentos".to_string(),
        ));
    }
    validate_instrument_fields(
        &payload.nombre,
        &payload.categoria,
        &payload.estado,
        &payload.ubicacion,
    )?;

    let id = state.repo.create_instrument(&payload).await?;
    tracing::info!(instrument_id = id, user_id = user.id, "instrument created");
    Ok(Json(CreatedResponse { success: true, id }))
}

/// update_instrument
///
/// [Authenticated Route] Edits an instrument, with two role rules:
/// * ASISTENTE may not set estado to MANTENIMIENTO (exact, case-sensitive).
/// * Non-ADMIN callers persist only nombre, categoria, estado, ubicacion and
///   descripcion; marca and modelo silently keep their stored values.
#[utoipa::path(
    put,
    path = "/api/instrumentos/{id}",
    request_body = UpdateInstrumentRequest,
    responses(
        (status = 200, description = "Updated", body = UpdatedResponse),
        (status = 403, description = "Role rule violation"),
        (status = 404, description = "Unknown instrument")
    )
)]
pub async fn update_instrument(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateInstrumentRequest>,
) -> Result<Json<UpdatedResponse>, ApiError> {
    // The role rule is checked first: an ASISTENTE pushing MANTENIMIENTO gets
    // the 403 even when other fields are also missing.
    if user.tipo_usuario == Role::Asistente && payload.estado == ESTADO_MANTENIMIENTO {
        return Err(ApiError::Forbidden(
            "Los asistentes no pueden poner instrumentos en mantenimiento".to_string(),
        ));
    }

    validate_instrument_fields(
        &payload.nombre,
        &payload.categoria,
        &payload.estado,
        &payload.ubicacion,
    )?;

    let affected = if user.tipo_usuario == Role::Admin {
        state.repo.update_instrument_full(id, &payload).await?
    } else {
        state.repo.update_instrument_limited(id, &payload).await?
    };

    if affected == 0 {
        return Err(ApiError::NotFound("Instrumento no encontrado".to_string()));
    }

    Ok(Json(UpdatedResponse {
        success: true,
        message: "Instrumento actualizado".to_string(),
        affected_rows: affected,
    }))
}

/// delete_instrument
///
/// [Authenticated Route] Removes an instrument. ADMIN-only, enforced here
/// rather than by the router gate because the path is shared with the PUT
/// every role may call. Deleting an id that does not exist still succeeds.
#[utoipa::path(
    delete,
    path = "/api/instrumentos/{id}",
    responses(
        (status = 200, description = "Deleted", body = DeletedResponse),
        (status = 403, description = "Caller is not an administrator")
    )
)]
pub async fn delete_instrument(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<DeletedResponse>, ApiError> {
    if user.tipo_usuario != Role::Admin {
        return Err(ApiError::AccessDenied);
    }
    state.repo.delete_instrument(id).await?;
    Ok(Json(DeletedResponse {
        success: true,
        message: None,
    }))
}

// --- Bulk transfer ---

/// export_instruments
///
/// [Authenticated Route] Streams the whole inventory as an xlsx attachment.
/// The workbook is assembled in memory; nothing touches the filesystem.
#[utoipa::path(
    get,
    path = "/descargar-instrumentos",
    responses((status = 200, description = "Workbook attachment"))
)]
pub async fn export_instruments(State(state): State<AppState>) -> Result<Response, ApiError> {
    let instruments = state.repo.list_instruments().await?;
    let bytes = excel::write_instruments(&instruments).map_err(|err| {
        tracing::error!(error = %err, "export workbook build failed");
        ApiError::Validation("Error al exportar los instrumentos".to_string())
    })?;

    let mut response = bytes.into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ),
    );
    response.headers_mut().insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment; filename=\"instrumentos.xlsx\""),
    );
    Ok(response)
}

/// import_instruments
///
/// [Authenticated Route] Bulk-loads instruments from an uploaded workbook
/// (multipart field `excelFile`). Every row insert is awaited; a failed row
/// is counted and logged but does not abort the rest. The caller gets a
/// per-row report instead of a blind success.
#[utoipa::path(
    post,
    path = "/cargar-instrumentos",
    responses(
        (status = 200, description = "Import report", body = ImportReport),
        (status = 400, description = "Missing file or unreadable workbook")
    )
)]
pub async fn import_instruments(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ImportReport>, ApiError> {
    let mut upload: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::Validation("No se proporcionó ningún archivo".to_string()))?
    {
        if field.name() == Some("excelFile") {
            let bytes = field
                .bytes()
                .await
                .map_err(|_| ApiError::Validation("No se proporcionó ningún archivo".to_string()))?;
            upload = Some(bytes.to_vec());
            break;
        }
    }
    let bytes =
        upload.ok_or_else(|| ApiError::Validation("No se proporcionó ningún archivo".to_string()))?;

    let rows = excel::read_instruments(&bytes).map_err(|err| match err {
        ExcelError::Write(inner) => {
            tracing::error!(error = %inner, "unexpected encode failure during import");
            ApiError::Validation("El archivo Excel no es válido".to_string())
        }
        _ => ApiError::Validation("El archivo Excel no es válido".to_string()),
    })?;

    let mut report = ImportReport {
        total: rows.len(),
        insertados: 0,
        fallidos: 0,
    };

    for row in rows {
        let request = CreateInstrumentRequest {
            nombre: row.nombre.unwrap_or_default(),
            categoria: row.categoria.unwrap_or_default(),
            estado: row.estado.unwrap_or_else(|| "DISPONIBLE".to_string()),
            ubicacion: row.ubicacion.unwrap_or_default(),
            descripcion: None,
            marca: None,
            modelo: None,
        };
        match state.repo.create_instrument(&request).await {
            Ok(_) => report.insertados += 1,
            Err(err) => {
                tracing::warn!(error = %err, nombre = %request.nombre, "import row failed");
                report.fallidos += 1;
            }
        }
    }

    tracing::info!(
        total = report.total,
        insertados = report.insertados,
        fallidos = report.fallidos,
        "import finished"
    );
    Ok(Json(report))
}

// --- User administration ---

/// get_users
///
/// [Admin Route] Lists every account. Password hashes never leave the
/// repository layer. `created_at` is a synthesized timestamp, not a stored
/// column.
#[utoipa::path(
    get,
    path = "/api/usuarios",
    responses((status = 200, description = "Accounts", body = [UserResponse]))
)]
pub async fn get_users(State(state): State<AppState>) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let now = Utc::now();
    let users = state
        .repo
        .list_users()
        .await?
        .into_iter()
        .map(|record| UserResponse {
            id: record.id,
            nombre: record.nombre,
            correo: record.correo,
            rol: Role::parse_or_default(&record.rol),
            created_at: now,
        })
        .collect();
    Ok(Json(users))
}

/// create_user
///
/// [Admin Route] Creates an account directly, bypassing access codes. The
/// role arrives as raw text so an unknown value can answer 400 instead of a
/// deserialization rejection.
#[utoipa::path(
    post,
    path = "/api/usuarios",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "Created", body = CreatedResponse),
        (status = 400, description = "Missing fields, bad role or duplicate email")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<CreatedResponse>, ApiError> {
    if payload.nombre.trim().is_empty()
        || payload.correo.trim().is_empty()
        || payload.password.is_empty()
        || payload.rol.trim().is_empty()
    {
        return Err(ApiError::Validation(
            "Todos los campos son requeridos".to_string(),
        ));
    }
    let role = Role::parse(payload.rol.trim())
        .ok_or_else(|| ApiError::Validation("Rol inválido".to_string()))?;

    let hash = auth::hash_password(payload.password).await?;
    let id = state
        .repo
        .create_user(payload.nombre.trim(), payload.correo.trim(), &hash, role)
        .await?;
    tracing::info!(user_id = id, rol = role.as_str(), "account created by admin");
    Ok(Json(CreatedResponse { success: true, id }))
}

/// update_user
///
/// [Admin Route] Edits an account's nombre, correo and rol. An admin may not
/// change their OWN role; editing someone else is unrestricted.
#[utoipa::path(
    put,
    path = "/api/usuarios/{id}",
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = DeletedResponse),
        (status = 400, description = "Self role change or duplicate email"),
        (status = 404, description = "Unknown account")
    )
)]
pub async fn update_user(
    CurrentUser(caller): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<DeletedResponse>, ApiError> {
    if payload.nombre.trim().is_empty() || payload.correo.trim().is_empty() {
        return Err(ApiError::Validation(
            "Todos los campos son requeridos".to_string(),
        ));
    }
    if caller.id == id && payload.rol != caller.tipo_usuario {
        return Err(ApiError::SelfRoleChangeForbidden);
    }

    let affected = state.repo.update_user(id, &payload).await?;
    if affected == 0 {
        return Err(ApiError::NotFound("Usuario no encontrado".to_string()));
    }

    Ok(Json(DeletedResponse {
        success: true,
        message: Some("Usuario actualizado".to_string()),
    }))
}

/// delete_user
///
/// [Admin Route] Removes an account. Self-deletion is refused so the system
/// cannot lose its last administrator mid-session.
#[utoipa::path(
    delete,
    path = "/api/usuarios/{id}",
    responses(
        (status = 200, description = "Deleted", body = DeletedResponse),
        (status = 400, description = "Self deletion"),
        (status = 404, description = "Unknown account")
    )
)]
pub async fn delete_user(
    CurrentUser(caller): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<DeletedResponse>, ApiError> {
    if caller.id == id {
        return Err(ApiError::SelfDeletionForbidden);
    }

    let affected = state.repo.delete_user(id).await?;
    if affected == 0 {
        return Err(ApiError::NotFound("Usuario no encontrado".to_string()));
    }

    Ok(Json(DeletedResponse {
        success: true,
        message: Some("Usuario eliminado".to_string()),
    }))
}
