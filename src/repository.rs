use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use crate::models::{
    CreateInstrumentRequest, ESTADO_DISPONIBLE, Instrument, Role, UpdateInstrumentRequest,
    UpdateUserRequest, UserRecord,
};

/// RepoError
///
/// The persistence layer's error contract. Unique-key conflicts are promoted
/// to their own variant so handlers can answer with the duplicate-email
/// message instead of a generic database failure.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("duplicate key")]
    Duplicate,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl RepoError {
    fn from_insert(err: sqlx::Error) -> Self {
        if let Some(db) = err.as_database_error() {
            if db.is_unique_violation() {
                return RepoError::Duplicate;
            }
        }
        RepoError::Database(err)
    }
}

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations. This is the core
/// of the Repository Abstraction pattern, allowing the handlers to interact with
/// the data layer without knowing the specific implementation (Postgres, Mock, etc.).
///
/// **Send + Sync + async_trait** are required to make the trait object (`Arc<dyn Repository>`)
/// safely shareable and usable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Access codes & accounts ---
    // Resolves an access code to its raw role text. Codes are single-use in
    // spirit but not enforced; the table is seeded, not user-managed.
    async fn find_access_code(&self, codigo: &str) -> Result<Option<String>, RepoError>;
    // Inserts a new account. `Duplicate` on a correo unique violation.
    async fn create_user(
        &self,
        nombre: &str,
        correo: &str,
        password_hash: &str,
        rol: Role,
    ) -> Result<i32, RepoError>;
    async fn find_user_by_email(&self, correo: &str) -> Result<Option<UserRecord>, RepoError>;

    // --- User administration (ADMIN surface) ---
    async fn list_users(&self) -> Result<Vec<UserRecord>, RepoError>;
    // Returns the affected-row count; 0 means the id does not exist.
    async fn update_user(&self, id: i32, req: &UpdateUserRequest) -> Result<u64, RepoError>;
    async fn delete_user(&self, id: i32) -> Result<u64, RepoError>;

    // --- Instruments ---
    async fn list_instruments(&self) -> Result<Vec<Instrument>, RepoError>;
    // Case-insensitive substring search over nombre, categoria, estado and
    // ubicacion, ordered by nombre. Blank q matches everything, NULL-column
    // rows included; a non-blank q is matched verbatim, spaces and all.
    async fn search_instruments(&self, q: &str) -> Result<Vec<Instrument>, RepoError>;
    async fn create_instrument(&self, req: &CreateInstrumentRequest) -> Result<i32, RepoError>;
    // Full update: all seven mutable columns.
    async fn update_instrument_full(
        &self,
        id: i32,
        req: &UpdateInstrumentRequest,
    ) -> Result<u64, RepoError>;
    // Restricted update for non-admin callers: marca and modelo are left untouched.
    async fn update_instrument_limited(
        &self,
        id: i32,
        req: &UpdateInstrumentRequest,
    ) -> Result<u64, RepoError>;
    async fn delete_instrument(&self, id: i32) -> Result<u64, RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// InstrumentRow
///
/// The raw shape of an `instrumentos` row. Legacy rows may carry NULLs in any
/// column except the key, so everything is optional here and normalized once,
/// in the `From` conversion below.
#[derive(Debug, FromRow)]
struct InstrumentRow {
    id: Option<i32>,
    nombre: Option<String>,
    categoria: Option<String>,
    estado: Option<String>,
    ubicacion: Option<String>,
    descripcion: Option<String>,
    marca: Option<String>,
    modelo: Option<String>,
}

impl From<InstrumentRow> for Instrument {
    fn from(row: InstrumentRow) -> Self {
        Instrument {
            id: row.id.unwrap_or(0),
            nombre: row.nombre.unwrap_or_default(),
            categoria: row.categoria.unwrap_or_default(),
            estado: row.estado.unwrap_or_else(|| ESTADO_DISPONIBLE.to_string()),
            ubicacion: row.ubicacion.unwrap_or_default(),
            descripcion: row.descripcion.unwrap_or_default(),
            marca: row.marca.unwrap_or_default(),
            modelo: row.modelo.unwrap_or_default(),
        }
    }
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the PostgreSQL database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const INSTRUMENT_COLUMNS: &str =
    "id, nombre, categoria, estado, ubicacion, descripcion, marca, modelo";

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_access_code(&self, codigo: &str) -> Result<Option<String>, RepoError> {
        let rol = sqlx::query_scalar::<_, String>(
            "SELECT rol FROM codigos_de_acceso WHERE codigo = $1",
        )
        .bind(codigo)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rol)
    }

    async fn create_user(
        &self,
        nombre: &str,
        correo: &str,
        password_hash: &str,
        rol: Role,
    ) -> Result<i32, RepoError> {
        sqlx::query_scalar::<_, i32>(
            "INSERT INTO usuarios (nombre, correo, password_hash, rol)
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(nombre)
        .bind(correo)
        .bind(password_hash)
        .bind(rol.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_insert)
    }

    async fn find_user_by_email(&self, correo: &str) -> Result<Option<UserRecord>, RepoError> {
        let user = sqlx::query_as::<_, UserRecord>(
            "SELECT id, nombre, correo, password_hash, rol FROM usuarios WHERE correo = $1",
        )
        .bind(correo)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, RepoError> {
        let users = sqlx::query_as::<_, UserRecord>(
            "SELECT id, nombre, correo, password_hash, rol FROM usuarios ORDER BY id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn update_user(&self, id: i32, req: &UpdateUserRequest) -> Result<u64, RepoError> {
        let result = sqlx::query(
            "UPDATE usuarios SET nombre = $1, correo = $2, rol = $3 WHERE id = $4",
        )
        .bind(&req.nombre)
        .bind(&req.correo)
        .bind(req.rol.as_str())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(RepoError::from_insert)?;
        Ok(result.rows_affected())
    }

    async fn delete_user(&self, id: i32) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM usuarios WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_instruments(&self) -> Result<Vec<Instrument>, RepoError> {
        let rows = sqlx::query_as::<_, InstrumentRow>(&format!(
            "SELECT {INSTRUMENT_COLUMNS} FROM instrumentos ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Instrument::from).collect())
    }

    /// search_instruments
    ///
    /// Case-insensitive substring match over the four searchable columns,
    /// name-ordered. A blank q skips the WHERE clause entirely: ILIKE against
    /// a NULL column is NULL, so filtering with '%%' would drop legacy rows
    /// whose searchable columns are all NULL. The pattern is bound, never
    /// interpolated, so user input cannot alter the query shape.
    async fn search_instruments(&self, q: &str) -> Result<Vec<Instrument>, RepoError> {
        if q.trim().is_empty() {
            let rows = sqlx::query_as::<_, InstrumentRow>(&format!(
                "SELECT {INSTRUMENT_COLUMNS} FROM instrumentos ORDER BY nombre ASC"
            ))
            .fetch_all(&self.pool)
            .await?;
            return Ok(rows.into_iter().map(Instrument::from).collect());
        }

        let pattern = format!("%{}%", q);
        let rows = sqlx::query_as::<_, InstrumentRow>(&format!(
            "SELECT {INSTRUMENT_COLUMNS} FROM instrumentos
             WHERE nombre ILIKE $1 OR categoria ILIKE $1 OR estado ILIKE $1 OR ubicacion ILIKE $1
             ORDER BY nombre ASC"
        ))
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Instrument::from).collect())
    }

    async fn create_instrument(&self, req: &CreateInstrumentRequest) -> Result<i32, RepoError> {
        sqlx::query_scalar::<_, i32>(
            "INSERT INTO instrumentos (nombre, categoria, estado, ubicacion, descripcion, marca, modelo)
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
        )
        .bind(&req.nombre)
        .bind(&req.categoria)
        .bind(&req.estado)
        .bind(&req.ubicacion)
        .bind(req.descripcion.as_deref().unwrap_or(""))
        .bind(req.marca.as_deref().unwrap_or(""))
        .bind(req.modelo.as_deref().unwrap_or(""))
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_insert)
    }

    async fn update_instrument_full(
        &self,
        id: i32,
        req: &UpdateInstrumentRequest,
    ) -> Result<u64, RepoError> {
        let result = sqlx::query(
            "UPDATE instrumentos
             SET nombre = $1, categoria = $2, estado = $3, ubicacion = $4,
                 descripcion = $5, marca = $6, modelo = $7
             WHERE id = $8",
        )
        .bind(&req.nombre)
        .bind(&req.categoria)
        .bind(&req.estado)
        .bind(&req.ubicacion)
        .bind(req.descripcion.as_deref().unwrap_or(""))
        .bind(req.marca.as_deref().unwrap_or(""))
        .bind(req.modelo.as_deref().unwrap_or(""))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// update_instrument_limited
    ///
    /// The non-admin variant: marca and modelo are privileged columns and are
    /// simply absent from the statement.
    async fn update_instrument_limited(
        &self,
        id: i32,
        req: &UpdateInstrumentRequest,
    ) -> Result<u64, RepoError> {
        let result = sqlx::query(
            "UPDATE instrumentos
             SET nombre = $1, categoria = $2, estado = $3, ubicacion = $4, descripcion = $5
             WHERE id = $6",
        )
        .bind(&req.nombre)
        .bind(&req.categoria)
        .bind(&req.estado)
        .bind(&req.ubicacion)
        .bind(req.descripcion.as_deref().unwrap_or(""))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_instrument(&self, id: i32) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM instrumentos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
