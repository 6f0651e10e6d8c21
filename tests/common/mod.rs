#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicI32, Ordering},
};

use async_trait::async_trait;
use inventario::{
    AppConfig, AppState, SessionStore, auth, create_router,
    models::{
        CreateInstrumentRequest, Instrument, Role, UpdateInstrumentRequest, UpdateUserRequest,
        UserRecord,
    },
    repository::{RepoError, Repository, RepositoryState},
};
use tokio::net::TcpListener;

// --- MOCK REPOSITORY IMPLEMENTATION ---

// The central control point for black-box testing. Handlers rely on the
// Repository trait, so the whole stack runs against this in-memory
// implementation and tests seed it directly.
#[derive(Default)]
pub struct MockRepository {
    pub access_codes: Mutex<HashMap<String, String>>,
    pub users: Mutex<Vec<UserRecord>>,
    pub instruments: Mutex<Vec<Instrument>>,
    next_user_id: AtomicI32,
    next_instrument_id: AtomicI32,
    // When set, create_instrument fails for this nombre. Lets tests exercise
    // the partial-failure path of the import.
    pub failing_nombre: Mutex<Option<String>>,
}

impl MockRepository {
    pub fn new() -> Self {
        Self {
            next_user_id: AtomicI32::new(1),
            next_instrument_id: AtomicI32::new(1),
            ..Self::default()
        }
    }

    pub fn seed_access_code(&self, codigo: &str, rol: &str) {
        self.access_codes
            .lock()
            .unwrap()
            .insert(codigo.to_string(), rol.to_string());
    }

    pub async fn seed_user(&self, nombre: &str, correo: &str, password: &str, role: Role) -> i32 {
        let hash = auth::hash_password(password.to_string()).await.unwrap();
        let id = self.next_user_id.fetch_add(1, Ordering::SeqCst);
        self.users.lock().unwrap().push(UserRecord {
            id,
            nombre: nombre.to_string(),
            correo: correo.to_string(),
            password_hash: hash,
            rol: role.as_str().to_string(),
        });
        id
    }

    pub fn seed_instrument(&self, instrument: Instrument) -> i32 {
        let id = self.next_instrument_id.fetch_add(1, Ordering::SeqCst);
        self.instruments.lock().unwrap().push(Instrument {
            id,
            ..instrument
        });
        id
    }
}

#[async_trait]
impl Repository for MockRepository {
    async fn find_access_code(&self, codigo: &str) -> Result<Option<String>, RepoError> {
        Ok(self.access_codes.lock().unwrap().get(codigo).cloned())
    }

    async fn create_user(
        &self,
        nombre: &str,
        correo: &str,
        password_hash: &str,
        rol: Role,
    ) -> Result<i32, RepoError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.correo == correo) {
            return Err(RepoError::Duplicate);
        }
        let id = self.next_user_id.fetch_add(1, Ordering::SeqCst);
        users.push(UserRecord {
            id,
            nombre: nombre.to_string(),
            correo: correo.to_string(),
            password_hash: password_hash.to_string(),
            rol: rol.as_str().to_string(),
        });
        Ok(id)
    }

    async fn find_user_by_email(&self, correo: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.correo == correo)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, RepoError> {
        let mut users = self.users.lock().unwrap().clone();
        users.sort_by_key(|u| std::cmp::Reverse(u.id));
        Ok(users)
    }

    async fn update_user(&self, id: i32, req: &UpdateUserRequest) -> Result<u64, RepoError> {
        let mut users = self.users.lock().unwrap();
        if users
            .iter()
            .any(|u| u.id != id && u.correo == req.correo)
        {
            return Err(RepoError::Duplicate);
        }
        match users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.nombre = req.nombre.clone();
                user.correo = req.correo.clone();
                user.rol = req.rol.as_str().to_string();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_user(&self, id: i32) -> Result<u64, RepoError> {
        let mut users = self.users.lock().unwrap();
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok((before - users.len()) as u64)
    }

    async fn list_instruments(&self) -> Result<Vec<Instrument>, RepoError> {
        let mut instruments = self.instruments.lock().unwrap().clone();
        instruments.sort_by_key(|i| i.id);
        Ok(instruments)
    }

    async fn search_instruments(&self, q: &str) -> Result<Vec<Instrument>, RepoError> {
        // Mirrors the SQL: a blank q takes the unfiltered branch, a non-blank
        // q is matched verbatim (edge spaces included).
        let mut instruments: Vec<Instrument> = if q.trim().is_empty() {
            self.instruments.lock().unwrap().clone()
        } else {
            let needle = q.to_lowercase();
            self.instruments
                .lock()
                .unwrap()
                .iter()
                .filter(|i| {
                    i.nombre.to_lowercase().contains(&needle)
                        || i.categoria.to_lowercase().contains(&needle)
                        || i.estado.to_lowercase().contains(&needle)
                        || i.ubicacion.to_lowercase().contains(&needle)
                })
                .cloned()
                .collect()
        };
        instruments.sort_by(|a, b| a.nombre.cmp(&b.nombre));
        Ok(instruments)
    }

    async fn create_instrument(&self, req: &CreateInstrumentRequest) -> Result<i32, RepoError> {
        if let Some(failing) = self.failing_nombre.lock().unwrap().as_deref() {
            if failing == req.nombre {
                return Err(RepoError::Database(sqlx::Error::RowNotFound));
            }
        }
        let id = self.next_instrument_id.fetch_add(1, Ordering::SeqCst);
        self.instruments.lock().unwrap().push(Instrument {
            id,
            nombre: req.nombre.clone(),
            categoria: req.categoria.clone(),
            estado: req.estado.clone(),
            ubicacion: req.ubicacion.clone(),
            descripcion: req.descripcion.clone().unwrap_or_default(),
            marca: req.marca.clone().unwrap_or_default(),
            modelo: req.modelo.clone().unwrap_or_default(),
        });
        Ok(id)
    }

    async fn update_instrument_full(
        &self,
        id: i32,
        req: &UpdateInstrumentRequest,
    ) -> Result<u64, RepoError> {
        let mut instruments = self.instruments.lock().unwrap();
        match instruments.iter_mut().find(|i| i.id == id) {
            Some(instrument) => {
                instrument.nombre = req.nombre.clone();
                instrument.categoria = req.categoria.clone();
                instrument.estado = req.estado.clone();
                instrument.ubicacion = req.ubicacion.clone();
                instrument.descripcion = req.descripcion.clone().unwrap_or_default();
                instrument.marca = req.marca.clone().unwrap_or_default();
                instrument.modelo = req.modelo.clone().unwrap_or_default();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn update_instrument_limited(
        &self,
        id: i32,
        req: &UpdateInstrumentRequest,
    ) -> Result<u64, RepoError> {
        let mut instruments = self.instruments.lock().unwrap();
        match instruments.iter_mut().find(|i| i.id == id) {
            Some(instrument) => {
                instrument.nombre = req.nombre.clone();
                instrument.categoria = req.categoria.clone();
                instrument.estado = req.estado.clone();
                instrument.ubicacion = req.ubicacion.clone();
                instrument.descripcion = req.descripcion.clone().unwrap_or_default();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_instrument(&self, id: i32) -> Result<u64, RepoError> {
        let mut instruments = self.instruments.lock().unwrap();
        let before = instruments.len();
        instruments.retain(|i| i.id != id);
        Ok((before - instruments.len()) as u64)
    }
}

// --- TEST UTILITIES ---

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub repo: Arc<MockRepository>,
}

pub async fn spawn_app() -> TestApp {
    let repo = Arc::new(MockRepository::new());

    let state = AppState {
        repo: repo.clone() as RepositoryState,
        sessions: SessionStore::new(),
        config: AppConfig::default(),
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    // Redirects are asserted, not followed; the jar keeps the session cookie.
    let client = reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        address,
        client,
        repo,
    }
}

impl TestApp {
    /// Seeds an account and opens a session for it through the real login
    /// flow, so the client's cookie jar holds a valid session cookie.
    pub async fn login_as(&self, correo: &str, role: Role) -> i32 {
        let id = self.repo.seed_user("Usuario Prueba", correo, "clave123", role).await;
        let response = self
            .client
            .post(format!("{}/login", self.address))
            .form(&[("correo", correo), ("password", "clave123")])
            .send()
            .await
            .expect("login request failed");
        assert!(
            response.status().is_redirection(),
            "login did not redirect: {}",
            response.status()
        );
        id
    }

    pub fn sample_instrument(nombre: &str) -> Instrument {
        Instrument {
            id: 0,
            nombre: nombre.to_string(),
            categoria: "Medición".to_string(),
            estado: "DISPONIBLE".to_string(),
            ubicacion: "Lab 1".to_string(),
            descripcion: "".to_string(),
            marca: "Generica".to_string(),
            modelo: "M-1".to_string(),
        }
    }
}
