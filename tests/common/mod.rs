#![allow(dead_code)]

use async_trait::async_trait;
use aula_portal::{
    AppConfig, AppState,
    backend::{ApiError, Backend, BackendState},
    exam::{ExamRoom, ExamSubmission},
    models::{
        Archivo, Correccion, Entrega, EstadoInscripcion, Examen, ExamenResumen, Inscripcion,
        LibretaEntry, LibretaRow, LoginRequest, Materia, MateriaInput, NewArchivo, NewExamen,
        NewUser, NewVideo, Pregunta, QuestionKind, User, Video,
    },
    session::{BearerToken, Claims, MemorySessionStore, Role, SessionState},
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};
use uuid::Uuid;

// --- Credentials ---

/// Signs a credential the way the platform would. The front end never checks the
/// signature, so any secret works.
pub fn token_for(role: &str) -> BearerToken {
    let claims = Claims {
        sub: Some(Uuid::new_v4().to_string()),
        role: role.to_string(),
        exp: Some((Utc::now() + Duration::hours(1)).timestamp() as f64),
    };
    let raw = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"platform-secret"),
    )
    .expect("Failed to encode test token");
    BearerToken::new(raw)
}

// --- Fixtures ---

pub fn materia(nombre: &str) -> Materia {
    Materia {
        id: Uuid::new_v4(),
        nombre: nombre.to_string(),
        descripcion: format!("Curso de {}", nombre),
        profesor_id: None,
        anio: 2025,
    }
}

pub fn user(rol: Role) -> User {
    User {
        id: Uuid::new_v4(),
        nombre: "Ana".to_string(),
        apellido: "Pérez".to_string(),
        email: "ana@example.com".to_string(),
        legajo: Some("L-100".to_string()),
        rol,
    }
}

pub fn pregunta(texto: &str, puntuacion: u32, tipo: QuestionKind) -> Pregunta {
    Pregunta {
        id: Uuid::new_v4(),
        texto: texto.to_string(),
        puntuacion,
        tipo,
    }
}

/// An exam with one question of each kind, worth 4 + 3 + 3 points.
pub fn examen(fecha_limite: DateTime<Utc>) -> Examen {
    Examen {
        id: Uuid::new_v4(),
        materia_id: Uuid::new_v4(),
        titulo: "Parcial 1".to_string(),
        fecha_limite,
        preguntas: vec![
            pregunta("Explique el teorema", 4, QuestionKind::Texto),
            pregunta(
                "Elija la opción correcta",
                3,
                QuestionKind::Opcion {
                    opciones: vec!["A".to_string(), "B".to_string(), "C".to_string()],
                },
            ),
            pregunta("Lea el texto en voz alta", 3, QuestionKind::Audio),
        ],
    }
}

pub fn libreta_row(nombre: &str, apellido: &str, materia: &str, nota: Option<f64>, fecha: NaiveDate) -> LibretaRow {
    LibretaRow {
        id: Uuid::new_v4(),
        legajo: format!("L-{}", apellido.len()),
        nombre: nombre.to_string(),
        apellido: apellido.to_string(),
        materia: materia.to_string(),
        nota,
        fecha,
    }
}

// --- Mock Backend ---

/// MockBackend
///
/// Canned answers plus a log of every call. When `fail_with` is set every call fails
/// with that error.
#[derive(Default)]
pub struct MockBackend {
    pub login_result: Mutex<Option<Result<BearerToken, ApiError>>>,
    pub user: Mutex<Option<User>>,
    pub users: Mutex<Vec<User>>,
    pub materias: Mutex<Vec<Materia>>,
    pub estados: Mutex<HashMap<Uuid, EstadoInscripcion>>,
    pub archivos: Mutex<Vec<Archivo>>,
    pub videos: Mutex<Vec<Video>>,
    pub examen: Mutex<Option<Examen>>,
    pub libreta: Mutex<Vec<LibretaRow>>,
    pub fail_with: Mutex<Option<ApiError>>,

    pub calls: Mutex<Vec<String>>,
    pub submissions: Mutex<Vec<ExamSubmission>>,
    pub created_examenes: Mutex<Vec<NewExamen>>,
    pub correcciones: Mutex<Vec<(Uuid, Correccion)>>,
    pub uploads: Mutex<Vec<NewArchivo>>,
    pub libreta_entries: Mutex<Vec<LibretaEntry>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: &str) -> Result<(), ApiError> {
        self.calls.lock().push(call.to_string());
        match self.fail_with.lock().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn called(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == call).count()
    }

    fn current_examen(&self) -> Result<Examen, ApiError> {
        self.examen.lock().clone().ok_or(ApiError::NotFound)
    }

    fn inscripcion(&self, materia_id: Uuid, estado: EstadoInscripcion) -> Inscripcion {
        Inscripcion {
            id: Uuid::new_v4(),
            materia_id,
            materia: "Materia".to_string(),
            alumno: "Ana Pérez".to_string(),
            legajo: Some("L-100".to_string()),
            estado,
        }
    }

    fn entrega(&self, id: Uuid, nota: Option<f64>) -> Entrega {
        Entrega {
            id,
            examen_id: Uuid::new_v4(),
            alumno: "Ana Pérez".to_string(),
            legajo: Some("L-100".to_string()),
            entregada: Utc::now(),
            respuestas: vec![],
            nota,
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn login(&self, _req: &LoginRequest) -> Result<BearerToken, ApiError> {
        self.record("login")?;
        self.login_result
            .lock()
            .clone()
            .unwrap_or(Err(ApiError::Unauthorized))
    }

    async fn current_user(&self, _token: &BearerToken) -> Result<User, ApiError> {
        self.record("current_user")?;
        self.user.lock().clone().ok_or(ApiError::NotFound)
    }

    async fn list_users(&self, _token: &BearerToken) -> Result<Vec<User>, ApiError> {
        self.record("list_users")?;
        Ok(self.users.lock().clone())
    }

    async fn create_user(&self, _token: &BearerToken, new: &NewUser) -> Result<User, ApiError> {
        self.record("create_user")?;
        Ok(User {
            id: Uuid::new_v4(),
            nombre: new.nombre.clone(),
            apellido: new.apellido.clone(),
            email: new.email.clone(),
            legajo: new.legajo.clone(),
            rol: new.rol,
        })
    }

    async fn change_role(&self, _token: &BearerToken, id: Uuid, rol: Role) -> Result<User, ApiError> {
        self.record("change_role")?;
        let mut user = user(rol);
        user.id = id;
        Ok(user)
    }

    async fn delete_user(&self, _token: &BearerToken, _id: Uuid) -> Result<(), ApiError> {
        self.record("delete_user")
    }

    async fn list_materias(&self, _token: &BearerToken) -> Result<Vec<Materia>, ApiError> {
        self.record("list_materias")?;
        Ok(self.materias.lock().clone())
    }

    async fn get_materia(&self, _token: &BearerToken, id: Uuid) -> Result<Materia, ApiError> {
        self.record("get_materia")?;
        self.materias
            .lock()
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn create_materia(&self, _token: &BearerToken, input: &MateriaInput) -> Result<Materia, ApiError> {
        self.record("create_materia")?;
        Ok(Materia {
            id: Uuid::new_v4(),
            nombre: input.nombre.clone(),
            descripcion: input.descripcion.clone(),
            profesor_id: input.profesor_id,
            anio: input.anio,
        })
    }

    async fn update_materia(
        &self,
        _token: &BearerToken,
        id: Uuid,
        input: &MateriaInput,
    ) -> Result<Materia, ApiError> {
        self.record("update_materia")?;
        Ok(Materia {
            id,
            nombre: input.nombre.clone(),
            descripcion: input.descripcion.clone(),
            profesor_id: input.profesor_id,
            anio: input.anio,
        })
    }

    async fn delete_materia(&self, _token: &BearerToken, _id: Uuid) -> Result<(), ApiError> {
        self.record("delete_materia")
    }

    async fn enrollment_status(
        &self,
        _token: &BearerToken,
        materia_id: Uuid,
    ) -> Result<Option<EstadoInscripcion>, ApiError> {
        self.record("enrollment_status")?;
        Ok(self.estados.lock().get(&materia_id).copied())
    }

    async fn request_enrollment(&self, _token: &BearerToken, materia_id: Uuid) -> Result<Inscripcion, ApiError> {
        self.record("request_enrollment")?;
        Ok(self.inscripcion(materia_id, EstadoInscripcion::Pendiente))
    }

    async fn pending_enrollments(&self, _token: &BearerToken) -> Result<Vec<Inscripcion>, ApiError> {
        self.record("pending_enrollments")?;
        Ok(vec![self.inscripcion(Uuid::new_v4(), EstadoInscripcion::Pendiente)])
    }

    async fn decide_enrollment(&self, _token: &BearerToken, id: Uuid, approve: bool) -> Result<Inscripcion, ApiError> {
        self.record(if approve { "approve_enrollment" } else { "reject_enrollment" })?;
        let estado = if approve {
            EstadoInscripcion::Aprobada
        } else {
            EstadoInscripcion::Rechazada
        };
        let mut inscripcion = self.inscripcion(Uuid::new_v4(), estado);
        inscripcion.id = id;
        Ok(inscripcion)
    }

    async fn list_archivos(&self, _token: &BearerToken, _materia_id: Uuid) -> Result<Vec<Archivo>, ApiError> {
        self.record("list_archivos")?;
        Ok(self.archivos.lock().clone())
    }

    async fn upload_archivo(
        &self,
        _token: &BearerToken,
        _materia_id: Uuid,
        archivo: NewArchivo,
    ) -> Result<Archivo, ApiError> {
        self.record("upload_archivo")?;
        let stored = Archivo {
            id: Uuid::new_v4(),
            nombre: archivo.nombre.clone(),
            url: format!("https://files.example.com/{}", archivo.nombre),
        };
        self.uploads.lock().push(archivo);
        Ok(stored)
    }

    async fn delete_archivo(&self, _token: &BearerToken, _id: Uuid) -> Result<(), ApiError> {
        self.record("delete_archivo")
    }

    async fn list_videos(&self, _token: &BearerToken, _materia_id: Uuid) -> Result<Vec<Video>, ApiError> {
        self.record("list_videos")?;
        Ok(self.videos.lock().clone())
    }

    async fn add_video(&self, _token: &BearerToken, _materia_id: Uuid, video: &NewVideo) -> Result<Video, ApiError> {
        self.record("add_video")?;
        Ok(Video {
            id: Uuid::new_v4(),
            titulo: video.titulo.clone(),
            url: video.url.clone(),
        })
    }

    async fn delete_video(&self, _token: &BearerToken, _id: Uuid) -> Result<(), ApiError> {
        self.record("delete_video")
    }

    async fn list_examenes(&self, _token: &BearerToken, _materia_id: Uuid) -> Result<Vec<ExamenResumen>, ApiError> {
        self.record("list_examenes")?;
        Ok(self
            .examen
            .lock()
            .iter()
            .map(|e| ExamenResumen {
                id: e.id,
                titulo: e.titulo.clone(),
                fecha_limite: e.fecha_limite,
            })
            .collect())
    }

    async fn get_examen(&self, _token: &BearerToken, _id: Uuid) -> Result<Examen, ApiError> {
        self.record("get_examen")?;
        self.current_examen()
    }

    async fn create_examen(
        &self,
        _token: &BearerToken,
        materia_id: Uuid,
        examen: &NewExamen,
    ) -> Result<Examen, ApiError> {
        self.record("create_examen")?;
        self.created_examenes.lock().push(examen.clone());
        Ok(Examen {
            id: Uuid::new_v4(),
            materia_id,
            titulo: examen.titulo.clone(),
            fecha_limite: examen.fecha_limite,
            preguntas: examen
                .preguntas
                .iter()
                .map(|p| Pregunta {
                    id: Uuid::new_v4(),
                    texto: p.texto.clone(),
                    puntuacion: p.puntuacion,
                    tipo: p.tipo.clone(),
                })
                .collect(),
        })
    }

    async fn delete_examen(&self, _token: &BearerToken, _id: Uuid) -> Result<(), ApiError> {
        self.record("delete_examen")
    }

    async fn submit_answers(&self, _token: &BearerToken, submission: ExamSubmission) -> Result<(), ApiError> {
        self.record("submit_answers")?;
        self.submissions.lock().push(submission);
        Ok(())
    }

    async fn list_entregas(&self, _token: &BearerToken, _examen_id: Uuid) -> Result<Vec<Entrega>, ApiError> {
        self.record("list_entregas")?;
        Ok(vec![self.entrega(Uuid::new_v4(), None)])
    }

    async fn submit_correccion(
        &self,
        _token: &BearerToken,
        entrega_id: Uuid,
        correccion: &Correccion,
    ) -> Result<Entrega, ApiError> {
        self.record("submit_correccion")?;
        let nota = correccion.puntajes.iter().map(|p| p.puntaje).sum();
        self.correcciones.lock().push((entrega_id, correccion.clone()));
        Ok(self.entrega(entrega_id, Some(nota)))
    }

    async fn own_libreta(&self, _token: &BearerToken) -> Result<Vec<LibretaRow>, ApiError> {
        self.record("own_libreta")?;
        Ok(self.libreta.lock().clone())
    }

    async fn all_libretas(&self, _token: &BearerToken) -> Result<Vec<LibretaRow>, ApiError> {
        self.record("all_libretas")?;
        Ok(self.libreta.lock().clone())
    }

    async fn write_libreta(&self, _token: &BearerToken, entry: &LibretaEntry) -> Result<LibretaRow, ApiError> {
        self.record("write_libreta")?;
        self.libreta_entries.lock().push(entry.clone());
        Ok(LibretaRow {
            id: Uuid::new_v4(),
            legajo: entry.legajo.clone(),
            nombre: "Ana".to_string(),
            apellido: "Pérez".to_string(),
            materia: "Materia".to_string(),
            nota: Some(entry.nota),
            fecha: entry.fecha,
        })
    }
}

// --- App State ---

pub struct TestApp {
    pub state: AppState,
    pub backend: Arc<MockBackend>,
    pub session: Arc<MemorySessionStore>,
}

/// Builds app state around a mock backend and an in-memory session holding `token`.
pub fn test_app(backend: MockBackend, token: Option<BearerToken>) -> TestApp {
    let backend = Arc::new(backend);
    let session = Arc::new(match token {
        Some(token) => MemorySessionStore::with_token(token),
        None => MemorySessionStore::new(),
    });
    let config = AppConfig::default();

    let state = AppState {
        backend: backend.clone() as BackendState,
        session: session.clone() as SessionState,
        exam_room: Arc::new(ExamRoom::new(&config.audio_mime)),
        config,
    };

    TestApp {
        state,
        backend,
        session,
    }
}
