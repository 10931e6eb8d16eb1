use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::session::Role;

// --- Identity ---

/// User
///
/// A platform account as returned by the user endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub nombre: String,
    pub apellido: String,
    pub email: String,
    // Student file number; absent for staff accounts.
    pub legajo: Option<String>,
    pub rol: Role,
}

/// NewUser
///
/// Input payload for the admin user creation form.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NewUser {
    pub nombre: String,
    pub apellido: String,
    pub email: String,
    pub password: String,
    pub legajo: Option<String>,
    pub rol: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RoleChange {
    pub rol: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// LoginResponse
///
/// What the remote login endpoint hands back: only the credential. The role is read
/// out of it, never sent alongside.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

// --- Courses ---

/// Materia
///
/// A course offered by the institution.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct Materia {
    pub id: Uuid,
    pub nombre: String,
    pub descripcion: String,
    pub profesor_id: Option<Uuid>,
    pub anio: i32,
}

/// MateriaInput
///
/// Create/update payload for the admin course form.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MateriaInput {
    pub nombre: String,
    pub descripcion: String,
    pub profesor_id: Option<Uuid>,
    pub anio: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct Archivo {
    pub id: Uuid,
    pub nombre: String,
    pub url: String,
}

/// NewArchivo
///
/// A file the professor is uploading. Sent to the API as a multipart `archivo` part.
#[derive(Debug, Clone)]
pub struct NewArchivo {
    pub nombre: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct Video {
    pub id: Uuid,
    pub titulo: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NewVideo {
    pub titulo: String,
    pub url: String,
}

/// embed_url
///
/// Rewrites YouTube watch and short links into their embeddable form.
/// Any other URL is returned unchanged.
pub fn embed_url(url: &str) -> String {
    const WATCH_MARKERS: [&str; 2] = ["youtube.com/watch?", "youtube.com/watch/?"];

    if WATCH_MARKERS.iter().any(|m| url.contains(m)) {
        let query = url.split_once('?').map(|(_, q)| q).unwrap_or_default();
        let id = query
            .split('&')
            .find_map(|pair| pair.strip_prefix("v="))
            .filter(|id| !id.is_empty());
        if let Some(id) = id {
            return format!("https://www.youtube.com/embed/{}", id);
        }
    }

    if let Some((_, rest)) = url.split_once("youtu.be/") {
        let id = rest.split(['?', '&', '/', '#']).next().unwrap_or_default();
        if !id.is_empty() {
            return format!("https://www.youtube.com/embed/{}", id);
        }
    }

    url.to_string()
}

// --- Enrollment ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum EstadoInscripcion {
    Pendiente,
    Aprobada,
    Rechazada,
}

/// Inscripcion
///
/// An enrollment request for a course, as seen in the approval queue.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct Inscripcion {
    pub id: Uuid,
    pub materia_id: Uuid,
    pub materia: String,
    pub alumno: String,
    pub legajo: Option<String>,
    pub estado: EstadoInscripcion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InscripcionStatus {
    pub estado: EstadoInscripcion,
}

// --- Exams ---

/// QuestionKind
///
/// How a question is answered.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum QuestionKind {
    Texto,
    Opcion { opciones: Vec<String> },
    Audio,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct Pregunta {
    pub id: Uuid,
    pub texto: String,
    pub puntuacion: u32,
    pub tipo: QuestionKind,
}

/// Examen
///
/// A full exam with its questions, as loaded for taking or grading.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct Examen {
    pub id: Uuid,
    pub materia_id: Uuid,
    pub titulo: String,
    #[ts(type = "string")]
    pub fecha_limite: DateTime<Utc>,
    pub preguntas: Vec<Pregunta>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct ExamenResumen {
    pub id: Uuid,
    pub titulo: String,
    #[ts(type = "string")]
    pub fecha_limite: DateTime<Utc>,
}

/// NewPregunta
///
/// A question as typed in the authoring form.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct NewPregunta {
    pub texto: String,
    pub puntuacion: u32,
    pub tipo: QuestionKind,
}

/// NewExamen
///
/// The validated payload sent to the exam creation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct NewExamen {
    pub titulo: String,
    #[ts(type = "string")]
    pub fecha_limite: DateTime<Utc>,
    pub preguntas: Vec<NewPregunta>,
}

/// AnswerPayload
///
/// A written or chosen answer, carried in the JSON part of a submission.
/// Audio answers travel as separate binary parts.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct AnswerPayload {
    pub pregunta_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub texto: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opcion: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct EntregaRespuesta {
    pub pregunta_id: Uuid,
    pub texto: Option<String>,
    pub opcion: Option<usize>,
    pub audio_url: Option<String>,
}

/// Entrega
///
/// A submitted attempt waiting for (or holding) a grade.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct Entrega {
    pub id: Uuid,
    pub examen_id: Uuid,
    pub alumno: String,
    pub legajo: Option<String>,
    #[ts(type = "string")]
    pub entregada: DateTime<Utc>,
    pub respuestas: Vec<EntregaRespuesta>,
    pub nota: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct PuntajePregunta {
    pub pregunta_id: Uuid,
    pub puntaje: f64,
}

/// Correccion
///
/// The professor's grading of one attempt.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct Correccion {
    pub puntajes: Vec<PuntajePregunta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comentario: Option<String>,
}

// --- Transcript ---

/// LibretaRow
///
/// One line of a student's transcript.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct LibretaRow {
    pub id: Uuid,
    pub legajo: String,
    pub nombre: String,
    pub apellido: String,
    pub materia: String,
    pub nota: Option<f64>,
    #[ts(type = "string")]
    pub fecha: NaiveDate,
}

/// LibretaEntry
///
/// A grade the professor records in a student's transcript.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct LibretaEntry {
    pub legajo: String,
    pub materia_id: Uuid,
    pub nota: f64,
    #[ts(type = "string")]
    pub fecha: NaiveDate,
}

// --- View Schemas (Output) ---

/// ErrorView
///
/// Body of every failed screen: a generic, human-readable message. `estado` is
/// `error` for request failures and `invalido` for form validation failures.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct ErrorView {
    pub estado: String,
    pub mensaje: String,
}

/// LoginPageView
///
/// What the login screen needs to know before rendering.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginPageView {
    pub sesion_activa: bool,
}

/// LoginView
///
/// Result of a successful login: the claimed role (if the credential could be read)
/// and where to navigate next.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginView {
    pub rol: Option<Role>,
    pub destino: String,
}

/// MateriaCard
///
/// One row of the dashboard. `inscripcion` is only looked up for students.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct MateriaCard {
    pub materia: Materia,
    pub inscripcion: Option<EstadoInscripcion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DashboardView {
    pub rol: Role,
    pub materias: Vec<MateriaCard>,
}

/// VideoView
///
/// A video plus the URL to put in the player frame.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct VideoView {
    pub id: Uuid,
    pub titulo: String,
    pub url: String,
    pub embed_url: String,
}

impl From<Video> for VideoView {
    fn from(video: Video) -> Self {
        let embed = embed_url(&video.url);
        Self {
            id: video.id,
            titulo: video.titulo,
            url: video.url,
            embed_url: embed,
        }
    }
}

/// MateriaView
///
/// Everything the course detail screen shows.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MateriaView {
    pub materia: Materia,
    pub archivos: Vec<Archivo>,
    pub videos: Vec<VideoView>,
    pub examenes: Vec<ExamenResumen>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TranscriptView {
    pub filas: Vec<LibretaRow>,
    pub total: usize,
}

/// AnswerForm
///
/// A written (`texto`) or chosen (`opcion`) answer for one question.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AnswerForm {
    pub texto: Option<String>,
    pub opcion: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SubmitView {
    pub examen_id: Uuid,
    pub enviado: bool,
}
