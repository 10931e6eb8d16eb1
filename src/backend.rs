use async_trait::async_trait;
use reqwest::{
    Client, Method, RequestBuilder, Response, StatusCode,
    multipart::{Form, Part},
};
use serde::de::DeserializeOwned;
use std::{sync::Arc, time::Duration};
use uuid::Uuid;

use crate::{
    exam::{AttemptMode, ExamSubmission},
    models::{
        Archivo, Correccion, Entrega, EstadoInscripcion, Examen, ExamenResumen, Inscripcion,
        InscripcionStatus, LibretaEntry, LibretaRow, LoginRequest, LoginResponse, Materia,
        MateriaInput, NewArchivo, NewExamen, NewUser, NewVideo, RoleChange, User, Video,
    },
    session::{BearerToken, Role},
};

/// ApiError
///
/// Everything that can go wrong talking to the platform API. Screens only ever show a
/// generic message for these; `Unauthorized` additionally ends the session.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Network(String),
    #[error("the credential was rejected")]
    Unauthorized,
    #[error("resource not found")]
    NotFound,
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("response could not be decoded: {0}")]
    Decode(String),
    #[error("request could not be encoded: {0}")]
    Encode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

/// Backend Trait
///
/// The contract with the remote platform API. Every call except `login` is scoped to the
/// caller's credential. Page handlers only see this trait, so they can run against the
/// HTTP client in production and a mock in tests.
#[async_trait]
pub trait Backend: Send + Sync {
    // --- Identity ---
    async fn login(&self, req: &LoginRequest) -> Result<BearerToken, ApiError>;
    async fn current_user(&self, token: &BearerToken) -> Result<User, ApiError>;
    async fn list_users(&self, token: &BearerToken) -> Result<Vec<User>, ApiError>;
    async fn create_user(&self, token: &BearerToken, user: &NewUser) -> Result<User, ApiError>;
    async fn change_role(&self, token: &BearerToken, id: Uuid, rol: Role) -> Result<User, ApiError>;
    async fn delete_user(&self, token: &BearerToken, id: Uuid) -> Result<(), ApiError>;

    // --- Courses ---
    async fn list_materias(&self, token: &BearerToken) -> Result<Vec<Materia>, ApiError>;
    async fn get_materia(&self, token: &BearerToken, id: Uuid) -> Result<Materia, ApiError>;
    async fn create_materia(&self, token: &BearerToken, input: &MateriaInput) -> Result<Materia, ApiError>;
    async fn update_materia(
        &self,
        token: &BearerToken,
        id: Uuid,
        input: &MateriaInput,
    ) -> Result<Materia, ApiError>;
    async fn delete_materia(&self, token: &BearerToken, id: Uuid) -> Result<(), ApiError>;

    // --- Enrollment ---
    // None when the caller never asked to join the course.
    async fn enrollment_status(
        &self,
        token: &BearerToken,
        materia_id: Uuid,
    ) -> Result<Option<EstadoInscripcion>, ApiError>;
    async fn request_enrollment(&self, token: &BearerToken, materia_id: Uuid) -> Result<Inscripcion, ApiError>;
    async fn pending_enrollments(&self, token: &BearerToken) -> Result<Vec<Inscripcion>, ApiError>;
    async fn decide_enrollment(&self, token: &BearerToken, id: Uuid, approve: bool) -> Result<Inscripcion, ApiError>;

    // --- Course material ---
    async fn list_archivos(&self, token: &BearerToken, materia_id: Uuid) -> Result<Vec<Archivo>, ApiError>;
    async fn upload_archivo(
        &self,
        token: &BearerToken,
        materia_id: Uuid,
        archivo: NewArchivo,
    ) -> Result<Archivo, ApiError>;
    async fn delete_archivo(&self, token: &BearerToken, id: Uuid) -> Result<(), ApiError>;
    async fn list_videos(&self, token: &BearerToken, materia_id: Uuid) -> Result<Vec<Video>, ApiError>;
    async fn add_video(&self, token: &BearerToken, materia_id: Uuid, video: &NewVideo) -> Result<Video, ApiError>;
    async fn delete_video(&self, token: &BearerToken, id: Uuid) -> Result<(), ApiError>;

    // --- Exams ---
    async fn list_examenes(&self, token: &BearerToken, materia_id: Uuid) -> Result<Vec<ExamenResumen>, ApiError>;
    async fn get_examen(&self, token: &BearerToken, id: Uuid) -> Result<Examen, ApiError>;
    async fn create_examen(
        &self,
        token: &BearerToken,
        materia_id: Uuid,
        examen: &NewExamen,
    ) -> Result<Examen, ApiError>;
    async fn delete_examen(&self, token: &BearerToken, id: Uuid) -> Result<(), ApiError>;
    async fn submit_answers(&self, token: &BearerToken, submission: ExamSubmission) -> Result<(), ApiError>;
    async fn list_entregas(&self, token: &BearerToken, examen_id: Uuid) -> Result<Vec<Entrega>, ApiError>;
    async fn submit_correccion(
        &self,
        token: &BearerToken,
        entrega_id: Uuid,
        correccion: &Correccion,
    ) -> Result<Entrega, ApiError>;

    // --- Transcript ---
    async fn own_libreta(&self, token: &BearerToken) -> Result<Vec<LibretaRow>, ApiError>;
    async fn all_libretas(&self, token: &BearerToken) -> Result<Vec<LibretaRow>, ApiError>;
    async fn write_libreta(&self, token: &BearerToken, entry: &LibretaEntry) -> Result<LibretaRow, ApiError>;
}

/// BackendState
///
/// The concrete type used to share the API client across the application state.
pub type BackendState = Arc<dyn Backend>;

/// HttpBackend
///
/// `Backend` over JSON/HTTP with `reqwest`. The credential travels as an
/// `Authorization: Bearer` header.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request(&self, method: Method, path: &str, token: Option<&BearerToken>) -> RequestBuilder {
        tracing::debug!(%method, path, "backend call");
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match token {
            Some(token) => builder.bearer_auth(token.as_str()),
            None => builder,
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = check(builder.send().await?)?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<(), ApiError> {
        check(builder.send().await?)?;
        Ok(())
    }
}

fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    match status {
        StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
        StatusCode::NOT_FOUND => Err(ApiError::NotFound),
        s if !s.is_success() => {
            tracing::error!(status = s.as_u16(), url = %response.url(), "backend returned an error status");
            Err(ApiError::Status(s.as_u16()))
        }
        _ => Ok(response),
    }
}

fn audio_extension(mime_type: &str) -> &'static str {
    match mime_type.split(';').next().unwrap_or_default().trim() {
        "audio/ogg" => "ogg",
        "audio/mpeg" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/mp4" => "m4a",
        _ => "webm",
    }
}

fn submission_form(submission: ExamSubmission) -> Result<Form, ApiError> {
    let respuestas =
        serde_json::to_string(&submission.respuestas).map_err(|e| ApiError::Encode(e.to_string()))?;

    let mut form = Form::new().part(
        "respuestas",
        Part::text(respuestas)
            .mime_str("application/json")
            .map_err(|e| ApiError::Encode(e.to_string()))?,
    );

    for clip in submission.audios {
        let file_name = format!("{}.{}", clip.pregunta_id, audio_extension(&clip.mime_type));
        let part = Part::bytes(clip.bytes)
            .file_name(file_name)
            .mime_str(&clip.mime_type)
            .map_err(|e| ApiError::Encode(e.to_string()))?;
        form = form.part(format!("audio_{}", clip.pregunta_id), part);
    }

    Ok(form)
}

#[async_trait]
impl Backend for HttpBackend {
    async fn login(&self, req: &LoginRequest) -> Result<BearerToken, ApiError> {
        let response: LoginResponse = self
            .fetch(self.request(Method::POST, "/auth/login", None).json(req))
            .await?;
        Ok(BearerToken::new(response.token))
    }

    async fn current_user(&self, token: &BearerToken) -> Result<User, ApiError> {
        self.fetch(self.request(Method::GET, "/usuarios/me", Some(token)))
            .await
    }

    async fn list_users(&self, token: &BearerToken) -> Result<Vec<User>, ApiError> {
        self.fetch(self.request(Method::GET, "/usuarios", Some(token)))
            .await
    }

    async fn create_user(&self, token: &BearerToken, user: &NewUser) -> Result<User, ApiError> {
        self.fetch(self.request(Method::POST, "/usuarios", Some(token)).json(user))
            .await
    }

    async fn change_role(&self, token: &BearerToken, id: Uuid, rol: Role) -> Result<User, ApiError> {
        let path = format!("/usuarios/{}/rol", id);
        self.fetch(
            self.request(Method::PUT, &path, Some(token))
                .json(&RoleChange { rol }),
        )
        .await
    }

    async fn delete_user(&self, token: &BearerToken, id: Uuid) -> Result<(), ApiError> {
        let path = format!("/usuarios/{}", id);
        self.execute(self.request(Method::DELETE, &path, Some(token)))
            .await
    }

    async fn list_materias(&self, token: &BearerToken) -> Result<Vec<Materia>, ApiError> {
        self.fetch(self.request(Method::GET, "/materias", Some(token)))
            .await
    }

    async fn get_materia(&self, token: &BearerToken, id: Uuid) -> Result<Materia, ApiError> {
        let path = format!("/materias/{}", id);
        self.fetch(self.request(Method::GET, &path, Some(token))).await
    }

    async fn create_materia(&self, token: &BearerToken, input: &MateriaInput) -> Result<Materia, ApiError> {
        self.fetch(self.request(Method::POST, "/materias", Some(token)).json(input))
            .await
    }

    async fn update_materia(
        &self,
        token: &BearerToken,
        id: Uuid,
        input: &MateriaInput,
    ) -> Result<Materia, ApiError> {
        let path = format!("/materias/{}", id);
        self.fetch(self.request(Method::PUT, &path, Some(token)).json(input))
            .await
    }

    async fn delete_materia(&self, token: &BearerToken, id: Uuid) -> Result<(), ApiError> {
        let path = format!("/materias/{}", id);
        self.execute(self.request(Method::DELETE, &path, Some(token)))
            .await
    }

    async fn enrollment_status(
        &self,
        token: &BearerToken,
        materia_id: Uuid,
    ) -> Result<Option<EstadoInscripcion>, ApiError> {
        let path = format!("/materias/{}/inscripcion", materia_id);
        match self
            .fetch::<InscripcionStatus>(self.request(Method::GET, &path, Some(token)))
            .await
        {
            Ok(status) => Ok(Some(status.estado)),
            Err(ApiError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn request_enrollment(&self, token: &BearerToken, materia_id: Uuid) -> Result<Inscripcion, ApiError> {
        let path = format!("/materias/{}/inscripcion", materia_id);
        self.fetch(self.request(Method::POST, &path, Some(token)))
            .await
    }

    async fn pending_enrollments(&self, token: &BearerToken) -> Result<Vec<Inscripcion>, ApiError> {
        self.fetch(
            self.request(Method::GET, "/inscripciones", Some(token))
                .query(&[("estado", "pendiente")]),
        )
        .await
    }

    async fn decide_enrollment(&self, token: &BearerToken, id: Uuid, approve: bool) -> Result<Inscripcion, ApiError> {
        let action = if approve { "aprobar" } else { "rechazar" };
        let path = format!("/inscripciones/{}/{}", id, action);
        self.fetch(self.request(Method::POST, &path, Some(token)))
            .await
    }

    async fn list_archivos(&self, token: &BearerToken, materia_id: Uuid) -> Result<Vec<Archivo>, ApiError> {
        let path = format!("/materias/{}/archivos", materia_id);
        self.fetch(self.request(Method::GET, &path, Some(token))).await
    }

    async fn upload_archivo(
        &self,
        token: &BearerToken,
        materia_id: Uuid,
        archivo: NewArchivo,
    ) -> Result<Archivo, ApiError> {
        let part = Part::bytes(archivo.bytes)
            .file_name(archivo.nombre)
            .mime_str(&archivo.content_type)
            .map_err(|e| ApiError::Encode(e.to_string()))?;
        let form = Form::new().part("archivo", part);

        let path = format!("/materias/{}/archivos", materia_id);
        self.fetch(self.request(Method::POST, &path, Some(token)).multipart(form))
            .await
    }

    async fn delete_archivo(&self, token: &BearerToken, id: Uuid) -> Result<(), ApiError> {
        let path = format!("/archivos/{}", id);
        self.execute(self.request(Method::DELETE, &path, Some(token)))
            .await
    }

    async fn list_videos(&self, token: &BearerToken, materia_id: Uuid) -> Result<Vec<Video>, ApiError> {
        let path = format!("/materias/{}/videos", materia_id);
        self.fetch(self.request(Method::GET, &path, Some(token))).await
    }

    async fn add_video(&self, token: &BearerToken, materia_id: Uuid, video: &NewVideo) -> Result<Video, ApiError> {
        let path = format!("/materias/{}/videos", materia_id);
        self.fetch(self.request(Method::POST, &path, Some(token)).json(video))
            .await
    }

    async fn delete_video(&self, token: &BearerToken, id: Uuid) -> Result<(), ApiError> {
        let path = format!("/videos/{}", id);
        self.execute(self.request(Method::DELETE, &path, Some(token)))
            .await
    }

    async fn list_examenes(&self, token: &BearerToken, materia_id: Uuid) -> Result<Vec<ExamenResumen>, ApiError> {
        let path = format!("/materias/{}/examenes", materia_id);
        self.fetch(self.request(Method::GET, &path, Some(token))).await
    }

    async fn get_examen(&self, token: &BearerToken, id: Uuid) -> Result<Examen, ApiError> {
        let path = format!("/examenes/{}", id);
        self.fetch(self.request(Method::GET, &path, Some(token))).await
    }

    async fn create_examen(
        &self,
        token: &BearerToken,
        materia_id: Uuid,
        examen: &NewExamen,
    ) -> Result<Examen, ApiError> {
        let path = format!("/materias/{}/examenes", materia_id);
        self.fetch(self.request(Method::POST, &path, Some(token)).json(examen))
            .await
    }

    async fn delete_examen(&self, token: &BearerToken, id: Uuid) -> Result<(), ApiError> {
        let path = format!("/examenes/{}", id);
        self.execute(self.request(Method::DELETE, &path, Some(token)))
            .await
    }

    /// submit_answers
    ///
    /// One multipart request: a `respuestas` JSON part with the written and chosen
    /// answers, plus an `audio_<question id>` part per recording. First attempts and
    /// redos share the encoding and differ only in the endpoint.
    async fn submit_answers(&self, token: &BearerToken, submission: ExamSubmission) -> Result<(), ApiError> {
        let endpoint = match submission.mode {
            AttemptMode::First => "respuestas",
            AttemptMode::Redo => "rehacer",
        };
        let path = format!("/examenes/{}/{}", submission.examen_id, endpoint);
        let form = submission_form(submission)?;

        self.execute(self.request(Method::POST, &path, Some(token)).multipart(form))
            .await
    }

    async fn list_entregas(&self, token: &BearerToken, examen_id: Uuid) -> Result<Vec<Entrega>, ApiError> {
        let path = format!("/examenes/{}/entregas", examen_id);
        self.fetch(self.request(Method::GET, &path, Some(token))).await
    }

    async fn submit_correccion(
        &self,
        token: &BearerToken,
        entrega_id: Uuid,
        correccion: &Correccion,
    ) -> Result<Entrega, ApiError> {
        let path = format!("/entregas/{}/correccion", entrega_id);
        self.fetch(self.request(Method::POST, &path, Some(token)).json(correccion))
            .await
    }

    async fn own_libreta(&self, token: &BearerToken) -> Result<Vec<LibretaRow>, ApiError> {
        self.fetch(self.request(Method::GET, "/libreta", Some(token)))
            .await
    }

    async fn all_libretas(&self, token: &BearerToken) -> Result<Vec<LibretaRow>, ApiError> {
        self.fetch(self.request(Method::GET, "/libretas", Some(token)))
            .await
    }

    async fn write_libreta(&self, token: &BearerToken, entry: &LibretaEntry) -> Result<LibretaRow, ApiError> {
        self.fetch(self.request(Method::PUT, "/libreta", Some(token)).json(entry))
            .await
    }
}
