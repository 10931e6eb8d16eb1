use crate::{
    AppState,
    backend::ApiError,
    exam::{
        AttemptError, AttemptMode, AttemptView, CorrectionError, DraftError, ExamAttempt,
        ExamDraft, ExamDraftForm, validate_correccion,
    },
    fanout::{Cancellation, Cancelled, fetch_bounded},
    guard::{Capability, DEFAULT_LANDING_PATH, GuardOutcome, LOGIN_PATH, PageContext, decide},
    models::{
        AnswerForm, Archivo, Correccion, DashboardView, Entrega, ErrorView, Examen,
        ExamenResumen, Inscripcion, LibretaEntry, LibretaRow, LoginPageView, LoginRequest,
        LoginView, Materia, MateriaCard, MateriaInput, MateriaView, NewArchivo, NewUser,
        NewVideo, RoleChange, SubmitView, TranscriptView, User, VideoView,
    },
    recorder::{RecorderError, RecorderStatus},
    session::{Role, SessionError},
    transcript::{self, TranscriptError, TranscriptQuery},
};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

const REQUEST_FAILED: &str = "Request failed";

// --- Error Handling ---

/// PageError
///
/// Every way a screen can fail to render. It is the one place where backend, session
/// and form errors are turned into what the user sees: a redirect to login, an inline
/// validation message, or a generic failure message.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("the session is no longer valid")]
    SessionExpired,
    #[error(transparent)]
    Api(ApiError),
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
    #[error(transparent)]
    Session(#[from] SessionError),
}

macro_rules! invalid_from {
    ($($error:ty),* $(,)?) => {
        $(
            impl From<$error> for PageError {
                fn from(e: $error) -> Self {
                    PageError::Invalid(e.to_string())
                }
            }
        )*
    };
}

invalid_from!(DraftError, AttemptError, CorrectionError, RecorderError, TranscriptError);

fn error_view(status: StatusCode, estado: &str, mensaje: &str) -> Response {
    (
        status,
        Json(ErrorView {
            estado: estado.to_string(),
            mensaje: mensaje.to_string(),
        }),
    )
        .into_response()
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self {
            PageError::SessionExpired => Redirect::to(LOGIN_PATH).into_response(),
            PageError::Invalid(mensaje) => {
                error_view(StatusCode::UNPROCESSABLE_ENTITY, "invalido", &mensaje)
            }
            PageError::Api(ApiError::NotFound) => {
                error_view(StatusCode::NOT_FOUND, "error", "Not found")
            }
            PageError::Api(_) => error_view(StatusCode::BAD_GATEWAY, "error", REQUEST_FAILED),
            PageError::Cancelled(_) => {
                error_view(StatusCode::SERVICE_UNAVAILABLE, "error", REQUEST_FAILED)
            }
            PageError::Session(e) => {
                tracing::error!("session storage failed: {}", e);
                error_view(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "error",
                    "Could not update the session",
                )
            }
        }
    }
}

/// settle
///
/// Converts a backend result into a page result. A rejected credential ends the
/// session on the spot; anything else is logged and shown as a generic failure.
fn settle<T>(state: &AppState, result: Result<T, ApiError>) -> Result<T, PageError> {
    match result {
        Ok(value) => Ok(value),
        Err(ApiError::Unauthorized) => {
            tracing::info!("backend rejected the credential, ending the session");
            if let Err(e) = state.session.clear() {
                tracing::error!("could not clear the session: {}", e);
            }
            state.exam_room.reset();
            Err(PageError::SessionExpired)
        }
        Err(e) => {
            tracing::error!("backend call failed: {}", e);
            Err(PageError::Api(e))
        }
    }
}

fn require(condition: bool, message: &str) -> Result<(), PageError> {
    if condition {
        Ok(())
    } else {
        Err(PageError::Invalid(message.to_string()))
    }
}

// --- Query Structs ---

/// OpenExamQuery
///
/// `modo=rehacer` opens a redo; anything else, or nothing, opens a first attempt.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct OpenExamQuery {
    pub modo: Option<AttemptMode>,
}

/// UploadQuery
///
/// The file name for a raw-body upload.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct UploadQuery {
    pub nombre: String,
}

// --- Public Handlers ---

/// login_page
///
/// [Public Route] Tells the login screen whether a usable session already exists.
#[utoipa::path(
    get,
    path = "/login",
    responses((status = 200, description = "Login screen state", body = LoginPageView))
)]
pub async fn login_page(State(state): State<AppState>) -> Json<LoginPageView> {
    let outcome = decide(Capability::Authenticated, state.session.get().as_ref());
    Json(LoginPageView {
        sesion_activa: matches!(outcome, GuardOutcome::Render(_)),
    })
}

/// login
///
/// [Public Route] Exchanges email and password for a credential and stores it.
/// The returned role is read from the credential itself.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginView),
        (status = 422, description = "Missing or wrong credentials", body = ErrorView)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginView>, PageError> {
    require(
        !payload.email.trim().is_empty() && !payload.password.is_empty(),
        "Email and password are required",
    )?;

    let token = match state.backend.login(&payload).await {
        Ok(token) => token,
        Err(ApiError::Unauthorized) => {
            return Err(PageError::Invalid("Invalid email or password".to_string()));
        }
        Err(e) => return settle(&state, Err(e)),
    };

    let rol = token.claimed_role().ok().map(|role| role.unverified());
    state.session.set(token)?;
    state.exam_room.reset();

    let destino = if rol.is_some() {
        DEFAULT_LANDING_PATH
    } else {
        LOGIN_PATH
    };
    tracing::info!(rol = ?rol, "logged in");

    Ok(Json(LoginView {
        rol,
        destino: destino.to_string(),
    }))
}

/// logout
///
/// [Public Route] Ends the session and closes any open exam.
#[utoipa::path(
    post,
    path = "/logout",
    responses((status = 204, description = "Logged out"))
)]
pub async fn logout(State(state): State<AppState>) -> Result<StatusCode, PageError> {
    state.session.clear()?;
    state.exam_room.reset();
    Ok(StatusCode::NO_CONTENT)
}

// --- Authenticated Handlers ---

/// get_me
///
/// [Authenticated Route] The logged-in user's profile.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = User))
)]
pub async fn get_me(ctx: PageContext, State(state): State<AppState>) -> Result<Json<User>, PageError> {
    let user = settle(&state, state.backend.current_user(&ctx.token).await)?;
    Ok(Json(user))
}

/// dashboard
///
/// [Authenticated Route] Course list. Students also get their enrollment status per
/// course, looked up with a bounded number of concurrent calls that are abandoned if
/// the request goes away.
#[utoipa::path(
    get,
    path = "/dashboard",
    responses((status = 200, description = "Dashboard", body = DashboardView))
)]
pub async fn dashboard(
    ctx: PageContext,
    State(state): State<AppState>,
) -> Result<Json<DashboardView>, PageError> {
    let materias = settle(&state, state.backend.list_materias(&ctx.token).await)?;
    let rol = ctx.role.unverified();

    let estados = if rol == Role::Student {
        let ids: Vec<Uuid> = materias.iter().map(|m| m.id).collect();
        let (cancel, _scope) = Cancellation::scoped();
        let lookups = fetch_bounded(
            ids,
            state.config.fanout_limit,
            &cancel,
            |id| state.backend.enrollment_status(&ctx.token, id),
        )
        .await?;

        lookups
            .into_iter()
            .map(|result| settle(&state, result))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        vec![None; materias.len()]
    };

    let materias = materias
        .into_iter()
        .zip(estados)
        .map(|(materia, inscripcion)| MateriaCard {
            materia,
            inscripcion,
        })
        .collect();

    Ok(Json(DashboardView { rol, materias }))
}

/// materia_detail
///
/// [Authenticated Route] A course with its files, videos and exams. Videos carry a
/// ready-to-embed URL.
#[utoipa::path(
    get,
    path = "/materias/{id}",
    params(("id" = Uuid, Path, description = "Materia ID")),
    responses(
        (status = 200, description = "Course detail", body = MateriaView),
        (status = 404, description = "Not Found", body = ErrorView)
    )
)]
pub async fn materia_detail(
    ctx: PageContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MateriaView>, PageError> {
    let backend = &state.backend;
    let (materia, archivos, videos, examenes) = settle(
        &state,
        tokio::try_join!(
            backend.get_materia(&ctx.token, id),
            backend.list_archivos(&ctx.token, id),
            backend.list_videos(&ctx.token, id),
            backend.list_examenes(&ctx.token, id),
        ),
    )?;

    Ok(Json(MateriaView {
        materia,
        archivos,
        videos: videos.into_iter().map(VideoView::from).collect(),
        examenes,
    }))
}

/// request_enrollment
///
/// [Authenticated Route] Asks to join a course. Approval happens on the admin side.
#[utoipa::path(
    post,
    path = "/materias/{id}/inscripcion",
    params(("id" = Uuid, Path, description = "Materia ID")),
    responses((status = 200, description = "Requested", body = Inscripcion))
)]
pub async fn request_enrollment(
    ctx: PageContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Inscripcion>, PageError> {
    let inscripcion = settle(&state, state.backend.request_enrollment(&ctx.token, id).await)?;
    Ok(Json(inscripcion))
}

fn with_attempt<T>(
    state: &AppState,
    examen_id: Uuid,
    f: impl FnOnce(&mut ExamAttempt) -> Result<T, PageError>,
) -> Result<T, PageError> {
    let mut slot = state.exam_room.attempt.lock();
    match slot.as_mut() {
        Some(attempt) if attempt.examen_id() == examen_id => f(attempt),
        _ => Err(AttemptError::NotOpen.into()),
    }
}

/// open_exam
///
/// [Authenticated Route] Loads an exam and opens an attempt for it. Reopening the same
/// exam in the same mode keeps the answers given so far; anything else starts over.
#[utoipa::path(
    get,
    path = "/examenes/{id}",
    params(("id" = Uuid, Path, description = "Examen ID"), OpenExamQuery),
    responses((status = 200, description = "Exam taking screen", body = AttemptView))
)]
pub async fn open_exam(
    ctx: PageContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<OpenExamQuery>,
) -> Result<Json<AttemptView>, PageError> {
    let mode = query.modo.unwrap_or_default();
    let examen = settle(&state, state.backend.get_examen(&ctx.token, id).await)?;
    let now = Utc::now();

    let mut slot = state.exam_room.attempt.lock();
    let view = match slot.as_ref() {
        Some(attempt) if attempt.examen_id() == id && attempt.mode() == mode => attempt.view(now),
        _ => {
            state.exam_room.recorder.lock().discard();
            let attempt = ExamAttempt::new(examen, mode);
            let view = attempt.view(now);
            *slot = Some(attempt);
            view
        }
    };

    Ok(Json(view))
}

/// answer_question
///
/// [Authenticated Route] Sets the written or chosen answer for one question.
#[utoipa::path(
    put,
    path = "/examenes/{id}/respuestas/{pregunta}",
    params(
        ("id" = Uuid, Path, description = "Examen ID"),
        ("pregunta" = Uuid, Path, description = "Pregunta ID")
    ),
    request_body = AnswerForm,
    responses(
        (status = 200, description = "Answer recorded", body = AttemptView),
        (status = 422, description = "Answer rejected", body = ErrorView)
    )
)]
pub async fn answer_question(
    _ctx: PageContext,
    State(state): State<AppState>,
    Path((examen_id, pregunta_id)): Path<(Uuid, Uuid)>,
    Json(form): Json<AnswerForm>,
) -> Result<Json<AttemptView>, PageError> {
    let now = Utc::now();
    let view = with_attempt(&state, examen_id, |attempt| {
        match (form.texto.as_deref(), form.opcion) {
            (_, Some(option)) => attempt.answer_choice(pregunta_id, option)?,
            (Some(texto), None) => attempt.answer_text(pregunta_id, texto)?,
            (None, None) => {
                return Err(PageError::Invalid(
                    "An answer needs text or an option".to_string(),
                ));
            }
        }
        Ok(attempt.view(now))
    })?;
    Ok(Json(view))
}

/// start_recording
///
/// [Authenticated Route] Takes the microphone for an audio question. While another
/// recording runs this changes nothing and just reports the current state.
#[utoipa::path(
    post,
    path = "/examenes/{id}/grabacion/{pregunta}/iniciar",
    params(
        ("id" = Uuid, Path, description = "Examen ID"),
        ("pregunta" = Uuid, Path, description = "Pregunta ID")
    ),
    responses((status = 200, description = "Recorder state", body = RecorderStatus))
)]
pub async fn start_recording(
    _ctx: PageContext,
    State(state): State<AppState>,
    Path((examen_id, pregunta_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<RecorderStatus>, PageError> {
    with_attempt(&state, examen_id, |attempt| Ok(attempt.accepts_audio(pregunta_id)?))?;

    let mut recorder = state.exam_room.recorder.lock();
    if !recorder.start(pregunta_id)? {
        tracing::debug!(%pregunta_id, "recording already in progress, start ignored");
    }
    Ok(Json(recorder.status()))
}

/// push_recording_chunk
///
/// [Authenticated Route] Appends relayed audio bytes to the running recording.
#[utoipa::path(
    post,
    path = "/examenes/{id}/grabacion/{pregunta}/fragmento",
    params(
        ("id" = Uuid, Path, description = "Examen ID"),
        ("pregunta" = Uuid, Path, description = "Pregunta ID")
    ),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses((status = 200, description = "Recorder state", body = RecorderStatus))
)]
pub async fn push_recording_chunk(
    _ctx: PageContext,
    State(state): State<AppState>,
    Path((examen_id, pregunta_id)): Path<(Uuid, Uuid)>,
    body: Bytes,
) -> Result<Json<RecorderStatus>, PageError> {
    let status = with_attempt(&state, examen_id, |_| {
        let mut recorder = state.exam_room.recorder.lock();
        recorder.push(pregunta_id, &body)?;
        Ok(recorder.status())
    })?;
    Ok(Json(status))
}

/// stop_recording
///
/// [Authenticated Route] Ends the recording, frees the microphone and keeps the clip as
/// the answer to the question. Nothing is uploaded until the exam is submitted.
#[utoipa::path(
    post,
    path = "/examenes/{id}/grabacion/{pregunta}/detener",
    params(
        ("id" = Uuid, Path, description = "Examen ID"),
        ("pregunta" = Uuid, Path, description = "Pregunta ID")
    ),
    responses((status = 200, description = "Clip kept", body = AttemptView))
)]
pub async fn stop_recording(
    _ctx: PageContext,
    State(state): State<AppState>,
    Path((examen_id, pregunta_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<AttemptView>, PageError> {
    let now = Utc::now();
    // The clip only leaves the recorder once the attempt is known to take it.
    let view = with_attempt(&state, examen_id, |attempt| {
        attempt.accepts_audio(pregunta_id)?;

        let clip = {
            let mut recorder = state.exam_room.recorder.lock();
            match recorder.status().pregunta_id {
                Some(active) if active == pregunta_id => recorder.stop(),
                Some(active) => return Err(RecorderError::OtherQuestion(active).into()),
                None => None,
            }
        }
        .ok_or(RecorderError::NotRecording)?;

        attempt.attach_audio(clip)?;
        Ok(attempt.view(now))
    })?;
    Ok(Json(view))
}

/// submit_exam
///
/// [Authenticated Route] Hands the whole exam in: written answers and every recorded
/// clip in one multipart request. Refused while any question is unanswered or once the
/// deadline has passed.
#[utoipa::path(
    post,
    path = "/examenes/{id}/enviar",
    params(("id" = Uuid, Path, description = "Examen ID")),
    responses(
        (status = 200, description = "Submitted", body = SubmitView),
        (status = 422, description = "Not ready to submit", body = ErrorView)
    )
)]
pub async fn submit_exam(
    ctx: PageContext,
    State(state): State<AppState>,
    Path(examen_id): Path<Uuid>,
) -> Result<Json<SubmitView>, PageError> {
    let now = Utc::now();
    let submission = with_attempt(&state, examen_id, |attempt| Ok(attempt.submission(now)?))?;

    settle(&state, state.backend.submit_answers(&ctx.token, submission).await)?;

    let mut slot = state.exam_room.attempt.lock();
    if slot.as_ref().map(ExamAttempt::examen_id) == Some(examen_id) {
        *slot = None;
    }
    tracing::info!(%examen_id, "exam submitted");

    Ok(Json(SubmitView {
        examen_id,
        enviado: true,
    }))
}

/// libreta
///
/// [Authenticated Route] The user's own transcript, searched and sorted locally.
#[utoipa::path(
    get,
    path = "/libreta",
    params(TranscriptQuery),
    responses(
        (status = 200, description = "Transcript", body = TranscriptView),
        (status = 422, description = "Unknown sort option", body = ErrorView)
    )
)]
pub async fn libreta(
    ctx: PageContext,
    State(state): State<AppState>,
    Query(query): Query<TranscriptQuery>,
) -> Result<Json<TranscriptView>, PageError> {
    let rows = settle(&state, state.backend.own_libreta(&ctx.token).await)?;
    let filas = transcript::apply(rows, &query)?;
    Ok(Json(TranscriptView {
        total: filas.len(),
        filas,
    }))
}

/// print_libreta
///
/// [Authenticated Route] The same rows as `libreta`, laid out as a printable page.
#[utoipa::path(
    get,
    path = "/libreta/imprimir",
    params(TranscriptQuery),
    responses((status = 200, description = "Printable transcript", content_type = "text/html", body = String))
)]
pub async fn print_libreta(
    ctx: PageContext,
    State(state): State<AppState>,
    Query(query): Query<TranscriptQuery>,
) -> Result<Html<String>, PageError> {
    let (user, rows) = settle(
        &state,
        tokio::try_join!(
            state.backend.current_user(&ctx.token),
            state.backend.own_libreta(&ctx.token),
        ),
    )?;
    let filas = transcript::apply(rows, &query)?;
    let titulo = format!("Libreta de {}, {}", user.apellido, user.nombre);

    Ok(Html(transcript::render_printable(
        &titulo,
        &filas,
        Utc::now().date_naive(),
    )))
}

// --- Professor Handlers ---

/// list_exams
///
/// [Professor Route] Exams of a course.
#[utoipa::path(
    get,
    path = "/profesor/materias/{id}/examenes",
    params(("id" = Uuid, Path, description = "Materia ID")),
    responses((status = 200, description = "Exams", body = [ExamenResumen]))
)]
pub async fn list_exams(
    ctx: PageContext,
    State(state): State<AppState>,
    Path(materia_id): Path<Uuid>,
) -> Result<Json<Vec<ExamenResumen>>, PageError> {
    let examenes = settle(&state, state.backend.list_examenes(&ctx.token, materia_id).await)?;
    Ok(Json(examenes))
}

/// create_exam
///
/// [Professor Route] Builds a draft from the authoring form and sends it only if every
/// question is filled in and the scores add up to exactly 10.
#[utoipa::path(
    post,
    path = "/profesor/materias/{id}/examenes",
    params(("id" = Uuid, Path, description = "Materia ID")),
    request_body = ExamDraftForm,
    responses(
        (status = 201, description = "Created", body = Examen),
        (status = 422, description = "Draft rejected", body = ErrorView)
    )
)]
pub async fn create_exam(
    ctx: PageContext,
    State(state): State<AppState>,
    Path(materia_id): Path<Uuid>,
    Json(form): Json<ExamDraftForm>,
) -> Result<(StatusCode, Json<Examen>), PageError> {
    let draft = ExamDraft::from_form(form)?;
    let nuevo = draft.into_new_examen()?;

    let examen = settle(
        &state,
        state.backend.create_examen(&ctx.token, materia_id, &nuevo).await,
    )?;
    Ok((StatusCode::CREATED, Json(examen)))
}

/// delete_exam
///
/// [Professor Route] Removes an exam.
#[utoipa::path(
    delete,
    path = "/profesor/examenes/{id}",
    params(("id" = Uuid, Path, description = "Examen ID")),
    responses((status = 204, description = "Deleted"))
)]
pub async fn delete_exam(
    ctx: PageContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, PageError> {
    settle(&state, state.backend.delete_examen(&ctx.token, id).await)?;
    Ok(StatusCode::NO_CONTENT)
}

/// list_submissions
///
/// [Professor Route] Attempts handed in for an exam.
#[utoipa::path(
    get,
    path = "/profesor/examenes/{id}/entregas",
    params(("id" = Uuid, Path, description = "Examen ID")),
    responses((status = 200, description = "Submissions", body = [Entrega]))
)]
pub async fn list_submissions(
    ctx: PageContext,
    State(state): State<AppState>,
    Path(examen_id): Path<Uuid>,
) -> Result<Json<Vec<Entrega>>, PageError> {
    let entregas = settle(&state, state.backend.list_entregas(&ctx.token, examen_id).await)?;
    Ok(Json(entregas))
}

/// grade_submission
///
/// [Professor Route] Grades one attempt. Points are checked against the exam's
/// questions before the grade is sent.
#[utoipa::path(
    post,
    path = "/profesor/examenes/{id}/entregas/{entrega}/correccion",
    params(
        ("id" = Uuid, Path, description = "Examen ID"),
        ("entrega" = Uuid, Path, description = "Entrega ID")
    ),
    request_body = Correccion,
    responses(
        (status = 200, description = "Graded", body = Entrega),
        (status = 422, description = "Grading rejected", body = ErrorView)
    )
)]
pub async fn grade_submission(
    ctx: PageContext,
    State(state): State<AppState>,
    Path((examen_id, entrega_id)): Path<(Uuid, Uuid)>,
    Json(correccion): Json<Correccion>,
) -> Result<Json<Entrega>, PageError> {
    let examen = settle(&state, state.backend.get_examen(&ctx.token, examen_id).await)?;
    let nota = validate_correccion(&examen, &correccion)?;
    tracing::debug!(%entrega_id, nota, "grading submission");

    let entrega = settle(
        &state,
        state
            .backend
            .submit_correccion(&ctx.token, entrega_id, &correccion)
            .await,
    )?;
    Ok(Json(entrega))
}

/// upload_file
///
/// [Professor Route] Uploads course material. The request body is the raw file; its
/// name comes from the query string and its type from `Content-Type`.
#[utoipa::path(
    post,
    path = "/profesor/materias/{id}/archivos",
    params(("id" = Uuid, Path, description = "Materia ID"), UploadQuery),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 201, description = "Uploaded", body = Archivo),
        (status = 422, description = "Missing name, empty file or bad Content-Type", body = ErrorView)
    )
)]
pub async fn upload_file(
    ctx: PageContext,
    State(state): State<AppState>,
    Path(materia_id): Path<Uuid>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Archivo>), PageError> {
    let nombre = query.nombre.trim();
    require(!nombre.is_empty(), "The file needs a name")?;
    require(!body.is_empty(), "The file is empty")?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    require(
        reqwest::multipart::Part::bytes(Vec::new())
            .mime_str(&content_type)
            .is_ok(),
        "The file type is not a valid MIME type",
    )?;

    let archivo = NewArchivo {
        nombre: nombre.to_string(),
        content_type,
        bytes: body.to_vec(),
    };

    let archivo = settle(
        &state,
        state
            .backend
            .upload_archivo(&ctx.token, materia_id, archivo)
            .await,
    )?;
    Ok((StatusCode::CREATED, Json(archivo)))
}

/// delete_file
///
/// [Professor Route] Removes course material.
#[utoipa::path(
    delete,
    path = "/profesor/archivos/{id}",
    params(("id" = Uuid, Path, description = "Archivo ID")),
    responses((status = 204, description = "Deleted"))
)]
pub async fn delete_file(
    ctx: PageContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, PageError> {
    settle(&state, state.backend.delete_archivo(&ctx.token, id).await)?;
    Ok(StatusCode::NO_CONTENT)
}

/// add_video
///
/// [Professor Route] Links a hosted video to a course.
#[utoipa::path(
    post,
    path = "/profesor/materias/{id}/videos",
    params(("id" = Uuid, Path, description = "Materia ID")),
    request_body = NewVideo,
    responses(
        (status = 201, description = "Added", body = VideoView),
        (status = 422, description = "Missing title or bad URL", body = ErrorView)
    )
)]
pub async fn add_video(
    ctx: PageContext,
    State(state): State<AppState>,
    Path(materia_id): Path<Uuid>,
    Json(video): Json<NewVideo>,
) -> Result<(StatusCode, Json<VideoView>), PageError> {
    require(!video.titulo.trim().is_empty(), "The video needs a title")?;
    require(
        video.url.starts_with("https://") || video.url.starts_with("http://"),
        "The video URL must start with http:// or https://",
    )?;

    let video = settle(&state, state.backend.add_video(&ctx.token, materia_id, &video).await)?;
    Ok((StatusCode::CREATED, Json(VideoView::from(video))))
}

/// delete_video
///
/// [Professor Route] Unlinks a video.
#[utoipa::path(
    delete,
    path = "/profesor/videos/{id}",
    params(("id" = Uuid, Path, description = "Video ID")),
    responses((status = 204, description = "Deleted"))
)]
pub async fn delete_video(
    ctx: PageContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, PageError> {
    settle(&state, state.backend.delete_video(&ctx.token, id).await)?;
    Ok(StatusCode::NO_CONTENT)
}

/// write_libreta
///
/// [Professor Route] Records a grade in a student's transcript.
#[utoipa::path(
    put,
    path = "/profesor/libreta",
    request_body = LibretaEntry,
    responses(
        (status = 200, description = "Recorded", body = LibretaRow),
        (status = 422, description = "Grade rejected", body = ErrorView)
    )
)]
pub async fn write_libreta(
    ctx: PageContext,
    State(state): State<AppState>,
    Json(entry): Json<LibretaEntry>,
) -> Result<Json<LibretaRow>, PageError> {
    require(!entry.legajo.trim().is_empty(), "A legajo is required")?;
    require(
        entry.nota.is_finite() && (0.0..=10.0).contains(&entry.nota),
        "The grade must be between 0 and 10",
    )?;

    let row = settle(&state, state.backend.write_libreta(&ctx.token, &entry).await)?;
    Ok(Json(row))
}

// --- Admin Handlers ---

/// list_users
///
/// [Admin Route] Every account on the platform.
#[utoipa::path(
    get,
    path = "/admin/usuarios",
    responses((status = 200, description = "Users", body = [User]))
)]
pub async fn list_users(ctx: PageContext, State(state): State<AppState>) -> Result<Json<Vec<User>>, PageError> {
    let users = settle(&state, state.backend.list_users(&ctx.token).await)?;
    Ok(Json(users))
}

/// create_user
///
/// [Admin Route] Creates an account. Students must come with a legajo.
#[utoipa::path(
    post,
    path = "/admin/usuarios",
    request_body = NewUser,
    responses(
        (status = 201, description = "Created", body = User),
        (status = 422, description = "Form rejected", body = ErrorView)
    )
)]
pub async fn create_user(
    ctx: PageContext,
    State(state): State<AppState>,
    Json(user): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), PageError> {
    require(
        !user.nombre.trim().is_empty() && !user.apellido.trim().is_empty(),
        "First and last name are required",
    )?;
    require(user.email.contains('@'), "A valid email is required")?;
    require(user.password.len() >= 8, "The password needs at least 8 characters")?;
    if user.rol == Role::Student {
        require(
            user.legajo.as_deref().is_some_and(|l| !l.trim().is_empty()),
            "Students need a legajo",
        )?;
    }

    let created = settle(&state, state.backend.create_user(&ctx.token, &user).await)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// change_role
///
/// [Admin Route] Moves an account to another role.
#[utoipa::path(
    put,
    path = "/admin/usuarios/{id}/rol",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = RoleChange,
    responses((status = 200, description = "Updated", body = User))
)]
pub async fn change_role(
    ctx: PageContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(change): Json<RoleChange>,
) -> Result<Json<User>, PageError> {
    let user = settle(&state, state.backend.change_role(&ctx.token, id, change.rol).await)?;
    Ok(Json(user))
}

/// delete_user
///
/// [Admin Route] Removes an account.
#[utoipa::path(
    delete,
    path = "/admin/usuarios/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses((status = 204, description = "Deleted"))
)]
pub async fn delete_user(
    ctx: PageContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, PageError> {
    settle(&state, state.backend.delete_user(&ctx.token, id).await)?;
    Ok(StatusCode::NO_CONTENT)
}

fn check_materia(input: &MateriaInput) -> Result<(), PageError> {
    require(!input.nombre.trim().is_empty(), "The course needs a name")?;
    require(input.anio > 0, "The course needs a year")
}

/// create_materia
///
/// [Admin Route] Opens a new course.
#[utoipa::path(
    post,
    path = "/admin/materias",
    request_body = MateriaInput,
    responses(
        (status = 201, description = "Created", body = Materia),
        (status = 422, description = "Form rejected", body = ErrorView)
    )
)]
pub async fn create_materia(
    ctx: PageContext,
    State(state): State<AppState>,
    Json(input): Json<MateriaInput>,
) -> Result<(StatusCode, Json<Materia>), PageError> {
    check_materia(&input)?;
    let materia = settle(&state, state.backend.create_materia(&ctx.token, &input).await)?;
    Ok((StatusCode::CREATED, Json(materia)))
}

/// update_materia
///
/// [Admin Route] Edits a course.
#[utoipa::path(
    put,
    path = "/admin/materias/{id}",
    params(("id" = Uuid, Path, description = "Materia ID")),
    request_body = MateriaInput,
    responses((status = 200, description = "Updated", body = Materia))
)]
pub async fn update_materia(
    ctx: PageContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<MateriaInput>,
) -> Result<Json<Materia>, PageError> {
    check_materia(&input)?;
    let materia = settle(&state, state.backend.update_materia(&ctx.token, id, &input).await)?;
    Ok(Json(materia))
}

/// delete_materia
///
/// [Admin Route] Removes a course.
#[utoipa::path(
    delete,
    path = "/admin/materias/{id}",
    params(("id" = Uuid, Path, description = "Materia ID")),
    responses((status = 204, description = "Deleted"))
)]
pub async fn delete_materia(
    ctx: PageContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, PageError> {
    settle(&state, state.backend.delete_materia(&ctx.token, id).await)?;
    Ok(StatusCode::NO_CONTENT)
}

/// pending_enrollments
///
/// [Admin Route] The enrollment approval queue.
#[utoipa::path(
    get,
    path = "/admin/inscripciones",
    responses((status = 200, description = "Pending enrollments", body = [Inscripcion]))
)]
pub async fn pending_enrollments(
    ctx: PageContext,
    State(state): State<AppState>,
) -> Result<Json<Vec<Inscripcion>>, PageError> {
    let pendientes = settle(&state, state.backend.pending_enrollments(&ctx.token).await)?;
    Ok(Json(pendientes))
}

/// approve_enrollment
///
/// [Admin Route] Accepts an enrollment request.
#[utoipa::path(
    post,
    path = "/admin/inscripciones/{id}/aprobar",
    params(("id" = Uuid, Path, description = "Inscripcion ID")),
    responses((status = 200, description = "Approved", body = Inscripcion))
)]
pub async fn approve_enrollment(
    ctx: PageContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Inscripcion>, PageError> {
    let inscripcion = settle(&state, state.backend.decide_enrollment(&ctx.token, id, true).await)?;
    Ok(Json(inscripcion))
}

/// reject_enrollment
///
/// [Admin Route] Turns an enrollment request down.
#[utoipa::path(
    post,
    path = "/admin/inscripciones/{id}/rechazar",
    params(("id" = Uuid, Path, description = "Inscripcion ID")),
    responses((status = 200, description = "Rejected", body = Inscripcion))
)]
pub async fn reject_enrollment(
    ctx: PageContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Inscripcion>, PageError> {
    let inscripcion = settle(&state, state.backend.decide_enrollment(&ctx.token, id, false).await)?;
    Ok(Json(inscripcion))
}

/// all_libretas
///
/// [Admin Route] Transcript rows of every student, searched and sorted locally.
#[utoipa::path(
    get,
    path = "/admin/libretas",
    params(TranscriptQuery),
    responses(
        (status = 200, description = "Transcripts", body = TranscriptView),
        (status = 422, description = "Unknown sort option", body = ErrorView)
    )
)]
pub async fn all_libretas(
    ctx: PageContext,
    State(state): State<AppState>,
    Query(query): Query<TranscriptQuery>,
) -> Result<Json<TranscriptView>, PageError> {
    let rows = settle(&state, state.backend.all_libretas(&ctx.token).await)?;
    let filas = transcript::apply(rows, &query)?;
    Ok(Json(TranscriptView {
        total: filas.len(),
        filas,
    }))
}
