//! Exam forms: authoring drafts, attempts being taken, and grading input.
//!
//! These hold the client-side rules that are checked before anything is sent to the
//! platform API.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{
    AnswerPayload, Correccion, Examen, NewExamen, NewPregunta, QuestionKind,
};
use crate::recorder::{AudioClip, Recorder, RelayedCapture};

/// Points every exam must add up to.
pub const TOTAL_SCORE: u32 = 10;

// --- Authoring ---

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DraftError {
    #[error("the exam needs a title")]
    MissingTitle,
    #[error("the exam needs at least one question")]
    NoQuestions,
    #[error("question text cannot be empty")]
    EmptyQuestion,
    #[error("a question must be worth at least one point")]
    ZeroScore,
    #[error("a question cannot be worth {0} points, the whole exam is worth 10")]
    ScoreTooHigh(u32),
    #[error("multiple-choice questions need at least two options")]
    TooFewOptions,
    #[error("adding {attempted} points would bring the exam to {would_be}, above 10")]
    ScoreOverflow { attempted: u32, would_be: u32 },
    #[error("scores add up to {total}, they must add up to exactly 10")]
    ScoreMismatch { total: u32 },
    #[error("there is no question number {0}")]
    NoSuchQuestion(usize),
}

/// ExamDraftForm
///
/// The authoring form as submitted by the renderer.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ExamDraftForm {
    pub titulo: String,
    #[ts(type = "string")]
    pub fecha_limite: DateTime<Utc>,
    pub preguntas: Vec<NewPregunta>,
}

/// ExamDraft
///
/// An exam under construction. Questions only get in through `add_question`, which
/// refuses anything that would push the total past `TOTAL_SCORE`. Scores of existing
/// questions can be edited freely; `can_submit` is derived from the current state each
/// time it is asked.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamDraft {
    titulo: String,
    fecha_limite: DateTime<Utc>,
    preguntas: Vec<NewPregunta>,
}

impl ExamDraft {
    pub fn new(titulo: impl Into<String>, fecha_limite: DateTime<Utc>) -> Self {
        Self {
            titulo: titulo.into(),
            fecha_limite,
            preguntas: Vec::new(),
        }
    }

    /// Rebuilds a draft from a submitted form, applying the same rules as adding the
    /// questions one at a time.
    pub fn from_form(form: ExamDraftForm) -> Result<Self, DraftError> {
        let mut draft = Self::new(form.titulo, form.fecha_limite);
        for pregunta in form.preguntas {
            draft.add_question(pregunta)?;
        }
        Ok(draft)
    }

    pub fn questions(&self) -> &[NewPregunta] {
        &self.preguntas
    }

    pub fn total(&self) -> u32 {
        self.preguntas
            .iter()
            .fold(0, |total: u32, p| total.saturating_add(p.puntuacion))
    }

    /// add_question
    ///
    /// Appends a question. On any error the draft is left exactly as it was.
    pub fn add_question(&mut self, pregunta: NewPregunta) -> Result<(), DraftError> {
        validate_question(&pregunta)?;

        let would_be = self.total().saturating_add(pregunta.puntuacion);
        if would_be > TOTAL_SCORE {
            return Err(DraftError::ScoreOverflow {
                attempted: pregunta.puntuacion,
                would_be,
            });
        }

        self.preguntas.push(pregunta);
        Ok(())
    }

    pub fn set_score(&mut self, index: usize, puntuacion: u32) -> Result<(), DraftError> {
        let pregunta = self
            .preguntas
            .get_mut(index)
            .ok_or(DraftError::NoSuchQuestion(index))?;
        pregunta.puntuacion = puntuacion;
        Ok(())
    }

    pub fn remove_question(&mut self, index: usize) -> Result<NewPregunta, DraftError> {
        if index >= self.preguntas.len() {
            return Err(DraftError::NoSuchQuestion(index));
        }
        Ok(self.preguntas.remove(index))
    }

    /// check
    ///
    /// First reason the draft cannot be submitted yet, if any.
    pub fn check(&self) -> Result<(), DraftError> {
        if self.titulo.trim().is_empty() {
            return Err(DraftError::MissingTitle);
        }
        if self.preguntas.is_empty() {
            return Err(DraftError::NoQuestions);
        }
        for pregunta in &self.preguntas {
            validate_question(pregunta)?;
        }
        let total = self.total();
        if total != TOTAL_SCORE {
            return Err(DraftError::ScoreMismatch { total });
        }
        Ok(())
    }

    pub fn can_submit(&self) -> bool {
        self.check().is_ok()
    }

    pub fn into_new_examen(self) -> Result<NewExamen, DraftError> {
        self.check()?;
        Ok(NewExamen {
            titulo: self.titulo.trim().to_string(),
            fecha_limite: self.fecha_limite,
            preguntas: self.preguntas,
        })
    }
}

fn validate_question(pregunta: &NewPregunta) -> Result<(), DraftError> {
    if pregunta.texto.trim().is_empty() {
        return Err(DraftError::EmptyQuestion);
    }
    if pregunta.puntuacion == 0 {
        return Err(DraftError::ZeroScore);
    }
    if pregunta.puntuacion > TOTAL_SCORE {
        return Err(DraftError::ScoreTooHigh(pregunta.puntuacion));
    }
    if let QuestionKind::Opcion { opciones } = &pregunta.tipo {
        let filled = opciones.iter().filter(|o| !o.trim().is_empty()).count();
        if filled < 2 {
            return Err(DraftError::TooFewOptions);
        }
    }
    Ok(())
}

// --- Taking ---

/// AttemptMode
///
/// First attempt or a redo. Both go through the same flow; only the endpoint the
/// submission is posted to differs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub enum AttemptMode {
    #[default]
    #[serde(rename = "primera")]
    First,
    #[serde(rename = "rehacer")]
    Redo,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AttemptError {
    #[error("the deadline for this exam has passed")]
    DeadlinePassed,
    #[error("{} question(s) still need an answer", .0.len())]
    Unanswered(Vec<Uuid>),
    #[error("question {0} is not part of this exam")]
    UnknownQuestion(Uuid),
    #[error("question {0} does not take this kind of answer")]
    WrongAnswerKind(Uuid),
    #[error("option {option} does not exist for question {pregunta_id}")]
    NoSuchOption { pregunta_id: Uuid, option: usize },
    #[error("no exam is open")]
    NotOpen,
}

#[derive(Debug, Clone, PartialEq)]
enum Answer {
    Text(String),
    Choice(usize),
    Audio(AudioClip),
}

/// ExamSubmission
///
/// Everything sent in one go when the learner hands the exam in.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamSubmission {
    pub examen_id: Uuid,
    pub mode: AttemptMode,
    pub respuestas: Vec<AnswerPayload>,
    pub audios: Vec<AudioClip>,
}

/// QuestionView
///
/// A question as rendered on the exam-taking screen.
#[derive(Debug, Clone, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct QuestionView {
    pub id: Uuid,
    pub texto: String,
    pub puntuacion: u32,
    pub tipo: QuestionKind,
    pub respondida: bool,
}

/// AttemptView
///
/// View state of the exam-taking screen.
#[derive(Debug, Clone, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct AttemptView {
    pub examen_id: Uuid,
    pub titulo: String,
    pub modo: AttemptMode,
    #[ts(type = "string")]
    pub fecha_limite: DateTime<Utc>,
    pub vencido: bool,
    pub preguntas: Vec<QuestionView>,
    pub puede_enviar: bool,
}

/// ExamAttempt
///
/// Answers collected while an exam is being taken. Nothing leaves the process until
/// `submission` succeeds and the whole thing is sent.
#[derive(Debug, Clone)]
pub struct ExamAttempt {
    examen: Examen,
    mode: AttemptMode,
    answers: HashMap<Uuid, Answer>,
}

impl ExamAttempt {
    pub fn new(examen: Examen, mode: AttemptMode) -> Self {
        Self {
            examen,
            mode,
            answers: HashMap::new(),
        }
    }

    pub fn examen_id(&self) -> Uuid {
        self.examen.id
    }

    pub fn mode(&self) -> AttemptMode {
        self.mode
    }

    fn kind_of(&self, pregunta_id: Uuid) -> Result<&QuestionKind, AttemptError> {
        self.examen
            .preguntas
            .iter()
            .find(|p| p.id == pregunta_id)
            .map(|p| &p.tipo)
            .ok_or(AttemptError::UnknownQuestion(pregunta_id))
    }

    /// Records a written answer. Blank text clears the answer.
    pub fn answer_text(&mut self, pregunta_id: Uuid, texto: &str) -> Result<(), AttemptError> {
        match self.kind_of(pregunta_id)? {
            QuestionKind::Texto => {}
            _ => return Err(AttemptError::WrongAnswerKind(pregunta_id)),
        }
        if texto.trim().is_empty() {
            self.answers.remove(&pregunta_id);
        } else {
            self.answers
                .insert(pregunta_id, Answer::Text(texto.to_string()));
        }
        Ok(())
    }

    pub fn answer_choice(&mut self, pregunta_id: Uuid, option: usize) -> Result<(), AttemptError> {
        match self.kind_of(pregunta_id)? {
            QuestionKind::Opcion { opciones } if option < opciones.len() => {}
            QuestionKind::Opcion { .. } => {
                return Err(AttemptError::NoSuchOption {
                    pregunta_id,
                    option,
                });
            }
            _ => return Err(AttemptError::WrongAnswerKind(pregunta_id)),
        }
        self.answers.insert(pregunta_id, Answer::Choice(option));
        Ok(())
    }

    /// Fails unless `pregunta_id` is an audio question of this exam.
    pub fn accepts_audio(&self, pregunta_id: Uuid) -> Result<(), AttemptError> {
        match self.kind_of(pregunta_id)? {
            QuestionKind::Audio => Ok(()),
            _ => Err(AttemptError::WrongAnswerKind(pregunta_id)),
        }
    }

    /// Stores a finished recording, replacing any earlier take for the same question.
    pub fn attach_audio(&mut self, clip: AudioClip) -> Result<(), AttemptError> {
        self.accepts_audio(clip.pregunta_id)?;
        self.answers.insert(clip.pregunta_id, Answer::Audio(clip));
        Ok(())
    }

    /// Questions without an answer, in exam order.
    pub fn missing(&self) -> Vec<Uuid> {
        self.examen
            .preguntas
            .iter()
            .filter(|p| !self.answers.contains_key(&p.id))
            .map(|p| p.id)
            .collect()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.examen.fecha_limite
    }

    /// ready
    ///
    /// Submission is allowed only before the deadline and with every question answered.
    pub fn ready(&self, now: DateTime<Utc>) -> Result<(), AttemptError> {
        if self.is_expired(now) {
            return Err(AttemptError::DeadlinePassed);
        }
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(AttemptError::Unanswered(missing));
        }
        Ok(())
    }

    pub fn submission(&self, now: DateTime<Utc>) -> Result<ExamSubmission, AttemptError> {
        self.ready(now)?;

        let mut respuestas = Vec::new();
        let mut audios = Vec::new();
        for pregunta in &self.examen.preguntas {
            match self.answers.get(&pregunta.id) {
                Some(Answer::Text(texto)) => respuestas.push(AnswerPayload {
                    pregunta_id: pregunta.id,
                    texto: Some(texto.clone()),
                    opcion: None,
                }),
                Some(Answer::Choice(option)) => respuestas.push(AnswerPayload {
                    pregunta_id: pregunta.id,
                    texto: None,
                    opcion: Some(*option),
                }),
                Some(Answer::Audio(clip)) => audios.push(clip.clone()),
                None => {}
            }
        }

        Ok(ExamSubmission {
            examen_id: self.examen.id,
            mode: self.mode,
            respuestas,
            audios,
        })
    }

    pub fn view(&self, now: DateTime<Utc>) -> AttemptView {
        AttemptView {
            examen_id: self.examen.id,
            titulo: self.examen.titulo.clone(),
            modo: self.mode,
            fecha_limite: self.examen.fecha_limite,
            vencido: self.is_expired(now),
            preguntas: self
                .examen
                .preguntas
                .iter()
                .map(|p| QuestionView {
                    id: p.id,
                    texto: p.texto.clone(),
                    puntuacion: p.puntuacion,
                    tipo: p.tipo.clone(),
                    respondida: self.answers.contains_key(&p.id),
                })
                .collect(),
            puede_enviar: self.ready(now).is_ok(),
        }
    }
}

/// ExamRoom
///
/// The exam currently open on this front end and the recorder serving it. There is one
/// learner per process, so there is at most one open attempt.
pub struct ExamRoom {
    pub attempt: Mutex<Option<ExamAttempt>>,
    pub recorder: Mutex<Recorder<RelayedCapture>>,
}

impl ExamRoom {
    pub fn new(audio_mime: &str) -> Self {
        Self {
            attempt: Mutex::new(None),
            recorder: Mutex::new(Recorder::new(RelayedCapture::new(audio_mime))),
        }
    }

    /// Closes the open attempt and releases the device if a recording was running.
    /// Lock order is attempt, then recorder.
    pub fn reset(&self) {
        let mut attempt = self.attempt.lock();
        self.recorder.lock().discard();
        *attempt = None;
    }
}

// --- Grading ---

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CorrectionError {
    #[error("question {0} is not part of this exam")]
    UnknownQuestion(Uuid),
    #[error("question {0} is graded more than once")]
    Duplicate(Uuid),
    #[error("question {pregunta_id} is worth {max} points, {given} were awarded")]
    OutOfRange {
        pregunta_id: Uuid,
        given: f64,
        max: u32,
    },
}

/// validate_correccion
///
/// Checks a grading against the exam it belongs to and returns the resulting mark.
pub fn validate_correccion(examen: &Examen, correccion: &Correccion) -> Result<f64, CorrectionError> {
    let mut seen = HashSet::new();
    let mut total = 0.0;

    for puntaje in &correccion.puntajes {
        let pregunta = examen
            .preguntas
            .iter()
            .find(|p| p.id == puntaje.pregunta_id)
            .ok_or(CorrectionError::UnknownQuestion(puntaje.pregunta_id))?;

        if !seen.insert(puntaje.pregunta_id) {
            return Err(CorrectionError::Duplicate(puntaje.pregunta_id));
        }

        if !puntaje.puntaje.is_finite()
            || puntaje.puntaje < 0.0
            || puntaje.puntaje > f64::from(pregunta.puntuacion)
        {
            return Err(CorrectionError::OutOfRange {
                pregunta_id: puntaje.pregunta_id,
                given: puntaje.puntaje,
                max: pregunta.puntuacion,
            });
        }

        total += puntaje.puntaje;
    }

    Ok(total)
}
