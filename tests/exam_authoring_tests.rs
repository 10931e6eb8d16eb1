use aula_portal::{
    exam::{DraftError, ExamDraft, ExamDraftForm, TOTAL_SCORE},
    models::{NewPregunta, QuestionKind},
};
use chrono::{Duration, Utc};

fn texto(puntuacion: u32) -> NewPregunta {
    NewPregunta {
        texto: "Desarrolle".to_string(),
        puntuacion,
        tipo: QuestionKind::Texto,
    }
}

fn opcion(opciones: &[&str], puntuacion: u32) -> NewPregunta {
    NewPregunta {
        texto: "Elija".to_string(),
        puntuacion,
        tipo: QuestionKind::Opcion {
            opciones: opciones.iter().map(|o| o.to_string()).collect(),
        },
    }
}

fn draft() -> ExamDraft {
    ExamDraft::new("Parcial", Utc::now() + Duration::days(7))
}

#[test]
fn test_scores_must_add_up_to_ten() {
    let mut draft = draft();
    draft.add_question(texto(4)).unwrap();
    draft.add_question(texto(3)).unwrap();
    assert_eq!(draft.check(), Err(DraftError::ScoreMismatch { total: 7 }));
    assert!(!draft.can_submit());

    draft.add_question(texto(3)).unwrap();
    assert_eq!(draft.total(), TOTAL_SCORE);
    assert!(draft.can_submit());
}

#[test]
fn test_adding_past_ten_is_refused_and_draft_untouched() {
    let mut draft = draft();
    for score in [4, 3, 3] {
        draft.add_question(texto(score)).unwrap();
    }
    let before = draft.clone();

    let result = draft.add_question(texto(1));

    assert_eq!(
        result,
        Err(DraftError::ScoreOverflow {
            attempted: 1,
            would_be: 11
        })
    );
    assert_eq!(draft, before);
    assert_eq!(draft.questions().len(), 3);
}

#[test]
fn test_invalid_questions_are_refused() {
    let mut draft = draft();

    let blank = NewPregunta {
        texto: "   ".to_string(),
        ..texto(2)
    };
    assert_eq!(draft.add_question(blank), Err(DraftError::EmptyQuestion));
    assert_eq!(draft.add_question(texto(0)), Err(DraftError::ZeroScore));
    assert_eq!(
        draft.add_question(opcion(&["Sí", "  "], 2)),
        Err(DraftError::TooFewOptions)
    );
    assert!(draft.questions().is_empty());

    assert!(draft.add_question(opcion(&["Sí", "No"], 2)).is_ok());
}

#[test]
fn test_editing_scores_reenables_submit() {
    let mut draft = draft();
    draft.add_question(texto(5)).unwrap();
    draft.add_question(texto(5)).unwrap();
    assert!(draft.can_submit());

    draft.set_score(1, 6).unwrap();
    assert_eq!(draft.check(), Err(DraftError::ScoreMismatch { total: 11 }));

    draft.set_score(1, 5).unwrap();
    assert!(draft.can_submit());

    assert_eq!(draft.set_score(9, 1), Err(DraftError::NoSuchQuestion(9)));
}

#[test]
fn test_removing_a_question() {
    let mut draft = draft();
    draft.add_question(texto(6)).unwrap();
    draft.add_question(texto(4)).unwrap();

    let removed = draft.remove_question(0).unwrap();
    assert_eq!(removed.puntuacion, 6);
    assert_eq!(draft.total(), 4);
    assert_eq!(draft.remove_question(5), Err(DraftError::NoSuchQuestion(5)));
}

#[test]
fn test_title_and_questions_required() {
    let empty = ExamDraft::new("  ", Utc::now());
    assert_eq!(empty.check(), Err(DraftError::MissingTitle));

    assert_eq!(draft().check(), Err(DraftError::NoQuestions));
}

#[test]
fn test_from_form_applies_same_rules() {
    let fecha_limite = Utc::now() + Duration::days(1);
    let form = ExamDraftForm {
        titulo: "  Final  ".to_string(),
        fecha_limite,
        preguntas: vec![texto(7), opcion(&["A", "B"], 3)],
    };

    let nuevo = ExamDraft::from_form(form).unwrap().into_new_examen().unwrap();
    assert_eq!(nuevo.titulo, "Final");
    assert_eq!(nuevo.fecha_limite, fecha_limite);
    assert_eq!(nuevo.preguntas.len(), 2);

    let overflowing = ExamDraftForm {
        titulo: "Final".to_string(),
        fecha_limite,
        preguntas: vec![texto(7), texto(4)],
    };
    assert!(matches!(
        ExamDraft::from_form(overflowing),
        Err(DraftError::ScoreOverflow { .. })
    ));
}

#[test]
fn test_huge_scores_are_rejected_without_wrapping() {
    let mut draft = draft();
    draft.add_question(texto(1)).unwrap();

    assert_eq!(
        draft.add_question(texto(u32::MAX)),
        Err(DraftError::ScoreTooHigh(u32::MAX))
    );
    assert_eq!(draft.questions().len(), 1);
    assert_eq!(draft.total(), 1);

    draft.add_question(texto(9)).unwrap();
    assert!(draft.can_submit());

    draft.set_score(0, u32::MAX).unwrap();
    assert_eq!(draft.total(), u32::MAX);
    assert_eq!(draft.check(), Err(DraftError::ScoreTooHigh(u32::MAX)));
    assert!(!draft.can_submit());

    let wrapping = ExamDraftForm {
        titulo: "Final".to_string(),
        fecha_limite: Utc::now() + Duration::days(1),
        preguntas: vec![texto(1), texto(u32::MAX), texto(10)],
    };
    assert_eq!(
        ExamDraft::from_form(wrapping).err(),
        Some(DraftError::ScoreTooHigh(u32::MAX))
    );
}
