use tracing::info;

use crate::services::Persistence;
use crate::survey::definition::{validate_answers, AnswerSubmission};
use crate::survey::error::SurveyError;
use crate::survey::model::Form;
use crate::types::{FormId, Identity};

/// Validates and records answer batches
#[derive(Clone)]
pub struct SubmissionRecorder {
    db: Persistence,
}

impl SubmissionRecorder {
    pub fn new(db: Persistence) -> Self {
        Self { db }
    }

    /// Record a batch for the calling identity. Returns the number of answers
    /// stored. Whether the form is open is the caller's concern.
    pub async fn submit_answers(
        &self,
        identity: &Identity,
        form_id: FormId,
        batch: Vec<AnswerSubmission>,
    ) -> Result<usize, SurveyError> {
        let store = self.db.store();
        let mut form = self
            .db
            .run("find_form", store.find_form(form_id))
            .await?
            .ok_or_else(|| SurveyError::not_found(format!("form {}", form_id)))?;
        form.questions = self.db.run("questions_by_form", store.questions_by_form(form_id)).await?;
        self.submit_to(identity, &form, batch).await
    }

    /// Same as `submit_answers` for a form already loaded with its questions
    pub async fn submit_to(
        &self,
        identity: &Identity,
        form: &Form,
        batch: Vec<AnswerSubmission>,
    ) -> Result<usize, SurveyError> {
        let form_questions: Vec<_> = form.questions.iter().map(|q| q.id).collect();
        let answers = validate_answers(identity.user_id, form.id, &form_questions, batch)?;

        self.db.run("insert_answers", self.db.store().insert_answers(&answers)).await?;
        info!(form_id = form.id, user_id = identity.user_id, answers = answers.len(), "Answers recorded");
        Ok(answers.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{InMemorySurveyStore, SurveyStore};
    use crate::survey::definition::{FormMeta, NewForm, QuestionSpec};
    use crate::survey::error::ValidationError;
    use crate::survey::model::QuestionKind;
    use std::sync::Arc;
    use std::time::Duration;

    async fn setup() -> (SubmissionRecorder, InMemorySurveyStore, FormId) {
        let store = InMemorySurveyStore::new();
        let form = NewForm {
            meta: FormMeta {
                title: "Reunion".into(),
                description: String::new(),
                hidden: false,
                has_time_limit: false,
                start_date: None,
                end_date: None,
            },
            questions: vec![
                QuestionSpec {
                    text: "Coming?".into(),
                    kind: QuestionKind::MultipleChoice(vec!["yes".into(), "no".into()]),
                    follow_up: None,
                },
                QuestionSpec { text: "Dietary needs".into(), kind: QuestionKind::LongText, follow_up: None },
            ],
        };
        let id = store.create_form(&form).await.unwrap();
        let db = Persistence::new(Arc::new(store.clone()), Duration::from_secs(1));
        (SubmissionRecorder::new(db), store, id)
    }

    fn answer(question_id: i32, text: &str) -> AnswerSubmission {
        AnswerSubmission { user_id: None, form_id: None, question_id, answer_text: text.into() }
    }

    #[tokio::test]
    async fn two_answer_batch_is_recorded_for_the_caller() {
        let (recorder, store, form_id) = setup().await;
        let count = recorder
            .submit_answers(&Identity::member(5), form_id, vec![answer(1, "yes"), answer(2, "none")])
            .await
            .unwrap();
        assert_eq!(count, 2);

        let rows = store.answers_by_user(5).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|a| a.user_id == 5 && a.form_id == form_id));
    }

    #[tokio::test]
    async fn bad_entry_rejects_whole_batch() {
        let (recorder, store, form_id) = setup().await;
        let err = recorder
            .submit_answers(&Identity::member(5), form_id, vec![answer(1, "yes"), answer(42, "?")])
            .await
            .unwrap_err();
        assert!(matches!(err, SurveyError::Validation(ValidationError::InvalidAnswer(_))));
        assert!(store.answers_by_user(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn payload_cannot_impersonate() {
        let (recorder, _, form_id) = setup().await;
        let mut entry = answer(1, "yes");
        entry.user_id = Some(6);
        let err = recorder.submit_answers(&Identity::member(5), form_id, vec![entry]).await.unwrap_err();
        assert!(matches!(err, SurveyError::Validation(_)));
    }

    #[tokio::test]
    async fn duplicate_question_and_empty_batch_are_rejected() {
        let (recorder, _, form_id) = setup().await;
        let me = Identity::member(5);
        let err = recorder
            .submit_answers(&me, form_id, vec![answer(1, "yes"), answer(1, "no")])
            .await
            .unwrap_err();
        assert!(matches!(err, SurveyError::Validation(_)));

        let err = recorder.submit_answers(&me, form_id, Vec::new()).await.unwrap_err();
        assert!(matches!(err, SurveyError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_form_is_not_found() {
        let (recorder, _, _) = setup().await;
        let err = recorder
            .submit_answers(&Identity::member(5), 77, vec![answer(1, "yes")])
            .await
            .unwrap_err();
        assert!(matches!(err, SurveyError::NotFound(_)));
    }

    #[tokio::test]
    async fn repeated_submissions_are_kept() {
        let (recorder, store, form_id) = setup().await;
        let me = Identity::member(5);
        recorder.submit_answers(&me, form_id, vec![answer(1, "yes")]).await.unwrap();
        recorder.submit_answers(&me, form_id, vec![answer(1, "no")]).await.unwrap();
        assert_eq!(store.answers_by_user(5).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn submit_to_uses_the_loaded_question_list() {
        let (recorder, store, form_id) = setup().await;
        let mut form = store.find_form(form_id).await.unwrap().unwrap();
        form.questions = store.questions_by_form(form_id).await.unwrap();

        let added = store
            .insert_question(form_id, &QuestionSpec { text: "Late".into(), kind: QuestionKind::ShortText, follow_up: None })
            .await
            .unwrap();
        let err = recorder
            .submit_to(&Identity::member(5), &form, vec![answer(added, "too late")])
            .await
            .unwrap_err();
        assert!(matches!(err, SurveyError::Validation(ValidationError::InvalidAnswer(_))));

        assert_eq!(recorder.submit_to(&Identity::member(5), &form, vec![answer(1, "yes")]).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn question_deleted_after_load_is_not_found() {
        let (recorder, store, form_id) = setup().await;
        let mut form = store.find_form(form_id).await.unwrap().unwrap();
        form.questions = store.questions_by_form(form_id).await.unwrap();

        store.delete_question(2).await.unwrap();
        let err = recorder
            .submit_to(&Identity::member(5), &form, vec![answer(1, "yes"), answer(2, "none")])
            .await
            .unwrap_err();
        assert!(matches!(err, SurveyError::NotFound(_)));
        assert!(store.answers_by_user(5).await.unwrap().is_empty());
    }
}
