use tracing::info;

use crate::services::{require_admin, Persistence};
use crate::survey::definition::{
    validate_form, validate_new_form, validate_question, FormDefinition, FormScope,
    QuestionDefinition,
};
use crate::survey::error::SurveyError;
use crate::types::{FormId, Identity, QuestionId};

/// Creates and edits forms and their questions. Admin only.
#[derive(Clone)]
pub struct FormBuilder {
    db: Persistence,
}

impl FormBuilder {
    pub fn new(db: Persistence) -> Self {
        Self { db }
    }

    /// Validate the whole definition, then persist it in one go
    pub async fn create_form(
        &self,
        identity: &Identity,
        definition: &FormDefinition,
    ) -> Result<FormId, SurveyError> {
        require_admin(identity, "creating a form")?;
        let form = validate_new_form(definition)?;

        let id = self.db.run("create_form", self.db.store().create_form(&form)).await?;
        info!(form_id = id, questions = form.questions.len(), user_id = identity.user_id, "Form created");
        Ok(id)
    }

    /// Metadata only; questions are edited one by one
    pub async fn update_form(
        &self,
        identity: &Identity,
        id: FormId,
        definition: &FormDefinition,
    ) -> Result<(), SurveyError> {
        require_admin(identity, "updating a form")?;
        let meta = validate_form(definition)?;

        self.db.run("update_form", self.db.store().update_form(id, &meta)).await?;
        info!(form_id = id, "Form updated");
        Ok(())
    }

    pub async fn delete_form(&self, identity: &Identity, id: FormId) -> Result<(), SurveyError> {
        require_admin(identity, "deleting a form")?;
        self.db.run("delete_form", self.db.store().delete_form(id)).await?;
        info!(form_id = id, "Form deleted");
        Ok(())
    }

    /// Append a question to an existing form
    pub async fn add_question(
        &self,
        identity: &Identity,
        form_id: FormId,
        definition: &QuestionDefinition,
    ) -> Result<QuestionId, SurveyError> {
        require_admin(identity, "adding a question")?;
        let store = self.db.store();

        if self.db.run("find_form", store.find_form(form_id)).await?.is_none() {
            return Err(SurveyError::not_found(format!("form {}", form_id)));
        }
        let form_questions = self.question_ids(form_id).await?;
        let spec = validate_question(definition, &FormScope { own_id: None, form_questions: &form_questions })?;

        let id = self.db.run("insert_question", store.insert_question(form_id, &spec)).await?;
        info!(form_id, question_id = id, "Question added");
        Ok(id)
    }

    /// Overwrite a question, replacing its options and extension wholesale
    pub async fn update_question(
        &self,
        identity: &Identity,
        id: QuestionId,
        definition: &QuestionDefinition,
    ) -> Result<(), SurveyError> {
        require_admin(identity, "updating a question")?;
        let store = self.db.store();

        let question = self
            .db
            .run("find_question", store.find_question(id))
            .await?
            .ok_or_else(|| SurveyError::not_found(format!("question {}", id)))?;
        let form_questions = self.question_ids(question.form_id).await?;
        let spec = validate_question(
            definition,
            &FormScope { own_id: Some(id), form_questions: &form_questions },
        )?;

        self.db.run("replace_question", store.replace_question(id, &spec)).await?;
        info!(
            question_id = id,
            options = spec.kind.options().len(),
            extension = spec.follow_up.is_some(),
            "Question updated"
        );
        Ok(())
    }

    pub async fn delete_question(&self, identity: &Identity, id: QuestionId) -> Result<(), SurveyError> {
        require_admin(identity, "deleting a question")?;
        self.db.run("delete_question", self.db.store().delete_question(id)).await?;
        info!(question_id = id, "Question deleted");
        Ok(())
    }

    async fn question_ids(&self, form_id: FormId) -> Result<Vec<QuestionId>, SurveyError> {
        let questions = self
            .db
            .run("questions_by_form", self.db.store().questions_by_form(form_id))
            .await?;
        Ok(questions.into_iter().map(|q| q.id).collect())
    }
}
