use std::collections::HashMap;
use tracing::debug;

use crate::services::Persistence;
use crate::survey::error::SurveyError;
use crate::survey::model::{Extension, Form, Question, QuestionOption};
use crate::types::{FormId, Identity, QuestionId};

/// Read side of the survey core used by the HTTP layer
#[derive(Clone)]
pub struct FormCatalog {
    db: Persistence,
}

impl FormCatalog {
    pub fn new(db: Persistence) -> Self {
        Self { db }
    }

    /// Form metadata, ascending id. Hidden forms are left out for members.
    pub async fn list_forms(&self, identity: &Identity) -> Result<Vec<Form>, SurveyError> {
        let forms = self.db.run("list_forms", self.db.store().list_forms()).await?;
        Ok(forms.into_iter().filter(|f| identity.is_admin || !f.hidden).collect())
    }

    /// Metadata plus questions, without options or extensions
    pub async fn form(&self, identity: &Identity, id: FormId) -> Result<Form, SurveyError> {
        let mut form = self.visible_form(identity, id).await?;
        form.questions = self.db.run("questions_by_form", self.db.store().questions_by_form(id)).await?;
        Ok(form)
    }

    /// Metadata plus questions with their options and extensions
    pub async fn show_form(&self, identity: &Identity, id: FormId) -> Result<Form, SurveyError> {
        let form = self.visible_form(identity, id).await?;
        load_full_form(&self.db, form).await
    }

    async fn visible_form(&self, identity: &Identity, id: FormId) -> Result<Form, SurveyError> {
        match self.db.run("find_form", self.db.store().find_form(id)).await? {
            Some(form) if identity.is_admin || !form.hidden => Ok(form),
            Some(_) => {
                debug!(form_id = id, user_id = identity.user_id, "Hidden form requested by member");
                Err(SurveyError::not_found(format!("form {}", id)))
            }
            None => Err(SurveyError::not_found(format!("form {}", id))),
        }
    }
}

/// Fill in questions, options and extensions of a form
pub(crate) async fn load_full_form(db: &Persistence, mut form: Form) -> Result<Form, SurveyError> {
    let store = db.store();
    let questions = db.run("questions_by_form", store.questions_by_form(form.id)).await?;
    let options = db.run("options_by_form", store.options_by_form(form.id)).await?;
    let extensions = db.run("extensions_by_form", store.extensions_by_form(form.id)).await?;
    form.questions = attach_details(questions, options, extensions);
    Ok(form)
}

/// Options keep their store order within each question
pub(crate) fn attach_details(
    mut questions: Vec<Question>,
    options: Vec<QuestionOption>,
    extensions: Vec<Extension>,
) -> Vec<Question> {
    let mut options_by_question: HashMap<QuestionId, Vec<QuestionOption>> = HashMap::new();
    for option in options {
        options_by_question.entry(option.question_id).or_default().push(option);
    }
    let mut extension_by_question: HashMap<QuestionId, Extension> =
        extensions.into_iter().map(|e| (e.question_id, e)).collect();

    for question in &mut questions {
        question.options = options_by_question.remove(&question.id).unwrap_or_default();
        question.follow_up = extension_by_question.remove(&question.id);
    }
    questions
}
