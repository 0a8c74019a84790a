use std::collections::HashMap;

use crate::services::catalog::load_full_form;
use crate::services::{require_admin, Persistence};
use crate::survey::error::SurveyError;
use crate::survey::model::{Answer, Form, GroupAnswer, Question};
use crate::types::{FormId, Identity, QuestionId, UserId};

/// Answer breakdowns for reporting
#[derive(Clone)]
pub struct AggregationEngine {
    db: Persistence,
}

impl AggregationEngine {
    pub fn new(db: Persistence) -> Self {
        Self { db }
    }

    /// One entry per distinct answer text, most frequent first
    pub async fn group_answers_by_question(
        &self,
        identity: &Identity,
        form_id: FormId,
        question_id: QuestionId,
    ) -> Result<Vec<GroupAnswer>, SurveyError> {
        require_admin(identity, "reading answer breakdowns")?;
        let mut groups = self
            .db
            .run("group_answers", self.db.store().group_answers(form_id, question_id))
            .await?;
        sort_groups(&mut groups);
        Ok(groups)
    }

    /// The full form with every question carrying its breakdown
    pub async fn show_form_answers(&self, identity: &Identity, form_id: FormId) -> Result<Form, SurveyError> {
        require_admin(identity, "reading answer breakdowns")?;
        let store = self.db.store();

        let form = self
            .db
            .run("find_form", store.find_form(form_id))
            .await?
            .ok_or_else(|| SurveyError::not_found(format!("form {}", form_id)))?;
        let mut form = load_full_form(&self.db, form).await?;

        let mut by_question: HashMap<QuestionId, Vec<GroupAnswer>> = HashMap::new();
        for group in self.db.run("group_answers_by_form", store.group_answers_by_form(form_id)).await? {
            by_question.entry(group.question_id).or_default().push(group);
        }
        for question in &mut form.questions {
            let mut groups = by_question.remove(&question.id).unwrap_or_default();
            sort_groups(&mut groups);
            question.answers_group = Some(groups);
        }
        Ok(form)
    }

    /// Members may read their own answers; admins anyone's
    pub async fn answers_by_user(&self, identity: &Identity, user_id: UserId) -> Result<Vec<Answer>, SurveyError> {
        if !identity.can_read_user(user_id) {
            return Err(SurveyError::forbidden(format!("answers of user {}", user_id)));
        }
        self.db.run("answers_by_user", self.db.store().answers_by_user(user_id)).await
    }

    /// One question with options, extension and breakdown
    pub async fn question_with_answers(
        &self,
        identity: &Identity,
        question_id: QuestionId,
    ) -> Result<Question, SurveyError> {
        require_admin(identity, "reading answer breakdowns")?;
        let store = self.db.store();

        let mut question = self
            .db
            .run("find_question", store.find_question(question_id))
            .await?
            .ok_or_else(|| SurveyError::not_found(format!("question {}", question_id)))?;
        question.options = self.db.run("options_by_question", store.options_by_question(question_id)).await?;
        question.follow_up = self
            .db
            .run("extension_by_question", store.extension_by_question(question_id))
            .await?;

        let mut groups = self
            .db
            .run("group_answers", store.group_answers(question.form_id, question_id))
            .await?;
        sort_groups(&mut groups);
        question.answers_group = Some(groups);
        Ok(question)
    }
}

fn sort_groups(groups: &mut [GroupAnswer]) {
    groups.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.answer_text.cmp(&b.answer_text)));
}
