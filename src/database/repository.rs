use async_trait::async_trait;

use crate::database::manager::DatabaseError;
use crate::survey::definition::{FormMeta, NewAnswer, NewForm, QuestionSpec};
use crate::survey::model::{Answer, Extension, Form, GroupAnswer, Question, QuestionOption};
use crate::types::{FormId, QuestionId, UserId};

/// Persistence port for the survey core.
///
/// Reads return bare rows (forms without questions, questions without
/// options or extension); assembling them is the caller's job. Every write
/// that touches more than one row is atomic: either all of it is visible to
/// other callers or none of it is.
#[async_trait]
pub trait SurveyStore: Send + Sync {
    /// Cheap connectivity probe for health checks
    async fn ping(&self) -> Result<(), DatabaseError>;

    /// All forms, ascending id
    async fn list_forms(&self) -> Result<Vec<Form>, DatabaseError>;

    async fn find_form(&self, id: FormId) -> Result<Option<Form>, DatabaseError>;

    /// Insert the form, its questions in order, their options in order and
    /// the extensions (draft positions resolved to the new ids).
    async fn create_form(&self, form: &NewForm) -> Result<FormId, DatabaseError>;

    /// `NotFound` when the form does not exist
    async fn update_form(&self, id: FormId, meta: &FormMeta) -> Result<(), DatabaseError>;

    /// Cascades to questions, options, extensions and answers
    async fn delete_form(&self, id: FormId) -> Result<(), DatabaseError>;

    async fn find_question(&self, id: QuestionId) -> Result<Option<Question>, DatabaseError>;

    /// Questions of a form, ascending id (creation order)
    async fn questions_by_form(&self, form_id: FormId) -> Result<Vec<Question>, DatabaseError>;

    /// Options of one question in insertion order
    async fn options_by_question(
        &self,
        question_id: QuestionId,
    ) -> Result<Vec<QuestionOption>, DatabaseError>;

    /// Options of every question of a form, ascending option id
    async fn options_by_form(&self, form_id: FormId) -> Result<Vec<QuestionOption>, DatabaseError>;

    async fn extension_by_question(
        &self,
        question_id: QuestionId,
    ) -> Result<Option<Extension>, DatabaseError>;

    async fn extensions_by_form(&self, form_id: FormId) -> Result<Vec<Extension>, DatabaseError>;

    /// Append a question with its options and extension. `NotFound` when the
    /// form does not exist.
    async fn insert_question(
        &self,
        form_id: FormId,
        question: &QuestionSpec<QuestionId>,
    ) -> Result<QuestionId, DatabaseError>;

    /// Overwrite text, type and extension flag, then replace the option set
    /// and the extension wholesale. Concurrent replacements of the same
    /// question are serialized.
    async fn replace_question(
        &self,
        id: QuestionId,
        question: &QuestionSpec<QuestionId>,
    ) -> Result<(), DatabaseError>;

    /// Cascades to options, extension and answers. Extensions of other
    /// questions that point at this one are removed and their owners'
    /// `extension` flag cleared.
    async fn delete_question(&self, id: QuestionId) -> Result<(), DatabaseError>;

    /// Insert the whole batch or nothing
    async fn insert_answers(&self, answers: &[NewAnswer]) -> Result<(), DatabaseError>;

    /// Every answer of a respondent, ascending id
    async fn answers_by_user(&self, user_id: UserId) -> Result<Vec<Answer>, DatabaseError>;

    /// One row per distinct answer text for a (form, question) pair
    async fn group_answers(
        &self,
        form_id: FormId,
        question_id: QuestionId,
    ) -> Result<Vec<GroupAnswer>, DatabaseError>;

    /// Same grouping for every question of a form
    async fn group_answers_by_form(&self, form_id: FormId) -> Result<Vec<GroupAnswer>, DatabaseError>;
}
