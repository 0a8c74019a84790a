use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::manager::DatabaseError;
use crate::survey::model::{Extension, Question, QuestionOption, QuestionType};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuestionRow {
    pub id: i32,
    pub form_id: i32,
    pub question_text: String,
    #[sqlx(rename = "type")]
    pub question_type: String,
    pub extension: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<QuestionRow> for Question {
    type Error = DatabaseError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        let question_type = row
            .question_type
            .parse::<QuestionType>()
            .map_err(|e| DatabaseError::QueryError(format!("question {}: {}", row.id, e)))?;
        Ok(Question {
            id: row.id,
            form_id: row.form_id,
            text: row.question_text,
            question_type,
            extension: row.extension,
            created_at: row.created_at,
            updated_at: row.updated_at,
            options: Vec::new(),
            follow_up: None,
            answers_group: None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OptionRow {
    pub id: i32,
    pub question_id: i32,
    pub option_text: String,
}

impl From<OptionRow> for QuestionOption {
    fn from(row: OptionRow) -> Self {
        QuestionOption { id: row.id, question_id: row.question_id, text: row.option_text }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExtensionRow {
    pub id: i32,
    pub question_id: i32,
    pub followup_question_id: i32,
    pub followup_option_value: String,
}

impl From<ExtensionRow> for Extension {
    fn from(row: ExtensionRow) -> Self {
        Extension {
            id: row.id,
            question_id: row.question_id,
            followup_question_id: row.followup_question_id,
            followup_option_value: row.followup_option_value,
        }
    }
}
