use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::survey::model::{Answer, GroupAnswer};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnswerRow {
    pub id: i32,
    pub user_id: i32,
    pub form_id: i32,
    pub question_id: i32,
    pub answer_text: String,
}

impl From<AnswerRow> for Answer {
    fn from(row: AnswerRow) -> Self {
        Answer {
            id: row.id,
            user_id: row.user_id,
            form_id: row.form_id,
            question_id: row.question_id,
            answer_text: row.answer_text,
        }
    }
}

/// Result row of the `GROUP BY answer_text` aggregate
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GroupAnswerRow {
    pub form_id: i32,
    pub question_id: i32,
    pub answer_text: String,
    pub count: i64,
}

impl From<GroupAnswerRow> for GroupAnswer {
    fn from(row: GroupAnswerRow) -> Self {
        GroupAnswer {
            form_id: row.form_id,
            question_id: row.question_id,
            answer_text: row.answer_text,
            count: row.count,
        }
    }
}
