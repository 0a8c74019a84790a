use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::survey::model::Form;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FormRow {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub hidden: bool,
    pub has_time_limit: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FormRow> for Form {
    fn from(row: FormRow) -> Self {
        Form {
            id: row.id,
            title: row.title,
            description: row.description,
            hidden: row.hidden,
            has_time_limit: row.has_time_limit,
            start_date: row.start_date,
            end_date: row.end_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
            questions: Vec::new(),
        }
    }
}
