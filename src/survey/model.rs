use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{AnswerId, ExtensionId, FormId, OptionId, QuestionId, UserId};

/// Closed set of question types as they appear on the wire and in storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    ShortText,
    LongText,
    MultipleChoice,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::ShortText => "short_text",
            QuestionType::LongText => "long_text",
            QuestionType::MultipleChoice => "multiple_choice",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short_text" => Ok(QuestionType::ShortText),
            "long_text" => Ok(QuestionType::LongText),
            "multiple_choice" => Ok(QuestionType::MultipleChoice),
            other => Err(format!("unknown question type '{}'", other)),
        }
    }
}

/// Validated question kind. Only the multiple-choice variant carries options,
/// so an option list on a free-text question cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionKind {
    ShortText,
    LongText,
    MultipleChoice(Vec<String>),
}

impl QuestionKind {
    pub fn question_type(&self) -> QuestionType {
        match self {
            QuestionKind::ShortText => QuestionType::ShortText,
            QuestionKind::LongText => QuestionType::LongText,
            QuestionKind::MultipleChoice(_) => QuestionType::MultipleChoice,
        }
    }

    /// Options in display order; empty for free-text kinds
    pub fn options(&self) -> &[String] {
        match self {
            QuestionKind::MultipleChoice(options) => options,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form {
    pub id: FormId,
    pub title: String,
    pub description: String,
    pub hidden: bool,
    pub has_time_limit: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<Question>,
}

impl Form {
    /// A form takes answers while it is visible and, when time limited,
    /// `now` falls inside `[start_date, end_date]`.
    pub fn accepts_answers_at(&self, now: DateTime<Utc>) -> bool {
        if self.hidden {
            return false;
        }
        if !self.has_time_limit {
            return true;
        }
        let started = self.start_date.map_or(true, |start| start <= now);
        let not_ended = self.end_date.map_or(true, |end| now <= end);
        started && not_ended
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub form_id: FormId,
    #[serde(rename = "question_text")]
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub extension: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<QuestionOption>,
    #[serde(rename = "question_extension", default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<Extension>,
    #[serde(rename = "answers_group", default, skip_serializing_if = "Option::is_none")]
    pub answers_group: Option<Vec<GroupAnswer>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: OptionId,
    pub question_id: QuestionId,
    #[serde(rename = "option_text")]
    pub text: String,
}

/// Conditional follow-up: `followup_question_id` applies only when the owning
/// question was answered with exactly `followup_option_value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    pub id: ExtensionId,
    pub question_id: QuestionId,
    pub followup_question_id: QuestionId,
    pub followup_option_value: String,
}

impl Extension {
    pub fn is_triggered_by(&self, answer_text: &str) -> bool {
        self.followup_option_value == answer_text
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub id: AnswerId,
    pub user_id: UserId,
    pub form_id: FormId,
    pub question_id: QuestionId,
    pub answer_text: String,
}

/// Number of answers sharing one exact text within a (form, question) scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAnswer {
    pub form_id: FormId,
    pub question_id: QuestionId,
    pub answer_text: String,
    pub count: i64,
}
