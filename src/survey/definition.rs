// Wire-level definitions accepted from callers, and the validation that turns
// them into the checked shapes the builder and the stores work with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::survey::error::ValidationError;
use crate::survey::model::{QuestionKind, QuestionType};
use crate::types::{FormId, QuestionId, UserId};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormDefinition {
    /// Only checked against the path id on update
    #[serde(default)]
    pub id: Option<FormId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub has_time_limit: bool,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub questions: Vec<QuestionDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDefinition {
    #[serde(default)]
    pub id: Option<QuestionId>,
    #[serde(default)]
    pub form_id: Option<FormId>,
    pub question_text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub options_array: Vec<String>,
    #[serde(default)]
    pub extension: bool,
    #[serde(default)]
    pub question_extension: Option<ExtensionDefinition>,
}

/// Follow-up target named either by question id or by zero-based position in
/// the form's question order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtensionDefinition {
    #[serde(default)]
    pub followup_question_id: Option<QuestionId>,
    #[serde(default)]
    pub followup_question_index: Option<usize>,
    pub followup_option_value: String,
}

/// One entry of a submitted answer batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerSubmission {
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub form_id: Option<FormId>,
    pub question_id: QuestionId,
    pub answer_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormMeta {
    pub title: String,
    pub description: String,
    pub hidden: bool,
    pub has_time_limit: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUp<T> {
    pub target: T,
    pub trigger: String,
}

/// A validated question. `T` is how the follow-up target is addressed:
/// a draft position while the form is being created, a question id after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSpec<T> {
    pub text: String,
    pub kind: QuestionKind,
    pub follow_up: Option<FollowUp<T>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewForm {
    pub meta: FormMeta,
    pub questions: Vec<QuestionSpec<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAnswer {
    pub user_id: UserId,
    pub form_id: FormId,
    pub question_id: QuestionId,
    pub answer_text: String,
}

/// Resolves a follow-up reference to a question of the same form
pub trait FollowUpScope {
    type Target;

    fn resolve(&self, ext: &ExtensionDefinition) -> Result<Self::Target, ValidationError>;
}

/// Questions of a form that does not exist yet; only positions can name them.
#[derive(Debug, Clone, Copy)]
pub struct DraftScope {
    pub position: usize,
    pub len: usize,
}

impl FollowUpScope for DraftScope {
    type Target = usize;

    fn resolve(&self, ext: &ExtensionDefinition) -> Result<usize, ValidationError> {
        let index = match (ext.followup_question_index, ext.followup_question_id) {
            (Some(index), _) => index,
            (None, Some(id)) => {
                return Err(ValidationError::InvalidExtension(format!(
                    "follow-up question {} does not belong to this form",
                    id
                )))
            }
            (None, None) => {
                return Err(ValidationError::InvalidExtension(
                    "follow-up question is required when extension is enabled".to_string(),
                ))
            }
        };
        if index >= self.len {
            return Err(ValidationError::InvalidExtension(format!(
                "follow-up position {} is outside the form's {} questions",
                index, self.len
            )));
        }
        if index == self.position {
            return Err(ValidationError::InvalidExtension(
                "a question cannot be its own follow-up".to_string(),
            ));
        }
        Ok(index)
    }
}

/// Questions of an existing form, ascending id order. `own_id` is `None` when
/// the question being validated is about to be appended.
#[derive(Debug, Clone, Copy)]
pub struct FormScope<'a> {
    pub own_id: Option<QuestionId>,
    pub form_questions: &'a [QuestionId],
}

impl FollowUpScope for FormScope<'_> {
    type Target = QuestionId;

    fn resolve(&self, ext: &ExtensionDefinition) -> Result<QuestionId, ValidationError> {
        let target = match (ext.followup_question_id, ext.followup_question_index) {
            (Some(id), _) => id,
            (None, Some(index)) => *self.form_questions.get(index).ok_or_else(|| {
                ValidationError::InvalidExtension(format!(
                    "follow-up position {} is outside the form's {} questions",
                    index,
                    self.form_questions.len()
                ))
            })?,
            (None, None) => {
                return Err(ValidationError::InvalidExtension(
                    "follow-up question is required when extension is enabled".to_string(),
                ))
            }
        };
        if Some(target) == self.own_id {
            return Err(ValidationError::InvalidExtension(
                "a question cannot be its own follow-up".to_string(),
            ));
        }
        if !self.form_questions.contains(&target) {
            return Err(ValidationError::InvalidExtension(format!(
                "follow-up question {} does not belong to this form",
                target
            )));
        }
        Ok(target)
    }
}

pub fn validate_form(def: &FormDefinition) -> Result<FormMeta, ValidationError> {
    let title = def.title.trim();
    if title.is_empty() {
        return Err(ValidationError::InvalidForm("title is required".to_string()));
    }
    if def.has_time_limit {
        match (def.start_date, def.end_date) {
            (Some(start), Some(end)) if start < end => {}
            (Some(_), Some(_)) => {
                return Err(ValidationError::InvalidForm(
                    "start_date must be before end_date".to_string(),
                ))
            }
            _ => {
                return Err(ValidationError::InvalidForm(
                    "a time-limited form needs both start_date and end_date".to_string(),
                ))
            }
        }
    }
    Ok(FormMeta {
        title: title.to_string(),
        description: def.description.clone(),
        hidden: def.hidden,
        has_time_limit: def.has_time_limit,
        start_date: def.start_date,
        end_date: def.end_date,
    })
}

pub fn validate_question<S: FollowUpScope>(
    def: &QuestionDefinition,
    scope: &S,
) -> Result<QuestionSpec<S::Target>, ValidationError> {
    let text = def.question_text.trim();
    if text.is_empty() {
        return Err(ValidationError::InvalidQuestion("question_text is required".to_string()));
    }

    let kind = match def.question_type {
        QuestionType::ShortText => QuestionKind::ShortText,
        QuestionType::LongText => QuestionKind::LongText,
        QuestionType::MultipleChoice => {
            if def.options_array.is_empty() {
                return Err(ValidationError::InvalidQuestion(
                    "multiple_choice requires at least one option".to_string(),
                ));
            }
            if def.options_array.iter().any(|o| o.trim().is_empty()) {
                return Err(ValidationError::InvalidQuestion(
                    "options cannot be blank".to_string(),
                ));
            }
            QuestionKind::MultipleChoice(def.options_array.clone())
        }
    };

    // A payload sent alongside `extension: false` is stale and ignored
    let follow_up = if def.extension {
        let ext = def.question_extension.as_ref().ok_or_else(|| {
            ValidationError::InvalidExtension(
                "follow-up question is required when extension is enabled".to_string(),
            )
        })?;
        let target = scope.resolve(ext)?;
        let trigger = ext.followup_option_value.clone();
        if trigger.trim().is_empty() {
            return Err(ValidationError::InvalidExtension(
                "followup_option_value is required".to_string(),
            ));
        }
        if let QuestionKind::MultipleChoice(options) = &kind {
            if !options.contains(&trigger) {
                return Err(ValidationError::InvalidExtension(format!(
                    "'{}' is not one of the question's options",
                    trigger
                )));
            }
        }
        Some(FollowUp { target, trigger })
    } else {
        None
    };

    Ok(QuestionSpec { text: text.to_string(), kind, follow_up })
}

/// Validate a whole form definition for creation
pub fn validate_new_form(def: &FormDefinition) -> Result<NewForm, ValidationError> {
    let meta = validate_form(def)?;
    let len = def.questions.len();
    let questions = def
        .questions
        .iter()
        .enumerate()
        .map(|(position, q)| {
            validate_question(q, &DraftScope { position, len }).map_err(|e| e.at_question(position))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(NewForm { meta, questions })
}

/// Check an answer batch against the stated form's questions
pub fn validate_answers(
    respondent: UserId,
    form_id: FormId,
    form_questions: &[QuestionId],
    batch: Vec<AnswerSubmission>,
) -> Result<Vec<NewAnswer>, ValidationError> {
    if batch.is_empty() {
        return Err(ValidationError::InvalidAnswer("no answers submitted".to_string()));
    }

    let mut seen = HashSet::with_capacity(batch.len());
    batch
        .into_iter()
        .map(|entry| {
            if entry.user_id.is_some_and(|uid| uid != respondent) {
                return Err(ValidationError::InvalidAnswer(
                    "answers can only be submitted for the authenticated user".to_string(),
                ));
            }
            if entry.form_id.is_some_and(|fid| fid != form_id) {
                return Err(ValidationError::InvalidAnswer(format!(
                    "answer to question {} targets a different form",
                    entry.question_id
                )));
            }
            if !form_questions.contains(&entry.question_id) {
                return Err(ValidationError::InvalidAnswer(format!(
                    "question {} does not belong to form {}",
                    entry.question_id, form_id
                )));
            }
            if !seen.insert(entry.question_id) {
                return Err(ValidationError::InvalidAnswer(format!(
                    "question {} answered more than once",
                    entry.question_id
                )));
            }
            Ok(NewAnswer {
                user_id: respondent,
                form_id,
                question_id: entry.question_id,
                answer_text: entry.answer_text,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(t: QuestionType, options: &[&str]) -> QuestionDefinition {
        QuestionDefinition {
            id: None,
            form_id: None,
            question_text: "Where do you work?".to_string(),
            question_type: t,
            options_array: options.iter().map(|s| s.to_string()).collect(),
            extension: false,
            question_extension: None,
        }
    }

    fn with_follow_up(mut q: QuestionDefinition, ext: ExtensionDefinition) -> QuestionDefinition {
        q.extension = true;
        q.question_extension = Some(ext);
        q
    }

    fn by_id(id: QuestionId, value: &str) -> ExtensionDefinition {
        ExtensionDefinition {
            followup_question_id: Some(id),
            followup_question_index: None,
            followup_option_value: value.to_string(),
        }
    }

    fn by_index(index: usize, value: &str) -> ExtensionDefinition {
        ExtensionDefinition {
            followup_question_id: None,
            followup_question_index: Some(index),
            followup_option_value: value.to_string(),
        }
    }

    #[test]
    fn multiple_choice_without_options_is_invalid() {
        let err = validate_question(
            &question(QuestionType::MultipleChoice, &[]),
            &DraftScope { position: 0, len: 1 },
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidQuestion(_)));
    }

    #[test]
    fn free_text_drops_supplied_options() {
        let spec = validate_question(
            &question(QuestionType::ShortText, &["ignored"]),
            &DraftScope { position: 0, len: 1 },
        )
        .unwrap();
        assert_eq!(spec.kind, QuestionKind::ShortText);
        assert!(spec.kind.options().is_empty());
    }

    #[test]
    fn extension_flag_without_payload_is_invalid() {
        let mut q = question(QuestionType::ShortText, &[]);
        q.extension = true;
        let err = validate_question(&q, &DraftScope { position: 0, len: 2 }).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidExtension(_)));
    }

    #[test]
    fn self_reference_is_invalid_by_id() {
        let q = with_follow_up(question(QuestionType::MultipleChoice, &["yes", "no"]), by_id(10, "yes"));
        let ids = [10, 11];
        let err = validate_question(&q, &FormScope { own_id: Some(10), form_questions: &ids })
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidExtension(_)));
    }

    #[test]
    fn self_reference_is_invalid_by_position() {
        let q = with_follow_up(question(QuestionType::ShortText, &[]), by_index(1, "x"));
        let err = validate_question(&q, &DraftScope { position: 1, len: 3 }).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidExtension(_)));
    }

    #[test]
    fn follow_up_must_belong_to_same_form() {
        let q = with_follow_up(question(QuestionType::MultipleChoice, &["yes"]), by_id(99, "yes"));
        let ids = [10, 11];
        let err = validate_question(&q, &FormScope { own_id: Some(10), form_questions: &ids })
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidExtension(_)));

        // ids cannot name a question of a form that is still being created
        let q = with_follow_up(question(QuestionType::MultipleChoice, &["yes"]), by_id(11, "yes"));
        let err = validate_question(&q, &DraftScope { position: 0, len: 2 }).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidExtension(_)));
    }

    #[test]
    fn position_resolves_against_existing_form() {
        let q = with_follow_up(question(QuestionType::MultipleChoice, &["yes", "no"]), by_index(1, "yes"));
        let ids = [10, 11];
        let spec = validate_question(&q, &FormScope { own_id: Some(10), form_questions: &ids })
            .unwrap();
        assert_eq!(spec.follow_up, Some(FollowUp { target: 11, trigger: "yes".to_string() }));
    }

    #[test]
    fn trigger_must_match_an_option() {
        let q = with_follow_up(question(QuestionType::MultipleChoice, &["yes", "no"]), by_index(1, "maybe"));
        let err = validate_question(&q, &DraftScope { position: 0, len: 2 }).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidExtension(_)));
    }

    #[test]
    fn disabled_extension_ignores_stale_payload() {
        let mut q = question(QuestionType::ShortText, &[]);
        q.question_extension = Some(by_index(0, "x"));
        let spec = validate_question(&q, &DraftScope { position: 0, len: 1 }).unwrap();
        assert!(spec.follow_up.is_none());
    }

    #[test]
    fn time_limit_requires_ordered_dates() {
        let now = Utc::now();
        let mut def = FormDefinition { title: "Survey".into(), has_time_limit: true, ..Default::default() };
        assert!(validate_form(&def).is_err());
        def.start_date = Some(now);
        def.end_date = Some(now - chrono::Duration::hours(1));
        assert!(validate_form(&def).is_err());
        def.end_date = Some(now + chrono::Duration::hours(1));
        assert!(validate_form(&def).is_ok());
    }

    #[test]
    fn new_form_reports_offending_position() {
        let def = FormDefinition {
            title: "Tracer".into(),
            questions: vec![
                question(QuestionType::ShortText, &[]),
                question(QuestionType::MultipleChoice, &[]),
            ],
            ..Default::default()
        };
        let err = validate_new_form(&def).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidQuestion(
                "question #1: multiple_choice requires at least one option".to_string()
            )
        );
    }

    fn submission(question_id: QuestionId, text: &str) -> AnswerSubmission {
        AnswerSubmission { user_id: None, form_id: Some(1), question_id, answer_text: text.into() }
    }

    #[test]
    fn answers_take_respondent_from_identity() {
        let answers =
            validate_answers(5, 1, &[10, 11], vec![submission(10, "yes"), submission(11, "ok")])
                .unwrap();
        assert_eq!(answers.len(), 2);
        assert!(answers.iter().all(|a| a.user_id == 5 && a.form_id == 1));
    }

    #[test]
    fn answers_must_target_stated_form() {
        let err = validate_answers(5, 1, &[10], vec![submission(42, "yes")]).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidAnswer(_)));

        let mut other_form = submission(10, "yes");
        other_form.form_id = Some(2);
        assert!(validate_answers(5, 1, &[10], vec![other_form]).is_err());
    }

    #[test]
    fn one_answer_per_question_per_batch() {
        let err = validate_answers(5, 1, &[10], vec![submission(10, "yes"), submission(10, "no")])
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidAnswer(_)));
    }

    #[test]
    fn empty_batch_and_foreign_user_are_rejected() {
        assert!(validate_answers(5, 1, &[10], vec![]).is_err());
        let mut foreign = submission(10, "yes");
        foreign.user_id = Some(6);
        assert!(validate_answers(5, 1, &[10], vec![foreign]).is_err());
    }
}
