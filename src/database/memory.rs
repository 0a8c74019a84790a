use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::database::manager::DatabaseError;
use crate::database::repository::SurveyStore;
use crate::survey::definition::{FormMeta, NewAnswer, NewForm, QuestionSpec};
use crate::survey::model::{Answer, Extension, Form, GroupAnswer, Question, QuestionOption};
use crate::types::{AnswerId, ExtensionId, FormId, OptionId, QuestionId, UserId};

#[derive(Debug, Default)]
struct Sequences {
    form: FormId,
    question: QuestionId,
    option: OptionId,
    extension: ExtensionId,
    answer: AnswerId,
}

fn next(seq: &mut i32) -> i32 {
    *seq += 1;
    *seq
}

#[derive(Debug, Default)]
struct Tables {
    seq: Sequences,
    forms: BTreeMap<FormId, Form>,
    questions: BTreeMap<QuestionId, Question>,
    options: BTreeMap<OptionId, QuestionOption>,
    /// Keyed by owning question; at most one per question
    extensions: BTreeMap<QuestionId, Extension>,
    answers: BTreeMap<AnswerId, Answer>,
}

impl Tables {
    fn insert_question<T>(
        &mut self,
        form_id: FormId,
        spec: &QuestionSpec<T>,
    ) -> QuestionId {
        let now = Utc::now();
        let id = next(&mut self.seq.question);
        self.questions.insert(
            id,
            Question {
                id,
                form_id,
                text: spec.text.clone(),
                question_type: spec.kind.question_type(),
                extension: spec.follow_up.is_some(),
                created_at: now,
                updated_at: now,
                options: Vec::new(),
                follow_up: None,
                answers_group: None,
            },
        );
        self.insert_options(id, spec.kind.options());
        id
    }

    fn insert_options(&mut self, question_id: QuestionId, options: &[String]) {
        for text in options {
            let id = next(&mut self.seq.option);
            self.options.insert(id, QuestionOption { id, question_id, text: text.clone() });
        }
    }

    fn set_extension(&mut self, question_id: QuestionId, target: QuestionId, trigger: &str) {
        let id = next(&mut self.seq.extension);
        self.extensions.insert(
            question_id,
            Extension {
                id,
                question_id,
                followup_question_id: target,
                followup_option_value: trigger.to_string(),
            },
        );
    }

    /// The follow-up must still exist in the same form at write time
    fn check_target(&self, form_id: FormId, target: QuestionId) -> Result<(), DatabaseError> {
        match self.questions.get(&target) {
            Some(q) if q.form_id == form_id => Ok(()),
            _ => Err(DatabaseError::NotFound(format!(
                "follow-up question {} in form {}",
                target, form_id
            ))),
        }
    }

    fn remove_question(&mut self, id: QuestionId) {
        self.questions.remove(&id);
        self.options.retain(|_, o| o.question_id != id);
        self.extensions.remove(&id);
        self.answers.retain(|_, a| a.question_id != id);

        let orphaned: Vec<QuestionId> = self
            .extensions
            .values()
            .filter(|e| e.followup_question_id == id)
            .map(|e| e.question_id)
            .collect();
        let now = Utc::now();
        for owner in orphaned {
            self.extensions.remove(&owner);
            if let Some(q) = self.questions.get_mut(&owner) {
                q.extension = false;
                q.updated_at = now;
            }
        }
    }

    fn question_ids_of(&self, form_id: FormId) -> Vec<QuestionId> {
        self.questions.values().filter(|q| q.form_id == form_id).map(|q| q.id).collect()
    }

    fn group(&self, form_id: FormId, question_id: Option<QuestionId>) -> Vec<GroupAnswer> {
        let mut counts: HashMap<(QuestionId, &str), i64> = HashMap::new();
        for a in self.answers.values() {
            if a.form_id == form_id && question_id.map_or(true, |q| q == a.question_id) {
                *counts.entry((a.question_id, a.answer_text.as_str())).or_default() += 1;
            }
        }
        counts
            .into_iter()
            .map(|((question_id, text), count)| GroupAnswer {
                form_id,
                question_id,
                answer_text: text.to_string(),
                count,
            })
            .collect()
    }
}

/// In-process store for tests and local runs without PostgreSQL.
/// Every write holds the single write lock for its whole duration, which
/// gives multi-row writes the same all-or-nothing visibility as a transaction.
#[derive(Debug, Default, Clone)]
pub struct InMemorySurveyStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemorySurveyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SurveyStore for InMemorySurveyStore {
    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn list_forms(&self) -> Result<Vec<Form>, DatabaseError> {
        Ok(self.tables.read().await.forms.values().cloned().collect())
    }

    async fn find_form(&self, id: FormId) -> Result<Option<Form>, DatabaseError> {
        Ok(self.tables.read().await.forms.get(&id).cloned())
    }

    async fn create_form(&self, form: &NewForm) -> Result<FormId, DatabaseError> {
        // Positions are checked before anything is written
        if let Some(bad) = form
            .questions
            .iter()
            .filter_map(|q| q.follow_up.as_ref())
            .find(|f| f.target >= form.questions.len())
        {
            return Err(DatabaseError::QueryError(format!(
                "follow-up position {} out of range",
                bad.target
            )));
        }

        let mut t = self.tables.write().await;
        let now = Utc::now();
        let form_id = next(&mut t.seq.form);
        let meta = &form.meta;
        t.forms.insert(
            form_id,
            Form {
                id: form_id,
                title: meta.title.clone(),
                description: meta.description.clone(),
                hidden: meta.hidden,
                has_time_limit: meta.has_time_limit,
                start_date: meta.start_date,
                end_date: meta.end_date,
                created_at: now,
                updated_at: now,
                questions: Vec::new(),
            },
        );

        let ids: Vec<QuestionId> =
            form.questions.iter().map(|q| t.insert_question(form_id, q)).collect();
        for (question, &id) in form.questions.iter().zip(&ids) {
            if let Some(follow_up) = &question.follow_up {
                t.set_extension(id, ids[follow_up.target], &follow_up.trigger);
            }
        }
        Ok(form_id)
    }

    async fn update_form(&self, id: FormId, meta: &FormMeta) -> Result<(), DatabaseError> {
        let mut t = self.tables.write().await;
        let form = t
            .forms
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound(format!("form {}", id)))?;
        form.title = meta.title.clone();
        form.description = meta.description.clone();
        form.hidden = meta.hidden;
        form.has_time_limit = meta.has_time_limit;
        form.start_date = meta.start_date;
        form.end_date = meta.end_date;
        form.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_form(&self, id: FormId) -> Result<(), DatabaseError> {
        let mut t = self.tables.write().await;
        if t.forms.remove(&id).is_none() {
            return Err(DatabaseError::NotFound(format!("form {}", id)));
        }
        for question_id in t.question_ids_of(id) {
            t.remove_question(question_id);
        }
        t.answers.retain(|_, a| a.form_id != id);
        Ok(())
    }

    async fn find_question(&self, id: QuestionId) -> Result<Option<Question>, DatabaseError> {
        Ok(self.tables.read().await.questions.get(&id).cloned())
    }

    async fn questions_by_form(&self, form_id: FormId) -> Result<Vec<Question>, DatabaseError> {
        let t = self.tables.read().await;
        Ok(t.questions.values().filter(|q| q.form_id == form_id).cloned().collect())
    }

    async fn options_by_question(
        &self,
        question_id: QuestionId,
    ) -> Result<Vec<QuestionOption>, DatabaseError> {
        let t = self.tables.read().await;
        Ok(t.options.values().filter(|o| o.question_id == question_id).cloned().collect())
    }

    async fn options_by_form(&self, form_id: FormId) -> Result<Vec<QuestionOption>, DatabaseError> {
        let t = self.tables.read().await;
        Ok(t.options
            .values()
            .filter(|o| t.questions.get(&o.question_id).is_some_and(|q| q.form_id == form_id))
            .cloned()
            .collect())
    }

    async fn extension_by_question(
        &self,
        question_id: QuestionId,
    ) -> Result<Option<Extension>, DatabaseError> {
        Ok(self.tables.read().await.extensions.get(&question_id).cloned())
    }

    async fn extensions_by_form(&self, form_id: FormId) -> Result<Vec<Extension>, DatabaseError> {
        let t = self.tables.read().await;
        Ok(t.extensions
            .values()
            .filter(|e| t.questions.get(&e.question_id).is_some_and(|q| q.form_id == form_id))
            .cloned()
            .collect())
    }

    async fn insert_question(
        &self,
        form_id: FormId,
        question: &QuestionSpec<QuestionId>,
    ) -> Result<QuestionId, DatabaseError> {
        let mut t = self.tables.write().await;
        if !t.forms.contains_key(&form_id) {
            return Err(DatabaseError::NotFound(format!("form {}", form_id)));
        }
        if let Some(follow_up) = &question.follow_up {
            t.check_target(form_id, follow_up.target)?;
        }
        let id = t.insert_question(form_id, question);
        if let Some(follow_up) = &question.follow_up {
            t.set_extension(id, follow_up.target, &follow_up.trigger);
        }
        Ok(id)
    }

    async fn replace_question(
        &self,
        id: QuestionId,
        question: &QuestionSpec<QuestionId>,
    ) -> Result<(), DatabaseError> {
        let mut t = self.tables.write().await;
        let form_id = t
            .questions
            .get(&id)
            .map(|q| q.form_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("question {}", id)))?;
        if let Some(follow_up) = &question.follow_up {
            t.check_target(form_id, follow_up.target)?;
        }

        if let Some(row) = t.questions.get_mut(&id) {
            row.text = question.text.clone();
            row.question_type = question.kind.question_type();
            row.extension = question.follow_up.is_some();
            row.updated_at = Utc::now();
        }

        t.options.retain(|_, o| o.question_id != id);
        t.insert_options(id, question.kind.options());

        t.extensions.remove(&id);
        if let Some(follow_up) = &question.follow_up {
            t.set_extension(id, follow_up.target, &follow_up.trigger);
        }
        Ok(())
    }

    async fn delete_question(&self, id: QuestionId) -> Result<(), DatabaseError> {
        let mut t = self.tables.write().await;
        if !t.questions.contains_key(&id) {
            return Err(DatabaseError::NotFound(format!("question {}", id)));
        }
        t.remove_question(id);
        Ok(())
    }

    async fn insert_answers(&self, answers: &[NewAnswer]) -> Result<(), DatabaseError> {
        let mut t = self.tables.write().await;
        // Same referential checks the foreign keys make, before the first insert
        for answer in answers {
            match t.questions.get(&answer.question_id) {
                Some(q) if q.form_id == answer.form_id => {}
                _ => {
                    return Err(DatabaseError::NotFound(format!(
                        "question {} in form {}",
                        answer.question_id, answer.form_id
                    )))
                }
            }
        }
        for answer in answers {
            let id = next(&mut t.seq.answer);
            t.answers.insert(
                id,
                Answer {
                    id,
                    user_id: answer.user_id,
                    form_id: answer.form_id,
                    question_id: answer.question_id,
                    answer_text: answer.answer_text.clone(),
                },
            );
        }
        Ok(())
    }

    async fn answers_by_user(&self, user_id: UserId) -> Result<Vec<Answer>, DatabaseError> {
        let t = self.tables.read().await;
        Ok(t.answers.values().filter(|a| a.user_id == user_id).cloned().collect())
    }

    async fn group_answers(
        &self,
        form_id: FormId,
        question_id: QuestionId,
    ) -> Result<Vec<GroupAnswer>, DatabaseError> {
        Ok(self.tables.read().await.group(form_id, Some(question_id)))
    }

    async fn group_answers_by_form(&self, form_id: FormId) -> Result<Vec<GroupAnswer>, DatabaseError> {
        let mut groups = self.tables.read().await.group(form_id, None);
        groups.sort_by_key(|g| g.question_id);
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::definition::FollowUp;
    use crate::survey::model::{QuestionKind, QuestionType};

    fn meta(title: &str) -> FormMeta {
        FormMeta {
            title: title.to_string(),
            description: String::new(),
            hidden: false,
            has_time_limit: false,
            start_date: None,
            end_date: None,
        }
    }

    fn spec<T>(text: &str, kind: QuestionKind, follow_up: Option<FollowUp<T>>) -> QuestionSpec<T> {
        QuestionSpec { text: text.to_string(), kind, follow_up }
    }

    fn choice(options: &[&str]) -> QuestionKind {
        QuestionKind::MultipleChoice(options.iter().map(|s| s.to_string()).collect())
    }

    async fn seeded() -> (InMemorySurveyStore, FormId) {
        let store = InMemorySurveyStore::new();
        let form = NewForm {
            meta: meta("Tracer study"),
            questions: vec![
                spec(
                    "Are you employed?",
                    choice(&["yes", "no"]),
                    Some(FollowUp { target: 1, trigger: "yes".to_string() }),
                ),
                spec("Company name", QuestionKind::ShortText, None),
                spec("Anything else?", QuestionKind::LongText, None),
            ],
        };
        let id = store.create_form(&form).await.unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn create_form_resolves_positions_to_ids() {
        let (store, form_id) = seeded().await;
        let questions = store.questions_by_form(form_id).await.unwrap();
        let ids: Vec<_> = questions.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(questions[0].extension);
        assert_eq!(questions[0].question_type, QuestionType::MultipleChoice);

        let ext = store.extension_by_question(ids[0]).await.unwrap().unwrap();
        assert_eq!(ext.followup_question_id, ids[1]);
        assert_eq!(ext.followup_option_value, "yes");

        let options = store.options_by_question(ids[0]).await.unwrap();
        let texts: Vec<_> = options.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, vec!["yes", "no"]);
    }

    #[tokio::test]
    async fn out_of_range_position_writes_nothing() {
        let store = InMemorySurveyStore::new();
        let form = NewForm {
            meta: meta("Broken"),
            questions: vec![spec(
                "Q",
                QuestionKind::ShortText,
                Some(FollowUp { target: 5, trigger: "x".to_string() }),
            )],
        };
        assert!(store.create_form(&form).await.is_err());
        assert!(store.list_forms().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replace_question_swaps_options_and_extension() {
        let (store, _) = seeded().await;
        store
            .replace_question(1, &spec("Employed?", choice(&["full time", "part time", "no"]), None))
            .await
            .unwrap();

        let texts: Vec<_> = store
            .options_by_question(1)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.text)
            .collect();
        assert_eq!(texts, vec!["full time", "part time", "no"]);
        assert!(store.extension_by_question(1).await.unwrap().is_none());
        assert!(!store.find_question(1).await.unwrap().unwrap().extension);
    }

    #[tokio::test]
    async fn replace_rejects_target_from_other_form() {
        let (store, _) = seeded().await;
        let other = NewForm {
            meta: meta("Other"),
            questions: vec![spec("Q", QuestionKind::ShortText, None)],
        };
        store.create_form(&other).await.unwrap();

        // question 4 belongs to the second form
        let err = store
            .replace_question(
                2,
                &spec("Company", QuestionKind::ShortText, Some(FollowUp { target: 4, trigger: "x".into() })),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(_)));
    }

    #[tokio::test]
    async fn deleting_follow_up_target_clears_owner_flag() {
        let (store, form_id) = seeded().await;
        store
            .insert_answers(&[NewAnswer { user_id: 5, form_id, question_id: 2, answer_text: "ACME".into() }])
            .await
            .unwrap();

        store.delete_question(2).await.unwrap();

        assert!(store.extension_by_question(1).await.unwrap().is_none());
        assert!(!store.find_question(1).await.unwrap().unwrap().extension);
        assert!(store.answers_by_user(5).await.unwrap().is_empty());
        assert!(matches!(store.delete_question(2).await, Err(DatabaseError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_form_cascades() {
        let (store, form_id) = seeded().await;
        store.delete_form(form_id).await.unwrap();
        assert!(store.questions_by_form(form_id).await.unwrap().is_empty());
        assert!(store.options_by_form(form_id).await.unwrap().is_empty());
        assert!(store.extensions_by_form(form_id).await.unwrap().is_empty());
        assert!(matches!(store.delete_form(form_id).await, Err(DatabaseError::NotFound(_))));
    }

    #[tokio::test]
    async fn answer_batch_with_foreign_question_inserts_nothing() {
        let (store, form_id) = seeded().await;
        let batch = [
            NewAnswer { user_id: 5, form_id, question_id: 1, answer_text: "yes".into() },
            NewAnswer { user_id: 5, form_id, question_id: 77, answer_text: "??".into() },
        ];
        assert!(store.insert_answers(&batch).await.is_err());
        assert!(store.answers_by_user(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn grouping_counts_exact_texts() {
        let (store, form_id) = seeded().await;
        for (user, text) in [(1, "yes"), (2, "no"), (3, "yes")] {
            store
                .insert_answers(&[NewAnswer { user_id: user, form_id, question_id: 1, answer_text: text.into() }])
                .await
                .unwrap();
        }
        let mut groups = store.group_answers(form_id, 1).await.unwrap();
        groups.sort_by(|a, b| a.answer_text.cmp(&b.answer_text));
        let pairs: Vec<_> = groups.iter().map(|g| (g.answer_text.as_str(), g.count)).collect();
        assert_eq!(pairs, vec![("no", 1), ("yes", 2)]);

        assert!(store.group_answers(form_id, 2).await.unwrap().is_empty());
        assert_eq!(store.group_answers_by_form(form_id).await.unwrap().len(), 2);
    }
}
