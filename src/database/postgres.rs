use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use tracing::debug;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    AnswerRow, ExtensionRow, FormRow, GroupAnswerRow, OptionRow, QuestionRow,
};
use crate::database::repository::SurveyStore;
use crate::survey::definition::{FormMeta, NewAnswer, NewForm, QuestionSpec};
use crate::survey::model::{Answer, Extension, Form, GroupAnswer, Question, QuestionOption};
use crate::types::{FormId, QuestionId, UserId};

const FORM_COLUMNS: &str =
    "id, title, description, hidden, has_time_limit, start_date, end_date, created_at, updated_at";

const QUESTION_COLUMNS: &str =
    "id, form_id, question_text, type, extension, created_at, updated_at";

/// PostgreSQL adapter for the survey persistence port
#[derive(Clone)]
pub struct PgSurveyStore {
    pool: PgPool,
}

impl PgSurveyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

async fn insert_question_row(
    conn: &mut PgConnection,
    form_id: FormId,
    question: &QuestionSpec<impl Sync>,
) -> Result<QuestionId, DatabaseError> {
    let now = Utc::now();
    let (id,): (i32,) = sqlx::query_as(
        "INSERT INTO questions (form_id, question_text, type, extension, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $5)
         RETURNING id",
    )
    .bind(form_id)
    .bind(&question.text)
    .bind(question.kind.question_type().as_str())
    .bind(question.follow_up.is_some())
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

async fn insert_options(
    conn: &mut PgConnection,
    question_id: QuestionId,
    options: &[String],
) -> Result<(), DatabaseError> {
    // One statement per option keeps ids in submission order
    for option in options {
        sqlx::query("INSERT INTO options (question_id, option_text) VALUES ($1, $2)")
            .bind(question_id)
            .bind(option)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn insert_extension(
    conn: &mut PgConnection,
    question_id: QuestionId,
    followup_question_id: QuestionId,
    trigger: &str,
) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO extensions (question_id, followup_question_id, followup_option_value)
         VALUES ($1, $2, $3)",
    )
    .bind(question_id)
    .bind(followup_question_id)
    .bind(trigger)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// The follow-up must still exist in the same form at write time
async fn check_follow_up_target(
    conn: &mut PgConnection,
    form_id: FormId,
    target: QuestionId,
) -> Result<(), DatabaseError> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT form_id FROM questions WHERE id = $1 FOR SHARE")
        .bind(target)
        .fetch_optional(&mut *conn)
        .await?;
    follow_up_in_form(row.map(|(owner,)| owner), form_id, target)
}

fn follow_up_in_form(
    owner: Option<FormId>,
    form_id: FormId,
    target: QuestionId,
) -> Result<(), DatabaseError> {
    match owner {
        Some(owner) if owner == form_id => Ok(()),
        _ => Err(DatabaseError::NotFound(format!(
            "follow-up question {} in form {}",
            target, form_id
        ))),
    }
}

/// Row-lock questions in ascending id order and return `(id, form_id)` for
/// those that still exist. Every transaction that locks more than one
/// question goes through here so lock order is global.
async fn lock_questions(
    conn: &mut PgConnection,
    ids: &[QuestionId],
) -> Result<Vec<(QuestionId, FormId)>, DatabaseError> {
    let rows: Vec<(QuestionId, FormId)> = sqlx::query_as(
        "SELECT id, form_id FROM questions WHERE id = ANY($1) ORDER BY id FOR UPDATE",
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

fn locked_form(locked: &[(QuestionId, FormId)], id: QuestionId) -> Option<FormId> {
    locked.iter().find(|(qid, _)| *qid == id).map(|(_, form_id)| *form_id)
}

#[async_trait]
impl SurveyStore for PgSurveyStore {
    async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn list_forms(&self) -> Result<Vec<Form>, DatabaseError> {
        let rows = sqlx::query_as::<_, FormRow>(&format!(
            "SELECT {} FROM forms ORDER BY id",
            FORM_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Form::from).collect())
    }

    async fn find_form(&self, id: FormId) -> Result<Option<Form>, DatabaseError> {
        let row = sqlx::query_as::<_, FormRow>(&format!(
            "SELECT {} FROM forms WHERE id = $1",
            FORM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Form::from))
    }

    async fn create_form(&self, form: &NewForm) -> Result<FormId, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let meta = &form.meta;
        let now = Utc::now();

        let (form_id,): (i32,) = sqlx::query_as(
            "INSERT INTO forms (title, description, hidden, has_time_limit, start_date, end_date, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
             RETURNING id",
        )
        .bind(&meta.title)
        .bind(&meta.description)
        .bind(meta.hidden)
        .bind(meta.has_time_limit)
        .bind(meta.start_date)
        .bind(meta.end_date)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let mut question_ids = Vec::with_capacity(form.questions.len());
        for question in &form.questions {
            let id = insert_question_row(&mut tx, form_id, question).await?;
            insert_options(&mut tx, id, question.kind.options()).await?;
            question_ids.push(id);
        }

        // Extensions last: their targets may come later in the form
        for (question, &id) in form.questions.iter().zip(&question_ids) {
            if let Some(follow_up) = &question.follow_up {
                let target = question_ids.get(follow_up.target).copied().ok_or_else(|| {
                    DatabaseError::QueryError(format!(
                        "follow-up position {} out of range",
                        follow_up.target
                    ))
                })?;
                insert_extension(&mut tx, id, target, &follow_up.trigger).await?;
            }
        }

        tx.commit().await?;
        debug!("Inserted form {} with {} questions", form_id, question_ids.len());
        Ok(form_id)
    }

    async fn update_form(&self, id: FormId, meta: &FormMeta) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE forms
             SET title = $1, description = $2, hidden = $3, has_time_limit = $4,
                 start_date = $5, end_date = $6, updated_at = $7
             WHERE id = $8",
        )
        .bind(&meta.title)
        .bind(&meta.description)
        .bind(meta.hidden)
        .bind(meta.has_time_limit)
        .bind(meta.start_date)
        .bind(meta.end_date)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("form {}", id)));
        }
        Ok(())
    }

    async fn delete_form(&self, id: FormId) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM forms WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("form {}", id)));
        }
        Ok(())
    }

    async fn find_question(&self, id: QuestionId) -> Result<Option<Question>, DatabaseError> {
        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            "SELECT {} FROM questions WHERE id = $1",
            QUESTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Question::try_from).transpose()
    }

    async fn questions_by_form(&self, form_id: FormId) -> Result<Vec<Question>, DatabaseError> {
        let rows = sqlx::query_as::<_, QuestionRow>(&format!(
            "SELECT {} FROM questions WHERE form_id = $1 ORDER BY id",
            QUESTION_COLUMNS
        ))
        .bind(form_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Question::try_from).collect()
    }

    async fn options_by_question(
        &self,
        question_id: QuestionId,
    ) -> Result<Vec<QuestionOption>, DatabaseError> {
        let rows = sqlx::query_as::<_, OptionRow>(
            "SELECT id, question_id, option_text FROM options WHERE question_id = $1 ORDER BY id",
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(QuestionOption::from).collect())
    }

    async fn options_by_form(&self, form_id: FormId) -> Result<Vec<QuestionOption>, DatabaseError> {
        let rows = sqlx::query_as::<_, OptionRow>(
            "SELECT o.id, o.question_id, o.option_text
             FROM options o
             JOIN questions q ON q.id = o.question_id
             WHERE q.form_id = $1
             ORDER BY o.id",
        )
        .bind(form_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(QuestionOption::from).collect())
    }

    async fn extension_by_question(
        &self,
        question_id: QuestionId,
    ) -> Result<Option<Extension>, DatabaseError> {
        let row = sqlx::query_as::<_, ExtensionRow>(
            "SELECT id, question_id, followup_question_id, followup_option_value
             FROM extensions WHERE question_id = $1",
        )
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Extension::from))
    }

    async fn extensions_by_form(&self, form_id: FormId) -> Result<Vec<Extension>, DatabaseError> {
        let rows = sqlx::query_as::<_, ExtensionRow>(
            "SELECT e.id, e.question_id, e.followup_question_id, e.followup_option_value
             FROM extensions e
             JOIN questions q ON q.id = e.question_id
             WHERE q.form_id = $1
             ORDER BY e.question_id",
        )
        .bind(form_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Extension::from).collect())
    }

    async fn insert_question(
        &self,
        form_id: FormId,
        question: &QuestionSpec<QuestionId>,
    ) -> Result<QuestionId, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        // Holds off a concurrent form delete until commit
        let form: Option<(i32,)> = sqlx::query_as("SELECT id FROM forms WHERE id = $1 FOR SHARE")
            .bind(form_id)
            .fetch_optional(&mut *tx)
            .await?;
        if form.is_none() {
            return Err(DatabaseError::NotFound(format!("form {}", form_id)));
        }

        if let Some(follow_up) = &question.follow_up {
            check_follow_up_target(&mut tx, form_id, follow_up.target).await?;
        }

        let id = insert_question_row(&mut tx, form_id, question).await?;
        insert_options(&mut tx, id, question.kind.options()).await?;
        if let Some(follow_up) = &question.follow_up {
            insert_extension(&mut tx, id, follow_up.target, &follow_up.trigger).await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    async fn replace_question(
        &self,
        id: QuestionId,
        question: &QuestionSpec<QuestionId>,
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        // Own row and follow-up target in one ascending lock, so two
        // questions pointing at each other cannot deadlock
        let mut ids = vec![id];
        if let Some(follow_up) = &question.follow_up {
            ids.push(follow_up.target);
        }
        let locked = lock_questions(&mut tx, &ids).await?;
        let form_id = locked_form(&locked, id)
            .ok_or_else(|| DatabaseError::NotFound(format!("question {}", id)))?;
        if let Some(follow_up) = &question.follow_up {
            follow_up_in_form(locked_form(&locked, follow_up.target), form_id, follow_up.target)?;
        }

        sqlx::query(
            "UPDATE questions SET question_text = $1, type = $2, extension = $3, updated_at = $4
             WHERE id = $5",
        )
        .bind(&question.text)
        .bind(question.kind.question_type().as_str())
        .bind(question.follow_up.is_some())
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM options WHERE question_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_options(&mut tx, id, question.kind.options()).await?;

        sqlx::query("DELETE FROM extensions WHERE question_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if let Some(follow_up) = &question.follow_up {
            insert_extension(&mut tx, id, follow_up.target, &follow_up.trigger).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_question(&self, id: QuestionId) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        // Lock the question and the current owners of extensions pointing at
        // it before touching anything. A replacement that is mid-flight on
        // this target commits first, and the statements below see its rows.
        let owners: Vec<(i32,)> = sqlx::query_as(
            "SELECT question_id FROM extensions WHERE followup_question_id = $1",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;
        let mut ids: Vec<QuestionId> = owners.into_iter().map(|(owner,)| owner).collect();
        ids.push(id);
        let locked = lock_questions(&mut tx, &ids).await?;
        if locked_form(&locked, id).is_none() {
            return Err(DatabaseError::NotFound(format!("question {}", id)));
        }

        // Owners of extensions pointing here lose their follow-up with it
        sqlx::query(
            "UPDATE questions SET extension = FALSE, updated_at = $2
             WHERE id IN (SELECT question_id FROM extensions WHERE followup_question_id = $1)",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("question {}", id)));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert_answers(&self, answers: &[NewAnswer]) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        for answer in answers {
            sqlx::query(
                "INSERT INTO answers (user_id, form_id, question_id, answer_text)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(answer.user_id)
            .bind(answer.form_id)
            .bind(answer.question_id)
            .bind(&answer.answer_text)
            .execute(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => DatabaseError::NotFound(
                    format!("question {} in form {}", answer.question_id, answer.form_id),
                ),
                other => DatabaseError::Sqlx(other),
            })?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn answers_by_user(&self, user_id: UserId) -> Result<Vec<Answer>, DatabaseError> {
        let rows = sqlx::query_as::<_, AnswerRow>(
            "SELECT id, user_id, form_id, question_id, answer_text
             FROM answers WHERE user_id = $1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Answer::from).collect())
    }

    async fn group_answers(
        &self,
        form_id: FormId,
        question_id: QuestionId,
    ) -> Result<Vec<GroupAnswer>, DatabaseError> {
        let rows = sqlx::query_as::<_, GroupAnswerRow>(
            "SELECT form_id, question_id, answer_text, COUNT(*) AS count
             FROM answers
             WHERE form_id = $1 AND question_id = $2
             GROUP BY form_id, question_id, answer_text",
        )
        .bind(form_id)
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(GroupAnswer::from).collect())
    }

    async fn group_answers_by_form(&self, form_id: FormId) -> Result<Vec<GroupAnswer>, DatabaseError> {
        let rows = sqlx::query_as::<_, GroupAnswerRow>(
            "SELECT form_id, question_id, answer_text, COUNT(*) AS count
             FROM answers
             WHERE form_id = $1
             GROUP BY form_id, question_id, answer_text
             ORDER BY question_id",
        )
        .bind(form_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(GroupAnswer::from).collect())
    }
}
