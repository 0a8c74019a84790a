use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use super::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::survey::definition::AnswerSubmission;
use crate::survey::model::{Answer, Form, GroupAnswer};
use crate::types::{FormId, Identity, QuestionId, UserId};

/// POST /forms/:id/submit - body is a JSON array of answers
pub async fn submit(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(form_id): Path<FormId>,
    payload: Result<Json<Vec<AnswerSubmission>>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(batch) = payload?;

    let form = state.catalog.form(&identity, form_id).await?;
    if !form.accepts_answers_at(Utc::now()) {
        return Err(ApiError::forbidden(format!("form {} is not accepting answers", form_id)));
    }

    let count = state.recorder.submit_to(&identity, &form, batch).await?;
    Ok(ApiResponse::created(json!({ "count": count })))
}

/// GET /forms/:id/answers
pub async fn form_results(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(form_id): Path<FormId>,
) -> ApiResult<Form> {
    Ok(ApiResponse::success(state.aggregation.show_form_answers(&identity, form_id).await?))
}

/// GET /forms/:id/questions/:qid/answers
pub async fn question_groups(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path((form_id, question_id)): Path<(FormId, QuestionId)>,
) -> ApiResult<Vec<GroupAnswer>> {
    let groups = state
        .aggregation
        .group_answers_by_question(&identity, form_id, question_id)
        .await?;
    Ok(ApiResponse::success(groups))
}

/// GET /answers/me
pub async fn mine(State(state): State<AppState>, Extension(identity): Extension<Identity>) -> ApiResult<Vec<Answer>> {
    Ok(ApiResponse::success(state.aggregation.answers_by_user(&identity, identity.user_id).await?))
}

/// GET /users/:id/answers
pub async fn by_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(user_id): Path<UserId>,
) -> ApiResult<Vec<Answer>> {
    Ok(ApiResponse::success(state.aggregation.answers_by_user(&identity, user_id).await?))
}
