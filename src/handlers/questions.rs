use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde_json::{json, Value};

use super::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::survey::definition::QuestionDefinition;
use crate::survey::model::Question;
use crate::types::{Identity, QuestionId};

/// POST /questions/create - `form_id` comes from the payload
pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<QuestionDefinition>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(definition) = payload?;
    let form_id = definition
        .form_id
        .ok_or_else(|| ApiError::bad_request("form_id is required"))?;

    let id = state.builder.add_question(&identity, form_id, &definition).await?;
    Ok(ApiResponse::created(json!({ "id": id })))
}

/// GET /questions/:id - with options, extension and answer breakdown
pub async fn show(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<QuestionId>,
) -> ApiResult<Question> {
    Ok(ApiResponse::success(state.aggregation.question_with_answers(&identity, id).await?))
}

/// PATCH /questions/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<QuestionId>,
    payload: Result<Json<QuestionDefinition>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(definition) = payload?;
    if definition.id.is_some_and(|body_id| body_id != id) {
        return Err(ApiError::bad_request(format!("payload id does not match question {}", id)));
    }
    state.builder.update_question(&identity, id, &definition).await?;
    Ok(ApiResponse::success(json!({ "id": id })))
}

/// DELETE /questions/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<QuestionId>,
) -> ApiResult<()> {
    state.builder.delete_question(&identity, id).await?;
    Ok(ApiResponse::no_content())
}
