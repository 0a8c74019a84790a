use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde_json::{json, Value};

use super::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::survey::definition::FormDefinition;
use crate::survey::model::Form;
use crate::types::{FormId, Identity};

/// GET /forms
pub async fn list(State(state): State<AppState>, Extension(identity): Extension<Identity>) -> ApiResult<Vec<Form>> {
    let forms = state.catalog.list_forms(&identity).await?;
    Ok(ApiResponse::success(forms))
}

/// POST /forms/create
pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<FormDefinition>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(definition) = payload?;
    let id = state.builder.create_form(&identity, &definition).await?;
    Ok(ApiResponse::created(json!({ "id": id })))
}

/// GET /forms/:id - metadata and questions
pub async fn summary(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<FormId>,
) -> ApiResult<Form> {
    Ok(ApiResponse::success(state.catalog.form(&identity, id).await?))
}

/// GET /forms/:id/show - questions with options and extensions
pub async fn show(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<FormId>,
) -> ApiResult<Form> {
    Ok(ApiResponse::success(state.catalog.show_form(&identity, id).await?))
}

/// PATCH /forms/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<FormId>,
    payload: Result<Json<FormDefinition>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(definition) = payload?;
    if definition.id.is_some_and(|body_id| body_id != id) {
        return Err(ApiError::bad_request(format!("payload id does not match form {}", id)));
    }
    state.builder.update_form(&identity, id, &definition).await?;
    Ok(ApiResponse::success(json!({ "id": id })))
}

/// DELETE /forms/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<FormId>,
) -> ApiResult<()> {
    state.builder.delete_form(&identity, id).await?;
    Ok(ApiResponse::no_content())
}
