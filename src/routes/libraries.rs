use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::db::models::{Library, LibraryUpdate, NewLibrary, Poem};
use crate::db::RepositoryError;
use crate::error::{AppError, AppResult};
use crate::feed::{self, LibraryForUserResponse};
use crate::routes::users::UserQuery;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPoem {
    pub poem_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/libraries", get(list_libraries).post(create_library))
        .route("/libraries/for-user/{library_id}", get(library_for_user))
        .route(
            "/libraries/{id}",
            get(get_library).put(update_library).delete(delete_library),
        )
        .route("/libraries/{id}/poems", post(add_poem))
}

async fn list_libraries(State(state): State<AppState>) -> AppResult<Json<Vec<Library>>> {
    Ok(Json(state.catalog.list_libraries().await?))
}

async fn create_library(
    State(state): State<AppState>,
    Json(mut library): Json<NewLibrary>,
) -> AppResult<(StatusCode, Json<Library>)> {
    library.name = library.name.trim().to_string();
    if library.name.is_empty() {
        return Err(AppError::BadRequest("Library name cannot be empty".into()));
    }

    let created = state.catalog.create_library(library).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_library(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Library>> {
    state
        .catalog
        .find_library(&id)
        .await?
        .map(Json)
        .ok_or_else(|| RepositoryError::not_found("Library", &id).into())
}

async fn update_library(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut changes): Json<LibraryUpdate>,
) -> AppResult<Json<Library>> {
    if let Some(name) = changes.name.take() {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("Library name cannot be empty".into()));
        }
        changes.name = Some(name);
    }
    Ok(Json(state.catalog.update_library(&id, changes).await?))
}

async fn delete_library(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    if !state.catalog.delete_library(&id).await? {
        return Err(RepositoryError::not_found("Library", &id).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn add_poem(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AddPoem>,
) -> AppResult<Json<Vec<Poem>>> {
    state.catalog.add_poem_to_library(&id, &req.poem_id).await?;
    Ok(Json(state.catalog.library_poems(&id).await?))
}

async fn library_for_user(
    State(state): State<AppState>,
    Path(library_id): Path<String>,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<LibraryForUserResponse>> {
    let view = feed::get_library_for_user(
        state.catalog.as_ref(),
        state.relations.as_ref(),
        &library_id,
        &query.user_id,
    )
    .await?;
    Ok(Json(view))
}
