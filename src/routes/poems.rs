use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::db::models::{NewPoem, Poem, PoemUpdate};
use crate::db::RepositoryError;
use crate::engagement::{self, Relation, SubjectKind, ToggleOutcome};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TogglePoemLike {
    pub user_id: String,
    pub poem_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadEvent {
    pub user_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/poems", get(list_poems).post(create_poem))
        .route("/poems/toggle-like", post(toggle_like))
        .route(
            "/poems/{id}",
            get(get_poem).put(update_poem).delete(delete_poem),
        )
        .route("/poems/{id}/read", post(record_read))
}

async fn list_poems(State(state): State<AppState>) -> AppResult<Json<Vec<Poem>>> {
    Ok(Json(state.catalog.list_poems().await?))
}

async fn create_poem(
    State(state): State<AppState>,
    Json(mut poem): Json<NewPoem>,
) -> AppResult<(StatusCode, Json<Poem>)> {
    poem.title = poem.title.trim().to_string();
    if poem.title.is_empty() {
        return Err(AppError::BadRequest("Poem title cannot be empty".into()));
    }

    let created = state.catalog.create_poem(poem).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_poem(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Poem>> {
    state
        .catalog
        .find_poem(&id)
        .await?
        .map(Json)
        .ok_or_else(|| RepositoryError::not_found("Poem", &id).into())
}

async fn update_poem(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut changes): Json<PoemUpdate>,
) -> AppResult<Json<Poem>> {
    if let Some(title) = changes.title.take() {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::BadRequest("Poem title cannot be empty".into()));
        }
        changes.title = Some(title);
    }
    Ok(Json(state.catalog.update_poem(&id, changes).await?))
}

async fn delete_poem(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    if !state.catalog.delete_poem(&id).await? {
        return Err(RepositoryError::not_found("Poem", &id).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_like(
    State(state): State<AppState>,
    Json(req): Json<TogglePoemLike>,
) -> AppResult<Json<ToggleOutcome>> {
    let outcome = engagement::toggle_like(
        state.catalog.as_ref(),
        state.relations.as_ref(),
        SubjectKind::Poem,
        &req.poem_id,
        &req.user_id,
    )
    .await?;
    Ok(Json(outcome))
}

async fn record_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ReadEvent>,
) -> AppResult<(StatusCode, Json<Relation>)> {
    let relation = engagement::record_read(state.relations.as_ref(), &id, &req.user_id).await?;
    Ok((StatusCode::CREATED, Json(relation)))
}
