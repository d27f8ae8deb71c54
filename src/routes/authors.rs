use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::db::models::{Author, NewAuthor};
use crate::db::RepositoryError;
use crate::engagement::{self, SubjectKind, ToggleOutcome};
use crate::error::{AppError, AppResult};
use crate::feed::{self, AuthorForUserResponse};
use crate::routes::users::UserQuery;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleAuthorLike {
    pub user_id: String,
    pub author_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/authors", get(list_authors).post(create_author))
        .route("/authors/toggle-like", post(toggle_like))
        .route("/authors/for-user/{author_id}", get(author_for_user))
        .route("/authors/{id}", get(get_author))
}

async fn list_authors(State(state): State<AppState>) -> AppResult<Json<Vec<Author>>> {
    Ok(Json(state.catalog.list_authors().await?))
}

async fn create_author(
    State(state): State<AppState>,
    Json(mut author): Json<NewAuthor>,
) -> AppResult<(StatusCode, Json<Author>)> {
    author.name = author.name.trim().to_string();
    if author.name.is_empty() {
        return Err(AppError::BadRequest("Author name cannot be empty".into()));
    }

    let created = state.catalog.create_author(author).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_author(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Author>> {
    state
        .catalog
        .find_author(&id)
        .await?
        .map(Json)
        .ok_or_else(|| RepositoryError::not_found("Author", &id).into())
}

async fn toggle_like(
    State(state): State<AppState>,
    Json(req): Json<ToggleAuthorLike>,
) -> AppResult<Json<ToggleOutcome>> {
    let outcome = engagement::toggle_like(
        state.catalog.as_ref(),
        state.relations.as_ref(),
        SubjectKind::Author,
        &req.author_id,
        &req.user_id,
    )
    .await?;
    Ok(Json(outcome))
}

async fn author_for_user(
    State(state): State<AppState>,
    Path(author_id): Path<String>,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<AuthorForUserResponse>> {
    let view = feed::get_author_for_user(
        state.catalog.as_ref(),
        state.relations.as_ref(),
        &author_id,
        &query.user_id,
    )
    .await?;
    Ok(Json(view))
}
