use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::db::models::Comment;
use crate::db::RepositoryError;
use crate::engagement::{self, CommentWithLikes, SubjectKind, ToggleOutcome};
use crate::error::{AppError, AppResult};
use crate::feed;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleCommentLike {
    pub user_id: String,
    pub comment_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateComment {
    pub user_id: String,
    pub poem_id: String,
    pub text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerQuery {
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
pub struct EditComment {
    pub text: String,
}

fn validate_text(raw: &str) -> AppResult<&str> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest("Comment cannot be empty".into()));
    }
    if text.chars().count() > 2000 {
        return Err(AppError::BadRequest(
            "Comment must be 2000 characters or less".into(),
        ));
    }
    Ok(text)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/comments", post(create_comment))
        .route("/comments/toggle-like", post(toggle_like))
        .route("/comments/poem/{poem_id}", get(comments_for_poem))
        .route(
            "/comments/{id}",
            get(get_comment).put(update_comment).delete(delete_comment),
        )
}

async fn create_comment(
    State(state): State<AppState>,
    Json(req): Json<CreateComment>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    let text = validate_text(&req.text)?;
    let comment = state
        .catalog
        .create_comment(&req.user_id, &req.poem_id, text)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn get_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Comment>> {
    state
        .catalog
        .find_comment(&id)
        .await?
        .map(Json)
        .ok_or_else(|| RepositoryError::not_found("Comment", &id).into())
}

async fn update_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<EditComment>,
) -> AppResult<Json<Comment>> {
    let text = validate_text(&req.text)?;
    Ok(Json(state.catalog.update_comment(&id, text).await?))
}

async fn delete_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    if !state.catalog.delete_comment(&id).await? {
        return Err(RepositoryError::not_found("Comment", &id).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_like(
    State(state): State<AppState>,
    Json(req): Json<ToggleCommentLike>,
) -> AppResult<Json<ToggleOutcome>> {
    let outcome = engagement::toggle_like(
        state.catalog.as_ref(),
        state.relations.as_ref(),
        SubjectKind::Comment,
        &req.comment_id,
        &req.user_id,
    )
    .await?;
    Ok(Json(outcome))
}

async fn comments_for_poem(
    State(state): State<AppState>,
    Path(poem_id): Path<String>,
    Query(query): Query<ViewerQuery>,
) -> AppResult<Json<Vec<CommentWithLikes>>> {
    let comments = feed::comments_for_poem(
        state.catalog.as_ref(),
        state.relations.as_ref(),
        &poem_id,
        query.user_id.as_deref(),
    )
    .await?;
    Ok(Json(comments))
}
