use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::db::models::User;
use crate::db::RepositoryError;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// `?userId=` on per-user views.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: String,
}

#[derive(Deserialize)]
pub struct CreateUser {
    pub username: String,
}

fn validate_username(raw: &str) -> AppResult<&str> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(AppError::BadRequest("Username cannot be empty".into()));
    }
    if username.chars().count() > 64 {
        return Err(AppError::BadRequest(
            "Username must be 64 characters or less".into(),
        ));
    }
    Ok(username)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
}

async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.catalog.list_users().await?))
}

async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    let username = validate_username(&req.username)?;
    let user = state.catalog.create_user(username).await?;
    tracing::info!("Created user {}", user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<User>> {
    state
        .catalog
        .find_user(&id)
        .await?
        .map(Json)
        .ok_or_else(|| RepositoryError::not_found("User", &id).into())
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CreateUser>,
) -> AppResult<Json<User>> {
    let username = validate_username(&req.username)?;
    let user = state.catalog.update_user(&id, username).await?;
    tracing::info!("Renamed user {}", user.id);
    Ok(Json(user))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    if !state.catalog.delete_user(&id).await? {
        return Err(RepositoryError::not_found("User", &id).into());
    }
    Ok(StatusCode::NO_CONTENT)
}
