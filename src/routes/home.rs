use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::db::models::{CuratedSlot, Library, Poem};
use crate::error::AppResult;
use crate::feed::{self, HomeResponse};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeViewQuery {
    pub user_id: String,
    pub date: Option<NaiveDate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CuratedPoemRequest {
    pub view_date: NaiveDate,
    pub order: i64,
    pub poem_id: String,
    #[serde(default)]
    pub quote: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturedLibraryRequest {
    pub view_date: NaiveDate,
    pub order: i64,
    pub library_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/home/view", get(home_view))
        .route("/home/poems", post(add_curated_poem))
        .route("/home/libraries", post(add_featured_library))
}

async fn home_view(
    State(state): State<AppState>,
    Query(query): Query<HomeViewQuery>,
) -> AppResult<Json<HomeResponse>> {
    let view = feed::get_home_view(
        state.catalog.as_ref(),
        state.relations.as_ref(),
        &state.config.feed,
        &query.user_id,
        query.date,
    )
    .await?;
    Ok(Json(view))
}

async fn add_curated_poem(
    State(state): State<AppState>,
    Json(req): Json<CuratedPoemRequest>,
) -> AppResult<(StatusCode, Json<CuratedSlot<Poem>>)> {
    let slot = state
        .catalog
        .add_curated_poem(req.view_date, req.order, &req.poem_id, req.quote)
        .await?;
    tracing::info!("Home poem slot {} set for {}", slot.order, slot.view_date);
    Ok((StatusCode::CREATED, Json(slot)))
}

async fn add_featured_library(
    State(state): State<AppState>,
    Json(req): Json<FeaturedLibraryRequest>,
) -> AppResult<(StatusCode, Json<CuratedSlot<Library>>)> {
    let slot = state
        .catalog
        .add_featured_library(req.view_date, req.order, &req.library_id)
        .await?;
    tracing::info!(
        "Featured library slot {} set for {}",
        slot.order,
        slot.view_date
    );
    Ok((StatusCode::CREATED, Json(slot)))
}
