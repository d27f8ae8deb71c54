use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashSet;

use crate::catalog::CatalogRepository;
use crate::config::FeedConfig;
use crate::db::models::{Library, Poem};
use crate::db::RepositoryError;
use crate::engagement::domain::{
    annotate_poem, dedupe_owners, AuthorWithFlag, PoemWithFlags, RelationKind, SubjectKind,
};
use crate::engagement::RelationStore;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeResponse {
    pub static_view: StaticView,
    pub dynamic_view: DynamicView,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticView {
    pub poems_of_the_day: Vec<PoemOfTheDay>,
    pub featured_libraries: Vec<Library>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PoemOfTheDay {
    pub poem: Poem,
    pub quote: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicView {
    pub recently_read_poems: Vec<PoemWithFlags>,
    pub recently_read_authors: Vec<AuthorWithFlag>,
}

/// Compose the home page for `user_id` on `date` (today, UTC, when absent).
///
/// A date without curated poems or featured libraries is a `NotFound`; there is
/// no fallback to a neighbouring day. A user without read history gets an empty
/// dynamic view.
pub async fn get_home_view(
    catalog: &dyn CatalogRepository,
    relations: &dyn RelationStore,
    feed: &FeedConfig,
    user_id: &str,
    date: Option<NaiveDate>,
) -> Result<HomeResponse, RepositoryError> {
    let date = date.unwrap_or_else(|| Utc::now().date_naive());

    let static_view = static_view(catalog, feed, date).await?;
    let dynamic_view = dynamic_view(catalog, relations, feed, user_id).await?;

    tracing::debug!(
        "Home view for {} on {}: {} recent poems, {} recent authors",
        user_id,
        date,
        dynamic_view.recently_read_poems.len(),
        dynamic_view.recently_read_authors.len()
    );

    Ok(HomeResponse {
        static_view,
        dynamic_view,
    })
}

async fn static_view(
    catalog: &dyn CatalogRepository,
    feed: &FeedConfig,
    date: NaiveDate,
) -> Result<StaticView, RepositoryError> {
    let poems = catalog.curated_poems(date).await?;
    if poems.is_empty() {
        return Err(RepositoryError::NotFound(format!(
            "Home poems not set for date {}",
            date
        )));
    }

    let libraries = catalog.curated_libraries(date).await?;
    if libraries.is_empty() {
        return Err(RepositoryError::NotFound(format!(
            "Featured libraries not set for date {}",
            date
        )));
    }

    if poems.len() != feed.poems_per_day {
        tracing::warn!(
            "Expected {} home poems for {}, found {}",
            feed.poems_per_day,
            date,
            poems.len()
        );
    }
    if libraries.len() != feed.libraries_per_day {
        tracing::warn!(
            "Expected {} featured libraries for {}, found {}",
            feed.libraries_per_day,
            date,
            libraries.len()
        );
    }

    Ok(StaticView {
        poems_of_the_day: poems
            .into_iter()
            .map(|slot| PoemOfTheDay {
                poem: slot.content,
                quote: slot.annotation,
            })
            .collect(),
        featured_libraries: libraries.into_iter().map(|slot| slot.content).collect(),
    })
}

async fn dynamic_view(
    catalog: &dyn CatalogRepository,
    relations: &dyn RelationStore,
    feed: &FeedConfig,
    user_id: &str,
) -> Result<DynamicView, RepositoryError> {
    if catalog.find_user(user_id).await?.is_none() {
        return Err(RepositoryError::not_found("User", user_id));
    }

    // Newest read per poem, capped in SQL
    let reads = relations
        .latest_per_item(user_id, RelationKind::Read, feed.recent_reads_limit)
        .await?;
    if reads.is_empty() {
        return Ok(DynamicView::default());
    }

    let liked_poems = relations
        .related_ids(user_id, RelationKind::Liked(SubjectKind::Poem))
        .await?;
    let liked_authors = relations
        .related_ids(user_id, RelationKind::Liked(SubjectKind::Author))
        .await?;

    let poem_ids: Vec<String> = reads.into_iter().map(|r| r.item_id).collect();
    let mut poems = catalog.poems_by_ids(&poem_ids).await?;
    let recent: Vec<Poem> = poem_ids
        .iter()
        .filter_map(|id| poems.remove(id))
        .collect();

    let recently_read_authors = dedupe_owners(&recent, &liked_authors);
    let read_ids: HashSet<String> = poem_ids.into_iter().collect();
    let recently_read_poems = recent
        .into_iter()
        .map(|poem| annotate_poem(poem, &liked_poems, &read_ids))
        .collect();

    Ok(DynamicView {
        recently_read_poems,
        recently_read_authors,
    })
}
