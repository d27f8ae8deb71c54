use serde::Serialize;

use crate::catalog::CatalogRepository;
use crate::db::models::Library;
use crate::db::RepositoryError;
use crate::engagement::domain::{
    annotate_poem, dedupe_owners, AuthorWithFlag, PoemWithFlags, RelationKind, SubjectKind,
};
use crate::engagement::RelationStore;

#[derive(Debug, Clone, Serialize)]
pub struct LibraryForUserResponse {
    pub library: Library,
    pub poems: Vec<PoemWithFlags>,
    pub authors: Vec<AuthorWithFlag>,
}

/// A library with every poem flagged for the user and its authors listed once.
/// Poems keep the library's own order.
pub async fn get_library_for_user(
    catalog: &dyn CatalogRepository,
    relations: &dyn RelationStore,
    library_id: &str,
    user_id: &str,
) -> Result<LibraryForUserResponse, RepositoryError> {
    let library = catalog
        .find_library(library_id)
        .await?
        .ok_or_else(|| RepositoryError::not_found("Library", library_id))?;
    let poems = catalog.library_poems(library_id).await?;

    if catalog.find_user(user_id).await?.is_none() {
        return Err(RepositoryError::not_found("User", user_id));
    }
    let liked_poems = relations
        .related_ids(user_id, RelationKind::Liked(SubjectKind::Poem))
        .await?;
    let read_poems = relations.related_ids(user_id, RelationKind::Read).await?;
    let liked_authors = relations
        .related_ids(user_id, RelationKind::Liked(SubjectKind::Author))
        .await?;

    let authors = dedupe_owners(&poems, &liked_authors);
    let poems = poems
        .into_iter()
        .map(|poem| annotate_poem(poem, &liked_poems, &read_poems))
        .collect();

    Ok(LibraryForUserResponse {
        library,
        poems,
        authors,
    })
}
