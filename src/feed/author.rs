use serde::Serialize;

use crate::catalog::CatalogRepository;
use crate::db::models::{Author, Poem};
use crate::db::RepositoryError;
use crate::engagement::domain::{RelationKind, SubjectKind};
use crate::engagement::RelationStore;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorForUserResponse {
    pub author: Author,
    pub poems: Vec<Poem>,
    pub liked_by_user: bool,
    /// Ids of the author's poems the user has read, in the author's poem order.
    pub read_poems: Vec<String>,
}

pub async fn get_author_for_user(
    catalog: &dyn CatalogRepository,
    relations: &dyn RelationStore,
    author_id: &str,
    user_id: &str,
) -> Result<AuthorForUserResponse, RepositoryError> {
    let author = catalog
        .find_author(author_id)
        .await?
        .ok_or_else(|| RepositoryError::not_found("Author", author_id))?;
    let poems = catalog.author_poems(author_id).await?;

    if catalog.find_user(user_id).await?.is_none() {
        return Err(RepositoryError::not_found("User", user_id));
    }
    let liked_by_user = relations
        .has_relation(user_id, author_id, RelationKind::Liked(SubjectKind::Author))
        .await?;
    let read = relations.related_ids(user_id, RelationKind::Read).await?;

    let read_poems = poems
        .iter()
        .filter(|poem| read.contains(&poem.id))
        .map(|poem| poem.id.clone())
        .collect();

    Ok(AuthorForUserResponse {
        author,
        poems,
        liked_by_user,
        read_poems,
    })
}
