use std::collections::HashSet;

use crate::catalog::CatalogRepository;
use crate::db::RepositoryError;
use crate::engagement::domain::{CommentWithLikes, RelationKind, SubjectKind};
use crate::engagement::RelationStore;

/// Comments on a poem, oldest first, with like counts and the viewer's flag.
pub async fn comments_for_poem(
    catalog: &dyn CatalogRepository,
    relations: &dyn RelationStore,
    poem_id: &str,
    user_id: Option<&str>,
) -> Result<Vec<CommentWithLikes>, RepositoryError> {
    let comments = catalog.comments_for_poem(poem_id).await?;
    let kind = RelationKind::Liked(SubjectKind::Comment);

    let liked = match user_id {
        Some(user_id) => relations.related_ids(user_id, kind).await?,
        None => HashSet::new(),
    };

    let ids: Vec<String> = comments.iter().map(|c| c.id.clone()).collect();
    let counts = relations.counts_for_items(&ids, kind).await?;

    let annotated = comments
        .into_iter()
        .map(|comment| CommentWithLikes {
            likes_count: counts.get(&comment.id).copied().unwrap_or(0),
            user_liked: liked.contains(&comment.id),
            comment,
        })
        .collect();

    Ok(annotated)
}
