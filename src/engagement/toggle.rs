use crate::catalog::CatalogRepository;
use crate::db::RepositoryError;
use crate::engagement::domain::{RelationKind, SubjectKind, ToggleOutcome};
use crate::engagement::repository::RelationStore;

/// Flip the user's like on a subject of any kind.
///
/// Subject and user are resolved first, so an unknown id fails with `NotFound`
/// before anything is written. `likes_count` is read after the mutation.
pub async fn toggle_like(
    catalog: &dyn CatalogRepository,
    relations: &dyn RelationStore,
    subject: SubjectKind,
    subject_id: &str,
    user_id: &str,
) -> Result<ToggleOutcome, RepositoryError> {
    if !catalog.exists(subject, subject_id).await? {
        return Err(RepositoryError::not_found(subject.label(), subject_id));
    }
    if catalog.find_user(user_id).await?.is_none() {
        return Err(RepositoryError::not_found("User", user_id));
    }

    let kind = RelationKind::Liked(subject);
    let liked = if relations.has_relation(user_id, subject_id, kind).await? {
        relations.remove_relation(user_id, subject_id, kind).await?;
        false
    } else {
        relations.add_relation(user_id, subject_id, kind).await?;
        true
    };

    let likes_count = relations.count_for_item(subject_id, kind).await?;
    tracing::debug!(
        "{} {} like toggled by {}: liked={} count={}",
        subject,
        subject_id,
        user_id,
        liked,
        likes_count
    );

    Ok(ToggleOutcome { liked, likes_count })
}
