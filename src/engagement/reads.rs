use crate::db::RepositoryError;
use crate::engagement::domain::{Relation, RelationKind};
use crate::engagement::repository::RelationStore;

/// Append a read event to the user's history.
pub async fn record_read(
    relations: &dyn RelationStore,
    poem_id: &str,
    user_id: &str,
) -> Result<Relation, RepositoryError> {
    let relation = relations
        .add_relation(user_id, poem_id, RelationKind::Read)
        .await?;
    tracing::debug!("Poem {} read by {}", poem_id, user_id);
    Ok(relation)
}
