pub mod domain;
pub mod reads;
pub mod repository;
pub mod toggle;

pub use domain::{
    dedupe_owners, AuthorWithFlag, CommentWithLikes, PoemWithFlags, Relation, RelationKind,
    SubjectKind, ToggleOutcome, WithLike,
};
pub use reads::record_read;
pub use repository::{DynRelationStore, RelationStore, SqliteRelationStore};
pub use toggle::toggle_like;
