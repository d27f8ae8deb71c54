// Domain types - pure, no storage side effects
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::db::models::{Author, Comment, Poem};

/// Content entity a user can be related to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Poem,
    Author,
    Comment,
}

impl SubjectKind {
    /// Catalog table holding entities of this kind.
    pub fn table(self) -> &'static str {
        match self {
            SubjectKind::Poem => "poems",
            SubjectKind::Author => "authors",
            SubjectKind::Comment => "comments",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SubjectKind::Poem => "Poem",
            SubjectKind::Author => "Author",
            SubjectKind::Comment => "Comment",
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Discriminates the relation tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "relation", content = "subject", rename_all = "snake_case")]
pub enum RelationKind {
    /// At most one per (user, item); existence is the "liked" flag.
    Liked(SubjectKind),
    /// Read history; repeats allowed.
    Read,
}

impl RelationKind {
    pub fn subject(self) -> SubjectKind {
        match self {
            RelationKind::Liked(subject) => subject,
            RelationKind::Read => SubjectKind::Poem,
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            RelationKind::Liked(SubjectKind::Poem) => "user_liked_poems",
            RelationKind::Liked(SubjectKind::Author) => "user_liked_authors",
            RelationKind::Liked(SubjectKind::Comment) => "user_liked_comments",
            RelationKind::Read => "user_read_poems",
        }
    }

    /// Whether the store keeps a single relation per (user, item).
    pub fn is_unique(self) -> bool {
        matches!(self, RelationKind::Liked(_))
    }
}

/// A timestamped association between a user and a content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub id: String,
    pub user_id: String,
    pub item_id: String,
    pub kind: RelationKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleOutcome {
    pub liked: bool,
    pub likes_count: i64,
}

/// An entity annotated with whether the requesting user likes it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithLike<T> {
    #[serde(flatten)]
    pub item: T,
    pub user_liked: bool,
}

pub type AuthorWithFlag = WithLike<Author>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoemWithFlags {
    #[serde(flatten)]
    pub poem: Poem,
    pub user_liked: bool,
    pub user_read: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentWithLikes {
    #[serde(flatten)]
    pub comment: Comment,
    pub likes_count: i64,
    pub user_liked: bool,
}

pub trait Identified {
    fn id(&self) -> &str;
}

impl Identified for Author {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Poem {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Content item that may carry a secondary owning entity.
pub trait HasOwner {
    type Owner: Identified + Clone;

    fn owner(&self) -> Option<&Self::Owner>;
}

impl HasOwner for Poem {
    type Owner = Author;

    fn owner(&self) -> Option<&Author> {
        self.author.as_ref()
    }
}

/// One entry per distinct owner, in first-occurrence order, flagged by `liked`.
/// Items without an owner are skipped.
pub fn dedupe_owners<'a, T, I>(items: I, liked: &HashSet<String>) -> Vec<WithLike<T::Owner>>
where
    T: HasOwner + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut seen: HashSet<&str> = HashSet::new();
    let mut owners = Vec::new();

    for owner in items.into_iter().filter_map(|item| item.owner()) {
        if seen.insert(owner.id()) {
            owners.push(WithLike {
                item: owner.clone(),
                user_liked: liked.contains(owner.id()),
            });
        }
    }

    owners
}

pub fn annotate_poem(
    poem: Poem,
    liked: &HashSet<String>,
    read: &HashSet<String>,
) -> PoemWithFlags {
    let user_liked = liked.contains(&poem.id);
    let user_read = read.contains(&poem.id);
    PoemWithFlags {
        poem,
        user_liked,
        user_read,
    }
}
