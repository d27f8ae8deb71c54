use chrono::{Duration, NaiveDate, Utc};
use stanza::catalog::{CatalogRepository, SqliteCatalogRepository};
use stanza::config::FeedConfig;
use stanza::db::models::{NewAuthor, NewLibrary, NewPoem};
use stanza::db::{self, RepositoryError};
use stanza::engagement::{self, RelationKind, RelationStore, SqliteRelationStore, SubjectKind};
use stanza::feed;
use stanza::state::DbPool;
use tempfile::TempDir;

struct Fixture {
    pool: DbPool,
    catalog: SqliteCatalogRepository,
    relations: SqliteRelationStore,
    feed: FeedConfig,
    _temp: TempDir,
}

fn setup() -> Fixture {
    let temp = TempDir::new().unwrap();
    let pool = db::create_pool(&temp.path().join("test.db")).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");

    Fixture {
        catalog: SqliteCatalogRepository::new(pool.clone()),
        relations: SqliteRelationStore::new(pool.clone()),
        pool,
        feed: FeedConfig::default(),
        _temp: temp,
    }
}

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

async fn author(fx: &Fixture, name: &str) -> String {
    fx.catalog
        .create_author(NewAuthor {
            name: name.to_string(),
            ..NewAuthor::default()
        })
        .await
        .unwrap()
        .id
}

async fn poem(fx: &Fixture, title: &str, author_id: Option<&str>) -> String {
    fx.catalog
        .create_poem(NewPoem {
            title: title.to_string(),
            author_id: author_id.map(str::to_string),
            ..NewPoem::default()
        })
        .await
        .unwrap()
        .id
}

async fn library(fx: &Fixture, name: &str) -> String {
    fx.catalog
        .create_library(NewLibrary {
            name: name.to_string(),
            ..NewLibrary::default()
        })
        .await
        .unwrap()
        .id
}

/// Seeds two poems and one featured library for `date`.
async fn seed_home(fx: &Fixture, date: NaiveDate) -> (String, String) {
    let first = poem(fx, "Morning", None).await;
    let second = poem(fx, "Evening", None).await;
    fx.catalog
        .add_curated_poem(date, 2, &second, None)
        .await
        .unwrap();
    fx.catalog
        .add_curated_poem(date, 1, &first, Some("Hope is the thing".to_string()))
        .await
        .unwrap();

    let lib = library(fx, "Featured").await;
    fx.catalog.add_featured_library(date, 1, &lib).await.unwrap();
    (first, second)
}

#[tokio::test]
async fn home_view_fails_for_unseeded_date() {
    let fx = setup();
    let user = fx.catalog.create_user("ann").await.unwrap();
    seed_home(&fx, day("2025-05-01")).await;

    let err = feed::get_home_view(
        &fx.catalog,
        &fx.relations,
        &fx.feed,
        &user.id,
        Some(day("2025-05-02")),
    )
    .await
    .unwrap_err();

    match err {
        RepositoryError::NotFound(msg) => assert!(msg.contains("2025-05-02")),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn home_view_fails_when_only_libraries_are_missing() {
    let fx = setup();
    let user = fx.catalog.create_user("ann").await.unwrap();
    let date = day("2025-05-01");
    let p = poem(&fx, "Alone", None).await;
    fx.catalog.add_curated_poem(date, 1, &p, None).await.unwrap();

    let err = feed::get_home_view(&fx.catalog, &fx.relations, &fx.feed, &user.id, Some(date))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(ref msg) if msg.contains("Featured libraries")));
}

#[tokio::test]
async fn static_view_is_ordered_by_slot() {
    let fx = setup();
    let user = fx.catalog.create_user("ann").await.unwrap();
    let date = day("2025-05-01");
    let (first, second) = seed_home(&fx, date).await;

    let view = feed::get_home_view(&fx.catalog, &fx.relations, &fx.feed, &user.id, Some(date))
        .await
        .unwrap();

    let poems = &view.static_view.poems_of_the_day;
    assert_eq!(poems.len(), 2);
    assert_eq!(poems[0].poem.id, first);
    assert_eq!(poems[0].quote.as_deref(), Some("Hope is the thing"));
    assert_eq!(poems[1].poem.id, second);
    assert_eq!(view.static_view.featured_libraries.len(), 1);
}

#[tokio::test]
async fn empty_history_gives_empty_dynamic_view() {
    let fx = setup();
    let user = fx.catalog.create_user("ann").await.unwrap();
    let date = day("2025-05-01");
    seed_home(&fx, date).await;

    let view = feed::get_home_view(&fx.catalog, &fx.relations, &fx.feed, &user.id, Some(date))
        .await
        .unwrap();
    assert!(view.dynamic_view.recently_read_poems.is_empty());
    assert!(view.dynamic_view.recently_read_authors.is_empty());
}

#[tokio::test]
async fn unknown_user_fails_home_view() {
    let fx = setup();
    let date = day("2025-05-01");
    seed_home(&fx, date).await;

    let err = feed::get_home_view(&fx.catalog, &fx.relations, &fx.feed, "ghost", Some(date))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(ref msg) if msg.contains("ghost")));
}

#[tokio::test]
async fn only_the_seven_most_recent_reads_appear() {
    let fx = setup();
    let user = fx.catalog.create_user("ann").await.unwrap();
    let date = day("2025-05-01");
    seed_home(&fx, date).await;

    let now = Utc::now();
    let mut poem_ids = Vec::new();
    for i in 0..10 {
        let id = poem(&fx, &format!("Poem {}", i), None).await;
        fx.relations
            .add_relation_at(&user.id, &id, RelationKind::Read, now - Duration::hours(10 - i))
            .await
            .unwrap();
        poem_ids.push(id);
    }

    let view = feed::get_home_view(&fx.catalog, &fx.relations, &fx.feed, &user.id, Some(date))
        .await
        .unwrap();

    let recent: Vec<&str> = view
        .dynamic_view
        .recently_read_poems
        .iter()
        .map(|p| p.poem.id.as_str())
        .collect();
    let expected: Vec<&str> = poem_ids.iter().rev().take(7).map(String::as_str).collect();
    assert_eq!(recent, expected);
    assert!(view.dynamic_view.recently_read_poems.iter().all(|p| p.user_read));
}

#[tokio::test]
async fn recent_poems_carry_liked_flag() {
    let fx = setup();
    let user = fx.catalog.create_user("ann").await.unwrap();
    let date = day("2025-05-01");
    seed_home(&fx, date).await;

    let liked = poem(&fx, "Liked", None).await;
    let plain = poem(&fx, "Plain", None).await;
    engagement::record_read(&fx.relations, &liked, &user.id).await.unwrap();
    engagement::record_read(&fx.relations, &plain, &user.id).await.unwrap();
    engagement::toggle_like(&fx.catalog, &fx.relations, SubjectKind::Poem, &liked, &user.id)
        .await
        .unwrap();

    let view = feed::get_home_view(&fx.catalog, &fx.relations, &fx.feed, &user.id, Some(date))
        .await
        .unwrap();
    for entry in &view.dynamic_view.recently_read_poems {
        assert_eq!(entry.user_liked, entry.poem.id == liked);
    }
}

#[tokio::test]
async fn repeated_reads_collapse_to_latest() {
    let fx = setup();
    let user = fx.catalog.create_user("ann").await.unwrap();
    let date = day("2025-05-01");
    seed_home(&fx, date).await;

    let now = Utc::now();
    let a = poem(&fx, "A", None).await;
    let b = poem(&fx, "B", None).await;
    for (id, hours_ago) in [(&a, 3), (&b, 2), (&a, 1)] {
        fx.relations
            .add_relation_at(&user.id, id, RelationKind::Read, now - Duration::hours(hours_ago))
            .await
            .unwrap();
    }

    let view = feed::get_home_view(&fx.catalog, &fx.relations, &fx.feed, &user.id, Some(date))
        .await
        .unwrap();
    let recent: Vec<&str> = view
        .dynamic_view
        .recently_read_poems
        .iter()
        .map(|p| p.poem.id.as_str())
        .collect();
    assert_eq!(recent, vec![a.as_str(), b.as_str()]);
}

#[tokio::test]
async fn two_poems_by_one_author_yield_one_author_entry() {
    let fx = setup();
    let user = fx.catalog.create_user("ann").await.unwrap();
    let date = day("2025-05-01");
    seed_home(&fx, date).await;

    let a1 = author(&fx, "Dickinson").await;
    let p1 = poem(&fx, "P1", Some(&a1)).await;
    let p2 = poem(&fx, "P2", Some(&a1)).await;
    let now = Utc::now();
    fx.relations
        .add_relation_at(&user.id, &p1, RelationKind::Read, now - Duration::days(2))
        .await
        .unwrap();
    fx.relations
        .add_relation_at(&user.id, &p2, RelationKind::Read, now)
        .await
        .unwrap();
    engagement::toggle_like(&fx.catalog, &fx.relations, SubjectKind::Author, &a1, &user.id)
        .await
        .unwrap();

    let view = feed::get_home_view(&fx.catalog, &fx.relations, &fx.feed, &user.id, Some(date))
        .await
        .unwrap();

    let authors = &view.dynamic_view.recently_read_authors;
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0].item.id, a1);
    assert!(authors[0].user_liked);
}

#[tokio::test]
async fn recent_authors_follow_read_recency() {
    let fx = setup();
    let user = fx.catalog.create_user("ann").await.unwrap();
    let date = day("2025-05-01");
    seed_home(&fx, date).await;

    let older = author(&fx, "Older").await;
    let newer = author(&fx, "Newer").await;
    let p_old = poem(&fx, "Old", Some(&older)).await;
    let p_new = poem(&fx, "New", Some(&newer)).await;
    let anonymous = poem(&fx, "Anon", None).await;
    let now = Utc::now();
    for (id, hours_ago) in [(&p_old, 5), (&anonymous, 3), (&p_new, 1)] {
        fx.relations
            .add_relation_at(&user.id, id, RelationKind::Read, now - Duration::hours(hours_ago))
            .await
            .unwrap();
    }

    let view = feed::get_home_view(&fx.catalog, &fx.relations, &fx.feed, &user.id, Some(date))
        .await
        .unwrap();
    let ids: Vec<&str> = view
        .dynamic_view
        .recently_read_authors
        .iter()
        .map(|a| a.item.id.as_str())
        .collect();
    assert_eq!(ids, vec![newer.as_str(), older.as_str()]);
}

#[tokio::test]
async fn library_view_keeps_order_and_dedupes_authors() {
    let fx = setup();
    let user = fx.catalog.create_user("ann").await.unwrap();
    let a1 = author(&fx, "A1").await;
    let a2 = author(&fx, "A2").await;
    let p1 = poem(&fx, "P1", Some(&a1)).await;
    let p2 = poem(&fx, "P2", Some(&a1)).await;
    let p3 = poem(&fx, "P3", Some(&a2)).await;
    let lib = library(&fx, "L").await;
    for p in [&p1, &p2, &p3] {
        fx.catalog.add_poem_to_library(&lib, p).await.unwrap();
    }

    engagement::record_read(&fx.relations, &p3, &user.id).await.unwrap();
    engagement::toggle_like(&fx.catalog, &fx.relations, SubjectKind::Poem, &p2, &user.id)
        .await
        .unwrap();
    engagement::toggle_like(&fx.catalog, &fx.relations, SubjectKind::Author, &a2, &user.id)
        .await
        .unwrap();

    let view = feed::get_library_for_user(&fx.catalog, &fx.relations, &lib, &user.id)
        .await
        .unwrap();

    let poems: Vec<(&str, bool, bool)> = view
        .poems
        .iter()
        .map(|p| (p.poem.id.as_str(), p.user_liked, p.user_read))
        .collect();
    assert_eq!(
        poems,
        vec![
            (p1.as_str(), false, false),
            (p2.as_str(), true, false),
            (p3.as_str(), false, true),
        ]
    );

    let authors: Vec<(&str, bool)> = view
        .authors
        .iter()
        .map(|a| (a.item.id.as_str(), a.user_liked))
        .collect();
    assert_eq!(authors, vec![(a1.as_str(), false), (a2.as_str(), true)]);
}

#[tokio::test]
async fn library_view_unknown_library_or_user() {
    let fx = setup();
    let user = fx.catalog.create_user("ann").await.unwrap();
    let lib = library(&fx, "L").await;

    let err = feed::get_library_for_user(&fx.catalog, &fx.relations, "nope", &user.id)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(ref msg) if msg.contains("Library")));

    let err = feed::get_library_for_user(&fx.catalog, &fx.relations, &lib, "ghost")
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(ref msg) if msg.contains("User")));
}

#[tokio::test]
async fn author_view_lists_read_poems() {
    let fx = setup();
    let user = fx.catalog.create_user("ann").await.unwrap();
    let a1 = author(&fx, "Whitman").await;
    let p1 = poem(&fx, "Song", Some(&a1)).await;
    let p2 = poem(&fx, "Leaves", Some(&a1)).await;
    let elsewhere = poem(&fx, "Other", None).await;

    engagement::record_read(&fx.relations, &p2, &user.id).await.unwrap();
    engagement::record_read(&fx.relations, &elsewhere, &user.id).await.unwrap();

    let view = feed::get_author_for_user(&fx.catalog, &fx.relations, &a1, &user.id)
        .await
        .unwrap();
    assert!(!view.liked_by_user);
    assert_eq!(view.poems.len(), 2);
    assert_eq!(view.read_poems, vec![p2.clone()]);
    assert!(!view.read_poems.contains(&p1));

    engagement::toggle_like(&fx.catalog, &fx.relations, SubjectKind::Author, &a1, &user.id)
        .await
        .unwrap();
    let view = feed::get_author_for_user(&fx.catalog, &fx.relations, &a1, &user.id)
        .await
        .unwrap();
    assert!(view.liked_by_user);
}

#[tokio::test]
async fn comments_carry_counts_and_viewer_flag() {
    let fx = setup();
    let ann = fx.catalog.create_user("ann").await.unwrap();
    let bob = fx.catalog.create_user("bob").await.unwrap();
    let p = poem(&fx, "Ode", None).await;
    let c1 = fx.catalog.create_comment(&ann.id, &p, "lovely").await.unwrap();
    let c2 = fx.catalog.create_comment(&bob.id, &p, "indeed").await.unwrap();

    for user in [&ann.id, &bob.id] {
        engagement::toggle_like(&fx.catalog, &fx.relations, SubjectKind::Comment, &c1.id, user)
            .await
            .unwrap();
    }
    engagement::toggle_like(&fx.catalog, &fx.relations, SubjectKind::Comment, &c2.id, &bob.id)
        .await
        .unwrap();

    let comments = feed::comments_for_poem(&fx.catalog, &fx.relations, &p, Some(&ann.id))
        .await
        .unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].comment.id, c1.id);
    assert_eq!(comments[0].likes_count, 2);
    assert!(comments[0].user_liked);
    assert_eq!(comments[1].likes_count, 1);
    assert!(!comments[1].user_liked);

    let anonymous = feed::comments_for_poem(&fx.catalog, &fx.relations, &p, None)
        .await
        .unwrap();
    assert!(anonymous.iter().all(|c| !c.user_liked));
}

#[tokio::test]
async fn authors_outside_the_recent_window_are_left_out() {
    let fx = setup();
    let user = fx.catalog.create_user("ann").await.unwrap();
    let date = day("2025-05-01");
    seed_home(&fx, date).await;

    let forgotten = author(&fx, "Forgotten").await;
    let old_poem = poem(&fx, "Old", Some(&forgotten)).await;
    let now = Utc::now();
    fx.relations
        .add_relation_at(&user.id, &old_poem, RelationKind::Read, now - Duration::days(30))
        .await
        .unwrap();
    for i in 0..7 {
        let id = poem(&fx, &format!("Fresh {}", i), None).await;
        fx.relations
            .add_relation_at(&user.id, &id, RelationKind::Read, now - Duration::minutes(i))
            .await
            .unwrap();
    }

    let view = feed::get_home_view(&fx.catalog, &fx.relations, &fx.feed, &user.id, Some(date))
        .await
        .unwrap();
    assert_eq!(view.dynamic_view.recently_read_poems.len(), 7);
    assert!(view
        .dynamic_view
        .recently_read_poems
        .iter()
        .all(|p| p.poem.id != old_poem));
    assert!(view.dynamic_view.recently_read_authors.is_empty());
}

#[tokio::test]
async fn home_view_handles_a_very_long_read_history() {
    let fx = setup();
    let user = fx.catalog.create_user("ann").await.unwrap();
    let date = day("2025-05-01");
    seed_home(&fx, date).await;

    // More distinct poems than SQLite accepts as bound variables in one statement
    let total = 33_000;
    {
        let mut conn = fx.pool.get().unwrap();
        let tx = conn.transaction().unwrap();
        {
            let mut poem_stmt = tx
                .prepare("INSERT INTO poems (id, title, created_at) VALUES (?1, ?2, ?3)")
                .unwrap();
            let mut read_stmt = tx
                .prepare(
                    "INSERT INTO user_read_poems (id, user_id, item_id, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .unwrap();
            let start = Utc::now() - Duration::days(365);
            for i in 0..total {
                let poem_id = format!("bulk-{:05}", i);
                let at = db::format_timestamp(&(start + Duration::minutes(i)));
                poem_stmt
                    .execute(rusqlite::params![poem_id, format!("Bulk {}", i), at])
                    .unwrap();
                read_stmt
                    .execute(rusqlite::params![format!("read-{:05}", i), user.id, poem_id, at])
                    .unwrap();
            }
        }
        tx.commit().unwrap();
    }

    let view = feed::get_home_view(&fx.catalog, &fx.relations, &fx.feed, &user.id, Some(date))
        .await
        .unwrap();

    let recent: Vec<String> = view
        .dynamic_view
        .recently_read_poems
        .iter()
        .map(|p| p.poem.id.clone())
        .collect();
    let expected: Vec<String> = (total - 7..total).rev().map(|i| format!("bulk-{:05}", i)).collect();
    assert_eq!(recent, expected);
}
