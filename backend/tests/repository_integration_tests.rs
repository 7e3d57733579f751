//! Postgres-backed repository tests. They need a disposable database:
//!
//! ```text
//! DATABASE_URL=postgres://... cargo test --test repository_integration_tests -- --ignored
//! ```

use quillpost::{
    models::{BlogSearch, CreateBlogRequest, NewUser, UpdateBlogRequest, UserId},
    repository::{BlogStore, PostgresRepository, StoreError, UserStore},
};
use sqlx::PgPool;

// --- Test Context and Setup ---

struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");
        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        PostgresRepository::new(pool.clone())
            .initialize()
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

/// Usernames are unique per run so tests can share one database.
fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

async fn create_user(repo: &PostgresRepository, prefix: &str) -> UserId {
    repo.create_user(NewUser {
        username: unique(prefix),
        password_hash: "$argon2id$placeholder".into(),
        first_name: "Test".into(),
        last_name: "User".into(),
    })
    .await
    .expect("user insert")
    .id
}

// --- Users & roles ---

#[tokio::test]
#[ignore]
async fn credential_lookup_and_duplicate_usernames() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let username = unique("dup");

    let new_user = NewUser {
        username: username.clone(),
        password_hash: "$argon2id$hash".into(),
        first_name: "A".into(),
        last_name: "B".into(),
    };
    let created = repo.create_user(new_user.clone()).await.unwrap();

    let credential = repo.lookup_credential(&username).await.unwrap().unwrap();
    assert_eq!(credential.user_id, created.id);
    assert_eq!(credential.password_hash, "$argon2id$hash");

    assert!(matches!(
        repo.create_user(new_user).await,
        Err(StoreError::Conflict(_))
    ));
    assert!(repo.lookup_credential(&unique("ghost")).await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
async fn permissions_are_the_union_of_roles() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let id = create_user(&repo, "perm").await;

    assert!(repo.permissions_for(id).await.unwrap().is_empty());

    repo.assign_roles(id, &["viewer".into(), "editor".into()])
        .await
        .unwrap();
    // Re-granting is a no-op.
    repo.assign_roles(id, &["viewer".into()]).await.unwrap();

    let permissions = repo.permissions_for(id).await.unwrap();
    assert_eq!(permissions.len(), 5);
    assert!(permissions.contains("read_user"));
    assert!(permissions.contains("delete_blog"));
    assert!(!permissions.contains("update_user"));
}

#[tokio::test]
#[ignore]
async fn unknown_role_grants_nothing() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let id = create_user(&repo, "unknown-role").await;

    let result = repo
        .assign_roles(id, &["viewer".into(), "owner".into()])
        .await;
    assert!(matches!(result, Err(StoreError::UnknownRole(name)) if name == "owner"));
    assert!(repo.permissions_for(id).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore]
async fn seeded_roles_exist() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let admin = repo.get_role_by_name("admin").await.unwrap().unwrap();
    assert_eq!(admin.permissions.len(), 8);
    assert!(repo.get_role_by_name("viewer").await.unwrap().is_some());
    assert!(repo.get_role_by_name("owner").await.unwrap().is_none());
}

// --- Blogs ---

#[tokio::test]
#[ignore]
async fn blog_lifecycle_is_author_only() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let author = create_user(&repo, "author").await;
    let other = create_user(&repo, "other").await;

    let blog = repo
        .create_blog(
            author,
            CreateBlogRequest {
                title: "Hello".into(),
                content: "World".into(),
                tags: Some("intro".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(blog.user_id, author);

    let update = UpdateBlogRequest {
        title: Some("Hi".into()),
        ..Default::default()
    };
    assert!(repo
        .update_blog(blog.id, other, update.clone())
        .await
        .unwrap()
        .is_none());
    let updated = repo.update_blog(blog.id, author, update).await.unwrap().unwrap();
    assert_eq!(updated.title, "Hi");
    assert_eq!(updated.content, "World");
    assert_eq!(updated.tags.as_deref(), Some("intro"));

    assert!(!repo.delete_blog(blog.id, other).await.unwrap());
    assert!(repo.delete_blog(blog.id, author).await.unwrap());
    assert!(repo.get_blog(blog.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
async fn search_filters_and_pages() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let author = create_user(&repo, "search").await;

    for title in ["Rust ownership", "Borrowing", "rust async", "Gardening"] {
        repo.create_blog(
            author,
            CreateBlogRequest {
                title: title.into(),
                content: "body".into(),
                tags: None,
            },
        )
        .await
        .unwrap();
    }

    let search = |text: Option<&str>, offset, limit| BlogSearch {
        author: Some(author),
        text: text.map(str::to_string),
        offset,
        limit,
    };

    let rust = repo.search_blogs(&search(Some("RUST"), 0, 20)).await.unwrap();
    assert_eq!(rust.len(), 2);
    assert_eq!(rust[0].title, "rust async");

    let page = repo.search_blogs(&search(None, 1, 2)).await.unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].title, "rust async");
    assert_eq!(page[1].title, "Borrowing");
}

#[tokio::test]
#[ignore]
async fn search_matches_wildcard_characters_literally() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let author = create_user(&repo, "wildcard").await;

    for title in ["100% rust", "plain post", "snake_case", r"C:\temp"] {
        repo.create_blog(
            author,
            CreateBlogRequest {
                title: title.into(),
                content: "body".into(),
                tags: None,
            },
        )
        .await
        .unwrap();
    }

    let titles = |text: &str| {
        let search = BlogSearch {
            author: Some(author),
            text: Some(text.to_string()),
            offset: 0,
            limit: 20,
        };
        let repo = repo.clone();
        async move {
            repo.search_blogs(&search)
                .await
                .unwrap()
                .into_iter()
                .map(|b| b.title)
                .collect::<Vec<_>>()
        }
    };

    assert_eq!(titles("%").await, vec!["100% rust"]);
    assert_eq!(titles("_").await, vec!["snake_case"]);
    assert_eq!(titles(r"\").await, vec![r"C:\temp"]);
}
