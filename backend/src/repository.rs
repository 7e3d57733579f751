use crate::auth::PermissionSet;
use crate::models::{
    Blog, BlogSearch, CreateBlogRequest, Credential, NewUser, Role, UpdateBlogRequest, User,
    UserId,
};
use async_trait::async_trait;
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::sync::Arc;
use thiserror::Error;

/// StoreError
///
/// Failures of the persistence layer. Constraint violations that the HTTP layer can
/// answer meaningfully are lifted out of `sqlx::Error` into their own variants.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write (e.g. a taken username).
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("unknown role: {0}")]
    UnknownRole(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.constraint().unwrap_or("unique").to_string())
            }
            _ => StoreError::Database(err),
        }
    }
}

/// UserStore Trait
///
/// Accounts, credentials and role membership. The two lookups used by login
/// (`lookup_credential`, `permissions_for`) are request-scoped: nothing here caches
/// across calls, and a failure is reported rather than retried.
///
/// **Send + Sync + async_trait** so that `Arc<dyn UserStore>` can live in the shared state.
#[async_trait]
pub trait UserStore: Send + Sync {
    // --- Login ---
    /// `Ok(None)` for an unknown username.
    async fn lookup_credential(&self, username: &str) -> Result<Option<Credential>, StoreError>;
    /// Union of the permissions of every role the user holds. No roles means an empty set.
    async fn permissions_for(&self, user_id: UserId) -> Result<PermissionSet, StoreError>;

    // --- Accounts ---
    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError>;
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    // --- Roles ---
    async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError>;
    /// Grants every named role, all or nothing. Roles already held are left as they are.
    async fn assign_roles(&self, user_id: UserId, role_names: &[String]) -> Result<(), StoreError>;
}

/// BlogStore Trait
///
/// Blog persistence. Update and delete take the acting identity and only touch rows
/// that identity authored.
#[async_trait]
pub trait BlogStore: Send + Sync {
    async fn create_blog(&self, author: UserId, req: CreateBlogRequest) -> Result<Blog, StoreError>;
    async fn get_blog(&self, id: i64) -> Result<Option<Blog>, StoreError>;
    /// Newest first.
    async fn search_blogs(&self, search: &BlogSearch) -> Result<Vec<Blog>, StoreError>;
    /// `Ok(None)` when the blog does not exist or belongs to someone else.
    async fn update_blog(
        &self,
        id: i64,
        author: UserId,
        req: UpdateBlogRequest,
    ) -> Result<Option<Blog>, StoreError>;
    /// `Ok(false)` when the blog does not exist or belongs to someone else.
    async fn delete_blog(&self, id: i64, author: UserId) -> Result<bool, StoreError>;
}

pub type UserStoreState = Arc<dyn UserStore>;
pub type BlogStoreState = Arc<dyn BlogStore>;

const USER_COLUMNS: &str = "id, username, first_name, last_name, created_at, updated_at";
const BLOG_COLUMNS: &str = "id, user_id, title, content, tags, created_at, updated_at";

/// PostgresRepository
///
/// Postgres-backed implementation of both stores, sharing one connection pool.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// initialize
    ///
    /// Applies the embedded migrations (schema plus the seeded `admin`, `editor` and
    /// `viewer` roles). Safe to run on every start.
    pub async fn initialize(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl UserStore for PostgresRepository {
    async fn lookup_credential(&self, username: &str) -> Result<Option<Credential>, StoreError> {
        let credential = sqlx::query_as::<_, Credential>(
            "SELECT id AS user_id, password AS password_hash FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(credential)
    }

    /// permissions_for
    ///
    /// Flattens the permission arrays of all assigned roles. `DISTINCT` keeps the result a
    /// set even when two roles grant the same permission.
    async fn permissions_for(&self, user_id: UserId) -> Result<PermissionSet, StoreError> {
        let permissions = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT UNNEST(r.permissions)
            FROM roles r
            JOIN user_roles ur ON r.id = ur.role_id
            WHERE ur.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(permissions.into_iter().collect())
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (username, password, first_name, last_name) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&new_user.username)
            .bind(&new_user.password_hash)
            .bind(&new_user.first_name)
            .bind(&new_user.last_name)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT id, name, description, permissions FROM roles WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role)
    }

    /// assign_roles
    ///
    /// Runs in one transaction: an unknown role name rolls back every grant made so far.
    async fn assign_roles(
        &self,
        user_id: UserId,
        role_names: &[String],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for name in role_names {
            let role_id = sqlx::query_scalar::<_, i64>("SELECT id FROM roles WHERE name = $1")
                .bind(name)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| StoreError::UnknownRole(name.clone()))?;

            sqlx::query(
                "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .bind(role_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl BlogStore for PostgresRepository {
    async fn create_blog(&self, author: UserId, req: CreateBlogRequest) -> Result<Blog, StoreError> {
        let sql = format!(
            "INSERT INTO blogs (user_id, title, content, tags) \
             VALUES ($1, $2, $3, $4) RETURNING {BLOG_COLUMNS}"
        );
        let blog = sqlx::query_as::<_, Blog>(&sql)
            .bind(author)
            .bind(req.title)
            .bind(req.content)
            .bind(req.tags)
            .fetch_one(&self.pool)
            .await?;
        Ok(blog)
    }

    async fn get_blog(&self, id: i64) -> Result<Option<Blog>, StoreError> {
        let sql = format!("SELECT {BLOG_COLUMNS} FROM blogs WHERE id = $1");
        let blog = sqlx::query_as::<_, Blog>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(blog)
    }

    /// search_blogs
    ///
    /// Built with QueryBuilder so every user-supplied value is a bound parameter.
    /// The text filter is a case-insensitive substring match over title, content and tags;
    /// `%`, `_` and `\` in the search text match themselves.
    async fn search_blogs(&self, search: &BlogSearch) -> Result<Vec<Blog>, StoreError> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {BLOG_COLUMNS} FROM blogs WHERE TRUE"));

        if let Some(author) = search.author {
            builder.push(" AND user_id = ");
            builder.push_bind(author);
        }

        if let Some(text) = &search.text {
            let pattern = substring_pattern(text);
            builder.push(" AND (title ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(r" ESCAPE '\' OR content ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(r" ESCAPE '\' OR tags ILIKE ");
            builder.push_bind(pattern);
            builder.push(r" ESCAPE '\')");
        }

        builder.push(" ORDER BY created_at DESC, id DESC OFFSET ");
        builder.push_bind(search.offset);
        builder.push(" LIMIT ");
        builder.push_bind(search.limit);

        let blogs = builder
            .build_query_as::<Blog>()
            .fetch_all(&self.pool)
            .await?;
        Ok(blogs)
    }

    /// update_blog
    ///
    /// `COALESCE` keeps the stored value for every field the request leaves out.
    async fn update_blog(
        &self,
        id: i64,
        author: UserId,
        req: UpdateBlogRequest,
    ) -> Result<Option<Blog>, StoreError> {
        let sql = format!(
            r#"
            UPDATE blogs
            SET title = COALESCE($3, title),
                content = COALESCE($4, content),
                tags = COALESCE($5, tags),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {BLOG_COLUMNS}
            "#
        );
        let blog = sqlx::query_as::<_, Blog>(&sql)
            .bind(id)
            .bind(author)
            .bind(req.title)
            .bind(req.content)
            .bind(req.tags)
            .fetch_optional(&self.pool)
            .await?;
        Ok(blog)
    }

    async fn delete_blog(&self, id: i64, author: UserId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM blogs WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(author)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Wraps `text` in `%` for `ILIKE ... ESCAPE '\'`, escaping the pattern metacharacters.
fn substring_pattern(text: &str) -> String {
    let escaped = text
        .replace('\\', r"\\")
        .replace('%', r"\%")
        .replace('_', r"\_");
    format!("%{escaped}%")
}
