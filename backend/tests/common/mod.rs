#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{Body, to_bytes},
    http::{Request, Response, header},
};
use chrono::{DateTime, TimeZone, Utc};
use quillpost::{
    AppConfig, AppState,
    auth::{Argon2Params, Clock, CredentialVerifier, PermissionSet, TokenIssuer},
    models::{
        Blog, BlogSearch, CreateBlogRequest, Credential, NewUser, Role, UpdateBlogRequest, User,
        UserId,
    },
    repository::{BlogStore, StoreError, UserStore},
};
use serde_json::Value;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicI64, Ordering},
};

pub const TEST_SECRET: &str = "integration-test-secret";

/// Cheap Argon2 settings so tests do not spend seconds hashing.
pub fn cheap_params() -> Argon2Params {
    Argon2Params {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: TEST_SECRET.to_string(),
        token_ttl_minutes: 30,
        password_hashing: cheap_params(),
        ..AppConfig::default()
    }
}

// --- CLOCK ---

/// A clock that only moves when told to.
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn at(start: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(start.timestamp())))
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.0.fetch_add(minutes * 60, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.0.load(Ordering::SeqCst), 0).unwrap()
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

// --- IN-MEMORY STORE ---

struct StoredUser {
    user: User,
    password_hash: String,
}

#[derive(Default)]
struct Tables {
    users: Vec<StoredUser>,
    roles: Vec<Role>,
    user_roles: Vec<(UserId, i64)>,
    blogs: Vec<Blog>,
    next_user_id: i64,
    next_blog_id: i64,
}

/// In-memory stand-in for `PostgresRepository`, seeded with the same roles as the
/// migrations. `fail_lookups` makes every call return a database error.
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    pub fail_lookups: AtomicBool,
}

impl InMemoryStore {
    pub fn seeded() -> Arc<Self> {
        let role = |id: i64, name: &str, permissions: &[&str]| Role {
            id,
            name: name.to_string(),
            description: None,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        };
        let tables = Tables {
            roles: vec![
                role(
                    1,
                    "admin",
                    &[
                        "create_user",
                        "read_user",
                        "update_user",
                        "delete_user",
                        "create_blog",
                        "read_blog",
                        "update_blog",
                        "delete_blog",
                    ],
                ),
                role(
                    2,
                    "editor",
                    &["create_blog", "read_blog", "update_blog", "delete_blog"],
                ),
                role(3, "viewer", &["read_user", "read_blog"]),
            ],
            next_user_id: 1,
            next_blog_id: 1,
            ..Tables::default()
        };
        Arc::new(Self {
            tables: Mutex::new(tables),
            fail_lookups: AtomicBool::new(false),
        })
    }

    /// Drops a seeded role, as if the migrations had not run completely.
    pub fn remove_role(&self, name: &str) {
        self.tables.lock().unwrap().roles.retain(|r| r.name != name);
    }

    /// Makes the next user created get this id.
    pub fn set_next_user_id(&self, id: i64) {
        self.tables.lock().unwrap().next_user_id = id;
    }

    /// Creates a user with a real Argon2 hash and the given roles.
    pub async fn add_user(&self, username: &str, password: &str, roles: &[&str]) -> UserId {
        let verifier = CredentialVerifier::new(cheap_params()).unwrap();
        let password_hash = verifier.hash_password(password).unwrap();
        let user = self
            .create_user(NewUser {
                username: username.to_string(),
                password_hash,
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
            })
            .await
            .unwrap();
        let roles: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
        self.assign_roles(user.id, &roles).await.unwrap();
        user.id
    }

    pub fn blog_count(&self) -> usize {
        self.tables.lock().unwrap().blogs.len()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn lookup_credential(&self, username: &str) -> Result<Option<Credential>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .users
            .iter()
            .find(|u| u.user.username == username)
            .map(|u| Credential {
                user_id: u.user.id,
                password_hash: u.password_hash.clone(),
            }))
    }

    async fn permissions_for(&self, user_id: UserId) -> Result<PermissionSet, StoreError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .user_roles
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .filter_map(|(_, role_id)| tables.roles.iter().find(|r| r.id == *role_id))
            .flat_map(|role| role.permissions.iter().cloned())
            .collect())
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        if tables
            .users
            .iter()
            .any(|u| u.user.username == new_user.username)
        {
            return Err(StoreError::Conflict("users_username_key".to_string()));
        }
        let id = UserId(tables.next_user_id);
        tables.next_user_id += 1;
        let now = Utc::now();
        let user = User {
            id,
            username: new_user.username,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(StoredUser {
            user: user.clone(),
            password_hash: new_user.password_hash,
        });
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .users
            .iter()
            .find(|u| u.user.id == id)
            .map(|u| u.user.clone()))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .users
            .iter()
            .find(|u| u.user.username == username)
            .map(|u| u.user.clone()))
    }

    async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.roles.iter().find(|r| r.name == name).cloned())
    }

    async fn assign_roles(
        &self,
        user_id: UserId,
        role_names: &[String],
    ) -> Result<(), StoreError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let mut role_ids = Vec::new();
        for name in role_names {
            let role = tables
                .roles
                .iter()
                .find(|r| &r.name == name)
                .ok_or_else(|| StoreError::UnknownRole(name.clone()))?;
            role_ids.push(role.id);
        }
        for role_id in role_ids {
            if !tables.user_roles.contains(&(user_id, role_id)) {
                tables.user_roles.push((user_id, role_id));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BlogStore for InMemoryStore {
    async fn create_blog(&self, author: UserId, req: CreateBlogRequest) -> Result<Blog, StoreError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let id = tables.next_blog_id;
        tables.next_blog_id += 1;
        let now = Utc::now();
        let blog = Blog {
            id,
            user_id: author,
            title: req.title,
            content: req.content,
            tags: req.tags,
            created_at: now,
            updated_at: now,
        };
        tables.blogs.push(blog.clone());
        Ok(blog)
    }

    async fn get_blog(&self, id: i64) -> Result<Option<Blog>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.blogs.iter().find(|b| b.id == id).cloned())
    }

    async fn search_blogs(&self, search: &BlogSearch) -> Result<Vec<Blog>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        let needle = search.text.as_ref().map(|t| t.to_lowercase());
        let mut matches: Vec<Blog> = tables
            .blogs
            .iter()
            .filter(|b| search.author.is_none_or(|a| b.user_id == a))
            .filter(|b| {
                needle.as_ref().is_none_or(|n| {
                    b.title.to_lowercase().contains(n)
                        || b.content.to_lowercase().contains(n)
                        || b.tags.as_deref().unwrap_or("").to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect();
        // Newest first; ids break ties between blogs created in the same instant.
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(matches
            .into_iter()
            .skip(search.offset as usize)
            .take(search.limit as usize)
            .collect())
    }

    async fn update_blog(
        &self,
        id: i64,
        author: UserId,
        req: UpdateBlogRequest,
    ) -> Result<Option<Blog>, StoreError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let Some(blog) = tables
            .blogs
            .iter_mut()
            .find(|b| b.id == id && b.user_id == author)
        else {
            return Ok(None);
        };
        if let Some(title) = req.title {
            blog.title = title;
        }
        if let Some(content) = req.content {
            blog.content = content;
        }
        if let Some(tags) = req.tags {
            blog.tags = Some(tags);
        }
        blog.updated_at = Utc::now();
        Ok(Some(blog.clone()))
    }

    async fn delete_blog(&self, id: i64, author: UserId) -> Result<bool, StoreError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let before = tables.blogs.len();
        tables.blogs.retain(|b| !(b.id == id && b.user_id == author));
        Ok(tables.blogs.len() < before)
    }
}

// --- STATE & REQUEST HELPERS ---

pub fn state_with(store: Arc<InMemoryStore>, clock: Arc<dyn Clock>) -> AppState {
    AppState::with_clock(test_config(), store.clone(), store, clock).unwrap()
}

/// Signs a token directly, bypassing login.
pub fn token_for(
    user_id: UserId,
    permissions: &[&str],
    clock: Arc<dyn Clock>,
    ttl_minutes: i64,
) -> String {
    let set: PermissionSet = permissions.iter().copied().collect();
    TokenIssuer::new(TEST_SECRET, clock)
        .unwrap()
        .issue(user_id, &set, ttl_minutes)
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    }
}
