//! Shared fixtures: an in-memory database with a small blog schema

#![allow(dead_code)]

use async_trait::async_trait;
use strata_orm::{
    CastType, CrudOperations, Database, DatabaseValue, Entity, EntityDefinition, EventError,
    ModelObserver, Record, Rule,
};

pub struct User;

impl Entity for User {
    fn definition() -> EntityDefinition<Self> {
        EntityDefinition::new("users")
            .fillable(["name", "email", "age", "rating", "settings", "password", "nickname"])
            .hidden(["password"])
            .soft_deletes(true)
            .cast("age", CastType::Int)
            .cast("rating", CastType::Float)
            .cast("nickname", CastType::String)
            .cast("is_admin", CastType::Bool)
            .cast("settings", CastType::Json)
            .mutator("email", |value| match value {
                DatabaseValue::String(email) => DatabaseValue::String(email.to_lowercase()),
                other => other,
            })
            .rule("name", Rule::Required)
            .rule("email", Rule::Email)
            .has_many::<Post>("posts")
            .has_one::<Profile>("profile")
            .belongs_to_many::<Role>("roles")
    }
}

pub struct Post;

impl Entity for Post {
    fn definition() -> EntityDefinition<Self> {
        EntityDefinition::new("posts")
            .guarded(["id"])
            .cast("views", CastType::Int)
            .cast("published_at", CastType::DateTime)
            .belongs_to::<User>("author")
    }
}

pub struct Profile;

impl Entity for Profile {
    fn definition() -> EntityDefinition<Self> {
        EntityDefinition::new("profiles")
            .fillable(["user_id", "bio"])
            .timestamps(false)
            .mutator("bio", |value| match value {
                DatabaseValue::String(bio) => DatabaseValue::String(bio.trim().to_string()),
                other => other,
            })
            .accessor("headline", |_| DatabaseValue::from("profile"))
            .belongs_to::<User>("user")
    }
}

pub struct Role;

impl Entity for Role {
    fn definition() -> EntityDefinition<Self> {
        EntityDefinition::new("roles")
            .fillable(["name"])
            .observer(RoleObserver)
            .belongs_to_many::<User>("users")
    }
}

/// Trims names on save, refuses to create `forbidden` and to delete `admin`
pub struct RoleObserver;

#[async_trait]
impl ModelObserver<Role> for RoleObserver {
    async fn saving(&self, record: &mut Record<Role>) -> Result<bool, EventError> {
        if let Some(name) = record.raw("name").and_then(|v| v.as_str()).map(str::to_string) {
            record.set("name", name.trim());
        }
        Ok(true)
    }

    async fn creating(&self, record: &mut Record<Role>) -> Result<bool, EventError> {
        Ok(record.raw("name").and_then(|v| v.as_str()) != Some("forbidden"))
    }

    async fn deleting(&self, record: &mut Record<Role>) -> Result<bool, EventError> {
        Ok(record.raw("name").and_then(|v| v.as_str()) != Some("admin"))
    }
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT,
        email TEXT,
        nickname TEXT,
        password TEXT,
        age INTEGER,
        rating REAL,
        is_admin INTEGER NOT NULL DEFAULT 0,
        settings TEXT,
        created_at TEXT,
        updated_at TEXT,
        deleted_at TEXT
    )",
    "CREATE TABLE posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER,
        title TEXT NOT NULL,
        views INTEGER NOT NULL DEFAULT 0,
        published_at TEXT,
        created_at TEXT,
        updated_at TEXT
    )",
    "CREATE TABLE profiles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER,
        bio TEXT
    )",
    "CREATE TABLE roles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        created_at TEXT,
        updated_at TEXT
    )",
    "CREATE TABLE role_user (
        user_id INTEGER NOT NULL,
        role_id INTEGER NOT NULL
    )",
];

/// Log to the test writer when `RUST_LOG` is set
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn setup() -> Database {
    init_tracing();
    let db = Database::in_memory().await.expect("open in-memory database");
    for statement in SCHEMA {
        db.statement(statement, &[]).await.expect("create schema");
    }
    db
}

pub async fn create_user(db: &Database, name: &str, age: i64) -> Record<User> {
    let email = format!("{}@example.com", name.to_lowercase());
    let user = User::create(
        db,
        [
            ("name", DatabaseValue::from(name)),
            ("email", DatabaseValue::from(email)),
            ("age", DatabaseValue::from(age)),
        ],
    )
    .await
    .expect("create user");
    assert!(user.exists(), "user {} was not saved: {}", name, user.errors());
    user
}

pub async fn create_post(db: &Database, user: &Record<User>, title: &str, views: i64) -> Record<Post> {
    Post::create(
        db,
        [
            ("user_id", user.id()),
            ("title", DatabaseValue::from(title)),
            ("views", DatabaseValue::from(views)),
        ],
    )
    .await
    .expect("create post")
}

pub async fn attach_role(db: &Database, user: &Record<User>, role: &Record<Role>) {
    db.statement(
        "INSERT INTO role_user (user_id, role_id) VALUES (?, ?)",
        &[user.id(), role.id()],
    )
    .await
    .expect("attach role");
}
