//! Repositories for database operations
//!
//! Every operation is scoped to an authenticated owner identity; a
//! write against a record the caller does not own affects zero rows.

use anyhow::Result;
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub mod pin;

/// A user profile row, as looked up when adding a friend
#[derive(Debug, Clone)]
pub struct FriendProfile {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
}

impl FriendProfile {
    /// Name shown in the "added" confirmation message
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.email)
    }
}

/// Friend repository for database operations
///
/// Friendship is a directed edge: A adding B does not imply B sees A.
#[derive(Clone)]
pub struct FriendRepository {
    pool: PgPool,
}

impl FriendRepository {
    /// Create a new friend repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Look up a profile by email (lowercased)
    pub async fn find_profile_by_email(&self, email: &str) -> Result<Option<FriendProfile>> {
        let row = sqlx::query(
            r#"
            SELECT id, email, username
            FROM profiles
            WHERE email = $1
            "#,
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| FriendProfile {
            id: row.get("id"),
            email: row.get("email"),
            username: row.get("username"),
        }))
    }

    /// Whether `friend_id` is already in `user_id`'s friends list
    pub async fn exists(&self, user_id: Uuid, friend_id: Uuid) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT 1 AS present
            FROM friends
            WHERE user_id = $1 AND friend_id = $2
            "#,
        )
        .bind(user_id)
        .bind(friend_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    /// Create the directed friendship edge
    pub async fn add(&self, user_id: Uuid, friend_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO friends (user_id, friend_id, created_at)
            VALUES ($1, $2, NOW())
            "#,
        )
        .bind(user_id)
        .bind(friend_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All friend identities for a user
    pub async fn list_friend_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            r#"
            SELECT friend_id
            FROM friends
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.get("friend_id")).collect())
    }
}
