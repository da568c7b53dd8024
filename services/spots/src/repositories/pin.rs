//! Pin repository for database operations
//!
//! The persistence gateway behind the pin collection. Mutations are
//! ownership-scoped in SQL; an update or delete against a pin the
//! caller does not own matches zero rows and reports not-found.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::pin::{Category, Pin};

/// Pin repository for database operations
#[derive(Clone)]
pub struct PinRepository {
    pool: PgPool,
}

impl PinRepository {
    /// Create a new pin repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a new pin, returning the record with its assigned id
    pub async fn create(&self, pin: &Pin) -> Result<Pin> {
        let row = sqlx::query(
            r#"
            INSERT INTO pins (owner_id, name, address, lat, lng, description,
                              category, rating, images, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(pin.owner_id)
        .bind(&pin.name)
        .bind(&pin.address)
        .bind(pin.lat)
        .bind(pin.lng)
        .bind(&pin.description)
        .bind(pin.category.as_str())
        .bind(pin.rating)
        .bind(serde_json::to_value(&pin.images)?)
        .bind(pin.created_at)
        .bind(pin.expires_at)
        .fetch_one(&self.pool)
        .await?;

        let mut saved = pin.clone();
        saved.id = Some(row.get("id"));
        Ok(saved)
    }

    /// Replace an owned pin wholesale (last write wins, no version check)
    pub async fn update(&self, owner_id: Uuid, id: Uuid, pin: &Pin) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE pins
            SET name = $3, address = $4, lat = $5, lng = $6, description = $7,
                category = $8, rating = $9, images = $10, expires_at = $11
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(&pin.name)
        .bind(&pin.address)
        .bind(pin.lat)
        .bind(pin.lng)
        .bind(&pin.description)
        .bind(pin.category.as_str())
        .bind(pin.rating)
        .bind(serde_json::to_value(&pin.images)?)
        .bind(pin.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete an owned pin
    pub async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM pins
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Fetch a single owned pin
    pub async fn get(&self, owner_id: Uuid, id: Uuid) -> Result<Option<Pin>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_id, name, address, lat, lng, description,
                   category, rating, images, created_at, expires_at
            FROM pins
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(pin_from_row))
    }

    /// All pins for one owner, in storage order
    pub async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Pin>> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner_id, name, address, lat, lng, description,
                   category, rating, images, created_at, expires_at
            FROM pins
            WHERE owner_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(pin_from_row).collect())
    }

    /// All pins owned by any of the given users, in storage order
    pub async fn list_by_owner_set(&self, owner_ids: &[Uuid]) -> Result<Vec<Pin>> {
        if owner_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT id, owner_id, name, address, lat, lng, description,
                   category, rating, images, created_at, expires_at
            FROM pins
            WHERE owner_id = ANY($1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(owner_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(pin_from_row).collect())
    }

    /// Delete every pin past its expiration, returning the count
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM pins
            WHERE expires_at IS NOT NULL AND expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

fn pin_from_row(row: sqlx::postgres::PgRow) -> Pin {
    let category: String = row.get("category");
    let images: serde_json::Value = row.get("images");

    Pin {
        id: Some(row.get("id")),
        owner_id: row.get("owner_id"),
        name: row.get("name"),
        address: row.get("address"),
        lat: row.get("lat"),
        lng: row.get("lng"),
        description: row.get("description"),
        category: Category::parse_or_default(&category),
        rating: row.get("rating"),
        images: serde_json::from_value(images).unwrap_or_default(),
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
    }
}
