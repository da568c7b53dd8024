//! Common library for the Spoty application
//!
//! This crate provides the infrastructure shared by the Spoty service:
//! the PostgreSQL connection pool behind the persistence gateway, the
//! Redis cache used for geocoding lookups, and the shared error types.

pub mod cache;
pub mod database;
pub mod error;

/// Example usage of the database module
///
/// ```rust,no_run
/// use common::database::{DatabaseConfig, init_pool, health_check};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig::from_env()?;
///     let pool = init_pool(&config).await?;
///     let is_healthy = health_check(&pool).await?;
///     println!("Database health check: {}", is_healthy);
///     Ok(())
/// }
/// ```
pub fn example_usage() {}
