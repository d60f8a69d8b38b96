//! `Database` trait — async interface for keyed settings storage.

use async_trait::async_trait;

use crate::error::DatabaseError;

/// Backend-agnostic settings storage.
///
/// Values are JSON documents addressed by `(scope, key)`.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// Fetch the value stored under `(scope, key)`.
    async fn get_setting(
        &self,
        scope: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, DatabaseError>;

    /// Insert or replace the value under `(scope, key)`.
    async fn set_setting(
        &self,
        scope: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), DatabaseError>;

    /// Delete the value under `(scope, key)`. Returns whether a row existed.
    async fn delete_setting(&self, scope: &str, key: &str) -> Result<bool, DatabaseError>;

    /// Keys stored under `scope`, sorted.
    async fn list_setting_keys(&self, scope: &str) -> Result<Vec<String>, DatabaseError>;
}
