//! Document persistence behind a narrow capability set.
//!
//! [`StoreGateway`] is the only surface the limit logic sees. Two adapters
//! implement it: [`SqliteGateway`] keeps JSON documents in SQLite and
//! [`MemoryGateway`] keeps them in process for tests. Each gateway instance
//! owns at most one session, opened by `connect` and released by
//! `disconnect`. Nothing here retries or caches.

pub mod document;
pub mod error;
pub mod memory;
pub mod schema;
pub mod sqlite;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use document::{Document, Filter, Update};
pub use error::StoreError;
pub use memory::{MemoryGateway, MemoryStore};
pub use sqlite::{SqliteGateway, SqliteGatewayFactory};

pub const DOCUMENTS_TABLE: &str = "documents";
pub const DATABASE_FILE_EXTENSION: &str = "db";

/// Where a gateway session points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub data_dir: PathBuf,
    pub database: String,
    pub collection: String,
}

impl ConnectionConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}", self.database, DATABASE_FILE_EXTENSION))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertResult {
    pub inserted_id: String,
}

#[async_trait]
pub trait StoreGateway: Send {
    async fn connect(&mut self, config: &ConnectionConfig) -> Result<(), StoreError>;

    async fn disconnect(&mut self) -> Result<(), StoreError>;

    async fn find_one(&mut self, filter: &Filter) -> Result<Document, StoreError>;

    /// Applies `update` to the first matching document. Never inserts.
    async fn update_one(
        &mut self,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult, StoreError>;

    async fn insert_one(&mut self, document: Document) -> Result<InsertResult, StoreError>;
}

/// Hands out a fresh, unconnected gateway for each request.
pub trait GatewayFactory: Send + Sync {
    fn create(&self) -> Box<dyn StoreGateway>;
}
