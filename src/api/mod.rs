use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;

use crate::models::{CompanyType, RawRecord, RecordPayload, Season, StatementKind, UpdateTarget};

pub mod mops_client;
pub mod stocker_client;
pub use mops_client::MopsClient;
pub use stocker_client::StockerClient;

/// Failure while fetching a statement from the source
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("connection error: {0}")]
    Connection(String),
    /// Page layout did not contain the expected statement table
    #[error("index error: {0}")]
    Index(String),
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            FetchError::Connection(err.to_string())
        } else {
            FetchError::Other(err.to_string())
        }
    }
}

/// Where financial statements are crawled from
#[async_trait]
pub trait StatementSource: Send + Sync {
    /// Fetch one company's statement for a period
    async fn fetch(
        &self,
        kind: StatementKind,
        target: &UpdateTarget,
    ) -> std::result::Result<RawRecord, FetchError>;

    /// Ids of companies that have published the statement for a period.
    /// Empty when nothing is published yet for the partition.
    async fn list_ids(
        &self,
        kind: StatementKind,
        company_type: CompanyType,
        year: i32,
        season: Season,
    ) -> Result<Vec<u32>>;
}

/// Where normalized statements are stored
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Ids already stored for a period and statement
    async fn list_updated(
        &self,
        year: i32,
        season: Season,
        kind: StatementKind,
    ) -> Result<HashSet<String>>;

    /// Ids of companies eligible for crawling
    async fn list_valid(&self) -> Result<HashSet<String>>;

    /// Submit a record; returns the HTTP status code of the response
    async fn submit(&self, entity_id: u32, payload: &RecordPayload) -> Result<u16>;
}
