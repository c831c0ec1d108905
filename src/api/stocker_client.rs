use anyhow::{anyhow, Result};
use reqwest::Client;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

use super::RemoteStore;
use crate::models::{Config, RecordPayload, Season, StatementKind};

/// Client for the stocker storage server
pub struct StockerClient {
    client: Client,
    config: Config,
}

impl StockerClient {
    /// Create a new stocker client
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// GET an endpoint that answers with a JSON array of ids
    async fn get_id_set(&self, url: &str, query: &[(&str, String)]) -> Result<HashSet<String>> {
        debug!("Making request to: {}", url);

        let response = self.client.get(url).query(query).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("Stocker request failed with status {}: {}", status, error_text));
        }

        let values: Vec<Value> = response.json().await?;
        Ok(id_set(values))
    }
}

/// Stringify an id array; numbers and strings are accepted
fn id_set(values: Vec<Value>) -> HashSet<String> {
    values
        .into_iter()
        .filter_map(|value| match value {
            Value::String(id) => Some(id.trim().to_string()),
            Value::Number(id) => Some(id.to_string()),
            other => {
                warn!("Ignoring unexpected id value from stocker: {}", other);
                None
            }
        })
        .collect()
}

#[async_trait::async_trait]
impl RemoteStore for StockerClient {
    async fn list_updated(
        &self,
        year: i32,
        season: Season,
        kind: StatementKind,
    ) -> Result<HashSet<String>> {
        let url = self
            .config
            .stocker_endpoint(&format!("financial_statement/{}/exist", kind));
        let query = [("year", year.to_string()), ("season", season.to_string())];
        self.get_id_set(&url, &query).await
    }

    async fn list_valid(&self) -> Result<HashSet<String>> {
        let url = self.config.stocker_endpoint("basic_information");
        let query = [("attr", "id".to_string())];
        self.get_id_set(&url, &query).await
    }

    async fn submit(&self, entity_id: u32, payload: &RecordPayload) -> Result<u16> {
        let url = self
            .config
            .stocker_endpoint(&format!("daily_information/{}", entity_id));
        debug!("Submitting record for {} to: {}", entity_id, url);

        let response = self.client.post(&url).json(payload).send().await?;
        Ok(response.status().as_u16())
    }
}
