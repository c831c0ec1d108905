//! Batch update of one statement type for a reporting period
//!
//! The driver works out which companies still need the statement, crawls
//! them one after another with pacing, and then drains a round-robin retry
//! queue. A failed entity is retried at most three times per run.

use anyhow::{Context, Result};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{RemoteStore, StatementSource};
use crate::models::{CompanyType, Config, RetryEntry, Season};
use crate::updater::StatementUpdater;
use crate::utils::{jittered, Pacer};

/// Retry count at which a further failure abandons the entity
const FINAL_RETRY: u8 = 2;

/// What happened during a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub worklist: usize,
    pub succeeded: usize,
    pub recovered: usize,
    pub abandoned: Vec<u32>,
}

pub struct BatchDriver {
    updater: StatementUpdater,
    source: Arc<dyn StatementSource>,
    store: Arc<dyn RemoteStore>,
    pacer: Arc<dyn Pacer>,
    config: Config,
}

impl BatchDriver {
    pub fn new(
        updater: StatementUpdater,
        source: Arc<dyn StatementSource>,
        store: Arc<dyn RemoteStore>,
        pacer: Arc<dyn Pacer>,
        config: Config,
    ) -> Self {
        Self {
            updater,
            source,
            store,
            pacer,
            config,
        }
    }

    /// Update every company that still lacks the statement for a period
    pub async fn run(&self, year: i32, season: Season) -> Result<RunSummary> {
        let kind = self.updater.profile().kind;
        info!("🚀 Updating {} for {}Q{}", kind, year, season);

        let worklist = self.build_worklist(year, season).await?;
        let mut summary = RunSummary {
            worklist: worklist.len(),
            ..RunSummary::default()
        };
        info!("📊 {} companies to crawl", worklist.len());

        let mut retry_queue = self.process_worklist(&worklist, year, season, &mut summary).await;
        self.drain_retries(&mut retry_queue, year, season, &mut summary).await;

        info!(
            "✅ {} for {}Q{} done: {} ok, {} recovered, {} abandoned",
            kind,
            year,
            season,
            summary.succeeded,
            summary.recovered,
            summary.abandoned.len()
        );
        Ok(summary)
    }

    /// Ids needing a crawl, in partition then listing order
    pub async fn build_worklist(&self, year: i32, season: Season) -> Result<Vec<u32>> {
        let kind = self.updater.profile().kind;

        let updated = self
            .store
            .list_updated(year, season, kind)
            .await
            .with_context(|| format!("failed to list stored {} for {}Q{}", kind, year, season))?;
        let valid = self
            .store
            .list_valid()
            .await
            .context("failed to list valid companies")?;

        let mut worklist = Vec::new();
        for company_type in CompanyType::ALL {
            let listed = self
                .source
                .list_ids(kind, company_type, year, season)
                .await
                .with_context(|| format!("failed to list {} {} companies", company_type, kind))?;

            if listed.is_empty() {
                info!("No {} {} published for {}Q{}", company_type, kind, year, season);
                continue;
            }
            worklist.extend(select_targets(&listed, &updated, &valid));
        }

        Ok(worklist)
    }

    /// First pass over the worklist; failures are queued for retry
    async fn process_worklist(
        &self,
        worklist: &[u32],
        year: i32,
        season: Season,
        summary: &mut RunSummary,
    ) -> VecDeque<RetryEntry> {
        let total = worklist.len();
        let mut retry_queue = VecDeque::new();

        for (idx, &entity_id) in worklist.iter().enumerate() {
            let result = self.updater.update(entity_id, year, season).await;
            info!("({}/{}) {} {}", idx, total, result.entity_id, result.status);

            if result.is_index_error() {
                warn!(
                    "Source served an unexpected page for {}, cooling down for {:?}",
                    entity_id, self.config.index_error_cooldown
                );
                self.pacer.wait(self.config.index_error_cooldown).await;
            }
            if result.is_ok() {
                summary.succeeded += 1;
            } else {
                retry_queue.push_back(RetryEntry::new(entity_id));
            }

            self.pace().await;
        }

        retry_queue
    }

    /// Round-robin retries until every entry succeeded or was abandoned
    async fn drain_retries(
        &self,
        retry_queue: &mut VecDeque<RetryEntry>,
        year: i32,
        season: Season,
        summary: &mut RunSummary,
    ) {
        while let Some(mut entry) = retry_queue.pop_front() {
            let result = self.updater.update(entry.entity_id, year, season).await;
            info!(
                "retry #{} {} {}",
                entry.retry_count + 1,
                result.entity_id,
                result.status
            );

            if result.is_ok() {
                summary.recovered += 1;
            } else if entry.retry_count == FINAL_RETRY {
                warn!(
                    "Abandoning {} for this run after {} retries",
                    entry.entity_id,
                    FINAL_RETRY + 1
                );
                summary.abandoned.push(entry.entity_id);
            } else {
                entry.retry_count += 1;
                retry_queue.push_back(entry);
            }

            self.pace().await;
        }
    }

    async fn pace(&self) {
        let pause = jittered(self.config.sleep_interval, self.config.sleep_jitter_secs);
        self.pacer.wait(pause).await;
    }
}

/// Pick ids from one partition's listing.
///
/// With nothing stored yet every listed id is taken, without consulting the
/// validity list. Otherwise an id is taken when it is not stored and is valid.
pub fn select_targets(
    listed: &[u32],
    updated: &HashSet<String>,
    valid: &HashSet<String>,
) -> Vec<u32> {
    if updated.is_empty() {
        return listed.to_vec();
    }

    listed
        .iter()
        .copied()
        .filter(|id| {
            let id = id.to_string();
            !updated.contains(&id) && valid.contains(&id)
        })
        .collect()
}
