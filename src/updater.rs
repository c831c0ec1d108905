use std::sync::Arc;
use tracing::{debug, warn};

use crate::api::{FetchError, RemoteStore, StatementSource};
use crate::models::{CrawlResult, CrawlStatus, FailureKind, RecordPayload, Season, UpdateTarget};
use crate::normalize::StatementProfile;

const CREATED: u16 = 201;

/// Crawls and stores one company's statement.
///
/// Every failure is folded into the returned [`CrawlResult`]; retries are
/// the caller's business.
pub struct StatementUpdater {
    source: Arc<dyn StatementSource>,
    store: Arc<dyn RemoteStore>,
    profile: StatementProfile,
}

impl StatementUpdater {
    pub fn new(
        source: Arc<dyn StatementSource>,
        store: Arc<dyn RemoteStore>,
        profile: StatementProfile,
    ) -> Self {
        Self {
            source,
            store,
            profile,
        }
    }

    pub fn profile(&self) -> &StatementProfile {
        &self.profile
    }

    /// Fetch, normalize and submit the statement of `entity_id` for a period
    pub async fn update(&self, entity_id: u32, year: i32, season: Season) -> CrawlResult {
        let target = UpdateTarget::new(entity_id, year, season);
        CrawlResult::new(entity_id, self.update_target(&target).await)
    }

    async fn update_target(&self, target: &UpdateTarget) -> CrawlStatus {
        let record = match self.source.fetch(self.profile.kind, target).await {
            Ok(record) => record,
            Err(err) => {
                debug!("Fetching {} for {} failed: {}", self.profile.kind, target.entity_id, err);
                return CrawlStatus::Failed(match err {
                    FetchError::Connection(message) => FailureKind::Connection(message),
                    FetchError::Index(_) => FailureKind::Index,
                    FetchError::Other(message) => FailureKind::Other(message),
                });
            }
        };

        let fields = self.profile.normalize(&record);
        let payload = RecordPayload::new(fields, target.year, target.season);

        match self.store.submit(target.entity_id, &payload).await {
            Ok(CREATED) => CrawlStatus::Ok,
            Ok(code) => CrawlStatus::Rejected(code),
            Err(err) => {
                warn!("Submitting {} for {} failed: {}", self.profile.kind, target.entity_id, err);
                CrawlStatus::Failed(FailureKind::Submit(err.to_string()))
            }
        }
    }
}
