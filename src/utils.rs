use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Suspends the crawl between network calls
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn wait(&self, duration: Duration);
}

/// Pacer backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn wait(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        debug!("Sleeping for {:?}", duration);
        tokio::time::sleep(duration).await;
    }
}

/// `interval` plus a random number of whole seconds in `[0, jitter_secs)`
pub fn jittered(interval: Duration, jitter_secs: u64) -> Duration {
    if jitter_secs == 0 {
        return interval;
    }
    interval + Duration::from_secs(rand::random_range(0..jitter_secs))
}
