use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Fiscal quarter of a reporting period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Season {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Season {
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Season::Q1),
            2 => Some(Season::Q2),
            3 => Some(Season::Q3),
            4 => Some(Season::Q4),
            _ => None,
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            Season::Q1 => 1,
            Season::Q2 => 2,
            Season::Q3 => 3,
            Season::Q4 => 4,
        }
    }

    /// Two-digit form used by MOPS query forms ("01".."04")
    pub fn padded(&self) -> String {
        format!("{:02}", self.number())
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

impl TryFrom<u8> for Season {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> anyhow::Result<Self> {
        Season::from_number(value)
            .ok_or_else(|| anyhow::anyhow!("season must be between 1 and 4, got {}", value))
    }
}

/// One crawl unit: a company's statement for a given period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UpdateTarget {
    pub entity_id: u32,
    pub year: i32,
    pub season: Season,
}

impl UpdateTarget {
    pub fn new(entity_id: u32, year: i32, season: Season) -> Self {
        Self { entity_id, year, season }
    }

    /// Republic of China calendar year, as expected by MOPS
    pub fn roc_year(&self) -> i32 {
        roc_year(self.year)
    }
}

/// Convert a western calendar year to the Republic of China calendar
pub fn roc_year(year: i32) -> i32 {
    year - 1911
}

/// Category of financial report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    BalanceSheet,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::BalanceSheet => "balance_sheet",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Market segment partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompanyType {
    /// Main board (TWSE listed)
    Sii,
    /// Over-the-counter (TPEx listed)
    Otc,
}

impl CompanyType {
    pub const ALL: [CompanyType; 2] = [CompanyType::Sii, CompanyType::Otc];

    pub fn as_str(&self) -> &'static str {
        match self {
            CompanyType::Sii => "sii",
            CompanyType::Otc => "otc",
        }
    }
}

impl fmt::Display for CompanyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single crawl failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Network-level failure while fetching from the source
    Connection(String),
    /// Source page did not have the expected shape
    Index,
    /// Any other fetch failure, with its message
    Other(String),
    /// Submission never produced an HTTP response
    Submit(String),
}

/// Outcome of a single-entity update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlStatus {
    Ok,
    Rejected(u16),
    Failed(FailureKind),
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlStatus::Ok => f.write_str("ok"),
            CrawlStatus::Rejected(code) => write!(f, "{}", code),
            CrawlStatus::Failed(FailureKind::Connection(_)) => f.write_str("connection error"),
            CrawlStatus::Failed(FailureKind::Index) => f.write_str("index error"),
            CrawlStatus::Failed(FailureKind::Other(message)) => f.write_str(message),
            CrawlStatus::Failed(FailureKind::Submit(message)) => f.write_str(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlResult {
    pub entity_id: u32,
    pub status: CrawlStatus,
}

impl CrawlResult {
    pub fn new(entity_id: u32, status: CrawlStatus) -> Self {
        Self { entity_id, status }
    }

    pub fn is_ok(&self) -> bool {
        self.status == CrawlStatus::Ok
    }

    pub fn is_index_error(&self) -> bool {
        self.status == CrawlStatus::Failed(FailureKind::Index)
    }
}

/// Pending retry for an entity that failed at least once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryEntry {
    pub entity_id: u32,
    pub retry_count: u8,
}

impl RetryEntry {
    pub fn new(entity_id: u32) -> Self {
        Self { entity_id, retry_count: 0 }
    }
}

/// Rows of a scraped statement table, in page order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub rows: Vec<(String, Value)>,
}

impl RawRecord {
    pub fn new(rows: Vec<(String, Value)>) -> Self {
        Self { rows }
    }

    /// First value recorded under `label`
    pub fn get(&self, label: &str) -> Option<&Value> {
        self.rows
            .iter()
            .find(|(row_label, _)| row_label == label)
            .map(|(_, value)| value)
    }
}

/// JSON body submitted to the stocker server
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordPayload {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    pub year: i32,
    pub season: String,
}

impl RecordPayload {
    pub fn new(fields: Map<String, Value>, year: i32, season: Season) -> Self {
        Self {
            fields,
            year,
            season: season.to_string(),
        }
    }
}

pub const DEFAULT_STOCKER_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_MOPS_URL: &str = "https://mops.twse.com.tw";

/// Configuration for the application
#[derive(Debug, Clone)]
pub struct Config {
    pub stocker_url: Url,
    pub mops_url: Url,
    pub user_agent: String,
    pub sleep_interval: Duration,
    /// Exclusive upper bound, in whole seconds, of the random pause added to `sleep_interval`
    pub sleep_jitter_secs: u64,
    pub index_error_cooldown: Duration,
    pub http_timeout: Duration,
}

impl Config {
    /// Config for the given servers with the default pacing
    pub fn new(stocker_url: Url, mops_url: Url) -> Self {
        Self {
            stocker_url,
            mops_url,
            user_agent: "statement-crawler/0.1".to_string(),
            sleep_interval: Duration::from_secs(3),
            sleep_jitter_secs: 4,
            index_error_cooldown: Duration::from_secs(90),
            http_timeout: Duration::from_secs(30),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let defaults = Config::new(
            url_from_env("STOCKER_URL", DEFAULT_STOCKER_URL)?,
            url_from_env("MOPS_URL", DEFAULT_MOPS_URL)?,
        );

        Ok(Config {
            user_agent: std::env::var("CRAWLER_USER_AGENT").unwrap_or(defaults.user_agent.clone()),
            sleep_interval: seconds_from_env("SLEEP_SECONDS", defaults.sleep_interval),
            sleep_jitter_secs: std::env::var("SLEEP_JITTER_SECONDS")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(defaults.sleep_jitter_secs),
            index_error_cooldown: seconds_from_env(
                "INDEX_ERROR_COOLDOWN_SECONDS",
                defaults.index_error_cooldown,
            ),
            http_timeout: seconds_from_env("HTTP_TIMEOUT_SECONDS", defaults.http_timeout),
            ..defaults
        })
    }

    /// Full URL of a stocker server endpoint
    pub fn stocker_endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.stocker_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Full URL of a MOPS endpoint
    pub fn mops_endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.mops_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn url_from_env(key: &str, default: &str) -> anyhow::Result<Url> {
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| anyhow::anyhow!("{} is not a valid url ({}): {}", key, raw, e))
}

fn seconds_from_env(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
