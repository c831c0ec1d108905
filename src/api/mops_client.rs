use anyhow::Result;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::{debug, warn};

use super::{FetchError, StatementSource};
use crate::models::{roc_year, CompanyType, Config, RawRecord, Season, StatementKind, UpdateTarget};

const STATEMENT_TABLE: &str = "table.hasBorder";

/// Client for the Market Observation Post System (MOPS)
pub struct MopsClient {
    client: Client,
    config: Config,
}

impl MopsClient {
    /// Create a new MOPS client
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

    /// POST a query form and return the page body
    async fn post_form(&self, path: &str, params: &[(&str, String)]) -> std::result::Result<String, FetchError> {
        let url = self.config.mops_endpoint(path);
        debug!("Posting MOPS query to: {}", url);

        let response = self.client.post(&url).form(params).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Other(format!(
                "MOPS responded with status {}",
                status.as_u16()
            )));
        }

        Ok(response.text().await?)
    }
}

fn single_statement_path(kind: StatementKind) -> &'static str {
    match kind {
        StatementKind::BalanceSheet => "mops/web/ajax_t164sb03",
    }
}

fn summary_path(kind: StatementKind) -> &'static str {
    match kind {
        StatementKind::BalanceSheet => "mops/web/ajax_t163sb05",
    }
}

#[async_trait::async_trait]
impl StatementSource for MopsClient {
    async fn fetch(
        &self,
        kind: StatementKind,
        target: &UpdateTarget,
    ) -> std::result::Result<RawRecord, FetchError> {
        let params = [
            ("encodeURIComponent", "1".to_string()),
            ("step", "1".to_string()),
            ("firstin", "1".to_string()),
            ("off", "1".to_string()),
            ("queryName", "co_id".to_string()),
            ("inpuType", "co_id".to_string()),
            ("TYPEK", "all".to_string()),
            ("isnew", "false".to_string()),
            ("co_id", target.entity_id.to_string()),
            ("year", target.roc_year().to_string()),
            ("season", target.season.padded()),
        ];

        let body = self.post_form(single_statement_path(kind), &params).await?;
        parse_statement_table(&body)
    }

    async fn list_ids(
        &self,
        kind: StatementKind,
        company_type: CompanyType,
        year: i32,
        season: Season,
    ) -> Result<Vec<u32>> {
        let params = [
            ("encodeURIComponent", "1".to_string()),
            ("step", "1".to_string()),
            ("firstin", "1".to_string()),
            ("off", "1".to_string()),
            ("isQuery", "Y".to_string()),
            ("TYPEK", company_type.as_str().to_string()),
            ("year", roc_year(year).to_string()),
            ("season", season.padded()),
        ];

        let body = self.post_form(summary_path(kind), &params).await?;
        let ids = parse_summary_ids(&body)?;
        debug!(
            "MOPS lists {} {} companies for {}Q{}",
            ids.len(),
            company_type,
            year,
            season
        );
        Ok(ids)
    }
}

fn selector(css: &str) -> std::result::Result<Selector, FetchError> {
    Selector::parse(css).map_err(|e| FetchError::Other(format!("invalid selector {}: {}", css, e)))
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Extract label/value rows from a single-company statement page
pub fn parse_statement_table(html: &str) -> std::result::Result<RawRecord, FetchError> {
    let document = Html::parse_document(html);
    let table_selector = selector(STATEMENT_TABLE)?;
    let row_selector = selector("tr")?;
    let cell_selector = selector("td")?;

    let mut tables_seen = 0;
    for table in document.select(&table_selector) {
        tables_seen += 1;

        let mut rows = Vec::new();
        for row in table.select(&row_selector) {
            let cells: Vec<ElementRef> = row.select(&cell_selector).collect();
            if cells.len() < 2 {
                continue;
            }

            let label = cell_text(&cells[0]);
            if label.is_empty() {
                continue;
            }
            rows.push((label, parse_amount(&cell_text(&cells[1]))));
        }

        if !rows.is_empty() {
            return Ok(RawRecord::new(rows));
        }
    }

    if tables_seen == 0 {
        warn!("MOPS page has no statement table, layout changed or query was throttled");
        Err(FetchError::Index("statement table not found".to_string()))
    } else {
        Err(FetchError::Index("statement table has no data rows".to_string()))
    }
}

/// Company ids listed in every summary table of the page, in page order
pub fn parse_summary_ids(html: &str) -> std::result::Result<Vec<u32>, FetchError> {
    let document = Html::parse_document(html);
    let table_selector = selector(STATEMENT_TABLE)?;
    let row_selector = selector("tr")?;
    let cell_selector = selector("td")?;

    let mut ids: Vec<u32> = Vec::new();
    for table in document.select(&table_selector) {
        for row in table.select(&row_selector) {
            let id = row
                .select(&cell_selector)
                .next()
                .and_then(|cell| cell_text(&cell).parse::<u32>().ok());

            if let Some(id) = id {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
    }

    Ok(ids)
}

/// Parse an amount cell such as "1,234,567" or "(3,210)"
fn parse_amount(text: &str) -> Value {
    let cleaned: String = text.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Value::Null;
    }

    let (negative, digits) = match cleaned.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, cleaned.as_str()),
    };

    if let Ok(number) = digits.parse::<i64>() {
        let signed = if negative { number.checked_neg() } else { Some(number) };
        if let Some(signed) = signed {
            return Value::from(signed);
        }
    }
    if let Ok(number) = digits.parse::<f64>() {
        return Value::from(if negative { -number } else { number });
    }

    Value::String(text.trim().to_string())
}
