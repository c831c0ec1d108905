//! Statement profiles and field normalization
//!
//! A profile carries the ordered set of canonical keys submitted for a
//! statement and the table translating source labels into those keys.
//! MOPS labels vary between industries and reporting years, so several
//! labels may map to the same canonical key.

use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

use crate::models::{RawRecord, StatementKind};

const BALANCE_SHEET_KEYS: &[&str] = &[
    "cash_and_cash_equivalents",
    "current_financial_assets_at_fair_value",
    "notes_receivable",
    "accounts_receivable",
    "inventories",
    "prepayments",
    "total_current_assets",
    "property_plant_and_equipment",
    "intangible_assets",
    "total_non_current_assets",
    "total_assets",
    "short_term_borrowings",
    "accounts_payable",
    "total_current_liabilities",
    "bonds_payable",
    "long_term_borrowings",
    "total_non_current_liabilities",
    "total_liabilities",
    "capital_stock",
    "capital_surplus",
    "retained_earnings",
    "other_equity",
    "treasury_stock",
    "equity_attributable_to_owners_of_parent",
    "non_controlling_interests",
    "total_equity",
    "total_liabilities_and_equity",
];

const BALANCE_SHEET_LABELS: &[(&str, &str)] = &[
    ("現金及約當現金", "cash_and_cash_equivalents"),
    ("透過損益按公允價值衡量之金融資產－流動", "current_financial_assets_at_fair_value"),
    ("應收票據淨額", "notes_receivable"),
    ("應收票據", "notes_receivable"),
    ("應收帳款淨額", "accounts_receivable"),
    ("應收帳款", "accounts_receivable"),
    ("存貨", "inventories"),
    ("存貨合計", "inventories"),
    ("預付款項", "prepayments"),
    ("流動資產合計", "total_current_assets"),
    ("不動產、廠房及設備", "property_plant_and_equipment"),
    ("不動產、廠房及設備合計", "property_plant_and_equipment"),
    ("無形資產", "intangible_assets"),
    ("非流動資產合計", "total_non_current_assets"),
    ("資產總計", "total_assets"),
    ("資產總額", "total_assets"),
    ("資產合計", "total_assets"),
    ("短期借款", "short_term_borrowings"),
    ("應付帳款", "accounts_payable"),
    ("流動負債合計", "total_current_liabilities"),
    ("應付公司債", "bonds_payable"),
    ("長期借款", "long_term_borrowings"),
    ("非流動負債合計", "total_non_current_liabilities"),
    ("負債總計", "total_liabilities"),
    ("負債總額", "total_liabilities"),
    ("負債合計", "total_liabilities"),
    ("股本合計", "capital_stock"),
    ("普通股股本", "capital_stock"),
    ("資本公積合計", "capital_surplus"),
    ("保留盈餘合計", "retained_earnings"),
    ("其他權益合計", "other_equity"),
    ("庫藏股票", "treasury_stock"),
    ("歸屬於母公司業主之權益合計", "equity_attributable_to_owners_of_parent"),
    ("非控制權益", "non_controlling_interests"),
    ("權益總計", "total_equity"),
    ("權益總額", "total_equity"),
    ("權益合計", "total_equity"),
    ("負債及權益總計", "total_liabilities_and_equity"),
    ("負債及權益總額", "total_liabilities_and_equity"),
];

/// Fixed per-statement normalization settings
#[derive(Debug, Clone)]
pub struct StatementProfile {
    pub kind: StatementKind,
    pub canonical_keys: Vec<&'static str>,
    translations: HashMap<&'static str, &'static str>,
}

impl StatementProfile {
    pub fn new(
        kind: StatementKind,
        canonical_keys: &[&'static str],
        translations: &[(&'static str, &'static str)],
    ) -> Self {
        Self {
            kind,
            canonical_keys: canonical_keys.to_vec(),
            translations: translations.iter().copied().collect(),
        }
    }

    pub fn balance_sheet() -> Self {
        Self::new(
            StatementKind::BalanceSheet,
            BALANCE_SHEET_KEYS,
            BALANCE_SHEET_LABELS,
        )
    }

    pub fn for_kind(kind: StatementKind) -> Self {
        match kind {
            StatementKind::BalanceSheet => Self::balance_sheet(),
        }
    }

    /// Canonical name for a source label; unknown labels pass through trimmed
    pub fn canonical_name<'a>(&self, label: &'a str) -> &'a str {
        let label = label.trim();
        self.translations.get(label).copied().unwrap_or(label)
    }

    /// Rename every row label to its canonical name
    pub fn translate(&self, record: &RawRecord) -> RawRecord {
        RawRecord::new(
            record
                .rows
                .iter()
                .map(|(label, value)| (self.canonical_name(label).to_string(), value.clone()))
                .collect(),
        )
    }

    /// Project a translated record onto the canonical keys, in order.
    /// Keys absent from the record map to null.
    pub fn project(&self, record: &RawRecord) -> Map<String, Value> {
        let mut fields = Map::new();
        for key in &self.canonical_keys {
            let value = match record.get(key) {
                Some(value) => value.clone(),
                None => {
                    debug!("{} has no value for {}", self.kind, key);
                    Value::Null
                }
            };
            fields.insert(key.to_string(), value);
        }
        fields
    }

    /// Translate then project
    pub fn normalize(&self, record: &RawRecord) -> Map<String, Value> {
        self.project(&self.translate(record))
    }
}
