// 📄 Records - Imported transactions and tracked expenses
// Structured inputs handed to the reconciliation core by its collaborators
//
// Amounts are always stored as non-negative magnitudes. The direction of a
// transaction lives in `transaction_type`, never in the sign of `amount`.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

// ============================================================================
// ENUMS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    #[default]
    Purchase,
    Refund,
    Fee,
    Payment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    #[default]
    Unmatched,
    Pending,
    Matched,
}

// ============================================================================
// TRANSACTION (external, from a card or bank statement)
// ============================================================================

/// A financial transaction imported from a statement.
///
/// Created at import time. The matching fields (`match_status`,
/// `matched_expense_id`, `match_confidence`) only change through assignment
/// or an explicit user override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default)]
    pub id: String,

    pub date: String,

    /// Raw merchant text as printed on the statement
    pub merchant: String,

    #[serde(deserialize_with = "deserialize_magnitude")]
    pub amount: f64,

    pub currency: String,

    #[serde(default)]
    pub transaction_type: TransactionType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter_party: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_last4: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_date: Option<String>,

    // ========================================================================
    // MATCHING STATE
    // ========================================================================
    #[serde(default)]
    pub match_status: MatchStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_expense_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_confidence: Option<f64>,
}

impl Transaction {
    /// Create an unmatched purchase. Signed amounts are stored as magnitudes.
    pub fn new(id: &str, date: &str, merchant: &str, amount: f64, currency: &str) -> Self {
        Transaction {
            id: id.to_string(),
            date: date.to_string(),
            merchant: merchant.to_string(),
            amount: amount.abs(),
            currency: currency.to_string(),
            transaction_type: TransactionType::Purchase,
            counter_party: None,
            reference_number: None,
            account_number: None,
            card_last4: None,
            description: None,
            statement_id: None,
            category: None,
            location: None,
            post_date: None,
            match_status: MatchStatus::Unmatched,
            matched_expense_id: None,
            match_confidence: None,
        }
    }

    pub fn with_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = transaction_type;
        self
    }

    /// Parsed transaction date, `None` when the text is not a recognized date
    pub fn parsed_date(&self) -> Option<NaiveDateTime> {
        parse_record_date(&self.date)
    }

    /// Two-decimal display form of the amount
    pub fn display_amount(&self) -> String {
        format!("{:.2} {}", self.amount, self.currency)
    }
}

// ============================================================================
// EXPENSE RECORD (internal, owned by the expense tracker)
// ============================================================================

/// An expense tracked internally (usually created from a receipt).
///
/// Read-only to the reconciliation core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseRecord {
    #[serde(default)]
    pub id: String,

    pub date: String,

    pub merchant: String,

    #[serde(deserialize_with = "deserialize_magnitude")]
    pub amount: f64,

    pub currency: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<String>,

    #[serde(default)]
    pub is_personal_expense: bool,

    #[serde(default)]
    pub selected: bool,
}

impl ExpenseRecord {
    pub fn new(id: &str, date: &str, merchant: &str, amount: f64, currency: &str) -> Self {
        ExpenseRecord {
            id: id.to_string(),
            date: date.to_string(),
            merchant: merchant.to_string(),
            amount: amount.abs(),
            currency: currency.to_string(),
            category: None,
            tax: None,
            trip_id: None,
            is_personal_expense: false,
            selected: false,
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn parsed_date(&self) -> Option<NaiveDateTime> {
        parse_record_date(&self.date)
    }

    pub fn display_amount(&self) -> String {
        format!("{:.2} {}", self.amount, self.currency)
    }
}

fn deserialize_magnitude<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    Ok(value.abs())
}

// ============================================================================
// DATES
// ============================================================================

/// Parse an ISO-8601 date or date-time (also accepts MM/DD/YYYY).
///
/// Date-only values resolve to midnight so day differences come out whole.
pub fn parse_record_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }

    for format in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}

// ============================================================================
// IDENTITY
// ============================================================================

/// Records that can be given a deterministic id when the source omitted one
pub trait Record {
    fn record_id(&self) -> &str;

    /// Fill an empty id from the record's content and its position in the source
    fn fill_missing_id(&mut self, position: usize);
}

impl Record for Transaction {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn fill_missing_id(&mut self, position: usize) {
        if self.id.is_empty() {
            self.id = fingerprint(
                "tx",
                &[&self.date, &format!("{:.4}", self.amount), &self.merchant, &self.currency],
                position,
            );
        }
    }
}

impl Record for ExpenseRecord {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn fill_missing_id(&mut self, position: usize) {
        if self.id.is_empty() {
            self.id = fingerprint(
                "exp",
                &[&self.date, &format!("{:.4}", self.amount), &self.merchant, &self.currency],
                position,
            );
        }
    }
}

/// Give every record with an empty id a fingerprint id based on its position.
///
/// Returns how many ids were filled.
pub fn fill_missing_ids<T: Record>(records: &mut [T]) -> usize {
    let mut filled = 0;
    for (position, record) in records.iter_mut().enumerate() {
        if record.record_id().is_empty() {
            record.fill_missing_id(position);
            filled += 1;
        }
    }
    filled
}

fn fingerprint(prefix: &str, fields: &[&str], position: usize) -> String {
    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update(field.as_bytes());
        hasher.update([0x1f]);
    }
    hasher.update(position.to_le_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{}-{}", prefix, &digest[..16])
}

// ============================================================================
// LOADERS
// ============================================================================

/// Load transactions from a `.csv` file or a JSON array
pub fn load_transactions(path: &Path) -> Result<Vec<Transaction>> {
    load_records(path)
}

/// Load expense records from a `.csv` file or a JSON array
pub fn load_expenses(path: &Path) -> Result<Vec<ExpenseRecord>> {
    load_records(path)
}

/// Load a single expense (JSON object), e.g. a freshly scanned receipt
pub fn load_expense(path: &Path) -> Result<ExpenseRecord> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read expense file: {:?}", path))?;

    let mut expense: ExpenseRecord =
        serde_json::from_str(&content).context("Failed to parse expense JSON")?;
    expense.fill_missing_id(0);

    Ok(expense)
}

fn load_records<T>(path: &Path) -> Result<Vec<T>>
where
    T: DeserializeOwned + Record,
{
    let is_csv = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    let mut records: Vec<T> = if is_csv {
        let mut rdr = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open CSV file: {:?}", path))?;

        let mut records = Vec::new();
        for (line, result) in rdr.deserialize().enumerate() {
            let record: T = result
                .with_context(|| format!("Failed to deserialize record {} in {:?}", line + 1, path))?;
            records.push(record);
        }
        records
    } else {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read records file: {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse records JSON: {:?}", path))?
    };

    let filled = fill_missing_ids(&mut records);

    tracing::debug!(count = records.len(), filled, path = ?path, "loaded records");

    Ok(records)
}

// ============================================================================
// TESTS
// ============================================================================
