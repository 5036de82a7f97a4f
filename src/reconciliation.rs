// 🧾 Reconciliation Engine - Pair statement transactions with tracked expenses
//
// reconcile = assign (greedy one-to-one) + build_report (partition + summary)
//
// Matches at or above 0.8 confidence count as "matched", weaker ones stay
// "pending" until a user confirms or rejects them.

use crate::assignment::{AssignmentEngine, MatchResult};
use crate::merchant::MerchantNormalizer;
use crate::records::{fill_missing_ids, ExpenseRecord, MatchStatus, Record, Transaction};
use crate::scoring::MatchScorer;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

/// Confidence at or above which a match no longer needs review
pub const CONFIRMED_THRESHOLD: f64 = 0.8;

/// Status a transaction takes when matched with the given confidence
pub fn status_for_confidence(confidence: f64) -> MatchStatus {
    if confidence >= CONFIRMED_THRESHOLD {
        MatchStatus::Matched
    } else {
        MatchStatus::Pending
    }
}

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationSummary {
    pub total_transactions: usize,
    pub total_expenses: usize,
    /// Matches with confidence ≥ 0.8
    pub matched_count: usize,
    /// Matches with confidence < 0.8
    pub pending_count: usize,
    pub unmatched_transaction_count: usize,
    pub unmatched_expense_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    /// Every input transaction, annotated with its match state
    pub transactions: Vec<Transaction>,
    pub expenses: Vec<ExpenseRecord>,
    pub matches: Vec<MatchResult>,
    pub unmatched_transactions: Vec<Transaction>,
    pub unmatched_expenses: Vec<ExpenseRecord>,
    pub summary: ReconciliationSummary,
}

impl ReconciliationReport {
    /// Matches that need no review (confidence ≥ 0.8)
    pub fn confirmed(&self) -> Vec<&MatchResult> {
        self.matches
            .iter()
            .filter(|m| m.confidence >= CONFIRMED_THRESHOLD)
            .collect()
    }

    /// Matches awaiting user review (confidence < 0.8)
    pub fn pending(&self) -> Vec<&MatchResult> {
        self.matches
            .iter()
            .filter(|m| m.confidence < CONFIRMED_THRESHOLD)
            .collect()
    }

    /// Sum of expense amounts across confirmed matches
    pub fn matched_total(&self) -> f64 {
        self.confirmed().iter().map(|m| m.expense.amount).sum()
    }

    /// One row per transaction for the persistence layer
    pub fn match_updates(&self) -> Vec<MatchUpdate> {
        self.transactions.iter().map(MatchUpdate::from).collect()
    }

    pub fn summary_line(&self) -> String {
        format!(
            "Reconciliation: {} transactions, {} expenses → {} matched, {} pending, {} unmatched transactions, {} unmatched expenses",
            self.summary.total_transactions,
            self.summary.total_expenses,
            self.summary.matched_count,
            self.summary.pending_count,
            self.summary.unmatched_transaction_count,
            self.summary.unmatched_expense_count,
        )
    }
}

// ============================================================================
// MATCH UPDATE (persistence-facing)
// ============================================================================

/// The matching columns of one transaction, as a persistence layer stores them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchUpdate {
    pub transaction_id: String,
    pub matched_expense_id: Option<String>,
    pub match_status: MatchStatus,
    pub match_confidence: Option<f64>,
}

impl From<&Transaction> for MatchUpdate {
    fn from(tx: &Transaction) -> Self {
        MatchUpdate {
            transaction_id: tx.id.clone(),
            matched_expense_id: tx.matched_expense_id.clone(),
            match_status: tx.match_status,
            match_confidence: tx.match_confidence,
        }
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ReconciliationEngine {
    assigner: AssignmentEngine,
}

impl ReconciliationEngine {
    /// Engine backed by the given merchant alias table
    pub fn new(normalizer: MerchantNormalizer) -> Self {
        ReconciliationEngine {
            assigner: AssignmentEngine::new(MatchScorer::new(normalizer)),
        }
    }

    pub fn assigner(&self) -> &AssignmentEngine {
        &self.assigner
    }

    pub fn normalizer(&self) -> &MerchantNormalizer {
        self.assigner.scorer().normalizer()
    }

    /// Match transactions to expenses and build the report.
    ///
    /// Records without an id get a fingerprint id first, so the report
    /// always carries the ids matching was done on.
    pub fn reconcile(&self, transactions: &[Transaction], expenses: &[ExpenseRecord]) -> ReconciliationReport {
        let transactions = with_ids(transactions);
        let expenses = with_ids(expenses);

        let matches = self.assigner.assign(&transactions, &expenses);
        let report = build_report(&transactions, &expenses, matches);

        tracing::info!(
            transactions = report.summary.total_transactions,
            expenses = report.summary.total_expenses,
            matched = report.summary.matched_count,
            pending = report.summary.pending_count,
            unmatched_transactions = report.summary.unmatched_transaction_count,
            unmatched_expenses = report.summary.unmatched_expense_count,
            "reconciliation complete"
        );

        report
    }
}

/// Borrow the records as-is unless some of them lack an id
fn with_ids<T: Record + Clone>(records: &[T]) -> Cow<'_, [T]> {
    if records.iter().all(|r| !r.record_id().is_empty()) {
        return Cow::Borrowed(records);
    }

    let mut owned = records.to_vec();
    fill_missing_ids(&mut owned);
    Cow::Owned(owned)
}

/// Partition records by membership in `matches` and tally the summary.
///
/// Pure: the same inputs always give the same report. Ids are expected to
/// be non-empty and unique; [`ReconciliationEngine::reconcile`] ensures the
/// first.
pub fn build_report(
    transactions: &[Transaction],
    expenses: &[ExpenseRecord],
    matches: Vec<MatchResult>,
) -> ReconciliationReport {
    let by_transaction: HashMap<&str, &MatchResult> = matches
        .iter()
        .map(|m| (m.transaction.id.as_str(), m))
        .collect();
    let matched_expense_ids: HashSet<&str> = matches.iter().map(|m| m.expense.id.as_str()).collect();

    let annotated: Vec<Transaction> = transactions
        .iter()
        .map(|tx| {
            let mut tx = tx.clone();
            match by_transaction.get(tx.id.as_str()) {
                Some(m) => {
                    tx.match_status = status_for_confidence(m.confidence);
                    tx.matched_expense_id = Some(m.expense.id.clone());
                    tx.match_confidence = Some(m.confidence);
                }
                None => {
                    tx.match_status = MatchStatus::Unmatched;
                    tx.matched_expense_id = None;
                    tx.match_confidence = None;
                }
            }
            tx
        })
        .collect();

    let unmatched_transactions: Vec<Transaction> = annotated
        .iter()
        .filter(|tx| !by_transaction.contains_key(tx.id.as_str()))
        .cloned()
        .collect();

    let unmatched_expenses: Vec<ExpenseRecord> = expenses
        .iter()
        .filter(|exp| !matched_expense_ids.contains(exp.id.as_str()))
        .cloned()
        .collect();

    let matched_count = matches
        .iter()
        .filter(|m| m.confidence >= CONFIRMED_THRESHOLD)
        .count();

    let summary = ReconciliationSummary {
        total_transactions: transactions.len(),
        total_expenses: expenses.len(),
        matched_count,
        pending_count: matches.len() - matched_count,
        unmatched_transaction_count: unmatched_transactions.len(),
        unmatched_expense_count: unmatched_expenses.len(),
    };

    ReconciliationReport {
        transactions: annotated,
        expenses: expenses.to_vec(),
        matches,
        unmatched_transactions,
        unmatched_expenses,
        summary,
    }
}

// ============================================================================
// MANUAL OVERRIDES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideOutcome {
    /// The transaction's match state changed
    Applied,

    /// The transaction was already in the requested state
    Unchanged,
}

/// Force a transaction to "matched" with the chosen expense, bypassing the scorer.
///
/// Confirming the pair it is already matched to is a no-op.
pub fn confirm_match(
    transaction: &mut Transaction,
    expense_id: &str,
    confidence: Option<f64>,
) -> OverrideOutcome {
    if transaction.match_status == MatchStatus::Matched
        && transaction.matched_expense_id.as_deref() == Some(expense_id)
    {
        return OverrideOutcome::Unchanged;
    }

    transaction.match_status = MatchStatus::Matched;
    transaction.matched_expense_id = Some(expense_id.to_string());
    transaction.match_confidence = confidence;

    tracing::debug!(transaction = %transaction.id, expense = expense_id, "match confirmed");
    OverrideOutcome::Applied
}

/// Force a transaction back to "unmatched". Rejecting twice is a no-op.
pub fn reject_match(transaction: &mut Transaction) -> OverrideOutcome {
    if transaction.match_status == MatchStatus::Unmatched
        && transaction.matched_expense_id.is_none()
        && transaction.match_confidence.is_none()
    {
        return OverrideOutcome::Unchanged;
    }

    transaction.match_status = MatchStatus::Unmatched;
    transaction.matched_expense_id = None;
    transaction.match_confidence = None;

    tracing::debug!(transaction = %transaction.id, "match rejected");
    OverrideOutcome::Applied
}

// ============================================================================
// TESTS
// ============================================================================
