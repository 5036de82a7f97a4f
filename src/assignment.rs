// 🔗 Assignment Engine - Greedy one-to-one matching
//
// Every transaction/expense pair is scored, weak pairs are dropped, and the
// rest are accepted best-first as long as neither side is already taken.
// Earlier commitments are never revisited, so the result is a maximal
// matching but not necessarily the highest-scoring one.

use crate::records::{ExpenseRecord, Transaction};
use crate::scoring::MatchScorer;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Confidence at or above which a match is "exact"
pub const EXACT_THRESHOLD: f64 = 0.9;

/// Confidence at or above which a match is "fuzzy"
pub const FUZZY_THRESHOLD: f64 = 0.7;

// ============================================================================
// MATCH TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// confidence ≥ 0.9
    Exact,

    /// 0.7 ≤ confidence < 0.9
    Fuzzy,

    /// confidence < 0.7
    Partial,
}

impl MatchType {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= EXACT_THRESHOLD {
            MatchType::Exact
        } else if confidence >= FUZZY_THRESHOLD {
            MatchType::Fuzzy
        } else {
            MatchType::Partial
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Exact => "exact",
            MatchType::Fuzzy => "fuzzy",
            MatchType::Partial => "partial",
        }
    }
}

// ============================================================================
// MATCH RESULT
// ============================================================================

/// An accepted transaction/expense pairing.
///
/// Within one assignment run a transaction id or expense id appears in at
/// most one result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub transaction: Transaction,
    pub expense: ExpenseRecord,
    pub match_type: MatchType,
    /// Scorer total, roughly 0.5 - 1.2
    pub confidence: f64,
    pub reasons: Vec<String>,
}

// ============================================================================
// ASSIGNMENT ENGINE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct AssignmentEngine {
    scorer: MatchScorer,
}

impl AssignmentEngine {
    pub fn new(scorer: MatchScorer) -> Self {
        AssignmentEngine { scorer }
    }

    pub fn scorer(&self) -> &MatchScorer {
        &self.scorer
    }

    /// Match transactions to expenses, best pairs first.
    ///
    /// Equal scores keep pair enumeration order (transactions outer,
    /// expenses inner), which makes the output deterministic. Results are
    /// sorted by confidence, highest first.
    pub fn assign(&self, transactions: &[Transaction], expenses: &[ExpenseRecord]) -> Vec<MatchResult> {
        let mut candidates = self.scorer.candidates(transactions, expenses);
        let candidate_count = candidates.len();

        // Stable sort keeps enumeration order for ties
        candidates.sort_by(|a, b| b.score.total.total_cmp(&a.score.total));

        let mut used_transactions: HashSet<&str> = HashSet::new();
        let mut used_expenses: HashSet<&str> = HashSet::new();
        let mut matches = Vec::new();

        for candidate in candidates {
            let tx_id = candidate.transaction.id.as_str();
            let exp_id = candidate.expense.id.as_str();

            if used_transactions.contains(tx_id) || used_expenses.contains(exp_id) {
                continue;
            }

            used_transactions.insert(tx_id);
            used_expenses.insert(exp_id);

            matches.push(MatchResult {
                transaction: candidate.transaction.clone(),
                expense: candidate.expense.clone(),
                match_type: MatchType::from_confidence(candidate.score.total),
                confidence: candidate.score.total,
                reasons: candidate.score.reasons,
            });
        }

        matches.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        tracing::debug!(
            transactions = transactions.len(),
            expenses = expenses.len(),
            candidates = candidate_count,
            matches = matches.len(),
            "assignment pass complete"
        );

        matches
    }
}

// ============================================================================
// TESTS
// ============================================================================
