// 🔍 Duplicate Detector - Catch an expense that was already recorded
//
// Expense-to-expense check run before a new expense is committed
// (e.g. the same receipt uploaded twice). Additive points:
//
//   amount    equal (±0.01 or <0.1%)              +40
//   merchant  same name +40 / similar name        +20
//   date      same calendar day +15 / ≤ 7 days    +5
//   currency  equal                               +5
//
// Points / 100 ≥ 0.7 → duplicate. Integer points keep the sum free of
// floating-point drift right at the threshold.

use crate::merchant::MerchantNormalizer;
use crate::records::ExpenseRecord;
use serde::{Deserialize, Serialize};

/// Similarity at or above which two expenses are duplicates
pub const DUPLICATE_THRESHOLD: f64 = 0.7;

const AMOUNT_POINTS: u32 = 40;
const SAME_MERCHANT_POINTS: u32 = 40;
const SIMILAR_MERCHANT_POINTS: u32 = 20;
const SAME_DAY_POINTS: u32 = 15;
const NEAR_DATE_POINTS: u32 = 5;
const CURRENCY_POINTS: u32 = 5;

/// Absolute amount difference treated as rounding noise
const AMOUNT_ABSOLUTE_TOLERANCE: f64 = 0.01;

/// Relative amount difference treated as rounding noise (0.1%)
const AMOUNT_RELATIVE_TOLERANCE: f64 = 0.001;

const MERCHANT_PREFIX_LENGTH: usize = 5;
const NEAR_DATE_DAYS: i64 = 7;

// ============================================================================
// RESULTS
// ============================================================================

/// Outcome of comparing two expenses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateCheck {
    pub is_duplicate: bool,

    /// 0.0 - 1.0
    pub similarity: f64,

    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateMatch {
    /// The expense being checked
    pub candidate: ExpenseRecord,

    /// The already-recorded expense it duplicates
    pub existing: ExpenseRecord,

    pub similarity: f64,
    pub reasons: Vec<String>,
}

impl DuplicateMatch {
    /// Reasons joined for display, e.g. "same amount, same merchant, same day"
    pub fn reason(&self) -> String {
        self.reasons.join(", ")
    }
}

// ============================================================================
// DUPLICATE DETECTOR
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct DuplicateDetector {
    normalizer: MerchantNormalizer,
}

impl DuplicateDetector {
    pub fn new(normalizer: MerchantNormalizer) -> Self {
        DuplicateDetector { normalizer }
    }

    /// Compare two expenses. Symmetric: `check_pair(a, b) == check_pair(b, a)`.
    pub fn check_pair(&self, a: &ExpenseRecord, b: &ExpenseRecord) -> DuplicateCheck {
        let mut points = 0;
        let mut reasons = Vec::new();

        if amounts_equal(a.amount, b.amount) {
            points += AMOUNT_POINTS;
            reasons.push("same amount".to_string());
        }

        let merchant_a = self.comparable_merchant(&a.merchant);
        let merchant_b = self.comparable_merchant(&b.merchant);
        if merchant_a == merchant_b {
            points += SAME_MERCHANT_POINTS;
            reasons.push("same merchant".to_string());
        } else if merchants_similar(&merchant_a, &merchant_b) {
            points += SIMILAR_MERCHANT_POINTS;
            reasons.push("similar merchant".to_string());
        }

        if let (Some(date_a), Some(date_b)) = (a.parsed_date(), b.parsed_date()) {
            let days = (date_a.date() - date_b.date()).num_days().abs();
            if days == 0 {
                points += SAME_DAY_POINTS;
                reasons.push("same day".to_string());
            } else if days <= NEAR_DATE_DAYS {
                points += NEAR_DATE_POINTS;
                reasons.push("within 7 days".to_string());
            }
        }

        if a.currency == b.currency {
            points += CURRENCY_POINTS;
            reasons.push("same currency".to_string());
        }

        let similarity = points as f64 / 100.0;

        DuplicateCheck {
            is_duplicate: similarity >= DUPLICATE_THRESHOLD,
            similarity,
            reasons,
        }
    }

    /// Existing expenses that look like duplicates of `candidate`, most similar first.
    ///
    /// Records sharing the candidate's (non-empty) id are skipped. Ties keep
    /// `existing` order.
    pub fn find_duplicates(&self, candidate: &ExpenseRecord, existing: &[ExpenseRecord]) -> Vec<DuplicateMatch> {
        let mut duplicates: Vec<DuplicateMatch> = existing
            .iter()
            .filter(|other| candidate.id.is_empty() || other.id != candidate.id)
            .filter_map(|other| {
                let check = self.check_pair(candidate, other);
                check.is_duplicate.then(|| DuplicateMatch {
                    candidate: candidate.clone(),
                    existing: other.clone(),
                    similarity: check.similarity,
                    reasons: check.reasons,
                })
            })
            .collect();

        duplicates.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

        tracing::info!(
            candidate = %candidate.id,
            checked = existing.len(),
            duplicates = duplicates.len(),
            "duplicate check complete"
        );

        duplicates
    }

    /// Alias-resolved, lower-cased, whitespace-collapsed merchant
    fn comparable_merchant(&self, merchant: &str) -> String {
        self.normalizer
            .normalize(merchant)
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn amounts_equal(a: f64, b: f64) -> bool {
    let diff = (a - b).abs();
    if diff <= AMOUNT_ABSOLUTE_TOLERANCE {
        return true;
    }

    let larger = a.max(b);
    larger > 0.0 && diff / larger < AMOUNT_RELATIVE_TOLERANCE
}

/// Containment either way, or a shared 5-char prefix when both are that long
fn merchants_similar(a: &str, b: &str) -> bool {
    if a.contains(b) || b.contains(a) {
        return true;
    }

    let prefix_a: Vec<char> = a.chars().take(MERCHANT_PREFIX_LENGTH).collect();
    let prefix_b: Vec<char> = b.chars().take(MERCHANT_PREFIX_LENGTH).collect();

    prefix_a.len() == MERCHANT_PREFIX_LENGTH && prefix_a == prefix_b
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> DuplicateDetector {
        DuplicateDetector::new(MerchantNormalizer::with_defaults())
    }

    fn expense(id: &str, date: &str, merchant: &str, amount: f64) -> ExpenseRecord {
        ExpenseRecord::new(id, date, merchant, amount, "USD")
    }

    #[test]
    fn test_hilton_duplicate() {
        let a = expense("a", "2024-01-10", "Hilton Hotel", 200.00);
        let b = expense("b", "2024-01-10", "HILTON", 200.00);

        let check = detector().check_pair(&a, &b);

        assert!(check.is_duplicate);
        assert_eq!(check.similarity, 1.0);
        assert_eq!(
            check.reasons,
            vec!["same amount", "same merchant", "same day", "same currency"]
        );
    }

    #[test]
    fn test_amount_tolerance() {
        assert!(amounts_equal(200.00, 200.01));
        assert!(amounts_equal(5000.0, 5004.0)); // 0.08%
        assert!(!amounts_equal(5000.0, 5006.0)); // 0.12%
        assert!(!amounts_equal(10.0, 10.5));
        assert!(amounts_equal(0.0, 0.0));
    }

    #[test]
    fn test_similar_merchant() {
        assert!(merchants_similar("blue bottle", "blue bottle coffee"));
        assert!(merchants_similar("corner shop", "corner store"));
        assert!(merchants_similar("cafe", "cafe nero 2"));
        assert!(!merchants_similar("abcd", "abcx"));
        assert!(!merchants_similar("corner shop", "shop corner"));
    }

    #[test]
    fn test_merchant_whitespace_and_case() {
        let a = expense("a", "2024-01-10", "  Corner   Shop ", 61.0);
        let b = expense("b", "2024-01-10", "corner shop", 61.0);

        let check = detector().check_pair(&a, &b);
        assert!(check.reasons.contains(&"same merchant".to_string()));
    }

    #[test]
    fn test_date_tiers() {
        let d = detector();
        let base = expense("a", "2024-01-10 09:00:00", "Corner Shop", 61.0);

        // Same calendar day even though hours apart
        let same_day = expense("b", "2024-01-10 21:30:00", "Corner Shop", 61.0);
        assert!(d.check_pair(&base, &same_day).reasons.contains(&"same day".to_string()));

        let week = expense("c", "2024-01-17", "Corner Shop", 61.0);
        let check = d.check_pair(&base, &week);
        assert!(check.reasons.contains(&"within 7 days".to_string()));
        assert_eq!(check.similarity, 0.9);

        let far = expense("d", "2024-01-18", "Corner Shop", 61.0);
        let check = d.check_pair(&base, &far);
        assert_eq!(check.similarity, 0.85);
        assert!(!check.reasons.iter().any(|r| r.contains("day")));
    }

    #[test]
    fn test_threshold_boundary() {
        let d = detector();

        // amount 40 + similar 20 + near date 5 + currency 5 = 70
        let a = expense("a", "2024-01-10", "Corner Shop", 61.0);
        let b = expense("b", "2024-01-12", "Corner Store", 61.0);
        let check = d.check_pair(&a, &b);
        assert_eq!(check.similarity, 0.7);
        assert!(check.is_duplicate);

        // Different currency drops it to 65
        let mut c = b.clone();
        c.currency = "EUR".to_string();
        let check = d.check_pair(&a, &c);
        assert_eq!(check.similarity, 0.65);
        assert!(!check.is_duplicate);
    }

    #[test]
    fn test_unparsable_date_gets_no_points() {
        let a = expense("a", "someday", "Hilton", 200.0);
        let b = expense("b", "2024-01-10", "Hilton", 200.0);

        let check = detector().check_pair(&a, &b);
        assert_eq!(check.similarity, 0.85);
        assert!(check.is_duplicate);
    }

    #[test]
    fn test_check_pair_is_symmetric() {
        let d = detector();
        let records = vec![
            expense("a", "2024-01-10", "Hilton Hotel", 200.0),
            expense("b", "2024-01-12", "HILTON", 200.1),
            expense("c", "2024-01-10", "Corner Shop", 5000.0),
            expense("d", "2024-01-16", "corner store", 5004.0),
            expense("e", "bad date", "Blue Bottle Coffee", 6.5),
            ExpenseRecord::new("f", "2024-01-10", "blue bottle", 6.5, "EUR"),
        ];

        for a in &records {
            for b in &records {
                assert_eq!(d.check_pair(a, b), d.check_pair(b, a), "{} vs {}", a.id, b.id);
            }
        }
    }

    #[test]
    fn test_find_duplicates() {
        let candidate = expense("new", "2024-01-10", "Hilton Hotel", 200.0);
        let existing = vec![
            expense("new", "2024-01-10", "Hilton Hotel", 200.0), // same id - skipped
            expense("e1", "2024-01-14", "HILTON", 200.0),
            expense("e2", "2024-01-10", "Uber", 18.0),
            expense("e3", "2024-01-10", "HILTON", 200.0),
        ];

        let duplicates = detector().find_duplicates(&candidate, &existing);

        assert_eq!(duplicates.len(), 2);
        assert_eq!(duplicates[0].existing.id, "e3");
        assert_eq!(duplicates[0].similarity, 1.0);
        assert_eq!(duplicates[1].existing.id, "e1");
        assert_eq!(duplicates[1].reason(), "same amount, same merchant, within 7 days, same currency");
    }

    #[test]
    fn test_find_duplicates_ties_keep_order() {
        let candidate = expense("new", "2024-01-10", "Uber", 18.0);
        let existing = vec![
            expense("e1", "2024-01-10", "UBER *TRIP", 18.0),
            expense("e2", "2024-01-10", "uber", 18.0),
        ];

        let duplicates = detector().find_duplicates(&candidate, &existing);

        assert_eq!(duplicates.len(), 2);
        assert_eq!(duplicates[0].existing.id, "e1");
        assert_eq!(duplicates[1].existing.id, "e2");
    }

    #[test]
    fn test_find_duplicates_without_ids() {
        // An id-less candidate must not hide id-less existing records
        let candidate = expense("", "2024-01-10", "Hilton Hotel", 200.0);
        let existing = vec![
            expense("", "2024-01-10", "HILTON", 200.0),
            expense("", "2024-01-11", "Hilton", 200.0),
        ];

        let duplicates = detector().find_duplicates(&candidate, &existing);

        assert_eq!(duplicates.len(), 2);
        assert_eq!(duplicates[0].similarity, 1.0);
    }

    #[test]
    fn test_similarity_tops_out_at_one() {
        let a = expense("a", "2024-01-10", "Uber", 18.0);
        let check = detector().check_pair(&a, &a.clone());

        assert_eq!(check.similarity, 1.0);
        assert_eq!(check.reasons.len(), 4);
    }

    #[test]
    fn test_find_duplicates_empty() {
        let candidate = expense("new", "2024-01-10", "Uber", 18.0);
        assert!(detector().find_duplicates(&candidate, &[]).is_empty());
    }
}
