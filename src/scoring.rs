// ⚖️ Match Scorer - Weighted confidence for a transaction/expense pair
//
//   total = 0.4·amount + 0.3·date + 0.2·merchant + category_bonus
//
// The category bonus is added on top of the weighted sum and the total is
// never capped, so a perfect pair with a category match scores above 1.0.
// Totals are rounded to 9 decimals so tier thresholds compare cleanly.

use crate::merchant::MerchantNormalizer;
use crate::records::{ExpenseRecord, Transaction};
use crate::similarity::merchant_similarity;
use serde::Serialize;

// ============================================================================
// WEIGHTS & THRESHOLDS
// ============================================================================

pub const AMOUNT_WEIGHT: f64 = 0.4;
pub const DATE_WEIGHT: f64 = 0.3;
pub const MERCHANT_WEIGHT: f64 = 0.2;

/// Amount differences up to this value still count as an exact amount
pub const AMOUNT_TOLERANCE: f64 = 1.0;

pub const CATEGORY_EXACT_BONUS: f64 = 0.2;
pub const CATEGORY_PARTIAL_BONUS: f64 = 0.1;

/// Pairs scoring below this are never offered to the assignment engine
pub const MIN_CANDIDATE_SCORE: f64 = 0.5;

const MILLIS_PER_DAY: f64 = 1000.0 * 60.0 * 60.0 * 24.0;

/// Totals are rounded to this many decimal places
const TOTAL_PRECISION: f64 = 1e9;

// ============================================================================
// MATCH SCORE
// ============================================================================

/// Score breakdown for one pair. Factor scores are in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchScore {
    pub total: f64,
    pub amount: f64,
    pub date: f64,
    pub merchant: f64,
    /// Unweighted bonus: 0.0, 0.1 or 0.2
    pub category: f64,
    /// Display notes, e.g. "Exact amount match"
    pub reasons: Vec<String>,
}

/// A scored pair that cleared [`MIN_CANDIDATE_SCORE`]
#[derive(Debug, Clone)]
pub struct MatchCandidate<'a> {
    pub transaction: &'a Transaction,
    pub expense: &'a ExpenseRecord,
    pub score: MatchScore,
}

// ============================================================================
// MATCH SCORER
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct MatchScorer {
    normalizer: MerchantNormalizer,
}

impl MatchScorer {
    pub fn new(normalizer: MerchantNormalizer) -> Self {
        MatchScorer { normalizer }
    }

    pub fn normalizer(&self) -> &MerchantNormalizer {
        &self.normalizer
    }

    /// Score a transaction against an expense
    pub fn score(&self, transaction: &Transaction, expense: &ExpenseRecord) -> MatchScore {
        let mut reasons = Vec::new();

        // 1. Amount (40%)
        let amount_diff = (transaction.amount - expense.amount).abs();
        let amount = amount_score(amount_diff);
        if amount == 1.0 {
            reasons.push("Exact amount match".to_string());
        } else if amount >= 0.8 {
            reasons.push(format!("Amount difference: {:.2}", amount_diff));
        }

        // 2. Date (30%)
        let date = match day_difference(transaction, expense) {
            Some(days) => {
                let score = date_score(days);
                if days <= 1.0 {
                    reasons.push("Same day".to_string());
                } else if days <= 7.0 {
                    reasons.push(format!("Within {} days", days.round() as i64));
                } else if score > 0.0 {
                    reasons.push(format!("Date difference: {} days", days.round() as i64));
                }
                score
            }
            None => 0.0,
        };

        // 3. Merchant (20%)
        let tx_merchant = self.normalizer.normalize(&transaction.merchant);
        let exp_merchant = self.normalizer.normalize(&expense.merchant);
        let merchant = merchant_similarity(&self.normalizer, &tx_merchant, &exp_merchant);
        if merchant >= 0.9 {
            reasons.push("Merchant name match".to_string());
        } else if merchant >= 0.7 {
            reasons.push("Similar merchant name".to_string());
        } else if merchant >= 0.5 {
            reasons.push("Partial merchant match".to_string());
        }

        // 4. Category bonus (added on top)
        let category = self.category_bonus(transaction, expense, &mut reasons);

        let weighted = amount * AMOUNT_WEIGHT + date * DATE_WEIGHT + merchant * MERCHANT_WEIGHT + category;
        // 0.4 + 0.3 + 0.2 sums to 0.8999999999999999 without this
        let total = (weighted * TOTAL_PRECISION).round() / TOTAL_PRECISION;

        MatchScore {
            total,
            amount,
            date,
            merchant,
            category,
            reasons,
        }
    }

    /// Score every transaction/expense pair, keeping those at or above
    /// [`MIN_CANDIDATE_SCORE`] in enumeration order (transaction-major)
    pub fn candidates<'a>(
        &self,
        transactions: &'a [Transaction],
        expenses: &'a [ExpenseRecord],
    ) -> Vec<MatchCandidate<'a>> {
        let mut candidates = Vec::new();

        for transaction in transactions {
            for expense in expenses {
                let score = self.score(transaction, expense);
                if score.total >= MIN_CANDIDATE_SCORE {
                    candidates.push(MatchCandidate {
                        transaction,
                        expense,
                        score,
                    });
                }
            }
        }

        candidates
    }

    /// Compare the alias-table category of the statement merchant with the
    /// expense category
    fn category_bonus(
        &self,
        transaction: &Transaction,
        expense: &ExpenseRecord,
        reasons: &mut Vec<String>,
    ) -> f64 {
        let (Some(tx_category), Some(exp_category)) =
            (self.normalizer.category_of(&transaction.merchant), expense.category.as_deref())
        else {
            return 0.0;
        };

        if tx_category == exp_category {
            reasons.push(format!("Category match: {}", exp_category));
            return CATEGORY_EXACT_BONUS;
        }

        // "Meals" vs "Meals & Entertainment"
        let tx_lower = tx_category.to_lowercase();
        let exp_lower = exp_category.to_lowercase();
        if exp_lower.contains(&tx_lower) || tx_lower.contains(&exp_lower) {
            reasons.push(format!("Category hint: {} vs {}", tx_category, exp_category));
            return CATEGORY_PARTIAL_BONUS;
        }

        0.0
    }
}

// ============================================================================
// FACTOR FUNCTIONS
// ============================================================================

/// Amount factor: 1.0 within the tolerance, then falls off linearly to 0 at 10
pub fn amount_score(diff: f64) -> f64 {
    if diff <= AMOUNT_TOLERANCE {
        1.0
    } else {
        (1.0 - diff / 10.0).max(0.0)
    }
}

/// Date factor for an absolute difference in (possibly fractional) days
pub fn date_score(days: f64) -> f64 {
    if days <= 1.0 {
        1.0
    } else if days <= 3.0 {
        1.0 - (days / 3.0) * 0.3
    } else if days <= 7.0 {
        0.7 - ((days - 3.0) / 4.0) * 0.3
    } else {
        (0.4 - (days - 7.0) / 30.0).max(0.0)
    }
}

/// Absolute day difference, `None` if either date does not parse
fn day_difference(transaction: &Transaction, expense: &ExpenseRecord) -> Option<f64> {
    let tx_date = transaction.parsed_date()?;
    let exp_date = expense.parsed_date()?;

    let millis = (tx_date - exp_date).num_milliseconds().abs();
    Some(millis as f64 / MILLIS_PER_DAY)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn scorer() -> MatchScorer {
        MatchScorer::new(MerchantNormalizer::with_defaults())
    }

    #[test]
    fn test_exact_match_exceeds_one() {
        let tx = Transaction::new("t1", "2024-03-01", "STARBUCKS*1234", 5.75, "USD");
        let exp = ExpenseRecord::new("e1", "2024-03-01", "Starbucks", 5.75, "USD").with_category("Meals");

        let score = scorer().score(&tx, &exp);

        assert_eq!(score.amount, 1.0);
        assert_eq!(score.date, 1.0);
        assert_eq!(score.merchant, 1.0);
        assert_eq!(score.category, 0.2);

        // Uncapped: the category bonus pushes a perfect pair past 1.0
        assert!(approx(score.total, 1.1));
        assert!(score.total > 1.0 && score.total <= 1.2);

        assert!(score.reasons.contains(&"Exact amount match".to_string()));
        assert!(score.reasons.contains(&"Same day".to_string()));
        assert!(score.reasons.contains(&"Merchant name match".to_string()));
        assert!(score.reasons.contains(&"Category match: Meals".to_string()));
    }

    #[test]
    fn test_amount_tolerance_boundary() {
        assert_eq!(amount_score(0.0), 1.0);
        assert_eq!(amount_score(1.0), 1.0);
        assert!(amount_score(1.01) < 1.0);
        assert!(approx(amount_score(5.0), 0.5));
        assert_eq!(amount_score(10.0), 0.0);
        assert_eq!(amount_score(250.0), 0.0);
    }

    #[test]
    fn test_amount_boundary_through_scorer() {
        let s = scorer();
        let exp = ExpenseRecord::new("e1", "2024-03-01", "Starbucks", 5.75, "USD");

        let at_tolerance = Transaction::new("t1", "2024-03-01", "Starbucks", 6.75, "USD");
        let past_tolerance = Transaction::new("t2", "2024-03-01", "Starbucks", 6.76, "USD");

        assert_eq!(s.score(&at_tolerance, &exp).amount, 1.0);

        let past = s.score(&past_tolerance, &exp);
        assert!(past.amount < 1.0);
        assert!(past.reasons.contains(&"Amount difference: 1.01".to_string()));
    }

    #[test]
    fn test_date_score_tiers() {
        assert_eq!(date_score(0.0), 1.0);
        assert_eq!(date_score(1.0), 1.0);
        assert!(approx(date_score(2.0), 0.8));
        assert!(approx(date_score(3.0), 0.7));
        assert!(approx(date_score(5.0), 0.55));
        assert!(approx(date_score(7.0), 0.4));
        assert!(approx(date_score(10.0), 0.3));
        assert_eq!(date_score(22.0), 0.0);
    }

    #[test]
    fn test_date_reasons() {
        let s = scorer();
        let exp = ExpenseRecord::new("e1", "2024-03-01", "Uber", 20.0, "USD");

        let near = Transaction::new("t1", "2024-03-04", "Uber", 20.0, "USD");
        assert!(s.score(&near, &exp).reasons.contains(&"Within 3 days".to_string()));

        let far = Transaction::new("t2", "2024-03-11", "Uber", 20.0, "USD");
        let far_score = s.score(&far, &exp);
        assert!(approx(far_score.date, 0.4 - 3.0 / 30.0));
        assert!(far_score.reasons.contains(&"Date difference: 10 days".to_string()));
    }

    #[test]
    fn test_unparsable_date_scores_zero() {
        let tx = Transaction::new("t1", "sometime in March", "Uber", 20.0, "USD");
        let exp = ExpenseRecord::new("e1", "2024-03-01", "Uber", 20.0, "USD");

        let score = scorer().score(&tx, &exp);

        assert_eq!(score.date, 0.0);
        assert!(approx(score.total, 0.4 + 0.2));
        assert!(!score.reasons.iter().any(|r| r.contains("day")));
    }

    #[test]
    fn test_category_partial_bonus() {
        let tx = Transaction::new("t1", "2024-03-01", "UBER *TRIP", 20.0, "USD");
        let exp = ExpenseRecord::new("e1", "2024-03-01", "Uber", 20.0, "USD")
            .with_category("Transportation");

        let score = scorer().score(&tx, &exp);

        assert_eq!(score.category, 0.1);
        assert!(score
            .reasons
            .contains(&"Category hint: Transport vs Transportation".to_string()));
    }

    #[test]
    fn test_category_exact_is_case_sensitive() {
        let tx = Transaction::new("t1", "2024-03-01", "STARBUCKS", 5.0, "USD");
        let exp = ExpenseRecord::new("e1", "2024-03-01", "Starbucks", 5.0, "USD").with_category("meals");

        assert_eq!(scorer().score(&tx, &exp).category, 0.1);
    }

    #[test]
    fn test_category_missing() {
        let tx = Transaction::new("t1", "2024-03-01", "Local Bakery", 5.0, "USD");
        let exp = ExpenseRecord::new("e1", "2024-03-01", "Local Bakery", 5.0, "USD").with_category("Meals");

        // Merchant unknown to the alias table → no category hint
        let score = scorer().score(&tx, &exp);
        assert_eq!(score.category, 0.0);
        // Lands exactly on the "exact" tier boundary
        assert_eq!(score.total, 0.9);
    }

    #[test]
    fn test_candidates_respect_threshold() {
        let transactions = vec![
            Transaction::new("t1", "2024-03-01", "Starbucks", 5.75, "USD"),
            Transaction::new("t2", "2024-06-01", "Apple Store", 999.0, "USD"),
        ];
        let expenses = vec![ExpenseRecord::new("e1", "2024-03-01", "Starbucks", 5.75, "USD")];

        let candidates = scorer().candidates(&transactions, &expenses);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].transaction.id, "t1");
        assert!(candidates[0].score.total >= MIN_CANDIDATE_SCORE);
    }

    #[test]
    fn test_factor_ranges() {
        let s = scorer();
        let merchants = ["STARBUCKS*1", "Hilton", "UBER *TRIP", "Corner Shop", ""];
        let dates = ["2024-03-01", "2024-03-03", "2024-03-20", "bad"];
        let amounts = [0.0, 5.75, 6.75, 50.0];

        for m1 in merchants {
            for m2 in merchants {
                for d in dates {
                    for a in amounts {
                        let tx = Transaction::new("t", "2024-03-01", m1, 5.75, "USD");
                        let exp = ExpenseRecord::new("e", d, m2, a, "USD").with_category("Travel");
                        let score = s.score(&tx, &exp);

                        for factor in [score.amount, score.date, score.merchant] {
                            assert!((0.0..=1.0).contains(&factor));
                        }
                        assert!(score.total >= 0.0 && score.total <= 1.2);
                    }
                }
            }
        }
    }
}
