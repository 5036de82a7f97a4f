// 🔤 String Similarity - Tiered fuzzy comparison of merchant names
//
// Tiers (first hit wins):
//   1. equal                       → 1.0
//   2. one contains the other      → 0.9 × shorter/longer
//   3. common substring ≥ 5 chars  → 0.7 + (substring/shorter) × 0.2
//   4. same 5-char prefix          → 0.6
//   5. index-aligned char matches  → matches / longer
//
// Downstream thresholds (0.5/0.7/0.9) depend on these exact tier values.

use crate::merchant::MerchantNormalizer;

/// Minimum shared substring length considered by tier 3
const MIN_COMMON_SUBSTRING: usize = 5;

/// Prefix length compared by tier 4
const PREFIX_LENGTH: usize = 5;

/// Similarity of two raw merchant strings (0.0 - 1.0).
///
/// Both sides go through the alias table first, then get lower-cased.
pub fn merchant_similarity(normalizer: &MerchantNormalizer, a: &str, b: &str) -> f64 {
    let s1 = normalizer.normalize(a).to_lowercase();
    let s2 = normalizer.normalize(b).to_lowercase();

    compare_normalized(&s1, &s2)
}

/// Similarity of two already-normalized strings (0.0 - 1.0).
///
/// Lengths are counted in chars so CJK merchant names compare sensibly.
pub fn compare_normalized(s1: &str, s2: &str) -> f64 {
    if s1 == s2 {
        return 1.0;
    }

    let chars1: Vec<char> = s1.chars().collect();
    let chars2: Vec<char> = s2.chars().collect();

    let (shorter, longer, longer_str) = if chars1.len() <= chars2.len() {
        (&chars1, &chars2, s2)
    } else {
        (&chars2, &chars1, s1)
    };

    if s1.contains(s2) || s2.contains(s1) {
        return 0.9 * (shorter.len() as f64 / longer.len() as f64);
    }

    if let Some(len) = longest_common_run(shorter, longer_str) {
        return 0.7 + (len as f64 / shorter.len() as f64) * 0.2;
    }

    if shorter.len() >= PREFIX_LENGTH && shorter[..PREFIX_LENGTH] == longer[..PREFIX_LENGTH] {
        return 0.6;
    }

    let aligned = shorter
        .iter()
        .zip(longer.iter())
        .filter(|(a, b)| a == b)
        .count();

    aligned as f64 / longer.len() as f64
}

/// Length of the longest substring of `shorter` (at least 5 chars) found in `longer`.
///
/// Scans from the full length of `shorter` downwards and stops at the first hit.
fn longest_common_run(shorter: &[char], longer: &str) -> Option<usize> {
    if shorter.len() < MIN_COMMON_SUBSTRING {
        return None;
    }

    for len in (MIN_COMMON_SUBSTRING..=shorter.len()).rev() {
        for window in shorter.windows(len) {
            let candidate: String = window.iter().collect();
            if longer.contains(&candidate) {
                return Some(len);
            }
        }
    }

    None
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

    #[test]
    fn test_exact_after_normalization() {
        let normalizer = MerchantNormalizer::with_defaults();

        assert_eq!(merchant_similarity(&normalizer, "STARBUCKS*1234", "Starbucks"), 1.0);
        assert_eq!(merchant_similarity(&normalizer, "AMZN", "Amazon Marketplace"), 1.0);
        assert_eq!(merchant_similarity(&normalizer, "Local Deli", "LOCAL DELI"), 1.0);
    }

    #[test]
    fn test_containment_tier() {
        let score = compare_normalized("hilton", "hilton garden inn");
        assert!(approx(score, 0.9 * 6.0 / 17.0));

        // Containment ignores which side is longer
        assert!(approx(compare_normalized("hilton garden inn", "hilton"), score));
    }

    #[test]
    fn test_common_substring_tier() {
        // Longest shared run is "grand hotel" (11 chars), shorter side is 15 chars
        let score = compare_normalized("grand hotel paris", "the grand hotel");
        assert!(approx(score, 0.7 + (11.0 / 15.0) * 0.2));
        assert!(score >= 0.7 && score < 0.9);
    }

    #[test]
    fn test_common_substring_minimum_length() {
        // Only a 4-char overlap ("cafe"), so tier 3 does not apply
        let score = compare_normalized("cafe nero", "blue cafe");
        assert!(score < 0.6);
    }

    #[test]
    fn test_fallback_aligned_characters() {
        assert!(approx(compare_normalized("abcd", "abxy"), 0.5));
        assert!(approx(compare_normalized("abc", "xyz"), 0.0));
        assert!(approx(compare_normalized("ab", "abxyz"), 0.9 * 2.0 / 5.0));
    }

    #[test]
    fn test_empty_strings() {
        assert_eq!(compare_normalized("", ""), 1.0);
        assert_eq!(compare_normalized("", "uber"), 0.0);
        assert_eq!(compare_normalized("uber", ""), 0.0);
    }

    #[test]
    fn test_unicode_lengths() {
        // 2 of 4 chars; byte lengths would give a different ratio
        let score = compare_normalized("滴滴", "滴滴出行");
        assert!(approx(score, 0.9 * 2.0 / 4.0));
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let normalizer = MerchantNormalizer::with_defaults();
        let samples = [
            "STARBUCKS*1234",
            "Starbucks",
            "Hilton Hotel",
            "the grand hotel",
            "grand hotel paris",
            "cafe nero",
            "blue cafe",
            "abcd",
            "abxy",
            "",
            "滴滴出行",
            "Corner Shop 123456",
            "Corner Store",
        ];

        for a in samples {
            for b in samples {
                let ab = merchant_similarity(&normalizer, a, b);
                let ba = merchant_similarity(&normalizer, b, a);
                assert_eq!(ab, ba, "similarity({:?}, {:?}) not symmetric", a, b);
                assert!((0.0..=1.0).contains(&ab));
            }
        }
    }
}
