// 🏪 Merchant Normalizer - Canonical names via an alias table
//
// Problem solved:
// - "STARBUCKS*1234", "SBUX", "星巴克" → "Starbucks"
// - Unknown merchants get cleaned up ("JOES DINER*A1B2" → "JOES DINER")
//
// The alias table is ordered reference data. The first entry whose alias
// matches wins, so declaration order decides between overlapping aliases.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

static LONG_DIGIT_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]{4,}").expect("digit-run pattern is valid"));

// ============================================================================
// ALIAS ENTRY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantAliasEntry {
    /// Canonical name (the "official" name we compare on)
    pub canonical_name: String,

    /// Statement spellings that map to this merchant
    pub aliases: Vec<String>,

    /// Category hint used by the match scorer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl MerchantAliasEntry {
    pub fn new(canonical_name: &str, aliases: &[&str], category: Option<&str>) -> Self {
        MerchantAliasEntry {
            canonical_name: canonical_name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            category: category.map(|c| c.to_string()),
        }
    }

    /// Bidirectional containment against already lower-cased input
    fn matches_lowercase(&self, input_lower: &str) -> bool {
        self.aliases.iter().any(|alias| {
            let alias_lower = alias.to_lowercase();
            input_lower.contains(&alias_lower) || alias_lower.contains(input_lower)
        })
    }
}

fn default_entries() -> Vec<MerchantAliasEntry> {
    vec![
        // Coffee & Food
        MerchantAliasEntry::new(
            "Starbucks",
            &["STARBUCKS", "STARBUCKS COFFEE", "SBUX", "星巴克", "STARBUCKS STORE", "STARBUCKS*"],
            Some("Meals"),
        ),
        MerchantAliasEntry::new("McDonald's", &["MCDONALDS", "MCD", "麦当劳", "MCDONALD"], Some("Meals")),
        MerchantAliasEntry::new("KFC", &["KENTUCKY FRIED CHICKEN", "肯德基"], Some("Meals")),
        // Transportation
        MerchantAliasEntry::new(
            "Didi",
            &["DIDI", "滴滴出行", "DIDI*RIDE", "DIDI*TRAVEL", "滴滴"],
            Some("Transport"),
        ),
        MerchantAliasEntry::new("Uber", &["UBER", "UBER*TRIP", "UBER EATS"], Some("Transport")),
        MerchantAliasEntry::new("Lyft", &["LYFT", "LYFT*RIDE"], Some("Transport")),
        // Technology
        MerchantAliasEntry::new(
            "Apple",
            &["APPLE", "APL*ITUNES.COM", "APPLE STORE", "APPLE.COM", "苹果"],
            Some("Office"),
        ),
        MerchantAliasEntry::new(
            "Amazon",
            &["AMAZON", "AMZN", "AMAZON.COM", "AMAZON MARKETPLACE"],
            Some("Office"),
        ),
        // Hotels
        MerchantAliasEntry::new("Marriott", &["MARRIOTT", "MARRIOTT HOTEL", "MARRIOTT*"], Some("Lodging")),
        MerchantAliasEntry::new("Hilton", &["HILTON", "HILTON HOTEL", "HILTON*"], Some("Lodging")),
        // Airlines
        MerchantAliasEntry::new("United Airlines", &["UNITED", "UNITED AIRLINES", "UAL"], Some("Travel")),
        MerchantAliasEntry::new("Delta Airlines", &["DELTA", "DELTA AIRLINES", "DAL"], Some("Travel")),
        MerchantAliasEntry::new(
            "American Airlines",
            &["AMERICAN AIRLINES", "AMERICAN", "AAL"],
            Some("Travel"),
        ),
    ]
}

// ============================================================================
// MERCHANT NORMALIZER
// ============================================================================

/// Resolves raw merchant text to canonical names.
///
/// Clones share the same alias table, so an alias added through one handle
/// is visible to every scorer built from it.
#[derive(Debug, Clone)]
pub struct MerchantNormalizer {
    /// Ordered, append-only alias table
    entries: Arc<RwLock<Vec<MerchantAliasEntry>>>,
}

impl MerchantNormalizer {
    /// Create normalizer with an empty alias table
    pub fn new() -> Self {
        MerchantNormalizer::from_entries(Vec::new())
    }

    /// Create normalizer with the built-in merchant aliases
    pub fn with_defaults() -> Self {
        MerchantNormalizer::from_entries(default_entries())
    }

    pub fn from_entries(entries: Vec<MerchantAliasEntry>) -> Self {
        MerchantNormalizer {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    /// Builder form of [`add_alias`](Self::add_alias)
    pub fn with_alias(self, canonical: &str, alias: &str, category: Option<&str>) -> Self {
        self.add_alias(canonical, alias, category);
        self
    }

    /// Append entries from a JSON alias file (array of entries)
    pub fn load_alias_file<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read alias file: {:?}", path.as_ref()))?;

        let entries: Vec<MerchantAliasEntry> =
            serde_json::from_str(&content).context("Failed to parse alias JSON")?;

        let count = entries.len();
        self.extend(entries);
        tracing::debug!(count, path = ?path.as_ref(), "loaded merchant aliases");

        Ok(count)
    }

    /// Merge entries through [`add_alias`](Self::add_alias), keeping their order.
    ///
    /// Blank aliases are dropped; an entry left without aliases is kept for its
    /// name and category but never matches.
    pub fn extend(&self, entries: Vec<MerchantAliasEntry>) {
        for mut entry in entries {
            entry.aliases.retain(|alias| !alias.trim().is_empty());

            if entry.aliases.is_empty() {
                self.write().push(entry);
                continue;
            }
            for alias in &entry.aliases {
                self.add_alias(&entry.canonical_name, alias, entry.category.as_deref());
            }
        }
    }

    /// Add an alias to the table.
    ///
    /// An existing canonical name gains the alias (if new) and takes the given
    /// category. An unknown canonical name is appended as a new entry.
    /// A blank alias would match every merchant and is ignored.
    pub fn add_alias(&self, canonical: &str, alias: &str, category: Option<&str>) {
        if alias.trim().is_empty() {
            tracing::warn!(canonical, "ignoring blank merchant alias");
            return;
        }

        let mut entries = self.write();

        if let Some(existing) = entries.iter_mut().find(|e| e.canonical_name == canonical) {
            if !existing.aliases.iter().any(|a| a == alias) {
                existing.aliases.push(alias.to_string());
            }
            if let Some(category) = category {
                existing.category = Some(category.to_string());
            }
            return;
        }

        entries.push(MerchantAliasEntry::new(canonical, &[alias], category));
    }

    /// Resolve merchant text to its canonical name.
    ///
    /// Example: "STARBUCKS*1234" → "Starbucks", "JOES DINER*A1" → "JOES DINER"
    pub fn normalize(&self, merchant: &str) -> String {
        let trimmed = merchant.trim();

        if let Some(entry) = self.find_entry(trimmed) {
            return entry.canonical_name;
        }

        clean_merchant_text(trimmed)
    }

    /// Category of the first alias entry matching the merchant text
    pub fn category_of(&self, merchant: &str) -> Option<String> {
        self.find_entry(merchant.trim()).and_then(|entry| entry.category)
    }

    /// Snapshot of the alias table in declaration order
    pub fn entries(&self) -> Vec<MerchantAliasEntry> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn find_entry(&self, trimmed: &str) -> Option<MerchantAliasEntry> {
        // Empty text is contained in every alias; it must not resolve to the first entry
        if trimmed.is_empty() {
            return None;
        }

        let input_lower = trimmed.to_lowercase();
        self.read()
            .iter()
            .find(|entry| entry.matches_lowercase(&input_lower))
            .cloned()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<MerchantAliasEntry>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<MerchantAliasEntry>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MerchantNormalizer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Cleanup for merchants the alias table does not know
///
/// - Drop everything from the first `*` (statement reference codes)
/// - Drop digit runs of four or more (store and terminal numbers)
/// - Trim whitespace
fn clean_merchant_text(s: &str) -> String {
    let head = match s.find('*') {
        Some(pos) => &s[..pos],
        None => s,
    };

    LONG_DIGIT_RUN.replace_all(head, "").trim().to_string()
}

// ============================================================================
// TESTS
// ============================================================================
