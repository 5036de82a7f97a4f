// Expense Reconciliation Engine - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod records;        // Transactions, expenses, date parsing, loaders
pub mod merchant;       // Merchant normalizer + alias table
pub mod similarity;     // Tiered merchant-name similarity
pub mod scoring;        // Weighted transaction/expense scorer
pub mod assignment;     // Greedy one-to-one assignment
pub mod reconciliation; // Report builder + manual overrides
pub mod deduplication;  // Expense duplicate detector
pub mod config;         // Settings file + env overrides
pub mod logging;        // tracing subscriber init

// Re-export commonly used types
pub use records::{
    ExpenseRecord, MatchStatus, Record, Transaction, TransactionType,
    fill_missing_ids, load_expense, load_expenses, load_transactions, parse_record_date,
};
pub use merchant::{MerchantAliasEntry, MerchantNormalizer};
pub use similarity::{compare_normalized, merchant_similarity};
pub use scoring::{MatchCandidate, MatchScore, MatchScorer};
pub use assignment::{AssignmentEngine, MatchResult, MatchType};
pub use reconciliation::{
    ReconciliationEngine, ReconciliationReport, ReconciliationSummary,
    MatchUpdate, OverrideOutcome,
    build_report, confirm_match, reject_match,
};
pub use deduplication::{DuplicateCheck, DuplicateDetector, DuplicateMatch};
pub use config::ReconConfig;
pub use logging::init_tracing;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
