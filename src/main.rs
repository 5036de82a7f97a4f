use anyhow::{bail, Context, Result};
use std::env;
use std::path::{Path, PathBuf};

use expense_recon::{
    init_tracing, load_expense, load_expenses, load_transactions, DuplicateDetector,
    MerchantNormalizer, ReconConfig, ReconciliationEngine,
};

const USAGE: &str = "\
Usage:
  expense-recon [--config <path>] reconcile <transactions> <expenses> [--json]
  expense-recon [--config <path>] duplicates <candidate.json> <existing> [--json]
  expense-recon [--config <path>] normalize <merchant>...

Files ending in .csv are read as CSV, anything else as JSON.";

/// Parsed command line: flags pulled out, positional args kept in order
struct CliArgs {
    config: Option<PathBuf>,
    json: bool,
    positional: Vec<String>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<CliArgs> {
    let mut config = None;
    let mut json = false;
    let mut positional = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            "--json" => json = true,
            _ => positional.push(arg),
        }
    }

    Ok(CliArgs { config, json, positional })
}

fn main() -> Result<()> {
    let cli = parse_args(env::args().skip(1))?;

    let config = ReconConfig::load(cli.config.as_deref())?;
    init_tracing(&config.log_filter);

    let Some((command, rest)) = cli.positional.split_first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let normalizer = config.build_normalizer()?;

    match (command.as_str(), rest) {
        ("reconcile", [transactions, expenses]) => {
            run_reconcile(normalizer, Path::new(transactions), Path::new(expenses), cli.json)
        }
        ("duplicates", [candidate, existing]) => {
            run_duplicates(normalizer, Path::new(candidate), Path::new(existing), cli.json)
        }
        ("normalize", merchants) if !merchants.is_empty() => {
            run_normalize(&normalizer, merchants);
            Ok(())
        }
        _ => bail!("Unrecognized command line\n\n{}", USAGE),
    }
}

fn run_reconcile(normalizer: MerchantNormalizer, tx_path: &Path, exp_path: &Path, json: bool) -> Result<()> {
    let transactions = load_transactions(tx_path)?;
    let expenses = load_expenses(exp_path)?;

    let engine = ReconciliationEngine::new(normalizer);
    let report = engine.reconcile(&transactions, &expenses);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("⚖️  Expense Reconciliation");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ Loaded {} transactions", transactions.len());
    println!("✓ Loaded {} expenses", expenses.len());

    let confirmed = report.confirmed();
    println!("\n✅ Matched ({}):", confirmed.len());
    for m in &confirmed {
        println!(
            "   {} {} ↔ {} {}  [{} {:.2}]",
            m.transaction.date,
            m.transaction.merchant,
            m.expense.merchant,
            m.expense.display_amount(),
            m.match_type.as_str(),
            m.confidence,
        );
    }

    let pending = report.pending();
    println!("\n⏳ Pending review ({}):", pending.len());
    for m in &pending {
        println!(
            "   {} {} ↔ {} {}  [{:.2}] {}",
            m.transaction.date,
            m.transaction.merchant,
            m.expense.merchant,
            m.expense.display_amount(),
            m.confidence,
            m.reasons.join(", "),
        );
    }

    println!("\n❓ Unmatched transactions ({}):", report.unmatched_transactions.len());
    for tx in &report.unmatched_transactions {
        println!("   {} {} {}", tx.date, tx.merchant, tx.display_amount());
    }

    println!("\n❓ Unmatched expenses ({}):", report.unmatched_expenses.len());
    for exp in &report.unmatched_expenses {
        println!("   {} {} {}", exp.date, exp.merchant, exp.display_amount());
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("{}", report.summary_line());
    println!("Confirmed total: {:.2}", report.matched_total());

    Ok(())
}

fn run_duplicates(normalizer: MerchantNormalizer, candidate_path: &Path, existing_path: &Path, json: bool) -> Result<()> {
    let candidate = load_expense(candidate_path)?;
    let existing = load_expenses(existing_path)?;

    let detector = DuplicateDetector::new(normalizer);
    let duplicates = detector.find_duplicates(&candidate, &existing);

    if json {
        println!("{}", serde_json::to_string_pretty(&duplicates)?);
        return Ok(());
    }

    println!("🔍 Duplicate check: {} {} {}", candidate.date, candidate.merchant, candidate.display_amount());
    if duplicates.is_empty() {
        println!("✓ No duplicates among {} expenses", existing.len());
        return Ok(());
    }

    println!("⚠️  {} possible duplicate(s):", duplicates.len());
    for dup in &duplicates {
        println!(
            "   {:>3.0}%  {} {} {}  ({})",
            dup.similarity * 100.0,
            dup.existing.date,
            dup.existing.merchant,
            dup.existing.display_amount(),
            dup.reason(),
        );
    }

    Ok(())
}

fn run_normalize(normalizer: &MerchantNormalizer, merchants: &[String]) {
    for merchant in merchants {
        let canonical = normalizer.normalize(merchant);
        match normalizer.category_of(merchant) {
            Some(category) => println!("{} → {} ({})", merchant, canonical, category),
            None => println!("{} → {}", merchant, canonical),
        }
    }
}
