use chrono::Utc;
use clap::Subcommand;
use screenbudget_core::{CreditLedger, Database};

#[derive(Subcommand)]
pub enum LedgerAction {
    /// Total remaining balance plus a per-sport breakdown
    Totals,
    /// Balance relative to the trailing 24-hour window
    Breakdown,
    /// All live entries, most recent first
    List,
    /// Spend seconds from the ledger, oldest credit first
    Consume {
        /// Seconds to spend
        seconds: i64,
    },
    /// Delete all entries and zero the legacy counter
    Clear,
}

pub fn run(action: LedgerAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut ledger = CreditLedger::new(Database::open()?);
    let now = Utc::now();
    match action {
        LedgerAction::Totals => {
            let totals = ledger.totals(now)?;
            println!("{}", serde_json::to_string_pretty(&totals)?);
        }
        LedgerAction::Breakdown => {
            let view = ledger.breakdown(now)?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        LedgerAction::List => {
            let entries = ledger.entries(now)?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        LedgerAction::Consume { seconds } => {
            let outcome = ledger.consume(now, seconds)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        LedgerAction::Clear => {
            ledger.clear_all()?;
            println!("ok");
        }
    }
    Ok(())
}
