use chrono::{DateTime, Utc};
use clap::Subcommand;
use screenbudget_core::{CreditLedger, Database};
use uuid::Uuid;

#[derive(Subcommand)]
pub enum ExerciseAction {
    /// Report a finished exercise; creates or updates its credit entry
    Report {
        /// Earned screen time in seconds (non-positive removes the entry)
        seconds: i64,
        /// Entry id, stable across updates (generated when omitted)
        #[arg(long)]
        id: Option<String>,
        /// Sport that produced the credit
        #[arg(long)]
        sport: Option<String>,
        /// Earn time, RFC 3339 (defaults to now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Delete an exercise's credit entry
    Delete {
        /// Entry id
        id: String,
    },
    /// Delete every entry earned by a sport
    ClearSport {
        /// Sport id
        sport: String,
    },
}

pub fn run(action: ExerciseAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut ledger = CreditLedger::new(Database::open()?);
    let now = Utc::now();
    match action {
        ExerciseAction::Report {
            seconds,
            id,
            sport,
            at,
        } => {
            let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
            let created_at = at.unwrap_or(now).timestamp_millis();
            ledger.upsert(now, &id, sport.as_deref(), created_at, seconds)?;
            println!("{id}");
        }
        ExerciseAction::Delete { id } => {
            ledger.remove(now, &id)?;
            println!("ok");
        }
        ExerciseAction::ClearSport { sport } => {
            ledger.clear_for_sport(now, &sport)?;
            println!("ok");
        }
    }
    Ok(())
}
