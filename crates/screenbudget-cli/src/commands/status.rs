use chrono::Utc;
use screenbudget_core::{usage, Database};

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let state = usage::snapshot(&db, Utc::now());
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
