use chrono::{Duration, Utc};
use screenbudget_core::{monitor, Config, Database};

pub fn run(app_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    let mut db = Database::open()?;
    let grace = monitor::confirm_open_anyway(
        &mut db,
        Utc::now(),
        app_id,
        Duration::seconds(config.grace_window_secs as i64),
    )?;
    println!("{}", serde_json::to_string_pretty(&grace)?);
    Ok(())
}
