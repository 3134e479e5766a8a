use clap::Subcommand;
use screenbudget_core::{monitor, usage, Config, Database};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g. "host_app", "grace_window_secs")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// List all config values
    List,
    /// Replace the controlled application set
    SetApps {
        /// Application identifiers
        #[arg(required = true)]
        apps: Vec<String>,
    },
    /// Show the controlled application set
    Apps,
    /// Set the daily screen-time allowance
    SetAllowance {
        /// Allowance in seconds
        seconds: u64,
    },
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load();
            match config.get(&key) {
                Some(value) => println!("{value}"),
                None => {
                    eprintln!("unknown key: {key}");
                    std::process::exit(1);
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load();
            config.set(&key, &value)?;
            config.save()?;
            println!("ok");
        }
        ConfigAction::List => {
            let config = Config::load();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::SetApps { apps } => {
            let mut db = Database::open()?;
            monitor::set_controlled_apps(&mut db, &apps)?;
            println!("ok");
        }
        ConfigAction::Apps => {
            let db = Database::open()?;
            let mut apps: Vec<String> = monitor::controlled_apps(&db).into_iter().collect();
            apps.sort();
            println!("{}", serde_json::to_string_pretty(&apps)?);
        }
        ConfigAction::SetAllowance { seconds } => {
            let mut db = Database::open()?;
            usage::set_allowance_seconds(&mut db, seconds)?;
            println!("ok");
        }
    }
    Ok(())
}
