use std::time::Duration;

use chrono::Utc;
use clap::Subcommand;
use screenbudget_core::{
    AllowanceBudget, Budget, Config, CreditLedger, Database, Monitor, MonitorInput,
};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Subcommand)]
pub enum MonitorAction {
    /// Run the enforcement loop: one-second ticks plus foreground-change
    /// lines (one app id per line) on stdin; decisions stream out as JSON
    Run {
        /// Debit the plain daily-allowance counter instead of the ledger
        #[arg(long)]
        allowance: bool,
    },
}

pub fn run(action: MonitorAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        MonitorAction::Run { allowance } => {
            let config = Config::load();
            let store = Database::open()?;
            if allowance {
                let budget = AllowanceBudget::new(Database::open()?);
                run_loop(Monitor::new(store, budget, &config), &config)
            } else {
                let budget = CreditLedger::new(Database::open()?);
                run_loop(Monitor::new(store, budget, &config), &config)
            }
        }
    }
}

/// Both triggers dispatch on one current-thread queue, so each handler runs
/// to completion before the next input is taken.
fn run_loop<B: Budget>(
    mut monitor: Monitor<Database, B>,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(async move {
        let mut ticks = tokio::time::interval(Duration::from_millis(config.tick_period_ms));
        ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("{}", serde_json::to_string(&monitor.snapshot(Utc::now()))?);
        loop {
            let input = tokio::select! {
                _ = ticks.tick() => MonitorInput::Tick,
                line = lines.next_line() => match line? {
                    Some(line) => {
                        let app_id = line.trim();
                        if app_id.is_empty() {
                            continue;
                        }
                        MonitorInput::ForegroundChanged {
                            app_id: app_id.to_string(),
                        }
                    }
                    // stdin closed: the hosting environment tore us down.
                    None => break,
                },
            };
            if let Some(event) = monitor.handle(Utc::now(), input) {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
