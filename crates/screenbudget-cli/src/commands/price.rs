use clap::Subcommand;
use screenbudget_core::pricing;

#[derive(Subcommand)]
pub enum PriceAction {
    /// Discount multiplier earned by an exercise duration
    Multiplier {
        /// Exercise duration in seconds
        seconds: i64,
    },
    /// Penalty percentage for buying back early access
    Penalty {
        /// Minutes of early access requested (clamped to 1..=15)
        minutes: i64,
    },
}

pub fn run(action: PriceAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        PriceAction::Multiplier { seconds } => {
            println!("{}", pricing::discount_multiplier(seconds));
        }
        PriceAction::Penalty { minutes } => {
            println!("{}", pricing::penalty_percent(minutes));
        }
    }
    Ok(())
}
