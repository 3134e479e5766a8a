pub mod config;
pub mod exercise;
pub mod grace;
pub mod ledger;
pub mod monitor;
pub mod price;
pub mod status;
