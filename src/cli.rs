use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;
use clap_complete::Shell;

#[derive(Parser, Debug)]
#[command(version, about = "Value a stock portfolio and suggest rebalancing trades")]
pub(crate) struct Cli {
    #[arg(help = "Scenario YAML listing stocks, target allocations and positions")]
    pub scenario: Option<PathBuf>,
    #[arg(short, long, help = "Price history CSV with Ticker,Date,Price columns")]
    pub prices: Option<PathBuf>,
    #[arg(
        short,
        long,
        help = "Use the last price on or before this date (YYYY-MM-DD) instead of the latest"
    )]
    pub as_of: Option<NaiveDate>,
    #[arg(long, help = "Allowed deviation of the allocation sum, as a fraction of 100%")]
    pub allocation_tolerance: Option<f64>,
    #[arg(long, help = "Allowed relative deviation in shares before trading")]
    pub share_tolerance: Option<f64>,
    #[arg(long, help = "Show positions after applying the suggested trades")]
    pub apply: bool,
    #[arg(long, value_enum, help = "Print shell completions and exit")]
    pub completions: Option<Shell>,
}
