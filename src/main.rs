use anyhow::Context;
use clap::{CommandFactory, Parser};
use portfolio_tracker::{
    Dollar, Percent, Portfolio, RebalanceAction, Scenario, TradeSide, config::default_scenario_path,
};
use tabled::{Table, Tabled, settings::Style};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Tabled)]
struct AllocationRow {
    #[tabled(rename = "Ticker")]
    ticker: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Shares")]
    shares: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Target")]
    target: String,
}

fn allocation_table(portfolio: &Portfolio, comparison: &[(String, (Percent, Percent))]) -> Table {
    let rows = comparison.iter().map(|(ticker, (current, target))| AllocationRow {
        ticker: ticker.clone(),
        name: portfolio
            .stock(ticker)
            .map(|s| s.name().to_string())
            .unwrap_or_default(),
        shares: format!("{:.4}", portfolio.position(ticker).unwrap_or_default()),
        current: format!("{current:.1}%"),
        target: format!("{target:.1}%"),
    });
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    table
}

fn print_actions(actions: &[RebalanceAction]) {
    if actions.is_empty() {
        println!("All positions are within tolerance of their targets.");
        return;
    }
    println!("In order to maintain your target allocations, the following actions are necessary.");
    for side in [TradeSide::Sell, TradeSide::Buy] {
        println!("{side}:");
        actions
            .iter()
            .filter(|a| a.side == side)
            .for_each(|a| println!(" - {}: {:.4} shares (${:.2})", a.ticker, a.shares, a.value));
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let opts = cli::Cli::parse();

    if let Some(shell) = opts.completions {
        clap_complete::generate(
            shell,
            &mut cli::Cli::command(),
            env!("CARGO_BIN_NAME"),
            &mut std::io::stdout(),
        );
        return Ok(());
    }

    let Some(scenario_path) = opts.scenario.or_else(default_scenario_path) else {
        anyhow::bail!("Failed to get scenario path");
    };
    let mut scenario = Scenario::load_from_file(&scenario_path)
        .with_context(|| format!("Failed to load scenario {scenario_path:?}"))?;
    if let Some(prices_path) = &opts.prices {
        let rows = scenario
            .merge_prices_file(prices_path)
            .with_context(|| format!("Failed to load prices from {prices_path:?}"))?;
        info!(rows, "merged price history");
    }
    if let Some(tolerance) = opts.allocation_tolerance {
        scenario.tolerances.allocation = tolerance;
    }
    if let Some(tolerance) = opts.share_tolerance {
        scenario.tolerances.share = tolerance;
    }
    let mut portfolio = scenario.build()?;

    let (total, comparison, actions): (Dollar, _, _) = match opts.as_of {
        Some(date) => {
            println!("Portfolio as of {date}");
            (
                portfolio.value_as_of(date)?,
                portfolio.allocation_comparison_as_of(date)?,
                portfolio.rebalance_as_of(date)?,
            )
        }
        None => {
            println!("Portfolio at latest prices");
            (
                portfolio.get_current_value()?,
                portfolio.allocation_comparison()?,
                portfolio.rebalance()?,
            )
        }
    };
    println!("Total value: ${total:.2}");
    println!();
    let comparison: Vec<_> = comparison.into_iter().collect();
    println!("{}", allocation_table(&portfolio, &comparison));
    println!();
    print_actions(&actions);

    if opts.apply {
        portfolio.apply_actions(&actions)?;
        let comparison: Vec<_> = match opts.as_of {
            Some(date) => portfolio.allocation_comparison_as_of(date)?,
            None => portfolio.allocation_comparison()?,
        }
        .into_iter()
        .collect();
        println!();
        println!("After rebalancing");
        println!("{}", allocation_table(&portfolio, &comparison));
    }
    Ok(())
}
