use std::collections::BTreeMap;

use chrono::NaiveDate;
use derive_more::Display;
use tracing::{debug, info, warn};

use crate::{
    Dollar, Error, Percent, Result, Shares, Stock, Tolerances, stock::normalize_ticker,
};

pub const MAX_ALLOCATION: Percent = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TradeSide {
    #[display("BUY")]
    Buy,
    #[display("SELL")]
    Sell,
}

/// A suggested trade that moves one holding toward its target allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceAction {
    pub ticker: String,
    pub side: TradeSide,
    /// Always positive.
    pub shares: Shares,
    /// `shares` times the price used for the computation.
    pub value: Dollar,
}

/// Which price of a stock the valuation uses.
#[derive(Debug, Clone, Copy)]
enum Pricing {
    Latest,
    AsOf(NaiveDate),
}

impl Pricing {
    fn price(self, stock: &Stock) -> Result<Dollar> {
        match self {
            Pricing::Latest => stock.latest_price(),
            Pricing::AsOf(date) => stock.price_as_of(date),
        }
    }
}

#[derive(Debug, Default)]
struct PositionAdjustment {
    current_shares: Shares,
    desired_percent: Percent,
}

/// Stocks keyed by ticker, together with their target allocations and
/// the number of shares held.
#[derive(Debug, Clone, Default)]
pub struct Portfolio {
    stocks: BTreeMap<String, Stock>,
    target_allocations: BTreeMap<String, Percent>,
    positions: BTreeMap<String, Shares>,
    tolerances: Tolerances,
}

impl Portfolio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tolerances(tolerances: Tolerances) -> Result<Self> {
        tolerances.validate()?;
        Ok(Self {
            tolerances,
            ..Self::default()
        })
    }

    pub fn tolerances(&self) -> Tolerances {
        self.tolerances
    }

    pub fn stocks(&self) -> &BTreeMap<String, Stock> {
        &self.stocks
    }

    pub fn stock(&self, ticker: &str) -> Option<&Stock> {
        self.stocks.get(&normalize_ticker(ticker))
    }

    /// Mutable access for recording further prices on a registered stock.
    pub fn stock_mut(&mut self, ticker: &str) -> Option<&mut Stock> {
        self.stocks.get_mut(&normalize_ticker(ticker))
    }

    pub fn target_allocations(&self) -> &BTreeMap<String, Percent> {
        &self.target_allocations
    }

    pub fn positions(&self) -> &BTreeMap<String, Shares> {
        &self.positions
    }

    pub fn position(&self, ticker: &str) -> Option<Shares> {
        self.positions.get(&normalize_ticker(ticker)).copied()
    }

    /// Register a stock. The portfolio starts out holding zero shares of it.
    pub fn add_stock(&mut self, stock: Stock) -> Result<()> {
        let ticker = stock.ticker().to_string();
        if self.stocks.contains_key(&ticker) {
            return Err(Error::DuplicateTicker(ticker));
        }
        self.positions.insert(ticker.clone(), 0.0);
        self.stocks.insert(ticker.clone(), stock);
        info!(%ticker, "Added stock to portfolio");
        Ok(())
    }

    fn known_ticker(&self, ticker: &str) -> Result<String> {
        let ticker = normalize_ticker(ticker);
        if !self.stocks.contains_key(&ticker) {
            return Err(Error::validation(format!(
                "Stock {ticker} not found in portfolio"
            )));
        }
        Ok(ticker)
    }

    pub fn set_allocation(&mut self, ticker: &str, percentage: Percent) -> Result<()> {
        let ticker = self.known_ticker(ticker)?;
        if !(0.0..=MAX_ALLOCATION).contains(&percentage) {
            return Err(Error::validation(format!(
                "Allocation percentage must be between 0 and 100, got {percentage}"
            )));
        }
        self.target_allocations.insert(ticker.clone(), percentage);
        info!(%ticker, percentage, "Set allocation");
        Ok(())
    }

    pub fn set_position(&mut self, ticker: &str, shares: Shares) -> Result<()> {
        let ticker = self.known_ticker(ticker)?;
        if !shares.is_finite() || shares < 0.0 {
            return Err(Error::validation(format!(
                "Number of shares cannot be negative, got {shares}"
            )));
        }
        self.positions.insert(ticker.clone(), shares);
        info!(%ticker, shares, "Set position");
        Ok(())
    }

    pub fn allocation_sum(&self) -> Percent {
        self.target_allocations.values().sum()
    }

    /// Check that the target allocations form a complete set, i.e. sum to
    /// 100% within the allocation tolerance. The boundary is inclusive.
    pub fn validate_allocations(&self) -> Result<()> {
        let sum = self.allocation_sum();
        if (sum - MAX_ALLOCATION).abs() > self.tolerances.allocation_points() {
            warn!(sum, "Target allocations do not add up to 100%");
            return Err(Error::AllocationSum { sum });
        }
        Ok(())
    }

    fn value(&self, pricing: Pricing) -> Result<Dollar> {
        let mut total = 0.0;
        for (ticker, &shares) in self.positions.iter() {
            if shares == 0.0 {
                continue;
            }
            total += shares * pricing.price(&self.stocks[ticker])?;
        }
        Ok(total)
    }

    /// Total value of all positions at the latest recorded prices.
    pub fn get_current_value(&self) -> Result<Dollar> {
        self.value(Pricing::Latest)
    }

    /// Total value using, per stock, the last price recorded on or before
    /// `date`.
    pub fn value_as_of(&self, date: NaiveDate) -> Result<Dollar> {
        self.value(Pricing::AsOf(date))
    }

    fn allocation(&self, pricing: Pricing) -> Result<BTreeMap<String, Percent>> {
        let total = self.value(pricing)?;
        if total <= 0.0 {
            return Err(Error::ZeroValuePortfolio);
        }
        self.positions
            .iter()
            .map(|(ticker, &shares)| {
                let percent = match shares == 0.0 {
                    true => 0.0,
                    false => shares * pricing.price(&self.stocks[ticker])? / total * 100.0,
                };
                Ok::<_, Error>((ticker.clone(), percent))
            })
            .collect()
    }

    /// Share of total value held in each position, in percent.
    ///
    /// Fails with [`Error::ZeroValuePortfolio`] when nothing of value is held.
    pub fn get_current_allocation(&self) -> Result<BTreeMap<String, Percent>> {
        self.allocation(Pricing::Latest)
    }

    pub fn allocation_as_of(&self, date: NaiveDate) -> Result<BTreeMap<String, Percent>> {
        self.allocation(Pricing::AsOf(date))
    }

    /// Current and target percentage for every ticker that is either held or
    /// targeted. Missing sides are reported as 0%.
    pub fn allocation_comparison(&self) -> Result<BTreeMap<String, (Percent, Percent)>> {
        self.comparison(Pricing::Latest)
    }

    pub fn allocation_comparison_as_of(
        &self,
        date: NaiveDate,
    ) -> Result<BTreeMap<String, (Percent, Percent)>> {
        self.comparison(Pricing::AsOf(date))
    }

    fn comparison(&self, pricing: Pricing) -> Result<BTreeMap<String, (Percent, Percent)>> {
        let current = self.allocation(pricing)?;
        let mut comparison: BTreeMap<String, (Percent, Percent)> = current
            .into_iter()
            .map(|(ticker, percent)| (ticker, (percent, 0.0)))
            .collect();
        for (ticker, &target) in self.target_allocations.iter() {
            comparison.entry(ticker.clone()).or_default().1 = target;
        }
        Ok(comparison)
    }

    /// Trades needed to bring every holding to its target allocation, at the
    /// latest prices. Actions are ordered by ticker.
    pub fn rebalance(&self) -> Result<Vec<RebalanceAction>> {
        self.compute_actions(Pricing::Latest)
    }

    pub fn rebalance_as_of(&self, date: NaiveDate) -> Result<Vec<RebalanceAction>> {
        self.compute_actions(Pricing::AsOf(date))
    }

    fn compute_actions(&self, pricing: Pricing) -> Result<Vec<RebalanceAction>> {
        let total_value = self.value(pricing)?;
        if total_value <= 0.0 {
            return Err(Error::ZeroValuePortfolio);
        }
        self.validate_allocations()?;

        // Held stocks without a target are treated as targeting 0%.
        let mut adjustments: BTreeMap<&str, PositionAdjustment> = BTreeMap::new();
        for (ticker, &percent) in self.target_allocations.iter() {
            adjustments.entry(ticker.as_str()).or_default().desired_percent = percent;
        }
        for (ticker, &shares) in self.positions.iter() {
            if shares > 0.0 {
                adjustments.entry(ticker.as_str()).or_default().current_shares = shares;
            }
        }

        let mut actions = Vec::new();
        for (ticker, adj) in adjustments {
            if adj.current_shares == 0.0 && adj.desired_percent == 0.0 {
                continue;
            }
            let price = pricing.price(&self.stocks[ticker])?;
            let target_value = total_value * adj.desired_percent / MAX_ALLOCATION;
            let target_shares = target_value / price;
            let delta = target_shares - adj.current_shares;
            if within_share_tolerance(adj.current_shares, delta, self.tolerances.share) {
                continue;
            }
            let side = match delta > 0.0 {
                true => TradeSide::Buy,
                false => TradeSide::Sell,
            };
            let shares = delta.abs();
            actions.push(RebalanceAction {
                ticker: ticker.to_string(),
                side,
                shares,
                value: shares * price,
            });
        }
        debug!(?actions, total_value, "computed rebalance actions");
        Ok(actions)
    }

    /// Update positions as if every action had been executed.
    pub fn apply_actions(&mut self, actions: &[RebalanceAction]) -> Result<()> {
        let mut updated = self.positions.clone();
        for action in actions {
            let ticker = self.known_ticker(&action.ticker)?;
            let held = updated.entry(ticker.clone()).or_insert(0.0);
            let next = match action.side {
                TradeSide::Buy => *held + action.shares,
                TradeSide::Sell => *held - action.shares,
            };
            if next < 0.0 {
                return Err(Error::validation(format!(
                    "Cannot sell {} shares of {ticker}, only {} held",
                    action.shares, held
                )));
            }
            *held = next;
        }
        self.positions = updated;
        info!(count = actions.len(), "Applied rebalance actions");
        Ok(())
    }
}

/// Relative deviation check, inclusive at the boundary. A new position
/// (nothing currently held) is never within tolerance.
fn within_share_tolerance(current_shares: Shares, delta: Shares, tolerance: f64) -> bool {
    if current_shares <= 0.0 {
        return delta == 0.0;
    }
    delta.abs() / current_shares <= tolerance
}
