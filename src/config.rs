//! Tolerance settings and scenario files.
//!
//! A scenario is a YAML description of the stocks, their prices, the target
//! allocations and the current positions. It is only ever read; the tracker
//! keeps no state on disk.

use std::{
    collections::BTreeMap,
    io::Read,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use directories::ProjectDirs;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{Dollar, Error, Percent, Portfolio, Result, Shares, Stock, stock::normalize_ticker};

pub const DEFAULT_ALLOCATION_TOLERANCE: f64 = 0.01;
pub const DEFAULT_SHARE_TOLERANCE: f64 = 0.01;

/// Thresholds below which a deviation is treated as negligible.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Tolerances {
    /// Allowed deviation of the allocation sum, as a fraction of 100%.
    /// `0.01` accepts sums in `[99, 101]`.
    pub allocation: f64,
    /// Allowed relative deviation `|target - current| / current` in shares.
    pub share: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            allocation: DEFAULT_ALLOCATION_TOLERANCE,
            share: DEFAULT_SHARE_TOLERANCE,
        }
    }
}

impl Tolerances {
    pub fn validate(&self) -> Result<()> {
        for (label, value) in [("allocation", self.allocation), ("share", self.share)] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::validation(format!(
                    "The {label} tolerance must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Allocation tolerance expressed in percentage points.
    pub fn allocation_points(&self) -> Percent {
        self.allocation * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StockEntry {
    pub ticker: String,
    pub name: String,
    #[serde(default)]
    pub prices: BTreeMap<NaiveDate, Dollar>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Scenario {
    #[serde(default)]
    pub tolerances: Tolerances,
    pub stocks: Vec<StockEntry>,
    #[serde(default)]
    pub targets: BTreeMap<String, Percent>,
    #[serde(default)]
    pub positions: BTreeMap<String, Shares>,
}

/// `<config dir>/scenario.yml` for the current user, if a home directory
/// can be resolved.
pub fn default_scenario_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "portfolio-tracker", "portfolio-tracker")
        .map(|pdirs| pdirs.config_dir().join("scenario.yml"))
}

impl Scenario {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let scenario: Scenario = serde_yaml::from_reader(file)?;
        debug!(?path, stocks = scenario.stocks.len(), "loaded scenario");
        Ok(scenario)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn merge_prices_file(&mut self, path: &Path) -> Result<usize> {
        let file = std::fs::File::open(path)?;
        self.merge_prices(file)
    }

    /// Merge `Ticker,Date,Price` rows into the price history of the listed
    /// stocks. Returns the number of rows merged.
    pub fn merge_prices<R: Read>(&mut self, reader: R) -> Result<usize> {
        let rows = prices_csv::parse_rows(reader)?;
        let index_of = |ticker: &str| {
            self.stocks
                .iter()
                .position(|s| normalize_ticker(&s.ticker) == ticker)
                .ok_or_else(|| Error::validation(format!("Stock {ticker} not found in scenario")))
        };
        let resolved = rows
            .into_iter()
            .map(|row| Ok::<_, Error>((index_of(&row.ticker)?, row)))
            .collect::<Result<Vec<_>>>()?;
        let count = resolved.len();
        for (idx, row) in resolved {
            self.stocks[idx].prices.insert(row.date, row.price);
        }
        Ok(count)
    }

    /// Build a portfolio from the scenario. If targets are given they must
    /// form a complete allocation.
    pub fn build(self) -> Result<Portfolio> {
        let mut portfolio = Portfolio::with_tolerances(self.tolerances)?;
        for entry in self.stocks {
            let mut stock = Stock::new(&entry.ticker, &entry.name)?;
            for (date, price) in entry.prices {
                stock.add_price(date, price)?;
            }
            portfolio.add_stock(stock)?;
        }
        for (ticker, percent) in &self.targets {
            portfolio.set_allocation(ticker, *percent)?;
        }
        for (ticker, shares) in &self.positions {
            portfolio.set_position(ticker, *shares)?;
        }
        if !self.targets.is_empty() {
            portfolio.validate_allocations().inspect_err(|err| {
                warn!(%err, "scenario targets are incomplete");
            })?;
        }
        Ok(portfolio)
    }
}

mod prices_csv {
    use std::io::Read;

    use chrono::NaiveDate;
    use tracing::{debug, warn};

    use crate::{Dollar, Error, Result, stock::normalize_ticker};

    pub enum Columns {
        Ticker = 0,
        Date = 1,
        Price = 2,
    }

    #[derive(Debug)]
    pub(super) struct PriceRow {
        pub ticker: String,
        pub date: NaiveDate,
        pub price: Dollar,
    }

    pub(super) fn parse_rows<R: Read>(reader: R) -> Result<Vec<PriceRow>> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = csv_reader.headers()?;
        if headers.get(Columns::Ticker as usize) != Some("Ticker")
            || headers.get(Columns::Date as usize) != Some("Date")
            || headers.get(Columns::Price as usize) != Some("Price")
        {
            warn!(?headers, "Unexpected headers");
            return Err(Error::validation(
                "Unexpected price file format, expected Ticker,Date,Price",
            ));
        }
        let mut rows = Vec::new();
        for (line, record) in csv_reader.records().enumerate() {
            let record = record?;
            debug!(?record, "parsed row");
            let field = |col: Columns| record.get(col as usize).unwrap_or_default();
            let ticker = normalize_ticker(field(Columns::Ticker));
            if ticker.is_empty() {
                return Err(Error::validation(format!("Missing ticker on row {}", line + 1)));
            }
            let date = field(Columns::Date).parse::<NaiveDate>().map_err(|err| {
                Error::validation(format!("Invalid date on row {}: {err}", line + 1))
            })?;
            let price = field(Columns::Price)
                .replace('$', "")
                .parse::<Dollar>()
                .map_err(|err| {
                    Error::validation(format!("Invalid price on row {}: {err}", line + 1))
                })?;
            rows.push(PriceRow { ticker, date, price });
        }
        Ok(rows)
    }
}
