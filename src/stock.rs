use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::{Dollar, Error, Result};

/// Date-keyed price history for a single instrument.
///
/// One price per date. Adding a price for a date that is already recorded
/// replaces the earlier value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    prices: BTreeMap<NaiveDate, Dollar>,
}

impl PriceSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, date: NaiveDate, price: Dollar) -> Result<()> {
        if !price.is_finite() || price <= 0.0 {
            return Err(Error::validation(format!(
                "Price must be positive, got {price}"
            )));
        }
        self.prices.insert(date, price);
        Ok(())
    }

    pub fn get(&self, date: NaiveDate) -> Option<Dollar> {
        self.prices.get(&date).copied()
    }

    /// Price at the latest recorded date that is not after `date`.
    pub fn as_of(&self, date: NaiveDate) -> Option<Dollar> {
        self.prices.range(..=date).next_back().map(|(_, &p)| p)
    }

    pub fn latest(&self) -> Option<(NaiveDate, Dollar)> {
        self.prices.last_key_value().map(|(&d, &p)| (d, p))
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, Dollar)> + '_ {
        self.prices.iter().map(|(&d, &p)| (d, p))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stock {
    ticker: String,
    name: String,
    prices: PriceSeries,
}

impl Stock {
    /// Create a stock with an empty price history. The ticker is stored
    /// trimmed and upper-cased.
    pub fn new(ticker: &str, name: &str) -> Result<Self> {
        let ticker = normalize_ticker(ticker);
        if ticker.is_empty() {
            return Err(Error::validation("Ticker must not be empty"));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation(format!(
                "Name for {ticker} must not be empty"
            )));
        }
        info!(%ticker, %name, "Initialized stock");
        Ok(Self {
            ticker,
            name: name.to_string(),
            prices: PriceSeries::new(),
        })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prices(&self) -> &PriceSeries {
        &self.prices
    }

    pub fn add_price(&mut self, date: NaiveDate, price: Dollar) -> Result<()> {
        self.prices.insert(date, price)?;
        debug!(ticker = %self.ticker, %date, price, "added price point");
        Ok(())
    }

    pub fn price_on(&self, date: NaiveDate) -> Result<Dollar> {
        self.prices.get(date).ok_or_else(|| Error::NotFound {
            ticker: self.ticker.clone(),
            date,
        })
    }

    /// Price at the closest recorded date on or before `date`.
    pub fn price_as_of(&self, date: NaiveDate) -> Result<Dollar> {
        self.prices.as_of(date).ok_or_else(|| Error::NotFound {
            ticker: self.ticker.clone(),
            date,
        })
    }

    pub fn latest_price(&self) -> Result<Dollar> {
        self.prices
            .latest()
            .map(|(_, price)| price)
            .ok_or_else(|| Error::NoData(self.ticker.clone()))
    }
}

pub(crate) fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}
