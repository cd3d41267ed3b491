use chrono::NaiveDate;

use crate::Percent;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("No price recorded for {ticker} on {date}")]
    NotFound { ticker: String, date: NaiveDate },

    #[error("No price data available for {0}")]
    NoData(String),

    #[error("Stock {0} already exists in portfolio")]
    DuplicateTicker(String),

    /// Target allocations are outside the tolerance band around 100%.
    #[error("Allocations must sum to 100%, found {sum}%")]
    AllocationSum { sum: Percent },

    #[error("Portfolio has zero total value")]
    ZeroValuePortfolio,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
