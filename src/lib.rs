pub mod config;
pub mod error;
pub mod portfolio;
pub mod stock;

pub use config::{Scenario, Tolerances};
pub use error::{Error, Result};
pub use portfolio::{Portfolio, RebalanceAction, TradeSide};
pub use stock::{PriceSeries, Stock};

pub type Dollar = f64;
pub type Percent = f64;
pub type Shares = f64;
