//! Property-based tests for pricing, valuation and rebalancing.

use chrono::NaiveDate;
use portfolio_tracker::{Error, Portfolio, Stock, TradeSide};
use proptest::prelude::*;

// ============================================================================
// Generators
// ============================================================================

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (2020i32..2026, 1u32..13, 1u32..29)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn arb_price() -> impl Strategy<Value = f64> {
    (1i64..10_000_000).prop_map(|cents| cents as f64 / 100.0)
}

fn arb_shares() -> impl Strategy<Value = f64> {
    (0i64..100_000).prop_map(|milli| milli as f64 / 1000.0)
}

/// Integer weights turned into percentages that sum to 100.
fn arb_targets(len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1u32..100, len).prop_map(|weights| {
        let total: u32 = weights.iter().sum();
        weights
            .iter()
            .map(|&w| w as f64 * 100.0 / total as f64)
            .collect()
    })
}

fn build_portfolio(prices: &[f64], shares: &[f64], targets: &[f64]) -> Portfolio {
    let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let mut portfolio = Portfolio::new();
    for (i, ((&price, &held), &target)) in prices.iter().zip(shares).zip(targets).enumerate() {
        let ticker = format!("T{i}");
        let mut stock = Stock::new(&ticker, "Test Corp").unwrap();
        stock.add_price(date, price).unwrap();
        portfolio.add_stock(stock).unwrap();
        portfolio.set_position(&ticker, held).unwrap();
        portfolio.set_allocation(&ticker, target).unwrap();
    }
    portfolio
}

fn arb_portfolio() -> impl Strategy<Value = Portfolio> {
    (1usize..8).prop_flat_map(|len| {
        (
            prop::collection::vec(arb_price(), len),
            prop::collection::vec(arb_shares(), len),
            arb_targets(len),
        )
            .prop_map(|(prices, shares, targets)| build_portfolio(&prices, &shares, &targets))
    })
}

/// Everything is held in the first stock, so each target is at least 2
/// percentage points away from the current allocation and gets traded.
fn arb_concentrated_portfolio() -> impl Strategy<Value = Portfolio> {
    (1usize..8).prop_flat_map(|len| {
        (
            prop::collection::vec(arb_price(), len),
            1i64..100_000,
            prop::collection::vec(1u32..50, len),
        )
            .prop_map(|(prices, held, weights)| {
                let total: u32 = weights.iter().sum();
                let targets: Vec<f64> = weights
                    .iter()
                    .map(|&w| w as f64 * 100.0 / total as f64)
                    .collect();
                let mut shares = vec![0.0; prices.len()];
                shares[0] = held as f64 / 1000.0;
                build_portfolio(&prices, &shares, &targets)
            })
    })
}

// ============================================================================
// Stock
// ============================================================================

proptest! {
    #[test]
    fn price_round_trip(date in arb_date(), price in arb_price()) {
        let mut stock = Stock::new("AAPL", "Apple Inc.").unwrap();
        stock.add_price(date, price).unwrap();
        prop_assert_eq!(stock.price_on(date).unwrap(), price);
    }

    #[test]
    fn latest_price_is_at_max_date(
        entries in prop::collection::vec((arb_date(), arb_price()), 1..30)
    ) {
        let mut stock = Stock::new("AAPL", "Apple Inc.").unwrap();
        for &(date, price) in &entries {
            stock.add_price(date, price).unwrap();
        }
        let max_date = entries.iter().map(|(d, _)| *d).max().unwrap();
        // Later writes for the same date win.
        let expected = entries.iter().rev().find(|(d, _)| *d == max_date).unwrap().1;
        prop_assert_eq!(stock.latest_price().unwrap(), expected);
    }

    #[test]
    fn non_positive_prices_rejected(date in arb_date(), price in -1000.0f64..=0.0) {
        let mut stock = Stock::new("AAPL", "Apple Inc.").unwrap();
        prop_assert!(matches!(stock.add_price(date, price), Err(Error::Validation(_))));
    }
}

// ============================================================================
// Portfolio
// ============================================================================

proptest! {
    #[test]
    fn allocation_sum_within_band_validates(first in 0i32..=100, drift in -100i32..=100) {
        // drift is in hundredths of a percentage point, so the sum stays in [99, 101]
        let second = (100 - first) as f64 + drift as f64 / 100.0;
        prop_assume!((0.0..=100.0).contains(&second));
        let portfolio = build_portfolio(&[1.0, 1.0], &[1.0, 1.0], &[first as f64, second]);
        prop_assert!(portfolio.validate_allocations().is_ok());
    }

    #[test]
    fn allocation_sum_outside_band_fails(first in 0i32..=100, excess in 2i32..50, below in any::<bool>()) {
        let sum = match below {
            true => 100 - excess,
            false => 100 + excess,
        };
        let second = (sum - first) as f64;
        prop_assume!((0.0..=100.0).contains(&second));
        let portfolio = build_portfolio(&[1.0, 1.0], &[1.0, 1.0], &[first as f64, second]);
        match portfolio.validate_allocations() {
            Err(Error::AllocationSum { sum: observed }) => {
                prop_assert!((observed - sum as f64).abs() < 1e-9)
            }
            other => prop_assert!(false, "expected AllocationSum, got {:?}", other),
        }
    }

    #[test]
    fn value_is_sum_of_holdings(
        holdings in prop::collection::vec((arb_price(), arb_shares()), 1..8)
    ) {
        let prices: Vec<f64> = holdings.iter().map(|h| h.0).collect();
        let shares: Vec<f64> = holdings.iter().map(|h| h.1).collect();
        let targets = vec![0.0; holdings.len()];
        let portfolio = build_portfolio(&prices, &shares, &targets);
        let expected: f64 = holdings.iter().map(|(p, s)| p * s).sum();
        prop_assert!((portfolio.get_current_value().unwrap() - expected).abs() <= expected * 1e-12);
    }

    #[test]
    fn current_allocation_sums_to_100(portfolio in arb_portfolio()) {
        let value = portfolio.get_current_value().unwrap();
        prop_assume!(value > 0.0);
        let sum: f64 = portfolio.get_current_allocation().unwrap().values().sum();
        prop_assert!((sum - 100.0).abs() < 1e-6);
    }

    #[test]
    fn rebalance_is_sorted_and_positive(portfolio in arb_portfolio()) {
        prop_assume!(portfolio.get_current_value().unwrap() > 0.0);
        let actions = portfolio.rebalance().unwrap();
        prop_assert!(actions.windows(2).all(|w| w[0].ticker < w[1].ticker));
        for action in &actions {
            prop_assert!(action.shares > 0.0);
            prop_assert!(action.value > 0.0);
            if action.side == TradeSide::Sell {
                prop_assert!(action.shares <= portfolio.position(&action.ticker).unwrap() + 1e-9);
            }
        }
    }

    #[test]
    fn rebalance_is_idempotent(mut portfolio in arb_concentrated_portfolio()) {
        let actions = portfolio.rebalance().unwrap();
        portfolio.apply_actions(&actions).unwrap();
        prop_assert!(portfolio.rebalance().unwrap().is_empty());
    }

    #[test]
    fn unknown_ticker_is_rejected(ticker in "[A-Z]{1,5}", value in 0.0f64..100.0) {
        prop_assume!(ticker != "AAPL");
        let mut portfolio = Portfolio::new();
        portfolio.add_stock(Stock::new("AAPL", "Apple Inc.").unwrap()).unwrap();
        prop_assert!(matches!(portfolio.set_allocation(&ticker, value), Err(Error::Validation(_))));
        prop_assert!(matches!(portfolio.set_position(&ticker, value), Err(Error::Validation(_))));
    }
}
