//! End-to-end rebalance cycles through the public engine and the CLI pipeline.
//!
//! Tests cover:
//! - Reference scenarios (capped pair funded across currencies, below-threshold sell)
//! - Exclusions for missing prices and FX paths
//! - Minor-unit quotes and cost-basis rebasing
//! - Idempotence and NAV conservation
//! - The port-driven pipeline with mock collaborators

mod common;

use approx::assert_abs_diff_eq;
use common::*;
use longbook::cli::{execute_rebalance, run_rebalance_pipeline, Collaborators, RunOptions};
use longbook::domain::currency::ExchangeRateTable;
use longbook::domain::error::LongbookError;
use longbook::domain::exclusion::ExclusionReason;
use longbook::domain::planner::TradeAction;
use longbook::domain::portfolio::Portfolio;
use longbook::domain::position::Position;
use longbook::domain::rebalance::{rebalance, RebalanceConfig, RebalanceInput, RebalanceOutcome};
use longbook::domain::signal::Signal;

struct Cycle {
    portfolio: Portfolio,
    universe: Vec<String>,
    signals: Vec<Signal>,
    market: MockMarketData,
    fx: ExchangeRateTable,
}

impl Cycle {
    fn run(&self, config: &RebalanceConfig) -> Result<RebalanceOutcome, LongbookError> {
        let market = self.market.snapshot();
        let input = RebalanceInput {
            portfolio: &self.portfolio,
            universe: &self.universe,
            signals: &self.signals,
            market_data: &market,
            fx: &self.fx,
        };
        rebalance(&input, config, as_of())
    }
}

fn sek_portfolio(sek: f64) -> Portfolio {
    let mut portfolio = Portfolio::new("SEK");
    portfolio.credit("SEK", sek);
    portfolio
}

/// A(USD) conviction 0.8, B(SEK) 0.6, C(GBP) 0.3; 9,000 SEK + 100 USD cash.
fn scenario_a() -> Cycle {
    let mut portfolio = sek_portfolio(9_000.0);
    portfolio.credit("USD", 100.0);
    Cycle {
        portfolio,
        universe: tickers(&["A", "B", "C"]),
        signals: vec![
            signal("A", "value", 0.6, 1.0),
            signal("B", "value", 0.2, 1.0),
            signal("C", "value", -0.4, 1.0),
        ],
        market: MockMarketData::new()
            .with_price("A", "USD", 20.0)
            .with_price("B", "SEK", 50.0)
            .with_price("C", "GBP", 10.0),
        fx: nordic_fx().with_rate("GBP", "SEK", 13.0).unwrap(),
    }
}

fn scenario_a_config() -> RebalanceConfig {
    RebalanceConfig {
        max_holdings: 2,
        ..test_config()
    }
}

mod reference_scenarios {
    use super::*;

    #[test]
    fn scenario_a_capped_pair_leaves_residual_cash() {
        let outcome = scenario_a().run(&scenario_a_config()).unwrap();

        let selected: Vec<_> = outcome.selected.iter().map(|c| c.ticker.as_str()).collect();
        assert_eq!(selected, vec!["A", "B"]);

        for allocation in &outcome.allocations {
            assert_abs_diff_eq!(allocation.weight, 0.25, epsilon = 1e-12);
        }

        let a = outcome.trades.iter().find(|t| t.ticker == "A").unwrap();
        assert_eq!(a.action, TradeAction::Add);
        assert_eq!(a.resulting_shares, 12);
        let b = outcome.trades.iter().find(|t| t.ticker == "B").unwrap();
        assert_eq!(b.action, TradeAction::Add);
        assert_eq!(b.resulting_shares, 50);
        assert!(outcome.trades.iter().all(|t| t.ticker != "C"));

        // A is paid from the USD bucket first, the rest converted from SEK.
        assert_abs_diff_eq!(outcome.portfolio.cash_in("USD"), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(outcome.portfolio.cash_in("SEK"), 5_100.0, epsilon = 1e-6);

        let summary = &outcome.summary;
        assert_abs_diff_eq!(summary.nav_before, 10_000.0, epsilon = 1e-6);
        assert!((summary.nav_after - summary.nav_before).abs() <= 0.03 * summary.nav_before);
        assert_abs_diff_eq!(summary.cash_weight(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn scenario_b_below_threshold_holding_is_sold_into_native_bucket() {
        let mut portfolio = sek_portfolio(1_000.0);
        portfolio.add_position(Position::new("D", 100, 35.0, "DKK", Some(date(2024, 3, 1))));
        let cycle = Cycle {
            portfolio,
            universe: tickers(&["D"]),
            signals: vec![signal("D", "value", -0.8, 1.0)],
            market: MockMarketData::new().with_price("D", "DKK", 40.0),
            fx: nordic_fx(),
        };

        let outcome = cycle.run(&test_config()).unwrap();

        assert_eq!(outcome.trades.len(), 1);
        let trade = &outcome.trades[0];
        assert_eq!(trade.action, TradeAction::Sell);
        assert_eq!(trade.delta_shares, -100);
        assert_eq!(trade.resulting_shares, 0);
        assert!(!outcome.portfolio.has_position("D"));
        assert_abs_diff_eq!(outcome.portfolio.cash_in("DKK"), 4_000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(outcome.summary.nav_after, 7_000.0, epsilon = 1e-6);
    }
}

mod exclusions {
    use super::*;

    #[test]
    fn unresolvable_currency_is_excluded_and_cycle_continues() {
        let cycle = Cycle {
            portfolio: sek_portfolio(10_000.0),
            universe: tickers(&["LUG", "ERIC B"]),
            signals: vec![
                signal("LUG", "value", 1.0, 1.0),
                signal("ERIC B", "value", 1.0, 1.0),
            ],
            market: MockMarketData::new()
                .with_price("LUG", "CAD", 97.15)
                .with_price("ERIC B", "SEK", 80.0),
            fx: nordic_fx(),
        };

        let outcome = cycle.run(&test_config()).unwrap();
        assert_eq!(outcome.exclusions.len(), 1);
        assert_eq!(outcome.exclusions[0].ticker, "LUG");
        assert!(matches!(
            outcome.exclusions[0].reason,
            ExclusionReason::ExchangeRateUnavailable { .. }
        ));
        let traded: Vec<_> = outcome.trades.iter().map(|t| t.ticker.as_str()).collect();
        assert_eq!(traded, vec!["ERIC B"]);
    }

    #[test]
    fn held_ticker_without_prices_is_left_untouched() {
        let mut portfolio = sek_portfolio(5_000.0);
        portfolio.add_position(Position::new("DELISTED", 10, 12.0, "SEK", None));
        let cycle = Cycle {
            portfolio,
            universe: tickers(&["DELISTED"]),
            signals: vec![signal("DELISTED", "value", -1.0, 1.0)],
            market: MockMarketData::new(),
            fx: nordic_fx(),
        };

        let outcome = cycle.run(&test_config()).unwrap();
        assert!(outcome.trades.is_empty());
        assert_eq!(outcome.portfolio.get_position("DELISTED").unwrap().shares, 10);
        assert!(matches!(
            outcome.exclusions[0].reason,
            ExclusionReason::InsufficientPriceData { bars: 0, .. }
        ));
        assert_abs_diff_eq!(outcome.summary.nav_before, 5_000.0, epsilon = 1e-9);
    }

    #[test]
    fn zero_signal_ticker_never_enters() {
        let cycle = Cycle {
            portfolio: sek_portfolio(10_000.0),
            universe: tickers(&["LOUD", "QUIET"]),
            signals: vec![signal("LOUD", "value", 0.5, 1.0), signal("QUIET", "value", 1.0, 0.0)],
            market: MockMarketData::new()
                .with_price("LOUD", "SEK", 100.0)
                .with_price("QUIET", "SEK", 100.0),
            fx: nordic_fx(),
        };
        let outcome = cycle.run(&test_config()).unwrap();
        let selected: Vec<_> = outcome.selected.iter().map(|c| c.ticker.as_str()).collect();
        assert_eq!(selected, vec!["LOUD"]);
    }

    #[test]
    fn infeasible_constraints_abort_before_planning() {
        let config = RebalanceConfig {
            min_position: 0.3,
            max_position: 0.4,
            max_holdings: 4,
            ..test_config()
        };
        assert!(matches!(
            scenario_a().run(&config),
            Err(LongbookError::ConstraintInfeasible { .. })
        ));
    }
}

mod currencies_and_costs {
    use super::*;

    #[test]
    fn pence_quotes_are_sized_in_pounds() {
        let cycle = Cycle {
            portfolio: sek_portfolio(10_000.0),
            universe: tickers(&["LLOY"]),
            signals: vec![signal("LLOY", "value", 1.0, 1.0)],
            market: MockMarketData::new().with_price("LLOY", "GBX", 5_000.0),
            fx: nordic_fx().with_rate("GBP", "SEK", 13.0).unwrap(),
        };

        let outcome = cycle.run(&test_config()).unwrap();
        let position = outcome.portfolio.get_position("LLOY").unwrap();
        assert_eq!(position.shares, 3);
        assert_eq!(position.currency, "GBP");
        assert_abs_diff_eq!(position.cost_basis, 50.0, epsilon = 1e-9);
        assert_eq!(position.acquisition_date, Some(as_of()));
        assert_abs_diff_eq!(outcome.portfolio.cash_in("SEK"), 8_050.0, epsilon = 1e-6);
    }

    #[test]
    fn pence_holding_is_trimmed_with_pound_cash() {
        let mut portfolio = sek_portfolio(2_000.0);
        portfolio.credit("GBP", 100.0);
        portfolio.add_position(Position::new("BARC", 100, 2.0, "GBP", Some(date(2024, 6, 3))));
        let cycle = Cycle {
            portfolio,
            universe: tickers(&["BARC", "VOD"]),
            signals: vec![signal("BARC", "value", 1.0, 1.0), signal("VOD", "value", 1.0, 1.0)],
            market: MockMarketData::new()
                .with_price("BARC", "GBX", 250.0)
                .with_price("VOD", "GBP", 0.5),
            fx: nordic_fx().with_rate("GBP", "SEK", 13.0).unwrap(),
        };

        let outcome = cycle.run(&test_config()).unwrap();
        let summary = &outcome.summary;
        // 2,000 SEK + 100 GBP + 100 x 2.50 GBP, all at 13 SEK/GBP.
        assert_abs_diff_eq!(summary.nav_before, 6_550.0, epsilon = 1e-6);
        assert_abs_diff_eq!(summary.nav_after, summary.nav_before, epsilon = 1e-6);
        assert!(outcome.portfolio.cash.values().all(|&c| c >= -1e-9));

        let barc = outcome.trades.iter().find(|t| t.ticker == "BARC").unwrap();
        assert_eq!(barc.action, TradeAction::Decrease);
        assert_eq!(barc.resulting_shares, 50);
        assert_abs_diff_eq!(barc.price, 2.5, epsilon = 1e-12);

        let vod = outcome.trades.iter().find(|t| t.ticker == "VOD").unwrap();
        assert_eq!(vod.action, TradeAction::Add);
        assert_eq!(vod.resulting_shares, 251);

        let position = outcome.portfolio.get_position("BARC").unwrap();
        assert_eq!(position.currency, "GBP");
        assert_abs_diff_eq!(position.cost_basis, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn increase_rebases_cost_recorded_in_wrong_currency() {
        let mut portfolio = sek_portfolio(40_000.0);
        portfolio.add_position(Position::new("NOVO B", 10, 900.0, "SEK", Some(date(2024, 5, 2))));
        let cycle = Cycle {
            portfolio,
            universe: tickers(&["NOVO B"]),
            signals: vec![signal("NOVO B", "value", 1.0, 1.0)],
            market: MockMarketData::new().with_price("NOVO B", "DKK", 400.0),
            fx: nordic_fx(),
        };

        let outcome = cycle.run(&test_config()).unwrap();
        let trade = &outcome.trades[0];
        assert_eq!(trade.action, TradeAction::Increase);
        assert_eq!(trade.resulting_shares, 19);

        let position = outcome.portfolio.get_position("NOVO B").unwrap();
        assert_eq!(position.currency, "DKK");
        assert_abs_diff_eq!(position.cost_basis, 400.0, epsilon = 1e-9);
        assert_eq!(position.acquisition_date, Some(date(2024, 5, 2)));
    }
}

mod invariants {
    use super::*;

    #[test]
    fn identical_inputs_give_identical_outcomes() {
        let cycle = scenario_a();
        let first = cycle.run(&scenario_a_config()).unwrap();
        let second = cycle.run(&scenario_a_config()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn second_pass_on_result_trades_nothing_new() {
        let cycle = scenario_a();
        let first = cycle.run(&scenario_a_config()).unwrap();
        let again = Cycle {
            portfolio: first.portfolio.clone(),
            ..scenario_a()
        };
        let second = again.run(&scenario_a_config()).unwrap();
        assert!(second
            .trades
            .iter()
            .all(|t| t.action == TradeAction::Hold));
        assert_eq!(second.portfolio, first.portfolio);
    }

    #[test]
    fn nav_is_conserved_with_mixed_book() {
        let mut portfolio = sek_portfolio(3_000.0);
        portfolio.credit("EUR", 200.0);
        portfolio.add_position(Position::new("A", 40, 15.0, "USD", None));
        portfolio.add_position(Position::new("D", 50, 30.0, "DKK", None));
        let cycle = Cycle {
            portfolio,
            universe: tickers(&["A", "B", "D", "E"]),
            signals: vec![
                signal("A", "value", 0.9, 0.8),
                signal("A", "growth", -0.2, 0.4),
                signal("B", "value", 0.7, 1.0),
                signal("D", "value", -0.5, 1.0),
                signal("E", "quality", 0.3, 0.6),
            ],
            market: MockMarketData::new()
                .with_price("A", "USD", 21.5)
                .with_price("B", "SEK", 48.0)
                .with_price("D", "DKK", 41.0)
                .with_price("E", "EUR", 33.0),
            fx: nordic_fx(),
        };

        let outcome = cycle.run(&test_config()).unwrap();
        let summary = &outcome.summary;
        assert_abs_diff_eq!(summary.nav_after, summary.nav_before, epsilon = 1e-6);
        assert!(outcome.portfolio.cash.values().all(|&c| c >= -1e-6));
        assert!(outcome.allocations.iter().map(|a| a.weight).sum::<f64>() <= 1.0 + 1e-9);
    }
}

mod pipeline_mock {
    use super::*;

    fn options(dry_run: bool) -> RunOptions {
        RunOptions {
            as_of: as_of(),
            dry_run,
            report_path: None,
        }
    }

    #[test]
    fn pipeline_reports_and_saves() {
        let scenario = scenario_a();
        let store = MockPortfolioStore::new(scenario.portfolio.clone());
        let signals = MockSignals {
            signals: scenario.signals.clone(),
        };
        let fx = MockFx {
            table: scenario.fx.clone(),
        };
        let report = MockReport::new();
        let ports = Collaborators {
            portfolio: &store,
            signals: &signals,
            market: &scenario.market,
            fx: &fx,
            report: &report,
        };

        let outcome =
            execute_rebalance(&ports, &scenario_a_config(), &scenario.universe, &options(false))
                .unwrap();

        assert_eq!(report.calls.borrow().len(), 1);
        assert_eq!(report.calls.borrow()[0], (2, 3, None));
        let saved = store.saved.borrow();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, outcome.portfolio);
        assert_eq!(saved[0].1, as_of());
    }

    #[test]
    fn dry_run_does_not_save() {
        let scenario = scenario_a();
        let store = MockPortfolioStore::new(scenario.portfolio.clone());
        let signals = MockSignals {
            signals: scenario.signals.clone(),
        };
        let fx = MockFx {
            table: scenario.fx.clone(),
        };
        let report = MockReport::new();
        let ports = Collaborators {
            portfolio: &store,
            signals: &signals,
            market: &scenario.market,
            fx: &fx,
            report: &report,
        };

        let exit_code =
            run_rebalance_pipeline(&ports, &scenario_a_config(), &scenario.universe, &options(true));
        let code = format!("{exit_code:?}");
        assert_eq!(code, format!("{:?}", std::process::ExitCode::SUCCESS));
        assert!(store.saved.borrow().is_empty());
        assert_eq!(report.calls.borrow().len(), 1);
    }

    #[test]
    fn holdings_outside_universe_are_merged_in() {
        let mut portfolio = sek_portfolio(1_000.0);
        portfolio.add_position(Position::new("D", 100, 35.0, "DKK", None));
        let store = MockPortfolioStore::new(portfolio);
        let signals = MockSignals { signals: vec![] };
        let market = MockMarketData::new().with_price("D", "DKK", 40.0);
        let fx = MockFx { table: nordic_fx() };
        let report = MockReport::new();
        let ports = Collaborators {
            portfolio: &store,
            signals: &signals,
            market: &market,
            fx: &fx,
            report: &report,
        };

        let outcome =
            execute_rebalance(&ports, &test_config(), &tickers(&["X"]), &options(true)).unwrap();
        // Unscored but held: neutral conviction clears the default threshold.
        let selected: Vec<_> = outcome.selected.iter().map(|c| c.ticker.as_str()).collect();
        assert_eq!(selected, vec!["D"]);
        assert!(outcome.portfolio.has_position("D"));
    }

    #[test]
    fn corrupt_price_file_excludes_only_that_ticker() {
        let scenario = scenario_a();
        let store = MockPortfolioStore::new(scenario.portfolio.clone());
        let signals = MockSignals {
            signals: scenario.signals.clone(),
        };
        let market = MockMarketData::new()
            .with_price("B", "SEK", 50.0)
            .with_error("A", "bad row");
        let fx = MockFx {
            table: scenario.fx.clone(),
        };
        let report = MockReport::new();
        let ports = Collaborators {
            portfolio: &store,
            signals: &signals,
            market: &market,
            fx: &fx,
            report: &report,
        };

        let outcome =
            execute_rebalance(&ports, &scenario_a_config(), &scenario.universe, &options(true))
                .unwrap();
        let excluded: Vec<_> = outcome.exclusions.iter().map(|e| e.ticker.as_str()).collect();
        assert_eq!(excluded, vec!["A", "C"]);
        let traded: Vec<_> = outcome.trades.iter().map(|t| t.ticker.as_str()).collect();
        assert_eq!(traded, vec!["B"]);
    }
}
