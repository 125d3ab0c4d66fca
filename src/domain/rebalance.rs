//! One rebalance cycle: signals, prices and FX in; trade plan and new book out.
//!
//! The cycle is pure and synchronous. Per-ticker data problems exclude the
//! ticker and the cycle continues; configuration problems and NAV drift are
//! fatal and are raised before any result is produced.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::domain::allocation::{allocate, invested_weight, TargetAllocation};
use crate::domain::config_validation::validate_constraints;
use crate::domain::conviction::{to_conviction, Conviction};
use crate::domain::currency::{normalize_currency_code, ExchangeRateTable, DEFAULT_PIVOT};
use crate::domain::error::LongbookError;
use crate::domain::exclusion::Exclusion;
use crate::domain::ohlcv::InstrumentBars;
use crate::domain::planner::{plan, PlanParams, TradeInstruction};
use crate::domain::portfolio::Portfolio;
use crate::domain::price_context::{build_price_context, PriceContext, MIN_BARS};
use crate::domain::selection::{select, DEFAULT_ENTRY_THRESHOLD};
use crate::domain::signal::{aggregate_by_ticker, AggregatedScore, Signal};
use crate::ports::market_data_port::MarketDataPort;

/// Tunable parameters for a rebalance cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceConfig {
    pub home_currency: String,
    pub pivot_currency: String,
    pub max_holdings: usize,
    pub max_position: f64,
    pub min_position: f64,
    pub entry_threshold: f64,
    /// Home-currency value below which a trade is not worth making.
    pub min_trade_value: f64,
    pub slippage_k: f64,
    pub nav_tolerance: f64,
    pub lookback_bars: usize,
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        RebalanceConfig {
            home_currency: "SEK".to_string(),
            pivot_currency: DEFAULT_PIVOT.to_string(),
            max_holdings: 8,
            max_position: 0.25,
            min_position: 0.05,
            entry_threshold: DEFAULT_ENTRY_THRESHOLD,
            min_trade_value: 500.0,
            slippage_k: 1.0,
            nav_tolerance: 0.03,
            lookback_bars: 3,
        }
    }
}

pub struct RebalanceInput<'a> {
    pub portfolio: &'a Portfolio,
    pub universe: &'a [String],
    pub signals: &'a [Signal],
    pub market_data: &'a BTreeMap<String, InstrumentBars>,
    pub fx: &'a ExchangeRateTable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSummary {
    pub home_currency: String,
    pub nav_before: f64,
    pub nav_after: f64,
    pub positions_value: f64,
    pub cash_home: f64,
    pub cash_by_currency: BTreeMap<String, f64>,
    /// Rate into the home currency for every currency involved.
    pub fx_rates: BTreeMap<String, f64>,
    pub num_positions: usize,
    pub invested_weight: f64,
}

impl PortfolioSummary {
    pub fn cash_weight(&self) -> f64 {
        1.0 - self.invested_weight
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceOutcome {
    pub trades: Vec<TradeInstruction>,
    pub portfolio: Portfolio,
    pub summary: PortfolioSummary,
    pub exclusions: Vec<Exclusion>,
    pub scores: BTreeMap<String, AggregatedScore>,
    pub convictions: Vec<Conviction>,
    pub selected: Vec<Conviction>,
    pub allocations: Vec<TargetAllocation>,
    pub price_contexts: BTreeMap<String, PriceContext>,
}

/// Run one cycle. `as_of` stamps newly opened positions.
pub fn rebalance(
    input: &RebalanceInput,
    config: &RebalanceConfig,
    as_of: NaiveDate,
) -> Result<RebalanceOutcome, LongbookError> {
    validate_constraints(config)?;

    let home = normalize_currency_code(&config.home_currency);
    let current = input.portfolio.with_home_currency(&home);
    let held = current.held_tickers();

    for ticker in held.iter().filter(|t| !input.universe.contains(*t)) {
        log::warn!("{ticker}: held but missing from universe, it will not be a candidate");
    }

    let mut exclusions = Vec::new();
    let priced: BTreeSet<&String> = input.universe.iter().chain(held.iter()).collect();
    let mut contexts = BTreeMap::new();
    for ticker in priced {
        match price_and_check(ticker, input, config, &home) {
            Ok(ctx) => {
                contexts.insert(ticker.clone(), ctx);
            }
            Err(err) => exclusions.push(Exclusion::from_error(ticker, err)?),
        }
    }

    let valuation = current.valuation(&contexts, input.fx)?;
    exclusions.extend(valuation.excluded.iter().cloned());
    log::info!(
        "NAV {:.2} {home} ({:.2} positions, {:.2} cash)",
        valuation.nav,
        valuation.positions_value,
        valuation.cash_value
    );

    let scores = aggregate_by_ticker(input.universe, input.signals);

    let convictions: Vec<Conviction> = input
        .universe
        .iter()
        .filter(|t| contexts.contains_key(*t))
        .filter_map(|ticker| {
            let agg = scores.get(ticker)?;
            if !agg.is_scored() && !held.contains(ticker) {
                log::debug!("{ticker}: no signals, not a candidate");
                return None;
            }
            Some(Conviction::new(ticker, to_conviction(agg.score)))
        })
        .collect();

    let selected = select(
        &convictions,
        &held,
        config.max_holdings,
        config.entry_threshold,
    );
    let allocations = allocate(&selected, config.min_position, config.max_position);
    log::info!(
        "selected {} of {} candidates, {:.1}% invested",
        selected.len(),
        convictions.len(),
        invested_weight(&allocations) * 100.0
    );

    let params = PlanParams {
        min_trade_value: config.min_trade_value,
        as_of,
    };
    let trade_plan = plan(
        &allocations,
        &current,
        &contexts,
        valuation.nav,
        input.fx,
        &params,
    );

    let after = trade_plan.portfolio.valuation(&contexts, input.fx)?;
    verify_nav_conservation(valuation.nav, after.nav, config.nav_tolerance)?;

    let mut currencies = current.currencies();
    currencies.extend(trade_plan.portfolio.currencies());
    currencies.extend(contexts.values().map(|c| c.currency.clone()));

    let summary = PortfolioSummary {
        home_currency: home.clone(),
        nav_before: valuation.nav,
        nav_after: after.nav,
        positions_value: after.positions_value,
        cash_home: after.cash_value,
        cash_by_currency: trade_plan.portfolio.cash.clone(),
        fx_rates: input.fx.rates_into(&currencies, &home),
        num_positions: trade_plan.portfolio.position_count(),
        invested_weight: invested_weight(&allocations),
    };

    Ok(RebalanceOutcome {
        trades: trade_plan.trades,
        portfolio: trade_plan.portfolio,
        summary,
        exclusions,
        scores,
        convictions,
        selected,
        allocations,
        price_contexts: contexts,
    })
}

fn price_and_check(
    ticker: &str,
    input: &RebalanceInput,
    config: &RebalanceConfig,
    home: &str,
) -> Result<PriceContext, LongbookError> {
    let data = input
        .market_data
        .get(ticker)
        .ok_or_else(|| LongbookError::InsufficientPriceData {
            ticker: ticker.to_string(),
            bars: 0,
            minimum: MIN_BARS,
        })?;
    let ctx = build_price_context(ticker, &data.currency, &data.bars, config.slippage_k)?;
    input.fx.rate(&ctx.currency, home)?;
    Ok(ctx)
}

/// Fetch bars for every ticker through `port`.
///
/// Tickers the source cannot serve are left out of the map (and so get
/// excluded by [`rebalance`]); I/O failures abort.
pub fn gather_market_data(
    port: &dyn MarketDataPort,
    tickers: &[String],
    as_of: NaiveDate,
    lookback: usize,
) -> Result<BTreeMap<String, InstrumentBars>, LongbookError> {
    let mut market = BTreeMap::new();
    for ticker in tickers {
        match port.fetch_bars(ticker, as_of, lookback) {
            Ok(data) => {
                market.insert(ticker.clone(), data);
            }
            Err(err @ LongbookError::Io(_)) => return Err(err),
            Err(err) => log::warn!("{ticker}: {err}"),
        }
    }
    Ok(market)
}

/// Post-plan NAV must stay within `tolerance` (relative) of the pre-plan NAV.
pub fn verify_nav_conservation(
    before: f64,
    after: f64,
    tolerance: f64,
) -> Result<(), LongbookError> {
    let allowed = tolerance * before.abs();
    if (after - before).abs() > allowed + 1e-6 {
        return Err(LongbookError::NavToleranceExceeded {
            before,
            after,
            tolerance,
        });
    }
    Ok(())
}
