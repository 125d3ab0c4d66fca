//! Whole-share trade planning against target weights.
//!
//! Target shares are `floor(weight · NAV / price_home)`, so the plan never
//! spends more than the book is worth. Reductions settle first and credit
//! their native cash bucket, which then funds same-cycle buys; buys draw on
//! their native bucket, then home cash, then any other convertible bucket.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;

use crate::domain::allocation::TargetAllocation;
use crate::domain::currency::{normalize, ExchangeRateTable};
use crate::domain::portfolio::{Portfolio, CASH_EPSILON};
use crate::domain::position::Position;
use crate::domain::price_context::PriceContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeAction {
    Add,
    Increase,
    Hold,
    Decrease,
    Sell,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Add => "ADD",
            TradeAction::Increase => "INCREASE",
            TradeAction::Hold => "HOLD",
            TradeAction::Decrease => "DECREASE",
            TradeAction::Sell => "SELL",
        }
    }

    fn classify(current: u64, target: u64) -> TradeAction {
        match (current, target) {
            (0, _) => TradeAction::Add,
            (_, 0) => TradeAction::Sell,
            (c, t) if t > c => TradeAction::Increase,
            (c, t) if t < c => TradeAction::Decrease,
            _ => TradeAction::Hold,
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeInstruction {
    pub ticker: String,
    pub action: TradeAction,
    pub current_shares: u64,
    pub delta_shares: i64,
    pub resulting_shares: u64,
    pub currency: String,
    /// Native-currency price the trade is sized at.
    pub price: f64,
    pub home_currency_value_delta: f64,
    pub current_weight: f64,
    pub target_weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanParams {
    pub min_trade_value: f64,
    pub as_of: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradePlan {
    pub trades: Vec<TradeInstruction>,
    pub portfolio: Portfolio,
}

struct Leg<'a> {
    ticker: String,
    ctx: &'a PriceContext,
    price_home: f64,
    current: u64,
    target: u64,
    weight: f64,
}

/// Diff target weights against the current book.
///
/// Held tickers without a price context or a usable FX path are left
/// untouched; they are neither valued nor traded.
pub fn plan(
    targets: &[TargetAllocation],
    current: &Portfolio,
    contexts: &BTreeMap<String, PriceContext>,
    nav_home: f64,
    fx: &ExchangeRateTable,
    params: &PlanParams,
) -> TradePlan {
    let mut portfolio = current.clone();
    if nav_home <= 0.0 {
        log::info!("NAV is {nav_home:.2}, nothing to plan");
        return TradePlan {
            trades: Vec::new(),
            portfolio,
        };
    }

    let weights: BTreeMap<&str, f64> = targets
        .iter()
        .map(|t| (t.ticker.as_str(), t.weight))
        .collect();
    let tickers: BTreeSet<&str> = weights
        .keys()
        .copied()
        .chain(current.positions.keys().map(String::as_str))
        .collect();

    let mut legs: Vec<Leg> = tickers
        .into_iter()
        .filter_map(|ticker| {
            build_leg(
                ticker,
                weights.get(ticker).copied().unwrap_or(0.0),
                current,
                contexts,
                nav_home,
                fx,
                params.min_trade_value,
            )
        })
        .collect();

    // Reductions first so their proceeds can fund buys.
    for leg in legs.iter().filter(|l| l.target <= l.current && l.current > 0) {
        settle_reduction(&mut portfolio, leg);
    }

    legs.sort_by(|a, b| {
        b.weight
            .total_cmp(&a.weight)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    for leg in legs.iter_mut().filter(|l| l.target > l.current) {
        settle_purchase(&mut portfolio, leg, fx, params.as_of);
    }

    let mut trades: Vec<TradeInstruction> = legs
        .iter()
        .filter(|l| l.current > 0 || l.target > 0)
        .map(|l| instruction(l, nav_home))
        .collect();
    trades.sort_by(|a, b| a.ticker.cmp(&b.ticker));

    TradePlan { trades, portfolio }
}

fn build_leg<'a>(
    ticker: &str,
    weight: f64,
    current: &Portfolio,
    contexts: &'a BTreeMap<String, PriceContext>,
    nav_home: f64,
    fx: &ExchangeRateTable,
    min_trade_value: f64,
) -> Option<Leg<'a>> {
    let ctx = contexts.get(ticker)?;
    let price_home = match normalize(ctx.last_close, &ctx.currency, &current.home_currency, fx) {
        Ok(p) if p > 0.0 => p,
        _ => {
            log::warn!("{ticker}: cannot price in {}, left untouched", current.home_currency);
            return None;
        }
    };

    let held = current.get_position(ticker).map_or(0, |p| p.shares);
    let mut target = if weight > 0.0 {
        (weight * nav_home / price_home).floor().max(0.0) as u64
    } else {
        0
    };

    let trade_value = (target as f64 - held as f64).abs() * price_home;
    if target > 0 && trade_value < min_trade_value {
        if held > 0 {
            log::debug!("{ticker}: trade of {trade_value:.2} below minimum, holding");
        } else {
            log::debug!("{ticker}: opening value {trade_value:.2} below minimum, skipped");
        }
        target = held;
    }

    Some(Leg {
        ticker: ticker.to_string(),
        ctx,
        price_home,
        current: held,
        target,
        weight,
    })
}

fn settle_reduction(portfolio: &mut Portfolio, leg: &Leg) {
    let Some(existing) = portfolio.get_position(&leg.ticker).cloned() else {
        return;
    };
    let sold = leg.current - leg.target;
    if sold > 0 {
        portfolio.credit(&leg.ctx.currency, sold as f64 * leg.ctx.last_close);
    }
    if leg.target == 0 {
        log::debug!("{}: selling {} shares", leg.ticker, sold);
        portfolio.remove_position(&leg.ticker);
        return;
    }
    portfolio.add_position(Position {
        shares: leg.target,
        cost_basis: existing.cost_after_reduce_or_hold(leg.ctx.last_close, &leg.ctx.currency),
        currency: leg.ctx.currency.clone(),
        ..existing
    });
}

fn settle_purchase(
    portfolio: &mut Portfolio,
    leg: &mut Leg,
    fx: &ExchangeRateTable,
    as_of: NaiveDate,
) {
    let ctx = leg.ctx;
    let price = ctx.last_close;
    let ccy = ctx.currency.as_str();

    let mut wanted = leg.target - leg.current;
    let affordable = (spendable_in(portfolio, ccy, fx) / price).floor().max(0.0) as u64;
    if wanted > affordable {
        log::warn!(
            "{}: cash covers {} of {} shares, reducing buy",
            leg.ticker,
            affordable,
            wanted
        );
        wanted = affordable;
        leg.target = leg.current + wanted;
    }
    if wanted == 0 {
        return;
    }

    fund(portfolio, ccy, wanted as f64 * price, fx);

    let position = match portfolio.get_position(&leg.ticker) {
        Some(existing) => Position {
            shares: leg.target,
            cost_basis: existing.cost_after_increase(wanted, price, ccy),
            currency: ccy.to_string(),
            ..existing.clone()
        },
        None => Position::new(&leg.ticker, leg.target, price, ccy, Some(as_of)),
    };
    portfolio.add_position(position);
}

/// Cash available to a buy in `ccy`, converting every reachable bucket.
fn spendable_in(portfolio: &Portfolio, ccy: &str, fx: &ExchangeRateTable) -> f64 {
    portfolio
        .cash
        .iter()
        .filter(|(_, amount)| **amount > 0.0)
        .filter_map(|(src, amount)| fx.rate(ccy, src).ok().map(|rate| amount / rate))
        .sum()
}

/// Debit `cost` (in `ccy`): native bucket, then home, then the rest in code order.
fn fund(portfolio: &mut Portfolio, ccy: &str, cost: f64, fx: &ExchangeRateTable) {
    let mut remaining = cost;

    let mut sources = vec![ccy.to_string()];
    if portfolio.home_currency != ccy {
        sources.push(portfolio.home_currency.clone());
    }
    sources.extend(
        portfolio
            .cash
            .keys()
            .filter(|k| k.as_str() != ccy && **k != portfolio.home_currency)
            .cloned(),
    );

    for src in sources {
        if remaining <= CASH_EPSILON {
            break;
        }
        let available = portfolio.cash_in(&src);
        if available <= 0.0 {
            continue;
        }
        let Ok(rate) = fx.rate(ccy, &src) else {
            continue;
        };
        let needed = remaining * rate;
        let taken = needed.min(available);
        portfolio.debit(&src, taken);
        remaining -= taken / rate;
        if src != ccy {
            log::debug!("converted {taken:.2} {src} to fund {ccy} purchase");
        }
    }

    if remaining > CASH_EPSILON {
        // Only rounding residue reaches here.
        portfolio.debit(ccy, remaining);
    }
}

fn instruction(leg: &Leg, nav_home: f64) -> TradeInstruction {
    let action = TradeAction::classify(leg.current, leg.target);
    let delta = leg.target as i64 - leg.current as i64;
    TradeInstruction {
        ticker: leg.ticker.clone(),
        action,
        current_shares: leg.current,
        delta_shares: delta,
        resulting_shares: leg.target,
        currency: leg.ctx.currency.clone(),
        price: leg.ctx.last_close,
        home_currency_value_delta: delta as f64 * leg.price_home,
        current_weight: leg.current as f64 * leg.price_home / nav_home,
        target_weight: leg.weight,
    }
}

/// Order used when presenting trades: sells and reductions before buys.
pub fn execution_order(a: &TradeInstruction, b: &TradeInstruction) -> Ordering {
    fn rank(action: TradeAction) -> u8 {
        match action {
            TradeAction::Sell => 0,
            TradeAction::Decrease => 1,
            TradeAction::Hold => 2,
            TradeAction::Increase => 3,
            TradeAction::Add => 4,
        }
    }
    rank(a.action)
        .cmp(&rank(b.action))
        .then_with(|| a.ticker.cmp(&b.ticker))
}
