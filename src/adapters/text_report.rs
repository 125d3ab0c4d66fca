//! Plain-text rebalance report implementing `ReportPort`.

use std::collections::BTreeMap;
use std::fs;

use crate::domain::error::LongbookError;
use crate::domain::planner::TradeInstruction;
use crate::domain::rebalance::RebalanceOutcome;
use crate::domain::signal::Signal;
use crate::ports::report_port::ReportPort;

const RULE_WIDTH: usize = 72;

pub struct TextReportAdapter {
    verbose: bool,
}

impl TextReportAdapter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn render(&self, outcome: &RebalanceOutcome, signals: &[Signal]) -> String {
        let mut out = String::new();
        let heavy = "=".repeat(RULE_WIDTH);
        out.push_str(&format!("{heavy}\nPORTFOLIO REBALANCE\n{heavy}\n"));
        out.push_str(&render_summary(outcome));
        out.push_str(&render_trades(outcome));
        if !outcome.exclusions.is_empty() {
            out.push_str(&section("EXCLUDED"));
            for exclusion in &outcome.exclusions {
                out.push_str(&format!("  {exclusion}\n"));
            }
        }
        if self.verbose {
            out.push_str(&render_opinions(outcome, signals));
        }
        out
    }
}

fn section(title: &str) -> String {
    format!("\n{}\n{title}\n{}\n", "-".repeat(40), "-".repeat(40))
}

fn render_summary(outcome: &RebalanceOutcome) -> String {
    let s = &outcome.summary;
    let home = &s.home_currency;
    let mut out = String::new();
    out.push_str(&format!("NAV before:   {:>14.2} {home}\n", s.nav_before));
    out.push_str(&format!("NAV after:    {:>14.2} {home}\n", s.nav_after));
    out.push_str(&format!("Positions:    {:>14.2} {home} ({} holdings)\n", s.positions_value, s.num_positions));
    out.push_str(&format!("Cash:         {:>14.2} {home} ({:.1}% target)\n", s.cash_home, s.cash_weight() * 100.0));

    let foreign: Vec<_> = s.fx_rates.iter().filter(|(ccy, _)| *ccy != home).collect();
    if !foreign.is_empty() {
        out.push_str(&format!("\nExchange rates (to {home}):\n"));
        for (ccy, rate) in foreign {
            out.push_str(&format!("  1 {ccy} = {rate:.4} {home}\n"));
        }
    }

    let buckets: Vec<_> = s.cash_by_currency.iter().filter(|(_, a)| **a != 0.0).collect();
    if !buckets.is_empty() {
        out.push_str("\nCash by currency:\n");
        for (ccy, amount) in buckets {
            out.push_str(&format!("  {ccy:<4} {amount:>14.2}\n"));
        }
    }
    out
}

fn render_trades(outcome: &RebalanceOutcome) -> String {
    let mut out = section("RECOMMENDATIONS");
    if outcome.trades.is_empty() {
        out.push_str("  No trades.\n");
        return out;
    }
    let convictions: BTreeMap<&str, f64> = outcome
        .convictions
        .iter()
        .map(|c| (c.ticker.as_str(), c.value))
        .collect();

    for trade in &outcome.trades {
        out.push_str(&render_trade(trade, &outcome.summary.home_currency));
        if let Some(ctx) = outcome.price_contexts.get(&trade.ticker) {
            out.push_str(&format!(
                "    Price:   {:.2} {} (band {:.2} - {:.2})\n",
                ctx.last_close, ctx.currency, ctx.slippage_band_low, ctx.slippage_band_high
            ));
        }
        if let Some(value) = convictions.get(trade.ticker.as_str()) {
            out.push_str(&format!("    Conviction: {:.1}%\n", value * 100.0));
        }
    }
    out
}

fn render_trade(trade: &TradeInstruction, home: &str) -> String {
    format!(
        "\n  {} {}\n    Current: {} shares ({:.1}%)\n    Target:  {} shares ({:.1}%)\n    Change:  {:+.0} {home}\n",
        trade.action,
        trade.ticker,
        trade.current_shares,
        trade.current_weight * 100.0,
        trade.resulting_shares,
        trade.target_weight * 100.0,
        trade.home_currency_value_delta,
    )
}

fn render_opinions(outcome: &RebalanceOutcome, signals: &[Signal]) -> String {
    let mut out = section("EVALUATOR OPINIONS");
    let mut by_ticker: BTreeMap<&str, Vec<&Signal>> = BTreeMap::new();
    for signal in signals {
        by_ticker.entry(signal.ticker.as_str()).or_default().push(signal);
    }
    if by_ticker.is_empty() {
        out.push_str("  No signals.\n");
        return out;
    }
    for (ticker, list) in by_ticker {
        let aggregate = outcome.scores.get(ticker).map(|a| a.score).unwrap_or(0.0);
        out.push_str(&format!("\n  {ticker} (aggregate {aggregate:+.2}):\n"));
        for signal in list {
            let sentiment = if signal.score > 0.0 {
                "Bullish"
            } else if signal.score < 0.0 {
                "Bearish"
            } else {
                "Neutral"
            };
            out.push_str(&format!(
                "    {}: {sentiment} ({:+.2}, {:.0}% confidence)",
                signal.evaluator_id,
                signal.score,
                signal.confidence * 100.0
            ));
            if !signal.reasoning.is_empty() {
                out.push_str(&format!(" {}", signal.reasoning));
            }
            out.push('\n');
        }
    }
    out
}

impl ReportPort for TextReportAdapter {
    fn write(
        &self,
        outcome: &RebalanceOutcome,
        signals: &[Signal],
        output_path: Option<&str>,
    ) -> Result<(), LongbookError> {
        let text = self.render(outcome, signals);
        match output_path {
            Some(path) => {
                fs::write(path, text)?;
                log::info!("report written to {path}");
            }
            None => print!("{text}"),
        }
        Ok(())
    }
}
