//! Configuration validation.
//!
//! Every `[rebalance]` field is checked before a cycle runs so that a bad
//! config never produces a partial plan.

use crate::domain::error::LongbookError;
use crate::domain::rebalance::RebalanceConfig;
use crate::ports::config_port::ConfigPort;

const SECTION: &str = "rebalance";

pub fn validate_rebalance_config(config: &dyn ConfigPort) -> Result<(), LongbookError> {
    let defaults = RebalanceConfig::default();
    validate_currency(config, "home_currency")?;
    validate_currency(config, "pivot_currency")?;
    validate_max_holdings(config)?;
    validate_position_bounds(config)?;
    validate_unit_interval(config, "entry_threshold", defaults.entry_threshold)?;
    validate_non_negative(config, "min_trade_value", defaults.min_trade_value)?;
    validate_non_negative(config, "slippage_k", defaults.slippage_k)?;
    validate_nav_tolerance(config)?;
    validate_lookback(config)?;
    validate_constraints(&build_rebalance_config(config))
}

/// The allocator cannot honour `min_position` for every slot when
/// `min_position × max_holdings` exceeds the whole book.
pub fn validate_constraints(config: &RebalanceConfig) -> Result<(), LongbookError> {
    if config.min_position * config.max_holdings as f64 > 1.0 + 1e-12 {
        return Err(LongbookError::ConstraintInfeasible {
            min_position: config.min_position,
            max_holdings: config.max_holdings,
        });
    }
    Ok(())
}

/// Read `[rebalance]` into a `RebalanceConfig`, falling back to defaults.
pub fn build_rebalance_config(config: &dyn ConfigPort) -> RebalanceConfig {
    let defaults = RebalanceConfig::default();
    RebalanceConfig {
        home_currency: config
            .get_string(SECTION, "home_currency")
            .map(|s| s.trim().to_string())
            .unwrap_or(defaults.home_currency),
        pivot_currency: config
            .get_string(SECTION, "pivot_currency")
            .map(|s| s.trim().to_string())
            .unwrap_or(defaults.pivot_currency),
        max_holdings: config
            .get_int(SECTION, "max_holdings", defaults.max_holdings as i64)
            .max(0) as usize,
        max_position: config.get_double(SECTION, "max_position", defaults.max_position),
        min_position: config.get_double(SECTION, "min_position", defaults.min_position),
        entry_threshold: config.get_double(SECTION, "entry_threshold", defaults.entry_threshold),
        min_trade_value: config.get_double(SECTION, "min_trade_value", defaults.min_trade_value),
        slippage_k: config.get_double(SECTION, "slippage_k", defaults.slippage_k),
        nav_tolerance: config.get_double(SECTION, "nav_tolerance", defaults.nav_tolerance),
        lookback_bars: config
            .get_int(SECTION, "lookback_bars", defaults.lookback_bars as i64)
            .max(0) as usize,
    }
}

fn invalid(key: &str, reason: &str) -> LongbookError {
    LongbookError::ConfigInvalid {
        section: SECTION.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_currency(config: &dyn ConfigPort, key: &str) -> Result<(), LongbookError> {
    match config.get_string(SECTION, key) {
        Some(s) if s.trim().is_empty() => Err(invalid(key, "currency code must not be empty")),
        Some(s) if !s.trim().chars().all(|c| c.is_ascii_alphabetic()) => Err(invalid(
            key,
            "currency code must be alphabetic (e.g. SEK)",
        )),
        _ => Ok(()),
    }
}

fn validate_max_holdings(config: &dyn ConfigPort) -> Result<(), LongbookError> {
    let value = config.get_int(SECTION, "max_holdings", 8);
    if value < 1 {
        return Err(invalid("max_holdings", "max_holdings must be at least 1"));
    }
    Ok(())
}

fn validate_position_bounds(config: &dyn ConfigPort) -> Result<(), LongbookError> {
    let defaults = RebalanceConfig::default();
    let min = config.get_double(SECTION, "min_position", defaults.min_position);
    let max = config.get_double(SECTION, "max_position", defaults.max_position);
    if !(min > 0.0 && min <= 1.0) {
        return Err(invalid("min_position", "min_position must be in (0, 1]"));
    }
    if !(max > 0.0 && max <= 1.0) {
        return Err(invalid("max_position", "max_position must be in (0, 1]"));
    }
    if min > max {
        return Err(invalid(
            "min_position",
            "min_position must not exceed max_position",
        ));
    }
    Ok(())
}

fn validate_unit_interval(
    config: &dyn ConfigPort,
    key: &str,
    default: f64,
) -> Result<(), LongbookError> {
    let value = config.get_double(SECTION, key, default);
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(key, &format!("{key} must be between 0 and 1")));
    }
    Ok(())
}

fn validate_non_negative(
    config: &dyn ConfigPort,
    key: &str,
    default: f64,
) -> Result<(), LongbookError> {
    let value = config.get_double(SECTION, key, default);
    if !(value >= 0.0 && value.is_finite()) {
        return Err(invalid(key, &format!("{key} must be non-negative")));
    }
    Ok(())
}

fn validate_nav_tolerance(config: &dyn ConfigPort) -> Result<(), LongbookError> {
    let value = config.get_double(SECTION, "nav_tolerance", 0.03);
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            "nav_tolerance",
            "nav_tolerance must be in [0, 1)",
        ));
    }
    Ok(())
}

fn validate_lookback(config: &dyn ConfigPort) -> Result<(), LongbookError> {
    let value = config.get_int(SECTION, "lookback_bars", 3);
    if value < 1 {
        return Err(invalid("lookback_bars", "lookback_bars must be at least 1"));
    }
    Ok(())
}
