//! Concentrated-position selection.
//!
//! One acceptance threshold applies to every ticker, held or not, so the
//! selected set depends only on convictions and never on the starting book.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::domain::conviction::Conviction;

pub const DEFAULT_ENTRY_THRESHOLD: f64 = 0.5;

/// Rank tickers with `value >= entry_threshold` by descending conviction
/// (ties by ticker) and keep the top `max_holdings`.
///
/// `currently_held` only informs logging; it never changes the outcome.
/// Fewer qualifying tickers than slots yields a smaller set.
pub fn select(
    convictions: &[Conviction],
    currently_held: &BTreeSet<String>,
    max_holdings: usize,
    entry_threshold: f64,
) -> Vec<Conviction> {
    let mut ranked: Vec<&Conviction> = convictions
        .iter()
        .filter(|c| c.value >= entry_threshold)
        .collect();
    ranked.sort_by(|a, b| rank_order(a, b));

    let selected: Vec<Conviction> = ranked.into_iter().take(max_holdings).cloned().collect();

    for conviction in convictions {
        let chosen = selected.iter().any(|s| s.ticker == conviction.ticker);
        if currently_held.contains(&conviction.ticker) && !chosen {
            log::debug!(
                "{}: held but not selected (conviction {:.3}, threshold {:.3})",
                conviction.ticker,
                conviction.value,
                entry_threshold
            );
        }
    }

    selected
}

fn rank_order(a: &Conviction, b: &Conviction) -> Ordering {
    b.value
        .total_cmp(&a.value)
        .then_with(|| a.ticker.cmp(&b.ticker))
}
