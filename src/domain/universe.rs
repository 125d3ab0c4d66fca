//! Candidate universe: the tickers a cycle is allowed to consider.
//!
//! Lists come from a file (one or more tickers per line, comma separated)
//! and/or an inline comma list. Tickers may contain spaces (`VOLV B`), so
//! only commas and newlines separate entries.

use std::collections::{BTreeSet, HashSet};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("universe is empty")]
    Empty,

    #[error("unterminated quote in universe entry: {0}")]
    UnterminatedQuote(String),
}

/// Parse universe file content. `#` and `--` lines are comments, as is
/// anything after an inline `#`.
pub fn parse_universe(content: &str) -> Result<Vec<String>, UniverseError> {
    let mut tickers = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("--") {
            continue;
        }
        let line = match line.find('#') {
            Some(idx) => &line[..idx],
            None => line,
        };
        tickers.extend(split_entries(line)?);
    }
    Ok(dedupe(tickers))
}

/// Parse an inline comma-separated list such as `--tickers "AAPL, VOLV B"`.
pub fn parse_tickers(inline: &str) -> Result<Vec<String>, UniverseError> {
    Ok(dedupe(split_entries(inline)?))
}

/// Merge the file and inline lists, in that order; at least one ticker is required.
pub fn resolve_universe(
    file_content: Option<&str>,
    inline: Option<&str>,
) -> Result<Vec<String>, UniverseError> {
    let mut tickers = Vec::new();
    if let Some(content) = file_content {
        tickers.extend(parse_universe(content)?);
    }
    if let Some(list) = inline {
        tickers.extend(parse_tickers(list)?);
    }
    let tickers = dedupe(tickers);
    if tickers.is_empty() {
        return Err(UniverseError::Empty);
    }
    Ok(tickers)
}

/// Append currently held tickers that the list does not already name.
pub fn union_with_holdings(universe: &[String], held: &BTreeSet<String>) -> Vec<String> {
    let mut merged = universe.to_vec();
    for ticker in held {
        if !merged.contains(ticker) {
            log::debug!("{ticker}: held, added to universe");
            merged.push(ticker.clone());
        }
    }
    merged
}

fn split_entries(line: &str) -> Result<Vec<String>, UniverseError> {
    let mut entries = Vec::new();
    for raw in line.split(',') {
        let token = raw.trim();
        if token.is_empty() {
            continue;
        }
        entries.push(strip_quotes(token)?);
    }
    Ok(entries)
}

fn strip_quotes(token: &str) -> Result<String, UniverseError> {
    let first = token.chars().next();
    match first {
        Some(q @ ('"' | '\'')) => {
            let inner = &token[1..];
            match inner.strip_suffix(q) {
                Some(body) => Ok(body.trim().to_string()),
                None => Err(UniverseError::UnterminatedQuote(token.to_string())),
            }
        }
        _ => Ok(token.to_string()),
    }
}

fn dedupe(tickers: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tickers
        .into_iter()
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}
