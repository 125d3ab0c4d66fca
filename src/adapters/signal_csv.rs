//! Evaluator signals from a `ticker,evaluator,score,confidence,reasoning` CSV.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::domain::error::LongbookError;
use crate::domain::signal::Signal;
use crate::ports::signal_port::SignalPort;

#[derive(Debug, Deserialize)]
struct SignalRow {
    ticker: String,
    evaluator: String,
    score: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    reasoning: Option<String>,
}

pub struct CsvSignalAdapter {
    path: Option<PathBuf>,
}

impl CsvSignalAdapter {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

fn parse_score(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .or_else(|| Signal::score_from_label(raw))
}

/// Parse signals, keeping only tickers in `universe`. A missing confidence
/// counts as full confidence. Each evaluator gives at most one signal per
/// ticker; a repeated pair replaces the earlier row.
pub fn parse_signals(content: &str, universe: &[String]) -> Result<Vec<Signal>, LongbookError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut signals: Vec<Signal> = Vec::new();
    for (line, row) in rdr.deserialize::<SignalRow>().enumerate() {
        let row = row.map_err(|e| LongbookError::SignalParse {
            reason: format!("row {}: {}", line + 1, e),
        })?;
        if !universe.contains(&row.ticker) {
            continue;
        }
        let score = parse_score(&row.score).ok_or_else(|| LongbookError::SignalParse {
            reason: format!("{} / {}: unreadable score '{}'", row.ticker, row.evaluator, row.score),
        })?;
        let confidence = Signal::normalize_confidence(row.confidence.unwrap_or(1.0));
        let signal = Signal::new(
            &row.ticker,
            &row.evaluator,
            score,
            confidence,
            row.reasoning.as_deref().unwrap_or(""),
        );
        match signals
            .iter_mut()
            .find(|s| s.ticker == signal.ticker && s.evaluator_id == signal.evaluator_id)
        {
            Some(existing) => {
                log::warn!(
                    "{} / {}: listed more than once, keeping row {}",
                    signal.ticker,
                    signal.evaluator_id,
                    line + 1
                );
                *existing = signal;
            }
            None => signals.push(signal),
        }
    }
    Ok(signals)
}

impl SignalPort for CsvSignalAdapter {
    fn fetch_signals(&self, universe: &[String]) -> Result<Vec<Signal>, LongbookError> {
        let Some(path) = &self.path else {
            log::warn!("no signals file given, every ticker is unscored");
            return Ok(Vec::new());
        };
        let signals = parse_signals(&fs::read_to_string(path)?, universe)?;
        log::info!("loaded {} signals from {}", signals.len(), path.display());
        Ok(signals)
    }
}
