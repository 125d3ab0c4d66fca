//! Evaluator signals and confidence-weighted aggregation.
//!
//! Each evaluator emits at most one signal per ticker per cycle. The
//! aggregate is `Σ(score·confidence) / Σconfidence`; no signal is dropped for
//! disagreeing with the others, and evaluators missing a ticker are simply
//! absent from its list.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub ticker: String,
    pub evaluator_id: String,
    /// Bidirectional opinion in [-1, 1]; negative is bearish.
    pub score: f64,
    /// Weight of the opinion in [0, 1].
    pub confidence: f64,
    pub reasoning: String,
}

impl Signal {
    /// Construct a signal, clamping score and confidence into range.
    /// NaN inputs degrade to a neutral score or zero confidence.
    pub fn new(
        ticker: &str,
        evaluator_id: &str,
        score: f64,
        confidence: f64,
        reasoning: &str,
    ) -> Self {
        Signal {
            ticker: ticker.to_string(),
            evaluator_id: evaluator_id.to_string(),
            score: clamp_or(score, -1.0, 1.0, 0.0),
            confidence: clamp_or(confidence, 0.0, 1.0, 0.0),
            reasoning: reasoning.to_string(),
        }
    }

    /// Map an evaluator label (`bullish` / `neutral` / `bearish`) to a score.
    pub fn score_from_label(label: &str) -> Option<f64> {
        match label.trim().to_lowercase().as_str() {
            "bullish" | "buy" => Some(1.0),
            "neutral" | "hold" => Some(0.0),
            "bearish" | "sell" => Some(-1.0),
            _ => None,
        }
    }

    /// Confidence reported as a percentage (e.g. 75) is read as 0.75.
    pub fn normalize_confidence(raw: f64) -> f64 {
        if raw > 1.0 { raw / 100.0 } else { raw }
    }
}

fn clamp_or(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedScore {
    pub ticker: String,
    pub score: f64,
    /// Signals carrying positive confidence. Zero means the ticker is unscored.
    pub signal_count: usize,
}

impl AggregatedScore {
    pub fn is_scored(&self) -> bool {
        self.signal_count > 0
    }
}

/// Confidence-weighted mean score of `signals`.
///
/// Contributions are summed in a canonical order so any permutation of the
/// input yields a bit-identical result.
pub fn aggregate(signals: &[Signal]) -> f64 {
    let mut terms: Vec<(f64, f64)> = signals
        .iter()
        .filter(|s| s.confidence > 0.0)
        .map(|s| (s.score, s.confidence))
        .collect();
    if terms.is_empty() {
        return 0.0;
    }
    terms.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let (weighted, total) = terms
        .iter()
        .fold((0.0, 0.0), |(w, t), (score, conf)| (w + score * conf, t + conf));
    if total <= 0.0 {
        return 0.0;
    }
    (weighted / total).clamp(-1.0, 1.0)
}

/// Aggregate per ticker. Every ticker in `universe` gets an entry; tickers
/// with signals but outside the universe are included too.
pub fn aggregate_by_ticker(
    universe: &[String],
    signals: &[Signal],
) -> BTreeMap<String, AggregatedScore> {
    let mut grouped: BTreeMap<String, Vec<Signal>> = universe
        .iter()
        .map(|t| (t.clone(), Vec::new()))
        .collect();
    for signal in signals {
        grouped
            .entry(signal.ticker.clone())
            .or_default()
            .push(signal.clone());
    }

    grouped
        .into_iter()
        .map(|(ticker, sigs)| {
            let score = aggregate(&sigs);
            let signal_count = sigs.iter().filter(|s| s.confidence > 0.0).count();
            log::debug!(
                "{ticker}: aggregated {score:+.3} from {signal_count} of {} signals",
                sigs.len()
            );
            let agg = AggregatedScore {
                ticker: ticker.clone(),
                score,
                signal_count,
            };
            (ticker, agg)
        })
        .collect()
}
