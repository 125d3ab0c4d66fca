//! Portfolio CSV adapter.
//!
//! One row per position plus one `CASH` row per currency bucket:
//!
//! ```text
//! ticker,shares,cost_basis,currency,date_acquired
//! AAPL,10,150.25,USD,2024-01-15
//! CASH,2500.00,,SEK,
//! ```
//!
//! The written file has the same shape, so each run's output can feed the next.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::currency::normalize_price_and_currency;
use crate::domain::error::LongbookError;
use crate::domain::portfolio::Portfolio;
use crate::domain::position::Position;
use crate::ports::portfolio_port::PortfolioPort;

const CASH_TICKER: &str = "CASH";
const DEFAULT_POSITION_CURRENCY: &str = "USD";

#[derive(Debug, Deserialize)]
struct PortfolioRow {
    ticker: String,
    shares: f64,
    #[serde(default)]
    cost_basis: Option<f64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    date_acquired: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    ticker: String,
    shares: String,
    cost_basis: String,
    currency: String,
    date_acquired: String,
}

pub struct CsvPortfolioAdapter {
    input: Option<PathBuf>,
    output_dir: PathBuf,
}

impl CsvPortfolioAdapter {
    /// With no input path the cycle starts from an empty book.
    pub fn new(input: Option<PathBuf>, output_dir: PathBuf) -> Self {
        Self { input, output_dir }
    }

    pub fn output_path(&self, as_of: NaiveDate) -> PathBuf {
        self.output_dir
            .join(format!("portfolio_{}.csv", as_of.format("%Y%m%d")))
    }
}

fn parse_err(reason: String) -> LongbookError {
    LongbookError::PortfolioParse { reason }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse portfolio CSV content into a book reported in `home_currency`.
pub fn parse_portfolio(content: &str, home_currency: &str) -> Result<Portfolio, LongbookError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut positions: Vec<Position> = Vec::new();
    let mut cash: BTreeMap<String, f64> = BTreeMap::new();

    for (line, row) in rdr.deserialize::<PortfolioRow>().enumerate() {
        let row = row.map_err(|e| parse_err(format!("row {}: {}", line + 1, e)))?;
        let ticker = row.ticker.trim().to_string();
        if ticker.is_empty() {
            return Err(parse_err(format!("row {}: empty ticker", line + 1)));
        }
        if !row.shares.is_finite() {
            return Err(parse_err(format!("{ticker}: shares must be a number")));
        }

        if ticker.eq_ignore_ascii_case(CASH_TICKER) {
            let raw = non_blank(row.currency).unwrap_or_else(|| home_currency.to_string());
            let (amount, ccy) = normalize_price_and_currency(row.shares, &raw);
            *cash.entry(ccy).or_insert(0.0) += amount;
            continue;
        }

        if row.shares < 0.0 || row.shares.fract() != 0.0 {
            return Err(parse_err(format!(
                "{ticker}: shares must be a whole non-negative number, got {}",
                row.shares
            )));
        }
        if positions.iter().any(|p| p.ticker == ticker) {
            return Err(parse_err(format!("{ticker}: listed more than once")));
        }

        let acquisition_date = match non_blank(row.date_acquired) {
            Some(raw) => match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
                Ok(date) => Some(date),
                Err(_) => {
                    log::warn!("{ticker}: unreadable date_acquired '{raw}', ignored");
                    None
                }
            },
            None => None,
        };
        let raw_currency =
            non_blank(row.currency).unwrap_or_else(|| DEFAULT_POSITION_CURRENCY.to_string());
        let (cost_basis, currency) =
            normalize_price_and_currency(row.cost_basis.unwrap_or(0.0), &raw_currency);

        positions.push(Position::new(
            &ticker,
            row.shares as u64,
            cost_basis,
            &currency,
            acquisition_date,
        ));
    }

    Ok(Portfolio::from_parts(home_currency, positions, cash))
}

/// Render a book in the input CSV format, sorted by currency then ticker.
pub fn render_portfolio(portfolio: &Portfolio) -> Result<String, LongbookError> {
    let mut rows: Vec<OutputRow> = portfolio
        .positions
        .values()
        .filter(|p| p.shares > 0)
        .map(|p| OutputRow {
            ticker: p.ticker.clone(),
            shares: p.shares.to_string(),
            cost_basis: format!("{:.2}", p.cost_basis),
            currency: p.currency.clone(),
            date_acquired: p
                .acquisition_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        })
        .collect();

    rows.extend(
        portfolio
            .cash
            .iter()
            .filter(|(ccy, amount)| **amount != 0.0 || **ccy == portfolio.home_currency)
            .map(|(ccy, amount)| OutputRow {
                ticker: CASH_TICKER.to_string(),
                shares: format!("{amount:.2}"),
                cost_basis: String::new(),
                currency: ccy.clone(),
                date_acquired: String::new(),
            }),
    );

    rows.sort_by(|a, b| a.currency.cmp(&b.currency).then_with(|| a.ticker.cmp(&b.ticker)));

    let mut wtr = csv::Writer::from_writer(Vec::new());
    for row in &rows {
        wtr.serialize(row)
            .map_err(|e| parse_err(format!("failed to write row {}: {}", row.ticker, e)))?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| parse_err(format!("failed to flush portfolio CSV: {e}")))?;
    String::from_utf8(bytes).map_err(|e| parse_err(e.to_string()))
}

impl PortfolioPort for CsvPortfolioAdapter {
    fn load_portfolio(&self, home_currency: &str) -> Result<Portfolio, LongbookError> {
        let Some(path) = &self.input else {
            log::info!("no portfolio file given, starting from an empty book");
            return Ok(Portfolio::new(home_currency));
        };
        let content = fs::read_to_string(path)?;
        let portfolio = parse_portfolio(&content, home_currency)?;
        log::info!(
            "loaded {} positions and {} cash buckets from {}",
            portfolio.position_count(),
            portfolio.cash.len(),
            path.display()
        );
        Ok(portfolio)
    }

    fn save_portfolio(
        &self,
        portfolio: &Portfolio,
        as_of: NaiveDate,
    ) -> Result<PathBuf, LongbookError> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_path(as_of);
        fs::write(&path, render_portfolio(portfolio)?)?;
        Ok(path)
    }
}
