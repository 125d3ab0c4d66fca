//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::{CsvFxAdapter, CsvMarketDataAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::portfolio_csv::CsvPortfolioAdapter;
use crate::adapters::signal_csv::CsvSignalAdapter;
use crate::adapters::text_report::TextReportAdapter;
use crate::domain::config_validation::{build_rebalance_config, validate_rebalance_config};
use crate::domain::error::LongbookError;
use crate::domain::rebalance::{
    gather_market_data, rebalance, RebalanceConfig, RebalanceInput, RebalanceOutcome,
};
use crate::domain::universe::{resolve_universe, union_with_holdings};
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::{ExchangeRatePort, MarketDataPort};
use crate::ports::portfolio_port::PortfolioPort;
use crate::ports::report_port::ReportPort;
use crate::ports::signal_port::SignalPort;

#[derive(Parser, Debug)]
#[command(name = "longbook", about = "Long-only multi-currency portfolio rebalancer")]
pub struct Cli {
    /// Debug-level logging and per-evaluator detail in the report
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn verbose(&self) -> bool {
        self.verbose
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one rebalance cycle
    Rebalance(RebalanceArgs),
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct RebalanceArgs {
    #[arg(short, long)]
    pub config: PathBuf,
    /// Current portfolio CSV
    #[arg(short, long)]
    pub portfolio: Option<PathBuf>,
    /// Universe file
    #[arg(short, long)]
    pub universe: Option<PathBuf>,
    /// Inline comma-separated tickers, merged with the universe file
    #[arg(long)]
    pub tickers: Option<String>,
    #[arg(long)]
    pub signals: Option<PathBuf>,
    /// Directory holding one <TICKER>.csv price file per instrument
    #[arg(long)]
    pub prices: Option<PathBuf>,
    #[arg(long)]
    pub fx: Option<PathBuf>,
    /// Directory for the updated portfolio CSV
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Write the report here instead of stdout
    #[arg(long)]
    pub report: Option<PathBuf>,
    /// Valuation date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    pub as_of: Option<String>,
    #[arg(long)]
    pub home_currency: Option<String>,
    /// Plan and report without writing the updated portfolio
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(cli: Cli) -> ExitCode {
    let verbose = cli.verbose;
    match cli.command {
        Command::Rebalance(args) => run_rebalance(&args, verbose),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Where each input lives, after CLI flags override `[data]` keys.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPaths {
    pub portfolio: Option<PathBuf>,
    pub universe: Option<PathBuf>,
    pub tickers: Option<String>,
    pub signals: Option<PathBuf>,
    pub prices_dir: PathBuf,
    pub fx_rates: Option<PathBuf>,
    pub output_dir: PathBuf,
}

pub fn resolve_data_paths(
    args: &RebalanceArgs,
    config: &dyn ConfigPort,
) -> Result<DataPaths, LongbookError> {
    let prices_dir = args
        .prices
        .clone()
        .or_else(|| config.get_path("data", "prices_dir"))
        .ok_or_else(|| LongbookError::ConfigMissing {
            section: "data".into(),
            key: "prices_dir".into(),
        })?;

    Ok(DataPaths {
        portfolio: args
            .portfolio
            .clone()
            .or_else(|| config.get_path("data", "portfolio")),
        universe: args
            .universe
            .clone()
            .or_else(|| config.get_path("data", "universe")),
        tickers: args.tickers.clone().or_else(|| {
            config
                .get_string("data", "tickers")
                .filter(|s| !s.trim().is_empty())
        }),
        signals: args
            .signals
            .clone()
            .or_else(|| config.get_path("data", "signals")),
        prices_dir,
        fx_rates: args
            .fx
            .clone()
            .or_else(|| config.get_path("data", "fx_rates")),
        output_dir: args
            .output
            .clone()
            .or_else(|| config.get_path("data", "output_dir"))
            .unwrap_or_else(|| PathBuf::from(".")),
    })
}

pub fn parse_as_of(value: Option<&str>) -> Result<NaiveDate, LongbookError> {
    match value {
        None => Ok(chrono::Local::now().date_naive()),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            LongbookError::ConfigInvalid {
                section: "cli".into(),
                key: "as-of".into(),
                reason: "invalid date format (expected YYYY-MM-DD)".into(),
            }
        }),
    }
}

/// Load the config file, validate it, and apply the `--home-currency` override.
pub fn build_config(
    adapter: &dyn ConfigPort,
    home_override: Option<&str>,
) -> Result<RebalanceConfig, LongbookError> {
    validate_rebalance_config(adapter)?;
    let mut config = build_rebalance_config(adapter);
    if let Some(home) = home_override {
        let home = home.trim();
        if home.is_empty() || !home.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(LongbookError::ConfigInvalid {
                section: "cli".into(),
                key: "home-currency".into(),
                reason: format!("'{home}' is not a currency code"),
            });
        }
        config.home_currency = home.to_string();
    }
    Ok(config)
}

/// The collaborators a rebalance run talks to.
pub struct Collaborators<'a> {
    pub portfolio: &'a dyn PortfolioPort,
    pub signals: &'a dyn SignalPort,
    pub market: &'a dyn MarketDataPort,
    pub fx: &'a dyn ExchangeRatePort,
    pub report: &'a dyn ReportPort,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub as_of: NaiveDate,
    pub dry_run: bool,
    pub report_path: Option<String>,
}

pub fn run_rebalance(args: &RebalanceArgs, verbose: bool) -> ExitCode {
    // Stage 1: config
    log::info!("loading config from {}", args.config.display());
    let adapter = match load_config(&args.config) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let config = match build_config(&adapter, args.home_currency.as_deref()) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    // Stage 2: inputs
    let paths = match resolve_data_paths(args, &adapter) {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };
    let as_of = match parse_as_of(args.as_of.as_deref()) {
        Ok(d) => d,
        Err(e) => return fail(&e),
    };
    let universe = match read_universe(&paths) {
        Ok(u) => u,
        Err(e) => return fail(&e),
    };

    // Stage 3: wire adapters and run
    let portfolio = CsvPortfolioAdapter::new(paths.portfolio.clone(), paths.output_dir.clone());
    let signals = CsvSignalAdapter::new(paths.signals.clone());
    let market = CsvMarketDataAdapter::new(paths.prices_dir.clone());
    let fx = CsvFxAdapter::new(paths.fx_rates.clone());
    let report = TextReportAdapter::new(verbose || report_verbose(&adapter));
    let ports = Collaborators {
        portfolio: &portfolio,
        signals: &signals,
        market: &market,
        fx: &fx,
        report: &report,
    };
    let options = RunOptions {
        as_of,
        dry_run: args.dry_run,
        report_path: args.report.as_ref().map(|p| p.display().to_string()),
    };

    run_rebalance_pipeline(&ports, &config, &universe, &options)
}

/// `[report] verbose` turns on the per-evaluator section without the flag.
pub fn report_verbose(config: &dyn ConfigPort) -> bool {
    config.get_bool("report", "verbose", false)
}

fn read_universe(paths: &DataPaths) -> Result<Vec<String>, LongbookError> {
    let content = match &paths.universe {
        Some(path) => Some(fs::read_to_string(path)?),
        None => None,
    };
    Ok(resolve_universe(content.as_deref(), paths.tickers.as_deref())?)
}

fn fail(err: &LongbookError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

/// Stages after configuration: load, rebalance, report and persist.
pub fn run_rebalance_pipeline(
    ports: &Collaborators,
    config: &RebalanceConfig,
    universe: &[String],
    options: &RunOptions,
) -> ExitCode {
    match execute_rebalance(ports, config, universe, options) {
        Ok(outcome) => {
            log::info!(
                "{} trades, NAV {:.2} -> {:.2} {}",
                outcome.trades.len(),
                outcome.summary.nav_before,
                outcome.summary.nav_after,
                outcome.summary.home_currency
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

pub fn execute_rebalance(
    ports: &Collaborators,
    config: &RebalanceConfig,
    universe: &[String],
    options: &RunOptions,
) -> Result<RebalanceOutcome, LongbookError> {
    let current = ports.portfolio.load_portfolio(&config.home_currency)?;
    let universe = union_with_holdings(universe, &current.held_tickers());
    log::info!("universe of {} tickers as of {}", universe.len(), options.as_of);

    let signals = ports.signals.fetch_signals(&universe)?;
    let fx = ports.fx.load_rates(&config.pivot_currency)?;
    let market = gather_market_data(ports.market, &universe, options.as_of, config.lookback_bars)?;

    let input = RebalanceInput {
        portfolio: &current,
        universe: &universe,
        signals: &signals,
        market_data: &market,
        fx: &fx,
    };
    let outcome = rebalance(&input, config, options.as_of)?;

    ports
        .report
        .write(&outcome, &signals, options.report_path.as_deref())?;

    if options.dry_run {
        log::info!("dry run, portfolio not written");
    } else {
        let path = ports.portfolio.save_portfolio(&outcome.portfolio, options.as_of)?;
        log::info!("updated portfolio written to {}", path.display());
    }
    Ok(outcome)
}

pub fn run_validate(config_path: &PathBuf) -> ExitCode {
    log::info!("validating {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let config = match build_config(&adapter, None) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    println!("Configuration is valid.");
    println!("  home currency:   {}", config.home_currency);
    println!("  pivot currency:  {}", config.pivot_currency);
    println!("  max holdings:    {}", config.max_holdings);
    println!(
        "  position bounds: {:.1}% - {:.1}%",
        config.min_position * 100.0,
        config.max_position * 100.0
    );
    println!("  entry threshold: {:.2}", config.entry_threshold);
    println!("  min trade value: {:.2}", config.min_trade_value);
    println!("  slippage k:      {:.2}", config.slippage_k);
    println!("  NAV tolerance:   {:.1}%", config.nav_tolerance * 100.0);
    println!("  lookback bars:   {}", config.lookback_bars);
    println!("  verbose report:  {}", report_verbose(&adapter));
    ExitCode::SUCCESS
}
