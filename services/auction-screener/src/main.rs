//! Auction Screener - opening-auction signals for A-shares.
//!
//! `run` screens the whole market from the auction snapshot, `minute`
//! approximates the auction from minute bars for a symbol list, `config`
//! shows and checks the effective configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use auction_common::config::expand_path;
use auction_common::config_loader::check_modular_files;
use auction_common::logging::init_logging;
use auction_common::{Config, Validate};
use auction_screener::data::compact_date;
use auction_screener::screener::{
    AuctionScreener, MinuteScreener, MissingBaselinePolicy, ReportFormat, ReportWriter,
    ScreenerConfig, ScreeningRun,
};
use auction_screener::TushareAdapter;

#[derive(Parser, Debug)]
#[command(name = "auction-screener")]
#[command(version)]
#[command(about = "Screen A-shares for abnormal opening-auction activity", long_about = None)]
struct Cli {
    /// Configuration directory (default: ~/.auction-screener)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Screen the whole market from the opening-auction snapshot
    Run {
        #[command(flatten)]
        opts: ScreenOpts,
    },

    /// Approximate the auction from the first minute bars of given symbols
    Minute {
        /// Vendor tickers, comma separated (e.g. 000001.SZ,600000.SH)
        #[arg(long, value_delimiter = ',', required = true)]
        symbols: Vec<String>,

        /// Minute bars summed into the approximated auction
        #[arg(long)]
        first_minutes: Option<usize>,

        #[command(flatten)]
        opts: ScreenOpts,
    },

    /// Print the effective configuration (token redacted) and validate it
    Config,
}

/// Overrides shared by the screening commands.
#[derive(Args, Debug)]
struct ScreenOpts {
    /// Trading date, YYYYMMDD (default: today)
    #[arg(long, value_parser = parse_date)]
    date: Option<NaiveDate>,

    /// Minimum gap above previous close (0.07 = 7%)
    #[arg(long)]
    gap: Option<f64>,

    /// Minimum auction volume over average minute volume
    #[arg(long)]
    vol_mult: Option<f64>,

    /// Maximum retracement below the match price (0.05 = 5%)
    #[arg(long)]
    max_pullback: Option<f64>,

    /// Concurrent baseline fetches
    #[arg(long)]
    workers: Option<usize>,

    /// Pause after each fetch, per worker (ms)
    #[arg(long)]
    pause_ms: Option<u64>,

    /// Budget for the baseline phase (seconds)
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Output directory for result files
    #[arg(long)]
    out_dir: Option<String>,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Skip securities without a usable volume baseline
    #[arg(long)]
    exclude_missing_baseline: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Csv,
    Json,
    Both,
}

impl FormatArg {
    fn formats(self) -> Vec<ReportFormat> {
        match self {
            Self::Csv => vec![ReportFormat::Csv],
            Self::Json => vec![ReportFormat::Json],
            Self::Both => vec![ReportFormat::Csv, ReportFormat::Json],
        }
    }
}

impl ScreenOpts {
    fn apply(&self, config: &mut ScreenerConfig) {
        if let Some(gap) = self.gap {
            config.gap_threshold = gap;
        }
        if let Some(vol_mult) = self.vol_mult {
            config.volume_multiplier_threshold = vol_mult;
        }
        if let Some(max_pullback) = self.max_pullback {
            config.max_pullback = max_pullback;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(pause_ms) = self.pause_ms {
            config.pause_ms = pause_ms;
        }
        if self.deadline_secs.is_some() {
            config.deadline_secs = self.deadline_secs;
        }
        if let Some(dir) = &self.out_dir {
            config.output.dir = dir.clone();
        }
        if let Some(format) = self.format {
            config.output.formats = format.formats();
        }
        if self.exclude_missing_baseline {
            config.missing_baseline = MissingBaselinePolicy::Exclude;
        }
    }

    fn trade_date(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| Local::now().date_naive())
    }
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    compact_date::parse(s).ok_or_else(|| format!("invalid date '{s}', expected YYYYMMDD"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config =
        Config::load_from_dir(cli.config_dir.clone()).context("Failed to load configuration")?;

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    match cli.command {
        Commands::Run { opts } => {
            let screener_config = screener_config(&config, &opts)?;
            let adapter = Arc::new(adapter(&config)?);
            let screener = AuctionScreener::new(screener_config.clone(), adapter)?;
            let date = opts.trade_date();

            let run = tokio::select! {
                run = screener.run(date) => run?,
                _ = tokio::signal::ctrl_c() => bail!("Interrupted"),
            };
            finish(&screener_config, &run)
        }
        Commands::Minute {
            symbols,
            first_minutes,
            opts,
        } => {
            let mut screener_config = screener_config(&config, &opts)?;
            if let Some(n) = first_minutes {
                screener_config.first_minutes = n;
            }
            let adapter = Arc::new(adapter(&config)?);
            let screener = MinuteScreener::new(screener_config.clone(), adapter)?;
            let date = opts.trade_date();

            let run = tokio::select! {
                run = screener.run(&symbols, date) => run?,
                _ = tokio::signal::ctrl_c() => bail!("Interrupted"),
            };
            finish(&screener_config, &run)
        }
        Commands::Config => show_config(&config, cli.config_dir),
    }
}

fn screener_config(config: &Config, opts: &ScreenOpts) -> Result<ScreenerConfig> {
    let mut screener_config = ScreenerConfig::from_section(config.screener.as_ref())
        .context("Invalid screener section")?;
    opts.apply(&mut screener_config);
    Ok(screener_config)
}

fn adapter(config: &Config) -> Result<TushareAdapter> {
    config.tushare.validate().context("Invalid tushare section")?;
    config.require_tushare_token()?;
    TushareAdapter::from_config(config).context("Tushare token is not configured")
}

fn finish(config: &ScreenerConfig, run: &ScreeningRun) -> Result<()> {
    info!(run_id = %run.run_id, "{}", run.summary());

    for hit in &run.hits {
        println!(
            "{}  gap={:+.2}%  vol_mult={:.1}  pullback={:+.2}%  match={:.2}  pre_close={:.2}",
            hit.symbol,
            hit.gap * 100.0,
            hit.vol_mult,
            hit.pullback * 100.0,
            hit.match_price,
            hit.pre_close
        );
    }
    println!("{}", run.summary());

    if config.output.enabled {
        let writer = ReportWriter::new(
            expand_path(&config.output.dir),
            config.output.formats.clone(),
        );
        for path in writer.write(run)? {
            println!("Saved {}", path.display());
        }
    }

    Ok(())
}

fn show_config(config: &Config, dir: Option<PathBuf>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&config.redacted())?);

    for (file, exists) in check_modular_files(dir) {
        println!("{:<16} {}", file, if exists { "found" } else { "missing" });
    }

    let mut problems = Vec::new();
    if let Err(e) = config.validate() {
        problems.push(e.to_string());
    }
    match ScreenerConfig::from_section(config.screener.as_ref()) {
        Ok(screener) => {
            if let Err(e) = screener.validate() {
                problems.push(e.to_string());
            }
        }
        Err(e) => problems.push(e.to_string()),
    }
    if let Err(e) = config.require_tushare_token() {
        problems.push(e.to_string());
    }

    if problems.is_empty() {
        println!("Configuration OK");
        Ok(())
    } else {
        for problem in &problems {
            eprintln!("  - {problem}");
        }
        bail!("{} configuration problem(s)", problems.len())
    }
}
