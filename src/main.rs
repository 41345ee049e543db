use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use payouts::cache::{CacheStore, FileCache, PAYOUTS_CACHE_KEY};
use payouts::config::{config_dir, load_config, resolve_cache_dir, Config, CONFIG_TEMPLATE};
use payouts::error::{PayoutError, Result};
use payouts::payout::{
    AggregateState, Page, PaymentMethod, PayoutRecord, PayoutStore, StatusUpdate,
};
use payouts::remote::HttpSource;

#[derive(Parser)]
#[command(name = "payouts")]
#[command(version, about = "Track and settle investment payouts", long_about = None)]
struct Cli {
    /// Path to config directory (default: ~/.payouts or XDG config)
    #[arg(short = 'C', long, global = true)]
    config_dir: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config directory with a template config.toml
    Init,

    /// Show configuration and cache status
    Status,

    /// List payouts
    List {
        /// Page to fetch (default: 1)
        #[arg(short, long, conflicts_with = "all")]
        page: Option<u32>,

        /// Fetch every page and show the merged list
        #[arg(long)]
        all: bool,
    },

    /// Show a single payout
    Show {
        /// Payout id
        id: u64,
    },

    /// Cancel a payout
    Cancel {
        /// Payout id
        id: u64,
    },

    /// Mark a payout as paid
    MarkPaid {
        /// Payout id
        id: u64,

        /// Payment method: bank_transfer, cheque, credit_card or a provider name
        #[arg(short, long)]
        method: String,

        /// Payment reference number (required)
        #[arg(short, long)]
        reference: String,

        /// Free-text notes
        #[arg(short, long)]
        notes: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    // Determine config directory
    let cfg_dir = match cli.config_dir {
        Some(p) => p,
        None => config_dir()?,
    };

    match cli.command {
        Commands::Init => cmd_init(&cfg_dir),
        Commands::Status => cmd_status(&cfg_dir),
        Commands::List { page, all } => cmd_list(&cfg_dir, page, all),
        Commands::Show { id } => cmd_show(&cfg_dir, id),
        Commands::Cancel { id } => cmd_cancel(&cfg_dir, id),
        Commands::MarkPaid {
            id,
            method,
            reference,
            notes,
        } => cmd_mark_paid(&cfg_dir, id, &method, &reference, notes),
    }
}

type CliStore = PayoutStore<HttpSource, FileCache>;

/// Load config and wire the store to the HTTP API and the on-disk cache
fn open_store(cfg_dir: &Path) -> Result<(Config, CliStore)> {
    if !cfg_dir.exists() {
        return Err(PayoutError::ConfigNotFound(cfg_dir.to_path_buf()));
    }

    let config = load_config(cfg_dir)?;
    let cache = FileCache::new(resolve_cache_dir(&config.cache, cfg_dir));
    let store = PayoutStore::new(HttpSource::new(&config.api), cache);
    Ok((config, store))
}

/// Initialize config directory with template files
fn cmd_init(cfg_dir: &Path) -> Result<()> {
    use std::fs;

    if cfg_dir.exists() {
        return Err(PayoutError::AlreadyInitialized(cfg_dir.to_path_buf()));
    }

    fs::create_dir_all(cfg_dir.join("cache"))?;
    fs::write(cfg_dir.join("config.toml"), CONFIG_TEMPLATE)?;

    println!("Initialized payouts config at: {}", cfg_dir.display());
    println!();
    println!("Next steps:");
    println!(
        "  1. Point it at your API:  $EDITOR {}/config.toml",
        cfg_dir.display()
    );
    println!("  2. Export your token:     export PAYOUTS_API_TOKEN=...");
    println!();
    println!("Then list your payouts:");
    println!("  payouts list");

    Ok(())
}

/// Show configuration and what the cache currently holds
fn cmd_status(cfg_dir: &Path) -> Result<()> {
    let (config, store) = open_store(cfg_dir)?;
    let cache = store.cache();

    println!("Payouts Status");
    println!("{}", "-".repeat(50));
    println!("Config directory: {}", cfg_dir.display());
    println!("API:              {}", config.api.base_url);
    println!(
        "Token:            {}",
        if config.api.token.is_some() { "set" } else { "not set" }
    );
    println!("Timeout:          {}s", config.api.timeout_secs);
    println!("Cache file:       {}", cache.path_for(PAYOUTS_CACHE_KEY).display());

    let cached = cache
        .get_item(PAYOUTS_CACHE_KEY)?
        .and_then(|raw| serde_json::from_str::<Page>(&raw).ok());
    match cached {
        Some(page) => println!(
            "Cached page:      {} of {} ({} payouts)",
            page.pagination.current_page,
            page.pagination.last_page,
            page.payouts.len()
        ),
        None => println!("Cached page:      none"),
    }

    Ok(())
}

// Table row structs for tabled
#[derive(Tabled)]
struct PayoutRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "SCHEDULED")]
    scheduled: String,
    #[tabled(rename = "AMOUNT")]
    amount: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "REFERENCE")]
    reference: String,
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "COUNT")]
    count: usize,
    #[tabled(rename = "AMOUNT")]
    amount: String,
}

/// List payouts, one page or all of them
fn cmd_list(cfg_dir: &Path, page: Option<u32>, all: bool) -> Result<()> {
    let (config, mut store) = open_store(cfg_dir)?;
    let symbol = &config.display.currency_symbol;

    store.fetch_list(page)?;
    if all {
        while store.load_more()?.is_some() {}
    }

    let state = store.state();
    if state.from_cache {
        println!("Server unreachable, showing cached payouts.");
    }

    if state.payouts.is_empty() {
        println!("No payouts found.");
        return Ok(());
    }

    let rows: Vec<PayoutRow> = state
        .payouts
        .iter()
        .map(|p| PayoutRow {
            id: p.id,
            scheduled: p.scheduled_date.to_string(),
            amount: format_money(p.amount, symbol),
            status: p.status.to_string(),
            reference: p.reference_number.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");
    println!();
    print_summary(state, symbol);

    Ok(())
}

fn print_summary(state: &AggregateState, symbol: &str) {
    let rows: Vec<SummaryRow> = state
        .summary()
        .into_iter()
        .filter(|(_, tally)| tally.count > 0)
        .map(|(status, tally)| SummaryRow {
            status: status.to_string(),
            count: tally.count,
            amount: format_money(tally.amount, symbol),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");

    if let Some(p) = state.pagination {
        println!(
            "Page {} of {} ({} payouts on server)",
            p.current_page, p.last_page, p.total
        );
    }
    println!(
        "Total amount: {} across {} payouts",
        format_money(state.total_amount, symbol),
        state.payouts.len()
    );
}

/// Show a single payout
fn cmd_show(cfg_dir: &Path, id: u64) -> Result<()> {
    let (config, mut store) = open_store(cfg_dir)?;
    let payout = store.fetch_detail(id)?;
    print_payout(payout, &config.display.currency_symbol);
    Ok(())
}

fn print_payout(payout: &PayoutRecord, symbol: &str) {
    println!("Payout #{}", payout.id);
    println!("{}", "-".repeat(50));
    println!("Amount:       {}", format_money(payout.amount, symbol));
    println!("Status:       {}", payout.status);
    println!("Scheduled:    {}", payout.scheduled_date);
    if let Some(paid) = payout.paid_date {
        println!("Paid:         {paid}");
    }
    if let Some(reference) = &payout.reference_number {
        println!("Reference:    {reference}");
    }
    if let Some(notes) = &payout.notes {
        println!("Notes:        {notes}");
    }
    if let Some(basis) = &payout.calculation_basis {
        println!(
            "Calculation:  {} on {}",
            basis.method,
            format_money(basis.base_amount, symbol)
        );
        if let Some(at) = basis.calculated_at {
            println!("Calculated:   {}", at.format("%B %d, %Y %H:%M UTC"));
        }
    }
}

/// Cancel a payout
fn cmd_cancel(cfg_dir: &Path, id: u64) -> Result<()> {
    let (_, mut store) = open_store(cfg_dir)?;
    store.cancel(id)?;
    println!("Cancelled payout #{id}");
    Ok(())
}

/// Mark a payout as paid
fn cmd_mark_paid(
    cfg_dir: &Path,
    id: u64,
    method: &str,
    reference: &str,
    notes: Option<String>,
) -> Result<()> {
    let method: PaymentMethod = method.parse()?;
    let update = StatusUpdate::new(method, reference, notes);
    // Fail on a blank reference before touching config or network
    update.validated_reference()?;

    let (config, mut store) = open_store(cfg_dir)?;
    match store.submit_status_update(id, &update)? {
        Some(payout) => {
            println!("Marked payout #{id} as paid");
            println!();
            print_payout(&payout, &config.display.currency_symbol);
        }
        None => println!("Marked payout #{id} as paid"),
    }

    Ok(())
}

/// Format a money amount with two decimal places and thousands separators
fn format_money(value: f64, symbol: &str) -> String {
    let rounded = format!("{:.2}", value.abs());
    let (whole, frac) = rounded.split_once('.').unwrap_or((rounded.as_str(), "00"));
    let grouped = format_grouped_int(whole.parse::<u64>().unwrap_or(0));

    if value < 0.0 {
        format!("-{symbol}{grouped}.{frac}")
    } else {
        format!("{symbol}{grouped}.{frac}")
    }
}

fn format_grouped_int(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    out.chars().rev().collect()
}
