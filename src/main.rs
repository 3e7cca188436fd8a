// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use eco_ledger::{
    format_amount, import_csv, stock, write_ledger_csv, Backend, Config, LedgerQuery,
    MaterialFilter, NewExpense, NewProcessing, NewTransaction, PaymentMethod, RecordKind,
    Record, RecordStore, SortDirection, SortKey, SortSpec, TradeType, TypeFilter,
};

const LOG_FILE: &str = "eco-ledger.log";

#[derive(Parser)]
#[command(version, about = "Daily ledger for a recycling yard", long_about = None)]
struct Cli {
    /// Config file (defaults to ./eco-ledger.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override the storage backend (json or sqlite)
    #[arg(long, global = true)]
    backend: Option<Backend>,

    /// Working day, YYYY-MM-DD (defaults to today)
    #[arg(long, global = true)]
    date: Option<NaiveDate>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive dashboard (default)
    Ui,

    /// Print the day's ledger
    Report {
        /// all, buy, sell, proc or exp
        #[arg(long = "type", default_value = "all")]
        type_filter: TypeFilter,

        /// Material name or "all"
        #[arg(long, default_value = "all")]
        material: String,

        /// time, type, details or value
        #[arg(long, default_value = "time")]
        sort: SortKey,

        /// asc or desc
        #[arg(long, default_value = "desc")]
        dir: SortDirection,

        /// Write CSV to stdout instead of a table
        #[arg(long)]
        csv: bool,
    },

    /// KPIs, stock and top sales/expenses for the day
    Summary,

    /// Days that have records
    Dates,

    /// Record a purchase or sale
    AddTransaction {
        /// buy or sell
        #[arg(long = "type")]
        trade: TradeType,
        #[arg(long)]
        material: String,
        #[arg(long)]
        total: f64,
        #[arg(long, default_value = "")]
        client: String,
        /// cash, card, transfer, debt or other
        #[arg(long, default_value = "cash")]
        method: PaymentMethod,
        /// HH:MM (defaults to now)
        #[arg(long)]
        time: Option<String>,
    },

    /// Record a material conversion
    AddProcessing {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        qty_in: f64,
        #[arg(long)]
        qty_out: f64,
        #[arg(long)]
        time: Option<String>,
    },

    /// Record an expense
    AddExpense {
        #[arg(long)]
        category: String,
        #[arg(long)]
        amount: f64,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        time: Option<String>,
    },

    /// Delete a record from the day: trans, proc or exp plus its id
    Delete { kind: RecordKind, id: u64 },

    /// Set the quantity on hand for a material (kg)
    SetStock { material: String, qty: f64 },

    /// Import records of one kind from a CSV file
    Import { kind: RecordKind, file: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    let command = cli.command.unwrap_or(Command::Ui);
    init_logging(&config, matches!(command, Command::Ui))?;

    let backend = config.open_backend().context("Failed to open storage")?;
    let mut store = RecordStore::open(backend);
    if let Some(date) = cli.date {
        store.select_date(date);
    }

    match command {
        Command::Ui => run_ui_mode(store, &config)?,
        Command::Report {
            type_filter,
            material,
            sort,
            dir,
            csv,
        } => {
            let query = LedgerQuery {
                type_filter,
                material: MaterialFilter::from(material.as_str()),
                sort: SortSpec::new(sort, dir),
            };
            if csv {
                let rows = store.ledger(&query);
                write_ledger_csv(&rows, io::stdout().lock()).context("Failed to write CSV")?;
            } else {
                print_report(&store, &query);
            }
        }
        Command::Summary => print_summary(&store),
        Command::Dates => {
            for date in store.dates() {
                println!("{}", date);
            }
        }
        Command::AddTransaction {
            trade,
            material,
            total,
            client,
            method,
            time,
        } => {
            let tx = store.add_transaction(NewTransaction {
                time,
                trade,
                material,
                client,
                method,
                total,
            })?;
            println!("✓ Added transaction #{} ({} {})", tx.id, tx.material, format_amount(tx.total));
        }
        Command::AddProcessing {
            from,
            to,
            qty_in,
            qty_out,
            time,
        } => {
            let p = store.add_processing(NewProcessing {
                time,
                from,
                to,
                qty_in,
                qty_out,
            })?;
            println!("✓ Added processing #{} ({} → {})", p.id, p.from, p.to);
        }
        Command::AddExpense {
            category,
            amount,
            description,
            time,
        } => {
            let e = store.add_expense(NewExpense {
                time,
                category,
                description,
                amount,
            })?;
            println!("✓ Added expense #{} ({} {})", e.id, e.category, format_amount(e.amount));
        }
        Command::Delete { kind, id } => {
            let removed = store.delete(kind, id)?;
            let what = match removed {
                Record::Transaction(t) => t.material,
                Record::Processing(p) => format!("{} → {}", p.from, p.to),
                Record::Expense(e) => e.category,
            };
            println!("✓ Deleted {} #{} ({})", kind, id, what);
        }
        Command::SetStock { material, qty } => {
            store.set_stock(&material, qty)?;
            println!("✓ Stock {} = {}", material, stock::format_qty(qty));
        }
        Command::Import { kind, file } => {
            println!("📂 Importing {} records from {}...", kind, file.display());
            let count = import_csv(&mut store, kind, &file)
                .with_context(|| format!("Failed to import {}", file.display()))?;
            println!("✓ Imported {} records", count);
        }
    }

    Ok(())
}

/// The dashboard owns the terminal, so UI sessions log to a file in the data directory
fn init_logging(config: &Config, to_file: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env();
    if to_file {
        config.ensure_dirs().context("Failed to create data directory")?;
        let path = config.data_dir.join(LOG_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .finish();
        tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")
    } else {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")
    }
}

fn print_report(store: &RecordStore, query: &LedgerQuery) {
    let rows = store.ledger(query);

    println!("📒 Ledger {} ({} rows)", store.date().format("%d.%m.%Y"), rows.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if rows.is_empty() {
        println!("No data");
        return;
    }

    for row in &rows {
        println!(
            "{:<6} {:<5} #{:<4} {:<11} {:<16} {:>12}  {}",
            row.time(),
            row.kind(),
            row.id(),
            row.badge().label(),
            row.details(),
            row.value_text(),
            row.subtitle(),
        );
    }
}

fn print_summary(store: &RecordStore) {
    let summary = store.summary();

    println!("📊 Summary {}", store.date().format("%d.%m.%Y"));
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Income:  {:>12}", format_amount(summary.kpis.income));
    println!("Expense: {:>12}", format_amount(summary.kpis.expense));
    println!("Profit:  {:>12}", format_amount(summary.kpis.profit));

    println!("\n📦 Stock");
    if stock::has_stock(store.stock()) {
        for (material, qty) in stock::in_stock(store.stock()) {
            println!("  {:<20} {:>10}", material, stock::format_qty(qty));
        }
    } else {
        println!("  Stock is empty");
    }

    for (title, bars) in [("📈 Top sales", &summary.top_sales), ("📉 Top expenses", &summary.top_expenses)] {
        println!("\n{}", title);
        if bars.is_empty() {
            println!("  No data");
        }
        for bar in bars {
            let width = (bar.ratio * 30.0).round() as usize;
            println!(
                "  {:<20} {:>10}  {}",
                bar.name,
                format_amount(bar.value),
                "█".repeat(width)
            );
        }
    }
}

#[cfg(feature = "tui")]
fn run_ui_mode(store: RecordStore, config: &Config) -> Result<()> {
    let mut app = ui::App::new(store, &config.theme_color);
    ui::run_ui(&mut app)?;
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_store: RecordStore, _config: &Config) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the report/summary commands");
    std::process::exit(1);
}
