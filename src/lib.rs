// Eco Ledger - Core Library
// Daily purchases, sales, processing and expenses for a recycling yard.
// Shared by the CLI/TUI binary and the API server.

pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod ledger;
pub mod persistence;
pub mod records;
pub mod stock;
pub mod store;
pub mod summary;

// Re-export commonly used types
pub use config::{Backend, Config};
pub use db::{setup_database, SqliteStore};
pub use error::{Result, StoreError};
pub use import::{import_csv, import_reader, write_ledger_csv};
pub use ledger::{
    build_ledger, format_amount, Badge, LedgerQuery, LedgerRow, MaterialFilter, SortDirection,
    SortKey, SortSpec, TypeFilter,
};
pub use persistence::{DocumentKey, DocumentStore, JsonFileStore};
pub use records::{
    day_key, parse_day, Dataset, DayRecords, Expense, PaymentMethod, Processing, RecordKind,
    StockMap, TradeType, Transaction,
};
pub use store::{NewExpense, NewProcessing, NewRecord, NewTransaction, Record, RecordStore};
pub use summary::{
    all_materials, expenses_by_category, group_sum, ranked_bars, sales_by_material, DaySummary,
    GroupTotal, Kpis, RankedBar,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
