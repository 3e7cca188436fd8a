// 📒 Ledger - one filterable, sortable view over a day's records
//
// Transactions, processing runs and expenses are merged (in that order), filtered by
// type and material, then sorted on a single key. The sort is `slice::sort_by`, which
// is stable: rows that compare equal keep their merge order.

use crate::error::{Result, StoreError};
use crate::records::{DayRecords, Expense, Processing, RecordKind, Transaction};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// LEDGER ROW
// ============================================================================

/// A borrowed record tagged with its kind. Serializes flat with a `kind` field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum LedgerRow<'a> {
    #[serde(rename = "trans")]
    Transaction(&'a Transaction),
    #[serde(rename = "proc")]
    Processing(&'a Processing),
    #[serde(rename = "exp")]
    Expense(&'a Expense),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    Buy,
    Sell,
    Processing,
    Expense,
    Debt,
}

impl Badge {
    pub fn label(&self) -> &'static str {
        match self {
            Badge::Buy => "Buy",
            Badge::Sell => "Sell",
            Badge::Processing => "Processing",
            Badge::Expense => "Expense",
            Badge::Debt => "Debt",
        }
    }
}

impl<'a> LedgerRow<'a> {
    pub fn kind(&self) -> RecordKind {
        match self {
            LedgerRow::Transaction(_) => RecordKind::Transaction,
            LedgerRow::Processing(_) => RecordKind::Processing,
            LedgerRow::Expense(_) => RecordKind::Expense,
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            LedgerRow::Transaction(t) => t.id,
            LedgerRow::Processing(p) => p.id,
            LedgerRow::Expense(e) => e.id,
        }
    }

    pub fn time(&self) -> &'a str {
        match *self {
            LedgerRow::Transaction(t) => &t.time,
            LedgerRow::Processing(p) => &p.time,
            LedgerRow::Expense(e) => &e.time,
        }
    }

    /// Fixed type order used by the `type` column: buy, processing, sell, expense
    pub fn type_rank(&self) -> char {
        match self {
            LedgerRow::Transaction(t) if t.is_buy() => 'A',
            LedgerRow::Processing(_) => 'B',
            LedgerRow::Transaction(_) => 'C',
            LedgerRow::Expense(_) => 'D',
        }
    }

    /// Material for a deal, source material for processing, category for an expense
    pub fn details(&self) -> &'a str {
        match *self {
            LedgerRow::Transaction(t) => &t.material,
            LedgerRow::Processing(p) => &p.from,
            LedgerRow::Expense(e) => &e.category,
        }
    }

    /// Money in is positive, money out negative, processing carries no money
    pub fn signed_value(&self) -> f64 {
        match self {
            LedgerRow::Transaction(t) if t.is_buy() => -t.total,
            LedgerRow::Transaction(t) => t.total,
            LedgerRow::Processing(_) => 0.0,
            LedgerRow::Expense(e) => -e.amount,
        }
    }

    pub fn value_text(&self) -> String {
        match self {
            LedgerRow::Transaction(t) if t.is_buy() => format!("-{}", format_amount(t.total)),
            LedgerRow::Transaction(t) => format!("+{}", format_amount(t.total)),
            LedgerRow::Processing(_) => "-".to_string(),
            LedgerRow::Expense(e) => format!("-{}", format_amount(e.amount)),
        }
    }

    pub fn subtitle(&self) -> String {
        match self {
            LedgerRow::Transaction(t) if t.is_debt() => format!("{} (unpaid)", t.client),
            LedgerRow::Transaction(t) => t.client.clone(),
            LedgerRow::Processing(p) => format!(
                "{} → {} | {}kg → {}kg",
                p.from,
                p.to,
                format_amount(p.qty_in),
                format_amount(p.qty_out)
            ),
            LedgerRow::Expense(e) => e.description.clone(),
        }
    }

    pub fn badge(&self) -> Badge {
        match self {
            LedgerRow::Transaction(t) if t.is_debt() => Badge::Debt,
            LedgerRow::Transaction(t) if t.is_buy() => Badge::Buy,
            LedgerRow::Transaction(_) => Badge::Sell,
            LedgerRow::Processing(_) => Badge::Processing,
            LedgerRow::Expense(_) => Badge::Expense,
        }
    }
}

/// Whole amounts without decimals, everything else with two
pub fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

// ============================================================================
// FILTERS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TypeFilter {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "buy")]
    Buy,
    #[serde(rename = "sell")]
    Sell,
    #[serde(rename = "proc")]
    Processing,
    #[serde(rename = "exp")]
    Expense,
}

impl TypeFilter {
    pub const ALL: [TypeFilter; 5] = [
        TypeFilter::All,
        TypeFilter::Buy,
        TypeFilter::Sell,
        TypeFilter::Processing,
        TypeFilter::Expense,
    ];

    pub fn matches(&self, row: &LedgerRow) -> bool {
        match (self, row) {
            (TypeFilter::All, _) => true,
            (TypeFilter::Buy, LedgerRow::Transaction(t)) => t.is_buy(),
            (TypeFilter::Sell, LedgerRow::Transaction(t)) => t.is_sell(),
            (TypeFilter::Processing, LedgerRow::Processing(_)) => true,
            (TypeFilter::Expense, LedgerRow::Expense(_)) => true,
            _ => false,
        }
    }

    /// Next filter in display order, wrapping around
    pub fn cycle(&self) -> TypeFilter {
        let pos = Self::ALL.iter().position(|f| f == self).unwrap_or(0);
        Self::ALL[(pos + 1) % Self::ALL.len()]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeFilter::All => "all",
            TypeFilter::Buy => "buy",
            TypeFilter::Sell => "sell",
            TypeFilter::Processing => "proc",
            TypeFilter::Expense => "exp",
        }
    }
}

impl fmt::Display for TypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TypeFilter {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "all" | "" => Ok(TypeFilter::All),
            "buy" => Ok(TypeFilter::Buy),
            "sell" => Ok(TypeFilter::Sell),
            "proc" | "processing" => Ok(TypeFilter::Processing),
            "exp" | "expense" => Ok(TypeFilter::Expense),
            _ => Err(StoreError::unknown("type filter", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MaterialFilter {
    #[default]
    All,
    Named(String),
}

impl MaterialFilter {
    /// Expenses carry no material, so any named filter hides them
    pub fn matches(&self, row: &LedgerRow) -> bool {
        match (self, row) {
            (MaterialFilter::All, _) => true,
            (MaterialFilter::Named(m), LedgerRow::Transaction(t)) => &t.material == m,
            (MaterialFilter::Named(m), LedgerRow::Processing(p)) => p.involves(m),
            (MaterialFilter::Named(_), LedgerRow::Expense(_)) => false,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MaterialFilter::All => "all",
            MaterialFilter::Named(m) => m,
        }
    }
}

impl From<&str> for MaterialFilter {
    fn from(s: &str) -> Self {
        if s.is_empty() || s == "all" {
            MaterialFilter::All
        } else {
            MaterialFilter::Named(s.to_string())
        }
    }
}

// ============================================================================
// SORTING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Time,
    Type,
    Details,
    Value,
}

impl FromStr for SortKey {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "time" => Ok(SortKey::Time),
            "type" => Ok(SortKey::Type),
            "details" => Ok(SortKey::Details),
            "value" => Ok(SortKey::Value),
            _ => Err(StoreError::unknown("sort key", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(StoreError::unknown("sort direction", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        SortSpec {
            key: SortKey::Time,
            direction: SortDirection::Desc,
        }
    }
}

impl SortSpec {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        SortSpec { key, direction }
    }

    /// Column-header click: the active ascending key flips to descending,
    /// anything else becomes `key` ascending.
    pub fn toggle(&mut self, key: SortKey) {
        self.direction = if self.key == key && self.direction == SortDirection::Asc {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        self.key = key;
    }

    pub fn compare(&self, a: &LedgerRow, b: &LedgerRow) -> Ordering {
        let ord = match self.key {
            SortKey::Time => a.time().cmp(b.time()),
            SortKey::Type => a.type_rank().cmp(&b.type_rank()),
            SortKey::Details => a.details().cmp(b.details()),
            SortKey::Value => a
                .signed_value()
                .partial_cmp(&b.signed_value())
                .unwrap_or(Ordering::Equal),
        };
        match self.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }
}

// ============================================================================
// AGGREGATOR
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerQuery {
    pub type_filter: TypeFilter,
    pub material: MaterialFilter,
    pub sort: SortSpec,
}

impl LedgerQuery {
    pub fn accepts(&self, row: &LedgerRow) -> bool {
        self.type_filter.matches(row) && self.material.matches(row)
    }
}

/// Records in merge order: transactions, then processing, then expenses
pub fn merge(day: &DayRecords) -> Vec<LedgerRow<'_>> {
    day.transactions
        .iter()
        .map(LedgerRow::Transaction)
        .chain(day.processing.iter().map(LedgerRow::Processing))
        .chain(day.expenses.iter().map(LedgerRow::Expense))
        .collect()
}

pub fn build_ledger<'a>(day: &'a DayRecords, query: &LedgerQuery) -> Vec<LedgerRow<'a>> {
    let mut rows: Vec<LedgerRow<'a>> = merge(day)
        .into_iter()
        .filter(|row| query.accepts(row))
        .collect();
    rows.sort_by(|a, b| query.sort.compare(a, b));
    rows
}
