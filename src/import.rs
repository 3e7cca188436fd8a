// 📥 CSV import / export
//
// Import files carry one record kind each, plus a `date` column (YYYY-MM-DD):
//   trans: date,time,type,material,client,method,total
//   proc:  date,time,from,to,qty_in,qty_out
//   exp:   date,time,category,description,amount
// Rows go through the record store, so they get fresh ids and the same validation.
// A file is imported whole or not at all.

use crate::error::{Result, StoreError};
use crate::ledger::LedgerRow;
use crate::records::{parse_day, PaymentMethod, RecordKind, TradeType};
use crate::store::{NewExpense, NewProcessing, NewRecord, NewTransaction, RecordStore};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
struct TransactionRow {
    date: String,
    #[serde(default)]
    time: Option<String>,
    #[serde(rename = "type")]
    trade: TradeType,
    material: String,
    #[serde(default)]
    client: String,
    #[serde(default)]
    method: PaymentMethod,
    total: f64,
}

#[derive(Debug, Deserialize)]
struct ProcessingRow {
    date: String,
    #[serde(default)]
    time: Option<String>,
    from: String,
    to: String,
    qty_in: f64,
    qty_out: f64,
}

#[derive(Debug, Deserialize)]
struct ExpenseRow {
    date: String,
    #[serde(default)]
    time: Option<String>,
    category: String,
    #[serde(default)]
    description: String,
    amount: f64,
}

fn non_empty(time: Option<String>) -> Option<String> {
    time.filter(|t| !t.trim().is_empty())
}

pub fn import_csv(store: &mut RecordStore, kind: RecordKind, path: &Path) -> Result<usize> {
    let file = std::fs::File::open(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let count = import_reader(store, kind, file)?;
    info!(path = %path.display(), kind = %kind, count, "csv imported");
    Ok(count)
}

/// Import every row or none: the whole file is read and checked before the store changes
pub fn import_reader<R: Read>(store: &mut RecordStore, kind: RecordKind, reader: R) -> Result<usize> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let batch = read_rows(kind, &mut rdr)?;
    store.add_batch(batch)
}

fn read_rows<R: Read>(kind: RecordKind, rdr: &mut csv::Reader<R>) -> Result<Vec<(NaiveDate, NewRecord)>> {
    let mut batch = Vec::new();

    match kind {
        RecordKind::Transaction => {
            for row in rdr.deserialize() {
                let row: TransactionRow = row?;
                let new = NewTransaction {
                    time: non_empty(row.time),
                    trade: row.trade,
                    material: row.material,
                    client: row.client,
                    method: row.method,
                    total: row.total,
                };
                batch.push((parse_day(&row.date)?, NewRecord::Transaction(new)));
            }
        }
        RecordKind::Processing => {
            for row in rdr.deserialize() {
                let row: ProcessingRow = row?;
                let new = NewProcessing {
                    time: non_empty(row.time),
                    from: row.from,
                    to: row.to,
                    qty_in: row.qty_in,
                    qty_out: row.qty_out,
                };
                batch.push((parse_day(&row.date)?, NewRecord::Processing(new)));
            }
        }
        RecordKind::Expense => {
            for row in rdr.deserialize() {
                let row: ExpenseRow = row?;
                let new = NewExpense {
                    time: non_empty(row.time),
                    category: row.category,
                    description: row.description,
                    amount: row.amount,
                };
                batch.push((parse_day(&row.date)?, NewRecord::Expense(new)));
            }
        }
    }

    Ok(batch)
}

// ============================================================================
// EXPORT
// ============================================================================

#[derive(Debug, Serialize)]
struct LedgerCsvRow<'a> {
    kind: &'static str,
    id: u64,
    time: &'a str,
    badge: &'static str,
    details: &'a str,
    note: String,
    value: f64,
}

/// Write the ledger view as CSV, one line per row, in the given order
pub fn write_ledger_csv<W: Write>(rows: &[LedgerRow], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(LedgerCsvRow {
            kind: row.kind().as_str(),
            id: row.id(),
            time: row.time(),
            badge: row.badge().label(),
            details: row.details(),
            note: row.subtitle(),
            value: row.signed_value(),
        })?;
    }
    wtr.flush()?;
    Ok(())
}
