// 🗂️ Record Store - owns the dataset and the selected working day
//
// Reads are served from memory. Every successful change is followed by a
// fire-and-forget save: a failed save is logged and flagged by `is_saved`,
// never returned as an error.

use crate::error::{Result, StoreError};
use crate::ledger::{build_ledger, LedgerQuery, LedgerRow};
use crate::persistence::DocumentStore;
use crate::records::{
    current_time, day_key, Dataset, DayRecords, Expense, PaymentMethod, Processing, RecordKind,
    StockMap, TradeType, Transaction,
};
use crate::summary::DaySummary;
use chrono::{Local, NaiveDate};
use tracing::{error, info, warn};

static EMPTY_DAY: DayRecords = DayRecords {
    transactions: Vec::new(),
    processing: Vec::new(),
    expenses: Vec::new(),
};

// ============================================================================
// NEW RECORD INPUTS (id assigned by the store)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub time: Option<String>,
    pub trade: TradeType,
    pub material: String,
    pub client: String,
    pub method: PaymentMethod,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProcessing {
    pub time: Option<String>,
    pub from: String,
    pub to: String,
    pub qty_in: f64,
    pub qty_out: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    pub time: Option<String>,
    pub category: String,
    pub description: String,
    pub amount: f64,
}

/// One input row of a batch, see `RecordStore::add_batch`
#[derive(Debug, Clone, PartialEq)]
pub enum NewRecord {
    Transaction(NewTransaction),
    Processing(NewProcessing),
    Expense(NewExpense),
}

/// A stored record of any kind, returned by `delete`
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Transaction(Transaction),
    Processing(Processing),
    Expense(Expense),
}

fn build_transaction(id: u64, new: NewTransaction) -> Result<Transaction> {
    let tx = Transaction {
        id,
        time: new.time.unwrap_or_else(current_time),
        trade: new.trade,
        material: new.material.trim().to_string(),
        client: new.client.trim().to_string(),
        method: new.method,
        total: new.total,
    };
    tx.validate()?;
    Ok(tx)
}

fn build_processing(id: u64, new: NewProcessing) -> Result<Processing> {
    let p = Processing {
        id,
        time: new.time.unwrap_or_else(current_time),
        from: new.from.trim().to_string(),
        to: new.to.trim().to_string(),
        qty_in: new.qty_in,
        qty_out: new.qty_out,
    };
    p.validate()?;
    Ok(p)
}

fn build_expense(id: u64, new: NewExpense) -> Result<Expense> {
    let e = Expense {
        id,
        time: new.time.unwrap_or_else(current_time),
        category: new.category.trim().to_string(),
        description: new.description.trim().to_string(),
        amount: new.amount,
    };
    e.validate()?;
    Ok(e)
}

// ============================================================================
// RECORD STORE
// ============================================================================

pub struct RecordStore {
    dataset: Dataset,
    date: NaiveDate,
    backend: Option<Box<dyn DocumentStore>>,
    saved: bool,
}

impl RecordStore {
    /// Store without persistence, starting on today's date
    pub fn in_memory(dataset: Dataset) -> Self {
        RecordStore {
            dataset,
            date: Local::now().date_naive(),
            backend: None,
            saved: true,
        }
    }

    /// Load the dataset from `backend`. A failed load is logged and the store starts empty.
    pub fn open(backend: Box<dyn DocumentStore>) -> Self {
        let dataset = match backend.load() {
            Ok(Some(dataset)) => {
                info!(backend = %backend.describe(), days = dataset.days.len(), "dataset loaded");
                dataset
            }
            Ok(None) => {
                info!(backend = %backend.describe(), "no stored dataset, starting empty");
                Dataset::default()
            }
            Err(e) => {
                error!(backend = %backend.describe(), error = %e, "failed to load dataset");
                Dataset::default()
            }
        };

        RecordStore {
            dataset,
            date: Local::now().date_naive(),
            backend: Some(backend),
            saved: true,
        }
    }

    pub fn select_date(&mut self, date: NaiveDate) {
        self.date = date;
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Records for the selected date; empty when nothing was recorded
    pub fn day(&self) -> &DayRecords {
        self.day_at(self.date)
    }

    pub fn day_at(&self, date: NaiveDate) -> &DayRecords {
        self.dataset.days.get(&day_key(date)).unwrap_or(&EMPTY_DAY)
    }

    pub fn stock(&self) -> &StockMap {
        &self.dataset.stock
    }

    /// Dates that have at least one record, oldest first
    pub fn dates(&self) -> Vec<String> {
        self.dataset
            .days
            .iter()
            .filter(|(_, day)| !day.is_empty())
            .map(|(date, _)| date.clone())
            .collect()
    }

    pub fn ledger(&self, query: &LedgerQuery) -> Vec<LedgerRow<'_>> {
        self.ledger_for(self.date, query)
    }

    /// Ledger of any day, leaving the selected date alone
    pub fn ledger_for(&self, date: NaiveDate, query: &LedgerQuery) -> Vec<LedgerRow<'_>> {
        build_ledger(self.day_at(date), query)
    }

    pub fn summary(&self) -> DaySummary {
        self.summary_for(self.date)
    }

    pub fn summary_for(&self, date: NaiveDate) -> DaySummary {
        DaySummary::build(self.day_at(date), self.stock())
    }

    /// False after a save that did not reach the backend, until the next successful one
    pub fn is_saved(&self) -> bool {
        self.saved
    }

    fn day_mut(&mut self, date: NaiveDate) -> &mut DayRecords {
        self.dataset.days.entry(day_key(date)).or_default()
    }

    fn next_id(&self, kind: RecordKind) -> u64 {
        self.dataset.max_id(kind) + 1
    }

    // ------------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------------

    pub fn add_transaction(&mut self, new: NewTransaction) -> Result<Transaction> {
        let tx = build_transaction(self.next_id(RecordKind::Transaction), new)?;

        self.day_mut(self.date).transactions.push(tx.clone());
        info!(id = tx.id, material = %tx.material, total = tx.total, "transaction added");
        self.persist();
        Ok(tx)
    }

    pub fn add_processing(&mut self, new: NewProcessing) -> Result<Processing> {
        let p = build_processing(self.next_id(RecordKind::Processing), new)?;

        self.day_mut(self.date).processing.push(p.clone());
        info!(id = p.id, from = %p.from, to = %p.to, "processing added");
        self.persist();
        Ok(p)
    }

    pub fn add_expense(&mut self, new: NewExpense) -> Result<Expense> {
        let e = build_expense(self.next_id(RecordKind::Expense), new)?;

        self.day_mut(self.date).expenses.push(e.clone());
        info!(id = e.id, category = %e.category, amount = e.amount, "expense added");
        self.persist();
        Ok(e)
    }

    /// Add records to their own dates, all or nothing: every row is validated before
    /// the first one is stored, and the batch is saved once.
    pub fn add_batch(&mut self, batch: Vec<(NaiveDate, NewRecord)>) -> Result<usize> {
        let mut next_tx = self.next_id(RecordKind::Transaction);
        let mut next_proc = self.next_id(RecordKind::Processing);
        let mut next_exp = self.next_id(RecordKind::Expense);

        let mut records = Vec::with_capacity(batch.len());
        for (date, new) in batch {
            let record = match new {
                NewRecord::Transaction(new) => {
                    next_tx += 1;
                    Record::Transaction(build_transaction(next_tx - 1, new)?)
                }
                NewRecord::Processing(new) => {
                    next_proc += 1;
                    Record::Processing(build_processing(next_proc - 1, new)?)
                }
                NewRecord::Expense(new) => {
                    next_exp += 1;
                    Record::Expense(build_expense(next_exp - 1, new)?)
                }
            };
            records.push((date, record));
        }

        let count = records.len();
        if count == 0 {
            return Ok(0);
        }
        for (date, record) in records {
            let day = self.day_mut(date);
            match record {
                Record::Transaction(tx) => day.transactions.push(tx),
                Record::Processing(p) => day.processing.push(p),
                Record::Expense(e) => day.expenses.push(e),
            }
        }
        info!(count, "batch added");
        self.persist();
        Ok(count)
    }

    // ------------------------------------------------------------------------
    // Delete / stock
    // ------------------------------------------------------------------------

    /// Remove the record of `kind` with `id` from the selected date
    pub fn delete(&mut self, kind: RecordKind, id: u64) -> Result<Record> {
        self.delete_on(self.date, kind, id)
    }

    pub fn delete_on(&mut self, date: NaiveDate, kind: RecordKind, id: u64) -> Result<Record> {
        let not_found = StoreError::RecordNotFound {
            kind,
            id,
            date: day_key(date),
        };
        let day = match self.dataset.days.get_mut(&day_key(date)) {
            Some(day) => day,
            None => return Err(not_found),
        };

        let removed = match kind {
            RecordKind::Transaction => take_by_id(&mut day.transactions, |t| t.id == id)
                .map(Record::Transaction),
            RecordKind::Processing => take_by_id(&mut day.processing, |p| p.id == id)
                .map(Record::Processing),
            RecordKind::Expense => {
                take_by_id(&mut day.expenses, |e| e.id == id).map(Record::Expense)
            }
        };

        match removed {
            Some(record) => {
                info!(kind = %kind, id, "record deleted");
                self.persist();
                Ok(record)
            }
            None => {
                warn!(kind = %kind, id, "delete requested for unknown record");
                Err(not_found)
            }
        }
    }

    /// Overwrite the quantity on hand for `material`
    pub fn set_stock(&mut self, material: &str, qty: f64) -> Result<()> {
        let material = material.trim();
        if material.is_empty() || !qty.is_finite() {
            return Err(StoreError::InvalidStock {
                material: material.to_string(),
                qty,
            });
        }
        self.dataset.stock.insert(material.to_string(), qty);
        self.persist();
        Ok(())
    }

    /// Save now. Errors are logged and swallowed; returns whether the save succeeded.
    pub fn persist(&mut self) -> bool {
        let backend = match &self.backend {
            Some(backend) => backend,
            None => return true,
        };
        self.saved = match backend.save(&self.dataset) {
            Ok(()) => true,
            Err(e) => {
                error!(backend = %backend.describe(), error = %e, "failed to save dataset");
                false
            }
        };
        self.saved
    }
}

fn take_by_id<T>(items: &mut Vec<T>, is_target: impl Fn(&T) -> bool) -> Option<T> {
    let pos = items.iter().position(is_target)?;
    Some(items.remove(pos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{SortDirection, SortKey, SortSpec, TypeFilter};
    use crate::persistence::{DocumentKey, JsonFileStore};
    use std::sync::{Arc, Mutex};

    fn march_14() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    fn sale(material: &str, total: f64) -> NewTransaction {
        NewTransaction {
            time: Some("10:00".to_string()),
            trade: TradeType::Sell,
            material: material.to_string(),
            client: "Buyer".to_string(),
            method: PaymentMethod::Cash,
            total,
        }
    }

    fn fuel(amount: f64) -> NewExpense {
        NewExpense {
            time: Some("11:00".to_string()),
            category: "Fuel".to_string(),
            description: "Truck".to_string(),
            amount,
        }
    }

    /// Backend that records saves and can be told to fail
    #[derive(Clone, Default)]
    struct RecordingBackend {
        saves: Arc<Mutex<Vec<Dataset>>>,
        fail: bool,
    }

    impl DocumentStore for RecordingBackend {
        fn load(&self) -> Result<Option<Dataset>> {
            if self.fail {
                return Err(StoreError::InvalidDate("boom".to_string()));
            }
            Ok(None)
        }

        fn save(&self, dataset: &Dataset) -> Result<()> {
            if self.fail {
                return Err(StoreError::InvalidDate("boom".to_string()));
            }
            self.saves.lock().unwrap().push(dataset.clone());
            Ok(())
        }

        fn describe(&self) -> String {
            "recording".to_string()
        }
    }

    #[test]
    fn test_unknown_date_reads_as_empty() {
        let mut store = RecordStore::in_memory(Dataset::default());
        store.select_date(march_14());

        assert!(store.day().is_empty());
        assert!(store.ledger(&LedgerQuery::default()).is_empty());
        assert!(store.dates().is_empty());
    }

    #[test]
    fn test_ids_increase_per_kind() {
        let mut store = RecordStore::in_memory(Dataset::default());
        store.select_date(march_14());

        let a = store.add_transaction(sale("PET", 100.0)).unwrap();
        let b = store.add_transaction(sale("Paper", 50.0)).unwrap();
        let e = store.add_expense(fuel(20.0)).unwrap();

        assert_eq!((a.id, b.id, e.id), (1, 2, 1));

        // Ids stay unique across days
        store.select_date(march_14().succ_opt().unwrap());
        let c = store.add_transaction(sale("PET", 10.0)).unwrap();
        assert_eq!(c.id, 3);
        assert_eq!(store.dates(), vec!["2025-03-14", "2025-03-15"]);
    }

    #[test]
    fn test_invalid_record_is_rejected_and_not_stored() {
        let mut store = RecordStore::in_memory(Dataset::default());

        let err = store.add_expense(fuel(-1.0)).unwrap_err();

        assert!(matches!(err, StoreError::InvalidRecord { kind: RecordKind::Expense, .. }));
        assert!(store.day().expenses.is_empty());
    }

    #[test]
    fn test_delete_by_kind_and_id() {
        let mut store = RecordStore::in_memory(Dataset::default());
        store.select_date(march_14());
        store.add_transaction(sale("PET", 100.0)).unwrap();
        store.add_expense(fuel(20.0)).unwrap();

        // Same id, different kind: only the expense goes
        let removed = store.delete(RecordKind::Expense, 1).unwrap();

        assert!(matches!(removed, Record::Expense(ref e) if e.category == "Fuel"));
        assert_eq!(store.day().transactions.len(), 1);
        assert!(store.day().expenses.is_empty());

        let err = store.delete(RecordKind::Expense, 1).unwrap_err();
        assert!(matches!(err, StoreError::RecordNotFound { id: 1, .. }));
    }

    #[test]
    fn test_delete_on_other_date_is_not_found() {
        let mut store = RecordStore::in_memory(Dataset::default());
        store.select_date(march_14());
        store.add_transaction(sale("PET", 100.0)).unwrap();

        store.select_date(march_14().pred_opt().unwrap());

        assert!(store.delete(RecordKind::Transaction, 1).is_err());
    }

    #[test]
    fn test_ledger_and_summary_follow_selected_day() {
        let mut store = RecordStore::in_memory(Dataset::default());
        store.select_date(march_14());
        store.add_transaction(sale("Plastic", 500.0)).unwrap();
        store.add_transaction(sale("Paper", 300.0)).unwrap();
        store.add_expense(fuel(40.0)).unwrap();

        let query = LedgerQuery {
            type_filter: TypeFilter::Sell,
            sort: SortSpec::new(SortKey::Value, SortDirection::Asc),
            ..Default::default()
        };
        let ids: Vec<u64> = store.ledger(&query).iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec![2, 1]);

        let summary = store.summary();
        assert_eq!(summary.kpis.income, 800.0);
        assert_eq!(summary.top_sales[0].name, "Plastic");
        assert_eq!(summary.top_expenses.len(), 1);
    }

    #[test]
    fn test_every_change_is_saved() {
        let backend = RecordingBackend::default();
        let saves = backend.saves.clone();
        let mut store = RecordStore::open(Box::new(backend));
        store.select_date(march_14());

        store.add_transaction(sale("PET", 100.0)).unwrap();
        store.set_stock("PET", 12.0).unwrap();
        store.delete(RecordKind::Transaction, 1).unwrap();

        let saves = saves.lock().unwrap();
        assert_eq!(saves.len(), 3);
        assert_eq!(saves[2].stock.get("PET"), Some(&12.0));
        assert!(saves[2].days["2025-03-14"].transactions.is_empty());
    }

    #[test]
    fn test_backend_failures_are_swallowed() {
        let backend = RecordingBackend {
            fail: true,
            ..Default::default()
        };
        let mut store = RecordStore::open(Box::new(backend));

        let tx = store.add_transaction(sale("PET", 100.0));

        assert!(tx.is_ok());
        assert!(!store.is_saved());
        assert!(!store.persist());
        assert_eq!(store.day().transactions.len(), 1);
    }

    #[test]
    fn test_reopen_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let key = DocumentKey::new("ecorecycle", "db");

        {
            let mut store = RecordStore::open(Box::new(JsonFileStore::new(dir.path(), key.clone())));
            store.select_date(march_14());
            store.add_expense(fuel(75.0)).unwrap();
        }

        let mut store = RecordStore::open(Box::new(JsonFileStore::new(dir.path(), key)));
        store.select_date(march_14());

        assert_eq!(store.day().expenses[0].amount, 75.0);
    }

    #[test]
    fn test_unpadded_or_out_of_range_time_is_rejected() {
        let mut store = RecordStore::in_memory(Dataset::default());
        store.select_date(march_14());

        for bad in ["9:00", "25:00"] {
            let mut tx = sale("PET", 10.0);
            tx.time = Some(bad.to_string());
            let err = store.add_transaction(tx).unwrap_err();
            assert!(matches!(err, StoreError::InvalidRecord { kind: RecordKind::Transaction, .. }));
        }
        assert!(store.day().is_empty());

        let mut early = sale("PET", 10.0);
        early.time = Some("09:00".to_string());
        store.add_transaction(early).unwrap();
        store.add_transaction(sale("Paper", 10.0)).unwrap(); // 10:00

        let query = LedgerQuery {
            sort: SortSpec::new(SortKey::Time, SortDirection::Asc),
            ..Default::default()
        };
        let times: Vec<&str> = store.ledger(&query).iter().map(|r| r.time()).collect();
        assert_eq!(times, vec!["09:00", "10:00"]);
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let backend = RecordingBackend::default();
        let saves = backend.saves.clone();
        let mut store = RecordStore::open(Box::new(backend));
        store.select_date(march_14());
        store.add_expense(fuel(5.0)).unwrap();

        let other_day = march_14().succ_opt().unwrap();
        let batch = vec![
            (march_14(), NewRecord::Expense(fuel(10.0))),
            (other_day, NewRecord::Expense(fuel(-5.0))),
        ];
        assert!(store.add_batch(batch).is_err());
        assert_eq!(store.day().expenses.len(), 1);
        assert!(store.day_at(other_day).is_empty());
        assert_eq!(saves.lock().unwrap().len(), 1);

        let batch = vec![
            (march_14(), NewRecord::Expense(fuel(10.0))),
            (other_day, NewRecord::Transaction(sale("PET", 50.0))),
            (other_day, NewRecord::Expense(fuel(5.0))),
        ];
        assert_eq!(store.add_batch(batch).unwrap(), 3);

        let ids: Vec<u64> = store.day().expenses.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(store.day_at(other_day).expenses[0].id, 3);
        assert_eq!(store.date(), march_14());
        assert_eq!(saves.lock().unwrap().len(), 2, "one save per batch");
    }

    #[test]
    fn test_reads_and_deletes_by_date_keep_selection() {
        let mut store = RecordStore::in_memory(Dataset::default());
        store.select_date(march_14());
        store.add_transaction(sale("PET", 100.0)).unwrap();

        let today = march_14().succ_opt().unwrap();
        store.select_date(today);

        assert_eq!(store.ledger_for(march_14(), &LedgerQuery::default()).len(), 1);
        assert_eq!(store.summary_for(march_14()).kpis.income, 100.0);
        store.delete_on(march_14(), RecordKind::Transaction, 1).unwrap();

        assert_eq!(store.date(), today);
        assert!(store.day_at(march_14()).is_empty());
    }
}
