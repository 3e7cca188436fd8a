// ♻️ Records - purchases, sales, processing runs and expenses for one working day
//
// The whole dataset is persisted as a single document:
//   { "days": { "2025-03-14": { "transactions": [...], "processing": [...], "expenses": [...] } },
//     "stock": { "PET": 120.5 } }
// Field names on the wire follow the stored document shape (mat, qtyIn, amt, ...).

use crate::error::{Result, StoreError};
use chrono::{Local, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DAY_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

/// Material name → quantity on hand (kg)
pub type StockMap = BTreeMap<String, f64>;

// ============================================================================
// RECORD KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    #[serde(rename = "trans")]
    Transaction,
    #[serde(rename = "proc")]
    Processing,
    #[serde(rename = "exp")]
    Expense,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Transaction => "trans",
            RecordKind::Processing => "proc",
            RecordKind::Expense => "exp",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "trans" | "transaction" => Ok(RecordKind::Transaction),
            "proc" | "processing" => Ok(RecordKind::Processing),
            "exp" | "expense" => Ok(RecordKind::Expense),
            _ => Err(StoreError::unknown("record kind", s)),
        }
    }
}

// ============================================================================
// TRANSACTION (purchase or sale)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeType {
    Buy,
    Sell,
}

impl FromStr for TradeType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "buy" => Ok(TradeType::Buy),
            "sell" => Ok(TradeType::Sell),
            _ => Err(StoreError::unknown("trade type", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Transfer,
    /// Deal recorded but not paid yet
    Debt,
    #[serde(other)]
    Other,
}

impl FromStr for PaymentMethod {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "transfer" => Ok(PaymentMethod::Transfer),
            "debt" => Ok(PaymentMethod::Debt),
            "other" => Ok(PaymentMethod::Other),
            _ => Err(StoreError::unknown("payment method", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub time: String,
    #[serde(rename = "type")]
    pub trade: TradeType,
    #[serde(rename = "mat")]
    pub material: String,
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub method: PaymentMethod,
    /// Always a non-negative magnitude, the sign comes from `trade`
    pub total: f64,
}

impl Transaction {
    pub fn is_buy(&self) -> bool {
        self.trade == TradeType::Buy
    }

    pub fn is_sell(&self) -> bool {
        self.trade == TradeType::Sell
    }

    pub fn is_debt(&self) -> bool {
        self.method == PaymentMethod::Debt
    }

    pub fn validate(&self) -> Result<()> {
        let kind = RecordKind::Transaction;
        check_time(kind, &self.time)?;
        check_amount(kind, "total", self.total)?;
        check_name(kind, "material", &self.material)
    }
}

// ============================================================================
// PROCESSING (material conversion)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Processing {
    pub id: u64,
    pub time: String,
    pub from: String,
    pub to: String,
    #[serde(rename = "qtyIn")]
    pub qty_in: f64,
    #[serde(rename = "qtyOut")]
    pub qty_out: f64,
}

impl Processing {
    pub fn involves(&self, material: &str) -> bool {
        self.from == material || self.to == material
    }

    pub fn validate(&self) -> Result<()> {
        let kind = RecordKind::Processing;
        check_time(kind, &self.time)?;
        check_amount(kind, "qty_in", self.qty_in)?;
        check_amount(kind, "qty_out", self.qty_out)?;
        check_name(kind, "from", &self.from)?;
        check_name(kind, "to", &self.to)
    }
}

// ============================================================================
// EXPENSE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: u64,
    pub time: String,
    #[serde(rename = "cat")]
    pub category: String,
    #[serde(rename = "desc", default)]
    pub description: String,
    #[serde(rename = "amt")]
    pub amount: f64,
}

impl Expense {
    pub fn validate(&self) -> Result<()> {
        let kind = RecordKind::Expense;
        check_time(kind, &self.time)?;
        check_amount(kind, "amount", self.amount)?;
        check_name(kind, "category", &self.category)
    }
}

fn check_amount(kind: RecordKind, field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(StoreError::invalid(
            kind,
            format!("{} must be a non-negative number, got {}", field, value),
        ));
    }
    Ok(())
}

/// Times are compared as strings, so only zero-padded `HH:MM` is accepted
fn check_time(kind: RecordKind, time: &str) -> Result<()> {
    let canonical = NaiveTime::parse_from_str(time, TIME_FORMAT)
        .map(|t| t.format(TIME_FORMAT).to_string() == time)
        .unwrap_or(false);
    if !canonical {
        return Err(StoreError::invalid(
            kind,
            format!("time must be HH:MM, got {:?}", time),
        ));
    }
    Ok(())
}

fn check_name(kind: RecordKind, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(StoreError::invalid(kind, format!("{} is empty", field)));
    }
    Ok(())
}

// ============================================================================
// DAY / DATASET
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayRecords {
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub processing: Vec<Processing>,
    #[serde(default)]
    pub expenses: Vec<Expense>,
}

impl DayRecords {
    pub fn len(&self) -> usize {
        self.transactions.len() + self.processing.len() + self.expenses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub days: BTreeMap<String, DayRecords>,
    #[serde(default)]
    pub stock: StockMap,
}

impl Dataset {
    /// Highest id used by `kind` on any day, 0 when none exist
    pub fn max_id(&self, kind: RecordKind) -> u64 {
        let mut max = 0;
        for day in self.days.values() {
            let day_max = match kind {
                RecordKind::Transaction => day.transactions.iter().map(|t| t.id).max(),
                RecordKind::Processing => day.processing.iter().map(|p| p.id).max(),
                RecordKind::Expense => day.expenses.iter().map(|e| e.id).max(),
            };
            max = max.max(day_max.unwrap_or(0));
        }
        max
    }
}

pub fn day_key(date: NaiveDate) -> String {
    date.format(DAY_FORMAT).to_string()
}

pub fn parse_day(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DAY_FORMAT).map_err(|_| StoreError::InvalidDate(s.to_string()))
}

/// Wall-clock `HH:MM`, the format every stored timestamp uses
pub fn current_time() -> String {
    Local::now().format(TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_wire_names() {
        let json = r#"{"id":7,"time":"09:15","type":"sell","mat":"PET","client":"Recycla","method":"debt","total":420.5}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();

        assert_eq!(tx.trade, TradeType::Sell);
        assert_eq!(tx.material, "PET");
        assert!(tx.is_debt());

        let back = serde_json::to_value(&tx).unwrap();
        assert_eq!(back["mat"], "PET");
        assert_eq!(back["type"], "sell");
    }

    #[test]
    fn test_unknown_payment_method_is_other() {
        let json = r#"{"id":1,"time":"10:00","type":"buy","mat":"Cardboard","method":"barter","total":10}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();

        assert_eq!(tx.method, PaymentMethod::Other);
        assert_eq!(tx.client, "");
    }

    #[test]
    fn test_processing_and_expense_wire_names() {
        let p: Processing =
            serde_json::from_str(r#"{"id":1,"time":"11:00","from":"Film","to":"Granules","qtyIn":100,"qtyOut":92.5}"#).unwrap();
        assert_eq!(p.qty_out, 92.5);
        assert!(p.involves("Granules"));
        assert!(!p.involves("PET"));

        let e: Expense =
            serde_json::from_str(r#"{"id":2,"time":"12:00","cat":"Fuel","desc":"Truck","amt":55}"#).unwrap();
        assert_eq!(e.category, "Fuel");
        assert_eq!(e.description, "Truck");
    }

    #[test]
    fn test_validation_rejects_negative_and_blank() {
        let e = Expense {
            id: 1,
            time: "08:00".to_string(),
            category: "Rent".to_string(),
            description: String::new(),
            amount: -5.0,
        };
        assert!(matches!(e.validate(), Err(StoreError::InvalidRecord { .. })));

        let p = Processing {
            id: 1,
            time: "08:00".to_string(),
            from: " ".to_string(),
            to: "Flakes".to_string(),
            qty_in: 1.0,
            qty_out: 1.0,
        };
        assert!(p.validate().is_err());

        let tx = Transaction {
            id: 1,
            time: "08:00".to_string(),
            trade: TradeType::Buy,
            material: "Paper".to_string(),
            client: String::new(),
            method: PaymentMethod::Cash,
            total: f64::NAN,
        };
        assert!(tx.validate().is_err());
    }

    #[test]
    fn test_time_must_be_zero_padded_hh_mm() {
        let mut e = Expense {
            id: 1,
            time: "09:05".to_string(),
            category: "Fuel".to_string(),
            description: String::new(),
            amount: 5.0,
        };
        assert!(e.validate().is_ok());

        for bad in ["9:00", "25:00", "09:60", "0900", "09:00:00", ""] {
            e.time = bad.to_string();
            assert!(
                matches!(e.validate(), Err(StoreError::InvalidRecord { .. })),
                "{:?} should be rejected",
                bad
            );
        }
        assert!(current_time().len() == 5);
    }

    #[test]
    fn test_dataset_max_id_and_day_key() {
        let mut dataset = Dataset::default();
        assert_eq!(dataset.max_id(RecordKind::Expense), 0);

        let day = dataset.days.entry("2025-03-14".to_string()).or_default();
        day.expenses.push(Expense {
            id: 4,
            time: "08:00".to_string(),
            category: "Fuel".to_string(),
            description: String::new(),
            amount: 1.0,
        });

        assert_eq!(dataset.max_id(RecordKind::Expense), 4);
        assert_eq!(dataset.max_id(RecordKind::Transaction), 0);

        let date = parse_day("2025-03-14").unwrap();
        assert_eq!(day_key(date), "2025-03-14");
        assert!(parse_day("14.03.2025").is_err());
    }

    #[test]
    fn test_record_kind_parsing() {
        assert_eq!("proc".parse::<RecordKind>().unwrap(), RecordKind::Processing);
        assert_eq!("Expense".parse::<RecordKind>().unwrap(), RecordKind::Expense);
        assert!("stock".parse::<RecordKind>().is_err());
    }
}
