// 📊 Summary - grouped totals, ranked bars and the day's KPI cards

use crate::records::{DayRecords, Expense, StockMap, Transaction};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

// ============================================================================
// GROUPED TOTALS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupTotal {
    pub name: String,
    pub value: f64,
}

/// Sum `value` per `key`, largest total first. Equal totals keep first-seen order.
pub fn group_sum<T, K, V>(items: impl IntoIterator<Item = T>, key: K, value: V) -> Vec<GroupTotal>
where
    K: Fn(&T) -> &str,
    V: Fn(&T) -> f64,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<GroupTotal> = Vec::new();

    for item in items {
        let name = key(&item);
        let amount = value(&item);
        match index.get(name) {
            Some(&i) => groups[i].value += amount,
            None => {
                index.insert(name.to_string(), groups.len());
                groups.push(GroupTotal {
                    name: name.to_string(),
                    value: amount,
                });
            }
        }
    }

    groups.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(std::cmp::Ordering::Equal));
    groups
}

/// Sales revenue per material, best seller first
pub fn sales_by_material(transactions: &[Transaction]) -> Vec<GroupTotal> {
    group_sum(
        transactions.iter().filter(|t| t.is_sell()),
        |t| t.material.as_str(),
        |t| t.total,
    )
}

/// Spending per expense category, largest first
pub fn expenses_by_category(expenses: &[Expense]) -> Vec<GroupTotal> {
    group_sum(expenses.iter(), |e| e.category.as_str(), |e| e.amount)
}

// ============================================================================
// RANKED BARS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedBar {
    pub name: String,
    pub value: f64,
    /// Share of the largest group, 0.0 - 1.0
    pub ratio: f64,
}

pub fn bar_ratio(value: f64, max: f64) -> f64 {
    if max <= 0.0 {
        0.0
    } else {
        (value / max).clamp(0.0, 1.0)
    }
}

/// Bars sized against the first (largest) total; empty input renders no bars
pub fn ranked_bars(totals: &[GroupTotal]) -> Vec<RankedBar> {
    let max = match totals.first() {
        Some(first) => first.value,
        None => return Vec::new(),
    };

    totals
        .iter()
        .map(|g| RankedBar {
            name: g.name.clone(),
            value: g.value,
            ratio: bar_ratio(g.value, max),
        })
        .collect()
}

// ============================================================================
// KPIs
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Kpis {
    pub income: f64,
    pub expense: f64,
    pub profit: f64,
}

impl Kpis {
    /// Income is sales; expense is purchases plus recorded expenses
    pub fn for_day(day: &DayRecords) -> Self {
        let income: f64 = day.transactions.iter().filter(|t| t.is_sell()).map(|t| t.total).sum();
        let purchases: f64 = day.transactions.iter().filter(|t| t.is_buy()).map(|t| t.total).sum();
        let costs: f64 = day.expenses.iter().map(|e| e.amount).sum();
        let expense = purchases + costs;

        Kpis {
            income,
            expense,
            profit: income - expense,
        }
    }
}

/// Everything the dashboard shows for one day
#[derive(Debug, Clone, Serialize)]
pub struct DaySummary {
    pub kpis: Kpis,
    pub top_sales: Vec<RankedBar>,
    pub top_expenses: Vec<RankedBar>,
    pub materials: Vec<String>,
}

impl DaySummary {
    pub fn build(day: &DayRecords, stock: &StockMap) -> Self {
        DaySummary {
            kpis: Kpis::for_day(day),
            top_sales: ranked_bars(&sales_by_material(&day.transactions)),
            top_expenses: ranked_bars(&expenses_by_category(&day.expenses)),
            materials: all_materials(day, stock),
        }
    }
}

/// Distinct material names seen in the day's records or in stock, sorted
pub fn all_materials(day: &DayRecords, stock: &StockMap) -> Vec<String> {
    let mut names: BTreeSet<&str> = BTreeSet::new();
    names.extend(day.transactions.iter().map(|t| t.material.as_str()));
    for p in &day.processing {
        names.insert(&p.from);
        names.insert(&p.to);
    }
    names.extend(stock.keys().map(|k| k.as_str()));
    names.into_iter().map(str::to_string).collect()
}
