// Stock-depletion projection.
//
// Each item's issue rate is assumed to double every period, starting from
// the issued total observed in the upload. The projection counts how many
// whole periods the opening balance covers that growing issuance.

use crate::aggregate::{opening_balances, MovementRow};
use crate::types::OpeningStockRecord;
use serde::{Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum YearsSufficient {
    Years(u32),
    /// Stock on hand that is never issued.
    Infinite,
}

impl YearsSufficient {
    pub fn is_finite(&self) -> bool {
        matches!(self, YearsSufficient::Years(_))
    }
}

impl fmt::Display for YearsSufficient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YearsSufficient::Years(n) => write!(f, "{n}"),
            YearsSufficient::Infinite => f.write_str("inf"),
        }
    }
}

impl Serialize for YearsSufficient {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            YearsSufficient::Years(n) => serializer.serialize_u32(*n),
            YearsSufficient::Infinite => serializer.serialize_str("inf"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepletionRow {
    #[serde(rename = "Item Name")]
    pub item_name: String,
    #[serde(rename = "Opening_Balance")]
    pub opening_balance: f64,
    #[serde(rename = "Current_Issued_Rate")]
    pub current_issued_rate: f64,
    #[serde(rename = "Years_Sufficient")]
    pub years_sufficient: YearsSufficient,
}

/// Whole periods until cumulative issuance reaches `opening_balance` when
/// period `n` issues `current_issue_rate * 2^(n-1)`.
///
/// A non-positive rate never depletes anything: positive stock lasts
/// forever, an empty stock lasts zero periods.
pub fn years_sufficient(opening_balance: f64, current_issue_rate: f64) -> YearsSufficient {
    if current_issue_rate <= 0.0 {
        return if opening_balance > 0.0 {
            YearsSufficient::Infinite
        } else {
            YearsSufficient::Years(0)
        };
    }
    let mut years: u32 = 0;
    let mut cumulative = 0.0_f64;
    // Terminates: the increment overflows to +inf after ~1100 doublings.
    while cumulative < opening_balance {
        years += 1;
        cumulative += current_issue_rate * 2f64.powi(years as i32 - 1);
    }
    YearsSufficient::Years(years)
}

/// Join opening balances with issued totals and project each item.
///
/// Items come in opening-stock order; items that only appear in the
/// movement sheet follow with a zero balance.
pub fn project(stock: &[OpeningStockRecord], merged: &[MovementRow]) -> Vec<DepletionRow> {
    let balances = opening_balances(stock);
    let issued: HashMap<&str, f64> = merged
        .iter()
        .map(|r| (r.item_name.as_str(), r.quantity_issued))
        .collect();

    let mut seen: HashSet<&str> = HashSet::new();
    let keys = stock
        .iter()
        .map(|s| s.item_name.as_str())
        .chain(merged.iter().map(|r| r.item_name.as_str()))
        .filter(|k| seen.insert(*k))
        .collect::<Vec<_>>();

    keys.into_iter()
        .map(|item| {
            let opening_balance = balances.get(item).copied().unwrap_or(0.0);
            let current_issued_rate = issued.get(item).copied().unwrap_or(0.0);
            DepletionRow {
                item_name: item.to_string(),
                opening_balance,
                current_issued_rate,
                years_sufficient: years_sufficient(opening_balance, current_issued_rate),
            }
        })
        .collect()
}

/// Drop infinite projections and order the rest from closest to depletion.
pub fn finite_by_years(rows: &[DepletionRow]) -> Vec<DepletionRow> {
    let mut finite: Vec<DepletionRow> = rows
        .iter()
        .filter(|r| r.years_sufficient.is_finite())
        .cloned()
        .collect();
    finite.sort_by_key(|r| r.years_sufficient);
    finite
}
