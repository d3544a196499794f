// Grouping and merging of raw sheet records into per-item and per-firm
// summaries. Groups keep first-appearance order so that later stable sorts
// break ties by the order rows were uploaded in.
use crate::types::{MovementRecord, OpeningStockRecord, ProcurementRecord, VoucherType};
use crate::util::average;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovementRow {
    #[serde(rename = "Item Name")]
    pub item_name: String,
    #[serde(rename = "Quantity_Received")]
    pub quantity_received: f64,
    #[serde(rename = "Quantity_Issued")]
    pub quantity_issued: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedItem {
    pub item_name: String,
    pub quantity: f64,
    pub opening_balance: f64,
    /// Share of the summed opening balance of all matched items, in percent.
    pub share_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirmAggregate {
    pub firm: String,
    pub total_balance_quantity: f64,
    pub total_rejection_events: f64,
    pub average_days_for_completion: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirmDelivery {
    pub firm: String,
    pub total_po_amount: f64,
    pub average_delivery_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ProcurementSummary {
    pub total_firms: usize,
    pub total_amount_allocated: f64,
    pub total_items_demanded: f64,
    pub total_quantity_demanded: f64,
    pub total_items_delivered: f64,
    pub total_quantities_delivered: f64,
    pub total_bal_items: f64,
    pub total_bal_quantities: f64,
}

/// Sum `Quantity` per item over rows of one voucher type.
pub fn sum_by_item(movements: &[MovementRecord], voucher: &VoucherType) -> Vec<(String, f64)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut sums: Vec<(String, f64)> = Vec::new();
    for m in movements.iter().filter(|m| &m.voucher_type == voucher) {
        let Some(item) = m.item_name.as_deref() else {
            continue;
        };
        let slot = *index.entry(item).or_insert_with(|| {
            sums.push((item.to_string(), 0.0));
            sums.len() - 1
        });
        sums[slot].1 += m.quantity.unwrap_or(0.0);
    }
    sums
}

/// Outer merge of received and issued sums by item. Items on only one side
/// get 0 for the other; received items come first, then issue-only items.
pub fn outer_merge(received: &[(String, f64)], issued: &[(String, f64)]) -> Vec<MovementRow> {
    let issued_by_item: HashMap<&str, f64> =
        issued.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    let received_items: HashSet<&str> = received.iter().map(|(k, _)| k.as_str()).collect();

    let mut merged: Vec<MovementRow> = received
        .iter()
        .map(|(item, qty)| MovementRow {
            item_name: item.clone(),
            quantity_received: *qty,
            quantity_issued: issued_by_item.get(item.as_str()).copied().unwrap_or(0.0),
        })
        .collect();
    merged.extend(
        issued
            .iter()
            .filter(|(item, _)| !received_items.contains(item.as_str()))
            .map(|(item, qty)| MovementRow {
                item_name: item.clone(),
                quantity_received: 0.0,
                quantity_issued: *qty,
            }),
    );
    merged
}

pub fn movement_totals(movements: &[MovementRecord]) -> Vec<MovementRow> {
    let received = sum_by_item(movements, &VoucherType::Receipt);
    let issued = sum_by_item(movements, &VoucherType::Issue);
    outer_merge(&received, &issued)
}

/// Descending by received quantity, stable.
pub fn sort_by_received(rows: &[MovementRow]) -> Vec<MovementRow> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| {
        b.quantity_received
            .partial_cmp(&a.quantity_received)
            .unwrap_or(Ordering::Equal)
    });
    sorted
}

/// Descending by opening balance, stable. Missing balances sort last.
pub fn sort_by_opening_balance(stock: &[OpeningStockRecord]) -> Vec<OpeningStockRecord> {
    let mut sorted = stock.to_vec();
    sorted.sort_by(|a, b| match (a.opening_balance, b.opening_balance) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    sorted
}

/// Opening balance per item; the first occurrence of a duplicated item wins.
pub fn opening_balances(stock: &[OpeningStockRecord]) -> HashMap<&str, f64> {
    let mut map = HashMap::new();
    for s in stock {
        map.entry(s.item_name.as_str())
            .or_insert(s.opening_balance.unwrap_or(0.0));
    }
    map
}

/// Items whose received total equals the issued total exactly, joined to
/// their opening balance.
pub fn matched_items(merged: &[MovementRow], stock: &[OpeningStockRecord]) -> Vec<MatchedItem> {
    let balances = opening_balances(stock);
    let mut matched: Vec<MatchedItem> = merged
        .iter()
        .filter(|r| r.quantity_received == r.quantity_issued)
        .map(|r| MatchedItem {
            item_name: r.item_name.clone(),
            quantity: r.quantity_received,
            opening_balance: balances.get(r.item_name.as_str()).copied().unwrap_or(0.0),
            share_pct: 0.0,
        })
        .collect();

    let total: f64 = matched.iter().map(|m| m.opening_balance).sum();
    if total > 0.0 {
        for m in &mut matched {
            m.share_pct = m.opening_balance / total * 100.0;
        }
    }
    matched
}

pub fn firm_performance(records: &[ProcurementRecord]) -> Vec<FirmAggregate> {
    struct Acc {
        firm: String,
        balance: f64,
        rejections: f64,
        days: Vec<f64>,
    }
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut accs: Vec<Acc> = Vec::new();
    for r in records {
        let Some(firm) = r.firm.as_deref() else {
            continue;
        };
        let slot = *index.entry(firm).or_insert_with(|| {
            accs.push(Acc {
                firm: firm.to_string(),
                balance: 0.0,
                rejections: 0.0,
                days: Vec::new(),
            });
            accs.len() - 1
        });
        let e = &mut accs[slot];
        e.balance += r.balance_quantity().unwrap_or(0.0);
        e.rejections += r.rejection_events.unwrap_or(0.0);
        if let Some(d) = r.completion_days {
            e.days.push(d);
        }
    }
    accs.into_iter()
        .map(|a| FirmAggregate {
            firm: a.firm,
            total_balance_quantity: a.balance,
            total_rejection_events: a.rejections,
            average_days_for_completion: average(&a.days),
        })
        .collect()
}

pub fn firm_delivery(records: &[ProcurementRecord]) -> Vec<FirmDelivery> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut accs: Vec<(String, f64, Vec<f64>)> = Vec::new();
    for r in records {
        let Some(firm) = r.firm.as_deref() else {
            continue;
        };
        let slot = *index.entry(firm).or_insert_with(|| {
            accs.push((firm.to_string(), 0.0, Vec::new()));
            accs.len() - 1
        });
        let e = &mut accs[slot];
        e.1 += r.po_amount.unwrap_or(0.0);
        if let Some(pct) = r.delivery_percentage() {
            e.2.push(pct);
        }
    }
    accs.into_iter()
        .map(|(firm, po, pcts)| FirmDelivery {
            firm,
            total_po_amount: po,
            average_delivery_percentage: average(&pcts),
        })
        .collect()
}

pub fn procurement_summary(records: &[ProcurementRecord]) -> ProcurementSummary {
    let sum = |f: fn(&ProcurementRecord) -> Option<f64>| -> f64 {
        records.iter().filter_map(f).sum()
    };
    let firms: HashSet<&str> = records.iter().filter_map(|r| r.firm.as_deref()).collect();

    let total_items_demanded = sum(|r| r.items_demanded);
    let total_quantity_demanded = sum(|r| r.quantity_demanded);
    let total_items_delivered = sum(|r| r.items_delivered);
    let total_quantities_delivered = sum(|r| r.quantity_delivered);
    ProcurementSummary {
        total_firms: firms.len(),
        total_amount_allocated: sum(|r| r.po_amount),
        total_items_demanded,
        total_quantity_demanded,
        total_items_delivered,
        total_quantities_delivered,
        total_bal_items: total_items_demanded - total_items_delivered,
        total_bal_quantities: total_quantity_demanded - total_quantities_delivered,
    }
}
