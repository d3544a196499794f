// Firm ranking: min-max normalize three lower-is-better metrics and sum
// their complements into a score in `[0, 3]`.

use crate::aggregate::FirmAggregate;
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirmPerformance {
    pub firm: String,
    pub total_balance_quantity: f64,
    pub total_rejection_events: f64,
    pub average_days_for_completion: f64,
    pub normalized_balance_quantity: f64,
    pub normalized_rejection_events: f64,
    pub normalized_days_for_completion: f64,
    pub ranking_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedFirm {
    pub rank: usize,
    #[serde(flatten)]
    pub performance: FirmPerformance,
}

/// Scale values to `[0, 1]` by `(x - min) / (max - min)`. When every value
/// is the same the range is zero and all values map to 0.
pub fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let (mut min, mut max) = (f64::MAX, f64::MIN);
    for v in values {
        min = min.min(*v);
        max = max.max(*v);
    }
    let range = max - min;
    values
        .iter()
        .map(|v| {
            if range.abs() < f64::EPSILON {
                0.0
            } else {
                ((v - min) / range).clamp(0.0, 1.0)
            }
        })
        .collect()
}

/// Attach normalized metrics and the composite score. Output order matches
/// the input order.
pub fn score(firms: &[FirmAggregate]) -> Vec<FirmPerformance> {
    let balance = min_max_normalize(&firms.iter().map(|f| f.total_balance_quantity).collect::<Vec<_>>());
    let rejections = min_max_normalize(&firms.iter().map(|f| f.total_rejection_events).collect::<Vec<_>>());
    let days = min_max_normalize(&firms.iter().map(|f| f.average_days_for_completion).collect::<Vec<_>>());

    firms
        .iter()
        .enumerate()
        .map(|(i, f)| FirmPerformance {
            firm: f.firm.clone(),
            total_balance_quantity: f.total_balance_quantity,
            total_rejection_events: f.total_rejection_events,
            average_days_for_completion: f.average_days_for_completion,
            normalized_balance_quantity: balance[i],
            normalized_rejection_events: rejections[i],
            normalized_days_for_completion: days[i],
            ranking_score: (1.0 - balance[i]) + (1.0 - rejections[i]) + (1.0 - days[i]),
        })
        .collect()
}

/// Sort by descending score and assign 1-based ranks. The sort is stable,
/// so equal scores keep their input order.
pub fn rank(performance: &[FirmPerformance]) -> Vec<RankedFirm> {
    let mut sorted = performance.to_vec();
    sorted.sort_by(|a, b| {
        b.ranking_score
            .partial_cmp(&a.ranking_score)
            .unwrap_or(Ordering::Equal)
    });
    sorted
        .into_iter()
        .enumerate()
        .map(|(idx, performance)| RankedFirm {
            rank: idx + 1,
            performance,
        })
        .collect()
}
