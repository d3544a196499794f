// Dashboard builders: run one pipeline over a loaded workbook and return the
// ordered display artifacts. Nothing here prints; rendering lives in
// `output`.
use crate::aggregate::{self, MatchedItem, MovementRow};
use crate::depletion;
use crate::error::{DashboardError, Result};
use crate::loader::{self, OPENING_STOCK_SHEET, STOCK_MOVEMENT_SHEET};
use crate::ranking;
use crate::types::{
    Artifact, Axis, AxisSide, ChartKind, ChartSpec, Dashboard, FirmPerformanceRow, Mark,
    OpeningStockRecord, RankedFirmDetailRow, RankedFirmRow, Series, SummaryRow, TableArtifact,
    TickFormat, Workbook, YearsRow,
};
use crate::util::{format_int, format_number, format_percent, format_quantity};
use tracing::{debug, info, warn};

pub const INVENTORY_TITLE: &str = "Inventory Stock Movement Analysis";
pub const PROCUREMENT_TITLE: &str = "Procurement Progress Dashboard";

/// Row limits for the preview and ranking tables.
#[derive(Debug, Clone)]
pub struct Options {
    /// `None` shows whole sheets in the inventory previews; the procurement
    /// preview falls back to five rows.
    pub preview_rows: Option<usize>,
    pub top: usize,
    pub detailed: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            preview_rows: None,
            top: 5,
            detailed: 3,
        }
    }
}

const DEFAULT_PROCUREMENT_PREVIEW: usize = 5;

fn notice(message: impl Into<String>) -> Artifact {
    Artifact::Notice {
        message: message.into(),
    }
}

fn missing_sheet_notice(sheet: &str) -> Artifact {
    let err = DashboardError::MissingSheet {
        sheet: sheet.to_string(),
    };
    warn!(%err, "section skipped");
    notice(format!("{err}; this section is skipped"))
}

fn plain_axis(label: &str, side: AxisSide) -> Axis {
    Axis {
        label: label.to_string(),
        side,
        ticks: TickFormat::Plain,
        range: None,
    }
}

pub fn build_inventory_dashboard(workbook: &Workbook, opts: &Options) -> Result<Dashboard> {
    let opening_sheet = workbook.sheet(OPENING_STOCK_SHEET);
    let movement_sheet = workbook.sheet(STOCK_MOVEMENT_SHEET);

    // Validate both sheets before building anything.
    let opening = opening_sheet.map(loader::opening_stock).transpose()?;
    let movements = movement_sheet.map(loader::stock_movements).transpose()?;

    let mut dashboard = Dashboard::new(INVENTORY_TITLE);

    match (opening_sheet, &opening) {
        (Some(sheet), Some(stock)) => {
            dashboard.artifacts.push(Artifact::Table(TableArtifact::from_sheet(
                "Opening Stock Overview",
                sheet,
                opts.preview_rows,
            )));
            dashboard.artifacts.push(Artifact::Chart(opening_stock_chart(stock)));
        }
        _ => dashboard.artifacts.push(missing_sheet_notice(OPENING_STOCK_SHEET)),
    }

    let (Some(sheet), Some(movements)) = (movement_sheet, movements) else {
        dashboard.artifacts.push(missing_sheet_notice(STOCK_MOVEMENT_SHEET));
        return Ok(dashboard);
    };
    dashboard.artifacts.push(Artifact::Table(TableArtifact::from_sheet(
        "Stock Movement Overview",
        sheet,
        opts.preview_rows,
    )));

    let merged = aggregate::movement_totals(&movements);
    info!(items = merged.len(), transactions = movements.len(), "stock movement aggregated");
    dashboard.artifacts.push(Artifact::Chart(movement_chart(&merged)));

    let stock: &[OpeningStockRecord] = opening.as_deref().unwrap_or(&[]);
    let matched = aggregate::matched_items(&merged, stock);
    debug!(matched = matched.len(), "balanced items detected");
    if !matched.is_empty() {
        if opening.is_some() {
            dashboard.artifacts.push(Artifact::Chart(balanced_items_chart(&matched)));
        } else {
            dashboard.artifacts.push(notice(format!(
                "{} items have equal receipt and issue quantities, but the '{}' sheet is missing; balanced-items chart skipped",
                matched.len(),
                OPENING_STOCK_SHEET
            )));
        }
    }

    let projection = depletion::project(stock, &merged);
    let finite = depletion::finite_by_years(&projection);
    debug!(
        items = projection.len(),
        finite = finite.len(),
        "depletion projected"
    );
    let rows: Vec<YearsRow> = finite
        .iter()
        .map(|r| YearsRow {
            item_name: r.item_name.clone(),
            years_sufficient: r.years_sufficient.to_string(),
        })
        .collect();
    dashboard.artifacts.push(Artifact::Table(TableArtifact::from_rows(
        "Years Stock Will Last (Doubling Issue Rate)",
        &rows,
    )));

    Ok(dashboard)
}

fn opening_stock_chart(stock: &[OpeningStockRecord]) -> ChartSpec {
    let sorted = aggregate::sort_by_opening_balance(stock);
    ChartSpec {
        title: "Opening Stock".to_string(),
        kind: ChartKind::Bar,
        categories: sorted.iter().map(|s| s.item_name.clone()).collect(),
        series: vec![Series {
            name: "Opening Balance".to_string(),
            mark: Mark::Bar,
            axis: AxisSide::Primary,
            values: sorted.iter().map(|s| s.opening_balance.unwrap_or(0.0)).collect(),
        }],
        axes: vec![plain_axis("Opening Balance", AxisSide::Primary)],
        labels: Vec::new(),
    }
}

fn movement_chart(merged: &[MovementRow]) -> ChartSpec {
    let sorted = aggregate::sort_by_received(merged);
    ChartSpec {
        title: "Receipt & Issue Activity".to_string(),
        kind: ChartKind::GroupedBar,
        categories: sorted.iter().map(|r| r.item_name.clone()).collect(),
        series: vec![
            Series {
                name: "Received".to_string(),
                mark: Mark::Bar,
                axis: AxisSide::Primary,
                values: sorted.iter().map(|r| r.quantity_received).collect(),
            },
            Series {
                name: "Issued".to_string(),
                mark: Mark::Bar,
                axis: AxisSide::Primary,
                values: sorted.iter().map(|r| r.quantity_issued).collect(),
            },
        ],
        axes: vec![plain_axis("Quantity", AxisSide::Primary)],
        labels: Vec::new(),
    }
}

fn balanced_items_chart(matched: &[MatchedItem]) -> ChartSpec {
    ChartSpec {
        title: "Opening Stock of Balanced Items".to_string(),
        kind: ChartKind::Pie,
        categories: matched.iter().map(|m| m.item_name.clone()).collect(),
        series: vec![Series {
            name: "Opening Balance".to_string(),
            mark: Mark::Slice,
            axis: AxisSide::Primary,
            values: matched.iter().map(|m| m.opening_balance).collect(),
        }],
        axes: Vec::new(),
        labels: matched.iter().map(|m| format_percent(m.share_pct)).collect(),
    }
}

pub fn build_procurement_dashboard(workbook: &Workbook, opts: &Options) -> Result<Dashboard> {
    let sheet = workbook.first_sheet().ok_or(DashboardError::EmptyWorkbook)?;
    let records = loader::procurement_records(sheet)?;
    info!(sheet = %sheet.name, orders = records.len(), "procurement records loaded");

    let mut dashboard = Dashboard::new(PROCUREMENT_TITLE);
    dashboard.artifacts.push(Artifact::Table(TableArtifact::from_sheet(
        "Data Preview",
        sheet,
        Some(opts.preview_rows.unwrap_or(DEFAULT_PROCUREMENT_PREVIEW)),
    )));

    let summary = aggregate::procurement_summary(&records);
    let summary_rows = vec![
        ("Total Firms Participated", format_int(summary.total_firms)),
        ("Total Amount Allocated (PKR)", format_number(summary.total_amount_allocated, 2)),
        ("Total Items Demanded", format_quantity(summary.total_items_demanded)),
        ("Total Quantity Demanded", format_quantity(summary.total_quantity_demanded)),
        ("Total Items Delivered", format_quantity(summary.total_items_delivered)),
        ("Total Quantities Delivered", format_quantity(summary.total_quantities_delivered)),
        ("Total Bal Items", format_quantity(summary.total_bal_items)),
        ("Total Bal Quantities", format_quantity(summary.total_bal_quantities)),
    ]
    .into_iter()
    .map(|(metric, value)| SummaryRow {
        metric: metric.to_string(),
        value,
    })
    .collect::<Vec<_>>();
    dashboard
        .artifacts
        .push(Artifact::Table(TableArtifact::from_rows("Summary Table", &summary_rows)));

    let firms = aggregate::firm_performance(&records);
    let preview = opts.preview_rows.unwrap_or(DEFAULT_PROCUREMENT_PREVIEW);
    let perf_rows: Vec<FirmPerformanceRow> = firms
        .iter()
        .take(preview)
        .map(|f| FirmPerformanceRow {
            firm: f.firm.clone(),
            total_balance_quantity: format_quantity(f.total_balance_quantity),
            total_rejection_events: format_quantity(f.total_rejection_events),
            average_days_for_completion: format_number(f.average_days_for_completion, 2),
        })
        .collect();
    dashboard
        .artifacts
        .push(Artifact::Table(TableArtifact::from_rows("Firm Performance", &perf_rows)));

    if firms.len() < 2 {
        warn!(firms = firms.len(), "ranking needs at least two firms to be meaningful");
    }
    let ranked = ranking::rank(&ranking::score(&firms));
    let top_rows: Vec<RankedFirmRow> = ranked
        .iter()
        .take(opts.top)
        .map(|r| RankedFirmRow {
            rank: r.rank,
            firm: r.performance.firm.clone(),
            ranking_score: format_number(r.performance.ranking_score, 4),
        })
        .collect();
    dashboard
        .artifacts
        .push(Artifact::Table(TableArtifact::from_rows("Top Ranked Firms", &top_rows)));

    let detail_rows: Vec<RankedFirmDetailRow> = ranked
        .iter()
        .take(opts.detailed)
        .map(|r| RankedFirmDetailRow {
            rank: r.rank,
            firm: r.performance.firm.clone(),
            total_balance_quantity: format_quantity(r.performance.total_balance_quantity),
            total_rejection_events: format_quantity(r.performance.total_rejection_events),
            average_days_for_completion: format_number(r.performance.average_days_for_completion, 2),
            ranking_score: format_number(r.performance.ranking_score, 4),
        })
        .collect();
    let detail_title = format!("Top {} Firms - Detailed", opts.detailed);
    dashboard
        .artifacts
        .push(Artifact::Table(TableArtifact::from_rows(&detail_title, &detail_rows)));

    let delivery = aggregate::firm_delivery(&records);
    dashboard.artifacts.push(Artifact::Chart(ChartSpec {
        title: "Summary - Delivery Progress".to_string(),
        kind: ChartKind::DualAxis,
        categories: delivery.iter().map(|d| d.firm.clone()).collect(),
        series: vec![
            Series {
                name: "Total PO Amount (PKR)".to_string(),
                mark: Mark::Bar,
                axis: AxisSide::Primary,
                values: delivery.iter().map(|d| d.total_po_amount).collect(),
            },
            Series {
                name: "Average Delivery Percentage".to_string(),
                mark: Mark::Line,
                axis: AxisSide::Secondary,
                values: delivery.iter().map(|d| d.average_delivery_percentage).collect(),
            },
        ],
        axes: vec![
            Axis {
                label: "Total PO Amount (PKR)".to_string(),
                side: AxisSide::Primary,
                ticks: TickFormat::Millions,
                range: None,
            },
            Axis {
                label: "Average Delivery Percentage".to_string(),
                side: AxisSide::Secondary,
                ticks: TickFormat::Percent,
                range: Some((0.0, 100.0)),
            },
        ],
        labels: Vec::new(),
    }));

    Ok(dashboard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_workbook_bytes;
    use crate::test_support::xlsx;

    fn inventory_fixture() -> Workbook {
        load_workbook_bytes(xlsx(&[
            (
                "Opening Stock",
                vec![vec!["Item Name", "Opening Balance"], vec!["A", "100"], vec!["B", "50"]],
            ),
            (
                "Stock Movement",
                vec![
                    vec!["Item Name", "Voucher Type", "Quantity"],
                    vec!["A", "RV", "40"],
                    vec!["A", "IV", "20"],
                    vec!["B", "IV", "50"],
                ],
            ),
        ]))
        .unwrap()
    }

    fn procurement_fixture(rows: Vec<Vec<&str>>) -> Workbook {
        let mut sheet = vec![vec![
            "Contractor/ Firm",
            "PO Amount (PKR)",
            "Items Demanded",
            "Quantity Demanded",
            "Items Delivered",
            "Quantity Delivered",
            "Number of Rejection Events",
            "Number of Days for Completion of Order",
        ]];
        sheet.extend(rows);
        load_workbook_bytes(xlsx(&[("Orders", sheet)])).unwrap()
    }

    #[test]
    fn inventory_end_to_end() {
        let dash = build_inventory_dashboard(&inventory_fixture(), &Options::default()).unwrap();

        assert_eq!(dash.title, INVENTORY_TITLE);
        assert!(dash.notices().is_empty());
        assert_eq!(dash.table("Opening Stock Overview").unwrap().rows.len(), 2);

        let opening = dash.chart("Opening Stock").unwrap();
        assert_eq!(opening.categories, vec!["A", "B"]);
        assert_eq!(opening.series[0].values, vec![100.0, 50.0]);

        let activity = dash.chart("Receipt & Issue Activity").unwrap();
        assert_eq!(activity.kind, ChartKind::GroupedBar);
        assert_eq!(activity.categories, vec!["A", "B"]);
        assert_eq!(activity.series[0].values, vec![40.0, 0.0]);
        assert_eq!(activity.series[1].values, vec![20.0, 50.0]);

        assert!(dash.chart("Opening Stock of Balanced Items").is_none());

        let years = dash.table("Years Stock Will Last (Doubling Issue Rate)").unwrap();
        assert_eq!(years.columns, vec!["Item Name", "Years_Sufficient"]);
        assert_eq!(
            years.rows,
            vec![vec!["B".to_string(), "1".to_string()], vec!["A".to_string(), "3".to_string()]]
        );
    }

    #[test]
    fn balanced_items_produce_pie_with_shares() {
        let wb = load_workbook_bytes(xlsx(&[
            (
                "Opening Stock",
                vec![
                    vec!["Item Name", "Opening Balance"],
                    vec!["Bolts", "30"],
                    vec!["Nuts", "10"],
                    vec!["Idle", "5"],
                ],
            ),
            (
                "Stock Movement",
                vec![
                    vec!["Item Name", "Voucher Type", "Quantity"],
                    vec!["Bolts", "RV", "12"],
                    vec!["Nuts", "RV", "3"],
                    vec!["Bolts", "IV", "12"],
                    vec!["Nuts", "IV", "3"],
                ],
            ),
        ]))
        .unwrap();
        let dash = build_inventory_dashboard(&wb, &Options::default()).unwrap();

        let pie = dash.chart("Opening Stock of Balanced Items").unwrap();
        assert_eq!(pie.kind, ChartKind::Pie);
        assert_eq!(pie.categories, vec!["Bolts", "Nuts"]);
        assert_eq!(pie.series[0].values, vec![30.0, 10.0]);
        assert_eq!(pie.labels, vec!["75.0%", "25.0%"]);

        // Idle is never issued, so it lasts forever and is left out.
        let years = dash.table("Years Stock Will Last (Doubling Issue Rate)").unwrap();
        let items: Vec<&str> = years.rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(items, vec!["Bolts", "Nuts"]);
    }

    #[test]
    fn missing_movement_sheet_is_a_visible_notice() {
        let wb = load_workbook_bytes(xlsx(&[(
            "Opening Stock",
            vec![vec!["Item Name", "Opening Balance"], vec!["A", "1"]],
        )]))
        .unwrap();
        let dash = build_inventory_dashboard(&wb, &Options::default()).unwrap();
        assert!(dash.table("Opening Stock Overview").is_some());
        let notices = dash.notices();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].contains("Stock Movement"));
        assert!(matches!(dash.artifacts.last(), Some(Artifact::Notice { .. })));
    }

    #[test]
    fn missing_opening_sheet_still_projects_movement() {
        let wb = load_workbook_bytes(xlsx(&[(
            "Stock Movement",
            vec![vec!["Item Name", "Voucher Type", "Quantity"], vec!["A", "IV", "5"]],
        )]))
        .unwrap();
        let dash = build_inventory_dashboard(&wb, &Options::default()).unwrap();
        assert!(matches!(dash.artifacts[0], Artifact::Notice { .. }));
        let years = dash.table("Years Stock Will Last (Doubling Issue Rate)").unwrap();
        assert_eq!(years.rows, vec![vec!["A".to_string(), "0".to_string()]]);
    }

    #[test]
    fn missing_column_aborts_the_inventory_run() {
        let wb = load_workbook_bytes(xlsx(&[
            (
                "Opening Stock",
                vec![vec!["Item Name", "Opening Balance"], vec!["A", "1"]],
            ),
            ("Stock Movement", vec![vec!["Item Name", "Qty"], vec!["A", "5"]]),
        ]))
        .unwrap();
        let err = build_inventory_dashboard(&wb, &Options::default()).unwrap_err();
        assert!(matches!(
            err,
            DashboardError::MissingColumn { ref column, .. } if column == "Voucher Type"
        ));
    }

    #[test]
    fn preview_rows_limit_raw_tables() {
        let opts = Options {
            preview_rows: Some(1),
            ..Options::default()
        };
        let dash = build_inventory_dashboard(&inventory_fixture(), &opts).unwrap();
        assert_eq!(dash.table("Stock Movement Overview").unwrap().rows.len(), 1);
    }

    #[test]
    fn procurement_end_to_end() {
        let wb = procurement_fixture(vec![
            vec!["Acme", "2000000", "4", "100", "3", "80", "2", "30"],
            vec!["Beta", "1000000", "2", "50", "2", "50", "0", "10"],
            vec!["Acme", "500000", "1", "20", "1", "20", "1", "50"],
        ]);
        let dash = build_procurement_dashboard(&wb, &Options::default()).unwrap();
        assert_eq!(dash.title, PROCUREMENT_TITLE);

        let summary = dash.table("Summary Table").unwrap();
        let values: Vec<(&str, &str)> = summary
            .rows
            .iter()
            .map(|r| (r[0].as_str(), r[1].as_str()))
            .collect();
        assert_eq!(values[0], ("Total Firms Participated", "2"));
        assert_eq!(values[1], ("Total Amount Allocated (PKR)", "3,500,000.00"));
        assert_eq!(values[7], ("Total Bal Quantities", "20"));

        let top = dash.table("Top Ranked Firms").unwrap();
        assert_eq!(top.columns, vec!["Rank", "Contractor/ Firm", "Ranking_Score"]);
        assert_eq!(top.rows[0], vec!["1", "Beta", "3.0000"]);
        assert_eq!(top.rows[1], vec!["2", "Acme", "0.0000"]);

        let chart = dash.chart("Summary - Delivery Progress").unwrap();
        assert_eq!(chart.kind, ChartKind::DualAxis);
        assert_eq!(chart.categories, vec!["Acme", "Beta"]);
        assert_eq!(chart.series[0].values, vec![2_500_000.0, 1_000_000.0]);
        assert_eq!(chart.series[1].values, vec![90.0, 100.0]);
        assert_eq!(chart.axes[1].range, Some((0.0, 100.0)));
    }

    #[test]
    fn tied_firms_share_top_score_in_upload_order() {
        let wb = procurement_fixture(vec![
            vec!["Zeta", "100", "1", "10", "1", "5", "1", "20"],
            vec!["Alpha", "100", "1", "10", "1", "5", "1", "20"],
        ]);
        let dash = build_procurement_dashboard(&wb, &Options::default()).unwrap();
        let top = dash.table("Top Ranked Firms").unwrap();
        assert_eq!(top.rows[0], vec!["1", "Zeta", "3.0000"]);
        assert_eq!(top.rows[1], vec!["2", "Alpha", "3.0000"]);
        assert!(dash.table("Top 3 Firms - Detailed").is_some());
    }

    #[test]
    fn procurement_previews_default_to_five_rows() {
        let wb = procurement_fixture(vec![
            vec!["F1", "100", "1", "10", "1", "9", "0", "10"],
            vec!["F2", "100", "1", "10", "1", "8", "1", "20"],
            vec!["F3", "100", "1", "10", "1", "7", "2", "30"],
            vec!["F4", "100", "1", "10", "1", "6", "3", "40"],
            vec!["F5", "100", "1", "10", "1", "5", "4", "50"],
            vec!["F6", "100", "1", "10", "1", "4", "5", "60"],
            vec!["F7", "100", "1", "10", "1", "3", "6", "70"],
        ]);
        let opts = Options {
            detailed: 4,
            ..Options::default()
        };
        let dash = build_procurement_dashboard(&wb, &opts).unwrap();

        assert_eq!(dash.table("Data Preview").unwrap().rows.len(), 5);
        let perf = dash.table("Firm Performance").unwrap();
        assert_eq!(perf.rows.len(), 5);
        assert_eq!(perf.rows[4][0], "F5");
        assert_eq!(dash.table("Top Ranked Firms").unwrap().rows.len(), 5);

        assert!(dash.table("Top 3 Firms - Detailed").is_none());
        let detailed = dash.table("Top 4 Firms - Detailed").unwrap();
        assert_eq!(detailed.rows.len(), 4);
        assert_eq!(detailed.rows[0][1], "F1");
        assert_eq!(detailed.columns.len(), 6);

        // The delivery chart covers every firm, not just the preview.
        assert_eq!(dash.chart("Summary - Delivery Progress").unwrap().categories.len(), 7);
    }

    #[test]
    fn procurement_requires_every_column() {
        let wb = load_workbook_bytes(xlsx(&[(
            "Orders",
            vec![vec!["Contractor/ Firm", "PO Amount (PKR)"], vec!["Acme", "1"]],
        )]))
        .unwrap();
        let err = build_procurement_dashboard(&wb, &Options::default()).unwrap_err();
        assert!(matches!(err, DashboardError::MissingColumn { .. }));
    }

    #[test]
    fn empty_workbook_is_rejected() {
        let err = build_procurement_dashboard(&Workbook::default(), &Options::default()).unwrap_err();
        assert!(matches!(err, DashboardError::EmptyWorkbook));
    }
}
