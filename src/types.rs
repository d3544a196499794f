use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;
use tabled::Tabled;

use crate::util::plain_number;

/// A single spreadsheet cell after ingestion.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    DateTime(NaiveDateTime),
    Error(String),
}

impl Cell {
    /// Text used when the cell is a grouping key (item or firm name).
    /// Empty and error cells carry no key.
    pub fn as_key(&self) -> Option<String> {
        match self {
            Cell::Text(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            Cell::Empty | Cell::Error(_) => None,
            other => Some(other.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Number(n) => f.write_str(&plain_number(*n)),
            Cell::Text(s) => f.write_str(s),
            Cell::Bool(b) => f.write_str(if *b { "True" } else { "False" }),
            Cell::DateTime(dt) => {
                if dt.time() == chrono::NaiveTime::MIN {
                    write!(f, "{}", dt.format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S"))
                }
            }
            Cell::Error(e) => f.write_str(e),
        }
    }
}

/// One worksheet: a header row plus data rows. Rows may be shorter than
/// the header when trailing cells are blank.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    /// 1-based position of each kept row below the header in the source
    /// sheet, counting the blank rows that were dropped.
    pub row_numbers: Vec<usize>,
}

impl Table {
    pub fn cell<'a>(row: &'a [Cell], idx: usize) -> &'a Cell {
        const EMPTY: &Cell = &Cell::Empty;
        row.get(idx).unwrap_or(EMPTY)
    }

    /// Data row number of `rows[i]` as a user would count it in the sheet.
    pub fn row_number(&self, i: usize) -> usize {
        self.row_numbers.get(i).copied().unwrap_or(i + 1)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub sheets: Vec<Table>,
}

impl Workbook {
    pub fn sheet(&self, name: &str) -> Option<&Table> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn first_sheet(&self) -> Option<&Table> {
        self.sheets.first()
    }
}

// ---------------------------------------------------------------------------
// Typed records extracted from the sheets.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct OpeningStockRecord {
    pub item_name: String,
    pub opening_balance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoucherType {
    Receipt,
    Issue,
    Other(String),
}

impl VoucherType {
    pub fn parse(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "RV" => VoucherType::Receipt,
            "IV" => VoucherType::Issue,
            other => VoucherType::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovementRecord {
    pub item_name: Option<String>,
    pub voucher_type: VoucherType,
    pub quantity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProcurementRecord {
    pub firm: Option<String>,
    pub po_amount: Option<f64>,
    pub items_demanded: Option<f64>,
    pub quantity_demanded: Option<f64>,
    pub items_delivered: Option<f64>,
    pub quantity_delivered: Option<f64>,
    pub rejection_events: Option<f64>,
    pub completion_days: Option<f64>,
}

impl ProcurementRecord {
    /// Demanded minus delivered; missing when either side is missing.
    pub fn balance_quantity(&self) -> Option<f64> {
        Some(self.quantity_demanded? - self.quantity_delivered?)
    }

    /// Delivered as a percentage of demanded. Rows with nothing demanded
    /// have no meaningful percentage.
    pub fn delivery_percentage(&self) -> Option<f64> {
        let demanded = self.quantity_demanded?;
        let delivered = self.quantity_delivered?;
        if demanded <= 0.0 {
            return None;
        }
        Some(delivered / demanded * 100.0)
    }
}

// ---------------------------------------------------------------------------
// Display rows. Values are pre-formatted strings, as rendered in tables.
// ---------------------------------------------------------------------------

#[derive(Debug, Tabled, Clone)]
pub struct YearsRow {
    #[tabled(rename = "Item Name")]
    pub item_name: String,
    #[tabled(rename = "Years_Sufficient")]
    pub years_sufficient: String,
}

#[derive(Debug, Tabled, Clone)]
pub struct SummaryRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Tabled, Clone)]
pub struct FirmPerformanceRow {
    #[tabled(rename = "Contractor/ Firm")]
    pub firm: String,
    #[tabled(rename = "Total_Balance_Quantity")]
    pub total_balance_quantity: String,
    #[tabled(rename = "Total_Rejection_Events")]
    pub total_rejection_events: String,
    #[tabled(rename = "Average_Days_for_Completion")]
    pub average_days_for_completion: String,
}

#[derive(Debug, Tabled, Clone)]
pub struct RankedFirmRow {
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[tabled(rename = "Contractor/ Firm")]
    pub firm: String,
    #[tabled(rename = "Ranking_Score")]
    pub ranking_score: String,
}

#[derive(Debug, Tabled, Clone)]
pub struct RankedFirmDetailRow {
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[tabled(rename = "Contractor/ Firm")]
    pub firm: String,
    #[tabled(rename = "Total_Balance_Quantity")]
    pub total_balance_quantity: String,
    #[tabled(rename = "Total_Rejection_Events")]
    pub total_rejection_events: String,
    #[tabled(rename = "Average_Days_for_Completion")]
    pub average_days_for_completion: String,
    #[tabled(rename = "Ranking_Score")]
    pub ranking_score: String,
}

// ---------------------------------------------------------------------------
// Display artifacts handed to the renderer.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableArtifact {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableArtifact {
    pub fn from_rows<T: Tabled>(title: &str, rows: &[T]) -> Self {
        TableArtifact {
            title: title.to_string(),
            columns: T::headers().into_iter().map(|h| h.into_owned()).collect(),
            rows: rows
                .iter()
                .map(|r| r.fields().into_iter().map(|f| f.into_owned()).collect())
                .collect(),
        }
    }

    /// Preview of a raw sheet, limited to the first `limit` rows.
    pub fn from_sheet(title: &str, table: &Table, limit: Option<usize>) -> Self {
        let take = limit.unwrap_or(table.rows.len());
        TableArtifact {
            title: title.to_string(),
            columns: table.headers.clone(),
            rows: table
                .rows
                .iter()
                .take(take)
                .map(|row| {
                    (0..table.headers.len())
                        .map(|i| Table::cell(row, i).to_string())
                        .collect()
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    GroupedBar,
    Pie,
    DualAxis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mark {
    Bar,
    Line,
    Slice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisSide {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TickFormat {
    Plain,
    Millions,
    Percent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    pub label: String,
    pub side: AxisSide,
    pub ticks: TickFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub mark: Mark,
    pub axis: AxisSide,
    pub values: Vec<f64>,
}

/// Data for one chart, already sorted and filtered. `categories[i]`
/// pairs with `values[i]` of every series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub title: String,
    pub kind: ChartKind,
    pub categories: Vec<String>,
    pub series: Vec<Series>,
    pub axes: Vec<Axis>,
    /// Per-category labels drawn on the chart (pie percentages).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Artifact {
    Notice { message: String },
    Table(TableArtifact),
    Chart(ChartSpec),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub title: String,
    pub artifacts: Vec<Artifact>,
}

impl Dashboard {
    pub fn new(title: &str) -> Self {
        Dashboard {
            title: title.to_string(),
            artifacts: Vec::new(),
        }
    }
}

#[cfg(test)]
impl Dashboard {
    pub fn table(&self, title: &str) -> Option<&TableArtifact> {
        self.artifacts.iter().find_map(|a| match a {
            Artifact::Table(t) if t.title == title => Some(t),
            _ => None,
        })
    }

    pub fn chart(&self, title: &str) -> Option<&ChartSpec> {
        self.artifacts.iter().find_map(|a| match a {
            Artifact::Chart(c) if c.title == title => Some(c),
            _ => None,
        })
    }

    pub fn notices(&self) -> Vec<&str> {
        self.artifacts
            .iter()
            .filter_map(|a| match a {
                Artifact::Notice { message } => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }
}
