use crate::error::{DashboardError, Result};
use crate::types::{Cell, MovementRecord, OpeningStockRecord, ProcurementRecord, Table, VoucherType, Workbook};
use crate::util::{parse_datetime_safe, parse_f64_safe};
use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use csv::ReaderBuilder;
use std::collections::HashSet;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use tracing::{debug, info, warn};

pub const OPENING_STOCK_SHEET: &str = "Opening Stock";
pub const STOCK_MOVEMENT_SHEET: &str = "Stock Movement";

pub const ITEM_NAME: &str = "Item Name";
pub const OPENING_BALANCE: &str = "Opening Balance";
pub const VOUCHER_TYPE: &str = "Voucher Type";
pub const QUANTITY: &str = "Quantity";

pub const FIRM: &str = "Contractor/ Firm";
pub const PO_AMOUNT: &str = "PO Amount (PKR)";
pub const ITEMS_DEMANDED: &str = "Items Demanded";
pub const QUANTITY_DEMANDED: &str = "Quantity Demanded";
pub const ITEMS_DELIVERED: &str = "Items Delivered";
pub const QUANTITY_DELIVERED: &str = "Quantity Delivered";
pub const REJECTION_EVENTS: &str = "Number of Rejection Events";
pub const COMPLETION_DAYS: &str = "Number of Days for Completion of Order";

/// Open a workbook from disk. `.csv` files are read as a workbook with a
/// single sheet named after the file stem; everything else goes through
/// calamine's format detection.
pub fn load_workbook(path: &Path) -> Result<Workbook> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        return load_csv(path);
    }
    let origin = path.display().to_string();
    let mut sheets = open_workbook_auto(path).map_err(|source| DashboardError::Workbook {
        path: origin.clone(),
        source,
    })?;
    read_sheets(&mut sheets, &origin)
}

/// Open a workbook from an in-memory upload.
pub fn load_workbook_bytes(bytes: Vec<u8>) -> Result<Workbook> {
    let origin = "<upload>";
    let mut sheets =
        open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|source| DashboardError::Workbook {
            path: origin.to_string(),
            source,
        })?;
    read_sheets(&mut sheets, origin)
}

fn read_sheets<RS: Read + Seek>(sheets: &mut Sheets<RS>, origin: &str) -> Result<Workbook> {
    let names = sheets.sheet_names().to_owned();
    let mut workbook = Workbook::default();
    for name in names {
        let range = sheets
            .worksheet_range(&name)
            .map_err(|source| DashboardError::Workbook {
                path: format!("{origin}#{name}"),
                source,
            })?;
        let table = range_to_table(&name, &range);
        debug!(sheet = %name, rows = table.rows.len(), columns = table.headers.len(), "sheet parsed");
        workbook.sheets.push(table);
    }
    info!(source = origin, sheets = workbook.sheets.len(), "workbook loaded");
    Ok(workbook)
}

fn range_to_table(name: &str, range: &Range<Data>) -> Table {
    let mut rows = range
        .rows()
        .map(|r| r.iter().map(data_to_cell).collect::<Vec<_>>())
        .skip_while(|r| r.iter().all(Cell::is_empty));
    let headers: Vec<String> = rows
        .next()
        .map(|r| r.iter().enumerate().map(|(i, c)| header_name(i, &c.to_string())).collect())
        .unwrap_or_default();
    let (row_numbers, rows): (Vec<usize>, Vec<Vec<Cell>>) = rows
        .enumerate()
        .filter(|(_, r)| !r.iter().all(Cell::is_empty))
        .map(|(i, r)| (i + 1, r))
        .unzip();
    Table {
        name: name.to_string(),
        headers,
        rows,
        row_numbers,
    }
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(Cell::DateTime)
            .unwrap_or(Cell::Number(dt.as_f64())),
        Data::DateTimeIso(s) => parse_datetime_safe(Some(s))
            .map(Cell::DateTime)
            .unwrap_or_else(|| Cell::Text(s.clone())),
        Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Error(format!("{e:?}")),
    }
}

fn header_name(idx: usize, raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        format!("Unnamed: {idx}")
    } else {
        trimmed.to_string()
    }
}

fn load_csv(path: &Path) -> Result<Workbook> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| header_name(i, h))
        .collect();
    let mut rows = Vec::new();
    let mut row_numbers = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        let row: Vec<Cell> = record.iter().map(csv_cell).collect();
        if row.iter().all(Cell::is_empty) {
            continue;
        }
        rows.push(row);
        row_numbers.push(i + 1);
    }
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Sheet1".to_string());
    info!(source = %path.display(), rows = rows.len(), "CSV loaded");
    Ok(Workbook {
        sheets: vec![Table {
            name,
            headers,
            rows,
            row_numbers,
        }],
    })
}

fn csv_cell(raw: &str) -> Cell {
    let s = raw.trim();
    if s.is_empty() {
        return Cell::Empty;
    }
    if let Some(n) = s.parse::<f64>().ok().filter(|n| n.is_finite()) {
        return Cell::Number(n);
    }
    parse_datetime_safe(Some(s))
        .map(Cell::DateTime)
        .unwrap_or_else(|| Cell::Text(s.to_string()))
}

// ---------------------------------------------------------------------------
// Typed extraction. Every required column is resolved before any row is
// read, so a missing column fails the whole sheet up front.
// ---------------------------------------------------------------------------

fn column(table: &Table, column: &str) -> Result<usize> {
    table
        .headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| DashboardError::MissingColumn {
            sheet: table.name.clone(),
            column: column.to_string(),
        })
}

fn number(table: &Table, row_no: usize, row: &[Cell], idx: usize) -> Result<Option<f64>> {
    let cell = Table::cell(row, idx);
    let value = match cell {
        Cell::Empty | Cell::Error(_) => return Ok(None),
        Cell::Text(s) if s.trim().is_empty() => return Ok(None),
        Cell::Number(n) => Some(*n),
        Cell::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Cell::Text(s) => parse_f64_safe(Some(s)),
        Cell::DateTime(_) => None,
    };
    value.map(Some).ok_or_else(|| DashboardError::InvalidNumber {
        sheet: table.name.clone(),
        row: row_no,
        column: table.headers[idx].clone(),
        value: cell.to_string(),
    })
}

pub fn opening_stock(table: &Table) -> Result<Vec<OpeningStockRecord>> {
    let item = column(table, ITEM_NAME)?;
    let balance = column(table, OPENING_BALANCE)?;

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(table.rows.len());
    for (i, row) in table.rows.iter().enumerate() {
        let Some(item_name) = Table::cell(row, item).as_key() else {
            debug!(row = table.row_number(i), "opening stock row without item name skipped");
            continue;
        };
        if !seen.insert(item_name.clone()) {
            warn!(item = %item_name, "duplicate item in opening stock; first entry is used for lookups");
        }
        records.push(OpeningStockRecord {
            item_name,
            opening_balance: number(table, table.row_number(i), row, balance)?,
        });
    }
    Ok(records)
}

pub fn stock_movements(table: &Table) -> Result<Vec<MovementRecord>> {
    let item = column(table, ITEM_NAME)?;
    let voucher = column(table, VOUCHER_TYPE)?;
    let quantity = column(table, QUANTITY)?;

    table
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let voucher_type = VoucherType::parse(&Table::cell(row, voucher).to_string());
            if let VoucherType::Other(code) = &voucher_type {
                debug!(row = table.row_number(i), voucher = %code, "voucher type ignored");
            }
            Ok(MovementRecord {
                item_name: Table::cell(row, item).as_key(),
                voucher_type,
                quantity: number(table, table.row_number(i), row, quantity)?,
            })
        })
        .collect()
}

pub fn procurement_records(table: &Table) -> Result<Vec<ProcurementRecord>> {
    let firm = column(table, FIRM)?;
    let po_amount = column(table, PO_AMOUNT)?;
    let items_demanded = column(table, ITEMS_DEMANDED)?;
    let quantity_demanded = column(table, QUANTITY_DEMANDED)?;
    let items_delivered = column(table, ITEMS_DELIVERED)?;
    let quantity_delivered = column(table, QUANTITY_DELIVERED)?;
    let rejection_events = column(table, REJECTION_EVENTS)?;
    let completion_days = column(table, COMPLETION_DAYS)?;

    table
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let n = table.row_number(i);
            Ok(ProcurementRecord {
                firm: Table::cell(row, firm).as_key(),
                po_amount: number(table, n, row, po_amount)?,
                items_demanded: number(table, n, row, items_demanded)?,
                quantity_demanded: number(table, n, row, quantity_demanded)?,
                items_delivered: number(table, n, row, items_delivered)?,
                quantity_delivered: number(table, n, row, quantity_delivered)?,
                rejection_events: number(table, n, row, rejection_events)?,
                completion_days: number(table, n, row, completion_days)?,
            })
        })
        .collect()
}
