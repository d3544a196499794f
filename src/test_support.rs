// Builders for in-memory workbooks used across the test modules.
use rust_xlsxwriter::Workbook as XlsxWorkbook;

/// Build an xlsx file with the given sheets. Cells that parse as numbers
/// are written as numeric cells, empty strings are left blank. A leading
/// `'` forces a text cell, as typing it in Excel does.
pub fn xlsx(sheets: &[(&str, Vec<Vec<&str>>)]) -> Vec<u8> {
    let mut workbook = XlsxWorkbook::new();
    for (name, rows) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*name).unwrap();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                if let Some(text) = value.strip_prefix('\'') {
                    worksheet.write_string(r as u32, c as u16, text).unwrap();
                    continue;
                }
                match value.parse::<f64>() {
                    Ok(n) => worksheet.write_number(r as u32, c as u16, n).unwrap(),
                    Err(_) => worksheet.write_string(r as u32, c as u16, *value).unwrap(),
                };
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}
