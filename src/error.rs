use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("no file provided")]
    NoFileProvided,

    #[error("failed to open workbook {path}: {source}")]
    Workbook {
        path: String,
        #[source]
        source: calamine::Error,
    },

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("workbook contains no sheets")]
    EmptyWorkbook,

    #[error("sheet '{sheet}' not found in workbook")]
    MissingSheet { sheet: String },

    #[error("sheet '{sheet}' is missing required column '{column}'")]
    MissingColumn { sheet: String, column: String },

    #[error("sheet '{sheet}' data row {row}: column '{column}' has non-numeric value '{value}'")]
    InvalidNumber {
        sheet: String,
        row: usize,
        column: String,
        value: String,
    },
}

pub type Result<T> = std::result::Result<T, DashboardError>;
