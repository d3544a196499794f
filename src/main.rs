// Entry point and CLI flow.
//
// Each invocation loads one workbook, runs one dashboard pipeline over it
// and prints the resulting artifacts:
// - `inventory` analyzes the "Opening Stock" and "Stock Movement" sheets.
// - `procurement` analyzes the order rows on the first sheet.
mod aggregate;
mod dashboard;
mod depletion;
mod error;
mod loader;
mod output;
mod ranking;
#[cfg(test)]
mod test_support;
mod types;
mod util;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dashboard::Options;
use error::DashboardError;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use types::Workbook;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inventory and procurement dashboards from Excel workbooks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Opening stock, receipts vs. issues and years until stock depletion
    Inventory(InputArgs),
    /// Delivery summary and firm ranking
    Procurement(ProcurementArgs),
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Workbook to analyze (.xlsx, .xlsm, .xlsb, .xls, .ods or .csv); `-` reads a workbook from stdin
    file: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Table)]
    format: Format,

    /// Limit raw-sheet previews to this many rows
    #[arg(long)]
    preview_rows: Option<usize>,
}

#[derive(Args, Debug)]
struct ProcurementArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Number of firms in the ranking table
    #[arg(long, default_value_t = 5)]
    top: usize,

    /// Number of firms in the detailed ranking table
    #[arg(long, default_value_t = 3)]
    detailed: usize,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    /// Markdown tables
    Table,
    /// The full dashboard as JSON, for an external chart renderer
    Json,
}

#[derive(Clone, Copy, Debug)]
enum Pipeline {
    Inventory,
    Procurement,
}

/// Read the workbook named on the command line. A missing path or an empty
/// stdin upload is `NoFileProvided`.
fn read_input(file: Option<&Path>) -> error::Result<Workbook> {
    let path = file.ok_or(DashboardError::NoFileProvided)?;
    if path == Path::new("-") {
        let mut bytes = Vec::new();
        io::stdin().read_to_end(&mut bytes)?;
        if bytes.is_empty() {
            return Err(DashboardError::NoFileProvided);
        }
        return loader::load_workbook_bytes(bytes);
    }
    loader::load_workbook(path)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let (pipeline, input, opts) = match cli.command {
        Command::Inventory(input) => {
            let opts = Options {
                preview_rows: input.preview_rows,
                ..Options::default()
            };
            (Pipeline::Inventory, input, opts)
        }
        Command::Procurement(args) => {
            let opts = Options {
                preview_rows: args.input.preview_rows,
                top: args.top,
                detailed: args.detailed,
            };
            (Pipeline::Procurement, args.input, opts)
        }
    };

    let workbook = match read_input(input.file.as_deref()) {
        Ok(wb) => wb,
        Err(DashboardError::NoFileProvided) => {
            println!("Please upload an Excel file to begin.");
            return Ok(());
        }
        Err(e) => {
            return Err(e).with_context(|| {
                format!(
                    "failed to read {}",
                    input.file.as_deref().unwrap_or(Path::new("-")).display()
                )
            })
        }
    };

    info!(?pipeline, sheets = workbook.sheets.len(), "building dashboard");
    let dashboard = match pipeline {
        Pipeline::Inventory => dashboard::build_inventory_dashboard(&workbook, &opts)?,
        Pipeline::Procurement => dashboard::build_procurement_dashboard(&workbook, &opts)?,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match input.format {
        Format::Table => output::render_dashboard(&mut out, &dashboard)?,
        Format::Json => output::write_json(&mut out, &dashboard)?,
    }
    Ok(())
}
