use crate::error::Result;
use crate::types::{Artifact, ChartKind, ChartSpec, Dashboard, Series, TableArtifact, TickFormat};
use crate::util::{format_millions, format_percent, format_quantity};
use serde::Serialize;
use std::io::Write;
use tabled::{builder::Builder, settings::Style};

pub fn write_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Print every artifact as Markdown. Charts are shown as their underlying
/// category/value table.
pub fn render_dashboard<W: Write>(out: &mut W, dashboard: &Dashboard) -> Result<()> {
    writeln!(out, "# {}\n", dashboard.title)?;
    for artifact in &dashboard.artifacts {
        match artifact {
            Artifact::Notice { message } => writeln!(out, "Note: {message}\n")?,
            Artifact::Table(table) => render_table(out, table)?,
            Artifact::Chart(chart) => render_chart(out, chart)?,
        }
    }
    Ok(())
}

fn render_table<W: Write>(out: &mut W, table: &TableArtifact) -> Result<()> {
    writeln!(out, "## {}\n", table.title)?;
    if table.rows.is_empty() {
        writeln!(out, "(no rows)\n")?;
        return Ok(());
    }
    writeln!(out, "{}\n", markdown(&table.columns, &table.rows))?;
    Ok(())
}

fn render_chart<W: Write>(out: &mut W, chart: &ChartSpec) -> Result<()> {
    let kind = match chart.kind {
        ChartKind::Bar => "bar chart",
        ChartKind::GroupedBar => "grouped bar chart",
        ChartKind::Pie => "pie chart",
        ChartKind::DualAxis => "bar + line chart",
    };
    writeln!(out, "## {} ({})\n", chart.title, kind)?;
    if chart.categories.is_empty() {
        writeln!(out, "(no data)\n")?;
        return Ok(());
    }

    let mut columns = vec!["Category".to_string()];
    columns.extend(chart.series.iter().map(|s| s.name.clone()));
    if !chart.labels.is_empty() {
        columns.push("Share".to_string());
    }

    let rows: Vec<Vec<String>> = chart
        .categories
        .iter()
        .enumerate()
        .map(|(i, category)| {
            let mut row = vec![category.clone()];
            for series in &chart.series {
                let value = series.values.get(i).copied().unwrap_or(0.0);
                row.push(format_tick(chart, series, value));
            }
            if let Some(label) = chart.labels.get(i) {
                row.push(label.clone());
            }
            row
        })
        .collect();
    writeln!(out, "{}\n", markdown(&columns, &rows))?;
    Ok(())
}

fn format_tick(chart: &ChartSpec, series: &Series, value: f64) -> String {
    let ticks = chart
        .axes
        .iter()
        .find(|a| a.side == series.axis)
        .map(|a| a.ticks)
        .unwrap_or(TickFormat::Plain);
    match ticks {
        TickFormat::Plain => format_quantity(value),
        TickFormat::Millions => format_millions(value),
        TickFormat::Percent => format_percent(value),
    }
}

fn markdown(columns: &[String], rows: &[Vec<String>]) -> String {
    let mut builder = Builder::default();
    builder.push_record(columns.iter().cloned());
    for row in rows {
        builder.push_record(row.iter().cloned());
    }
    builder.build().with(Style::markdown()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Axis, AxisSide, Mark};

    fn sample() -> Dashboard {
        Dashboard {
            title: "Procurement Progress Dashboard".to_string(),
            artifacts: vec![
                Artifact::Notice {
                    message: "sheet 'Stock Movement' not found in workbook".to_string(),
                },
                Artifact::Table(TableArtifact {
                    title: "Top Ranked Firms".to_string(),
                    columns: vec!["Rank".into(), "Contractor/ Firm".into()],
                    rows: vec![vec!["1".into(), "Acme Traders".into()]],
                }),
                Artifact::Table(TableArtifact {
                    title: "Empty".to_string(),
                    columns: vec!["Item Name".into()],
                    rows: vec![],
                }),
                Artifact::Chart(ChartSpec {
                    title: "Summary - Delivery Progress".to_string(),
                    kind: ChartKind::DualAxis,
                    categories: vec!["Acme Traders".into()],
                    series: vec![
                        Series {
                            name: "Total PO Amount (PKR)".into(),
                            mark: Mark::Bar,
                            axis: AxisSide::Primary,
                            values: vec![12_500_000.0],
                        },
                        Series {
                            name: "Average Delivery Percentage".into(),
                            mark: Mark::Line,
                            axis: AxisSide::Secondary,
                            values: vec![87.5],
                        },
                    ],
                    axes: vec![
                        Axis {
                            label: "Total PO Amount (PKR)".into(),
                            side: AxisSide::Primary,
                            ticks: TickFormat::Millions,
                            range: None,
                        },
                        Axis {
                            label: "Average Delivery Percentage".into(),
                            side: AxisSide::Secondary,
                            ticks: TickFormat::Percent,
                            range: Some((0.0, 100.0)),
                        },
                    ],
                    labels: vec![],
                }),
            ],
        }
    }

    #[test]
    fn renders_markdown_sections() {
        let mut buf = Vec::new();
        render_dashboard(&mut buf, &sample()).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.starts_with("# Procurement Progress Dashboard"));
        assert!(text.contains("Note: sheet 'Stock Movement' not found"));
        assert!(text.contains("## Top Ranked Firms"));
        assert!(text.contains("Acme Traders"));
        assert!(text.contains("(no rows)"));
        assert!(text.contains("## Summary - Delivery Progress (bar + line chart)"));
        assert!(text.contains("12.5M"));
        assert!(text.contains("87.5%"));
    }

    #[test]
    fn json_output_tags_artifacts() {
        let mut buf = Vec::new();
        write_json(&mut buf, &sample()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        let artifacts = value["artifacts"].as_array().unwrap();
        assert_eq!(artifacts[0]["type"], "notice");
        assert_eq!(artifacts[1]["type"], "table");
        assert_eq!(artifacts[1]["rows"][0][1], "Acme Traders");
        assert_eq!(artifacts[3]["type"], "chart");
        assert_eq!(artifacts[3]["kind"], "dual_axis");
        assert_eq!(artifacts[3]["axes"][1]["range"][1], 100.0);
        assert!(artifacts[3].get("labels").is_none());
    }
}
