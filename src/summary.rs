use crate::report::Report;
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table,
    modifiers::UTF8_ROUND_CORNERS, presets::UTF8_BORDERS_ONLY,
};

/// Rows of the display window shown in the one-shot table, newest first.
const TABLE_ROWS: usize = 15;

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.0}", v),
        None => "-".to_string(),
    }
}

fn flow_cell(value: f64) -> Cell {
    let color = if value >= 0.0 { Color::Green } else { Color::Red };
    Cell::new(format!("{:.0}", value))
        .fg(color)
        .set_alignment(CellAlignment::Right)
}

/// Prints the result header, the most recent window rows, and the
/// commentary bullets to stdout.
pub fn print_report(report: &Report) {
    let title = format!(
        "{} ({}) — {} rows",
        report.identity.name,
        report.identity.code,
        report.window.len()
    );

    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Date").add_attribute(Attribute::Bold),
            Cell::new("Close")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
            Cell::new("MA20")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
            Cell::new("Upper")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
            Cell::new("Lower")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
            Cell::new("Foreign Σ")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
            Cell::new("Inst. Σ")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
            Cell::new("Retail Σ")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
        ]);

    for row in report.window.iter().rev().take(TABLE_ROWS) {
        table.add_row(vec![
            Cell::new(row.record.date.format("%Y-%m-%d")).fg(Color::DarkGrey),
            Cell::new(format!("{:.0}", row.record.close)).set_alignment(CellAlignment::Right),
            Cell::new(format_value(row.ma20)).set_alignment(CellAlignment::Right),
            Cell::new(format_value(row.upper)).set_alignment(CellAlignment::Right),
            Cell::new(format_value(row.lower)).set_alignment(CellAlignment::Right),
            flow_cell(row.cum_foreign),
            flow_cell(row.cum_institution),
            flow_cell(row.cum_retail),
        ]);
    }

    println!("\n{}\n{}", title, table);
    for line in report.commentary.lines() {
        println!("  • {}", line);
    }
}
