//! Aligned, colorized table output.

use colored::{Color, Colorize};
use cqlshell_client::{ColumnRole, ColumnSpec, ColumnType, Value};

/// Whether output carries ANSI color escapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorMode {
    enabled: bool,
}

impl ColorMode {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn enabled() -> Self {
        Self::new(true)
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    /// Wrap `text` in `color` when colors are on.
    pub fn paint(&self, text: &str, color: Color) -> String {
        if self.enabled {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }
}

/// Header color for a column's key role.
pub fn role_color(role: ColumnRole) -> Color {
    match role {
        ColumnRole::PartitionKey => Color::Red,
        ColumnRole::ClusteringKey => Color::Blue,
        ColumnRole::Regular => Color::Magenta,
    }
}

/// Cell color for values of a column type.
pub fn value_color(typ: &ColumnType) -> Color {
    if typ.is_string() {
        Color::Yellow
    } else {
        Color::Green
    }
}

/// A table column: header text, header color and a minimum width.
#[derive(Debug, Clone, PartialEq)]
pub struct TableColumn {
    pub name: String,
    pub header: Color,
    pub min_width: usize,
}

impl TableColumn {
    pub fn new(name: impl Into<String>, header: Color) -> Self {
        Self {
            name: name.into(),
            header,
            min_width: 0,
        }
    }

    pub fn with_min_width(mut self, width: usize) -> Self {
        self.min_width = width;
        self
    }
}

/// One rendered cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub text: String,
    pub color: Color,
}

impl Cell {
    pub fn new(text: impl Into<String>, color: Color) -> Self {
        Self {
            text: text.into(),
            color,
        }
    }
}

/// Render a value the way the shell shows it. Null is `null`.
pub fn format_value(typ: &ColumnType, value: Option<&Value>) -> String {
    let Some(value) = value else {
        return "null".to_string();
    };
    match value {
        Value::Float(f) if typ.is_floating() => format!("{f:.6}"),
        Value::Double(d) if typ.is_floating() => format!("{d:.6}"),
        _ => value.to_string(),
    }
}

/// Column widths: the widest of the header, every cell and the minimum.
pub fn column_widths(columns: &[TableColumn], rows: &[Vec<Cell>]) -> Vec<usize> {
    columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            rows.iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.text.chars().count())
                .chain([column.name.chars().count(), column.min_width])
                .max()
                .unwrap_or(0)
        })
        .collect()
}

fn push_cell(line: &mut String, text: &str, width: usize, color: Color, colors: ColorMode) {
    let padded = format!("{text:>width$}");
    line.push_str("| ");
    line.push_str(&colors.paint(&padded, color));
    line.push(' ');
}

/// Header, separator and one line per row. No summary.
pub fn render_table(columns: &[TableColumn], rows: &[Vec<Cell>], colors: ColorMode) -> String {
    let widths = column_widths(columns, rows);
    let mut out = String::new();

    for (column, width) in columns.iter().zip(&widths) {
        push_cell(&mut out, &column.name, *width, column.header, colors);
    }
    out.push('\n');

    for width in &widths {
        out.push('+');
        out.push_str(&"-".repeat(width + 2));
    }
    out.push('\n');

    for row in rows {
        for (i, width) in widths.iter().enumerate() {
            match row.get(i) {
                Some(cell) => push_cell(&mut out, &cell.text, *width, cell.color, colors),
                None => push_cell(&mut out, "", *width, Color::Green, colors),
            }
        }
        out.push('\n');
    }
    out
}

/// ` (1 row)` or ` (N rows)`.
pub fn row_summary(count: usize) -> String {
    if count == 1 {
        " (1 row)".to_string()
    } else {
        format!(" ({count} rows)")
    }
}

/// A query result: a blank line, the table, a blank line and the row count.
pub fn render_result(
    specs: &[ColumnSpec],
    roles: &[ColumnRole],
    rows: &[Vec<Option<Value>>],
    colors: ColorMode,
) -> String {
    let columns: Vec<TableColumn> = specs
        .iter()
        .zip(roles)
        .map(|(spec, role)| TableColumn::new(spec.name.clone(), role_color(*role)))
        .collect();

    let cells: Vec<Vec<Cell>> = rows
        .iter()
        .map(|row| {
            specs
                .iter()
                .enumerate()
                .map(|(i, spec)| {
                    let value = row.get(i).and_then(|v| v.as_ref());
                    Cell::new(format_value(&spec.typ, value), value_color(&spec.typ))
                })
                .collect()
        })
        .collect();

    format!(
        "\n{}\n{}\n",
        render_table(&columns, &cells, colors),
        row_summary(rows.len())
    )
}

/// An error message, red when colors are on.
pub fn format_error(message: &str, colors: ColorMode) -> String {
    colors.paint(message, Color::Red)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> (Vec<ColumnSpec>, Vec<ColumnRole>, Vec<Vec<Option<Value>>>) {
        let specs = vec![
            ColumnSpec::new("app", "users", "id", ColumnType::Int),
            ColumnSpec::new("app", "users", "name", ColumnType::Text),
        ];
        let roles = vec![ColumnRole::PartitionKey, ColumnRole::Regular];
        let rows = vec![vec![Some(Value::Int(1)), Some(Value::Text("a".into()))]];
        (specs, roles, rows)
    }

    #[test]
    fn test_single_row_layout() {
        let (specs, roles, rows) = users();
        let out = render_result(&specs, &roles, &rows, ColorMode::disabled());
        assert_eq!(
            out,
            "\n| id | name \n+----+------\n|  1 |    a \n\n (1 row)\n"
        );
    }

    #[test]
    fn test_line_count_and_summary() {
        let (specs, roles, _) = users();
        for n in [0usize, 1, 2, 5] {
            let rows: Vec<_> = (0..n)
                .map(|i| vec![Some(Value::Int(i as i32)), None])
                .collect();
            let out = render_result(&specs, &roles, &rows, ColorMode::disabled());
            let lines = out.lines().filter(|l| !l.is_empty()).count();
            // table lines plus the summary line
            assert_eq!(lines, n + 3);
            assert_eq!(out.contains("row)"), n == 1);
        }
    }

    #[test]
    fn test_width_covers_header_and_cells() {
        let columns = vec![
            TableColumn::new("k", Color::Red),
            TableColumn::new("value", Color::Magenta).with_min_width(8),
        ];
        let rows = vec![vec![
            Cell::new("a long key", Color::Yellow),
            Cell::new("v", Color::Yellow),
        ]];
        assert_eq!(column_widths(&columns, &rows), vec![10, 8]);
    }

    #[test]
    fn test_colors_do_not_change_content() {
        colored::control::set_override(true);
        let (specs, roles, rows) = users();
        let plain = render_result(&specs, &roles, &rows, ColorMode::disabled());
        let painted = render_result(&specs, &roles, &rows, ColorMode::enabled());
        assert_ne!(plain, painted);

        let stripped: String = {
            let mut out = String::new();
            let mut chars = painted.chars();
            while let Some(c) = chars.next() {
                if c == '\u{1b}' {
                    for c in chars.by_ref() {
                        if c == 'm' {
                            break;
                        }
                    }
                } else {
                    out.push(c);
                }
            }
            out
        };
        assert_eq!(stripped, plain);
    }

    #[test]
    fn test_role_headers_are_distinct() {
        colored::control::set_override(true);
        let colors = ColorMode::enabled();
        let partition = colors.paint("c", role_color(ColumnRole::PartitionKey));
        let clustering = colors.paint("c", role_color(ColumnRole::ClusteringKey));
        let regular = colors.paint("c", role_color(ColumnRole::Regular));
        assert_ne!(partition, clustering);
        assert_ne!(clustering, regular);
        assert_ne!(partition, regular);
        assert!(partition.starts_with("\u{1b}[31m"));
    }

    #[test]
    fn test_value_formatting() {
        assert_eq!(format_value(&ColumnType::Int, None), "null");
        assert_eq!(format_value(&ColumnType::BigInt, Some(&Value::BigInt(-42))), "-42");
        assert_eq!(format_value(&ColumnType::Double, Some(&Value::Double(1.5))), "1.500000");
        assert_eq!(format_value(&ColumnType::Boolean, Some(&Value::Boolean(true))), "true");
        assert_eq!(format_value(&ColumnType::Text, Some(&Value::Text("x".into()))), "x");
    }

    #[test]
    fn test_error_is_red_only_with_colors() {
        colored::control::set_override(true);
        assert_eq!(format_error("boom", ColorMode::disabled()), "boom");
        assert!(format_error("boom", ColorMode::enabled()).contains("\u{1b}[31m"));
    }
}
