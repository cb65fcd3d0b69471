//! Rendering of report tables back to markdown.
//!
//! Every report has the same frame: a `## title` line, two blank lines, a
//! header and separator line, one line per template row and a blank line,
//! optionally followed by reference footers for aliased template cells. The
//! classification cells are copied from the template as written, with empty
//! trailing cells merged into the last populated one (`||` colspan).

use std::collections::{BTreeMap, BTreeSet};

use super::extract::{Consumptions, format_grams};
use super::template::{ROW_SPAN, Row, RowKind, TableContext};
use crate::models::Period;

/// Minimum width of a consumption month column.
pub const CONSUMPTION_WIDTH: usize = 5;
/// Minimum width of the consumption total column.
pub const TOTAL_WIDTH: usize = 7;
/// Minimum width of reserve and purchase columns.
pub const SNAPSHOT_WIDTH: usize = 8;
/// Label of the purchase total column.
pub const TOTAL_LABEL: &str = "Total";

/// A data column: header label and minimum width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataColumn {
    pub label: String,
    pub min_width: usize,
}

impl DataColumn {
    pub fn new(label: impl Into<String>, min_width: usize) -> Self {
        Self {
            label: label.into(),
            min_width,
        }
    }
}

fn pad(text: &str, width: usize) -> String {
    let len = text.chars().count();
    format!("{text}{}", " ".repeat(width.saturating_sub(len)))
}

fn pad_left(text: &str, width: usize) -> String {
    let len = text.chars().count();
    format!("{}{text}", " ".repeat(width.saturating_sub(len)))
}

fn grams(value: f64) -> String {
    format!("{}g", format_grams(value))
}

fn classification_cells<A>(row: &Row<A>, max: &[usize], nb: usize) -> String {
    let mut line = String::new();

    match row.kind {
        RowKind::NewBody => {
            for (i, width) in max.iter().take(nb).enumerate() {
                let dashes = if i == 0 { (*width).max(3) } else { *width };
                line.push_str(&format!("| {} ", "-".repeat(dashes)));
            }
        }
        RowKind::Separator => {
            for (i, width) in max.iter().take(nb).enumerate() {
                let cell = if i == 0 { "--" } else { "" };
                line.push_str(&format!("| {} ", pad(cell, *width)));
            }
        }
        RowKind::Data => {
            let mut colspan: isize = 0;
            for i in 0..nb {
                let cell = row.cells[i].as_str();
                if !cell.is_empty() {
                    line.push_str(&format!("| {} ", pad(cell, max[i])));
                    if cell == ROW_SPAN && i + 1 < nb && row.cells[i + 1].is_empty() {
                        line.push('|');
                        colspan -= 1;
                    }
                } else if i == 0 {
                    line.push_str(&format!("| {} ", " ".repeat(max[i])));
                } else {
                    line.push_str(&" ".repeat(max[i] + 2));
                    colspan += 1;
                }
            }
            line.push_str(&"|".repeat(colspan.max(0) as usize));
        }
    }

    line
}

/// Renders a report table.
///
/// `values` holds one rendered cell per column for each template row, in
/// row order; missing rows and cells render blank.
pub fn build_table_content<A>(
    title: &str,
    context: &TableContext<A>,
    columns: &[DataColumn],
    values: &[Vec<String>],
) -> String {
    let nb = context.nb_row_headers;
    let max = &context.max;

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(c, column)| {
            values
                .iter()
                .filter_map(|row| row.get(c))
                .map(|cell| cell.chars().count())
                .chain([column.min_width, column.label.chars().count()])
                .max()
                .unwrap_or(column.min_width)
        })
        .collect();

    let mut content = format!("## {title}\n\n\n");

    let span: usize = max.iter().take(nb).map(|m| m + 2).sum();
    content.push('|');
    content.push_str(&" ".repeat(span));
    content.push_str(&"|".repeat(nb.saturating_sub(1)));
    for (column, width) in columns.iter().zip(&widths) {
        content.push_str(&format!("| {} ", pad_left(&column.label, *width)));
    }
    content.push_str("|\n");

    for width in max.iter().take(nb) {
        content.push_str(&format!("| {} ", "-".repeat(*width)));
    }
    for width in &widths {
        content.push_str(&format!("| {}:", "-".repeat(*width)));
    }
    content.push_str("|\n");

    for (r, row) in context.rows.iter().enumerate() {
        content.push_str(&classification_cells(row, max, nb));
        let cells = values.get(r);
        for (c, width) in widths.iter().enumerate() {
            let cell = match row.kind {
                RowKind::NewBody => "-".repeat(*width),
                _ => cells.and_then(|cells| cells.get(c)).cloned().unwrap_or_default(),
            };
            content.push_str(&format!("| {} ", pad_left(&cell, *width)));
        }
        content.push_str("|\n");
    }

    content.push('\n');

    for (alias, tag) in &context.links {
        content.push_str(&format!("[{alias}]: :tag:{tag}\n"));
    }

    content
}

/// Renders one year of consumption: a column per month seen in any
/// category, and a total per row.
pub fn build_consumption_content(title: &str, context: &TableContext<Consumptions>) -> String {
    let periods: BTreeSet<Period> = context
        .searches()
        .flat_map(|search| search.acc.keys().copied())
        .collect();

    let mut columns: Vec<DataColumn> = periods
        .iter()
        .map(|period| DataColumn::new(period.to_string(), CONSUMPTION_WIDTH))
        .collect();
    columns.push(DataColumn::new("", TOTAL_WIDTH));

    let values: Vec<Vec<String>> = context
        .rows
        .iter()
        .map(|row| match &row.search {
            Some(search) => {
                let mut cells: Vec<String> = periods
                    .iter()
                    .map(|period| search.acc.get(period).map(|w| grams(*w)).unwrap_or_default())
                    .collect();
                cells.push(grams(search.acc.values().sum()));
                cells
            }
            None => Vec::new(),
        })
        .collect();

    build_table_content(title, context, &columns, &values)
}

/// Renders the reserve: restored snapshot columns followed by a fresh
/// column for `today_label` holding each category's remaining weight.
///
/// `history` is aligned with the template rows and `labels`.
pub fn build_reserve_content(
    title: &str,
    context: &TableContext<f64>,
    labels: &[String],
    history: &[Vec<String>],
    today_label: &str,
) -> String {
    let mut columns: Vec<DataColumn> = labels
        .iter()
        .map(|label| DataColumn::new(label.clone(), SNAPSHOT_WIDTH))
        .collect();
    columns.push(DataColumn::new(today_label, SNAPSHOT_WIDTH));

    let values: Vec<Vec<String>> = context
        .rows
        .iter()
        .enumerate()
        .map(|(r, row)| {
            let mut cells: Vec<String> = (0..labels.len())
                .map(|c| history.get(r).and_then(|h| h.get(c)).cloned().unwrap_or_default())
                .collect();
            cells.push(row.search.as_ref().map(|s| grams(s.acc)).unwrap_or_default());
            cells
        })
        .collect();

    build_table_content(title, context, &columns, &values)
}

/// A purchase cell: the text written and the grams it adds to the total.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseCell {
    pub text: String,
    pub grams: f64,
}

impl PurchaseCell {
    /// Cell for a freshly summed weight, kept at full precision.
    pub fn computed(grams: f64) -> Self {
        Self {
            text: self::grams(grams),
            grams,
        }
    }

    /// Cell read back from a report, keeping its text as written.
    pub fn restored(text: String) -> Self {
        let grams = parse_grams_cell(&text).unwrap_or(0.0);
        Self { text, grams }
    }
}

/// Renders purchases: one column per year and a total.
///
/// `cells` maps each template row to its value per year.
pub fn build_purchase_content<A>(
    title: &str,
    context: &TableContext<A>,
    years: &[i32],
    cells: &[BTreeMap<i32, PurchaseCell>],
) -> String {
    let mut columns: Vec<DataColumn> = years
        .iter()
        .map(|year| DataColumn::new(year.to_string(), SNAPSHOT_WIDTH))
        .collect();
    columns.push(DataColumn::new(TOTAL_LABEL, SNAPSHOT_WIDTH));

    let values: Vec<Vec<String>> = context
        .rows
        .iter()
        .enumerate()
        .map(|(r, row)| {
            let Some(by_year) = cells.get(r).filter(|c| !c.is_empty()) else {
                return Vec::new();
            };
            let mut row_cells: Vec<String> = years
                .iter()
                .map(|year| by_year.get(year).map(|cell| cell.text.clone()).unwrap_or_default())
                .collect();
            if row.kind == RowKind::Data {
                let total: f64 = by_year.values().map(|cell| cell.grams).sum();
                row_cells.push(grams(total));
            }
            row_cells
        })
        .collect();

    build_table_content(title, context, &columns, &values)
}

/// Reads back a rendered `N.Ng` cell.
pub fn parse_grams_cell(cell: &str) -> Option<f64> {
    cell.trim().strip_suffix('g')?.replace(',', "").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NoteBuilder;
    use crate::store::{NoteMap, TagIndex};
    use crate::tea::template::build_table_context;

    fn index() -> TagIndex {
        let notes: NoteMap = [NoteBuilder::new()
            .key("k")
            .tags(["`green", "China", "Japan"])
            .build()]
        .into_iter()
        .collect();
        TagIndex::build(&notes)
    }

    fn template(rows: &str) -> String {
        format!("# Tea Summary Template\n\n\n| Style | Country | Shop | Type |\n| --- | --- | --- | --- |\n{rows}\n")
    }

    #[test]
    fn consumption_table_layout() {
        let content = template("| Green | China |  |  |\n| ^^    | Japan |  |  |\n| Black |  |  |  |");
        let mut context = build_table_context(&content, &index(), |_| Consumptions::new());
        for search in context.searches_mut() {
            search.acc.insert(Period::new(26, 10), 12.5);
        }
        if let Some(search) = context.rows[0].search.as_mut() {
            search.acc.insert(Period::new(26, 9), 100.25);
        }

        let rendered = build_consumption_content("Tea Consumption 2026", &context);
        let expected = "## Tea Consumption 2026\n\n\n\
|              ||  09.26 | 10.26 |         |\n\
| ----- | ----- | ------:| -----:| -------:|\n\
| Green | China | 100.2g | 12.5g |  112.8g |\n\
| ^^    | Japan |        | 12.5g |   12.5g |\n\
| Black        ||        |       |         |\n\n";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn row_span_before_empty_cell_closes_its_own_cell() {
        let content = template("| Green | China | x |  |\n| ^^ |  | ^^ |  |");
        let context = build_table_context(&content, &index(), |_| 0.0);
        let row = &context.rows[1];
        assert_eq!(classification_cells(row, &context.max, 3), "| ^^    |       | ^^ ");
    }

    #[test]
    fn markers_render_as_dash_and_separator_rows() {
        let content = template("| Green |  |  |  |\n| --- |  |  |  |\n| -- |  |  |  |");
        let context = build_table_context(&content, &index(), |_| 0.0);
        let rendered = build_reserve_content("Tea Reserve", &context, &[], &[], "14.10.26");
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines[3], "|       | 14.10.26 |");
        assert_eq!(lines[5], "| Green |     0.0g |");
        assert_eq!(lines[6], "| ----- | -------- |");
        assert_eq!(lines[7], "| --    |          |");
    }

    #[test]
    fn aliases_are_appended_as_references() {
        let content = template("| Green | [China] |  |  |");
        let context = build_table_context(&content, &index(), |_| 0.0);
        let rendered = build_reserve_content("Tea Reserve", &context, &[], &[], "14.10.26");
        assert!(rendered.ends_with("|\n\n[China]: :tag:China\n"));
    }

    #[test]
    fn purchase_totals_sum_the_year_cells() {
        let content = template("| Green |  |  |  |");
        let context = build_table_context(&content, &index(), |_| ());
        let cells = vec![BTreeMap::from([
            (2025, PurchaseCell::restored("10.0g".to_string())),
            (2026, PurchaseCell::computed(2.5)),
        ])];
        let rendered = build_purchase_content("Tea Purchase", &context, &[2025, 2026], &cells);
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines[3], "|       |     2025 |     2026 |    Total |");
        assert_eq!(lines[5], "| Green |    10.0g |     2.5g |    12.5g |");
        assert_eq!(parse_grams_cell("  12.5g "), Some(12.5));
    }

    #[test]
    fn purchase_total_is_summed_before_rounding() {
        let content = template("| Green |  |  |  |");
        let context = build_table_context(&content, &index(), |_| ());
        let cells = vec![BTreeMap::from([
            (2025, PurchaseCell::computed(10.04)),
            (2026, PurchaseCell::computed(10.04)),
        ])];
        let rendered = build_purchase_content("Tea Purchase", &context, &[2025, 2026], &cells);
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines[5], "| Green |    10.0g |    10.0g |    20.1g |");
    }
}
