//! Report generators.
//!
//! Every generator works on a working copy of the notes, checks its
//! prerequisites before touching anything, and returns the notes to persist
//! as a [`WriteBatch`]. A generator that fails returns no batch, so nothing
//! is ever half written.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use time::Date;
use tracing::{debug, info};

use super::error::ReportError;
use super::extract::{
    Consumptions, annotations, format_date, format_grams, get_consumptions, get_remaining,
    get_remaining_at, has_annotation, is_brew_log, is_remaining, parse_date,
};
use super::format::{
    PurchaseCell, TOTAL_LABEL, build_consumption_content, build_purchase_content,
    build_reserve_content,
};
use super::mix::update_mixes;
use super::remaining::update_all_remaining;
use super::template::{
    CLASS_COLUMNS, FIRST_ROW_LINE, HEADER_LINE, ROW_SPAN, RowKind, TableContext,
    build_table_context, hash_key, row_kind, split_cells,
};
use crate::config::EngineConfig;
use crate::models::{Note, NoteKey};
use crate::store::{NoteMap, TagIndex, WriteBatch};

/// Purchased grams per calendar year.
pub type Purchases = BTreeMap<i32, f64>;

/// A data row read back from a rendered report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredRow {
    /// Classification cells with row spans resolved.
    pub resolved: [String; CLASS_COLUMNS],
    /// Data cells as written, aligned with [`RestoredTable::labels`].
    pub values: Vec<String>,
}

/// Previously rendered report values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoredTable {
    pub labels: Vec<String>,
    pub rows: Vec<RestoredRow>,
}

impl RestoredTable {
    /// Restored rows grouped by resolved classification, in table order.
    pub fn by_hash(&self) -> HashMap<String, VecDeque<&RestoredRow>> {
        let mut grouped: HashMap<String, VecDeque<&RestoredRow>> = HashMap::new();
        for row in &self.rows {
            grouped.entry(hash_key(&row.resolved)).or_default().push_back(row);
        }
        grouped
    }

    /// Restored values for each template row, matched on resolved
    /// classification. The n-th template row of a classification gets the
    /// n-th restored row of it.
    pub fn align<A>(&self, context: &TableContext<A>) -> Vec<Option<Vec<String>>> {
        let mut grouped = self.by_hash();
        let mut aligned = vec![None; context.rows.len()];

        for (key, indices) in &context.hashes {
            let Some(restored) = grouped.get_mut(key) else {
                continue;
            };
            let mut indices = indices.clone();
            indices.sort_unstable();
            for index in indices {
                match restored.pop_front() {
                    Some(row) => aligned[index] = Some(row.values.clone()),
                    None => break,
                }
            }
        }

        aligned
    }

    /// Drops a column by label, returning whether it was present.
    pub fn drop_column(&mut self, label: &str) -> bool {
        let Some(position) = self.labels.iter().position(|l| l == label) else {
            return false;
        };
        self.labels.remove(position);
        for row in &mut self.rows {
            if position < row.values.len() {
                row.values.remove(position);
            }
        }
        true
    }
}

/// Reads the header labels and data rows of a rendered reserve or purchase
/// report, keeping every value as the exact string written.
pub fn restore_reserve_values(content: &str) -> RestoredTable {
    let lines: Vec<&str> = content.split('\n').collect();
    let (Some(header), Some(separator)) = (lines.get(HEADER_LINE), lines.get(HEADER_LINE + 1))
    else {
        return RestoredTable::default();
    };

    let nb = split_cells(separator)
        .iter()
        .filter(|cell| !cell.is_empty() && !cell.ends_with(':'))
        .count();
    if nb == 0 {
        return RestoredTable::default();
    }

    let labels: Vec<String> = split_cells(header)
        .into_iter()
        .skip(nb)
        .filter(|label| !label.is_empty())
        .collect();

    let mut rows = Vec::new();
    let mut previous: [String; CLASS_COLUMNS] = Default::default();

    for text in lines
        .iter()
        .skip(FIRST_ROW_LINE)
        .take_while(|text| text.starts_with('|'))
    {
        let cells = split_cells(text);
        let first = cells.first().map(String::as_str).unwrap_or_default();
        if row_kind(first) != RowKind::Data {
            previous = Default::default();
            continue;
        }

        let resolved: [String; CLASS_COLUMNS] = std::array::from_fn(|i| match cells.get(i) {
            Some(cell) if i < nb && cell == ROW_SPAN => previous[i].clone(),
            Some(cell) if i < nb => cell.clone(),
            _ => String::new(),
        });
        let values: Vec<String> = cells.iter().skip(nb).take(labels.len()).cloned().collect();

        rows.push(RestoredRow {
            resolved: resolved.clone(),
            values,
        });
        previous = resolved;
    }

    RestoredTable { labels, rows }
}

fn template_content(notes: &NoteMap, config: &EngineConfig) -> Result<String, ReportError> {
    let template = notes
        .find_by_title(&config.template_title)
        .ok_or_else(|| ReportError::missing_note(&config.template_title))?;
    let has_rows = template
        .content
        .split('\n')
        .nth(FIRST_ROW_LINE)
        .is_some_and(|line| line.starts_with('|'));
    if !has_rows {
        return Err(ReportError::MissingTemplateRows {
            title: config.template_title.clone(),
        });
    }
    Ok(template.content.clone())
}

fn destination(notes: &NoteMap, title: &str) -> Result<NoteKey, ReportError> {
    notes
        .key_for_title(title)
        .ok_or_else(|| ReportError::missing_note(title))
}

/// Replaces the destination content, staging it only if it changed.
fn write_report(notes: &mut NoteMap, key: &NoteKey, content: String, batch: &mut WriteBatch) {
    let Some(note) = notes.get_mut(key) else {
        return;
    };
    let before = note.digest();
    note.set_content(content);
    if note.digest() == before {
        debug!(note_key = %key, "report unchanged");
    } else {
        batch.stage(note);
    }
}

fn live_notes(notes: &NoteMap) -> impl Iterator<Item = &Note> {
    notes.iter().filter(|note| !note.is_trashed)
}

/// Title of the consumption report for a two-digit year.
pub fn consumption_title(config: &EngineConfig, year: u8) -> String {
    format!("{} 20{year:02}", config.consumption_prefix)
}

/// Two-digit years found in the brew logs of live notes.
pub fn consumption_years(notes: &NoteMap) -> BTreeSet<u8> {
    live_notes(notes)
        .filter(|note| is_brew_log(&note.content))
        .flat_map(|note| get_consumptions(&note.content).into_keys())
        .map(|period| period.year)
        .collect()
}

/// Regenerates the consumption report of each selected year.
///
/// An empty selection means every year found in the brew logs. Each year is
/// written to its own note, all of which must exist.
pub fn generate_selected_consumption(
    notes: &mut NoteMap,
    config: &EngineConfig,
    years: &[u8],
) -> Result<WriteBatch, ReportError> {
    let template = template_content(notes, config)?;

    let years: BTreeSet<u8> = if years.is_empty() {
        consumption_years(notes)
    } else {
        years.iter().copied().collect()
    };
    let destinations: Vec<(u8, String, NoteKey)> = years
        .iter()
        .map(|&year| {
            let title = consumption_title(config, year);
            destination(notes, &title).map(|key| (year, title, key))
        })
        .collect::<Result<_, _>>()?;

    let mut batch = WriteBatch::new();
    update_mixes(notes, &mut batch);

    let index = TagIndex::build(notes);
    let logs: Vec<(Vec<String>, Consumptions)> = live_notes(notes)
        .filter(|note| is_brew_log(&note.content))
        .map(|note| (note.tags.clone(), get_consumptions(&note.content)))
        .collect();

    for (year, title, key) in destinations {
        let mut context = build_table_context(&template, &index, |_| Consumptions::new());

        for (tags, consumptions) in &logs {
            for search in context.matching_mut(tags) {
                for (period, grams) in consumptions.range(..).filter(|(p, _)| p.year == year) {
                    *search.acc.entry(*period).or_insert(0.0) += grams;
                }
            }
        }

        let content = build_consumption_content(&title, &context);
        write_report(notes, &key, content, &mut batch);
        info!(year, "consumption report generated");
    }

    Ok(batch)
}

/// Regenerates the consumption report of the current year.
pub fn generate_current_consumption(
    notes: &mut NoteMap,
    config: &EngineConfig,
    today: Date,
) -> Result<WriteBatch, ReportError> {
    let year = today.year().rem_euclid(100) as u8;
    generate_selected_consumption(notes, config, &[year])
}

/// Appends today's remaining stock per category to the reserve report.
///
/// Remaining annotations are brought up to date first. Earlier snapshot
/// columns are kept from the current reserve note; a column already dated
/// today is recomputed.
pub fn generate_reserve(
    notes: &mut NoteMap,
    config: &EngineConfig,
    today: Date,
) -> Result<WriteBatch, ReportError> {
    let template = template_content(notes, config)?;
    let key = destination(notes, &config.reserve_title)?;

    let mut batch = WriteBatch::new();
    update_mixes(notes, &mut batch);
    update_all_remaining(notes, &mut batch, today, config.tolerance);

    let index = TagIndex::build(notes);
    let mut context = build_table_context(&template, &index, |_| 0.0_f64);

    for note in notes.iter().filter(|note| is_remaining(note)) {
        let remaining = get_remaining(note).unwrap_or(0.0);
        for search in context.matching_mut(&note.tags) {
            search.acc += remaining;
        }
    }

    let today_label = format_date(today);
    let mut restored = notes
        .get(&key)
        .map(|note| restore_reserve_values(&note.content))
        .unwrap_or_default();
    if restored.labels.last() == Some(&today_label) {
        restored.drop_column(&today_label);
    }

    let annotated: Vec<&Note> = live_notes(notes)
        .filter(|note| has_annotation(&note.content))
        .collect();
    let history: Vec<Vec<String>> = restored
        .align(&context)
        .into_iter()
        .zip(&context.rows)
        .map(|(values, row)| match (values, &row.search) {
            (Some(values), _) => values,
            (None, Some(search)) => restored
                .labels
                .iter()
                .map(|label| {
                    let Some(date) = parse_date(label) else {
                        return String::new();
                    };
                    let total: f64 = annotated
                        .iter()
                        .filter(|note| search.matches(&note.tags))
                        .filter_map(|note| get_remaining_at(note, date))
                        .sum();
                    format!("{}g", format_grams(total))
                })
                .collect(),
            (None, None) => Vec::new(),
        })
        .collect();

    let content = build_reserve_content(
        &config.reserve_title,
        &context,
        &restored.labels,
        &history,
        &today_label,
    );
    write_report(notes, &key, content, &mut batch);
    info!(date = %today_label, "reserve report generated");

    Ok(batch)
}

/// Regenerates the purchase report: grams bought per category and year.
///
/// The first remaining annotation of a note is its purchase. Past years are
/// kept from the current purchase note; the current year is recomputed.
pub fn generate_purchase(
    notes: &mut NoteMap,
    config: &EngineConfig,
    today: Date,
) -> Result<WriteBatch, ReportError> {
    let template = template_content(notes, config)?;
    let key = destination(notes, &config.purchase_title)?;

    let mut batch = WriteBatch::new();
    update_mixes(notes, &mut batch);

    let index = TagIndex::build(notes);
    let mut context = build_table_context(&template, &index, |_| Purchases::new());

    for note in live_notes(notes) {
        let Some(first) = annotations(&note.content).into_iter().next() else {
            continue;
        };
        let Some(date) = first.date else {
            continue;
        };
        for search in context.matching_mut(&note.tags) {
            *search.acc.entry(date.year()).or_insert(0.0) += first.remaining;
        }
    }

    let current_year = today.year();
    let mut restored = notes
        .get(&key)
        .map(|note| restore_reserve_values(&note.content))
        .unwrap_or_default();
    restored.drop_column(TOTAL_LABEL);
    let restored_years: Vec<Option<i32>> = restored
        .labels
        .iter()
        .map(|label| label.parse::<i32>().ok().filter(|year| *year < current_year))
        .collect();

    let years: Vec<i32> = context
        .searches()
        .flat_map(|search| search.acc.keys().copied())
        .chain(restored_years.iter().flatten().copied())
        .chain([current_year])
        .collect::<BTreeSet<i32>>()
        .into_iter()
        .collect();

    let cells: Vec<BTreeMap<i32, PurchaseCell>> = restored
        .align(&context)
        .into_iter()
        .zip(&context.rows)
        .map(|(values, row)| {
            let mut by_year = BTreeMap::new();
            let mut kept = BTreeSet::new();
            if let Some(values) = values {
                for (year, value) in restored_years.iter().zip(values) {
                    if let Some(year) = year
                        && !value.is_empty()
                    {
                        by_year.insert(*year, PurchaseCell::restored(value));
                        kept.insert(*year);
                    }
                }
            }
            if let Some(search) = &row.search {
                for year in &years {
                    if !kept.contains(year) {
                        let grams = search.acc.get(year).copied().unwrap_or(0.0);
                        by_year.insert(*year, PurchaseCell::computed(grams));
                    }
                }
            }
            by_year
        })
        .collect();

    let content = build_purchase_content(&config.purchase_title, &context, &years, &cells);
    write_report(notes, &key, content, &mut batch);
    info!(year = current_year, "purchase report generated");

    Ok(batch)
}
