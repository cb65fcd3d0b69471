//! Parsing of the category template table.
//!
//! The template is a markdown table whose first four columns classify teas
//! (style, country, shop or type, sub-type). Each data row becomes a report
//! row; rows whose cells all resolve to known tags also get a category (a
//! [`Search`]) that notes are matched against.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use super::patterns::CELL_SEPARATOR;
use crate::store::TagIndex;

/// Number of classification columns.
pub const CLASS_COLUMNS: usize = 4;
/// Row-span marker.
pub const ROW_SPAN: &str = "^^";
/// Line index of the header row in templates and reports.
pub const HEADER_LINE: usize = 3;
/// Line index of the first data row in templates and reports.
pub const FIRST_ROW_LINE: usize = 5;

const STYLE_PREFIX: char = '`';
const SHOP_PREFIX: char = '≈';
const MIN_WIDTH: usize = 2;

/// What a template line stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    /// A classification row.
    Data,
    /// `---` row: starts a new table body.
    NewBody,
    /// `--` row: visual separator.
    Separator,
}

/// A category: the tags a note must all carry, plus its accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct Search<A> {
    pub tags: Vec<String>,
    pub acc: A,
}

impl<A> Search<A> {
    /// AND-match against a note's tags.
    pub fn matches(&self, tags: &[String]) -> bool {
        self.tags.iter().all(|tag| tags.contains(tag))
    }
}

/// One template row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row<A> {
    /// Line index in the template.
    pub line: usize,
    pub kind: RowKind,
    /// Cells as written, `^^` included.
    pub cells: [String; CLASS_COLUMNS],
    /// Cells with row spans resolved.
    pub resolved: [String; CLASS_COLUMNS],
    /// Category, if every populated cell resolved to a tag.
    pub search: Option<Search<A>>,
}

/// Parsed template.
#[derive(Debug, Clone, PartialEq)]
pub struct TableContext<A> {
    pub rows: Vec<Row<A>>,
    /// Widest cell per classification column, row spans ignored.
    pub max: [usize; CLASS_COLUMNS],
    /// How many classification columns are rendered.
    pub nb_row_headers: usize,
    /// Resolved cell tuple to the indices of the rows sharing it.
    pub hashes: HashMap<String, Vec<usize>>,
    /// Bracketed alias to the tag it resolved to.
    pub links: BTreeMap<String, String>,
}

impl<A> TableContext<A> {
    pub fn searches(&self) -> impl Iterator<Item = &Search<A>> {
        self.rows.iter().filter_map(|row| row.search.as_ref())
    }

    pub fn searches_mut(&mut self) -> impl Iterator<Item = &mut Search<A>> {
        self.rows.iter_mut().filter_map(|row| row.search.as_mut())
    }

    /// Categories matching a set of note tags.
    pub fn matching_mut<'a>(
        &'a mut self,
        tags: &'a [String],
    ) -> impl Iterator<Item = &'a mut Search<A>> {
        self.searches_mut().filter(move |search| search.matches(tags))
    }
}

/// Key of a resolved cell tuple in [`TableContext::hashes`].
///
/// Only populated cells take part: a rendered row merges its empty cells
/// into a trailing `||` colspan, and must read back under the same key.
pub fn hash_key(resolved: &[String]) -> String {
    let cells: Vec<&str> = resolved
        .iter()
        .map(String::as_str)
        .filter(|cell| !cell.is_empty())
        .collect();
    cells.join("\u{1f}")
}

/// Splits a table line into trimmed cells.
pub fn split_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner).trim();
    CELL_SEPARATOR.split(inner).map(str::to_string).collect()
}

/// Classifies a line by its first cell.
pub fn row_kind(first_cell: &str) -> RowKind {
    if first_cell.contains("---") {
        RowKind::NewBody
    } else if first_cell.contains("--") {
        RowKind::Separator
    } else {
        RowKind::Data
    }
}

/// Outcome of resolving one cell against the tag index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellMatch {
    /// Empty cell: no constraint.
    Empty,
    /// Resolved tag, with the alias when the cell was bracketed.
    Tag { tag: String, alias: Option<String> },
    /// No candidate spelling is a known tag.
    Unmatched,
}

/// Resolves a template cell to a tag.
///
/// `[X]` marks an alias. Candidates are tried in order: `X`, `` ` `` plus
/// lowercase `X` (style), `≈X` (shop), lowercase `X` (type).
pub fn match_tags(cell: &str, index: &TagIndex) -> CellMatch {
    if cell.is_empty() {
        return CellMatch::Empty;
    }

    let (name, alias) = match cell.strip_prefix('[').and_then(|c| c.strip_suffix(']')) {
        Some(inner) => (inner, Some(inner.to_string())),
        None => (cell, None),
    };

    let lower = name.to_lowercase();
    let candidates = [
        name.to_string(),
        format!("{STYLE_PREFIX}{lower}"),
        format!("{SHOP_PREFIX}{name}"),
        lower,
    ];

    candidates
        .into_iter()
        .find(|candidate| index.contains(candidate))
        .map_or(CellMatch::Unmatched, |tag| CellMatch::Tag { tag, alias })
}

/// Resolved state of one column, carried across row spans.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Carried {
    text: String,
    matched: Option<CellMatch>,
}

/// Parses the rows of a template or report starting at [`FIRST_ROW_LINE`].
///
/// `new_search` creates the accumulator of each category from its tags.
pub fn build_table_context<A>(
    content: &str,
    index: &TagIndex,
    mut new_search: impl FnMut(&[String]) -> A,
) -> TableContext<A> {
    let lines: Vec<&str> = content.split('\n').collect();

    let mut rows = Vec::new();
    let mut max = [MIN_WIDTH; CLASS_COLUMNS];
    let mut populated = [false; CLASS_COLUMNS];
    let mut hashes: HashMap<String, Vec<usize>> = HashMap::new();
    let mut links = BTreeMap::new();
    let mut previous: [Carried; CLASS_COLUMNS] = Default::default();

    for (line, text) in lines
        .iter()
        .enumerate()
        .skip(FIRST_ROW_LINE)
        .take_while(|(_, text)| text.starts_with('|'))
    {
        let mut cells: [String; CLASS_COLUMNS] = Default::default();
        for (slot, cell) in cells.iter_mut().zip(split_cells(text)) {
            *slot = cell;
        }

        let kind = row_kind(&cells[0]);
        if kind != RowKind::Data {
            previous = Default::default();
            rows.push(Row {
                line,
                kind,
                cells,
                resolved: Default::default(),
                search: None,
            });
            continue;
        }

        let current: [Carried; CLASS_COLUMNS] = std::array::from_fn(|i| {
            let cell = &cells[i];
            if cell == ROW_SPAN {
                previous[i].clone()
            } else {
                Carried {
                    text: cell.clone(),
                    matched: Some(match_tags(cell, index)),
                }
            }
        });

        for (i, cell) in cells.iter().enumerate() {
            if !cell.is_empty() {
                populated[i] = true;
            }
            if cell != ROW_SPAN {
                max[i] = max[i].max(cell.chars().count());
            }
        }

        let mut tags = Vec::new();
        let mut searchable = true;
        for carried in &current {
            match &carried.matched {
                None | Some(CellMatch::Empty) => {}
                Some(CellMatch::Tag { tag, alias }) => {
                    if let Some(alias) = alias {
                        links.insert(alias.clone(), tag.clone());
                    }
                    tags.push(tag.clone());
                }
                Some(CellMatch::Unmatched) => searchable = false,
            }
        }
        if tags.is_empty() {
            searchable = false;
        }

        let resolved: [String; CLASS_COLUMNS] = std::array::from_fn(|i| current[i].text.clone());
        let search = if searchable {
            let acc = new_search(&tags);
            Some(Search { tags, acc })
        } else {
            debug!(line, cells = ?resolved, "template row excluded from matching");
            None
        };

        hashes.entry(hash_key(&resolved)).or_default().push(rows.len());
        rows.push(Row {
            line,
            kind,
            cells,
            resolved,
            search,
        });
        previous = current;
    }

    let nb_row_headers = populated.iter().rposition(|&p| p).map_or(1, |last| last + 1);

    TableContext {
        rows,
        max,
        nb_row_headers,
        hashes,
        links,
    }
}
