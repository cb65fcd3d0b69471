//! Numeric extraction from a single note's content.
//!
//! Nothing here fails: content that does not match a grammar simply yields
//! no data for that note.

use std::collections::{BTreeMap, HashMap};

use time::{Date, Month};

use super::patterns::{
    BREW, BREW_HEADER, BREW_ROW, DEFLIST_LINK, MIX_BREW, MIX_DEF_BEGIN, MIX_DEF_LINE, REMAINING,
};
use crate::models::{Note, NoteKey, Period};

/// Grams consumed per month.
pub type Consumptions = BTreeMap<Period, f64>;

/// A blend recipe defined in a mix note.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mix {
    /// Total weight, when the definition gives one with `[#]`.
    pub total: Option<f64>,
    /// Ingredient note key and grams, in definition order.
    pub ingredients: Vec<(NoteKey, f64)>,
}

impl Mix {
    /// Weight of one serving: the declared total, else the ingredient sum.
    pub fn weight(&self) -> f64 {
        self.total
            .unwrap_or_else(|| self.ingredients.iter().map(|(_, grams)| grams).sum())
    }

    fn set_ingredient(&mut self, key: NoteKey, grams: f64) {
        match self.ingredients.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = grams,
            None => self.ingredients.push((key, grams)),
        }
    }
}

/// One `\t~ N.Ng (DD.MM.YY, C.Cg)` line.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub remaining: f64,
    pub date: Option<Date>,
    pub consumed: Option<f64>,
    /// Byte offset right after the annotation.
    pub end: usize,
}

/// Brew-log header present.
pub fn is_brew_log(content: &str) -> bool {
    BREW_HEADER.is_match(content)
}

/// Live note with at least one mix-referencing brew row.
pub fn is_mix(note: &Note) -> bool {
    !note.is_trashed && MIX_BREW.is_match(&note.content)
}

/// Content carries at least one remaining annotation.
pub fn has_annotation(content: &str) -> bool {
    REMAINING.is_match(content)
}

/// Live, unfinished note with at least one remaining annotation.
pub fn is_remaining(note: &Note) -> bool {
    !note.is_trashed && !note.is_finished() && has_annotation(&note.content)
}

/// Parses `DD.MM.YY` (two-digit year in the 2000s).
pub fn parse_date(label: &str) -> Option<Date> {
    let mut parts = label.split('.');
    let day = parts.next()?.parse::<u8>().ok()?;
    let month = parts.next()?.parse::<u8>().ok()?;
    let year = parts.next()?.parse::<i32>().ok()?;
    if parts.next().is_some() || year > 99 {
        return None;
    }
    let month = Month::try_from(month).ok()?;
    Date::from_calendar_date(2000 + year, month, day).ok()
}

/// Formats a date as `DD.MM.YY`.
pub fn format_date(date: Date) -> String {
    format!(
        "{:02}.{:02}.{:02}",
        date.day(),
        u8::from(date.month()),
        date.year().rem_euclid(100)
    )
}

/// Period of a date.
pub fn period_of(date: Date) -> Period {
    Period::new(date.year().rem_euclid(100) as u8, u8::from(date.month()))
}

/// Formats grams with one decimal, without a negative zero.
pub fn format_grams(grams: f64) -> String {
    let grams = if grams == 0.0 { 0.0 } else { grams };
    format!("{grams:.1}")
}

fn parse_grams(text: &str) -> Option<f64> {
    text.replace(',', "").parse().ok()
}

/// Mixes defined in a note, keyed by code (`#m1`).
pub fn load_mixes(content: &str) -> HashMap<String, Mix> {
    let ingredients: HashMap<&str, NoteKey> = DEFLIST_LINK
        .captures_iter(content)
        .filter_map(|caps| {
            let code = caps.get(1)?.as_str();
            let key = caps.get(2)?.as_str();
            Some((code, NoteKey::new(key)))
        })
        .collect();

    let mut mixes = HashMap::new();

    for caps in MIX_DEF_BEGIN.captures_iter(content) {
        let (Some(whole), Some(code), Some(grams), Some(ingredient)) =
            (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
        else {
            continue;
        };

        let mut mix = Mix::default();
        let grams = parse_grams(grams.as_str());

        match (ingredient.as_str(), grams) {
            ("#", Some(grams)) => mix.total = Some(grams),
            (code, Some(grams)) => {
                if let Some(key) = ingredients.get(code) {
                    mix.set_ingredient(key.clone(), grams);
                }
            }
            _ => {}
        }

        let mut rest = &content[whole.end()..];
        while let Some(line) = MIX_DEF_LINE.captures(rest) {
            let (Some(matched), Some(grams), Some(code)) = (line.get(0), line.get(1), line.get(2))
            else {
                break;
            };
            if let (Some(key), Some(grams)) =
                (ingredients.get(code.as_str()), parse_grams(grams.as_str()))
            {
                mix.set_ingredient(key.clone(), grams);
            }
            rest = &rest[matched.end()..];
        }

        mixes.insert(code.as_str().to_string(), mix);
    }

    mixes
}

/// Grams consumed per month, literal weights and mix references alike.
///
/// Mixes are only loaded once a mix reference is met; unknown mixes weigh 0.
pub fn get_consumptions(content: &str) -> Consumptions {
    let mut consumptions = Consumptions::new();
    let mut mixes: Option<HashMap<String, Mix>> = None;

    for caps in BREW.captures_iter(content) {
        let Some(period) = caps.get(1).and_then(|m| Period::parse_label(m.as_str())) else {
            continue;
        };

        let weight = match (caps.get(2), caps.get(3)) {
            (Some(grams), _) => parse_grams(grams.as_str()).unwrap_or(0.0),
            (None, Some(code)) => mixes
                .get_or_insert_with(|| load_mixes(content))
                .get(code.as_str())
                .map_or(0.0, Mix::weight),
            (None, None) => 0.0,
        };

        *consumptions.entry(period).or_insert(0.0) += weight;
    }

    consumptions
}

/// Every remaining annotation, in content order.
pub fn annotations(content: &str) -> Vec<Annotation> {
    REMAINING
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(Annotation {
                remaining: parse_grams(caps.get(1)?.as_str())?,
                date: caps.get(2).and_then(|m| parse_date(m.as_str())),
                consumed: caps.get(3).and_then(|m| parse_grams(m.as_str())),
                end: whole.end(),
            })
        })
        .collect()
}

/// Latest annotated remaining weight; zero for a finished note.
pub fn get_remaining(note: &Note) -> Option<f64> {
    if note.is_finished() {
        return Some(0.0);
    }
    annotations(&note.content).last().map(|a| a.remaining)
}

/// Remaining weight as annotated on or before `date`; zero for a finished note.
///
/// Annotations without a readable date are skipped.
pub fn get_remaining_at(note: &Note, date: Date) -> Option<f64> {
    if note.is_finished() {
        return Some(0.0);
    }
    annotations(&note.content)
        .into_iter()
        .filter(|a| a.date.is_some_and(|d| d <= date))
        .next_back()
        .map(|a| a.remaining)
}

/// Highest integer rating in the brew log's Rating column.
pub fn best_rating(content: &str) -> Option<u16> {
    BREW_ROW
        .captures_iter(content)
        .filter_map(|caps| {
            let cells = caps.get(1)?.as_str();
            let rating = cells.split('|').nth(6)?.trim();
            let digits: String = rating.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()
        })
        .max()
}
