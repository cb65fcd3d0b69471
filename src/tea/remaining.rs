//! Remaining-weight bookkeeping and the derived tags that follow it.

use time::Date;
use tracing::debug;

use super::extract::{
    annotations, best_rating, format_date, format_grams, get_consumptions, get_remaining,
    has_annotation, period_of,
};
use crate::models::{Note, TagKind};
use crate::store::{NoteMap, WriteBatch};

/// Where a brew note is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrewState {
    /// Nothing recorded yet.
    Unknown,
    /// Brews or remaining annotations recorded, not finished.
    Active,
    /// Carries a finished sentinel.
    Finished,
}

pub fn brew_state(note: &Note) -> BrewState {
    if note.is_finished() {
        BrewState::Finished
    } else if has_annotation(&note.content) || !get_consumptions(&note.content).is_empty() {
        BrewState::Active
    } else {
        BrewState::Unknown
    }
}

/// Replaces every tag of the same kind as `tag` with `tag`.
///
/// Returns whether the tags changed. An already correct, unique tag is left
/// where it is.
pub fn set_derived_tag(tags: &mut Vec<String>, tag: TagKind) -> bool {
    let canonical = tag.to_string();
    let same: Vec<usize> = tags
        .iter()
        .enumerate()
        .filter(|(_, t)| TagKind::parse(t).same_kind(&tag))
        .map(|(i, _)| i)
        .collect();

    if same.len() == 1 && tags[same[0]] == canonical {
        return false;
    }

    tags.retain(|t| !TagKind::parse(t).same_kind(&tag));
    tags.push(canonical);
    true
}

fn remove_containers(tags: &mut Vec<String>) -> bool {
    let before = tags.len();
    tags.retain(|t| !matches!(TagKind::parse(t), TagKind::Container(_)));
    tags.len() != before
}

/// Brings a note's remaining annotation and derived tags up to date.
///
/// Finished notes get a closing `0.0g` annotation, the `⚖00` bucket and lose
/// their container tags. Other annotated notes get a new annotation when the
/// recomputed remaining weight drifts from the last one by more than
/// `tolerance` grams, then their weight, period and best-brew tags are
/// refreshed. Returns whether content or tags changed.
pub fn update_remaining(note: &mut Note, today: Date, tolerance: f64) -> bool {
    let before = note.digest();
    let history = annotations(&note.content);

    if note.is_finished() {
        if let Some(last) = history.last()
            && last.remaining != 0.0
        {
            let line = format!("\n\t~ 0.0g ({})", format_date(today));
            note.content.insert_str(last.end, &line);
        }
        set_derived_tag(&mut note.tags, TagKind::Weight(0));
        remove_containers(&mut note.tags);
    } else if let (Some(initial), Some(last)) = (history.first(), history.last()) {
        let consumptions = get_consumptions(&note.content);
        let since = initial.date.map(period_of);
        let consumed: f64 = consumptions
            .iter()
            .filter(|(period, _)| since.is_none_or(|since| **period >= since))
            .map(|(_, grams)| grams)
            .sum();
        let remaining = (initial.remaining - consumed).max(0.0);

        let effective = if (last.remaining - remaining).abs() > tolerance {
            debug!(
                note_key = %note.key,
                annotated = last.remaining,
                remaining,
                "remaining weight drifted, annotating"
            );
            let line = format!(
                "\n\t~ {}g ({}, {}g)",
                format_grams(remaining),
                format_date(today),
                format_grams(consumed)
            );
            note.content.insert_str(last.end, &line);
            remaining
        } else {
            last.remaining
        };

        set_derived_tag(&mut note.tags, TagKind::weight_bucket(effective));
        if let Some(latest) = consumptions.keys().next_back() {
            set_derived_tag(&mut note.tags, TagKind::Period(*latest));
        }
        if let Some(rating) = best_rating(&note.content) {
            set_derived_tag(&mut note.tags, TagKind::BestBrew(rating));
        }
    }

    note.digest() != before
}

/// Runs [`update_remaining`] over every live annotated note, staging the
/// notes that changed. Returns how many were staged.
pub fn update_all_remaining(
    notes: &mut NoteMap,
    batch: &mut WriteBatch,
    today: Date,
    tolerance: f64,
) -> usize {
    let mut staged = 0;
    for note in notes.iter_mut() {
        if note.is_trashed || !has_annotation(&note.content) {
            continue;
        }
        if update_remaining(note, today, tolerance) {
            batch.stage(note);
            staged += 1;
        }
    }
    staged
}

/// Stock overview across a set of notes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemainingSummary {
    /// Sum of the remaining weight of every counted note.
    pub total: f64,
    /// Unfinished notes with a remaining annotation.
    pub available: usize,
    /// Unfinished notes without one.
    pub unknown: usize,
}

impl std::fmt::Display for RemainingSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Remaining: {}g / {}", format_grams(self.total), self.available)?;
        if self.unknown > 0 {
            write!(f, "  ({})", self.unknown)?;
        }
        Ok(())
    }
}

/// Summarises the remaining stock of `notes`, ignoring finished ones.
pub fn remaining_summary<'a>(notes: impl IntoIterator<Item = &'a Note>) -> RemainingSummary {
    let mut summary = RemainingSummary::default();
    for note in notes {
        if note.is_finished() {
            continue;
        }
        match get_remaining(note) {
            Some(remaining) => {
                summary.total += remaining;
                summary.available += 1;
            }
            None => summary.unknown += 1,
        }
    }
    summary
}
