//! Back-propagation of mix brews into their ingredient notes.
//!
//! A brew of `[#m1]` in a mix note consumes each ingredient of `#m1`. Every
//! ingredient note gets one canonical row per month naming the mix, and a
//! reference footer linking back to the mix note, so its own consumption and
//! remaining figures include what the blends used.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::extract::{format_grams, is_mix, load_mixes};
use super::patterns::{AFTER_TABLE, MIX_BREW, MIX_RUN, NAME, NOTE_LINK};
use crate::models::{NoteKey, Period};
use crate::store::{NoteMap, WriteBatch};

/// Grams of one ingredient per month, in brew-log order.
type MonthlyGrams = Vec<(Period, f64)>;

/// Display name of a mix: its first heading, brackets stripped.
pub fn mix_name(content: &str) -> Option<String> {
    let caps = NAME.captures(content)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// Grams used per ingredient note and month by the brews of a mix note.
pub fn mix_brews(content: &str) -> BTreeMap<NoteKey, MonthlyGrams> {
    let mixes = load_mixes(content);
    let mut brews: BTreeMap<NoteKey, MonthlyGrams> = BTreeMap::new();

    for caps in MIX_BREW.captures_iter(content) {
        let (Some(label), Some(code)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let Some(period) = Period::parse_label(label.as_str()) else {
            continue;
        };
        let Some(mix) = mixes.get(code.as_str()) else {
            debug!(code = code.as_str(), "brew references an undefined mix");
            continue;
        };

        for (ingredient, grams) in &mix.ingredients {
            let months = brews.entry(ingredient.clone()).or_default();
            match months.iter_mut().find(|(p, _)| *p == period) {
                Some(entry) => entry.1 += grams,
                None => months.push((period, *grams)),
            }
        }
    }

    brews
}

fn mix_row(period: Period, grams: f64, name: &str) -> String {
    format!(
        "| {period} |     |       |  {}g  |      |       |        |        | [{name}] |",
        format_grams(grams)
    )
}

/// Rewrites an ingredient note so it carries the mix rows and footer.
///
/// Existing rows for the mix are updated in place when their weight differs;
/// missing months are inserted after the first table, or appended when the
/// note has none.
pub fn apply_mix_rows(
    content: &str,
    name: &str,
    mix_key: &NoteKey,
    months: &[(Period, f64)],
) -> String {
    let mut pending = months.to_vec();
    let mut out = String::with_capacity(content.len());
    let mut cursor = 0;

    for caps in MIX_RUN.captures_iter(content) {
        let (Some(whole), Some(label), Some(grams), Some(run)) =
            (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
        else {
            continue;
        };
        if run.as_str() != name {
            continue;
        }
        let Some(period) = Period::parse_label(label.as_str()) else {
            continue;
        };
        let Some(position) = pending.iter().position(|(p, _)| *p == period) else {
            continue;
        };

        let (_, weight) = pending.remove(position);
        let written: Option<f64> = grams.as_str().parse().ok();
        if written.map(format_grams).as_deref() != Some(format_grams(weight).as_str()) {
            // keep the leading newline of the match
            out.push_str(&content[cursor..whole.start() + 1]);
            out.push_str(&mix_row(period, weight, name));
            cursor = whole.end();
        }
    }
    out.push_str(&content[cursor..]);

    if !pending.is_empty() {
        let rows: String = pending
            .iter()
            .map(|&(period, grams)| format!("{}\n", mix_row(period, grams, name)))
            .collect();

        let table_end = AFTER_TABLE
            .captures(&out)
            .and_then(|caps| caps.get(1))
            .map(|m| m.end());
        match table_end {
            Some(position) => out.insert_str(position, &rows),
            None => out.push_str(&format!("\n{rows}\n")),
        }
    }

    let mut has_links = false;
    let mut linked = false;
    for caps in NOTE_LINK.captures_iter(&out) {
        has_links = true;
        if caps.get(1).is_some_and(|m| m.as_str() == name) {
            linked = true;
            break;
        }
    }

    if !linked {
        if !has_links {
            out.push_str("\n\n");
        }
        out.push_str(&format!("\n[{name}]: :note:{mix_key}"));
    }

    out
}

/// Propagates the brews of one mix note into its ingredient notes.
///
/// Ingredient notes whose content ends up unchanged are not staged.
pub fn update_mix(mix_key: &NoteKey, notes: &mut NoteMap, batch: &mut WriteBatch) -> usize {
    let Some(mix) = notes.get(mix_key) else {
        return 0;
    };
    let Some(name) = mix_name(&mix.content) else {
        warn!(note_key = %mix_key, "mix note has no title, skipping");
        return 0;
    };
    let brews = mix_brews(&mix.content);

    let mut staged = 0;
    for (ingredient, months) in brews {
        if ingredient == *mix_key {
            continue;
        }
        let Some(note) = notes.get_mut(&ingredient) else {
            debug!(note_key = %ingredient, mix = %name, "ingredient note not found");
            continue;
        };

        let before = note.digest();
        let content = apply_mix_rows(&note.content, &name, mix_key, &months);
        note.set_content(content);

        if note.digest() != before {
            batch.stage(note);
            staged += 1;
        }
    }

    staged
}

/// Runs [`update_mix`] for every live mix note.
pub fn update_mixes(notes: &mut NoteMap, batch: &mut WriteBatch) -> usize {
    let mix_keys: Vec<NoteKey> = notes
        .iter()
        .filter(|note| is_mix(note))
        .map(|note| note.key.clone())
        .collect();

    mix_keys
        .iter()
        .map(|key| update_mix(key, notes, batch))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NoteBuilder;
    use crate::tea::extract::get_consumptions;

    const LOG_HEADER: &str = "| Date | Wat | Volum | Weyt | Brew | Time | Temptr | Rating | Tasting Notes |\n| --- | --- | --- | --- | --- | --- | --- | --- | --- |";

    fn mix_note() -> String {
        format!(
            "# [Morning Blend]\n\n{LOG_HEADER}\n| 03.10.26 |     |       | [#m1] | | | | | |\n| 05.10.26 |     |       | [#m1] | | | | | |\n| 01.11.26 |     |       | [#m1] | | | | | |\n\n[#m1]\n\t~ - 6.0g [#]\n\t  - 4.0g [sen]\n\t  - 2.0g [gen]\n\n[sen]\n\t~ [Sencha](:note:k-sen)\n\n[gen]\n\t~ [Genmai](:note:k-gen)\n"
        )
    }

    fn notes() -> NoteMap {
        [
            NoteBuilder::new().key("k-mix").content(mix_note()).build(),
            NoteBuilder::new()
                .key("k-sen")
                .content(format!("# Sencha\n\n{LOG_HEADER}\n| 02.10.26 | soft | 100ml | 3.0g | | | | | |\n\nnotes\n"))
                .build(),
            NoteBuilder::new().key("k-gen").content("# Genmai\n").build(),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn brews_accumulate_per_ingredient_and_month() {
        let brews = mix_brews(&mix_note());
        assert_eq!(
            brews[&NoteKey::new("k-sen")],
            vec![(Period::new(26, 10), 8.0), (Period::new(26, 11), 4.0)]
        );
        assert_eq!(brews[&NoteKey::new("k-gen")][0], (Period::new(26, 10), 4.0));
        assert_eq!(mix_name(&mix_note()).as_deref(), Some("Morning Blend"));
    }

    #[test]
    fn rows_land_after_the_first_table_with_a_footer() {
        let mut notes = notes();
        let mut batch = WriteBatch::new();
        assert_eq!(update_mixes(&mut notes, &mut batch), 2);

        let sencha = &notes.get(&NoteKey::new("k-sen")).unwrap().content;
        assert!(sencha.contains(
            "| 3.0g | | | | | |\n| 10.26 |     |       |  8.0g  |      |       |        |        | [Morning Blend] |\n| 11.26 |"
        ));
        assert!(sencha.ends_with("\n\n\n[Morning Blend]: :note:k-mix"));
        assert_eq!(get_consumptions(sencha)[&Period::new(26, 10)], 11.0);

        let genmai = &notes.get(&NoteKey::new("k-gen")).unwrap().content;
        assert!(genmai.starts_with("# Genmai\n\n| 10.26 |"));
    }

    #[test]
    fn second_pass_changes_nothing() {
        let mut notes = notes();
        update_mixes(&mut notes, &mut WriteBatch::new());
        let first: Vec<String> = notes.iter().map(|n| n.content.clone()).collect();

        let mut batch = WriteBatch::new();
        assert_eq!(update_mixes(&mut notes, &mut batch), 0);
        assert!(batch.is_empty());
        let second: Vec<String> = notes.iter().map(|n| n.content.clone()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn stale_rows_are_rewritten_in_place() {
        let content = "# Sencha\n\n| 10.26 |     |       |  1.0g  |      |       |        |        | [Morning Blend] |\n\n[Morning Blend]: :note:k-mix";
        let updated = apply_mix_rows(
            content,
            "Morning Blend",
            &NoteKey::new("k-mix"),
            &[(Period::new(26, 10), 8.0)],
        );
        assert_eq!(
            updated,
            "# Sencha\n\n| 10.26 |     |       |  8.0g  |      |       |        |        | [Morning Blend] |\n\n[Morning Blend]: :note:k-mix"
        );
    }
}
