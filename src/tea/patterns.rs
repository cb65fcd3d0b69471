//! Grammars of the tables and annotations embedded in note content.
//!
//! Every pattern is compiled once and only ever used through `captures_iter`
//! or `find`, so no cursor state is shared between callers.

use std::sync::LazyLock;

use regex::Regex;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|err| panic!("invalid built-in pattern {pattern:?}: {err}"))
}

/// Brew-log row: month label, then a literal weight or a `[#mix]` reference.
pub static BREW: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\n\|\s+(?:\d+\.)?(\d+\.\d+)\s+\|\s+[\w\+]*\s+\|\s+(?:\d+ml)?\s+\|\s+(?:([\d\.]+)g|\[(#[\w\-]+)\])",
    )
});

/// Any brew-log row, capturing the cells after the date.
pub static BREW_ROW: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?m)^\|\s*(?:\d+\.)?\d+\.\d+\s*\|(.*)$"));

/// Header of a brew log.
pub static BREW_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\s+Date\s+\|\s+Wat\s+\|\s+Volum\s+\|\s+Weyt\s+\|\s+Brew\s+\|\s+Time\s+\|\s+Temptr\s+\|\s+Rating\s+\|\s+Tasting Notes\s+\|",
    )
});

/// Brew-log row referencing a mix; marks a note as a mix note.
pub static MIX_BREW: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\n\|\s+(?:\d+\.)?(\d+\.\d+)\s+\|\s+[\w\+]*\s+\|\s+(?:\d+ml)?\s+\|\s+\[(#?[\w\-]+)\]")
});

/// Ingredient binding: `[code]` / `\t~ [Name](:note:<key>)`.
pub static DEFLIST_LINK: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\n\[([\w\-]+)\][ \t]*\n\t~[ \t]+\[[^\]]+\]\(:note:([\w\-]+)\)")
});

/// First line of a mix definition: `[#code]` / `\t~ - N.Ng [ingredient|#]`.
pub static MIX_DEF_BEGIN: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\n\[(#?[\w\-]+)\][ \t]*\n\t~[ \t]+\-[ \t]+([\d\.]+)g[ \t]+\[([\w\-]+|#)\][ \t]*\n")
});

/// Continuation line of a mix definition, anchored at the slice start.
pub static MIX_DEF_LINE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^[ \t]{2,}\-[ \t]+([\d\.]+)g[ \t]+\[([\w\-]+)\][ \t]*\n"));

/// Row back-propagated from a mix into an ingredient note.
pub static MIX_RUN: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\n\|\s+(\d+\.\d+)\s+\|\s+\|\s+\|\s+([\d\.]+)g\s+\|\s+\|\s+\|\s+\|\s+\|\s+\[([^\]\|]+)\]\s+\|",
    )
});

/// Reference footer pointing at a note: `[name]: :note:<key>`.
pub static NOTE_LINK: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\n\[([^\]]+)\]:\s+:note:([\w\-]+)"));

/// Leading heading of a note, optionally bracketed.
pub static NAME: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^#+[ \t]+(?:\[([^\]]+)\]|([^\n]+))"));

/// Remaining annotation: `\t~ N.Ng (DD.MM.YY[, N.Ng])`.
pub static REMAINING: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\n\t+~\s+([\d\.]+)g\s+\(([\d\.]+)(?:,\s+([\d\.,]+)g?)?\)[ \t]*")
});

/// End of the first table, followed by a blank line.
pub static AFTER_TABLE: LazyLock<Regex> = LazyLock::new(|| compile(r"(\|[ \t]*\n)\n"));

/// Separator used to split a table line into cells.
pub static CELL_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| compile(r"\s*\|\s*"));
