use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix of the remaining-weight bucket tag (`⚖05`).
pub const WEIGHT_PREFIX: char = '⚖';
/// Prefix of the latest-consumption period tag (`❉2610`).
pub const PERIOD_PREFIX: char = '❉';
/// Prefix of the best-brew rating tag (`♆9`).
pub const BEST_BREW_PREFIX: char = '♆';
/// Prefix of the container tag (`℥tin`).
pub const CONTAINER_PREFIX: char = '℥';
/// Canonical "finished" sentinel.
pub const FINISHED: &str = "\u{20e0}\u{20e0}\u{20e0}";
/// Alternate spelling of the "finished" sentinel.
pub const FINISHED_ALT: &str = "\u{2327}\u{2327}\u{2327}";

/// A month bucket written `MM.YY` in brew logs and reports.
///
/// Ordering is chronological: year first, then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: u8,
    pub month: u8,
}

impl Period {
    pub fn new(year: u8, month: u8) -> Self {
        Self { year, month }
    }

    /// Parses `MM.YY` or `DD.MM.YY`, keeping the month and year.
    ///
    /// # Examples
    ///
    /// ```
    /// use steep::models::Period;
    ///
    /// assert_eq!(Period::parse_label("10.26"), Some(Period::new(26, 10)));
    /// assert_eq!(Period::parse_label("03.10.26"), Some(Period::new(26, 10)));
    /// assert_eq!(Period::parse_label("26"), None);
    /// ```
    pub fn parse_label(label: &str) -> Option<Self> {
        let mut parts = label.rsplit('.');
        let year = parts.next()?.parse::<u8>().ok()?;
        let month = parts.next()?.parse::<u8>().ok()?;
        if !(1..=12).contains(&month) || year > 99 {
            return None;
        }
        Some(Self { year, month })
    }

    /// Two-digit `YYMM` form used by the period tag.
    pub fn compact(&self) -> String {
        format!("{:02}{:02}", self.year, self.month)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}.{:02}", self.month, self.year)
    }
}

/// Reserved tag vocabulary managed by the engine.
///
/// Every tag string parses to exactly one variant; tags without a reserved
/// prefix are `Plain`. `Display` writes the canonical spelling back.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagKind {
    /// Remaining-weight bucket (`⚖00`, `⚖05`, ..., `⚖99`).
    Weight(u8),
    /// Month of the most recent consumption (`❉YYMM`).
    Period(Period),
    /// Best rating found in the brew log (`♆N`).
    BestBrew(u16),
    /// Storage container (`℥name`).
    Container(String),
    /// The tea is used up.
    Finished,
    /// Any user tag.
    Plain(String),
}

impl TagKind {
    /// Classifies a tag string.
    ///
    /// # Examples
    ///
    /// ```
    /// use steep::models::{Period, TagKind};
    ///
    /// assert_eq!(TagKind::parse("⚖05"), TagKind::Weight(5));
    /// assert_eq!(TagKind::parse("❉2610"), TagKind::Period(Period::new(26, 10)));
    /// assert_eq!(TagKind::parse("♆9"), TagKind::BestBrew(9));
    /// assert_eq!(TagKind::parse("℥tin"), TagKind::Container("tin".into()));
    /// assert_eq!(TagKind::parse("`green"), TagKind::Plain("`green".into()));
    /// ```
    pub fn parse(tag: &str) -> Self {
        if tag == FINISHED || tag == FINISHED_ALT {
            return Self::Finished;
        }

        let mut chars = tag.chars();
        let Some(prefix) = chars.next() else {
            return Self::Plain(String::new());
        };
        let rest = chars.as_str();
        let digits = !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit());

        let parsed = match prefix {
            WEIGHT_PREFIX if digits && rest.len() == 2 => rest.parse().ok().map(Self::Weight),
            PERIOD_PREFIX if digits && rest.len() == 4 => {
                let year = rest[..2].parse().ok();
                let month = rest[2..].parse().ok();
                match (year, month) {
                    (Some(year), Some(month)) if (1..=12).contains(&month) => {
                        Some(Self::Period(Period { year, month }))
                    }
                    _ => None,
                }
            }
            BEST_BREW_PREFIX if digits => rest.parse().ok().map(Self::BestBrew),
            CONTAINER_PREFIX if !rest.is_empty() => Some(Self::Container(rest.to_string())),
            _ => None,
        };

        parsed.unwrap_or_else(|| Self::Plain(tag.to_string()))
    }

    /// Maps a remaining weight in grams to its bucket tag.
    ///
    /// Buckets are 00/05/10/15 below 20 g, tens up to 90, and 99 from 100 g.
    pub fn weight_bucket(remaining: f64) -> Self {
        let bucket = if remaining < 5.0 {
            0
        } else if remaining < 10.0 {
            5
        } else if remaining < 15.0 {
            10
        } else if remaining < 20.0 {
            15
        } else if remaining >= 100.0 {
            99
        } else {
            (remaining / 10.0) as u8 * 10
        };
        Self::Weight(bucket)
    }

    /// True for the variants derived from note content on every scan.
    pub fn is_derived(&self) -> bool {
        matches!(self, Self::Weight(_) | Self::Period(_) | Self::BestBrew(_))
    }

    /// Same variant, ignoring the payload.
    pub fn same_kind(&self, other: &TagKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weight(bucket) => write!(f, "{WEIGHT_PREFIX}{bucket:02}"),
            Self::Period(period) => write!(f, "{PERIOD_PREFIX}{}", period.compact()),
            Self::BestBrew(rating) => write!(f, "{BEST_BREW_PREFIX}{rating}"),
            Self::Container(name) => write!(f, "{CONTAINER_PREFIX}{name}"),
            Self::Finished => write!(f, "{FINISHED}"),
            Self::Plain(tag) => write!(f, "{tag}"),
        }
    }
}
