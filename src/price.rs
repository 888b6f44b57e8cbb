//! Price text normalization.
//!
//! Source prices use eok (억, 10^8) and man (만, 10^4) units, e.g. "3억 5,000"
//! is 350,000,000 won. Parsing never fails loudly: anything unreadable is `None`.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Serialize, Serializer};

pub const EOK: u64 = 100_000_000;
pub const MAN: u64 = 10_000;

/// Tokens stripped before numeric runs are read
const NOISE_TOKENS: [&str; 3] = ["매매", ",", "원"];

/// Separators of a low-high range price
const RANGE_SEPARATORS: [char; 2] = ['~', '-'];

fn numeric_runs() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)\s*(억|만)?").ok())
        .as_ref()
}

/// Parse a price string into won.
///
/// The first numeric run is read as eok and the second as man, unless a run
/// carries its own unit suffix. A range ("3억~4억") yields the truncated mean
/// of both ends, and is `None` if either end is unreadable.
pub fn parse(text: &str) -> Option<u64> {
    let mut cleaned = text.to_string();
    for token in NOISE_TOKENS {
        cleaned = cleaned.replace(token, "");
    }
    let cleaned = cleaned.trim();

    if let Some((low, high)) = cleaned.split_once(|c| RANGE_SEPARATORS.contains(&c)) {
        let low = parse_single(low)?;
        let high = parse_single(high)?;
        // both ends are bounded by u64, so the sum fits in u128
        return Some(((low as u128 + high as u128) / 2) as u64);
    }

    parse_single(cleaned)
}

fn parse_single(text: &str) -> Option<u64> {
    let mut total: u64 = 0;
    let mut found = false;

    for (position, caps) in numeric_runs()?.captures_iter(text).take(2).enumerate() {
        let scale = match caps.get(2).map(|m| m.as_str()) {
            Some("억") => EOK,
            Some("만") => MAN,
            _ if position == 0 => EOK,
            _ => MAN,
        };
        let value = scaled(&caps[1], scale)?;
        total = total.checked_add(value)?;
        found = true;
    }

    found.then_some(total)
}

/// `run * scale` for a decimal run like "3" or "3.5", truncating sub-unit digits.
fn scaled(run: &str, scale: u64) -> Option<u64> {
    let (int_part, frac_part) = run.split_once('.').unwrap_or((run, ""));
    let mut value = int_part.parse::<u64>().ok()?.checked_mul(scale)?;

    let mut unit = scale;
    for digit in frac_part.chars() {
        unit /= 10;
        if unit == 0 {
            break;
        }
        value = value.checked_add(u64::from(digit.to_digit(10)?) * unit)?;
    }
    Some(value)
}

/// Fixed price bands, inclusive-lower and exclusive-upper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriceBand {
    Unknown,
    Under1Eok,
    From1To3Eok,
    From3To5Eok,
    From5To7Eok,
    Over7Eok,
}

impl PriceBand {
    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Under1Eok => "1억 미만",
            Self::From1To3Eok => "1억~3억",
            Self::From3To5Eok => "3억~5억",
            Self::From5To7Eok => "5억~7억",
            Self::Over7Eok => "7억 이상",
        }
    }
}

impl fmt::Display for PriceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for PriceBand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Bucket a normalized price.
pub fn categorize(price: Option<u64>) -> PriceBand {
    match price {
        None => PriceBand::Unknown,
        Some(p) if p < EOK => PriceBand::Under1Eok,
        Some(p) if p < 3 * EOK => PriceBand::From1To3Eok,
        Some(p) if p < 5 * EOK => PriceBand::From3To5Eok,
        Some(p) if p < 7 * EOK => PriceBand::From5To7Eok,
        Some(_) => PriceBand::Over7Eok,
    }
}
