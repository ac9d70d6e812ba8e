//! Scale line protocol
//!
//! Scales stream lines such as `ST,GS,+  15.50kg` or `US,NT,-0,125 lb`.
//! The first numeric token is the weight (comma decimals accepted), `ST` /
//! `US` flag stability and trailing letters name the unit.

/// One parsed weight line
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleReading {
    pub weight: f64,
    pub unit: String,
    pub stable: bool,
}

pub const DEFAULT_UNIT: &str = "kg";

/// Parse one line; lines without digits are noise and yield `None`
pub fn parse_reading(line: &str) -> Option<ScaleReading> {
    let line = line.trim();
    let start = line.find(|c: char| c.is_ascii_digit())?;

    let rest = &line[start..];
    let end = number_len(rest);
    let magnitude: f64 = rest[..end].replace(',', ".").parse().ok()?;

    let negative = line[..start].trim_end().ends_with('-');
    let weight = if negative { -magnitude } else { magnitude };

    let unit: String = rest[end..]
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    let unit = if unit.is_empty() {
        DEFAULT_UNIT.to_string()
    } else {
        unit.to_ascii_lowercase()
    };

    Some(ScaleReading {
        weight,
        unit,
        stable: is_stable(&line[..start]),
    })
}

/// Length of the leading `\d+([.,]\d+)?` token in `s`
fn number_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let digits = |from: usize| {
        bytes[from..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let whole = digits(0);
    match bytes.get(whole) {
        Some(b'.' | b',') => match digits(whole + 1) {
            0 => whole,
            frac => whole + 1 + frac,
        },
        _ => whole,
    }
}

/// `ST` marks a stable reading; `US` or no flag means unstable
fn is_stable(prefix: &str) -> bool {
    let mut stable = false;
    for flag in prefix
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
    {
        if flag.eq_ignore_ascii_case("US") {
            return false;
        }
        if flag.eq_ignore_ascii_case("ST") {
            stable = true;
        }
    }
    stable
}
