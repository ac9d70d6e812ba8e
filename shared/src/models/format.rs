//! Text alignment and style hints shared by templates and rendered output

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Horizontal alignment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

impl Align {
    /// Parse a loose alignment hint ("center", "CENTRE", "r", ...)
    ///
    /// Unknown hints yield `None` so callers can fall back to the next level.
    pub fn parse(hint: &str) -> Option<Self> {
        match hint.trim().to_ascii_lowercase().as_str() {
            "left" | "l" | "start" => Some(Align::Left),
            "center" | "centre" | "c" | "middle" => Some(Align::Center),
            "right" | "r" | "end" => Some(Align::Right),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for Align {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Align::parse(&raw).unwrap_or_default())
    }
}

impl fmt::Display for Align {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Align::Left => write!(f, "left"),
            Align::Center => write!(f, "center"),
            Align::Right => write!(f, "right"),
        }
    }
}

/// Character style flags
///
/// Parsed from template format hints such as `"bold"`, `"bold|underline"`
/// or `"double"`. Tokens may be separated by `|`, `,`, `+` or whitespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextFormat {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub double_height: bool,
    #[serde(default)]
    pub double_width: bool,
}

impl TextFormat {
    pub const PLAIN: TextFormat = TextFormat {
        bold: false,
        underline: false,
        double_height: false,
        double_width: false,
    };

    /// Parse a format hint; returns `None` when no token is recognised
    pub fn parse(hint: &str) -> Option<Self> {
        let mut format = TextFormat::default();
        let mut recognised = false;

        for token in hint
            .split(|c: char| c == '|' || c == ',' || c == '+' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_ascii_lowercase().replace(['-', '_'], "");
            match token.as_str() {
                "bold" | "b" | "strong" => format.bold = true,
                "underline" | "u" => format.underline = true,
                "doubleheight" | "tall" | "dh" => format.double_height = true,
                "doublewidth" | "wide" | "dw" => format.double_width = true,
                "double" | "large" | "big" | "doublesize" => {
                    format.double_height = true;
                    format.double_width = true;
                }
                "normal" | "plain" | "regular" => {}
                _ => continue,
            }
            recognised = true;
        }

        recognised.then_some(format)
    }

    pub fn is_plain(&self) -> bool {
        *self == Self::PLAIN
    }

    /// Width multiplier applied by the printer
    pub fn width_factor(&self) -> usize {
        if self.double_width { 2 } else { 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_parse() {
        assert_eq!(Align::parse("CENTER"), Some(Align::Center));
        assert_eq!(Align::parse(" right "), Some(Align::Right));
        assert_eq!(Align::parse("justify"), None);
    }

    #[test]
    fn test_format_parse() {
        let f = TextFormat::parse("bold|underline").unwrap();
        assert!(f.bold && f.underline);
        assert!(!f.double_height);

        let f = TextFormat::parse("Double").unwrap();
        assert!(f.double_height && f.double_width);
        assert_eq!(f.width_factor(), 2);

        assert_eq!(TextFormat::parse("italic"), None);
        assert_eq!(TextFormat::parse("normal"), Some(TextFormat::PLAIN));
    }
}
