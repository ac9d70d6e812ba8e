//! Text charset handling for receipt printers
//!
//! Printers render a fixed grid of single-width cells. CJK glyphs take two
//! cells, everything else one. This module provides:
//! - Charset selection commands
//! - Display width, truncation and padding in printer cells
//! - Text encoding that never touches command bytes (callers encode text
//!   only, commands are written raw)

/// Text code page sent to the printer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Charset {
    /// Text bytes are written verbatim as UTF-8
    #[default]
    Utf8,
    /// Chinese printers (GBK double-byte mode)
    Gbk,
    /// Western European printers (WPC1252)
    Cp1252,
}

/// Euro sign on GBK printers: leave Chinese mode, select PC858, print 0xD5,
/// re-enter Chinese mode
const GBK_EURO: [u8; 8] = [0x1C, 0x2E, 0x1B, 0x74, 19, 0xD5, 0x1C, 0x26];

impl Charset {
    /// Parse a printer's configured charset; unknown or missing means UTF-8
    pub fn parse(name: Option<&str>) -> Self {
        let Some(name) = name else {
            return Charset::Utf8;
        };
        match name.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "gbk" | "gb2312" | "gb18030" | "cp936" => Charset::Gbk,
            "cp1252" | "windows1252" | "wpc1252" | "latin1" | "iso88591" => Charset::Cp1252,
            _ => Charset::Utf8,
        }
    }

    /// ESC/POS code page selection sent right after `ESC @`
    pub fn select_command(&self) -> &'static [u8] {
        match self {
            // FS & (enable Chinese mode), FS C 1 (GBK)
            Charset::Gbk => &[0x1C, 0x26, 0x1C, 0x43, 0x01],
            // ESC t 16 (WPC1252)
            Charset::Cp1252 => &[0x1B, 0x74, 16],
            Charset::Utf8 => &[],
        }
    }

    /// Encode text for this charset; unmappable characters become `?`
    pub fn encode(&self, s: &str) -> Vec<u8> {
        match self {
            Charset::Utf8 => s.as_bytes().to_vec(),
            Charset::Gbk => {
                let mut out = Vec::with_capacity(s.len() * 2);
                for c in s.chars() {
                    if c == '€' {
                        out.extend_from_slice(&GBK_EURO);
                    } else {
                        encode_char(encoding_rs::GBK, c, &mut out);
                    }
                }
                out
            }
            Charset::Cp1252 => {
                let mut out = Vec::with_capacity(s.len());
                for c in s.chars() {
                    encode_char(encoding_rs::WINDOWS_1252, c, &mut out);
                }
                out
            }
        }
    }

    /// Printer cells occupied by a single character
    pub fn char_width(&self, c: char) -> usize {
        if c.is_ascii() {
            return 1;
        }
        match self {
            Charset::Gbk => {
                let mut buf = [0u8; 4];
                let (cow, _, had_errors) = encoding_rs::GBK.encode(c.encode_utf8(&mut buf));
                if had_errors { 1 } else { cow.len().max(1) }
            }
            _ if is_wide(c) => 2,
            _ => 1,
        }
    }

    /// Printer cells occupied by a string
    pub fn width(&self, s: &str) -> usize {
        s.chars().map(|c| self.char_width(c)).sum()
    }

    /// Truncate a string to fit within `max_width` cells
    pub fn truncate(&self, s: &str, max_width: usize) -> String {
        let mut width = 0;
        let mut result = String::new();
        for c in s.chars() {
            let w = self.char_width(c);
            if width + w > max_width {
                break;
            }
            result.push(c);
            width += w;
        }
        result
    }

    /// Pad a string to exactly `width` cells
    ///
    /// If the string is longer than the width, it will be truncated.
    pub fn pad(&self, s: &str, width: usize, align_right: bool) -> String {
        let current = self.width(s);
        if current >= width {
            let cut = self.truncate(s, width);
            // a wide glyph may leave one cell short
            let missing = width - self.width(&cut);
            return format!("{}{}", cut, " ".repeat(missing));
        }
        let spaces = width - current;
        if align_right {
            format!("{}{}", " ".repeat(spaces), s)
        } else {
            format!("{}{}", s, " ".repeat(spaces))
        }
    }

    /// Center a string within `width` cells (left-biased)
    pub fn center(&self, s: &str, width: usize) -> String {
        let current = self.width(s);
        if current >= width {
            return self.pad(s, width, false);
        }
        let left = (width - current) / 2;
        let right = width - current - left;
        format!("{}{}{}", " ".repeat(left), s, " ".repeat(right))
    }
}

fn encode_char(encoding: &'static encoding_rs::Encoding, c: char, out: &mut Vec<u8>) {
    if c.is_ascii() {
        out.push(c as u8);
        return;
    }
    let mut buf = [0u8; 4];
    let (cow, _, had_errors) = encoding.encode(c.encode_utf8(&mut buf));
    if had_errors {
        out.push(b'?');
    } else {
        out.extend_from_slice(&cow);
    }
}

/// East Asian wide ranges (approximate, covers CJK, Hangul and fullwidth forms)
fn is_wide(c: char) -> bool {
    matches!(c as u32,
        0x1100..=0x115F
        | 0x2E80..=0x303E
        | 0x3041..=0x33FF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xA000..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(Charset::parse(None), Charset::Utf8);
        assert_eq!(Charset::parse(Some("GBK")), Charset::Gbk);
        assert_eq!(Charset::parse(Some("windows-1252")), Charset::Cp1252);
        assert_eq!(Charset::parse(Some("klingon")), Charset::Utf8);
    }

    #[test]
    fn test_width() {
        assert_eq!(Charset::Gbk.width("hello"), 5);
        assert_eq!(Charset::Gbk.width("你好"), 4);
        assert_eq!(Charset::Utf8.width("AB中文CD"), 8);
        assert_eq!(Charset::Cp1252.width("café"), 4);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(Charset::Utf8.truncate("hello world", 5), "hello");
        assert_eq!(Charset::Gbk.truncate("你好世界", 4), "你好");
        assert_eq!(Charset::Gbk.truncate("AB中文", 4), "AB中");
    }

    #[test]
    fn test_pad() {
        assert_eq!(Charset::Utf8.pad("hi", 5, false), "hi   ");
        assert_eq!(Charset::Utf8.pad("hi", 5, true), "   hi");
        assert_eq!(Charset::Utf8.pad("hello world", 5, false), "hello");
        assert_eq!(Charset::Utf8.pad("中文", 3, false), "中 ");
        assert_eq!(Charset::Utf8.center("ab", 6), "  ab  ");
    }

    #[test]
    fn test_encode() {
        assert_eq!(Charset::Utf8.encode("é"), "é".as_bytes());
        assert_eq!(Charset::Cp1252.encode("é"), vec![0xE9]);
        assert_eq!(Charset::Cp1252.encode("中"), vec![b'?']);
        assert_eq!(Charset::Gbk.encode("中").len(), 2);
        assert_eq!(Charset::Gbk.encode("€"), GBK_EURO.to_vec());
    }
}
