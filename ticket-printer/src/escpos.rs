//! ESC/POS command builder
//!
//! Provides a fluent API for building ESC/POS print data for thermal
//! printers. Text goes through the builder's [`Charset`]; command bytes are
//! written untouched.

use crate::encoding::Charset;
use crate::error::BarcodeError;

/// Byte-mode capacity of a version 40 Model 2 symbol at level L
pub const MAX_QR_BYTES: usize = 2953;

/// `ESC !` print mode flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrintMode {
    pub bold: bool,
    pub underline: bool,
    pub double_height: bool,
    pub double_width: bool,
}

impl PrintMode {
    /// Bit layout of `ESC ! n`
    pub fn bits(&self) -> u8 {
        let mut n = 0u8;
        if self.bold {
            n |= 0x08;
        }
        if self.double_height {
            n |= 0x10;
        }
        if self.double_width {
            n |= 0x20;
        }
        if self.underline {
            n |= 0x80;
        }
        n
    }
}

/// 1D barcode symbologies (`GS k` format B)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbology {
    UpcA,
    UpcE,
    Ean13,
    Ean8,
    Code39,
    Itf,
    Codabar,
    Code93,
    Code128,
}

impl Symbology {
    /// Parse a symbology name (`EAN13`, `ean-13`, `Code 128`, ...)
    pub fn parse(name: &str) -> Option<Self> {
        let key: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_uppercase();
        match key.as_str() {
            "UPCA" | "UPC" => Some(Symbology::UpcA),
            "UPCE" => Some(Symbology::UpcE),
            "EAN13" | "JAN13" => Some(Symbology::Ean13),
            "EAN8" | "JAN8" => Some(Symbology::Ean8),
            "CODE39" => Some(Symbology::Code39),
            "ITF" | "ITF14" | "INTERLEAVED2OF5" => Some(Symbology::Itf),
            "CODABAR" | "NW7" => Some(Symbology::Codabar),
            "CODE93" => Some(Symbology::Code93),
            "CODE128" => Some(Symbology::Code128),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Symbology::UpcA => "UPC-A",
            Symbology::UpcE => "UPC-E",
            Symbology::Ean13 => "EAN13",
            Symbology::Ean8 => "EAN8",
            Symbology::Code39 => "CODE39",
            Symbology::Itf => "ITF",
            Symbology::Codabar => "CODABAR",
            Symbology::Code93 => "CODE93",
            Symbology::Code128 => "CODE128",
        }
    }

    /// `m` parameter of `GS k m n d1...dn`
    fn code(&self) -> u8 {
        match self {
            Symbology::UpcA => 65,
            Symbology::UpcE => 66,
            Symbology::Ean13 => 67,
            Symbology::Ean8 => 68,
            Symbology::Code39 => 69,
            Symbology::Itf => 70,
            Symbology::Codabar => 71,
            Symbology::Code93 => 72,
            Symbology::Code128 => 73,
        }
    }

    /// Check that `value` is encodable by this symbology
    pub fn validate(&self, value: &str) -> Result<(), BarcodeError> {
        if value.is_empty() {
            return Err(BarcodeError::Empty);
        }
        if value.len() > 253 {
            return Err(BarcodeError::TooLong(value.len()));
        }

        let invalid = |reason: &'static str| BarcodeError::InvalidData {
            symbology: self.name(),
            value: value.to_string(),
            reason,
        };
        let digits = value.bytes().all(|b| b.is_ascii_digit());
        let len = value.len();

        match self {
            Symbology::UpcA if !digits || !(11..=12).contains(&len) => {
                Err(invalid("expected 11-12 digits"))
            }
            Symbology::UpcE if !digits || !(6..=8).contains(&len) => {
                Err(invalid("expected 6-8 digits"))
            }
            Symbology::Ean13 if !digits || !(12..=13).contains(&len) => {
                Err(invalid("expected 12-13 digits"))
            }
            Symbology::Ean8 if !digits || !(7..=8).contains(&len) => {
                Err(invalid("expected 7-8 digits"))
            }
            Symbology::Itf if !digits || len % 2 != 0 => {
                Err(invalid("expected an even number of digits"))
            }
            Symbology::Code39
                if !value
                    .bytes()
                    .all(|b| b.is_ascii_digit() || b.is_ascii_uppercase() || b" $%*+-./".contains(&b)) =>
            {
                Err(invalid("expected 0-9, A-Z or $%*+-./ and space"))
            }
            Symbology::Codabar
                if !value
                    .bytes()
                    .all(|b| b.is_ascii_digit() || b"ABCDabcd$+-./:".contains(&b)) =>
            {
                Err(invalid("expected 0-9, A-D or $+-./:"))
            }
            Symbology::Code93 | Symbology::Code128 if !value.is_ascii() => {
                Err(invalid("expected ASCII characters"))
            }
            _ => Ok(()),
        }
    }
}

/// ESC/POS command builder
///
/// Builds ESC/POS byte sequences for thermal printers.
#[derive(Debug)]
pub struct EscPosBuilder {
    buf: Vec<u8>,
    width: usize,
    charset: Charset,
}

impl EscPosBuilder {
    /// Create a new builder with the specified paper width in characters
    ///
    /// Common widths:
    /// - 58mm paper: 32 characters
    /// - 80mm paper: 48 characters
    pub fn new(width: usize, charset: Charset) -> Self {
        let mut buf = Vec::with_capacity(4096);
        // Initialize printer (ESC @)
        buf.extend_from_slice(&[0x1B, 0x40]);
        buf.extend_from_slice(charset.select_command());
        Self {
            buf,
            width,
            charset,
        }
    }

    /// Get the configured paper width
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    // === Text Output ===

    /// Write text in the builder's charset
    pub fn text(&mut self, s: &str) -> &mut Self {
        let bytes = self.charset.encode(s);
        self.buf.extend_from_slice(&bytes);
        self
    }

    /// Write text followed by newline
    pub fn line(&mut self, s: &str) -> &mut Self {
        self.text(s);
        self.buf.push(b'\n');
        self
    }

    /// Write empty line
    pub fn newline(&mut self) -> &mut Self {
        self.buf.push(b'\n');
        self
    }

    /// Print and feed n lines
    pub fn feed(&mut self, lines: u8) -> &mut Self {
        // ESC d n
        self.buf.extend_from_slice(&[0x1B, 0x64, lines]);
        self
    }

    // === Alignment ===

    /// Align text to center
    pub fn center(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x01]);
        self
    }

    /// Align text to left (default)
    pub fn left(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x00]);
        self
    }

    /// Align text to right
    pub fn right(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x02]);
        self
    }

    // === Text Style ===

    /// Select print mode (`ESC ! n`)
    pub fn print_mode(&mut self, mode: PrintMode) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x21, mode.bits()]);
        self
    }

    /// Back to the plain print mode
    pub fn reset_mode(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x21, 0x00]);
        self
    }

    // === Separators ===

    /// Print a full-width line of `ch`
    pub fn sep(&mut self, ch: char) -> &mut Self {
        let cell = self.charset.char_width(ch).max(1);
        self.line(&ch.to_string().repeat(self.width / cell))
    }

    // === Layout Helpers ===

    /// Print left and right text on the same line
    ///
    /// Left text is left-aligned, right text is right-aligned,
    /// with spaces filling the gap.
    pub fn line_lr(&mut self, left: &str, right: &str) -> &mut Self {
        let lw = self.charset.width(left);
        let rw = self.charset.width(right);

        if lw + rw >= self.width {
            // Too long, just print with space
            self.text(left);
            self.text(" ");
            self.line(right);
        } else {
            let spaces = self.width - lw - rw;
            self.text(left);
            self.text(&" ".repeat(spaces));
            self.line(right);
        }
        self
    }

    // === Barcode ===

    /// Print a 1D barcode with human readable text below
    ///
    /// Height is in dots (1-255), module width 2-6. Nothing is written when
    /// the value is rejected.
    pub fn barcode(
        &mut self,
        symbology: Symbology,
        value: &str,
        height: u8,
        module_width: u8,
    ) -> Result<&mut Self, BarcodeError> {
        symbology.validate(value)?;

        let mut data = Vec::with_capacity(value.len() + 2);
        if symbology == Symbology::Code128 && !value.starts_with('{') {
            // code set B
            data.extend_from_slice(b"{B");
        }
        data.extend_from_slice(value.as_bytes());
        if data.len() > 255 {
            return Err(BarcodeError::TooLong(data.len()));
        }

        // GS H 2 - HRI below
        self.buf.extend_from_slice(&[0x1D, 0x48, 0x02]);
        // GS h n - height
        self.buf.extend_from_slice(&[0x1D, 0x68, height.max(1)]);
        // GS w n - module width
        self.buf
            .extend_from_slice(&[0x1D, 0x77, module_width.clamp(2, 6)]);
        // GS k m n d1...dn
        self.buf
            .extend_from_slice(&[0x1D, 0x6B, symbology.code(), data.len() as u8]);
        self.buf.extend_from_slice(&data);
        self.buf.push(b'\n');
        Ok(self)
    }

    // === QR Code ===

    /// Print a QR code
    ///
    /// Size: 1-16 (module size in dots). Payloads a Model 2 symbol cannot
    /// hold are rejected and nothing is written.
    pub fn qr_code(&mut self, data: &str, size: u8) -> Result<&mut Self, BarcodeError> {
        if data.is_empty() {
            return Err(BarcodeError::Empty);
        }
        if data.len() > MAX_QR_BYTES {
            return Err(BarcodeError::TooLong(data.len()));
        }
        let size = size.clamp(1, 16);

        // Function 165: Select model (Model 2)
        self.buf
            .extend_from_slice(&[0x1D, 0x28, 0x6B, 0x04, 0x00, 0x31, 0x41, 0x32, 0x00]);

        // Function 167: Set module size
        self.buf
            .extend_from_slice(&[0x1D, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x43, size]);

        // Function 169: Set error correction (M)
        self.buf
            .extend_from_slice(&[0x1D, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x45, 0x31]);

        // Function 180: Store data
        let data_bytes = data.as_bytes();
        let len = data_bytes.len() + 3;
        let [p_l, p_h] = (len as u16).to_le_bytes();
        self.buf
            .extend_from_slice(&[0x1D, 0x28, 0x6B, p_l, p_h, 0x31, 0x50, 0x30]);
        self.buf.extend_from_slice(data_bytes);

        // Function 181: Print
        self.buf
            .extend_from_slice(&[0x1D, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x51, 0x30]);

        self.buf.push(b'\n');
        Ok(self)
    }

    // === Peripherals ===

    /// Open cash drawer (pin 2)
    pub fn open_drawer(&mut self) -> &mut Self {
        // ESC p m t1 t2 - Generate pulse on pin m
        self.buf.extend_from_slice(&[0x1B, 0x70, 0x00, 25, 250]);
        self
    }

    /// Buzzer: `times` beeps of `duration` x 50ms (`ESC B n t`)
    pub fn beep(&mut self, times: u8, duration: u8) -> &mut Self {
        self.buf
            .extend_from_slice(&[0x1B, 0x42, times.clamp(1, 9), duration.clamp(1, 9)]);
        self
    }

    /// Cut paper (full cut, `GS V 0`)
    pub fn cut(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x56, 0x00]);
        self
    }

    // === Raw Commands ===

    /// Write raw bytes directly
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    // === Build ===

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for EscPosBuilder {
    fn default() -> Self {
        Self::new(48, Charset::Utf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_builder_init() {
        let data = EscPosBuilder::new(32, Charset::Gbk).build();
        assert_eq!(&data[..2], &[0x1B, 0x40]);
        assert_eq!(&data[2..], Charset::Gbk.select_command());
    }

    #[test]
    fn test_print_mode_bits() {
        let mode = PrintMode {
            bold: true,
            underline: true,
            double_height: true,
            double_width: true,
        };
        assert_eq!(mode.bits(), 0xB8);
        assert_eq!(PrintMode::default().bits(), 0);

        let mut b = EscPosBuilder::default();
        b.print_mode(PrintMode {
            bold: true,
            ..Default::default()
        });
        assert!(contains(&b.build(), &[0x1B, 0x21, 0x08]));
    }

    #[test]
    fn test_line_lr() {
        let mut b = EscPosBuilder::new(20, Charset::Utf8);
        b.line_lr("左", "右");

        let s = String::from_utf8_lossy(&b.build()).to_string();
        assert!(s.contains(&format!("左{}右", " ".repeat(16))));
    }

    #[test]
    fn test_separator() {
        let mut b = EscPosBuilder::new(10, Charset::Utf8);
        b.sep('=');
        let s = String::from_utf8_lossy(&b.build()).to_string();
        assert!(s.contains("==========\n"));
    }

    #[test]
    fn test_symbology_parse() {
        assert_eq!(Symbology::parse("ean-13"), Some(Symbology::Ean13));
        assert_eq!(Symbology::parse("Code 128"), Some(Symbology::Code128));
        assert_eq!(Symbology::parse("UPC-A"), Some(Symbology::UpcA));
        assert_eq!(Symbology::parse("PDF417"), None);
    }

    #[test]
    fn test_barcode_code128() {
        let mut b = EscPosBuilder::new(48, Charset::Utf8);
        b.barcode(Symbology::Code128, "AB-12", 80, 3).unwrap();
        let data = b.build();
        assert!(contains(&data, &[0x1D, 0x68, 80]));
        assert!(contains(&data, &[0x1D, 0x77, 3]));
        assert!(contains(&data, &[0x1D, 0x6B, 73, 7, b'{', b'B', b'A', b'B']));
    }

    #[test]
    fn test_barcode_rejects_invalid() {
        let mut b = EscPosBuilder::new(48, Charset::Utf8);
        let err = b.barcode(Symbology::Ean13, "12345ABC", 80, 3).unwrap_err();
        assert!(matches!(err, BarcodeError::InvalidData { .. }));
        assert!(err.to_string().contains("EAN13"));
        assert_eq!(b.build(), vec![0x1B, 0x40]);

        assert_eq!(Symbology::Code39.validate(""), Err(BarcodeError::Empty));
        assert!(Symbology::Ean8.validate("1234567").is_ok());
        assert!(Symbology::Itf.validate("123").is_err());
    }

    #[test]
    fn test_qr_model_2() {
        let mut b = EscPosBuilder::default();
        b.qr_code("hi", 40).unwrap();
        let data = b.build();
        assert!(contains(&data, &[0x1D, 0x28, 0x6B, 0x04, 0x00, 0x31, 0x41, 0x32, 0x00]));
        assert!(contains(&data, &[0x31, 0x43, 16]));
        assert!(contains(&data, &[0x1D, 0x28, 0x6B, 5, 0, 0x31, 0x50, 0x30, b'h', b'i']));
    }

    #[test]
    fn test_qr_rejects_oversized_payload() {
        let mut b = EscPosBuilder::default();
        assert_eq!(b.qr_code("", 6).err(), Some(BarcodeError::Empty));

        let big = "A".repeat(70_000);
        assert_eq!(b.qr_code(&big, 6).err(), Some(BarcodeError::TooLong(70_000)));
        assert_eq!(b.build(), vec![0x1B, 0x40]);

        let mut b = EscPosBuilder::default();
        let max = "A".repeat(MAX_QR_BYTES);
        b.qr_code(&max, 6).unwrap();
        let [p_l, p_h] = ((MAX_QR_BYTES + 3) as u16).to_le_bytes();
        assert!(contains(&b.build(), &[0x1D, 0x28, 0x6B, p_l, p_h, 0x31, 0x50, 0x30]));
    }

    #[test]
    fn test_peripherals() {
        let mut b = EscPosBuilder::default();
        b.open_drawer().beep(2, 3).cut();
        let data = b.build();
        assert!(contains(&data, &[0x1B, 0x70, 0x00, 25, 250]));
        assert!(contains(&data, &[0x1B, 0x42, 2, 3]));
        assert!(data.ends_with(&[0x1D, 0x56, 0x00]));
    }
}
