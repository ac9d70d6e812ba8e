//! ESC/P command builder for 9/24-pin dot-matrix printers
//!
//! Output is row oriented: every row ends in CR LF, a page ends in FF.

use crate::encoding::Charset;

const ESC: u8 = 0x1B;
/// Condensed mode on
pub const SI: u8 = 0x0F;
/// Condensed mode off
pub const DC2: u8 = 0x12;
pub const FF: u8 = 0x0C;

/// ESC/P command builder
#[derive(Debug)]
pub struct EscPBuilder {
    buf: Vec<u8>,
    charset: Charset,
}

impl EscPBuilder {
    /// Reset the printer and select draft quality, the PC437 character
    /// table and the USA international set
    pub fn new(charset: Charset) -> Self {
        let mut buf = Vec::with_capacity(8192);
        buf.extend_from_slice(&[ESC, b'@']);
        buf.extend_from_slice(&[ESC, b'x', 0]);
        buf.extend_from_slice(&[ESC, b't', 1]);
        buf.extend_from_slice(&[ESC, b'R', 0]);
        Self { buf, charset }
    }

    /// Condensed pitch (17 cpi), fits 136 columns on a standard carriage
    pub fn condensed(&mut self) -> &mut Self {
        self.buf.push(SI);
        self
    }

    pub fn cancel_condensed(&mut self) -> &mut Self {
        self.buf.push(DC2);
        self
    }

    /// Write one text row followed by CR LF
    pub fn row(&mut self, text: &str) -> &mut Self {
        let bytes = self.charset.encode(text);
        self.buf.extend_from_slice(&bytes);
        self.buf.extend_from_slice(b"\r\n");
        self
    }

    pub fn form_feed(&mut self) -> &mut Self {
        self.buf.push(FF);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for EscPBuilder {
    fn default() -> Self {
        Self::new(Charset::Utf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preamble() {
        let data = EscPBuilder::default().build();
        assert_eq!(data, vec![ESC, b'@', ESC, b'x', 0, ESC, b't', 1, ESC, b'R', 0]);
    }

    #[test]
    fn test_rows_and_page() {
        let mut b = EscPBuilder::default();
        b.condensed().row("AB").row("").form_feed().cancel_condensed();
        let data = b.build();
        assert!(data.ends_with(&[SI, b'A', b'B', b'\r', b'\n', b'\r', b'\n', FF, DC2]));
    }
}
