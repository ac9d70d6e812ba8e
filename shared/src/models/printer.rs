//! Printer Settings Model

use serde::{Deserialize, Serialize};

/// Printer command family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrinterKind {
    /// ESC/POS thermal receipt printer
    #[default]
    #[serde(alias = "thermal", alias = "THERMAL", alias = "EscPos")]
    Thermal,
    /// ESC/P dot-matrix printer
    #[serde(alias = "matrix", alias = "MATRIX", alias = "DotMatrix", alias = "EscP")]
    Matrix,
}

/// Printer entity, read-only to the print pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterSettings {
    pub printer_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub printer_type: PrinterKind,
    /// `ip[:port]`, local queue name, or `ipp://` / `http(s)://` URI
    pub connection_target: String,
    #[serde(default)]
    pub paper_width_mm: Option<u32>,
    #[serde(default)]
    pub beep_on_print: bool,
    #[serde(default)]
    pub open_drawer_before: bool,
    #[serde(default)]
    pub open_drawer_after: bool,
    #[serde(default)]
    pub copy_to_printer_ids: Vec<String>,
    /// Text code page: `utf8` (verbatim), `gbk`, `cp1252`
    #[serde(default)]
    pub charset: Option<String>,
}

impl PrinterSettings {
    pub fn new(printer_id: &str, connection_target: &str) -> Self {
        Self {
            printer_id: printer_id.to_string(),
            connection_target: connection_target.to_string(),
            ..Default::default()
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.printer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_deserialize() {
        let json = r#"{
            "printerId": "P1",
            "type": "Matrix",
            "connectionTarget": "192.168.1.50:9100",
            "paperWidthMm": 80,
            "copyToPrinterIds": ["P2"]
        }"#;
        let s: PrinterSettings = serde_json::from_str(json).unwrap();
        assert_eq!(s.printer_type, PrinterKind::Matrix);
        assert_eq!(s.paper_width_mm, Some(80));
        assert_eq!(s.copy_to_printer_ids, vec!["P2".to_string()]);
        assert!(!s.beep_on_print);
        assert_eq!(s.display_name(), "P1");
    }
}
