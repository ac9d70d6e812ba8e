//! Print Template Model
//!
//! A template maps document data onto an ordered list of sections. Thermal
//! printers consume the section tree; dot-matrix printers may additionally
//! use a positional [`GridLayout`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Section kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionType {
    /// Flat elements resolved against the document root
    #[default]
    Static,
    /// Header row plus one row per item of a sequence
    Table,
    /// Elements repeated per item of a sequence, flattened (stickers, cards)
    Repeated,
}

/// Element kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementType {
    #[default]
    Text,
    Barcode,
    #[serde(alias = "Qr", alias = "qr", alias = "QRCode")]
    QR,
    Image,
    Line,
}

/// Template element
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateElement {
    #[serde(rename = "type", default)]
    pub element_type: ElementType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_align: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width_percent: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode_height: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode_width: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_size: Option<u8>,
    /// Barcode auxiliary fields (direct values win over `properties`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    /// Extended properties (`decimals`, `barcodeType`, `qrSize`, ...)
    #[serde(default, alias = "extraProperties", skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, serde_json::Value>,
}

impl TemplateElement {
    pub fn text(label: impl Into<String>, source_path: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            source_path: Some(source_path.into()),
            ..Default::default()
        }
    }

    pub fn fixed(value: impl Into<String>) -> Self {
        Self {
            static_value: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn of_type(element_type: ElementType) -> Self {
        Self {
            element_type,
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    pub fn with_align(mut self, align: &str) -> Self {
        self.align = Some(align.to_string());
        self
    }

    pub fn with_source(mut self, path: &str) -> Self {
        self.source_path = Some(path.to_string());
        self
    }

    pub fn with_width(mut self, percent: u8) -> Self {
        self.width_percent = Some(percent);
        self
    }

    pub fn with_property(mut self, key: &str, value: serde_json::Value) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }
}

/// Template section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSection {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub section_type: SectionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source_path: Option<String>,
    #[serde(default, alias = "formatHint", skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, alias = "alignHint", skip_serializing_if = "Option::is_none")]
    pub align: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    #[serde(default)]
    pub elements: Vec<TemplateElement>,
}

impl TemplateSection {
    pub fn new(name: &str, section_type: SectionType) -> Self {
        Self {
            name: name.to_string(),
            section_type,
            ..Default::default()
        }
    }

    pub fn with_source(mut self, path: &str) -> Self {
        self.data_source_path = Some(path.to_string());
        self
    }

    pub fn with_align(mut self, align: &str) -> Self {
        self.align = Some(align.to_string());
        self
    }

    pub fn with_format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_elements(mut self, elements: Vec<TemplateElement>) -> Self {
        self.elements = elements;
        self
    }
}

/// Positional field for dot-matrix grid layouts (1-indexed coordinates)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridField {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub row: usize,
    pub column: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Right-align the value inside `max_length` (amount columns)
    #[serde(default)]
    pub align_right: bool,
    /// Sequence to repeat this field over; `source_path` is then item-relative
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_increment: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    /// Where overflow past `max_length` continues
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap_row: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap_column: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap_max_length: Option<usize>,
}

impl GridField {
    pub fn at(row: usize, column: usize) -> Self {
        Self {
            row,
            column,
            ..Default::default()
        }
    }

    pub fn with_source(mut self, path: &str) -> Self {
        self.source_path = Some(path.to_string());
        self
    }

    pub fn with_max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }
}

fn default_grid_rows() -> usize {
    66
}

fn default_grid_columns() -> usize {
    80
}

/// Fixed-size character page for dot-matrix printers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridLayout {
    #[serde(default = "default_grid_rows")]
    pub rows: usize,
    #[serde(default = "default_grid_columns")]
    pub columns: usize,
    #[serde(default)]
    pub fields: Vec<GridField>,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            rows: default_grid_rows(),
            columns: default_grid_columns(),
            fields: Vec::new(),
        }
    }
}

/// Print template entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub document_type: String,
    #[serde(default)]
    pub sections: Vec<TemplateSection>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub global_styles: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_layout: Option<GridLayout>,
}

impl Template {
    pub fn new(document_type: &str, sections: Vec<TemplateSection>) -> Self {
        Self {
            id: document_type.to_ascii_lowercase(),
            name: document_type.to_string(),
            document_type: document_type.to_string(),
            sections,
            ..Default::default()
        }
    }
}

/// Well-known document types
pub mod document_types {
    pub const SALE_RECEIPT: &str = "SaleReceipt";
    pub const KITCHEN_ORDER: &str = "KitchenOrder";
    pub const INVOICE: &str = "Invoice";
    pub const BARCODE_STICKER: &str = "BarcodeSticker";

    pub const ALL: [&str; 4] = [SALE_RECEIPT, KITCHEN_ORDER, INVOICE, BARCODE_STICKER];

    /// Case-insensitive document type comparison
    pub fn matches(document_type: &str, known: &str) -> bool {
        document_type.trim().eq_ignore_ascii_case(known)
    }
}
