//! Rendered document - format-agnostic output of template rendering
//!
//! Created per print request, consumed once by a command generator.

use serde::{Deserialize, Serialize};

use super::format::{Align, TextFormat};
use super::template::{ElementType, SectionType};

/// Barcode payload resolved from element, properties and data item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarcodePayload {
    pub value: String,
    /// Requested symbology (`CODE128`, `EAN13`, ...); generators fall back when unknown
    pub symbology: Option<String>,
    pub height: Option<u8>,
    pub width: Option<u8>,
    pub item: Option<String>,
    pub name: Option<String>,
    pub price: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload {
    pub value: String,
    pub size: Option<u8>,
}

/// Pre-encoded image data, passed through untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    pub data: String,
}

/// A single rendered element
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedElement {
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub text: String,
    pub align: Align,
    pub format: TextFormat,
    pub width_percent: Option<u8>,
    pub barcode: Option<BarcodePayload>,
    pub qr: Option<QrPayload>,
    pub image: Option<ImagePayload>,
}

impl RenderedElement {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_align(mut self, align: Align) -> Self {
        self.align = align;
        self
    }

    pub fn with_format(mut self, format: TextFormat) -> Self {
        self.format = format;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedRow {
    pub is_header: bool,
    pub cells: Vec<RenderedElement>,
}

/// Section body: flat elements or table rows (header first)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "items")]
pub enum RenderedContent {
    Elements(Vec<RenderedElement>),
    Rows(Vec<RenderedRow>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedSection {
    pub name: String,
    pub section_type: SectionType,
    pub align: Align,
    pub content: RenderedContent,
}

impl RenderedSection {
    pub fn elements(name: &str, elements: Vec<RenderedElement>) -> Self {
        Self {
            name: name.to_string(),
            section_type: SectionType::Static,
            align: Align::Left,
            content: RenderedContent::Elements(elements),
        }
    }

    /// Table rows, or `None` for flat sections
    pub fn rows(&self) -> Option<&[RenderedRow]> {
        match &self.content {
            RenderedContent::Rows(rows) => Some(rows),
            RenderedContent::Elements(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedDocument {
    pub document_type: String,
    pub sections: Vec<RenderedSection>,
}

impl RenderedDocument {
    pub fn new(document_type: &str) -> Self {
        Self {
            document_type: document_type.to_string(),
            sections: Vec::new(),
        }
    }

    pub fn find_section(&self, name: &str) -> Option<&RenderedSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Flatten to plain text lines (used by the matrix fallback layout)
    pub fn text_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for section in &self.sections {
            match &section.content {
                RenderedContent::Elements(elements) => {
                    lines.extend(elements.iter().map(element_line));
                }
                RenderedContent::Rows(rows) => {
                    for row in rows {
                        let cells: Vec<String> = row.cells.iter().map(element_line).collect();
                        lines.push(cells.join(" "));
                    }
                }
            }
        }
        lines
    }
}

fn element_line(element: &RenderedElement) -> String {
    match element.element_type {
        ElementType::Barcode => element
            .barcode
            .as_ref()
            .map(|b| b.value.clone())
            .unwrap_or_else(|| element.text.clone()),
        ElementType::QR => element
            .qr
            .as_ref()
            .map(|q| q.value.clone())
            .unwrap_or_else(|| element.text.clone()),
        ElementType::Image => String::new(),
        _ => element.text.clone(),
    }
}
