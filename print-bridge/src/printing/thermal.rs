//! Thermal ticket renderer
//!
//! Turns a [`RenderedDocument`] into ESC/POS bytes for one printer.

use shared::models::{
    Align, BarcodePayload, ElementType, PrinterSettings, QrPayload, RenderedContent,
    RenderedDocument, RenderedElement, RenderedRow, TextFormat, document_types,
};
use ticket_printer::{Charset, EscPosBuilder, PrintMode, Symbology};
use tracing::debug;

const DEFAULT_BARCODE_HEIGHT: u8 = 80;
const DEFAULT_BARCODE_WIDTH: u8 = 3;
const DEFAULT_QR_SIZE: u8 = 6;
const TRAILING_FEED: u8 = 4;

const SALE_RECEIPT_COLUMNS: [u8; 4] = [10, 50, 20, 20];
const KITCHEN_ORDER_COLUMNS: [u8; 2] = [15, 85];

/// Characters per line for a paper width: 80mm → 48, anything else → 32
pub fn chars_per_line(paper_width_mm: Option<u32>) -> usize {
    match paper_width_mm {
        Some(80) => 48,
        _ => 32,
    }
}

/// Thermal ticket renderer
///
/// Paper width and charset come from the printer settings; peripherals
/// (drawer, buzzer) follow the settings flags.
pub struct ThermalRenderer<'a> {
    settings: &'a PrinterSettings,
    width: usize,
    charset: Charset,
}

impl<'a> ThermalRenderer<'a> {
    pub fn new(settings: &'a PrinterSettings) -> Self {
        Self {
            settings,
            width: chars_per_line(settings.paper_width_mm),
            charset: Charset::parse(settings.charset.as_deref()),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Render a document to ESC/POS bytes
    pub fn render(&self, doc: &RenderedDocument) -> Vec<u8> {
        let mut b = EscPosBuilder::new(self.width, self.charset);

        if self.settings.open_drawer_before {
            b.open_drawer();
        }

        for section in &doc.sections {
            match &section.content {
                RenderedContent::Elements(elements) => {
                    for el in elements {
                        self.render_element(&mut b, el);
                    }
                }
                RenderedContent::Rows(rows) => {
                    self.render_table(&mut b, &doc.document_type, rows);
                }
            }
        }

        b.left();
        b.feed(TRAILING_FEED);
        if self.settings.open_drawer_after {
            b.open_drawer();
        }
        if self.settings.beep_on_print {
            b.beep(2, 3);
        }
        b.cut();
        b.build()
    }

    fn render_element(&self, b: &mut EscPosBuilder, el: &RenderedElement) {
        align(b, el.align);
        match el.element_type {
            ElementType::Text => {
                // copy marker on an original, unresolved fields
                if el.text.is_empty() {
                    return;
                }
                styled_line(b, el.format, &el.text);
            }
            ElementType::Line => {
                let ch = el.text.chars().next().unwrap_or('-');
                b.sep(ch);
            }
            ElementType::Barcode => {
                let fallback = BarcodePayload {
                    value: el.text.clone(),
                    ..Default::default()
                };
                self.render_barcode(b, el.barcode.as_ref().unwrap_or(&fallback));
            }
            ElementType::QR => {
                let fallback = QrPayload {
                    value: el.text.clone(),
                    size: None,
                };
                let qr = el.qr.as_ref().unwrap_or(&fallback);
                if qr.value.is_empty() {
                    return;
                }
                let result = b
                    .qr_code(&qr.value, qr.size.unwrap_or(DEFAULT_QR_SIZE))
                    .map(|_| ());
                if let Err(e) = result {
                    b.line(&format!("[QR ERROR: {}]", e));
                }
            }
            ElementType::Image => {
                b.line("[IMAGE]");
            }
        }
    }

    fn render_barcode(&self, b: &mut EscPosBuilder, barcode: &BarcodePayload) {
        let caption = barcode.name.as_deref().or(barcode.item.as_deref());
        match (caption, barcode.price.as_deref()) {
            (Some(left), Some(right)) => {
                b.line_lr(left, right);
            }
            (Some(text), None) | (None, Some(text)) => {
                b.line(text);
            }
            (None, None) => {}
        }

        let symbology = match barcode.symbology.as_deref() {
            None => Symbology::Code128,
            Some(name) => Symbology::parse(name).unwrap_or_else(|| {
                debug!(symbology = %name, "Unsupported symbology, using CODE128");
                Symbology::Code128
            }),
        };

        let result = b
            .barcode(
                symbology,
                &barcode.value,
                barcode.height.unwrap_or(DEFAULT_BARCODE_HEIGHT),
                barcode.width.unwrap_or(DEFAULT_BARCODE_WIDTH),
            )
            .map(|_| ());
        if let Err(e) = result {
            b.line(&format!("[BARCODE ERROR: {}]", e));
        }
    }

    // === Tables ===

    fn render_table(&self, b: &mut EscPosBuilder, document_type: &str, rows: &[RenderedRow]) {
        b.left();
        for row in rows {
            match column_percents(document_type, &row.cells) {
                Some(percents) => {
                    let text = self.compose_row(&row.cells, &percents);
                    styled_line(b, row_format(&row.cells), &text);
                }
                None => {
                    for cell in &row.cells {
                        self.render_element(b, cell);
                    }
                    b.left();
                }
            }
        }
    }

    /// One fixed-width line; every cell truncated and padded to its column
    fn compose_row(&self, cells: &[RenderedElement], percents: &[u8]) -> String {
        let widths = column_widths(self.width, percents);
        let last = cells.len().saturating_sub(1);
        let mut line = String::with_capacity(self.width);

        for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
            // one space gap between columns
            let inner = if i < last { width.saturating_sub(1) } else { width };
            let text = self.charset.truncate(&cell.text, inner);
            let mut padded = match cell.align {
                Align::Left => self.charset.pad(&text, inner, false),
                Align::Right => self.charset.pad(&text, inner, true),
                Align::Center => self.charset.center(&text, inner),
            };
            if i < last && width > 0 {
                padded.push(' ');
            }
            line.push_str(&padded);
        }
        line.trim_end().to_string()
    }
}

/// Column percentages for a table row, or `None` to print it cell by cell
fn column_percents(document_type: &str, cells: &[RenderedElement]) -> Option<Vec<u8>> {
    if document_types::matches(document_type, document_types::SALE_RECEIPT)
        && cells.len() == SALE_RECEIPT_COLUMNS.len()
    {
        return Some(SALE_RECEIPT_COLUMNS.to_vec());
    }
    if document_types::matches(document_type, document_types::KITCHEN_ORDER)
        && cells.len() == KITCHEN_ORDER_COLUMNS.len()
    {
        return Some(KITCHEN_ORDER_COLUMNS.to_vec());
    }

    let percents: Option<Vec<u8>> = cells.iter().map(|c| c.width_percent).collect();
    percents.filter(|p| !p.is_empty() && p.iter().map(|&v| v as u32).sum::<u32>() == 100)
}

/// Character widths for percentages; the last column takes the remainder
fn column_widths(total: usize, percents: &[u8]) -> Vec<usize> {
    let mut widths: Vec<usize> = percents
        .iter()
        .map(|&p| total * p as usize / 100)
        .collect();
    let used: usize = widths.iter().sum();
    if let Some(last) = widths.last_mut() {
        *last += total.saturating_sub(used);
    }
    widths
}

/// Row style: union of cell flags, without double width (columns are fixed)
fn row_format(cells: &[RenderedElement]) -> TextFormat {
    cells.iter().fold(TextFormat::PLAIN, |acc, c| TextFormat {
        bold: acc.bold || c.format.bold,
        underline: acc.underline || c.format.underline,
        double_height: acc.double_height || c.format.double_height,
        double_width: false,
    })
}

fn align(b: &mut EscPosBuilder, align: Align) {
    match align {
        Align::Left => b.left(),
        Align::Center => b.center(),
        Align::Right => b.right(),
    };
}

/// Print one line with `ESC !` flags, resetting afterwards
fn styled_line(b: &mut EscPosBuilder, format: TextFormat, text: &str) {
    if format.is_plain() {
        b.line(text);
        return;
    }
    b.print_mode(PrintMode {
        bold: format.bold,
        underline: format.underline,
        double_height: format.double_height,
        double_width: format.double_width,
    });
    b.line(text);
    b.reset_mode();
}
