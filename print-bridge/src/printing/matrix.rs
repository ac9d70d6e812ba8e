//! Dot-matrix page renderer
//!
//! Positions template fields on a fixed character grid and encodes the page
//! as ESC/P rows. Templates without a grid layout are flowed line by line
//! from the rendered document.

use serde_json::Value;
use shared::models::{GridField, GridLayout, PrinterSettings, RenderedDocument, Template};
use ticket_printer::{Charset, EscPBuilder};

use crate::template::resolve::{resolve_items, resolve_text};

/// Widest row (in characters) that fits at normal pitch
pub const NORMAL_PITCH_COLUMNS: usize = 80;

/// Largest page a grid layout may ask for, in rows and in columns
pub const MAX_GRID_SIZE: usize = 255;

/// Fixed rows x columns character page
///
/// Writes use 1-indexed coordinates; anything outside the page is clipped.
/// Both dimensions are capped at [`MAX_GRID_SIZE`].
#[derive(Debug, Clone)]
pub struct CharGrid {
    columns: usize,
    cells: Vec<Vec<char>>,
}

impl CharGrid {
    pub fn new(rows: usize, columns: usize) -> Self {
        let rows = rows.min(MAX_GRID_SIZE);
        let columns = columns.min(MAX_GRID_SIZE);
        Self {
            columns,
            cells: vec![vec![' '; columns]; rows],
        }
    }

    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    /// Write `text` starting at (`row`, `column`), 1-indexed
    pub fn put(&mut self, row: usize, column: usize, text: &str) {
        if row == 0 || column == 0 {
            return;
        }
        let Some(line) = self.cells.get_mut(row - 1) else {
            return;
        };
        let start = column - 1;
        for (col, c) in (start..self.columns).zip(text.chars()) {
            line[col] = if c.is_control() { ' ' } else { c };
        }
    }

    /// Page rows with trailing spaces trimmed
    pub fn lines(&self) -> Vec<String> {
        self.cells
            .iter()
            .map(|row| row.iter().collect::<String>().trim_end().to_string())
            .collect()
    }
}

/// Lay out a grid template against document data
pub fn layout(grid: &GridLayout, data: &Value) -> Vec<String> {
    let mut page = CharGrid::new(grid.rows, grid.columns);

    for field in &grid.fields {
        match field.list_path.as_deref() {
            Some(list) => {
                let items = resolve_items(data, list).unwrap_or_default();
                let step = field.row_increment.unwrap_or(1).max(1);
                let limit = field.max_items.unwrap_or(usize::MAX);
                for (i, item) in items.iter().take(limit).enumerate() {
                    let row = match i.checked_mul(step).and_then(|o| field.row.checked_add(o)) {
                        Some(row) if row <= page.rows() => row,
                        _ => break,
                    };
                    write_field(&mut page, field, row, item);
                }
            }
            None => write_field(&mut page, field, field.row, data),
        }
    }

    page.lines()
}

fn write_field(page: &mut CharGrid, field: &GridField, row: usize, scope: &Value) {
    let value = match (&field.static_value, field.source_path.as_deref()) {
        (Some(v), _) => v.clone(),
        (None, Some(path)) => match resolve_text(scope, path) {
            Some(v) => v,
            None => return,
        },
        (None, None) => return,
    };
    let text = format!("{}{}", field.label.as_deref().unwrap_or(""), value);

    let Some(max) = field.max_length.map(|m| m.min(MAX_GRID_SIZE)) else {
        page.put(row, field.column, &text);
        return;
    };

    let len = text.chars().count();
    if len <= max {
        let text = if field.align_right {
            format!("{:>width$}", text, width = max)
        } else {
            text
        };
        page.put(row, field.column, &text);
        return;
    }

    let head: String = text.chars().take(max).collect();
    page.put(row, field.column, &head);

    // overflow continues at the wrap position, otherwise it is dropped
    if let (Some(wrap_row), Some(wrap_column)) = (field.wrap_row, field.wrap_column) {
        let rest: String = text
            .chars()
            .skip(max)
            .take(field.wrap_max_length.unwrap_or(max))
            .collect();
        page.put(wrap_row, wrap_column, rest.trim_start());
    }
}

/// Dot-matrix page renderer
pub struct MatrixRenderer {
    charset: Charset,
}

impl MatrixRenderer {
    pub fn new(settings: &PrinterSettings) -> Self {
        Self {
            charset: Charset::parse(settings.charset.as_deref()),
        }
    }

    /// Grid layout when the template has one, rendered text lines otherwise
    pub fn render(&self, template: &Template, data: &Value, doc: &RenderedDocument) -> Vec<u8> {
        let lines = match &template.grid_layout {
            Some(grid) => layout(grid, data),
            None => doc.text_lines(),
        };
        self.encode(&lines)
    }

    /// Encode page rows as ESC/P
    ///
    /// Rows wider than [`NORMAL_PITCH_COLUMNS`] switch the whole page to
    /// condensed pitch: one `SI` before the rows, one `DC2` as the last byte.
    pub fn encode(&self, lines: &[String]) -> Vec<u8> {
        let widest = lines
            .iter()
            .map(|l| l.trim_end().chars().count())
            .max()
            .unwrap_or(0);
        let condensed = widest > NORMAL_PITCH_COLUMNS;

        let mut b = EscPBuilder::new(self.charset);
        if condensed {
            b.condensed();
        }
        if let Some(last) = lines.iter().rposition(|l| !l.trim().is_empty()) {
            for line in &lines[..=last] {
                b.row(&strip_controls(line.trim_end()));
            }
        }
        b.form_feed();
        if condensed {
            b.cancel_condensed();
        }
        b.build()
    }
}

fn strip_controls(line: &str) -> String {
    line.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SI: u8 = 0x0F;
    const DC2: u8 = 0x12;
    const FF: u8 = 0x0C;

    fn renderer() -> MatrixRenderer {
        MatrixRenderer::new(&PrinterSettings::new("M1", "LPT1"))
    }

    fn count(bytes: &[u8], b: u8) -> usize {
        bytes.iter().filter(|&&x| x == b).count()
    }

    #[test]
    fn test_grid_clipping() {
        let mut grid = CharGrid::new(3, 10);
        grid.put(1, 8, "ABCDEF");
        grid.put(0, 1, "X");
        grid.put(4, 1, "X");
        grid.put(2, 11, "X");
        assert_eq!(grid.lines(), vec!["       ABC", "", ""]);
    }

    #[test]
    fn test_layout_fields_and_lists() {
        let grid = GridLayout {
            rows: 10,
            columns: 40,
            fields: vec![
                GridField::at(1, 1).with_source("Number"),
                GridField {
                    align_right: true,
                    ..GridField::at(1, 31).with_source("Total").with_max_length(10)
                },
                GridField {
                    list_path: Some("Items".into()),
                    row_increment: Some(2),
                    max_items: Some(2),
                    ..GridField::at(3, 3).with_source("Name")
                },
            ],
        };
        let data = json!({
            "Number": "F-7",
            "Total": "99.90",
            "Items": [{"Name": "Bolt"}, {"Name": "Nut"}, {"Name": "Washer"}]
        });
        let lines = layout(&grid, &data);
        assert_eq!(lines[0], format!("F-7{}{:>10}", " ".repeat(27), "99.90"));
        assert_eq!(lines[2], "  Bolt");
        assert_eq!(lines[4], "  Nut");
        assert_eq!(lines[6], "");
    }

    #[test]
    fn test_oversized_layouts_are_clipped() {
        let grid = GridLayout {
            rows: 1_000_000,
            columns: 1_000_000,
            fields: vec![
                GridField {
                    list_path: Some("Items".into()),
                    row_increment: Some(usize::MAX),
                    ..GridField::at(2, 1).with_source("Name")
                },
                GridField::at(1, usize::MAX).with_source("Number"),
            ],
        };
        let data = json!({
            "Number": "F-8",
            "Items": [{"Name": "Bolt"}, {"Name": "Nut"}, {"Name": "Washer"}]
        });
        let lines = layout(&grid, &data);
        assert_eq!(lines.len(), MAX_GRID_SIZE);
        assert_eq!(lines[0], "");
        assert_eq!(lines[1], "Bolt");
        assert!(lines[2..].iter().all(|l| l.is_empty()));

        let mut page = CharGrid::new(2, 5);
        page.put(usize::MAX, usize::MAX, "X");
        page.put(1, 4, "ABCDEF");
        assert_eq!(page.lines(), vec!["   AB", ""]);
    }

    #[test]
    fn test_wrap_and_truncate() {
        let grid = GridLayout {
            rows: 4,
            columns: 40,
            fields: vec![
                GridField {
                    wrap_row: Some(2),
                    wrap_column: Some(5),
                    ..GridField::at(1, 1).with_source("Address").with_max_length(10)
                },
                GridField::at(3, 1).with_source("Address").with_max_length(10),
            ],
        };
        let lines = layout(&grid, &json!({"Address": "12 Long Street Name"}));
        assert_eq!(lines[0], "12 Long St");
        assert_eq!(lines[1], "    reet Name");
        assert_eq!(lines[2], "12 Long St");
        assert_eq!(lines[3], "");
    }

    #[test]
    fn test_encode_normal_pitch() {
        let lines = vec!["Hello".to_string(), String::new(), "World".to_string(), String::new()];
        let bytes = renderer().encode(&lines);
        assert!(bytes.starts_with(&[0x1B, b'@', 0x1B, b'x', 0, 0x1B, b't', 1, 0x1B, b'R', 0]));
        assert!(bytes.ends_with(b"Hello\r\n\r\nWorld\r\n\x0C"));
        assert_eq!(count(&bytes, SI), 0);
        assert_eq!(count(&bytes, DC2), 0);
    }

    #[test]
    fn test_encode_condensed_once() {
        let lines = vec!["x".repeat(81), "short".to_string(), "y".repeat(100)];
        let bytes = renderer().encode(&lines);
        assert_eq!(count(&bytes, SI), 1);
        assert_eq!(count(&bytes, DC2), 1);
        assert_eq!(bytes[bytes.len() - 1], DC2);
        assert_eq!(bytes[bytes.len() - 2], FF);
        let si = bytes.iter().position(|&b| b == SI).unwrap();
        let first_row = bytes.windows(3).position(|w| w == b"xxx").unwrap();
        assert!(si < first_row);

        // trailing spaces do not count towards the width
        let padded = vec![format!("{}{}", "z".repeat(80), "    ")];
        assert_eq!(count(&renderer().encode(&padded), SI), 0);
    }

    #[test]
    fn test_render_without_grid_flows_document() {
        let template = Template::new("Receipt", vec![]);
        let mut doc = RenderedDocument::new("Receipt");
        doc.sections.push(shared::models::RenderedSection::elements(
            "body",
            vec![shared::models::RenderedElement::text("Line one")],
        ));
        let bytes = renderer().render(&template, &json!({}), &doc);
        assert!(bytes.ends_with(b"Line one\r\n\x0C"));
    }
}
