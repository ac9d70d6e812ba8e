//! Built-in templates
//!
//! Used when a document type has no stored template. They are written back
//! to the template store on first use (and seeded at startup).

use serde_json::json;
use shared::models::{
    ElementType, GridField, GridLayout, SectionType, Template, TemplateElement, TemplateSection,
    document_types,
};

/// Built-in template for a known document type (case-insensitive)
pub fn builtin(document_type: &str) -> Option<Template> {
    let template = if document_types::matches(document_type, document_types::SALE_RECEIPT) {
        sale_receipt()
    } else if document_types::matches(document_type, document_types::KITCHEN_ORDER) {
        kitchen_order()
    } else if document_types::matches(document_type, document_types::INVOICE) {
        invoice()
    } else if document_types::matches(document_type, document_types::BARCODE_STICKER) {
        barcode_sticker()
    } else {
        return None;
    };
    Some(template)
}

/// All built-in templates
pub fn all() -> Vec<Template> {
    document_types::ALL
        .iter()
        .filter_map(|dt| builtin(dt))
        .collect()
}

/// Single-section ticket printed instead of a document that cannot be rendered
pub fn error_ticket(document_type: &str, reason: &str) -> Template {
    let mut template = Template::new(
        document_type,
        vec![
            TemplateSection::new("error", SectionType::Static)
                .with_align("center")
                .with_elements(vec![
                    TemplateElement::fixed("PRINT ERROR").with_format("bold|double"),
                    TemplateElement::of_type(ElementType::Line),
                    TemplateElement::fixed(format!("Document: {}", document_type)),
                    TemplateElement::fixed(reason.to_string()),
                ]),
        ],
    );
    template.id = format!("error-{}", document_type.to_ascii_lowercase());
    template.name = "Error ticket".to_string();
    template
}

fn sale_receipt() -> Template {
    Template::new(
        document_types::SALE_RECEIPT,
        vec![
            TemplateSection::new("header", SectionType::Static)
                .with_order(1)
                .with_align("center")
                .with_elements(vec![
                    TemplateElement::text("", "StoreName").with_format("double"),
                    TemplateElement::text("", "StoreAddress"),
                    TemplateElement::text("COPY:", "CopyMarker").with_format("bold"),
                    TemplateElement::of_type(ElementType::Line),
                ]),
            TemplateSection::new("info", SectionType::Static)
                .with_order(2)
                .with_elements(vec![
                    TemplateElement::text("Receipt: ", "Number").with_format("bold"),
                    TemplateElement::text("Date: ", "Date"),
                    TemplateElement::text("Cashier: ", "Cashier"),
                ]),
            TemplateSection::new("items", SectionType::Table)
                .with_order(3)
                .with_source("Items")
                .with_elements(vec![
                    header_bold(TemplateElement::text("Qty", "Quantity").with_width(10)),
                    header_bold(TemplateElement::text("Item", "Name").with_width(50)),
                    header_bold(
                        TemplateElement::text("Price", "UnitPrice")
                            .with_width(20)
                            .with_align("right")
                            .with_property("decimals", json!(2)),
                    ),
                    header_bold(
                        TemplateElement::text("Total", "Total")
                            .with_width(20)
                            .with_align("right")
                            .with_property("decimals", json!(2)),
                    ),
                ]),
            TemplateSection::new("totals", SectionType::Static)
                .with_order(4)
                .with_align("right")
                .with_elements(vec![
                    TemplateElement::of_type(ElementType::Line),
                    TemplateElement::text("Subtotal: ", "Subtotal")
                        .with_property("decimals", json!(2)),
                    TemplateElement::text("Tax: ", "Tax").with_property("decimals", json!(2)),
                    TemplateElement::text("TOTAL: ", "Total")
                        .with_format("bold|double")
                        .with_property("decimals", json!(2)),
                    TemplateElement::text("Paid by: ", "PaymentMethod"),
                ]),
            TemplateSection::new("footer", SectionType::Static)
                .with_order(5)
                .with_align("center")
                .with_elements(vec![
                    TemplateElement::text("", "FooterMessage"),
                    TemplateElement::of_type(ElementType::QR).with_source("ReceiptUrl"),
                ]),
        ],
    )
}

fn kitchen_order() -> Template {
    Template::new(
        document_types::KITCHEN_ORDER,
        vec![
            TemplateSection::new("header", SectionType::Static)
                .with_order(1)
                .with_align("center")
                .with_elements(vec![
                    TemplateElement::text("", "Table").with_format("double"),
                    TemplateElement::text("Order ", "Number").with_format("bold"),
                    TemplateElement::text("", "Time"),
                    TemplateElement {
                        static_value: Some("=".into()),
                        ..TemplateElement::of_type(ElementType::Line)
                    },
                ]),
            TemplateSection::new("items", SectionType::Table)
                .with_order(2)
                .with_source("Items")
                .with_format("doubleheight")
                .with_elements(vec![
                    TemplateElement::text("Qty", "Quantity").with_width(15),
                    TemplateElement::text("Item", "Name").with_width(85),
                ]),
            TemplateSection::new("notes", SectionType::Static)
                .with_order(3)
                .with_elements(vec![
                    TemplateElement::of_type(ElementType::Line),
                    TemplateElement::text("Note: ", "Notes").with_format("bold"),
                ]),
        ],
    )
}

fn invoice() -> Template {
    let mut template = Template::new(
        document_types::INVOICE,
        vec![
            TemplateSection::new("header", SectionType::Static)
                .with_order(1)
                .with_align("center")
                .with_elements(vec![
                    TemplateElement::text("", "CompanyName").with_format("bold"),
                    TemplateElement::text("Invoice ", "Number"),
                    TemplateElement::text("Date: ", "Date"),
                ]),
            TemplateSection::new("customer", SectionType::Static)
                .with_order(2)
                .with_elements(vec![
                    TemplateElement::text("Customer: ", "Customer.Name"),
                    TemplateElement::text("Address: ", "Customer.Address"),
                    TemplateElement::text("Tax ID: ", "Customer.TaxId"),
                ]),
            TemplateSection::new("items", SectionType::Table)
                .with_order(3)
                .with_source("Items")
                .with_elements(vec![
                    TemplateElement::text("Qty", "Quantity").with_width(10),
                    TemplateElement::text("Description", "Name").with_width(50),
                    TemplateElement::text("Price", "UnitPrice")
                        .with_width(20)
                        .with_align("right")
                        .with_property("decimals", json!(2)),
                    TemplateElement::text("Total", "Total")
                        .with_width(20)
                        .with_align("right")
                        .with_property("decimals", json!(2)),
                ]),
            TemplateSection::new("totals", SectionType::Static)
                .with_order(4)
                .with_align("right")
                .with_elements(vec![
                    TemplateElement::text("Subtotal: ", "Subtotal")
                        .with_property("decimals", json!(2)),
                    TemplateElement::text("Tax: ", "Tax").with_property("decimals", json!(2)),
                    TemplateElement::text("TOTAL: ", "Total")
                        .with_format("bold")
                        .with_property("decimals", json!(2)),
                ]),
        ],
    );
    template.grid_layout = Some(invoice_grid());
    template
}

/// Pre-printed A4 invoice form, 66 rows x 80 columns
fn invoice_grid() -> GridLayout {
    let item = |path: &str, column: usize, len: usize, right: bool| GridField {
        list_path: Some("Items".into()),
        row_increment: Some(1),
        max_items: Some(30),
        align_right: right,
        ..GridField::at(14, column).with_source(path).with_max_length(len)
    };

    GridLayout {
        rows: 66,
        columns: 80,
        fields: vec![
            GridField::at(2, 2).with_source("CompanyName").with_max_length(40),
            GridField::at(2, 56).with_source("Number").with_max_length(24),
            GridField::at(3, 56).with_source("Date").with_max_length(24),
            GridField::at(6, 2).with_source("Customer.Name").with_max_length(50),
            GridField {
                wrap_row: Some(8),
                wrap_column: Some(2),
                wrap_max_length: Some(50),
                ..GridField::at(7, 2).with_source("Customer.Address").with_max_length(50)
            },
            GridField::at(9, 2).with_source("Customer.TaxId").with_max_length(30),
            item("Quantity", 2, 6, true),
            item("Name", 10, 40, false),
            item("UnitPrice", 52, 12, true),
            item("Total", 66, 14, true),
            GridField {
                align_right: true,
                ..GridField::at(58, 66).with_source("Subtotal").with_max_length(14)
            },
            GridField {
                align_right: true,
                ..GridField::at(59, 66).with_source("Tax").with_max_length(14)
            },
            GridField {
                align_right: true,
                label: Some("TOTAL ".into()),
                ..GridField::at(61, 60).with_source("Total").with_max_length(20)
            },
        ],
    }
}

fn barcode_sticker() -> Template {
    Template::new(
        document_types::BARCODE_STICKER,
        vec![
            TemplateSection::new("stickers", SectionType::Repeated)
                .with_source("Labels")
                .with_align("center")
                .with_elements(vec![
                    // caption (name, price) comes from each label item
                    TemplateElement::of_type(ElementType::Barcode)
                        .with_source("Barcode")
                        .with_property("barcodeHeight", json!(60)),
                    TemplateElement::of_type(ElementType::Line),
                ]),
        ],
    )
}

fn header_bold(mut el: TemplateElement) -> TemplateElement {
    el.header_format = Some("bold".to_string());
    el
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup_is_case_insensitive() {
        assert!(builtin("salereceipt").is_some());
        assert!(builtin("KITCHENORDER").is_some());
        assert!(builtin("Unknown").is_none());
        assert_eq!(all().len(), 4);
    }

    #[test]
    fn test_table_column_shapes() {
        let receipt = sale_receipt();
        let items = receipt.sections.iter().find(|s| s.name == "items").unwrap();
        let widths: Vec<u8> = items.elements.iter().filter_map(|e| e.width_percent).collect();
        assert_eq!(widths, vec![10, 50, 20, 20]);

        let kitchen = kitchen_order();
        let items = kitchen.sections.iter().find(|s| s.name == "items").unwrap();
        let widths: Vec<u8> = items.elements.iter().filter_map(|e| e.width_percent).collect();
        assert_eq!(widths, vec![15, 85]);
    }

    #[test]
    fn test_invoice_has_grid() {
        let grid = invoice().grid_layout.unwrap();
        assert_eq!((grid.rows, grid.columns), (66, 80));
        assert!(grid.fields.iter().any(|f| f.list_path.is_some()));
    }

    #[test]
    fn test_error_ticket() {
        let t = error_ticket("Mystery", "No template for document type");
        assert_eq!(t.sections.len(), 1);
        assert_eq!(t.document_type, "Mystery");
    }
}
