//! Template rendering engine
//!
//! Maps document data onto a [`Template`] and produces a format-agnostic
//! [`RenderedDocument`]. Rendering is pure: the same template and data always
//! give an equal document.

use serde_json::Value;
use shared::message::{BarcodeMedia, QrMedia};
use shared::models::{
    Align, BarcodePayload, ElementType, ImagePayload, QrPayload, RenderedContent,
    RenderedDocument, RenderedElement, RenderedRow, RenderedSection, SectionType, Template,
    TemplateElement, TemplateSection, TextFormat,
};
use tracing::warn;

use super::resolve::{resolve, resolve_items, resolve_text, value_text};

/// Name of the section carrying job media
pub const MEDIA_SECTION: &str = "media";

/// Style inherited from the enclosing section (or template globals)
#[derive(Debug, Clone, Copy)]
struct Inherited {
    format: TextFormat,
    align: Align,
}

/// Render a template against document data
pub fn render(template: &Template, data: &Value) -> RenderedDocument {
    let global = Inherited {
        format: template
            .global_styles
            .get("format")
            .and_then(|f| TextFormat::parse(f))
            .unwrap_or_default(),
        align: template
            .global_styles
            .get("align")
            .and_then(|a| Align::parse(a))
            .unwrap_or_default(),
    };

    let mut doc = RenderedDocument::new(&template.document_type);
    for section in sorted(&template.sections, |s| s.order) {
        doc.sections.push(render_section(section, data, global));
    }
    doc
}

/// Stable order: explicit `order` ascending, unordered entries last in
/// declaration order
fn sorted<T>(items: &[T], order: impl Fn(&T) -> Option<i32>) -> Vec<&T> {
    let mut refs: Vec<&T> = items.iter().collect();
    refs.sort_by_key(|item| match order(item) {
        Some(o) => (false, o),
        None => (true, 0),
    });
    refs
}

fn render_section(section: &TemplateSection, data: &Value, global: Inherited) -> RenderedSection {
    let inherited = Inherited {
        format: section
            .format
            .as_deref()
            .and_then(TextFormat::parse)
            .unwrap_or(global.format),
        align: section
            .align
            .as_deref()
            .and_then(Align::parse)
            .unwrap_or(global.align),
    };
    let elements = sorted(&section.elements, |e| e.order);

    let content = match section.section_type {
        SectionType::Static => RenderedContent::Elements(
            elements
                .iter()
                .map(|el| render_element(el, data, inherited, true))
                .collect(),
        ),
        SectionType::Table => {
            let items = section_items(section, data);
            let mut rows = Vec::with_capacity(items.len() + 1);
            rows.push(RenderedRow {
                is_header: true,
                cells: elements
                    .iter()
                    .map(|el| header_cell(el, inherited))
                    .collect(),
            });
            for item in items {
                rows.push(RenderedRow {
                    is_header: false,
                    cells: elements
                        .iter()
                        .map(|el| render_element(el, item, inherited, false))
                        .collect(),
                });
            }
            RenderedContent::Rows(rows)
        }
        SectionType::Repeated => {
            let items = section_items(section, data);
            RenderedContent::Elements(
                items
                    .iter()
                    .flat_map(|item| {
                        elements
                            .iter()
                            .map(move |el| render_element(el, item, inherited, true))
                    })
                    .collect(),
            )
        }
    };

    RenderedSection {
        name: section.name.clone(),
        section_type: section.section_type,
        align: inherited.align,
        content,
    }
}

fn section_items<'a>(section: &TemplateSection, data: &'a Value) -> &'a [Value] {
    let path = section.data_source_path.as_deref().unwrap_or("");
    match resolve_items(data, path) {
        Some(items) => items,
        None => {
            if resolve(data, path).is_some() {
                warn!(section = %section.name, path = %path, "Data source is not a sequence, rendering no rows");
            }
            &[]
        }
    }
}

fn header_cell(el: &TemplateElement, inherited: Inherited) -> RenderedElement {
    let format = el
        .header_format
        .as_deref()
        .and_then(TextFormat::parse)
        .or_else(|| el.format.as_deref().and_then(TextFormat::parse))
        .unwrap_or(inherited.format);
    let align = el
        .header_align
        .as_deref()
        .and_then(Align::parse)
        .or_else(|| el.align.as_deref().and_then(Align::parse))
        .unwrap_or(inherited.align);

    RenderedElement {
        element_type: ElementType::Text,
        text: el.label.clone().unwrap_or_default(),
        align,
        format,
        width_percent: el.width_percent,
        ..Default::default()
    }
}

fn render_element(
    el: &TemplateElement,
    scope: &Value,
    inherited: Inherited,
    with_label: bool,
) -> RenderedElement {
    let mut out = RenderedElement {
        element_type: el.element_type,
        align: el
            .align
            .as_deref()
            .and_then(Align::parse)
            .unwrap_or(inherited.align),
        format: el
            .format
            .as_deref()
            .and_then(TextFormat::parse)
            .unwrap_or(inherited.format),
        width_percent: el.width_percent,
        ..Default::default()
    };

    match el.element_type {
        ElementType::Text => {
            let value = element_value(el, scope).unwrap_or_default();
            out.text = if with_label {
                labelled_text(el.label.as_deref(), &value)
            } else {
                value
            };
        }
        ElementType::Barcode => {
            let payload = BarcodePayload {
                value: element_value(el, scope)
                    .or_else(|| property_text(el, "value"))
                    .or_else(|| scope_text(scope, "value"))
                    .unwrap_or_default(),
                symbology: el
                    .barcode_type
                    .clone()
                    .or_else(|| property_text(el, "barcodeType"))
                    .or_else(|| scope_text(scope, "barcodeType")),
                height: el.barcode_height.or_else(|| property_u8(el, "barcodeHeight")),
                width: el.barcode_width.or_else(|| property_u8(el, "barcodeWidth")),
                item: el
                    .item
                    .clone()
                    .or_else(|| property_text(el, "item"))
                    .or_else(|| scope_text(scope, "item")),
                name: el
                    .name
                    .clone()
                    .or_else(|| property_text(el, "name"))
                    .or_else(|| scope_text(scope, "name")),
                price: el
                    .price
                    .clone()
                    .or_else(|| property_text(el, "price"))
                    .or_else(|| scope_text(scope, "price")),
            };
            out.text = payload.value.clone();
            out.barcode = Some(payload);
        }
        ElementType::QR => {
            let value = element_value(el, scope)
                .or_else(|| property_text(el, "value"))
                .unwrap_or_default();
            out.text = value.clone();
            out.qr = Some(QrPayload {
                value,
                size: el.qr_size.or_else(|| property_u8(el, "qrSize")),
            });
        }
        ElementType::Image => {
            let data = element_value(el, scope)
                .or_else(|| property_text(el, "value"))
                .unwrap_or_default();
            out.image = Some(ImagePayload { data });
        }
        ElementType::Line => {
            let ch = el
                .static_value
                .as_deref()
                .and_then(|s| s.chars().next())
                .unwrap_or('-');
            out.text = ch.to_string();
        }
    }

    out
}

/// `staticValue`, else the value at `sourcePath` (with `decimals` applied)
fn element_value(el: &TemplateElement, scope: &Value) -> Option<String> {
    if let Some(v) = &el.static_value {
        return Some(v.clone());
    }
    let path = el.source_path.as_deref()?;
    let value = resolve(scope, path)?;
    match property_u8(el, "decimals") {
        Some(decimals) => Some(format_decimals(value, decimals as usize)),
        None => value_text(value),
    }
}

fn format_decimals(value: &Value, decimals: usize) -> String {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) => format!("{:.*}", decimals, n),
        None => value_text(value).unwrap_or_default(),
    }
}

/// `label + value`, except a copy marker on an original which prints nothing
fn labelled_text(label: Option<&str>, value: &str) -> String {
    let label = label.unwrap_or("");
    if is_copy_marker(label) && value.trim().eq_ignore_ascii_case("ORIGINAL") {
        return String::new();
    }
    format!("{}{}", label, value)
}

fn is_copy_marker(label: &str) -> bool {
    let label = label.trim();
    label.eq_ignore_ascii_case("COPY:") || label.eq_ignore_ascii_case("COPY")
}

fn property<'a>(el: &'a TemplateElement, key: &str) -> Option<&'a Value> {
    el.properties.get(key).or_else(|| {
        el.properties
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn property_text(el: &TemplateElement, key: &str) -> Option<String> {
    property(el, key).and_then(value_text).filter(|s| !s.is_empty())
}

fn property_u8(el: &TemplateElement, key: &str) -> Option<u8> {
    match property(el, key)? {
        Value::Number(n) => n.as_u64().and_then(|v| u8::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Field of the current data item (only objects carry fields)
fn scope_text(scope: &Value, key: &str) -> Option<String> {
    if !scope.is_object() {
        return None;
    }
    resolve_text(scope, key).filter(|s| !s.is_empty())
}

/// Append job-level media as a final flat section
pub fn append_media(
    doc: &mut RenderedDocument,
    images: &[String],
    barcodes: &[BarcodeMedia],
    qrs: &[QrMedia],
) {
    if images.is_empty() && barcodes.is_empty() && qrs.is_empty() {
        return;
    }

    let mut elements = Vec::with_capacity(images.len() + barcodes.len() + qrs.len());
    for image in images {
        elements.push(RenderedElement {
            element_type: ElementType::Image,
            align: Align::Center,
            image: Some(ImagePayload { data: image.clone() }),
            ..Default::default()
        });
    }
    for barcode in barcodes {
        elements.push(RenderedElement {
            element_type: ElementType::Barcode,
            text: barcode.value.clone(),
            align: Align::Center,
            barcode: Some(BarcodePayload {
                value: barcode.value.clone(),
                symbology: barcode.symbology.clone(),
                ..Default::default()
            }),
            ..Default::default()
        });
    }
    for qr in qrs {
        elements.push(RenderedElement {
            element_type: ElementType::QR,
            text: qr.value.clone(),
            align: Align::Center,
            qr: Some(QrPayload {
                value: qr.value.clone(),
                size: qr.size,
            }),
            ..Default::default()
        });
    }

    let mut section = RenderedSection::elements(MEDIA_SECTION, elements);
    section.align = Align::Center;
    doc.sections.push(section);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn receipt() -> Template {
        Template::new(
            "SaleReceipt",
            vec![
                TemplateSection::new("footer", SectionType::Static)
                    .with_elements(vec![TemplateElement::fixed("Thanks")]),
                TemplateSection::new("items", SectionType::Table)
                    .with_source("Items")
                    .with_order(2)
                    .with_elements(vec![
                        TemplateElement::text("Qty", "Qty").with_width(20),
                        TemplateElement::text("Item", "Name").with_width(50),
                        TemplateElement::text("Total", "Total")
                            .with_width(30)
                            .with_align("right")
                            .with_property("decimals", json!(2)),
                    ]),
                TemplateSection::new("header", SectionType::Static)
                    .with_order(1)
                    .with_align("center")
                    .with_elements(vec![
                        TemplateElement::text("No. ", "Number").with_format("bold"),
                        TemplateElement::text("COPY:", "CopyMarker"),
                    ]),
            ],
        )
    }

    fn data() -> Value {
        json!({
            "Number": "A-1",
            "CopyMarker": "ORIGINAL",
            "Items": [
                {"Qty": 1, "Name": "Tea", "Total": 2},
                {"Qty": 2, "Name": "Cake", "Total": 7.5}
            ]
        })
    }

    #[test]
    fn test_render_is_deterministic() {
        let t = receipt();
        let d = data();
        assert_eq!(render(&t, &d), render(&t, &d));
    }

    #[test]
    fn test_section_order() {
        let doc = render(&receipt(), &data());
        let names: Vec<&str> = doc.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["header", "items", "footer"]);
    }

    #[test]
    fn test_static_labels_and_copy_marker() {
        let doc = render(&receipt(), &data());
        let header = doc.find_section("header").unwrap();
        let RenderedContent::Elements(elements) = &header.content else {
            panic!("expected elements");
        };
        assert_eq!(elements[0].text, "No. A-1");
        assert!(elements[0].format.bold);
        assert_eq!(elements[0].align, Align::Center);
        assert_eq!(elements[1].text, "");

        let copy = render(&receipt(), &json!({"Number": "A-1", "CopyMarker": "COPY 2"}));
        let RenderedContent::Elements(elements) = &copy.find_section("header").unwrap().content
        else {
            panic!("expected elements");
        };
        assert_eq!(elements[1].text, "COPY:COPY 2");
    }

    #[test]
    fn test_table_rows() {
        let doc = render(&receipt(), &data());
        let rows = doc.find_section("items").unwrap().rows().unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].is_header);
        assert_eq!(rows[0].cells.len(), rows[1].cells.len());
        assert_eq!(rows[0].cells[1].text, "Item");
        assert_eq!(rows[0].cells[2].align, Align::Right);
        assert_eq!(rows[1].cells[1].text, "Tea");
        assert_eq!(rows[1].cells[2].text, "2.00");
        assert_eq!(rows[2].cells[2].text, "7.50");
        assert_eq!(rows[2].cells[0].width_percent, Some(20));
    }

    #[test]
    fn test_table_with_non_sequence_is_header_only() {
        let doc = render(&receipt(), &json!({"Items": "nope"}));
        assert_eq!(doc.find_section("items").unwrap().rows().unwrap().len(), 1);
    }

    #[test]
    fn test_header_precedence() {
        let mut el = TemplateElement::text("Price", "p").with_format("underline");
        el.header_format = Some("bold".into());
        let section = TemplateSection::new("t", SectionType::Table)
            .with_source("rows")
            .with_align("right")
            .with_elements(vec![el, TemplateElement::text("Name", "n")]);
        let doc = render(&Template::new("X", vec![section]), &json!({"rows": []}));
        let header = &doc.sections[0].rows().unwrap()[0];
        assert!(header.cells[0].format.bold && !header.cells[0].format.underline);
        assert_eq!(header.cells[0].align, Align::Right);
        assert!(header.cells[1].format.is_plain());
    }

    #[test]
    fn test_repeated_flattens() {
        let section = TemplateSection::new("stickers", SectionType::Repeated)
            .with_source("Labels")
            .with_elements(vec![
                TemplateElement::text("", "name"),
                TemplateElement::of_type(ElementType::Line),
            ]);
        let doc = render(
            &Template::new("BarcodeSticker", vec![section]),
            &json!({"Labels": [{"name": "a"}, {"name": "b"}]}),
        );
        let RenderedContent::Elements(elements) = &doc.sections[0].content else {
            panic!("expected elements");
        };
        let texts: Vec<&str> = elements.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "-", "b", "-"]);
    }

    #[test]
    fn test_barcode_precedence() {
        let mut el = TemplateElement::of_type(ElementType::Barcode).with_source("code");
        el.barcode_type = Some("EAN13".into());
        el = el
            .with_property("barcodeType", json!("CODE39"))
            .with_property("name", json!("From props"))
            .with_property("barcodeHeight", json!(90));
        let section = TemplateSection::new("s", SectionType::Repeated)
            .with_source("items")
            .with_elements(vec![el]);
        let doc = render(
            &Template::new("BarcodeSticker", vec![section]),
            &json!({"items": [{"code": "4006381333931", "name": "From data", "price": "1.99"}]}),
        );
        let RenderedContent::Elements(elements) = &doc.sections[0].content else {
            panic!("expected elements");
        };
        let barcode = elements[0].barcode.as_ref().unwrap();
        assert_eq!(barcode.value, "4006381333931");
        assert_eq!(barcode.symbology.as_deref(), Some("EAN13"));
        assert_eq!(barcode.name.as_deref(), Some("From props"));
        assert_eq!(barcode.price.as_deref(), Some("1.99"));
        assert_eq!(barcode.height, Some(90));
    }

    #[test]
    fn test_qr_and_image() {
        let qr = TemplateElement::of_type(ElementType::QR)
            .with_source("url")
            .with_property("qrSize", json!(5));
        let img = TemplateElement::of_type(ElementType::Image).with_source("logo");
        let section = TemplateSection::new("s", SectionType::Static).with_elements(vec![qr, img]);
        let doc = render(
            &Template::new("X", vec![section]),
            &json!({"url": "https://x.test", "logo": "iVBORw0KGgo="}),
        );
        let RenderedContent::Elements(elements) = &doc.sections[0].content else {
            panic!("expected elements");
        };
        assert_eq!(elements[0].qr.as_ref().unwrap().size, Some(5));
        assert_eq!(elements[1].image.as_ref().unwrap().data, "iVBORw0KGgo=");
    }

    #[test]
    fn test_append_media() {
        let mut doc = RenderedDocument::new("X");
        append_media(&mut doc, &[], &[], &[]);
        assert!(doc.sections.is_empty());

        append_media(
            &mut doc,
            &["img".to_string()],
            &[BarcodeMedia {
                value: "123".into(),
                symbology: None,
            }],
            &[QrMedia {
                value: "q".into(),
                size: Some(4),
            }],
        );
        let media = doc.find_section(MEDIA_SECTION).unwrap();
        let RenderedContent::Elements(elements) = &media.content else {
            panic!("expected elements");
        };
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[2].element_type, ElementType::QR);
    }
}
