//! Data models shared between the printer library and the bridge service

pub mod format;
pub mod printer;
pub mod rendered;
pub mod scale;
pub mod template;

pub use format::{Align, TextFormat};
pub use printer::{PrinterKind, PrinterSettings};
pub use rendered::{
    BarcodePayload, ImagePayload, QrPayload, RenderedContent, RenderedDocument, RenderedElement,
    RenderedRow, RenderedSection,
};
pub use scale::{
    ScaleConfig, ScaleParity, ScaleRuntimeState, ScaleStatus, normalize_scale_id,
};
pub use template::{
    ElementType, GridField, GridLayout, SectionType, Template, TemplateElement, TemplateSection,
    document_types,
};
