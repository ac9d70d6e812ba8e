//! Template layer: data path resolution, rendering and template lookup

pub mod defaults;
mod engine;
pub mod resolve;
mod service;

pub use engine::{MEDIA_SECTION, append_media, render};
pub use service::TemplateService;
