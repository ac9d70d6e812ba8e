//! Settings, template and scale configuration stores
//!
//! The print pipeline only sees [`RecordStore`]; [`JsonStore`] is the
//! default file-backed implementation.

mod json_store;

pub use json_store::JsonStore;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::models::{PrinterSettings, ScaleConfig, Template, normalize_scale_id};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record without key in {0}")]
    InvalidKey(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A record kept in a keyed store
pub trait StoreRecord: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const FILE_NAME: &'static str;

    fn key(&self) -> String;

    /// Lookup key normalization (exact by default)
    fn normalize_key(key: &str) -> String {
        key.trim().to_string()
    }
}

impl StoreRecord for PrinterSettings {
    const FILE_NAME: &'static str = "printers.json";

    fn key(&self) -> String {
        self.printer_id.clone()
    }
}

impl StoreRecord for Template {
    const FILE_NAME: &'static str = "templates.json";

    fn key(&self) -> String {
        self.document_type.clone()
    }

    fn normalize_key(key: &str) -> String {
        key.trim().to_lowercase()
    }
}

impl StoreRecord for ScaleConfig {
    const FILE_NAME: &'static str = "scales.json";

    fn key(&self) -> String {
        self.id.clone()
    }

    fn normalize_key(key: &str) -> String {
        normalize_scale_id(key)
    }
}

/// Keyed record store contract
#[async_trait]
pub trait RecordStore<T: Send + Sync + 'static>: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<T>>;

    async fn get_all(&self) -> StoreResult<Vec<T>>;

    /// Insert or replace by key
    async fn save(&self, record: T) -> StoreResult<()>;

    /// Returns whether a record was removed
    async fn delete(&self, key: &str) -> StoreResult<bool>;
}

pub type SettingsStore = Arc<dyn RecordStore<PrinterSettings>>;
pub type TemplateStore = Arc<dyn RecordStore<Template>>;
pub type ScaleStore = Arc<dyn RecordStore<ScaleConfig>>;

/// The three stores opened under one work directory
#[derive(Clone)]
pub struct Stores {
    pub settings: SettingsStore,
    pub templates: TemplateStore,
    pub scales: ScaleStore,
}

impl Stores {
    pub fn open(dir: impl AsRef<std::path::Path>) -> StoreResult<Self> {
        let dir = dir.as_ref();
        Ok(Self {
            settings: Arc::new(JsonStore::<PrinterSettings>::open(dir)?),
            templates: Arc::new(JsonStore::<Template>::open(dir)?),
            scales: Arc::new(JsonStore::<ScaleConfig>::open(dir)?),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            settings: Arc::new(JsonStore::<PrinterSettings>::in_memory()),
            templates: Arc::new(JsonStore::<Template>::in_memory()),
            scales: Arc::new(JsonStore::<ScaleConfig>::in_memory()),
        }
    }
}
