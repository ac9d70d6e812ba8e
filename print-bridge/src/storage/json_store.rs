//! Flat JSON file store
//!
//! One file per record type under the work directory, holding a JSON array.
//! Reads are served from memory; every mutation rewrites the file through a
//! temp file + rename.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::{RecordStore, StoreError, StoreRecord, StoreResult};

const WRITE_ATTEMPTS: u32 = 3;

pub struct JsonStore<T: StoreRecord> {
    /// `None` for the in-memory variant
    path: Option<PathBuf>,
    records: Mutex<BTreeMap<String, T>>,
    /// Serializes file writes so snapshots land in mutation order
    write_lock: tokio::sync::Mutex<()>,
}

impl<T: StoreRecord> JsonStore<T> {
    /// Open (or create) `<dir>/<T::FILE_NAME>`
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(T::FILE_NAME);

        let mut records = BTreeMap::new();
        if path.exists() {
            let raw = std::fs::read(&path)?;
            if !raw.iter().all(u8::is_ascii_whitespace) {
                let items: Vec<T> = serde_json::from_slice(&raw)?;
                for item in items {
                    records.insert(T::normalize_key(&item.key()), item);
                }
            }
        }
        debug!(file = %path.display(), count = records.len(), "Store opened");

        Ok(Self {
            path: Some(path),
            records: Mutex::new(records),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Volatile store (tests, dry runs)
    pub fn in_memory() -> Self {
        Self {
            path: None,
            records: Mutex::new(BTreeMap::new()),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[instrument(skip(self), fields(file = T::FILE_NAME))]
    async fn persist(&self) -> StoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let _guard = self.write_lock.lock().await;
        let snapshot: Vec<T> = self.records.lock().values().cloned().collect();
        let body = serde_json::to_vec_pretty(&snapshot)?;
        let tmp = path.with_extension("json.tmp");

        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = async {
                tokio::fs::write(&tmp, &body).await?;
                tokio::fs::rename(&tmp, path).await
            }
            .await;

            match result {
                Ok(()) => return Ok(()),
                Err(e) if attempt < WRITE_ATTEMPTS => {
                    warn!(error = %e, attempt, "Store write failed, retrying");
                    tokio::time::sleep(Duration::from_millis(50 * attempt as u64)).await;
                }
                Err(e) => return Err(StoreError::Io(e)),
            }
        }
    }
}

#[async_trait]
impl<T: StoreRecord> RecordStore<T> for JsonStore<T> {
    async fn get(&self, key: &str) -> StoreResult<Option<T>> {
        Ok(self.records.lock().get(&T::normalize_key(key)).cloned())
    }

    async fn get_all(&self) -> StoreResult<Vec<T>> {
        Ok(self.records.lock().values().cloned().collect())
    }

    async fn save(&self, record: T) -> StoreResult<()> {
        let key = T::normalize_key(&record.key());
        if key.is_empty() {
            return Err(StoreError::InvalidKey(T::FILE_NAME.to_string()));
        }
        self.records.lock().insert(key, record);
        self.persist().await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let removed = self.records.lock().remove(&T::normalize_key(key)).is_some();
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{PrinterSettings, ScaleConfig, Template};

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store: JsonStore<PrinterSettings> = JsonStore::open(dir.path()).unwrap();
            store.save(PrinterSettings::new("P1", "10.0.0.5")).await.unwrap();
            store.save(PrinterSettings::new("P2", "Kitchen")).await.unwrap();
            assert!(store.delete("P2").await.unwrap());
            assert!(!store.delete("P2").await.unwrap());
        }

        let reopened: JsonStore<PrinterSettings> = JsonStore::open(dir.path()).unwrap();
        let all = reopened.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].connection_target, "10.0.0.5");
        assert!(!dir.path().join("printers.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_case_insensitive_keys() {
        let store: JsonStore<Template> = JsonStore::in_memory();
        store.save(Template::new("SaleReceipt", vec![])).await.unwrap();
        assert!(store.get("salereceipt").await.unwrap().is_some());

        let scales: JsonStore<ScaleConfig> = JsonStore::in_memory();
        scales.save(ScaleConfig::new("Deli", "/dev/ttyUSB0")).await.unwrap();
        assert!(scales.get("DELI").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("templates.json"), b"{not json").unwrap();
        assert!(JsonStore::<Template>::open(dir.path()).is_err());
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let store: JsonStore<PrinterSettings> = JsonStore::in_memory();
        assert!(store.save(PrinterSettings::new("  ", "x")).await.is_err());
    }
}
