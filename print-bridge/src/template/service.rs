//! Template service - template lookup with built-in fallback

use shared::models::Template;
use tracing::{info, instrument, warn};

use super::defaults;
use crate::storage::{StoreResult, TemplateStore};

/// Template service
///
/// 职责:
/// - 按 documentType 加载模板 (不区分大小写)
/// - 缺失时使用内置模板并回写存储
/// - 无内置模板或存储失败时返回错误小票模板
#[derive(Clone)]
pub struct TemplateService {
    store: TemplateStore,
}

impl TemplateService {
    pub fn new(store: TemplateStore) -> Self {
        Self { store }
    }

    /// Template to print `document_type` with; never fails
    #[instrument(skip(self))]
    pub async fn template_for(&self, document_type: &str) -> Template {
        match self.store.get(document_type).await {
            Ok(Some(template)) => template,
            Ok(None) => match defaults::builtin(document_type) {
                Some(template) => {
                    info!(document_type, "Using built-in template");
                    if let Err(e) = self.store.save(template.clone()).await {
                        warn!(document_type, error = %e, "Failed to write back built-in template");
                    }
                    template
                }
                None => {
                    warn!(document_type, "No template for document type");
                    defaults::error_ticket(document_type, "No template for document type")
                }
            },
            Err(e) => {
                warn!(document_type, error = %e, "Template store read failed");
                defaults::error_ticket(document_type, "Template store unavailable")
            }
        }
    }

    pub async fn save(&self, template: Template) -> StoreResult<()> {
        self.store.save(template).await
    }

    pub async fn list(&self) -> StoreResult<Vec<Template>> {
        self.store.get_all().await
    }

    /// Seed every built-in template that is not stored yet
    ///
    /// Returns how many were added.
    pub async fn ensure_defaults(&self) -> StoreResult<usize> {
        let mut added = 0;
        for template in defaults::all() {
            if self.store.get(&template.document_type).await?.is_none() {
                self.store.save(template).await?;
                added += 1;
            }
        }
        if added > 0 {
            info!(added, "Seeded built-in templates");
        }
        Ok(added)
    }
}
