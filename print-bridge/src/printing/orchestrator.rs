//! Print orchestrator
//!
//! Consumes print and template events from the protocol server, renders
//! documents, generates printer commands and reports the outcome to the
//! requesting connection.

use serde_json::Value;
use shared::message::{PrintJobRequest, PrintJobResult, TemplateUpdateRequest, TemplateUpdateResult};
use shared::models::{PrinterKind, PrinterSettings, RenderedDocument, Template};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::delivery::PrintDelivery;
use super::matrix::MatrixRenderer;
use super::thermal::ThermalRenderer;
use crate::message::{ProtocolServer, ServerEvent};
use crate::storage::SettingsStore;
use crate::template::{self, TemplateService};

/// Generate printer commands for one printer
pub fn generate(
    settings: &PrinterSettings,
    template: &Template,
    data: &Value,
    doc: &RenderedDocument,
) -> Vec<u8> {
    match settings.printer_type {
        PrinterKind::Thermal => ThermalRenderer::new(settings).render(doc),
        PrinterKind::Matrix => MatrixRenderer::new(settings).render(template, data, doc),
    }
}

/// 打印编排器
///
/// 职责:
/// - 查找打印机设置与模板
/// - 渲染、生成指令并发送到主打印机
/// - 副本打印机失败只记录日志，不影响主任务结果
pub struct PrintOrchestrator {
    settings: SettingsStore,
    templates: TemplateService,
    delivery: Arc<dyn PrintDelivery>,
}

impl PrintOrchestrator {
    pub fn new(
        settings: SettingsStore,
        templates: TemplateService,
        delivery: Arc<dyn PrintDelivery>,
    ) -> Self {
        Self {
            settings,
            templates,
            delivery,
        }
    }

    /// Run one print job; the result is `DONE` once the primary printer
    /// accepted the data
    #[instrument(skip(self, request), fields(
        job_id = %request.job_id,
        printer_id = %request.printer_id,
        document_type = %request.document_type
    ))]
    pub async fn process(&self, request: &PrintJobRequest) -> PrintJobResult {
        let settings = match self.settings.get(&request.printer_id).await {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                warn!("Printer not configured");
                return PrintJobResult::error(
                    &request.job_id,
                    format!("Printer not found: {}", request.printer_id),
                );
            }
            Err(e) => {
                error!(error = %e, "Failed to read printer settings");
                return PrintJobResult::error(
                    &request.job_id,
                    format!("Printer settings unavailable: {}", e),
                );
            }
        };

        let template = self.templates.template_for(&request.document_type).await;
        let mut doc = template::render(&template, &request.data);
        if request.has_media() {
            template::append_media(&mut doc, &request.images, &request.barcodes, &request.qrs);
        }

        let bytes = generate(&settings, &template, &request.data, &doc);
        if let Err(e) = self.delivery.send(&settings, &bytes).await {
            error!(printer = %settings.display_name(), error = %e, "Print failed");
            return PrintJobResult::error(&request.job_id, format!("Print failed: {}", e));
        }
        info!(printer = %settings.display_name(), bytes = bytes.len(), "Print job sent");

        for copy_id in &settings.copy_to_printer_ids {
            if copy_id.trim() == settings.printer_id {
                continue;
            }
            self.print_copy(copy_id, &template, &request.data, &doc).await;
        }

        PrintJobResult::done(&request.job_id)
    }

    /// Best-effort copy; failures are logged only
    async fn print_copy(
        &self,
        printer_id: &str,
        template: &Template,
        data: &Value,
        doc: &RenderedDocument,
    ) {
        let settings = match self.settings.get(printer_id).await {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                warn!(copy_printer = %printer_id, "Copy printer not configured");
                return;
            }
            Err(e) => {
                warn!(copy_printer = %printer_id, error = %e, "Failed to read copy printer settings");
                return;
            }
        };

        let bytes = generate(&settings, template, data, doc);
        match self.delivery.send(&settings, &bytes).await {
            Ok(()) => info!(copy_printer = %printer_id, bytes = bytes.len(), "Copy sent"),
            Err(e) => warn!(copy_printer = %printer_id, error = %e, "Copy failed"),
        }
    }

    /// Replace the stored template for a document type
    #[instrument(skip(self, request), fields(document_type = %request.template.document_type))]
    pub async fn update_template(&self, request: &TemplateUpdateRequest) -> TemplateUpdateResult {
        let document_type = request.template.document_type.trim();
        if document_type.is_empty() {
            warn!("Template update without documentType");
            return TemplateUpdateResult::new("", false, "documentType is required");
        }

        match self.templates.save(request.template.clone()).await {
            Ok(()) => {
                info!("Template updated");
                TemplateUpdateResult::new(document_type, true, "Template saved")
            }
            Err(e) => {
                error!(error = %e, "Failed to save template");
                TemplateUpdateResult::new(document_type, false, format!("Failed to save template: {}", e))
            }
        }
    }

    /// Event loop: one job at a time, results go back to the requesting
    /// connection
    ///
    /// `jobs` is the server's lossless job queue; while a job is being
    /// delivered new requests wait in it.
    pub async fn run(
        self: Arc<Self>,
        mut jobs: mpsc::Receiver<ServerEvent>,
        server: ProtocolServer,
        token: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                _ = token.cancelled() => break,
                event = jobs.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            match event {
                ServerEvent::PrintRequested {
                    connection_id,
                    request,
                } => {
                    let result = self.process(&request).await;
                    if !server.send_to(&connection_id, result) {
                        warn!(job_id = %request.job_id, "Client gone, print result not delivered");
                    }
                }
                ServerEvent::TemplateUpdateRequested {
                    connection_id,
                    request,
                } => {
                    let result = self.update_template(&request).await;
                    if !server.send_to(&connection_id, result) {
                        warn!("Client gone, template update result not delivered");
                    }
                }
                other => debug!(event = other.kind(), "Ignoring non-job event"),
            }
        }
        info!("Print orchestrator stopped");
    }
}
