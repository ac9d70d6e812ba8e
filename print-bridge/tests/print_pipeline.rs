use async_trait::async_trait;
use parking_lot::Mutex;
use print_bridge::printing::{self, PrintDelivery, PrintOrchestrator};
use print_bridge::template::{self, TemplateService, defaults};
use print_bridge::{RecordStore, Stores};
use serde_json::json;
use shared::message::{JobStatus, PrintJobRequest};
use shared::models::{PrinterKind, PrinterSettings};
use std::sync::Arc;
use ticket_printer::{PrintError, PrintResult};

/// Fails every printer in `failing`, records the rest
#[derive(Default)]
struct FlakyDelivery {
    failing: Vec<String>,
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl PrintDelivery for FlakyDelivery {
    async fn send(&self, settings: &PrinterSettings, _bytes: &[u8]) -> PrintResult<()> {
        if self.failing.contains(&settings.printer_id) {
            return Err(PrintError::Offline(settings.printer_id.clone()));
        }
        self.sent.lock().push(settings.printer_id.clone());
        Ok(())
    }
}

fn receipt_job(printer_id: &str) -> PrintJobRequest {
    serde_json::from_value(json!({
        "jobId": "job-1",
        "printerId": printer_id,
        "documentType": "salereceipt",
        "data": {
            "StoreName": "Corner Cafe",
            "CopyMarker": "ORIGINAL",
            "Items": [
                {"Quantity": 1, "Name": "Tea", "UnitPrice": 2, "Total": 2},
                {"Quantity": 3, "Name": "Scone", "UnitPrice": 1.5, "Total": 4.5}
            ],
            "Total": 6.5
        }
    }))
    .unwrap()
}

async fn orchestrator(failing: &[&str]) -> (PrintOrchestrator, Arc<FlakyDelivery>, Stores) {
    let stores = Stores::in_memory();
    let mut front = PrinterSettings::new("front", "10.0.0.10");
    front.copy_to_printer_ids = vec!["kitchen".into(), "bar".into()];
    front.paper_width_mm = Some(80);
    stores.settings.save(front).await.unwrap();
    stores
        .settings
        .save(PrinterSettings::new("kitchen", "10.0.0.11"))
        .await
        .unwrap();
    stores
        .settings
        .save(PrinterSettings::new("bar", "10.0.0.12"))
        .await
        .unwrap();

    let delivery = Arc::new(FlakyDelivery {
        failing: failing.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    });
    let orchestrator = PrintOrchestrator::new(
        stores.settings.clone(),
        TemplateService::new(stores.templates.clone()),
        delivery.clone(),
    );
    (orchestrator, delivery, stores)
}

#[tokio::test]
async fn test_failing_copies_never_downgrade_done() {
    let (orchestrator, delivery, _) = orchestrator(&["kitchen", "bar"]).await;
    let result = orchestrator.process(&receipt_job("front")).await;

    assert_eq!(result.status, JobStatus::Done);
    assert!(result.error_message.is_none());
    assert_eq!(*delivery.sent.lock(), vec!["front".to_string()]);
}

#[tokio::test]
async fn test_missing_template_is_written_back() {
    let (orchestrator, _, stores) = orchestrator(&[]).await;
    assert!(stores.templates.get("SaleReceipt").await.unwrap().is_none());

    let result = orchestrator.process(&receipt_job("front")).await;
    assert!(result.is_done());
    assert!(stores.templates.get("SaleReceipt").await.unwrap().is_some());
}

#[test]
fn test_receipt_render_and_generate() {
    let template = defaults::builtin("SaleReceipt").unwrap();
    let data = receipt_job("front").data;

    let doc = template::render(&template, &data);
    assert_eq!(doc, template::render(&template, &data));

    let mut settings = PrinterSettings::new("front", "10.0.0.10");
    settings.paper_width_mm = Some(80);
    let wide = printing::generate(&settings, &template, &data, &doc);
    settings.paper_width_mm = Some(58);
    let narrow = printing::generate(&settings, &template, &data, &doc);

    let text = String::from_utf8_lossy(&wide);
    assert!(text.contains("Scone"));
    assert!(!text.contains("ORIGINAL"));
    assert!(!text.contains("COPY:"));
    // 48 vs 32 dash separators
    assert!(text.contains(&"-".repeat(48)));
    assert!(!String::from_utf8_lossy(&narrow).contains(&"-".repeat(33)));
}

#[test]
fn test_invoice_on_matrix_uses_grid() {
    let template = defaults::builtin("Invoice").unwrap();
    let data = json!({
        "CompanyName": "ACME Supplies",
        "Number": "INV-0042",
        "Customer": {"Name": "Jane Roe", "Address": "1 Long Road"},
        "Items": [{"Quantity": 4, "Name": "Widget", "UnitPrice": 2.5, "Total": 10}],
        "Total": 10
    });
    let doc = template::render(&template, &data);

    let mut settings = PrinterSettings::new("M1", "LPT1");
    settings.printer_type = PrinterKind::Matrix;
    let bytes = printing::generate(&settings, &template, &data, &doc);

    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("ACME Supplies"));
    assert!(text.contains("INV-0042"));
    assert!(text.contains("Widget"));
    assert_eq!(bytes.iter().filter(|&&b| b == 0x0C).count(), 1);
}
