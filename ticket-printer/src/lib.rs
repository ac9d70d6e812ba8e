//! # ticket-printer
//!
//! Receipt printer library - low-level printing capabilities only.
//!
//! ## Scope
//!
//! This crate handles HOW to print:
//! - ESC/POS command building (thermal)
//! - ESC/P command building (dot-matrix)
//! - Text charset encoding (UTF-8 passthrough, GBK, CP1252)
//! - Delivery over TCP 9100, IPP / HTTP POST and the local `lp` spooler
//!
//! Business logic (WHAT to print) stays in `print-bridge`.
//!
//! ## Example
//!
//! ```ignore
//! use ticket_printer::{Charset, EscPosBuilder, PrintMode, Printer, PrinterTarget};
//!
//! let mut builder = EscPosBuilder::new(48, Charset::Gbk);
//! builder.center();
//! builder.print_mode(PrintMode { bold: true, ..Default::default() });
//! builder.line("厨房单");
//! builder.reset_mode();
//! builder.sep('=');
//! builder.cut();
//!
//! let printer = PrinterTarget::parse("192.168.1.100:9100", Duration::from_secs(5))?;
//! printer.print(&builder.build()).await?;
//! ```

mod encoding;
mod error;
mod escp;
mod escpos;
pub mod ipp;
mod printer;

// Re-exports
pub use encoding::Charset;
pub use error::{BarcodeError, PrintError, PrintResult};
pub use escp::EscPBuilder;
pub use escpos::{EscPosBuilder, PrintMode, Symbology};
pub use printer::{HttpPrinter, NetworkPrinter, Printer, PrinterTarget, SpoolerPrinter};
