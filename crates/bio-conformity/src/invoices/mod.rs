//! Scanned invoice handling: defensive normalization of AI extractions,
//! per-invoice conformity aggregation and the document scanner.

pub mod aggregate;
pub mod domain;
pub mod normalizer;
pub mod safe_cast;
pub mod scanner;

pub use aggregate::{aggregate, GlobalConformity, StatusBreakdown};
pub use domain::{InvoiceExtraction, LineItem, SupplierInfo};
pub use normalizer::{normalize_extraction, normalize_text, parse_ai_json, NormalizeError};
pub use scanner::{InvoiceScanner, ScanError, ScannedInvoice};
