use serde::{Deserialize, Serialize};

use crate::conformity::{ConformityAnalysis, ConformityStatus, ConformityVerdict};

/// Supplier block printed on a scanned invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplierInfo {
    pub name: Option<String>,
    pub siret: Option<String>,
    pub vat_number: Option<String>,
    pub address: Option<String>,
}

/// Strict shape of one scanned document. Never persisted as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceExtraction {
    pub supplier: SupplierInfo,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<String>,
    pub total_ht: Option<f64>,
    pub total_ttc: Option<f64>,
    pub lines: Vec<LineItem>,
    pub confidence: Option<f64>,
}

/// One invoice line, editable by the user before it becomes an `Input`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: String,
    pub description: Option<String>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub unit_price: Option<f64>,
    pub total_price: Option<f64>,
    pub vat_rate: Option<f64>,
    pub lot_number: Option<String>,
    pub is_bio: Option<bool>,
    pub conformity_status: Option<ConformityStatus>,
    pub conformity_score: Option<u8>,
    pub conformity_analysis: Option<ConformityAnalysis>,
    pub confidence: Option<f64>,
}

impl LineItem {
    pub fn apply_verdict(&mut self, verdict: ConformityVerdict) {
        self.conformity_status = Some(verdict.status);
        self.conformity_score = Some(verdict.score);
        self.conformity_analysis = Some(verdict.analysis);
    }

    /// Score this line contributes to an aggregate, if it is classified at all.
    pub fn effective_score(&self) -> Option<u8> {
        self.conformity_status
            .map(|status| self.conformity_score.unwrap_or_else(|| status.default_score()))
    }
}
