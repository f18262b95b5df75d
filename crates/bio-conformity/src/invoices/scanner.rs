use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::aggregate::{aggregate, GlobalConformity};
use super::domain::InvoiceExtraction;
use super::normalizer::{normalize_text, NormalizeError};
use crate::ai::AiClient;
use crate::conformity::ConformityClassifier;
use crate::error::{within, ExternalService, ExternalServiceUnavailable};
use crate::records::StatutBio;

const EXTRACTION_PROMPT: &str = r#"Extrais les données de cette facture d'intrants agricoles.
Réponds uniquement avec un objet JSON de la forme :
{
  "fournisseur": {"nom": "...", "siret": "...", "tva_intracom": "...", "adresse": "..."},
  "numero_facture": "...",
  "date_facture": "AAAA-MM-JJ",
  "total_ht": 0.0,
  "total_ttc": 0.0,
  "lignes": [
    {"id": "line_1", "description": "...", "quantite": 0.0, "unite": "...", "prix_unitaire": 0.0,
     "prix_total": 0.0, "taux_tva": 0.0, "numero_lot": "...", "is_bio": true, "confidence": 0.0}
  ],
  "confidence": 0.0
}
Utilise null pour toute valeur illisible. N'invente aucune valeur."#;

const ACCEPTED_PREFIXES: &[&str] = &["image/", "application/pdf"];

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("document is empty")]
    EmptyDocument,
    #[error("unsupported document type: {0}")]
    UnsupportedType(String),
    #[error(transparent)]
    Unavailable(#[from] ExternalServiceUnavailable),
    #[error(transparent)]
    Malformed(#[from] NormalizeError),
}

/// A scanned invoice with every line classified, plus its aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannedInvoice {
    pub extraction: InvoiceExtraction,
    pub global: GlobalConformity,
}

/// Document bytes to classified invoice: extraction, normalization, classification.
pub struct InvoiceScanner<A> {
    ai: Arc<A>,
    classifier: Arc<ConformityClassifier<A>>,
    timeout: Duration,
}

impl<A> InvoiceScanner<A>
where
    A: AiClient + 'static,
{
    pub fn new(ai: Arc<A>, classifier: Arc<ConformityClassifier<A>>, timeout: Duration) -> Self {
        Self {
            ai,
            classifier,
            timeout,
        }
    }

    /// OCR only. The extraction call has no fallback: without it there is no invoice.
    pub async fn extract(
        &self,
        document: &[u8],
        mime_type: &str,
    ) -> Result<InvoiceExtraction, ScanError> {
        if document.is_empty() {
            return Err(ScanError::EmptyDocument);
        }
        let mime_type = mime_type.trim().to_ascii_lowercase();
        if !ACCEPTED_PREFIXES
            .iter()
            .any(|prefix| mime_type.starts_with(prefix))
        {
            return Err(ScanError::UnsupportedType(mime_type));
        }

        let text = within(
            ExternalService::Ai,
            self.timeout,
            self.ai
                .extract_document(document, &mime_type, EXTRACTION_PROMPT),
        )
        .await?;
        Ok(normalize_text(&text)?)
    }

    pub async fn scan(
        &self,
        document: &[u8],
        mime_type: &str,
        supplier_statut: Option<StatutBio>,
    ) -> Result<ScannedInvoice, ScanError> {
        let extraction = self.extract(document, mime_type).await?;
        let scanned = self.classify(extraction, supplier_statut).await;
        info!(
            lines = scanned.extraction.lines.len(),
            score = scanned.global.score,
            "invoice scanned"
        );
        Ok(scanned)
    }

    /// Classify an already-extracted invoice and aggregate it.
    pub async fn classify(
        &self,
        mut extraction: InvoiceExtraction,
        supplier_statut: Option<StatutBio>,
    ) -> ScannedInvoice {
        let supplier_name = extraction.supplier.name.clone();
        self.classifier
            .classify_lines(
                &mut extraction.lines,
                supplier_name.as_deref(),
                supplier_statut,
            )
            .await;
        let global = aggregate(&extraction.lines);
        ScannedInvoice { extraction, global }
    }
}
