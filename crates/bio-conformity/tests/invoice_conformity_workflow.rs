//! Integration scenarios for invoice scanning, line classification and aggregation.
//!
//! Everything goes through the public scanner and classifier so the rules, the AI fallback and
//! the aggregate are exercised together.

mod common {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use bio_conformity::ai::AiClient;
    use bio_conformity::conformity::{ClassifierConfig, ConformityClassifier};
    use bio_conformity::error::{ExternalService, ExternalServiceUnavailable};
    use bio_conformity::invoices::InvoiceScanner;

    /// OCR answers with a fixed payload; analysis answers from a queue, then goes offline.
    pub(super) struct FixtureAi {
        pub(super) extraction: String,
        pub(super) analyses: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AiClient for FixtureAi {
        async fn analyze_text(
            &self,
            _system: &str,
            _prompt: &str,
        ) -> Result<String, ExternalServiceUnavailable> {
            let mut analyses = self.analyses.lock().expect("analysis mutex poisoned");
            if analyses.is_empty() {
                Err(ExternalServiceUnavailable::new(ExternalService::Ai, "quota exceeded"))
            } else {
                Ok(analyses.remove(0))
            }
        }

        async fn extract_document(
            &self,
            _document: &[u8],
            _mime_type: &str,
            _prompt: &str,
        ) -> Result<String, ExternalServiceUnavailable> {
            Ok(self.extraction.clone())
        }
    }

    pub(super) fn scanner(extraction: &str, analyses: Vec<&str>) -> InvoiceScanner<FixtureAi> {
        let ai = Arc::new(FixtureAi {
            extraction: extraction.to_string(),
            analyses: Mutex::new(analyses.into_iter().map(str::to_string).collect()),
        });
        let classifier = Arc::new(ConformityClassifier::new(
            ai.clone(),
            ClassifierConfig::default(),
        ));
        InvoiceScanner::new(ai, classifier, Duration::from_secs(5))
    }

    pub(super) const MIXED_INVOICE: &str = r#"Voici les données extraites :
```json
{
  "fournisseur": {"nom": "Coopérative Agricole du Nord", "siret": "123 456 789 00012"},
  "numero_facture": "FA-2025-311",
  "date_facture": "2025-03-14",
  "total_ht": 1180.5,
  "lignes": [
    {"description": "Semences de blé tendre certifiées AB, Ecocert FR-BIO-01",
     "quantite": 500, "unite": "kg", "prix_unitaire": 1.2, "prix_total": 600, "is_bio": true},
    {"description": "Glyphosate 360 g/L désherbant total",
     "quantite": 20, "unite": "L", "prix_unitaire": 29.0, "prix_total": 580.5}
  ],
  "confidence": 0.92
}
```"#;
}

use bio_conformity::conformity::ConformityStatus;
use bio_conformity::invoices::{aggregate, normalize_text, LineItem};
use common::*;

#[tokio::test]
async fn certified_and_synthetic_lines_bracket_the_invoice_score() {
    let scanner = scanner(MIXED_INVOICE, Vec::new());

    let scanned = scanner
        .scan(b"%PDF-1.7 facture", "application/pdf", None)
        .await
        .expect("invoice scanned");

    let certified = &scanned.extraction.lines[0];
    let synthetic = &scanned.extraction.lines[1];
    assert_eq!(certified.conformity_status, Some(ConformityStatus::Conforme));
    assert!(certified.conformity_score.unwrap_or_default() >= 80);
    assert_eq!(synthetic.conformity_status, Some(ConformityStatus::NonConforme));
    assert!(synthetic.conformity_score.unwrap_or(100) < 40);

    let global = &scanned.global;
    assert!(global.score > synthetic.conformity_score.unwrap_or_default());
    assert!(global.score < certified.conformity_score.unwrap_or_default());
    assert_eq!(global.breakdown.conforme, 1);
    assert_eq!(global.breakdown.attention, 0);
    assert_eq!(global.breakdown.non_conforme, 1);
}

#[tokio::test]
async fn ambiguous_line_is_settled_by_the_analysis() {
    let extraction = r#"{"fournisseur": {"nom": "Agri Services"}, "lignes": [
        {"description": "Bouillie bordelaise 20% cuivre", "quantite": 10, "unite": "kg"}
    ]}"#;
    let analysis = r#"```json
{"status": "conforme", "score": 84, "analysis": {
  "summary": "Cuivre autorisé en agriculture biologique",
  "reasons": ["Substance listée à l'annexe I"],
  "regulation_refs": ["Règlement (UE) 2021/1165"]
}}
```"#;
    let scanner = scanner(extraction, vec![analysis]);

    let scanned = scanner
        .scan(b"\x89PNG", "image/png", None)
        .await
        .expect("invoice scanned");

    let line = &scanned.extraction.lines[0];
    assert_eq!(line.conformity_status, Some(ConformityStatus::Conforme));
    assert_eq!(line.conformity_score, Some(84));
    let analysis = line.conformity_analysis.as_ref().expect("analysis kept");
    assert_eq!(
        analysis.summary.as_deref(),
        Some("Cuivre autorisé en agriculture biologique")
    );
    assert_eq!(scanned.global.score, 84);
}

#[tokio::test]
async fn analysis_outage_degrades_to_manual_review() {
    let extraction = r#"{"lignes": [{"description": "Filet anti-grêle 4x50m"}]}"#;
    let scanner = scanner(extraction, Vec::new());

    let scanned = scanner
        .scan(b"\x89PNG", "image/png", None)
        .await
        .expect("outage is not an error");

    let line = &scanned.extraction.lines[0];
    assert_eq!(line.conformity_status, Some(ConformityStatus::Attention));
    assert_eq!(line.conformity_score, Some(50));
    assert_eq!(scanned.global.breakdown.attention, 1);
}

#[test]
fn normalizer_drops_mistyped_fields_and_keeps_line_positions() {
    let extraction = normalize_text(
        r#"{"numero_facture": 42, "lignes": [
            {"description": "Terreau", "quantite": "beaucoup"},
            {"id": "custom", "description": "Paillage", "is_bio": "oui"},
            "pas une ligne"
        ]}"#,
    )
    .expect("object payload normalizes");

    assert_eq!(extraction.invoice_number, None);
    let ids: Vec<_> = extraction.lines.iter().map(|line| line.id.as_str()).collect();
    assert_eq!(ids, vec!["line_1", "custom", "line_3"]);
    assert_eq!(extraction.lines[2].description, None);
    assert_eq!(extraction.lines[0].quantity, None);
    assert_eq!(extraction.lines[1].is_bio, None);
}

#[test]
fn aggregate_of_unclassified_invoice_is_optimistic() {
    let lines = vec![LineItem {
        id: "line_1".to_string(),
        description: Some("Ficelle".to_string()),
        ..LineItem::default()
    }];
    let global = aggregate(&lines);
    assert_eq!(global.score, 100);
    assert_eq!(global.breakdown.total(), 0);
}
