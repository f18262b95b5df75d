use super::domain::{ConformitySource, ConformityStatus, ConformityVerdict};
use super::ProductDescriptor;
use crate::invoices::normalizer::{normalize_analysis, parse_ai_json};
use crate::invoices::safe_cast::{safe_object, safe_score, safe_string};
use crate::invoices::NormalizeError;

pub(crate) const SYSTEM_PROMPT: &str = r#"Tu es un expert de la réglementation européenne de l'agriculture biologique (règlements (UE) 2018/848 et 2021/1165).
Tu évalues si un intrant agricole (semence, engrais, amendement, produit phytosanitaire) est utilisable en agriculture biologique.

Règles :
- Les semences et plants doivent être certifiés bio, sauf dérogation enregistrée.
- Seuls les engrais et amendements listés à l'annexe II du règlement 2021/1165 sont autorisés.
- Seules les substances actives listées à l'annexe I du règlement 2021/1165 sont autorisées comme produits phytosanitaires.
- Les substances de synthèse (glyphosate, néonicotinoïdes, engrais azotés minéraux, etc.) sont interdites.
- Une mention AB, un numéro FR-BIO-XX ou un organisme certificateur reconnu indique un produit certifié.

Barème du score (0 à 100) :
- 90-100 : certifié bio, aucun doute
- 70-89 : probablement conforme, vérification recommandée
- 50-69 : dérogation nécessaire ou doute significatif
- 30-49 : forte probabilité de non-conformité
- 0-29 : clairement interdit

Statut : "conforme" (score >= 80), "attention" (40-79), "non_conforme" (< 40).

Réponds uniquement avec un objet JSON :
{"status": "conforme|attention|non_conforme", "score": 0-100, "summary": "...", "reasons": ["..."], "recommendations": ["..."], "regulation_refs": ["..."]}"#;

pub(crate) fn user_prompt(descriptor: &ProductDescriptor, hints: &[String]) -> String {
    let mut prompt = format!("Produit : {}\n", descriptor.product_name);
    if let Some(description) = &descriptor.description {
        prompt.push_str(&format!("Description : {description}\n"));
    }
    if let Some(supplier) = &descriptor.supplier_name {
        prompt.push_str(&format!("Fournisseur : {supplier}\n"));
    }
    if let Some(statut) = descriptor.supplier_statut {
        prompt.push_str(&format!("Statut bio du fournisseur : {}\n", statut.label()));
    }
    if let Some(lot) = &descriptor.lot_number {
        prompt.push_str(&format!("Numéro de lot : {lot}\n"));
    }
    match descriptor.is_bio {
        Some(true) => prompt.push_str("Indiqué bio sur la facture : oui\n"),
        Some(false) => prompt.push_str("Indiqué bio sur la facture : non\n"),
        None => {}
    }
    if !hints.is_empty() {
        prompt.push_str("Observations préalables :\n");
        for hint in hints {
            prompt.push_str(&format!("- {hint}\n"));
        }
    }
    prompt
}

/// Parse the analysis response. The returned status is authoritative; the score band
/// only fills in a status when the response carries a score alone.
pub(crate) fn parse_verdict(text: &str) -> Result<ConformityVerdict, NormalizeError> {
    let value = parse_ai_json(text)?;
    let root = value
        .as_object()
        .ok_or_else(|| NormalizeError::Malformed("analysis must be a JSON object".into()))?;

    let status = safe_string(root, "status")
        .or_else(|| safe_string(root, "conformity_status"))
        .as_deref()
        .and_then(ConformityStatus::parse);
    let score = safe_score(root, "score").or_else(|| safe_score(root, "conformity_score"));

    let (status, score) = match (status, score) {
        (Some(status), Some(score)) => (status, score),
        (Some(status), None) => (status, status.default_score()),
        (None, Some(score)) => (ConformityStatus::from_score(score), score),
        (None, None) => {
            return Err(NormalizeError::Malformed(
                "analysis carries neither status nor score".into(),
            ))
        }
    };

    let analysis = match safe_object(root, "analysis") {
        Some(nested) => normalize_analysis(nested),
        None => normalize_analysis(root),
    };

    Ok(ConformityVerdict::new(status, score, ConformitySource::Ai, analysis))
}
