use serde_json::{Map, Value};

use super::domain::{InvoiceExtraction, LineItem, SupplierInfo};
use super::safe_cast::{
    safe_array, safe_bool, safe_number, safe_object, safe_ratio, safe_score, safe_string,
    safe_string_list,
};
use crate::conformity::{ConformityAnalysis, ConformityStatus};

/// Raised when an external payload is not a JSON object at all.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("malformed extraction payload: {0}")]
    Malformed(String),
}

/// Parse JSON out of an AI response that may be fenced or wrapped in prose.
pub fn parse_ai_json(text: &str) -> Result<Value, NormalizeError> {
    let unfenced = strip_code_fence(text.trim());

    let start = unfenced
        .find('{')
        .ok_or_else(|| NormalizeError::Malformed("no JSON object found in response".into()))?;
    let end = unfenced
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| NormalizeError::Malformed("unterminated JSON object in response".into()))?;

    serde_json::from_str(&unfenced[start..=end])
        .map_err(|err| NormalizeError::Malformed(format!("invalid JSON: {err}")))
}

fn strip_code_fence(text: &str) -> &str {
    let mut body = text;
    if let Some(rest) = body.strip_prefix("```") {
        // drop the info string (e.g. `json`) up to the first newline
        body = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
        };
    }
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Normalize an AI response text into a strict extraction.
pub fn normalize_text(text: &str) -> Result<InvoiceExtraction, NormalizeError> {
    let value = parse_ai_json(text)?;
    normalize_extraction(&value)
}

/// Normalize a loosely-typed extraction object. Only a non-object top level fails.
pub fn normalize_extraction(value: &Value) -> Result<InvoiceExtraction, NormalizeError> {
    let root = value.as_object().ok_or_else(|| {
        NormalizeError::Malformed("extraction payload must be a JSON object".into())
    })?;

    let supplier = safe_object(root, "fournisseur")
        .map(normalize_supplier)
        .unwrap_or_default();

    let lines = safe_array(root, "lignes")
        .iter()
        .enumerate()
        .map(|(index, raw)| normalize_line(index, raw))
        .collect();

    Ok(InvoiceExtraction {
        supplier,
        invoice_number: safe_string(root, "numero_facture"),
        invoice_date: safe_string(root, "date_facture"),
        total_ht: safe_number(root, "total_ht"),
        total_ttc: safe_number(root, "total_ttc"),
        lines,
        confidence: safe_ratio(root, "confidence"),
    })
}

fn normalize_supplier(object: &Map<String, Value>) -> SupplierInfo {
    SupplierInfo {
        name: safe_string(object, "nom"),
        siret: safe_string(object, "siret"),
        vat_number: safe_string(object, "tva_intracom"),
        address: safe_string(object, "adresse"),
    }
}

fn normalize_line(index: usize, raw: &Value) -> LineItem {
    let id = raw
        .as_object()
        .and_then(|object| safe_string(object, "id"))
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| format!("line_{}", index + 1));

    let Some(object) = raw.as_object() else {
        return LineItem {
            id,
            ..LineItem::default()
        };
    };

    LineItem {
        id,
        description: safe_string(object, "description"),
        quantity: safe_number(object, "quantite"),
        unit: safe_string(object, "unite"),
        unit_price: safe_number(object, "prix_unitaire"),
        total_price: safe_number(object, "prix_total"),
        vat_rate: safe_number(object, "taux_tva"),
        lot_number: safe_string(object, "numero_lot"),
        is_bio: safe_bool(object, "is_bio"),
        conformity_status: safe_string(object, "conformity_status")
            .as_deref()
            .and_then(ConformityStatus::parse),
        conformity_score: safe_score(object, "conformity_score"),
        conformity_analysis: safe_object(object, "conformity_analysis").map(normalize_analysis),
        confidence: safe_ratio(object, "confidence"),
    }
}

/// Normalize an analysis block; shared with the classifier's response parser.
pub(crate) fn normalize_analysis(object: &Map<String, Value>) -> ConformityAnalysis {
    ConformityAnalysis {
        summary: safe_string(object, "summary"),
        reasons: safe_string_list(object, "reasons"),
        recommendations: safe_string_list(object, "recommendations"),
        regulation_refs: safe_string_list(object, "regulation_refs"),
    }
}
