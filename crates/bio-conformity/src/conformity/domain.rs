use serde::{Deserialize, Serialize};

use super::bands::ScoreBand;

/// Tri-state compliance classification of a product against the organic rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConformityStatus {
    Conforme,
    Attention,
    NonConforme,
}

impl ConformityStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ConformityStatus::Conforme => "conforme",
            ConformityStatus::Attention => "attention",
            ConformityStatus::NonConforme => "non_conforme",
        }
    }

    /// Parses the wire label; anything unknown is treated as unset.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "conforme" => Some(ConformityStatus::Conforme),
            "attention" => Some(ConformityStatus::Attention),
            "non_conforme" => Some(ConformityStatus::NonConforme),
            _ => None,
        }
    }

    /// Status implied by a score alone: conforme >= 80, attention 40..=79, non_conforme < 40.
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => ConformityStatus::Conforme,
            40..=79 => ConformityStatus::Attention,
            _ => ConformityStatus::NonConforme,
        }
    }

    /// Score used when a line carries a status but no explicit score.
    pub fn default_score(&self) -> u8 {
        match self {
            ConformityStatus::Conforme => 90,
            ConformityStatus::Attention => 60,
            ConformityStatus::NonConforme => 20,
        }
    }
}

/// Where a conformity verdict came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConformitySource {
    Rules,
    Ai,
    Fallback,
}

/// Structured explanation attached to a classified line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConformityAnalysis {
    pub summary: Option<String>,
    pub reasons: Vec<String>,
    pub recommendations: Vec<String>,
    pub regulation_refs: Vec<String>,
}

/// Outcome of classifying one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConformityVerdict {
    pub status: ConformityStatus,
    pub score: u8,
    pub band: ScoreBand,
    pub source: ConformitySource,
    pub analysis: ConformityAnalysis,
}

impl ConformityVerdict {
    pub fn new(
        status: ConformityStatus,
        score: u8,
        source: ConformitySource,
        analysis: ConformityAnalysis,
    ) -> Self {
        let score = score.min(100);
        Self {
            status,
            score,
            band: ScoreBand::from_score(score),
            source,
            analysis,
        }
    }

    /// Neutral verdict used whenever the analysis could not be obtained.
    pub fn manual_review(reason: impl Into<String>) -> Self {
        Self::new(
            ConformityStatus::Attention,
            50,
            ConformitySource::Fallback,
            ConformityAnalysis {
                summary: Some("Vérification manuelle requise".to_string()),
                reasons: vec![reason.into()],
                recommendations: vec![
                    "Contrôler manuellement la conformité de ce produit".to_string()
                ],
                regulation_refs: Vec::new(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_wire_variants() {
        assert_eq!(
            ConformityStatus::parse("non-conforme"),
            Some(ConformityStatus::NonConforme)
        );
        assert_eq!(
            ConformityStatus::parse(" Conforme "),
            Some(ConformityStatus::Conforme)
        );
        assert_eq!(ConformityStatus::parse("unknown"), None);
    }

    #[test]
    fn score_thresholds_follow_status_banding() {
        assert_eq!(ConformityStatus::from_score(80), ConformityStatus::Conforme);
        assert_eq!(ConformityStatus::from_score(79), ConformityStatus::Attention);
        assert_eq!(ConformityStatus::from_score(40), ConformityStatus::Attention);
        assert_eq!(ConformityStatus::from_score(39), ConformityStatus::NonConforme);
    }

    #[test]
    fn manual_review_is_neutral() {
        let verdict = ConformityVerdict::manual_review("service indisponible");
        assert_eq!(verdict.status, ConformityStatus::Attention);
        assert_eq!(verdict.score, 50);
        assert_eq!(verdict.source, ConformitySource::Fallback);
        assert_eq!(verdict.band, ScoreBand::DerogationOrDoubt);
    }
}
