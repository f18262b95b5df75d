use std::sync::OnceLock;

use regex::Regex;

use super::domain::{ConformityAnalysis, ConformitySource, ConformityStatus, ConformityVerdict};
use super::ProductDescriptor;
use crate::records::StatutBio;

const INPUTS_REGULATION: &str = "Règlement (UE) 2021/1165, annexes I et II";
const ORGANIC_REGULATION: &str = "Règlement (UE) 2018/848";

/// Synthetic active ingredients and mineral fertilizers excluded from organic production.
const SYNTHETIC_ACTIVES: &[&str] = &[
    "glyphosate",
    "chlorpyrifos",
    "mancozebe",
    "mancozeb",
    "deltamethrine",
    "lambda-cyhalothrine",
    "cypermethrine",
    "imidaclopride",
    "thiamethoxam",
    "diquat",
    "paraquat",
    "2,4-d",
    "prosulfocarbe",
    "tebuconazole",
    "metaldehyde",
    "ammonitrate",
    "nitrate d'ammonium",
    "uree",
    "superphosphate",
    "phosphate diammonique",
];

const CERTIFYING_BODIES: &[&str] = &[
    "ecocert",
    "bureau veritas",
    "certipaq",
    "qualisud",
    "certisud",
    "alpes controles",
    "certis",
    "bureau alpes controles",
];

/// Words that turn a following organic label into its opposite ("non bio", "sans label AB").
const NEGATORS: &[&str] = &["non", "sans", "pas", "hors", "conventionnel", "conventionnelle"];

/// How many words before a label are searched for a negator.
const NEGATION_REACH: usize = 2;

const GENERIC_GOODS: &[&str] = &[
    "engrais",
    "semence",
    "semences",
    "plants",
    "terreau",
    "amendement",
    "desherbant",
    "fongicide",
    "insecticide",
    "traitement",
];

/// Evidence found in a product's text before any AI call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSignal {
    SyntheticActive(&'static str),
    CertificationMarker(String),
    OrganicLabel(String),
    NegatedLabel(String),
    GenericGoods(&'static str),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleAssessment {
    pub signals: Vec<RuleSignal>,
}

struct Matchers {
    synthetic: Vec<(&'static str, Regex)>,
    registration: Option<Regex>,
    bodies: Vec<(&'static str, Regex)>,
    labels: Option<Regex>,
    generic: Vec<(&'static str, Regex)>,
}

fn word_matchers(terms: &[&'static str]) -> Vec<(&'static str, Regex)> {
    terms
        .iter()
        .filter_map(|term| {
            Regex::new(&format!(r"\b{}\b", regex::escape(term)))
                .ok()
                .map(|regex| (*term, regex))
        })
        .collect()
}

fn matchers() -> &'static Matchers {
    static MATCHERS: OnceLock<Matchers> = OnceLock::new();
    MATCHERS.get_or_init(|| Matchers {
        synthetic: word_matchers(SYNTHETIC_ACTIVES),
        registration: Regex::new(r"\bfr-bio-\d{2}\b").ok(),
        bodies: word_matchers(CERTIFYING_BODIES),
        labels: Regex::new(r"\b(ab|bio|biologique|agriculture biologique)\b").ok(),
        generic: word_matchers(GENERIC_GOODS),
    })
}

/// Lowercase and strip the French diacritics that matter for keyword matching.
pub(crate) fn fold(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| match c {
            'à' | 'â' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' => 'i',
            'ô' | 'ö' => 'o',
            'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            '’' => '\'',
            other => other,
        })
        .collect()
}

fn is_negated(text: &str, label_start: usize) -> bool {
    text[..label_start]
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .rev()
        .take(NEGATION_REACH)
        .any(|word| NEGATORS.contains(&word))
}

pub fn assess(descriptor: &ProductDescriptor) -> RuleAssessment {
    let text = fold(&descriptor.searchable_text());
    let matchers = matchers();
    let mut signals = Vec::new();

    for (term, regex) in &matchers.synthetic {
        if regex.is_match(&text) {
            signals.push(RuleSignal::SyntheticActive(term));
        }
    }

    if let Some(found) = matchers
        .registration
        .as_ref()
        .and_then(|regex| regex.find(&text))
    {
        signals.push(RuleSignal::CertificationMarker(found.as_str().to_uppercase()));
    }
    for (term, regex) in &matchers.bodies {
        if regex.is_match(&text) {
            signals.push(RuleSignal::CertificationMarker((*term).to_string()));
        }
    }

    let mut negated = None;
    let mut affirmed = None;
    if let Some(labels) = matchers.labels.as_ref() {
        for found in labels.find_iter(&text) {
            if is_negated(&text, found.start()) {
                negated.get_or_insert_with(|| found.as_str().to_string());
            } else {
                affirmed.get_or_insert_with(|| found.as_str().to_string());
            }
        }
    }
    match (affirmed, negated) {
        (_, Some(label)) => signals.push(RuleSignal::NegatedLabel(label)),
        (Some(label), None) => signals.push(RuleSignal::OrganicLabel(label)),
        (None, None) if descriptor.is_bio == Some(true) => {
            signals.push(RuleSignal::OrganicLabel("mention bio".to_string()));
        }
        (None, None) => {}
    }

    let has_marker = signals.iter().any(|signal| {
        matches!(
            signal,
            RuleSignal::CertificationMarker(_) | RuleSignal::OrganicLabel(_)
        )
    });
    if !has_marker {
        let generic = matchers
            .generic
            .iter()
            .find(|(_, regex)| regex.is_match(&text));
        if let Some((term, _)) = generic {
            signals.push(RuleSignal::GenericGoods(term));
        }
    }

    RuleAssessment { signals }
}

impl RuleAssessment {
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Verdict the rules alone can justify. Prohibited substances win over any label.
    /// A label never decides on its own when the line itself says the product is not organic.
    pub fn decisive_verdict(&self, descriptor: &ProductDescriptor) -> Option<ConformityVerdict> {
        let synthetic: Vec<&str> = self
            .signals
            .iter()
            .filter_map(|signal| match signal {
                RuleSignal::SyntheticActive(term) => Some(*term),
                _ => None,
            })
            .collect();
        if !synthetic.is_empty() {
            return Some(ConformityVerdict::new(
                ConformityStatus::NonConforme,
                15,
                ConformitySource::Rules,
                ConformityAnalysis {
                    summary: Some(
                        "Substance de synthèse interdite en agriculture biologique".into(),
                    ),
                    reasons: synthetic
                        .iter()
                        .map(|term| format!("Substance active interdite détectée : {term}"))
                        .collect(),
                    recommendations: vec![
                        "Retirer ce produit des intrants utilisés sur les parcelles bio".into(),
                        "Contacter l'organisme certificateur si le produit a déjà été appliqué"
                            .into(),
                    ],
                    regulation_refs: vec![INPUTS_REGULATION.into()],
                },
            ));
        }

        let markers: Vec<&str> = self
            .signals
            .iter()
            .filter_map(|signal| match signal {
                RuleSignal::CertificationMarker(marker) => Some(marker.as_str()),
                _ => None,
            })
            .collect();
        if !markers.is_empty() {
            return Some(ConformityVerdict::new(
                ConformityStatus::Conforme,
                95,
                ConformitySource::Rules,
                ConformityAnalysis {
                    summary: Some("Produit certifié agriculture biologique".into()),
                    reasons: markers
                        .iter()
                        .map(|marker| format!("Marqueur de certification : {marker}"))
                        .collect(),
                    recommendations: vec!["Conserver le certificat du fournisseur".into()],
                    regulation_refs: vec![ORGANIC_REGULATION.into()],
                },
            ));
        }

        let label = self.signals.iter().find_map(|signal| match signal {
            RuleSignal::OrganicLabel(label) => Some(label.as_str()),
            _ => None,
        })?;
        if descriptor.is_bio == Some(false) {
            return None;
        }
        let score = match descriptor.supplier_statut {
            Some(StatutBio::NonCertifie) => return None,
            Some(StatutBio::Certifie) => 93,
            _ => 90,
        };

        Some(ConformityVerdict::new(
            ConformityStatus::Conforme,
            score,
            ConformitySource::Rules,
            ConformityAnalysis {
                summary: Some("Mention agriculture biologique sur le produit".into()),
                reasons: vec![format!("Mention détectée : {label}")],
                recommendations: vec![
                    "Vérifier le certificat bio du fournisseur sur l'annuaire".into()
                ],
                regulation_refs: vec![ORGANIC_REGULATION.into()],
            },
        ))
    }

    /// Observations handed to the AI prompt.
    pub fn prompt_hints(&self) -> Vec<String> {
        self.signals
            .iter()
            .map(|signal| match signal {
                RuleSignal::SyntheticActive(term) => {
                    format!("substance de synthèse détectée : {term}")
                }
                RuleSignal::CertificationMarker(marker) => {
                    format!("marqueur de certification : {marker}")
                }
                RuleSignal::OrganicLabel(label) => format!("mention bio : {label}"),
                RuleSignal::NegatedLabel(label) => {
                    format!("mention niée ({label}) : le produit se déclare non bio")
                }
                RuleSignal::GenericGoods(term) => format!(
                    "produit générique ({term}) sans mention bio : statut attention probable"
                ),
            })
            .collect()
    }
}
