//! Product conformity classification against the EU organic regulation.

mod bands;
mod classifier;
mod domain;
mod prompt;
pub mod rules;

pub use bands::ScoreBand;
pub use classifier::{AnalysisError, ClassifierConfig, ConformityClassifier};
pub use domain::{ConformityAnalysis, ConformitySource, ConformityStatus, ConformityVerdict};
pub use rules::{assess, RuleAssessment, RuleSignal};

use serde::{Deserialize, Serialize};

use crate::invoices::LineItem;
use crate::records::StatutBio;

/// Everything the classifier knows about one product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductDescriptor {
    pub product_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub supplier_name: Option<String>,
    #[serde(default)]
    pub supplier_statut: Option<StatutBio>,
    #[serde(default)]
    pub is_bio: Option<bool>,
    #[serde(default)]
    pub lot_number: Option<String>,
}

impl ProductDescriptor {
    pub fn named(product_name: &str) -> Self {
        Self {
            product_name: product_name.to_string(),
            ..Self::default()
        }
    }

    pub fn from_line(
        line: &LineItem,
        supplier_name: Option<&str>,
        supplier_statut: Option<StatutBio>,
    ) -> Self {
        Self {
            product_name: line.description.clone().unwrap_or_default(),
            description: None,
            supplier_name: supplier_name.map(str::to_string),
            supplier_statut,
            is_bio: line.is_bio,
            lot_number: line.lot_number.clone(),
        }
    }

    /// Text scanned by the keyword rules.
    pub fn searchable_text(&self) -> String {
        [
            Some(self.product_name.as_str()),
            self.description.as_deref(),
            self.lot_number.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
    }
}
