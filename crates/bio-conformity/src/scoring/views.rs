use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counts the security score is computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    pub inputs_total: u32,
    pub inputs_conforme: u32,
    pub inputs_attention: u32,
    pub inputs_non_conforme: u32,
    pub suppliers_total: u32,
    pub suppliers_certified: u32,
    pub certificates_total: u32,
    pub certificates_expired: u32,
    /// Feeds alerts only.
    #[serde(default)]
    pub certificates_expiring: u32,
    pub organization_verified: bool,
}

/// The four weighted sub-scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreComponents {
    /// 0 or 20.
    pub operator_verification: u8,
    /// 0..=30.
    pub inputs_conformity: u8,
    /// 0..=25.
    pub suppliers_certification: u8,
    /// 0..=25.
    pub certificates_validity: u8,
}

impl ScoreComponents {
    pub fn total(&self) -> u8 {
        self.operator_verification
            + self.inputs_conformity
            + self.suppliers_certification
            + self.certificates_validity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreLevel {
    Excellent,
    Correct,
    Fragile,
    Critique,
}

impl ScoreLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => ScoreLevel::Excellent,
            60..=79 => ScoreLevel::Correct,
            40..=59 => ScoreLevel::Fragile,
            _ => ScoreLevel::Critique,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScoreLevel::Excellent => "excellent",
            ScoreLevel::Correct => "correct",
            ScoreLevel::Fragile => "fragile",
            ScoreLevel::Critique => "critique",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Critical,
    Warning,
    Info,
}

impl AlertSeverity {
    pub fn label(&self) -> &'static str {
        match self {
            AlertSeverity::Critical => "critical",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreAlert {
    pub severity: AlertSeverity,
    pub severity_label: String,
    pub topic: String,
    pub detail: String,
}

impl ScoreAlert {
    pub(crate) fn new(severity: AlertSeverity, topic: &str, detail: String) -> Self {
        Self {
            severity,
            severity_label: severity.label().to_string(),
            topic: topic.to_string(),
            detail,
        }
    }
}

/// Derived organization score. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityScore {
    pub global: u8,
    pub level: ScoreLevel,
    pub components: ScoreComponents,
    pub alerts: Vec<ScoreAlert>,
    pub recommendations: Vec<String>,
    pub computed_at: DateTime<Utc>,
}
