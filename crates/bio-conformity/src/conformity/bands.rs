use serde::{Deserialize, Serialize};

/// Regulatory interpretation of a 0-100 conformity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    /// 90-100
    CertifiedBio,
    /// 70-89
    ProbablyConforme,
    /// 50-69
    DerogationOrDoubt,
    /// 30-49
    LikelyNonConforme,
    /// 0-29
    Prohibited,
}

impl ScoreBand {
    pub fn from_score(score: u8) -> Self {
        match score {
            90.. => ScoreBand::CertifiedBio,
            70..=89 => ScoreBand::ProbablyConforme,
            50..=69 => ScoreBand::DerogationOrDoubt,
            30..=49 => ScoreBand::LikelyNonConforme,
            _ => ScoreBand::Prohibited,
        }
    }

    pub fn range(&self) -> (u8, u8) {
        match self {
            ScoreBand::CertifiedBio => (90, 100),
            ScoreBand::ProbablyConforme => (70, 89),
            ScoreBand::DerogationOrDoubt => (50, 69),
            ScoreBand::LikelyNonConforme => (30, 49),
            ScoreBand::Prohibited => (0, 29),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ScoreBand::CertifiedBio => "certifié bio, aucun doute",
            ScoreBand::ProbablyConforme => "probablement conforme, vérification recommandée",
            ScoreBand::DerogationOrDoubt => "dérogation nécessaire ou doute significatif",
            ScoreBand::LikelyNonConforme => "forte probabilité de non-conformité",
            ScoreBand::Prohibited => "clairement interdit en agriculture biologique",
        }
    }

    pub fn all() -> [ScoreBand; 5] {
        [
            ScoreBand::CertifiedBio,
            ScoreBand::ProbablyConforme,
            ScoreBand::DerogationOrDoubt,
            ScoreBand::LikelyNonConforme,
            ScoreBand::Prohibited,
        ]
    }
}
