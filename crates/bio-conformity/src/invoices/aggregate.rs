use serde::{Deserialize, Serialize};

use super::domain::LineItem;
use crate::conformity::ConformityStatus;

/// Line counts per conformity status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBreakdown {
    pub conforme: usize,
    pub attention: usize,
    pub non_conforme: usize,
}

impl StatusBreakdown {
    pub fn record(&mut self, status: ConformityStatus) {
        match status {
            ConformityStatus::Conforme => self.conforme += 1,
            ConformityStatus::Attention => self.attention += 1,
            ConformityStatus::NonConforme => self.non_conforme += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.conforme + self.attention + self.non_conforme
    }
}

/// Invoice-level conformity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConformity {
    pub score: u8,
    pub breakdown: StatusBreakdown,
}

/// Combine classified lines into one invoice score.
///
/// Unclassified lines count nowhere. With nothing classified the score is 100:
/// absence of evidence is scored optimistically for compatibility with stored invoices.
pub fn aggregate(lines: &[LineItem]) -> GlobalConformity {
    let mut breakdown = StatusBreakdown::default();
    let mut sum: u64 = 0;

    for line in lines {
        if let (Some(status), Some(score)) = (line.conformity_status, line.effective_score()) {
            breakdown.record(status);
            sum += u64::from(score);
        }
    }

    let count = breakdown.total() as u64;
    let score = if count == 0 {
        100
    } else {
        // half-up rounding of sum / count
        ((2 * sum + count) / (2 * count)) as u8
    };

    GlobalConformity { score, breakdown }
}
