//! Organization security score: four weighted sub-scores, alerts and recommendations.

mod views;

pub use views::{
    AlertSeverity, ScoreAlert, ScoreComponents, ScoreLevel, ScoreSnapshot, SecurityScore,
};

use chrono::{DateTime, Utc};

use crate::certificates::{evaluate_at, CertificateStatus};
use crate::conformity::ConformityStatus;
use crate::records::{Certificate, Input, StatutBio, Supplier};

const OPERATOR_WEIGHT: u32 = 20;
const INPUTS_WEIGHT: u32 = 30;
const SUPPLIERS_WEIGHT: u32 = 25;
const CERTIFICATES_WEIGHT: u32 = 25;

/// `round(weight * numerator / total)` half-up; an empty population earns full credit.
fn weighted(weight: u32, numerator: u32, total: u32) -> u8 {
    if total == 0 {
        return weight as u8;
    }
    let numerator = u64::from(numerator.min(total));
    let total = u64::from(total);
    let weight = u64::from(weight);
    ((2 * weight * numerator + total) / (2 * total)) as u8
}

pub fn components(snapshot: &ScoreSnapshot) -> ScoreComponents {
    let certificates_valid = snapshot
        .certificates_total
        .saturating_sub(snapshot.certificates_expired.min(snapshot.certificates_total));

    ScoreComponents {
        operator_verification: if snapshot.organization_verified {
            OPERATOR_WEIGHT as u8
        } else {
            0
        },
        inputs_conformity: weighted(
            INPUTS_WEIGHT,
            snapshot.inputs_conforme,
            snapshot.inputs_total,
        ),
        suppliers_certification: weighted(
            SUPPLIERS_WEIGHT,
            snapshot.suppliers_certified,
            snapshot.suppliers_total,
        ),
        certificates_validity: weighted(
            CERTIFICATES_WEIGHT,
            certificates_valid,
            snapshot.certificates_total,
        ),
    }
}

fn recommendations(snapshot: &ScoreSnapshot) -> Vec<String> {
    let mut recommendations = Vec::new();
    if !snapshot.organization_verified {
        recommendations.push(
            "Vérifiez votre exploitation sur l'annuaire officiel des opérateurs bio".to_string(),
        );
    }
    if snapshot.inputs_non_conforme > 0 {
        recommendations.push(format!(
            "{} intrant(s) non conforme(s) à remplacer ou justifier",
            snapshot.inputs_non_conforme
        ));
    }
    if snapshot.suppliers_certified < snapshot.suppliers_total {
        recommendations.push(format!(
            "{} fournisseur(s) sans certification bio vérifiée",
            snapshot.suppliers_total - snapshot.suppliers_certified
        ));
    }
    if snapshot.certificates_expired > 0 {
        recommendations.push(format!(
            "{} certificat(s) expiré(s) à renouveler",
            snapshot.certificates_expired
        ));
    }
    recommendations
}

fn alerts(snapshot: &ScoreSnapshot) -> Vec<ScoreAlert> {
    let mut alerts = Vec::new();
    if snapshot.inputs_non_conforme > 0 {
        alerts.push(ScoreAlert::new(
            AlertSeverity::Critical,
            "intrants",
            format!("{} intrant(s) non conforme(s)", snapshot.inputs_non_conforme),
        ));
    }
    if snapshot.certificates_expired > 0 {
        alerts.push(ScoreAlert::new(
            AlertSeverity::Critical,
            "certificats",
            format!("{} certificat(s) expiré(s)", snapshot.certificates_expired),
        ));
    }
    if snapshot.inputs_attention > 0 {
        alerts.push(ScoreAlert::new(
            AlertSeverity::Warning,
            "intrants",
            format!(
                "{} intrant(s) à vérifier manuellement",
                snapshot.inputs_attention
            ),
        ));
    }
    if snapshot.certificates_expiring > 0 {
        alerts.push(ScoreAlert::new(
            AlertSeverity::Warning,
            "certificats",
            format!(
                "{} certificat(s) à renouveler sous 30 jours",
                snapshot.certificates_expiring
            ),
        ));
    }
    if !snapshot.organization_verified {
        alerts.push(ScoreAlert::new(
            AlertSeverity::Info,
            "exploitation",
            "Exploitation non vérifiée sur l'annuaire des opérateurs bio".to_string(),
        ));
    }
    alerts
}

/// Pure score computation at a given instant.
pub fn compute_at(snapshot: &ScoreSnapshot, now: DateTime<Utc>) -> SecurityScore {
    let components = components(snapshot);
    let global = components.total().min(100);
    SecurityScore {
        global,
        level: ScoreLevel::from_score(global),
        components,
        alerts: alerts(snapshot),
        recommendations: recommendations(snapshot),
        computed_at: now,
    }
}

pub fn compute(snapshot: &ScoreSnapshot) -> SecurityScore {
    compute_at(snapshot, Utc::now())
}

impl ScoreSnapshot {
    /// Count persisted records. Certificate statuses are re-evaluated at `now`.
    pub fn from_records(
        organization_verified: bool,
        inputs: &[Input],
        suppliers: &[Supplier],
        certificates: &[Certificate],
        now: DateTime<Utc>,
    ) -> Self {
        let mut snapshot = ScoreSnapshot {
            organization_verified,
            inputs_total: inputs.len() as u32,
            suppliers_total: suppliers.len() as u32,
            certificates_total: certificates.len() as u32,
            ..ScoreSnapshot::default()
        };

        for input in inputs {
            match input.conformity_status {
                Some(ConformityStatus::Conforme) => snapshot.inputs_conforme += 1,
                Some(ConformityStatus::Attention) => snapshot.inputs_attention += 1,
                Some(ConformityStatus::NonConforme) => snapshot.inputs_non_conforme += 1,
                None => {}
            }
        }

        snapshot.suppliers_certified = suppliers
            .iter()
            .filter(|supplier| supplier.statut_bio == StatutBio::Certifie)
            .count() as u32;

        for certificate in certificates {
            match evaluate_at(certificate.expires_on, now) {
                CertificateStatus::Expire => snapshot.certificates_expired += 1,
                CertificateStatus::ARenouveler => snapshot.certificates_expiring += 1,
                CertificateStatus::Valide => {}
            }
        }

        snapshot
    }
}
