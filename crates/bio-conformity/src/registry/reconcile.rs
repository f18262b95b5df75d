use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::client::{RegistryActivity, RegistryCertificate, RegistryClient, RegistryOperator};
use super::query::RegistryQuery;
use super::ranking::{rank, Rankable};
use crate::error::{within, ExternalService};
use crate::records::{Organization, StatutBio, Supplier};

/// Certification state the directory uses for an operator engaged in organic production.
pub const ENGAGED: &str = "ENGAGEE";

/// Any engaged activity makes the operator certified, unless one of them is a conversion.
pub fn derive_statut(activities: &[RegistryActivity]) -> StatutBio {
    let engaged: Vec<&RegistryActivity> = activities
        .iter()
        .filter(|activity| {
            activity
                .etat_certification
                .as_deref()
                .is_some_and(|state| state.trim().eq_ignore_ascii_case(ENGAGED))
        })
        .collect();

    if engaged.is_empty() {
        return StatutBio::NonCertifie;
    }

    let converting = engaged.iter().any(|activity| {
        activity
            .nom
            .as_deref()
            .is_some_and(|label| label.to_lowercase().contains("conversion"))
    });
    if converting {
        StatutBio::EnConversion
    } else {
        StatutBio::Certifie
    }
}

/// First certificate that is neither suspended nor terminated.
pub fn active_certificate(certificates: &[RegistryCertificate]) -> Option<&RegistryCertificate> {
    fn unset(date: &Option<String>) -> bool {
        date.as_deref().map_or(true, |value| value.trim().is_empty())
    }
    certificates
        .iter()
        .find(|certificate| unset(&certificate.date_suspension) && unset(&certificate.date_arret))
}

/// Directory entry reduced to the attributes reconciliation can write back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryCandidate {
    pub registry_id: Option<String>,
    pub name: String,
    pub siret: Option<String>,
    pub bio_number: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub statut_bio: StatutBio,
    pub certifying_body: Option<String>,
    pub certified_since: Option<String>,
    pub certificate_url: Option<String>,
}

impl RegistryCandidate {
    pub fn from_operator(operator: &RegistryOperator) -> Self {
        let address = operator.adresses_operateurs.first();
        let certificate = active_certificate(&operator.certificats);
        Self {
            registry_id: operator.id.clone(),
            name: operator.display_name().unwrap_or_default().to_string(),
            siret: operator.siret.clone(),
            bio_number: operator.numero_bio.clone(),
            postal_code: address.and_then(|address| address.code_postal.clone()),
            city: address.and_then(|address| address.ville.clone()),
            statut_bio: derive_statut(&operator.activites),
            certifying_body: certificate.and_then(|certificate| certificate.organisme.clone()),
            certified_since: certificate
                .and_then(|certificate| certificate.date_engagement.clone()),
            certificate_url: certificate.and_then(|certificate| certificate.url.clone()),
        }
    }
}

impl Rankable for RegistryCandidate {
    fn rank_name(&self) -> &str {
        &self.name
    }

    fn rank_city(&self) -> Option<&str> {
        self.city.as_deref()
    }

    fn rank_postal_code(&self) -> Option<&str> {
        self.postal_code.as_deref()
    }
}

/// Result of a best-effort registry lookup. Never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub found: bool,
    pub candidate: Option<RegistryCandidate>,
    #[serde(default)]
    pub alternatives: Vec<RegistryCandidate>,
    pub message: Option<String>,
}

impl VerificationOutcome {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            found: false,
            candidate: None,
            alternatives: Vec::new(),
            message: Some(message.into()),
        }
    }
}

/// Query the directory and keep the most relevant candidate.
pub async fn verify<G>(
    registry: &G,
    query: &RegistryQuery,
    timeout: Duration,
) -> VerificationOutcome
where
    G: RegistryClient + ?Sized,
{
    if query.is_empty() {
        return VerificationOutcome::not_found("Recherche vide");
    }

    let page = match within(ExternalService::Registry, timeout, registry.search(query)).await {
        Ok(page) => page,
        Err(err) => {
            warn!(error = %err, "registry lookup fell back to not found");
            return VerificationOutcome::not_found(
                "Annuaire bio temporairement indisponible, réessayez plus tard",
            );
        }
    };

    let candidates: Vec<RegistryCandidate> =
        page.items.iter().map(RegistryCandidate::from_operator).collect();
    let mut ranked = rank(candidates, query)
        .into_iter()
        .map(|ranked| ranked.item);

    match ranked.next() {
        Some(candidate) => {
            info!(
                registry_id = candidate.registry_id.as_deref().unwrap_or("-"),
                statut = candidate.statut_bio.label(),
                "registry operator found"
            );
            VerificationOutcome {
                found: true,
                candidate: Some(candidate),
                alternatives: ranked.collect(),
                message: None,
            }
        }
        None => VerificationOutcome::not_found("Aucun opérateur trouvé dans l'annuaire bio"),
    }
}

/// Merge verified attributes. Only the certification and verification fields change.
pub fn apply_verification(
    supplier: &mut Supplier,
    candidate: &RegistryCandidate,
    now: DateTime<Utc>,
) {
    supplier.statut_bio = candidate.statut_bio;
    supplier.registry_verified = true;
    supplier.registry_id = candidate.registry_id.clone();
    supplier.last_verified_at = Some(now);
    supplier.bio_number = candidate.bio_number.clone();
    supplier.certifying_body = candidate.certifying_body.clone();
    supplier.certificate_url = candidate.certificate_url.clone();
}

pub fn apply_operator_verification(
    organization: &mut Organization,
    candidate: &RegistryCandidate,
    now: DateTime<Utc>,
) {
    organization.registry_verified = true;
    organization.registry_id = candidate.registry_id.clone();
    organization.last_verified_at = Some(now);
}
