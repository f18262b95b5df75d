use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::certificates::{evaluate_at, CertificateStatus};
use crate::conformity::ConformityStatus;

/// Identifier wrapper for the organization owning every record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrganizationId(pub String);

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Organic certification state of a supplier, as known locally or from the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatutBio {
    Certifie,
    EnConversion,
    NonCertifie,
    #[default]
    Inconnu,
}

impl StatutBio {
    pub fn label(&self) -> &'static str {
        match self {
            StatutBio::Certifie => "certifie",
            StatutBio::EnConversion => "en_conversion",
            StatutBio::NonCertifie => "non_certifie",
            StatutBio::Inconnu => "inconnu",
        }
    }
}

/// The farm operator. Its registry verification feeds the security score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub siret: Option<String>,
    #[serde(default)]
    pub registry_verified: bool,
    pub registry_id: Option<String>,
    pub last_verified_at: Option<DateTime<Utc>>,
}

/// A purchased material tracked for traceability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    pub id: String,
    pub organization_id: OrganizationId,
    pub plot_id: Option<String>,
    pub product_name: String,
    pub supplier_name: Option<String>,
    pub lot_number: Option<String>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub use_date: Option<NaiveDate>,
    pub unit_price: Option<f64>,
    pub total_price: Option<f64>,
    /// Organic mention read on the invoice. `None` when the invoice said nothing.
    #[serde(default)]
    pub is_bio: Option<bool>,
    pub conformity_status: Option<ConformityStatus>,
    pub conformity_score: Option<u8>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: String,
    pub organization_id: OrganizationId,
    pub name: String,
    pub siret: Option<String>,
    pub vat_number: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    #[serde(default)]
    pub statut_bio: StatutBio,
    pub bio_number: Option<String>,
    pub certifying_body: Option<String>,
    #[serde(default)]
    pub registry_verified: bool,
    pub registry_id: Option<String>,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub certificate_url: Option<String>,
}

impl Supplier {
    /// A bare local supplier, not yet reconciled with the registry.
    pub fn new(id: &str, organization_id: OrganizationId, name: &str) -> Self {
        Self {
            id: id.to_string(),
            organization_id,
            name: name.to_string(),
            siret: None,
            vat_number: None,
            address: None,
            postal_code: None,
            city: None,
            statut_bio: StatutBio::Inconnu,
            bio_number: None,
            certifying_body: None,
            registry_verified: false,
            registry_id: None,
            last_verified_at: None,
            certificate_url: None,
        }
    }
}

/// An organic certificate held for a supplier. `statut` is a cache refreshed on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: String,
    pub organization_id: OrganizationId,
    pub supplier_name: Option<String>,
    pub number: String,
    pub certifying_body: Option<String>,
    pub issued_on: Option<NaiveDate>,
    pub expires_on: NaiveDate,
    #[serde(default)]
    pub products: BTreeSet<String>,
    pub statut: CertificateStatus,
}

impl Certificate {
    /// Recompute the cached status; returns whether it changed.
    pub fn refresh_status(&mut self, now: DateTime<Utc>) -> bool {
        let statut = evaluate_at(self.expires_on, now);
        let changed = statut != self.statut;
        self.statut = statut;
        changed
    }
}
