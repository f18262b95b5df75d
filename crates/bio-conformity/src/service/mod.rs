//! Service composing the repository, the conformity classifier and the registry reconciler.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ai::AiClient;
use crate::certificates::evaluate_at;
use crate::config::AppConfig;
use crate::conformity::{ClassifierConfig, ConformityClassifier, ProductDescriptor};
use crate::error::ExternalServiceUnavailable;
use crate::invoices::{
    normalize_text, InvoiceExtraction, InvoiceScanner, NormalizeError, ScanError, ScannedInvoice,
};
use crate::records::{
    Certificate, ComplianceRepository, Input, Organization, OrganizationId, RepositoryError,
    StatutBio, Supplier,
};
use crate::registry::{
    apply_operator_verification, apply_verification, search_local, verify, Ranked,
    RegistryClient, RegistryQuery, VerificationOutcome,
};
use crate::scoring::{compute_at, ScoreSnapshot, SecurityScore};

#[cfg(test)]
mod tests;

/// Timeouts and classifier tuning for the service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub classifier: ClassifierConfig,
    pub extraction_timeout: Duration,
    pub registry_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            extraction_timeout: Duration::from_secs(20),
            registry_timeout: Duration::from_secs(10),
        }
    }
}

impl ServiceConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            classifier: ClassifierConfig {
                rule_shortcuts: true,
                timeout: config.ai.timeout,
            },
            extraction_timeout: config.ai.timeout,
            registry_timeout: config.registry.timeout,
        }
    }
}

/// Validated invoice handed back by the user for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRequest {
    pub extraction: InvoiceExtraction,
    #[serde(default)]
    pub plot_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitReceipt {
    pub inputs: Vec<Input>,
    pub supplier_created: Option<Supplier>,
    pub skipped_lines: Vec<String>,
}

/// Operator identity declared by the farm itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationRegistration {
    pub name: String,
    #[serde(default)]
    pub siret: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupplierRegistration {
    pub name: String,
    #[serde(default)]
    pub siret: Option<String>,
    #[serde(default)]
    pub vat_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub statut_bio: StatutBio,
    #[serde(default)]
    pub bio_number: Option<String>,
    #[serde(default)]
    pub certifying_body: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateRegistration {
    pub number: String,
    pub expires_on: NaiveDate,
    #[serde(default)]
    pub supplier_name: Option<String>,
    #[serde(default)]
    pub certifying_body: Option<String>,
    #[serde(default)]
    pub issued_on: Option<NaiveDate>,
    #[serde(default)]
    pub products: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SupplierVerification {
    pub supplier: Supplier,
    pub outcome: VerificationOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganizationVerification {
    pub organization: Organization,
    pub outcome: VerificationOutcome,
}

static RECORD_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_record_id(prefix: &str) -> String {
    let id = RECORD_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{id:06}")
}

fn same_name(left: &str, right: &str) -> bool {
    left.trim().eq_ignore_ascii_case(right.trim())
}

fn required(field: &str, value: &str) -> Result<String, ComplianceServiceError> {
    match value.trim() {
        "" => Err(ComplianceServiceError::InvalidRecord(format!(
            "{field} must not be empty"
        ))),
        trimmed => Ok(trimmed.to_string()),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub struct ComplianceService<R, A, G> {
    repository: Arc<R>,
    classifier: Arc<ConformityClassifier<A>>,
    scanner: InvoiceScanner<A>,
    registry: Arc<G>,
    config: ServiceConfig,
}

impl<R, A, G> ComplianceService<R, A, G>
where
    R: ComplianceRepository + 'static,
    A: AiClient + 'static,
    G: RegistryClient + 'static,
{
    pub fn new(repository: Arc<R>, ai: Arc<A>, registry: Arc<G>, config: ServiceConfig) -> Self {
        let classifier = Arc::new(ConformityClassifier::new(
            ai.clone(),
            config.classifier.clone(),
        ));
        let scanner = InvoiceScanner::new(ai, classifier.clone(), config.extraction_timeout);
        Self {
            repository,
            classifier,
            scanner,
            registry,
            config,
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Raw AI extraction text to a strict extraction.
    pub fn normalize(&self, text: &str) -> Result<InvoiceExtraction, ComplianceServiceError> {
        Ok(normalize_text(text)?)
    }

    pub async fn scan(
        &self,
        organization: Option<&OrganizationId>,
        document: &[u8],
        mime_type: &str,
    ) -> Result<ScannedInvoice, ComplianceServiceError> {
        let extraction = self.scanner.extract(document, mime_type).await?;
        self.classify(organization, extraction).await
    }

    /// Classify every line of an extraction, using the organization's knowledge of
    /// the supplier when one is given.
    pub async fn classify(
        &self,
        organization: Option<&OrganizationId>,
        extraction: InvoiceExtraction,
    ) -> Result<ScannedInvoice, ComplianceServiceError> {
        let statut = match (organization, extraction.supplier.name.as_deref()) {
            (Some(organization), Some(name)) => self
                .find_supplier_by_name(organization, name)?
                .map(|supplier| supplier.statut_bio),
            _ => None,
        };
        Ok(self.scanner.classify(extraction, statut).await)
    }

    /// Persist validated lines as inputs. Lines without a description are skipped.
    pub fn commit_invoice(
        &self,
        organization: &OrganizationId,
        request: CommitRequest,
    ) -> Result<CommitReceipt, ComplianceServiceError> {
        self.require_organization(organization)?;
        let extraction = request.extraction;

        let supplier_name = extraction
            .supplier
            .name
            .clone()
            .filter(|name| !name.trim().is_empty());
        let purchase_date = extraction
            .invoice_date
            .as_deref()
            .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok());

        let mut pending = Vec::new();
        let mut skipped_lines = Vec::new();
        for line in extraction.lines {
            let product_name = match line.description.as_deref().map(str::trim) {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => {
                    skipped_lines.push(line.id);
                    continue;
                }
            };
            pending.push(Input {
                id: next_record_id("inp"),
                organization_id: organization.clone(),
                plot_id: request.plot_id.clone(),
                product_name,
                supplier_name: supplier_name.clone(),
                lot_number: line.lot_number.clone(),
                quantity: line.quantity,
                unit: line.unit.clone(),
                purchase_date,
                use_date: None,
                unit_price: line.unit_price,
                total_price: line.total_price,
                is_bio: line.is_bio,
                conformity_status: line.conformity_status,
                conformity_score: line.effective_score(),
                notes: line
                    .conformity_analysis
                    .as_ref()
                    .and_then(|analysis| analysis.summary.clone()),
            });
        }

        if pending.is_empty() {
            return Err(ComplianceServiceError::InvalidDocument(
                "invoice has no line to record".to_string(),
            ));
        }

        let known_supplier = match &supplier_name {
            Some(name) => self.find_supplier_by_name(organization, name)?,
            None => None,
        };

        let mut inputs = Vec::with_capacity(pending.len());
        for input in pending {
            match self.repository.insert_input(input) {
                Ok(stored) => inputs.push(stored),
                Err(err) => {
                    self.discard_inputs(organization, &inputs);
                    return Err(err.into());
                }
            }
        }

        let supplier_created = match (&supplier_name, known_supplier) {
            (Some(name), None) => {
                let mut supplier =
                    Supplier::new(&next_record_id("sup"), organization.clone(), name.trim());
                supplier.siret = extraction.supplier.siret.clone();
                supplier.vat_number = extraction.supplier.vat_number.clone();
                supplier.address = extraction.supplier.address.clone();
                match self.repository.insert_supplier(supplier) {
                    Ok(stored) => Some(stored),
                    Err(err) => {
                        self.discard_inputs(organization, &inputs);
                        return Err(err.into());
                    }
                }
            }
            _ => None,
        };

        info!(
            organization = %organization,
            inputs = inputs.len(),
            skipped = skipped_lines.len(),
            "invoice committed"
        );
        Ok(CommitReceipt {
            inputs,
            supplier_created,
            skipped_lines,
        })
    }

    /// Re-run the classifier on a stored input and persist the new verdict.
    pub async fn reclassify_input(
        &self,
        organization: &OrganizationId,
        input_id: &str,
    ) -> Result<Input, ComplianceServiceError> {
        let mut input = self
            .repository
            .input(organization, input_id)?
            .ok_or(RepositoryError::NotFound)?;

        let supplier_statut = match input.supplier_name.as_deref() {
            Some(name) => self
                .find_supplier_by_name(organization, name)?
                .map(|supplier| supplier.statut_bio),
            None => None,
        };
        let descriptor = ProductDescriptor {
            product_name: input.product_name.clone(),
            description: None,
            supplier_name: input.supplier_name.clone(),
            supplier_statut,
            is_bio: input.is_bio,
            lot_number: input.lot_number.clone(),
        };

        let verdict = self.classifier.classify(&descriptor).await;
        input.conformity_status = Some(verdict.status);
        input.conformity_score = Some(verdict.score);
        input.notes = verdict.analysis.summary;
        self.repository.update_input(input.clone())?;
        Ok(input)
    }

    pub fn inputs(
        &self,
        organization: &OrganizationId,
    ) -> Result<Vec<Input>, ComplianceServiceError> {
        Ok(self.repository.inputs(organization)?)
    }

    pub fn delete_input(
        &self,
        organization: &OrganizationId,
        input_id: &str,
    ) -> Result<(), ComplianceServiceError> {
        self.repository.delete_input(organization, input_id)?;
        info!(organization = %organization, input = input_id, "input deleted");
        Ok(())
    }

    /// Create the organization or update its identity. A changed SIRET clears the
    /// registry verification, which then has to be run again.
    pub fn register_organization(
        &self,
        organization: &OrganizationId,
        registration: OrganizationRegistration,
    ) -> Result<Organization, ComplianceServiceError> {
        let name = required("name", &registration.name)?;
        let siret = non_blank(registration.siret);

        let record = match self.repository.organization(organization)? {
            Some(mut existing) => {
                if existing.siret != siret {
                    existing.registry_verified = false;
                    existing.registry_id = None;
                    existing.last_verified_at = None;
                }
                existing.name = name;
                existing.siret = siret;
                existing
            }
            None => Organization {
                id: organization.clone(),
                name,
                siret,
                registry_verified: false,
                registry_id: None,
                last_verified_at: None,
            },
        };
        self.repository.update_organization(record.clone())?;
        info!(organization = %organization, "organization registered");
        Ok(record)
    }

    /// Add a supplier by hand. Names are unique within an organization.
    pub fn register_supplier(
        &self,
        organization: &OrganizationId,
        registration: SupplierRegistration,
    ) -> Result<Supplier, ComplianceServiceError> {
        self.require_organization(organization)?;
        let name = required("name", &registration.name)?;
        if self.find_supplier_by_name(organization, &name)?.is_some() {
            return Err(RepositoryError::Conflict.into());
        }

        let mut supplier = Supplier::new(&next_record_id("sup"), organization.clone(), &name);
        supplier.siret = non_blank(registration.siret);
        supplier.vat_number = non_blank(registration.vat_number);
        supplier.address = non_blank(registration.address);
        supplier.postal_code = non_blank(registration.postal_code);
        supplier.city = non_blank(registration.city);
        supplier.statut_bio = registration.statut_bio;
        supplier.bio_number = non_blank(registration.bio_number);
        supplier.certifying_body = non_blank(registration.certifying_body);
        Ok(self.repository.insert_supplier(supplier)?)
    }

    pub fn register_certificate(
        &self,
        organization: &OrganizationId,
        registration: CertificateRegistration,
    ) -> Result<Certificate, ComplianceServiceError> {
        self.register_certificate_at(organization, registration, Utc::now())
    }

    pub fn register_certificate_at(
        &self,
        organization: &OrganizationId,
        registration: CertificateRegistration,
        now: DateTime<Utc>,
    ) -> Result<Certificate, ComplianceServiceError> {
        self.require_organization(organization)?;
        let number = required("number", &registration.number)?;

        let certificate = Certificate {
            id: next_record_id("cert"),
            organization_id: organization.clone(),
            supplier_name: non_blank(registration.supplier_name),
            number,
            certifying_body: non_blank(registration.certifying_body),
            issued_on: registration.issued_on,
            expires_on: registration.expires_on,
            products: registration.products,
            statut: evaluate_at(registration.expires_on, now),
        };
        Ok(self.repository.insert_certificate(certificate)?)
    }

    pub fn security_score(
        &self,
        organization: &OrganizationId,
    ) -> Result<SecurityScore, ComplianceServiceError> {
        self.security_score_at(organization, Utc::now())
    }

    pub fn security_score_at(
        &self,
        organization: &OrganizationId,
        now: DateTime<Utc>,
    ) -> Result<SecurityScore, ComplianceServiceError> {
        let record = self.require_organization(organization)?;
        let inputs = self.repository.inputs(organization)?;
        let suppliers = self.repository.suppliers(organization)?;
        let certificates = self.repository.certificates(organization)?;
        let snapshot = ScoreSnapshot::from_records(
            record.registry_verified,
            &inputs,
            &suppliers,
            &certificates,
            now,
        );
        Ok(compute_at(&snapshot, now))
    }

    pub fn certificates(
        &self,
        organization: &OrganizationId,
    ) -> Result<Vec<Certificate>, ComplianceServiceError> {
        self.certificates_at(organization, Utc::now())
    }

    /// Certificates with their cached status refreshed; stale caches are written back.
    pub fn certificates_at(
        &self,
        organization: &OrganizationId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Certificate>, ComplianceServiceError> {
        let mut certificates = self.repository.certificates(organization)?;
        for certificate in certificates.iter_mut() {
            if certificate.refresh_status(now) {
                self.repository.update_certificate(certificate.clone())?;
            }
        }
        Ok(certificates)
    }

    pub fn search_suppliers(
        &self,
        organization: &OrganizationId,
        raw_query: &str,
    ) -> Result<Vec<Ranked<Supplier>>, ComplianceServiceError> {
        let query = RegistryQuery::parse(raw_query);
        let suppliers = self.repository.suppliers(organization)?;
        Ok(search_local(suppliers, &query))
    }

    /// Best-effort registry verification of one supplier. Registry failures are
    /// reported in the outcome, never as errors.
    pub async fn verify_supplier(
        &self,
        organization: &OrganizationId,
        supplier_id: &str,
    ) -> Result<SupplierVerification, ComplianceServiceError> {
        let mut supplier = self
            .repository
            .supplier(organization, supplier_id)?
            .ok_or(RepositoryError::NotFound)?;

        let query = match supplier.siret.as_deref() {
            Some(siret) if !siret.trim().is_empty() => RegistryQuery::by_siret(siret),
            _ => RegistryQuery::parse(&format!(
                "{} {}",
                supplier.name,
                supplier.postal_code.as_deref().unwrap_or_default()
            )),
        };

        let outcome = verify(self.registry.as_ref(), &query, self.config.registry_timeout).await;
        if let Some(candidate) = &outcome.candidate {
            apply_verification(&mut supplier, candidate, Utc::now());
            self.repository.update_supplier(supplier.clone())?;
            info!(
                organization = %organization,
                supplier = %supplier.id,
                statut = supplier.statut_bio.label(),
                "supplier verified"
            );
        }

        Ok(SupplierVerification { supplier, outcome })
    }

    pub async fn verify_organization(
        &self,
        organization: &OrganizationId,
    ) -> Result<OrganizationVerification, ComplianceServiceError> {
        let mut record = self.require_organization(organization)?;

        let query = match record.siret.as_deref() {
            Some(siret) if !siret.trim().is_empty() => RegistryQuery::by_siret(siret),
            _ => RegistryQuery::parse(&record.name),
        };

        let outcome = verify(self.registry.as_ref(), &query, self.config.registry_timeout).await;
        if let Some(candidate) = &outcome.candidate {
            apply_operator_verification(&mut record, candidate, Utc::now());
            self.repository.update_organization(record.clone())?;
            info!(organization = %organization, "operator verified");
        }

        Ok(OrganizationVerification {
            organization: record,
            outcome,
        })
    }

    /// Undo a partially committed invoice. Failures are logged; the original error wins.
    fn discard_inputs(&self, organization: &OrganizationId, inputs: &[Input]) {
        for input in inputs {
            if let Err(err) = self.repository.delete_input(organization, &input.id) {
                warn!(
                    organization = %organization,
                    input = %input.id,
                    error = %err,
                    "could not roll back committed input"
                );
            }
        }
    }

    fn require_organization(
        &self,
        organization: &OrganizationId,
    ) -> Result<Organization, ComplianceServiceError> {
        Ok(self
            .repository
            .organization(organization)?
            .ok_or(RepositoryError::NotFound)?)
    }

    fn find_supplier_by_name(
        &self,
        organization: &OrganizationId,
        name: &str,
    ) -> Result<Option<Supplier>, ComplianceServiceError> {
        Ok(self
            .repository
            .suppliers(organization)?
            .into_iter()
            .find(|supplier| same_name(&supplier.name, name)))
    }
}

/// Error raised by the compliance service.
#[derive(Debug, thiserror::Error)]
pub enum ComplianceServiceError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Unavailable(#[from] ExternalServiceUnavailable),
}

impl From<ScanError> for ComplianceServiceError {
    fn from(value: ScanError) -> Self {
        match value {
            ScanError::EmptyDocument | ScanError::UnsupportedType(_) => {
                Self::InvalidDocument(value.to_string())
            }
            ScanError::Unavailable(err) => Self::Unavailable(err),
            ScanError::Malformed(err) => Self::Normalize(err),
        }
    }
}
