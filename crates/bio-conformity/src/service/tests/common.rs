use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::ai::AiClient;
use crate::certificates::CertificateStatus;
use crate::error::{ExternalService, ExternalServiceUnavailable};
use crate::records::{
    Certificate, ComplianceRepository, Input, Organization, OrganizationId, RepositoryError,
    StatutBio, Supplier,
};
use crate::registry::{
    RegistryActivity, RegistryAddress, RegistryCertificate, RegistryClient, RegistryOperator,
    RegistryPage, RegistryQuery,
};
use crate::router::compliance_router;
use crate::service::{ComplianceService, ServiceConfig};

pub(super) type TestService = ComplianceService<MemoryRepository, ScriptedAi, StaticRegistry>;

pub(super) fn org() -> OrganizationId {
    OrganizationId("org-thuyas".to_string())
}

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 10, 9, 0, 0)
        .single()
        .expect("valid instant")
}

pub(super) fn organization() -> Organization {
    Organization {
        id: org(),
        name: "EARL des Thuyas".to_string(),
        siret: Some("12345678900012".to_string()),
        registry_verified: false,
        registry_id: None,
        last_verified_at: None,
    }
}

pub(super) fn supplier(id: &str, name: &str, statut: StatutBio) -> Supplier {
    let mut supplier = Supplier::new(id, org(), name);
    supplier.statut_bio = statut;
    supplier
}

pub(super) fn certificate(
    id: &str,
    expires_on: NaiveDate,
    cached: CertificateStatus,
) -> Certificate {
    Certificate {
        id: id.to_string(),
        organization_id: org(),
        supplier_name: Some("Semences du Nord".to_string()),
        number: format!("FR-BIO-01-{id}"),
        certifying_body: Some("Ecocert France".to_string()),
        issued_on: None,
        expires_on,
        products: BTreeSet::from(["Semences de blé".to_string()]),
        statut: cached,
    }
}

pub(super) fn registry_operator(name: &str, activity: &str) -> RegistryOperator {
    RegistryOperator {
        id: Some("48211".to_string()),
        raison_sociale: Some(name.to_string()),
        numero_bio: Some("59-1234".to_string()),
        adresses_operateurs: vec![RegistryAddress {
            code_postal: Some("59151".to_string()),
            ville: Some("Arleux".to_string()),
            ..RegistryAddress::default()
        }],
        activites: vec![RegistryActivity {
            nom: Some(activity.to_string()),
            etat_certification: Some("ENGAGEE".to_string()),
        }],
        certificats: vec![RegistryCertificate {
            organisme: Some("Ecocert France".to_string()),
            date_engagement: Some("2019-04-01".to_string()),
            url: Some("https://certificat.example/48211.pdf".to_string()),
            ..RegistryCertificate::default()
        }],
        ..RegistryOperator::default()
    }
}

pub(super) fn build_service(
    ai: ScriptedAi,
    registry: StaticRegistry,
) -> (TestService, Arc<MemoryRepository>) {
    let repository = Arc::new(MemoryRepository::default());
    repository
        .update_organization(organization())
        .expect("seed organization");
    let service = ComplianceService::new(
        repository.clone(),
        Arc::new(ai),
        Arc::new(registry),
        ServiceConfig::default(),
    );
    (service, repository)
}

pub(super) fn router_with_service(service: TestService) -> axum::Router {
    compliance_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    organizations: Arc<Mutex<HashMap<OrganizationId, Organization>>>,
    inputs: Arc<Mutex<Vec<Input>>>,
    suppliers: Arc<Mutex<Vec<Supplier>>>,
    certificates: Arc<Mutex<Vec<Certificate>>>,
    input_slots: Arc<Mutex<Option<usize>>>,
}

impl MemoryRepository {
    /// Accept `slots` more input inserts, then fail every further one as unavailable.
    pub(super) fn fail_inputs_after(&self, slots: usize) {
        *self.input_slots.lock().expect("repository mutex poisoned") = Some(slots);
    }

    pub(super) fn stored_certificates(&self) -> Vec<Certificate> {
        self.certificates
            .lock()
            .expect("repository mutex poisoned")
            .clone()
    }
}

fn replace<T>(
    records: &Mutex<Vec<T>>,
    record: T,
    same: impl Fn(&T) -> bool,
) -> Result<(), RepositoryError> {
    let mut guard = records.lock().expect("repository mutex poisoned");
    match guard.iter_mut().find(|existing| same(existing)) {
        Some(existing) => {
            *existing = record;
            Ok(())
        }
        None => Err(RepositoryError::NotFound),
    }
}

impl ComplianceRepository for MemoryRepository {
    fn organization(&self, id: &OrganizationId) -> Result<Option<Organization>, RepositoryError> {
        let guard = self.organizations.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update_organization(&self, organization: Organization) -> Result<(), RepositoryError> {
        let mut guard = self.organizations.lock().expect("repository mutex poisoned");
        guard.insert(organization.id.clone(), organization);
        Ok(())
    }

    fn inputs(&self, organization: &OrganizationId) -> Result<Vec<Input>, RepositoryError> {
        let guard = self.inputs.lock().expect("repository mutex poisoned");
        Ok(guard
            .iter()
            .filter(|input| &input.organization_id == organization)
            .cloned()
            .collect())
    }

    fn input(
        &self,
        organization: &OrganizationId,
        id: &str,
    ) -> Result<Option<Input>, RepositoryError> {
        Ok(self
            .inputs(organization)?
            .into_iter()
            .find(|input| input.id == id))
    }

    fn insert_input(&self, input: Input) -> Result<Input, RepositoryError> {
        if let Some(slots) = self
            .input_slots
            .lock()
            .expect("repository mutex poisoned")
            .as_mut()
        {
            if *slots == 0 {
                return Err(offline());
            }
            *slots -= 1;
        }
        let mut guard = self.inputs.lock().expect("repository mutex poisoned");
        if guard.iter().any(|existing| existing.id == input.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.push(input.clone());
        Ok(input)
    }

    fn update_input(&self, input: Input) -> Result<(), RepositoryError> {
        let id = input.id.clone();
        replace(&self.inputs, input, |existing| existing.id == id)
    }

    fn delete_input(
        &self,
        organization: &OrganizationId,
        id: &str,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.inputs.lock().expect("repository mutex poisoned");
        let before = guard.len();
        guard.retain(|input| !(input.id == id && &input.organization_id == organization));
        if guard.len() == before {
            Err(RepositoryError::NotFound)
        } else {
            Ok(())
        }
    }

    fn suppliers(&self, organization: &OrganizationId) -> Result<Vec<Supplier>, RepositoryError> {
        let guard = self.suppliers.lock().expect("repository mutex poisoned");
        Ok(guard
            .iter()
            .filter(|supplier| &supplier.organization_id == organization)
            .cloned()
            .collect())
    }

    fn supplier(
        &self,
        organization: &OrganizationId,
        id: &str,
    ) -> Result<Option<Supplier>, RepositoryError> {
        Ok(self
            .suppliers(organization)?
            .into_iter()
            .find(|supplier| supplier.id == id))
    }

    fn insert_supplier(&self, supplier: Supplier) -> Result<Supplier, RepositoryError> {
        let mut guard = self.suppliers.lock().expect("repository mutex poisoned");
        if guard.iter().any(|existing| existing.id == supplier.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.push(supplier.clone());
        Ok(supplier)
    }

    fn update_supplier(&self, supplier: Supplier) -> Result<(), RepositoryError> {
        let id = supplier.id.clone();
        replace(&self.suppliers, supplier, |existing| existing.id == id)
    }

    fn certificates(
        &self,
        organization: &OrganizationId,
    ) -> Result<Vec<Certificate>, RepositoryError> {
        let guard = self.certificates.lock().expect("repository mutex poisoned");
        Ok(guard
            .iter()
            .filter(|certificate| &certificate.organization_id == organization)
            .cloned()
            .collect())
    }

    fn insert_certificate(&self, certificate: Certificate) -> Result<Certificate, RepositoryError> {
        let mut guard = self.certificates.lock().expect("repository mutex poisoned");
        if guard.iter().any(|existing| existing.id == certificate.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.push(certificate.clone());
        Ok(certificate)
    }

    fn update_certificate(&self, certificate: Certificate) -> Result<(), RepositoryError> {
        let id = certificate.id.clone();
        replace(&self.certificates, certificate, |existing| existing.id == id)
    }
}

pub(super) struct UnavailableRepository;

impl ComplianceRepository for UnavailableRepository {
    fn organization(
        &self,
        _id: &OrganizationId,
    ) -> Result<Option<Organization>, RepositoryError> {
        Err(offline())
    }

    fn update_organization(&self, _organization: Organization) -> Result<(), RepositoryError> {
        Err(offline())
    }

    fn inputs(&self, _organization: &OrganizationId) -> Result<Vec<Input>, RepositoryError> {
        Err(offline())
    }

    fn input(
        &self,
        _organization: &OrganizationId,
        _id: &str,
    ) -> Result<Option<Input>, RepositoryError> {
        Err(offline())
    }

    fn insert_input(&self, _input: Input) -> Result<Input, RepositoryError> {
        Err(offline())
    }

    fn update_input(&self, _input: Input) -> Result<(), RepositoryError> {
        Err(offline())
    }

    fn delete_input(
        &self,
        _organization: &OrganizationId,
        _id: &str,
    ) -> Result<(), RepositoryError> {
        Err(offline())
    }

    fn suppliers(
        &self,
        _organization: &OrganizationId,
    ) -> Result<Vec<Supplier>, RepositoryError> {
        Err(offline())
    }

    fn supplier(
        &self,
        _organization: &OrganizationId,
        _id: &str,
    ) -> Result<Option<Supplier>, RepositoryError> {
        Err(offline())
    }

    fn insert_supplier(&self, _supplier: Supplier) -> Result<Supplier, RepositoryError> {
        Err(offline())
    }

    fn update_supplier(&self, _supplier: Supplier) -> Result<(), RepositoryError> {
        Err(offline())
    }

    fn certificates(
        &self,
        _organization: &OrganizationId,
    ) -> Result<Vec<Certificate>, RepositoryError> {
        Err(offline())
    }

    fn insert_certificate(
        &self,
        _certificate: Certificate,
    ) -> Result<Certificate, RepositoryError> {
        Err(offline())
    }

    fn update_certificate(&self, _certificate: Certificate) -> Result<(), RepositoryError> {
        Err(offline())
    }
}

fn offline() -> RepositoryError {
    RepositoryError::Unavailable("database offline".to_string())
}

/// AI double answering analysis calls from a script; OCR returns a fixed payload.
#[derive(Default)]
pub(super) struct ScriptedAi {
    analyses: Mutex<Vec<Result<String, ExternalServiceUnavailable>>>,
    extraction: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedAi {
    pub(super) fn offline() -> Self {
        Self::default()
    }

    pub(super) fn answering(analyses: Vec<&str>) -> Self {
        Self {
            analyses: Mutex::new(analyses.into_iter().map(|a| Ok(a.to_string())).collect()),
            ..Self::default()
        }
    }

    pub(super) fn with_extraction(mut self, extraction: &str) -> Self {
        self.extraction = Some(extraction.to_string());
        self
    }

    pub(super) fn analysis_calls(&self) -> usize {
        self.prompts.lock().expect("prompt mutex poisoned").len()
    }

    pub(super) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt mutex poisoned").clone()
    }
}

#[async_trait]
impl AiClient for ScriptedAi {
    async fn analyze_text(
        &self,
        _system: &str,
        prompt: &str,
    ) -> Result<String, ExternalServiceUnavailable> {
        self.prompts
            .lock()
            .expect("prompt mutex poisoned")
            .push(prompt.to_string());
        let mut analyses = self.analyses.lock().expect("analysis mutex poisoned");
        if analyses.is_empty() {
            Err(ExternalServiceUnavailable::new(ExternalService::Ai, "offline"))
        } else {
            analyses.remove(0)
        }
    }

    async fn extract_document(
        &self,
        _document: &[u8],
        _mime_type: &str,
        _prompt: &str,
    ) -> Result<String, ExternalServiceUnavailable> {
        self.extraction
            .clone()
            .ok_or_else(|| ExternalServiceUnavailable::new(ExternalService::Ai, "offline"))
    }
}

/// Registry double returning one fixed answer and recording queries.
pub(super) struct StaticRegistry {
    answer: Result<RegistryPage, ExternalServiceUnavailable>,
    queries: Mutex<Vec<RegistryQuery>>,
}

impl StaticRegistry {
    pub(super) fn returning(items: Vec<RegistryOperator>) -> Self {
        let total = items.len() as u64;
        Self {
            answer: Ok(RegistryPage { items, total }),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn offline() -> Self {
        Self {
            answer: Err(ExternalServiceUnavailable::new(
                ExternalService::Registry,
                "HTTP 503",
            )),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn queries(&self) -> Vec<RegistryQuery> {
        self.queries.lock().expect("query mutex poisoned").clone()
    }
}

#[async_trait]
impl RegistryClient for StaticRegistry {
    async fn search(
        &self,
        query: &RegistryQuery,
    ) -> Result<RegistryPage, ExternalServiceUnavailable> {
        self.queries
            .lock()
            .expect("query mutex poisoned")
            .push(query.clone());
        self.answer.clone()
    }
}
