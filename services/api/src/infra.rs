use bio_conformity::records::{
    Certificate, ComplianceRepository, Input, Organization, OrganizationId, RepositoryError,
    Supplier,
};
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local store keyed by record id. Records of every organization share one map.
#[derive(Default, Clone)]
pub(crate) struct InMemoryComplianceRepository {
    organizations: Arc<Mutex<HashMap<OrganizationId, Organization>>>,
    inputs: Arc<Mutex<HashMap<String, Input>>>,
    suppliers: Arc<Mutex<HashMap<String, Supplier>>>,
    certificates: Arc<Mutex<HashMap<String, Certificate>>>,
}

fn scoped<T: Clone>(
    records: &Mutex<HashMap<String, T>>,
    keep: impl Fn(&T) -> bool,
    sort_key: impl Fn(&T) -> String,
) -> Vec<T> {
    let guard = records.lock().expect("repository mutex poisoned");
    let mut found: Vec<T> = guard.values().filter(|record| keep(record)).cloned().collect();
    found.sort_by_key(|record| sort_key(record));
    found
}

fn insert_new<T: Clone>(
    records: &Mutex<HashMap<String, T>>,
    id: &str,
    record: T,
) -> Result<T, RepositoryError> {
    let mut guard = records.lock().expect("repository mutex poisoned");
    if guard.contains_key(id) {
        return Err(RepositoryError::Conflict);
    }
    guard.insert(id.to_string(), record.clone());
    Ok(record)
}

fn replace_existing<T>(
    records: &Mutex<HashMap<String, T>>,
    id: &str,
    record: T,
) -> Result<(), RepositoryError> {
    let mut guard = records.lock().expect("repository mutex poisoned");
    match guard.get_mut(id) {
        Some(existing) => {
            *existing = record;
            Ok(())
        }
        None => Err(RepositoryError::NotFound),
    }
}

impl ComplianceRepository for InMemoryComplianceRepository {
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
        Ok(scoped(
            &self.inputs,
            |input| &input.organization_id == organization,
            |input| input.id.clone(),
        ))
    }

    fn input(
        &self,
        organization: &OrganizationId,
        id: &str,
    ) -> Result<Option<Input>, RepositoryError> {
        let guard = self.inputs.lock().expect("repository mutex poisoned");
        Ok(guard
            .get(id)
            .filter(|input| &input.organization_id == organization)
            .cloned())
    }

    fn insert_input(&self, input: Input) -> Result<Input, RepositoryError> {
        let id = input.id.clone();
        insert_new(&self.inputs, &id, input)
    }

    fn update_input(&self, input: Input) -> Result<(), RepositoryError> {
        let id = input.id.clone();
        replace_existing(&self.inputs, &id, input)
    }

    fn delete_input(&self, organization: &OrganizationId, id: &str) -> Result<(), RepositoryError> {
        let mut guard = self.inputs.lock().expect("repository mutex poisoned");
        match guard.get(id) {
            Some(input) if &input.organization_id == organization => {
                guard.remove(id);
                Ok(())
            }
            _ => Err(RepositoryError::NotFound),
        }
    }

    fn suppliers(&self, organization: &OrganizationId) -> Result<Vec<Supplier>, RepositoryError> {
        Ok(scoped(
            &self.suppliers,
            |supplier| &supplier.organization_id == organization,
            |supplier| supplier.id.clone(),
        ))
    }

    fn supplier(
        &self,
        organization: &OrganizationId,
        id: &str,
    ) -> Result<Option<Supplier>, RepositoryError> {
        let guard = self.suppliers.lock().expect("repository mutex poisoned");
        Ok(guard
            .get(id)
            .filter(|supplier| &supplier.organization_id == organization)
            .cloned())
    }

    fn insert_supplier(&self, supplier: Supplier) -> Result<Supplier, RepositoryError> {
        let id = supplier.id.clone();
        insert_new(&self.suppliers, &id, supplier)
    }

    fn update_supplier(&self, supplier: Supplier) -> Result<(), RepositoryError> {
        let id = supplier.id.clone();
        replace_existing(&self.suppliers, &id, supplier)
    }

    fn certificates(
        &self,
        organization: &OrganizationId,
    ) -> Result<Vec<Certificate>, RepositoryError> {
        Ok(scoped(
            &self.certificates,
            |certificate| &certificate.organization_id == organization,
            |certificate| certificate.id.clone(),
        ))
    }

    fn insert_certificate(&self, certificate: Certificate) -> Result<Certificate, RepositoryError> {
        let id = certificate.id.clone();
        insert_new(&self.certificates, &id, certificate)
    }

    fn update_certificate(&self, certificate: Certificate) -> Result<(), RepositoryError> {
        let id = certificate.id.clone();
        replace_existing(&self.certificates, &id, certificate)
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bio_conformity::certificates::CertificateStatus;
    use std::collections::BTreeSet;

    fn org(id: &str) -> OrganizationId {
        OrganizationId(id.to_string())
    }

    #[test]
    fn records_are_scoped_to_their_organization() {
        let repository = InMemoryComplianceRepository::default();
        repository
            .insert_supplier(Supplier::new("sup-2", org("org-a"), "Agri Nord"))
            .expect("insert");
        repository
            .insert_supplier(Supplier::new("sup-1", org("org-a"), "Semences du Nord"))
            .expect("insert");
        repository
            .insert_supplier(Supplier::new("sup-3", org("org-b"), "Terres d'Oise"))
            .expect("insert");

        let ids: Vec<_> = repository
            .suppliers(&org("org-a"))
            .expect("list")
            .into_iter()
            .map(|supplier| supplier.id)
            .collect();
        assert_eq!(ids, vec!["sup-1", "sup-2"]);
        assert!(repository
            .supplier(&org("org-b"), "sup-1")
            .expect("lookup")
            .is_none());
    }

    #[test]
    fn duplicate_ids_conflict_and_unknown_updates_fail() {
        let repository = InMemoryComplianceRepository::default();
        let certificate = Certificate {
            id: "cert-1".to_string(),
            organization_id: org("org-a"),
            supplier_name: None,
            number: "FR-BIO-01-2025-001".to_string(),
            certifying_body: None,
            issued_on: None,
            expires_on: NaiveDate::from_ymd_opt(2026, 1, 1).expect("date"),
            products: BTreeSet::new(),
            statut: CertificateStatus::Valide,
        };
        repository
            .insert_certificate(certificate.clone())
            .expect("first insert");
        assert!(matches!(
            repository.insert_certificate(certificate.clone()),
            Err(RepositoryError::Conflict)
        ));

        let mut unknown = certificate;
        unknown.id = "cert-2".to_string();
        assert!(matches!(
            repository.update_certificate(unknown),
            Err(RepositoryError::NotFound)
        ));
    }

    #[test]
    fn parse_date_reports_the_raw_value() {
        assert_eq!(
            parse_date(" 2025-06-10 "),
            Ok(NaiveDate::from_ymd_opt(2025, 6, 10).expect("date"))
        );
        let err = parse_date("10/06/2025").expect_err("wrong format");
        assert!(err.contains("10/06/2025"));
    }
}
