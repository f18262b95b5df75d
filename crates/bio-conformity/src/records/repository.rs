use super::domain::{Certificate, Input, Organization, OrganizationId, Supplier};

/// Storage abstraction so the service can be exercised in isolation.
/// Every read is scoped to one organization.
pub trait ComplianceRepository: Send + Sync {
    fn organization(&self, id: &OrganizationId) -> Result<Option<Organization>, RepositoryError>;
    fn update_organization(&self, organization: Organization) -> Result<(), RepositoryError>;

    fn inputs(&self, organization: &OrganizationId) -> Result<Vec<Input>, RepositoryError>;
    fn input(&self, organization: &OrganizationId, id: &str)
        -> Result<Option<Input>, RepositoryError>;
    fn insert_input(&self, input: Input) -> Result<Input, RepositoryError>;
    fn update_input(&self, input: Input) -> Result<(), RepositoryError>;
    fn delete_input(&self, organization: &OrganizationId, id: &str) -> Result<(), RepositoryError>;

    fn suppliers(&self, organization: &OrganizationId) -> Result<Vec<Supplier>, RepositoryError>;
    fn supplier(
        &self,
        organization: &OrganizationId,
        id: &str,
    ) -> Result<Option<Supplier>, RepositoryError>;
    fn insert_supplier(&self, supplier: Supplier) -> Result<Supplier, RepositoryError>;
    fn update_supplier(&self, supplier: Supplier) -> Result<(), RepositoryError>;

    fn certificates(
        &self,
        organization: &OrganizationId,
    ) -> Result<Vec<Certificate>, RepositoryError>;
    fn insert_certificate(&self, certificate: Certificate) -> Result<Certificate, RepositoryError>;
    fn update_certificate(&self, certificate: Certificate) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
