//! Persisted compliance records and the storage collaborator.

pub mod domain;
pub mod repository;

pub use domain::{Certificate, Input, Organization, OrganizationId, StatutBio, Supplier};
pub use repository::{ComplianceRepository, RepositoryError};
