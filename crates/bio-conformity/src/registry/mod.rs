//! Supplier and operator verification against the organic operator directory.

pub mod client;
pub mod query;
pub mod ranking;
pub mod reconcile;

pub use client::{
    HttpRegistryClient, RegistryActivity, RegistryAddress, RegistryCertificate, RegistryClient,
    RegistryOperator, RegistryPage,
};
pub use query::RegistryQuery;
pub use ranking::{rank, relevance, search_local, Rankable, Ranked};
pub use reconcile::{
    active_certificate, apply_operator_verification, apply_verification, derive_statut, verify,
    RegistryCandidate, VerificationOutcome,
};
