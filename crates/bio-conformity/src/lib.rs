//! Conformity core for organic ("Bio") farm record keeping.
//!
//! Invoice extractions are normalized, their lines classified against the organic
//! farming rules and aggregated; persisted records feed the organization security
//! score; suppliers and operators are reconciled against the organic operator registry.

pub mod ai;
pub mod certificates;
pub mod config;
pub mod conformity;
pub mod error;
pub mod extractors;
pub mod invoices;
pub mod records;
pub mod registry;
pub mod router;
pub mod scoring;
pub mod service;
pub mod telemetry;
