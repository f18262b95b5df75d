//! Integration scenarios for operator reconciliation against the organic registry, certificate
//! expiry tracking and the organization security score.

mod common {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};

    use bio_conformity::error::{ExternalService, ExternalServiceUnavailable};
    use bio_conformity::registry::{RegistryClient, RegistryPage, RegistryQuery};

    pub(super) const TIMEOUT: Duration = Duration::from_secs(2);

    pub(super) fn noon(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0)
            .single()
            .expect("valid instant")
    }

    /// Registry answering with a page decoded from a recorded directory payload.
    pub(super) struct RecordedRegistry(pub(super) &'static str);

    #[async_trait]
    impl RegistryClient for RecordedRegistry {
        async fn search(
            &self,
            _query: &RegistryQuery,
        ) -> Result<RegistryPage, ExternalServiceUnavailable> {
            serde_json::from_str(self.0).map_err(|err| {
                ExternalServiceUnavailable::new(ExternalService::Registry, err.to_string())
            })
        }
    }

    pub(super) struct SlowRegistry;

    #[async_trait]
    impl RegistryClient for SlowRegistry {
        async fn search(
            &self,
            _query: &RegistryQuery,
        ) -> Result<RegistryPage, ExternalServiceUnavailable> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(RegistryPage::default())
        }
    }

    pub(super) const DIRECTORY_PAGE: &str = r#"{
      "items": [
        {
          "id": 90211,
          "raisonSociale": "GAEC DU MOULIN",
          "denominationcourante": "",
          "siret": "41234567800021",
          "numeroBio": "62-0931",
          "adressesOperateurs": [{"lieu": "Rue du Moulin", "codePostal": "62000", "ville": "Arras"}],
          "activites": [{"nom": "Production", "etatCertification": "ENGAGEE"}],
          "certificats": [{"organisme": "Certipaq", "dateEngagement": "2018-02-01"}]
        },
        {
          "id": "48211",
          "raisonSociale": "EARL DES THUYAS",
          "siret": "12345678900012",
          "numeroBio": "59-1234",
          "adressesOperateurs": [{"codePostal": "59151", "ville": "Arleux"}],
          "activites": [
            {"nom": "Production végétale", "etatCertification": "ENGAGEE"},
            {"nom": "Production en conversion", "etatCertification": "ENGAGEE"}
          ],
          "certificats": [
            {"organisme": "Bureau Veritas", "dateEngagement": "2015-01-01", "dateArret": "2019-12-31"},
            {"organisme": "Ecocert France", "dateEngagement": "2020-01-01",
             "url": "https://certificat.example/48211.pdf"}
          ]
        }
      ],
      "total": 2
    }"#;
}

use bio_conformity::certificates::{days_until, evaluate_at, CertificateStatus};
use bio_conformity::records::{OrganizationId, StatutBio, Supplier};
use bio_conformity::registry::{apply_verification, search_local, verify, RegistryQuery};
use bio_conformity::scoring::{compute_at, AlertSeverity, ScoreLevel, ScoreSnapshot};
use chrono::NaiveDate;
use common::*;
use std::time::Duration;

#[tokio::test]
async fn best_ranked_operator_is_reconciled_onto_the_supplier() {
    let query = RegistryQuery::parse("Thuyas 59151");

    let outcome = verify(&RecordedRegistry(DIRECTORY_PAGE), &query, TIMEOUT).await;

    assert!(outcome.found);
    let candidate = outcome.candidate.expect("candidate selected");
    assert_eq!(candidate.registry_id.as_deref(), Some("48211"));
    assert_eq!(candidate.statut_bio, StatutBio::EnConversion);
    assert_eq!(candidate.certifying_body.as_deref(), Some("Ecocert France"));
    assert_eq!(outcome.alternatives.len(), 1);
    assert_eq!(outcome.alternatives[0].name, "GAEC DU MOULIN");

    let mut supplier = Supplier::new("sup-1", OrganizationId("org-1".into()), "Thuyas");
    supplier.city = Some("Arleux".to_string());
    apply_verification(&mut supplier, &candidate, noon(2025, 6, 10));
    assert_eq!(supplier.statut_bio, StatutBio::EnConversion);
    assert!(supplier.registry_verified);
    assert_eq!(supplier.name, "Thuyas");
    assert_eq!(supplier.city.as_deref(), Some("Arleux"));
    assert_eq!(
        supplier.certificate_url.as_deref(),
        Some("https://certificat.example/48211.pdf")
    );
}

#[tokio::test]
async fn unreadable_directory_payload_is_reported_as_not_found() {
    let query = RegistryQuery::parse("moulin");

    let outcome = verify(&RecordedRegistry("<html>maintenance</html>"), &query, TIMEOUT).await;

    assert!(!outcome.found);
    assert!(outcome.candidate.is_none());
    assert!(outcome.message.is_some());
}

#[tokio::test]
async fn slow_directory_times_out_without_failing() {
    let query = RegistryQuery::by_siret("12345678900012");

    let outcome = verify(&SlowRegistry, &query, Duration::from_millis(50)).await;

    assert!(!outcome.found);
    assert!(outcome.message.is_some());
}

#[test]
fn local_search_prefers_name_and_postal_matches() {
    let organization = OrganizationId("org-1".into());
    let mut thuyas = Supplier::new("sup-1", organization.clone(), "EARL des Thuyas");
    thuyas.postal_code = Some("59151".to_string());
    let mut other = Supplier::new("sup-2", organization.clone(), "Thuyas Distribution");
    other.postal_code = Some("75011".to_string());
    let unrelated = Supplier::new("sup-3", organization, "Coopérative du Nord");

    let query = RegistryQuery::parse("thuyas 59151");
    let ranked = search_local(vec![thuyas, other, unrelated], &query);

    let ids: Vec<_> = ranked.iter().map(|entry| entry.item.id.as_str()).collect();
    assert_eq!(ids, vec!["sup-1", "sup-2"]);
    assert_eq!(ranked[0].relevance, 8);
    assert_eq!(ranked[1].relevance, 5);
}

#[test]
fn certificate_status_follows_the_renewal_window() {
    let now = noon(2025, 6, 10);
    let on = |day: u32, month: u32| NaiveDate::from_ymd_opt(2025, month, day).expect("date");

    assert_eq!(evaluate_at(on(9, 6), now), CertificateStatus::Expire);
    assert_eq!(evaluate_at(on(10, 6), now), CertificateStatus::ARenouveler);
    assert_eq!(evaluate_at(on(10, 7), now), CertificateStatus::ARenouveler);
    assert_eq!(evaluate_at(on(11, 7), now), CertificateStatus::Valide);
    assert_eq!(days_until(on(11, 7), now), 31);
}

#[test]
fn security_score_stays_within_bounds() {
    let now = noon(2025, 6, 10);
    let perfect = ScoreSnapshot {
        inputs_total: 3,
        inputs_conforme: 3,
        suppliers_total: 2,
        suppliers_certified: 2,
        certificates_total: 1,
        organization_verified: true,
        ..ScoreSnapshot::default()
    };
    let worst = ScoreSnapshot {
        inputs_total: 3,
        inputs_non_conforme: 3,
        suppliers_total: 2,
        certificates_total: 2,
        certificates_expired: 2,
        ..ScoreSnapshot::default()
    };
    let inconsistent = ScoreSnapshot {
        inputs_total: 1,
        inputs_conforme: 7,
        suppliers_total: 1,
        suppliers_certified: 4,
        certificates_total: 1,
        certificates_expired: 9,
        organization_verified: true,
        ..ScoreSnapshot::default()
    };

    let perfect = compute_at(&perfect, now);
    assert_eq!(perfect.global, 100);
    assert!(perfect.alerts.is_empty());

    let worst = compute_at(&worst, now);
    assert_eq!(worst.global, 0);
    assert_eq!(worst.level, ScoreLevel::from_score(0));
    assert_eq!(worst.alerts[0].severity, AlertSeverity::Critical);
    assert_eq!(worst.recommendations.len(), 4);

    let inconsistent = compute_at(&inconsistent, now);
    assert!(inconsistent.global <= 100);
    assert_eq!(inconsistent.components.certificates_validity, 0);
}
