use crate::infra::InMemoryComplianceRepository;
use async_trait::async_trait;
use bio_conformity::ai::DisabledAiClient;
use bio_conformity::certificates::{days_until, CertificateStatus};
use bio_conformity::error::{AppError, ExternalService, ExternalServiceUnavailable};
use bio_conformity::records::{
    Certificate, ComplianceRepository, Organization, OrganizationId, StatutBio, Supplier,
};
use bio_conformity::registry::{RegistryClient, RegistryPage, RegistryQuery};
use bio_conformity::scoring::SecurityScore;
use bio_conformity::service::{CommitRequest, ComplianceService, ServiceConfig};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::Args;
use std::collections::BTreeSet;
use std::sync::Arc;

const SAMPLE_INVOICE: &str = r#"```json
{
  "fournisseur": {"nom": "Coopérative Agricole du Nord", "siret": "123 456 789 00012"},
  "numero_facture": "FA-2025-311",
  "date_facture": "2025-03-14",
  "total_ht": 1780.5,
  "lignes": [
    {"description": "Semences de blé tendre AB certifiées Ecocert FR-BIO-01",
     "quantite": 500, "unite": "kg", "prix_total": 600, "is_bio": true},
    {"description": "Glyphosate 360 g/L", "quantite": 20, "unite": "L", "prix_total": 580.5},
    {"description": "Filet anti-grêle 4x50m", "quantite": 2, "unite": "u", "prix_total": 600}
  ]
}
```"#;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Reference date for certificate and score evaluation (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

/// Registry stand-in for offline runs: every lookup reports the directory as unreachable.
#[derive(Debug, Clone, Default)]
pub(crate) struct OfflineRegistry;

#[async_trait]
impl RegistryClient for OfflineRegistry {
    async fn search(
        &self,
        _query: &RegistryQuery,
    ) -> Result<RegistryPage, ExternalServiceUnavailable> {
        Err(ExternalServiceUnavailable::new(
            ExternalService::Registry,
            "offline demo",
        ))
    }
}

type DemoService =
    ComplianceService<InMemoryComplianceRepository, DisabledAiClient, OfflineRegistry>;

pub(crate) fn reference_instant(today: Option<NaiveDate>) -> DateTime<Utc> {
    match today {
        Some(day) => {
            let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN);
            day.and_time(noon).and_utc()
        }
        None => Utc::now(),
    }
}

fn demo_organization() -> OrganizationId {
    OrganizationId("org-demo".to_string())
}

fn seed(repository: &InMemoryComplianceRepository, now: DateTime<Utc>) -> Result<(), AppError> {
    let organization = demo_organization();
    repository.update_organization(Organization {
        id: organization.clone(),
        name: "EARL des Thuyas".to_string(),
        siret: Some("12345678900012".to_string()),
        registry_verified: false,
        registry_id: None,
        last_verified_at: None,
    })?;

    let mut certified = Supplier::new("sup-demo-1", organization.clone(), "Semences du Nord");
    certified.statut_bio = StatutBio::Certifie;
    certified.postal_code = Some("59151".to_string());
    repository.insert_supplier(certified)?;

    let today = now.date_naive();
    let windows = [
        ("cert-demo-1", today + chrono::Duration::days(200)),
        ("cert-demo-2", today + chrono::Duration::days(12)),
        ("cert-demo-3", today - chrono::Duration::days(3)),
    ];
    for (id, expires_on) in windows {
        repository.insert_certificate(Certificate {
            id: id.to_string(),
            organization_id: organization.clone(),
            supplier_name: Some("Semences du Nord".to_string()),
            number: format!("FR-BIO-01-{}", id.to_uppercase()),
            certifying_body: Some("Ecocert France".to_string()),
            issued_on: None,
            expires_on,
            products: BTreeSet::from(["Semences".to_string()]),
            statut: CertificateStatus::Valide,
        })?;
    }
    Ok(())
}

pub(crate) fn build_demo_service(now: DateTime<Utc>) -> Result<DemoService, AppError> {
    let repository = Arc::new(InMemoryComplianceRepository::default());
    seed(&repository, now)?;
    Ok(ComplianceService::new(
        repository,
        Arc::new(DisabledAiClient),
        Arc::new(OfflineRegistry),
        ServiceConfig::default(),
    ))
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let now = reference_instant(args.today);
    let service = build_demo_service(now)?;
    let organization = demo_organization();

    println!("Organic conformity demo ({})", now.date_naive());

    let extraction = service.normalize(SAMPLE_INVOICE)?;
    let scanned = service.classify(Some(&organization), extraction).await?;
    println!("\nInvoice lines");
    for line in &scanned.extraction.lines {
        println!(
            "- {:<55} {:<13} {:>3}",
            line.description.as_deref().unwrap_or("-"),
            line.conformity_status.map(|status| status.label()).unwrap_or("-"),
            line.conformity_score
                .map(|score| score.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    println!(
        "Invoice score: {} (conforme {}, attention {}, non conforme {})",
        scanned.global.score,
        scanned.global.breakdown.conforme,
        scanned.global.breakdown.attention,
        scanned.global.breakdown.non_conforme
    );

    let receipt = service.commit_invoice(
        &organization,
        CommitRequest {
            extraction: scanned.extraction,
            plot_id: Some("parcelle-nord".to_string()),
        },
    )?;
    println!("\nRecorded {} input(s)", receipt.inputs.len());
    if let Some(supplier) = &receipt.supplier_created {
        println!("New supplier: {}", supplier.name);
        let verification = service.verify_supplier(&organization, &supplier.id).await?;
        if let Some(message) = verification.outcome.message {
            println!("Registry: {message}");
        }
    }

    println!("\nCertificates");
    for certificate in service.certificates_at(&organization, now)? {
        println!(
            "- {:<28} {:<13} {:>4} day(s)",
            certificate.number,
            certificate.statut.label(),
            days_until(certificate.expires_on, now)
        );
    }

    let score = service.security_score_at(&organization, now)?;
    render_score(&score);
    Ok(())
}

pub(crate) fn render_score(score: &SecurityScore) {
    println!("\nSecurity score: {}/100 ({})", score.global, score.level.label());
    println!(
        "  operator {} | inputs {} | suppliers {} | certificates {}",
        score.components.operator_verification,
        score.components.inputs_conformity,
        score.components.suppliers_certification,
        score.components.certificates_validity
    );
    for alert in &score.alerts {
        println!("  [{}] {}: {}", alert.severity_label, alert.topic, alert.detail);
    }
    for recommendation in &score.recommendations {
        println!("  -> {recommendation}");
    }
}
