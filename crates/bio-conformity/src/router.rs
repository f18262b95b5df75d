use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ai::AiClient;
use crate::certificates::{days_until, evaluate_at, CertificateStatus};
use crate::error::AppError;
use crate::extractors::ApiJson;
use crate::invoices::{aggregate, GlobalConformity, InvoiceExtraction, LineItem, ScannedInvoice};
use crate::records::{
    Certificate, ComplianceRepository, Input, Organization, OrganizationId, Supplier,
};
use crate::registry::{Ranked, RegistryClient};
use crate::scoring::{compute, ScoreSnapshot, SecurityScore};
use crate::service::{
    CertificateRegistration, CommitReceipt, CommitRequest, ComplianceService,
    ComplianceServiceError, OrganizationRegistration, OrganizationVerification,
    SupplierRegistration, SupplierVerification,
};

type SharedService<R, A, G> = Arc<ComplianceService<R, A, G>>;

#[derive(Debug, Deserialize)]
pub struct NormalizeRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct AggregateRequest {
    #[serde(default)]
    pub lines: Vec<LineItem>,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub document_base64: String,
    pub mime_type: String,
    #[serde(default)]
    pub organization_id: Option<OrganizationId>,
}

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub extraction: InvoiceExtraction,
    #[serde(default)]
    pub organization_id: Option<OrganizationId>,
}

#[derive(Debug, Deserialize)]
pub struct CertificateStatusRequest {
    pub expires_on: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct CertificateStatusView {
    pub status: CertificateStatus,
    pub days_until_expiration: i64,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

/// Router builder exposing the conformity core as JSON endpoints.
pub fn compliance_router<R, A, G>(service: SharedService<R, A, G>) -> Router
where
    R: ComplianceRepository + 'static,
    A: AiClient + 'static,
    G: RegistryClient + 'static,
{
    Router::new()
        .route("/api/v1/invoices/normalize", post(normalize_handler::<R, A, G>))
        .route("/api/v1/invoices/aggregate", post(aggregate_handler))
        .route("/api/v1/invoices/scan", post(scan_handler::<R, A, G>))
        .route("/api/v1/invoices/classify", post(classify_handler::<R, A, G>))
        .route(
            "/api/v1/organizations/:organization_id",
            put(register_organization_handler::<R, A, G>),
        )
        .route(
            "/api/v1/organizations/:organization_id/suppliers",
            post(register_supplier_handler::<R, A, G>),
        )
        .route(
            "/api/v1/organizations/:organization_id/inputs",
            get(inputs_handler::<R, A, G>),
        )
        .route(
            "/api/v1/organizations/:organization_id/inputs/:input_id",
            delete(delete_input_handler::<R, A, G>),
        )
        .route(
            "/api/v1/organizations/:organization_id/invoices/commit",
            post(commit_handler::<R, A, G>),
        )
        .route(
            "/api/v1/organizations/:organization_id/inputs/:input_id/reclassify",
            post(reclassify_handler::<R, A, G>),
        )
        .route(
            "/api/v1/organizations/:organization_id/security-score",
            get(security_score_handler::<R, A, G>),
        )
        .route("/api/v1/security-score", post(snapshot_score_handler))
        .route(
            "/api/v1/organizations/:organization_id/certificates",
            get(certificates_handler::<R, A, G>).post(register_certificate_handler::<R, A, G>),
        )
        .route("/api/v1/certificates/status", post(certificate_status_handler))
        .route(
            "/api/v1/organizations/:organization_id/suppliers/search",
            get(supplier_search_handler::<R, A, G>),
        )
        .route(
            "/api/v1/organizations/:organization_id/suppliers/:supplier_id/verify",
            post(verify_supplier_handler::<R, A, G>),
        )
        .route(
            "/api/v1/organizations/:organization_id/verify",
            post(verify_organization_handler::<R, A, G>),
        )
        .with_state(service)
}

pub(crate) async fn normalize_handler<R, A, G>(
    State(service): State<SharedService<R, A, G>>,
    ApiJson(request): ApiJson<NormalizeRequest>,
) -> Result<Json<InvoiceExtraction>, AppError>
where
    R: ComplianceRepository + 'static,
    A: AiClient + 'static,
    G: RegistryClient + 'static,
{
    Ok(Json(service.normalize(&request.text)?))
}

pub(crate) async fn aggregate_handler(
    ApiJson(request): ApiJson<AggregateRequest>,
) -> Json<GlobalConformity> {
    Json(aggregate(&request.lines))
}

pub(crate) async fn scan_handler<R, A, G>(
    State(service): State<SharedService<R, A, G>>,
    ApiJson(request): ApiJson<ScanRequest>,
) -> Result<Json<ScannedInvoice>, AppError>
where
    R: ComplianceRepository + 'static,
    A: AiClient + 'static,
    G: RegistryClient + 'static,
{
    let document = STANDARD
        .decode(request.document_base64.trim())
        .map_err(|err| {
            ComplianceServiceError::InvalidDocument(format!("invalid base64 document: {err}"))
        })?;
    let scanned = service
        .scan(
            request.organization_id.as_ref(),
            &document,
            &request.mime_type,
        )
        .await?;
    Ok(Json(scanned))
}

pub(crate) async fn classify_handler<R, A, G>(
    State(service): State<SharedService<R, A, G>>,
    ApiJson(request): ApiJson<ClassifyRequest>,
) -> Result<Json<ScannedInvoice>, AppError>
where
    R: ComplianceRepository + 'static,
    A: AiClient + 'static,
    G: RegistryClient + 'static,
{
    let scanned = service
        .classify(request.organization_id.as_ref(), request.extraction)
        .await?;
    Ok(Json(scanned))
}

pub(crate) async fn register_organization_handler<R, A, G>(
    State(service): State<SharedService<R, A, G>>,
    Path(organization_id): Path<String>,
    ApiJson(registration): ApiJson<OrganizationRegistration>,
) -> Result<Json<Organization>, AppError>
where
    R: ComplianceRepository + 'static,
    A: AiClient + 'static,
    G: RegistryClient + 'static,
{
    let organization =
        service.register_organization(&OrganizationId(organization_id), registration)?;
    Ok(Json(organization))
}

pub(crate) async fn register_supplier_handler<R, A, G>(
    State(service): State<SharedService<R, A, G>>,
    Path(organization_id): Path<String>,
    ApiJson(registration): ApiJson<SupplierRegistration>,
) -> Result<(StatusCode, Json<Supplier>), AppError>
where
    R: ComplianceRepository + 'static,
    A: AiClient + 'static,
    G: RegistryClient + 'static,
{
    let supplier = service.register_supplier(&OrganizationId(organization_id), registration)?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

pub(crate) async fn register_certificate_handler<R, A, G>(
    State(service): State<SharedService<R, A, G>>,
    Path(organization_id): Path<String>,
    ApiJson(registration): ApiJson<CertificateRegistration>,
) -> Result<(StatusCode, Json<Certificate>), AppError>
where
    R: ComplianceRepository + 'static,
    A: AiClient + 'static,
    G: RegistryClient + 'static,
{
    let certificate =
        service.register_certificate(&OrganizationId(organization_id), registration)?;
    Ok((StatusCode::CREATED, Json(certificate)))
}

pub(crate) async fn inputs_handler<R, A, G>(
    State(service): State<SharedService<R, A, G>>,
    Path(organization_id): Path<String>,
) -> Result<Json<Vec<Input>>, AppError>
where
    R: ComplianceRepository + 'static,
    A: AiClient + 'static,
    G: RegistryClient + 'static,
{
    Ok(Json(service.inputs(&OrganizationId(organization_id))?))
}

pub(crate) async fn delete_input_handler<R, A, G>(
    State(service): State<SharedService<R, A, G>>,
    Path((organization_id, input_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError>
where
    R: ComplianceRepository + 'static,
    A: AiClient + 'static,
    G: RegistryClient + 'static,
{
    service.delete_input(&OrganizationId(organization_id), &input_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn commit_handler<R, A, G>(
    State(service): State<SharedService<R, A, G>>,
    Path(organization_id): Path<String>,
    ApiJson(request): ApiJson<CommitRequest>,
) -> Result<(StatusCode, Json<CommitReceipt>), AppError>
where
    R: ComplianceRepository + 'static,
    A: AiClient + 'static,
    G: RegistryClient + 'static,
{
    let receipt = service.commit_invoice(&OrganizationId(organization_id), request)?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub(crate) async fn reclassify_handler<R, A, G>(
    State(service): State<SharedService<R, A, G>>,
    Path((organization_id, input_id)): Path<(String, String)>,
) -> Result<Json<Input>, AppError>
where
    R: ComplianceRepository + 'static,
    A: AiClient + 'static,
    G: RegistryClient + 'static,
{
    let input = service
        .reclassify_input(&OrganizationId(organization_id), &input_id)
        .await?;
    Ok(Json(input))
}

pub(crate) async fn security_score_handler<R, A, G>(
    State(service): State<SharedService<R, A, G>>,
    Path(organization_id): Path<String>,
) -> Result<Json<SecurityScore>, AppError>
where
    R: ComplianceRepository + 'static,
    A: AiClient + 'static,
    G: RegistryClient + 'static,
{
    Ok(Json(service.security_score(&OrganizationId(organization_id))?))
}

pub(crate) async fn snapshot_score_handler(
    ApiJson(snapshot): ApiJson<ScoreSnapshot>,
) -> Json<SecurityScore> {
    Json(compute(&snapshot))
}

pub(crate) async fn certificates_handler<R, A, G>(
    State(service): State<SharedService<R, A, G>>,
    Path(organization_id): Path<String>,
) -> Result<Json<Vec<Certificate>>, AppError>
where
    R: ComplianceRepository + 'static,
    A: AiClient + 'static,
    G: RegistryClient + 'static,
{
    Ok(Json(service.certificates(&OrganizationId(organization_id))?))
}

pub(crate) async fn certificate_status_handler(
    ApiJson(request): ApiJson<CertificateStatusRequest>,
) -> Json<CertificateStatusView> {
    let now = Utc::now();
    Json(CertificateStatusView {
        status: evaluate_at(request.expires_on, now),
        days_until_expiration: days_until(request.expires_on, now),
    })
}

pub(crate) async fn supplier_search_handler<R, A, G>(
    State(service): State<SharedService<R, A, G>>,
    Path(organization_id): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Ranked<Supplier>>>, AppError>
where
    R: ComplianceRepository + 'static,
    A: AiClient + 'static,
    G: RegistryClient + 'static,
{
    let found = service.search_suppliers(&OrganizationId(organization_id), &params.q)?;
    Ok(Json(found))
}

pub(crate) async fn verify_supplier_handler<R, A, G>(
    State(service): State<SharedService<R, A, G>>,
    Path((organization_id, supplier_id)): Path<(String, String)>,
) -> Result<Json<SupplierVerification>, AppError>
where
    R: ComplianceRepository + 'static,
    A: AiClient + 'static,
    G: RegistryClient + 'static,
{
    let verification = service
        .verify_supplier(&OrganizationId(organization_id), &supplier_id)
        .await?;
    Ok(Json(verification))
}

pub(crate) async fn verify_organization_handler<R, A, G>(
    State(service): State<SharedService<R, A, G>>,
    Path(organization_id): Path<String>,
) -> Result<Json<OrganizationVerification>, AppError>
where
    R: ComplianceRepository + 'static,
    A: AiClient + 'static,
    G: RegistryClient + 'static,
{
    let verification = service
        .verify_organization(&OrganizationId(organization_id))
        .await?;
    Ok(Json(verification))
}
