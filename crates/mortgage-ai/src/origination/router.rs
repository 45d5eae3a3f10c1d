use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::application::ApplicationUpdate;
use super::borrower::BorrowerUpdate;
use super::domain::{ApplicationId, BorrowerId};
use super::error::FinanceError;
use super::gateway::{DocumentServices, GatewayError};
use super::repository::{RecordStore, RepositoryError};
use super::service::{NewApplication, OriginationService, OriginationServiceError};
use super::views::{ApplicationDetailView, ApplicationView, BorrowerView};

/// Header naming the acting user; the configured default owner applies when absent.
pub const OWNER_HEADER: &str = "x-username";

type SharedService<S, D> = Arc<OriginationService<S, D>>;

/// Router builder exposing HTTP endpoints for users, applications and borrowers.
pub fn origination_router<S, D>(service: SharedService<S, D>) -> Router
where
    S: RecordStore + 'static,
    D: DocumentServices + 'static,
{
    Router::new()
        .route("/api/users", post(create_user_handler::<S, D>))
        .route(
            "/api/applications",
            post(create_application_handler::<S, D>).get(list_applications_handler::<S, D>),
        )
        .route(
            "/api/applications/:application_id",
            get(application_handler::<S, D>).put(update_application_handler::<S, D>),
        )
        .route(
            "/api/applications/:application_id/recompute",
            post(recompute_handler::<S, D>),
        )
        .route(
            "/api/applications/:application_id/co-borrowers/:borrower_id",
            post(add_co_borrower_handler::<S, D>).delete(remove_co_borrower_handler::<S, D>),
        )
        .route(
            "/api/applications/:application_id/recommendation",
            get(recommendation_handler::<S, D>).post(generate_recommendation_handler::<S, D>),
        )
        .route(
            "/api/borrowers/:borrower_id",
            get(borrower_handler::<S, D>).put(update_borrower_handler::<S, D>),
        )
        .route(
            "/api/borrowers/:borrower_id/income-documents",
            post(income_document_handler::<S, D>),
        )
        .route(
            "/api/borrowers/:borrower_id/credit-reports",
            post(credit_report_handler::<S, D>),
        )
        .with_state(service)
}

impl OriginationServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            OriginationServiceError::Finance(error) => match error {
                FinanceError::Validation { .. } | FinanceError::InvalidTransition { .. } => {
                    StatusCode::BAD_REQUEST
                }
                FinanceError::NotFound { .. } => StatusCode::NOT_FOUND,
                FinanceError::Extraction(_)
                | FinanceError::Precondition(_)
                | FinanceError::UndefinedDti { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            },
            OriginationServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
            OriginationServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            OriginationServiceError::Repository(RepositoryError::Unavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            OriginationServiceError::Gateway(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for OriginationServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let payload = json!({ "error": self.to_string() });
        (status, Json(payload)).into_response()
    }
}

/// Run a call that reaches the document services on the blocking pool; adapters may block
/// on network I/O.
async fn offload<S, D, T, F>(
    service: SharedService<S, D>,
    call: F,
) -> Result<T, OriginationServiceError>
where
    S: RecordStore + 'static,
    D: DocumentServices + 'static,
    T: Send + 'static,
    F: FnOnce(&OriginationService<S, D>) -> Result<T, OriginationServiceError> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || call(service.as_ref())).await {
        Ok(outcome) => outcome,
        Err(err) => Err(GatewayError::Unavailable(format!("document worker stopped: {err}")).into()),
    }
}

fn owner_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get(OWNER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateUserRequest {
    pub(crate) username: String,
    pub(crate) name: String,
}

pub(crate) async fn create_user_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Json(request): Json<CreateUserRequest>,
) -> Result<Response, OriginationServiceError>
where
    S: RecordStore + 'static,
    D: DocumentServices + 'static,
{
    let user = service.create_user(&request.username, &request.name)?;
    Ok((StatusCode::CREATED, Json(user)).into_response())
}

pub(crate) async fn create_application_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    headers: HeaderMap,
    Json(request): Json<NewApplication>,
) -> Result<Response, OriginationServiceError>
where
    S: RecordStore + 'static,
    D: DocumentServices + 'static,
{
    let owner = owner_from(&headers);
    let detail = service.create_application(owner.as_deref(), request)?;
    Ok((StatusCode::CREATED, Json(ApplicationDetailView::from(&detail))).into_response())
}

pub(crate) async fn list_applications_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    headers: HeaderMap,
) -> Result<Json<Vec<ApplicationDetailView>>, OriginationServiceError>
where
    S: RecordStore + 'static,
    D: DocumentServices + 'static,
{
    let owner = owner_from(&headers);
    let details = service.list_applications(owner.as_deref())?;
    Ok(Json(details.iter().map(ApplicationDetailView::from).collect()))
}

pub(crate) async fn application_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Path(application_id): Path<String>,
) -> Result<Json<ApplicationDetailView>, OriginationServiceError>
where
    S: RecordStore + 'static,
    D: DocumentServices + 'static,
{
    let detail = service.application_detail(&ApplicationId(application_id))?;
    Ok(Json(ApplicationDetailView::from(&detail)))
}

pub(crate) async fn update_application_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Path(application_id): Path<String>,
    Json(update): Json<ApplicationUpdate>,
) -> Result<Json<ApplicationView>, OriginationServiceError>
where
    S: RecordStore + 'static,
    D: DocumentServices + 'static,
{
    let application = service.update_application(&ApplicationId(application_id), update)?;
    Ok(Json(ApplicationView::from(&application)))
}

pub(crate) async fn recompute_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Path(application_id): Path<String>,
) -> Result<Json<ApplicationView>, OriginationServiceError>
where
    S: RecordStore + 'static,
    D: DocumentServices + 'static,
{
    let application = service.recompute_income_and_dti(&ApplicationId(application_id))?;
    Ok(Json(ApplicationView::from(&application)))
}

pub(crate) async fn add_co_borrower_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Path((application_id, borrower_id)): Path<(String, String)>,
) -> Result<Json<ApplicationView>, OriginationServiceError>
where
    S: RecordStore + 'static,
    D: DocumentServices + 'static,
{
    let application =
        service.add_co_borrower(&ApplicationId(application_id), &BorrowerId(borrower_id))?;
    Ok(Json(ApplicationView::from(&application)))
}

pub(crate) async fn remove_co_borrower_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Path((application_id, borrower_id)): Path<(String, String)>,
) -> Result<Json<ApplicationView>, OriginationServiceError>
where
    S: RecordStore + 'static,
    D: DocumentServices + 'static,
{
    let application =
        service.remove_co_borrower(&ApplicationId(application_id), &BorrowerId(borrower_id))?;
    Ok(Json(ApplicationView::from(&application)))
}

pub(crate) async fn recommendation_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Path(application_id): Path<String>,
) -> Result<Json<serde_json::Value>, OriginationServiceError>
where
    S: RecordStore + 'static,
    D: DocumentServices + 'static,
{
    let id = ApplicationId(application_id);
    let narrative = service.recommendation(&id)?;
    Ok(Json(json!({
        "application_id": id,
        "llm_recommendation": narrative,
    })))
}

pub(crate) async fn generate_recommendation_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Path(application_id): Path<String>,
) -> Result<Json<serde_json::Value>, OriginationServiceError>
where
    S: RecordStore + 'static,
    D: DocumentServices + 'static,
{
    let application_id = ApplicationId(application_id);
    let application = offload(service, move |service| {
        service.generate_recommendation(&application_id)
    })
    .await?;
    Ok(Json(json!({
        "application": ApplicationView::from(&application),
        "llm_recommendation": application.llm_recommendation(),
    })))
}

pub(crate) async fn borrower_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Path(borrower_id): Path<String>,
) -> Result<Json<BorrowerView>, OriginationServiceError>
where
    S: RecordStore + 'static,
    D: DocumentServices + 'static,
{
    let borrower = service.get_borrower(&BorrowerId(borrower_id))?;
    Ok(Json(BorrowerView::from(&borrower)))
}

pub(crate) async fn update_borrower_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Path(borrower_id): Path<String>,
    Json(update): Json<BorrowerUpdate>,
) -> Result<Json<BorrowerView>, OriginationServiceError>
where
    S: RecordStore + 'static,
    D: DocumentServices + 'static,
{
    let borrower = service.update_borrower(&BorrowerId(borrower_id), update)?;
    Ok(Json(BorrowerView::from(&borrower)))
}

pub(crate) async fn income_document_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Path(borrower_id): Path<String>,
    document: Bytes,
) -> Result<Json<serde_json::Value>, OriginationServiceError>
where
    S: RecordStore + 'static,
    D: DocumentServices + 'static,
{
    if document.is_empty() {
        return Err(FinanceError::validation("file", "document body is empty").into());
    }
    let borrower_id = BorrowerId(borrower_id);
    let ingestion = offload(service, move |service| {
        service.read_income_document(&borrower_id, &document)
    })
    .await?;
    Ok(Json(json!({
        "borrower": BorrowerView::from(&ingestion.borrower),
        "read_doc_type": ingestion.document_type,
    })))
}

pub(crate) async fn credit_report_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Path(borrower_id): Path<String>,
    document: Bytes,
) -> Result<Json<BorrowerView>, OriginationServiceError>
where
    S: RecordStore + 'static,
    D: DocumentServices + 'static,
{
    if document.is_empty() {
        return Err(FinanceError::validation("file", "document body is empty").into());
    }
    let borrower_id = BorrowerId(borrower_id);
    let borrower = offload(service, move |service| {
        service.read_credit_report(&borrower_id, &document)
    })
    .await?;
    Ok(Json(BorrowerView::from(&borrower)))
}
