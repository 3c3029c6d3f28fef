use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use coreflow_core::{
    ApplicationError, AuditCategory, AuditEvent, AuditOutcome, AuditSink, BillingCycle, BundleDefinition, BundleId, DomainError, InterfaceError,
    OrchestrationRun, PlanTier, PricingEngine, PricingError, PricingRequest, PricingResult,
    Subscription, SubscriptionId, SubscriptionStatus, TenantId,
};
use coreflow_db::{RepositoryError, RunLogRepository, SubscriptionRepository};
use coreflow_orchestrator::{
    OrchestrationError, OrchestrationRequest, OrchestrationResult, Orchestrator,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";
pub const DEFAULT_RUN_LIMIT: u32 = 20;
pub const MAX_RUN_LIMIT: u32 = 100;

const MAX_CORRELATION_ID_LEN: usize = 128;
const AUDIT_ACTOR: &str = "api";

#[derive(Clone)]
pub struct ApiState {
    orchestrator: Arc<Orchestrator>,
    pricing: Arc<dyn PricingEngine>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    runs: Arc<dyn RunLogRepository>,
    audit: Arc<dyn AuditSink>,
    admin_token_digest: Option<blake3::Hash>,
}

impl ApiState {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        pricing: Arc<dyn PricingEngine>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        runs: Arc<dyn RunLogRepository>,
        audit: Arc<dyn AuditSink>,
        admin_token: Option<&SecretString>,
    ) -> Self {
        Self {
            orchestrator,
            pricing,
            subscriptions,
            runs,
            audit,
            admin_token_digest: admin_token
                .map(|token| blake3::hash(token.expose_secret().as_bytes())),
        }
    }

    fn authorize_admin(&self, headers: &HeaderMap) -> Result<(), ApplicationError> {
        let Some(expected) = self.admin_token_digest else {
            return Ok(());
        };
        let presented = headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|value| blake3::hash(value.trim().as_bytes()));

        // blake3::Hash equality is constant time.
        match presented {
            Some(digest) if digest == expected => Ok(()),
            Some(_) => Err(ApplicationError::Unauthorized("admin token rejected".to_string())),
            None => Err(ApplicationError::Unauthorized(format!(
                "missing `{ADMIN_TOKEN_HEADER}` header"
            ))),
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/bundles", get(list_bundles))
        .route("/api/v1/pricing/quote", post(quote))
        .route("/api/v1/orchestrate", post(orchestrate))
        .route("/api/v1/orchestrate/batch", post(orchestrate_batch))
        .route(
            "/api/v1/tenants/{tenant_id}/subscription",
            get(get_subscription).put(put_subscription),
        )
        .route("/api/v1/tenants/{tenant_id}/runs", get(list_runs))
        .with_state(state)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    pub correlation_id: String,
}

/// An `InterfaceError` rendered as `{ error, message, correlation_id }`.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl ApiError {
    fn new(error: ApplicationError, correlation_id: &str) -> Self {
        Self(error.into_interface(correlation_id))
    }

    fn status(&self) -> StatusCode {
        match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Server-side failure detail stays in the logs.
        let message = if status.is_server_error() {
            self.0.user_message().to_string()
        } else {
            self.0.message().to_string()
        };

        warn!(
            event_name = "api.request.failed",
            correlation_id = %self.0.correlation_id(),
            status = status.as_u16(),
            error_code = self.0.error_code(),
            detail = %self.0.message(),
            "api request failed"
        );

        let body = ErrorBody {
            error: self.0.error_code().to_string(),
            message,
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= MAX_CORRELATION_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn json_body<T>(
    payload: Result<Json<T>, JsonRejection>,
    correlation_id: &str,
) -> Result<T, ApiError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        let message = format!("malformed request body: {}", rejection.body_text());
        ApiError::new(DomainError::InvariantViolation(message).into(), correlation_id)
    })
}

fn pricing_failure(error: PricingError) -> ApplicationError {
    DomainError::InvariantViolation(format!("{}: {error}", error.error_code())).into()
}

fn repository_failure(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

fn tenant_from_path(raw: String, correlation_id: &str) -> Result<TenantId, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::new(
            DomainError::InvariantViolation("tenant id must not be blank".to_string()).into(),
            correlation_id,
        ));
    }
    Ok(TenantId(trimmed.to_string()))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleListing {
    pub bundles: Vec<BundleDefinition>,
}

pub async fn list_bundles(State(state): State<ApiState>) -> Json<BundleListing> {
    Json(BundleListing { bundles: state.orchestrator.catalog().all().to_vec() })
}

pub async fn quote(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<PricingRequest>, JsonRejection>,
) -> Result<Json<PricingResult>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let request = json_body(payload, &correlation_id)?;

    let result = state
        .pricing
        .price(&request)
        .map_err(|error| ApiError::new(pricing_failure(error), &correlation_id))?;

    info!(
        event_name = "api.pricing.quoted",
        correlation_id = %correlation_id,
        tier = request.tier.as_str(),
        bundles = request.bundles.len(),
        total = %result.total,
        "pricing quote computed"
    );
    Ok(Json(result))
}

pub async fn orchestrate(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<OrchestrationRequest>, JsonRejection>,
) -> Result<Json<OrchestrationResult>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let request = json_body(payload, &correlation_id)?;

    state
        .orchestrator
        .orchestrate_with_correlation(request, &correlation_id)
        .await
        .map(Json)
        .map_err(|error| ApiError::new(error.into(), &correlation_id))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemError {
    pub error: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchItem {
    Ok(OrchestrationResult),
    Error(BatchItemError),
}

impl From<Result<OrchestrationResult, OrchestrationError>> for BatchItem {
    fn from(value: Result<OrchestrationResult, OrchestrationError>) -> Self {
        match value {
            Ok(result) => Self::Ok(result),
            Err(error) => Self::Error(BatchItemError {
                error: error.error_code().to_string(),
                message: error.to_string(),
            }),
        }
    }
}

pub async fn orchestrate_batch(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<Vec<OrchestrationRequest>>, JsonRejection>,
) -> Result<Json<Vec<BatchItem>>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let requests = json_body(payload, &correlation_id)?;

    let results = state
        .orchestrator
        .orchestrate_batch(requests)
        .await
        .map_err(|error| ApiError::new(error.into(), &correlation_id))?;

    Ok(Json(results.into_iter().map(BatchItem::from).collect()))
}

pub async fn get_subscription(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
) -> Result<Json<Subscription>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let tenant_id = tenant_from_path(tenant_id, &correlation_id)?;

    state
        .subscriptions
        .find_by_tenant(&tenant_id)
        .await
        .map_err(|error| ApiError::new(repository_failure(error), &correlation_id))?
        .map(Json)
        .ok_or_else(|| {
            ApiError::new(
                ApplicationError::NotFound(format!("no subscription for tenant `{tenant_id}`")),
                &correlation_id,
            )
        })
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionUpsert {
    pub tier: PlanTier,
    pub bundles: Vec<BundleId>,
    pub seats: u32,
    pub billing_cycle: BillingCycle,
    #[serde(default)]
    pub status: Option<SubscriptionStatus>,
    #[serde(default)]
    pub promo_code: Option<String>,
    #[serde(default)]
    pub current_period_end: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSaved {
    pub subscription: Subscription,
    pub pricing: PricingResult,
}

pub async fn put_subscription(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
    payload: Result<Json<SubscriptionUpsert>, JsonRejection>,
) -> Result<Json<SubscriptionSaved>, ApiError> {
    let correlation_id = correlation_id(&headers);
    state.authorize_admin(&headers).map_err(|error| ApiError::new(error, &correlation_id))?;
    let tenant_id = tenant_from_path(tenant_id, &correlation_id)?;
    let upsert = json_body(payload, &correlation_id)?;

    let pricing = state
        .pricing
        .price(&PricingRequest {
            tier: upsert.tier,
            bundles: upsert.bundles.clone(),
            seats: upsert.seats,
            billing_cycle: upsert.billing_cycle,
            promo_code: upsert.promo_code.clone(),
            tax_rate_pct: Default::default(),
            as_of: None,
        })
        .map_err(|error| {
            state.audit.emit(
                AuditEvent::new(
                    Some(tenant_id.clone()),
                    correlation_id.as_str(),
                    "subscription.pricing_rejected",
                    AuditCategory::Pricing,
                    AUDIT_ACTOR,
                    AuditOutcome::Rejected,
                )
                .with_metadata("error_code", error.error_code()),
            );
            ApiError::new(pricing_failure(error), &correlation_id)
        })?;

    let existing = state
        .subscriptions
        .find_by_tenant(&tenant_id)
        .await
        .map_err(|error| ApiError::new(repository_failure(error), &correlation_id))?;

    let now = Utc::now();
    let requested_status = upsert.status.unwrap_or(SubscriptionStatus::Active);
    let subscription = match existing {
        Some(mut current) => {
            if current.status != requested_status {
                current
                    .transition_to(requested_status)
                    .map_err(|error| ApiError::new(error.into(), &correlation_id))?;
            }
            Subscription {
                tier: upsert.tier,
                bundles: upsert.bundles,
                seats: upsert.seats,
                billing_cycle: upsert.billing_cycle,
                promo_code: upsert.promo_code,
                current_period_end: upsert.current_period_end.unwrap_or(current.current_period_end),
                updated_at: now,
                ..current
            }
        }
        None => Subscription {
            id: SubscriptionId(format!("SUB-{}", uuid::Uuid::new_v4().simple())),
            tenant_id: tenant_id.clone(),
            tier: upsert.tier,
            bundles: upsert.bundles,
            seats: upsert.seats,
            billing_cycle: upsert.billing_cycle,
            status: requested_status,
            promo_code: upsert.promo_code,
            current_period_end: upsert.current_period_end.unwrap_or_else(|| {
                now + Duration::days(30 * i64::from(upsert.billing_cycle.months()))
            }),
            created_at: now,
            updated_at: now,
        },
    };

    state
        .subscriptions
        .save(subscription.clone())
        .await
        .map_err(|error| ApiError::new(repository_failure(error), &correlation_id))?;

    info!(
        event_name = "api.subscription.saved",
        correlation_id = %correlation_id,
        tenant_id = %tenant_id,
        tier = subscription.tier.as_str(),
        status = subscription.status.as_str(),
        "subscription saved"
    );
    state.audit.emit(
        AuditEvent::new(
            Some(tenant_id.clone()),
            correlation_id.as_str(),
            "subscription.saved",
            AuditCategory::Pricing,
            AUDIT_ACTOR,
            AuditOutcome::Success,
        )
        .with_metadata("subscription_id", subscription.id.0.clone())
        .with_metadata("status", subscription.status.as_str())
        .with_metadata("total", pricing.total.to_string()),
    );

    let saved = state
        .subscriptions
        .find_by_tenant(&tenant_id)
        .await
        .map_err(|error| ApiError::new(repository_failure(error), &correlation_id))?
        .unwrap_or(subscription);
    Ok(Json(SubscriptionSaved { subscription: saved, pricing }))
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct RunsQuery {
    pub limit: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunListing {
    pub tenant_id: TenantId,
    pub limit: u32,
    pub runs: Vec<OrchestrationRun>,
}

pub async fn list_runs(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<RunListing>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let tenant_id = tenant_from_path(tenant_id, &correlation_id)?;
    let limit = query.limit.unwrap_or(DEFAULT_RUN_LIMIT).clamp(1, MAX_RUN_LIMIT);

    let runs = state
        .runs
        .list_recent(&tenant_id, limit)
        .await
        .map_err(|error| ApiError::new(repository_failure(error), &correlation_id))?;

    Ok(Json(RunListing { tenant_id, limit, runs }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use chrono::Utc;
    use coreflow_core::{AuditCategory, BundleCatalog, DeterministicPricingEngine, InMemoryAuditSink};
    use coreflow_db::{DemoSeedDataset, InMemoryRunLogRepository, InMemorySubscriptionRepository};
    use coreflow_orchestrator::{
        BundleRegistry, EntitlementPolicy, Orchestrator, OrchestratorSettings,
    };
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{router, ApiState, ADMIN_TOKEN_HEADER, REQUEST_ID_HEADER};

    fn app(admin_token: Option<&str>) -> Router {
        app_with_audit(admin_token).0
    }

    fn app_with_audit(admin_token: Option<&str>) -> (Router, InMemoryAuditSink) {
        let audit = InMemoryAuditSink::default();
        let catalog = BundleCatalog::standard();
        let registry = BundleRegistry::local(&catalog);
        let subscriptions = Arc::new(InMemorySubscriptionRepository::with_subscriptions(
            DemoSeedDataset::subscriptions(Utc::now()),
        ));
        let runs = Arc::new(InMemoryRunLogRepository::default());
        let orchestrator = Orchestrator::new(
            Arc::new(catalog),
            Arc::new(registry),
            EntitlementPolicy::default(),
            subscriptions.clone(),
            runs.clone(),
            Arc::new(audit.clone()),
            OrchestratorSettings { max_batch_size: 3, ..OrchestratorSettings::default() },
        );
        let token = admin_token.map(|token| SecretString::from(token.to_string()));

        let app = router(ApiState::new(
            Arc::new(orchestrator),
            Arc::new(DeterministicPricingEngine::default()),
            subscriptions,
            runs,
            Arc::new(audit.clone()),
            token.as_ref(),
        ));
        (app, audit)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.expect("router responds");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body bytes");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, body)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).expect("request")
    }

    fn sentiment_request(tenant: &str, request_id: Option<&str>) -> Value {
        json!({
            "tenant_id": tenant,
            "bundle_id": "finance_ai_fingpt",
            "workflow": "sentiment_analysis",
            "input": { "text": "Revenue growth beat expectations and margins improved" },
            "request_id": request_id,
        })
    }

    #[tokio::test]
    async fn bundles_endpoint_lists_catalog() {
        let app = app(None);
        let (status, body) = send(&app, get("/api/v1/bundles")).await;

        assert_eq!(status, StatusCode::OK);
        let bundles = body["bundles"].as_array().expect("bundles array");
        assert_eq!(bundles.len(), 4);
        assert!(bundles.iter().any(|bundle| bundle["id"] == "erp_manufacturing"));
    }

    #[tokio::test]
    async fn quote_prices_valid_request() {
        let app = app(None);
        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/v1/pricing/quote",
                json!({
                    "tier": "professional",
                    "bundles": ["finance_ai_fingpt"],
                    "seats": 10,
                    "billing_cycle": "monthly",
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["currency"], "USD");
        assert!(body["line_items"].as_array().is_some_and(|items| items.len() == 2));
    }

    #[tokio::test]
    async fn quote_rejects_invalid_seats_with_pricing_code() {
        let app = app(None);
        let mut request = json_request(
            "POST",
            "/api/v1/pricing/quote",
            json!({
                "tier": "professional",
                "bundles": [],
                "seats": 0,
                "billing_cycle": "monthly",
            }),
        );
        request.headers_mut().insert(REQUEST_ID_HEADER, "req-quote-1".parse().expect("header"));

        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
        assert_eq!(body["correlation_id"], "req-quote-1");
        assert!(body["message"].as_str().is_some_and(|m| m.starts_with("invalid_seat_count")));
    }

    #[tokio::test]
    async fn malformed_body_renders_error_envelope() {
        let app = app(None);
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/orchestrate")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .expect("request");

        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
        assert!(body["correlation_id"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[tokio::test]
    async fn orchestrate_runs_local_handler_for_entitled_tenant() {
        let app = app(None);
        let (status, body) = send(
            &app,
            json_request("POST", "/api/v1/orchestrate", sentiment_request("tenant-acme", None)),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["handler"], "fingpt-local");
        assert_eq!(body["replayed"], false);
    }

    #[tokio::test]
    async fn orchestrate_maps_errors_to_status_codes() {
        let app = app(None);

        let (status, body) = send(
            &app,
            json_request("POST", "/api/v1/orchestrate", sentiment_request("tenant-unknown", None)),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["message"].as_str().is_some_and(|m| m.starts_with("no_subscription")));

        let (status, _) = send(
            &app,
            json_request(
                "POST",
                "/api/v1/orchestrate",
                json!({"tenant_id": "tenant-acme", "bundle_id": "voice_ai", "workflow": "call"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            json_request(
                "POST",
                "/api/v1/orchestrate",
                json!({
                    "tenant_id": "tenant-acme",
                    "bundle_id": "finance_ai_fingpt",
                    "workflow": "optimize_bom",
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(
            &app,
            json_request(
                "POST",
                "/api/v1/orchestrate",
                json!({"tenant_id": " ", "bundle_id": "finance_ai_fingpt", "workflow": "x"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn orchestrate_replays_repeated_request_id() {
        let app = app(None);
        let request = sentiment_request("tenant-acme", Some("req-replay-1"));

        let (_, first) =
            send(&app, json_request("POST", "/api/v1/orchestrate", request.clone())).await;
        let (status, second) =
            send(&app, json_request("POST", "/api/v1/orchestrate", request)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["replayed"], true);
        assert_eq!(second["run_id"], first["run_id"]);
    }

    #[tokio::test]
    async fn batch_returns_items_in_input_order() {
        let app = app(None);
        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/v1/orchestrate/batch",
                json!([
                    sentiment_request("tenant-acme", None),
                    sentiment_request("tenant-missing", None),
                ]),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let items = body.as_array().expect("array");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["ok"]["status"], "completed");
        assert_eq!(items[1]["error"]["error"], "entitlement_denied");
    }

    #[tokio::test]
    async fn oversized_batch_is_rejected() {
        let app = app(None);
        let requests: Vec<Value> =
            (0..4).map(|_| sentiment_request("tenant-acme", None)).collect();
        let (status, body) =
            send(&app, json_request("POST", "/api/v1/orchestrate/batch", json!(requests))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn subscription_lookup_returns_not_found_for_unknown_tenant() {
        let app = app(None);
        let (status, body) = send(&app, get("/api/v1/tenants/tenant-nobody/subscription")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");

        let (status, body) = send(&app, get("/api/v1/tenants/tenant-acme/subscription")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tier"], "enterprise");
    }

    #[tokio::test]
    async fn subscription_upsert_requires_admin_token_when_configured() {
        let (app, audit) = app_with_audit(Some("s3cret"));
        let payload = json!({
            "tier": "professional",
            "bundles": ["finance_ai_fingpt", "erp_hr_payroll"],
            "seats": 12,
            "billing_cycle": "annual",
        });

        let (status, body) = send(
            &app,
            json_request("PUT", "/api/v1/tenants/tenant-hooli/subscription", payload.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthorized");

        let mut request =
            json_request("PUT", "/api/v1/tenants/tenant-hooli/subscription", payload);
        request.headers_mut().insert(ADMIN_TOKEN_HEADER, "s3cret".parse().expect("header"));
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["subscription"]["tenant_id"], "tenant-hooli");
        assert_eq!(body["subscription"]["status"], "active");
        assert_eq!(body["pricing"]["currency"], "USD");

        let (status, body) = send(&app, get("/api/v1/tenants/tenant-hooli/subscription")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["seats"], 12);

        let saved = audit.events_of_type("subscription.saved");
        assert_eq!(saved.len(), 1, "only the authorized upsert is audited");
        assert_eq!(saved[0].category, AuditCategory::Pricing);
        assert_eq!(saved[0].metadata.get("status").map(String::as_str), Some("active"));
    }

    #[tokio::test]
    async fn subscription_upsert_is_validated_through_pricing() {
        let (app, audit) = app_with_audit(None);
        let (status, body) = send(
            &app,
            json_request(
                "PUT",
                "/api/v1/tenants/tenant-globex/subscription",
                json!({
                    "tier": "professional",
                    "bundles": ["erp_manufacturing"],
                    "seats": 5,
                    "billing_cycle": "monthly",
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().is_some_and(|m| m.starts_with("tier_too_low")));

        let rejected = audit.events_of_type("subscription.pricing_rejected");
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].category, AuditCategory::Pricing);
        assert_eq!(rejected[0].metadata.get("error_code").map(String::as_str), Some("tier_too_low"));
        assert!(audit.events_of_type("subscription.saved").is_empty());
    }

    #[tokio::test]
    async fn subscription_upsert_rejects_invalid_status_transition() {
        let app = app(None);
        let (status, body) = send(
            &app,
            json_request(
                "PUT",
                "/api/v1/tenants/tenant-acme/subscription",
                json!({
                    "tier": "enterprise",
                    "bundles": ["finance_ai_fingpt"],
                    "seats": 250,
                    "billing_cycle": "annual",
                    "status": "trialing",
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "invalid subscription transition from active to trialing");
    }

    #[tokio::test]
    async fn runs_endpoint_lists_recorded_runs_and_clamps_limit() {
        let app = app(None);
        let request = sentiment_request("tenant-acme", None);
        send(&app, json_request("POST", "/api/v1/orchestrate", request)).await;

        let (status, body) = send(&app, get("/api/v1/tenants/tenant-acme/runs?limit=500")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["limit"], 100);
        assert_eq!(body["runs"].as_array().map(Vec::len), Some(1));

        let (_, body) = send(&app, get("/api/v1/tenants/tenant-acme/runs")).await;
        assert_eq!(body["limit"], 20);
    }
}
