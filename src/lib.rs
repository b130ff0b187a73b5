use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod audit;
pub mod auth;
pub mod billing;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod password;
pub mod repository;
pub mod seed;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use error::AppError;
use models::UserRole;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` model into the OpenAPI
/// document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::login, handlers::auth::me,
        handlers::users::list_users, handlers::users::get_user, handlers::users::create_user,
        handlers::users::update_user, handlers::users::delete_user,
        handlers::customers::list_customers, handlers::customers::get_customer,
        handlers::customers::create_customer, handlers::customers::update_customer,
        handlers::customers::delete_customer,
        handlers::products::list_products, handlers::products::list_low_stock_products,
        handlers::products::get_product, handlers::products::create_product,
        handlers::products::update_product, handlers::products::delete_product,
        handlers::sales::list_sales, handlers::sales::get_sale, handlers::sales::create_sale,
        handlers::sales::delete_sale, handlers::sales::list_payments, handlers::sales::add_payment,
        handlers::agents::list_agents, handlers::agents::get_agent,
        handlers::agents::list_agent_commissions, handlers::agents::create_agent,
        handlers::agents::update_agent, handlers::agents::delete_agent,
        handlers::commissions::list_commissions, handlers::commissions::create_commission,
        handlers::services::list_service_requests, handlers::services::get_service_request,
        handlers::services::create_service_request, handlers::services::update_service_request,
        handlers::services::update_service_status, handlers::services::delete_service_request,
        handlers::audit_logs::list_audit_logs, handlers::audit_logs::list_user_audit_logs,
        handlers::audit_logs::list_entity_audit_logs,
        handlers::dashboard::dashboard_stats
    ),
    components(
        schemas(
            error::ErrorBody,
            models::UserRole, models::PaymentType, models::CommissionType, models::ServiceStatus,
            models::LoginRequest, models::AuthResponse, models::UserResponse,
            models::CreateUserRequest, models::UpdateUserRequest,
            models::Customer, models::CreateCustomerRequest, models::UpdateCustomerRequest,
            models::Product, models::CreateProductRequest, models::UpdateProductRequest,
            models::Sale, models::SaleItem, models::Payment, models::SaleResponse,
            models::SaleItemResponse, models::SaleDetails, models::SaleItemRequest,
            models::CreateSaleRequest, models::CreatePaymentRequest,
            models::AgentResponse, models::CreateAgentRequest, models::UpdateAgentRequest,
            models::CommissionResponse, models::CreateCommissionRequest,
            models::ServiceRequestResponse, models::CreateServiceRequest,
            models::UpdateServiceRequest, models::UpdateServiceStatusRequest,
            models::AuditLogResponse, models::DashboardStats,
        )
    ),
    tags(
        (name = "crm-backend", description = "CRM dashboard API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, cloneable container of shared services handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: all persistence behind `Arc<dyn Repository>`.
    pub repo: RepositoryState,
    /// Configuration: the loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Lets extractors such as `AuthUser` pull single components out of `AppState`.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Resolves the caller once per request. A failed `AuthUser` extraction rejects the request
/// with 401 before the handler runs; on success the identity is stored in the request
/// extensions so the handler's own `AuthUser` extractor does not hit the database again.
async fn auth_middleware(auth_user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// admin_middleware
///
/// Runs inside `auth_middleware`; rejects every non-admin caller with 403.
async fn admin_middleware(
    auth_user: AuthUser,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    auth_user.require_role(&[UserRole::Admin])?;
    Ok(next.run(request).await)
}

/// create_router
///
/// Assembles the routing tree, applies the access layers and the observability stack,
/// and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. API Router Assembly (mounted under /api)
    let api = Router::new()
        // Authenticated Routes: any active user; role checks happen in the handlers.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Admin Routes: the later `route_layer` is the outer one, so authentication runs first.
        .merge(
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), admin_middleware))
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: No middleware applied.
        .merge(public::public_routes())
        .nest("/api", api)
        // Apply the Unified State to all routes.
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: a UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: one span per request, tagged with the request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request tracing span so every log line of a request carries its
/// method, URI and `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
