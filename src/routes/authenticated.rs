use crate::{
    AppState,
    handlers::{agents, auth, commissions, customers, dashboard, products, sales, services, users},
};
use axum::{
    Router,
    routing::{get, patch},
};

/// Authenticated Router Module
///
/// Every route here sits behind the authentication layer, so handlers always receive a
/// resolved, active `AuthUser`. Role restrictions per route:
///
/// * users: Admin, except reading a single user
/// * customers: any role, delete is Admin
/// * products: reads any role, writes Admin
/// * sales: reads any role, create Admin/Agent, delete Admin, payments Admin/Accountant/Agent
/// * agents and commissions: Admin/Accountant (writes to agents are Admin)
/// * services and dashboard: any role
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Session ---
        .route("/auth/me", get(auth::me))
        // --- Users ---
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        // --- Customers ---
        .route(
            "/customers",
            get(customers::list_customers).post(customers::create_customer),
        )
        .route(
            "/customers/{id}",
            get(customers::get_customer)
                .put(customers::update_customer)
                .delete(customers::delete_customer),
        )
        // --- Products ---
        // The static `/low-stock` segment takes precedence over `/{id}`.
        .route(
            "/products",
            get(products::list_products).post(products::create_product),
        )
        .route("/products/low-stock", get(products::list_low_stock_products))
        .route(
            "/products/{id}",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        // --- Sales & Payments ---
        .route("/sales", get(sales::list_sales).post(sales::create_sale))
        .route("/sales/{id}", get(sales::get_sale).delete(sales::delete_sale))
        .route(
            "/sales/{id}/payments",
            get(sales::list_payments).post(sales::add_payment),
        )
        // --- Agents & Commissions ---
        .route("/agents", get(agents::list_agents).post(agents::create_agent))
        .route(
            "/agents/{id}",
            get(agents::get_agent)
                .put(agents::update_agent)
                .delete(agents::delete_agent),
        )
        .route("/agents/{id}/commissions", get(agents::list_agent_commissions))
        .route(
            "/commissions",
            get(commissions::list_commissions).post(commissions::create_commission),
        )
        // --- Service Requests ---
        .route(
            "/services",
            get(services::list_service_requests).post(services::create_service_request),
        )
        .route(
            "/services/{id}",
            get(services::get_service_request)
                .put(services::update_service_request)
                .delete(services::delete_service_request),
        )
        .route("/services/{id}/status", patch(services::update_service_status))
        // --- Dashboard ---
        .route("/dashboard/stats", get(dashboard::dashboard_stats))
}
