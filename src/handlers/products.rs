use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use super::{ADMIN, created};
use crate::{
    AppState,
    audit::{self, AuditAction, AuditEntry},
    auth::{AuthUser, ClientIp},
    billing::{ensure_money_in_range, round_money},
    error::{AppError, AppResult, ErrorBody},
    models::{CreateProductRequest, Product, UpdateProductRequest},
    repository::ProductFilter,
};

#[utoipa::path(
    get,
    path = "/api/products",
    tag = "products",
    params(ProductFilter),
    responses((status = 200, description = "Products", body = [Product]))
)]
pub async fn list_products(
    _user: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(state.repo.list_products(filter).await?))
}

/// list_low_stock_products
///
/// [Authenticated Route] Products whose stock is at or below their minimum stock level.
#[utoipa::path(
    get,
    path = "/api/products/low-stock",
    tag = "products",
    responses((status = 200, description = "Products needing restock", body = [Product]))
)]
pub async fn list_low_stock_products(
    _user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(state.repo.list_low_stock_products().await?))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    tag = "products",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Found", body = Product),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_product(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    state
        .repo
        .get_product(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Product"))
}

#[utoipa::path(
    post,
    path = "/api/products",
    tag = "products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Created", body = Product),
        (status = 400, description = "Invalid input", body = ErrorBody)
    )
)]
pub async fn create_product(
    actor: AuthUser,
    State(state): State<AppState>,
    ip: ClientIp,
    Json(payload): Json<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<Product>)> {
    actor.require_role(ADMIN)?;
    payload.validate()?;
    ensure_money_in_range("Cost price", &payload.cost_price)?;
    ensure_money_in_range("Sale price", &payload.sale_price)?;

    let product = state
        .repo
        .create_product(Product {
            id: Uuid::new_v4(),
            name: payload.name.trim().to_string(),
            description: payload.description,
            category: payload.category.trim().to_string(),
            cost_price: round_money(&payload.cost_price),
            sale_price: round_money(&payload.sale_price),
            stock: payload.stock,
            min_stock: payload.min_stock,
            created_at: Utc::now(),
            updated_at: None,
        })
        .await?;

    audit::record(
        &state.repo,
        AuditEntry::new(&actor, AuditAction::Create, "Product")
            .entity_id(product.id)
            .ip(&ip),
    )
    .await;
    tracing::info!(product_id = %product.id, stock = product.stock, "product created");

    Ok(created(product))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}",
    tag = "products",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Updated", body = Product),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_product(
    actor: AuthUser,
    State(state): State<AppState>,
    ip: ClientIp,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<UpdateProductRequest>,
) -> AppResult<Json<Product>> {
    actor.require_role(ADMIN)?;
    payload.validate()?;

    if let Some(cost) = &payload.cost_price {
        ensure_money_in_range("Cost price", cost)?;
    }
    if let Some(price) = &payload.sale_price {
        ensure_money_in_range("Sale price", price)?;
    }
    payload.cost_price = payload.cost_price.as_ref().map(round_money);
    payload.sale_price = payload.sale_price.as_ref().map(round_money);

    let product = state
        .repo
        .update_product(id, payload)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    audit::record(
        &state.repo,
        AuditEntry::new(&actor, AuditAction::Update, "Product")
            .entity_id(product.id)
            .ip(&ip),
    )
    .await;
    tracing::info!(product_id = %product.id, stock = product.stock, "product updated");

    Ok(Json(product))
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    tag = "products",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 409, description = "Referenced by sales", body = ErrorBody)
    )
)]
pub async fn delete_product(
    actor: AuthUser,
    State(state): State<AppState>,
    ip: ClientIp,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    actor.require_role(ADMIN)?;

    if !state.repo.delete_product(id).await? {
        return Err(AppError::not_found("Product"));
    }

    audit::record(
        &state.repo,
        AuditEntry::new(&actor, AuditAction::Delete, "Product")
            .entity_id(id)
            .ip(&ip),
    )
    .await;
    tracing::info!(product_id = %id, "product deleted");

    Ok(StatusCode::NO_CONTENT)
}
