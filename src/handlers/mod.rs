//! HTTP handlers, one module per resource.
//!
//! Every handler resolves the caller through the `AuthUser` extractor (except login),
//! checks the role table with `AuthUser::require_role`, validates input with `validator`
//! and propagates failures as `AppError`.

use axum::{Json, http::StatusCode};

use crate::models::UserRole;

pub mod agents;
pub mod audit_logs;
pub mod auth;
pub mod commissions;
pub mod customers;
pub mod dashboard;
pub mod products;
pub mod sales;
pub mod services;
pub mod users;

// --- Role Groups ---

pub(crate) const ADMIN: &[UserRole] = &[UserRole::Admin];
/// Roles that can see agents, balances and commissions.
pub(crate) const FINANCE: &[UserRole] = &[UserRole::Admin, UserRole::Accountant];
/// Roles that can ring up a sale.
pub(crate) const SELLERS: &[UserRole] = &[UserRole::Admin, UserRole::Agent];
/// Roles that can take a payment against a sale.
pub(crate) const COLLECTORS: &[UserRole] = &[UserRole::Admin, UserRole::Accountant, UserRole::Agent];

/// 201 with the created resource as body.
pub(crate) fn created<T>(body: T) -> (StatusCode, Json<T>) {
    (StatusCode::CREATED, Json(body))
}
