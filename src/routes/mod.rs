//! Router Module Index
//!
//! Routes are grouped by the access layer wrapped around them in `create_router`:
//! no layer, the authentication layer, or authentication plus the admin check.
//! Finer role rules (e.g. Admin/Agent for creating a sale) are enforced in the handlers.

/// Routes reachable without a token: health check and login.
pub mod public;

/// Routes behind the `AuthUser` middleware. Mounted under `/api`.
pub mod authenticated;

/// Routes restricted to the Admin role as a whole (the audit trail). Mounted under `/api`.
pub mod admin;
