use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// --- Coded Enumerations ---

/// Returned when a role/status/type value matches neither a variant name nor a code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Wire form accepted for coded enums: the numeric code (`2`) or a name/numeric string
/// (`"Agent"`, `"agent"`, `"2"`).
#[derive(Deserialize)]
#[serde(untagged)]
enum RawCode {
    Code(i32),
    Name(String),
}

/// coded_enum
///
/// Declares an enumeration persisted as an `INTEGER` discriminant and serialized as its
/// variant name. Parsing accepts the name (case-insensitive) or the discriminant.
macro_rules! coded_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $code:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, TS, ToSchema)]
        #[repr(i32)]
        #[ts(export)]
        pub enum $name {
            $($variant = $code),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn code(self) -> i32 {
                self as i32
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::ALL[0]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl TryFrom<i32> for $name {
            type Error = ParseEnumError;

            fn try_from(code: i32) -> Result<Self, Self::Error> {
                match code {
                    $($code => Ok($name::$variant),)+
                    _ => Err(ParseEnumError { kind: stringify!($name), value: code.to_string() }),
                }
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                let trimmed = raw.trim();
                if let Ok(code) = trimmed.parse::<i32>() {
                    return $name::try_from(code);
                }
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(trimmed))
                    .ok_or_else(|| ParseEnumError { kind: stringify!($name), value: raw.to_string() })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let parsed = match RawCode::deserialize(deserializer)? {
                    RawCode::Code(code) => $name::try_from(code),
                    RawCode::Name(name) => name.parse::<$name>(),
                };
                parsed.map_err(serde::de::Error::custom)
            }
        }
    };
}

coded_enum! {
    /// Access level gating which endpoints a caller may invoke.
    UserRole { Admin = 1, Agent = 2, Accountant = 3 }
}

coded_enum! {
    /// How a sale or a payment is settled. `Credit` sales start unpaid.
    PaymentType { Cash = 1, Card = 2, Credit = 3 }
}

coded_enum! {
    CommissionType { PercentageOfSale = 1, PercentageOfProfit = 2, FixedAmount = 3 }
}

coded_enum! {
    /// Lifecycle of a customer service request.
    ServiceStatus { New = 1, InProgress = 2, Closed = 3, Cancelled = 4 }
}

impl ServiceStatus {
    /// completed_date
    ///
    /// Completion timestamp after moving to `self`: closing keeps an existing completion
    /// time (or stamps `now`), every other status clears it.
    pub fn completed_date(
        self,
        previous: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        match self {
            ServiceStatus::Closed => Some(previous.unwrap_or(now)),
            _ => None,
        }
    }
}

// --- Core Entities (Mapped to Database) ---

/// User
///
/// A dashboard account. The password hash never leaves the server: responses use `UserResponse`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    // Running sum of the totals of this customer's sales.
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub total_purchases: BigDecimal,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub cost_price: BigDecimal,
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub sale_price: BigDecimal,
    pub stock: i32,
    // Stock level at or below which the product is reported as low stock.
    pub min_stock: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.min_stock
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Sale {
    pub id: Uuid,
    pub invoice_number: String,
    pub customer_id: Uuid,
    pub agent_id: Option<Uuid>,
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub total_amount: BigDecimal,
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub paid_amount: BigDecimal,
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub remaining_amount: BigDecimal,
    pub payment_type: PaymentType,
    #[ts(type = "string")]
    pub sale_date: DateTime<Utc>,
    pub is_paid: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleItem {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub unit_price: BigDecimal,
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub total_price: BigDecimal,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Payment {
    pub id: Uuid,
    pub sale_id: Uuid,
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    pub payment_type: PaymentType,
    #[ts(type = "string")]
    pub payment_date: DateTime<Utc>,
    pub reference: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Agent
///
/// Sales-agent record attached one-to-one to a `User` with the `Agent` role.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance: BigDecimal,
    pub assigned_licenses: i32,
    pub sold_licenses: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Commission {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub sale_id: Uuid,
    pub commission_type: CommissionType,
    // Percentage for the percentage types, absolute amount for `FixedAmount`.
    pub rate: BigDecimal,
    pub amount: BigDecimal,
    pub earned_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub id: Uuid,
    pub request_number: String,
    pub customer_id: Uuid,
    #[serde(rename = "type")]
    pub request_type: String,
    pub description: String,
    pub status: ServiceStatus,
    pub request_date: DateTime<Utc>,
    pub completed_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// AuditLog
///
/// Append-only trail of who did what to which record. Rows are never updated.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_role: String,
    pub action: String,
    pub entity: String,
    pub entity_id: Option<String>,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub timestamp: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct LoginRequest {
    #[validate(email)]
    #[schema(example = "admin@crm.com")]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email, length(max = 100))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters long"))]
    pub password: String,
    pub role: UserRole,
}

/// UpdateUserRequest
///
/// Partial update: absent fields are left unchanged. A new password is re-hashed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email, length(max = 100))]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 8, message = "Password must be at least 8 characters long"))]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// Column-level user changes handed to the repository (password already hashed).
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email, length(max = 100))]
    pub email: String,
    #[validate(length(min = 1, max = 20))]
    pub phone: String,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateCustomerRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email, length(max = 100))]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 20))]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub cost_price: BigDecimal,
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub sale_price: BigDecimal,
    #[validate(range(min = 0))]
    pub stock: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub min_stock: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateProductRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 50))]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    #[schema(value_type = Option<String>)]
    pub cost_price: Option<BigDecimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    #[schema(value_type = Option<String>)]
    pub sale_price: Option<BigDecimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0))]
    pub stock: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0))]
    pub min_stock: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    /// Overrides the product's current sale price when present.
    #[ts(type = "string | null")]
    #[schema(value_type = Option<String>)]
    pub unit_price: Option<BigDecimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateSaleRequest {
    pub customer_id: Uuid,
    pub agent_id: Option<Uuid>,
    pub payment_type: PaymentType,
    #[validate(length(min = 1, message = "A sale needs at least one item"), nested)]
    pub items: Vec<SaleItemRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreatePaymentRequest {
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    pub payment_type: PaymentType,
    #[validate(length(max = 100))]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateAgentRequest {
    pub user_id: Uuid,
    #[ts(type = "string | null")]
    #[schema(value_type = Option<String>)]
    pub balance: Option<BigDecimal>,
    #[validate(range(min = 0))]
    pub assigned_licenses: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateAgentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    #[schema(value_type = Option<String>)]
    pub balance: Option<BigDecimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0))]
    pub assigned_licenses: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0))]
    pub sold_licenses: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateCommissionRequest {
    pub agent_id: Uuid,
    pub sale_id: Uuid,
    pub commission_type: CommissionType,
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub rate: BigDecimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateServiceRequest {
    pub customer_id: Uuid,
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 50))]
    pub request_type: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateServiceRequest {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 50))]
    pub request_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1))]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ServiceStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateServiceStatusRequest {
    pub status: ServiceStatus,
}

/// Fully resolved service-request changes: `completed_date` is always written.
#[derive(Debug, Clone, Default)]
pub struct ServiceRequestChanges {
    pub request_type: Option<String>,
    pub description: Option<String>,
    pub status: Option<ServiceStatus>,
    pub completed_date: Option<DateTime<Utc>>,
}

// --- Response Schemas (Output) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AuthResponse {
    pub token: String,
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub is_active: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// SaleResponse
///
/// Sale row joined with the customer name and, when present, the agent's user name.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleResponse {
    pub id: Uuid,
    pub invoice_number: String,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub agent_id: Option<Uuid>,
    pub agent_name: Option<String>,
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub total_amount: BigDecimal,
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub paid_amount: BigDecimal,
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub remaining_amount: BigDecimal,
    pub payment_type: PaymentType,
    #[ts(type = "string")]
    pub sale_date: DateTime<Utc>,
    pub is_paid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub unit_price: BigDecimal,
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub total_price: BigDecimal,
}

/// SaleDetails
///
/// A sale with its line items and recorded payments (GET /api/sales/{id}). The sale's own
/// fields sit at the top level next to `items` and `payments`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleDetails {
    #[serde(flatten)]
    #[ts(flatten)]
    pub sale: SaleResponse,
    pub items: Vec<SaleItemResponse>,
    pub payments: Vec<Payment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AgentResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub balance: BigDecimal,
    pub assigned_licenses: i32,
    pub sold_licenses: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CommissionResponse {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub agent_name: String,
    pub sale_id: Uuid,
    pub invoice_number: String,
    pub commission_type: CommissionType,
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub rate: BigDecimal,
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    #[ts(type = "string")]
    pub earned_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ServiceRequestResponse {
    pub id: Uuid,
    pub request_number: String,
    pub customer_id: Uuid,
    pub customer_name: String,
    #[serde(rename = "type")]
    pub request_type: String,
    pub description: String,
    pub status: ServiceStatus,
    #[ts(type = "string")]
    pub request_date: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub completed_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AuditLogResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: Option<String>,
    pub user_role: String,
    pub action: String,
    pub entity: String,
    pub entity_id: Option<String>,
    #[ts(type = "unknown")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    #[ts(type = "string")]
    pub timestamp: DateTime<Utc>,
}

/// DashboardStats
///
/// Headline counters for the dashboard landing page (GET /api/dashboard/stats).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DashboardStats {
    pub total_customers: i64,
    pub total_products: i64,
    pub total_sales: i64,
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub total_revenue: BigDecimal,
    /// Sum of `remaining_amount` over unpaid sales.
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub outstanding_balance: BigDecimal,
    pub low_stock_products: i64,
    pub open_service_requests: i64,
    pub active_agents: i64,
}
