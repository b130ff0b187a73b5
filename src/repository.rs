use crate::{
    billing::{SaleDraft, Settlement},
    error::{AppError, AppResult},
    models::{
        Agent, AgentResponse, AuditLog, AuditLogResponse, Commission, CommissionResponse,
        Customer, DashboardStats, Payment, Product, Sale, SaleDetails, SaleItem,
        SaleItemResponse, SaleResponse, ServiceRequest, ServiceRequestChanges,
        ServiceRequestResponse, UpdateAgentRequest, UpdateCustomerRequest, UpdateProductRequest,
        User, UserChanges,
    },
};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::Deserialize;
use sqlx::{PgPool, Postgres, postgres::PgRow, query_builder::QueryBuilder};
use std::{collections::HashMap, sync::Arc};
use uuid::Uuid;

// --- Query Filters ---

/// CustomerFilter
///
/// Query parameters for GET /api/customers.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CustomerFilter {
    /// Case-insensitive match against name, email and phone.
    pub search: Option<String>,
}

/// ProductFilter
///
/// Query parameters for GET /api/products.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductFilter {
    /// Exact (case-insensitive) category.
    pub category: Option<String>,
    /// Case-insensitive match against name and description.
    pub search: Option<String>,
}

/// AuditPage
///
/// Paging for the audit listings. `limit` defaults to and is capped at
/// `AUDIT_PAGE_LIMIT`; both values are clamped rather than rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditPage {
    /// Rows to return, 1 to 500. Defaults to 500.
    pub limit: Option<i64>,
    /// Rows to skip from the newest entry. Defaults to 0.
    pub offset: Option<i64>,
}

impl AuditPage {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(AUDIT_PAGE_LIMIT).clamp(1, AUDIT_PAGE_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Which slice of the audit trail to read.
#[derive(Debug, Clone, PartialEq)]
pub enum AuditFilter {
    All,
    User(Uuid),
    Entity { entity: String, entity_id: String },
}

/// Repository Trait
///
/// The abstract contract for all persistence operations. Handlers depend on
/// `Arc<dyn Repository>` only, so tests can substitute an in-memory implementation.
///
/// Conventions:
/// * `get_*` returns `Ok(None)` for a missing row.
/// * `update_*` applies `Some` fields only, stamps `updated_at`, and returns `Ok(None)` for a missing row.
/// * `delete_*` returns whether a row was removed.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn list_users(&self) -> AppResult<Vec<User>>;
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn create_user(&self, user: User) -> AppResult<User>;
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> AppResult<Option<User>>;
    async fn delete_user(&self, id: Uuid) -> AppResult<bool>;
    async fn count_users(&self) -> AppResult<i64>;

    // --- Customers ---
    async fn list_customers(&self, filter: CustomerFilter) -> AppResult<Vec<Customer>>;
    async fn get_customer(&self, id: Uuid) -> AppResult<Option<Customer>>;
    async fn create_customer(&self, customer: Customer) -> AppResult<Customer>;
    async fn update_customer(&self, id: Uuid, req: UpdateCustomerRequest) -> AppResult<Option<Customer>>;
    async fn delete_customer(&self, id: Uuid) -> AppResult<bool>;

    // --- Products ---
    async fn list_products(&self, filter: ProductFilter) -> AppResult<Vec<Product>>;
    async fn list_low_stock_products(&self) -> AppResult<Vec<Product>>;
    async fn get_products(&self, ids: &[Uuid]) -> AppResult<Vec<Product>>;
    async fn get_product(&self, id: Uuid) -> AppResult<Option<Product>>;
    async fn create_product(&self, product: Product) -> AppResult<Product>;
    async fn update_product(&self, id: Uuid, req: UpdateProductRequest) -> AppResult<Option<Product>>;
    async fn delete_product(&self, id: Uuid) -> AppResult<bool>;

    // --- Sales & Payments ---
    async fn list_sales(&self) -> AppResult<Vec<SaleDetails>>;
    async fn get_sale(&self, id: Uuid) -> AppResult<Option<Sale>>;
    async fn get_sale_details(&self, id: Uuid) -> AppResult<Option<SaleDetails>>;
    // Inserts the sale, items and up-front payment, decrements stock and credits the
    // customer's total purchases. Fails with Conflict if stock ran out meanwhile.
    async fn create_sale(&self, draft: SaleDraft) -> AppResult<Sale>;
    // Restores stock and customer totals. Fails with Conflict if commissions reference the sale.
    async fn delete_sale(&self, id: Uuid) -> AppResult<bool>;
    async fn list_payments(&self, sale_id: Uuid) -> AppResult<Vec<Payment>>;
    async fn add_payment(&self, payment: Payment, settlement: Settlement) -> AppResult<Payment>;
    // Σ quantity × current cost price over the sale's items.
    async fn sale_cost(&self, sale_id: Uuid) -> AppResult<BigDecimal>;

    // --- Agents & Commissions ---
    async fn list_agents(&self) -> AppResult<Vec<AgentResponse>>;
    async fn get_agent(&self, id: Uuid) -> AppResult<Option<AgentResponse>>;
    async fn get_agent_by_user(&self, user_id: Uuid) -> AppResult<Option<AgentResponse>>;
    async fn create_agent(&self, agent: Agent) -> AppResult<AgentResponse>;
    async fn update_agent(&self, id: Uuid, req: UpdateAgentRequest) -> AppResult<Option<AgentResponse>>;
    async fn delete_agent(&self, id: Uuid) -> AppResult<bool>;
    async fn list_commissions(&self) -> AppResult<Vec<CommissionResponse>>;
    async fn list_agent_commissions(&self, agent_id: Uuid) -> AppResult<Vec<CommissionResponse>>;
    // Inserts the commission and credits the agent's balance atomically.
    async fn create_commission(&self, commission: Commission) -> AppResult<CommissionResponse>;

    // --- Service Requests ---
    async fn list_service_requests(&self) -> AppResult<Vec<ServiceRequestResponse>>;
    async fn get_service_request(&self, id: Uuid) -> AppResult<Option<ServiceRequestResponse>>;
    async fn create_service_request(&self, request: ServiceRequest) -> AppResult<ServiceRequestResponse>;
    async fn update_service_request(
        &self,
        id: Uuid,
        changes: ServiceRequestChanges,
    ) -> AppResult<Option<ServiceRequestResponse>>;
    async fn delete_service_request(&self, id: Uuid) -> AppResult<bool>;

    // --- Audit & Dashboard ---
    async fn record_audit(&self, log: AuditLog) -> AppResult<()>;
    async fn list_audit_logs(
        &self,
        filter: AuditFilter,
        page: AuditPage,
    ) -> AppResult<Vec<AuditLogResponse>>;
    async fn dashboard_stats(&self) -> AppResult<DashboardStats>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Entity-Agnostic Table Access ---

/// Table
///
/// Binds a row type to its table so the generic helpers below can find, list and
/// remove rows without per-entity SQL.
pub trait Table: for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin {
    const TABLE: &'static str;
    const COLUMNS: &'static str;
    const ORDER_BY: &'static str;
}

impl Table for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static str =
        "id, name, email, password_hash, role, is_active, created_at, updated_at";
    const ORDER_BY: &'static str = "name ASC";
}

impl Table for Customer {
    const TABLE: &'static str = "customers";
    const COLUMNS: &'static str =
        "id, name, email, phone, address, total_purchases, created_at, updated_at";
    const ORDER_BY: &'static str = "name ASC";
}

impl Table for Product {
    const TABLE: &'static str = "products";
    const COLUMNS: &'static str = "id, name, description, category, cost_price, sale_price, stock, min_stock, created_at, updated_at";
    const ORDER_BY: &'static str = "name ASC";
}

impl Table for Sale {
    const TABLE: &'static str = "sales";
    const COLUMNS: &'static str = "id, invoice_number, customer_id, agent_id, total_amount, paid_amount, remaining_amount, payment_type, sale_date, is_paid, created_at, updated_at";
    const ORDER_BY: &'static str = "sale_date DESC";
}

impl Table for Agent {
    const TABLE: &'static str = "agents";
    const COLUMNS: &'static str =
        "id, user_id, balance, assigned_licenses, sold_licenses, created_at, updated_at";
    const ORDER_BY: &'static str = "created_at ASC";
}

impl Table for ServiceRequest {
    const TABLE: &'static str = "service_requests";
    const COLUMNS: &'static str = "id, request_number, customer_id, request_type, description, status, request_date, completed_date, created_at, updated_at";
    const ORDER_BY: &'static str = "request_date DESC";
}

const SALE_SELECT: &str = r#"
    SELECT s.id, s.invoice_number, s.customer_id, c.name AS customer_name,
           s.agent_id, u.name AS agent_name, s.total_amount, s.paid_amount,
           s.remaining_amount, s.payment_type, s.sale_date, s.is_paid
    FROM sales s
    JOIN customers c ON c.id = s.customer_id
    LEFT JOIN agents a ON a.id = s.agent_id
    LEFT JOIN users u ON u.id = a.user_id
"#;

/// Line items with product names. Callers append an optional `WHERE` and `SALE_ITEM_ORDER`.
const SALE_ITEM_SELECT: &str = r#"
    SELECT si.sale_id, si.id, si.product_id, p.name AS product_name, si.quantity,
           si.unit_price, si.total_price
    FROM sale_items si
    JOIN products p ON p.id = si.product_id
"#;

const SALE_ITEM_ORDER: &str = " ORDER BY si.created_at ASC, p.name ASC";

#[derive(sqlx::FromRow)]
struct SaleItemRow {
    sale_id: Uuid,
    #[sqlx(flatten)]
    item: SaleItemResponse,
}

const PAYMENT_COLUMNS: &str =
    "id, sale_id, amount, payment_type, payment_date, reference, created_at, updated_at";

const COMMISSION_SELECT: &str = r#"
    SELECT cm.id, cm.agent_id, u.name AS agent_name, cm.sale_id, s.invoice_number,
           cm.commission_type, cm.rate, cm.amount, cm.earned_date
    FROM commissions cm
    JOIN agents a ON a.id = cm.agent_id
    JOIN users u ON u.id = a.user_id
    JOIN sales s ON s.id = cm.sale_id
"#;

const AUDIT_SELECT: &str = r#"
    SELECT l.id, l.user_id, u.name AS user_name, l.user_role, l.action, l.entity,
           l.entity_id, l.details, l.ip_address, l.timestamp
    FROM audit_logs l
    LEFT JOIN users u ON u.id = l.user_id
"#;

/// Upper bound on audit rows returned by a single listing.
pub const AUDIT_PAGE_LIMIT: i64 = 500;

/// Agent rows joined with their user. `source` is either the table or a CTE name.
fn agent_select(source: &str) -> String {
    format!(
        "SELECT a.id, a.user_id, u.name AS user_name, u.email AS user_email, a.balance, \
         a.assigned_licenses, a.sold_licenses, a.created_at \
         FROM {source} a JOIN users u ON u.id = a.user_id"
    )
}

/// Service requests joined with the customer name. `source` is either the table or a CTE name.
fn service_request_select(source: &str) -> String {
    format!(
        "SELECT r.id, r.request_number, r.customer_id, c.name AS customer_name, r.request_type, \
         r.description, r.status, r.request_date, r.completed_date \
         FROM {source} r JOIN customers c ON c.id = r.customer_id"
    )
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_all<T: Table>(&self) -> AppResult<Vec<T>> {
        let sql = format!("SELECT {} FROM {} ORDER BY {}", T::COLUMNS, T::TABLE, T::ORDER_BY);
        Ok(sqlx::query_as::<_, T>(&sql).fetch_all(&self.pool).await?)
    }

    async fn fetch_by_id<T: Table>(&self, id: Uuid) -> AppResult<Option<T>> {
        let sql = format!("SELECT {} FROM {} WHERE id = $1", T::COLUMNS, T::TABLE);
        Ok(sqlx::query_as::<_, T>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn remove_by_id<T: Table>(&self, id: Uuid) -> AppResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = $1", T::TABLE);
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn fetch_sale_response(&self, id: Uuid) -> AppResult<Option<SaleResponse>> {
        let sql = format!("{SALE_SELECT} WHERE s.id = $1");
        Ok(sqlx::query_as::<_, SaleResponse>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn list_users(&self) -> AppResult<Vec<User>> {
        self.fetch_all::<User>().await
    }

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        self.fetch_by_id::<User>(id).await
    }

    /// find_user_by_email
    ///
    /// Emails are compared case-insensitively so login is not sensitive to capitalisation.
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE LOWER(email) = LOWER($1)", User::COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_user(&self, user: User) -> AppResult<User> {
        let sql = format!(
            "INSERT INTO users (id, name, email, password_hash, role, is_active, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            User::COLUMNS
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role)
            .bind(user.is_active)
            .bind(user.created_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> AppResult<Option<User>> {
        let sql = format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                role = COALESCE($5, role),
                is_active = COALESCE($6, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            User::COLUMNS
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(changes.name)
            .bind(changes.email)
            .bind(changes.password_hash)
            .bind(changes.role)
            .bind(changes.is_active)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<bool> {
        self.remove_by_id::<User>(id).await
    }

    async fn count_users(&self) -> AppResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?)
    }

    // --- CUSTOMERS ---

    /// list_customers
    ///
    /// Uses QueryBuilder so the optional search term is always a bound parameter.
    async fn list_customers(&self, filter: CustomerFilter) -> AppResult<Vec<Customer>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM customers", Customer::COLUMNS));

        if let Some(search) = filter.search.filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", search.trim());
            builder.push(" WHERE (name ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR email ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR phone ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }

        builder.push(" ORDER BY ");
        builder.push(Customer::ORDER_BY);

        Ok(builder
            .build_query_as::<Customer>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_customer(&self, id: Uuid) -> AppResult<Option<Customer>> {
        self.fetch_by_id::<Customer>(id).await
    }

    async fn create_customer(&self, customer: Customer) -> AppResult<Customer> {
        let sql = format!(
            "INSERT INTO customers (id, name, email, phone, address, total_purchases, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            Customer::COLUMNS
        );
        Ok(sqlx::query_as::<_, Customer>(&sql)
            .bind(customer.id)
            .bind(&customer.name)
            .bind(&customer.email)
            .bind(&customer.phone)
            .bind(&customer.address)
            .bind(&customer.total_purchases)
            .bind(customer.created_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_customer(
        &self,
        id: Uuid,
        req: UpdateCustomerRequest,
    ) -> AppResult<Option<Customer>> {
        let sql = format!(
            r#"
            UPDATE customers
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                address = COALESCE($5, address),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            Customer::COLUMNS
        );
        Ok(sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .bind(req.name)
            .bind(req.email)
            .bind(req.phone)
            .bind(req.address)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_customer(&self, id: Uuid) -> AppResult<bool> {
        self.remove_by_id::<Customer>(id).await
    }

    // --- PRODUCTS ---

    async fn list_products(&self, filter: ProductFilter) -> AppResult<Vec<Product>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM products WHERE 1 = 1", Product::COLUMNS));

        if let Some(category) = filter.category.filter(|c| !c.trim().is_empty()) {
            builder.push(" AND LOWER(category) = LOWER(");
            builder.push_bind(category.trim().to_string());
            builder.push(")");
        }

        if let Some(search) = filter.search.filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", search.trim());
            builder.push(" AND (name ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR description ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }

        builder.push(" ORDER BY ");
        builder.push(Product::ORDER_BY);

        Ok(builder
            .build_query_as::<Product>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_low_stock_products(&self) -> AppResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE stock <= min_stock ORDER BY stock ASC, name ASC",
            Product::COLUMNS
        );
        Ok(sqlx::query_as::<_, Product>(&sql).fetch_all(&self.pool).await?)
    }

    async fn get_products(&self, ids: &[Uuid]) -> AppResult<Vec<Product>> {
        let sql = format!("SELECT {} FROM products WHERE id = ANY($1)", Product::COLUMNS);
        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        self.fetch_by_id::<Product>(id).await
    }

    async fn create_product(&self, product: Product) -> AppResult<Product> {
        let sql = format!(
            "INSERT INTO products (id, name, description, category, cost_price, sale_price, stock, min_stock, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
            Product::COLUMNS
        );
        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(product.id)
            .bind(&product.name)
            .bind(&product.description)
            .bind(&product.category)
            .bind(&product.cost_price)
            .bind(&product.sale_price)
            .bind(product.stock)
            .bind(product.min_stock)
            .bind(product.created_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_product(
        &self,
        id: Uuid,
        req: UpdateProductRequest,
    ) -> AppResult<Option<Product>> {
        let sql = format!(
            r#"
            UPDATE products
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                cost_price = COALESCE($5, cost_price),
                sale_price = COALESCE($6, sale_price),
                stock = COALESCE($7, stock),
                min_stock = COALESCE($8, min_stock),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            Product::COLUMNS
        );
        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .bind(req.name)
            .bind(req.description)
            .bind(req.category)
            .bind(req.cost_price)
            .bind(req.sale_price)
            .bind(req.stock)
            .bind(req.min_stock)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_product(&self, id: Uuid) -> AppResult<bool> {
        self.remove_by_id::<Product>(id).await
    }

    // --- SALES & PAYMENTS ---

    /// list_sales
    ///
    /// Three queries regardless of the number of sales: the sales, then every line item and
    /// payment, grouped by sale in memory.
    async fn list_sales(&self) -> AppResult<Vec<SaleDetails>> {
        let sql = format!("{SALE_SELECT} ORDER BY s.sale_date DESC");
        let sales = sqlx::query_as::<_, SaleResponse>(&sql)
            .fetch_all(&self.pool)
            .await?;

        let sql = format!("{SALE_ITEM_SELECT}{SALE_ITEM_ORDER}");
        let mut items: HashMap<Uuid, Vec<SaleItemResponse>> = HashMap::new();
        for row in sqlx::query_as::<_, SaleItemRow>(&sql)
            .fetch_all(&self.pool)
            .await?
        {
            items.entry(row.sale_id).or_default().push(row.item);
        }

        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments ORDER BY payment_date ASC");
        let mut payments: HashMap<Uuid, Vec<Payment>> = HashMap::new();
        for payment in sqlx::query_as::<_, Payment>(&sql)
            .fetch_all(&self.pool)
            .await?
        {
            payments.entry(payment.sale_id).or_default().push(payment);
        }

        Ok(sales
            .into_iter()
            .map(|sale| SaleDetails {
                items: items.remove(&sale.id).unwrap_or_default(),
                payments: payments.remove(&sale.id).unwrap_or_default(),
                sale,
            })
            .collect())
    }

    async fn get_sale(&self, id: Uuid) -> AppResult<Option<Sale>> {
        self.fetch_by_id::<Sale>(id).await
    }

    async fn get_sale_details(&self, id: Uuid) -> AppResult<Option<SaleDetails>> {
        let Some(sale) = self.fetch_sale_response(id).await? else {
            return Ok(None);
        };

        let sql = format!("{SALE_ITEM_SELECT} WHERE si.sale_id = $1{SALE_ITEM_ORDER}");
        let items = sqlx::query_as::<_, SaleItemRow>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| row.item)
            .collect();

        let payments = self.list_payments(id).await?;

        Ok(Some(SaleDetails { sale, items, payments }))
    }

    /// create_sale
    ///
    /// Single transaction. Stock is decremented with a guarded `UPDATE ... WHERE stock >= $1`
    /// so two concurrent sales can never drive stock negative; the loser rolls back.
    async fn create_sale(&self, draft: SaleDraft) -> AppResult<Sale> {
        let SaleDraft { sale, items, payment } = draft;
        let mut tx = self.pool.begin().await?;

        let insert_sale = format!(
            "INSERT INTO sales (id, invoice_number, customer_id, agent_id, total_amount, paid_amount, \
             remaining_amount, payment_type, sale_date, is_paid, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {}",
            Sale::COLUMNS
        );
        let created = sqlx::query_as::<_, Sale>(&insert_sale)
            .bind(sale.id)
            .bind(&sale.invoice_number)
            .bind(sale.customer_id)
            .bind(sale.agent_id)
            .bind(&sale.total_amount)
            .bind(&sale.paid_amount)
            .bind(&sale.remaining_amount)
            .bind(sale.payment_type)
            .bind(sale.sale_date)
            .bind(sale.is_paid)
            .bind(sale.created_at)
            .fetch_one(&mut *tx)
            .await?;

        for item in &items {
            let reserved = sqlx::query(
                "UPDATE products SET stock = stock - $1, updated_at = NOW() WHERE id = $2 AND stock >= $1",
            )
            .bind(item.quantity)
            .bind(item.product_id)
            .execute(&mut *tx)
            .await?;

            if reserved.rows_affected() == 0 {
                return Err(AppError::conflict(format!(
                    "Insufficient stock for product {}",
                    item.product_id
                )));
            }

            sqlx::query(
                "INSERT INTO sale_items (id, sale_id, product_id, quantity, unit_price, total_price, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(item.id)
            .bind(item.sale_id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(&item.unit_price)
            .bind(&item.total_price)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(payment) = &payment {
            sqlx::query(
                "INSERT INTO payments (id, sale_id, amount, payment_type, payment_date, reference, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(payment.id)
            .bind(payment.sale_id)
            .bind(&payment.amount)
            .bind(payment.payment_type)
            .bind(payment.payment_date)
            .bind(&payment.reference)
            .bind(payment.created_at)
            .execute(&mut *tx)
            .await?;
        }

        let credited = sqlx::query(
            "UPDATE customers SET total_purchases = total_purchases + $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(&created.total_amount)
        .bind(created.customer_id)
        .execute(&mut *tx)
        .await?;

        if credited.rows_affected() == 0 {
            return Err(AppError::not_found("Customer"));
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn delete_sale(&self, id: Uuid) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        let lock = format!("SELECT {} FROM sales WHERE id = $1 FOR UPDATE", Sale::COLUMNS);
        let Some(sale) = sqlx::query_as::<_, Sale>(&lock)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(false);
        };

        let has_commissions: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM commissions WHERE sale_id = $1)")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if has_commissions {
            return Err(AppError::conflict(
                "Sale has commissions recorded against it and cannot be deleted",
            ));
        }

        let items = sqlx::query_as::<_, SaleItem>(
            "SELECT id, sale_id, product_id, quantity, unit_price, total_price, created_at, updated_at \
             FROM sale_items WHERE sale_id = $1",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        for item in &items {
            sqlx::query("UPDATE products SET stock = stock + $1, updated_at = NOW() WHERE id = $2")
                .bind(item.quantity)
                .bind(item.product_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            "UPDATE customers SET total_purchases = GREATEST(total_purchases - $1, 0), updated_at = NOW() WHERE id = $2",
        )
        .bind(&sale.total_amount)
        .bind(sale.customer_id)
        .execute(&mut *tx)
        .await?;

        // sale_items and payments go with the sale (ON DELETE CASCADE).
        sqlx::query("DELETE FROM sales WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn list_payments(&self, sale_id: Uuid) -> AppResult<Vec<Payment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE sale_id = $1 ORDER BY payment_date ASC"
        );
        Ok(sqlx::query_as::<_, Payment>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// add_payment
    ///
    /// The sale row is only updated if `paid_amount` still equals the value the settlement
    /// was computed from; otherwise another payment won the race and this one is rejected.
    async fn add_payment(&self, payment: Payment, settlement: Settlement) -> AppResult<Payment> {
        let mut tx = self.pool.begin().await?;

        let settled = sqlx::query(
            r#"
            UPDATE sales
            SET paid_amount = $2, remaining_amount = $3, is_paid = $4, updated_at = NOW()
            WHERE id = $1 AND paid_amount = $5
            "#,
        )
        .bind(payment.sale_id)
        .bind(&settlement.paid_amount)
        .bind(&settlement.remaining_amount)
        .bind(settlement.is_paid)
        .bind(&settlement.previous_paid)
        .execute(&mut *tx)
        .await?;

        if settled.rows_affected() == 0 {
            return Err(AppError::conflict(
                "The sale was modified by another payment, please retry",
            ));
        }

        let sql = format!(
            "INSERT INTO payments (id, sale_id, amount, payment_type, payment_date, reference, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {PAYMENT_COLUMNS}"
        );
        let created = sqlx::query_as::<_, Payment>(&sql)
            .bind(payment.id)
            .bind(payment.sale_id)
            .bind(&payment.amount)
            .bind(payment.payment_type)
            .bind(payment.payment_date)
            .bind(&payment.reference)
            .bind(payment.created_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn sale_cost(&self, sale_id: Uuid) -> AppResult<BigDecimal> {
        Ok(sqlx::query_scalar::<_, BigDecimal>(
            r#"
            SELECT COALESCE(SUM(si.quantity * p.cost_price), 0)
            FROM sale_items si
            JOIN products p ON p.id = si.product_id
            WHERE si.sale_id = $1
            "#,
        )
        .bind(sale_id)
        .fetch_one(&self.pool)
        .await?)
    }

    // --- AGENTS & COMMISSIONS ---

    async fn list_agents(&self) -> AppResult<Vec<AgentResponse>> {
        let sql = format!("{} ORDER BY u.name ASC", agent_select("agents"));
        Ok(sqlx::query_as::<_, AgentResponse>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_agent(&self, id: Uuid) -> AppResult<Option<AgentResponse>> {
        let sql = format!("{} WHERE a.id = $1", agent_select("agents"));
        Ok(sqlx::query_as::<_, AgentResponse>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_agent_by_user(&self, user_id: Uuid) -> AppResult<Option<AgentResponse>> {
        let sql = format!("{} WHERE a.user_id = $1", agent_select("agents"));
        Ok(sqlx::query_as::<_, AgentResponse>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// create_agent
    ///
    /// Inserts and joins the owning user in one statement (CTE).
    async fn create_agent(&self, agent: Agent) -> AppResult<AgentResponse> {
        let sql = format!(
            "WITH inserted AS ( \
                INSERT INTO agents (id, user_id, balance, assigned_licenses, sold_licenses, created_at) \
                VALUES ($1, $2, $3, $4, $5, $6) RETURNING * \
             ) {}",
            agent_select("inserted")
        );
        Ok(sqlx::query_as::<_, AgentResponse>(&sql)
            .bind(agent.id)
            .bind(agent.user_id)
            .bind(&agent.balance)
            .bind(agent.assigned_licenses)
            .bind(agent.sold_licenses)
            .bind(agent.created_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_agent(
        &self,
        id: Uuid,
        req: UpdateAgentRequest,
    ) -> AppResult<Option<AgentResponse>> {
        let sql = format!(
            "WITH updated AS ( \
                UPDATE agents \
                SET balance = COALESCE($2, balance), \
                    assigned_licenses = COALESCE($3, assigned_licenses), \
                    sold_licenses = COALESCE($4, sold_licenses), \
                    updated_at = NOW() \
                WHERE id = $1 RETURNING * \
             ) {}",
            agent_select("updated")
        );
        Ok(sqlx::query_as::<_, AgentResponse>(&sql)
            .bind(id)
            .bind(req.balance)
            .bind(req.assigned_licenses)
            .bind(req.sold_licenses)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_agent(&self, id: Uuid) -> AppResult<bool> {
        self.remove_by_id::<Agent>(id).await
    }

    async fn list_commissions(&self) -> AppResult<Vec<CommissionResponse>> {
        let sql = format!("{COMMISSION_SELECT} ORDER BY cm.earned_date DESC");
        Ok(sqlx::query_as::<_, CommissionResponse>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_agent_commissions(&self, agent_id: Uuid) -> AppResult<Vec<CommissionResponse>> {
        let sql = format!("{COMMISSION_SELECT} WHERE cm.agent_id = $1 ORDER BY cm.earned_date DESC");
        Ok(sqlx::query_as::<_, CommissionResponse>(&sql)
            .bind(agent_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create_commission(&self, commission: Commission) -> AppResult<CommissionResponse> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO commissions (id, agent_id, sale_id, commission_type, rate, amount, earned_date, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(commission.id)
        .bind(commission.agent_id)
        .bind(commission.sale_id)
        .bind(commission.commission_type)
        .bind(&commission.rate)
        .bind(&commission.amount)
        .bind(commission.earned_date)
        .bind(commission.created_at)
        .execute(&mut *tx)
        .await?;

        let credited = sqlx::query(
            "UPDATE agents SET balance = balance + $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(&commission.amount)
        .bind(commission.agent_id)
        .execute(&mut *tx)
        .await?;

        if credited.rows_affected() == 0 {
            return Err(AppError::not_found("Agent"));
        }

        let sql = format!("{COMMISSION_SELECT} WHERE cm.id = $1");
        let created = sqlx::query_as::<_, CommissionResponse>(&sql)
            .bind(commission.id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(created)
    }

    // --- SERVICE REQUESTS ---

    async fn list_service_requests(&self) -> AppResult<Vec<ServiceRequestResponse>> {
        let sql = format!(
            "{} ORDER BY r.request_date DESC",
            service_request_select(ServiceRequest::TABLE)
        );
        Ok(sqlx::query_as::<_, ServiceRequestResponse>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_service_request(&self, id: Uuid) -> AppResult<Option<ServiceRequestResponse>> {
        let sql = format!("{} WHERE r.id = $1", service_request_select(ServiceRequest::TABLE));
        Ok(sqlx::query_as::<_, ServiceRequestResponse>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_service_request(
        &self,
        request: ServiceRequest,
    ) -> AppResult<ServiceRequestResponse> {
        let sql = format!(
            "WITH inserted AS ( \
                INSERT INTO service_requests (id, request_number, customer_id, request_type, description, \
                    status, request_date, completed_date, created_at) \
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING * \
             ) {}",
            service_request_select("inserted")
        );
        Ok(sqlx::query_as::<_, ServiceRequestResponse>(&sql)
            .bind(request.id)
            .bind(&request.request_number)
            .bind(request.customer_id)
            .bind(&request.request_type)
            .bind(&request.description)
            .bind(request.status)
            .bind(request.request_date)
            .bind(request.completed_date)
            .bind(request.created_at)
            .fetch_one(&self.pool)
            .await?)
    }

    /// update_service_request
    ///
    /// `completed_date` is written as given (not coalesced) so reopening a request clears it.
    async fn update_service_request(
        &self,
        id: Uuid,
        changes: ServiceRequestChanges,
    ) -> AppResult<Option<ServiceRequestResponse>> {
        let sql = format!(
            "WITH updated AS ( \
                UPDATE service_requests \
                SET request_type = COALESCE($2, request_type), \
                    description = COALESCE($3, description), \
                    status = COALESCE($4, status), \
                    completed_date = $5, \
                    updated_at = NOW() \
                WHERE id = $1 RETURNING * \
             ) {}",
            service_request_select("updated")
        );
        Ok(sqlx::query_as::<_, ServiceRequestResponse>(&sql)
            .bind(id)
            .bind(changes.request_type)
            .bind(changes.description)
            .bind(changes.status)
            .bind(changes.completed_date)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_service_request(&self, id: Uuid) -> AppResult<bool> {
        self.remove_by_id::<ServiceRequest>(id).await
    }

    // --- AUDIT & DASHBOARD ---

    async fn record_audit(&self, log: AuditLog) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO audit_logs (id, user_id, user_role, action, entity, entity_id, details, ip_address, timestamp) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(log.id)
        .bind(log.user_id)
        .bind(&log.user_role)
        .bind(&log.action)
        .bind(&log.entity)
        .bind(&log.entity_id)
        .bind(&log.details)
        .bind(&log.ip_address)
        .bind(log.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_audit_logs(
        &self,
        filter: AuditFilter,
        page: AuditPage,
    ) -> AppResult<Vec<AuditLogResponse>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(AUDIT_SELECT);

        match filter {
            AuditFilter::All => {}
            AuditFilter::User(user_id) => {
                builder.push(" WHERE l.user_id = ");
                builder.push_bind(user_id);
            }
            AuditFilter::Entity { entity, entity_id } => {
                builder.push(" WHERE LOWER(l.entity) = LOWER(");
                builder.push_bind(entity);
                builder.push(") AND l.entity_id = ");
                builder.push_bind(entity_id);
            }
        }

        builder.push(" ORDER BY l.timestamp DESC, l.id DESC LIMIT ");
        builder.push_bind(page.limit());
        builder.push(" OFFSET ");
        builder.push_bind(page.offset());

        Ok(builder
            .build_query_as::<AuditLogResponse>()
            .fetch_all(&self.pool)
            .await?)
    }

    /// dashboard_stats
    ///
    /// Compiles every dashboard counter in a single round trip.
    async fn dashboard_stats(&self) -> AppResult<DashboardStats> {
        Ok(sqlx::query_as::<_, DashboardStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM customers) AS total_customers,
                (SELECT COUNT(*) FROM products) AS total_products,
                (SELECT COUNT(*) FROM sales) AS total_sales,
                (SELECT COALESCE(SUM(total_amount), 0) FROM sales) AS total_revenue,
                (SELECT COALESCE(SUM(remaining_amount), 0) FROM sales WHERE NOT is_paid) AS outstanding_balance,
                (SELECT COUNT(*) FROM products WHERE stock <= min_stock) AS low_stock_products,
                (SELECT COUNT(*) FROM service_requests WHERE status IN (1, 2)) AS open_service_requests,
                (SELECT COUNT(*) FROM agents a JOIN users u ON u.id = a.user_id WHERE u.is_active) AS active_agents
            "#,
        )
        .fetch_one(&self.pool)
        .await?)
    }
}
