#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use crm_backend::{
    AppConfig, AppState,
    auth::issue_token,
    billing::{SaleDraft, Settlement},
    create_router,
    error::{AppError, AppResult},
    models::{
        Agent, AgentResponse, AuditLog, AuditLogResponse, Commission, CommissionResponse,
        Customer, DashboardStats, Payment, Product, Sale, SaleDetails, SaleItem,
        SaleItemResponse, SaleResponse, ServiceRequest, ServiceRequestChanges,
        ServiceRequestResponse, ServiceStatus, UpdateAgentRequest, UpdateCustomerRequest,
        UpdateProductRequest, User, UserChanges, UserRole,
    },
    repository::{AuditFilter, AuditPage, CustomerFilter, ProductFilter, Repository, RepositoryState},
};
use std::{
    str::FromStr,
    sync::{Arc, Mutex},
};
use tokio::net::TcpListener;
use uuid::Uuid;

// --- In-Memory Repository ---

#[derive(Default)]
pub struct Store {
    pub users: Vec<User>,
    pub customers: Vec<Customer>,
    pub products: Vec<Product>,
    pub sales: Vec<Sale>,
    pub sale_items: Vec<SaleItem>,
    pub payments: Vec<Payment>,
    pub agents: Vec<Agent>,
    pub commissions: Vec<Commission>,
    pub service_requests: Vec<ServiceRequest>,
    pub audit_logs: Vec<AuditLog>,
}

/// Repository double backed by vectors. Mirrors the Postgres constraints the handlers
/// rely on: unique emails, restricted deletes and the stock guard.
#[derive(Default)]
pub struct MemoryRepository {
    pub store: Mutex<Store>,
}

fn duplicate() -> AppError {
    AppError::conflict("A record with the same unique value already exists")
}

fn referenced() -> AppError {
    AppError::conflict("The record is referenced by other data")
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl Store {
    fn user_name(&self, id: Uuid) -> Option<String> {
        self.users.iter().find(|u| u.id == id).map(|u| u.name.clone())
    }

    fn customer_name(&self, id: Uuid) -> String {
        self.customers
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.clone())
            .unwrap_or_default()
    }

    fn agent_response(&self, agent: &Agent) -> AgentResponse {
        let user = self.users.iter().find(|u| u.id == agent.user_id);
        AgentResponse {
            id: agent.id,
            user_id: agent.user_id,
            user_name: user.map(|u| u.name.clone()).unwrap_or_default(),
            user_email: user.map(|u| u.email.clone()).unwrap_or_default(),
            balance: agent.balance.clone(),
            assigned_licenses: agent.assigned_licenses,
            sold_licenses: agent.sold_licenses,
            created_at: agent.created_at,
        }
    }

    fn agent_name(&self, agent_id: Uuid) -> Option<String> {
        self.agents
            .iter()
            .find(|a| a.id == agent_id)
            .and_then(|a| self.user_name(a.user_id))
    }

    fn sale_response(&self, sale: &Sale) -> SaleResponse {
        SaleResponse {
            id: sale.id,
            invoice_number: sale.invoice_number.clone(),
            customer_id: sale.customer_id,
            customer_name: self.customer_name(sale.customer_id),
            agent_id: sale.agent_id,
            agent_name: sale.agent_id.and_then(|id| self.agent_name(id)),
            total_amount: sale.total_amount.clone(),
            paid_amount: sale.paid_amount.clone(),
            remaining_amount: sale.remaining_amount.clone(),
            payment_type: sale.payment_type,
            sale_date: sale.sale_date,
            is_paid: sale.is_paid,
        }
    }

    fn sale_details(&self, sale: &Sale) -> SaleDetails {
        let items = self
            .sale_items
            .iter()
            .filter(|i| i.sale_id == sale.id)
            .map(|i| SaleItemResponse {
                id: i.id,
                product_id: i.product_id,
                product_name: self
                    .products
                    .iter()
                    .find(|p| p.id == i.product_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_default(),
                quantity: i.quantity,
                unit_price: i.unit_price.clone(),
                total_price: i.total_price.clone(),
            })
            .collect();
        let payments = self.payments.iter().filter(|p| p.sale_id == sale.id).cloned().collect();
        SaleDetails {
            sale: self.sale_response(sale),
            items,
            payments,
        }
    }

    fn commission_response(&self, commission: &Commission) -> CommissionResponse {
        CommissionResponse {
            id: commission.id,
            agent_id: commission.agent_id,
            agent_name: self.agent_name(commission.agent_id).unwrap_or_default(),
            sale_id: commission.sale_id,
            invoice_number: self
                .sales
                .iter()
                .find(|s| s.id == commission.sale_id)
                .map(|s| s.invoice_number.clone())
                .unwrap_or_default(),
            commission_type: commission.commission_type,
            rate: commission.rate.clone(),
            amount: commission.amount.clone(),
            earned_date: commission.earned_date,
        }
    }

    fn service_response(&self, request: &ServiceRequest) -> ServiceRequestResponse {
        ServiceRequestResponse {
            id: request.id,
            request_number: request.request_number.clone(),
            customer_id: request.customer_id,
            customer_name: self.customer_name(request.customer_id),
            request_type: request.request_type.clone(),
            description: request.description.clone(),
            status: request.status,
            request_date: request.request_date,
            completed_date: request.completed_date,
        }
    }
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store<R>(&self, f: impl FnOnce(&mut Store) -> R) -> R {
        let mut store = self.store.lock().unwrap();
        f(&mut store)
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    // --- Users ---

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let mut users = self.with_store(|s| s.users.clone());
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.with_store(|s| s.users.iter().find(|u| u.id == id).cloned()))
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self.with_store(|s| {
            s.users
                .iter()
                .find(|u| u.email.eq_ignore_ascii_case(email))
                .cloned()
        }))
    }

    async fn create_user(&self, user: User) -> AppResult<User> {
        self.with_store(|s| {
            if s.users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
                return Err(duplicate());
            }
            s.users.push(user.clone());
            Ok(user)
        })
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> AppResult<Option<User>> {
        self.with_store(|s| {
            if let Some(email) = &changes.email {
                if s.users.iter().any(|u| u.id != id && u.email.eq_ignore_ascii_case(email)) {
                    return Err(duplicate());
                }
            }
            let Some(user) = s.users.iter_mut().find(|u| u.id == id) else {
                return Ok(None);
            };
            if let Some(name) = changes.name {
                user.name = name;
            }
            if let Some(email) = changes.email {
                user.email = email;
            }
            if let Some(hash) = changes.password_hash {
                user.password_hash = hash;
            }
            if let Some(role) = changes.role {
                user.role = role;
            }
            if let Some(active) = changes.is_active {
                user.is_active = active;
            }
            user.updated_at = Some(Utc::now());
            Ok(Some(user.clone()))
        })
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<bool> {
        self.with_store(|s| {
            if s.agents.iter().any(|a| a.user_id == id) || s.audit_logs.iter().any(|l| l.user_id == id) {
                return Err(referenced());
            }
            let before = s.users.len();
            s.users.retain(|u| u.id != id);
            Ok(s.users.len() < before)
        })
    }

    async fn count_users(&self) -> AppResult<i64> {
        Ok(self.with_store(|s| s.users.len() as i64))
    }

    // --- Customers ---

    async fn list_customers(&self, filter: CustomerFilter) -> AppResult<Vec<Customer>> {
        let mut customers = self.with_store(|s| s.customers.clone());
        if let Some(term) = filter.search.filter(|t| !t.trim().is_empty()) {
            let term = term.trim().to_string();
            customers.retain(|c| {
                contains_ci(&c.name, &term) || contains_ci(&c.email, &term) || contains_ci(&c.phone, &term)
            });
        }
        customers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(customers)
    }

    async fn get_customer(&self, id: Uuid) -> AppResult<Option<Customer>> {
        Ok(self.with_store(|s| s.customers.iter().find(|c| c.id == id).cloned()))
    }

    async fn create_customer(&self, customer: Customer) -> AppResult<Customer> {
        self.with_store(|s| {
            if s.customers.iter().any(|c| c.email.eq_ignore_ascii_case(&customer.email)) {
                return Err(duplicate());
            }
            s.customers.push(customer.clone());
            Ok(customer)
        })
    }

    async fn update_customer(
        &self,
        id: Uuid,
        req: UpdateCustomerRequest,
    ) -> AppResult<Option<Customer>> {
        Ok(self.with_store(|s| {
            let customer = s.customers.iter_mut().find(|c| c.id == id)?;
            if let Some(name) = req.name {
                customer.name = name;
            }
            if let Some(email) = req.email {
                customer.email = email;
            }
            if let Some(phone) = req.phone {
                customer.phone = phone;
            }
            if let Some(address) = req.address {
                customer.address = Some(address);
            }
            customer.updated_at = Some(Utc::now());
            Some(customer.clone())
        }))
    }

    async fn delete_customer(&self, id: Uuid) -> AppResult<bool> {
        self.with_store(|s| {
            if s.sales.iter().any(|x| x.customer_id == id)
                || s.service_requests.iter().any(|r| r.customer_id == id)
            {
                return Err(referenced());
            }
            let before = s.customers.len();
            s.customers.retain(|c| c.id != id);
            Ok(s.customers.len() < before)
        })
    }

    // --- Products ---

    async fn list_products(&self, filter: ProductFilter) -> AppResult<Vec<Product>> {
        let mut products = self.with_store(|s| s.products.clone());
        if let Some(category) = filter.category.filter(|c| !c.trim().is_empty()) {
            products.retain(|p| p.category.eq_ignore_ascii_case(category.trim()));
        }
        if let Some(term) = filter.search.filter(|t| !t.trim().is_empty()) {
            let term = term.trim().to_string();
            products.retain(|p| {
                contains_ci(&p.name, &term)
                    || p.description.as_deref().is_some_and(|d| contains_ci(d, &term))
            });
        }
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn list_low_stock_products(&self) -> AppResult<Vec<Product>> {
        let mut products: Vec<Product> = self.with_store(|s| {
            s.products.iter().filter(|p| p.is_low_stock()).cloned().collect()
        });
        products.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.name.cmp(&b.name)));
        Ok(products)
    }

    async fn get_products(&self, ids: &[Uuid]) -> AppResult<Vec<Product>> {
        Ok(self.with_store(|s| {
            s.products.iter().filter(|p| ids.contains(&p.id)).cloned().collect()
        }))
    }

    async fn get_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        Ok(self.with_store(|s| s.products.iter().find(|p| p.id == id).cloned()))
    }

    async fn create_product(&self, product: Product) -> AppResult<Product> {
        self.with_store(|s| s.products.push(product.clone()));
        Ok(product)
    }

    async fn update_product(
        &self,
        id: Uuid,
        req: UpdateProductRequest,
    ) -> AppResult<Option<Product>> {
        Ok(self.with_store(|s| {
            let product = s.products.iter_mut().find(|p| p.id == id)?;
            if let Some(name) = req.name {
                product.name = name;
            }
            if let Some(description) = req.description {
                product.description = Some(description);
            }
            if let Some(category) = req.category {
                product.category = category;
            }
            if let Some(cost) = req.cost_price {
                product.cost_price = cost;
            }
            if let Some(price) = req.sale_price {
                product.sale_price = price;
            }
            if let Some(stock) = req.stock {
                product.stock = stock;
            }
            if let Some(min_stock) = req.min_stock {
                product.min_stock = min_stock;
            }
            product.updated_at = Some(Utc::now());
            Some(product.clone())
        }))
    }

    async fn delete_product(&self, id: Uuid) -> AppResult<bool> {
        self.with_store(|s| {
            if s.sale_items.iter().any(|i| i.product_id == id) {
                return Err(referenced());
            }
            let before = s.products.len();
            s.products.retain(|p| p.id != id);
            Ok(s.products.len() < before)
        })
    }

    // --- Sales & Payments ---

    async fn list_sales(&self) -> AppResult<Vec<SaleDetails>> {
        let mut sales: Vec<SaleDetails> =
            self.with_store(|s| s.sales.iter().map(|sale| s.sale_details(sale)).collect());
        sales.sort_by(|a, b| b.sale.sale_date.cmp(&a.sale.sale_date));
        Ok(sales)
    }

    async fn get_sale(&self, id: Uuid) -> AppResult<Option<Sale>> {
        Ok(self.with_store(|s| s.sales.iter().find(|x| x.id == id).cloned()))
    }

    async fn get_sale_details(&self, id: Uuid) -> AppResult<Option<SaleDetails>> {
        Ok(self.with_store(|s| {
            let sale = s.sales.iter().find(|x| x.id == id)?;
            Some(s.sale_details(sale))
        }))
    }

    async fn create_sale(&self, draft: SaleDraft) -> AppResult<Sale> {
        self.with_store(|s| {
            for item in &draft.items {
                let requested: i32 = draft
                    .items
                    .iter()
                    .filter(|i| i.product_id == item.product_id)
                    .map(|i| i.quantity)
                    .sum();
                let available = s
                    .products
                    .iter()
                    .find(|p| p.id == item.product_id)
                    .map(|p| p.stock)
                    .unwrap_or(0);
                if requested > available {
                    return Err(AppError::conflict(format!(
                        "Insufficient stock for product {}",
                        item.product_id
                    )));
                }
            }
            let Some(customer) = s.customers.iter_mut().find(|c| c.id == draft.sale.customer_id) else {
                return Err(AppError::not_found("Customer"));
            };
            customer.total_purchases = &customer.total_purchases + &draft.sale.total_amount;

            for item in &draft.items {
                if let Some(product) = s.products.iter_mut().find(|p| p.id == item.product_id) {
                    product.stock -= item.quantity;
                }
            }
            s.sale_items.extend(draft.items.iter().cloned());
            s.payments.extend(draft.payment.iter().cloned());
            s.sales.push(draft.sale.clone());
            Ok(draft.sale)
        })
    }

    async fn delete_sale(&self, id: Uuid) -> AppResult<bool> {
        self.with_store(|s| {
            let Some(sale) = s.sales.iter().find(|x| x.id == id).cloned() else {
                return Ok(false);
            };
            if s.commissions.iter().any(|c| c.sale_id == id) {
                return Err(AppError::conflict(
                    "Sale has commissions recorded against it and cannot be deleted",
                ));
            }
            let items: Vec<SaleItem> = s.sale_items.iter().filter(|i| i.sale_id == id).cloned().collect();
            for item in &items {
                if let Some(product) = s.products.iter_mut().find(|p| p.id == item.product_id) {
                    product.stock += item.quantity;
                }
            }
            if let Some(customer) = s.customers.iter_mut().find(|c| c.id == sale.customer_id) {
                let reduced = &customer.total_purchases - &sale.total_amount;
                customer.total_purchases = if reduced < BigDecimal::from(0) {
                    BigDecimal::from(0)
                } else {
                    reduced
                };
            }
            s.sale_items.retain(|i| i.sale_id != id);
            s.payments.retain(|p| p.sale_id != id);
            s.sales.retain(|x| x.id != id);
            Ok(true)
        })
    }

    async fn list_payments(&self, sale_id: Uuid) -> AppResult<Vec<Payment>> {
        Ok(self.with_store(|s| {
            s.payments.iter().filter(|p| p.sale_id == sale_id).cloned().collect()
        }))
    }

    async fn add_payment(&self, payment: Payment, settlement: Settlement) -> AppResult<Payment> {
        self.with_store(|s| {
            let Some(sale) = s
                .sales
                .iter_mut()
                .find(|x| x.id == payment.sale_id && x.paid_amount == settlement.previous_paid)
            else {
                return Err(AppError::conflict(
                    "The sale was modified by another payment, please retry",
                ));
            };
            sale.paid_amount = settlement.paid_amount.clone();
            sale.remaining_amount = settlement.remaining_amount.clone();
            sale.is_paid = settlement.is_paid;
            sale.updated_at = Some(Utc::now());
            s.payments.push(payment.clone());
            Ok(payment)
        })
    }

    async fn sale_cost(&self, sale_id: Uuid) -> AppResult<BigDecimal> {
        Ok(self.with_store(|s| {
            s.sale_items
                .iter()
                .filter(|i| i.sale_id == sale_id)
                .fold(BigDecimal::from(0), |acc, item| {
                    let cost = s
                        .products
                        .iter()
                        .find(|p| p.id == item.product_id)
                        .map(|p| p.cost_price.clone())
                        .unwrap_or_default();
                    acc + cost * BigDecimal::from(item.quantity)
                })
        }))
    }

    // --- Agents & Commissions ---

    async fn list_agents(&self) -> AppResult<Vec<AgentResponse>> {
        let mut agents: Vec<AgentResponse> =
            self.with_store(|s| s.agents.iter().map(|a| s.agent_response(a)).collect());
        agents.sort_by(|a, b| a.user_name.cmp(&b.user_name));
        Ok(agents)
    }

    async fn get_agent(&self, id: Uuid) -> AppResult<Option<AgentResponse>> {
        Ok(self.with_store(|s| s.agents.iter().find(|a| a.id == id).map(|a| s.agent_response(a))))
    }

    async fn get_agent_by_user(&self, user_id: Uuid) -> AppResult<Option<AgentResponse>> {
        Ok(self.with_store(|s| {
            s.agents
                .iter()
                .find(|a| a.user_id == user_id)
                .map(|a| s.agent_response(a))
        }))
    }

    async fn create_agent(&self, agent: Agent) -> AppResult<AgentResponse> {
        self.with_store(|s| {
            if s.agents.iter().any(|a| a.user_id == agent.user_id) {
                return Err(duplicate());
            }
            s.agents.push(agent.clone());
            Ok(s.agent_response(&agent))
        })
    }

    async fn update_agent(
        &self,
        id: Uuid,
        req: UpdateAgentRequest,
    ) -> AppResult<Option<AgentResponse>> {
        Ok(self.with_store(|s| {
            let agent = s.agents.iter_mut().find(|a| a.id == id)?;
            if let Some(balance) = req.balance {
                agent.balance = balance;
            }
            if let Some(assigned) = req.assigned_licenses {
                agent.assigned_licenses = assigned;
            }
            if let Some(sold) = req.sold_licenses {
                agent.sold_licenses = sold;
            }
            agent.updated_at = Some(Utc::now());
            let agent = agent.clone();
            Some(s.agent_response(&agent))
        }))
    }

    async fn delete_agent(&self, id: Uuid) -> AppResult<bool> {
        self.with_store(|s| {
            if s.commissions.iter().any(|c| c.agent_id == id) {
                return Err(referenced());
            }
            let before = s.agents.len();
            s.agents.retain(|a| a.id != id);
            for sale in s.sales.iter_mut().filter(|x| x.agent_id == Some(id)) {
                sale.agent_id = None;
            }
            Ok(s.agents.len() < before)
        })
    }

    async fn list_commissions(&self) -> AppResult<Vec<CommissionResponse>> {
        let mut commissions: Vec<CommissionResponse> = self.with_store(|s| {
            s.commissions.iter().map(|c| s.commission_response(c)).collect()
        });
        commissions.sort_by(|a, b| b.earned_date.cmp(&a.earned_date));
        Ok(commissions)
    }

    async fn list_agent_commissions(&self, agent_id: Uuid) -> AppResult<Vec<CommissionResponse>> {
        let all = self.list_commissions().await?;
        Ok(all.into_iter().filter(|c| c.agent_id == agent_id).collect())
    }

    async fn create_commission(&self, commission: Commission) -> AppResult<CommissionResponse> {
        self.with_store(|s| {
            let Some(agent) = s.agents.iter_mut().find(|a| a.id == commission.agent_id) else {
                return Err(AppError::not_found("Agent"));
            };
            agent.balance = &agent.balance + &commission.amount;
            s.commissions.push(commission.clone());
            Ok(s.commission_response(&commission))
        })
    }

    // --- Service Requests ---

    async fn list_service_requests(&self) -> AppResult<Vec<ServiceRequestResponse>> {
        let mut requests: Vec<ServiceRequestResponse> = self.with_store(|s| {
            s.service_requests.iter().map(|r| s.service_response(r)).collect()
        });
        requests.sort_by(|a, b| b.request_date.cmp(&a.request_date));
        Ok(requests)
    }

    async fn get_service_request(&self, id: Uuid) -> AppResult<Option<ServiceRequestResponse>> {
        Ok(self.with_store(|s| {
            s.service_requests
                .iter()
                .find(|r| r.id == id)
                .map(|r| s.service_response(r))
        }))
    }

    async fn create_service_request(
        &self,
        request: ServiceRequest,
    ) -> AppResult<ServiceRequestResponse> {
        Ok(self.with_store(|s| {
            s.service_requests.push(request.clone());
            s.service_response(&request)
        }))
    }

    async fn update_service_request(
        &self,
        id: Uuid,
        changes: ServiceRequestChanges,
    ) -> AppResult<Option<ServiceRequestResponse>> {
        Ok(self.with_store(|s| {
            let request = s.service_requests.iter_mut().find(|r| r.id == id)?;
            if let Some(request_type) = changes.request_type {
                request.request_type = request_type;
            }
            if let Some(description) = changes.description {
                request.description = description;
            }
            if let Some(status) = changes.status {
                request.status = status;
            }
            request.completed_date = changes.completed_date;
            request.updated_at = Some(Utc::now());
            let request = request.clone();
            Some(s.service_response(&request))
        }))
    }

    async fn delete_service_request(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.with_store(|s| {
            let before = s.service_requests.len();
            s.service_requests.retain(|r| r.id != id);
            s.service_requests.len() < before
        }))
    }

    // --- Audit & Dashboard ---

    async fn record_audit(&self, log: AuditLog) -> AppResult<()> {
        self.with_store(|s| s.audit_logs.push(log));
        Ok(())
    }

    async fn list_audit_logs(
        &self,
        filter: AuditFilter,
        page: AuditPage,
    ) -> AppResult<Vec<AuditLogResponse>> {
        let mut logs: Vec<AuditLogResponse> = self.with_store(|s| {
            s.audit_logs
                .iter()
                .filter(|l| match &filter {
                    AuditFilter::All => true,
                    AuditFilter::User(user_id) => l.user_id == *user_id,
                    AuditFilter::Entity { entity, entity_id } => {
                        l.entity.eq_ignore_ascii_case(entity)
                            && l.entity_id.as_deref() == Some(entity_id.as_str())
                    }
                })
                .map(|l| AuditLogResponse {
                    id: l.id,
                    user_id: l.user_id,
                    user_name: s.user_name(l.user_id),
                    user_role: l.user_role.clone(),
                    action: l.action.clone(),
                    entity: l.entity.clone(),
                    entity_id: l.entity_id.clone(),
                    details: l.details.clone(),
                    ip_address: l.ip_address.clone(),
                    timestamp: l.timestamp,
                })
                .collect()
        });
        logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(logs
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect())
    }

    async fn dashboard_stats(&self) -> AppResult<DashboardStats> {
        Ok(self.with_store(|s| DashboardStats {
            total_customers: s.customers.len() as i64,
            total_products: s.products.len() as i64,
            total_sales: s.sales.len() as i64,
            total_revenue: s
                .sales
                .iter()
                .fold(BigDecimal::from(0), |acc, x| acc + &x.total_amount),
            outstanding_balance: s
                .sales
                .iter()
                .filter(|x| !x.is_paid)
                .fold(BigDecimal::from(0), |acc, x| acc + &x.remaining_amount),
            low_stock_products: s.products.iter().filter(|p| p.is_low_stock()).count() as i64,
            open_service_requests: s
                .service_requests
                .iter()
                .filter(|r| matches!(r.status, ServiceStatus::New | ServiceStatus::InProgress))
                .count() as i64,
            active_agents: s
                .agents
                .iter()
                .filter(|a| s.users.iter().any(|u| u.id == a.user_id && u.is_active))
                .count() as i64,
        }))
    }
}

// --- Fixtures ---

pub fn money(raw: &str) -> BigDecimal {
    BigDecimal::from_str(raw).unwrap()
}

pub fn user(name: &str, email: &str, role: UserRole) -> User {
    User {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: email.to_string(),
        // Token-authenticated fixtures never log in with a password.
        password_hash: "unused".to_string(),
        role,
        is_active: true,
        created_at: Utc::now(),
        updated_at: None,
    }
}

pub fn customer(name: &str, email: &str) -> Customer {
    Customer {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: email.to_string(),
        phone: "+1234567890".to_string(),
        address: None,
        total_purchases: money("0.00"),
        created_at: Utc::now(),
        updated_at: None,
    }
}

pub fn product(name: &str, cost: &str, price: &str, stock: i32, min_stock: i32) -> Product {
    Product {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: None,
        category: "Software".to_string(),
        cost_price: money(cost),
        sale_price: money(price),
        stock,
        min_stock,
        created_at: Utc::now(),
        updated_at: None,
    }
}

pub fn agent_for(user: &User, balance: &str) -> Agent {
    Agent {
        id: Uuid::new_v4(),
        user_id: user.id,
        balance: money(balance),
        assigned_licenses: 10,
        sold_licenses: 0,
        created_at: Utc::now(),
        updated_at: None,
    }
}

// --- Spawned Application ---

pub struct TestApp {
    pub address: String,
    pub repo: Arc<MemoryRepository>,
    pub config: AppConfig,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub fn token_for(&self, user: &User) -> String {
        issue_token(user, &self.config).unwrap()
    }

    pub fn insert_user(&self, user: User) -> User {
        self.repo.with_store(|s| s.users.push(user.clone()));
        user
    }

    pub fn insert_customer(&self, customer: Customer) -> Customer {
        self.repo.with_store(|s| s.customers.push(customer.clone()));
        customer
    }

    pub fn insert_product(&self, product: Product) -> Product {
        self.repo.with_store(|s| s.products.push(product.clone()));
        product
    }

    pub fn insert_agent(&self, agent: Agent) -> Agent {
        self.repo.with_store(|s| s.agents.push(agent.clone()));
        agent
    }

    pub fn stock_of(&self, product_id: Uuid) -> i32 {
        self.repo.with_store(|s| {
            s.products
                .iter()
                .find(|p| p.id == product_id)
                .map(|p| p.stock)
                .unwrap()
        })
    }
}

/// Serves the real router over the in-memory repository on an ephemeral port.
pub async fn spawn_app() -> TestApp {
    let repo = Arc::new(MemoryRepository::new());
    let config = AppConfig::default();

    let state = AppState {
        repo: repo.clone() as RepositoryState,
        config: config.clone(),
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        repo,
        config,
        client: reqwest::Client::new(),
    }
}
