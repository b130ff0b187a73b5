//! Pricing, settlement and commission rules.
//!
//! Everything here is pure: handlers load the rows, these functions decide the numbers,
//! and the repository persists the result in one transaction.

use std::collections::HashMap;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{CommissionType, CreateSaleRequest, Payment, PaymentType, Product, Sale, SaleItem},
};

/// Rows to insert for a new sale. `payment` is present when the sale is settled up front.
#[derive(Debug, Clone)]
pub struct SaleDraft {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub payment: Option<Payment>,
}

/// New paid/remaining state of a sale after a payment. `previous_paid` guards the
/// update against a concurrent payment.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub previous_paid: BigDecimal,
    pub paid_amount: BigDecimal,
    pub remaining_amount: BigDecimal,
    pub is_paid: bool,
}

fn zero() -> BigDecimal {
    BigDecimal::from(0)
}

/// Rounds a monetary value to cents.
pub fn round_money(value: &BigDecimal) -> BigDecimal {
    value.round(2).with_scale(2)
}

pub fn ensure_non_negative(field: &str, value: &BigDecimal) -> AppResult<()> {
    if *value < zero() {
        return Err(AppError::validation(format!("{field} must not be negative")));
    }
    Ok(())
}

/// Money columns are `NUMERIC(18,2)`: anything at or above 10^16 does not fit.
fn money_ceiling() -> BigDecimal {
    BigDecimal::from(10_i64.pow(16))
}

/// Non-negative and storable in a money column.
pub fn ensure_money_in_range(field: &str, value: &BigDecimal) -> AppResult<()> {
    ensure_non_negative(field, value)?;
    if *value >= money_ceiling() {
        return Err(AppError::validation(format!("{field} is too large")));
    }
    Ok(())
}

fn short_code() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

/// `INV-YYYYMMDD-XXXXXXXX`
pub fn invoice_number(now: DateTime<Utc>) -> String {
    format!("INV-{}-{}", now.format("%Y%m%d"), short_code())
}

/// `SR-YYYYMMDD-XXXXXXXX`
pub fn request_number(now: DateTime<Utc>) -> String {
    format!("SR-{}-{}", now.format("%Y%m%d"), short_code())
}

/// price_sale
///
/// Builds the sale, its line items and the up-front payment from a request and the
/// current product rows.
///
/// * Unknown products and non-positive quantities are validation errors.
/// * Requested quantities (summed per product) above stock are a conflict.
/// * Unit price defaults to the product's sale price.
/// * Cash and card sales are paid in full; credit sales start with nothing paid.
pub fn price_sale(
    req: &CreateSaleRequest,
    products: &[Product],
    now: DateTime<Utc>,
) -> AppResult<SaleDraft> {
    if req.items.is_empty() {
        return Err(AppError::validation("A sale needs at least one item"));
    }

    let by_id: HashMap<Uuid, &Product> = products.iter().map(|p| (p.id, p)).collect();
    let sale_id = Uuid::new_v4();
    let mut requested: HashMap<Uuid, i64> = HashMap::new();
    let mut items = Vec::with_capacity(req.items.len());
    let mut total = zero();

    for line in &req.items {
        let product = by_id
            .get(&line.product_id)
            .ok_or_else(|| AppError::validation(format!("Product {} not found", line.product_id)))?;

        if line.quantity < 1 {
            return Err(AppError::validation("Quantity must be at least 1"));
        }

        // unit_price * quantity == total_price must hold on the stored row.
        let unit_price = round_money(line.unit_price.as_ref().unwrap_or(&product.sale_price));
        ensure_money_in_range("Unit price", &unit_price)?;

        let total_price = round_money(&(&unit_price * BigDecimal::from(line.quantity)));
        total = &total + &total_price;
        *requested.entry(product.id).or_insert(0) += i64::from(line.quantity);

        items.push(SaleItem {
            id: Uuid::new_v4(),
            sale_id,
            product_id: product.id,
            quantity: line.quantity,
            unit_price,
            total_price,
            created_at: now,
            updated_at: None,
        });
    }

    for (product_id, quantity) in &requested {
        let product = by_id[product_id];
        if *quantity > i64::from(product.stock) {
            return Err(AppError::conflict(format!(
                "Insufficient stock for {}: requested {}, available {}",
                product.name, quantity, product.stock
            )));
        }
    }

    let total = round_money(&total);
    ensure_money_in_range("Sale total", &total)?;
    let paid = match req.payment_type {
        PaymentType::Credit => zero(),
        PaymentType::Cash | PaymentType::Card => total.clone(),
    };
    let remaining = round_money(&(&total - &paid));
    let is_paid = remaining <= zero();

    let payment = (paid > zero()).then(|| Payment {
        id: Uuid::new_v4(),
        sale_id,
        amount: paid.clone(),
        payment_type: req.payment_type,
        payment_date: now,
        reference: None,
        created_at: now,
        updated_at: None,
    });

    let sale = Sale {
        id: sale_id,
        invoice_number: invoice_number(now),
        customer_id: req.customer_id,
        agent_id: req.agent_id,
        total_amount: total,
        paid_amount: paid,
        remaining_amount: remaining,
        payment_type: req.payment_type,
        sale_date: now,
        is_paid,
        created_at: now,
        updated_at: None,
    };

    Ok(SaleDraft { sale, items, payment })
}

/// apply_payment
///
/// Validates `amount` against what is still owed and returns the settled state.
pub fn apply_payment(sale: &Sale, amount: &BigDecimal) -> AppResult<Settlement> {
    if *amount <= zero() {
        return Err(AppError::validation("Payment amount must be greater than zero"));
    }
    if sale.is_paid {
        return Err(AppError::validation("Sale is already fully paid"));
    }
    if *amount > sale.remaining_amount {
        return Err(AppError::validation(format!(
            "Payment exceeds remaining amount of {}",
            sale.remaining_amount
        )));
    }

    let paid_amount = round_money(&(&sale.paid_amount + amount));
    let remaining_amount = round_money(&(&sale.total_amount - &paid_amount));
    let is_paid = remaining_amount <= zero();

    Ok(Settlement {
        previous_paid: sale.paid_amount.clone(),
        paid_amount,
        remaining_amount,
        is_paid,
    })
}

/// commission_amount
///
/// * `PercentageOfSale`: `total * rate / 100`
/// * `PercentageOfProfit`: `max(total - cost, 0) * rate / 100`
/// * `FixedAmount`: `rate`
pub fn commission_amount(
    commission_type: CommissionType,
    rate: &BigDecimal,
    sale_total: &BigDecimal,
    sale_cost: &BigDecimal,
) -> AppResult<BigDecimal> {
    if *rate <= zero() {
        return Err(AppError::validation("Commission rate must be greater than zero"));
    }
    ensure_money_in_range("Commission rate", rate)?;

    let hundred = BigDecimal::from(100);
    let amount = match commission_type {
        CommissionType::PercentageOfSale => {
            if *rate > hundred {
                return Err(AppError::validation("Commission percentage cannot exceed 100"));
            }
            sale_total * rate / &hundred
        }
        CommissionType::PercentageOfProfit => {
            if *rate > hundred {
                return Err(AppError::validation("Commission percentage cannot exceed 100"));
            }
            let profit = sale_total - sale_cost;
            let profit = if profit < zero() { zero() } else { profit };
            profit * rate / &hundred
        }
        CommissionType::FixedAmount => rate.clone(),
    };

    Ok(round_money(&amount))
}
