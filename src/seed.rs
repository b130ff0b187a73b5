//! Default accounts and sample data for a fresh database.

use bigdecimal::BigDecimal;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{Agent, Customer, Product, User, UserRole},
    password::hash_password,
    repository::RepositoryState,
};

fn money(units: i64) -> BigDecimal {
    BigDecimal::from(units).with_scale(2)
}

fn seed_user(name: &str, email: &str, password: &str, role: UserRole) -> AppResult<User> {
    Ok(User {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: email.to_string(),
        password_hash: hash_password(password)?,
        role,
        is_active: true,
        created_at: Utc::now(),
        updated_at: None,
    })
}

/// seed_if_empty
///
/// Inserts the default admin and agent accounts, the agent record, two customers and two
/// products. Does nothing once any user exists. Returns whether data was inserted.
pub async fn seed_if_empty(repo: &RepositoryState) -> AppResult<bool> {
    if repo.count_users().await? > 0 {
        tracing::debug!("users present, skipping seed");
        return Ok(false);
    }

    let now = Utc::now();

    repo.create_user(seed_user("Admin User", "admin@crm.com", "Admin@123", UserRole::Admin)?)
        .await?;
    let agent_user = repo
        .create_user(seed_user("Agent User", "agent@crm.com", "Agent@123", UserRole::Agent)?)
        .await?;

    repo.create_agent(Agent {
        id: Uuid::new_v4(),
        user_id: agent_user.id,
        balance: money(1000),
        assigned_licenses: 10,
        sold_licenses: 0,
        created_at: now,
        updated_at: None,
    })
    .await?;

    let customers = [
        ("TechCorp Inc", "info@techcorp.com", "+1234567890", "123 Tech Street, Silicon Valley, CA"),
        ("Digital Solutions Ltd", "contact@digitalsolutions.com", "+0987654321", "456 Digital Ave, London, UK"),
    ];
    for (name, email, phone, address) in customers {
        repo.create_customer(Customer {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            address: Some(address.to_string()),
            total_purchases: money(0),
            created_at: now,
            updated_at: None,
        })
        .await?;
    }

    let products = [
        ("CRM Software License", "Professional CRM software license", "Software", 50, 99, 100, 10),
        ("Support Package", "Annual support and maintenance", "Service", 100, 199, 50, 5),
    ];
    for (name, description, category, cost, price, stock, min_stock) in products {
        repo.create_product(Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: Some(description.to_string()),
            category: category.to_string(),
            cost_price: money(cost),
            sale_price: money(price),
            stock,
            min_stock,
            created_at: now,
            updated_at: None,
        })
        .await?;
    }

    tracing::info!("seeded default users, agent, customers and products");
    Ok(true)
}
