#![allow(dead_code)]

use std::sync::Arc;

use fulfillment_engine::{
    access::Actor,
    config::AppConfig,
    db::{DbPool, create_pool, run_migrations},
    dto::orders::StatusChangeRequest,
    notify::{NotificationEvent, Notifier, TracingSink},
    state::AppState,
    workflow::OrderStatus,
};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use uuid::Uuid;

/// `None` (after saying so) when no database is configured.
pub fn database_url() -> Option<String> {
    match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
        Ok(url) => Some(url),
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            None
        }
    }
}

pub async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = prepare_pool(database_url).await?;
    let notifier = Notifier::spawn(64, Arc::new(TracingSink));
    Ok(AppState::new(AppConfig::for_database(database_url), pool, notifier))
}

/// Like [`setup_state`], but events stay queued for the test to read.
pub async fn setup_state_with_events(
    database_url: &str,
) -> anyhow::Result<(AppState, mpsc::Receiver<NotificationEvent>)> {
    let pool = prepare_pool(database_url).await?;
    let (notifier, events) = Notifier::channel(256);
    Ok((
        AppState::new(AppConfig::for_database(database_url), pool, notifier),
        events,
    ))
}

async fn prepare_pool(database_url: &str) -> anyhow::Result<DbPool> {
    let pool = create_pool(database_url, 5).await?;
    run_migrations(&pool).await?;
    reset(&pool).await?;
    Ok(pool)
}

/// Clean tables between runs; roles and permissions come from the migrations.
pub async fn reset(pool: &DbPool) -> anyhow::Result<()> {
    sqlx::query(
        "TRUNCATE TABLE audit_logs, order_workflow_logs, order_assignments, order_items, orders, \
         product_deletion_requests, products, agent_sessions, user_roles",
    )
    .execute(pool)
    .await?;
    sqlx::query("DELETE FROM users").execute(pool).await?;
    Ok(())
}

pub async fn create_user(pool: &DbPool, email: &str, role: &str) -> anyhow::Result<Actor> {
    let user_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO users (id, email, full_name, approval_status) VALUES ($1, $2, $2, 'approved')",
    )
    .bind(user_id)
    .bind(email)
    .execute(pool)
    .await?;
    sqlx::query(
        "INSERT INTO user_roles (id, user_id, role_id, is_primary) \
         SELECT $1, $2, r.id, TRUE FROM roles r WHERE r.name = $3",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(role)
    .execute(pool)
    .await?;

    let mut actor = Actor::new(user_id, &[role]);
    actor.email = email.to_string();
    Ok(actor)
}

pub async fn create_product(
    pool: &DbPool,
    code: &str,
    name: &str,
    seller_id: Uuid,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO products (id, code, name_en, selling_price, seller_id, is_approved) \
         VALUES ($1, $2, $3, $4, $5, TRUE)",
    )
    .bind(id)
    .bind(code)
    .bind(name)
    .bind(Decimal::from(10))
    .bind(seller_id)
    .execute(pool)
    .await?;
    Ok(id)
}

/// A pending, unassigned order written straight to the table.
pub async fn insert_order(
    pool: &DbPool,
    order_code: &str,
    seller_id: Option<Uuid>,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO orders (id, order_code, customer, customer_phone, quantity, price_per_unit, \
         total_price, seller_id) VALUES ($1, $2, 'Customer', '+971501234567', 1, 10, 10, $3)",
    )
    .bind(id)
    .bind(order_code)
    .bind(seller_id)
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn insert_item(pool: &DbPool, order_id: Uuid, product_id: Uuid) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO order_items (id, order_id, product_id, quantity, price) VALUES ($1, $2, $3, 1, 10)",
    )
    .bind(Uuid::new_v4())
    .bind(order_id)
    .bind(product_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Give `order_id` to `agent_id` today, bypassing dispatch.
pub async fn assign_directly(pool: &DbPool, order_id: Uuid, agent_id: Uuid) -> anyhow::Result<()> {
    sqlx::query("UPDATE orders SET agent_id = $2, assigned_at = now() WHERE id = $1")
        .bind(order_id)
        .bind(agent_id)
        .execute(pool)
        .await?;
    sqlx::query("INSERT INTO order_assignments (id, order_id, agent_id) VALUES ($1, $2, $3)")
        .bind(Uuid::new_v4())
        .bind(order_id)
        .bind(agent_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn order_agent(pool: &DbPool, order_id: Uuid) -> anyhow::Result<Option<Uuid>> {
    let (agent_id,): (Option<Uuid>,) = sqlx::query_as("SELECT agent_id FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_one(pool)
        .await?;
    Ok(agent_id)
}

pub async fn count(pool: &DbPool, sql: &str, id: Uuid) -> anyhow::Result<i64> {
    let (count,): (i64,) = sqlx::query_as(sql).bind(id).fetch_one(pool).await?;
    Ok(count)
}

pub async fn audit_rows(pool: &DbPool, action: &str, entity_id: Uuid) -> anyhow::Result<i64> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM audit_logs WHERE action = $1 AND entity_id = $2")
            .bind(action)
            .bind(entity_id.to_string())
            .fetch_one(pool)
            .await?;
    Ok(count)
}

pub fn status_change(status: OrderStatus, reason: Option<&str>) -> StatusChangeRequest {
    StatusChangeRequest {
        status,
        cancelled_reason: reason.map(str::to_string),
        tracking_number: None,
        escalation_reason: None,
        postponed_until: None,
        call_back_time: None,
        no_answer_time: None,
        notes: None,
    }
}
