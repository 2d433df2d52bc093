use fulfillment_engine::{
    access::roles,
    config::AppConfig,
    db::{create_pool, run_migrations},
    middleware::auth::issue_token,
};
use rust_decimal::Decimal;
use uuid::Uuid;

const TOKEN_TTL_HOURS: i64 = 24 * 30;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url, 2).await?;
    // Roles and the baseline permission registry come with the migrations.
    run_migrations(&pool).await?;

    let accounts = [
        ("superadmin@example.com", "Super Admin", roles::SUPER_ADMIN, true),
        ("admin@example.com", "Back Office", roles::ADMIN, false),
        ("seller@example.com", "Demo Seller", roles::SELLER, false),
        ("manager@example.com", "Call Center Manager", roles::CALL_CENTER_MANAGER, false),
        ("agent1@example.com", "Agent One", roles::CALL_CENTER_AGENT, false),
        ("agent2@example.com", "Agent Two", roles::CALL_CENTER_AGENT, false),
        ("stock@example.com", "Stock Keeper", roles::STOCK_KEEPER, false),
        ("packer@example.com", "Packaging Agent", roles::PACKAGING_AGENT, false),
        ("driver@example.com", "Delivery Agent", roles::DELIVERY_AGENT, false),
        ("accounts@example.com", "Accountant", roles::ACCOUNTANT, false),
    ];

    let mut seller_id = None;
    for (email, name, role, superuser) in accounts {
        let user_id = ensure_user(&pool, email, name, superuser).await?;
        bind_primary_role(&pool, user_id, role).await?;
        if role == roles::SELLER {
            seller_id = Some(user_id);
        }
        let token = issue_token(&config.jwt_secret, user_id, TOKEN_TTL_HOURS)?;
        println!("{role:<20} {email:<24} {user_id}\n    token: {token}");
    }

    grant(&pool, roles::ACCOUNTANT, "audit_logs.read").await?;
    grant(&pool, roles::CALL_CENTER_MANAGER, "orders.assign").await?;

    if let Some(seller_id) = seller_id {
        seed_products(&pool, seller_id).await?;
    }

    println!("Seed completed");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    full_name: &str,
    superuser: bool,
) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, full_name, is_superuser, approval_status, email_verified)
        VALUES ($1, $2, $3, $4, 'approved', TRUE)
        ON CONFLICT (email) DO UPDATE SET full_name = EXCLUDED.full_name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(full_name)
    .bind(superuser)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn bind_primary_role(pool: &sqlx::PgPool, user_id: Uuid, role: &str) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_roles (id, user_id, role_id, is_primary)
        SELECT $1, $2, r.id, TRUE FROM roles r WHERE r.name = $3
        ON CONFLICT (user_id, role_id) DO UPDATE SET is_active = TRUE
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(role)
    .execute(pool)
    .await?;
    Ok(())
}

async fn grant(pool: &sqlx::PgPool, role: &str, code: &str) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO role_permissions (id, role_id, permission_id)
        SELECT $1, r.id, p.id FROM roles r, permissions p
        WHERE r.name = $2 AND p.code = $3
        ON CONFLICT (role_id, permission_id) DO UPDATE SET granted = TRUE
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(role)
    .bind(code)
    .execute(pool)
    .await?;
    Ok(())
}

async fn seed_products(pool: &sqlx::PgPool, seller_id: Uuid) -> anyhow::Result<()> {
    let products = [
        ("SKU-DEMO-0001", "Argan Hair Oil", "زيت الأرغان للشعر", Decimal::new(8900, 2)),
        ("SKU-DEMO-0002", "Oud Perfume 50ml", "عطر العود", Decimal::new(24900, 2)),
        ("SKU-DEMO-0003", "Wireless Earbuds", "سماعات لاسلكية", Decimal::new(14900, 2)),
    ];

    for (code, name_en, name_ar, price) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, code, name_en, name_ar, selling_price, stock_quantity,
                                  seller_id, created_by, is_approved, approved_at)
            VALUES ($1, $2, $3, $4, $5, 100, $6, $6, TRUE, now())
            ON CONFLICT (code) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(code)
        .bind(name_en)
        .bind(name_ar)
        .bind(price)
        .bind(seller_id)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
