use std::sync::Arc;

use axum::extract::State;
use fulfillment_engine::{
    config::AppConfig,
    db::create_pool,
    notify::{Notifier, TracingSink},
    routes::health::health_check,
    state::AppState,
};

#[tokio::test]
async fn health_check_reports_database() -> anyhow::Result<()> {
    let Ok(database_url) = std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL"))
    else {
        eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run the health check.");
        return Ok(());
    };

    let pool = create_pool(&database_url, 1).await?;
    let notifier = Notifier::spawn(8, Arc::new(TracingSink));
    let state = AppState::new(AppConfig::for_database(&database_url), pool, notifier);

    let response = health_check(State(state)).await;
    assert_eq!(response.0.message, "Health check");

    let data = response.0.data.expect("health data");
    assert_eq!(data.status, "ok");
    assert_eq!(data.database, "ok");
    Ok(())
}
