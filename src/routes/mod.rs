use axum::Router;

use crate::state::AppState;

pub mod agents;
pub mod audit;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod products;
pub mod roles;
pub mod users;

/// Every `/api` route; state is attached by the binary.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/orders", orders::router())
        .nest("/agents", agents::router())
        .nest("/products", products::router())
        .nest("/product-deletion-requests", products::deletion_router())
        .nest("/roles", roles::router())
        .nest("/permissions", roles::permission_router())
        .nest("/users", users::router())
        .nest("/audit-logs", audit::router())
}
