use std::sync::Arc;

use crate::{
    calendar::BusinessCalendar,
    config::AppConfig,
    db::{DbPool, OrmConn},
    notify::Notifier,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub calendar: BusinessCalendar,
    pub notifier: Notifier,
}

impl AppState {
    pub fn new(config: AppConfig, pool: DbPool, notifier: Notifier) -> Self {
        let orm = crate::db::orm_from_pool(pool.clone());
        let calendar = BusinessCalendar::new(config.business_utc_offset_hours);
        Self {
            pool,
            orm,
            config: Arc::new(config),
            calendar,
            notifier,
        }
    }
}
