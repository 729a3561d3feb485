// src/state.rs

use crate::{config::Config, models::order::TransitionPolicy};
use axum::extract::FromRef;
use sqlx::PgPool;

/// Shared request state: the connection pool plus immutable configuration.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        Self { pool, config }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for TransitionPolicy {
    fn from_ref(state: &AppState) -> Self {
        TransitionPolicy::from_strict(state.config.strict_status_transitions)
    }
}
