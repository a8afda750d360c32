//! Academy server - courses, progress tracking and content approval API

pub mod approval;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod progress;
pub mod routes;
pub mod seed;
pub mod store;
pub mod validation;
pub mod views;

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::auth::JwtService;

/// Application state shared across handlers
pub struct AppState {
    pub store: store::Store,
    pub jwt: JwtService,
    pub bcrypt_cost: u32,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtService, bcrypt_cost: u32) -> Arc<Self> {
        Arc::new(Self {
            store: store::Store::new(pool),
            jwt,
            bcrypt_cost,
        })
    }

    pub fn from_config(pool: SqlitePool, config: &config::Config) -> Arc<Self> {
        Self::new(
            pool,
            JwtService::new(&config.jwt_secret, config.jwt_ttl_hours),
            config.bcrypt_cost,
        )
    }
}
