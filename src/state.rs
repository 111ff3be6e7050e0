// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::config::Config;
use crate::services::{AnalyticsService, AttemptService, GamificationService};
use crate::store::Store;

/// Shared application state: the configuration, the persistence collaborator
/// and the explicitly constructed service components.
///
/// Services are plain values injected here (no module-level singletons), so
/// tests can assemble the same state over an in-memory store.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub attempts: AttemptService,
    pub analytics: AnalyticsService,
    pub gamification: GamificationService,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        Self {
            config,
            attempts: AttemptService::new(store.clone()),
            analytics: AnalyticsService::new(store.clone()),
            gamification: GamificationService::new(store.clone()),
            store,
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<dyn Store> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for AttemptService {
    fn from_ref(state: &AppState) -> Self {
        state.attempts.clone()
    }
}

impl FromRef<AppState> for AnalyticsService {
    fn from_ref(state: &AppState) -> Self {
        state.analytics.clone()
    }
}

impl FromRef<AppState> for GamificationService {
    fn from_ref(state: &AppState) -> Self {
        state.gamification.clone()
    }
}
