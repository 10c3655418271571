// src/lib.rs

pub mod config;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

use services::allocation::AllocationEngine;
use services::cache::CalculationCache;
use services::catalog::InstrumentCatalog;
use services::db::{CalculationStore, PlanStore};
use services::planner::GoalPlanner;
use services::rate_engine::RateEngine;
use std::sync::Arc;

/// Wires a planner whose cache entries and plan records share one store.
pub fn build_planner<S>(catalog: InstrumentCatalog, engine: Arc<dyn RateEngine>, store: Arc<S>) -> Arc<GoalPlanner>
where
    S: CalculationStore + PlanStore + 'static,
{
    Arc::new(GoalPlanner::new(
        CalculationCache::new(store.clone()),
        engine,
        AllocationEngine::new(Arc::new(catalog)),
        store,
    ))
}
