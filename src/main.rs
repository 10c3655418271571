// src/main.rs
use anyhow::{Context, Result};
use dotenv::dotenv;
use log::{info, warn};
use sip_goal_planner::config::AppConfig;
use sip_goal_planner::routes;
use sip_goal_planner::services::catalog::InstrumentCatalog;
use sip_goal_planner::services::db::{MemoryStore, SqliteStore};
use sip_goal_planner::services::rate_engine::HttpRateEngine;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::Filter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();
    info!("Logger initialized. Starting the application...");

    let config = AppConfig::from_env()?;

    let catalog = match &config.catalog_csv {
        Some(path) => InstrumentCatalog::from_csv_path(path)
            .with_context(|| format!("Failed to load instrument catalog from {}", path.display()))?,
        None => {
            info!("INSTRUMENT_CATALOG_CSV not set, using built-in catalog");
            InstrumentCatalog::seeded()
        }
    };
    info!("Instrument catalog holds {} instruments", catalog.len());

    let engine = HttpRateEngine::new(config.rate_engine_url.clone(), config.rate_engine_timeout)
        .context("Failed to build rate engine client")?;
    let engine = Arc::new(engine);
    let planner = match &config.database_url {
        Some(url) => {
            let store = SqliteStore::connect(url)
                .await
                .with_context(|| format!("Failed to open database {}", url))?;
            sip_goal_planner::build_planner(catalog, engine, Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL not set, cached calculations and plans will not survive a restart");
            sip_goal_planner::build_planner(catalog, engine, Arc::new(MemoryStore::new()))
        }
    };

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    info!("Will bind to: {}", addr);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_header("content-type")
        .allow_methods(vec!["GET", "POST"]);

    let api = routes::routes(planner).with(cors);
    info!("Routes configured successfully with CORS.");

    info!("Starting server on {}", addr);
    warp::serve(api).run(addr).await;
    Ok(())
}
