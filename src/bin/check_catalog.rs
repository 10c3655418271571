// src/bin/check_catalog.rs
use dotenv::dotenv;
use log::info;
use sip_goal_planner::models::InstrumentCategory;
use sip_goal_planner::services::allocation::AllocationEngine;
use sip_goal_planner::services::catalog::{InstrumentCatalog, MAX_HORIZON_YEARS, MIN_HORIZON_YEARS};
use rust_decimal_macros::dec;
use std::env;
use std::sync::Arc;

// Usage: check_catalog [path.csv]  (defaults to INSTRUMENT_CATALOG_CSV, then the built-in table)
fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let path = env::args().nth(1).or_else(|| env::var("INSTRUMENT_CATALOG_CSV").ok());
    let catalog = match path {
        Some(path) => {
            info!("Loading catalog from {}", path);
            InstrumentCatalog::from_csv_path(&path)?
        }
        None => {
            info!("No catalog path given, checking the built-in catalog");
            InstrumentCatalog::seeded()
        }
    };
    println!("{} instruments", catalog.len());

    for years in MIN_HORIZON_YEARS..=MAX_HORIZON_YEARS {
        println!("{} year(s):", years);
        for category in InstrumentCategory::ALL {
            match catalog.select_best_instrument(category, years) {
                Some(best) => println!("  {:<22} {} @ {}", category.label(), best.name, best.annual_rate),
                None => println!("  {:<22} -", category.label()),
            }
        }
    }

    let engine = AllocationEngine::new(Arc::new(catalog));
    println!("Allocation of 10000/month:");
    for years in MIN_HORIZON_YEARS..=MAX_HORIZON_YEARS {
        let split: Vec<String> = engine
            .allocate(dec!(10000), Some(years))
            .iter()
            .map(|s| format!("{} {}", s.instrument_name, s.allocated_monthly_sip))
            .collect();
        println!("  {}y: {}", years, split.join(", "));
    }
    Ok(())
}
