// src/handlers/schemes.rs
use super::error::ApiError;
use crate::models::Instrument;
use crate::services::catalog::{MAX_HORIZON_YEARS, MIN_HORIZON_YEARS};
use crate::services::planner::GoalPlanner;
use log::info;
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

pub async fn get_schemes(planner: Arc<GoalPlanner>) -> Result<Json, Rejection> {
    info!("Handling request to list all schemes.");
    let catalog = planner.allocation().catalog();
    Ok(warp::reply::json(&catalog.instruments()))
}

pub async fn get_schemes_for_year(years: i32, planner: Arc<GoalPlanner>) -> Result<Json, Rejection> {
    info!("Handling request to list schemes for {} years.", years);
    if !(MIN_HORIZON_YEARS as i32..=MAX_HORIZON_YEARS as i32).contains(&years) {
        return Err(warp::reject::custom(ApiError::invalid_input(format!(
            "Year must be between {} and {}.",
            MIN_HORIZON_YEARS, MAX_HORIZON_YEARS
        ))));
    }
    let schemes: Vec<&Instrument> = planner.allocation().catalog().for_horizon(years as u8).collect();
    Ok(warp::reply::json(&schemes))
}
