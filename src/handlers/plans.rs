// src/handlers/plans.rs
use super::error::ApiError;
use crate::models::{GoalPlan, PlanInput};
use crate::services::planner::{GoalPlanner, PlanError};
use log::{info, log, Level};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::Rejection;

#[derive(Debug, Deserialize)]
pub struct GoalPlanRequest {
    pub time_period_years: Option<i32>,
    pub future_value: Option<Decimal>,
    pub goal_label: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WhatIfRequest {
    pub time_period_years: Option<i32>,
    pub monthly_sip_amount: Option<Decimal>,
    pub original_target_future_value: Option<Decimal>,
    pub goal_label: Option<String>,
}

fn created(plan: &GoalPlan) -> WithStatus<Json> {
    warp::reply::with_status(warp::reply::json(plan), StatusCode::CREATED)
}

/// Bad input is the caller's problem; only store failures are server errors.
fn log_level(err: &PlanError) -> Level {
    match err {
        PlanError::InvalidInput(_) => Level::Warn,
        PlanError::Storage(_) => Level::Error,
    }
}

fn reject(err: PlanError) -> Rejection {
    log!(log_level(&err), "Plan request failed: {}", err);
    warp::reject::custom(ApiError::from(err))
}

pub async fn create_goal_plan(
    body: GoalPlanRequest,
    planner: Arc<GoalPlanner>,
) -> Result<WithStatus<Json>, Rejection> {
    info!(
        "Handling goal plan request: future value {:?} over {:?} years",
        body.future_value, body.time_period_years
    );
    let input = PlanInput {
        horizon_years: body.time_period_years,
        amount: body.future_value,
        original_target_future_value: None,
        goal_label: body.goal_label,
    };
    let plan = planner.plan_for_target(input).await.map_err(reject)?;
    Ok(created(&plan))
}

pub async fn create_what_if_plan(
    body: WhatIfRequest,
    planner: Arc<GoalPlanner>,
) -> Result<WithStatus<Json>, Rejection> {
    info!(
        "Handling what-if plan request: monthly SIP {:?} over {:?} years",
        body.monthly_sip_amount, body.time_period_years
    );
    let input = PlanInput {
        horizon_years: body.time_period_years,
        amount: body.monthly_sip_amount,
        original_target_future_value: body.original_target_future_value,
        goal_label: body.goal_label,
    };
    let plan = planner.plan_for_contribution(input).await.map_err(reject)?;
    Ok(created(&plan))
}

async fn find_plan(id: Uuid, planner: &GoalPlanner) -> Result<GoalPlan, Rejection> {
    planner
        .get_plan(id)
        .await
        .map_err(reject)?
        .ok_or_else(|| warp::reject::custom(ApiError::not_found(format!("Plan {} not found", id))))
}

pub async fn get_plan(id: Uuid, planner: Arc<GoalPlanner>) -> Result<Json, Rejection> {
    info!("Handling request to get plan {}", id);
    let plan = find_plan(id, &planner).await?;
    Ok(warp::reply::json(&plan))
}

pub async fn get_plan_suggestions(id: Uuid, planner: Arc<GoalPlanner>) -> Result<Json, Rejection> {
    info!("Handling request to get allocation suggestions for plan {}", id);
    let plan = find_plan(id, &planner).await?;
    Ok(warp::reply::json(&plan.allocation))
}
