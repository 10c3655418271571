// src/routes.rs
use crate::handlers::error::ApiError;
use crate::handlers::plans::{create_goal_plan, create_what_if_plan, get_plan, get_plan_suggestions};
use crate::handlers::schemes::{get_schemes, get_schemes_for_year};
use crate::services::planner::GoalPlanner;
use log::{info, warn};
use std::convert::Infallible;
use std::sync::Arc;
use uuid::Uuid;
use warp::filters::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::reject::Rejection;
use warp::{Filter, Reply};

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message: String;

    if err.is_not_found() {
        code = StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else if let Some(api_error) = err.find::<ApiError>() {
        code = api_error.status();
        message = api_error.message.clone();
    } else if let Some(body_error) = err.find::<BodyDeserializeError>() {
        warn!("Rejected malformed request body: {}", body_error);
        code = StatusCode::BAD_REQUEST;
        message = format!("Invalid request body: {}", body_error);
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = StatusCode::METHOD_NOT_ALLOWED;
        message = "Method Not Allowed".to_string();
    } else {
        code = StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal Server Error".to_string();
    }

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": message,
        })),
        code,
    ))
}

pub fn routes(planner: Arc<GoalPlanner>) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let planner_filter = warp::any().map(move || planner.clone());

    let goal_plan_route = warp::path!("api" / "v1" / "plans" / "goal")
        .and(warp::post())
        .and(warp::body::json())
        .and(planner_filter.clone())
        .and_then(create_goal_plan);

    let what_if_route = warp::path!("api" / "v1" / "plans" / "what-if")
        .and(warp::post())
        .and(warp::body::json())
        .and(planner_filter.clone())
        .and_then(create_what_if_plan);

    let plan_route = warp::path!("api" / "v1" / "plans" / Uuid)
        .and(warp::get())
        .and(planner_filter.clone())
        .and_then(get_plan);

    let suggestions_route = warp::path!("api" / "v1" / "plans" / Uuid / "suggestions")
        .and(warp::get())
        .and(planner_filter.clone())
        .and_then(get_plan_suggestions);

    let schemes_route = warp::path!("api" / "v1" / "schemes")
        .and(warp::get())
        .and(planner_filter.clone())
        .and_then(get_schemes);

    let schemes_year_route = warp::path!("api" / "v1" / "schemes" / "year" / i32)
        .and(warp::get())
        .and(planner_filter.clone())
        .and_then(get_schemes_for_year);

    info!("All routes configured successfully.");

    goal_plan_route
        .or(what_if_route)
        .or(plan_route)
        .or(suggestions_route)
        .or(schemes_route)
        .or(schemes_year_route)
        .recover(handle_rejection)
}
