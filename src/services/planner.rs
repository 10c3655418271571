// src/services/planner.rs
use crate::models::{
    AllocationSuggestion, CalculationOperation, CalculationRequest, CalculationResult, GoalPlan, PlanInput,
    Projection, Recommendation,
};
use crate::services::allocation::AllocationEngine;
use crate::services::cache::CalculationCache;
use crate::services::calculations::{checked_future_value_from_sip, months_to_achieve_goal, sip_from_future_value};
use crate::services::catalog::{MAX_HORIZON_YEARS, MIN_HORIZON_YEARS};
use crate::services::db::PlanStore;
use crate::services::rate_engine::RateEngine;
use chrono::Utc;
use log::{error, info, warn};
use rust_decimal::Decimal;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

pub const BLENDED_PROJECTION_LABEL: &str = "Blended portfolio";

#[derive(Debug, Clone, PartialEq)]
pub enum PlanError {
    InvalidInput(String),
    Storage(String),
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PlanError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            PlanError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl Error for PlanError {}

/// Checks the input for `operation` and turns it into a calculation request.
pub fn validate(operation: CalculationOperation, input: &PlanInput) -> Result<CalculationRequest, PlanError> {
    let horizon_years = input
        .horizon_years
        .filter(|years| (MIN_HORIZON_YEARS as i32..=MAX_HORIZON_YEARS as i32).contains(years))
        .ok_or_else(|| {
            PlanError::InvalidInput(format!(
                "Time period must be between {} and {} years.",
                MIN_HORIZON_YEARS, MAX_HORIZON_YEARS
            ))
        })? as u8;

    let amount_name = match operation {
        CalculationOperation::SipFromFutureValue => "Future value",
        CalculationOperation::FutureValueFromSip => "Monthly SIP amount",
    };
    let amount = match input.amount {
        Some(amount) if amount > Decimal::ZERO => amount,
        Some(_) => return Err(PlanError::InvalidInput(format!("{} must be a positive number.", amount_name))),
        None => return Err(PlanError::InvalidInput(format!("{} is required.", amount_name))),
    };

    if let Some(target) = input.original_target_future_value {
        if target <= Decimal::ZERO {
            return Err(PlanError::InvalidInput(
                "Original target future value must be a positive number.".to_string(),
            ));
        }
    }

    Ok(CalculationRequest {
        operation,
        horizon_years,
        amount,
    })
}

pub struct GoalPlanner {
    cache: CalculationCache,
    engine: Arc<dyn RateEngine>,
    allocation: AllocationEngine,
    plans: Arc<dyn PlanStore>,
}

impl GoalPlanner {
    pub fn new(
        cache: CalculationCache,
        engine: Arc<dyn RateEngine>,
        allocation: AllocationEngine,
        plans: Arc<dyn PlanStore>,
    ) -> Self {
        GoalPlanner {
            cache,
            engine,
            allocation,
            plans,
        }
    }

    pub fn allocation(&self) -> &AllocationEngine {
        &self.allocation
    }

    /// Plan for a target corpus: how much to invest each month.
    pub async fn plan_for_target(&self, input: PlanInput) -> Result<GoalPlan, PlanError> {
        self.plan(CalculationOperation::SipFromFutureValue, input).await
    }

    /// What-if plan for a chosen monthly contribution, optionally compared
    /// against an earlier target.
    pub async fn plan_for_contribution(&self, input: PlanInput) -> Result<GoalPlan, PlanError> {
        self.plan(CalculationOperation::FutureValueFromSip, input).await
    }

    pub async fn plan(&self, operation: CalculationOperation, input: PlanInput) -> Result<GoalPlan, PlanError> {
        let request = validate(operation, &input)?;
        let original_target = match operation {
            CalculationOperation::SipFromFutureValue => Some(request.amount),
            CalculationOperation::FutureValueFromSip => input.original_target_future_value,
        };
        info!(
            "Planning {} for amount {} over {} years",
            operation, request.amount, request.horizon_years
        );

        let calculation = self.cache.get_or_compute(&request, self.engine.as_ref()).await;
        let months = request.horizon_years as i32 * 12;

        let monthly_investment = match operation {
            CalculationOperation::SipFromFutureValue => calculation.required_monthly_sip(),
            CalculationOperation::FutureValueFromSip => Some(request.amount),
        };

        let mut plan = GoalPlan {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            goal_label: input.goal_label,
            request,
            original_target_future_value: original_target,
            calculation,
            monthly_investment,
            allocation: Vec::new(),
            projections: Vec::new(),
            shortfall: Decimal::ZERO,
            recommendation: None,
        };

        if plan.calculation.is_success() {
            plan.allocation = monthly_investment
                .map(|monthly| self.allocation.allocate(monthly, Some(plan.request.horizon_years)))
                .unwrap_or_default();
            plan.projections = projections(&plan.allocation, monthly_investment, &plan.calculation, months);
            let achieved = achieved_future_value(&plan);
            plan.shortfall = shortfall(original_target, achieved);
            plan.recommendation = Some(recommend(&plan, achieved, months));
        } else {
            error!(
                "Calculation failed for plan {}: {} ({})",
                plan.id,
                plan.calculation.error.as_deref().unwrap_or_default(),
                plan.calculation.details.as_deref().unwrap_or_default()
            );
        }

        if let Err(e) = self.plans.save_plan(&plan).await {
            error!("Failed to save plan {}: {}", plan.id, e);
        }
        Ok(plan)
    }

    pub async fn get_plan(&self, id: Uuid) -> Result<Option<GoalPlan>, PlanError> {
        self.plans
            .get_plan(id)
            .await
            .map_err(|e| PlanError::Storage(e.to_string()))
    }
}

/// `max(0, target - achieved)` when both are known, otherwise zero.
pub fn shortfall(target: Option<Decimal>, achieved: Option<Decimal>) -> Decimal {
    match (target, achieved) {
        (Some(target), Some(achieved)) => (target - achieved).max(Decimal::ZERO),
        _ => Decimal::ZERO,
    }
}

/// Rows whose value overflows a `Decimal` are left out.
fn projections(
    allocation: &[AllocationSuggestion],
    monthly_investment: Option<Decimal>,
    calculation: &CalculationResult,
    months: i32,
) -> Vec<Projection> {
    let mut projections: Vec<Projection> = allocation
        .iter()
        .filter_map(|suggestion| {
            let projected_value =
                checked_future_value_from_sip(suggestion.allocated_monthly_sip, months, suggestion.annual_rate);
            if projected_value.is_none() {
                warn!("Projection for {} overflowed; row dropped", suggestion.instrument_name);
            }
            projected_value.map(|projected_value| Projection {
                label: suggestion.instrument_name.clone(),
                annual_rate: suggestion.annual_rate,
                projected_value,
            })
        })
        .collect();

    if let (Some(rate), Some(monthly)) = (calculation.blended_annual_rate, monthly_investment) {
        let projected_value = calculation
            .projected_future_value()
            .or_else(|| checked_future_value_from_sip(monthly, months, rate));
        match projected_value {
            Some(projected_value) => projections.push(Projection {
                label: BLENDED_PROJECTION_LABEL.to_string(),
                annual_rate: rate,
                projected_value,
            }),
            None => warn!("Blended projection for {}/month overflowed; row dropped", monthly),
        }
    }
    projections
}

/// The value the plan is projected to reach. A what-if plan served a
/// required-contribution result (same amount and horizon, other operation)
/// falls back to its own blended projection.
fn achieved_future_value(plan: &GoalPlan) -> Option<Decimal> {
    plan.calculation.projected_future_value().or_else(|| match plan.request.operation {
        CalculationOperation::FutureValueFromSip => plan
            .projections
            .iter()
            .find(|projection| projection.label == BLENDED_PROJECTION_LABEL)
            .map(|projection| projection.projected_value),
        CalculationOperation::SipFromFutureValue => None,
    })
}

fn recommend(plan: &GoalPlan, achieved: Option<Decimal>, months: i32) -> Recommendation {
    let target = match plan.original_target_future_value {
        Some(target) => target,
        None => {
            return Recommendation::Review {
                message: "Review your current investment plan.".to_string(),
            }
        }
    };

    if plan.shortfall > Decimal::ZERO {
        let rate = plan.calculation.blended_annual_rate.unwrap_or(Decimal::ZERO);
        let increased_monthly_sip = sip_from_future_value(target, months, rate);
        let mut message = format!(
            "Increase investment to {}/month for goal completion.",
            increased_monthly_sip
        );

        let extend_by_years = plan
            .monthly_investment
            .and_then(|monthly| months_to_achieve_goal(target, monthly, rate, months))
            .map(|needed| {
                let extra = needed.saturating_sub(months.max(0) as u32);
                (extra + 11) / 12
            });
        match extend_by_years {
            Some(0) => message.push_str(" Your current investment is projected to meet the goal within the timeline."),
            Some(years) => message.push_str(&format!(
                " Alternatively, extend your timeline by approximately {} more years at the current monthly investment.",
                years
            )),
            None => warn!(
                "Goal {} is not reachable within the search ceiling for plan {}",
                target, plan.id
            ),
        }

        return Recommendation::Shortfall {
            increased_monthly_sip,
            extend_by_years,
            message,
        };
    }

    // A required contribution meets its own target by construction.
    let reached = match plan.request.operation {
        CalculationOperation::SipFromFutureValue => {
            achieved.is_some() || plan.calculation.required_monthly_sip().is_some()
        }
        CalculationOperation::FutureValueFromSip => achieved.is_some(),
    };
    if reached {
        Recommendation::GoalMet {
            message: "Your monthly investment is projected to meet or exceed your target goal.".to_string(),
        }
    } else {
        Recommendation::Review {
            message: "Review your current investment plan.".to_string(),
        }
    }
}
