// src/bin/test_rate_engine.rs
use dotenv::dotenv;
use log::{error, info};
use rust_decimal::Decimal;
use sip_goal_planner::config;
use sip_goal_planner::models::{CalculationOperation, CalculationRequest, CalculationResult, EngineRequest};
use sip_goal_planner::services::rate_engine::{HttpRateEngine, RateEngine};
use std::env;
use std::str::FromStr;

// Usage: test_rate_engine [years] [future_value]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let mut args = env::args().skip(1);
    let years: u8 = args.next().as_deref().unwrap_or("3").parse()?;
    let future_value = Decimal::from_str(args.next().as_deref().unwrap_or("500000"))?;

    let url = config::rate_engine_url()?;
    let engine = HttpRateEngine::new(url, None)?;
    info!("Testing rate engine at {}...", engine.url());

    let request = EngineRequest::for_calculation(&CalculationRequest {
        operation: CalculationOperation::SipFromFutureValue,
        horizon_years: years,
        amount: future_value,
    });
    let result = CalculationResult::from(engine.compute(&request).await);

    if !result.is_success() {
        error!(
            "ERROR: {} ({})",
            result.error.as_deref().unwrap_or_default(),
            result.details.as_deref().unwrap_or_default()
        );
        anyhow::bail!("rate engine returned an error");
    }

    println!("Blended rate:         {:?}", result.blended_annual_rate);
    println!("Required monthly SIP: {:?}", result.required_monthly_sip());
    for (label, rate) in &result.rate_breakdown {
        println!("  {:<24} {}", label, rate);
    }

    // Round-trip the SIP back through the engine.
    if let Some(sip) = result.required_monthly_sip() {
        let request = EngineRequest::for_calculation(&CalculationRequest {
            operation: CalculationOperation::FutureValueFromSip,
            horizon_years: years,
            amount: sip,
        });
        let back = CalculationResult::from(engine.compute(&request).await);
        println!("Projected value:      {:?}", back.projected_future_value());
    }
    Ok(())
}
