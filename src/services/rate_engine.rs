// src/services/rate_engine.rs
use crate::models::{CalculationResult, EngineRequest, EngineResponse, PrimaryResult};
use crate::services::calculations::round_half_up;
use async_trait::async_trait;
use log::{error, info, warn};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use std::error::Error;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// The opaque service that derives a blended rate and the complementary
/// amount. Failures come back as a response carrying `error`, never as a
/// panic or `Err`.
#[async_trait]
pub trait RateEngine: Send + Sync {
    async fn compute(&self, request: &EngineRequest) -> EngineResponse;
}

#[derive(Debug)]
pub enum EngineError {
    Transport(reqwest::Error),
    ClientStatus { status: StatusCode, body: String },
    ServerStatus { status: StatusCode, body: String },
    Decode { body: String, source: serde_json::Error },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EngineError::Transport(e) => write!(f, "transport error: {}", e),
            EngineError::ClientStatus { status, body } => write!(f, "client error {}: {}", status, body),
            EngineError::ServerStatus { status, body } => write!(f, "server error {}: {}", status, body),
            EngineError::Decode { body, source } => write!(f, "undecodable response ({}): {}", source, body),
        }
    }
}

impl Error for EngineError {}

impl EngineError {
    fn into_response(self) -> EngineResponse {
        let (error, details) = match self {
            EngineError::ClientStatus { status, body } => (
                "Failed to parse rate engine client error response.",
                format!("{}: {}", status, body),
            ),
            EngineError::ServerStatus { status, body } => (
                "Rate engine internal server error.",
                format!("{}: {}", status, body),
            ),
            other => (
                "An unexpected error occurred while calling the rate engine.",
                other.to_string(),
            ),
        };
        EngineResponse {
            error: Some(error.to_string()),
            details: Some(details),
            ..Default::default()
        }
    }
}

pub struct HttpRateEngine {
    client: Client,
    url: String,
}

impl HttpRateEngine {
    /// No timeout is applied unless one is given.
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(HttpRateEngine {
            client: builder.build()?,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, request: &EngineRequest) -> Result<EngineResponse, EngineError> {
        let resp = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(EngineError::Transport)?;
        let status = resp.status();
        let body = resp.text().await.map_err(EngineError::Transport)?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|source| EngineError::Decode { body, source });
        }
        if status.is_client_error() {
            // Validation failures come back as a structured engine response.
            return match serde_json::from_str::<EngineResponse>(&body) {
                Ok(parsed) if parsed.error.is_some() => Ok(parsed),
                _ => Err(EngineError::ClientStatus { status, body }),
            };
        }
        Err(EngineError::ServerStatus { status, body })
    }
}

#[async_trait]
impl RateEngine for HttpRateEngine {
    async fn compute(&self, request: &EngineRequest) -> EngineResponse {
        info!(
            "Calling rate engine {} with operation {} for {} years",
            self.url, request.operation, request.time_in_years
        );
        match self.post(request).await {
            Ok(response) => response,
            Err(e) => {
                error!("Rate engine call failed for operation {}: {}", request.operation, e);
                e.into_response()
            }
        }
    }
}

/// Parses "12.5%" (or "12.5") into 0.125, rounded half-up to 4dp.
pub fn parse_percentage(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim().trim_end_matches('%').trim();
    if trimmed.is_empty() {
        return None;
    }
    match Decimal::from_str(trimmed) {
        Ok(value) => Some(round_half_up(value / Decimal::ONE_HUNDRED, 4)),
        Err(e) => {
            warn!("Failed to parse percentage string: {} - {}", raw, e);
            None
        }
    }
}

impl From<EngineResponse> for CalculationResult {
    fn from(response: EngineResponse) -> Self {
        if response.error.as_deref().map_or(false, |e| !e.is_empty()) {
            return CalculationResult {
                error: response.error,
                details: response.details,
                ..Default::default()
            };
        }

        let primary = match (
            response.monthly_sip_required_best_weighted_case,
            response.calculated_future_value,
        ) {
            (Some(sip), _) => Some(PrimaryResult::RequiredMonthlySip(sip)),
            (None, Some(fv)) => Some(PrimaryResult::ProjectedFutureValue(fv)),
            (None, None) => {
                warn!("Rate engine response was successful but contained no primary calculation result");
                None
            }
        };

        CalculationResult {
            blended_annual_rate: response
                .calculated_best_weighted_annual_rate
                .as_deref()
                .and_then(parse_percentage),
            primary,
            rate_breakdown: response.rate_breakdown.unwrap_or_default(),
            error: None,
            details: response.details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CalculationOperation, CalculationRequest};
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    #[test]
    fn parses_percentage_strings() {
        assert_eq!(parse_percentage("12%"), Some(dec!(0.12)));
        assert_eq!(parse_percentage(" 13.456 % "), Some(dec!(0.1346)));
        assert_eq!(parse_percentage("9.5"), Some(dec!(0.095)));
        assert_eq!(parse_percentage("n/a"), None);
        assert_eq!(parse_percentage(""), None);
    }

    #[test]
    fn engine_request_carries_only_the_operation_amount() {
        let request = EngineRequest::for_calculation(&CalculationRequest {
            operation: CalculationOperation::SipFromFutureValue,
            horizon_years: 3,
            amount: dec!(50000),
        });
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["operation"], "calculate_sip_from_fv");
        assert_eq!(json["time_in_years"], 3);
        assert_eq!(json["future_value"].as_f64(), Some(50000.0));
        assert!(json.get("monthly_sip_amount").is_none());

        let request = EngineRequest::for_calculation(&CalculationRequest {
            operation: CalculationOperation::FutureValueFromSip,
            horizon_years: 2,
            amount: dec!(2500.5),
        });
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["operation"], "calculate_fv_from_sip");
        assert_eq!(json["monthly_sip_amount"].as_f64(), Some(2500.5));
        assert!(json.get("future_value").is_none());
    }

    #[test]
    fn successful_response_becomes_tagged_primary() {
        let body = r#"{
            "calculated_best_weighted_annual_rate": "12.00%",
            "monthly_sip_required_best_weighted_case": 14547.86,
            "rate_breakdown": {"Bank Savings Products": 0.07, "Mutual funds": 0.38}
        }"#;
        let response: EngineResponse = serde_json::from_str(body).unwrap();
        let result = CalculationResult::from(response);

        assert!(result.is_success());
        assert_eq!(result.blended_annual_rate, Some(dec!(0.12)));
        assert_eq!(result.primary, Some(PrimaryResult::RequiredMonthlySip(dec!(14547.86))));
        assert_eq!(result.rate_breakdown.get("Mutual funds"), Some(&dec!(0.38)));
    }

    #[test]
    fn projected_value_response() {
        let response = EngineResponse {
            calculated_best_weighted_annual_rate: Some("10%".to_string()),
            calculated_future_value: Some(dec!(63351.41)),
            ..Default::default()
        };
        let result = CalculationResult::from(response);
        assert_eq!(result.projected_future_value(), Some(dec!(63351.41)));
        assert_eq!(result.required_monthly_sip(), None);
    }

    #[test]
    fn error_response_drops_partial_results() {
        let mut breakdown = BTreeMap::new();
        breakdown.insert("Gold".to_string(), dec!(0.2));
        let response = EngineResponse {
            calculated_future_value: Some(dec!(1)),
            rate_breakdown: Some(breakdown),
            error: Some("Invalid time period".to_string()),
            details: Some("time_in_years must be 1-5".to_string()),
            ..Default::default()
        };
        let result = CalculationResult::from(response);

        assert!(!result.is_success());
        assert_eq!(result.primary, None);
        assert!(result.rate_breakdown.is_empty());
        assert_eq!(result.details.as_deref(), Some("time_in_years must be 1-5"));
    }

    #[test]
    fn empty_response_has_no_primary() {
        let result = CalculationResult::from(EngineResponse::default());
        assert!(result.is_success());
        assert_eq!(result.primary, None);
        assert_eq!(result.blended_annual_rate, None);
    }
}
