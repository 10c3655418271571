// src/models.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentCategory {
    BankSavings,
    MutualFund,
    Equity,
    Gold,
}

impl InstrumentCategory {
    pub const ALL: [InstrumentCategory; 4] = [
        InstrumentCategory::BankSavings,
        InstrumentCategory::MutualFund,
        InstrumentCategory::Equity,
        InstrumentCategory::Gold,
    ];

    /// Display label, also the sort key for allocation output.
    pub fn label(&self) -> &'static str {
        match self {
            InstrumentCategory::BankSavings => "Bank Savings Products",
            InstrumentCategory::MutualFund => "Mutual funds",
            InstrumentCategory::Equity => "Equity",
            InstrumentCategory::Gold => "Gold",
        }
    }

    /// Accepts either the display label or the variant name, ignoring case.
    pub fn parse(raw: &str) -> Option<Self> {
        let wanted = raw.trim();
        Self::ALL.into_iter().find(|category| {
            category.label().eq_ignore_ascii_case(wanted)
                || format!("{:?}", category).eq_ignore_ascii_case(wanted)
        })
    }
}

impl fmt::Display for InstrumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub category: InstrumentCategory,
    pub name: String,
    pub description: Option<String>,
    pub horizon_years: u8,
    pub annual_rate: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CalculationOperation {
    #[serde(rename = "calculate_sip_from_fv")]
    SipFromFutureValue,
    #[serde(rename = "calculate_fv_from_sip")]
    FutureValueFromSip,
}

impl CalculationOperation {
    pub fn wire_name(&self) -> &'static str {
        match self {
            CalculationOperation::SipFromFutureValue => "calculate_sip_from_fv",
            CalculationOperation::FutureValueFromSip => "calculate_fv_from_sip",
        }
    }

    pub fn from_wire_name(raw: &str) -> Option<Self> {
        [CalculationOperation::SipFromFutureValue, CalculationOperation::FutureValueFromSip]
            .into_iter()
            .find(|operation| operation.wire_name() == raw)
    }
}

impl fmt::Display for CalculationOperation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

/// `amount` is the target future value for `SipFromFutureValue` and the
/// monthly contribution for `FutureValueFromSip`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationRequest {
    pub operation: CalculationOperation,
    pub horizon_years: u8,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum PrimaryResult {
    RequiredMonthlySip(Decimal),
    ProjectedFutureValue(Decimal),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CalculationResult {
    pub blended_annual_rate: Option<Decimal>,
    pub primary: Option<PrimaryResult>,
    #[serde(default)]
    pub rate_breakdown: BTreeMap<String, Decimal>,
    pub error: Option<String>,
    pub details: Option<String>,
}

impl CalculationResult {
    /// An empty error string counts as no error.
    pub fn is_success(&self) -> bool {
        self.error.as_deref().map_or(true, str::is_empty)
    }

    pub fn required_monthly_sip(&self) -> Option<Decimal> {
        match self.primary {
            Some(PrimaryResult::RequiredMonthlySip(sip)) => Some(sip),
            _ => None,
        }
    }

    pub fn projected_future_value(&self) -> Option<Decimal> {
        match self.primary {
            Some(PrimaryResult::ProjectedFutureValue(fv)) => Some(fv),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationSuggestion {
    pub category: InstrumentCategory,
    pub instrument_name: String,
    pub description: Option<String>,
    pub horizon_years: u8,
    pub annual_rate: Decimal,
    pub allocated_monthly_sip: Decimal,
}

// Wire types for the external rate engine

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineRequest {
    pub operation: CalculationOperation,
    pub time_in_years: u8,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub future_value: Option<Decimal>,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub monthly_sip_amount: Option<Decimal>,
}

impl EngineRequest {
    pub fn for_calculation(request: &CalculationRequest) -> Self {
        let (future_value, monthly_sip_amount) = match request.operation {
            CalculationOperation::SipFromFutureValue => (Some(request.amount), None),
            CalculationOperation::FutureValueFromSip => (None, Some(request.amount)),
        };
        EngineRequest {
            operation: request.operation,
            time_in_years: request.horizon_years,
            future_value,
            monthly_sip_amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineResponse {
    #[serde(default)]
    pub calculated_best_weighted_annual_rate: Option<String>,
    #[serde(default)]
    pub monthly_sip_required_best_weighted_case: Option<Decimal>,
    #[serde(default)]
    pub calculated_future_value: Option<Decimal>,
    #[serde(default)]
    pub rate_breakdown: Option<BTreeMap<String, Decimal>>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

// Cache and persistence records

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub amount: Decimal,
    pub horizon_years: u8,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "amount={}, years={}", self.amount, self.horizon_years)
    }
}

/// One appended row of the calculation store. `payload` is the serialized
/// `CalculationResult`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEntry {
    pub id: Uuid,
    pub key: CacheKey,
    pub operation: CalculationOperation,
    pub payload: String,
    pub created_at: DateTime<Utc>,
}

// Planner input and output

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanInput {
    pub horizon_years: Option<i32>,
    pub amount: Option<Decimal>,
    pub original_target_future_value: Option<Decimal>,
    pub goal_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub label: String,
    pub annual_rate: Decimal,
    pub projected_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recommendation {
    GoalMet {
        message: String,
    },
    Shortfall {
        increased_monthly_sip: Decimal,
        /// `None` when the goal cannot be reached within the search ceiling.
        extend_by_years: Option<u32>,
        message: String,
    },
    Review {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalPlan {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub goal_label: Option<String>,
    pub request: CalculationRequest,
    pub original_target_future_value: Option<Decimal>,
    pub calculation: CalculationResult,
    pub monthly_investment: Option<Decimal>,
    pub allocation: Vec<AllocationSuggestion>,
    pub projections: Vec<Projection>,
    pub shortfall: Decimal,
    pub recommendation: Option<Recommendation>,
}
