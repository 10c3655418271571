// src/services/allocation.rs
use crate::models::{AllocationSuggestion, InstrumentCategory};
use crate::services::calculations::round_half_up;
use crate::services::catalog::InstrumentCatalog;
use log::{debug, warn};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

/// A share of the monthly contribution and the categories competing for it.
struct Sleeve {
    categories: &'static [InstrumentCategory],
    share: Decimal,
}

// Fixed 50/30/20 split. Shares are never renormalized when a sleeve has no
// instrument for the horizon.
fn sleeves() -> [Sleeve; 3] {
    [
        Sleeve {
            categories: &[InstrumentCategory::BankSavings],
            share: dec!(0.50),
        },
        Sleeve {
            categories: &[InstrumentCategory::MutualFund],
            share: dec!(0.30),
        },
        Sleeve {
            categories: &[InstrumentCategory::Equity, InstrumentCategory::Gold],
            share: dec!(0.20),
        },
    ]
}

#[derive(Debug, Clone)]
pub struct AllocationEngine {
    catalog: Arc<InstrumentCatalog>,
}

impl AllocationEngine {
    pub fn new(catalog: Arc<InstrumentCatalog>) -> Self {
        AllocationEngine { catalog }
    }

    pub fn catalog(&self) -> &InstrumentCatalog {
        &self.catalog
    }

    /// Splits `total_monthly_sip` across the best instrument of each sleeve
    /// for the horizon. Output is sorted by category label and holds 0-3
    /// entries; each amount is rounded independently.
    pub fn allocate(
        &self,
        total_monthly_sip: Decimal,
        horizon_years: Option<u8>,
    ) -> Vec<AllocationSuggestion> {
        if total_monthly_sip <= Decimal::ZERO {
            warn!("Monthly SIP {} is not positive. Cannot provide allocated suggestions.", total_monthly_sip);
            return Vec::new();
        }
        let horizon_years = match horizon_years {
            Some(years) => years,
            None => {
                warn!("Time period is missing. Cannot provide allocated suggestions.");
                return Vec::new();
            }
        };

        let mut suggestions: Vec<AllocationSuggestion> = sleeves()
            .iter()
            .filter_map(|sleeve| {
                let best = self.catalog.best_among(sleeve.categories, horizon_years);
                if best.is_none() {
                    debug!(
                        "No instrument in {:?} for {} years; sleeve left unallocated",
                        sleeve.categories, horizon_years
                    );
                }
                best.map(|instrument| AllocationSuggestion {
                    category: instrument.category,
                    instrument_name: instrument.name.clone(),
                    description: instrument.description.clone(),
                    horizon_years: instrument.horizon_years,
                    annual_rate: instrument.annual_rate,
                    allocated_monthly_sip: round_half_up(total_monthly_sip * sleeve.share, 2),
                })
            })
            .collect();

        suggestions.sort_by(|a, b| a.category.label().cmp(b.category.label()));
        suggestions
    }
}
