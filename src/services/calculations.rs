// src/services/calculations.rs
use log::warn;
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};

/// Hard ceiling for the months-to-goal search (30 years).
pub const MAX_GOAL_SEARCH_MONTHS: u32 = 30 * 12;

const INTERMEDIATE_SCALE: u32 = 10;
const MONEY_SCALE: u32 = 2;

pub fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

fn monthly_rate(annual_rate: Decimal) -> Decimal {
    round_half_up(annual_rate / Decimal::from(12), INTERMEDIATE_SCALE)
}

/// Annuity-due factor `(((1 + i)^n - 1) / i) * (1 + i)` with `i = rate / 12`.
/// Returns `None` when an intermediate overflows.
fn annuity_due_factor(annual_rate: Decimal, months: u32) -> Option<Decimal> {
    let i = monthly_rate(annual_rate);
    if i.is_zero() {
        // Rate too small to survive 10dp rounding; the factor degenerates to n.
        return Some(Decimal::from(months));
    }
    let one_plus_i = Decimal::ONE + i;
    let growth = one_plus_i.checked_powu(u64::from(months))?;
    let accumulated = growth.checked_sub(Decimal::ONE)?.checked_div(i)?;
    round_half_up(accumulated, INTERMEDIATE_SCALE).checked_mul(one_plus_i)
}

/// Future value of a monthly contribution paid at the start of each month.
///
/// `months <= 0` returns the contribution unchanged and a non-positive rate
/// falls back to simple accumulation (`sip * months`). Returns `None` when the
/// value does not fit in a `Decimal`.
pub fn checked_future_value_from_sip(monthly_sip: Decimal, months: i32, annual_rate: Decimal) -> Option<Decimal> {
    if months <= 0 {
        return Some(monthly_sip);
    }
    let fv = if annual_rate <= Decimal::ZERO {
        monthly_sip.checked_mul(Decimal::from(months))?
    } else {
        monthly_sip.checked_mul(annuity_due_factor(annual_rate, months as u32)?)?
    };
    Some(round_half_up(fv, MONEY_SCALE))
}

/// Saturating form of [`checked_future_value_from_sip`]: an overflow yields
/// `Decimal::MAX`, which still compares above any reachable target.
pub fn future_value_from_sip(monthly_sip: Decimal, months: i32, annual_rate: Decimal) -> Decimal {
    checked_future_value_from_sip(monthly_sip, months, annual_rate).unwrap_or_else(|| {
        warn!(
            "Future value overflowed for sip {} over {} months at rate {}",
            monthly_sip, months, annual_rate
        );
        Decimal::MAX
    })
}

/// Monthly contribution needed to reach `future_value`, the inverse of
/// [`future_value_from_sip`].
pub fn sip_from_future_value(future_value: Decimal, months: i32, annual_rate: Decimal) -> Decimal {
    if months <= 0 {
        return Decimal::ZERO;
    }
    if annual_rate <= Decimal::ZERO {
        return round_half_up(future_value / Decimal::from(months), MONEY_SCALE);
    }

    match annuity_due_factor(annual_rate, months as u32).and_then(|factor| future_value.checked_div(factor)) {
        Some(sip) => round_half_up(sip, MONEY_SCALE),
        None => {
            warn!(
                "Annuity factor overflowed for {} months at rate {}; required sip treated as zero",
                months, annual_rate
            );
            Decimal::ZERO
        }
    }
}

/// Linear forward scan for the first month count whose projected value meets
/// the target. Starts at `max(1, start_months)` and gives up after
/// [`MAX_GOAL_SEARCH_MONTHS`].
///
/// `None` means the goal is unachievable: no contribution, no growth, or the
/// ceiling was reached.
pub fn months_to_achieve_goal(
    target_future_value: Decimal,
    monthly_sip: Decimal,
    annual_rate: Decimal,
    start_months: i32,
) -> Option<u32> {
    if target_future_value <= Decimal::ZERO {
        return Some(0);
    }
    if monthly_sip <= Decimal::ZERO || annual_rate <= Decimal::ZERO {
        return None;
    }

    let start = start_months.max(1) as u32;
    (start..=MAX_GOAL_SEARCH_MONTHS).find(|&months| {
        future_value_from_sip(monthly_sip, months as i32, annual_rate) >= target_future_value
    })
}
