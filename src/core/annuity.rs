use super::error::{PlanError, PlanResult};

const NEAR_ZERO_RATE: f64 = 0.0001;
const NEAR_ZERO_DENOMINATOR: f64 = 1e-10;

/// Level end-of-period payment that amortizes `present_value` over `periods`
/// at `rate` per period: `PV * r(1+r)^n / ((1+r)^n - 1)`.
///
/// Rates within ±0.0001 of zero, or a vanishing denominator, fall back to
/// straight-line repayment `PV / n`. Negative rates are used as given.
pub fn direct_annuity_payment(present_value: f64, periods: u32, rate: f64) -> PlanResult<f64> {
    if !present_value.is_finite() || present_value <= 0.0 {
        return Err(PlanError::InvalidPresentValue(present_value));
    }
    if periods == 0 {
        return Err(PlanError::InvalidPeriods(periods));
    }
    if !rate.is_finite() {
        return Err(PlanError::InvalidRate {
            field: "rate",
            value: rate,
        });
    }

    let n = periods as f64;
    if rate.abs() < NEAR_ZERO_RATE {
        return Ok(present_value / n);
    }

    let growth = (1.0 + rate).powi(periods as i32);
    let denominator = growth - 1.0;
    if denominator.abs() < NEAR_ZERO_DENOMINATOR {
        return Ok(present_value / n);
    }

    Ok(present_value * rate * growth / denominator)
}
