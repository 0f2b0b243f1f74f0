use tracing::{debug, warn};

use super::annuity::direct_annuity_payment;
use super::error::PlanResult;
use super::types::{SolverMethod, SolverReport, WithdrawalParams, WithdrawalPlanResult};
use super::withdrawal::{DEPLETION_TOLERANCE, simulate_withdrawal, validate_params};

const MAX_NEWTON_ITERATIONS: u32 = 20;
const DERIVATIVE_STEP: f64 = 0.001;
const MAX_STEP_FRACTION: f64 = 0.2;
const MIN_WITHDRAWAL_FRACTION: f64 = 0.1;
const MIN_DERIVATIVE: f64 = 0.001;
const WITHDRAWAL_TOLERANCE: f64 = 0.01;

const MAX_BRACKET_EXPANSIONS: u32 = 64;
const MAX_BISECTION_ITERATIONS: u32 = 200;

#[derive(Debug, Clone, Copy)]
struct Estimate {
    withdrawal: f64,
    residual: f64,
    iterations: u32,
}

impl Estimate {
    fn depleted(&self) -> bool {
        self.residual.abs() < DEPLETION_TOLERANCE
    }
}

fn residual(params: &WithdrawalParams, withdrawal: f64) -> PlanResult<f64> {
    Ok(simulate_withdrawal(params, withdrawal)?.residual_capital)
}

/// Finds the inflation-indexed base withdrawal that runs the portfolio down
/// to zero over the horizon and returns the resulting schedule.
///
/// The closed-form annuity seeds a damped Newton-Raphson search on the
/// terminal capital. If that stalls outside the depletion tolerance, a
/// bracketing bisection takes over. A plan that still misses is returned with
/// `solver.converged == false` rather than as an error.
pub fn plan_withdrawal(params: &WithdrawalParams) -> PlanResult<WithdrawalPlanResult> {
    validate_params(params)?;
    let guess = direct_annuity_payment(
        params.initial_capital,
        params.duration_years,
        params.annual_return,
    )?;

    let newton = refine_newton(params, guess)?;
    let (estimate, method) = if newton.depleted() {
        let method = if newton.iterations == 0 {
            SolverMethod::Annuity
        } else {
            SolverMethod::Newton
        };
        (newton, method)
    } else {
        warn!(
            withdrawal = newton.withdrawal,
            residual = newton.residual,
            "Newton-Raphson did not deplete the portfolio, falling back to bisection"
        );
        let bisection = refine_bisection(params, guess)?;
        let best = if bisection.residual.abs() <= newton.residual.abs() {
            bisection
        } else {
            newton
        };
        let total = Estimate {
            iterations: newton.iterations + bisection.iterations,
            ..best
        };
        (total, SolverMethod::Bisection)
    };

    if !estimate.depleted() {
        warn!(
            withdrawal = estimate.withdrawal,
            residual = estimate.residual,
            "withdrawal plan did not converge"
        );
    }

    let simulation = simulate_withdrawal(params, estimate.withdrawal)?;
    Ok(WithdrawalPlanResult {
        base_annual_withdrawal: estimate.withdrawal,
        monthly_gross_withdrawal: simulation.monthly_gross_withdrawal,
        monthly_net_withdrawal: simulation.monthly_net_withdrawal,
        first_year_monthly_gross: simulation.first_year_monthly_gross,
        first_year_monthly_net: simulation.first_year_monthly_net,
        average_monthly_tax: simulation.average_monthly_tax,
        total_taxes_paid: simulation.total_taxes_paid,
        real_purchasing_power: simulation.real_purchasing_power,
        yearly_data: simulation.yearly_data,
        final_capital: simulation.final_capital,
        solver: SolverReport {
            method,
            iterations: estimate.iterations,
            converged: estimate.depleted(),
            residual: simulation.residual_capital,
        },
    })
}

fn refine_newton(params: &WithdrawalParams, guess: f64) -> PlanResult<Estimate> {
    let max_step = guess * MAX_STEP_FRACTION;
    let floor = guess * MIN_WITHDRAWAL_FRACTION;

    let mut withdrawal = guess;
    let mut current = residual(params, withdrawal)?;
    let mut iterations = 0;

    while iterations < MAX_NEWTON_ITERATIONS && current.abs() >= DEPLETION_TOLERANCE {
        iterations += 1;

        let delta = withdrawal * DERIVATIVE_STEP;
        let derivative = (residual(params, withdrawal + delta)? - current) / delta;
        if derivative.abs() < MIN_DERIVATIVE {
            warn!(iterations, derivative, "Newton-Raphson derivative vanished");
            break;
        }

        let step = (current / derivative).clamp(-max_step, max_step);
        let next = (withdrawal - step).max(floor);
        let change = (next - withdrawal).abs();
        withdrawal = next;
        current = residual(params, withdrawal)?;
        debug!(iterations, withdrawal, residual = current, "newton step");

        if change < WITHDRAWAL_TOLERANCE {
            break;
        }
    }

    Ok(Estimate {
        withdrawal,
        residual: current,
        iterations,
    })
}

/// Terminal capital falls strictly as the base withdrawal grows, so `[0, hi]`
/// brackets the root once `hi` overdraws the portfolio.
fn refine_bisection(params: &WithdrawalParams, guess: f64) -> PlanResult<Estimate> {
    let mut lo = 0.0;
    let mut hi = guess;
    let mut hi_residual = residual(params, hi)?;
    let mut iterations = 0;

    let mut expansions = 0;
    while hi_residual >= 0.0 && expansions < MAX_BRACKET_EXPANSIONS {
        lo = hi;
        hi *= 2.0;
        hi_residual = residual(params, hi)?;
        expansions += 1;
    }
    if hi_residual >= 0.0 {
        return Ok(Estimate {
            withdrawal: hi,
            residual: hi_residual,
            iterations: expansions,
        });
    }

    let mut best = Estimate {
        withdrawal: hi,
        residual: hi_residual,
        iterations: 0,
    };

    while iterations < MAX_BISECTION_ITERATIONS {
        iterations += 1;
        let mid = 0.5 * (lo + hi);
        if mid <= lo || mid >= hi {
            break;
        }
        let mid_residual = residual(params, mid)?;
        if mid_residual.abs() < best.residual.abs() {
            best = Estimate {
                withdrawal: mid,
                residual: mid_residual,
                iterations: 0,
            };
        }
        debug!(iterations, withdrawal = mid, residual = mid_residual, "bisection step");

        if mid_residual.abs() < DEPLETION_TOLERANCE {
            break;
        }
        if mid_residual > 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    Ok(Estimate {
        iterations: expansions + iterations,
        ..best
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::PlanError;
    use proptest::prelude::{prop_assert, proptest};

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn sample_params() -> WithdrawalParams {
        WithdrawalParams::new(500_000.0, 30, 0.05, 0.02, true, 250_000.0)
    }

    #[test]
    fn plain_annuity_needs_no_refinement() {
        let mut params = sample_params();
        params.inflation_rate = 0.0;
        params.include_tax = false;
        let plan = plan_withdrawal(&params).expect("plan must solve");
        let annuity = direct_annuity_payment(500_000.0, 30, 0.05).expect("valid annuity");

        assert_eq!(plan.solver.method, SolverMethod::Annuity);
        assert_eq!(plan.solver.iterations, 0);
        assert!(plan.solver.converged);
        assert_approx_tol(plan.base_annual_withdrawal, annuity, 1e-9);
        assert_approx_tol(plan.final_capital, 0.0, 1e-9);
    }

    #[test]
    fn inflation_indexing_lowers_the_first_year_withdrawal() {
        let params = sample_params();
        let plan = plan_withdrawal(&params).expect("plan must solve");
        let annuity = direct_annuity_payment(500_000.0, 30, 0.05).expect("valid annuity");

        assert_eq!(plan.solver.method, SolverMethod::Newton);
        assert!(plan.solver.converged);
        assert!(plan.base_annual_withdrawal < annuity);
        assert!(plan.final_capital.abs() < 1.0);
        assert_approx_tol(plan.first_year_monthly_gross, plan.base_annual_withdrawal / 12.0, 1e-9);
        assert_approx_tol(plan.real_purchasing_power, plan.first_year_monthly_gross, 1e-12);
        assert_eq!(plan.yearly_data.len(), 30);
    }

    #[test]
    fn tax_reduces_net_but_not_the_depleting_gross() {
        let mut params = sample_params();
        params.include_tax = false;
        let untaxed = plan_withdrawal(&params).expect("plan must solve");
        params.include_tax = true;
        let taxed = plan_withdrawal(&params).expect("plan must solve");

        assert_approx_tol(
            taxed.base_annual_withdrawal,
            untaxed.base_annual_withdrawal,
            0.05,
        );
        assert!(taxed.total_taxes_paid > 0.0);
        assert!(taxed.monthly_net_withdrawal < untaxed.monthly_net_withdrawal);
        assert_approx_tol(
            taxed.monthly_gross_withdrawal - taxed.monthly_net_withdrawal,
            taxed.average_monthly_tax,
            1e-6,
        );
    }

    #[test]
    fn steep_inflation_with_falling_market_uses_bisection() {
        let params = WithdrawalParams::new(1_000_000.0, 40, -0.05, 0.10, false, 0.0);
        let plan = plan_withdrawal(&params).expect("plan must solve");

        assert_eq!(plan.solver.method, SolverMethod::Bisection);
        assert!(plan.solver.converged);
        assert!(plan.final_capital.abs() < 1.0);
        assert_approx_tol(plan.base_annual_withdrawal, 427.13, 0.05);
    }

    #[test]
    fn repeated_plans_are_bit_identical() {
        let params = sample_params();
        let first = plan_withdrawal(&params).expect("plan must solve");
        let second = plan_withdrawal(&params).expect("plan must solve");

        assert_eq!(
            first.base_annual_withdrawal.to_bits(),
            second.base_annual_withdrawal.to_bits()
        );
        assert_eq!(first.final_capital.to_bits(), second.final_capital.to_bits());
        assert_eq!(
            first.total_taxes_paid.to_bits(),
            second.total_taxes_paid.to_bits()
        );
        assert_eq!(first.yearly_data.len(), second.yearly_data.len());
        for (a, b) in first.yearly_data.iter().zip(&second.yearly_data) {
            assert_eq!(a.end_capital.to_bits(), b.end_capital.to_bits());
            assert_eq!(a.taxes_paid.to_bits(), b.taxes_paid.to_bits());
            assert_eq!(
                a.remaining_cost_basis.to_bits(),
                b.remaining_cost_basis.to_bits()
            );
        }
    }

    #[test]
    fn invalid_arguments_are_rejected() {
        let mut params = sample_params();
        params.initial_capital = 0.0;
        assert!(matches!(
            plan_withdrawal(&params),
            Err(PlanError::InvalidPresentValue(_))
        ));

        let mut params = sample_params();
        params.duration_years = 0;
        assert!(matches!(
            plan_withdrawal(&params),
            Err(PlanError::InvalidPeriods(0))
        ));

        let mut params = sample_params();
        params.inflation_rate = f64::INFINITY;
        assert!(matches!(
            plan_withdrawal(&params),
            Err(PlanError::InvalidRate { field: "inflation_rate", .. })
        ));
    }

    #[test]
    fn total_loss_rate_yields_no_valid_withdrawal() {
        let mut params = sample_params();
        params.annual_return = -1.0;
        assert!(matches!(
            plan_withdrawal(&params),
            Err(PlanError::InvalidWithdrawal(_))
        ));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_plan_depletes_portfolio(
            capital in 10_000u32..5_000_000,
            duration in 5u32..41,
            return_bp in -500i32..1501,
            inflation_bp in 0u32..1001,
            include_tax in proptest::bool::ANY,
            basis_pct in 0u32..101
        ) {
            let capital = capital as f64;
            let params = WithdrawalParams::new(
                capital,
                duration,
                return_bp as f64 / 10_000.0,
                inflation_bp as f64 / 10_000.0,
                include_tax,
                capital * basis_pct as f64 / 100.0,
            );
            let plan = plan_withdrawal(&params).expect("plan must solve");
            prop_assert!(plan.final_capital.abs() < 1.0, "final capital {}", plan.final_capital);
            prop_assert!(plan.solver.converged);
            prop_assert!(plan.base_annual_withdrawal > 0.0);
            prop_assert!(plan.yearly_data.len() == duration as usize);
        }
    }
}
