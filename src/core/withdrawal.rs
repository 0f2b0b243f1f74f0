use super::error::{PlanError, PlanResult};
use super::etf_tax::{ANNUAL_ALLOWANCE, CAPITAL_GAINS_TAX_RATE};
use super::types::{WithdrawalParams, WithdrawalYearRecord};

const MIN_RETURN: f64 = -0.5;
const MAX_RETURN: f64 = 0.5;
const MIN_INFLATION: f64 = 0.0;
const MAX_INFLATION: f64 = 0.2;
const MONTHS_PER_YEAR: f64 = 12.0;
/// Residual capital below this is reported as fully depleted.
pub const DEPLETION_TOLERANCE: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct WithdrawalSimulation {
    pub yearly_data: Vec<WithdrawalYearRecord>,
    /// Terminal capital, snapped to zero inside the depletion tolerance.
    pub final_capital: f64,
    /// Terminal capital exactly as simulated.
    pub residual_capital: f64,
    pub total_taxes_paid: f64,
    pub monthly_gross_withdrawal: f64,
    pub monthly_net_withdrawal: f64,
    pub first_year_monthly_gross: f64,
    pub first_year_monthly_net: f64,
    pub average_monthly_tax: f64,
    pub real_purchasing_power: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct WithdrawalTax {
    exempted: f64,
    allowance_used: f64,
    tax: f64,
}

/// Cost basis and Sparerpauschbetrag bookkeeping during decumulation. Unlike
/// the accumulation tracker, the allowance is restored at every year start.
#[derive(Debug, Clone)]
struct WithdrawalTaxState {
    remaining_cost_basis: f64,
    allowance_used_this_year: f64,
    teilfreistellung_rate: f64,
}

impl WithdrawalTaxState {
    fn new(cost_basis: f64, teilfreistellung_rate: f64) -> Self {
        Self {
            remaining_cost_basis: cost_basis,
            allowance_used_this_year: 0.0,
            teilfreistellung_rate,
        }
    }

    fn start_year(&mut self) {
        self.allowance_used_this_year = 0.0;
    }

    fn realize(&mut self, gross_withdrawal: f64, capital_after_returns: f64) -> WithdrawalTax {
        let share = if capital_after_returns > 0.0 {
            (gross_withdrawal / capital_after_returns).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let cost_basis_out = self.remaining_cost_basis * share;
        let realized_gain = (gross_withdrawal - cost_basis_out).max(0.0);
        self.remaining_cost_basis = (self.remaining_cost_basis - cost_basis_out).max(0.0);

        let exempted = realized_gain * self.teilfreistellung_rate;
        let taxable_gain = realized_gain - exempted;
        let remaining_allowance = (ANNUAL_ALLOWANCE - self.allowance_used_this_year).max(0.0);
        let allowance_used = remaining_allowance.min(taxable_gain).max(0.0);
        self.allowance_used_this_year += allowance_used;

        WithdrawalTax {
            exempted,
            allowance_used,
            tax: (taxable_gain - allowance_used).max(0.0) * CAPITAL_GAINS_TAX_RATE,
        }
    }
}

pub(crate) fn validate_params(params: &WithdrawalParams) -> PlanResult<()> {
    if !params.initial_capital.is_finite() || params.initial_capital <= 0.0 {
        return Err(PlanError::InvalidPresentValue(params.initial_capital));
    }
    if params.duration_years == 0 {
        return Err(PlanError::InvalidPeriods(params.duration_years));
    }
    if !params.annual_return.is_finite() {
        return Err(PlanError::InvalidRate {
            field: "annual_return",
            value: params.annual_return,
        });
    }
    if !params.inflation_rate.is_finite() {
        return Err(PlanError::InvalidRate {
            field: "inflation_rate",
            value: params.inflation_rate,
        });
    }
    if !params.cost_basis.is_finite() || params.cost_basis < 0.0 {
        return Err(PlanError::InvalidCostBasis(params.cost_basis));
    }
    if !(0.0..=1.0).contains(&params.teilfreistellung_rate) {
        return Err(PlanError::invalid_input(
            "teilfreistellung_rate",
            "must be between 0 and 1",
        ));
    }
    Ok(())
}

/// Runs the decumulation phase for one candidate base withdrawal (the gross
/// amount taken in year 1, indexed with inflation afterwards).
///
/// Capital may go negative in the last years; the solver relies on the
/// signed residual to steer towards exact depletion.
pub fn simulate_withdrawal(
    params: &WithdrawalParams,
    base_annual_withdrawal: f64,
) -> PlanResult<WithdrawalSimulation> {
    validate_params(params)?;
    if !base_annual_withdrawal.is_finite() || base_annual_withdrawal <= 0.0 {
        return Err(PlanError::InvalidWithdrawal(base_annual_withdrawal));
    }

    let annual_return = params.annual_return.clamp(MIN_RETURN, MAX_RETURN);
    let inflation_rate = params.inflation_rate.clamp(MIN_INFLATION, MAX_INFLATION);

    let mut capital = params.initial_capital;
    let mut tax_state = WithdrawalTaxState::new(params.cost_basis, params.teilfreistellung_rate);
    let mut yearly_data = Vec::with_capacity(params.duration_years as usize);
    let mut total_gross = 0.0;
    let mut total_net = 0.0;
    let mut total_tax = 0.0;

    for year in 1..=params.duration_years {
        tax_state.start_year();

        let start_capital = capital;
        let capital_after_returns = start_capital * (1.0 + annual_return);
        let inflation_multiplier = (1.0 + inflation_rate).powi(year as i32 - 1);
        let gross_withdrawal = base_annual_withdrawal * inflation_multiplier;

        let year_tax = if params.include_tax && gross_withdrawal > 0.0 {
            tax_state.realize(gross_withdrawal, capital_after_returns)
        } else {
            WithdrawalTax::default()
        };

        let net_withdrawal = (gross_withdrawal - year_tax.tax).max(0.0);
        capital = capital_after_returns - gross_withdrawal;

        total_gross += gross_withdrawal;
        total_net += net_withdrawal;
        total_tax += year_tax.tax;

        yearly_data.push(WithdrawalYearRecord {
            year,
            start_capital,
            capital_after_returns,
            gross_withdrawal,
            taxes_paid: year_tax.tax,
            net_withdrawal,
            end_capital: capital,
            real_value: gross_withdrawal / inflation_multiplier,
            inflation_multiplier,
            remaining_cost_basis: tax_state.remaining_cost_basis,
            teilfreistellung_applied: year_tax.exempted,
            allowance_used_this_year: year_tax.allowance_used,
        });
    }

    let total_months = params.duration_years as f64 * MONTHS_PER_YEAR;
    let (first_year_monthly_gross, first_year_monthly_net) = yearly_data
        .first()
        .map(|first| {
            (
                first.gross_withdrawal / MONTHS_PER_YEAR,
                first.net_withdrawal / MONTHS_PER_YEAR,
            )
        })
        .unwrap_or((0.0, 0.0));

    let final_capital = if capital.abs() < DEPLETION_TOLERANCE {
        0.0
    } else {
        capital
    };

    Ok(WithdrawalSimulation {
        yearly_data,
        final_capital,
        residual_capital: capital,
        total_taxes_paid: total_tax,
        monthly_gross_withdrawal: total_gross / total_months,
        monthly_net_withdrawal: total_net / total_months,
        first_year_monthly_gross,
        first_year_monthly_net,
        average_monthly_tax: total_tax / total_months,
        real_purchasing_power: first_year_monthly_gross,
    })
}
