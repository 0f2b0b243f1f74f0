use tracing::debug;

use super::etf_tax::EtfTaxState;
use super::salary::net_salary;
use super::types::{
    AccumulationResult, ContributionPlan, PhaseIncrementScope, ScenarioInputs, SavingsPhase,
    YearlyAccumulationRecord,
};

const MONTHS_PER_YEAR: u32 = 12;

#[derive(Debug, Clone, Copy)]
struct SavingsIncrease {
    earned_in_year: u32,
    monthly_amount: f64,
}

/// Monthly contribution as a function of the simulation year. Salary-driven
/// increases are kept as a ledger instead of being folded into the phases, so
/// the rate for any year can be recomputed from the base plan.
#[derive(Debug)]
struct ContributionSchedule<'a> {
    plan: &'a ContributionPlan,
    flat_rate: f64,
    increases: Vec<SavingsIncrease>,
}

impl<'a> ContributionSchedule<'a> {
    fn new(plan: &'a ContributionPlan, flat_rate: f64) -> Self {
        Self {
            plan,
            flat_rate,
            increases: Vec::new(),
        }
    }

    fn record_increase(&mut self, earned_in_year: u32, monthly_amount: f64) {
        self.increases.push(SavingsIncrease {
            earned_in_year,
            monthly_amount,
        });
    }

    fn increases_before(&self, year: u32, since: u32) -> f64 {
        self.increases
            .iter()
            .filter(|inc| inc.earned_in_year < year && inc.earned_in_year >= since)
            .map(|inc| inc.monthly_amount)
            .sum()
    }

    fn monthly_rate(&self, year: u32) -> f64 {
        let rate = match self.plan {
            ContributionPlan::Flat => self.flat_rate + self.increases_before(year, 0),
            ContributionPlan::Phases { phases, scope } => {
                let Some(phase) = active_phase(phases, year) else {
                    return 0.0;
                };
                let since = match scope {
                    PhaseIncrementScope::SinceSimulationStart => 0,
                    PhaseIncrementScope::SincePhaseStart => phase.start_year,
                };
                phase.monthly_savings_rate + self.increases_before(year, since)
            }
        };
        rate.max(0.0)
    }
}

fn active_phase(phases: &[SavingsPhase], year: u32) -> Option<&SavingsPhase> {
    phases.iter().find(|phase| phase.contains(year))
}

/// Year-by-year wealth accumulation with monthly compounding, salary-linked
/// savings increases and optional annual ETF taxation.
pub fn simulate_accumulation(inputs: &ScenarioInputs, plan: &ContributionPlan) -> AccumulationResult {
    let mut schedule = ContributionSchedule::new(plan, inputs.monthly_savings);
    let mut tax_state = EtfTaxState::new();
    let profile = &inputs.salary_profile;
    let monthly_return = inputs.annual_return / MONTHS_PER_YEAR as f64;

    let mut capital = inputs.initial_capital;
    let mut total_invested = inputs.initial_capital;
    let mut cumulative_taxes_paid = 0.0;
    let mut salary = inputs.base_salary;

    let mut yearly_data = Vec::with_capacity(inputs.duration_years as usize + 1);
    yearly_data.push(YearlyAccumulationRecord {
        year: 0,
        capital,
        real_capital: capital,
        total_invested,
        monthly_savings: schedule.monthly_rate(1),
        yearly_salary: salary,
        net_salary: net_salary(salary, profile),
        taxes_paid: 0.0,
        cumulative_taxes_paid: 0.0,
        allowance_used: 0.0,
    });

    for year in 1..=inputs.duration_years {
        let contribution = schedule.monthly_rate(year);
        let start_capital = capital;

        for _ in 0..MONTHS_PER_YEAR {
            capital += capital * monthly_return;
            capital += contribution;
            total_invested += contribution;
        }

        let (taxes_paid, allowance_used) = if inputs.include_tax {
            let year_tax = tax_state.annual_tax(
                start_capital,
                capital,
                inputs.teilfreistellung,
                inputs.etf_type,
            );
            capital -= year_tax.tax;
            debug!(
                year,
                taxable = year_tax.taxable_amount,
                allowance_used = year_tax.allowance_used,
                tax = year_tax.tax,
                "annual ETF tax applied"
            );
            (year_tax.tax, year_tax.allowance_used)
        } else {
            (0.0, 0.0)
        };
        cumulative_taxes_paid += taxes_paid;

        let yearly_salary = salary;
        let year_net_salary = net_salary(salary, profile);

        if year < inputs.duration_years {
            let raised_salary = salary * (1.0 + inputs.salary_growth);
            let net_increase = net_salary(raised_salary, profile) - year_net_salary;
            let monthly_increase =
                net_increase * inputs.salary_to_savings_ratio / MONTHS_PER_YEAR as f64;
            if monthly_increase != 0.0 {
                schedule.record_increase(year, monthly_increase);
            }
            salary = raised_salary;
        }

        yearly_data.push(YearlyAccumulationRecord {
            year,
            capital,
            real_capital: deflate(capital, inputs.inflation_rate, year),
            total_invested,
            monthly_savings: contribution,
            yearly_salary,
            net_salary: year_net_salary,
            taxes_paid,
            cumulative_taxes_paid,
            allowance_used,
        });
    }

    AccumulationResult {
        final_nominal: capital,
        final_real: deflate(capital, inputs.inflation_rate, inputs.duration_years),
        total_invested,
        total_return: capital - total_invested,
        total_taxes_paid: cumulative_taxes_paid,
        yearly_data,
    }
}

fn deflate(nominal: f64, inflation_rate: f64, years: u32) -> f64 {
    nominal / (1.0 + inflation_rate).powi(years as i32)
}
