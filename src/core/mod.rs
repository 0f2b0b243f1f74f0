mod annuity;
mod engine;
mod error;
mod etf_tax;
mod salary;
mod solver;
mod types;
mod withdrawal;

pub use annuity::direct_annuity_payment;
pub use engine::simulate_accumulation;
pub use error::{PlanError, PlanResult};
pub use etf_tax::{
    ANNUAL_ALLOWANCE, CAPITAL_GAINS_TAX_RATE, EQUITY_TEILFREISTELLUNG, EtfTaxState, EtfYearTax,
};
pub use salary::{SalaryBreakdown, income_tax, net_salary, net_salary_breakdown, taxable_income};
pub use solver::plan_withdrawal;
pub use types::{
    AccumulationResult, ContributionPlan, DEFAULT_WITHDRAWAL_TEILFREISTELLUNG, EtfType,
    PhaseIncrementScope, SalaryProfile, SavingsPhase, ScenarioInputs, SolverMethod, SolverReport,
    TaxClass, WithdrawalParams, WithdrawalPlanResult, WithdrawalYearRecord,
    YearlyAccumulationRecord,
};
pub use withdrawal::{DEPLETION_TOLERANCE, WithdrawalSimulation, simulate_withdrawal};
