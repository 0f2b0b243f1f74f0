use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EtfType {
    #[serde(alias = "accumulating")]
    Thesaurierend,
    #[serde(alias = "distributing", alias = "ausschüttend")]
    Ausschuettend,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum TaxClass {
    #[default]
    #[serde(alias = "1", alias = "i")]
    I,
    #[serde(alias = "2", alias = "ii")]
    II,
    #[serde(alias = "3", alias = "iii")]
    III,
    #[serde(alias = "4", alias = "iv")]
    IV,
    #[serde(alias = "5", alias = "v")]
    V,
    #[serde(alias = "6", alias = "vi")]
    VI,
}

impl std::str::FromStr for TaxClass {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "I" | "1" => Ok(TaxClass::I),
            "II" | "2" => Ok(TaxClass::II),
            "III" | "3" => Ok(TaxClass::III),
            "IV" | "4" => Ok(TaxClass::IV),
            "V" | "5" => Ok(TaxClass::V),
            "VI" | "6" => Ok(TaxClass::VI),
            other => Err(format!("unknown tax class '{other}', expected I-VI or 1-6")),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalaryProfile {
    pub tax_class: TaxClass,
    pub children: u32,
    pub age: u32,
    pub church_tax: bool,
    pub public_health_insurance: bool,
    /// Kassenindividueller Zusatzbeitrag in percent, split evenly with the employer.
    pub additional_health_rate_percent: f64,
}

impl Default for SalaryProfile {
    fn default() -> Self {
        Self {
            tax_class: TaxClass::I,
            children: 0,
            age: 30,
            church_tax: false,
            public_health_insurance: true,
            additional_health_rate_percent: 2.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioInputs {
    pub monthly_savings: f64,
    pub initial_capital: f64,
    pub base_salary: f64,
    pub annual_return: f64,
    pub inflation_rate: f64,
    pub salary_growth: f64,
    pub duration_years: u32,
    pub salary_to_savings_ratio: f64,
    pub include_tax: bool,
    pub teilfreistellung: bool,
    pub etf_type: EtfType,
    #[serde(default)]
    pub salary_profile: SalaryProfile,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsPhase {
    pub start_year: u32,
    pub end_year: u32,
    pub monthly_savings_rate: f64,
}

impl SavingsPhase {
    pub fn contains(&self, year: u32) -> bool {
        (self.start_year..=self.end_year).contains(&year)
    }
}

/// Which salary-driven savings increases a phase picks up.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseIncrementScope {
    /// Every increase earned since year 1.
    #[default]
    SinceSimulationStart,
    /// Only increases earned from the phase's own start year onwards.
    SincePhaseStart,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContributionPlan {
    Flat,
    Phases {
        phases: Vec<SavingsPhase>,
        scope: PhaseIncrementScope,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyAccumulationRecord {
    pub year: u32,
    pub capital: f64,
    pub real_capital: f64,
    pub total_invested: f64,
    pub monthly_savings: f64,
    pub yearly_salary: f64,
    pub net_salary: f64,
    pub taxes_paid: f64,
    pub cumulative_taxes_paid: f64,
    pub allowance_used: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulationResult {
    pub final_nominal: f64,
    pub final_real: f64,
    pub total_invested: f64,
    pub total_return: f64,
    pub total_taxes_paid: f64,
    pub yearly_data: Vec<YearlyAccumulationRecord>,
}

pub const DEFAULT_WITHDRAWAL_TEILFREISTELLUNG: f64 = 0.30;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalParams {
    pub initial_capital: f64,
    pub duration_years: u32,
    pub annual_return: f64,
    pub inflation_rate: f64,
    pub include_tax: bool,
    pub cost_basis: f64,
    pub teilfreistellung_rate: f64,
}

impl WithdrawalParams {
    pub fn new(
        initial_capital: f64,
        duration_years: u32,
        annual_return: f64,
        inflation_rate: f64,
        include_tax: bool,
        cost_basis: f64,
    ) -> Self {
        Self {
            initial_capital,
            duration_years,
            annual_return,
            inflation_rate,
            include_tax,
            cost_basis,
            teilfreistellung_rate: DEFAULT_WITHDRAWAL_TEILFREISTELLUNG,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalYearRecord {
    pub year: u32,
    pub start_capital: f64,
    pub capital_after_returns: f64,
    pub gross_withdrawal: f64,
    pub taxes_paid: f64,
    pub net_withdrawal: f64,
    pub end_capital: f64,
    pub real_value: f64,
    pub inflation_multiplier: f64,
    pub remaining_cost_basis: f64,
    pub teilfreistellung_applied: f64,
    pub allowance_used_this_year: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverMethod {
    Annuity,
    Newton,
    Bisection,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverReport {
    pub method: SolverMethod,
    pub iterations: u32,
    pub converged: bool,
    pub residual: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalPlanResult {
    pub base_annual_withdrawal: f64,
    pub monthly_gross_withdrawal: f64,
    pub monthly_net_withdrawal: f64,
    pub first_year_monthly_gross: f64,
    pub first_year_monthly_net: f64,
    pub average_monthly_tax: f64,
    pub total_taxes_paid: f64,
    pub real_purchasing_power: f64,
    pub yearly_data: Vec<WithdrawalYearRecord>,
    pub final_capital: f64,
    pub solver: SolverReport,
}
