use clap::{Args, ValueEnum};
use serde::Deserialize;

use crate::core::{
    ContributionPlan, EtfType, PhaseIncrementScope, PlanError, PlanResult, SalaryProfile,
    SavingsPhase, ScenarioInputs, TaxClass, WithdrawalParams,
};

const DEFAULT_MONTHLY_SAVINGS: f64 = 500.0;
const DEFAULT_INITIAL_CAPITAL: f64 = 3_000.0;
const DEFAULT_BASE_SALARY: f64 = 60_000.0;
const DEFAULT_ANNUAL_RETURN: f64 = 7.0;
const DEFAULT_INFLATION: f64 = 2.0;
const DEFAULT_SALARY_GROWTH: f64 = 3.0;
const DEFAULT_DURATION_YEARS: u32 = 25;
const DEFAULT_SAVINGS_RATIO: f64 = 50.0;

const DEFAULT_AGE: u32 = 30;
const DEFAULT_ADDITIONAL_HEALTH_RATE: f64 = 2.5;

const DEFAULT_WITHDRAWAL_CAPITAL: f64 = 500_000.0;
const DEFAULT_WITHDRAWAL_YEARS: u32 = 30;
const DEFAULT_WITHDRAWAL_RETURN: f64 = 5.0;
const DEFAULT_WITHDRAWAL_TEILFREISTELLUNG: f64 = 30.0;
/// Share of the capital assumed to be paid-in money when no cost basis is given.
const DEFAULT_COST_BASIS_SHARE: f64 = 0.5;

const MAX_DURATION_YEARS: u32 = 100;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliEtfType {
    Thesaurierend,
    Ausschuettend,
}

impl From<CliEtfType> for EtfType {
    fn from(value: CliEtfType) -> Self {
        match value {
            CliEtfType::Thesaurierend => EtfType::Thesaurierend,
            CliEtfType::Ausschuettend => EtfType::Ausschuettend,
        }
    }
}

impl From<EtfType> for CliEtfType {
    fn from(value: EtfType) -> Self {
        match value {
            EtfType::Thesaurierend => CliEtfType::Thesaurierend,
            EtfType::Ausschuettend => CliEtfType::Ausschuettend,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliPhaseScope {
    SinceSimulationStart,
    SincePhaseStart,
}

impl From<CliPhaseScope> for PhaseIncrementScope {
    fn from(value: CliPhaseScope) -> Self {
        match value {
            CliPhaseScope::SinceSimulationStart => PhaseIncrementScope::SinceSimulationStart,
            CliPhaseScope::SincePhaseStart => PhaseIncrementScope::SincePhaseStart,
        }
    }
}

impl From<PhaseIncrementScope> for CliPhaseScope {
    fn from(value: PhaseIncrementScope) -> Self {
        match value {
            PhaseIncrementScope::SinceSimulationStart => CliPhaseScope::SinceSimulationStart,
            PhaseIncrementScope::SincePhaseStart => CliPhaseScope::SincePhaseStart,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SalaryArgs {
    #[arg(long, default_value = "I", help = "Lohnsteuerklasse, I-VI or 1-6")]
    pub tax_class: TaxClass,
    #[arg(long, default_value_t = 0)]
    pub children: u32,
    #[arg(long, default_value_t = DEFAULT_AGE)]
    pub age: u32,
    #[arg(long)]
    pub church_tax: bool,
    #[arg(long, help = "Use the flat private health insurance estimate")]
    pub private_health_insurance: bool,
    #[arg(
        long,
        default_value_t = DEFAULT_ADDITIONAL_HEALTH_RATE,
        help = "Zusatzbeitrag of the public health insurer in percent"
    )]
    pub additional_health_rate: f64,
}

#[derive(Args, Debug, Clone)]
pub struct ScenarioArgs {
    #[arg(long, default_value_t = DEFAULT_MONTHLY_SAVINGS)]
    pub monthly_savings: f64,
    #[arg(long, default_value_t = DEFAULT_INITIAL_CAPITAL)]
    pub initial_capital: f64,
    #[arg(long, default_value_t = DEFAULT_BASE_SALARY, help = "Gross annual salary")]
    pub base_salary: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_ANNUAL_RETURN,
        help = "Expected annual return in percent, e.g. 7"
    )]
    pub annual_return: f64,
    #[arg(long, default_value_t = DEFAULT_INFLATION, help = "Annual inflation in percent")]
    pub inflation_rate: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_SALARY_GROWTH,
        help = "Annual salary growth in percent"
    )]
    pub salary_growth: f64,
    #[arg(long, default_value_t = DEFAULT_DURATION_YEARS)]
    pub duration_years: u32,
    #[arg(
        long,
        default_value_t = DEFAULT_SAVINGS_RATIO,
        help = "Share of each net raise added to the savings rate, in percent"
    )]
    pub salary_to_savings_ratio: f64,
    #[arg(long, help = "Ignore ETF taxation")]
    pub no_tax: bool,
    #[arg(long, help = "Disable the 30% equity fund Teilfreistellung")]
    pub no_teilfreistellung: bool,
    #[arg(long, value_enum, default_value_t = CliEtfType::Thesaurierend)]
    pub etf_type: CliEtfType,
    #[arg(
        long = "phase",
        value_parser = parse_phase,
        help = "Savings phase START:END:MONTHLY_RATE, repeatable; replaces --monthly-savings"
    )]
    pub phases: Vec<SavingsPhase>,
    #[arg(long, value_enum, default_value_t = CliPhaseScope::SinceSimulationStart)]
    pub phase_scope: CliPhaseScope,
    #[command(flatten)]
    pub salary: SalaryArgs,
}

#[derive(Args, Debug, Clone)]
pub struct WithdrawalArgs {
    #[arg(long, default_value_t = DEFAULT_WITHDRAWAL_CAPITAL)]
    pub capital: f64,
    #[arg(long, default_value_t = DEFAULT_WITHDRAWAL_YEARS)]
    pub duration_years: u32,
    #[arg(
        long,
        default_value_t = DEFAULT_WITHDRAWAL_RETURN,
        help = "Expected annual return in percent"
    )]
    pub annual_return: f64,
    #[arg(long, default_value_t = DEFAULT_INFLATION, help = "Annual inflation in percent")]
    pub inflation_rate: f64,
    #[arg(long, help = "Ignore capital gains tax on withdrawals")]
    pub no_tax: bool,
    #[arg(long, help = "Paid-in capital; defaults to half of --capital")]
    pub cost_basis: Option<f64>,
    #[arg(
        long,
        default_value_t = DEFAULT_WITHDRAWAL_TEILFREISTELLUNG,
        help = "Teilfreistellung on realized gains in percent"
    )]
    pub teilfreistellung: f64,
}

#[derive(Args, Debug, Clone)]
pub struct NetSalaryArgs {
    #[arg(long, default_value_t = DEFAULT_BASE_SALARY, help = "Gross annual salary")]
    pub gross: f64,
    #[command(flatten)]
    pub salary: SalaryArgs,
}

pub fn parse_phase(value: &str) -> Result<SavingsPhase, String> {
    let parts: Vec<&str> = value.split(':').map(str::trim).collect();
    let [start, end, rate] = parts.as_slice() else {
        return Err(format!("expected START:END:RATE, got '{value}'"));
    };
    let start_year = start
        .parse::<u32>()
        .map_err(|e| format!("invalid phase start year '{start}': {e}"))?;
    let end_year = end
        .parse::<u32>()
        .map_err(|e| format!("invalid phase end year '{end}': {e}"))?;
    let monthly_savings_rate = rate
        .parse::<f64>()
        .map_err(|e| format!("invalid phase savings rate '{rate}': {e}"))?;
    Ok(SavingsPhase {
        start_year,
        end_year,
        monthly_savings_rate,
    })
}

fn require_finite(field: &str, value: f64) -> PlanResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PlanError::invalid_input(field, "must be a finite number"))
    }
}

fn require_non_negative(field: &str, value: f64) -> PlanResult<f64> {
    if require_finite(field, value)? < 0.0 {
        return Err(PlanError::invalid_input(field, "must be >= 0"));
    }
    Ok(value)
}

fn percent_rate(field: &str, percent: f64) -> PlanResult<f64> {
    if require_finite(field, percent)? <= -100.0 {
        return Err(PlanError::invalid_input(field, "must be > -100"));
    }
    Ok(percent / 100.0)
}

fn percent_share(field: &str, percent: f64) -> PlanResult<f64> {
    if !(0.0..=100.0).contains(&require_finite(field, percent)?) {
        return Err(PlanError::invalid_input(field, "must be between 0 and 100"));
    }
    Ok(percent / 100.0)
}

fn require_duration(field: &str, years: u32) -> PlanResult<u32> {
    if years > MAX_DURATION_YEARS {
        return Err(PlanError::invalid_input(
            field,
            format!("must be <= {MAX_DURATION_YEARS}"),
        ));
    }
    Ok(years)
}

pub fn build_salary_profile(args: &SalaryArgs) -> PlanResult<SalaryProfile> {
    // The profile keeps this rate in percent.
    percent_share("additional_health_rate", args.additional_health_rate)?;
    Ok(SalaryProfile {
        tax_class: args.tax_class,
        children: args.children,
        age: args.age,
        church_tax: args.church_tax,
        public_health_insurance: !args.private_health_insurance,
        additional_health_rate_percent: args.additional_health_rate,
    })
}

fn validate_phases(phases: &[SavingsPhase]) -> PlanResult<()> {
    for (idx, phase) in phases.iter().enumerate() {
        let field = format!("phase[{idx}]");
        if phase.start_year == 0 {
            return Err(PlanError::invalid_input(&field, "start year must be >= 1"));
        }
        if phase.end_year < phase.start_year {
            return Err(PlanError::invalid_input(
                &field,
                "end year must be >= start year",
            ));
        }
        require_non_negative(&field, phase.monthly_savings_rate)?;
    }
    Ok(())
}

pub fn build_scenario(args: &ScenarioArgs) -> PlanResult<(ScenarioInputs, ContributionPlan)> {
    validate_phases(&args.phases)?;

    let inputs = ScenarioInputs {
        monthly_savings: require_non_negative("monthly_savings", args.monthly_savings)?,
        initial_capital: require_non_negative("initial_capital", args.initial_capital)?,
        base_salary: require_non_negative("base_salary", args.base_salary)?,
        annual_return: percent_rate("annual_return", args.annual_return)?,
        inflation_rate: percent_rate("inflation_rate", args.inflation_rate)?,
        salary_growth: percent_rate("salary_growth", args.salary_growth)?,
        duration_years: require_duration("duration_years", args.duration_years)?,
        salary_to_savings_ratio: percent_share(
            "salary_to_savings_ratio",
            args.salary_to_savings_ratio,
        )?,
        include_tax: !args.no_tax,
        teilfreistellung: !args.no_teilfreistellung,
        etf_type: args.etf_type.into(),
        salary_profile: build_salary_profile(&args.salary)?,
    };

    let plan = if args.phases.is_empty() {
        ContributionPlan::Flat
    } else {
        ContributionPlan::Phases {
            phases: args.phases.clone(),
            scope: args.phase_scope.into(),
        }
    };

    Ok((inputs, plan))
}

pub fn build_withdrawal(args: &WithdrawalArgs) -> PlanResult<WithdrawalParams> {
    let capital = require_finite("capital", args.capital)?;
    if capital <= 0.0 {
        return Err(PlanError::invalid_input("capital", "must be > 0"));
    }
    if args.duration_years == 0 {
        return Err(PlanError::invalid_input("duration_years", "must be > 0"));
    }
    let cost_basis = match args.cost_basis {
        Some(basis) => require_non_negative("cost_basis", basis)?,
        None => capital * DEFAULT_COST_BASIS_SHARE,
    };

    Ok(WithdrawalParams {
        initial_capital: capital,
        duration_years: require_duration("duration_years", args.duration_years)?,
        annual_return: percent_rate("annual_return", args.annual_return)?,
        inflation_rate: percent_rate("inflation_rate", args.inflation_rate)?,
        include_tax: !args.no_tax,
        cost_basis,
        teilfreistellung_rate: percent_share("teilfreistellung", args.teilfreistellung)?,
    })
}

pub fn default_salary_args() -> SalaryArgs {
    SalaryArgs {
        tax_class: TaxClass::I,
        children: 0,
        age: DEFAULT_AGE,
        church_tax: false,
        private_health_insurance: false,
        additional_health_rate: DEFAULT_ADDITIONAL_HEALTH_RATE,
    }
}

pub fn default_scenario_args() -> ScenarioArgs {
    ScenarioArgs {
        monthly_savings: DEFAULT_MONTHLY_SAVINGS,
        initial_capital: DEFAULT_INITIAL_CAPITAL,
        base_salary: DEFAULT_BASE_SALARY,
        annual_return: DEFAULT_ANNUAL_RETURN,
        inflation_rate: DEFAULT_INFLATION,
        salary_growth: DEFAULT_SALARY_GROWTH,
        duration_years: DEFAULT_DURATION_YEARS,
        salary_to_savings_ratio: DEFAULT_SAVINGS_RATIO,
        no_tax: false,
        no_teilfreistellung: false,
        etf_type: CliEtfType::Thesaurierend,
        phases: Vec::new(),
        phase_scope: CliPhaseScope::SinceSimulationStart,
        salary: default_salary_args(),
    }
}

pub fn default_withdrawal_args() -> WithdrawalArgs {
    WithdrawalArgs {
        capital: DEFAULT_WITHDRAWAL_CAPITAL,
        duration_years: DEFAULT_WITHDRAWAL_YEARS,
        annual_return: DEFAULT_WITHDRAWAL_RETURN,
        inflation_rate: DEFAULT_INFLATION,
        no_tax: false,
        cost_basis: None,
        teilfreistellung: DEFAULT_WITHDRAWAL_TEILFREISTELLUNG,
    }
}

pub fn default_net_salary_args() -> NetSalaryArgs {
    NetSalaryArgs {
        gross: DEFAULT_BASE_SALARY,
        salary: default_salary_args(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SalaryPayload {
    gross: Option<f64>,
    tax_class: Option<TaxClass>,
    children: Option<u32>,
    age: Option<u32>,
    church_tax: Option<bool>,
    public_health_insurance: Option<bool>,
    additional_health_rate: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccumulatePayload {
    monthly_savings: Option<f64>,
    initial_capital: Option<f64>,
    base_salary: Option<f64>,
    annual_return: Option<f64>,
    inflation_rate: Option<f64>,
    salary_growth: Option<f64>,
    duration_years: Option<u32>,
    salary_to_savings_ratio: Option<f64>,
    include_tax: Option<bool>,
    teilfreistellung: Option<bool>,
    etf_type: Option<EtfType>,
    phases: Option<Vec<SavingsPhase>>,
    phase_scope: Option<PhaseIncrementScope>,

    tax_class: Option<TaxClass>,
    children: Option<u32>,
    age: Option<u32>,
    church_tax: Option<bool>,
    public_health_insurance: Option<bool>,
    additional_health_rate: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WithdrawalPayload {
    capital: Option<f64>,
    duration_years: Option<u32>,
    annual_return: Option<f64>,
    inflation_rate: Option<f64>,
    include_tax: Option<bool>,
    cost_basis: Option<f64>,
    teilfreistellung_rate: Option<f64>,
}

fn apply_salary_overrides(
    args: &mut SalaryArgs,
    tax_class: Option<TaxClass>,
    children: Option<u32>,
    age: Option<u32>,
    church_tax: Option<bool>,
    public_health_insurance: Option<bool>,
    additional_health_rate: Option<f64>,
) {
    if let Some(v) = tax_class {
        args.tax_class = v;
    }
    if let Some(v) = children {
        args.children = v;
    }
    if let Some(v) = age {
        args.age = v;
    }
    if let Some(v) = church_tax {
        args.church_tax = v;
    }
    if let Some(v) = public_health_insurance {
        args.private_health_insurance = !v;
    }
    if let Some(v) = additional_health_rate {
        args.additional_health_rate = v;
    }
}

impl AccumulatePayload {
    pub fn into_args(self) -> ScenarioArgs {
        let mut args = default_scenario_args();
        if let Some(v) = self.monthly_savings {
            args.monthly_savings = v;
        }
        if let Some(v) = self.initial_capital {
            args.initial_capital = v;
        }
        if let Some(v) = self.base_salary {
            args.base_salary = v;
        }
        if let Some(v) = self.annual_return {
            args.annual_return = v;
        }
        if let Some(v) = self.inflation_rate {
            args.inflation_rate = v;
        }
        if let Some(v) = self.salary_growth {
            args.salary_growth = v;
        }
        if let Some(v) = self.duration_years {
            args.duration_years = v;
        }
        if let Some(v) = self.salary_to_savings_ratio {
            args.salary_to_savings_ratio = v;
        }
        if let Some(v) = self.include_tax {
            args.no_tax = !v;
        }
        if let Some(v) = self.teilfreistellung {
            args.no_teilfreistellung = !v;
        }
        if let Some(v) = self.etf_type {
            args.etf_type = v.into();
        }
        if let Some(v) = self.phases {
            args.phases = v;
        }
        if let Some(v) = self.phase_scope {
            args.phase_scope = v.into();
        }
        apply_salary_overrides(
            &mut args.salary,
            self.tax_class,
            self.children,
            self.age,
            self.church_tax,
            self.public_health_insurance,
            self.additional_health_rate,
        );
        args
    }
}

impl WithdrawalPayload {
    pub fn into_args(self) -> WithdrawalArgs {
        let mut args = default_withdrawal_args();
        if let Some(v) = self.capital {
            args.capital = v;
        }
        if let Some(v) = self.duration_years {
            args.duration_years = v;
        }
        if let Some(v) = self.annual_return {
            args.annual_return = v;
        }
        if let Some(v) = self.inflation_rate {
            args.inflation_rate = v;
        }
        if let Some(v) = self.include_tax {
            args.no_tax = !v;
        }
        if self.cost_basis.is_some() {
            args.cost_basis = self.cost_basis;
        }
        if let Some(v) = self.teilfreistellung_rate {
            args.teilfreistellung = v;
        }
        args
    }
}

impl SalaryPayload {
    pub fn into_args(self) -> NetSalaryArgs {
        let mut args = default_net_salary_args();
        if let Some(v) = self.gross {
            args.gross = v;
        }
        apply_salary_overrides(
            &mut args.salary,
            self.tax_class,
            self.children,
            self.age,
            self.church_tax,
            self.public_health_insurance,
            self.additional_health_rate,
        );
        args
    }
}
