use serde::Serialize;

use super::types::{SalaryProfile, TaxClass};

const BASIC_ALLOWANCE: f64 = 12_096.0;
const CHILD_ALLOWANCE: f64 = 9_600.0;
const SINGLE_PARENT_RELIEF: f64 = 4_260.0;

const ZONE_1_END: f64 = 17_005.0;
const ZONE_2_END: f64 = 68_429.0;
const ZONE_3_END: f64 = 277_825.0;

const CHURCH_TAX_RATE: f64 = 0.09;

// Beitragsbemessungsgrenzen
const PENSION_CONTRIBUTION_CEILING: f64 = 96_600.0;
const HEALTH_CONTRIBUTION_CEILING: f64 = 66_150.0;

const PENSION_RATE: f64 = 0.093;
const UNEMPLOYMENT_RATE: f64 = 0.013;
const HEALTH_BASE_RATE: f64 = 0.073;
const CARE_RATE: f64 = 0.018;
const CARE_CHILDLESS_SURCHARGE: f64 = 0.006;
const CARE_CHILDLESS_MIN_AGE: u32 = 23;
const PRIVATE_HEALTH_ANNUAL_ESTIMATE: f64 = 5_400.0;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalaryBreakdown {
    pub gross: f64,
    pub taxable_income: f64,
    pub income_tax: f64,
    pub church_tax: f64,
    pub pension_insurance: f64,
    pub unemployment_insurance: f64,
    pub health_insurance: f64,
    pub care_insurance: f64,
    pub social_insurance: f64,
    pub net: f64,
}

#[derive(Debug, Clone, Copy)]
struct SocialInsurance {
    pension: f64,
    unemployment: f64,
    health: f64,
    care: f64,
}

impl SocialInsurance {
    fn total(self) -> f64 {
        self.pension + self.unemployment + self.health + self.care
    }
}

pub fn net_salary(gross_annual: f64, profile: &SalaryProfile) -> f64 {
    net_salary_breakdown(gross_annual, profile).net
}

/// Annual net pay after income tax, church tax and the employee share of
/// social insurance. Not clamped: a private-insurance estimate can push the
/// result below zero for very small salaries.
pub fn net_salary_breakdown(gross_annual: f64, profile: &SalaryProfile) -> SalaryBreakdown {
    let taxable = taxable_income(gross_annual, profile);
    let income_tax = income_tax(taxable, profile.tax_class);
    let church_tax = if profile.church_tax {
        income_tax * CHURCH_TAX_RATE
    } else {
        0.0
    };
    let social = social_insurance(gross_annual, profile);
    let net = gross_annual - income_tax - church_tax - social.total();

    SalaryBreakdown {
        gross: gross_annual,
        taxable_income: taxable,
        income_tax,
        church_tax,
        pension_insurance: social.pension,
        unemployment_insurance: social.unemployment,
        health_insurance: social.health,
        care_insurance: social.care,
        social_insurance: social.total(),
        net,
    }
}

pub fn taxable_income(gross_annual: f64, profile: &SalaryProfile) -> f64 {
    let basic = match profile.tax_class {
        TaxClass::V | TaxClass::VI => 0.0,
        TaxClass::II => BASIC_ALLOWANCE + SINGLE_PARENT_RELIEF,
        TaxClass::I | TaxClass::III | TaxClass::IV => BASIC_ALLOWANCE,
    };
    let children = CHILD_ALLOWANCE * profile.children as f64;
    (gross_annual - basic - children).max(0.0)
}

pub fn income_tax(taxable: f64, tax_class: TaxClass) -> f64 {
    let taxable = taxable.max(0.0);
    match tax_class {
        TaxClass::III => 2.0 * tariff(taxable / 2.0),
        _ => tariff(taxable),
    }
}

fn tariff(x: f64) -> f64 {
    let tax = if x <= ZONE_1_END {
        let y = x / 10_000.0;
        (293.15 * y + 1_400.0) * y
    } else if x <= ZONE_2_END {
        let z = (x - ZONE_1_END) / 10_000.0;
        (176.64 * z + 2_397.0) * z + 3_228.41
    } else if x <= ZONE_3_END {
        0.42 * x - 8_514.31
    } else {
        0.45 * x - 16_849.06
    };
    tax.max(0.0)
}

fn social_insurance(gross_annual: f64, profile: &SalaryProfile) -> SocialInsurance {
    let gross = gross_annual.max(0.0);
    let pension_base = gross.min(PENSION_CONTRIBUTION_CEILING);
    let health_base = gross.min(HEALTH_CONTRIBUTION_CEILING);

    let health = if profile.public_health_insurance {
        let rate = HEALTH_BASE_RATE + profile.additional_health_rate_percent / 100.0 / 2.0;
        health_base * rate
    } else {
        PRIVATE_HEALTH_ANNUAL_ESTIMATE
    };

    let mut care_rate = CARE_RATE;
    if profile.children == 0 && profile.age >= CARE_CHILDLESS_MIN_AGE {
        care_rate += CARE_CHILDLESS_SURCHARGE;
    }

    SocialInsurance {
        pension: pension_base * PENSION_RATE,
        unemployment: pension_base * UNEMPLOYMENT_RATE,
        health,
        care: health_base * care_rate,
    }
}
