use serde::Serialize;

use super::types::EtfType;

/// Sparerpauschbetrag for a single filer.
pub const ANNUAL_ALLOWANCE: f64 = 1_000.0;
/// Abgeltungssteuer.
pub const CAPITAL_GAINS_TAX_RATE: f64 = 0.25;
pub const EQUITY_TEILFREISTELLUNG: f64 = 0.30;

const BASE_RATE: f64 = 0.0253;
const BASE_RATE_FACTOR: f64 = 0.7;
const ESTIMATED_DISTRIBUTION_YIELD: f64 = 0.02;

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EtfYearTax {
    pub taxable_amount: f64,
    pub allowance_used: f64,
    pub tax: f64,
}

/// Allowance bookkeeping for one accumulation run. The allowance is drawn
/// down across the run's years and never replenished; start every run with a
/// fresh state.
#[derive(Debug, Clone, Default)]
pub struct EtfTaxState {
    used_allowance: f64,
}

impl EtfTaxState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn used_allowance(&self) -> f64 {
        self.used_allowance
    }

    pub fn remaining_allowance(&self) -> f64 {
        (ANNUAL_ALLOWANCE - self.used_allowance).max(0.0)
    }

    pub fn reset(&mut self) {
        self.used_allowance = 0.0;
    }

    pub fn annual_tax(
        &mut self,
        start_capital: f64,
        end_capital: f64,
        teilfreistellung: bool,
        etf_type: EtfType,
    ) -> EtfYearTax {
        let exemption = if teilfreistellung {
            EQUITY_TEILFREISTELLUNG
        } else {
            0.0
        };

        let taxable_amount = match etf_type {
            EtfType::Thesaurierend => {
                let basisertrag = start_capital * BASE_RATE * BASE_RATE_FACTOR;
                let capital_gains = (end_capital - start_capital).max(0.0);
                let vorabpauschale = if capital_gains > 0.0 {
                    basisertrag.min(capital_gains)
                } else {
                    0.0
                };
                vorabpauschale * (1.0 - exemption)
            }
            EtfType::Ausschuettend => {
                let estimated_distribution =
                    (end_capital - start_capital) * ESTIMATED_DISTRIBUTION_YIELD;
                estimated_distribution.max(0.0) * (1.0 - exemption)
            }
        };

        let allowance_used = self.remaining_allowance().min(taxable_amount).max(0.0);
        self.used_allowance += allowance_used;
        let taxable_after_allowance = (taxable_amount - allowance_used).max(0.0);

        EtfYearTax {
            taxable_amount,
            allowance_used,
            tax: taxable_after_allowance * CAPITAL_GAINS_TAX_RATE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn vorabpauschale_is_capped_by_basisertrag() {
        let mut state = EtfTaxState::new();
        let year = state.annual_tax(100_000.0, 110_000.0, false, EtfType::Thesaurierend);
        let basisertrag = 100_000.0 * 0.0253 * 0.7;
        assert_approx(year.taxable_amount, basisertrag);
        assert_approx(year.allowance_used, 1_000.0);
        assert_approx(year.tax, (basisertrag - 1_000.0) * 0.25);
    }

    #[test]
    fn vorabpauschale_is_capped_by_actual_gain() {
        let mut state = EtfTaxState::new();
        let year = state.annual_tax(100_000.0, 100_500.0, false, EtfType::Thesaurierend);
        assert_approx(year.taxable_amount, 500.0);
        assert_approx(year.allowance_used, 500.0);
        assert_approx(year.tax, 0.0);
        assert_approx(state.remaining_allowance(), 500.0);
    }

    #[test]
    fn no_vorabpauschale_in_a_losing_year() {
        let mut state = EtfTaxState::new();
        let year = state.annual_tax(100_000.0, 90_000.0, true, EtfType::Thesaurierend);
        assert_approx(year.taxable_amount, 0.0);
        assert_approx(year.tax, 0.0);
        assert_approx(state.used_allowance(), 0.0);
    }

    #[test]
    fn teilfreistellung_exempts_thirty_percent() {
        let mut state = EtfTaxState::new();
        let year = state.annual_tax(200_000.0, 220_000.0, true, EtfType::Thesaurierend);
        let expected_taxable = 200_000.0 * 0.0253 * 0.7 * 0.7;
        assert_approx(year.taxable_amount, expected_taxable);
        assert_approx(year.tax, (expected_taxable - 1_000.0) * 0.25);
    }

    #[test]
    fn distributing_fund_taxes_estimated_distribution() {
        let mut state = EtfTaxState::new();
        let year = state.annual_tax(500_000.0, 600_000.0, false, EtfType::Ausschuettend);
        assert_approx(year.taxable_amount, 2_000.0);
        assert_approx(year.tax, 250.0);
    }

    #[test]
    fn allowance_is_consumed_across_years_of_one_run() {
        let mut state = EtfTaxState::new();
        let first = state.annual_tax(40_000.0, 44_000.0, false, EtfType::Thesaurierend);
        let second = state.annual_tax(44_000.0, 48_000.0, false, EtfType::Thesaurierend);
        assert_approx(first.allowance_used, 40_000.0 * 0.0253 * 0.7);
        assert_approx(first.tax, 0.0);
        assert_approx(second.allowance_used, 1_000.0 - first.allowance_used);
        assert!(second.tax > 0.0);
        assert_approx(state.remaining_allowance(), 0.0);

        let third = state.annual_tax(48_000.0, 52_000.0, false, EtfType::Thesaurierend);
        assert_approx(third.allowance_used, 0.0);
        assert_approx(third.tax, third.taxable_amount * 0.25);
    }

    #[test]
    fn reset_restores_full_allowance() {
        let mut state = EtfTaxState::new();
        state.annual_tax(500_000.0, 550_000.0, false, EtfType::Thesaurierend);
        assert_approx(state.remaining_allowance(), 0.0);
        state.reset();
        assert_approx(state.remaining_allowance(), 1_000.0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_allowance_never_exceeds_annual_limit(
            start in 0u32..2_000_000,
            growth_bp in proptest::collection::vec(-3000i32..4000, 1..40),
            teilfreistellung in proptest::bool::ANY,
            distributing in proptest::bool::ANY
        ) {
            let etf_type = if distributing { EtfType::Ausschuettend } else { EtfType::Thesaurierend };
            let mut state = EtfTaxState::new();
            let mut capital = start as f64;
            let mut total_used = 0.0;
            for bp in growth_bp {
                let end = capital * (1.0 + bp as f64 / 10_000.0);
                let year = state.annual_tax(capital, end, teilfreistellung, etf_type);
                prop_assert!(year.allowance_used >= 0.0);
                prop_assert!(year.allowance_used <= ANNUAL_ALLOWANCE + 1e-9);
                prop_assert!(year.tax >= 0.0);
                total_used += year.allowance_used;
                capital = end - year.tax;
            }
            prop_assert!(total_used <= ANNUAL_ALLOWANCE + 1e-9);
            prop_assert!((total_used - state.used_allowance()).abs() < 1e-6);
        }
    }
}
