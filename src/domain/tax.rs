//! Pure tax assessment.
//!
//! PPh 21 is evaluated as a single-bracket lookup: the rate of the band
//! containing the whole taxable income is applied to the whole amount, not
//! a cumulative per-bracket sum. That matches the filing behavior this
//! service replaces and is kept deliberately; see DESIGN.md before
//! "correcting" it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Tax type codes used as calculation discriminators; the wire and column
/// form is the code printed on the filing forms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaxType {
    /// Personal income tax, progressive brackets
    #[serde(rename = "PPH_21")]
    Pph21,
    /// Withholding on services, flat 2%
    #[serde(rename = "PPH_23")]
    Pph23,
    /// Corporate income tax, flat 22%
    #[serde(rename = "PPH_BADAN")]
    PphBadan,
    /// Final small-business tax, flat 0.5%
    #[serde(rename = "PPH_FINAL")]
    PphFinal,
    /// Value-added tax, flat 11%
    #[serde(rename = "PPN")]
    Ppn,
}

impl TaxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxType::Pph21 => "PPH_21",
            TaxType::Pph23 => "PPH_23",
            TaxType::PphBadan => "PPH_BADAN",
            TaxType::PphFinal => "PPH_FINAL",
            TaxType::Ppn => "PPN",
        }
    }
}

impl FromStr for TaxType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PPH_21" => Ok(TaxType::Pph21),
            "PPH_23" => Ok(TaxType::Pph23),
            "PPH_BADAN" => Ok(TaxType::PphBadan),
            "PPH_FINAL" => Ok(TaxType::PphFinal),
            "PPN" => Ok(TaxType::Ppn),
            other => Err(format!("unknown tax type: {}", other)),
        }
    }
}

impl std::fmt::Display for TaxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs to an assessment, all amounts in rupiah
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssessmentInput {
    pub gross_income: Decimal,
    #[serde(default)]
    pub deductible_expenses: Decimal,
    #[serde(default)]
    pub deductions: Decimal,
    #[serde(default)]
    pub tax_credits: Decimal,
    #[serde(default)]
    pub prior_payments: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub taxable_income: Decimal,
    pub tax_rate: Decimal,
    pub calculated_tax: Decimal,
    pub final_tax_amount: Decimal,
}

/// PPh 21 bands: upper bound (inclusive) and rate.
/// The terminal band is open-ended.
const PPH_21_BRACKETS: &[(i64, i64)] = &[
    // (upper bound in rupiah, rate in hundredths of a percent)
    (60_000_000, 500),
    (250_000_000, 1_500),
    (500_000_000, 2_500),
    (5_000_000_000, 3_000),
];
const PPH_21_TOP_RATE: i64 = 3_500;

fn rate_for(tax_type: TaxType, taxable_income: Decimal) -> Decimal {
    // Rates are exact decimals built from basis points to avoid float noise
    let from_bp = |bp: i64| Decimal::new(bp, 4);
    match tax_type {
        TaxType::Pph21 => {
            for &(upper, rate_bp) in PPH_21_BRACKETS {
                if taxable_income <= Decimal::from(upper) {
                    return from_bp(rate_bp);
                }
            }
            from_bp(PPH_21_TOP_RATE)
        }
        TaxType::Pph23 => from_bp(200),
        TaxType::PphBadan => from_bp(2_200),
        TaxType::PphFinal => from_bp(50),
        TaxType::Ppn => from_bp(1_100),
    }
}

fn sub_floor_zero(amount: Decimal, subtrahend: Decimal) -> Decimal {
    let result = amount - subtrahend;
    if result < Decimal::ZERO {
        Decimal::ZERO
    } else {
        result
    }
}

/// Compute an assessment. Pure: identical inputs yield identical outputs,
/// and the final amount is floored at zero after every subtraction step.
pub fn assess(tax_type: TaxType, input: &AssessmentInput) -> Assessment {
    let taxable_income = sub_floor_zero(input.gross_income, input.deductible_expenses);
    let tax_rate = rate_for(tax_type, taxable_income);
    let calculated_tax = taxable_income * tax_rate;

    let after_deductions = sub_floor_zero(calculated_tax, input.deductions);
    let after_credits = sub_floor_zero(after_deductions, input.tax_credits);
    let final_tax_amount = sub_floor_zero(after_credits, input.prior_payments);

    Assessment {
        taxable_income,
        tax_rate,
        calculated_tax,
        final_tax_amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn income(gross: i64) -> AssessmentInput {
        AssessmentInput {
            gross_income: Decimal::from(gross),
            ..Default::default()
        }
    }

    #[test]
    fn pph21_seventy_million_lands_in_second_bracket() {
        let result = assess(TaxType::Pph21, &income(70_000_000));
        assert_eq!(result.taxable_income, dec!(70_000_000));
        assert_eq!(result.tax_rate, dec!(0.1500));
        assert_eq!(result.calculated_tax, dec!(10_500_000.0000));
        assert_eq!(result.final_tax_amount, dec!(10_500_000.0000));
    }

    #[test]
    fn pph21_bracket_boundaries() {
        assert_eq!(assess(TaxType::Pph21, &income(60_000_000)).tax_rate, dec!(0.0500));
        assert_eq!(assess(TaxType::Pph21, &income(60_000_001)).tax_rate, dec!(0.1500));
        assert_eq!(assess(TaxType::Pph21, &income(500_000_000)).tax_rate, dec!(0.2500));
        assert_eq!(
            assess(TaxType::Pph21, &income(6_000_000_000)).tax_rate,
            dec!(0.3500)
        );
    }

    #[test]
    fn single_bracket_lookup_not_cumulative() {
        // 70M at 15% flat; a cumulative scheme would give 3M + 1.5M = 4.5M
        let result = assess(TaxType::Pph21, &income(70_000_000));
        assert_eq!(result.calculated_tax, dec!(10_500_000.0000));
    }

    #[test]
    fn assessment_is_idempotent() {
        let input = AssessmentInput {
            gross_income: dec!(120_000_000),
            deductible_expenses: dec!(10_000_000),
            deductions: dec!(2_000_000),
            tax_credits: dec!(500_000),
            prior_payments: dec!(1_000_000),
        };
        assert_eq!(assess(TaxType::Pph21, &input), assess(TaxType::Pph21, &input));
    }

    #[test]
    fn final_amount_never_negative() {
        let input = AssessmentInput {
            gross_income: dec!(10_000_000),
            deductible_expenses: Decimal::ZERO,
            deductions: dec!(999_999_999),
            tax_credits: dec!(999_999_999),
            prior_payments: dec!(999_999_999),
        };
        let result = assess(TaxType::Pph21, &input);
        assert_eq!(result.final_tax_amount, Decimal::ZERO);
    }

    #[test]
    fn each_subtraction_step_floors_at_zero() {
        // Oversized deductions must not leak negative credit into later steps
        let input = AssessmentInput {
            gross_income: dec!(100_000_000),
            deductible_expenses: Decimal::ZERO,
            deductions: dec!(999_999_999_999),
            tax_credits: Decimal::ZERO,
            prior_payments: Decimal::ZERO,
        };
        let result = assess(TaxType::Pph21, &input);
        assert_eq!(result.final_tax_amount, Decimal::ZERO);
    }

    #[test]
    fn expenses_reduce_taxable_income_not_below_zero() {
        let input = AssessmentInput {
            gross_income: dec!(5_000_000),
            deductible_expenses: dec!(9_000_000),
            ..Default::default()
        };
        let result = assess(TaxType::Ppn, &input);
        assert_eq!(result.taxable_income, Decimal::ZERO);
        assert_eq!(result.final_tax_amount, Decimal::ZERO);
    }

    #[test]
    fn flat_rates() {
        assert_eq!(assess(TaxType::Ppn, &income(1_000_000)).tax_rate, dec!(0.1100));
        assert_eq!(assess(TaxType::Pph23, &income(1_000_000)).tax_rate, dec!(0.0200));
        assert_eq!(assess(TaxType::PphFinal, &income(1_000_000)).tax_rate, dec!(0.0050));
        assert_eq!(
            assess(TaxType::PphBadan, &income(1_000_000)).tax_rate,
            dec!(0.2200)
        );
    }

    #[test]
    fn tax_type_round_trips_through_str() {
        for t in [
            TaxType::Pph21,
            TaxType::Pph23,
            TaxType::PphBadan,
            TaxType::PphFinal,
            TaxType::Ppn,
        ] {
            assert_eq!(t.as_str().parse::<TaxType>().unwrap(), t);
        }
        assert!("PPH_99".parse::<TaxType>().is_err());
    }
}
