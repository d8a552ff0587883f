// End-to-end checks of the assessment math against known filing scenarios.

use anyhow::Result;
use rust_decimal::Decimal;

use pajak_api::domain::tax::{assess, AssessmentInput, TaxType};

fn rupiah(amount: i64) -> Decimal {
    Decimal::from(amount)
}

#[test]
fn pph21_reference_case_seventy_million() -> Result<()> {
    // 70,000,000 gross, no deductions: the whole amount falls in the
    // >60M..250M band, so 15% applies to all of it.
    let input = AssessmentInput {
        gross_income: rupiah(70_000_000),
        ..Default::default()
    };
    let result = assess(TaxType::Pph21, &input);

    assert_eq!(result.taxable_income, rupiah(70_000_000));
    assert_eq!(result.tax_rate, Decimal::new(1_500, 4));
    assert_eq!(result.calculated_tax, rupiah(10_500_000));
    assert_eq!(result.final_tax_amount, rupiah(10_500_000));
    Ok(())
}

#[test]
fn assessment_is_deterministic_across_calls() -> Result<()> {
    let input = AssessmentInput {
        gross_income: rupiah(312_500_000),
        deductible_expenses: rupiah(12_500_000),
        deductions: rupiah(4_000_000),
        tax_credits: rupiah(1_250_000),
        prior_payments: rupiah(20_000_000),
    };

    let first = assess(TaxType::Pph21, &input);
    let second = assess(TaxType::Pph21, &input);
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn oversubtraction_clamps_to_zero_not_negative() -> Result<()> {
    let input = AssessmentInput {
        gross_income: rupiah(50_000_000),
        deductible_expenses: Decimal::ZERO,
        deductions: rupiah(1_000_000_000),
        tax_credits: rupiah(1_000_000_000),
        prior_payments: rupiah(1_000_000_000),
    };
    let result = assess(TaxType::Pph21, &input);

    assert!(result.final_tax_amount >= Decimal::ZERO);
    assert_eq!(result.final_tax_amount, Decimal::ZERO);
    Ok(())
}

#[test]
fn prior_payments_reduce_the_final_amount_stepwise() -> Result<()> {
    // 100M taxable at 15% = 15M; 2M deductions, 1M credits, 5M prepaid
    let input = AssessmentInput {
        gross_income: rupiah(100_000_000),
        deductible_expenses: Decimal::ZERO,
        deductions: rupiah(2_000_000),
        tax_credits: rupiah(1_000_000),
        prior_payments: rupiah(5_000_000),
    };
    let result = assess(TaxType::Pph21, &input);

    assert_eq!(result.calculated_tax, rupiah(15_000_000));
    assert_eq!(result.final_tax_amount, rupiah(7_000_000));
    Ok(())
}

#[test]
fn ppn_is_flat_regardless_of_amount() -> Result<()> {
    for amount in [1_000i64, 1_000_000, 10_000_000_000] {
        let input = AssessmentInput {
            gross_income: rupiah(amount),
            ..Default::default()
        };
        assert_eq!(assess(TaxType::Ppn, &input).tax_rate, Decimal::new(1_100, 4));
    }
    Ok(())
}

#[test]
fn tax_type_codes_match_the_wire_format() -> Result<()> {
    // Clients send the SCREAMING_SNAKE codes used on filing forms
    let parsed: TaxType = serde_json::from_value(serde_json::json!("PPH_21"))?;
    assert_eq!(parsed, TaxType::Pph21);
    assert_eq!(serde_json::to_value(TaxType::Ppn)?, serde_json::json!("PPN"));
    Ok(())
}
