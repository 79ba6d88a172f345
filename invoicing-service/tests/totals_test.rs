//! Tests for the document totals calculator: proportional discount
//! allocation across VAT rate buckets, rounding policy and edge cases.

use invoicing_service::domain::{calculate_totals, DiscountInput, DiscountType, LineInput};
use rust_decimal::Decimal;
use std::str::FromStr;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn line(quantity: &str, unit_price: &str, vat_rate: &str) -> LineInput {
    LineInput {
        quantity: d(quantity),
        unit_price: d(unit_price),
        vat_rate: d(vat_rate),
    }
}

fn percent(value: &str) -> DiscountInput {
    DiscountInput {
        discount_type: DiscountType::Percent,
        value: d(value),
    }
}

fn amount(value: &str) -> DiscountInput {
    DiscountInput {
        discount_type: DiscountType::Amount,
        value: d(value),
    }
}

#[test]
fn empty_item_list_yields_zero_totals() {
    let totals = calculate_totals(&[], &DiscountInput::default());

    assert_eq!(totals.subtotal, Decimal::ZERO);
    assert_eq!(totals.discount_amount, Decimal::ZERO);
    assert_eq!(totals.taxable, Decimal::ZERO);
    assert_eq!(totals.vat_amount, Decimal::ZERO);
    assert_eq!(totals.total, Decimal::ZERO);
    assert!(totals.vat_breakdown.is_empty());
}

#[test]
fn single_line_standard_rate() {
    let items = [line("3", "19.99", "0.18")];
    let totals = calculate_totals(&items, &DiscountInput::default());

    assert_eq!(totals.subtotal, d("59.97"));
    assert_eq!(totals.discount_amount, Decimal::ZERO);
    assert_eq!(totals.taxable, d("59.97"));
    // 59.97 * 0.18 = 10.7946, rounded half-up
    assert_eq!(totals.vat_amount, d("10.79"));
    assert_eq!(totals.total, d("70.76"));
}

#[test]
fn percent_discount_allocated_proportionally_across_rates() {
    let items = [line("1", "100.00", "0.18"), line("1", "100.00", "0.00")];
    let totals = calculate_totals(&items, &percent("10"));

    assert_eq!(totals.subtotal, d("200.00"));
    assert_eq!(totals.discount_amount, d("20.00"));
    assert_eq!(totals.taxable, d("180.00"));
    // Each rate bucket absorbs half the discount; VAT only on the 18% half.
    assert_eq!(totals.vat_amount, d("16.20"));
    assert_eq!(totals.total, d("196.20"));

    assert_eq!(totals.vat_breakdown.len(), 2);
    let zero_rate = &totals.vat_breakdown[0];
    assert_eq!(zero_rate.rate, d("0.00"));
    assert_eq!(zero_rate.discount, d("10.00"));
    assert_eq!(zero_rate.taxable, d("90.00"));
    assert_eq!(zero_rate.vat, Decimal::ZERO);
    let standard_rate = &totals.vat_breakdown[1];
    assert_eq!(standard_rate.rate, d("0.18"));
    assert_eq!(standard_rate.discount, d("10.00"));
    assert_eq!(standard_rate.taxable, d("90.00"));
    assert_eq!(standard_rate.vat, d("16.20"));
}

#[test]
fn amount_discount_allocated_by_bucket_share() {
    let items = [line("1", "200.00", "0.18"), line("1", "100.00", "0.05")];
    let totals = calculate_totals(&items, &amount("30.00"));

    assert_eq!(totals.subtotal, d("300.00"));
    assert_eq!(totals.discount_amount, d("30.00"));
    // Shares: 20 against the 200 bucket, 10 against the 100 bucket.
    assert_eq!(totals.taxable, d("270.00"));
    // 180 * 0.18 + 90 * 0.05 = 32.40 + 4.50
    assert_eq!(totals.vat_amount, d("36.90"));
    assert_eq!(totals.total, d("306.90"));
}

#[test]
fn lines_with_same_rate_share_one_bucket() {
    let items = [
        line("2", "10.00", "0.18"),
        line("1", "30.00", "0.18"),
        line("1", "50.00", "0.07"),
    ];
    let totals = calculate_totals(&items, &DiscountInput::default());

    assert_eq!(totals.vat_breakdown.len(), 2);
    assert_eq!(totals.vat_breakdown[0].rate, d("0.07"));
    assert_eq!(totals.vat_breakdown[1].rate, d("0.18"));
    assert_eq!(totals.vat_breakdown[1].net, d("50.00"));
}

#[test]
fn percent_discount_clamped_to_hundred() {
    let items = [line("1", "100.00", "0.18")];
    let totals = calculate_totals(&items, &percent("150"));

    assert_eq!(totals.discount_amount, d("100.00"));
    assert_eq!(totals.taxable, Decimal::ZERO);
    assert_eq!(totals.vat_amount, Decimal::ZERO);
    assert_eq!(totals.total, Decimal::ZERO);
}

#[test]
fn amount_discount_clamped_to_subtotal() {
    let items = [line("1", "80.00", "0.18")];
    let totals = calculate_totals(&items, &amount("500.00"));

    assert_eq!(totals.discount_amount, d("80.00"));
    assert_eq!(totals.taxable, Decimal::ZERO);
    assert_eq!(totals.total, Decimal::ZERO);
}

#[test]
fn negative_discount_value_is_ignored() {
    let items = [line("1", "100.00", "0.18")];
    let totals = calculate_totals(&items, &amount("-25.00"));

    assert_eq!(totals.discount_amount, Decimal::ZERO);
    assert_eq!(totals.total, d("118.00"));
}

#[test]
fn discount_against_empty_document_does_not_divide_by_zero() {
    let totals = calculate_totals(&[], &percent("10"));

    assert_eq!(totals.subtotal, Decimal::ZERO);
    assert_eq!(totals.discount_amount, Decimal::ZERO);
    assert_eq!(totals.total, Decimal::ZERO);
}

#[test]
fn midpoints_round_away_from_zero() {
    let items = [line("1", "0.125", "0")];
    let totals = calculate_totals(&items, &DiscountInput::default());

    assert_eq!(totals.subtotal, d("0.13"));
    assert_eq!(totals.total, d("0.13"));
}

#[test]
fn identical_inputs_produce_identical_outputs() {
    let items = [
        line("3", "33.33", "0.18"),
        line("7", "1.99", "0.05"),
        line("1", "250.00", "0.00"),
    ];
    let discount = percent("12.5");

    let first = calculate_totals(&items, &discount);
    let second = calculate_totals(&items, &discount);

    assert_eq!(first, second);
}

#[test]
fn totals_satisfy_arithmetic_invariants() {
    let items = [
        line("2", "49.99", "0.18"),
        line("5", "7.25", "0.05"),
        line("1", "120.00", "0.00"),
    ];
    let totals = calculate_totals(&items, &percent("7"));

    assert!(totals.discount_amount <= totals.subtotal);
    assert!(totals.taxable >= Decimal::ZERO);
    assert_eq!(
        totals.total,
        totals.taxable + totals.vat_amount,
        "total must equal taxable plus VAT"
    );
    let bucket_vat_sum: Decimal = totals.vat_breakdown.iter().map(|b| b.vat).sum();
    assert_eq!(
        totals.vat_amount, bucket_vat_sum,
        "VAT total must equal the sum of the per-rate breakdown"
    );
}
