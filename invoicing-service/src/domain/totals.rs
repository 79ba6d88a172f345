//! Document totals calculator.
//!
//! Turns a list of line items plus an optional document-level discount into
//! net/VAT/gross totals. Mixed VAT rates are supported by bucketing line
//! nets per rate; the discount applies pre-VAT and is allocated across the
//! rate buckets proportionally to each bucket's share of the subtotal.
//!
//! Rounding policy: accumulation runs at full `Decimal` precision and
//! amounts are rounded to 2 decimals half-up only at publication points
//! (subtotal, discount, per-bucket VAT, final taxable/total). Rounding each
//! bucket's VAT before summing keeps the total consistent with any per-rate
//! breakdown shown alongside it.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Round a monetary amount to 2 decimals, half-up.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Ephemeral line item input. `vat_rate` is a fraction in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineInput {
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub vat_rate: Decimal,
}

impl LineInput {
    pub fn net(&self) -> Decimal {
        self.quantity * self.unit_price
    }
}

/// Document-level discount type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    None,
    Amount,
    Percent,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::None => "none",
            DiscountType::Amount => "amount",
            DiscountType::Percent => "percent",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "amount" => DiscountType::Amount,
            "percent" => DiscountType::Percent,
            _ => DiscountType::None,
        }
    }
}

/// Document-level discount, applied pre-VAT. `value` is a flat currency
/// amount for `Amount` and a 0-100 percentage for `Percent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountInput {
    pub discount_type: DiscountType,
    pub value: Decimal,
}

impl Default for DiscountInput {
    fn default() -> Self {
        Self {
            discount_type: DiscountType::None,
            value: Decimal::ZERO,
        }
    }
}

/// Per-rate breakdown row, all amounts rounded to 2 decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatBucket {
    pub rate: Decimal,
    pub net: Decimal,
    pub discount: Decimal,
    pub taxable: Decimal,
    pub vat: Decimal,
}

/// Computed document totals. Invariants for any input:
/// `discount_amount <= subtotal`, `taxable = subtotal - discount_amount`
/// (up to rounding), `total = taxable + vat_amount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub taxable: Decimal,
    pub vat_amount: Decimal,
    pub total: Decimal,
    pub vat_breakdown: Vec<VatBucket>,
}

impl InvoiceTotals {
    pub fn zero() -> Self {
        Self {
            subtotal: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            taxable: Decimal::ZERO,
            vat_amount: Decimal::ZERO,
            total: Decimal::ZERO,
            vat_breakdown: Vec::new(),
        }
    }
}

/// Compute the discount amount against a subtotal, clamped so that the
/// taxable amount can never go negative.
fn discount_amount(discount: &DiscountInput, subtotal: Decimal) -> Decimal {
    let raw = match discount.discount_type {
        DiscountType::None => Decimal::ZERO,
        DiscountType::Percent => {
            let pct = discount.value.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
            round_money(pct / Decimal::ONE_HUNDRED * subtotal)
        }
        DiscountType::Amount => round_money(discount.value.clamp(Decimal::ZERO, subtotal)),
    };
    raw.min(subtotal)
}

/// Calculate document totals from line items and an optional discount.
///
/// Pure and deterministic: identical inputs always produce identical
/// outputs. An empty item list yields all-zero totals rather than an error.
/// Negative inputs are not rejected here; item-level validation is the
/// caller's concern.
pub fn calculate_totals(items: &[LineInput], discount: &DiscountInput) -> InvoiceTotals {
    // Accumulate at full precision; bucket nets by distinct VAT rate.
    let mut subtotal_raw = Decimal::ZERO;
    let mut buckets: BTreeMap<Decimal, Decimal> = BTreeMap::new();
    for item in items {
        let net = item.net();
        subtotal_raw += net;
        *buckets.entry(item.vat_rate).or_insert(Decimal::ZERO) += net;
    }

    let subtotal = round_money(subtotal_raw);
    let discount_amount = discount_amount(discount, subtotal);

    let mut taxable_raw = Decimal::ZERO;
    let mut vat_amount = Decimal::ZERO;
    let mut vat_breakdown = Vec::with_capacity(buckets.len());

    for (rate, rate_net) in &buckets {
        // Proportional share of the discount; zero when the subtotal is
        // zero so a discount against an empty document cannot divide by
        // zero.
        let share = if subtotal_raw.is_zero() {
            Decimal::ZERO
        } else {
            discount_amount * rate_net / subtotal_raw
        };
        let bucket_taxable = (rate_net - share).max(Decimal::ZERO);
        let bucket_vat = round_money(bucket_taxable * rate);

        taxable_raw += bucket_taxable;
        vat_amount += bucket_vat;

        vat_breakdown.push(VatBucket {
            rate: *rate,
            net: round_money(*rate_net),
            discount: round_money(share),
            taxable: round_money(bucket_taxable),
            vat: bucket_vat,
        });
    }

    let taxable = round_money(taxable_raw);
    let total = round_money(taxable + vat_amount);

    InvoiceTotals {
        subtotal,
        discount_amount,
        taxable,
        vat_amount,
        total,
        vat_breakdown,
    }
}
