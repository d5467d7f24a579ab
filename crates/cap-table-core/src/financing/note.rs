use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::CapTableError;
use crate::financing::organization::NoteTerms;
use crate::interest::accrued_interest;
use crate::rounding::as_share_count;
use crate::types::{checked_div, with_metadata, ComputationOutput, Money, Rate, SharePrice};
use crate::CapTableResult;

// ---------------------------------------------------------------------------
// Conversion variants
// ---------------------------------------------------------------------------

/// How a note prices its conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversionTerms {
    /// Round price less the conversion discount.
    DiscountOnly,
    /// Better of the discount and a valuation cap.
    Capped { valuation_cap: Money },
}

/// Which term produced the effective conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversionMethod {
    Discount,
    Cap,
}

/// The inputs every conversion query depends on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConversionContext {
    /// Trial (or final) share price for the financing.
    pub share_price: SharePrice,
    /// Total pre-money shares.
    pub pre_money_shares: Decimal,
    /// New option-pool shares implied by `share_price`.
    pub new_option_pool_shares: Decimal,
}

/// Price, share count and value for one way of converting a note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConversionOutcome {
    pub price: SharePrice,
    pub shares: Decimal,
    pub value: Money,
}

// ---------------------------------------------------------------------------
// Note
// ---------------------------------------------------------------------------

/// A convertible note ready to convert: dates resolved, conversion amount fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub name: String,
    pub principal: Money,
    pub discount: Rate,
    pub accrued_interest: Money,
    conversion_amount: Money,
    pub terms: ConversionTerms,
}

impl Note {
    /// Build a note from its terms. Missing dates default to `valuation_date`.
    pub fn from_terms(terms: &NoteTerms, valuation_date: NaiveDate) -> CapTableResult<Self> {
        terms.validate()?;

        let (accrued, conversion_amount) = match terms.conversion_amount {
            Some(amount) => (Decimal::ZERO, amount),
            None => {
                let interest = match terms.interest_rate {
                    Some(rate) if terms.interest_converts.unwrap_or(true) => {
                        let start = terms.interest_start_date.unwrap_or(valuation_date);
                        let end = terms.conversion_date.unwrap_or(valuation_date);
                        accrued_interest(terms.principal_invested, rate, start, end)?
                    }
                    _ => Decimal::ZERO,
                };
                (interest, terms.principal_invested + interest)
            }
        };

        let conversion_terms = match terms.valuation_cap {
            Some(valuation_cap) => ConversionTerms::Capped { valuation_cap },
            None => ConversionTerms::DiscountOnly,
        };

        Ok(Note {
            name: terms.name.clone().unwrap_or_default(),
            principal: terms.principal_invested,
            discount: terms.conversion_discount,
            accrued_interest: accrued,
            conversion_amount,
            terms: conversion_terms,
        })
    }

    /// Principal plus converting interest, or the explicit override amount.
    pub fn conversion_amount(&self) -> Money {
        self.conversion_amount
    }

    pub fn valuation_cap(&self) -> Option<Money> {
        match self.terms {
            ConversionTerms::Capped { valuation_cap } => Some(valuation_cap),
            ConversionTerms::DiscountOnly => None,
        }
    }

    /// Conversion at the discounted round price.
    ///
    /// The value is `amount / (1 - discount)` and is deliberately left
    /// unrounded to stay in step with the reference spreadsheets.
    pub fn discount_outcome(&self, ctx: &ConversionContext) -> CapTableResult<ConversionOutcome> {
        let retained = Decimal::ONE - self.discount;
        let price = ctx.share_price * retained;
        let shares = as_share_count(checked_div(
            self.conversion_amount,
            price,
            "note discount price",
        )?);
        let value = checked_div(self.conversion_amount, retained, "note discount value")?;
        Ok(ConversionOutcome {
            price,
            shares,
            value,
        })
    }

    /// Conversion at the cap price, or `None` for a discount-only note.
    ///
    /// The cap is spread over pre-money shares plus the new pool shares.
    pub fn cap_outcome(
        &self,
        ctx: &ConversionContext,
    ) -> CapTableResult<Option<ConversionOutcome>> {
        let valuation_cap = match self.terms {
            ConversionTerms::Capped { valuation_cap } => valuation_cap,
            ConversionTerms::DiscountOnly => return Ok(None),
        };
        let share_base = ctx.pre_money_shares + ctx.new_option_pool_shares;
        if share_base.is_zero() {
            return Err(CapTableError::Configuration(format!(
                "note '{}' has a valuation cap but the pre-money share base is zero",
                self.name
            )));
        }
        let price = valuation_cap / share_base;
        let shares = as_share_count(checked_div(self.conversion_amount, price, "note cap price")?);
        let value = self.conversion_amount * checked_div(ctx.share_price, price, "note cap price")?;
        Ok(Some(ConversionOutcome {
            price,
            shares,
            value,
        }))
    }

    /// Effective outcome: lowest price, most shares, highest value.
    ///
    /// Shares and value are each the maximum of the two computations rather
    /// than re-derived from the winning price, because the cap and discount
    /// terms use different share bases.
    pub fn outcome(&self, ctx: &ConversionContext) -> CapTableResult<ConversionOutcome> {
        let discount = self.discount_outcome(ctx)?;
        Ok(match self.cap_outcome(ctx)? {
            Some(cap) => ConversionOutcome {
                price: discount.price.min(cap.price),
                shares: discount.shares.max(cap.shares),
                value: discount.value.max(cap.value),
            },
            None => discount,
        })
    }

    pub fn price(&self, ctx: &ConversionContext) -> CapTableResult<SharePrice> {
        Ok(self.outcome(ctx)?.price)
    }

    pub fn shares(&self, ctx: &ConversionContext) -> CapTableResult<Decimal> {
        Ok(self.outcome(ctx)?.shares)
    }

    pub fn value(&self, ctx: &ConversionContext) -> CapTableResult<Money> {
        Ok(self.outcome(ctx)?.value)
    }

    /// The term that yields more shares; the discount wins ties.
    pub fn method(&self, ctx: &ConversionContext) -> CapTableResult<ConversionMethod> {
        let discount = self.discount_outcome(ctx)?;
        Ok(match self.cap_outcome(ctx)? {
            Some(cap) if cap.shares > discount.shares => ConversionMethod::Cap,
            _ => ConversionMethod::Discount,
        })
    }
}

// ---------------------------------------------------------------------------
// Single-note conversion
// ---------------------------------------------------------------------------

/// Input for converting one note at a given round price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteConversionInput {
    pub note: NoteTerms,
    /// Share price for the financing.
    pub share_price: SharePrice,
    /// Total pre-money shares.
    pub pre_money_shares: u64,
    /// New option-pool shares created in the round.
    #[serde(default)]
    pub new_option_pool_shares: u64,
    /// Date that stands in for missing note dates. Defaults to today.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valuation_date: Option<NaiveDate>,
}

/// Output of a single-note conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteConversionOutput {
    pub conversion_amount: Money,
    pub accrued_interest: Money,
    pub discount: ConversionOutcome,
    /// Cap outcome (if a cap is provided).
    pub cap: Option<ConversionOutcome>,
    pub effective: ConversionOutcome,
    pub method_used: ConversionMethod,
}

/// Convert a single note at a fixed share price, showing both terms.
pub fn convert_note(
    input: &NoteConversionInput,
) -> CapTableResult<ComputationOutput<NoteConversionOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.share_price <= Decimal::ZERO {
        return Err(CapTableError::InvalidInput {
            field: "share_price".into(),
            reason: "Share price must be positive".into(),
        });
    }
    if input.pre_money_shares == 0 {
        return Err(CapTableError::Configuration(
            "total pre-money shares is 0".into(),
        ));
    }

    let valuation_date = input
        .valuation_date
        .unwrap_or_else(|| Utc::now().date_naive());
    let note = Note::from_terms(&input.note, valuation_date)?;

    if note.conversion_amount().is_zero() {
        warnings.push("Conversion amount is zero; note converts into no shares".into());
    }
    if note.discount.is_zero() && note.valuation_cap().is_none() {
        warnings.push("No valuation cap and zero discount; converting at round price".into());
    }
    if input.note.interest_converts == Some(false) && input.note.interest_rate.is_some() {
        warnings.push("Interest does not convert; only principal is converted".into());
    }

    let ctx = ConversionContext {
        share_price: input.share_price,
        pre_money_shares: Decimal::from(input.pre_money_shares),
        new_option_pool_shares: Decimal::from(input.new_option_pool_shares),
    };

    let output = NoteConversionOutput {
        conversion_amount: note.conversion_amount(),
        accrued_interest: note.accrued_interest,
        discount: note.discount_outcome(&ctx)?,
        cap: note.cap_outcome(&ctx)?,
        effective: note.outcome(&ctx)?,
        method_used: note.method(&ctx)?,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Convertible Note Conversion (discount vs. valuation cap)",
        &serde_json::json!({
            "principal_invested": input.note.principal_invested.to_string(),
            "conversion_discount": input.note.conversion_discount.to_string(),
            "valuation_cap": input.note.valuation_cap.map(|c| c.to_string()),
            "share_price": input.share_price.to_string(),
            "pre_money_shares": input.pre_money_shares,
            "new_option_pool_shares": input.new_option_pool_shares,
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const PRINCIPAL: Decimal = dec!(500_000);
    const DISCOUNT: Decimal = dec!(0.2);

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 12, 17).unwrap()
    }

    // Share price 2.50, 10M pre-money shares, 100k new pool shares
    fn ctx() -> ConversionContext {
        ConversionContext {
            share_price: dec!(2.5),
            pre_money_shares: dec!(10_000_000),
            new_option_pool_shares: dec!(100_000),
        }
    }

    fn note(terms: NoteTerms) -> Note {
        Note::from_terms(&terms, today()).unwrap()
    }

    #[test]
    fn test_uncapped_without_interest() {
        let n = note(NoteTerms::new(PRINCIPAL, DISCOUNT));
        assert_eq!(n.conversion_amount(), PRINCIPAL);
        assert_eq!(n.terms, ConversionTerms::DiscountOnly);

        let out = n.outcome(&ctx()).unwrap();
        // 2.50 * 0.8 = 2.00; 500k / 2.00 = 250k shares; value = 500k / 0.8
        assert_eq!(out.price, dec!(2.00));
        assert_eq!(out.shares, dec!(250_000));
        assert_eq!(out.value, dec!(625_000));
    }

    #[test]
    fn test_discount_price_scales_with_share_price() {
        let n = note(NoteTerms::new(PRINCIPAL, DISCOUNT));
        let mut c = ctx();
        c.share_price = dec!(2500);
        assert_eq!(n.price(&c).unwrap(), dec!(2000));
    }

    #[test]
    fn test_uncapped_with_interest() {
        let start = NaiveDate::from_ymd_opt(2018, 12, 17).unwrap();
        let n = note(NoteTerms::new(PRINCIPAL, DISCOUNT).with_interest(dec!(0.06), start));
        // 5 years of 6% simple interest
        assert_eq!(n.accrued_interest, dec!(150_000));
        assert_eq!(n.conversion_amount(), dec!(650_000));
        assert_eq!(n.shares(&ctx()).unwrap(), dec!(325_000));
        assert_eq!(n.value(&ctx()).unwrap(), dec!(812_500));
    }

    #[test]
    fn test_interest_not_converting() {
        let start = NaiveDate::from_ymd_opt(2018, 12, 17).unwrap();
        let mut terms = NoteTerms::new(PRINCIPAL, DISCOUNT).with_interest(dec!(0.06), start);
        terms.interest_converts = Some(false);
        let n = note(terms);
        assert_eq!(n.accrued_interest, Decimal::ZERO);
        assert_eq!(n.conversion_amount(), PRINCIPAL);
    }

    #[test]
    fn test_conversion_amount_override() {
        let start = NaiveDate::from_ymd_opt(2018, 12, 17).unwrap();
        let n = note(
            NoteTerms::new(PRINCIPAL, DISCOUNT)
                .with_interest(dec!(0.06), start)
                .with_conversion_amount(dec!(700_000)),
        );
        assert_eq!(n.conversion_amount(), dec!(700_000));
        assert_eq!(n.accrued_interest, Decimal::ZERO);
    }

    #[test]
    fn test_conversion_before_interest_start_is_error() {
        let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let terms = NoteTerms::new(PRINCIPAL, DISCOUNT).with_interest(dec!(0.06), start);
        assert!(matches!(
            Note::from_terms(&terms, today()),
            Err(CapTableError::DateError(_))
        ));
    }

    #[test]
    fn test_missing_dates_accrue_nothing() {
        let mut terms = NoteTerms::new(PRINCIPAL, DISCOUNT);
        terms.interest_rate = Some(dec!(0.08));
        let n = note(terms);
        assert_eq!(n.conversion_amount(), PRINCIPAL);
    }

    #[test]
    fn test_favorable_cap() {
        let n = note(NoteTerms::new(PRINCIPAL, DISCOUNT).with_cap(dec!(5_000_000)));
        let c = ctx();
        // cap price = 5M / 10.1M
        let cap_price = dec!(5_000_000) / dec!(10_100_000);
        let out = n.outcome(&c).unwrap();
        assert_eq!(out.price, cap_price);
        assert_eq!(out.shares, dec!(1_010_000));
        assert_eq!(out.value, PRINCIPAL * (dec!(2.5) / cap_price));
        assert_eq!(n.method(&c).unwrap(), ConversionMethod::Cap);
    }

    #[test]
    fn test_favorable_discount() {
        let n = note(NoteTerms::new(PRINCIPAL, DISCOUNT).with_cap(dec!(500_000_000)));
        let c = ctx();
        let out = n.outcome(&c).unwrap();
        assert_eq!(out.price, dec!(2.00));
        assert_eq!(out.shares, dec!(250_000));
        assert_eq!(out.value, dec!(625_000));
        assert_eq!(n.method(&c).unwrap(), ConversionMethod::Discount);
    }

    #[test]
    fn test_capped_shares_are_max_not_amount_over_min_price() {
        // Pool shares enter the cap base only, so shares are taken as the max of
        // the two share counts rather than amount / effective price.
        let n = note(NoteTerms::new(PRINCIPAL, DISCOUNT).with_cap(dec!(5_000_000)));
        let c = ConversionContext {
            share_price: dec!(2.12856),
            pre_money_shares: dec!(10_000_000),
            new_option_pool_shares: dec!(2_812_767),
        };
        let discount = n.discount_outcome(&c).unwrap();
        let cap = n.cap_outcome(&c).unwrap().unwrap();
        let out = n.outcome(&c).unwrap();
        assert_eq!(discount.shares, dec!(293_626));
        assert_eq!(cap.shares, dec!(1_281_277));
        assert_eq!(out.shares, cap.shares);
        assert_eq!(out.price, cap.price);
        assert_eq!(out.value, cap.value.max(discount.value));
    }

    #[test]
    fn test_zero_discount_no_cap_converts_at_round_price() {
        let n = note(NoteTerms::new(PRINCIPAL, Decimal::ZERO));
        assert_eq!(n.price(&ctx()).unwrap(), dec!(2.5));
        assert_eq!(n.shares(&ctx()).unwrap(), dec!(200_000));
    }

    #[test]
    fn test_cap_with_zero_share_base() {
        let n = note(NoteTerms::new(PRINCIPAL, DISCOUNT).with_cap(dec!(5_000_000)));
        let c = ConversionContext {
            share_price: dec!(2.5),
            pre_money_shares: Decimal::ZERO,
            new_option_pool_shares: Decimal::ZERO,
        };
        assert!(matches!(
            n.cap_outcome(&c),
            Err(CapTableError::Configuration(_))
        ));
    }

    #[test]
    fn test_zero_share_price_is_error() {
        let n = note(NoteTerms::new(PRINCIPAL, DISCOUNT));
        let mut c = ctx();
        c.share_price = Decimal::ZERO;
        assert!(n.shares(&c).is_err());
    }

    #[test]
    fn test_convert_note_envelope() {
        let input = NoteConversionInput {
            note: NoteTerms::new(PRINCIPAL, DISCOUNT).with_cap(dec!(5_000_000)),
            share_price: dec!(2.5),
            pre_money_shares: 10_000_000,
            new_option_pool_shares: 100_000,
            valuation_date: Some(today()),
        };
        let result = convert_note(&input).unwrap();
        let out = &result.result;
        assert_eq!(out.method_used, ConversionMethod::Cap);
        assert_eq!(out.discount.shares, dec!(250_000));
        assert_eq!(out.effective.shares, dec!(1_010_000));
        assert!(out.cap.is_some());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_convert_note_round_price_warning() {
        let input = NoteConversionInput {
            note: NoteTerms::new(PRINCIPAL, Decimal::ZERO),
            share_price: dec!(2.5),
            pre_money_shares: 10_000_000,
            new_option_pool_shares: 0,
            valuation_date: Some(today()),
        };
        let result = convert_note(&input).unwrap();
        assert!(result.warnings.iter().any(|w| w.contains("round price")));
        assert!(result.result.cap.is_none());
    }

    #[test]
    fn test_convert_note_rejects_zero_shares() {
        let input = NoteConversionInput {
            note: NoteTerms::new(PRINCIPAL, DISCOUNT),
            share_price: dec!(2.5),
            pre_money_shares: 0,
            new_option_pool_shares: 0,
            valuation_date: Some(today()),
        };
        assert!(matches!(
            convert_note(&input),
            Err(CapTableError::Configuration(_))
        ));
    }
}
