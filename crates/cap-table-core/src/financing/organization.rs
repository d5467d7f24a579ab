use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CapTableError;
use crate::types::{Money, Rate};
use crate::CapTableResult;

fn default_true() -> bool {
    true
}

/// Terms of a single convertible note as entered by the caller.
///
/// A note without `valuation_cap` is discount-only; with a cap it converts at
/// whichever of cap or discount gives the holder more shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteTerms {
    /// Display label, e.g. "Seed note (Angel A)".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Principal invested.
    pub principal_invested: Money,
    /// Conversion discount (0.20 = 20% off the round price), in [0, 1).
    #[serde(default)]
    pub conversion_discount: Rate,
    /// Valuation cap. Presence selects the capped variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valuation_cap: Option<Money>,
    /// Annual simple interest rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_rate: Option<Rate>,
    /// Date interest starts accruing. Defaults to the valuation date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_start_date: Option<NaiveDate>,
    /// Date the note converts. Defaults to the valuation date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion_date: Option<NaiveDate>,
    /// Explicit conversion amount; replaces principal + interest entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion_amount: Option<Money>,
    /// Whether accrued interest converts along with principal (default true).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_converts: Option<bool>,
}

impl NoteTerms {
    pub fn new(principal_invested: Money, conversion_discount: Rate) -> Self {
        NoteTerms {
            name: None,
            principal_invested,
            conversion_discount,
            valuation_cap: None,
            interest_rate: None,
            interest_start_date: None,
            conversion_date: None,
            conversion_amount: None,
            interest_converts: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_cap(mut self, valuation_cap: Money) -> Self {
        self.valuation_cap = Some(valuation_cap);
        self
    }

    pub fn with_interest(mut self, rate: Rate, start: NaiveDate) -> Self {
        self.interest_rate = Some(rate);
        self.interest_start_date = Some(start);
        self
    }

    pub fn converting_on(mut self, date: NaiveDate) -> Self {
        self.conversion_date = Some(date);
        self
    }

    pub fn with_conversion_amount(mut self, amount: Money) -> Self {
        self.conversion_amount = Some(amount);
        self
    }

    pub fn validate(&self) -> CapTableResult<()> {
        if self.principal_invested.is_sign_negative() && !self.principal_invested.is_zero() {
            return Err(CapTableError::InvalidInput {
                field: "principal_invested".into(),
                reason: "Principal cannot be negative".into(),
            });
        }
        if self.conversion_discount < Decimal::ZERO || self.conversion_discount >= Decimal::ONE {
            return Err(CapTableError::InvalidInput {
                field: "conversion_discount".into(),
                reason: "Conversion discount must be in [0, 1)".into(),
            });
        }
        if let Some(cap) = self.valuation_cap {
            if cap <= Decimal::ZERO {
                return Err(CapTableError::InvalidInput {
                    field: "valuation_cap".into(),
                    reason: "Valuation cap must be positive".into(),
                });
            }
        }
        if let Some(rate) = self.interest_rate {
            if rate < Decimal::ZERO {
                return Err(CapTableError::InvalidInput {
                    field: "interest_rate".into(),
                    reason: "Interest rate cannot be negative".into(),
                });
            }
        }
        if let Some(amount) = self.conversion_amount {
            if amount < Decimal::ZERO {
                return Err(CapTableError::InvalidInput {
                    field: "conversion_amount".into(),
                    reason: "Conversion amount cannot be negative".into(),
                });
            }
        }
        Ok(())
    }
}

/// Round terms and the pre-money capitalisation of the company.
///
/// Read-only to the engine: each scenario gets its own `Organization`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Label for the class issued to new money, e.g. "Series A".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_share_class: Option<String>,
    pub pre_money_valuation: Money,
    pub new_money_raised: Money,
    /// Target option pool as a fraction of post-money shares, in [0, 1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_money_option_pool_size: Option<Rate>,
    /// Grow the pool to its target in this round.
    #[serde(default = "default_true")]
    pub expand_option_pool: bool,
    /// Convert the outstanding notes in this round.
    #[serde(default = "default_true")]
    pub note_conversion: bool,
    #[serde(default)]
    pub founders_shares: u64,
    #[serde(default)]
    pub common_shares: u64,
    #[serde(default)]
    pub warrants_shares: u64,
    #[serde(default)]
    pub granted_options_shares: u64,
    /// Unallocated pool before the round.
    #[serde(default)]
    pub old_options_shares: u64,
    #[serde(default)]
    pub notes: Vec<NoteTerms>,
}

impl Organization {
    /// Sum of the five pre-existing share buckets.
    pub fn total_pre_money_shares(&self) -> CapTableResult<u64> {
        [
            self.founders_shares,
            self.common_shares,
            self.warrants_shares,
            self.granted_options_shares,
            self.old_options_shares,
        ]
        .iter()
        .try_fold(0u64, |acc, n| acc.checked_add(*n))
        .ok_or_else(|| {
            CapTableError::Configuration("total pre-money shares overflow".into())
        })
    }

    /// The pool target in effect for this round, if the pool expands at all.
    pub fn option_pool_target(&self) -> Option<Rate> {
        match self.post_money_option_pool_size {
            Some(size) if self.expand_option_pool && size > Decimal::ZERO => Some(size),
            _ => None,
        }
    }

    pub fn post_money_valuation(&self) -> Money {
        self.pre_money_valuation + self.new_money_raised
    }

    pub fn validate(&self) -> CapTableResult<()> {
        if self.pre_money_valuation <= Decimal::ZERO {
            return Err(CapTableError::InvalidInput {
                field: "pre_money_valuation".into(),
                reason: "Pre-money valuation must be positive".into(),
            });
        }
        if self.new_money_raised < Decimal::ZERO {
            return Err(CapTableError::InvalidInput {
                field: "new_money_raised".into(),
                reason: "New money raised cannot be negative".into(),
            });
        }
        if let Some(size) = self.post_money_option_pool_size {
            if size < Decimal::ZERO || size >= Decimal::ONE {
                return Err(CapTableError::InvalidInput {
                    field: "post_money_option_pool_size".into(),
                    reason: "Option pool target must be in [0, 1)".into(),
                });
            }
        }
        for (i, note) in self.notes.iter().enumerate() {
            note.validate().map_err(|e| match e {
                CapTableError::InvalidInput { field, reason } => CapTableError::InvalidInput {
                    field: format!("notes[{i}].{field}"),
                    reason,
                },
                other => other,
            })?;
        }
        Ok(())
    }
}
