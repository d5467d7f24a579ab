use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Money, SharePrice};

/// The eight buckets of a priced-round cap table, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShareClassKind {
    Founders,
    Common,
    Warrants,
    GrantedOptions,
    OptionsAvailableBefore,
    NewOptions,
    ConvertibleNotes,
    NewMoney,
}

impl ShareClassKind {
    pub const ALL: [ShareClassKind; 8] = [
        ShareClassKind::Founders,
        ShareClassKind::Common,
        ShareClassKind::Warrants,
        ShareClassKind::GrantedOptions,
        ShareClassKind::OptionsAvailableBefore,
        ShareClassKind::NewOptions,
        ShareClassKind::ConvertibleNotes,
        ShareClassKind::NewMoney,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ShareClassKind::Founders => "Founders' Shares",
            ShareClassKind::Common => "Rest of Common",
            ShareClassKind::Warrants => "Warrants",
            ShareClassKind::GrantedOptions => "Granted Options",
            ShareClassKind::OptionsAvailableBefore => "Options Available Before",
            ShareClassKind::NewOptions => "New Options for Pool",
            ShareClassKind::ConvertibleNotes => "Convertible Notes",
            ShareClassKind::NewMoney => "New Money Equity",
        }
    }

    /// Classes created by the round hold nothing pre-money.
    pub fn is_issued_in_round(&self) -> bool {
        matches!(
            self,
            ShareClassKind::NewOptions | ShareClassKind::ConvertibleNotes | ShareClassKind::NewMoney
        )
    }
}

/// One bucket of shares before and after the round.
///
/// Ownership, value and dilution figures are computed from totals passed in by
/// the caller, since those are only known once every class exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareClass {
    pub name: String,
    pub kind: ShareClassKind,
    pub pre_money_shares: u64,
    pub post_money_shares: u64,
}

impl ShareClass {
    /// A pre-existing class whose holding is unchanged by the round.
    pub fn existing(kind: ShareClassKind, shares: u64) -> Self {
        ShareClass {
            name: kind.label().to_string(),
            kind,
            pre_money_shares: shares,
            post_money_shares: shares,
        }
    }

    /// A class created by the round. Pre-money shares are always zero.
    pub fn issued(kind: ShareClassKind, shares: u64) -> Self {
        ShareClass {
            name: kind.label().to_string(),
            kind,
            pre_money_shares: 0,
            post_money_shares: shares,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn pre(&self) -> Decimal {
        Decimal::from(self.pre_money_shares)
    }

    fn post(&self) -> Decimal {
        Decimal::from(self.post_money_shares)
    }

    pub fn pre_money_percent_ownership(&self, total_pre_money_shares: u64) -> Decimal {
        fraction(self.pre(), total_pre_money_shares)
    }

    pub fn pre_money_ownership_value(&self, pre_money_share_price: SharePrice) -> Money {
        pre_money_share_price * self.pre()
    }

    pub fn post_money_percent_ownership(&self, total_post_money_shares: u64) -> Decimal {
        fraction(self.post(), total_post_money_shares)
    }

    pub fn post_money_ownership_value(&self, share_price_for_financing: SharePrice) -> Money {
        share_price_for_financing * self.post()
    }

    pub fn post_money_percent_change(
        &self,
        total_pre_money_shares: u64,
        total_post_money_shares: u64,
    ) -> Decimal {
        self.post_money_percent_ownership(total_post_money_shares)
            - self.pre_money_percent_ownership(total_pre_money_shares)
    }

    pub fn post_money_value_change(
        &self,
        pre_money_share_price: SharePrice,
        share_price_for_financing: SharePrice,
    ) -> Money {
        self.post_money_ownership_value(share_price_for_financing)
            - self.pre_money_ownership_value(pre_money_share_price)
    }

    /// Relative change in ownership: `percent_change / pre_money_percent`.
    ///
    /// With no pre-money baseline this is an IEEE division by zero: a positive
    /// post-money stake gives `+inf`, a class empty on both sides gives NaN.
    pub fn post_money_dilution(
        &self,
        total_pre_money_shares: u64,
        total_post_money_shares: u64,
    ) -> f64 {
        let pre_pct = self.pre_money_percent_ownership(total_pre_money_shares);
        let change = self.post_money_percent_change(total_pre_money_shares, total_post_money_shares);
        if pre_pct.is_zero() {
            return change.to_f64().unwrap_or(f64::NAN) / 0.0;
        }
        (change / pre_pct).to_f64().unwrap_or(f64::NAN)
    }
}

fn fraction(shares: Decimal, total: u64) -> Decimal {
    if total == 0 {
        return Decimal::ZERO;
    }
    shares / Decimal::from(total)
}

/// Serialises dilution figures, writing non-finite values as strings
/// ("Infinity", "-Infinity", "NaN") since JSON numbers cannot hold them.
pub mod dilution_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_sign_positive() {
            serializer.serialize_str("Infinity")
        } else {
            serializer.serialize_str("-Infinity")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(n),
            Repr::Text(s) => match s.as_str() {
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                "NaN" => Ok(f64::NAN),
                other => other.parse::<f64>().map_err(serde::de::Error::custom),
            },
        }
    }
}
