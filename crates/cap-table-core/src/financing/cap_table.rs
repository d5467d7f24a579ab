use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::error::CapTableError;
use crate::financing::note::{ConversionContext, ConversionMethod, Note};
use crate::financing::organization::Organization;
use crate::financing::share_class::{dilution_serde, ShareClass, ShareClassKind};
use crate::iterate::{iterate, DEFAULT_DECIMALS, DEFAULT_MAX_ITERATIONS};
use crate::rounding::{as_currency, as_share_count, round_to};
use crate::types::{checked_div, shares_to_u64, with_metadata, ComputationOutput, Money, SharePrice};
use crate::CapTableResult;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Budget and precision of the share-price fixed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub max_iterations: u32,
    /// Decimal places each guess is rounded to before comparison.
    pub decimals: u32,
}

impl Default for SolverSettings {
    fn default() -> Self {
        SolverSettings {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            decimals: DEFAULT_DECIMALS,
        }
    }
}

// ---------------------------------------------------------------------------
// Share-price solver
// ---------------------------------------------------------------------------

/// The circular system behind the round price: pool top-up and note
/// conversions both depend on the price, and the price depends on them.
struct PriceSolver<'a> {
    organization: &'a Organization,
    notes: &'a [Note],
    total_pre_money_shares: Decimal,
}

impl PriceSolver<'_> {
    /// Shares needed to lift the pool to its post-money target at `price`.
    ///
    /// `(pre_money + new_money) / price` is the post-money share count implied
    /// by `price`; the existing unallocated pool counts toward the target. A
    /// pool already above target is never shrunk.
    fn unclamped_new_option_pool_shares(&self, price: SharePrice) -> CapTableResult<Decimal> {
        let Some(target) = self.organization.option_pool_target() else {
            return Ok(Decimal::ZERO);
        };
        let total_post_money_shares = checked_div(
            self.organization.post_money_valuation(),
            price,
            "option pool sizing",
        )?;
        Ok(as_share_count(
            target * total_post_money_shares
                - Decimal::from(self.organization.old_options_shares),
        ))
    }

    fn new_option_pool_shares(&self, price: SharePrice) -> CapTableResult<Decimal> {
        Ok(self.unclamped_new_option_pool_shares(price)?.max(Decimal::ZERO))
    }

    fn context(&self, price: SharePrice, new_option_pool_shares: Decimal) -> ConversionContext {
        ConversionContext {
            share_price: price,
            pre_money_shares: self.total_pre_money_shares,
            new_option_pool_shares,
        }
    }

    fn note_shares(&self, price: SharePrice, new_option_pool_shares: Decimal) -> CapTableResult<Decimal> {
        let ctx = self.context(price, new_option_pool_shares);
        self.notes
            .iter()
            .try_fold(Decimal::ZERO, |acc, note| Ok(acc + note.shares(&ctx)?))
    }

    /// One fixed-point step: the price at which the pre-money valuation buys
    /// every share that exists before new money comes in.
    fn step(&self, price: SharePrice) -> CapTableResult<SharePrice> {
        let new_options = self.new_option_pool_shares(price)?;
        let note_shares = self.note_shares(price, new_options)?;
        let total_shares_before_new_money =
            self.total_pre_money_shares + new_options + note_shares;
        checked_div(
            self.organization.pre_money_valuation,
            total_shares_before_new_money,
            "share price step",
        )
    }
}

// ---------------------------------------------------------------------------
// Cap table
// ---------------------------------------------------------------------------

/// Final conversion of one note at the solved share price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteConversion {
    pub name: String,
    pub principal: Money,
    pub accrued_interest: Money,
    pub conversion_amount: Money,
    pub conversion_price: SharePrice,
    pub shares: u64,
    pub value: Money,
    pub method: ConversionMethod,
}

/// A solved priced round.
///
/// Construction runs the whole computation; a changed organization needs a new
/// `CapTable`.
#[derive(Debug, Clone)]
pub struct CapTable {
    organization: Organization,
    notes: Vec<Note>,
    note_conversions: Vec<NoteConversion>,
    share_classes: Vec<ShareClass>,
    total_pre_money_shares: u64,
    total_post_money_shares: u64,
    pre_money_share_price: SharePrice,
    share_price_for_financing: SharePrice,
    warnings: Vec<String>,
}

impl CapTable {
    /// Solve with default settings, resolving missing note dates to today.
    pub fn new(organization: Organization) -> CapTableResult<Self> {
        Self::with_settings(organization, SolverSettings::default())
    }

    pub fn with_settings(organization: Organization, settings: SolverSettings) -> CapTableResult<Self> {
        Self::as_of(organization, settings, Utc::now().date_naive())
    }

    /// Solve with missing note dates resolved to `valuation_date`.
    pub fn as_of(
        organization: Organization,
        settings: SolverSettings,
        valuation_date: NaiveDate,
    ) -> CapTableResult<Self> {
        organization.validate()?;
        let mut warnings: Vec<String> = Vec::new();

        let total_pre_money_shares = organization.total_pre_money_shares()?;
        if total_pre_money_shares == 0 {
            return Err(CapTableError::Configuration(
                "total pre-money shares is 0".into(),
            ));
        }
        let total_pre_dec = Decimal::from(total_pre_money_shares);

        let notes = if organization.note_conversion {
            organization
                .notes
                .iter()
                .map(|terms| Note::from_terms(terms, valuation_date))
                .collect::<CapTableResult<Vec<_>>>()?
        } else {
            if !organization.notes.is_empty() {
                warnings.push(format!(
                    "Note conversion disabled; {} note(s) left outstanding",
                    organization.notes.len()
                ));
            }
            Vec::new()
        };
        for note in notes.iter().filter(|n| n.conversion_amount().is_zero()) {
            warnings.push(format!(
                "Note '{}' has a zero conversion amount and converts into no shares",
                note.name
            ));
        }

        let pre_money_share_price = round_to(
            checked_div(organization.pre_money_valuation, total_pre_dec, "pre-money share price")?,
            settings.decimals,
        );

        let solver = PriceSolver {
            organization: &organization,
            notes: &notes,
            total_pre_money_shares: total_pre_dec,
        };
        let share_price_for_financing = round_to(
            iterate(
                |price| solver.step(price),
                pre_money_share_price,
                settings.max_iterations,
                settings.decimals,
            )?,
            settings.decimals,
        );
        debug!(
            pre_money_share_price = %pre_money_share_price,
            share_price_for_financing = %share_price_for_financing,
            notes = notes.len(),
            "share price solved"
        );

        // Final counts at the converged price, computed once.
        let unclamped = solver.unclamped_new_option_pool_shares(share_price_for_financing)?;
        if unclamped.is_sign_negative() && !unclamped.is_zero() {
            warnings.push(
                "Existing option pool already exceeds the post-money target; no new options issued"
                    .into(),
            );
        }
        let new_options_dec = unclamped.max(Decimal::ZERO);
        let ctx = solver.context(share_price_for_financing, new_options_dec);

        let mut note_conversions = Vec::with_capacity(notes.len());
        for note in &notes {
            let outcome = note.outcome(&ctx)?;
            note_conversions.push(NoteConversion {
                name: note.name.clone(),
                principal: note.principal,
                accrued_interest: note.accrued_interest,
                conversion_amount: note.conversion_amount(),
                conversion_price: outcome.price,
                shares: shares_to_u64(outcome.shares, "note conversion shares")?,
                value: outcome.value,
                method: note.method(&ctx)?,
            });
        }

        let new_options = shares_to_u64(new_options_dec, "new option pool shares")?;
        let note_shares = note_conversions
            .iter()
            .try_fold(0u64, |acc, n| acc.checked_add(n.shares))
            .ok_or_else(|| CapTableError::Configuration("note shares overflow".into()))?;
        let new_money_shares = shares_to_u64(
            as_share_count(checked_div(
                organization.new_money_raised,
                share_price_for_financing,
                "new money shares",
            )?),
            "new money shares",
        )?;

        let mut new_money_class = ShareClass::issued(ShareClassKind::NewMoney, new_money_shares);
        if let Some(label) = &organization.new_share_class {
            new_money_class = new_money_class.with_name(label.clone());
        }
        let share_classes = vec![
            ShareClass::existing(ShareClassKind::Founders, organization.founders_shares),
            ShareClass::existing(ShareClassKind::Common, organization.common_shares),
            ShareClass::existing(ShareClassKind::Warrants, organization.warrants_shares),
            ShareClass::existing(ShareClassKind::GrantedOptions, organization.granted_options_shares),
            ShareClass::existing(ShareClassKind::OptionsAvailableBefore, organization.old_options_shares),
            ShareClass::issued(ShareClassKind::NewOptions, new_options),
            ShareClass::issued(ShareClassKind::ConvertibleNotes, note_shares),
            new_money_class,
        ];

        let total_post_money_shares = share_classes
            .iter()
            .try_fold(0u64, |acc, sc| acc.checked_add(sc.post_money_shares))
            .ok_or_else(|| CapTableError::Configuration("total post-money shares overflow".into()))?;
        if total_post_money_shares == 0 {
            return Err(CapTableError::Configuration(
                "total post-money shares is 0".into(),
            ));
        }

        Ok(CapTable {
            organization,
            notes,
            note_conversions,
            share_classes,
            total_pre_money_shares,
            total_post_money_shares,
            pre_money_share_price,
            share_price_for_financing,
            warnings,
        })
    }

    pub fn organization(&self) -> &Organization {
        &self.organization
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn note_conversions(&self) -> &[NoteConversion] {
        &self.note_conversions
    }

    /// Share classes in display order.
    pub fn share_classes(&self) -> &[ShareClass] {
        &self.share_classes
    }

    pub fn share_class(&self, kind: ShareClassKind) -> Option<&ShareClass> {
        self.share_classes.iter().find(|sc| sc.kind == kind)
    }

    pub fn total_pre_money_shares(&self) -> u64 {
        self.total_pre_money_shares
    }

    pub fn total_post_money_shares(&self) -> u64 {
        self.total_post_money_shares
    }

    pub fn pre_money_share_price(&self) -> SharePrice {
        self.pre_money_share_price
    }

    pub fn share_price_for_financing(&self) -> SharePrice {
        self.share_price_for_financing
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Sum of each class at the rounded pre-money share price, so it can sit a
    /// few dollars off the pre-money valuation when that price is rounded.
    pub fn total_pre_money_ownership_value(&self) -> Money {
        self.share_classes
            .iter()
            .map(|sc| sc.pre_money_ownership_value(self.pre_money_share_price))
            .sum()
    }

    pub fn total_post_money_ownership_value(&self) -> Money {
        self.share_classes
            .iter()
            .map(|sc| sc.post_money_ownership_value(self.share_price_for_financing))
            .sum()
    }

    pub fn total_post_money_percent_ownership(&self) -> Decimal {
        self.share_classes
            .iter()
            .map(|sc| sc.post_money_percent_ownership(self.total_post_money_shares))
            .sum()
    }

    pub fn total_post_money_value_change(&self) -> Money {
        self.share_classes
            .iter()
            .map(|sc| sc.post_money_value_change(self.pre_money_share_price, self.share_price_for_financing))
            .sum()
    }

    pub fn total_post_money_dilution(&self) -> f64 {
        self.share_classes
            .iter()
            .map(|sc| sc.post_money_dilution(self.total_pre_money_shares, self.total_post_money_shares))
            .sum()
    }

    /// Flattened, serialisable view for presentation layers.
    pub fn summary(&self) -> CapTableSummary {
        let share_classes = self
            .share_classes
            .iter()
            .map(|sc| ShareClassRow {
                name: sc.name.clone(),
                kind: sc.kind,
                pre_money_shares: sc.pre_money_shares,
                pre_money_percent_ownership: sc.pre_money_percent_ownership(self.total_pre_money_shares),
                pre_money_ownership_value: as_currency(sc.pre_money_ownership_value(self.pre_money_share_price)),
                post_money_shares: sc.post_money_shares,
                post_money_percent_ownership: sc.post_money_percent_ownership(self.total_post_money_shares),
                post_money_ownership_value: as_currency(
                    sc.post_money_ownership_value(self.share_price_for_financing),
                ),
                post_money_percent_change: sc
                    .post_money_percent_change(self.total_pre_money_shares, self.total_post_money_shares),
                post_money_value_change: as_currency(
                    sc.post_money_value_change(self.pre_money_share_price, self.share_price_for_financing),
                ),
                post_money_dilution: sc
                    .post_money_dilution(self.total_pre_money_shares, self.total_post_money_shares),
            })
            .collect();

        CapTableSummary {
            total_pre_money_shares: self.total_pre_money_shares,
            pre_money_share_price: self.pre_money_share_price,
            share_price_for_financing: self.share_price_for_financing,
            total_post_money_shares: self.total_post_money_shares,
            total_pre_money_ownership_value: as_currency(self.total_pre_money_ownership_value()),
            total_post_money_ownership_value: as_currency(self.total_post_money_ownership_value()),
            total_post_money_percent_ownership: self.total_post_money_percent_ownership(),
            total_post_money_value_change: as_currency(self.total_post_money_value_change()),
            total_post_money_dilution: self.total_post_money_dilution(),
            share_classes,
            notes: self.note_conversions.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Serialisable output
// ---------------------------------------------------------------------------

/// One row of the pro-forma cap table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareClassRow {
    pub name: String,
    pub kind: ShareClassKind,
    pub pre_money_shares: u64,
    pub pre_money_percent_ownership: Decimal,
    pub pre_money_ownership_value: Money,
    pub post_money_shares: u64,
    pub post_money_percent_ownership: Decimal,
    pub post_money_ownership_value: Money,
    pub post_money_percent_change: Decimal,
    pub post_money_value_change: Money,
    #[serde(with = "dilution_serde")]
    pub post_money_dilution: f64,
}

/// Pro-forma cap table with aggregate totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapTableSummary {
    pub total_pre_money_shares: u64,
    pub pre_money_share_price: SharePrice,
    pub share_price_for_financing: SharePrice,
    pub total_post_money_shares: u64,
    pub total_pre_money_ownership_value: Money,
    pub total_post_money_ownership_value: Money,
    pub total_post_money_percent_ownership: Decimal,
    pub total_post_money_value_change: Money,
    #[serde(with = "dilution_serde")]
    pub total_post_money_dilution: f64,
    pub share_classes: Vec<ShareClassRow>,
    pub notes: Vec<NoteConversion>,
}

/// Input for [`build_cap_table`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapTableInput {
    pub organization: Organization,
    #[serde(default)]
    pub solver: SolverSettings,
    /// Date that stands in for missing note dates. Defaults to today.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valuation_date: Option<NaiveDate>,
}

/// Solve a priced round and return the pro-forma cap table.
pub fn build_cap_table(input: &CapTableInput) -> CapTableResult<ComputationOutput<CapTableSummary>> {
    let start = Instant::now();

    let valuation_date = input
        .valuation_date
        .unwrap_or_else(|| Utc::now().date_naive());
    let table = CapTable::as_of(input.organization.clone(), input.solver, valuation_date)?;
    let warnings = table.warnings().to_vec();
    let org = table.organization();

    let assumptions = serde_json::json!({
        "pre_money_valuation": org.pre_money_valuation.to_string(),
        "new_money_raised": org.new_money_raised.to_string(),
        "post_money_option_pool_size": org.option_pool_target().map(|s| s.to_string()),
        "note_conversion": org.note_conversion,
        "notes": org.notes.len(),
        "max_iterations": input.solver.max_iterations,
        "decimals": input.solver.decimals,
        "valuation_date": valuation_date.to_string(),
    });
    let output = table.summary();

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Priced Round Cap Table (fixed-point share price with note conversion and pool top-up)",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}
