use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;
use tracing::debug;

use crate::error::CapTableError;
use crate::financing::share_class::dilution_serde;
use crate::financing::{CapTable, Organization, ShareClassKind, SolverSettings};
use crate::rounding::{as_currency, as_percent};
use crate::types::{with_metadata, ComputationOutput, Money, Rate, SharePrice};
use crate::CapTableResult;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Deal terms that vary between scenarios. Unset fields keep the base value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_money_valuation: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_money_raised: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_money_option_pool_size: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note_conversion: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expand_option_pool: Option<bool>,
}

impl ScenarioOverrides {
    /// A fresh organization with these terms laid over `base`.
    pub fn apply(&self, base: &Organization) -> Organization {
        let mut org = base.clone();
        if let Some(v) = self.pre_money_valuation {
            org.pre_money_valuation = v;
        }
        if let Some(v) = self.new_money_raised {
            org.new_money_raised = v;
        }
        if let Some(v) = self.post_money_option_pool_size {
            org.post_money_option_pool_size = Some(v);
        }
        if let Some(v) = self.note_conversion {
            org.note_conversion = v;
        }
        if let Some(v) = self.expand_option_pool {
            org.expand_option_pool = v;
        }
        org
    }
}

/// One labelled column of the comparison, e.g. "A".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancingScenario {
    pub label: String,
    #[serde(default)]
    pub overrides: ScenarioOverrides,
}

/// Input for [`compare_scenarios`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioComparisonInput {
    /// Company and note terms shared by every scenario.
    pub base: Organization,
    pub scenarios: Vec<FinancingScenario>,
    #[serde(default)]
    pub solver: SolverSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valuation_date: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// A share class as it stands after one scenario's round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioClassRow {
    pub name: String,
    pub kind: ShareClassKind,
    pub post_money_shares: u64,
    /// Percent of the company, one decimal (20.0 = 20%).
    pub post_money_percent: Decimal,
    pub post_money_ownership_value: Money,
    pub post_money_value_change: Money,
    #[serde(with = "dilution_serde")]
    pub post_money_dilution: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub label: String,
    pub pre_money_valuation: Money,
    pub new_money_raised: Money,
    pub post_money_option_pool_size: Option<Rate>,
    pub note_conversion: bool,
    pub expand_option_pool: bool,
    pub pre_money_share_price: SharePrice,
    pub share_price_for_financing: SharePrice,
    pub total_post_money_shares: u64,
    pub total_post_money_ownership_value: Money,
    pub share_classes: Vec<ScenarioClassRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioComparisonOutput {
    pub scenarios: Vec<ScenarioResult>,
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

fn summarize(label: &str, table: &CapTable) -> ScenarioResult {
    let org = table.organization();
    let pre_total = table.total_pre_money_shares();
    let post_total = table.total_post_money_shares();
    let pre_price = table.pre_money_share_price();
    let price = table.share_price_for_financing();

    let share_classes = table
        .share_classes()
        .iter()
        .map(|sc| ScenarioClassRow {
            name: sc.name.clone(),
            kind: sc.kind,
            post_money_shares: sc.post_money_shares,
            post_money_percent: as_percent(sc.post_money_percent_ownership(post_total)),
            post_money_ownership_value: as_currency(sc.post_money_ownership_value(price)),
            post_money_value_change: as_currency(sc.post_money_value_change(pre_price, price)),
            post_money_dilution: sc.post_money_dilution(pre_total, post_total),
        })
        .collect();

    ScenarioResult {
        label: label.to_string(),
        pre_money_valuation: org.pre_money_valuation,
        new_money_raised: org.new_money_raised,
        post_money_option_pool_size: org.option_pool_target(),
        note_conversion: org.note_conversion,
        expand_option_pool: org.expand_option_pool,
        pre_money_share_price: pre_price,
        share_price_for_financing: price,
        total_post_money_shares: post_total,
        total_post_money_ownership_value: as_currency(table.total_post_money_ownership_value()),
        share_classes,
    }
}

/// Solve one independent cap table per scenario and line them up side by side.
pub fn compare_scenarios(
    input: &ScenarioComparisonInput,
) -> CapTableResult<ComputationOutput<ScenarioComparisonOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.scenarios.is_empty() {
        return Err(CapTableError::InvalidInput {
            field: "scenarios".into(),
            reason: "At least one scenario required".into(),
        });
    }

    let mut seen = HashSet::new();
    for s in &input.scenarios {
        if !seen.insert(s.label.as_str()) {
            warnings.push(format!("Duplicate scenario label '{}'", s.label));
        }
    }

    let valuation_date = input
        .valuation_date
        .unwrap_or_else(|| Utc::now().date_naive());

    let mut scenarios = Vec::with_capacity(input.scenarios.len());
    for (i, scenario) in input.scenarios.iter().enumerate() {
        let org = scenario.overrides.apply(&input.base);
        let table = CapTable::as_of(org, input.solver, valuation_date).map_err(|e| match e {
            CapTableError::InvalidInput { field, reason } => CapTableError::InvalidInput {
                field: format!("scenarios[{i}].{field}"),
                reason,
            },
            other => other,
        })?;
        debug!(
            label = %scenario.label,
            share_price_for_financing = %table.share_price_for_financing(),
            "scenario solved"
        );
        warnings.extend(
            table
                .warnings()
                .iter()
                .map(|w| format!("Scenario {}: {w}", scenario.label)),
        );
        scenarios.push(summarize(&scenario.label, &table));
    }

    let output = ScenarioComparisonOutput { scenarios };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Financing Scenario Comparison (independent cap table per scenario)",
        &serde_json::json!({
            "num_scenarios": input.scenarios.len(),
            "base_pre_money_valuation": input.base.pre_money_valuation.to_string(),
            "base_new_money_raised": input.base.new_money_raised.to_string(),
            "notes": input.base.notes.len(),
            "valuation_date": valuation_date.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::financing::NoteTerms;
    use rust_decimal_macros::dec;

    fn base() -> Organization {
        Organization {
            name: Some("Pied Piper".into()),
            new_share_class: Some("Series A".into()),
            pre_money_valuation: dec!(30_000_000),
            new_money_raised: dec!(1_000_000),
            post_money_option_pool_size: Some(dec!(0.2)),
            expand_option_pool: true,
            note_conversion: true,
            founders_shares: 8_000_000,
            common_shares: 1_000_000,
            warrants_shares: 100_000,
            granted_options_shares: 800_000,
            old_options_shares: 100_000,
            notes: vec![NoteTerms::new(dec!(500_000), dec!(0.2)).with_cap(dec!(5_000_000))],
        }
    }

    fn scenario(label: &str, overrides: ScenarioOverrides) -> FinancingScenario {
        FinancingScenario {
            label: label.into(),
            overrides,
        }
    }

    fn input(scenarios: Vec<FinancingScenario>) -> ScenarioComparisonInput {
        ScenarioComparisonInput {
            base: base(),
            scenarios,
            solver: SolverSettings::default(),
            valuation_date: NaiveDate::from_ymd_opt(2024, 1, 15),
        }
    }

    fn class<'a>(result: &'a ScenarioResult, kind: ShareClassKind) -> &'a ScenarioClassRow {
        result.share_classes.iter().find(|r| r.kind == kind).unwrap()
    }

    #[test]
    fn test_overrides_leave_base_untouched() {
        let b = base();
        let o = ScenarioOverrides {
            pre_money_valuation: Some(dec!(28_000_000)),
            note_conversion: Some(false),
            ..Default::default()
        };
        let org = o.apply(&b);
        assert_eq!(org.pre_money_valuation, dec!(28_000_000));
        assert!(!org.note_conversion);
        assert_eq!(org.new_money_raised, b.new_money_raised);
        assert_eq!(b, base());
    }

    #[test]
    fn test_each_scenario_solved_independently() {
        let result = compare_scenarios(&input(vec![
            scenario("A", ScenarioOverrides::default()),
            scenario(
                "B",
                ScenarioOverrides {
                    note_conversion: Some(false),
                    ..Default::default()
                },
            ),
            scenario(
                "C",
                ScenarioOverrides {
                    expand_option_pool: Some(false),
                    ..Default::default()
                },
            ),
            scenario("A again", ScenarioOverrides::default()),
        ]))
        .unwrap();
        let out = &result.result.scenarios;

        assert_eq!(out.len(), 4);
        assert_eq!(out[0].share_price_for_financing, dec!(2.12856));
        assert_eq!(out[1].share_price_for_financing, dec!(2.40404));
        assert_eq!(out[2].share_price_for_financing, dec!(2.72727));
        assert_eq!(out[3].share_price_for_financing, out[0].share_price_for_financing);

        assert_eq!(class(&out[1], ShareClassKind::ConvertibleNotes).post_money_shares, 0);
        assert_eq!(class(&out[2], ShareClassKind::NewOptions).post_money_shares, 0);
        assert_eq!(
            class(&out[2], ShareClassKind::ConvertibleNotes).post_money_shares,
            1_000_000
        );
        assert_eq!(out[2].post_money_option_pool_size, None);
    }

    #[test]
    fn test_deal_terms_reported() {
        let result = compare_scenarios(&input(vec![scenario(
            "B",
            ScenarioOverrides {
                pre_money_valuation: Some(dec!(28_000_000)),
                new_money_raised: Some(dec!(2_000_000)),
                post_money_option_pool_size: Some(dec!(0.25)),
                ..Default::default()
            },
        )]))
        .unwrap();
        let b = &result.result.scenarios[0];

        assert_eq!(b.label, "B");
        assert_eq!(b.pre_money_valuation, dec!(28_000_000));
        assert_eq!(b.new_money_raised, dec!(2_000_000));
        assert_eq!(b.post_money_option_pool_size, Some(dec!(0.25)));
        assert_eq!(b.pre_money_share_price, dec!(2.8));
        assert_eq!(b.share_price_for_financing, dec!(1.81359));
        assert_eq!(class(b, ShareClassKind::NewMoney).name, "Series A");
    }

    #[test]
    fn test_class_rows_use_display_rounding() {
        let result = compare_scenarios(&input(vec![scenario("A", ScenarioOverrides::default())]))
            .unwrap();
        let a = &result.result.scenarios[0];

        // 8,000,000 / 14,563,845
        assert_eq!(class(a, ShareClassKind::Founders).post_money_percent, dec!(54.9));
        // 469,801 x 2.12856
        assert_eq!(
            class(a, ShareClassKind::NewMoney).post_money_ownership_value,
            dec!(999_999.62)
        );
        // 8,000,000 x (2.12856 - 3)
        assert_eq!(
            class(a, ShareClassKind::Founders).post_money_value_change,
            dec!(-6_971_520.00)
        );
        assert_eq!(
            class(a, ShareClassKind::NewMoney).post_money_dilution,
            f64::INFINITY
        );
        let percent_total: Decimal = a.share_classes.iter().map(|r| r.post_money_percent).sum();
        assert!((percent_total - dec!(100)).abs() <= dec!(0.4));
    }

    #[test]
    fn test_warnings_tagged_with_label() {
        let result = compare_scenarios(&input(vec![
            scenario(
                "No notes",
                ScenarioOverrides {
                    note_conversion: Some(false),
                    ..Default::default()
                },
            ),
            scenario("No notes", ScenarioOverrides::default()),
        ]))
        .unwrap();
        assert!(result
            .warnings
            .iter()
            .any(|w| w == "Duplicate scenario label 'No notes'"));
        assert!(result
            .warnings
            .iter()
            .any(|w| w.starts_with("Scenario No notes: Note conversion disabled")));
    }

    #[test]
    fn test_empty_scenarios_rejected() {
        let err = compare_scenarios(&input(vec![])).unwrap_err();
        assert!(matches!(err, CapTableError::InvalidInput { ref field, .. } if field == "scenarios"));
    }

    #[test]
    fn test_invalid_override_names_scenario() {
        let err = compare_scenarios(&input(vec![
            scenario("A", ScenarioOverrides::default()),
            scenario(
                "B",
                ScenarioOverrides {
                    post_money_option_pool_size: Some(dec!(1.5)),
                    ..Default::default()
                },
            ),
        ]))
        .unwrap_err();
        match err {
            CapTableError::InvalidInput { field, .. } => {
                assert_eq!(field, "scenarios[1].post_money_option_pool_size")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_overrides_deserialize_sparse() {
        let s: FinancingScenario = serde_json::from_value(serde_json::json!({
            "label": "D",
            "overrides": { "new_money_raised": "12000000" }
        }))
        .unwrap();
        assert_eq!(s.overrides.new_money_raised, Some(dec!(12_000_000)));
        assert_eq!(s.overrides.pre_money_valuation, None);
    }
}
