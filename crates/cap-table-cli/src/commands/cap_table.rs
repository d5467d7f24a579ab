use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::info;

use cap_table_core::financing::{self, CapTableInput, Organization, SolverSettings};

use crate::input;

/// Arguments for solving a priced round
#[derive(Args)]
pub struct CapTableArgs {
    /// Path to a JSON or YAML input file (CapTableInput)
    #[arg(long)]
    pub input: Option<String>,

    /// Pre-money valuation
    #[arg(long)]
    pub pre_money: Option<Decimal>,

    /// New money raised in the round
    #[arg(long)]
    pub new_money: Option<Decimal>,

    /// Founders' shares outstanding
    #[arg(long, default_value_t = 0)]
    pub founders: u64,

    /// Other common shares outstanding
    #[arg(long, default_value_t = 0)]
    pub common: u64,

    /// Warrants outstanding
    #[arg(long, default_value_t = 0)]
    pub warrants: u64,

    /// Options already granted
    #[arg(long, default_value_t = 0)]
    pub granted_options: u64,

    /// Unallocated pool before the round
    #[arg(long, default_value_t = 0)]
    pub old_options: u64,

    /// Post-money option pool target as a fraction (0.2 = 20%)
    #[arg(long)]
    pub pool: Option<Decimal>,

    /// Keep the option pool at its current size
    #[arg(long)]
    pub no_pool_expansion: bool,

    /// Name of the class issued to new money, e.g. "Series A"
    #[arg(long)]
    pub series: Option<String>,

    /// Date that stands in for missing note dates (YYYY-MM-DD)
    #[arg(long)]
    pub valuation_date: Option<NaiveDate>,

    /// Iteration budget for the share price solver
    #[arg(long)]
    pub max_iterations: Option<u32>,
}

pub fn run_cap_table(args: CapTableArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut ct_input: CapTableInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        from_flags(&args)?
    };

    if let Some(date) = args.valuation_date {
        ct_input.valuation_date = Some(date);
    }
    if let Some(max) = args.max_iterations {
        ct_input.solver.max_iterations = max;
    }

    info!(
        pre_money_valuation = %ct_input.organization.pre_money_valuation,
        new_money_raised = %ct_input.organization.new_money_raised,
        notes = ct_input.organization.notes.len(),
        "solving cap table"
    );
    let result = financing::build_cap_table(&ct_input)?;
    Ok(serde_json::to_value(result)?)
}

fn from_flags(args: &CapTableArgs) -> Result<CapTableInput, Box<dyn std::error::Error>> {
    let (Some(pre_money), Some(new_money)) = (args.pre_money, args.new_money) else {
        return Err(
            "--input <file>, stdin, or --pre-money and --new-money required for cap table".into(),
        );
    };
    Ok(CapTableInput {
        organization: Organization {
            name: None,
            new_share_class: args.series.clone(),
            pre_money_valuation: pre_money,
            new_money_raised: new_money,
            post_money_option_pool_size: args.pool,
            expand_option_pool: !args.no_pool_expansion,
            note_conversion: true,
            founders_shares: args.founders,
            common_shares: args.common,
            warrants_shares: args.warrants,
            granted_options_shares: args.granted_options,
            old_options_shares: args.old_options,
            notes: vec![],
        },
        solver: SolverSettings::default(),
        valuation_date: None,
    })
}
