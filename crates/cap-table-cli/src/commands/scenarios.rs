use clap::Args;
use serde_json::Value;

use cap_table_core::scenarios::{self, ScenarioComparisonInput};

use crate::input;

/// Arguments for scenario comparison
#[derive(Args)]
pub struct CompareArgs {
    /// Path to a JSON or YAML input file (ScenarioComparisonInput)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_compare(args: CompareArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let cmp_input: ScenarioComparisonInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file> or stdin required for scenario comparison".into());
    };
    let result = scenarios::compare_scenarios(&cmp_input)?;
    Ok(serde_json::to_value(result)?)
}
