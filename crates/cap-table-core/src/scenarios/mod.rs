pub mod comparison;

pub use comparison::{
    compare_scenarios, FinancingScenario, ScenarioComparisonInput, ScenarioComparisonOutput,
    ScenarioOverrides,
};
