use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Financing round
// ---------------------------------------------------------------------------

#[napi]
pub fn build_cap_table(input_json: String) -> NapiResult<String> {
    let input: cap_table_core::financing::CapTableInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = cap_table_core::financing::build_cap_table(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn convert_note(input_json: String) -> NapiResult<String> {
    let input: cap_table_core::financing::note::NoteConversionInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = cap_table_core::financing::convert_note(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[napi]
pub fn compare_scenarios(input_json: String) -> NapiResult<String> {
    let input: cap_table_core::scenarios::ScenarioComparisonInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = cap_table_core::scenarios::compare_scenarios(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Rounding
// ---------------------------------------------------------------------------

/// Half-away-from-zero rounding on a decimal string, for display layers that
/// must agree with the engine.
#[napi]
pub fn round_to(value: String, decimals: u32) -> NapiResult<String> {
    let value: Decimal = value.parse().map_err(to_napi_error)?;
    Ok(cap_table_core::rounding::round_to(value, decimals).to_string())
}
