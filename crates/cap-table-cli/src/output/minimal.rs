use serde_json::Value;

use super::format_scalar;

/// Print just the key answer from the output.
///
/// A cap table prints its financing share price, a note conversion its
/// effective share count, a comparison one `label: price` line per scenario.
/// Anything else falls back to the first field of the result.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    let Value::Object(map) = result_obj else {
        println!("{}", format_scalar(result_obj, "null"));
        return;
    };

    if let Some(Value::Array(scenarios)) = map.get("scenarios") {
        for s in scenarios {
            let label = s.get("label").map(|v| format_scalar(v, "")).unwrap_or_default();
            let price = s
                .get("share_price_for_financing")
                .map(|v| format_scalar(v, "null"))
                .unwrap_or_default();
            println!("{}: {}", label, price);
        }
        return;
    }

    if let Some(shares) = map.get("effective").and_then(|e| e.get("shares")) {
        println!("{}", format_scalar(shares, "null"));
        return;
    }

    let priority_keys = ["share_price_for_financing", "total_post_money_shares"];
    for key in &priority_keys {
        if let Some(val) = map.get(*key) {
            if !val.is_null() {
                println!("{}", format_scalar(val, "null"));
                return;
            }
        }
    }

    if let Some((key, val)) = map.iter().next() {
        println!("{}: {}", key, format_scalar(val, "null"));
    }
}
