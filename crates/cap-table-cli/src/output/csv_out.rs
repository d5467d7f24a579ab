use serde_json::{Map, Value};
use std::io;

use super::{format_scalar, is_row_set};

type StdoutWriter<'a> = csv::Writer<io::StdoutLock<'a>>;

/// Write output as CSV to stdout.
///
/// A cap table prints its share-class rows; a scenario comparison prints the
/// share-class rows of every scenario with a leading `scenario` column. Any
/// other result prints as `field,value` pairs.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match value {
        Value::Object(map) => {
            let body = match map.get("result") {
                Some(Value::Object(result)) => result,
                _ => map,
            };
            if let Some(Value::Array(scenarios)) = body.get("scenarios") {
                write_scenarios_csv(&mut wtr, scenarios);
            } else if let Some(Value::Array(rows)) = body.get("share_classes") {
                write_array_csv(&mut wtr, rows, None);
            } else {
                write_pairs_csv(&mut wtr, body);
            }
        }
        Value::Array(arr) => write_array_csv(&mut wtr, arr, None),
        _ => {
            let _ = wtr.write_record([&format_csv_value(value)]);
        }
    }

    let _ = wtr.flush();
}

fn write_pairs_csv(wtr: &mut StdoutWriter<'_>, map: &Map<String, Value>) {
    let _ = wtr.write_record(["field", "value"]);
    for (key, val) in map.iter().filter(|(_, v)| !is_row_set(v)) {
        let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
    }
}

fn write_scenarios_csv(wtr: &mut StdoutWriter<'_>, scenarios: &[Value]) {
    let mut headers_written = false;
    for scenario in scenarios {
        let Some(map) = scenario.as_object() else { continue };
        let label = map.get("label").map(format_csv_value).unwrap_or_default();
        if let Some(Value::Array(rows)) = map.get("share_classes") {
            write_rows(wtr, rows, Some(&label), !headers_written);
            headers_written = headers_written || !rows.is_empty();
        }
    }
}

fn write_array_csv(wtr: &mut StdoutWriter<'_>, arr: &[Value], prefix: Option<&str>) {
    write_rows(wtr, arr, prefix, true);
}

fn write_rows(wtr: &mut StdoutWriter<'_>, arr: &[Value], prefix: Option<&str>, with_headers: bool) {
    let Some(Value::Object(first)) = arr.first() else {
        for item in arr {
            let _ = wtr.write_record([&format_csv_value(item)]);
        }
        return;
    };

    let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
    if with_headers {
        let mut header_row: Vec<&str> = Vec::with_capacity(headers.len() + 1);
        if prefix.is_some() {
            header_row.push("scenario");
        }
        header_row.extend(&headers);
        let _ = wtr.write_record(&header_row);
    }

    for item in arr {
        if let Value::Object(map) = item {
            let mut row: Vec<String> = Vec::with_capacity(headers.len() + 1);
            if let Some(p) = prefix {
                row.push(p.to_string());
            }
            row.extend(
                headers
                    .iter()
                    .map(|h| map.get(*h).map(format_csv_value).unwrap_or_default()),
            );
            let _ = wtr.write_record(&row);
        }
    }
}

fn format_csv_value(value: &Value) -> String {
    format_scalar(value, "")
}
