use clap::Args;
use serde_json::Value;

use cap_table_core::financing::note::{self, NoteConversionInput};

use crate::input;

/// Arguments for single-note conversion
#[derive(Args)]
pub struct ConvertNoteArgs {
    /// Path to a JSON or YAML input file (NoteConversionInput)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_convert_note(args: ConvertNoteArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let cn_input: NoteConversionInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file> or stdin required for note conversion".into());
    };
    let result = note::convert_note(&cn_input)?;
    Ok(serde_json::to_value(result)?)
}
