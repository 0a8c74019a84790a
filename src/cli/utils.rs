use anyhow::Result;
use serde::Serialize;
use serde_json::json;

use crate::cli::OutputFormat;

/// Print a success envelope in JSON mode, or the message in text mode
pub fn output_success<T: Serialize>(format: OutputFormat, message: &str, data: &T) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let response = json!({ "success": true, "message": message, "data": data });
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => println!("✓ {}", message),
    }
    Ok(())
}

/// Print an empty-collection notice
pub fn output_empty_collection(format: OutputFormat, message: &str) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "success": true, "data": [] }))?);
        }
        OutputFormat::Text => println!("{}", message),
    }
    Ok(())
}

pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&json!({ "success": true, "data": data }))?);
    Ok(())
}
