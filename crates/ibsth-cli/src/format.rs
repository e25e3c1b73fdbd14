//! Output formatting for readings.

use anyhow::Result;
use ibsth_types::Reading;
use time::format_description::well_known::Rfc3339;

use crate::cli::OutputFormat;

/// Format one reading as a single output line.
pub fn format_reading(reading: &Reading, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => format_reading_text(reading),
        OutputFormat::Json => Ok(serde_json::to_string(reading)?),
    }
}

fn format_reading_text(reading: &Reading) -> Result<String> {
    let time = reading.captured_at.format(&Rfc3339)?;
    let rssi = reading
        .rssi
        .map(|r| format!(" rssi={}dBm", r))
        .unwrap_or_default();
    Ok(format!("{} {}{}", time, reading, rssi))
}
