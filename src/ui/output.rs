use crate::analyser::summary::CaptureSummary;
use crate::analyser::table::FeatureTable;
use ansi_term::Colour;
use chrono::{DateTime, Utc};
use std::fmt;
use std::io::Write;
use std::path::Path;

#[derive(Debug)]
pub enum OutputError {
    Io(std::io::Error),
    Csv(csv::Error),
    Json(serde_json::Error),
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OutputError::Io(e) => write!(f, "io error: {e}"),
            OutputError::Csv(e) => write!(f, "csv error: {e}"),
            OutputError::Json(e) => write!(f, "json error: {e}"),
        }
    }
}

impl std::error::Error for OutputError {}

impl From<std::io::Error> for OutputError {
    fn from(error: std::io::Error) -> OutputError {
        OutputError::Io(error)
    }
}

impl From<csv::Error> for OutputError {
    fn from(error: csv::Error) -> OutputError {
        OutputError::Csv(error)
    }
}

impl From<serde_json::Error> for OutputError {
    fn from(error: serde_json::Error) -> OutputError {
        OutputError::Json(error)
    }
}

pub fn print_summary(capture: &str, summary: &CaptureSummary) {
    println!("\n\u{250F}\u{2501}\u{2501}\u{2501}\u{2501} Results");
    println!("\u{2503}");
    println!("\u{2503} Capture {}", Colour::Red.paint(capture));
    println!("\u{2503} Packets          : {}", Colour::Fixed(226).paint(summary.packets.to_string()));
    println!("\u{2503} Flows            : {}", Colour::Fixed(226).paint(summary.flows.to_string()));
    println!("\u{2503} Bytes            : {}", Colour::Fixed(226).paint(summary.total_bytes.to_string()));
    println!("\u{2503} Avg packet size  : {}", Colour::Fixed(226).paint(or_dash(summary.avg_packet_size)));
    println!("\u{2503} Mean IPT (s)     : {}", Colour::Fixed(226).paint(or_dash(summary.inter_packet_time_mean)));
    println!("\u{2503} Largest flow     : {}", Colour::Fixed(226).paint(or_dash(summary.max_flow_size)));
    println!("\u{2503} Retransmissions  : {}", Colour::Fixed(226).paint(or_dash(summary.total_retransmissions)));
    println!("\u{2503} Start            : {}", Colour::Fixed(226).paint(time_or_dash(summary.first_timestamp)));
    println!("\u{2503} End              : {}", Colour::Fixed(226).paint(time_or_dash(summary.last_timestamp)));
    println!("\u{2503} Duration (s)     : {}", Colour::Fixed(226).paint(or_dash(summary.duration)));
    println!("\u{2503} ");
}

fn or_dash(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.3}"))
}

fn time_or_dash(seconds: Option<f64>) -> String {
    seconds
        .and_then(format_timestamp)
        .unwrap_or_else(|| "-".to_string())
}

/// Renders epoch seconds as RFC 3339 in UTC.
pub fn format_timestamp(seconds: f64) -> Option<String> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1_000_000_000.0) as u32;
    let datetime = DateTime::<Utc>::from_timestamp(whole as i64, nanos.min(999_999_999))?;

    Some(datetime.to_rfc3339())
}

pub fn data_as_json(table: &FeatureTable) -> Result<String, OutputError> {
    Ok(serde_json::to_string_pretty(table)?)
}

pub fn summary_as_json(summary: &CaptureSummary) -> Result<String, OutputError> {
    Ok(serde_json::to_string_pretty(summary)?)
}

/// Writes `table` as CSV with a header row. Absent cells are written empty.
pub fn write_csv<W: Write>(table: &FeatureTable, writer: W) -> Result<(), OutputError> {
    let mut csv = csv::Writer::from_writer(writer);

    csv.write_record(table.columns().iter().map(|c| c.name()))?;
    for row in table.rows() {
        csv.write_record(
            row.iter()
                .map(|cell| cell.as_ref().map(|v| v.to_string()).unwrap_or_default()),
        )?;
    }
    csv.flush()?;

    Ok(())
}

pub fn data_to_file(data: &str, path: &Path) -> Result<(), OutputError> {
    std::fs::write(path, data)?;
    log::info!("Saved output to {}", path.display());
    Ok(())
}

pub fn csv_to_file(table: &FeatureTable, path: &Path) -> Result<(), OutputError> {
    let file = std::fs::File::create(path)?;
    write_csv(table, file)?;
    log::info!("Saved CSV to {}", path.display());
    Ok(())
}
