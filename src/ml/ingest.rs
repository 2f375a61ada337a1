//! Flight record ingestion.
//!
//! Missing cells are replaced with zero: numeric columns read as `0`, text
//! columns as `"0"`. The delay flag is then coerced to a strict `0`/`1`
//! integer; anything else is rejected.

use crate::error::{AppError, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

pub const COL_DAY_OF_WEEK: &str = "DayOfWeek";
pub const COL_ORIGIN_AIRPORT_ID: &str = "OriginAirportID";
pub const COL_DEP_DEL15: &str = "DepDel15";
pub const COL_ORIGIN_AIRPORT_NAME: &str = "OriginAirportName";
pub const COL_ORIGIN_CITY: &str = "OriginCity";
pub const COL_ORIGIN_STATE: &str = "OriginState";
pub const COL_DEST_AIRPORT_ID: &str = "DestAirportID";
pub const COL_DEST_AIRPORT_NAME: &str = "DestAirportName";
pub const COL_DEST_CITY: &str = "DestCity";
pub const COL_DEST_STATE: &str = "DestState";

const REQUIRED_COLUMNS: [&str; 10] = [
    COL_DAY_OF_WEEK,
    COL_ORIGIN_AIRPORT_ID,
    COL_DEP_DEL15,
    COL_ORIGIN_AIRPORT_NAME,
    COL_ORIGIN_CITY,
    COL_ORIGIN_STATE,
    COL_DEST_AIRPORT_ID,
    COL_DEST_AIRPORT_NAME,
    COL_DEST_CITY,
    COL_DEST_STATE,
];

/// One cleaned historical flight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightRecord {
    pub day_of_week: i64,
    pub origin_airport_id: i64,
    pub origin_airport_name: String,
    pub origin_city: String,
    pub origin_state: String,
    pub dest_airport_id: i64,
    pub dest_airport_name: String,
    pub dest_city: String,
    pub dest_state: String,
    /// Departure delayed more than 15 minutes
    pub dep_del15: u8,
}

/// Load and clean flight records from a CSV file
pub fn load_flights(path: impl AsRef<Path>) -> Result<Vec<FlightRecord>> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| AppError::Load(format!("{}: {}", path.display(), e)))?;

    let records = read_flights(file)?;
    info!(
        path = %path.display(),
        rows = records.len(),
        "Flight data loaded"
    );
    Ok(records)
}

/// Parse and clean flight records from any CSV source
pub fn read_flights<R: Read>(source: R) -> Result<Vec<FlightRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader
        .headers()
        .map_err(|e| AppError::Load(format!("unreadable header: {}", e)))?
        .clone();

    let mut index = [0usize; REQUIRED_COLUMNS.len()];
    for (slot, column) in index.iter_mut().zip(REQUIRED_COLUMNS.iter()) {
        *slot = headers
            .iter()
            .position(|h| h == *column)
            .ok_or_else(|| AppError::Load(format!("missing column {}", column)))?;
    }

    let mut records = Vec::new();
    let mut filled_cells = 0usize;

    for (row, result) in reader.records().enumerate() {
        // Header is line 1
        let line = row + 2;
        let raw = result.map_err(|e| AppError::Load(format!("line {}: {}", line, e)))?;

        let cell = |i: usize| raw.get(index[i]).unwrap_or("");
        filled_cells += (0..index.len()).filter(|&i| cell(i).is_empty()).count();

        let day_of_week = parse_int(cell(0), COL_DAY_OF_WEEK, line)?;
        let origin_airport_id = parse_int(cell(1), COL_ORIGIN_AIRPORT_ID, line)?;
        let dep_del15 = parse_label(cell(2), line)?;
        let origin_airport_name = text(cell(3));
        let origin_city = text(cell(4));
        let origin_state = text(cell(5));
        let dest_airport_id = parse_int(cell(6), COL_DEST_AIRPORT_ID, line)?;
        let dest_airport_name = text(cell(7));
        let dest_city = text(cell(8));
        let dest_state = text(cell(9));

        records.push(FlightRecord {
            day_of_week,
            origin_airport_id,
            origin_airport_name,
            origin_city,
            origin_state,
            dest_airport_id,
            dest_airport_name,
            dest_city,
            dest_state,
            dep_del15,
        });
    }

    debug!(rows = records.len(), filled_cells, "Missing cells replaced with zero");
    Ok(records)
}

fn text(value: &str) -> String {
    if value.is_empty() {
        "0".to_string()
    } else {
        value.to_string()
    }
}

/// Integer cell; empty is zero, integral floats such as `3.0` are accepted
fn parse_int(value: &str, column: &str, line: usize) -> Result<i64> {
    if value.is_empty() {
        return Ok(0);
    }
    if let Ok(v) = value.parse::<i64>() {
        return Ok(v);
    }
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 => Ok(v as i64),
        _ => Err(AppError::Load(format!(
            "line {}: {} is not an integer: {:?}",
            line, column, value
        ))),
    }
}

fn parse_label(value: &str, line: usize) -> Result<u8> {
    match parse_int(value, COL_DEP_DEL15, line)? {
        0 => Ok(0),
        1 => Ok(1),
        other => Err(AppError::Load(format!(
            "line {}: {} must be 0 or 1, got {}",
            line, COL_DEP_DEL15, other
        ))),
    }
}
