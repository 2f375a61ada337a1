//! Airport directory built from flight records.
//!
//! Origin and destination columns are combined (origins first, in row order),
//! deduplicated by id keeping the first occurrence, and persisted as a CSV
//! table sorted by id. At serving time the table is loaded read-only into an
//! id index plus a name-sorted listing.

use crate::error::{AppError, Result};
use crate::ml::ingest::FlightRecord;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::info;

/// One airport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirportRecord {
    pub id: i64,
    pub name: String,
    pub city: String,
    pub state: String,
}

/// Row layout of the persisted table
#[derive(Debug, Serialize, Deserialize)]
struct AirportRow {
    #[serde(rename = "AirportID")]
    id: i64,
    #[serde(rename = "AirportName")]
    name: String,
    #[serde(rename = "City")]
    city: String,
    #[serde(rename = "State")]
    state: String,
}

impl From<AirportRow> for AirportRecord {
    fn from(row: AirportRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            city: row.city,
            state: row.state,
        }
    }
}

impl From<&AirportRecord> for AirportRow {
    fn from(record: &AirportRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            city: record.city.clone(),
            state: record.state.clone(),
        }
    }
}

/// Immutable, deduplicated airport table
#[derive(Debug, Clone, Default)]
pub struct AirportDirectory {
    /// Sorted ascending by id
    records: Vec<AirportRecord>,
    /// Positions into `records`, ordered by name
    by_name: Vec<usize>,
    index: HashMap<i64, usize>,
}

impl AirportDirectory {
    /// Combine origin and destination airports, keeping the first record per id
    pub fn from_flights(flights: &[FlightRecord]) -> Self {
        let origins = flights.iter().map(|f| AirportRecord {
            id: f.origin_airport_id,
            name: f.origin_airport_name.clone(),
            city: f.origin_city.clone(),
            state: f.origin_state.clone(),
        });
        let destinations = flights.iter().map(|f| AirportRecord {
            id: f.dest_airport_id,
            name: f.dest_airport_name.clone(),
            city: f.dest_city.clone(),
            state: f.dest_state.clone(),
        });

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        for candidate in origins.chain(destinations) {
            if seen.insert(candidate.id) {
                records.push(candidate);
            }
        }

        Self::build(records)
    }

    /// Build from records that must already be unique by id
    pub fn from_records(records: Vec<AirportRecord>) -> Result<Self> {
        let mut ids = HashSet::with_capacity(records.len());
        for record in &records {
            if !ids.insert(record.id) {
                return Err(AppError::ArtifactLoad(format!(
                    "airport id {} appears more than once",
                    record.id
                )));
            }
        }
        Ok(Self::build(records))
    }

    fn build(mut records: Vec<AirportRecord>) -> Self {
        records.sort_by_key(|r| r.id);

        let mut by_name: Vec<usize> = (0..records.len()).collect();
        by_name.sort_by(|&a, &b| {
            records[a]
                .name
                .cmp(&records[b].name)
                .then(records[a].id.cmp(&records[b].id))
        });

        let index = records
            .iter()
            .enumerate()
            .map(|(pos, r)| (r.id, pos))
            .collect();

        Self {
            records,
            by_name,
            index,
        }
    }

    /// Record for `id`, or `NotFound`
    pub fn lookup(&self, id: i64) -> Result<&AirportRecord> {
        self.get(id)
            .ok_or_else(|| AppError::NotFound(format!("Airport with ID {} not found", id)))
    }

    pub fn get(&self, id: i64) -> Option<&AirportRecord> {
        self.index.get(&id).map(|&pos| &self.records[pos])
    }

    pub fn contains(&self, id: i64) -> bool {
        self.index.contains_key(&id)
    }

    /// All airports ordered alphabetically by name
    pub fn list(&self) -> Vec<&AirportRecord> {
        self.by_name.iter().map(|&pos| &self.records[pos]).collect()
    }

    /// All airports ordered by id
    pub fn records(&self) -> &[AirportRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Persist as `AirportID,AirportName,City,State`, sorted by id
    pub fn save_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut writer = csv::Writer::from_path(path)
            .map_err(|e| AppError::Serialization(format!("{}: {}", path.display(), e)))?;
        for record in &self.records {
            writer
                .serialize(AirportRow::from(record))
                .map_err(|e| AppError::Serialization(e.to_string()))?;
        }
        writer.flush()?;

        info!(path = %path.display(), airports = self.len(), "Airport directory saved");
        Ok(())
    }

    /// Load a table written by [`save_csv`](Self::save_csv)
    pub fn load_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| AppError::ArtifactLoad(format!("{}: {}", path.display(), e)))?;

        let records = reader
            .deserialize::<AirportRow>()
            .map(|row| {
                row.map(AirportRecord::from)
                    .map_err(|e| AppError::ArtifactLoad(format!("{}: {}", path.display(), e)))
            })
            .collect::<Result<Vec<_>>>()?;

        let directory = Self::from_records(records)?;
        info!(path = %path.display(), airports = directory.len(), "Airport directory loaded");
        Ok(directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flight(origin: (i64, &str), dest: (i64, &str)) -> FlightRecord {
        FlightRecord {
            day_of_week: 1,
            origin_airport_id: origin.0,
            origin_airport_name: origin.1.to_string(),
            origin_city: format!("{} City", origin.1),
            origin_state: "XX".to_string(),
            dest_airport_id: dest.0,
            dest_airport_name: dest.1.to_string(),
            dest_city: format!("{} City", dest.1),
            dest_state: "YY".to_string(),
            dep_del15: 0,
        }
    }

    #[test]
    fn test_dedup_across_origin_and_destination() {
        let flights = vec![
            flight((13930, "Chicago O'Hare"), (12478, "JFK")),
            flight((12478, "JFK"), (13930, "Chicago O'Hare")),
            flight((13930, "Chicago O'Hare"), (12478, "JFK")),
        ];
        let directory = AirportDirectory::from_flights(&flights);

        assert_eq!(directory.len(), 2);
        let ids: Vec<i64> = directory.records().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![12478, 13930]);
    }

    #[test]
    fn test_first_occurrence_wins() {
        // Origins are considered before destinations
        let flights = vec![
            flight((10397, "Atlanta"), (12892, "LAX (dest spelling)")),
            flight((12892, "Los Angeles International"), (10397, "ATL (dest spelling)")),
        ];
        let directory = AirportDirectory::from_flights(&flights);

        assert_eq!(directory.lookup(12892).unwrap().name, "Los Angeles International");
        assert_eq!(directory.lookup(10397).unwrap().name, "Atlanta");
    }

    #[test]
    fn test_destination_only_airport_is_listed() {
        let flights = vec![flight((10397, "Atlanta"), (14747, "Seattle"))];
        let directory = AirportDirectory::from_flights(&flights);
        assert!(directory.contains(14747));
        assert_eq!(directory.lookup(14747).unwrap().state, "YY");
    }

    #[test]
    fn test_lookup_missing_is_not_found() {
        let directory = AirportDirectory::from_flights(&[flight((1, "A"), (2, "B"))]);
        assert!(matches!(directory.lookup(999_999), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_list_is_alphabetical() {
        let flights = vec![
            flight((3, "Charlie"), (1, "Alpha")),
            flight((2, "Bravo"), (4, "Delta")),
        ];
        let directory = AirportDirectory::from_flights(&flights);
        let names: Vec<&str> = directory.list().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Bravo", "Charlie", "Delta"]);
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/airports.csv");
        let flights = vec![
            flight((13930, "Chicago O'Hare, International"), (12478, "JFK")),
            flight((12892, "LAX"), (13930, "ignored")),
        ];
        let directory = AirportDirectory::from_flights(&flights);
        directory.save_csv(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("AirportID,AirportName,City,State"));
        assert!(lines.next().unwrap().starts_with("12478,"));

        let loaded = AirportDirectory::load_csv(&path).unwrap();
        assert_eq!(loaded.records(), directory.records());
        assert_eq!(loaded.lookup(13930).unwrap().name, "Chicago O'Hare, International");
    }

    #[test]
    fn test_duplicate_ids_rejected_on_load() {
        let records = vec![
            AirportRecord {
                id: 1,
                name: "A".to_string(),
                city: "C".to_string(),
                state: "S".to_string(),
            },
            AirportRecord {
                id: 1,
                name: "B".to_string(),
                city: "C".to_string(),
                state: "S".to_string(),
            },
        ];
        assert!(matches!(
            AirportDirectory::from_records(records),
            Err(AppError::ArtifactLoad(_))
        ));
    }

    #[test]
    fn test_missing_file_is_artifact_error() {
        assert!(matches!(
            AirportDirectory::load_csv("/nonexistent/airports.csv"),
            Err(AppError::ArtifactLoad(_))
        ));
    }
}
