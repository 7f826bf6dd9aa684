use std::{
    fs::{File, OpenOptions},
    io::{BufRead, BufReader, ErrorKind, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::RecordStoreErr;

/// Records are only written once a run is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationStatus {
    Completed,
}

/// The metadata of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRecord {
    pub num_rounds: usize,
    pub num_clients: usize,
    pub fraction_fit: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: SimulationStatus,
}

/// A record together with the id its store assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: u64,
    #[serde(flatten)]
    pub record: SimulationRecord,
}

/// Persists simulation records.
pub trait RecordStore: Send + Sync {
    /// Persists a record.
    ///
    /// # Returns
    /// The id assigned to the record.
    fn append(&self, record: SimulationRecord) -> Result<u64, RecordStoreErr>;

    /// Returns every stored record in insertion order.
    fn records(&self) -> Result<Vec<StoredRecord>, RecordStoreErr>;
}

/// Keeps the records in memory, ids start at 1.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: Mutex<Vec<StoredRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn append(&self, record: SimulationRecord) -> Result<u64, RecordStoreErr> {
        let mut records = self.records.lock();
        let id = records.len() as u64 + 1;
        records.push(StoredRecord { id, record });
        Ok(id)
    }

    fn records(&self) -> Result<Vec<StoredRecord>, RecordStoreErr> {
        Ok(self.records.lock().clone())
    }
}

/// Stores one JSON object per line, a record's id is its line number.
#[derive(Debug)]
pub struct JsonLinesRecordStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesRecordStore {
    /// Creates a new `JsonLinesRecordStore`, the file is created on the first append.
    ///
    /// # Arguments
    /// * `path` - The file to append the records to.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Vec<StoredRecord>, RecordStoreErr> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            records.push(serde_json::from_str(&line)?);
        }

        Ok(records)
    }
}

impl RecordStore for JsonLinesRecordStore {
    fn append(&self, record: SimulationRecord) -> Result<u64, RecordStoreErr> {
        let _guard = self.lock.lock();

        let id = self.read_all()?.len() as u64 + 1;
        let mut line = serde_json::to_string(&StoredRecord { id, record })?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;

        Ok(id)
    }

    fn records(&self) -> Result<Vec<StoredRecord>, RecordStoreErr> {
        let _guard = self.lock.lock();
        self.read_all()
    }
}
