//! Medicine document store.
//!
//! Documents are kept in an append-only JSONL (JSON Lines) log of put and
//! delete records. Replaying the log yields the live documents in insertion
//! order. Every operation goes through the store's sidecar lock (see
//! [`crate::lockfile`]), so compaction's rename cannot strand a writer on
//! the replaced file.

use crate::lockfile::LockGuard;
use crate::{Error, Medicine, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Persistence seam for medicine documents
pub trait MedicineStore {
    fn insert(&mut self, medicine: &Medicine) -> Result<()>;

    /// Remove a document; returns false if the owner has no such document
    fn remove(&mut self, owner_id: Uuid, id: Uuid) -> Result<bool>;

    fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<Medicine>>;
}

/// One line of the store log
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StoreRecord {
    Put { medicine: Medicine },
    Delete { id: Uuid, owner_id: Uuid },
}

/// JSONL-based medicine store
pub struct JsonlStore {
    path: PathBuf,
}

impl JsonlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append records; the caller holds the exclusive lock
    fn append_locked(&self, records: &[StoreRecord]) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        write_records(&file, records)
    }

    /// Live documents; the caller holds a lock
    fn live_locked(&self) -> Result<Vec<Medicine>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)?;
        Ok(replay(parse_records(BufReader::new(file))?))
    }

    /// Rewrite the log so it only holds live documents
    ///
    /// Returns the number of documents kept.
    pub fn compact(&self) -> Result<usize> {
        if !self.path.exists() {
            return Ok(0);
        }

        let _lock = LockGuard::exclusive(&self.path)?;
        let live = self.live_locked()?;

        let parent = self.path.parent().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "store path missing parent",
            ))
        })?;
        let temp = NamedTempFile::new_in(parent)?;
        let records: Vec<StoreRecord> = live
            .iter()
            .map(|medicine| StoreRecord::Put {
                medicine: medicine.clone(),
            })
            .collect();
        write_records(temp.as_file(), &records)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::info!("Compacted store to {} documents", live.len());
        Ok(live.len())
    }
}

impl MedicineStore for JsonlStore {
    fn insert(&mut self, medicine: &Medicine) -> Result<()> {
        let _lock = LockGuard::exclusive(&self.path)?;
        self.append_locked(&[StoreRecord::Put {
            medicine: medicine.clone(),
        }])?;

        tracing::debug!("Appended medicine {} to store", medicine.id);
        Ok(())
    }

    fn remove(&mut self, owner_id: Uuid, id: Uuid) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }

        // Liveness check and tombstone under one lock
        let _lock = LockGuard::exclusive(&self.path)?;
        let found = self
            .live_locked()?
            .iter()
            .any(|m| m.id == id && m.owner_id == owner_id);
        if found {
            self.append_locked(&[StoreRecord::Delete { id, owner_id }])?;
            tracing::debug!("Appended tombstone for medicine {}", id);
        }
        Ok(found)
    }

    fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<Medicine>> {
        let medicines: Vec<Medicine> = read_medicines(&self.path)?
            .into_iter()
            .filter(|m| m.owner_id == owner_id)
            .collect();
        tracing::debug!("Listed {} medicines for owner {}", medicines.len(), owner_id);
        Ok(medicines)
    }
}

/// In-process store, used where nothing needs to outlive the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    medicines: Vec<Medicine>,
}

impl MedicineStore for MemoryStore {
    fn insert(&mut self, medicine: &Medicine) -> Result<()> {
        self.medicines.retain(|m| m.id != medicine.id);
        self.medicines.push(medicine.clone());
        Ok(())
    }

    fn remove(&mut self, owner_id: Uuid, id: Uuid) -> Result<bool> {
        let before = self.medicines.len();
        self.medicines
            .retain(|m| !(m.id == id && m.owner_id == owner_id));
        Ok(self.medicines.len() != before)
    }

    fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<Medicine>> {
        Ok(self
            .medicines
            .iter()
            .filter(|m| m.owner_id == owner_id)
            .cloned()
            .collect())
    }
}

/// Read all records from a store log, skipping lines that fail to parse
pub fn read_records(path: &Path) -> Result<Vec<StoreRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let _lock = LockGuard::shared(path)?;
    let records = parse_records(BufReader::new(File::open(path)?))?;

    tracing::debug!("Read {} records from store", records.len());
    Ok(records)
}

/// Read the live documents from a store log
pub fn read_medicines(path: &Path) -> Result<Vec<Medicine>> {
    Ok(replay(read_records(path)?))
}

fn write_records(file: &File, records: &[StoreRecord]) -> Result<()> {
    let mut writer = std::io::BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

fn parse_records<R: Read>(reader: BufReader<R>) -> Result<Vec<StoreRecord>> {
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<StoreRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Failed to parse store record at line {}: {}", line_num + 1, e);
                // Continue reading, don't fail completely
            }
        }
    }

    Ok(records)
}

fn replay(records: Vec<StoreRecord>) -> Vec<Medicine> {
    let mut live: Vec<Medicine> = Vec::new();

    for record in records {
        match record {
            StoreRecord::Put { medicine } => {
                live.retain(|m| m.id != medicine.id);
                live.push(medicine);
            }
            StoreRecord::Delete { id, owner_id } => {
                live.retain(|m| !(m.id == id && m.owner_id == owner_id));
            }
        }
    }

    live
}
