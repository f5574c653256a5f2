//! Dataset persistence seam.
//!
//! The engine never owns datasets between commands. Callers inject a
//! [`DatasetStore`]; [`MemoryStore`] is the in-process arena implementation.
//! Every commit names the revision it was computed from, and a commit against
//! a stale revision is refused instead of silently overwriting newer data.

use std::fmt;

use log::debug;
use serde::Serialize;
use thiserror::Error;

use crate::dataset::Dataset;

/// Opaque handle into a store. Handles of removed datasets never alias new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DatasetId {
    slot: u32,
    generation: u32,
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ds-{}.{}", self.slot, self.generation)
    }
}

#[derive(Debug, Clone)]
pub struct StoredDataset {
    pub id: DatasetId,
    pub revision: u64,
    pub dataset: Dataset,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Dataset {0} not found")]
    NotFound(DatasetId),
    #[error("Dataset {id} changed since revision {expected} (now at {actual})")]
    RevisionConflict {
        id: DatasetId,
        expected: u64,
        actual: u64,
    },
}

pub trait DatasetStore {
    fn insert(&mut self, dataset: Dataset) -> DatasetId;

    /// A copy of the current dataset together with its revision.
    fn load(&self, id: DatasetId) -> Result<StoredDataset, StoreError>;

    /// Replaces the dataset if it is still at `expected_revision`; returns the new revision.
    fn commit(
        &mut self,
        id: DatasetId,
        expected_revision: u64,
        dataset: Dataset,
    ) -> Result<u64, StoreError>;

    fn remove(&mut self, id: DatasetId) -> Result<Dataset, StoreError>;

    fn revision(&self, id: DatasetId) -> Result<u64, StoreError> {
        self.load(id).map(|stored| stored.revision)
    }
}

#[derive(Debug)]
struct Entry {
    revision: u64,
    dataset: Dataset,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.entry.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, id: DatasetId) -> Result<&Entry, StoreError> {
        self.slots
            .get(id.slot as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_ref())
            .ok_or(StoreError::NotFound(id))
    }

    fn slot_mut(&mut self, id: DatasetId) -> Result<&mut Slot, StoreError> {
        self.slots
            .get_mut(id.slot as usize)
            .filter(|slot| slot.generation == id.generation && slot.entry.is_some())
            .ok_or(StoreError::NotFound(id))
    }
}

impl DatasetStore for MemoryStore {
    fn insert(&mut self, dataset: Dataset) -> DatasetId {
        let entry = Entry {
            revision: 1,
            dataset,
        };
        let id = match self.free.pop() {
            Some(slot) => {
                let target = &mut self.slots[slot as usize];
                target.entry = Some(entry);
                DatasetId {
                    slot,
                    generation: target.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                DatasetId {
                    slot: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };
        debug!("Stored dataset {id}");
        id
    }

    fn load(&self, id: DatasetId) -> Result<StoredDataset, StoreError> {
        let entry = self.entry(id)?;
        Ok(StoredDataset {
            id,
            revision: entry.revision,
            dataset: entry.dataset.clone(),
        })
    }

    fn commit(
        &mut self,
        id: DatasetId,
        expected_revision: u64,
        dataset: Dataset,
    ) -> Result<u64, StoreError> {
        let slot = self.slot_mut(id)?;
        let Some(entry) = slot.entry.as_mut() else {
            return Err(StoreError::NotFound(id));
        };
        if entry.revision != expected_revision {
            return Err(StoreError::RevisionConflict {
                id,
                expected: expected_revision,
                actual: entry.revision,
            });
        }
        entry.revision += 1;
        entry.dataset = dataset;
        debug!("Committed dataset {id} at revision {}", entry.revision);
        Ok(entry.revision)
    }

    fn remove(&mut self, id: DatasetId) -> Result<Dataset, StoreError> {
        let slot = self.slot_mut(id)?;
        let entry = slot.entry.take().ok_or(StoreError::NotFound(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.slot);
        Ok(entry.dataset)
    }

    fn revision(&self, id: DatasetId) -> Result<u64, StoreError> {
        self.entry(id).map(|entry| entry.revision)
    }
}
