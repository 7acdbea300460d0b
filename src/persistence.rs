//! Persistence boundaries: the map store and the archive store.
//!
//! Both are external collaborators specified at their seam only. The map
//! store saves and lists whole `ConceptMap` records (a map's nodes and edges
//! always travel as one unit, never partially); the archive store accepts a
//! single uploaded project archive and hands back a storage path which is
//! recorded on a submission record. Archive contents are never parsed here.

use crate::types::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for an archive submission.
pub type SubmissionId = Uuid;

/// Failures at the persistence boundary. Always recoverable; the in-memory
/// map is never rolled back because a save failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    /// The backing storage could not be reached or refused the operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    /// The requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The payload failed schema validation on the way in or out.
    #[error("invalid map data: {0}")]
    InvalidData(String),
}

/// Storage seam for saved concept maps.
pub trait MapStore {
    /// Stores a new map and returns the stored record.
    fn create_map(
        &mut self,
        name: &str,
        owner: UserId,
        data: MapData,
        is_public: bool,
        shared_classroom: Option<ClassroomId>,
    ) -> Result<ConceptMap, PersistenceError>;

    /// Lists every map owned by the given user.
    fn list_maps_by_owner(&self, owner: UserId) -> Result<Vec<ConceptMap>, PersistenceError>;

    /// Lists every map shared with the given classroom.
    fn list_maps_by_classroom(
        &self,
        classroom: ClassroomId,
    ) -> Result<Vec<ConceptMap>, PersistenceError>;
}

/// In-memory map store used by tests and as the offline library backend.
#[derive(Debug, Default)]
pub struct InMemoryMapStore {
    maps: Vec<ConceptMap>,
}

impl InMemoryMapStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored maps.
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    /// True when no maps are stored.
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

impl MapStore for InMemoryMapStore {
    fn create_map(
        &mut self,
        name: &str,
        owner: UserId,
        data: MapData,
        is_public: bool,
        shared_classroom: Option<ClassroomId>,
    ) -> Result<ConceptMap, PersistenceError> {
        let problems = data.integrity();
        if !problems.is_empty() {
            return Err(PersistenceError::InvalidData(problems.join("; ")));
        }
        let map = ConceptMap::new(name, owner, data, is_public, shared_classroom);
        self.maps.push(map.clone());
        Ok(map)
    }

    fn list_maps_by_owner(&self, owner: UserId) -> Result<Vec<ConceptMap>, PersistenceError> {
        Ok(self
            .maps
            .iter()
            .filter(|m| m.owner == owner)
            .cloned()
            .collect())
    }

    fn list_maps_by_classroom(
        &self,
        classroom: ClassroomId,
    ) -> Result<Vec<ConceptMap>, PersistenceError> {
        Ok(self
            .maps
            .iter()
            .filter(|m| m.shared_classroom == Some(classroom))
            .cloned()
            .collect())
    }
}

/// Record pairing an uploaded archive with the storage path it landed at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Submission {
    /// Unique identifier for this submission
    pub id: SubmissionId,
    /// Original file name of the uploaded archive
    pub file_name: String,
    /// Size of the archive in bytes
    pub size_bytes: u64,
    /// Path returned by the archive store
    pub storage_path: String,
    /// Upload timestamp (ISO 8601 when serialized)
    pub submitted_at: DateTime<Utc>,
}

impl Submission {
    /// Creates a submission record stamped with the current time.
    pub fn new(file_name: impl Into<String>, size_bytes: u64, storage_path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.into(),
            size_bytes,
            storage_path: storage_path.into(),
            submitted_at: Utc::now(),
        }
    }
}

/// Storage seam for uploaded project archives.
pub trait ArchiveStore {
    /// Stores an archive and returns its storage path.
    fn store_archive(&mut self, file_name: &str, bytes: &[u8]) -> Result<String, PersistenceError>;
}

/// Archive store backed by a local directory, native builds only.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug)]
pub struct LocalArchiveStore {
    root: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl LocalArchiveStore {
    /// Creates a store rooted at the given directory.
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl ArchiveStore for LocalArchiveStore {
    fn store_archive(&mut self, file_name: &str, bytes: &[u8]) -> Result<String, PersistenceError> {
        std::fs::create_dir_all(&self.root)
            .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        // Prefix with a fresh id so repeated uploads of the same file never collide
        let stored_name = format!("{}-{}", Uuid::new_v4(), file_name);
        let path = self.root.join(stored_name);
        std::fs::write(&path, bytes)
            .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        Ok(path.display().to_string())
    }
}
