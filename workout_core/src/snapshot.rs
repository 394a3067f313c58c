//! Snapshot provider seam and a JSON file implementation.
//!
//! Each workout lives in its own `<workout_id>.json` file. Reads take a
//! shared lock; writes go through a locked temp file that is renamed over
//! the original so readers never see a half-written snapshot.

use crate::ids::WorkoutId;
use crate::{Error, Result, WorkoutSnapshot};
use chrono::Utc;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Opaque identity of the caller, checked only by [`AccessControl`]
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(pub String);

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Entitlement check performed before a snapshot is handed out
pub trait AccessControl {
    fn authorize(&self, principal: &Principal, workout_id: WorkoutId) -> Result<()>;
}

/// Lets every principal through
pub struct AllowAll;

impl AccessControl for AllowAll {
    fn authorize(&self, _principal: &Principal, _workout_id: WorkoutId) -> Result<()> {
        Ok(())
    }
}

/// Lets only the listed principals through
pub struct AllowList {
    principals: HashSet<Principal>,
}

impl AllowList {
    pub fn new(principals: impl IntoIterator<Item = Principal>) -> Self {
        Self {
            principals: principals.into_iter().collect(),
        }
    }
}

impl AccessControl for AllowList {
    fn authorize(&self, principal: &Principal, workout_id: WorkoutId) -> Result<()> {
        if self.principals.contains(principal) {
            Ok(())
        } else {
            tracing::warn!("Principal {} denied access to workout {}", principal, workout_id);
            Err(Error::UnauthorizedAccess(format!(
                "'{}' may not access workout '{}'",
                principal, workout_id
            )))
        }
    }
}

/// Source of workout snapshots
pub trait SnapshotProvider {
    fn fetch(&self, principal: &Principal, workout_id: WorkoutId) -> Result<WorkoutSnapshot>;
}

/// Directory of JSON snapshot files with file locking
pub struct JsonSnapshotStore {
    dir: PathBuf,
    access: Box<dyn AccessControl>,
}

impl JsonSnapshotStore {
    /// Create a store over `dir` that lets every principal through
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_access(dir, Box::new(AllowAll))
    }

    pub fn with_access(dir: impl Into<PathBuf>, access: Box<dyn AccessControl>) -> Self {
        Self {
            dir: dir.into(),
            access,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, workout_id: WorkoutId) -> PathBuf {
        self.dir.join(format!("{}.json", workout_id))
    }

    /// Save a snapshot with exclusive locking
    ///
    /// Stamps `captured_at` and atomically writes by:
    /// 1. Writing to a temp file
    /// 2. Syncing to disk
    /// 3. Renaming over the original
    pub fn save(&self, principal: &Principal, snapshot: &mut WorkoutSnapshot) -> Result<()> {
        let workout_id = snapshot.workout.id;
        self.access.authorize(principal, workout_id)?;

        std::fs::create_dir_all(&self.dir)?;
        snapshot.captured_at = Some(Utc::now());

        let temp = NamedTempFile::new_in(&self.dir)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, snapshot)?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        let path = self.path_for(workout_id);
        temp.persist(&path).map_err(|e| Error::Io(e.error))?;

        tracing::info!("Saved workout {} to {:?}", workout_id, path);
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<WorkoutSnapshot> {
        let file = File::open(path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        Ok(serde_json::from_str(&contents)?)
    }
}

impl SnapshotProvider for JsonSnapshotStore {
    fn fetch(&self, principal: &Principal, workout_id: WorkoutId) -> Result<WorkoutSnapshot> {
        let path = self.path_for(workout_id);
        if !path.exists() {
            return Err(Error::NotFound(format!("Workout '{}'", workout_id)));
        }
        self.access.authorize(principal, workout_id)?;

        let snapshot = self.read(&path)?;
        if snapshot.workout.id != workout_id {
            return Err(Error::StructureInconsistent(format!(
                "File {:?} holds workout '{}'",
                path, snapshot.workout.id
            )));
        }

        tracing::debug!("Loaded workout {} from {:?}", workout_id, path);
        Ok(snapshot)
    }
}
