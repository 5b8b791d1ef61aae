//! Output-artifact references.

use crate::ids::TaskId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Reference to an output artifact a task promises to produce.
///
/// The staging layer decides when the file actually exists; from the future
/// layer's perspective these are opaque, ordered entries populated by the
/// engine and read back by consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputArtifact {
    task_id: TaskId,
    path: PathBuf,
}

impl OutputArtifact {
    /// Create an artifact reference for the producing task.
    pub fn new(task_id: TaskId, path: impl Into<PathBuf>) -> Self {
        Self {
            task_id,
            path: path.into(),
        }
    }

    /// Task that produces this artifact.
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Path where the artifact will materialize.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
