//! Entity records for the notebook hierarchy.
//!
//! # Responsibility
//! - Define `Notebook`, `Category`, `Note`, `Attachment` and version records.
//! - Provide ordering helpers shared by store and projection code.
//!
//! # Invariants
//! - `id` is stable and never reused for another entity.
//! - A `Note` points forward at exactly one `Category` and one `Notebook`;
//!   the owning category keeps the matching reverse link in `note_ids`.
//! - A `Category` with an empty `note_ids` set is transient and gets deleted
//!   as soon as a mutation detects it.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable identifier shared by every entity kind.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type EntityId = Uuid;

/// Entity kinds known to the store collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Notebook,
    Category,
    Note,
    Attachment,
}

/// Top-level container owning categories (and notes through them).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    pub id: EntityId,
    pub title: String,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

/// Grouping of notes inside one notebook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: EntityId,
    pub title: String,
    /// Fractional position among sibling categories of the notebook.
    pub order: f64,
    pub notebook_id: EntityId,
    /// Reverse side of the note → category relation.
    pub note_ids: Vec<EntityId>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Category {
    /// Returns whether the category currently holds no notes.
    pub fn is_empty(&self) -> bool {
        self.note_ids.is_empty()
    }
}

/// One note record.
///
/// `local_version`/`remote_version` are counters consumed by external sync
/// and history collaborators; this core only seeds and carries them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: EntityId,
    pub title: String,
    pub content: String,
    /// Fractional position among sibling notes of the category.
    pub order: f64,
    pub category_id: EntityId,
    pub notebook_id: EntityId,
    pub local_version: i64,
    pub remote_version: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub attachment_ids: Vec<EntityId>,
    pub version_ids: Vec<EntityId>,
}

/// Stored file metadata attached to one note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: EntityId,
    pub filename: String,
    pub ext: String,
    pub size: u64,
    pub local_path: String,
    pub remote_path: String,
    pub note_id: EntityId,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Historical version entry for one note.
///
/// Version *recording* is an external event-bus consumer; the core only
/// reads these back for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteVersion {
    pub id: EntityId,
    pub note_id: EntityId,
    pub message: String,
    pub created_at: i64,
}

/// Content captured for one version of one note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionContent {
    pub version_id: EntityId,
    pub note_id: EntityId,
    pub content: String,
}

/// Compares two sibling records by `order`, breaking ties by id so sorts
/// stay deterministic even when order values collide transiently.
pub fn order_cmp(a: f64, a_id: EntityId, b: f64, b_id: EntityId) -> Ordering {
    a.partial_cmp(&b)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a_id.cmp(&b_id))
}

/// Current wall-clock time in epoch milliseconds.
pub fn epoch_ms_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
