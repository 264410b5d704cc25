//! The derived, presentation-facing snapshot.
//!
//! Never a source of truth: every entity field here is recomputed from the
//! store. The only exceptions are the layout flags and the in-progress note
//! content, which exist only for responsiveness.

use crate::model::entity::{EntityId, Note};

/// Lightweight notebook listing entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NotebookListItem {
    pub id: EntityId,
    pub title: String,
}

/// One category of the current notebook with its ordered notes.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryView {
    pub id: EntityId,
    pub title: String,
    pub order: f64,
    pub notes: Vec<Note>,
}

/// The currently open notebook, fully denormalized for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct NotebookView {
    pub id: EntityId,
    pub title: String,
    /// Categories ordered by `order`, each with its ordered notes.
    pub categories: Vec<CategoryView>,
    /// The same notes flattened in display order, for selection logic.
    pub notes: Vec<Note>,
}

/// Version list entry for the history panel.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionListItem {
    pub id: EntityId,
    pub message: String,
    pub created_at: i64,
}

/// History panel slice; populated only by explicit calls.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VersionsView {
    pub list: Vec<VersionListItem>,
    pub current_content: String,
}

/// Panel visibility flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub sidebar: bool,
    pub editor: bool,
    pub preview: bool,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            sidebar: true,
            editor: true,
            preview: true,
        }
    }
}

/// Addressable layout panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutComponent {
    Sidebar,
    Editor,
    Preview,
}

/// The one structure presentation code reads.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub notebook_list: Vec<NotebookListItem>,
    pub current_notebook: Option<NotebookView>,
    pub current_note: Option<Note>,
    /// Raw content of the current note, held separately so the editor can
    /// read it without touching the full record.
    pub current_note_content: String,
    pub search_results: Vec<Note>,
    pub versions: VersionsView,
    pub layout: Layout,
}
