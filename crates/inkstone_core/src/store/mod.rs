//! Store collaborator contract.
//!
//! # Responsibility
//! - Define the live result-set interface the rest of the core writes
//!   through: change subscription, pull accessors, create-with-links,
//!   field patches, deletes and reverse-link primitives.
//! - Keep the actual storage engine out of the core: any embedded database,
//!   in-memory index or remote service can implement [`Store`].
//!
//! # Invariants
//! - Every successful write notifies the listeners registered for the
//!   affected entity kind, synchronously, after the write is visible to
//!   pull accessors.
//! - `create_*` link requests are resolved atomically with the insert.
//! - Reverse-link primitives keep the forward reference on the note in
//!   step with the owning category's `note_ids` set.

use crate::model::entity::{
    order_cmp, Attachment, Category, EntityId, EntityKind, Note, Notebook, NoteVersion,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

pub mod memory;

pub use memory::MemoryStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by store implementations.
#[derive(Debug)]
pub enum StoreError {
    /// Target record does not exist.
    NotFound { kind: EntityKind, id: EntityId },
    /// A link request referenced a missing record.
    LinkTargetMissing { kind: EntityKind, id: EntityId },
    /// A link request named a relation the store does not maintain.
    UnsupportedLink { kind: EntityKind, field: LinkField },
    /// Implementation-specific failure (I/O, corruption, ...).
    Backend(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { kind, id } => write!(f, "{kind:?} not found: {id}"),
            Self::LinkTargetMissing { kind, id } => {
                write!(f, "link target {kind:?} not found: {id}")
            }
            Self::UnsupportedLink { kind, field } => {
                write!(f, "unsupported link {kind:?}.{field:?}")
            }
            Self::Backend(message) => write!(f, "store backend failure: {message}"),
        }
    }
}

impl Error for StoreError {}

/// Relation field named by a [`LinkRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkField {
    /// `Notebook.categories` reverse side.
    Categories,
    /// `Category.notes` / `Notebook.notes` reverse side.
    Notes,
    /// `Note.attachments` reverse side.
    Attachments,
}

/// One relational link resolved atomically with a create, or applied by the
/// reverse-link primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRequest {
    pub kind: EntityKind,
    pub field: LinkField,
    pub id: EntityId,
}

/// Change notification payload delivered to subscribed listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    pub kind: EntityKind,
    /// Identities touched by the triggering write.
    pub ids: Vec<EntityId>,
}

/// Listener invoked with the changed entity set.
pub type ChangeListener = Rc<dyn Fn(&ChangeSet)>;

/// Handle returned by [`Store::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionToken {
    pub kind: EntityKind,
    pub(crate) id: u64,
}

/// New-record payloads. Timestamps are caller-supplied epoch milliseconds.
#[derive(Debug, Clone)]
pub struct NotebookDraft {
    pub title: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct CategoryDraft {
    pub title: String,
    pub order: f64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub order: f64,
    pub local_version: i64,
    pub remote_version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct AttachmentDraft {
    pub filename: String,
    pub ext: String,
    pub size: u64,
    pub local_path: String,
    pub remote_path: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Field update for one note; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct NotePatch {
    pub id: EntityId,
    pub title: Option<String>,
    pub content: Option<String>,
    pub order: Option<f64>,
    pub local_version: Option<i64>,
    pub updated_at: Option<i64>,
}

/// Field update for one category; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct CategoryPatch {
    pub id: EntityId,
    pub title: Option<String>,
    pub order: Option<f64>,
    pub updated_at: Option<i64>,
}

/// Live result-set interface over the persistent object store.
pub trait Store {
    /// Registers a change listener for one entity kind.
    fn subscribe(&self, kind: EntityKind, listener: ChangeListener) -> SubscriptionToken;
    /// Removes a previously registered listener. Unknown tokens are no-ops.
    fn unsubscribe(&self, token: SubscriptionToken);

    fn notebooks(&self) -> Vec<Notebook>;
    fn notebook(&self, id: EntityId) -> Option<Notebook>;
    fn create_notebook(&self, draft: NotebookDraft) -> EntityId;

    fn categories(&self) -> Vec<Category>;
    fn category(&self, id: EntityId) -> Option<Category>;
    fn create_category(&self, draft: CategoryDraft, links: &[LinkRequest])
        -> StoreResult<EntityId>;
    fn update_category(&self, patch: &CategoryPatch) -> StoreResult<()>;
    fn delete_category(&self, id: EntityId) -> StoreResult<()>;

    fn notes(&self) -> Vec<Note>;
    fn note(&self, id: EntityId) -> Option<Note>;
    fn create_note(&self, draft: NoteDraft, links: &[LinkRequest]) -> StoreResult<EntityId>;
    fn update_note(&self, patch: &NotePatch) -> StoreResult<()>;
    /// Applies every patch as one committed unit, then notifies once.
    fn update_notes(&self, patches: &[NotePatch]) -> StoreResult<()>;
    fn delete_note(&self, id: EntityId) -> StoreResult<()>;

    /// Adds the reverse link named by `link` pointing at `note_id`.
    fn add_note_link(&self, note_id: EntityId, link: &LinkRequest) -> StoreResult<()>;
    /// Removes the reverse link named by `link` pointing at `note_id`.
    fn remove_note_link(&self, note_id: EntityId, link: &LinkRequest) -> StoreResult<()>;

    fn attachment(&self, id: EntityId) -> Option<Attachment>;
    fn create_attachment(
        &self,
        draft: AttachmentDraft,
        links: &[LinkRequest],
    ) -> StoreResult<EntityId>;

    /// Version list for one note. Recording happens outside this core.
    fn versions_for(&self, note_id: EntityId) -> Vec<NoteVersion>;
    /// Captured content for one (version, note) pair.
    fn version_content(&self, version_id: EntityId, note_id: EntityId) -> Option<String>;

    /// Ordered categories of one notebook.
    fn categories_of(&self, notebook_id: EntityId) -> Vec<Category> {
        let mut categories: Vec<Category> = self
            .categories()
            .into_iter()
            .filter(|category| category.notebook_id == notebook_id)
            .collect();
        categories.sort_by(|a, b| order_cmp(a.order, a.id, b.order, b.id));
        categories
    }

    /// Ordered notes of one category.
    fn notes_of_category(&self, category_id: EntityId) -> Vec<Note> {
        let mut notes: Vec<Note> = self
            .notes()
            .into_iter()
            .filter(|note| note.category_id == category_id)
            .collect();
        notes.sort_by(|a, b| order_cmp(a.order, a.id, b.order, b.id));
        notes
    }

    /// First category of the notebook carrying `title`, if any.
    fn category_by_title(&self, notebook_id: EntityId, title: &str) -> Option<Category> {
        self.categories()
            .into_iter()
            .find(|category| category.notebook_id == notebook_id && category.title == title)
    }
}
