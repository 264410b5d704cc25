//! Core domain logic for Inkstone: notebooks, categories and notes over a
//! live-query object store, with fractional ordering and a debounced
//! projection into the one snapshot the UI reads.
//!
//! The storage engine, version recording, import/export and rendering are
//! external collaborators behind the traits in [`store`], [`config`],
//! [`attach`] and the event hub in [`events`].

pub mod attach;
pub mod config;
pub mod controller;
pub mod events;
pub mod links;
pub mod logging;
pub mod model;
pub mod order;
pub mod projection;
pub mod schedule;
pub mod store;

pub use attach::{AttachmentIo, AttachmentIoError, AttachmentSource, StoredFile};
pub use config::{ConfigStore, LastState, MemoryConfig};
pub use controller::{
    AttachmentInfo, Controller, ControllerError, ControllerResult, NewNote, NoteUpdate,
    PERSIST_WINDOW, REBUILD_WINDOW,
};
pub use events::{DomainEvent, EventHub};
pub use links::{LinkError, LinkResult, RelinkOutcome};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::entity::{
    Attachment, Category, EntityId, EntityKind, Note, Notebook, NoteVersion, VersionContent,
};
pub use order::alloc::{
    normalize_order_list, order_between, OrderBounds, OrderSlot, ORDER_START, ORDER_STEP,
};
pub use order::rebalance::{MoveDirection, OrderUpdate, RebalanceError, Sibling};
pub use projection::snapshot::{Layout, LayoutComponent, Snapshot};
pub use store::{
    AttachmentDraft, CategoryDraft, CategoryPatch, ChangeListener, ChangeSet, LinkField,
    LinkRequest, MemoryStore, NoteDraft, NotebookDraft, NotePatch, Store, StoreError, StoreResult,
    SubscriptionToken,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
