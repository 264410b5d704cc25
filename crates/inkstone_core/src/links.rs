//! Bidirectional note ↔ category link maintenance.
//!
//! # Responsibility
//! - Move notes between categories while keeping both relation sides
//!   consistent.
//! - Resolve categories by title, creating them on demand next to the
//!   referring context.
//! - Enforce the empty-category invariant: categories emptied by a relink
//!   are deleted; explicit deletion of a non-empty category is refused.
//!
//! # Invariants
//! - After `relink_note`, the note is in exactly one category's note set
//!   and points back at that category.
//! - Relinking a note to the category it is already in is a no-op.
//! - `delete_if_empty` never fails on missing or non-empty categories.

use crate::events::{DomainEvent, EventHub};
use crate::model::entity::{Category, EntityId, EntityKind};
use crate::order::alloc::{order_between, OrderBounds, OrderSlot};
use crate::store::{CategoryDraft, LinkField, LinkRequest, Store, StoreError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type LinkResult<T> = Result<T, LinkError>;

/// Errors from link maintenance.
#[derive(Debug)]
pub enum LinkError {
    /// User-visible refusal: explicit deletion of a category holding notes.
    CategoryNotEmpty { id: EntityId, title: String },
    CategoryNotFound(EntityId),
    NoteNotFound(EntityId),
    Store(StoreError),
}

impl Display for LinkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CategoryNotEmpty { title, .. } => {
                write!(f, "category `{title}` is not empty and cannot be deleted")
            }
            Self::CategoryNotFound(id) => write!(f, "category not found: {id}"),
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LinkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for LinkError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// What a relink did, for callers that refresh projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelinkOutcome {
    pub moved: bool,
    pub old_category_deleted: bool,
}

fn category_notes_link(category_id: EntityId) -> LinkRequest {
    LinkRequest {
        kind: EntityKind::Category,
        field: LinkField::Notes,
        id: category_id,
    }
}

/// Moves `note_id` from `old_category_id` into `new_category_id`.
///
/// Adds the new reverse link before removing the old one (the store is the
/// transactional unit), then deletes the old category if the move emptied
/// it. Emits `NoteChanged`, plus `CategoryDeleted` when the old category
/// goes away.
pub fn relink_note<S: Store>(
    store: &S,
    events: &EventHub,
    note_id: EntityId,
    new_category_id: EntityId,
    old_category_id: EntityId,
) -> LinkResult<RelinkOutcome> {
    if new_category_id == old_category_id {
        return Ok(RelinkOutcome {
            moved: false,
            old_category_deleted: false,
        });
    }
    if store.note(note_id).is_none() {
        return Err(LinkError::NoteNotFound(note_id));
    }

    store.add_note_link(note_id, &category_notes_link(new_category_id))?;
    store.remove_note_link(note_id, &category_notes_link(old_category_id))?;

    let old_category_deleted = delete_if_empty(store, events, old_category_id)?;

    events.emit(&DomainEvent::NoteChanged { id: note_id });
    log::debug!(
        "event=note_relinked module=links note={note_id} from={old_category_id} to={new_category_id} old_deleted={old_category_deleted}"
    );
    Ok(RelinkOutcome {
        moved: true,
        old_category_deleted,
    })
}

/// Finds the category with `title` inside `notebook_id`, creating it next
/// to `anchor` when absent. Single-writer, so lookup-then-create cannot
/// race against a concurrent duplicate.
pub fn resolve_category_by_title<S: Store>(
    store: &S,
    events: &EventHub,
    notebook_id: EntityId,
    title: &str,
    anchor: Option<&Category>,
    now_ms: i64,
) -> LinkResult<EntityId> {
    if let Some(existing) = store.category_by_title(notebook_id, title) {
        return Ok(existing.id);
    }
    create_category(store, events, notebook_id, title, anchor, now_ms)
}

/// Creates a category ordered directly after `anchor` (or at the default
/// start position when the notebook has no anchor to offer).
pub fn create_category<S: Store>(
    store: &S,
    events: &EventHub,
    notebook_id: EntityId,
    title: &str,
    anchor: Option<&Category>,
    now_ms: i64,
) -> LinkResult<EntityId> {
    let bounds = match anchor {
        Some(anchor) => OrderBounds {
            min: Some(anchor.order),
            max: store
                .categories_of(notebook_id)
                .iter()
                .map(|category| category.order)
                .filter(|&order| order > anchor.order)
                .fold(None, |best: Option<f64>, order| {
                    Some(best.map_or(order, |current| current.min(order)))
                }),
        },
        None => OrderBounds::default(),
    };
    let order = match order_between(bounds) {
        OrderSlot::Value(value) => value,
        // Fall back to the anchor's own slot; duplicate orders are
        // tolerated and tie-broken deterministically downstream.
        OrderSlot::NoRoom => anchor.map(|anchor| anchor.order).unwrap_or_default(),
    };

    let id = store.create_category(
        CategoryDraft {
            title: title.to_string(),
            order,
            created_at: now_ms,
            updated_at: now_ms,
        },
        &[LinkRequest {
            kind: EntityKind::Notebook,
            field: LinkField::Categories,
            id: notebook_id,
        }],
    )?;
    events.emit(&DomainEvent::CategoryCreated { id });
    log::debug!("event=category_created module=links id={id} title={title} order={order}");
    Ok(id)
}

/// Explicit category deletion. Refused when the category still holds notes.
pub fn delete_category<S: Store>(
    store: &S,
    events: &EventHub,
    category_id: EntityId,
) -> LinkResult<()> {
    let category = store
        .category(category_id)
        .ok_or(LinkError::CategoryNotFound(category_id))?;
    if !category.is_empty() {
        return Err(LinkError::CategoryNotEmpty {
            id: category_id,
            title: category.title,
        });
    }
    store.delete_category(category_id)?;
    events.emit(&DomainEvent::CategoryDeleted { id: category_id });
    Ok(())
}

/// Deletes `category_id` when it has become empty. Missing or still
/// populated categories are left alone; returns whether a delete happened.
pub fn delete_if_empty<S: Store>(
    store: &S,
    events: &EventHub,
    category_id: EntityId,
) -> LinkResult<bool> {
    let Some(category) = store.category(category_id) else {
        return Ok(false);
    };
    if !category.is_empty() {
        return Ok(false);
    }
    store.delete_category(category_id)?;
    events.emit(&DomainEvent::CategoryDeleted { id: category_id });
    log::debug!("event=empty_category_deleted module=links id={category_id}");
    Ok(true)
}
