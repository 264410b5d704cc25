//! Mutation orchestrator: the controller surface of the core.
//!
//! # Responsibility
//! - Validate input, write through the store, keep note ↔ category links
//!   maintained, emit domain events and drive the projection engine.
//! - Own the two coalescing windows: a short one for projection rebuilds
//!   and a longer one for persisting in-progress note edits. They are
//!   separate instances and never share state.
//!
//! # Invariants
//! - Store write and event emission are one committed-or-not unit per
//!   mutation; a precondition failure aborts before either happens.
//! - Deleting the current note selects the first remaining sibling within
//!   the same operation.
//! - Navigation (switch notebook/note) is synchronous; content and list
//!   mutations flow through the debounced path.

use crate::attach::{AttachmentIo, AttachmentIoError, AttachmentSource};
use crate::config::{ConfigStore, LastState};
use crate::events::{DomainEvent, EventHub};
use crate::links::{self, LinkError};
use crate::model::entity::{epoch_ms_now, EntityId, EntityKind};
use crate::order::alloc::{normalize_order_list, order_between, OrderBounds};
use crate::order::rebalance::{plan_move, MoveDirection, OrderUpdate, RebalanceError, Sibling};
use crate::projection::engine::ProjectionEngine;
use crate::projection::snapshot::{LayoutComponent, Snapshot};
use crate::schedule::Scheduler;
use crate::store::{
    AttachmentDraft, CategoryPatch, LinkField, LinkRequest, NoteDraft, NotebookDraft, NotePatch,
    Store, StoreError,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;
use std::time::{Duration, Instant};

mod classify;

pub use classify::{classify_first_line, Classified, DEFAULT_TITLE};

/// Short window coalescing store-change notifications into one rebuild.
pub const REBUILD_WINDOW: Duration = Duration::from_millis(16);
/// Longer window coalescing live-edit updates into one persisted write.
pub const PERSIST_WINDOW: Duration = Duration::from_millis(500);

const REBUILD_KEY: &str = "projection.rebuild";
const PERSIST_KEY: &str = "note.persist";

/// Default title/content seeded into a brand-new note.
pub const NEW_NOTE_TITLE: &str = "New note";
pub const NEW_NOTE_CONTENT: &str = "# New note\n\n";

pub type ControllerResult<T> = Result<T, ControllerError>;

/// Errors surfaced by controller operations.
///
/// `Link(LinkError::CategoryNotEmpty { .. })` is the one user-facing
/// refusal; the rest are precondition violations or collaborator failures.
#[derive(Debug)]
pub enum ControllerError {
    NoCurrentNotebook,
    NoCurrentNote,
    NotebookNotFound(EntityId),
    NoteNotFound(EntityId),
    CategoryNotFound(EntityId),
    Link(LinkError),
    Rebalance(RebalanceError),
    Store(StoreError),
    Attachment(AttachmentIoError),
}

impl Display for ControllerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoCurrentNotebook => write!(f, "no notebook is currently open"),
            Self::NoCurrentNote => write!(f, "no note is currently selected"),
            Self::NotebookNotFound(id) => write!(f, "notebook not found: {id}"),
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::CategoryNotFound(id) => write!(f, "category not found: {id}"),
            Self::Link(err) => write!(f, "{err}"),
            Self::Rebalance(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Attachment(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ControllerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Link(err) => Some(err),
            Self::Rebalance(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Attachment(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LinkError> for ControllerError {
    fn from(value: LinkError) -> Self {
        Self::Link(value)
    }
}

impl From<RebalanceError> for ControllerError {
    fn from(value: RebalanceError) -> Self {
        Self::Rebalance(value)
    }
}

impl From<StoreError> for ControllerError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<AttachmentIoError> for ControllerError {
    fn from(value: AttachmentIoError) -> Self {
        Self::Attachment(value)
    }
}

/// Partial note update coming from live editing.
///
/// `id: None` targets the current note at flush time.
#[derive(Debug, Clone, Default)]
pub struct NoteUpdate {
    pub id: Option<EntityId>,
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone)]
struct PendingNoteUpdate {
    update: NoteUpdate,
    is_editing_heading: bool,
}

/// Optional overrides for [`Controller::new_note`].
#[derive(Debug, Clone, Default)]
pub struct NewNote {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// Metadata handed back after an attachment insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentInfo {
    pub id: EntityId,
    pub filename: String,
    pub ext: String,
}

/// Which kind of sibling set a move operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MoveKind {
    Note,
    Category,
}

/// The controller surface composing store, links, ordering, events and
/// projection.
pub struct Controller<S: Store, C: ConfigStore, A: AttachmentIo> {
    store: Rc<S>,
    config: C,
    attachments: A,
    events: EventHub,
    engine: ProjectionEngine<S>,
    rebuild_window: Scheduler<()>,
    persist_window: Scheduler<PendingNoteUpdate>,
}

impl<S: Store, C: ConfigStore, A: AttachmentIo> Controller<S, C, A> {
    /// Wires the projection engine to the store and performs the initial
    /// rebuild.
    pub fn new(store: Rc<S>, config: C, attachments: A) -> Self {
        let engine = ProjectionEngine::new(Rc::clone(&store));
        log::info!("event=controller_init module=controller status=ok");
        Self {
            store,
            config,
            attachments,
            events: EventHub::new(),
            engine,
            rebuild_window: Scheduler::new(REBUILD_WINDOW),
            persist_window: Scheduler::new(PERSIST_WINDOW),
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        self.engine.snapshot()
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    pub fn current_note_id(&self) -> Option<EntityId> {
        self.engine.current_note_id()
    }

    pub fn current_notebook_id(&self) -> Option<EntityId> {
        self.engine.current_notebook_id()
    }

    /// Runs due coalesced work: pending note flushes first (their store
    /// writes may mark the projection dirty), then due rebuilds.
    pub fn tick(&mut self, now: Instant) -> ControllerResult<()> {
        for pending in self.persist_window.take_due(now) {
            self.flush_note_update(pending)?;
            self.schedule_rebuild_if_dirty(now);
        }
        if !self.rebuild_window.take_due(now).is_empty() {
            self.engine.rebuild();
        }
        Ok(())
    }

    /// Earliest moment at which `tick` has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (
            self.rebuild_window.next_deadline(),
            self.persist_window.next_deadline(),
        ) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Restores the notebook/note selection persisted by the last session.
    /// Returns whether anything was restored.
    pub fn recover_last_state(&mut self) -> bool {
        if self.store.notebooks().is_empty() {
            log::debug!("event=recover_last_state module=controller status=skip reason=no_notebooks");
            return false;
        }
        let Some(state) = self.config.last_state() else {
            log::debug!("event=recover_last_state module=controller status=skip reason=no_state");
            return false;
        };
        match self.switch_current_notebook(state.notebook_id, Some(state.note_id)) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("event=recover_last_state module=controller status=error error={err}");
                false
            }
        }
    }

    pub fn create_notebook(&mut self, title: &str, now: Instant) -> EntityId {
        let now_ms = epoch_ms_now();
        let id = self.store.create_notebook(NotebookDraft {
            title: title.to_string(),
            created_at: now_ms,
            updated_at: now_ms,
        });
        log::info!("event=notebook_created module=controller id={id}");
        self.schedule_rebuild_if_dirty(now);
        id
    }

    /// Synchronously opens a notebook, selecting `note_id` or falling back
    /// to the notebook's first note.
    pub fn switch_current_notebook(
        &mut self,
        notebook_id: EntityId,
        note_id: Option<EntityId>,
    ) -> ControllerResult<()> {
        if self.store.notebook(notebook_id).is_none() {
            return Err(ControllerError::NotebookNotFound(notebook_id));
        }
        self.engine.switch_notebook(notebook_id);

        let in_notebook = |id: EntityId| {
            self.store
                .note(id)
                .is_some_and(|note| note.notebook_id == notebook_id)
        };
        let selected = note_id.filter(|id| in_notebook(*id)).or_else(|| {
            self.engine
                .snapshot()
                .current_notebook
                .as_ref()
                .and_then(|notebook| notebook.notes.first())
                .map(|note| note.id)
        });
        match selected {
            Some(note_id) => self.switch_current_note(note_id)?,
            None => self.engine.clear_current_note(),
        }
        Ok(())
    }

    pub fn exit_notebook(&mut self) {
        self.engine.exit_notebook();
    }

    /// Synchronously selects a note and remembers the selection for the
    /// next session.
    pub fn switch_current_note(&mut self, note_id: EntityId) -> ControllerResult<()> {
        if self.store.note(note_id).is_none() {
            return Err(ControllerError::NoteNotFound(note_id));
        }
        self.engine.switch_note(note_id);
        if let Some(notebook_id) = self.engine.current_notebook_id() {
            self.config.set_last_state(LastState {
                notebook_id,
                note_id,
            });
        }
        Ok(())
    }

    /// Queues a live-edit note update onto the persist window. Repeated
    /// calls within the window supersede each other (last write wins); the
    /// write itself happens on a later `tick`.
    pub fn request_note_update(
        &mut self,
        update: NoteUpdate,
        is_editing_heading: bool,
        now: Instant,
    ) {
        self.persist_window.schedule(
            PERSIST_KEY,
            now,
            PendingNoteUpdate {
                update,
                is_editing_heading,
            },
        );
    }

    /// Applies one coalesced note update: classification, independent
    /// change detection, store write, events, projection refresh.
    fn flush_note_update(&mut self, pending: PendingNoteUpdate) -> ControllerResult<()> {
        let note_id = pending
            .update
            .id
            .or_else(|| self.engine.current_note_id())
            .ok_or(ControllerError::NoCurrentNote)?;

        let mut title = pending.update.title.clone();
        if let Some(content) = pending.update.content.as_deref() {
            if !pending.is_editing_heading {
                let classified = classify_first_line(content);
                title = Some(classified.title);
                if let Some(category_title) = classified.category {
                    log::debug!(
                        "event=note_classified module=controller note={note_id} category={category_title}"
                    );
                    self.set_note_category_by_title(note_id, &category_title)?;
                }
            }
        }

        // Change detection runs against the snapshot the editor was typing
        // over, so a fixed-cadence update loop costs no writes when idle.
        let snapshot = self.engine.snapshot();
        let target = snapshot
            .current_notebook
            .as_ref()
            .ok_or(ControllerError::NoCurrentNotebook)?
            .notes
            .iter()
            .find(|note| note.id == note_id)
            .ok_or(ControllerError::NoteNotFound(note_id))?;
        let content_changed = pending
            .update
            .content
            .as_deref()
            .is_some_and(|content| content != snapshot.current_note_content);
        let metadata_changed = title
            .as_deref()
            .is_some_and(|candidate| candidate != target.title);
        if !content_changed && !metadata_changed {
            return Ok(());
        }

        let is_current = self.engine.current_note_id() == Some(note_id);
        let patch = NotePatch {
            id: note_id,
            title,
            content: pending.update.content.clone(),
            updated_at: Some(epoch_ms_now()),
            ..NotePatch::default()
        };
        self.store.update_note(&patch)?;
        if content_changed {
            self.events
                .emit(&DomainEvent::NoteContentChanged { id: note_id });
        }
        if metadata_changed {
            self.events.emit(&DomainEvent::NoteChanged { id: note_id });
        }

        self.engine.apply_note_patch(&patch);
        if is_current {
            if let Some(content) = patch.content.as_deref() {
                self.engine.set_current_content(content);
            }
        }
        Ok(())
    }

    /// Deletes a note; when it was the current one, the first remaining
    /// sibling becomes current as part of this same operation.
    pub fn delete_note(&mut self, note_id: EntityId, now: Instant) -> ControllerResult<()> {
        let note = self
            .store
            .note(note_id)
            .ok_or(ControllerError::NoteNotFound(note_id))?;
        let was_current = self.engine.current_note_id() == Some(note_id);

        self.store.delete_note(note_id)?;
        self.events.emit(&DomainEvent::NoteDeleted { id: note_id });
        // Emptied categories do not outlive their last note.
        links::delete_if_empty(&*self.store, &self.events, note.category_id)?;

        if was_current {
            self.engine.rebuild();
            let replacement = self
                .engine
                .snapshot()
                .current_notebook
                .as_ref()
                .and_then(|notebook| notebook.notes.first())
                .map(|note| note.id);
            if let Some(replacement) = replacement {
                log::debug!(
                    "event=current_note_deleted module=controller replacement={replacement}"
                );
                self.switch_current_note(replacement)?;
            }
        }
        self.schedule_rebuild_if_dirty(now);
        Ok(())
    }

    /// Explicit category deletion; refused with a message when non-empty.
    pub fn delete_category(&mut self, category_id: EntityId, now: Instant) -> ControllerResult<()> {
        links::delete_category(&*self.store, &self.events, category_id)?;
        self.schedule_rebuild_if_dirty(now);
        Ok(())
    }

    /// Creates a category ordered after `after_id` (default: the current
    /// note's category).
    pub fn create_category(
        &mut self,
        title: &str,
        after_id: Option<EntityId>,
        now: Instant,
    ) -> ControllerResult<EntityId> {
        let notebook_id = self
            .engine
            .current_notebook_id()
            .ok_or(ControllerError::NoCurrentNotebook)?;
        let anchor = match after_id {
            Some(id) => Some(
                self.store
                    .category(id)
                    .ok_or(ControllerError::CategoryNotFound(id))?,
            ),
            None => self
                .engine
                .snapshot()
                .current_note
                .as_ref()
                .and_then(|note| self.store.category(note.category_id)),
        };
        let id = links::create_category(
            &*self.store,
            &self.events,
            notebook_id,
            title,
            anchor.as_ref(),
            epoch_ms_now(),
        )?;
        self.engine.rebuild();
        self.schedule_rebuild_if_dirty(now);
        Ok(id)
    }

    /// Moves `note_id` into the category named `title`, creating the
    /// category on demand. Matching titles are a no-op.
    pub fn set_note_category_by_title(
        &mut self,
        note_id: EntityId,
        title: &str,
    ) -> ControllerResult<()> {
        let note = self
            .store
            .note(note_id)
            .ok_or(ControllerError::NoteNotFound(note_id))?;
        let old_category = self
            .store
            .category(note.category_id)
            .ok_or(ControllerError::CategoryNotFound(note.category_id))?;
        if old_category.title == title {
            return Ok(());
        }

        let new_category_id = links::resolve_category_by_title(
            &*self.store,
            &self.events,
            note.notebook_id,
            title,
            Some(&old_category),
            epoch_ms_now(),
        )?;
        self.set_note_category(note_id, new_category_id)
    }

    /// Relinks a note into another category, deleting the old category if
    /// the move emptied it.
    pub fn set_note_category(
        &mut self,
        note_id: EntityId,
        category_id: EntityId,
    ) -> ControllerResult<()> {
        let note = self
            .store
            .note(note_id)
            .ok_or(ControllerError::NoteNotFound(note_id))?;
        links::relink_note(
            &*self.store,
            &self.events,
            note_id,
            category_id,
            note.category_id,
        )?;
        self.engine.rebuild();
        Ok(())
    }

    /// Renames a category. An empty title is a no-op.
    pub fn rename_category(
        &mut self,
        category_id: EntityId,
        title: &str,
        now: Instant,
    ) -> ControllerResult<()> {
        if title.is_empty() {
            return Ok(());
        }
        self.store.update_category(&CategoryPatch {
            id: category_id,
            title: Some(title.to_string()),
            updated_at: Some(epoch_ms_now()),
            ..CategoryPatch::default()
        })?;
        self.events
            .emit(&DomainEvent::CategoryChanged { id: category_id });
        self.schedule_rebuild_if_dirty(now);
        Ok(())
    }

    /// Creates a note after the current one and switches to it.
    pub fn new_note(&mut self, options: NewNote, now: Instant) -> ControllerResult<EntityId> {
        let current = self
            .engine
            .snapshot()
            .current_note
            .clone()
            .ok_or(ControllerError::NoCurrentNote)?;
        // A single lower bound always has room; the fallback never fires.
        let order = order_between(OrderBounds::above(current.order))
            .value()
            .unwrap_or(current.order);
        let now_ms = epoch_ms_now();
        let id = self.store.create_note(
            NoteDraft {
                title: options.title.unwrap_or_else(|| NEW_NOTE_TITLE.to_string()),
                content: options
                    .content
                    .unwrap_or_else(|| NEW_NOTE_CONTENT.to_string()),
                order,
                local_version: 1,
                remote_version: 0,
                created_at: now_ms,
                updated_at: now_ms,
            },
            &[
                LinkRequest {
                    kind: EntityKind::Category,
                    field: LinkField::Notes,
                    id: current.category_id,
                },
                LinkRequest {
                    kind: EntityKind::Notebook,
                    field: LinkField::Notes,
                    id: current.notebook_id,
                },
            ],
        )?;
        self.events.emit(&DomainEvent::NoteCreated { id });
        log::info!("event=note_created module=controller id={id}");

        self.engine.rebuild();
        self.switch_current_note(id)?;
        self.schedule_rebuild_if_dirty(now);
        Ok(id)
    }

    /// Moves a note before/after a sibling note of the same category.
    pub fn move_note(
        &mut self,
        note_id: EntityId,
        comparison_id: EntityId,
        direction: MoveDirection,
        now: Instant,
    ) -> ControllerResult<()> {
        let note = self
            .store
            .note(note_id)
            .ok_or(ControllerError::NoteNotFound(note_id))?;
        let siblings: Vec<Sibling> = self
            .store
            .notes_of_category(note.category_id)
            .iter()
            .map(|note| Sibling {
                id: note.id,
                order: note.order,
            })
            .collect();
        self.apply_move(MoveKind::Note, &siblings, note_id, comparison_id, direction, now)
    }

    /// Moves a category before/after a sibling category of the notebook.
    pub fn move_category(
        &mut self,
        category_id: EntityId,
        comparison_id: EntityId,
        direction: MoveDirection,
        now: Instant,
    ) -> ControllerResult<()> {
        let category = self
            .store
            .category(category_id)
            .ok_or(ControllerError::CategoryNotFound(category_id))?;
        let siblings: Vec<Sibling> = self
            .store
            .categories_of(category.notebook_id)
            .iter()
            .map(|category| Sibling {
                id: category.id,
                order: category.order,
            })
            .collect();
        self.apply_move(
            MoveKind::Category,
            &siblings,
            category_id,
            comparison_id,
            direction,
            now,
        )
    }

    fn apply_move(
        &mut self,
        kind: MoveKind,
        siblings: &[Sibling],
        id: EntityId,
        comparison_id: EntityId,
        direction: MoveDirection,
        now: Instant,
    ) -> ControllerResult<()> {
        let plan = plan_move(siblings, id, comparison_id, direction)?;
        log::debug!(
            "event=order_move module=controller kind={kind:?} id={id} updates={}",
            plan.len()
        );
        match kind {
            MoveKind::Note => {
                let patches: Vec<NotePatch> = plan
                    .iter()
                    .map(|update| NotePatch {
                        id: update.id,
                        order: Some(update.order),
                        ..NotePatch::default()
                    })
                    .collect();
                self.store.update_notes(&patches)?;
                for OrderUpdate { id, .. } in &plan {
                    self.events.emit(&DomainEvent::NoteChanged { id: *id });
                }
                for patch in &patches {
                    self.engine.apply_note_patch(patch);
                }
            }
            MoveKind::Category => {
                for update in &plan {
                    self.store.update_category(&CategoryPatch {
                        id: update.id,
                        order: Some(update.order),
                        ..CategoryPatch::default()
                    })?;
                }
                for OrderUpdate { id, .. } in &plan {
                    self.events.emit(&DomainEvent::CategoryChanged { id: *id });
                }
            }
        }
        self.schedule_rebuild_if_dirty(now);
        Ok(())
    }

    /// Renumbers every note with evenly spaced orders. Explicit reset for
    /// fragmentation; never invoked automatically.
    pub fn normalize_all_note_order(&mut self, now: Instant) -> ControllerResult<()> {
        let mut notes = self.store.notes();
        notes.sort_by(|a, b| a.order.total_cmp(&b.order));
        let orders = normalize_order_list(notes.len());
        let patches: Vec<NotePatch> = notes
            .iter()
            .zip(orders)
            .map(|(note, order)| NotePatch {
                id: note.id,
                order: Some(order),
                ..NotePatch::default()
            })
            .collect();
        self.store.update_notes(&patches)?;
        log::info!(
            "event=order_normalized module=controller count={}",
            patches.len()
        );
        self.engine.rebuild();
        self.schedule_rebuild_if_dirty(now);
        Ok(())
    }

    /// Stores attachment bytes through the I/O collaborator and records the
    /// returned metadata against the current note.
    pub fn create_attachment(
        &mut self,
        source: &AttachmentSource,
        now: Instant,
    ) -> ControllerResult<AttachmentInfo> {
        let current = self
            .engine
            .snapshot()
            .current_note
            .clone()
            .ok_or(ControllerError::NoCurrentNote)?;
        let stored = self.attachments.store(source)?;
        let now_ms = epoch_ms_now();
        let id = self.store.create_attachment(
            AttachmentDraft {
                filename: stored.filename.clone(),
                ext: stored.ext.clone(),
                size: stored.size,
                local_path: stored.local_path,
                remote_path: String::new(),
                created_at: now_ms,
                updated_at: now_ms,
            },
            &[LinkRequest {
                kind: EntityKind::Note,
                field: LinkField::Attachments,
                id: current.id,
            }],
        )?;
        log::info!("event=attachment_created module=controller id={id} note={}", current.id);
        self.schedule_rebuild_if_dirty(now);
        Ok(AttachmentInfo {
            id,
            filename: stored.filename,
            ext: stored.ext,
        })
    }

    /// Recomputes the search slice for `query`, synchronously.
    pub fn search(&mut self, query: &str) {
        self.engine.search(query);
    }

    /// Toggles (or sets) one layout panel flag.
    pub fn toggle_layout(&mut self, component: LayoutComponent, value: Option<bool>) {
        self.engine.toggle_layout(component, value);
    }

    pub fn show_versions(&mut self, note_id: EntityId) {
        self.engine.show_versions(note_id);
    }

    pub fn hide_versions(&mut self) {
        self.engine.hide_versions();
    }

    pub fn show_version_content(&mut self, version_id: EntityId, note_id: EntityId) {
        self.engine.show_version_content(version_id, note_id);
    }

    fn schedule_rebuild_if_dirty(&mut self, now: Instant) {
        if self.engine.take_dirty() {
            self.rebuild_window.schedule(REBUILD_KEY, now, ());
        }
    }
}
