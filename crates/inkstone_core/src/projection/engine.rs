//! Projection engine: subscribes to the live result sets and rebuilds the
//! snapshot.
//!
//! # Responsibility
//! - Register one change listener per watched result set and mark the
//!   projection dirty on every notification; the controller coalesces
//!   dirtiness into debounced rebuilds.
//! - Derive every snapshot slice from store state on `rebuild`.
//!
//! # Invariants
//! - `rebuild` is idempotent: with no intervening store change, two calls
//!   produce equal snapshots.
//! - Switching the current note/notebook is synchronous; it never waits on
//!   the coalescing window.
//! - Version slices change only through the explicit `show_*`/`hide_*`
//!   calls, never through the store-change path.

use crate::model::entity::{EntityId, EntityKind};
use crate::projection::snapshot::{
    CategoryView, LayoutComponent, NotebookListItem, NotebookView, Snapshot, VersionListItem,
};
use crate::store::{ChangeSet, NotePatch, Store, SubscriptionToken};
use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

/// Placeholder shown when a version recorded no content change.
const NO_VERSION_CONTENT: &str = "This version has no content change";

/// Owner and sole writer of the [`Snapshot`].
pub struct ProjectionEngine<S: Store> {
    store: Rc<S>,
    snapshot: Snapshot,
    current_notebook_id: Option<EntityId>,
    current_note_id: Option<EntityId>,
    query: String,
    dirty: Rc<Cell<bool>>,
    tokens: Vec<SubscriptionToken>,
}

impl<S: Store> ProjectionEngine<S> {
    /// Creates the engine, registers the three result-set listeners and
    /// performs the initial rebuild.
    pub fn new(store: Rc<S>) -> Self {
        let dirty = Rc::new(Cell::new(false));
        let mut tokens = Vec::new();
        for kind in [EntityKind::Notebook, EntityKind::Category, EntityKind::Note] {
            let flag = Rc::clone(&dirty);
            tokens.push(store.subscribe(
                kind,
                Rc::new(move |change: &ChangeSet| {
                    log::trace!(
                        "event=store_changed module=projection kind={:?} count={}",
                        change.kind,
                        change.ids.len()
                    );
                    flag.set(true);
                }),
            ));
        }

        let mut engine = Self {
            store,
            snapshot: Snapshot::default(),
            current_notebook_id: None,
            current_note_id: None,
            query: String::new(),
            dirty,
            tokens,
        };
        engine.rebuild();
        engine
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn current_notebook_id(&self) -> Option<EntityId> {
        self.current_notebook_id
    }

    pub fn current_note_id(&self) -> Option<EntityId> {
        self.current_note_id
    }

    /// Returns and clears the pending-change flag set by store listeners.
    pub fn take_dirty(&self) -> bool {
        self.dirty.replace(false)
    }

    /// Unregisters the store listeners. The engine keeps working in pull
    /// mode afterwards; used by teardown paths.
    pub fn detach(&mut self) {
        for token in self.tokens.drain(..) {
            self.store.unsubscribe(token);
        }
    }

    /// Recomputes every store-derived snapshot slice.
    pub fn rebuild(&mut self) {
        self.snapshot.notebook_list = self
            .store
            .notebooks()
            .into_iter()
            .map(|notebook| NotebookListItem {
                id: notebook.id,
                title: notebook.title,
            })
            .collect();

        self.snapshot.current_notebook = self.current_notebook_id.and_then(|notebook_id| {
            let notebook = self.store.notebook(notebook_id)?;
            let categories: Vec<CategoryView> = self
                .store
                .categories_of(notebook_id)
                .into_iter()
                .map(|category| CategoryView {
                    notes: self.store.notes_of_category(category.id),
                    id: category.id,
                    title: category.title,
                    order: category.order,
                })
                .collect();
            let notes = categories
                .iter()
                .flat_map(|category| category.notes.iter().cloned())
                .collect();
            Some(NotebookView {
                id: notebook.id,
                title: notebook.title,
                categories,
                notes,
            })
        });
        if self.snapshot.current_notebook.is_none() {
            self.current_notebook_id = None;
        }

        match self.current_note_id.and_then(|id| self.store.note(id)) {
            Some(note) => self.snapshot.current_note = Some(note),
            None => {
                // Deleted or never selected; drop the dangling slice. The
                // controller is responsible for selecting a replacement.
                self.current_note_id = None;
                self.snapshot.current_note = None;
                self.snapshot.current_note_content.clear();
            }
        }

        self.snapshot.search_results = if self.query.is_empty() {
            Vec::new()
        } else {
            let query = self.query.as_str();
            self.store
                .notes()
                .into_iter()
                .filter(|note| note.title.contains(query) || note.content.contains(query))
                .collect()
        };

        self.dirty.set(false);
        log::trace!(
            "event=projection_rebuilt module=projection notebooks={} current_notebook={:?}",
            self.snapshot.notebook_list.len(),
            self.current_notebook_id
        );
    }

    /// Synchronously opens a notebook. Navigation never debounces.
    pub fn switch_notebook(&mut self, notebook_id: EntityId) {
        self.current_notebook_id = Some(notebook_id);
        self.rebuild();
    }

    /// Synchronously clears the open notebook (and with it the note).
    pub fn exit_notebook(&mut self) {
        self.current_notebook_id = None;
        self.current_note_id = None;
        self.rebuild();
    }

    /// Synchronously selects a note and loads its content slice.
    pub fn switch_note(&mut self, note_id: EntityId) {
        self.current_note_id = Some(note_id);
        match self.store.note(note_id) {
            Some(note) => {
                self.snapshot.current_note_content = note.content.clone();
                self.snapshot.current_note = Some(note);
            }
            None => {
                self.current_note_id = None;
                self.snapshot.current_note = None;
                self.snapshot.current_note_content.clear();
            }
        }
    }

    /// Drops the note selection, e.g. when a notebook opens empty.
    pub fn clear_current_note(&mut self) {
        self.current_note_id = None;
        self.snapshot.current_note = None;
        self.snapshot.current_note_content.clear();
    }

    /// Applies an already persisted note patch to the snapshot in place,
    /// without waiting for the debounced rebuild.
    pub fn apply_note_patch(&mut self, patch: &NotePatch) {
        let apply = |note: &mut crate::model::entity::Note| {
            if note.id != patch.id {
                return;
            }
            if let Some(title) = &patch.title {
                note.title = title.clone();
            }
            if let Some(content) = &patch.content {
                note.content = content.clone();
            }
            if let Some(order) = patch.order {
                note.order = order;
            }
            if let Some(updated_at) = patch.updated_at {
                note.updated_at = updated_at;
            }
        };

        if let Some(notebook) = self.snapshot.current_notebook.as_mut() {
            for category in notebook.categories.iter_mut() {
                category.notes.iter_mut().for_each(&apply);
            }
            notebook.notes.iter_mut().for_each(&apply);
        }
        if let Some(note) = self.snapshot.current_note.as_mut() {
            apply(note);
        }
    }

    /// Holds in-progress editor text; does not round-trip through the store.
    pub fn set_current_content(&mut self, content: &str) {
        self.snapshot.current_note_content = content.to_string();
    }

    /// Sets the active search query and recomputes the result slice.
    pub fn search(&mut self, query: &str) {
        self.query = query.to_string();
        self.rebuild();
    }

    pub fn toggle_layout(&mut self, component: LayoutComponent, value: Option<bool>) {
        let slot = match component {
            LayoutComponent::Sidebar => &mut self.snapshot.layout.sidebar,
            LayoutComponent::Editor => &mut self.snapshot.layout.editor,
            LayoutComponent::Preview => &mut self.snapshot.layout.preview,
        };
        *slot = value.unwrap_or(!*slot);
    }

    /// Populates the version list for one note: newest first, duplicate
    /// ids collapsed. Missing notes yield an empty list.
    pub fn show_versions(&mut self, note_id: EntityId) {
        let mut versions = self.store.versions_for(note_id);
        versions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let mut seen = HashSet::new();
        self.snapshot.versions.list = versions
            .into_iter()
            .filter(|version| seen.insert(version.id))
            .map(|version| VersionListItem {
                id: version.id,
                message: version.message,
                created_at: version.created_at,
            })
            .collect();
    }

    pub fn hide_versions(&mut self) {
        self.snapshot.versions.list.clear();
        self.snapshot.versions.current_content.clear();
    }

    pub fn show_version_content(&mut self, version_id: EntityId, note_id: EntityId) {
        self.snapshot.versions.current_content = self
            .store
            .version_content(version_id, note_id)
            .unwrap_or_else(|| NO_VERSION_CONTENT.to_string());
    }
}
