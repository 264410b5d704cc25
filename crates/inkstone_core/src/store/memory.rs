//! In-memory index implementing the [`Store`] contract.
//!
//! # Responsibility
//! - Back tests and database-less embedders with a faithful implementation
//!   of live result sets: synchronous listener fan-out after every write.
//!
//! # Invariants
//! - Listener callbacks run after all record mutations of the triggering
//!   write are visible; no `RefCell` borrow is held across a callback.
//! - Reverse-link maintenance keeps `Note.category_id` and
//!   `Category.note_ids` consistent with each other.

use super::{
    AttachmentDraft, CategoryDraft, CategoryPatch, ChangeListener, ChangeSet, LinkField,
    LinkRequest, NoteDraft, NotebookDraft, NotePatch, Store, StoreError, StoreResult,
    SubscriptionToken,
};
use crate::model::entity::{
    Attachment, Category, EntityId, EntityKind, Note, Notebook, NoteVersion, VersionContent,
};
use std::cell::{Cell, RefCell};
use uuid::Uuid;

/// Single-threaded in-memory store with live change notification.
#[derive(Default)]
pub struct MemoryStore {
    notebooks: RefCell<Vec<Notebook>>,
    categories: RefCell<Vec<Category>>,
    notes: RefCell<Vec<Note>>,
    attachments: RefCell<Vec<Attachment>>,
    versions: RefCell<Vec<NoteVersion>>,
    version_contents: RefCell<Vec<VersionContent>>,
    listeners: RefCell<Vec<(SubscriptionToken, ChangeListener)>>,
    next_token: Cell<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one historical version against a note.
    ///
    /// This is the write path an external history recorder would use; the
    /// core itself only reads versions back.
    pub fn record_version(&self, version: NoteVersion, content: Option<String>) {
        let note_id = version.note_id;
        let version_id = version.id;
        {
            let mut notes = self.notes.borrow_mut();
            if let Some(note) = notes.iter_mut().find(|note| note.id == note_id) {
                note.version_ids.push(version_id);
            }
        }
        self.versions.borrow_mut().push(version);
        if let Some(content) = content {
            self.version_contents.borrow_mut().push(VersionContent {
                version_id,
                note_id,
                content,
            });
        }
        self.notify(EntityKind::Note, vec![note_id]);
    }

    fn notify(&self, kind: EntityKind, ids: Vec<EntityId>) {
        let change = ChangeSet { kind, ids };
        // Snapshot the listener list so callbacks may subscribe/unsubscribe.
        let listeners: Vec<ChangeListener> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(token, _)| token.kind == kind)
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&change);
        }
    }

    fn category_exists(&self, id: EntityId) -> bool {
        self.categories
            .borrow()
            .iter()
            .any(|category| category.id == id)
    }

    fn notebook_exists(&self, id: EntityId) -> bool {
        self.notebooks
            .borrow()
            .iter()
            .any(|notebook| notebook.id == id)
    }
}

impl Store for MemoryStore {
    fn subscribe(&self, kind: EntityKind, listener: ChangeListener) -> SubscriptionToken {
        let token = SubscriptionToken {
            kind,
            id: self.next_token.replace(self.next_token.get() + 1),
        };
        self.listeners.borrow_mut().push((token, listener));
        token
    }

    fn unsubscribe(&self, token: SubscriptionToken) {
        self.listeners
            .borrow_mut()
            .retain(|(candidate, _)| *candidate != token);
    }

    fn notebooks(&self) -> Vec<Notebook> {
        self.notebooks.borrow().clone()
    }

    fn notebook(&self, id: EntityId) -> Option<Notebook> {
        self.notebooks
            .borrow()
            .iter()
            .find(|notebook| notebook.id == id)
            .cloned()
    }

    fn create_notebook(&self, draft: NotebookDraft) -> EntityId {
        let id = Uuid::new_v4();
        self.notebooks.borrow_mut().push(Notebook {
            id,
            title: draft.title,
            created_at: draft.created_at,
            updated_at: draft.updated_at,
        });
        self.notify(EntityKind::Notebook, vec![id]);
        id
    }

    fn categories(&self) -> Vec<Category> {
        self.categories.borrow().clone()
    }

    fn category(&self, id: EntityId) -> Option<Category> {
        self.categories
            .borrow()
            .iter()
            .find(|category| category.id == id)
            .cloned()
    }

    fn create_category(
        &self,
        draft: CategoryDraft,
        links: &[LinkRequest],
    ) -> StoreResult<EntityId> {
        let mut notebook_id = None;
        for link in links {
            match (link.kind, link.field) {
                (EntityKind::Notebook, LinkField::Categories) => {
                    if !self.notebook_exists(link.id) {
                        return Err(StoreError::LinkTargetMissing {
                            kind: EntityKind::Notebook,
                            id: link.id,
                        });
                    }
                    notebook_id = Some(link.id);
                }
                (kind, field) => return Err(StoreError::UnsupportedLink { kind, field }),
            }
        }
        let notebook_id = notebook_id.ok_or(StoreError::Backend(
            "category create requires a notebook link".to_string(),
        ))?;

        let id = Uuid::new_v4();
        self.categories.borrow_mut().push(Category {
            id,
            title: draft.title,
            order: draft.order,
            notebook_id,
            note_ids: Vec::new(),
            created_at: draft.created_at,
            updated_at: draft.updated_at,
        });
        self.notify(EntityKind::Category, vec![id]);
        Ok(id)
    }

    fn update_category(&self, patch: &CategoryPatch) -> StoreResult<()> {
        {
            let mut categories = self.categories.borrow_mut();
            let category = categories
                .iter_mut()
                .find(|category| category.id == patch.id)
                .ok_or(StoreError::NotFound {
                    kind: EntityKind::Category,
                    id: patch.id,
                })?;
            if let Some(title) = &patch.title {
                category.title = title.clone();
            }
            if let Some(order) = patch.order {
                category.order = order;
            }
            if let Some(updated_at) = patch.updated_at {
                category.updated_at = updated_at;
            }
        }
        self.notify(EntityKind::Category, vec![patch.id]);
        Ok(())
    }

    fn delete_category(&self, id: EntityId) -> StoreResult<()> {
        {
            let mut categories = self.categories.borrow_mut();
            let before = categories.len();
            categories.retain(|category| category.id != id);
            if categories.len() == before {
                return Err(StoreError::NotFound {
                    kind: EntityKind::Category,
                    id,
                });
            }
        }
        self.notify(EntityKind::Category, vec![id]);
        Ok(())
    }

    fn notes(&self) -> Vec<Note> {
        self.notes.borrow().clone()
    }

    fn note(&self, id: EntityId) -> Option<Note> {
        self.notes
            .borrow()
            .iter()
            .find(|note| note.id == id)
            .cloned()
    }

    fn create_note(&self, draft: NoteDraft, links: &[LinkRequest]) -> StoreResult<EntityId> {
        let mut category_id = None;
        let mut notebook_id = None;
        for link in links {
            match (link.kind, link.field) {
                (EntityKind::Category, LinkField::Notes) => {
                    if !self.category_exists(link.id) {
                        return Err(StoreError::LinkTargetMissing {
                            kind: EntityKind::Category,
                            id: link.id,
                        });
                    }
                    category_id = Some(link.id);
                }
                (EntityKind::Notebook, LinkField::Notes) => {
                    if !self.notebook_exists(link.id) {
                        return Err(StoreError::LinkTargetMissing {
                            kind: EntityKind::Notebook,
                            id: link.id,
                        });
                    }
                    notebook_id = Some(link.id);
                }
                (kind, field) => return Err(StoreError::UnsupportedLink { kind, field }),
            }
        }
        let category_id = category_id.ok_or(StoreError::Backend(
            "note create requires a category link".to_string(),
        ))?;
        let notebook_id = notebook_id.ok_or(StoreError::Backend(
            "note create requires a notebook link".to_string(),
        ))?;

        let id = Uuid::new_v4();
        self.notes.borrow_mut().push(Note {
            id,
            title: draft.title,
            content: draft.content,
            order: draft.order,
            category_id,
            notebook_id,
            local_version: draft.local_version,
            remote_version: draft.remote_version,
            created_at: draft.created_at,
            updated_at: draft.updated_at,
            attachment_ids: Vec::new(),
            version_ids: Vec::new(),
        });
        {
            let mut categories = self.categories.borrow_mut();
            if let Some(category) = categories
                .iter_mut()
                .find(|category| category.id == category_id)
            {
                category.note_ids.push(id);
            }
        }
        self.notify(EntityKind::Note, vec![id]);
        self.notify(EntityKind::Category, vec![category_id]);
        Ok(id)
    }

    fn update_note(&self, patch: &NotePatch) -> StoreResult<()> {
        self.update_notes(std::slice::from_ref(patch))
    }

    fn update_notes(&self, patches: &[NotePatch]) -> StoreResult<()> {
        {
            let mut notes = self.notes.borrow_mut();
            // All-or-nothing: resolve every target before touching any record.
            for patch in patches {
                if !notes.iter().any(|note| note.id == patch.id) {
                    return Err(StoreError::NotFound {
                        kind: EntityKind::Note,
                        id: patch.id,
                    });
                }
            }
            for patch in patches {
                let Some(note) = notes.iter_mut().find(|note| note.id == patch.id) else {
                    continue;
                };
                if let Some(title) = &patch.title {
                    note.title = title.clone();
                }
                if let Some(content) = &patch.content {
                    note.content = content.clone();
                }
                if let Some(order) = patch.order {
                    note.order = order;
                }
                if let Some(local_version) = patch.local_version {
                    note.local_version = local_version;
                }
                if let Some(updated_at) = patch.updated_at {
                    note.updated_at = updated_at;
                }
            }
        }
        if !patches.is_empty() {
            self.notify(
                EntityKind::Note,
                patches.iter().map(|patch| patch.id).collect(),
            );
        }
        Ok(())
    }

    fn delete_note(&self, id: EntityId) -> StoreResult<()> {
        let owning_category = {
            let mut notes = self.notes.borrow_mut();
            let position =
                notes
                    .iter()
                    .position(|note| note.id == id)
                    .ok_or(StoreError::NotFound {
                        kind: EntityKind::Note,
                        id,
                    })?;
            notes.remove(position).category_id
        };
        {
            let mut categories = self.categories.borrow_mut();
            if let Some(category) = categories
                .iter_mut()
                .find(|category| category.id == owning_category)
            {
                category.note_ids.retain(|note_id| *note_id != id);
            }
        }
        self.attachments
            .borrow_mut()
            .retain(|attachment| attachment.note_id != id);
        self.notify(EntityKind::Note, vec![id]);
        self.notify(EntityKind::Category, vec![owning_category]);
        Ok(())
    }

    fn add_note_link(&self, note_id: EntityId, link: &LinkRequest) -> StoreResult<()> {
        match (link.kind, link.field) {
            (EntityKind::Category, LinkField::Notes) => {
                {
                    let mut categories = self.categories.borrow_mut();
                    let category = categories
                        .iter_mut()
                        .find(|category| category.id == link.id)
                        .ok_or(StoreError::NotFound {
                            kind: EntityKind::Category,
                            id: link.id,
                        })?;
                    if !category.note_ids.contains(&note_id) {
                        category.note_ids.push(note_id);
                    }
                }
                {
                    // Keep the forward reference in step with the reverse set.
                    let mut notes = self.notes.borrow_mut();
                    let note = notes.iter_mut().find(|note| note.id == note_id).ok_or(
                        StoreError::NotFound {
                            kind: EntityKind::Note,
                            id: note_id,
                        },
                    )?;
                    note.category_id = link.id;
                }
                self.notify(EntityKind::Category, vec![link.id]);
                self.notify(EntityKind::Note, vec![note_id]);
                Ok(())
            }
            (kind, field) => Err(StoreError::UnsupportedLink { kind, field }),
        }
    }

    fn remove_note_link(&self, note_id: EntityId, link: &LinkRequest) -> StoreResult<()> {
        match (link.kind, link.field) {
            (EntityKind::Category, LinkField::Notes) => {
                {
                    let mut categories = self.categories.borrow_mut();
                    let category = categories
                        .iter_mut()
                        .find(|category| category.id == link.id)
                        .ok_or(StoreError::NotFound {
                            kind: EntityKind::Category,
                            id: link.id,
                        })?;
                    category.note_ids.retain(|id| *id != note_id);
                }
                self.notify(EntityKind::Category, vec![link.id]);
                Ok(())
            }
            (kind, field) => Err(StoreError::UnsupportedLink { kind, field }),
        }
    }

    fn attachment(&self, id: EntityId) -> Option<Attachment> {
        self.attachments
            .borrow()
            .iter()
            .find(|attachment| attachment.id == id)
            .cloned()
    }

    fn create_attachment(
        &self,
        draft: AttachmentDraft,
        links: &[LinkRequest],
    ) -> StoreResult<EntityId> {
        let mut note_id = None;
        for link in links {
            match (link.kind, link.field) {
                (EntityKind::Note, LinkField::Attachments) => {
                    note_id = Some(link.id);
                }
                (kind, field) => return Err(StoreError::UnsupportedLink { kind, field }),
            }
        }
        let note_id = note_id.ok_or(StoreError::Backend(
            "attachment create requires a note link".to_string(),
        ))?;

        let id = Uuid::new_v4();
        {
            let mut notes = self.notes.borrow_mut();
            let note =
                notes
                    .iter_mut()
                    .find(|note| note.id == note_id)
                    .ok_or(StoreError::LinkTargetMissing {
                        kind: EntityKind::Note,
                        id: note_id,
                    })?;
            note.attachment_ids.push(id);
        }
        self.attachments.borrow_mut().push(Attachment {
            id,
            filename: draft.filename,
            ext: draft.ext,
            size: draft.size,
            local_path: draft.local_path,
            remote_path: draft.remote_path,
            note_id,
            created_at: draft.created_at,
            updated_at: draft.updated_at,
        });
        self.notify(EntityKind::Note, vec![note_id]);
        Ok(id)
    }

    fn versions_for(&self, note_id: EntityId) -> Vec<NoteVersion> {
        self.versions
            .borrow()
            .iter()
            .filter(|version| version.note_id == note_id)
            .cloned()
            .collect()
    }

    fn version_content(&self, version_id: EntityId, note_id: EntityId) -> Option<String> {
        self.version_contents
            .borrow()
            .iter()
            .find(|content| content.version_id == version_id && content.note_id == note_id)
            .map(|content| content.content.clone())
    }
}
