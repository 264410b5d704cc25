use inkstone_core::{
    AttachmentIo, AttachmentIoError, AttachmentSource, CategoryDraft, Controller, DomainEvent,
    EntityId, EntityKind, LinkField, LinkRequest, MemoryConfig, MemoryStore, NewNote, NoteDraft,
    NotebookDraft, NoteUpdate, Store, StoredFile, PERSIST_WINDOW,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

struct NoopAttachments;

impl AttachmentIo for NoopAttachments {
    fn store(&self, _source: &AttachmentSource) -> Result<StoredFile, AttachmentIoError> {
        Err(AttachmentIoError::new("unused in these tests"))
    }
}

struct FixedAttachments {
    stored: StoredFile,
}

impl AttachmentIo for FixedAttachments {
    fn store(&self, _source: &AttachmentSource) -> Result<StoredFile, AttachmentIoError> {
        Ok(self.stored.clone())
    }
}

fn seed_notebook(store: &MemoryStore, title: &str) -> EntityId {
    store.create_notebook(NotebookDraft {
        title: title.to_string(),
        created_at: 0,
        updated_at: 0,
    })
}

fn seed_category(store: &MemoryStore, notebook: EntityId, title: &str, order: f64) -> EntityId {
    store
        .create_category(
            CategoryDraft {
                title: title.to_string(),
                order,
                created_at: 0,
                updated_at: 0,
            },
            &[LinkRequest {
                kind: EntityKind::Notebook,
                field: LinkField::Categories,
                id: notebook,
            }],
        )
        .unwrap()
}

fn seed_note(
    store: &MemoryStore,
    notebook: EntityId,
    category: EntityId,
    title: &str,
    content: &str,
    order: f64,
) -> EntityId {
    store
        .create_note(
            NoteDraft {
                title: title.to_string(),
                content: content.to_string(),
                order,
                local_version: 1,
                remote_version: 0,
                created_at: 0,
                updated_at: 0,
            },
            &[
                LinkRequest {
                    kind: EntityKind::Category,
                    field: LinkField::Notes,
                    id: category,
                },
                LinkRequest {
                    kind: EntityKind::Notebook,
                    field: LinkField::Notes,
                    id: notebook,
                },
            ],
        )
        .unwrap()
}

fn controller(store: &Rc<MemoryStore>) -> Controller<MemoryStore, MemoryConfig, NoopAttachments> {
    Controller::new(Rc::clone(store), MemoryConfig::new(), NoopAttachments)
}

fn capture_events<S, C, A>(controller: &Controller<S, C, A>) -> Rc<RefCell<Vec<DomainEvent>>>
where
    S: Store,
    C: inkstone_core::ConfigStore,
    A: AttachmentIo,
{
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    controller
        .events()
        .subscribe(move |event| sink.borrow_mut().push(event.clone()));
    seen
}

fn content_update(content: &str) -> NoteUpdate {
    NoteUpdate {
        id: None,
        title: None,
        content: Some(content.to_string()),
    }
}

#[test]
fn live_edits_coalesce_into_one_write_with_the_last_content() {
    let store = Rc::new(MemoryStore::new());
    let notebook = seed_notebook(&store, "Work");
    let category = seed_category(&store, notebook, "Inbox", 1000.0);
    let note = seed_note(&store, notebook, category, "note", "# note\n", 1000.0);

    let mut controller = controller(&store);
    controller.switch_current_notebook(notebook, None).unwrap();
    let events = capture_events(&controller);

    let t0 = Instant::now();
    controller.request_note_update(content_update("# note\ndraft one"), false, t0);
    controller.request_note_update(
        content_update("# note\ndraft two"),
        false,
        t0 + Duration::from_millis(300),
    );

    // Nothing is persisted while the window is still open.
    controller.tick(t0 + Duration::from_millis(499)).unwrap();
    assert_eq!(store.note(note).unwrap().content, "# note\n");
    assert!(events.borrow().is_empty());

    controller.tick(t0 + PERSIST_WINDOW).unwrap();
    assert_eq!(store.note(note).unwrap().content, "# note\ndraft two");
    assert_eq!(
        events.borrow().as_slice(),
        &[DomainEvent::NoteContentChanged { id: note }]
    );
}

#[test]
fn flushing_unchanged_content_writes_nothing() {
    let store = Rc::new(MemoryStore::new());
    let notebook = seed_notebook(&store, "Work");
    let category = seed_category(&store, notebook, "Inbox", 1000.0);
    let note = seed_note(&store, notebook, category, "note", "# note\nbody", 1000.0);

    let mut controller = controller(&store);
    controller.switch_current_notebook(notebook, None).unwrap();
    let events = capture_events(&controller);
    let before = store.note(note).unwrap().updated_at;

    let t0 = Instant::now();
    controller.request_note_update(content_update("# note\nbody"), false, t0);
    controller.tick(t0 + PERSIST_WINDOW).unwrap();

    assert!(events.borrow().is_empty());
    assert_eq!(store.note(note).unwrap().updated_at, before);
}

#[test]
fn heading_with_category_marker_titles_and_reclassifies_the_note() {
    let store = Rc::new(MemoryStore::new());
    let notebook = seed_notebook(&store, "Work");
    let inbox = seed_category(&store, notebook, "Inbox", 1000.0);
    let note = seed_note(&store, notebook, inbox, "note", "# note\n", 1000.0);
    seed_note(&store, notebook, inbox, "keeps inbox alive", "# x\n", 2000.0);

    let mut controller = controller(&store);
    controller.switch_current_notebook(notebook, None).unwrap();
    let events = capture_events(&controller);

    let t0 = Instant::now();
    controller.request_note_update(
        content_update("# Groceries\\Buy milk\n\n- milk"),
        false,
        t0,
    );
    controller.tick(t0 + PERSIST_WINDOW).unwrap();

    let groceries = store
        .category_by_title(notebook, "Groceries")
        .expect("category created from the heading marker");
    let note = store.note(note).unwrap();
    assert_eq!(note.title, "Buy milk");
    assert_eq!(note.category_id, groceries.id);
    assert!(events
        .borrow()
        .contains(&DomainEvent::CategoryCreated { id: groceries.id }));
    assert!(events
        .borrow()
        .contains(&DomainEvent::NoteContentChanged { id: note.id }));
}

#[test]
fn reclassifying_the_only_note_drops_the_old_category() {
    let store = Rc::new(MemoryStore::new());
    let notebook = seed_notebook(&store, "Work");
    let inbox = seed_category(&store, notebook, "Inbox", 1000.0);
    let note = seed_note(&store, notebook, inbox, "note", "# note\n", 1000.0);

    let mut controller = controller(&store);
    controller.switch_current_notebook(notebook, None).unwrap();

    let t0 = Instant::now();
    controller.request_note_update(content_update("# Done\\note\n"), false, t0);
    controller.tick(t0 + PERSIST_WINDOW).unwrap();

    assert!(store.category(inbox).is_none());
    let done = store.category_by_title(notebook, "Done").unwrap();
    assert_eq!(store.note(note).unwrap().category_id, done.id);
}

#[test]
fn heading_edits_in_progress_skip_classification() {
    let store = Rc::new(MemoryStore::new());
    let notebook = seed_notebook(&store, "Work");
    let inbox = seed_category(&store, notebook, "Inbox", 1000.0);
    let note = seed_note(&store, notebook, inbox, "note", "# note\n", 1000.0);

    let mut controller = controller(&store);
    controller.switch_current_notebook(notebook, None).unwrap();

    let t0 = Instant::now();
    controller.request_note_update(
        NoteUpdate {
            id: None,
            title: Some("Custom".to_string()),
            content: Some("# Groceries\\half-typed".to_string()),
        },
        true,
        t0,
    );
    controller.tick(t0 + PERSIST_WINDOW).unwrap();

    // The marker in the half-typed heading is ignored; the caller's title
    // wins and no category appears.
    assert!(store.category_by_title(notebook, "Groceries").is_none());
    let note = store.note(note).unwrap();
    assert_eq!(note.title, "Custom");
    assert_eq!(note.category_id, inbox);
}

#[test]
fn deleting_the_current_note_selects_the_first_remaining_one() {
    let store = Rc::new(MemoryStore::new());
    let notebook = seed_notebook(&store, "Work");
    let category = seed_category(&store, notebook, "Inbox", 1000.0);
    let first = seed_note(&store, notebook, category, "first", "# first\n", 1000.0);
    let second = seed_note(&store, notebook, category, "second", "# second\n", 2000.0);

    let mut controller = controller(&store);
    controller.switch_current_notebook(notebook, Some(first)).unwrap();
    let events = capture_events(&controller);

    controller.delete_note(first, Instant::now()).unwrap();

    assert!(store.note(first).is_none());
    assert_eq!(controller.current_note_id(), Some(second));
    assert!(events
        .borrow()
        .contains(&DomainEvent::NoteDeleted { id: first }));
}

#[test]
fn deleting_the_last_note_of_a_category_removes_the_category() {
    let store = Rc::new(MemoryStore::new());
    let notebook = seed_notebook(&store, "Work");
    let inbox = seed_category(&store, notebook, "Inbox", 1000.0);
    let later = seed_category(&store, notebook, "Later", 2000.0);
    let only = seed_note(&store, notebook, inbox, "only", "# only\n", 1000.0);
    let other = seed_note(&store, notebook, later, "other", "# other\n", 1000.0);

    let mut controller = controller(&store);
    controller.switch_current_notebook(notebook, Some(only)).unwrap();
    let events = capture_events(&controller);

    controller.delete_note(only, Instant::now()).unwrap();

    assert!(store.category(inbox).is_none());
    assert_eq!(controller.current_note_id(), Some(other));
    assert!(events
        .borrow()
        .contains(&DomainEvent::CategoryDeleted { id: inbox }));
}

#[test]
fn deleting_another_note_keeps_the_current_selection() {
    let store = Rc::new(MemoryStore::new());
    let notebook = seed_notebook(&store, "Work");
    let category = seed_category(&store, notebook, "Inbox", 1000.0);
    let first = seed_note(&store, notebook, category, "first", "# first\n", 1000.0);
    let second = seed_note(&store, notebook, category, "second", "# second\n", 2000.0);

    let mut controller = controller(&store);
    controller.switch_current_notebook(notebook, Some(first)).unwrap();

    controller.delete_note(second, Instant::now()).unwrap();

    assert_eq!(controller.current_note_id(), Some(first));
    assert_eq!(
        controller.snapshot().current_note.as_ref().map(|n| n.id),
        Some(first)
    );
}

#[test]
fn new_note_lands_after_the_current_one_and_becomes_current() {
    let store = Rc::new(MemoryStore::new());
    let notebook = seed_notebook(&store, "Work");
    let category = seed_category(&store, notebook, "Inbox", 1000.0);
    let current = seed_note(&store, notebook, category, "current", "# current\n", 1000.0);
    seed_note(&store, notebook, category, "next", "# next\n", 2000.0);

    let mut controller = controller(&store);
    controller.switch_current_notebook(notebook, Some(current)).unwrap();
    let events = capture_events(&controller);

    let id = controller
        .new_note(NewNote::default(), Instant::now())
        .unwrap();

    let created = store.note(id).unwrap();
    assert_eq!(created.title, "New note");
    assert_eq!(created.content, "# New note\n\n");
    assert_eq!(created.category_id, category);
    assert!(created.order > store.note(current).unwrap().order);
    assert_eq!(controller.current_note_id(), Some(id));
    assert!(events
        .borrow()
        .contains(&DomainEvent::NoteCreated { id }));
}

#[test]
fn new_note_without_a_current_note_is_rejected() {
    let store = Rc::new(MemoryStore::new());
    seed_notebook(&store, "Empty");

    let mut controller = controller(&store);
    let err = controller
        .new_note(NewNote::default(), Instant::now())
        .unwrap_err();
    assert_eq!(err.to_string(), "no note is currently selected");
}

#[test]
fn attachments_are_recorded_against_the_current_note() {
    let store = Rc::new(MemoryStore::new());
    let notebook = seed_notebook(&store, "Work");
    let category = seed_category(&store, notebook, "Inbox", 1000.0);
    let note = seed_note(&store, notebook, category, "note", "# note\n", 1000.0);

    let mut controller = Controller::new(
        Rc::clone(&store),
        MemoryConfig::new(),
        FixedAttachments {
            stored: StoredFile {
                local_path: "/tmp/att/paste.png".to_string(),
                filename: "paste.png".to_string(),
                ext: "png".to_string(),
                size: 2048,
            },
        },
    );
    controller.switch_current_notebook(notebook, Some(note)).unwrap();

    let info = controller
        .create_attachment(&AttachmentSource::Clipboard, Instant::now())
        .unwrap();

    assert_eq!(info.filename, "paste.png");
    assert_eq!(info.ext, "png");
    let attachment = store.attachment(info.id).unwrap();
    assert_eq!(attachment.size, 2048);
    assert_eq!(attachment.local_path, "/tmp/att/paste.png");
    assert!(store
        .note(note)
        .unwrap()
        .attachment_ids
        .contains(&info.id));
}
