use inkstone_core::{
    AttachmentIo, AttachmentIoError, AttachmentSource, CategoryDraft, Controller, EntityId,
    EntityKind, LayoutComponent, LinkField, LinkRequest, MemoryConfig, MemoryStore, NoteDraft,
    NotebookDraft, NoteVersion, Store, StoredFile, REBUILD_WINDOW,
};
use std::rc::Rc;
use std::time::{Duration, Instant};
use uuid::Uuid;

struct NoopAttachments;

impl AttachmentIo for NoopAttachments {
    fn store(&self, _source: &AttachmentSource) -> Result<StoredFile, AttachmentIoError> {
        Err(AttachmentIoError::new("unused in these tests"))
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

#[test]
fn switching_a_notebook_selects_its_first_note_synchronously() {
    let store = Rc::new(MemoryStore::new());
    let notebook = seed_notebook(&store, "Work");
    let category = seed_category(&store, notebook, "Inbox", 1000.0);
    let first = seed_note(&store, notebook, category, "first", "# first\n", 1000.0);
    seed_note(&store, notebook, category, "second", "# second\n", 2000.0);

    let mut controller = controller(&store);
    controller.switch_current_notebook(notebook, None).unwrap();

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.current_notebook.as_ref().map(|n| n.id), Some(notebook));
    assert_eq!(controller.current_note_id(), Some(first));
    assert_eq!(snapshot.current_note_content, "# first\n");
}

#[test]
fn switching_to_an_empty_notebook_clears_the_note_selection() {
    let store = Rc::new(MemoryStore::new());
    let full = seed_notebook(&store, "Full");
    let category = seed_category(&store, full, "Inbox", 1000.0);
    seed_note(&store, full, category, "note", "# note\n", 1000.0);
    let empty = seed_notebook(&store, "Empty");

    let mut controller = controller(&store);
    controller.switch_current_notebook(full, None).unwrap();
    assert!(controller.current_note_id().is_some());

    controller.switch_current_notebook(empty, None).unwrap();
    assert_eq!(controller.current_note_id(), None);
    assert!(controller.snapshot().current_note.is_none());
    assert!(controller.snapshot().current_note_content.is_empty());
}

#[test]
fn store_writes_become_visible_only_after_the_rebuild_window() {
    let store = Rc::new(MemoryStore::new());
    let notebook = seed_notebook(&store, "Work");
    let category = seed_category(&store, notebook, "Inbox", 1000.0);
    seed_note(&store, notebook, category, "note", "# note\n", 1000.0);

    let mut controller = controller(&store);
    controller.switch_current_notebook(notebook, None).unwrap();

    let t0 = Instant::now();
    controller
        .rename_category(category, "Renamed", t0)
        .unwrap();

    // Stale inside the window; the rename only lands on the next due tick.
    let titled = |controller: &Controller<MemoryStore, MemoryConfig, NoopAttachments>| {
        controller
            .snapshot()
            .current_notebook
            .as_ref()
            .and_then(|notebook| notebook.categories.first())
            .map(|category| category.title.clone())
    };
    assert_eq!(titled(&controller), Some("Inbox".to_string()));

    controller.tick(t0 + Duration::from_millis(15)).unwrap();
    assert_eq!(titled(&controller), Some("Inbox".to_string()));

    controller.tick(t0 + REBUILD_WINDOW).unwrap();
    assert_eq!(titled(&controller), Some("Renamed".to_string()));
}

#[test]
fn repeated_changes_inside_one_window_keep_the_original_deadline() {
    let store = Rc::new(MemoryStore::new());
    let notebook = seed_notebook(&store, "Work");
    let category = seed_category(&store, notebook, "Inbox", 1000.0);
    seed_note(&store, notebook, category, "note", "# note\n", 1000.0);

    let mut controller = controller(&store);
    controller.switch_current_notebook(notebook, None).unwrap();

    let t0 = Instant::now();
    controller.rename_category(category, "One", t0).unwrap();
    controller
        .rename_category(category, "Two", t0 + Duration::from_millis(10))
        .unwrap();

    assert_eq!(controller.next_deadline(), Some(t0 + REBUILD_WINDOW));
}

#[test]
fn rebuilding_without_intervening_changes_is_idempotent() {
    let store = Rc::new(MemoryStore::new());
    let notebook = seed_notebook(&store, "Work");
    let category = seed_category(&store, notebook, "Inbox", 1000.0);
    seed_note(&store, notebook, category, "note", "# note\nbody", 1000.0);

    let mut controller = controller(&store);
    controller.switch_current_notebook(notebook, None).unwrap();

    controller.search("body");
    let first = controller.snapshot().clone();
    controller.search("body");
    assert_eq!(controller.snapshot(), &first);
}

#[test]
fn search_matches_title_and_content_across_notebooks() {
    let store = Rc::new(MemoryStore::new());
    let work = seed_notebook(&store, "Work");
    let home = seed_notebook(&store, "Home");
    let work_cat = seed_category(&store, work, "Inbox", 1000.0);
    let home_cat = seed_category(&store, home, "Inbox", 1000.0);
    let by_title = seed_note(&store, work, work_cat, "groceries", "# groceries\n", 1000.0);
    let by_content = seed_note(
        &store,
        home,
        home_cat,
        "list",
        "# list\nbuy groceries today",
        1000.0,
    );
    seed_note(&store, home, home_cat, "other", "# other\nnothing here", 2000.0);

    let mut controller = controller(&store);
    controller.switch_current_notebook(work, None).unwrap();
    controller.search("groceries");

    let hits: Vec<EntityId> = controller
        .snapshot()
        .search_results
        .iter()
        .map(|note| note.id)
        .collect();
    assert!(hits.contains(&by_title));
    assert!(hits.contains(&by_content));
    assert_eq!(hits.len(), 2);

    // Substring match is case-sensitive.
    controller.search("Groceries");
    assert!(controller.snapshot().search_results.is_empty());

    controller.search("");
    assert!(controller.snapshot().search_results.is_empty());
}

#[test]
fn layout_toggles_flip_and_set_individual_panels() {
    let store = Rc::new(MemoryStore::new());
    let mut controller = controller(&store);

    assert!(controller.snapshot().layout.sidebar);
    controller.toggle_layout(LayoutComponent::Sidebar, None);
    assert!(!controller.snapshot().layout.sidebar);
    controller.toggle_layout(LayoutComponent::Preview, Some(false));
    assert!(!controller.snapshot().layout.preview);
    // The other panels are untouched.
    assert!(controller.snapshot().layout.editor);
}

#[test]
fn version_list_shows_newest_first_without_duplicates() {
    let store = Rc::new(MemoryStore::new());
    let notebook = seed_notebook(&store, "Work");
    let category = seed_category(&store, notebook, "Inbox", 1000.0);
    let note = seed_note(&store, notebook, category, "note", "# note\n", 1000.0);

    let old_id = Uuid::new_v4();
    let new_id = Uuid::new_v4();
    store.record_version(
        NoteVersion {
            id: old_id,
            note_id: note,
            message: "first save".to_string(),
            created_at: 100,
        },
        Some("old content".to_string()),
    );
    store.record_version(
        NoteVersion {
            id: new_id,
            note_id: note,
            message: "second save".to_string(),
            created_at: 200,
        },
        None,
    );
    // A repeated id must not produce a second row.
    store.record_version(
        NoteVersion {
            id: old_id,
            note_id: note,
            message: "first save".to_string(),
            created_at: 100,
        },
        None,
    );

    let mut controller = controller(&store);
    controller.switch_current_notebook(notebook, None).unwrap();
    controller.show_versions(note);

    let list = &controller.snapshot().versions.list;
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].id, new_id);
    assert_eq!(list[1].id, old_id);

    controller.show_version_content(old_id, note);
    assert_eq!(controller.snapshot().versions.current_content, "old content");

    controller.show_version_content(new_id, note);
    assert_eq!(
        controller.snapshot().versions.current_content,
        "This version has no content change"
    );

    controller.hide_versions();
    assert!(controller.snapshot().versions.list.is_empty());
    assert!(controller.snapshot().versions.current_content.is_empty());
}

#[test]
fn last_session_state_is_recovered_from_config() {
    let store = Rc::new(MemoryStore::new());
    let notebook = seed_notebook(&store, "Work");
    let category = seed_category(&store, notebook, "Inbox", 1000.0);
    seed_note(&store, notebook, category, "first", "# first\n", 1000.0);
    let second = seed_note(&store, notebook, category, "second", "# second\n", 2000.0);

    let mut controller = controller(&store);
    controller.switch_current_notebook(notebook, None).unwrap();
    controller.switch_current_note(second).unwrap();

    controller.exit_notebook();
    assert_eq!(controller.current_notebook_id(), None);

    assert!(controller.recover_last_state());
    assert_eq!(controller.current_notebook_id(), Some(notebook));
    assert_eq!(controller.current_note_id(), Some(second));
}

#[test]
fn recovery_is_skipped_when_no_notebooks_exist() {
    let store = Rc::new(MemoryStore::new());
    let mut controller = controller(&store);
    assert!(!controller.recover_last_state());
}
