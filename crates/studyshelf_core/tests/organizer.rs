use chrono::{TimeZone, Utc};
use rusqlite::Connection;
use std::cell::Cell;
use studyshelf_core::backup::codec::to_json;
use studyshelf_core::db::open_db_in_memory;
use studyshelf_core::{
    FileMetadataStore, ImportError, ImportOutcome, Item, ItemContent, ItemId, ItemKind,
    ItemStore, MemoryMetadataStore, MetadataStore, Organizer, OrganizerError, RepoError,
    RepoResult, SelectionState, SqliteItemStore, SubjectDraft, SubjectId, Upload,
};

fn upload(name: &str, mime_type: &str) -> Upload {
    Upload {
        name: name.to_string(),
        mime_type: mime_type.to_string(),
        payload: vec![1, 2, 3, 4],
    }
}

fn note(text: &str) -> ItemContent {
    ItemContent::Note {
        text: text.to_string(),
    }
}

/// Item store whose deletes can be made to fail on demand.
struct FlakyItemStore<'conn> {
    inner: SqliteItemStore<'conn>,
    fail_cascade: Cell<bool>,
    fail_batch: Cell<bool>,
}

impl<'conn> FlakyItemStore<'conn> {
    fn new(conn: &'conn mut Connection) -> Self {
        Self {
            inner: SqliteItemStore::try_new(conn).unwrap(),
            fail_cascade: Cell::new(false),
            fail_batch: Cell::new(false),
        }
    }
}

impl ItemStore for FlakyItemStore<'_> {
    fn add(&self, item: &Item) -> RepoResult<()> {
        self.inner.add(item)
    }

    fn query_by_subject_and_kind(
        &self,
        subject_id: &str,
        kind: ItemKind,
    ) -> RepoResult<Vec<Item>> {
        self.inner.query_by_subject_and_kind(subject_id, kind)
    }

    fn query_by_subject(&self, subject_id: &str) -> RepoResult<Vec<Item>> {
        self.inner.query_by_subject(subject_id)
    }

    fn delete_many(&mut self, ids: &[ItemId]) -> RepoResult<usize> {
        if self.fail_batch.get() {
            return Err(RepoError::InvalidData("medium closed".to_string()));
        }
        self.inner.delete_many(ids)
    }

    fn delete_by_subject(&mut self, subject_id: &str) -> RepoResult<usize> {
        if self.fail_cascade.get() {
            return Err(RepoError::InvalidData("medium closed".to_string()));
        }
        self.inner.delete_by_subject(subject_id)
    }

    fn subject_ids(&self) -> RepoResult<Vec<SubjectId>> {
        self.inner.subject_ids()
    }
}

fn organizer(conn: &mut Connection) -> Organizer<MemoryMetadataStore, SqliteItemStore<'_>> {
    Organizer::open(
        MemoryMetadataStore::new(),
        SqliteItemStore::try_new(conn).unwrap(),
    )
    .unwrap()
}

#[test]
fn notes_scenario_lists_newest_first() {
    let mut conn = open_db_in_memory().unwrap();
    let mut organizer = organizer(&mut conn);
    let subject = organizer
        .create_subject(&SubjectDraft::named("Subject A"))
        .unwrap();

    organizer.add_item(&subject.id, note("hello"), 100).unwrap();
    organizer.add_item(&subject.id, note("world"), 200).unwrap();

    let listed = organizer.list_items(&subject.id, ItemKind::Notes).unwrap();
    let texts = listed.iter().map(Item::label).collect::<Vec<_>>();
    assert_eq!(texts, vec!["world", "hello"]);
}

#[test]
fn adding_to_unknown_subject_is_rejected() {
    let mut conn = open_db_in_memory().unwrap();
    let organizer = organizer(&mut conn);

    let err = organizer.add_note("ghost", "orphan").unwrap_err();
    assert!(matches!(err, OrganizerError::SubjectNotFound(id) if id == "ghost"));
}

#[test]
fn add_dialog_rules_are_applied() {
    let mut conn = open_db_in_memory().unwrap();
    let mut organizer = organizer(&mut conn);
    let subject = organizer
        .create_subject(&SubjectDraft::named("Physics"))
        .unwrap();

    let blank = organizer.add_note(&subject.id, "   ").unwrap_err();
    assert!(matches!(blank, OrganizerError::InvalidItem(_)));

    let file = organizer
        .add_file(&subject.id, None, upload("notes.pdf", "application/pdf"))
        .unwrap();
    assert_eq!(file.label(), "notes.pdf");
    organizer
        .add_image(&subject.id, upload("board.jpg", "image/jpeg"))
        .unwrap();
    organizer
        .add_audio(&subject.id, upload("recap.m4a", "audio/mp4"))
        .unwrap();

    for kind in [ItemKind::Files, ItemKind::Images, ItemKind::Audio] {
        assert_eq!(organizer.list_items(&subject.id, kind).unwrap().len(), 1);
    }
}

#[test]
fn delete_subject_cascades_to_every_kind() {
    let mut conn = open_db_in_memory().unwrap();
    let mut organizer = organizer(&mut conn);
    let doomed = organizer
        .create_subject(&SubjectDraft::named("Subject A"))
        .unwrap();
    let kept = organizer
        .create_subject(&SubjectDraft::named("Subject B"))
        .unwrap();

    organizer.add_note(&doomed.id, "note").unwrap();
    organizer
        .add_file(&doomed.id, Some("Slides"), upload("s.pdf", "application/pdf"))
        .unwrap();
    organizer
        .add_image(&doomed.id, upload("a.png", "image/png"))
        .unwrap();
    organizer
        .add_audio(&doomed.id, upload("a.mp3", "audio/mpeg"))
        .unwrap();
    organizer.add_note(&kept.id, "survivor").unwrap();
    organizer.select_subject(&doomed.id).unwrap();

    assert_eq!(organizer.delete_subject(&doomed.id).unwrap(), 4);

    assert!(organizer.subject(&doomed.id).is_none());
    assert_eq!(organizer.selected_subject_id(), None);
    assert!(organizer
        .item_store()
        .query_by_subject(&doomed.id)
        .unwrap()
        .is_empty());
    assert_eq!(
        organizer.item_store().query_by_subject(&kept.id).unwrap().len(),
        1
    );
    let persisted = organizer.metadata_store().load().unwrap();
    assert!(persisted.subjects.iter().all(|s| s.id != doomed.id));
}

#[test]
fn failed_cascade_is_reported_and_swept_later() {
    let mut conn = open_db_in_memory().unwrap();
    let store = FlakyItemStore::new(&mut conn);
    store.fail_cascade.set(true);
    let mut organizer = Organizer::open(MemoryMetadataStore::new(), store).unwrap();
    let subject = organizer
        .create_subject(&SubjectDraft::named("Subject A"))
        .unwrap();
    organizer.add_note(&subject.id, "left behind").unwrap();

    let err = organizer.delete_subject(&subject.id).unwrap_err();
    assert!(matches!(
        err,
        OrganizerError::PartialCascadeFailure { ref subject_id, .. } if subject_id == &subject.id
    ));
    assert!(organizer.subjects().is_empty());
    assert_eq!(
        organizer
            .item_store()
            .query_by_subject(&subject.id)
            .unwrap()
            .len(),
        1
    );

    organizer.item_store().fail_cascade.set(false);
    assert_eq!(organizer.sweep_orphans().unwrap(), 1);
    assert!(organizer
        .item_store()
        .query_by_subject(&subject.id)
        .unwrap()
        .is_empty());
}

#[test]
fn selection_batch_delete_removes_selected_items_only() {
    let mut conn = open_db_in_memory().unwrap();
    let mut organizer = organizer(&mut conn);
    let subject = organizer
        .create_subject(&SubjectDraft::named("History"))
        .unwrap();
    let first = organizer.add_item(&subject.id, note("a"), 1).unwrap();
    let second = organizer.add_item(&subject.id, note("b"), 2).unwrap();
    let third = organizer.add_item(&subject.id, note("c"), 3).unwrap();

    let selection = organizer.selection_mut();
    selection.begin(first.id.clone());
    selection.toggle(&second.id);
    selection.toggle(&third.id);
    selection.toggle(&third.id);
    let pending = organizer.selection().request_delete().unwrap();
    assert_eq!(pending.count(), 2);

    assert_eq!(organizer.delete_selected(pending).unwrap(), 2);
    assert_eq!(organizer.selection().state(), SelectionState::Idle);
    assert_eq!(organizer.selection().count(), 0);

    let remaining = organizer.list_items(&subject.id, ItemKind::Notes).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, third.id);
    assert_eq!(organizer.subjects().len(), 1);
}

#[test]
fn edit_subject_keeps_id_and_persists() {
    let mut conn = open_db_in_memory().unwrap();
    let mut organizer = organizer(&mut conn);
    let created = organizer
        .create_subject(&SubjectDraft::named("Draft"))
        .unwrap();

    let draft = SubjectDraft {
        name: " Literature ".to_string(),
        icon: "📚".to_string(),
        mood: "😎".to_string(),
        color: "ef5350".to_string(),
    };
    let edited = organizer.edit_subject(&created.id, &draft).unwrap();
    assert_eq!(edited.id, created.id);
    assert_eq!(edited.name, "Literature");
    assert_eq!(edited.color, "#ef5350");
    assert_eq!(organizer.metadata_store().load().unwrap().subjects, vec![edited]);

    let invalid = SubjectDraft::named("");
    let err = organizer.edit_subject(&created.id, &invalid).unwrap_err();
    assert!(matches!(err, OrganizerError::InvalidSubject(_)));
    assert_eq!(organizer.subjects()[0].name, "Literature");
}

#[test]
fn search_matches_name_or_mood() {
    let mut conn = open_db_in_memory().unwrap();
    let mut organizer = organizer(&mut conn);
    organizer
        .create_subject(&SubjectDraft::named("Organic Chemistry"))
        .unwrap();
    let mut sleepy = SubjectDraft::named("Geography");
    sleepy.mood = "😴".to_string();
    organizer.create_subject(&sleepy).unwrap();

    let by_name = organizer.search_subjects("chem");
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].name, "Organic Chemistry");

    let by_mood = organizer.search_subjects("😴");
    assert_eq!(by_mood.len(), 1);
    assert_eq!(by_mood[0].name, "Geography");

    assert_eq!(organizer.search_subjects("").len(), 2);
}

#[test]
fn import_replaces_subjects_without_touching_items() {
    let mut conn = open_db_in_memory().unwrap();
    let mut organizer = organizer(&mut conn);
    let old = organizer
        .create_subject(&SubjectDraft::named("Old"))
        .unwrap();
    organizer.add_note(&old.id, "kept in item store").unwrap();
    let backup = to_json(&organizer.export_backup(Utc.timestamp_millis_opt(0).unwrap())).unwrap();

    let fresh = organizer
        .create_subject(&SubjectDraft::named("Fresh"))
        .unwrap();
    organizer.select_subject(&fresh.id).unwrap();

    let mut prompted = None;
    let outcome = organizer
        .import_backup(&backup, |count| {
            prompted = Some(count);
            true
        })
        .unwrap();
    assert_eq!(outcome, ImportOutcome::Installed(1));
    assert_eq!(prompted, Some(1));
    assert_eq!(organizer.subjects(), &[old.clone()]);
    assert_eq!(organizer.selected_subject_id(), None);
    assert_eq!(
        organizer.list_items(&old.id, ItemKind::Notes).unwrap().len(),
        1
    );
}

#[test]
fn invalid_or_declined_import_leaves_subjects_alone() {
    let mut conn = open_db_in_memory().unwrap();
    let mut organizer = organizer(&mut conn);
    organizer
        .create_subject(&SubjectDraft::named("Keep me"))
        .unwrap();
    let before = organizer.subjects().to_vec();

    let err = organizer
        .import_backup(r#"{"subjects":"not-an-array"}"#, |_| true)
        .unwrap_err();
    assert!(matches!(
        err,
        OrganizerError::Import(ImportError::InvalidFormat(_))
    ));
    assert_eq!(organizer.subjects(), before.as_slice());

    let outcome = organizer
        .import_backup(r#"{"subjects":[]}"#, |_| false)
        .unwrap();
    assert_eq!(outcome, ImportOutcome::Declined);
    assert_eq!(organizer.subjects(), before.as_slice());
}

#[test]
fn state_survives_reopen_from_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let mut conn = open_db_in_memory().unwrap();

    let subject_id = {
        let mut organizer = Organizer::open(
            FileMetadataStore::new(&state_path),
            SqliteItemStore::try_new(&mut conn).unwrap(),
        )
        .unwrap();
        let subject = organizer
            .create_subject(&SubjectDraft::named("Music"))
            .unwrap();
        organizer.select_subject(&subject.id).unwrap();
        subject.id
    };

    let reopened = Organizer::open(
        FileMetadataStore::new(&state_path),
        SqliteItemStore::try_new(&mut conn).unwrap(),
    )
    .unwrap();
    assert_eq!(reopened.selected_subject_id(), Some(subject_id.as_str()));
    assert_eq!(
        reopened.selected_subject().map(|s| s.name.as_str()),
        Some("Music")
    );
}

#[test]
fn metadata_save_failure_keeps_previous_state() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    let mut conn = open_db_in_memory().unwrap();
    let mut organizer = Organizer::open(
        FileMetadataStore::new(blocker.join("state.json")),
        SqliteItemStore::try_new(&mut conn).unwrap(),
    )
    .unwrap();
    std::fs::write(&blocker, "file, not a directory").unwrap();

    let err = organizer
        .create_subject(&SubjectDraft::named("Unsaved"))
        .unwrap_err();
    assert!(err.is_storage_unavailable());
    assert!(organizer.subjects().is_empty());
}

#[test]
fn cancelled_selection_cannot_delete_later() {
    let mut conn = open_db_in_memory().unwrap();
    let mut organizer = organizer(&mut conn);
    let subject = organizer
        .create_subject(&SubjectDraft::named("History"))
        .unwrap();
    let item = organizer.add_note(&subject.id, "keep me").unwrap();

    organizer.selection_mut().begin(item.id.clone());
    let pending = organizer.selection().request_delete().unwrap();
    organizer.selection_mut().cancel();

    assert_eq!(organizer.delete_selected(pending).unwrap(), 0);
    assert_eq!(organizer.selection().state(), SelectionState::Idle);
    assert_eq!(
        organizer.list_items(&subject.id, ItemKind::Notes).unwrap().len(),
        1
    );
}

#[test]
fn opening_another_subject_drops_pending_delete() {
    let mut conn = open_db_in_memory().unwrap();
    let mut organizer = organizer(&mut conn);
    let first = organizer
        .create_subject(&SubjectDraft::named("First"))
        .unwrap();
    let second = organizer
        .create_subject(&SubjectDraft::named("Second"))
        .unwrap();
    let item = organizer.add_note(&first.id, "keep me").unwrap();

    organizer.select_subject(&first.id).unwrap();
    organizer.selection_mut().begin(item.id.clone());
    let pending = organizer.selection().request_delete().unwrap();
    organizer.select_subject(&second.id).unwrap();

    assert_eq!(organizer.delete_selected(pending).unwrap(), 0);
    assert_eq!(
        organizer.list_items(&first.id, ItemKind::Notes).unwrap().len(),
        1
    );
}

#[test]
fn failed_batch_delete_keeps_selection_session() {
    let mut conn = open_db_in_memory().unwrap();
    let store = FlakyItemStore::new(&mut conn);
    store.fail_batch.set(true);
    let mut organizer = Organizer::open(MemoryMetadataStore::new(), store).unwrap();
    let subject = organizer
        .create_subject(&SubjectDraft::named("Art"))
        .unwrap();
    let first = organizer.add_note(&subject.id, "a").unwrap();
    let second = organizer.add_note(&subject.id, "b").unwrap();

    organizer.selection_mut().begin(first.id.clone());
    organizer.selection_mut().toggle(&second.id);
    let pending = organizer.selection().request_delete().unwrap();

    assert!(organizer.delete_selected(pending).is_err());
    assert_eq!(organizer.selection().state(), SelectionState::Selecting);
    assert_eq!(organizer.selection().count(), 2);

    organizer.item_store().fail_batch.set(false);
    let retry = organizer.selection().request_delete().unwrap();
    assert_eq!(organizer.delete_selected(retry).unwrap(), 2);
    assert!(organizer
        .list_items(&subject.id, ItemKind::Notes)
        .unwrap()
        .is_empty());
}

#[test]
fn unreadable_snapshot_blocks_open_and_is_left_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    std::fs::create_dir(&state_path).unwrap();
    std::fs::write(state_path.join("keep"), "existing data").unwrap();
    let mut conn = open_db_in_memory().unwrap();

    let result = Organizer::open(
        FileMetadataStore::new(&state_path),
        SqliteItemStore::try_new(&mut conn).unwrap(),
    );
    let err = match result {
        Ok(_) => panic!("open must fail on an unreadable snapshot"),
        Err(err) => err,
    };

    assert!(err.is_storage_unavailable());
    assert_eq!(
        std::fs::read_to_string(state_path.join("keep")).unwrap(),
        "existing data"
    );
}
