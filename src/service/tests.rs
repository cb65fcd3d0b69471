use super::*;
use crate::store::StoreEvent;
use crate::tea::{get_remaining, parse_date};

const LOG_HEADER: &str = "| Date | Wat | Volum | Weyt | Brew | Time | Temptr | Rating | Tasting Notes |\n| --- | --- | --- | --- | --- | --- | --- | --- | --- |";
const TEMPLATE: &str = "# Tea Summary Template\n\n\n| Style | Country | Shop | Type |\n| --- | --- | --- | --- |\n| Green | China |  |  |\n| ^^    | Japan |  |  |\n| Black |  |  |  |\n\n";

fn service() -> NoteService {
    let db = Database::in_memory().expect("failed to create in-memory database");
    NoteService::new(db)
}

fn today() -> Date {
    parse_date("14.10.26").expect("valid date")
}

fn note_tag_rows(service: &NoteService) -> i64 {
    service
        .database()
        .connection()
        .query_row("SELECT COUNT(*) FROM note_tags", [], |row| row.get(0))
        .expect("failed to count note_tags")
}

#[test]
fn note_service_construction_with_in_memory_database() {
    let service = service();

    let count: i64 = service
        .database()
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table'",
            [],
            |row| row.get(0),
        )
        .expect("failed to query schema");

    assert!(
        count >= 3,
        "expected at least 3 tables (notes, tags, note_tags)"
    );
}

#[test]
fn create_note_assigns_key_and_title() {
    let service = service();

    let note = service
        .create_note("# Sencha Asahi\n\nsteamed", &["`green"])
        .expect("failed to create note");

    assert_eq!(note.key.as_str().len(), 20);
    assert_eq!(note.title, "Sencha Asahi");
    assert_eq!(note.tags, vec!["`green"]);
    assert!(!note.is_trashed);
}

#[test]
fn create_note_rejects_empty_content() {
    let service = service();

    let err = service.create_note("   \n", &[]).unwrap_err();
    assert!(err.to_string().contains("cannot be empty"));
}

#[test]
fn get_note_returns_what_was_created() {
    let service = service();
    let created = service
        .create_note("# Gyokuro\n", &["`green", "Japan"])
        .expect("failed to create note");

    let retrieved = service
        .get_note(&created.key)
        .expect("failed to get note")
        .expect("note should exist");

    assert_eq!(retrieved, created);
}

#[test]
fn get_note_with_unknown_key_returns_none() {
    let service = service();
    let result = service.get_note(&NoteKey::new("missing")).expect("query failed");
    assert_eq!(result, None);
}

#[test]
fn tag_order_is_preserved_and_duplicates_dropped() {
    let service = service();
    let note = service
        .create_note("# Tea\n", &["⚖50", "Japan", "`green", "Japan"])
        .expect("failed to create note");

    let retrieved = service.get_note(&note.key).unwrap().unwrap();
    assert_eq!(retrieved.tags, vec!["⚖50", "Japan", "`green"]);
}

#[test]
fn tags_are_shared_between_notes() {
    let service = service();
    service.create_note("# One\n", &["`green"]).unwrap();
    service.create_note("# Two\n", &["`green", "China"]).unwrap();

    let tag_count: i64 = service
        .database()
        .connection()
        .query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))
        .unwrap();
    assert_eq!(tag_count, 2);
    assert_eq!(note_tag_rows(&service), 3);
}

#[test]
fn update_note_rewrites_content_title_and_tags() {
    let service = service();
    let mut note = service.create_note("# Old title\n", &["a", "b"]).unwrap();

    note.content = "# New title\nbody".to_string();
    note.tags = vec!["b".to_string(), "c".to_string()];
    let updated = service.update_note(&note).expect("failed to update");

    assert_eq!(updated.title, "New title");
    let stored = service.get_note(&note.key).unwrap().unwrap();
    assert_eq!(stored.content, "# New title\nbody");
    assert_eq!(stored.title, "New title");
    assert_eq!(stored.tags, vec!["b", "c"]);
}

#[test]
fn update_note_with_unknown_key_fails() {
    let service = service();
    let ghost = NoteBuilder::new().key("ghost").content("# Ghost").build();

    let err = service.update_note(&ghost).unwrap_err();
    assert!(err.to_string().contains("Note not found"));
}

#[test]
fn trashed_notes_leave_listings_but_stay_in_the_snapshot() {
    let service = service();
    let kept = service.create_note("# Kept\n", &["`green"]).unwrap();
    let binned = service.create_note("# Binned\n", &["`green"]).unwrap();

    let trashed = service.trash_note(&binned.key).expect("failed to trash");
    assert!(trashed.is_trashed);

    let listed = service.list_notes(&TagQuery::new()).unwrap();
    let keys: Vec<&NoteKey> = listed.iter().map(|n| &n.key).collect();
    assert_eq!(keys, vec![&kept.key]);

    let snapshot = service.note_map().unwrap();
    assert_eq!(snapshot.len(), 2);
    assert!(snapshot.get(&binned.key).unwrap().is_trashed);
}

#[test]
fn trash_unknown_note_fails() {
    let service = service();
    let err = service.trash_note(&NoteKey::new("nope")).unwrap_err();
    assert!(err.to_string().contains("Note not found"));
}

#[test]
fn list_notes_filters_by_tag_query() {
    let service = service();
    service.create_note("# Sencha\n", &["`green", "Japan"]).unwrap();
    service.create_note("# Longjing\n", &["`green", "China"]).unwrap();
    service.create_note("# Keemun\n", &["`black", "China"]).unwrap();

    let green_not_japan = TagQuery::parse("+`green -Japan");
    let titles: Vec<String> = service
        .list_notes(&green_not_japan)
        .unwrap()
        .into_iter()
        .map(|n| n.title)
        .collect();
    assert_eq!(titles, vec!["Longjing"]);

    let all = service.list_notes(&TagQuery::new()).unwrap();
    assert_eq!(all.len(), 3);
}

#[test]
fn delete_note_is_idempotent_and_cascades() {
    let service = service();
    let note = service.create_note("# Gone\n", &["x", "y"]).unwrap();
    assert_eq!(note_tag_rows(&service), 2);

    service.delete_note(&note.key).expect("first delete");
    service.delete_note(&note.key).expect("second delete");

    assert_eq!(service.get_note(&note.key).unwrap(), None);
    assert_eq!(note_tag_rows(&service), 0);
}

#[test]
fn write_batch_is_all_or_nothing() {
    let service = service();
    let mut note = service.create_note("# Before\n", &[]).unwrap();
    note.content = "# After\n".to_string();

    let mut batch = WriteBatch::new();
    batch.stage(&note);
    batch.stage(&NoteBuilder::new().key("ghost").content("# Ghost").build());

    assert!(NoteStore::write_batch(&service, &batch).is_err());
    let stored = service.get_note(&note.key).unwrap().unwrap();
    assert_eq!(stored.content, "# Before\n");
}

#[test]
fn reserve_through_the_store_emits_events_once() {
    let service = service();
    service.create_note(TEMPLATE, &[]).unwrap();
    let reserve = service.create_note("## Tea Reserve\n", &[]).unwrap();
    let tea = service
        .create_note(
            &format!(
                "# Sencha\n\n{LOG_HEADER}\n| 03.10.26 | soft | 100ml | 5.0g | | | | 7 | |\n\nStock\n\t~ 50.0g (01.09.26)\n"
            ),
            &["`green", "China"],
        )
        .unwrap();
    let config = EngineConfig::default();

    let mut events = Vec::new();
    let written = service.generate_reserve(&config, today(), &mut events).unwrap();

    assert_eq!(written.len(), 2);
    assert_eq!(events.len(), 3);
    assert!(events.contains(&StoreEvent::NoteUpdated(reserve.key.clone())));
    assert!(events.contains(&StoreEvent::NoteUpdated(tea.key.clone())));
    assert_eq!(events.last(), Some(&StoreEvent::RefreshNotes));

    let stored_tea = service.get_note(&tea.key).unwrap().unwrap();
    assert_eq!(get_remaining(&stored_tea), Some(45.0));
    let stored_reserve = service.get_note(&reserve.key).unwrap().unwrap();
    assert!(
        stored_reserve.content.contains("| Green | China |    45.0g |"),
        "{}",
        stored_reserve.content
    );

    let mut again = Vec::new();
    let written = service.generate_reserve(&config, today(), &mut again).unwrap();
    assert!(written.is_empty());
    assert!(again.is_empty());
}

#[test]
fn report_errors_surface_and_write_nothing() {
    let service = service();
    service.create_note(TEMPLATE, &[]).unwrap();
    let before = service.list_notes(&TagQuery::new()).unwrap();

    let mut events = Vec::new();
    let err = service
        .generate_purchase(&EngineConfig::default(), today(), &mut events)
        .unwrap_err();

    assert_eq!(
        err.downcast_ref::<ReportError>(),
        Some(&ReportError::missing_note("Tea Purchase"))
    );
    assert!(events.is_empty());
    assert_eq!(service.list_notes(&TagQuery::new()).unwrap(), before);
}
