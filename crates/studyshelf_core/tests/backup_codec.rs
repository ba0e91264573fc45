use chrono::{DateTime, TimeZone, Utc};
use studyshelf_core::backup::codec::{export_backup, import_backup, to_json};
use studyshelf_core::db::migrations::latest_version;
use studyshelf_core::{ImportError, Subject};

fn subjects() -> Vec<Subject> {
    vec![
        Subject {
            id: "s1".to_string(),
            name: "الرياضيات".to_string(),
            icon: "📘".to_string(),
            mood: "😀".to_string(),
            color: "#7E57C2".to_string(),
        },
        Subject {
            id: "k9x2m1qa".to_string(),
            name: "Chemistry \"lab\"".to_string(),
            icon: "🧪".to_string(),
            mood: "😴".to_string(),
            color: "#26a69a".to_string(),
        },
    ]
}

fn exported_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 17, 8, 30, 5).unwrap()
}

#[test]
fn export_then_import_round_trips_subjects() {
    let original = subjects();
    let text = to_json(&export_backup(&original, exported_at())).unwrap();

    assert_eq!(import_backup(&text).unwrap(), original);
}

#[test]
fn export_then_import_round_trips_empty_list() {
    let text = to_json(&export_backup(&[], exported_at())).unwrap();
    assert_eq!(import_backup(&text).unwrap(), Vec::<Subject>::new());
}

#[test]
fn export_document_carries_version_and_iso_timestamp() {
    let document = export_backup(&subjects(), exported_at());
    assert_eq!(document.version, latest_version());
    assert_eq!(document.exported_at, "2026-10-17T08:30:05.000Z");

    let value: serde_json::Value = serde_json::from_str(&to_json(&document).unwrap()).unwrap();
    assert!(value["subjects"].is_array());
    assert_eq!(value["version"], latest_version());
    assert_eq!(value["exportedAt"], "2026-10-17T08:30:05.000Z");
    assert!(value.get("items").is_none());
}

#[test]
fn import_rejects_non_array_subjects() {
    let err = import_backup(r#"{"subjects":"not-an-array"}"#).unwrap_err();
    assert!(matches!(err, ImportError::InvalidFormat(_)));
}

#[test]
fn import_rejects_missing_subjects_and_invalid_json() {
    assert!(matches!(
        import_backup(r#"{"version":1}"#),
        Err(ImportError::InvalidFormat(_))
    ));
    assert!(matches!(
        import_backup("definitely not json"),
        Err(ImportError::InvalidFormat(_))
    ));
}

#[test]
fn import_ignores_version_and_timestamp_fields() {
    let text = r##"{"subjects":[{"id":"s1","name":"Art","icon":"🎨","mood":"😀","color":"#EF5350"}]}"##;
    let imported = import_backup(text).unwrap();
    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0].name, "Art");
}

#[test]
fn import_rejects_repeated_subject_ids() {
    let text = r##"{"subjects":[
        {"id":"s1","name":"Art","icon":"🎨","mood":"😀","color":"#EF5350"},
        {"id":"s1","name":"Music","icon":"🎵","mood":"😀","color":"#42A5F5"}
    ]}"##;

    let err = import_backup(text).unwrap_err();
    assert!(matches!(err, ImportError::InvalidFormat(ref message) if message.contains("s1")));
}
