use std::fs;

use protoclip_storage::{ProtocolStore, Provenance, VersionId};
use tempfile::tempdir;

#[test]
fn legacy_flat_file_migrates_on_first_touch() {
    let dir = tempdir().unwrap();
    let store = ProtocolStore::new(dir.path());

    let model_dir = dir.path().join("m");
    fs::create_dir_all(&model_dir).unwrap();
    fs::write(model_dir.join("p.txt"), "hello").unwrap();

    store.ensure_protocol_versions("m", "p").unwrap();

    assert_eq!(
        fs::read_to_string(model_dir.join("p").join("1.0.txt")).unwrap(),
        "hello"
    );
    let index = fs::read_to_string(model_dir.join("p").join("versions.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&index).unwrap();
    assert_eq!(parsed["versions"], serde_json::json!(["1.0"]));
    assert_eq!(parsed["current"], serde_json::json!("1.0"));
    assert!(!model_dir.join("p.txt").exists());
}

#[test]
fn migration_is_idempotent() {
    let dir = tempdir().unwrap();
    let store = ProtocolStore::new(dir.path());

    let model_dir = dir.path().join("m");
    fs::create_dir_all(&model_dir).unwrap();
    fs::write(model_dir.join("p.txt"), "only once").unwrap();

    store.ensure_protocol_versions("m", "p").unwrap();
    let content_after_first = fs::read(model_dir.join("p").join("1.0.txt")).unwrap();
    let index_after_first = fs::read(model_dir.join("p").join("versions.json")).unwrap();

    store.ensure_protocol_versions("m", "p").unwrap();
    assert_eq!(
        fs::read(model_dir.join("p").join("1.0.txt")).unwrap(),
        content_after_first
    );
    assert_eq!(
        fs::read(model_dir.join("p").join("versions.json")).unwrap(),
        index_after_first
    );
}

#[test]
fn migration_without_legacy_file_starts_empty() {
    let dir = tempdir().unwrap();
    let store = ProtocolStore::new(dir.path());

    store.ensure_protocol_versions("m", "untouched").unwrap();

    assert_eq!(store.read_version("m", "untouched", None), "");
    assert_eq!(
        store.list_versions("m", "untouched"),
        vec![VersionId::from("1.0")]
    );
}

#[test]
fn interrupted_temp_write_leaves_index_intact() {
    let dir = tempdir().unwrap();
    let store = ProtocolStore::new(dir.path());
    store.add_model("m").unwrap();
    store.add_protocol("m", "p").unwrap();

    let index_path = dir.path().join("m").join("p").join("versions.json");
    let original = fs::read(&index_path).unwrap();

    // Simulate a crash after the temporary was partially written but before
    // the rename: the store must keep reading the original bytes.
    fs::write(index_path.with_file_name("versions.json.tmp"), b"{\"vers").unwrap();

    assert_eq!(fs::read(&index_path).unwrap(), original);
    let loaded = store.load_version_index("m", "p");
    assert_eq!(loaded.provenance, Provenance::Stored);
    assert_eq!(loaded.value.versions, vec![VersionId::from("1.0")]);
}

#[test]
fn editing_session_round_trip() {
    let dir = tempdir().unwrap();
    let store = ProtocolStore::new(dir.path());

    // Fresh install: sample models appear, then the user builds their own.
    assert_eq!(store.load_models().len(), 3);
    store.add_model("assistant").unwrap();
    store.add_protocol("assistant", "summarize").unwrap();

    // Autosaved edits land on the current version.
    store
        .write_version(
            "assistant",
            "summarize",
            &VersionId::from("1.0"),
            "Summarize the following text:",
        )
        .unwrap();
    assert_eq!(
        store.read_version("assistant", "summarize", None),
        "Summarize the following text:"
    );

    // Branch a new version, tweak it, and make it current.
    let v2 = store
        .create_new_version("assistant", "summarize", None)
        .unwrap();
    assert_eq!(v2, VersionId::from("1.1"));
    store
        .write_version("assistant", "summarize", &v2, "Summarize briefly:")
        .unwrap();
    assert!(store
        .set_current_version("assistant", "summarize", &v2)
        .unwrap());
    assert_eq!(
        store.read_version("assistant", "summarize", None),
        "Summarize briefly:"
    );

    // The older version is untouched.
    assert_eq!(
        store.read_version("assistant", "summarize", Some(&VersionId::from("1.0"))),
        "Summarize the following text:"
    );

    // Reordering is persisted verbatim for the panels to render.
    let mut models = store.load_models();
    models.rotate_left(1);
    store.save_models(&models).unwrap();
    assert_eq!(store.load_models(), models);
}

#[test]
fn unicode_content_survives_migration_and_versioning() {
    let dir = tempdir().unwrap();
    let store = ProtocolStore::new(dir.path());

    let model_dir = dir.path().join("m");
    fs::create_dir_all(&model_dir).unwrap();
    let body = "第一行：規則\n∑ emoji ✓ and \"quotes\"";
    fs::write(model_dir.join("p.txt"), body).unwrap();

    assert_eq!(store.read_version("m", "p", None), body);
    let copy = store.create_new_version("m", "p", None).unwrap();
    assert_eq!(store.read_version("m", "p", Some(&copy)), body);
}

#[test]
fn corrupt_version_index_self_heals_on_next_write() {
    let dir = tempdir().unwrap();
    let store = ProtocolStore::new(dir.path());
    store.add_model("m").unwrap();
    store.add_protocol("m", "p").unwrap();

    let index_path = dir.path().join("m").join("p").join("versions.json");
    fs::write(&index_path, "garbage").unwrap();

    // Reads degrade softly.
    assert!(store.list_versions("m", "p").is_empty());
    assert_eq!(store.get_current_version("m", "p"), VersionId::from("1.0"));
    assert!(!store
        .set_current_version("m", "p", &VersionId::from("1.0"))
        .unwrap());

    // Deleting and re-adding the protocol rebuilds a valid index.
    store.delete_protocol("m", "p").unwrap();
    store.add_protocol("m", "p").unwrap();
    assert_eq!(store.list_versions("m", "p"), vec![VersionId::from("1.0")]);
}
