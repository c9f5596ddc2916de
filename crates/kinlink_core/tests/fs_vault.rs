use kinlink_core::{
    ContactHandle, ContactIndex, DocumentStore, EngineConfig, FsVault, ReciprocalService,
    SyncService, VaultError,
};
use std::fs;
use std::path::Path;

fn write(root: &Path, relative: &str, text: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(path, text).expect("write fixture");
}

#[tokio::test]
async fn lists_markdown_contacts_and_skips_hidden_entries() {
    let dir = tempfile::tempdir().expect("temp dir");
    write(dir.path(), "people/Jane Doe.md", "# Jane\n");
    write(dir.path(), "people/family/Bob.md", "# Bob\n");
    write(dir.path(), "people/notes.txt", "not a contact");
    write(dir.path(), ".trash/Old.md", "# Old\n");
    write(dir.path(), "Inbox.md", "# Inbox\n");

    let whole = FsVault::new(dir.path(), None);
    let handles = whole.all_contact_handles().await.expect("walk vault");
    let names: Vec<&str> = handles.iter().map(ContactHandle::as_str).collect();
    assert_eq!(names, vec!["Inbox.md", "people/Jane Doe.md", "people/family/Bob.md"]);

    let scoped = FsVault::new(dir.path(), Some("people/".to_string()));
    let handles = scoped.all_contact_handles().await.expect("walk folder");
    assert_eq!(handles.len(), 2);
    assert_eq!(
        scoped.find_contact_by_name("jane-doe").await.expect("lookup"),
        Some(ContactHandle::new("people/Jane Doe.md"))
    );
}

#[tokio::test]
async fn rejects_handles_escaping_the_root() {
    let dir = tempfile::tempdir().expect("temp dir");
    let vault = FsVault::new(dir.path(), None);

    let error = vault
        .read_document(&ContactHandle::new("../outside.md"))
        .await
        .expect_err("traversal is rejected");
    assert!(matches!(error, VaultError::InvalidHandle(_)));

    let missing = vault
        .read_document(&ContactHandle::new("Nobody.md"))
        .await
        .expect_err("missing file");
    assert!(matches!(missing, VaultError::NotFound(_)));
}

#[tokio::test]
async fn metadata_cache_sees_writes() {
    let dir = tempfile::tempdir().expect("temp dir");
    write(dir.path(), "Ann.md", "---\nFN: Ann\n---\n");
    let vault = FsVault::new(dir.path(), None);
    let handle = ContactHandle::new("Ann.md");

    let before = vault.read_metadata(&handle).await.expect("read").expect("parses");
    assert_eq!(before.get_str("FN"), Some("Ann"));

    vault
        .write_document(&handle, "---\nFN: Ann Lee\n---\n")
        .await
        .expect("write");
    let after = vault.read_metadata(&handle).await.expect("read").expect("parses");
    assert_eq!(after.get_str("FN"), Some("Ann Lee"));
}

#[tokio::test]
async fn sync_and_reciprocal_run_against_files_on_disk() {
    let dir = tempfile::tempdir().expect("temp dir");
    write(
        dir.path(),
        "Bob Doe.md",
        "---\nUID: 0f8fad5b-d9cb-469f-a165-70867728950e\n---\n# Bob Doe\n",
    );
    write(
        dir.path(),
        "Sam.md",
        "---\nGENDER: F\n---\n# Sam\n\n## Related\n- father [[Bob Doe]]\n\n## Log\n- met at school\n",
    );
    let vault = FsVault::new(dir.path(), None);
    let handle = ContactHandle::new("Sam.md");

    let outcome = SyncService::new(&vault, EngineConfig::default())
        .perform_full_sync(&handle)
        .await;
    assert!(outcome.success, "{:?}", outcome.errors);

    let sam = fs::read_to_string(dir.path().join("Sam.md")).expect("read Sam");
    assert!(sam.contains("RELATED[parent]: urn:uuid:0f8fad5b-d9cb-469f-a165-70867728950e"));
    assert!(sam.ends_with("# Sam\n\n## Related\n- father [[Bob Doe]]\n\n## Log\n- met at school\n"));
    let bob = fs::read_to_string(dir.path().join("Bob Doe.md")).expect("read Bob");
    assert!(bob.contains("GENDER: M"));

    let outcomes = ReciprocalService::new(&vault, EngineConfig::default())
        .process_reciprocal_relationships(&handle)
        .await
        .expect("source readable");
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].reverse_type.as_deref(), Some("daughter"));
    let bob = fs::read_to_string(dir.path().join("Bob Doe.md")).expect("read Bob");
    assert!(bob.ends_with("# Bob Doe\n\n## Related\n- daughter [[Sam]]\n"));
}
