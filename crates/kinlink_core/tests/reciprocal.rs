use kinlink_core::service::reciprocal_service::{
    REASON_ALREADY_EXISTS, REASON_NO_RECIPROCAL, REASON_SELF_REFERENCE, REASON_TARGET_NOT_FOUND,
};
use kinlink_core::{ContactHandle, EngineConfig, MemoryVault, ReciprocalOutcome, ReciprocalService};

const BOB_UID: &str = "0f8fad5b-d9cb-469f-a165-70867728950e";

fn seeded_vault() -> MemoryVault {
    let vault = MemoryVault::new();
    vault.insert(
        "Sam.md",
        format!("---\nFN: Sam Doe\nGENDER: M\nRELATED[parent]: urn:uuid:{BOB_UID}\n---\n# Sam\n"),
    );
    vault.insert(
        "Bob Doe.md",
        format!("---\nUID: {BOB_UID}\nGENDER: M\n---\n# Bob Doe\n"),
    );
    vault
}

#[tokio::test]
async fn parent_edge_adds_gendered_child_entry_on_target() {
    let vault = seeded_vault();
    let service = ReciprocalService::new(&vault, EngineConfig::default());

    let outcomes = service
        .process_reciprocal_relationships(&ContactHandle::new("Sam.md"))
        .await
        .expect("source readable");
    assert_eq!(
        outcomes,
        vec![ReciprocalOutcome {
            target_contact: BOB_UID.to_string(),
            reverse_type: Some("son".to_string()),
            added: true,
            reason: None,
        }]
    );
    assert_eq!(
        vault.document("Bob Doe.md").as_deref(),
        Some(format!("---\nUID: {BOB_UID}\nGENDER: M\n---\n# Bob Doe\n\n## Related\n- son [[Sam]]\n").as_str())
    );
    assert_eq!(vault.write_log(), vec![ContactHandle::new("Bob Doe.md")]);
}

#[tokio::test]
async fn second_run_adds_nothing() {
    let vault = seeded_vault();
    let service = ReciprocalService::new(&vault, EngineConfig::default());
    let handle = ContactHandle::new("Sam.md");

    service
        .process_reciprocal_relationships(&handle)
        .await
        .expect("first run");
    let after_first = vault.document("Bob Doe.md");
    vault.clear_write_log();

    let outcomes = service
        .process_reciprocal_relationships(&handle)
        .await
        .expect("second run");
    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes[0].added);
    assert_eq!(outcomes[0].reason.as_deref(), Some(REASON_ALREADY_EXISTS));
    assert!(vault.write_log().is_empty());
    assert_eq!(vault.document("Bob Doe.md"), after_first);
}

#[tokio::test]
async fn existing_entry_by_display_name_counts_as_present() {
    let vault = seeded_vault();
    vault.insert(
        "Bob Doe.md",
        format!("---\nUID: {BOB_UID}\n---\n## Related\n- child: Sam Doe\n"),
    );
    let service = ReciprocalService::new(&vault, EngineConfig::default());

    let outcomes = service
        .process_reciprocal_relationships(&ContactHandle::new("Sam.md"))
        .await
        .expect("source readable");
    assert_eq!(outcomes[0].reason.as_deref(), Some(REASON_ALREADY_EXISTS));
    assert!(vault.write_log().is_empty());
}

#[tokio::test]
async fn skipped_edges_carry_reasons() {
    let vault = seeded_vault();
    vault.insert(
        "Sam.md",
        "---\nGENDER: M\n---\n## Related\n- friend [[Nobody]]\n- friend [[Sam]]\n- mentor [[Bob Doe]]\n",
    );
    let service = ReciprocalService::new(&vault, EngineConfig::default());

    let outcomes = service
        .process_reciprocal_relationships(&ContactHandle::new("Sam.md"))
        .await
        .expect("source readable");
    let reasons: Vec<(&str, Option<&str>)> = outcomes
        .iter()
        .map(|outcome| (outcome.target_contact.as_str(), outcome.reason.as_deref()))
        .collect();
    assert_eq!(
        reasons,
        vec![
            ("Nobody", Some(REASON_TARGET_NOT_FOUND)),
            ("Sam", Some(REASON_SELF_REFERENCE)),
            ("Bob Doe", Some(REASON_NO_RECIPROCAL)),
        ]
    );
    assert!(outcomes.iter().all(|outcome| !outcome.added));
    assert!(vault.write_log().is_empty());
}

#[tokio::test]
async fn edges_to_one_target_are_batched_into_one_write() {
    let vault = MemoryVault::new();
    vault.insert("Ann.md", "---\nGENDER: F\n---\n## Related\n- sister [[Eve]]\n- colleague [[Eve]]\n- friend [[Eve]]\n");
    vault.insert("Eve.md", "# Eve\n");
    let service = ReciprocalService::new(&vault, EngineConfig::default());

    let outcomes = service
        .process_reciprocal_relationships(&ContactHandle::new("Ann.md"))
        .await
        .expect("source readable");
    let reverse: Vec<Option<&str>> = outcomes
        .iter()
        .map(|outcome| outcome.reverse_type.as_deref())
        .collect();
    assert_eq!(reverse, vec![Some("sister"), Some("colleague"), Some("friend")]);
    assert!(outcomes.iter().all(|outcome| outcome.added));
    assert_eq!(vault.write_log(), vec![ContactHandle::new("Eve.md")]);
    assert_eq!(
        vault.document("Eve.md").as_deref(),
        Some("# Eve\n\n## Related\n- sister [[Ann]]\n- colleague [[Ann]]\n- friend [[Ann]]\n")
    );
}

#[tokio::test]
async fn unknown_source_gender_falls_back_to_neutral_term() {
    let vault = MemoryVault::new();
    vault.insert("Kim.md", "## Related\n- aunt [[Rita]]\n");
    vault.insert("Rita.md", "## Related\n- friend [[Lou]]\n");
    let service = ReciprocalService::new(&vault, EngineConfig::default());

    let outcomes = service
        .process_reciprocal_relationships(&ContactHandle::new("Kim.md"))
        .await
        .expect("source readable");
    assert_eq!(outcomes[0].reverse_type.as_deref(), Some("niece/nephew"));
    assert_eq!(
        vault.document("Rita.md").as_deref(),
        Some("## Related\n- friend [[Lou]]\n- niece/nephew [[Kim]]\n")
    );
}

#[tokio::test]
async fn failed_target_write_flips_outcome() {
    let vault = seeded_vault();
    vault.set_read_only("Bob Doe.md");
    let service = ReciprocalService::new(&vault, EngineConfig::default());

    let outcomes = service
        .process_reciprocal_relationships(&ContactHandle::new("Sam.md"))
        .await
        .expect("source readable");
    assert!(!outcomes[0].added);
    assert!(outcomes[0]
        .reason
        .as_deref()
        .unwrap_or_default()
        .contains("write rejected"));
}

#[tokio::test]
async fn unreadable_source_is_an_error() {
    let vault = MemoryVault::new();
    let service = ReciprocalService::new(&vault, EngineConfig::default());
    assert!(service
        .process_reciprocal_relationships(&ContactHandle::new("Ghost.md"))
        .await
        .is_err());
}

#[tokio::test]
async fn processing_every_contact_reports_per_document() {
    let vault = seeded_vault();
    let service = ReciprocalService::new(&vault, EngineConfig::default());

    let reports = service
        .process_all_reciprocal_relationships()
        .await
        .expect("handles enumerate");
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|report| report.success));
    let sam = &reports[0];
    assert_eq!(sam.handle.as_str(), "Sam.md");
    assert!(sam.outcomes[0].added);

    // Bob now lists Sam as son; Sam's body-list gains the inverse entry.
    let bob = &reports[1];
    assert_eq!(bob.outcomes.len(), 1);
    assert_eq!(bob.outcomes[0].reverse_type.as_deref(), Some("father"));
    assert!(bob.outcomes[0].added);
    assert!(vault
        .document("Sam.md")
        .expect("document")
        .ends_with("# Sam\n\n## Related\n- father [[Bob Doe]]\n"));

    let again = service
        .process_all_reciprocal_relationships()
        .await
        .expect("handles enumerate");
    assert!(again
        .iter()
        .flat_map(|report| report.outcomes.iter())
        .all(|outcome| !outcome.added));
}

#[test]
fn outcome_json_omits_missing_reason() {
    let outcome = ReciprocalOutcome {
        target_contact: "Bob Doe".to_string(),
        reverse_type: Some("son".to_string()),
        added: true,
        reason: None,
    };
    let json = serde_json::to_value(&outcome).expect("serializes");
    assert_eq!(
        json,
        serde_json::json!({"target_contact": "Bob Doe", "reverse_type": "son", "added": true})
    );
}
