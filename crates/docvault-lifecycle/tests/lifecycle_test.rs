mod helpers;

use std::collections::HashSet;

use docvault_core::constants::{COLLECTIONS_DOCUMENT, FILES_DOCUMENT};
use docvault_core::{
    ApprovalStatus, CollectionRef, CreateCollectionRequest, DuplicatePolicy, FileEdit,
    FileFilters, FileStatus, RecordSet, UploadRequest,
};
use helpers::fixtures::{create_source, physical_objects, plant_recycled, upload_ok};
use helpers::{admin, alice, bob, setup_test_vault, setup_test_vault_with};

#[tokio::test]
async fn test_upload_without_collision() {
    let vault = setup_test_vault().await;
    let source = create_source(&vault, "Notes.pdf", b"lecture notes");

    let outcome = vault
        .controller
        .upload(&alice(), UploadRequest::new(source))
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.message, "File uploaded successfully");
    let record = outcome.payload.unwrap();
    assert_eq!(record.filename, "Notes");
    assert_eq!(record.extension, "pdf");
    assert!(!record.file_path.is_empty());
    assert_eq!(record.uploader, "alice");
    assert_eq!(record.role, "student");
    assert_eq!(record.status, FileStatus::Active);

    let active = vault.active().await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, record.id);

    let objects = physical_objects(vault.storage_root(), vault.config.recycle_dir());
    assert_eq!(objects, vec![record.file_path.clone()]);
}

#[tokio::test]
async fn test_upload_into_category_directory() {
    let vault = setup_test_vault().await;
    let source = create_source(&vault, "Form.docx", b"form");

    let outcome = vault
        .controller
        .upload(
            &alice(),
            UploadRequest::new(source)
                .named("Enrollment Form.docx")
                .in_category("Forms")
                .with_description("  first term  "),
        )
        .await;

    let record = outcome.payload.unwrap();
    assert_eq!(record.filename, "Enrollment Form");
    assert_eq!(record.category.as_deref(), Some("Forms"));
    assert!(record.file_path.starts_with("Forms/Enrollment Form_"));
    assert_eq!(record.description.as_deref(), Some("first term"));
}

#[tokio::test]
async fn test_none_category_is_treated_as_uncategorised() {
    let vault = setup_test_vault().await;
    let source = create_source(&vault, "Memo.txt", b"memo");

    let record = vault
        .controller
        .upload(&alice(), UploadRequest::new(source).in_category("None"))
        .await
        .payload
        .unwrap();

    assert_eq!(record.category, None);
    assert!(!record.file_path.contains('/'));
}

#[tokio::test]
async fn test_upload_collision_cancel_writes_nothing() {
    let vault = setup_test_vault().await;
    let first = upload_ok(&vault, &alice(), "Notes.pdf").await;
    let source = create_source(&vault, "Notes.pdf", b"second");

    let outcome = vault
        .controller
        .upload(&alice(), UploadRequest::new(source))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.error_code, Some("DUPLICATE_NAME"));
    assert_eq!(vault.active().await.len(), 1);
    let objects = physical_objects(vault.storage_root(), vault.config.recycle_dir());
    assert_eq!(objects, vec![first.file_path]);
}

#[tokio::test]
async fn test_upload_collision_override_replaces_record_and_bytes() {
    let vault = setup_test_vault().await;
    let first = upload_ok(&vault, &alice(), "Notes.pdf").await;
    let source = create_source(&vault, "Notes.pdf", b"new content");

    let outcome = vault
        .controller
        .upload(
            &alice(),
            UploadRequest::new(source).with_policy(DuplicatePolicy::Override),
        )
        .await;

    assert!(outcome.success);
    assert_eq!(
        outcome.message,
        "File uploaded successfully (previous version replaced)"
    );
    let second = outcome.payload.unwrap();
    let active = vault.active().await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, second.id);
    assert_ne!(second.id, first.id);

    assert!(!vault.storage_root().join(&first.file_path).exists());
    let stored = std::fs::read(vault.storage_root().join(&second.file_path)).unwrap();
    assert_eq!(stored, b"new content");
}

#[tokio::test]
async fn test_upload_collision_rename_generates_next_free_name() {
    let vault = setup_test_vault().await;
    upload_ok(&vault, &alice(), "Report.pdf").await;
    let source = create_source(&vault, "Report.pdf", b"again");
    let request = UploadRequest::new(source).with_policy(DuplicatePolicy::Rename);

    let first = vault.controller.upload(&alice(), request.clone()).await;
    let second = vault.controller.upload(&alice(), request).await;

    assert_eq!(first.message, "File uploaded successfully as 'Report (1)'");
    assert_eq!(second.payload.unwrap().filename, "Report (2)");
    assert_eq!(vault.active().await.len(), 3);
}

#[tokio::test]
async fn test_failed_save_leaves_no_record_or_artifact() {
    let vault = setup_test_vault().await;
    let missing = vault.source_dir().join("Ghost.pdf");

    let outcome = vault
        .controller
        .upload(&alice(), UploadRequest::new(missing))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.error_code, Some("IO_ERROR"));
    assert!(vault.active().await.is_empty());
    assert!(physical_objects(vault.storage_root(), vault.config.recycle_dir()).is_empty());
}

#[tokio::test]
async fn test_failed_override_keeps_previous_version() {
    let vault = setup_test_vault().await;
    let first = upload_ok(&vault, &alice(), "Notes.pdf").await;
    let missing = vault.source_dir().join("gone.pdf");

    let outcome = vault
        .controller
        .upload(
            &alice(),
            UploadRequest::new(missing)
                .named("Notes")
                .with_policy(DuplicatePolicy::Override),
        )
        .await;

    assert!(!outcome.success);
    let active = vault.active().await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, first.id);
    assert!(vault.storage_root().join(&first.file_path).exists());
}

#[tokio::test]
async fn test_invalid_upload_input_is_a_validation_failure() {
    let vault = setup_test_vault().await;
    let source = create_source(&vault, "Notes.pdf", b"x");

    let bad_name = vault
        .controller
        .upload(&alice(), UploadRequest::new(source.clone()).named("a/b"))
        .await;
    let bad_category = vault
        .controller
        .upload(&alice(), UploadRequest::new(source).in_category(".hidden"))
        .await;

    assert_eq!(bad_name.error_code, Some("VALIDATION_ERROR"));
    assert_eq!(bad_category.error_code, Some("VALIDATION_ERROR"));
    assert!(vault.active().await.is_empty());
}

#[tokio::test]
async fn test_upload_name_with_consecutive_dots() {
    let vault = setup_test_vault().await;

    let record = upload_ok(&vault, &alice(), "Q1..Q2 report.pdf").await;

    assert_eq!(record.filename, "Q1..Q2 report");
    assert_eq!(record.extension, "pdf");
    assert!(vault.storage_root().join(&record.file_path).exists());
}

#[tokio::test]
async fn test_override_of_another_users_file_is_forbidden() {
    let vault = setup_test_vault().await;
    let original = upload_ok(&vault, &alice(), "Notes.pdf").await;
    let source = create_source(&vault, "Notes.txt", b"bob's notes");
    let request = UploadRequest::new(source).with_policy(DuplicatePolicy::Override);

    let denied = vault.controller.upload(&bob(), request.clone()).await;

    assert!(!denied.success);
    assert_eq!(denied.error_code, Some("FORBIDDEN"));
    assert_eq!(denied.message, "You do not have permission to replace 'Notes'");
    let active = vault.active().await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, original.id);
    assert!(vault.storage_root().join(&original.file_path).exists());
    let objects = physical_objects(vault.storage_root(), vault.config.recycle_dir());
    assert_eq!(objects, vec![original.file_path.clone()]);

    let replaced = vault.controller.upload(&admin(), request).await;
    assert!(replaced.success, "{}", replaced.message);
    assert_eq!(vault.active().await[0].uploader, "root");
}

#[tokio::test]
async fn test_failed_metadata_commit_keeps_documents_and_bytes_in_step() {
    let vault = setup_test_vault().await;
    vault
        .controller
        .create_collection(
            &admin(),
            CreateCollectionRequest {
                name: "Finance".to_string(),
                icon: None,
            },
        )
        .await;
    // A directory in place of the temp file makes the collections write fail.
    let blocker = vault
        .config
        .data_dir()
        .join(format!("{}.tmp", COLLECTIONS_DOCUMENT));
    std::fs::create_dir(&blocker).unwrap();
    let source = create_source(&vault, "Budget.xlsx", b"numbers");
    let request = UploadRequest::new(source).into_collection(CollectionRef::from("Finance"));

    let outcome = vault.controller.upload(&alice(), request.clone()).await;

    assert!(!outcome.success);
    assert_eq!(outcome.error_code, Some("PERSISTENCE_ERROR"));
    assert_eq!(outcome.message, "Failed to save document metadata");
    assert!(vault.active().await.is_empty());
    assert!(physical_objects(vault.storage_root(), vault.config.recycle_dir()).is_empty());
    let finance = vault
        .controller
        .get_collection(&CollectionRef::Id(1))
        .await
        .unwrap();
    assert!(finance.files.is_empty());

    std::fs::remove_dir(&blocker).unwrap();
    let retried = vault.controller.upload(&alice(), request).await;
    assert!(retried.success, "{}", retried.message);
    assert_eq!(vault.active().await.len(), 1);
}

#[tokio::test]
async fn test_concurrent_uploads_never_share_a_name() {
    let vault = setup_test_vault().await;
    let source = create_source(&vault, "Notes.pdf", b"same");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let controller = vault.controller.clone();
        let request = UploadRequest::new(source.clone()).with_policy(DuplicatePolicy::Rename);
        handles.push(tokio::spawn(async move {
            controller.upload(&alice(), request).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().success);
    }

    let names: HashSet<String> = vault
        .active()
        .await
        .into_iter()
        .map(|r| r.filename)
        .collect();
    assert_eq!(names.len(), 8);
    assert!(names.contains("Notes"));
    assert!(names.contains("Notes (7)"));
}

#[tokio::test]
async fn test_delete_then_restore_round_trip() {
    let vault = setup_test_vault().await;
    let original = upload_ok(&vault, &alice(), "Notes.pdf").await;

    let deleted = vault.controller.delete_file(&alice(), "Notes", None).await;
    assert!(deleted.success);
    assert_eq!(deleted.message, "File 'Notes' moved to recycle bin");
    let soft = deleted.payload.unwrap();
    assert_eq!(soft.status, FileStatus::SoftDeleted);
    assert_eq!(soft.deleted_by.as_deref(), Some("alice"));
    let recycle_path = soft.recycle_bin_path.clone().unwrap();
    assert!(vault.storage_root().join(&recycle_path).exists());
    assert!(!vault.storage_root().join(&original.file_path).exists());
    assert!(vault.active().await.is_empty());
    assert_eq!(vault.deleted().await.len(), 1);

    let restored = vault
        .controller
        .restore_file(&alice(), "Notes", soft.deleted_at.as_ref())
        .await;
    assert!(restored.success);
    assert_eq!(restored.message, "File 'Notes' restored successfully");

    let active = vault.active().await;
    assert_eq!(active, vec![original.clone()]);
    assert!(vault.deleted().await.is_empty());
    assert!(vault.storage_root().join(&original.file_path).exists());
}

#[tokio::test]
async fn test_delete_missing_file_is_not_found() {
    let vault = setup_test_vault().await;

    let outcome = vault.controller.delete_file(&alice(), "Nothing", None).await;

    assert!(!outcome.success);
    assert_eq!(outcome.message, "File 'Nothing' not found");
    assert_eq!(outcome.error_code, Some("NOT_FOUND"));
}

#[tokio::test]
async fn test_restore_missing_file_is_not_found() {
    let vault = setup_test_vault().await;
    upload_ok(&vault, &alice(), "Notes.pdf").await;

    let outcome = vault.controller.restore_file(&alice(), "Notes", None).await;

    assert_eq!(outcome.message, "File 'Notes' not found in deleted files");
    assert_eq!(outcome.error_code, Some("NOT_FOUND"));
}

#[tokio::test]
async fn test_restore_blocked_by_active_name() {
    let vault = setup_test_vault().await;
    upload_ok(&vault, &alice(), "Notes.pdf").await;
    vault.controller.delete_file(&alice(), "Notes", None).await;
    upload_ok(&vault, &alice(), "Notes.pdf").await;

    let outcome = vault.controller.restore_file(&alice(), "Notes", None).await;

    assert_eq!(outcome.error_code, Some("DUPLICATE_NAME"));
    assert_eq!(vault.active().await.len(), 1);
    assert_eq!(vault.deleted().await.len(), 1);
}

#[tokio::test]
async fn test_deleted_names_repeat_and_are_disambiguated_by_time() {
    let vault = setup_test_vault().await;
    upload_ok(&vault, &alice(), "Notes.pdf").await;
    vault.controller.delete_file(&alice(), "Notes", None).await;
    upload_ok(&vault, &alice(), "Notes.pdf").await;
    vault.controller.delete_file(&alice(), "Notes", None).await;

    let deleted = vault.deleted().await;
    assert_eq!(deleted.len(), 2);

    let target = deleted[0].clone();
    let outcome = vault
        .controller
        .permanently_delete_file(&alice(), "Notes", target.deleted_at.as_ref())
        .await;
    assert!(outcome.success);
    assert_eq!(outcome.payload.unwrap().id, target.id);
    let remaining = vault.deleted().await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, deleted[1].id);
}

#[tokio::test]
async fn test_permanent_delete_removes_record_and_bytes() {
    let vault = setup_test_vault().await;
    upload_ok(&vault, &alice(), "Notes.pdf").await;
    let soft = vault
        .controller
        .delete_file(&alice(), "Notes", None)
        .await
        .payload
        .unwrap();

    let outcome = vault
        .controller
        .permanently_delete_file(&alice(), "Notes", None)
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.message, "File 'Notes' permanently deleted");
    assert!(vault.deleted().await.is_empty());
    let recycle_path = soft.recycle_bin_path.unwrap();
    assert!(!vault.storage_root().join(recycle_path).exists());
}

#[tokio::test]
async fn test_permanent_delete_proceeds_when_bytes_are_gone() {
    let vault = setup_test_vault().await;
    upload_ok(&vault, &alice(), "Notes.pdf").await;
    let soft = vault
        .controller
        .delete_file(&alice(), "Notes", None)
        .await
        .payload
        .unwrap();
    std::fs::remove_file(vault.storage_root().join(soft.recycle_bin_path.unwrap())).unwrap();

    let outcome = vault
        .controller
        .permanently_delete_file(&alice(), "Notes", None)
        .await;

    assert!(outcome.success);
    assert!(vault.deleted().await.is_empty());
}

#[tokio::test]
async fn test_non_owner_cannot_delete_but_admin_can() {
    let vault = setup_test_vault().await;
    upload_ok(&vault, &alice(), "Notes.pdf").await;

    let denied = vault.controller.delete_file(&bob(), "Notes", None).await;
    assert_eq!(denied.error_code, Some("FORBIDDEN"));
    assert_eq!(vault.active().await.len(), 1);

    let allowed = vault.controller.delete_file(&admin(), "Notes", None).await;
    assert!(allowed.success);
}

#[tokio::test]
async fn test_failed_delete_commit_returns_bytes() {
    let vault = setup_test_vault().await;
    let record = upload_ok(&vault, &alice(), "Notes.pdf").await;
    let blocker = vault.config.data_dir().join(format!("{}.tmp", FILES_DOCUMENT));
    std::fs::create_dir(&blocker).unwrap();

    let outcome = vault.controller.delete_file(&alice(), "Notes", None).await;

    assert!(!outcome.success);
    assert_eq!(outcome.error_code, Some("PERSISTENCE_ERROR"));
    assert!(vault.deleted().await.is_empty());
    assert_eq!(vault.active().await[0].id, record.id);
    assert!(vault.storage_root().join(&record.file_path).exists());
}

#[tokio::test]
async fn test_listing_is_scoped_by_role() {
    let vault = setup_test_vault().await;
    upload_ok(&vault, &alice(), "Notes.pdf").await;
    upload_ok(&vault, &bob(), "Syllabus.docx").await;
    upload_ok(&vault, &bob(), "Grades.xlsx").await;
    vault.controller.delete_file(&bob(), "Grades", None).await;

    let for_alice = vault
        .controller
        .list_files(&alice(), &FileFilters::default())
        .await;
    let for_admin = vault
        .controller
        .list_files(&admin(), &FileFilters::default())
        .await;

    assert_eq!(for_alice.len(), 1);
    assert_eq!(for_alice[0].filename, "Notes");
    assert_eq!(for_admin.len(), 2);
    assert!(vault.controller.list_deleted_files(&alice()).await.is_empty());
    assert_eq!(vault.controller.list_deleted_files(&bob()).await.len(), 1);
}

#[tokio::test]
async fn test_listing_filters() {
    let vault = setup_test_vault().await;
    upload_ok(&vault, &alice(), "Notes.pdf").await;
    upload_ok(&vault, &alice(), "Budget.xlsx").await;
    let source = create_source(&vault, "Minutes.pdf", b"m");
    vault
        .controller
        .upload(&alice(), UploadRequest::new(source).in_category("Meetings"))
        .await;

    let pdfs = vault
        .controller
        .list_files(
            &alice(),
            &FileFilters {
                extension: Some("pdf".to_string()),
                ..Default::default()
            },
        )
        .await;
    let search = vault
        .controller
        .list_files(
            &alice(),
            &FileFilters {
                search: Some("BUD".to_string()),
                ..Default::default()
            },
        )
        .await;
    let meetings = vault
        .controller
        .list_files(
            &alice(),
            &FileFilters {
                category: Some("Meetings".to_string()),
                ..Default::default()
            },
        )
        .await;

    assert_eq!(pdfs.len(), 2);
    assert_eq!(search[0].filename, "Budget");
    assert_eq!(meetings.len(), 1);
    assert_eq!(meetings[0].filename, "Minutes");
}

#[tokio::test]
async fn test_set_partition_holds_across_lifecycle() {
    let vault = setup_test_vault().await;
    for name in ["A.pdf", "B.pdf", "C.pdf", "D.pdf"] {
        upload_ok(&vault, &alice(), name).await;
    }
    vault.controller.delete_file(&alice(), "B", None).await;
    vault.controller.delete_file(&alice(), "D", None).await;
    vault.controller.restore_file(&alice(), "D", None).await;
    vault
        .controller
        .permanently_delete_file(&alice(), "B", None)
        .await;
    vault.controller.delete_file(&alice(), "A", None).await;

    let active: HashSet<_> = vault.active().await.into_iter().map(|r| r.id).collect();
    let deleted: HashSet<_> = vault.deleted().await.into_iter().map(|r| r.id).collect();
    assert!(active.is_disjoint(&deleted));
    assert_eq!(active.len() + deleted.len(), 3);

    // Every remaining record has its bytes where it says they are.
    for record in vault.active().await {
        assert!(vault.storage_root().join(&record.file_path).exists());
    }
    for record in vault.deleted().await {
        let recycle_path = record.recycle_bin_path.unwrap();
        assert!(vault.storage_root().join(recycle_path).exists());
    }
}

#[tokio::test]
async fn test_retention_sweep_purges_only_old_objects() {
    let vault = setup_test_vault().await;
    upload_ok(&vault, &alice(), "Fresh.pdf").await;
    vault.controller.delete_file(&alice(), "Fresh", None).await;

    let old_key = plant_recycled(&vault, "20200101T000000000", "Old_20191231_000000_000000.pdf");
    let mut old = vault.deleted().await[0].clone();
    old.id = uuid::Uuid::nil();
    old.filename = "Old".to_string();
    old.file_path = "Old_20191231_000000_000000.pdf".to_string();
    old.recycle_bin_path = Some(old_key.clone());
    vault.files().add(RecordSet::SoftDeleted, old).await.unwrap();

    let outcome = vault.controller.cleanup_recycle_bin(15).await;

    assert!(outcome.success);
    assert_eq!(outcome.payload, Some(1));
    assert_eq!(
        outcome.message,
        "Automatically cleaned up 1 old file(s) from recycle bin"
    );
    let deleted = vault.deleted().await;
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].filename, "Fresh");
    assert!(!vault.storage_root().join(old_key).exists());
}

#[tokio::test]
async fn test_retention_sweep_with_zero_days_purges_everything() {
    let vault = setup_test_vault().await;
    upload_ok(&vault, &alice(), "Notes.pdf").await;
    vault.controller.delete_file(&alice(), "Notes", None).await;

    let outcome = vault.controller.cleanup_recycle_bin(0).await;

    assert_eq!(outcome.payload, Some(1));
    assert!(vault.deleted().await.is_empty());
}

#[tokio::test]
async fn test_retention_sweep_with_nothing_to_do() {
    let vault = setup_test_vault().await;

    let outcome = vault.controller.cleanup_recycle_bin(15).await;

    assert!(outcome.success);
    assert_eq!(outcome.message, "No old files to cleanup");
}

#[tokio::test]
async fn test_startup_runs_retention_sweep() {
    let seeded = setup_test_vault().await;
    let old_key = plant_recycled(&seeded, "20200101T000000000", "Old_1.pdf");
    let record: docvault_core::FileRecord = serde_json::from_value(serde_json::json!({
        "filename": "Old",
        "extension": "pdf",
        "file_path": "Old_1.pdf",
        "uploader": "alice",
        "role": "student",
        "deleted_at": "2020-01-01 00:00:00",
        "recycle_bin_path": old_key,
    }))
    .unwrap();
    seeded
        .files()
        .add(RecordSet::SoftDeleted, record)
        .await
        .unwrap();

    let config = seeded.config.clone().with_cleanup_on_start(true);
    let controller = docvault_lifecycle::DocumentController::start(config)
        .await
        .unwrap();

    assert!(controller.list_deleted_files(&admin()).await.is_empty());
}

#[tokio::test]
async fn test_recycle_bin_info_counts_down_retention() {
    let vault = setup_test_vault_with(|c| c.with_cleanup_on_start(false).with_retention_days(10)).await;
    upload_ok(&vault, &alice(), "Notes.pdf").await;
    vault.controller.delete_file(&alice(), "Notes", None).await;

    let info = vault
        .controller
        .get_recycle_bin_file_info(&alice(), "Notes", None)
        .await
        .unwrap();

    assert_eq!(info.age_days, 0);
    assert_eq!(info.days_remaining, 10);
    assert!(vault
        .controller
        .get_recycle_bin_file_info(&bob(), "Notes", None)
        .await
        .is_none());
}

#[tokio::test]
async fn test_collection_names_are_case_insensitively_unique() {
    let vault = setup_test_vault().await;

    let first = vault
        .controller
        .create_collection(
            &admin(),
            CreateCollectionRequest {
                name: "Finance".to_string(),
                icon: None,
            },
        )
        .await;
    let second = vault
        .controller
        .create_collection(
            &admin(),
            CreateCollectionRequest {
                name: "finance".to_string(),
                icon: None,
            },
        )
        .await;

    assert_eq!(first.message, "Collection 'Finance' created successfully");
    assert_eq!(first.payload.unwrap().created_by.as_deref(), Some("root"));
    assert!(!second.success);
    assert_eq!(second.error_code, Some("DUPLICATE_NAME"));
    assert_eq!(second.error_type.as_deref(), Some("DuplicateNameConflict"));
    assert_eq!(vault.controller.list_collections().await.len(), 1);
}

#[tokio::test]
async fn test_collection_membership_follows_file_lifecycle() {
    let vault = setup_test_vault().await;
    vault
        .controller
        .create_collection(
            &admin(),
            CreateCollectionRequest {
                name: "Finance".to_string(),
                icon: Some("coins.png".to_string()),
            },
        )
        .await;
    let source = create_source(&vault, "Budget.xlsx", b"numbers");
    let budget = vault
        .controller
        .upload(
            &alice(),
            UploadRequest::new(source).into_collection(CollectionRef::from("finance")),
        )
        .await
        .payload
        .unwrap();
    assert_eq!(budget.collection_id, Some(1));
    let notes = upload_ok(&vault, &alice(), "Notes.pdf").await;

    let added = vault
        .controller
        .add_file_to_collection(&CollectionRef::Id(1), &notes)
        .await;
    assert_eq!(added.message, "File added to collection 'Finance'");
    let again = vault
        .controller
        .add_file_to_collection(&CollectionRef::Id(1), &notes)
        .await;
    assert!(again.success);
    assert_eq!(
        again.message,
        "File 'Notes' is already in collection 'Finance'"
    );
    assert_eq!(vault.active().await.len(), 2);
    assert_eq!(again.payload.unwrap().files.len(), 2);

    // Soft-deleted members drop out of the view and come back on restore.
    vault.controller.delete_file(&alice(), "Budget", None).await;
    let members = vault
        .controller
        .files_in_collection(&CollectionRef::Id(1))
        .await
        .unwrap();
    assert_eq!(members.len(), 1);
    vault.controller.restore_file(&alice(), "Budget", None).await;
    let members = vault
        .controller
        .files_in_collection(&CollectionRef::Id(1))
        .await
        .unwrap();
    assert_eq!(members.len(), 2);

    let removed = vault
        .controller
        .remove_file_from_collection(&CollectionRef::from("Finance"), "Notes")
        .await;
    assert_eq!(removed.message, "File removed from collection 'Finance'");
    let missing = vault
        .controller
        .remove_file_from_collection(&CollectionRef::from("Finance"), "Notes")
        .await;
    assert_eq!(missing.message, "File 'Notes' not found in collection");
}

#[tokio::test]
async fn test_override_keeps_collection_membership() {
    let vault = setup_test_vault().await;
    vault
        .controller
        .create_collection(
            &admin(),
            CreateCollectionRequest {
                name: "Finance".to_string(),
                icon: None,
            },
        )
        .await;
    let source = create_source(&vault, "Budget.xlsx", b"v1");
    vault
        .controller
        .upload(
            &alice(),
            UploadRequest::new(source.clone()).into_collection(CollectionRef::Id(1)),
        )
        .await;

    let replaced = vault
        .controller
        .upload(
            &alice(),
            UploadRequest::new(source).with_policy(DuplicatePolicy::Override),
        )
        .await
        .payload
        .unwrap();

    let view = vault
        .controller
        .get_collection(&CollectionRef::Id(1))
        .await
        .unwrap();
    assert_eq!(view.files.len(), 1);
    assert_eq!(view.files[0].id, replaced.id);
}

#[tokio::test]
async fn test_delete_collection_detaches_members() {
    let vault = setup_test_vault().await;
    vault
        .controller
        .create_collection(
            &admin(),
            CreateCollectionRequest {
                name: "Finance".to_string(),
                icon: None,
            },
        )
        .await;
    let budget = upload_ok(&vault, &alice(), "Budget.xlsx").await;
    vault
        .controller
        .add_file_to_collection(&CollectionRef::Id(1), &budget)
        .await;

    let outcome = vault
        .controller
        .delete_collection(&CollectionRef::from("FINANCE"))
        .await;
    let missing = vault
        .controller
        .delete_collection(&CollectionRef::from("Finance"))
        .await;

    assert_eq!(outcome.message, "Collection 'Finance' deleted successfully");
    assert_eq!(missing.message, "Collection 'Finance' not found");
    let active = vault.active().await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].collection_id, None);

    let next = vault
        .controller
        .create_collection(
            &admin(),
            CreateCollectionRequest {
                name: "Finance".to_string(),
                icon: None,
            },
        )
        .await;
    assert_eq!(next.payload.unwrap().id, 2);
}

#[tokio::test]
async fn test_add_to_collection_inserts_record_missing_from_active_set() {
    let vault = setup_test_vault().await;
    vault
        .controller
        .create_collection(
            &admin(),
            CreateCollectionRequest {
                name: "Finance".to_string(),
                icon: None,
            },
        )
        .await;
    let budget = upload_ok(&vault, &alice(), "Budget.xlsx").await;
    // Bytes stay; only the record leaves the store.
    vault
        .files()
        .remove(RecordSet::Active, |r| r.id == budget.id)
        .await
        .unwrap();

    let added = vault
        .controller
        .add_file_to_collection(&CollectionRef::Id(1), &budget)
        .await;
    let again = vault
        .controller
        .add_file_to_collection(&CollectionRef::Id(1), &budget)
        .await;

    assert!(added.success, "{}", added.message);
    assert_eq!(added.message, "File added to collection 'Finance'");
    assert!(again.success);
    let active = vault.active().await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, budget.id);
    assert_eq!(active[0].collection_id, Some(1));
    assert_eq!(again.payload.unwrap().files.len(), 1);
}

#[tokio::test]
async fn test_add_to_collection_rejects_record_without_bytes_or_with_taken_name() {
    let vault = setup_test_vault().await;
    vault
        .controller
        .create_collection(
            &admin(),
            CreateCollectionRequest {
                name: "Finance".to_string(),
                icon: None,
            },
        )
        .await;
    let notes = upload_ok(&vault, &alice(), "Notes.pdf").await;

    let mut ghost = notes.clone();
    ghost.id = uuid::Uuid::nil();
    ghost.filename = "Ghost".to_string();
    ghost.file_path = "Ghost_20240101_000000_000000.pdf".to_string();
    let no_bytes = vault
        .controller
        .add_file_to_collection(&CollectionRef::Id(1), &ghost)
        .await;

    let mut twin = notes.clone();
    twin.id = uuid::Uuid::nil();
    twin.file_path = "Notes_20240101_000000_000000.pdf".to_string();
    std::fs::write(vault.storage_root().join(&twin.file_path), b"x").unwrap();
    let taken = vault
        .controller
        .add_file_to_collection(&CollectionRef::Id(1), &twin)
        .await;

    assert_eq!(no_bytes.error_code, Some("NOT_FOUND"));
    assert_eq!(taken.error_code, Some("DUPLICATE_NAME"));
    let active = vault.active().await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].collection_id, None);
}

#[tokio::test]
async fn test_upload_into_missing_collection_writes_nothing() {
    let vault = setup_test_vault().await;
    let source = create_source(&vault, "Budget.xlsx", b"numbers");

    let outcome = vault
        .controller
        .upload(
            &alice(),
            UploadRequest::new(source).into_collection(CollectionRef::from("Nope")),
        )
        .await;

    assert_eq!(outcome.error_code, Some("NOT_FOUND"));
    assert!(vault.active().await.is_empty());
    assert!(physical_objects(vault.storage_root(), vault.config.recycle_dir()).is_empty());
}

#[tokio::test]
async fn test_edit_and_approval() {
    let vault = setup_test_vault().await;
    upload_ok(&vault, &alice(), "Notes.pdf").await;

    let denied = vault
        .controller
        .edit_file(
            &bob(),
            "Notes",
            None,
            FileEdit {
                description: Some("mine now".to_string()),
            },
        )
        .await;
    assert_eq!(denied.error_code, Some("NOT_FOUND"));

    let edited = vault
        .controller
        .edit_file(
            &alice(),
            "Notes",
            None,
            FileEdit {
                description: Some("week 1".to_string()),
            },
        )
        .await;
    assert_eq!(edited.payload.unwrap().description.as_deref(), Some("week 1"));

    let not_admin = vault
        .controller
        .set_approval_status(&alice(), "Notes", ApprovalStatus::Accepted)
        .await;
    assert_eq!(not_admin.error_code, Some("FORBIDDEN"));

    let approved = vault
        .controller
        .set_approval_status(&admin(), "Notes", ApprovalStatus::Accepted)
        .await;
    assert_eq!(approved.message, "File 'Notes' marked as accepted");
    assert_eq!(
        vault.active().await[0].approval_status,
        ApprovalStatus::Accepted
    );
}

#[tokio::test]
async fn test_file_details_and_permissions() {
    let vault = setup_test_vault().await;
    let notes = upload_ok(&vault, &alice(), "Notes.pdf").await;

    let details = vault
        .controller
        .get_file_details(&admin(), "Notes", Some(&notes.timestamp))
        .await
        .unwrap();

    assert_eq!(details.id, notes.id);
    assert!(vault.controller.can_edit(&alice(), &details));
    assert!(vault.controller.can_delete(&admin(), &details));
    assert!(!vault.controller.can_delete(&bob(), &details));
}

#[tokio::test]
async fn test_storage_summary() {
    let vault = setup_test_vault_with(|c| {
        c.with_cleanup_on_start(false)
            .with_storage_quota_bytes(Some(1_000))
    })
    .await;
    let source = create_source(&vault, "Minutes.pdf", &[0u8; 100]);
    vault
        .controller
        .upload(&alice(), UploadRequest::new(source).in_category("Meetings"))
        .await;
    let source = create_source(&vault, "Notes.pdf", &[0u8; 50]);
    vault
        .controller
        .upload(&alice(), UploadRequest::new(source))
        .await;
    let source = create_source(&vault, "Old.pdf", &[0u8; 25]);
    vault
        .controller
        .upload(&alice(), UploadRequest::new(source))
        .await;
    vault.controller.delete_file(&alice(), "Old", None).await;

    let summary = vault.controller.storage_summary().await.unwrap();

    assert_eq!(summary.active_files, 2);
    assert_eq!(summary.deleted_files, 1);
    assert_eq!(summary.used_bytes, 150);
    assert_eq!(summary.recycle_bytes, 25);
    assert_eq!(summary.categories[0].category.as_deref(), Some("Meetings"));
    assert_eq!(summary.free_bytes, Some(825));
}
