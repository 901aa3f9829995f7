//! Create, read, update and delete tests.
//!
//! Tests file and directory operations against the mock gatekeeper:
//! - Directory creation through the marker upload
//! - Local file creation and first upload
//! - Range reads clamped to the recorded size
//! - Writes and truncation with parent re-listing
//! - Deletion and the share-root depth guard

mod common;

use bytes::Bytes;
use common::TestProvider;
use hapifs_provider::{ErrorCode, GatewayError, OpenMode};

// ============================================================================
// Directories
// ============================================================================

#[tokio::test]
async fn test_create_directory_uploads_and_removes_marker() {
    let provider = TestProvider::logged_in().await;
    provider.list("/shares/Finance").await;
    provider.gateway.clear_calls();

    provider
        .adapter
        .create_directory("/shares/Finance/Archive")
        .await
        .unwrap();

    assert_eq!(
        provider.gateway.calls(),
        vec![
            "write share \\\\srv\\Finance\\Archive hapi.txt @0 +0",
            "delete share \\\\srv\\Finance\\Archive\\hapi.txt",
        ]
    );
    assert!(provider.gateway.exists("share", "\\\\srv\\Finance\\Archive"));
    assert!(!provider
        .gateway
        .exists("share", "\\\\srv\\Finance\\Archive\\hapi.txt"));

    let entry = provider
        .adapter
        .cache()
        .get("/shares/Finance/Archive")
        .unwrap();
    assert!(entry.is_directory);
    assert_eq!(entry.size, 0);
    assert_eq!(
        entry.file_identifier.as_deref(),
        Some("\\\\srv\\Finance\\Archive")
    );
    assert_eq!(provider.list("/shares/Finance/Archive").await, Vec::<String>::new());
}

#[tokio::test]
async fn test_create_directory_under_agent_keeps_prefix() {
    let provider = TestProvider::logged_in().await;
    provider.list("/computers/LAPTOP/home").await;

    provider
        .adapter
        .create_directory("/computers/LAPTOP/home/projects")
        .await
        .unwrap();

    let entry = provider
        .adapter
        .cache()
        .get("/computers/LAPTOP/home/projects")
        .unwrap();
    assert_eq!(
        entry.file_identifier.as_deref(),
        Some("agent7:/home/projects")
    );
    assert!(provider.gateway.exists("agent/7/share", "/home/projects"));
}

#[tokio::test]
async fn test_create_existing_directory_is_exists() {
    let provider = TestProvider::logged_in().await;
    provider.list("/shares/Finance").await;
    provider.gateway.clear_calls();

    let err = provider
        .adapter
        .create_directory("/shares/Finance/Reports")
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::Exists);
    assert!(provider.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_create_directory_needs_resolved_parent() {
    let provider = TestProvider::logged_in().await;

    let err = provider
        .adapter
        .create_directory("/shares/Finance/Archive")
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::Failed);
}

#[tokio::test]
async fn test_create_directory_forbidden() {
    let provider = TestProvider::logged_in().await;
    provider.list("/shares/Finance").await;
    provider.gateway.fail_next(1, GatewayError::Status(403));

    let err = provider
        .adapter
        .create_directory("/shares/Finance/Archive")
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::AccessDenied);
    assert!(!provider.adapter.cache().contains("/shares/Finance/Archive"));
}

// ============================================================================
// Files
// ============================================================================

#[tokio::test]
async fn test_create_file_is_local_and_pending() {
    let provider = TestProvider::logged_in().await;
    provider.list("/shares/Finance").await;
    provider.gateway.clear_calls();

    provider.adapter.create_file("/shares/Finance/new.txt").unwrap();

    let entry = provider.adapter.cache().get("/shares/Finance/new.txt").unwrap();
    assert!(entry.pending_create);
    assert!(!entry.is_directory);
    assert_eq!(entry.size, 0);
    assert!(entry.file_identifier.is_none());
    assert!(provider.gateway.calls().is_empty());

    let err = provider
        .adapter
        .create_file("/shares/Finance/new.txt")
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Exists);
}

#[tokio::test]
async fn test_create_file_needs_cached_parent() {
    let provider = TestProvider::logged_in().await;

    let err = provider
        .adapter
        .create_file("/shares/Finance/new.txt")
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::Failed);
}

#[tokio::test]
async fn test_write_new_file_uploads_and_refreshes() {
    let provider = TestProvider::logged_in().await;
    provider.list("/shares/Finance").await;
    provider.adapter.create_file("/shares/Finance/new.txt").unwrap();
    let handle = provider.open("/shares/Finance/new.txt", OpenMode::Write);

    provider
        .adapter
        .write_file(handle, 0, Bytes::from_static(b"fresh data"))
        .await
        .unwrap();

    assert_eq!(
        provider
            .gateway
            .content("share", "\\\\srv\\Finance\\new.txt")
            .unwrap(),
        b"fresh data"
    );
    let entry = provider.adapter.cache().get("/shares/Finance/new.txt").unwrap();
    assert!(!entry.pending_create);
    assert_eq!(entry.size, 10);
    assert_eq!(
        entry.file_identifier.as_deref(),
        Some("\\\\srv\\Finance\\new.txt")
    );

    // The open session sees the new size.
    let data = provider.adapter.read_file(handle, 0, 100).await.unwrap();
    assert_eq!(&data[..], b"fresh data");
}

#[tokio::test]
async fn test_write_at_offset() {
    let provider = TestProvider::logged_in().await;
    provider.list("/shares/Finance").await;
    let handle = provider.open("/shares/Finance/budget.txt", OpenMode::Write);
    provider.gateway.clear_calls();

    provider
        .adapter
        .write_file(handle, 6, Bytes::from_static(b"there"))
        .await
        .unwrap();

    assert_eq!(
        provider.gateway.calls(),
        vec![
            "write share \\\\srv\\Finance budget.txt @6 +5",
            "list share \\\\srv\\Finance",
        ]
    );
    assert_eq!(
        provider
            .gateway
            .content("share", "\\\\srv\\Finance\\budget.txt")
            .unwrap(),
        b"hello there"
    );
}

#[tokio::test]
async fn test_write_on_read_handle_is_denied() {
    let provider = TestProvider::logged_in().await;
    provider.list("/shares/Finance").await;
    let handle = provider.open("/shares/Finance/budget.txt", OpenMode::Read);

    let err = provider
        .adapter
        .write_file(handle, 0, Bytes::from_static(b"x"))
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::AccessDenied);
}

#[tokio::test]
async fn test_write_upload_failure_is_failed() {
    let provider = TestProvider::logged_in().await;
    provider.list("/shares/Finance").await;
    let handle = provider.open("/shares/Finance/budget.txt", OpenMode::Write);
    provider.gateway.fail_always(GatewayError::Status(500));
    provider.gateway.reject_logins(true);

    let err = provider
        .adapter
        .write_file(handle, 0, Bytes::from_static(b"x"))
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::Failed);
}

#[tokio::test]
async fn test_truncate_resizes_and_refreshes() {
    let provider = TestProvider::logged_in().await;
    provider.list("/shares/Finance").await;
    provider.gateway.clear_calls();

    provider
        .adapter
        .truncate("/shares/Finance/budget.txt", 5)
        .await
        .unwrap();

    assert_eq!(
        provider.gateway.calls(),
        vec![
            "truncate share \\\\srv\\Finance budget.txt 5",
            "list share \\\\srv\\Finance",
        ]
    );
    assert_eq!(
        provider.adapter.cache().get("/shares/Finance/budget.txt").unwrap().size,
        5
    );
}

#[tokio::test]
async fn test_truncate_share_root_is_denied() {
    let provider = TestProvider::logged_in().await;
    provider.list("/shares").await;

    let err = provider
        .adapter
        .truncate("/shares/Finance", 0)
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::AccessDenied);
}

// ============================================================================
// Reads
// ============================================================================

#[tokio::test]
async fn test_read_clamps_to_size() {
    let provider = TestProvider::logged_in().await;
    provider.list("/shares/Finance").await;
    let handle = provider.open("/shares/Finance/budget.txt", OpenMode::Read);
    provider.gateway.clear_calls();

    let data = provider.adapter.read_file(handle, 6, 100).await.unwrap();

    assert_eq!(&data[..], b"world");
    assert_eq!(
        provider.gateway.calls(),
        vec!["read share \\\\srv\\Finance\\budget.txt 6..11"]
    );
}

#[tokio::test]
async fn test_read_past_end_skips_gateway() {
    let provider = TestProvider::logged_in().await;
    provider.list("/shares/Finance").await;
    let handle = provider.open("/shares/Finance/budget.txt", OpenMode::Read);
    provider.gateway.clear_calls();

    let data = provider.adapter.read_file(handle, 11, 4).await.unwrap();
    assert!(data.is_empty());
    let data = provider.adapter.read_file(handle, 500, 4).await.unwrap();
    assert!(data.is_empty());

    assert!(provider.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_read_from_agent() {
    let provider = TestProvider::logged_in().await;
    provider.list("/computers/LAPTOP/home").await;
    let handle = provider.open("/computers/LAPTOP/home/notes.txt", OpenMode::Read);

    let data = provider.adapter.read_file(handle, 0, 8).await.unwrap();

    assert_eq!(&data[..], b"remember");
    assert_eq!(
        provider.gateway.calls_matching("read"),
        vec!["read agent/7/share /home/notes.txt 0..8"]
    );
}

#[tokio::test]
async fn test_read_unknown_handle_is_not_found() {
    let provider = TestProvider::logged_in().await;

    let err = provider.adapter.read_file(42, 0, 1).await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::NotFound);
}

// ============================================================================
// Open and close
// ============================================================================

#[tokio::test]
async fn test_open_is_exclusive_per_path() {
    let provider = TestProvider::logged_in().await;
    provider.list("/shares/Finance").await;

    let first = provider.open("/shares/Finance/budget.txt", OpenMode::Read);
    let err = provider
        .adapter
        .open_file(99, "/shares/Finance/budget.txt", OpenMode::Read)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InUse);
    assert_eq!(provider.adapter.open_file_count(), 1);

    provider.adapter.close_file(first);
    provider
        .adapter
        .open_file(100, "/shares/Finance/budget.txt", OpenMode::Read)
        .unwrap();
}

#[tokio::test]
async fn test_open_uncached_is_not_found() {
    let provider = TestProvider::logged_in().await;

    let err = provider
        .adapter
        .open_file(1, "/shares/Finance/budget.txt", OpenMode::Read)
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn test_close_unknown_handle_is_ignored() {
    let provider = TestProvider::logged_in().await;

    provider.adapter.close_file(12345);

    assert_eq!(provider.adapter.open_file_count(), 0);
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_file() {
    let provider = TestProvider::logged_in().await;
    provider.list("/shares/Finance").await;

    provider
        .adapter
        .delete_entry("/shares/Finance/budget.txt")
        .await
        .unwrap();

    assert!(!provider.gateway.exists("share", "\\\\srv\\Finance\\budget.txt"));
    assert!(!provider.adapter.cache().contains("/shares/Finance/budget.txt"));
}

#[tokio::test]
async fn test_delete_directory_drops_cached_subtree() {
    let provider = TestProvider::logged_in().await;
    provider.list("/shares/Finance/Reports").await;

    provider
        .adapter
        .delete_entry("/shares/Finance/Reports")
        .await
        .unwrap();

    let cache = provider.adapter.cache();
    assert!(!cache.contains("/shares/Finance/Reports"));
    assert!(!cache.contains("/shares/Finance/Reports/q1.xlsx"));
    assert!(cache.contains("/shares/Finance/budget.txt"));
}

#[tokio::test]
async fn test_delete_share_root_is_denied() {
    let provider = TestProvider::logged_in().await;
    provider.list("/shares").await;
    provider.gateway.clear_calls();

    let err = provider
        .adapter
        .delete_entry("/shares/Finance")
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::AccessDenied);
    assert!(provider.gateway.calls().is_empty());
    assert!(provider.adapter.cache().contains("/shares/Finance"));
}

#[tokio::test]
async fn test_delete_deep_path_is_permitted() {
    let provider = TestProvider::logged_in().await;
    provider.list("/shares/Finance/Reports").await;

    provider
        .adapter
        .delete_entry("/shares/Finance/Reports/q1.xlsx")
        .await
        .unwrap();

    assert_eq!(
        provider.gateway.calls_matching("delete"),
        vec!["delete share \\\\srv\\Finance\\Reports\\q1.xlsx"]
    );
}

#[tokio::test]
async fn test_delete_pending_file_stays_local() {
    let provider = TestProvider::logged_in().await;
    provider.list("/shares/Finance").await;
    provider.adapter.create_file("/shares/Finance/draft.txt").unwrap();
    provider.gateway.clear_calls();

    provider
        .adapter
        .delete_entry("/shares/Finance/draft.txt")
        .await
        .unwrap();

    assert!(provider.gateway.calls().is_empty());
    assert!(!provider.adapter.cache().contains("/shares/Finance/draft.txt"));
}

#[tokio::test]
async fn test_delete_uncached_is_not_found() {
    let provider = TestProvider::logged_in().await;

    let err = provider
        .adapter
        .delete_entry("/shares/Finance/budget.txt")
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::NotFound);
}
