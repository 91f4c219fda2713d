use super::*;
use crate::store::VectorStore;
use tempfile::TempDir;

#[tokio::test]
async fn save_then_load_round_trips() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let intake = DocumentIntake::open(temp_dir.path())
        .await
        .expect("can open intake");

    let document_id = intake
        .save(b"raw document bytes")
        .await
        .expect("save should succeed");

    let bytes = intake
        .load(&document_id)
        .await
        .expect("load should succeed");
    assert_eq!(bytes, b"raw document bytes");
}

#[tokio::test]
async fn each_save_gets_a_unique_id() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let intake = DocumentIntake::open(temp_dir.path())
        .await
        .expect("can open intake");

    let first = intake.save(b"one").await.expect("save should succeed");
    let second = intake.save(b"two").await.expect("save should succeed");

    assert_ne!(first, second);
    assert_eq!(intake.ids().await.expect("can list ids").len(), 2);
}

#[tokio::test]
async fn load_unknown_document_is_not_found() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let intake = DocumentIntake::open(temp_dir.path())
        .await
        .expect("can open intake");

    let err = intake.load("missing").await.expect_err("load should fail");
    assert!(matches!(err, RagError::NotFound(id) if id == "missing"));
}

#[tokio::test]
async fn delete_is_idempotent() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let intake = DocumentIntake::open(temp_dir.path())
        .await
        .expect("can open intake");

    let document_id = intake.save(b"bytes").await.expect("save should succeed");
    intake
        .delete(&document_id)
        .await
        .expect("delete should succeed");
    intake
        .delete(&document_id)
        .await
        .expect("repeated delete should succeed");

    assert!(matches!(
        intake.load(&document_id).await,
        Err(RagError::NotFound(_))
    ));
}

#[test]
fn plain_text_extractor_passes_utf8_through() {
    let extractor = PlainTextExtractor;
    let text = extractor
        .extract_text("héllo wörld".as_bytes())
        .expect("extraction should succeed");
    assert_eq!(text, "héllo wörld");
}

#[test]
fn plain_text_extractor_rejects_invalid_utf8() {
    let extractor = PlainTextExtractor;
    let err = extractor
        .extract_text(&[0xff, 0xfe, 0x00])
        .expect_err("extraction should fail");
    assert!(matches!(err, RagError::UnreadableDocument(_)));
}

#[tokio::test]
async fn registry_tracks_status_transitions() {
    let registry = StatusRegistry::new();

    assert_eq!(registry.get("doc-1").await, None);

    registry.set("doc-1", DocumentStatus::Uploaded).await;
    assert_eq!(registry.get("doc-1").await, Some(DocumentStatus::Uploaded));

    registry.set("doc-1", DocumentStatus::Indexing).await;
    registry
        .set("doc-1", DocumentStatus::Indexed { chunks: 7 })
        .await;
    assert_eq!(
        registry.get("doc-1").await,
        Some(DocumentStatus::Indexed { chunks: 7 })
    );

    registry.remove("doc-1").await;
    assert_eq!(registry.get("doc-1").await, None);
}

#[tokio::test]
async fn seeding_reflects_both_roots() {
    let uploads_dir = TempDir::new().expect("can create temp dir");
    let vectors_dir = TempDir::new().expect("can create temp dir");

    let intake = DocumentIntake::open(uploads_dir.path())
        .await
        .expect("can open intake");
    let store = VectorStore::open(vectors_dir.path())
        .await
        .expect("can open store");

    let uploaded_only = intake.save(b"pending").await.expect("save should succeed");
    let indexed = intake.save(b"done").await.expect("save should succeed");
    store
        .put(
            &indexed,
            &[
                ("part one".to_string(), vec![1.0, 0.0]),
                ("part two".to_string(), vec![0.0, 1.0]),
            ],
        )
        .await
        .expect("put should succeed");

    let registry = StatusRegistry::seed(&intake, &store)
        .await
        .expect("seed should succeed");

    assert_eq!(
        registry.get(&uploaded_only).await,
        Some(DocumentStatus::Uploaded)
    );
    assert_eq!(
        registry.get(&indexed).await,
        Some(DocumentStatus::Indexed { chunks: 2 })
    );
}
