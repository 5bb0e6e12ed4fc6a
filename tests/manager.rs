//! Content Manager Integration Tests
//!
//! Tests for document decoding and error pass-through.

use std::io::Cursor;
use std::sync::Arc;

use h5p_content::{
    ContentError, ContentId, ContentManager, ContentParameters, FileContentStorage,
    InMemoryContentStorage, Metadata, Permission, User,
};
use serde_json::json;
use tempfile::TempDir;

fn user() -> User {
    User::new("author", "Ada")
}

async fn create_demo(manager: &ContentManager) -> ContentId {
    let metadata: Metadata = serde_json::from_value(json!({
        "title": "Demo",
        "mainLibrary": "H5P.Text",
        "language": "de",
        "embedTypes": ["iframe"]
    }))
    .unwrap();

    manager
        .create_content(
            &metadata,
            &ContentParameters::new(json!({"text": "Hallo"})),
            &user(),
            None,
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_invalid_content_json_fails_without_mutation() {
    let storage = Arc::new(InMemoryContentStorage::new());
    let manager = ContentManager::new(storage.clone());
    let id = create_demo(&manager).await;
    manager
        .add_content_file(&id, "images/a.png", Box::new(Cursor::new(b"aaaa".to_vec())), None)
        .await
        .unwrap();
    manager
        .add_content_file(&id, "content.json", Box::new(Cursor::new(b"{\"text\": ".to_vec())), None)
        .await
        .unwrap();

    let err = manager.load_content(&id, &user()).await.unwrap_err();
    assert!(matches!(err, ContentError::Decode { .. }), "{:?}", err);

    // Storage is untouched by the failed decode
    assert!(manager.content_exists(&id).await.unwrap());
    assert_eq!(manager.list_content().await.unwrap(), vec![id.clone()]);
    assert_eq!(
        manager.get_content_files(&id, &user()).await.unwrap(),
        vec!["images/a.png"]
    );
    assert_eq!(
        manager.load_h5p_json(&id, &user()).await.unwrap().title(),
        Some("Demo")
    );
}

#[tokio::test]
async fn test_load_h5p_json_on_filesystem() {
    let temp = TempDir::new().unwrap();
    let manager = ContentManager::new(Arc::new(FileContentStorage::new(temp.path())));
    let id = create_demo(&manager).await;

    let metadata = manager.load_h5p_json(&id, &user()).await.unwrap();
    assert_eq!(metadata.title(), Some("Demo"));
    assert_eq!(metadata.main_library(), Some("H5P.Text"));
    assert_eq!(metadata.language(), Some("de"));
    assert_eq!(metadata.embed_types(), vec!["iframe"]);

    let parameters = manager.load_content(&id, &user()).await.unwrap();
    assert_eq!(parameters.as_value()["text"], "Hallo");
}

#[tokio::test]
async fn test_rewriting_metadata_file_updates_document() {
    let manager = ContentManager::new(Arc::new(InMemoryContentStorage::new()));
    let id = create_demo(&manager).await;

    manager
        .add_content_file(
            &id,
            "h5p.json",
            Box::new(Cursor::new(br#"{"title":"Renamed"}"#.to_vec())),
            Some(&user()),
        )
        .await
        .unwrap();

    let metadata = manager.load_h5p_json(&id, &user()).await.unwrap();
    assert_eq!(metadata.title(), Some("Renamed"));
}

#[tokio::test]
async fn test_permission_errors_pass_through_unchanged() {
    let storage = Arc::new(InMemoryContentStorage::new());
    let manager = ContentManager::new(storage.clone());
    let id = create_demo(&manager).await;

    let guest = User::new("guest", "Gus");
    storage.grant_content(&id, "guest", Default::default()).await;

    for result in [
        manager.load_content(&id, &guest).await.map(|_| ()),
        manager.load_h5p_json(&id, &guest).await.map(|_| ()),
        manager.get_content_files(&id, &guest).await.map(|_| ()),
        manager
            .get_content_file_stream(&id, "h5p.json", &guest)
            .await
            .map(|_| ()),
    ] {
        match result {
            Err(ContentError::PermissionDenied {
                content_id,
                user,
                permission,
            }) => {
                assert_eq!(content_id, id);
                assert_eq!(user, "guest");
                assert_eq!(permission, Permission::View);
            }
            other => panic!("expected PermissionDenied, got {:?}", other),
        }
    }

    assert!(manager.get_user_permissions(&id, &guest).await.unwrap().is_empty());
    assert_eq!(manager.get_user_permissions(&id, &user()).await.unwrap(), Permission::all());
}

#[tokio::test]
async fn test_not_found_errors_pass_through_unchanged() {
    let manager = ContentManager::new(Arc::new(InMemoryContentStorage::new()));
    let ghost = ContentId::new("ghost");

    assert!(matches!(
        manager.load_content(&ghost, &user()).await,
        Err(ContentError::ContentNotFound(_))
    ));
    assert!(matches!(
        manager.get_content_files(&ghost, &user()).await,
        Err(ContentError::ContentNotFound(_))
    ));
    assert!(matches!(
        manager.get_user_permissions(&ghost, &user()).await,
        Err(ContentError::ContentNotFound(_))
    ));

    let id = create_demo(&manager).await;
    let err = manager
        .get_content_file_stream(&id, "nope.png", &user())
        .await
        .err()
        .unwrap();
    match err {
        ContentError::FileNotFound { content_id, path } => {
            assert_eq!(content_id, id);
            assert_eq!(path, "nope.png");
        }
        other => panic!("expected FileNotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_created_ids_are_distinct() {
    let manager = ContentManager::new(Arc::new(InMemoryContentStorage::new()));

    let allocated = manager.create_content_id().await.unwrap();
    let first = create_demo(&manager).await;
    let second = create_demo(&manager).await;

    assert_ne!(first, second);
    assert_ne!(allocated, first);
    assert_ne!(allocated, second);
    assert!(!manager.content_exists(&allocated).await.unwrap());
}
