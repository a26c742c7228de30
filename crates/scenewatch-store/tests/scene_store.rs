//! Scene store integration tests against a scratch database.

use chrono::{Duration, Utc};
use tempfile::TempDir;

use scenewatch_models::{DetectionRecord, NewScene, SceneUpdate, SourceKind};
use scenewatch_store::{SceneStore, StoreError};

fn open_store(dir: &TempDir) -> SceneStore {
    SceneStore::open(dir.path().join("scenes.db")).unwrap()
}

fn person_record() -> DetectionRecord {
    DetectionRecord::new("person", 0.95, 0.1, 0.2, 0.3, 0.4)
}

#[tokio::test]
async fn scene_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let meta = NewScene::new(SourceKind::ImageUpload, "uploads/cat.jpg")
        .with_resolution("640x480")
        .with_location(40.7128, -74.0060);
    let scene_id = store.add_scene(meta.clone()).await.unwrap();
    assert!(scene_id.as_i64() > 0);

    let scene = store.get_scene(scene_id).await.unwrap();
    assert_eq!(scene.id, scene_id);
    assert_eq!(scene.camera_id, meta.camera_id);
    assert_eq!(scene.media_path, meta.media_path);
    assert_eq!(scene.resolution, meta.resolution);
    assert_eq!(scene.latitude, meta.latitude);
    assert_eq!(scene.longitude, meta.longitude);
    assert_eq!(scene.timestamp, meta.timestamp);
    assert!(!scene.processed);
}

#[tokio::test]
async fn add_scene_rejects_empty_required_fields() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let mut meta = NewScene::new(SourceKind::Webcam, "webcam_stream_1");
    meta.camera_id = String::new();
    assert!(matches!(
        store.add_scene(meta).await,
        Err(StoreError::Validation(_))
    ));

    let meta = NewScene::new(SourceKind::Webcam, "   ");
    assert!(matches!(
        store.add_scene(meta).await,
        Err(StoreError::Validation(_))
    ));
}

#[tokio::test]
async fn get_scene_missing_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    assert!(matches!(
        store.get_scene(999.into()).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn update_scene_is_partial() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let scene_id = store
        .add_scene(NewScene::new(SourceKind::VideoUpload, "uploads/clip.mp4"))
        .await
        .unwrap();

    store
        .update_scene(scene_id, SceneUpdate::processed())
        .await
        .unwrap();

    let scene = store.get_scene(scene_id).await.unwrap();
    assert!(scene.processed);
    // Untouched fields survive the update.
    assert_eq!(scene.media_path, "uploads/clip.mp4");
    assert_eq!(scene.camera_id, "video_upload");

    // Empty update is a no-op but still validates existence.
    store
        .update_scene(scene_id, SceneUpdate::default())
        .await
        .unwrap();
    assert!(matches!(
        store.update_scene(999.into(), SceneUpdate::processed()).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn detections_round_trip_exact_record() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let scene_id = store
        .add_scene(NewScene::new(SourceKind::ImageUpload, "uploads/a.jpg"))
        .await
        .unwrap();
    store
        .add_detections(scene_id, &[person_record()])
        .await
        .unwrap();

    let found = store.get_detections_by_class("person", None).await.unwrap();
    assert_eq!(found, vec![person_record()]);
}

#[tokio::test]
async fn batch_insert_is_all_or_nothing() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let scene_id = store
        .add_scene(NewScene::new(SourceKind::VideoUpload, "uploads/clip.mp4"))
        .await
        .unwrap();

    let batch = vec![
        person_record(),
        // inverted box: must poison the whole batch
        DetectionRecord::new("car", 0.8, 10.0, 0.0, 5.0, 5.0),
    ];
    assert!(matches!(
        store.add_detections(scene_id, &batch).await,
        Err(StoreError::Validation(_))
    ));
    assert_eq!(store.count_detections(scene_id).await.unwrap(), 0);

    let batch = vec![
        person_record(),
        DetectionRecord::new("car", 1.5, 0.0, 0.0, 5.0, 5.0),
    ];
    assert!(matches!(
        store.add_detections(scene_id, &batch).await,
        Err(StoreError::Validation(_))
    ));
    assert_eq!(store.count_detections(scene_id).await.unwrap(), 0);
}

#[tokio::test]
async fn add_detections_to_missing_scene_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    assert!(matches!(
        store.add_detections(42.into(), &[person_record()]).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn filtered_read_is_ordered_and_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let scene_id = store
        .add_scene(NewScene::new(SourceKind::RtspStream, "rtsp://cam/live"))
        .await
        .unwrap();

    let records = vec![
        DetectionRecord::new("person", 0.9, 0.0, 0.0, 10.0, 10.0),
        DetectionRecord::new("person", 0.3, 1.0, 1.0, 11.0, 11.0),
        DetectionRecord::new("person", 0.7, 2.0, 2.0, 12.0, 12.0),
        DetectionRecord::new("dog", 0.99, 3.0, 3.0, 13.0, 13.0),
    ];
    store.add_detections(scene_id, &records).await.unwrap();

    // Default threshold 0.5 filters out the 0.3 record; order is insertion.
    let first = store.get_detections_by_class("person", None).await.unwrap();
    assert_eq!(first.len(), 2);
    assert!((first[0].confidence - 0.9).abs() < 1e-6);
    assert!((first[1].confidence - 0.7).abs() < 1e-6);

    let second = store.get_detections_by_class("person", None).await.unwrap();
    assert_eq!(first, second);

    let low = store
        .get_detections_by_class("person", Some(0.0))
        .await
        .unwrap();
    assert_eq!(low.len(), 3);
}

#[tokio::test]
async fn delete_scene_cascades_to_detections() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let scene_id = store
        .add_scene(NewScene::new(SourceKind::ImageUpload, "uploads/a.jpg"))
        .await
        .unwrap();
    let keeper_id = store
        .add_scene(NewScene::new(SourceKind::ImageUpload, "uploads/b.jpg"))
        .await
        .unwrap();

    store
        .add_detections(scene_id, &[person_record(), person_record()])
        .await
        .unwrap();
    store
        .add_detections(keeper_id, &[person_record()])
        .await
        .unwrap();

    store.delete_scene(scene_id).await.unwrap();

    assert!(matches!(
        store.get_scene(scene_id).await,
        Err(StoreError::NotFound(_))
    ));
    assert_eq!(store.count_detections(scene_id).await.unwrap(), 0);
    // Unrelated scene is untouched.
    assert_eq!(store.count_detections(keeper_id).await.unwrap(), 1);
    assert_eq!(
        store.get_detections_by_class("person", None).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn time_range_query_finds_scenes() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let scene_id = store
        .add_scene(NewScene::new(SourceKind::Webcam, "webcam_stream_x"))
        .await
        .unwrap();

    let now = Utc::now();
    let scenes = store
        .get_scenes_by_time_range(now - Duration::minutes(5), now + Duration::minutes(5))
        .await
        .unwrap();
    assert_eq!(scenes.len(), 1);
    assert_eq!(scenes[0].id, scene_id);

    let scenes = store
        .get_scenes_by_time_range(now + Duration::minutes(10), now + Duration::minutes(20))
        .await
        .unwrap();
    assert!(scenes.is_empty());
}

#[tokio::test]
async fn concurrent_writers_use_independent_connections() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let scene_id = store
                .add_scene(NewScene::new(
                    SourceKind::Webcam,
                    format!("webcam_stream_{i}"),
                ))
                .await?;
            store.add_detections(scene_id, &[person_record()]).await?;
            Ok::<_, StoreError>(scene_id)
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let found = store.get_detections_by_class("person", None).await.unwrap();
    assert_eq!(found.len(), 8);
}
