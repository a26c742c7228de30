//! Scene store operations.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use scenewatch_models::{DetectionRecord, NewScene, Scene, SceneId, SceneUpdate};

use crate::error::{StoreError, StoreResult};
use crate::pool::ConnectionPool;

/// Default confidence threshold for class-filtered reads.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS scenes (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  timestamp TEXT NOT NULL,
  latitude REAL,
  longitude REAL,
  resolution TEXT,
  camera_id TEXT NOT NULL,
  media_path TEXT NOT NULL,
  processed INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS detections (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  scene_id INTEGER NOT NULL,
  class_label TEXT NOT NULL,
  confidence REAL NOT NULL,
  x_min REAL NOT NULL,
  y_min REAL NOT NULL,
  x_max REAL NOT NULL,
  y_max REAL NOT NULL,
  class_id INTEGER,
  FOREIGN KEY (scene_id) REFERENCES scenes (id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_scenes_timestamp ON scenes(timestamp);
CREATE INDEX IF NOT EXISTS idx_detections_class ON detections(class_label);
"#;

/// Handle to the scene database.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct SceneStore {
    pool: Arc<ConnectionPool>,
}

impl SceneStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let pool = ConnectionPool::open(path)?;
        let conn = pool.acquire()?;
        conn.execute_batch(SCHEMA)?;
        drop(conn);
        Ok(Self { pool })
    }

    /// Insert a new scene and return its id.
    ///
    /// Fails with [`StoreError::Validation`] when a required field is empty.
    pub async fn add_scene(&self, scene: NewScene) -> StoreResult<SceneId> {
        if scene.camera_id.trim().is_empty() {
            return Err(StoreError::validation("camera_id must not be empty"));
        }
        if scene.media_path.trim().is_empty() {
            return Err(StoreError::validation("media_path must not be empty"));
        }

        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT INTO scenes (timestamp, latitude, longitude, resolution, camera_id, media_path, processed)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)
                "#,
                params![
                    scene.timestamp.to_rfc3339(),
                    scene.latitude,
                    scene.longitude,
                    scene.resolution,
                    scene.camera_id,
                    scene.media_path,
                ],
            )?;
            let id = SceneId(conn.last_insert_rowid());
            debug!(scene_id = %id, camera_id = %scene.camera_id, "scene inserted");
            Ok(id)
        })
        .await
    }

    /// Point lookup of a scene.
    pub async fn get_scene(&self, scene_id: SceneId) -> StoreResult<Scene> {
        self.with_conn(move |conn| {
            conn.query_row(
                r#"
                SELECT id, timestamp, latitude, longitude, resolution, camera_id, media_path, processed
                FROM scenes WHERE id = ?1
                "#,
                params![scene_id.as_i64()],
                scene_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found(format!("scene {scene_id}")))
        })
        .await
    }

    /// Partially update a scene; unspecified fields are left untouched.
    pub async fn update_scene(&self, scene_id: SceneId, update: SceneUpdate) -> StoreResult<()> {
        self.with_conn(move |conn| {
            let mut clauses: Vec<&str> = Vec::new();
            let mut values: Vec<Value> = Vec::new();

            if let Some(latitude) = update.latitude {
                clauses.push("latitude = ?");
                values.push(Value::Real(latitude));
            }
            if let Some(longitude) = update.longitude {
                clauses.push("longitude = ?");
                values.push(Value::Real(longitude));
            }
            if let Some(resolution) = update.resolution {
                clauses.push("resolution = ?");
                values.push(Value::Text(resolution));
            }
            if let Some(media_path) = update.media_path {
                clauses.push("media_path = ?");
                values.push(Value::Text(media_path));
            }
            if let Some(processed) = update.processed {
                clauses.push("processed = ?");
                values.push(Value::Integer(processed as i64));
            }

            if clauses.is_empty() {
                // No-op update still reports a missing scene.
                let exists: Option<i64> = conn
                    .query_row(
                        "SELECT 1 FROM scenes WHERE id = ?1",
                        params![scene_id.as_i64()],
                        |row| row.get(0),
                    )
                    .optional()?;
                return exists
                    .map(|_| ())
                    .ok_or_else(|| StoreError::not_found(format!("scene {scene_id}")));
            }

            values.push(Value::Integer(scene_id.as_i64()));
            let sql = format!("UPDATE scenes SET {} WHERE id = ?", clauses.join(", "));
            let changed = conn.execute(&sql, rusqlite::params_from_iter(values))?;
            if changed == 0 {
                return Err(StoreError::not_found(format!("scene {scene_id}")));
            }
            Ok(())
        })
        .await
    }

    /// Bulk-insert detections for a scene in one transaction.
    ///
    /// All-or-nothing: every record is validated before any row is written,
    /// and the batch commits atomically.
    pub async fn add_detections(
        &self,
        scene_id: SceneId,
        detections: &[DetectionRecord],
    ) -> StoreResult<()> {
        for record in detections {
            record
                .validate()
                .map_err(|e| StoreError::validation(e.to_string()))?;
        }
        let detections = detections.to_vec();

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let exists: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM scenes WHERE id = ?1",
                    params![scene_id.as_i64()],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Err(StoreError::not_found(format!("scene {scene_id}")));
            }

            {
                let mut stmt = tx.prepare(
                    r#"
                    INSERT INTO detections (scene_id, class_label, confidence, x_min, y_min, x_max, y_max, class_id)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    "#,
                )?;
                for record in &detections {
                    stmt.execute(params![
                        scene_id.as_i64(),
                        record.class,
                        record.confidence as f64,
                        record.x_min as f64,
                        record.y_min as f64,
                        record.x_max as f64,
                        record.y_max as f64,
                        record.class_id,
                    ])?;
                }
            }
            tx.commit()?;
            debug!(scene_id = %scene_id, count = detections.len(), "detections inserted");
            Ok(())
        })
        .await
    }

    /// Read detections for a class label at or above a confidence threshold,
    /// ordered by insertion.
    pub async fn get_detections_by_class(
        &self,
        class_label: impl Into<String>,
        confidence_threshold: Option<f32>,
    ) -> StoreResult<Vec<DetectionRecord>> {
        let class_label = class_label.into();
        let threshold = confidence_threshold.unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD);

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT class_label, confidence, x_min, y_min, x_max, y_max, class_id
                FROM detections
                WHERE class_label = ?1 AND confidence >= ?2
                ORDER BY id ASC
                "#,
            )?;
            let rows = stmt.query_map(params![class_label, threshold as f64], detection_from_row)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
    }

    /// Count detections belonging to a scene.
    pub async fn count_detections(&self, scene_id: SceneId) -> StoreResult<u64> {
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM detections WHERE scene_id = ?1",
                params![scene_id.as_i64()],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    /// Delete a scene; its detections go with it via cascade.
    pub async fn delete_scene(&self, scene_id: SceneId) -> StoreResult<()> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "DELETE FROM scenes WHERE id = ?1",
                params![scene_id.as_i64()],
            )?;
            if changed == 0 {
                return Err(StoreError::not_found(format!("scene {scene_id}")));
            }
            Ok(())
        })
        .await
    }

    /// Read scenes whose timestamp falls within `[start, end]`.
    pub async fn get_scenes_by_time_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Scene>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, timestamp, latitude, longitude, resolution, camera_id, media_path, processed
                FROM scenes
                WHERE timestamp BETWEEN ?1 AND ?2
                ORDER BY timestamp ASC
                "#,
            )?;
            let rows = stmt.query_map(
                params![start.to_rfc3339(), end.to_rfc3339()],
                scene_from_row,
            )?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
    }

    /// Run `f` on a blocking worker holding one pooled connection.
    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let pool = Arc::clone(&self.pool);
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.acquire()?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Database(format!("storage worker failed: {e}")))?
    }
}

fn scene_from_row(row: &Row<'_>) -> rusqlite::Result<Scene> {
    let timestamp: String = row.get(1)?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?
        .with_timezone(&Utc);

    Ok(Scene {
        id: SceneId(row.get(0)?),
        timestamp,
        latitude: row.get(2)?,
        longitude: row.get(3)?,
        resolution: row.get(4)?,
        camera_id: row.get(5)?,
        media_path: row.get(6)?,
        processed: row.get::<_, i64>(7)? != 0,
    })
}

fn detection_from_row(row: &Row<'_>) -> rusqlite::Result<DetectionRecord> {
    Ok(DetectionRecord {
        class: row.get(0)?,
        confidence: row.get::<_, f64>(1)? as f32,
        x_min: row.get::<_, f64>(2)? as f32,
        y_min: row.get::<_, f64>(3)? as f32,
        x_max: row.get::<_, f64>(4)? as f32,
        y_max: row.get::<_, f64>(5)? as f32,
        class_id: row.get(6)?,
    })
}
