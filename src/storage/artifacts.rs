//! SQLite-backed artifact store. A bundle's model, scaler and column schema are written in one
//! transaction together with the `current` pointer, so readers never see a partial bundle.

use crate::error::{Result, SentinelError};
use crate::features::EmbeddingSpec;
use crate::model::{BundleHeader, IsolationForest, ModelBundle, ScalerState};
use crate::schema::ColumnSchema;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

pub const MODEL_ARTIFACT: &str = "model";
pub const SCALER_ARTIFACT: &str = "scaler";
pub const SCHEMA_ARTIFACT: &str = "column_schema";

/// Bumped when the payload encoding changes
const FORMAT_VERSION: i64 = 1;
const CURRENT_KEY: &str = "current";

#[derive(Serialize)]
struct ModelPayloadRef<'a> {
    forest: &'a IsolationForest,
    embedding: &'a EmbeddingSpec,
}

#[derive(Deserialize)]
struct ModelPayload {
    forest: IsolationForest,
    embedding: EmbeddingSpec,
}

fn digest(payload: &str) -> String {
    let mut h = Sha256::new();
    h.update(payload.as_bytes());
    format!("{:x}", h.finalize())
}

pub struct ArtifactStore {
    conn: Mutex<Connection>,
}

impl ArtifactStore {
    /// Open or create the store at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    /// Store that lives only as long as the value, for tests and dry runs
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS bundles (
                id TEXT PRIMARY KEY,
                created_at INTEGER NOT NULL,
                n_columns INTEGER NOT NULL,
                schema_fingerprint TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS artifacts (
                bundle_id TEXT NOT NULL REFERENCES bundles(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                version INTEGER NOT NULL,
                payload TEXT NOT NULL,
                digest TEXT NOT NULL,
                PRIMARY KEY (bundle_id, name)
            );
            CREATE TABLE IF NOT EXISTS meta (k TEXT PRIMARY KEY, v TEXT);
            PRAGMA foreign_keys = ON;
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // a panic mid-transaction rolls the transaction back, so the connection stays usable
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Persist all three artifacts and make the bundle current, atomically
    pub fn save(&self, bundle: &ModelBundle) -> Result<()> {
        let model = serde_json::to_string(&ModelPayloadRef {
            forest: bundle.forest(),
            embedding: bundle.embedding(),
        })?;
        let scaler = serde_json::to_string(bundle.scaler())?;
        let schema = serde_json::to_string(bundle.schema())?;
        let header = bundle.header();
        let id = header.id.to_string();

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO bundles (id, created_at, n_columns, schema_fingerprint) VALUES (?1, ?2, ?3, ?4)",
            params![
                id,
                header.created_at.timestamp_millis(),
                header.n_columns as i64,
                header.schema_fingerprint
            ],
        )?;
        for (name, payload) in [
            (MODEL_ARTIFACT, &model),
            (SCALER_ARTIFACT, &scaler),
            (SCHEMA_ARTIFACT, &schema),
        ] {
            tx.execute(
                "INSERT INTO artifacts (bundle_id, name, version, payload, digest) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, name, FORMAT_VERSION, payload, digest(payload)],
            )?;
        }
        tx.execute(
            "INSERT OR REPLACE INTO meta (k, v) VALUES (?1, ?2)",
            params![CURRENT_KEY, id],
        )?;
        tx.commit()?;

        tracing::info!(bundle_id = %id, columns = header.n_columns, "artifacts saved");
        Ok(())
    }

    /// Id of the bundle `load_current` would return
    pub fn current_id(&self) -> Result<Option<Uuid>> {
        let conn = self.conn();
        let v: Option<String> = conn
            .query_row(
                "SELECT v FROM meta WHERE k = ?1",
                params![CURRENT_KEY],
                |row| row.get(0),
            )
            .optional()?;
        v.map(|s| {
            Uuid::parse_str(&s).map_err(|e| {
                SentinelError::ArtifactInconsistent(format!("bad current bundle id {:?}: {}", s, e))
            })
        })
        .transpose()
    }

    /// Load the current bundle; fails if any artifact is missing or the three disagree
    pub fn load_current(&self) -> Result<ModelBundle> {
        let id = self
            .current_id()?
            .ok_or_else(|| SentinelError::ArtifactMissing("no trained bundle in store".to_string()))?;
        self.load(id)
    }

    pub fn load(&self, id: Uuid) -> Result<ModelBundle> {
        let conn = self.conn();
        let key = id.to_string();

        let header: Option<(i64, i64, String)> = conn
            .query_row(
                "SELECT created_at, n_columns, schema_fingerprint FROM bundles WHERE id = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let (created_ms, n_columns, fingerprint) =
            header.ok_or_else(|| SentinelError::ArtifactMissing(format!("bundle {}", id)))?;

        let read = |name: &str| -> Result<String> {
            let row: Option<(i64, String, String)> = conn
                .query_row(
                    "SELECT version, payload, digest FROM artifacts WHERE bundle_id = ?1 AND name = ?2",
                    params![key, name],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;
            let (version, payload, expected) = row.ok_or_else(|| {
                SentinelError::ArtifactMissing(format!("{} for bundle {}", name, id))
            })?;
            if version != FORMAT_VERSION {
                return Err(SentinelError::ArtifactInconsistent(format!(
                    "{} has format version {}, expected {}",
                    name, version, FORMAT_VERSION
                )));
            }
            if digest(&payload) != expected {
                return Err(SentinelError::ArtifactInconsistent(format!(
                    "{} digest mismatch",
                    name
                )));
            }
            Ok(payload)
        };

        let model: ModelPayload = serde_json::from_str(&read(MODEL_ARTIFACT)?)?;
        let scaler: ScalerState = serde_json::from_str(&read(SCALER_ARTIFACT)?)?;
        let schema: ColumnSchema = serde_json::from_str(&read(SCHEMA_ARTIFACT)?)?;

        if schema.len() as i64 != n_columns || schema.fingerprint() != fingerprint {
            return Err(SentinelError::ArtifactInconsistent(format!(
                "column schema of bundle {} does not match its header",
                id
            )));
        }

        let created_at = Utc
            .timestamp_millis_opt(created_ms)
            .single()
            .ok_or_else(|| {
                SentinelError::ArtifactInconsistent(format!("bad timestamp {}", created_ms))
            })?;

        let bundle =
            ModelBundle::from_parts(id, created_at, schema, scaler, model.forest, model.embedding)?;
        tracing::info!(bundle_id = %id, columns = n_columns, "artifacts loaded");
        Ok(bundle)
    }

    /// Stored bundle headers, newest first
    pub fn list_bundles(&self) -> Result<Vec<BundleHeader>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, created_at, n_columns, schema_fingerprint FROM bundles ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, created_ms, n_columns, schema_fingerprint) = row?;
            let id = Uuid::parse_str(&id).map_err(|e| {
                SentinelError::ArtifactInconsistent(format!("bad bundle id {:?}: {}", id, e))
            })?;
            let created_at: DateTime<Utc> = Utc
                .timestamp_millis_opt(created_ms)
                .single()
                .ok_or_else(|| {
                    SentinelError::ArtifactInconsistent(format!(
                        "bundle {} has bad timestamp {}",
                        id, created_ms
                    ))
                })?;
            out.push(BundleHeader {
                id,
                created_at,
                n_columns: n_columns as usize,
                schema_fingerprint,
            });
        }
        Ok(out)
    }

    /// Retention: delete every bundle except the current one. The pointer is read inside the
    /// deleting transaction, so a concurrent `save` cannot lose its bundle.
    pub fn prune_except_current(&self) -> Result<u64> {
        let mut conn = self.conn();
        // write lock up front: other connections to the file cannot move the pointer either
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current: Option<String> = tx
            .query_row(
                "SELECT v FROM meta WHERE k = ?1",
                params![CURRENT_KEY],
                |row| row.get(0),
            )
            .optional()?;
        let current = current.unwrap_or_default();
        tx.execute("DELETE FROM artifacts WHERE bundle_id <> ?1", params![current])?;
        let n = tx.execute("DELETE FROM bundles WHERE id <> ?1", params![current])?;
        tx.commit()?;
        if n > 0 {
            tracing::info!(pruned = n, current = %current, "old bundles pruned");
        }
        Ok(n as u64)
    }
}
