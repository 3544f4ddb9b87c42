// modgraph-core/src/store/sqlite.rs
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use modgraph_common::error::{ModgraphError, Result};
use modgraph_common::model::{LatestUpdate, ModuleNode};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, trace};

use super::{GraphStore, NodeKey};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS modules (
    id            INTEGER PRIMARY KEY,
    name          TEXT NOT NULL,
    version       TEXT NOT NULL,
    org           TEXT,
    host          TEXT NOT NULL,
    published_at  TEXT,
    major         TEXT,
    minor         TEXT,
    patch         TEXT,
    label         TEXT,
    latest        TEXT,
    is_latest     INTEGER,
    latest_major  TEXT,
    latest_minor  TEXT,
    latest_patch  TEXT,
    latest_label  TEXT,
    UNIQUE (name, version)
);
CREATE INDEX IF NOT EXISTS modules_name ON modules (name);
CREATE TABLE IF NOT EXISTS depends_on (
    from_name     TEXT NOT NULL,
    from_version  TEXT NOT NULL,
    to_name       TEXT NOT NULL,
    to_version    TEXT NOT NULL,
    PRIMARY KEY (from_name, from_version, to_name, to_version)
);
CREATE INDEX IF NOT EXISTS depends_on_target ON depends_on (to_name, to_version);
";

const UPSERT_MODULE: &str = "
INSERT INTO modules (name, version, org, host, published_at, major, minor, patch, label)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
ON CONFLICT (name, version) DO UPDATE SET
    org = excluded.org,
    host = excluded.host,
    published_at = COALESCE(excluded.published_at, modules.published_at),
    major = excluded.major,
    minor = excluded.minor,
    patch = excluded.patch,
    label = excluded.label
";

// Dependency nodes never clobber what a processed module already recorded.
const INSERT_DEPENDENCY: &str = "
INSERT INTO modules (name, version, org, host, published_at, major, minor, patch, label)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
ON CONFLICT (name, version) DO NOTHING
";

const INSERT_EDGE: &str = "
INSERT INTO depends_on (from_name, from_version, to_name, to_version)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT DO NOTHING
";

const MARK_LATEST: &str = "
UPDATE modules SET
    latest = ?2,
    is_latest = (version = ?2),
    latest_major = ?3,
    latest_minor = ?4,
    latest_patch = ?5,
    latest_label = ?6
WHERE name = ?1
";

/// SQLite-backed [`GraphStore`]. Blocking rusqlite calls run on the blocking pool.
#[derive(Clone)]
pub struct SqliteGraphStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteGraphStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        debug!("Opening graph store at {}", path.display());
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| ModgraphError::Persistence("store connection poisoned".into()))?;
            op(&mut guard)
        })
        .await
        .map_err(|e| ModgraphError::Persistence(format!("store task failed: {e}")))?
    }

    /// Stored latest facts for one node: `(latest, is_latest)`.
    pub async fn latest_of(&self, name: &str, version: &str) -> Result<Option<(String, bool)>> {
        let (name, version) = (name.to_string(), version.to_string());
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT latest, is_latest FROM modules WHERE name = ?1 AND version = ?2",
                    params![name, version],
                    |row| {
                        Ok((
                            row.get::<_, Option<String>>(0)?,
                            row.get::<_, Option<bool>>(1)?,
                        ))
                    },
                )
                .optional()?;
            Ok(row.and_then(|(latest, is_latest)| latest.map(|l| (l, is_latest.unwrap_or(false)))))
        })
        .await
    }

    pub async fn node(&self, name: &str, version: &str) -> Result<Option<ModuleNode>> {
        let (name, version) = (name.to_string(), version.to_string());
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT name, version, published_at FROM modules WHERE name = ?1 AND version = ?2",
                    params![name, version],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, Option<String>>(2)?,
                        ))
                    },
                )
                .optional()?;
            Ok(row.map(|(name, version, published_at)| {
                let published_at = published_at
                    .and_then(|raw| chrono::DateTime::parse_from_rfc3339(&raw).ok())
                    .map(|dt| dt.with_timezone(&chrono::Utc));
                ModuleNode::new(name, version).with_published_at(published_at)
            }))
        })
        .await
    }
}

fn write_node(tx: &rusqlite::Transaction<'_>, sql: &str, node: &ModuleNode) -> Result<()> {
    let semver = node.semver.as_ref();
    tx.execute(
        sql,
        params![
            node.name,
            node.version,
            node.org,
            node.host,
            node.published_at.map(|t| t.to_rfc3339()),
            semver.map(|s| s.major.as_str()),
            semver.map(|s| s.minor.as_str()),
            semver.map(|s| s.patch.as_str()),
            semver.map(|s| s.label.as_str()),
        ],
    )?;
    Ok(())
}

fn collect_keys(conn: &Connection, sql: &str, name: &str, version: &str) -> Result<Vec<NodeKey>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![name, version], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut keys = Vec::new();
    for row in rows {
        keys.push(row?);
    }
    Ok(keys)
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn upsert_module(&self, module: ModuleNode, dependencies: Vec<ModuleNode>) -> Result<()> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            write_node(&tx, UPSERT_MODULE, &module)?;
            for dep in &dependencies {
                write_node(&tx, INSERT_DEPENDENCY, dep)?;
                tx.execute(
                    INSERT_EDGE,
                    params![module.name, module.version, dep.name, dep.version],
                )?;
            }
            tx.commit()?;
            trace!(
                "Stored {}@{} with {} dependencies",
                module.name,
                module.version,
                dependencies.len()
            );
            Ok(())
        })
        .await
    }

    async fn module_names(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT DISTINCT name FROM modules ORDER BY name")?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(names)
        })
        .await
    }

    async fn mark_latest(&self, updates: &[LatestUpdate]) -> Result<usize> {
        let updates = updates.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut touched = 0;
            {
                let mut stmt = tx.prepare(MARK_LATEST)?;
                for update in &updates {
                    touched += stmt.execute(params![
                        update.name,
                        update.latest,
                        update.semver.major,
                        update.semver.minor,
                        update.semver.patch,
                        update.semver.label,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(touched)
        })
        .await
    }

    async fn dependencies(&self, name: &str, version: &str) -> Result<Vec<NodeKey>> {
        let (name, version) = (name.to_string(), version.to_string());
        self.with_conn(move |conn| {
            collect_keys(
                conn,
                "SELECT to_name, to_version FROM depends_on
                 WHERE from_name = ?1 AND from_version = ?2
                 ORDER BY to_name, to_version",
                &name,
                &version,
            )
        })
        .await
    }

    async fn dependents(&self, name: &str, version: &str) -> Result<Vec<NodeKey>> {
        let (name, version) = (name.to_string(), version.to_string());
        self.with_conn(move |conn| {
            collect_keys(
                conn,
                "SELECT from_name, from_version FROM depends_on
                 WHERE to_name = ?1 AND to_version = ?2
                 ORDER BY from_name, from_version",
                &name,
                &version,
            )
        })
        .await
    }

    async fn counts(&self) -> Result<(usize, usize)> {
        self.with_conn(|conn| {
            let nodes: i64 = conn.query_row("SELECT COUNT(*) FROM modules", [], |r| r.get(0))?;
            let edges: i64 = conn.query_row("SELECT COUNT(*) FROM depends_on", [], |r| r.get(0))?;
            Ok((nodes as usize, edges as usize))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn node(name: &str, version: &str) -> ModuleNode {
        ModuleNode::new(name, version)
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        for _ in 0..2 {
            store
                .upsert_module(
                    node("example.com/a", "v1.0.0"),
                    vec![node("example.com/b", "v1.2.0"), node("example.com/c", "v0.1.0")],
                )
                .await
                .unwrap();
        }
        assert_eq!(store.counts().await.unwrap(), (3, 2));
        assert_eq!(
            store.dependencies("example.com/a", "v1.0.0").await.unwrap(),
            vec![
                ("example.com/b".to_string(), "v1.2.0".to_string()),
                ("example.com/c".to_string(), "v0.1.0".to_string()),
            ]
        );
        assert_eq!(
            store.dependents("example.com/b", "v1.2.0").await.unwrap(),
            vec![("example.com/a".to_string(), "v1.0.0".to_string())]
        );
    }

    #[tokio::test]
    async fn dependency_insert_keeps_existing_publish_time() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        let published = Utc.with_ymd_and_hms(2023, 12, 21, 11, 30, 0).unwrap();
        store
            .upsert_module(node("example.com/b", "v1.0.0").with_published_at(Some(published)), vec![])
            .await
            .unwrap();
        store
            .upsert_module(node("example.com/a", "v1.0.0"), vec![node("example.com/b", "v1.0.0")])
            .await
            .unwrap();

        let stored = store.node("example.com/b", "v1.0.0").await.unwrap().unwrap();
        assert_eq!(stored.published_at, Some(published));
    }

    #[tokio::test]
    async fn mark_latest_touches_every_version_of_a_name() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        store
            .upsert_module(
                node("example.com/a", "v1.0.0"),
                vec![node("example.com/b", "v1.0.0"), node("example.com/b", "v1.1.0")],
            )
            .await
            .unwrap();
        store
            .upsert_module(node("example.com/c", "v0.1.0"), vec![node("example.com/b", "v1.1.0")])
            .await
            .unwrap();

        let updates = vec![LatestUpdate::new("example.com/b", "v1.1.0").unwrap()];
        assert_eq!(store.mark_latest(&updates).await.unwrap(), 2);
        assert_eq!(
            store.latest_of("example.com/b", "v1.0.0").await.unwrap(),
            Some(("v1.1.0".to_string(), false))
        );
        assert_eq!(
            store.latest_of("example.com/b", "v1.1.0").await.unwrap(),
            Some(("v1.1.0".to_string(), true))
        );
        assert_eq!(store.latest_of("example.com/a", "v1.0.0").await.unwrap(), None);
    }

    #[tokio::test]
    async fn module_names_are_distinct_and_sorted() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        store
            .upsert_module(
                node("example.com/z", "v1.0.0"),
                vec![node("example.com/b", "v1.0.0"), node("example.com/b", "v2.0.0")],
            )
            .await
            .unwrap();
        assert_eq!(
            store.module_names().await.unwrap(),
            vec!["example.com/b".to_string(), "example.com/z".to_string()]
        );
    }

    #[tokio::test]
    async fn failed_batch_leaves_no_partial_writes() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        store
            .upsert_module(node("example.com/base", "v1.0.0"), vec![])
            .await
            .unwrap();
        store
            .with_conn(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER reject_poison BEFORE INSERT ON depends_on
                     WHEN NEW.to_name = 'example.com/poison'
                     BEGIN SELECT RAISE(ABORT, 'edge rejected'); END;",
                )?;
                Ok(())
            })
            .await
            .unwrap();

        // The module row, one dependency and its edge land before the poisoned edge fails.
        let err = store
            .upsert_module(
                node("example.com/a", "v1.0.0"),
                vec![node("example.com/b", "v1.0.0"), node("example.com/poison", "v1.0.0")],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ModgraphError::Persistence(_)));
        assert_eq!(store.counts().await.unwrap(), (1, 0));
        assert!(store.node("example.com/a", "v1.0.0").await.unwrap().is_none());
        assert!(store.node("example.com/b", "v1.0.0").await.unwrap().is_none());
        assert!(store.node("example.com/base", "v1.0.0").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn graph_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("graph.sqlite");
        {
            let store = SqliteGraphStore::open(&path).unwrap();
            store
                .upsert_module(node("example.com/a", "v1.0.0"), vec![node("example.com/b", "v1.0.0")])
                .await
                .unwrap();
        }
        let reopened = SqliteGraphStore::open(&path).unwrap();
        assert_eq!(reopened.counts().await.unwrap(), (2, 1));
    }
}
