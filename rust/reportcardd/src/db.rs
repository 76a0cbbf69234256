use crate::store::{self, PushKeys, Store, StorePath};
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;

pub const DB_FILE: &str = "reportcard.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    // One row per scalar leaf of the document tree.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS nodes(
            path TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(
            serde_json::from_str(&s).with_context(|| format!("setting {} is invalid JSON", key))?,
        )),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

/// Document store persisted in the workspace database.
pub struct SqliteStore {
    conn: Connection,
    push_keys: PushKeys,
}

impl SqliteStore {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            conn: open_db(workspace)?,
            push_keys: PushKeys::default(),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn,
            push_keys: PushKeys::default(),
        })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn read_rows(&self, path: &StorePath) -> anyhow::Result<Vec<(String, String)>> {
        let p = path.as_str();
        let rows = if path.is_root() {
            let mut stmt = self.conn.prepare("SELECT path, value FROM nodes ORDER BY path")?;
            let rows = stmt
                .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        } else {
            // Descendants of "a/b" sort in ["a/b/", "a/b0"), '0' being the byte after '/'.
            let mut stmt = self.conn.prepare(
                "SELECT path, value FROM nodes
                 WHERE path = ?1 OR (path >= ?2 AND path < ?3)
                 ORDER BY path",
            )?;
            let rows = stmt
                .query_map((p, format!("{}/", p), format!("{}0", p)), |r| {
                    Ok((r.get(0)?, r.get(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        Ok(rows)
    }

    fn write_subtree(
        &self,
        tx: &rusqlite::Transaction<'_>,
        path: &StorePath,
        value: &Value,
    ) -> anyhow::Result<()> {
        let p = path.as_str();
        if path.is_root() {
            tx.execute("DELETE FROM nodes", [])?;
        } else {
            tx.execute(
                "DELETE FROM nodes WHERE path = ?1 OR (path >= ?2 AND path < ?3)",
                (p, format!("{}/", p), format!("{}0", p)),
            )?;
            // A scalar ancestor is replaced by the object that now contains this path.
            if !value.is_null() {
                for a in path.ancestors() {
                    tx.execute("DELETE FROM nodes WHERE path = ?", [&a])?;
                }
            }
        }
        let mut leaves = Vec::new();
        store::flatten(p, value, &mut leaves);
        for (leaf_path, leaf_value) in leaves {
            tx.execute(
                "INSERT INTO nodes(path, value) VALUES(?, ?)",
                (&leaf_path, &leaf_value),
            )?;
        }
        Ok(())
    }
}

impl Store for SqliteStore {
    fn get(&self, path: &StorePath) -> anyhow::Result<Option<Value>> {
        let rows = self
            .read_rows(path)
            .with_context(|| format!("read {}", path))?;
        store::rebuild(path.as_str(), &rows).with_context(|| format!("decode {}", path))
    }

    fn set(&mut self, path: &StorePath, value: &Value) -> anyhow::Result<()> {
        tracing::debug!(path = %path, "set");
        let tx = self.conn.unchecked_transaction()?;
        self.write_subtree(&tx, path, value)
            .with_context(|| format!("write {}", path))?;
        tx.commit().with_context(|| format!("commit {}", path))?;
        Ok(())
    }

    fn update(&mut self, path: &StorePath, fields: &Map<String, Value>) -> anyhow::Result<()> {
        tracing::debug!(path = %path, fields = fields.len(), "update");
        let tx = self.conn.unchecked_transaction()?;
        for (k, v) in fields {
            let child = path.child(k).map_err(|e| anyhow::anyhow!(e.to_string()))?;
            self.write_subtree(&tx, &child, v)
                .with_context(|| format!("write {}", child))?;
        }
        tx.commit().with_context(|| format!("commit {}", path))?;
        Ok(())
    }

    fn push(&mut self, path: &StorePath, value: &Value) -> anyhow::Result<String> {
        let key = self.push_keys.next_key();
        let child = path.child(&key).map_err(|e| anyhow::anyhow!(e.to_string()))?;
        self.set(&child, value)?;
        Ok(key)
    }
}
