use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use super::RecordStore;
use crate::Result;
use crate::record::{InodeKey, InventoryRecord};

// Integers are stored bit-for-bit as i64, so inode numbers and device ids
// above i64::MAX survive the round trip.
const CREATE_TABLES_SQL: &str = "
    CREATE TABLE IF NOT EXISTS inode (
        inode          INTEGER NOT NULL,
        device         INTEGER NOT NULL,
        parent_inode   INTEGER,
        mode           INTEGER,
        uid            INTEGER,
        gid            INTEGER,
        size           INTEGER,
        mtime          REAL,
        scan_time      REAL    NOT NULL,
        basename       BLOB    NOT NULL,
        root_device    INTEGER NOT NULL,
        ancestor_inode INTEGER,
        PRIMARY KEY (device, inode, scan_time)
    ) WITHOUT ROWID;

    CREATE INDEX IF NOT EXISTS idx_inode_parent ON inode (device, parent_inode, scan_time);
";

const COLUMNS: &str = "inode, device, parent_inode, mode, uid, gid, size, mtime, \
                       scan_time, basename, root_device, ancestor_inode";

/// Record store backed by a SQLite database
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        debug!(path = %path.display(), "opened record store");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(CREATE_TABLES_SQL)?;
        Ok(Self { conn })
    }
}

fn to_sql(value: u64) -> i64 {
    value as i64
}

fn opt_to_sql<T: Into<u64>>(value: Option<T>) -> Option<i64> {
    value.map(|v| to_sql(v.into()))
}

fn from_sql(value: i64) -> u64 {
    value as u64
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<InventoryRecord> {
    let opt_u64 = |idx: usize| -> rusqlite::Result<Option<u64>> {
        Ok(row.get::<_, Option<i64>>(idx)?.map(from_sql))
    };
    let opt_u32 = |idx: usize| -> rusqlite::Result<Option<u32>> {
        Ok(row.get::<_, Option<i64>>(idx)?.map(|v| v as u32))
    };

    Ok(InventoryRecord {
        inode: from_sql(row.get(0)?),
        device: from_sql(row.get(1)?),
        parent_inode: opt_u64(2)?,
        mode: opt_u32(3)?,
        uid: opt_u32(4)?,
        gid: opt_u32(5)?,
        size: opt_u64(6)?,
        mtime: row.get(7)?,
        scan_time: row.get(8)?,
        basename: row.get(9)?,
        root_device: from_sql(row.get(10)?),
        ancestor_inode: opt_u64(11)?,
    })
}

impl RecordStore for SqliteStore {
    fn lookup(&self, key: InodeKey) -> Result<Option<InventoryRecord>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM inode WHERE device = ?1 AND inode = ?2
             ORDER BY scan_time DESC LIMIT 1"
        );
        let record = self
            .conn
            .query_row(
                &sql,
                params![to_sql(key.device), to_sql(key.inode)],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn record(&self, key: InodeKey, scan_time: f64) -> Result<Option<InventoryRecord>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM inode WHERE device = ?1 AND inode = ?2 AND scan_time = ?3"
        );
        let record = self
            .conn
            .query_row(
                &sql,
                params![to_sql(key.device), to_sql(key.inode), scan_time],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn children(&self, parent: &InventoryRecord) -> Result<Vec<InventoryRecord>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM inode
             WHERE device = ?1 AND parent_inode = ?2 AND scan_time = ?3"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(
            params![
                to_sql(parent.device),
                to_sql(parent.inode),
                parent.scan_time
            ],
            row_to_record,
        )?;
        let children = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(children)
    }

    fn insert(&mut self, records: &[InventoryRecord]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT OR IGNORE INTO inode ({COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ))?;
            for rec in records {
                stmt.execute(params![
                    to_sql(rec.inode),
                    to_sql(rec.device),
                    opt_to_sql(rec.parent_inode),
                    rec.mode,
                    rec.uid,
                    rec.gid,
                    opt_to_sql(rec.size),
                    rec.mtime,
                    rec.scan_time,
                    rec.basename,
                    to_sql(rec.root_device),
                    opt_to_sql(rec.ancestor_inode),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM inode", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
