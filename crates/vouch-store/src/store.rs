use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};
use thiserror::Error;
use tracing::{debug, info};
use vouch_types::{BilateralBlock, BlockHash, PublicKey, UNLINKED_SEQUENCE};

/// Errors that can occur in block store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no block with requester hash {0}")]
    BlockNotFound(String),

    #[error("unsupported database version {0}")]
    UnsupportedVersion(i64),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
#[error("timestamp {0} out of range")]
struct TimestampError(i64);

/// Cap on how many blocks a single crawl query returns.
const CRAWL_LIMIT: usize = 100;

/// Bumped on schema changes; stored in the option table.
const DB_VERSION: i64 = 1;

const COLUMNS: &str = "public_key_requester, public_key_responder, up, down, \
     total_up_requester, total_down_requester, sequence_number_requester, \
     previous_hash_requester, signature_requester, hash_requester, \
     total_up_responder, total_down_responder, sequence_number_responder, \
     previous_hash_responder, signature_responder, hash_responder, insert_time";

/// Aggregate counters over the whole store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreStats {
    pub block_count: usize,
    pub unique_keys: usize,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

/// SQLite-backed archive of bilateral records.
///
/// One row per bilateral block, keyed by the requester-side content hash.
/// A record is inserted as soon as the requester side is known; the
/// responder columns carry sentinel values until
/// [`BlockStore::update_with_responder`] fills them in.
#[derive(Debug)]
pub struct BlockStore {
    conn: Connection,
}

impl BlockStore {
    /// Create or open a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening block store");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// An in-memory store, mainly for tests and experiments.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS multi_chain (
                public_key_requester        BLOB NOT NULL,
                public_key_responder        BLOB NOT NULL,
                up                          INTEGER NOT NULL,
                down                        INTEGER NOT NULL,
                total_up_requester          INTEGER NOT NULL,
                total_down_requester        INTEGER NOT NULL,
                sequence_number_requester   INTEGER NOT NULL,
                previous_hash_requester     BLOB NOT NULL,
                signature_requester         BLOB NOT NULL,
                hash_requester              BLOB NOT NULL PRIMARY KEY,
                total_up_responder          INTEGER NOT NULL,
                total_down_responder        INTEGER NOT NULL,
                sequence_number_responder   INTEGER NOT NULL,
                previous_hash_responder     BLOB NOT NULL,
                signature_responder         BLOB NOT NULL,
                hash_responder              BLOB NOT NULL,
                insert_time                 INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_requester
                ON multi_chain(public_key_requester, sequence_number_requester);
            CREATE INDEX IF NOT EXISTS idx_responder
                ON multi_chain(public_key_responder, sequence_number_responder);

            CREATE TABLE IF NOT EXISTS option (
                key     TEXT PRIMARY KEY,
                value   BLOB
            );
            "#,
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO option (key, value) VALUES ('database_version', ?1)",
            params![DB_VERSION],
        )?;
        let stored: i64 = conn.query_row(
            "SELECT value FROM option WHERE key = 'database_version'",
            [],
            |row| row.get(0),
        )?;
        if stored != DB_VERSION {
            return Err(StoreError::UnsupportedVersion(stored));
        }
        Ok(())
    }

    /// Insert a bilateral record.
    pub fn insert(&self, block: &BilateralBlock) -> Result<()> {
        self.conn.execute(
            &format!("INSERT INTO multi_chain ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"),
            params![
                block.public_key_requester.as_bytes().to_vec(),
                block.public_key_responder.as_bytes().to_vec(),
                block.up as i64,
                block.down as i64,
                block.total_up_requester as i64,
                block.total_down_requester as i64,
                block.sequence_number_requester,
                block.previous_hash_requester.as_bytes().to_vec(),
                block.signature_requester.clone(),
                block.hash_requester.as_bytes().to_vec(),
                block.total_up_responder as i64,
                block.total_down_responder as i64,
                block.sequence_number_responder,
                block.previous_hash_responder.as_bytes().to_vec(),
                block.signature_responder.clone(),
                block.hash_responder.as_bytes().to_vec(),
                block.insert_time.timestamp_millis(),
            ],
        )?;
        debug!(
            requester = %block.public_key_requester,
            responder = %block.public_key_responder,
            sequence = block.sequence_number_requester,
            "stored block"
        );
        Ok(())
    }

    /// Fill in the responder side of a previously half-signed record.
    ///
    /// The row is addressed by the requester-side hash; a missing row is an
    /// error since it means the two parties disagree about the exchange.
    pub fn update_with_responder(&self, block: &BilateralBlock) -> Result<()> {
        let updated = self.conn.execute(
            r#"
            UPDATE multi_chain SET
                total_up_responder = ?1,
                total_down_responder = ?2,
                sequence_number_responder = ?3,
                previous_hash_responder = ?4,
                signature_responder = ?5,
                hash_responder = ?6
            WHERE hash_requester = ?7
            "#,
            params![
                block.total_up_responder as i64,
                block.total_down_responder as i64,
                block.sequence_number_responder,
                block.previous_hash_responder.as_bytes().to_vec(),
                block.signature_responder.clone(),
                block.hash_responder.as_bytes().to_vec(),
                block.hash_requester.as_bytes().to_vec(),
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::BlockNotFound(block.hash_requester.to_hex()));
        }
        Ok(())
    }

    /// Every record in the store, oldest first.
    pub fn get_all(&self) -> Result<Vec<BilateralBlock>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM multi_chain ORDER BY insert_time ASC, rowid ASC"
        ))?;
        let blocks = stmt
            .query_map([], row_to_block)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(blocks)
    }

    /// Look up a record by the content hash of either side.
    pub fn get_by_hash(&self, hash: &BlockHash) -> Result<Option<BilateralBlock>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM multi_chain \
             WHERE hash_requester = ?1 OR hash_responder = ?1 \
             LIMIT 1"
        ))?;
        let block = stmt
            .query_row(params![hash.as_bytes().to_vec()], row_to_block)
            .optional()?;
        Ok(block)
    }

    pub fn contains(&self, hash: &BlockHash) -> Result<bool> {
        Ok(self.get_by_hash(hash)?.is_some())
    }

    /// Look up the record in which `identity` holds chain position `sequence`.
    pub fn get_by_key_and_sequence(
        &self,
        identity: &PublicKey,
        sequence: i64,
    ) -> Result<Option<BilateralBlock>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM multi_chain \
             WHERE (public_key_requester = ?1 AND sequence_number_requester = ?2) \
                OR (public_key_responder = ?1 AND sequence_number_responder = ?2) \
             LIMIT 1"
        ))?;
        let block = stmt
            .query_row(params![identity.as_bytes().to_vec(), sequence], row_to_block)
            .optional()?;
        Ok(block)
    }

    /// Records in which `identity` holds a chain position at or after
    /// `sequence`, in chain order, capped at a crawl batch.
    pub fn get_since(&self, identity: &PublicKey, sequence: i64) -> Result<Vec<BilateralBlock>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM ( \
                SELECT *, sequence_number_requester AS seq, \
                    public_key_requester AS side_key FROM multi_chain \
                UNION \
                SELECT *, sequence_number_responder AS seq, \
                    public_key_responder AS side_key FROM multi_chain \
             ) WHERE side_key = ?1 AND seq >= ?2 \
             ORDER BY seq ASC \
             LIMIT ?3"
        ))?;
        let blocks = stmt
            .query_map(
                params![identity.as_bytes().to_vec(), sequence, CRAWL_LIMIT as i64],
                row_to_block,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(blocks)
    }

    /// Highest chain position the store has seen for an identity, on either
    /// side of a record. Returns the unlinked sentinel when nothing is known.
    pub fn latest_sequence_number(&self, identity: &PublicKey) -> Result<i64> {
        let latest: Option<i64> = self.conn.query_row(
            r#"
            SELECT MAX(seq) FROM (
                SELECT sequence_number_requester AS seq FROM multi_chain
                    WHERE public_key_requester = ?1
                UNION ALL
                SELECT sequence_number_responder AS seq FROM multi_chain
                    WHERE public_key_responder = ?1
            )
            "#,
            params![identity.as_bytes().to_vec()],
            |row| row.get(0),
        )?;
        Ok(latest.unwrap_or(UNLINKED_SEQUENCE))
    }

    /// All identities appearing on either side of any record, sorted.
    pub fn unique_public_keys(&self) -> Result<Vec<PublicKey>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT DISTINCT key FROM (
                SELECT public_key_requester AS key FROM multi_chain
                UNION
                SELECT public_key_responder AS key FROM multi_chain
            ) ORDER BY key
            "#,
        )?;
        let keys = stmt
            .query_map([], |row| blob_key(row, 0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM multi_chain", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let (earliest, latest): (Option<i64>, Option<i64>) = self.conn.query_row(
            "SELECT MIN(insert_time), MAX(insert_time) FROM multi_chain",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(StoreStats {
            block_count: self.count()?,
            unique_keys: self.unique_public_keys()?.len(),
            earliest: earliest.and_then(DateTime::from_timestamp_millis),
            latest: latest.and_then(DateTime::from_timestamp_millis),
        })
    }
}

fn blob_key(row: &Row, idx: usize) -> rusqlite::Result<PublicKey> {
    let bytes: Vec<u8> = row.get(idx)?;
    PublicKey::from_slice(&bytes).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Blob, Box::new(e))
    })
}

fn blob_hash(row: &Row, idx: usize) -> rusqlite::Result<BlockHash> {
    let bytes: Vec<u8> = row.get(idx)?;
    BlockHash::from_slice(&bytes).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Blob, Box::new(e))
    })
}

fn row_to_block(row: &Row) -> rusqlite::Result<BilateralBlock> {
    let millis: i64 = row.get(16)?;
    let insert_time = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            16,
            rusqlite::types::Type::Integer,
            Box::new(TimestampError(millis)),
        )
    })?;
    Ok(BilateralBlock {
        public_key_requester: blob_key(row, 0)?,
        public_key_responder: blob_key(row, 1)?,
        up: row.get::<_, i64>(2)? as u64,
        down: row.get::<_, i64>(3)? as u64,
        total_up_requester: row.get::<_, i64>(4)? as u64,
        total_down_requester: row.get::<_, i64>(5)? as u64,
        sequence_number_requester: row.get(6)?,
        previous_hash_requester: blob_hash(row, 7)?,
        signature_requester: row.get(8)?,
        hash_requester: blob_hash(row, 9)?,
        total_up_responder: row.get::<_, i64>(10)? as u64,
        total_down_responder: row.get::<_, i64>(11)? as u64,
        sequence_number_responder: row.get(12)?,
        previous_hash_responder: blob_hash(row, 13)?,
        signature_responder: row.get(14)?,
        hash_responder: blob_hash(row, 15)?,
        insert_time,
    })
}
