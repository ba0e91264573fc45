//! Item store contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist attachment records keyed by id with raw BLOB payloads.
//! - Serve per-tab lookups through the `(subject_id, kind)` index.
//! - Delete by id list or by owning subject in one transaction each.
//!
//! # Invariants
//! - `add` is an upsert; an overwritten record keeps its insertion position.
//! - Tab listings are ordered `created_at DESC, seq ASC`.
//! - Deleting absent ids is not an error.
//! - Read paths reject invalid persisted rows instead of masking them.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::item::{Item, ItemContent, ItemId, ItemKind};
use crate::model::subject::SubjectId;
use log::debug;
use rusqlite::{params, Connection, Row, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

const ITEM_SELECT_SQL: &str = "SELECT
    id,
    subject_id,
    kind,
    created_at,
    text,
    title,
    name,
    mime_type,
    payload
FROM items";

const REQUIRED_COLUMNS: &[&str] = &[
    "seq",
    "id",
    "subject_id",
    "kind",
    "created_at",
    "text",
    "title",
    "name",
    "mime_type",
    "payload",
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Item store error.
#[derive(Debug)]
pub enum RepoError {
    /// The medium cannot be opened or written (disabled, full, read-only).
    StorageUnavailable(DbError),
    /// Any other SQLite failure.
    Db(DbError),
    /// Connection schema is not at the expected version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted row cannot be converted to a valid item.
    InvalidData(String),
}

impl RepoError {
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StorageUnavailable(err) => write!(f, "item storage unavailable: {err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "item store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "item store requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "item store requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted item data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StorageUnavailable(err) | Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        if value.is_storage_unavailable() {
            Self::StorageUnavailable(value)
        } else {
            Self::Db(value)
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::from(DbError::Sqlite(value))
    }
}

/// Keyed store of attachments.
pub trait ItemStore {
    /// Inserts or overwrites one item by id.
    fn add(&self, item: &Item) -> RepoResult<()>;
    /// Items of one subject tab, newest first.
    fn query_by_subject_and_kind(&self, subject_id: &str, kind: ItemKind)
        -> RepoResult<Vec<Item>>;
    /// Every item of one subject, any kind, unspecified order.
    fn query_by_subject(&self, subject_id: &str) -> RepoResult<Vec<Item>>;
    /// Deletes listed ids in one transaction; returns how many existed.
    fn delete_many(&mut self, ids: &[ItemId]) -> RepoResult<usize>;
    /// Deletes all items of one subject in one transaction.
    fn delete_by_subject(&mut self, subject_id: &str) -> RepoResult<usize>;
    /// Distinct subject ids that currently own at least one item.
    fn subject_ids(&self) -> RepoResult<Vec<SubjectId>>;
}

/// SQLite-backed item store.
pub struct SqliteItemStore<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteItemStore<'conn> {
    /// Wraps a connection returned by `db::open_db*`.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_item_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ItemStore for SqliteItemStore<'_> {
    fn add(&self, item: &Item) -> RepoResult<()> {
        let fields = ItemColumns::from_content(&item.content);
        self.conn.execute(
            "INSERT INTO items (
                id,
                subject_id,
                kind,
                created_at,
                text,
                title,
                name,
                mime_type,
                payload
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                subject_id = excluded.subject_id,
                kind = excluded.kind,
                created_at = excluded.created_at,
                text = excluded.text,
                title = excluded.title,
                name = excluded.name,
                mime_type = excluded.mime_type,
                payload = excluded.payload;",
            params![
                item.id.as_str(),
                item.subject_id.as_str(),
                item.kind().as_str(),
                item.created_at,
                fields.text,
                fields.title,
                fields.name,
                fields.mime_type,
                fields.payload,
            ],
        )?;
        Ok(())
    }

    fn query_by_subject_and_kind(
        &self,
        subject_id: &str,
        kind: ItemKind,
    ) -> RepoResult<Vec<Item>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ITEM_SELECT_SQL} INDEXED BY idx_items_subject_kind
             WHERE subject_id = ?1
               AND kind = ?2
             ORDER BY created_at DESC, seq ASC;"
        ))?;
        let mut rows = stmt.query(params![subject_id, kind.as_str()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }

    fn query_by_subject(&self, subject_id: &str) -> RepoResult<Vec<Item>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ITEM_SELECT_SQL} INDEXED BY idx_items_subject
             WHERE subject_id = ?1;"
        ))?;
        let mut rows = stmt.query([subject_id])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }

    fn delete_many(&mut self, ids: &[ItemId]) -> RepoResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM items WHERE id = ?1;")?;
            for id in ids {
                removed += stmt.execute([id.as_str()])?;
            }
        }
        tx.commit()?;

        debug!(
            "event=items_delete_many module=repo status=ok requested={} removed={}",
            ids.len(),
            removed
        );
        Ok(removed)
    }

    fn delete_by_subject(&mut self, subject_id: &str) -> RepoResult<usize> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let removed = tx.execute(
            "DELETE FROM items INDEXED BY idx_items_subject WHERE subject_id = ?1;",
            [subject_id],
        )?;
        tx.commit()?;

        debug!("event=items_delete_by_subject module=repo status=ok removed={removed}");
        Ok(removed)
    }

    fn subject_ids(&self) -> RepoResult<Vec<SubjectId>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT subject_id
             FROM items
             ORDER BY subject_id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(row.get(0)?);
        }
        Ok(ids)
    }
}

/// Flattened nullable columns for one content variant.
struct ItemColumns<'a> {
    text: Option<&'a str>,
    title: Option<&'a str>,
    name: Option<&'a str>,
    mime_type: Option<&'a str>,
    payload: Option<&'a [u8]>,
}

impl<'a> ItemColumns<'a> {
    fn from_content(content: &'a ItemContent) -> Self {
        match content {
            ItemContent::Note { text } => Self {
                text: Some(text),
                title: None,
                name: None,
                mime_type: None,
                payload: None,
            },
            ItemContent::File {
                title,
                name,
                mime_type,
                payload,
            } => Self {
                text: None,
                title: Some(title),
                name: Some(name),
                mime_type: Some(mime_type),
                payload: Some(payload),
            },
            ItemContent::Image {
                name,
                mime_type,
                payload,
            }
            | ItemContent::Audio {
                name,
                mime_type,
                payload,
            } => Self {
                text: None,
                title: None,
                name: Some(name),
                mime_type: Some(mime_type),
                payload: Some(payload),
            },
        }
    }
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<Item> {
    let id: String = row.get("id")?;
    let kind_text: String = row.get("kind")?;
    let kind = ItemKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid item kind `{kind_text}` in items.kind"))
    })?;

    let required = |column: &'static str| -> RepoResult<String> {
        row.get::<_, Option<String>>(column)?.ok_or_else(|| {
            RepoError::InvalidData(format!("item `{id}` of kind {kind} has null items.{column}"))
        })
    };
    let payload = || -> RepoResult<Vec<u8>> {
        row.get::<_, Option<Vec<u8>>>("payload")?.ok_or_else(|| {
            RepoError::InvalidData(format!("item `{id}` of kind {kind} has null items.payload"))
        })
    };
    let mime_type = || -> RepoResult<String> {
        Ok(row.get::<_, Option<String>>("mime_type")?.unwrap_or_default())
    };

    let content = match kind {
        ItemKind::Notes => ItemContent::Note {
            text: required("text")?,
        },
        ItemKind::Files => ItemContent::File {
            title: required("title")?,
            name: required("name")?,
            mime_type: mime_type()?,
            payload: payload()?,
        },
        ItemKind::Images => ItemContent::Image {
            name: required("name")?,
            mime_type: mime_type()?,
            payload: payload()?,
        },
        ItemKind::Audio => ItemContent::Audio {
            name: required("name")?,
            mime_type: mime_type()?,
            payload: payload()?,
        },
    };

    Ok(Item {
        subject_id: row.get("subject_id")?,
        created_at: row.get("created_at")?,
        content,
        id,
    })
}

fn ensure_item_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "items")? {
        return Err(RepoError::MissingRequiredTable("items"));
    }
    let columns = table_columns(conn, "items")?;
    for &column in REQUIRED_COLUMNS {
        if !columns.iter().any(|current| current == column) {
            return Err(RepoError::MissingRequiredColumn {
                table: "items",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(row.get(1)?);
    }
    Ok(columns)
}
