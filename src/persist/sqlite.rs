//! SQLite-backed operation store.

use std::path::Path;

use rusqlite::{Connection, Row, params};
use tracing::warn;

use crate::{
    operation::{Operation, OperationDraft, OperationFilter},
    types::OperationId,
};

use super::{OperationStore, StoreResult};

const INSERT_SQL: &str = "INSERT INTO operations (world_name, mission_name, mission_duration, filename, date, type) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

const FILTER_SQL: &str = r"SELECT id, world_name, mission_name, mission_duration, filename, date, type
FROM operations
WHERE type LIKE '%' || ?1 || '%' ESCAPE '\'
  AND mission_name LIKE '%' || ?2 || '%' ESCAPE '\'
  AND (?3 IS NULL OR date >= ?3)
  AND (?4 IS NULL OR date <= ?4)
ORDER BY id ASC";

/// SQLite implementation of [`crate::persist::OperationStore`].
pub struct SqliteOperationStore {
    conn: Connection,
}

impl SqliteOperationStore {
    /// Opens or creates a SQLite database at `path`.
    ///
    /// Creates the `operations` table if it is missing, enables WAL mode and
    /// sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory store.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self { conn })
    }

    /// Number of rows in the table, decodable or not.
    pub fn count(&self) -> StoreResult<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM operations", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

impl OperationStore for SqliteOperationStore {
    fn insert(&mut self, draft: &OperationDraft) -> StoreResult<OperationId> {
        self.conn.execute(
            INSERT_SQL,
            params![
                draft.world_name,
                draft.mission_name,
                draft.mission_duration,
                draft.filename,
                draft.date,
                draft.class,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn query(&self, filter: &OperationFilter) -> StoreResult<Vec<Operation>> {
        let mut stmt = self.conn.prepare_cached(FILTER_SQL)?;
        let rows = stmt.query_map(
            params![
                escape_like(&filter.class),
                escape_like(&filter.mission_name),
                filter.newer,
                filter.older,
            ],
            operation_from_row,
        )?;

        collect_decodable(rows)
    }

    fn flush(&mut self) -> StoreResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        Ok(())
    }
}

/// Keeps rows that decode, skipping ones whose column values do not fit
/// [`Operation`]. Any other error aborts the scan.
fn collect_decodable<I>(rows: I) -> StoreResult<Vec<Operation>>
where
    I: IntoIterator<Item = rusqlite::Result<Operation>>,
{
    let mut out = Vec::new();
    for row in rows {
        match row {
            Ok(op) => out.push(op),
            Err(
                err @ (rusqlite::Error::FromSqlConversionFailure(..)
                | rusqlite::Error::InvalidColumnType(..)
                | rusqlite::Error::IntegralValueOutOfRange(..)),
            ) => warn!(error = %err, "skipping undecodable operations row"),
            Err(err) => return Err(err.into()),
        }
    }
    Ok(out)
}

fn operation_from_row(row: &Row<'_>) -> rusqlite::Result<Operation> {
    Ok(Operation {
        id: row.get(0)?,
        world_name: row.get(1)?,
        mission_name: row.get(2)?,
        mission_duration: row.get(3)?,
        filename: row.get(4)?,
        date: row.get(5)?,
        class: row.get(6)?,
    })
}

/// Escapes `LIKE` metacharacters so user input matches literally.
fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::operation::OperationFields;
    use crate::persist::StoreError;

    fn draft(name: &str, class: &str) -> OperationDraft {
        OperationDraft::from_fields_on(
            OperationFields::from_pairs([
                ("worldName", "Stratis"),
                ("missionName", name),
                ("missionDuration", "60"),
                ("type", class),
            ]),
            NaiveDate::from_ymd_opt(2024, 3, 1).expect("date"),
        )
        .expect("draft")
    }

    #[test]
    fn escape_like_quotes_metacharacters() {
        assert_eq!(escape_like("a%b_c\\d"), "a\\%b\\_c\\\\d");
        assert_eq!(escape_like("plain"), "plain");
    }

    // Corrupt rows are dropped from results rather than failing the query.
    #[test]
    fn undecodable_rows_are_skipped() {
        let mut store = SqliteOperationStore::open_in_memory().expect("open");
        let good = store.insert(&draft("Good", "coop")).expect("insert");
        store
            .conn
            .execute_batch(
                "INSERT INTO operations (world_name, mission_name, mission_duration, filename, date, type)
                 VALUES ('w', 'BadDuration', 'not-a-number', 'f.json', '2024-03-01', 'coop');
                 INSERT INTO operations (world_name, mission_name, mission_duration, filename, date, type)
                 VALUES ('w', 'BadDate', 12.0, 'f.json', 'yesterday', 'coop');",
            )
            .expect("raw insert");

        let ops = store.query(&OperationFilter::default()).expect("query");
        assert_eq!(store.count().expect("count"), 3);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].id, good);
    }

    #[test]
    fn scan_failures_other_than_decoding_abort_the_query() {
        let mut store = SqliteOperationStore::open_in_memory().expect("open");
        store.insert(&draft("Good", "coop")).expect("insert");
        let good = store.query(&OperationFilter::default()).expect("query").remove(0);

        let decode_err = rusqlite::Error::InvalidColumnType(3, "mission_duration".to_string(), rusqlite::types::Type::Text);
        let skipped = collect_decodable([Ok(good.clone()), Err(decode_err)]).expect("decode errors are skipped");
        assert_eq!(skipped, vec![good.clone()]);

        let busy = rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY), None);
        let err = collect_decodable([Ok(good), Err(busy)]).unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(rusqlite::Error::SqliteFailure(..))));
    }

    #[test]
    fn wildcards_in_filter_are_literal() {
        let mut store = SqliteOperationStore::open_in_memory().expect("open");
        store.insert(&draft("100% sync", "tvt")).expect("insert");
        store.insert(&draft("1000 sync", "tvt")).expect("insert");
        store.insert(&draft("a_b", "tvt")).expect("insert");
        store.insert(&draft("axb", "tvt")).expect("insert");

        let pct = store
            .query(&OperationFilter {
                mission_name: "%".to_string(),
                ..OperationFilter::default()
            })
            .expect("query");
        assert_eq!(pct.len(), 1);
        assert_eq!(pct[0].mission_name, "100% sync");

        let under = store
            .query(&OperationFilter {
                mission_name: "a_b".to_string(),
                ..OperationFilter::default()
            })
            .expect("query");
        assert_eq!(under.len(), 1);
        assert_eq!(under[0].mission_name, "a_b");
    }

    #[test]
    fn substring_match_is_ascii_case_insensitive() {
        let mut store = SqliteOperationStore::open_in_memory().expect("open");
        store.insert(&draft("Domination", "TvT")).expect("insert");
        let ops = store
            .query(&OperationFilter {
                mission_name: "DOMIN".to_string(),
                class: "tv".to_string(),
                ..OperationFilter::default()
            })
            .expect("query");
        assert_eq!(ops.len(), 1);
    }
}
