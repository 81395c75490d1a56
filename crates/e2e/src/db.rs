//! Database verification
//!
//! Rows are read back through a `RowSource` and compared against the values a
//! scenario sent. Rows are indexed from 1, matching how result sets are
//! numbered in the scenarios.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

use crate::error::{E2eError, E2eResult, Layer, Mismatch, Mismatches};
use crate::mapping::EntityProfile;

/// One result row: column name → value as text. SQL NULL columns are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedRow {
    columns: BTreeMap<String, String>,
}

impl PersistedRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PersistedRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// The outbound database capability
pub trait RowSource: Send + Sync {
    fn fetch(&self, sql: &str) -> E2eResult<Vec<PersistedRow>>;
}

/// Read-only SQLite row source
#[derive(Clone)]
pub struct SqliteSource {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSource {
    /// Open an existing database read-only
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> E2eResult<Self> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(busy_timeout)?;
        info!("Opened database at {:?}", path.as_ref());
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }
}

impl RowSource for SqliteSource {
    fn fetch(&self, sql: &str) -> E2eResult<Vec<PersistedRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query([])?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let mut columns = BTreeMap::new();
            for (i, name) in names.iter().enumerate() {
                let text = match row.get_ref(i)? {
                    ValueRef::Null => continue,
                    ValueRef::Integer(n) => n.to_string(),
                    ValueRef::Real(f) => f.to_string(),
                    ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
                };
                columns.insert(name.clone(), text);
            }
            result.push(PersistedRow { columns });
        }
        Ok(result)
    }
}

/// Runs lookup queries and diffs rows against expected values
pub struct DatabaseVerifier {
    source: Arc<dyn RowSource>,
    rows: Vec<PersistedRow>,
}

impl DatabaseVerifier {
    pub fn new(source: Arc<dyn RowSource>) -> Self {
        Self {
            source,
            rows: Vec::new(),
        }
    }

    /// Execute a query and retain its result set
    pub fn query(&mut self, sql: &str) -> E2eResult<()> {
        info!("Query running: {}", sql);
        self.rows = self.source.fetch(sql)?;
        debug!("Query returned {} row(s)", self.rows.len());
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Row by 1-based index into the latest result set
    pub fn row_at(&self, index: usize) -> E2eResult<&PersistedRow> {
        index
            .checked_sub(1)
            .and_then(|i| self.rows.get(i))
            .ok_or(E2eError::RowNotFound {
                index,
                available: self.rows.len(),
            })
    }

    /// Compare the profile's declared DB columns against the expected values.
    ///
    /// Every mismatching column is reported, not just the first.
    pub fn assert_matches(
        row: &PersistedRow,
        expected: &BTreeMap<String, String>,
        profile: &EntityProfile,
    ) -> E2eResult<()> {
        Self::diff(row, expected, profile)?.into_result()
    }

    pub fn diff(
        row: &PersistedRow,
        expected: &BTreeMap<String, String>,
        profile: &EntityProfile,
    ) -> E2eResult<Mismatches> {
        let mut mismatches = Mismatches::default();
        for (binding, value) in profile.bindings_for(expected)? {
            let Some(column) = binding.db else { continue };
            let actual = row.get(column);
            if actual.map(normalize) != Some(normalize(value)) {
                mismatches.push(Mismatch::new(
                    Layer::Database,
                    binding.field,
                    value,
                    actual.map(String::from),
                ));
            }
        }
        Ok(mismatches)
    }
}

/// `SELECT * FROM <table> WHERE <id_column> = <id>` with the id as a literal
pub fn lookup_query(profile: &EntityProfile, id: &str) -> String {
    let id = id.trim();
    let literal = if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
        id.to_string()
    } else {
        format!("'{}'", id.replace('\'', "''"))
    };
    format!(
        "SELECT * FROM {} WHERE {} = {}",
        profile.table, profile.id_column, literal
    )
}

/// Values are compared as trimmed strings
pub fn normalize(value: &str) -> &str {
    value.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::mapping::{BOOK_PROFILE, USER_PROFILE};

    fn books_db() -> SqliteSource {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE books (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                isbn TEXT,
                year INTEGER,
                author TEXT,
                book_category_id INTEGER,
                description TEXT
            );
            INSERT INTO books VALUES (42, 'SN_test Foo', '123', 2010, 'SN_test Bar', 3, NULL);
            INSERT INTO books VALUES (43, 'SN_test Baz', '456', 2011, 'SN_test Qux', 4, 'x');
            "#,
        )
        .unwrap();
        SqliteSource::from_connection(conn)
    }

    fn expected(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_query_and_one_based_rows() {
        let mut verifier = DatabaseVerifier::new(Arc::new(books_db()));
        verifier.query("SELECT * FROM books ORDER BY id").unwrap();
        assert_eq!(verifier.row_count(), 2);

        let first = verifier.row_at(1).unwrap();
        assert_eq!(first.get("id"), Some("42"));
        assert_eq!(first.get("year"), Some("2010"));
        assert_eq!(first.get("description"), None);
        assert_eq!(verifier.row_at(2).unwrap().get("name"), Some("SN_test Baz"));

        for index in [0, 3] {
            let err = verifier.row_at(index).unwrap_err();
            assert_eq!(err.kind(), FailureKind::RowNotFound);
        }
    }

    #[test]
    fn test_lookup_query_reaches_the_row() {
        let mut verifier = DatabaseVerifier::new(Arc::new(books_db()));
        verifier.query(&lookup_query(&BOOK_PROFILE, "42")).unwrap();
        assert_eq!(verifier.row_count(), 1);
        assert_eq!(verifier.row_at(1).unwrap().get("author"), Some("SN_test Bar"));
    }

    #[test]
    fn test_lookup_query_quoting() {
        assert_eq!(lookup_query(&BOOK_PROFILE, " 42 "), "SELECT * FROM books WHERE id = 42");
        assert_eq!(
            lookup_query(&USER_PROFILE, "o'brien"),
            "SELECT * FROM users WHERE id = 'o''brien'"
        );
        assert_eq!(lookup_query(&USER_PROFILE, ""), "SELECT * FROM users WHERE id = ''");
    }

    #[test]
    fn test_mismatch_lists_exactly_the_differing_field() {
        let row: PersistedRow = [("name", "A"), ("year", "1999")].into_iter().collect();
        let fixture = expected(&[("name", "A"), ("year", "2000")]);

        let err = DatabaseVerifier::assert_matches(&row, &fixture, &BOOK_PROFILE).unwrap_err();
        let mismatches = err.mismatches().expect("field mismatch");
        assert_eq!(mismatches.fields(), vec!["year"]);
        let only = mismatches.iter().next().unwrap();
        assert_eq!(only.expected, "2000");
        assert_eq!(only.actual.as_deref(), Some("1999"));
    }

    #[test]
    fn test_every_mismatch_is_reported() {
        let row: PersistedRow = [("name", "B"), ("year", "1999"), ("isbn", "123")]
            .into_iter()
            .collect();
        let fixture = expected(&[("name", "A"), ("year", "2000"), ("isbn", "123"), ("author", "Z")]);

        let diff = DatabaseVerifier::diff(&row, &fixture, &BOOK_PROFILE).unwrap();
        // BTreeMap order
        assert_eq!(diff.fields(), vec!["author", "name", "year"]);
        assert_eq!(diff.iter().next().unwrap().actual, None);
    }

    #[test]
    fn test_values_compare_trimmed() {
        let row: PersistedRow = [("name", " A "), ("year", "2000")].into_iter().collect();
        let fixture = expected(&[("name", "A"), ("year", "2000 ")]);
        assert!(DatabaseVerifier::assert_matches(&row, &fixture, &BOOK_PROFILE).is_ok());
    }

    #[test]
    fn test_fields_without_db_column_are_skipped() {
        let row: PersistedRow = [("full_name", "SN_test Ada")].into_iter().collect();
        let fixture = expected(&[("full_name", "SN_test Ada"), ("password", "secret")]);
        assert!(DatabaseVerifier::assert_matches(&row, &fixture, &USER_PROFILE).is_ok());
    }

    #[test]
    fn test_unmapped_field_is_configuration_error() {
        let row = PersistedRow::default();
        let fixture = expected(&[("shelf", "B2")]);
        let err = DatabaseVerifier::assert_matches(&row, &fixture, &BOOK_PROFILE).unwrap_err();
        assert_eq!(err.kind(), FailureKind::MissingFieldMapping);
    }
}
