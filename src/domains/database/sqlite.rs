//! SQLite backend built on rusqlite.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rusqlite::types::ValueRef;
use rusqlite::{Batch, Connection, OpenFlags};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::{
    ColumnInfo, DatabaseBackend, DatabaseError, DatabaseResult, SqlOutcome, TableDescription,
    TableRef,
};
use crate::core::config::DatabaseConfig;

/// Schema name SQLite gives the primary database.
const MAIN_SCHEMA: &str = "main";

/// One SQLite connection.
pub struct SqliteBackend {
    conn: Connection,
    max_rows: usize,
}

impl SqliteBackend {
    /// Open the database described by `config`.
    ///
    /// `:memory:` opens a private in-memory database.
    pub fn open(config: &DatabaseConfig) -> DatabaseResult<Self> {
        let conn = if config.path == Path::new(":memory:") {
            Connection::open_in_memory()
        } else if config.read_only {
            Connection::open_with_flags(
                &config.path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
        } else {
            Connection::open(&config.path)
        }
        .map_err(|source| DatabaseError::Open {
            path: config.path.clone(),
            source,
        })?;

        conn.busy_timeout(config.busy_timeout)?;

        info!(
            path = %config.path.display(),
            read_only = config.read_only,
            max_rows = config.max_rows,
            "Opened SQLite database"
        );

        Ok(Self {
            conn,
            max_rows: config.max_rows,
        })
    }

    /// Open a private in-memory database with default settings.
    pub fn open_in_memory() -> DatabaseResult<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            max_rows: DatabaseConfig::default().max_rows,
        })
    }

    /// Override the row cap applied to `execute_sql`.
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Run setup statements directly on the connection.
    pub fn execute_batch(&self, sql: &str) -> DatabaseResult<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn columns_of(&self, schema: &str, table: &str) -> DatabaseResult<Vec<ColumnInfo>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT cid, name, type, "notnull", dflt_value, pk
            FROM pragma_table_info(?1, ?2)
            ORDER BY cid
            "#,
        )?;

        let columns = stmt
            .query_map([table, schema], |row| {
                Ok(ColumnInfo {
                    position: row.get::<_, i64>(0)? + 1,
                    name: row.get(1)?,
                    data_type: row.get(2)?,
                    nullable: row.get::<_, i64>(3)? == 0,
                    default: row.get(4)?,
                    primary_key: row.get::<_, i64>(5)? > 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(columns)
    }
}

impl DatabaseBackend for SqliteBackend {
    fn list_tables(&mut self) -> DatabaseResult<Vec<TableRef>> {
        debug!("Listing tables");

        let mut stmt = self.conn.prepare(
            r#"
            SELECT name, type
            FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#,
        )?;

        let tables = stmt
            .query_map([], |row| {
                Ok(TableRef {
                    schema: MAIN_SCHEMA.to_string(),
                    table: row.get(0)?,
                    kind: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tables)
    }

    fn describe_table(&mut self, table_name: &str) -> DatabaseResult<TableDescription> {
        debug!(table_name, "Describing table");

        let mut columns = self.columns_of(MAIN_SCHEMA, table_name)?;

        // Accept "schema.table" when no table carries the dotted name itself.
        if columns.is_empty() {
            if let Some((schema, table)) = table_name.split_once('.') {
                columns = self.columns_of(schema, table)?;
            }
        }

        Ok(TableDescription {
            table_name: table_name.to_string(),
            columns,
        })
    }

    fn execute_sql(&mut self, query: &str) -> DatabaseResult<SqlOutcome> {
        let query = query.trim();
        let keyword = query
            .split_whitespace()
            .next()
            .ok_or(DatabaseError::EmptyStatement)?
            .to_lowercase();

        debug!(query, "Executing SQL");

        let mut batch = Batch::new(&self.conn, query);
        let mut stmt = batch.next()?.ok_or(DatabaseError::EmptyStatement)?;
        // A trailing statement that fails to compile is still a second statement.
        if !matches!(batch.next(), Ok(None)) {
            return Err(DatabaseError::MultipleStatements);
        }

        if stmt.column_count() == 0 {
            let before = total_changes(&self.conn)?;
            let changed = stmt.execute([])?;
            // `changes()` keeps the count of the last DML statement; only
            // trust it when this statement changed something.
            let rows_affected = if total_changes(&self.conn)? == before {
                0
            } else {
                changed
            };
            return Ok(SqlOutcome::Affected {
                message: format!("{} executed successfully", keyword.to_uppercase()),
                kind: keyword,
                rows_affected,
            });
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        let mut truncated = false;

        while let Some(row) = rows.next()? {
            if records.len() >= self.max_rows {
                truncated = true;
                break;
            }
            let mut record = Map::with_capacity(columns.len());
            for (idx, name) in columns.iter().enumerate() {
                record.insert(name.clone(), value_to_json(row.get_ref(idx)?));
            }
            records.push(record);
        }

        if truncated {
            warn!(max_rows = self.max_rows, "Result set truncated");
        }

        Ok(SqlOutcome::Rows {
            kind: "select".to_string(),
            row_count: records.len(),
            columns,
            rows: records,
            truncated,
        })
    }

    fn recover(&mut self) -> DatabaseResult<()> {
        if !self.conn.is_autocommit() {
            warn!("Rolling back transaction left open by a failed statement");
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }
}

fn total_changes(conn: &Connection) -> DatabaseResult<i64> {
    Ok(conn.query_row("SELECT total_changes()", [], |row| row.get(0))?)
}

/// Convert one SQLite value to JSON, keeping its storage class.
fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(STANDARD.encode(bytes)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn seeded() -> SqliteBackend {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend
            .execute_batch(
                r#"
                CREATE TABLE users (
                    id INTEGER PRIMARY KEY,
                    name TEXT NOT NULL,
                    score REAL DEFAULT 0.5,
                    avatar BLOB
                );
                CREATE TABLE orders (id INTEGER PRIMARY KEY, user_id INTEGER);
                INSERT INTO users (name, score, avatar) VALUES ('ada', 1.5, x'0102'), ('bob', NULL, NULL);
                "#,
            )
            .unwrap();
        backend
    }

    #[test]
    fn test_list_tables_sorted_user_tables_only() {
        let mut db = seeded();
        db.execute_batch("CREATE TABLE t_auto (id INTEGER PRIMARY KEY AUTOINCREMENT)")
            .unwrap();

        let tables = db.list_tables().unwrap();
        let names: Vec<_> = tables.iter().map(|t| t.table.as_str()).collect();
        assert_eq!(names, vec!["orders", "t_auto", "users"]);
        assert!(tables.iter().all(|t| t.schema == "main" && t.kind == "table"));
    }

    #[test]
    fn test_describe_table_columns() {
        let mut db = seeded();
        let desc = db.describe_table("users").unwrap();

        assert_eq!(desc.table_name, "users");
        assert_eq!(desc.columns.len(), 4);

        let id = &desc.columns[0];
        assert_eq!(id.name, "id");
        assert_eq!(id.position, 1);
        assert!(id.primary_key);

        let name = &desc.columns[1];
        assert_eq!(name.data_type, "TEXT");
        assert!(!name.nullable);

        let score = &desc.columns[2];
        assert_eq!(score.default.as_deref(), Some("0.5"));
    }

    #[test]
    fn test_describe_table_accepts_schema_prefix() {
        let mut db = seeded();
        let desc = db.describe_table("main.orders").unwrap();
        assert_eq!(desc.columns.len(), 2);
    }

    #[test]
    fn test_describe_unknown_table_is_empty() {
        let mut db = seeded();
        let desc = db.describe_table("nope").unwrap();
        assert!(desc.columns.is_empty());
    }

    #[test]
    fn test_execute_select_keeps_types() {
        let mut db = seeded();
        let outcome = db
            .execute_sql("SELECT name, score, avatar FROM users ORDER BY id")
            .unwrap();

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["type"], "select");
        assert_eq!(value["columns"], json!(["name", "score", "avatar"]));
        assert_eq!(value["row_count"], 2);
        assert_eq!(value["truncated"], false);
        assert_eq!(value["rows"][0], json!({"name": "ada", "score": 1.5, "avatar": "AQI="}));
        assert_eq!(value["rows"][1], json!({"name": "bob", "score": null, "avatar": null}));
    }

    #[test]
    fn test_execute_select_truncates() {
        let mut db = seeded().with_max_rows(1);
        let outcome = db.execute_sql("SELECT id FROM users").unwrap();

        match outcome {
            SqlOutcome::Rows {
                row_count,
                truncated,
                ..
            } => {
                assert_eq!(row_count, 1);
                assert!(truncated);
            }
            other => panic!("expected rows, got {other:?}"),
        }
    }

    #[test]
    fn test_execute_update_reports_rows_affected() {
        let mut db = seeded();
        let outcome = db.execute_sql("  update users SET score = 2").unwrap();

        assert_eq!(
            outcome,
            SqlOutcome::Affected {
                kind: "update".into(),
                rows_affected: 2,
                message: "UPDATE executed successfully".into(),
            }
        );
    }

    #[test]
    fn test_execute_ddl_after_update_affects_no_rows() {
        let mut db = seeded();
        let outcome = db.execute_sql("UPDATE users SET score = score + 1").unwrap();
        assert!(matches!(outcome, SqlOutcome::Affected { rows_affected: 2, .. }));

        let outcome = db.execute_sql("CREATE TABLE audit (id INTEGER)").unwrap();
        assert_eq!(
            outcome,
            SqlOutcome::Affected {
                kind: "create".into(),
                rows_affected: 0,
                message: "CREATE executed successfully".into(),
            }
        );

        let outcome = db.execute_sql("BEGIN").unwrap();
        assert!(matches!(outcome, SqlOutcome::Affected { rows_affected: 0, .. }));
        let outcome = db.execute_sql("DELETE FROM users WHERE id = 1").unwrap();
        assert!(matches!(outcome, SqlOutcome::Affected { rows_affected: 1, .. }));
        let outcome = db.execute_sql("COMMIT").unwrap();
        assert!(matches!(outcome, SqlOutcome::Affected { rows_affected: 0, .. }));
    }

    #[test]
    fn test_execute_rejects_multiple_statements() {
        let mut db = seeded();
        let err = db
            .execute_sql("SELECT id FROM users; DROP TABLE users")
            .unwrap_err();
        assert!(matches!(err, DatabaseError::MultipleStatements));

        // Nothing after the first statement ran.
        let names: Vec<_> = db.list_tables().unwrap().into_iter().map(|t| t.table).collect();
        assert_eq!(names, vec!["orders", "users"]);

        // The second statement is rejected even when it cannot compile yet.
        let err = db
            .execute_sql("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1)")
            .unwrap_err();
        assert!(matches!(err, DatabaseError::MultipleStatements));
        assert_eq!(db.list_tables().unwrap().len(), 2);
    }

    #[test]
    fn test_execute_allows_trailing_semicolon_and_comment() {
        let mut db = seeded();
        let outcome = db.execute_sql("SELECT id FROM users; -- all of them\n").unwrap();
        assert!(matches!(outcome, SqlOutcome::Rows { row_count: 2, .. }));
    }

    #[test]
    fn test_execute_malformed_sql_is_error() {
        let mut db = seeded();
        let err = db.execute_sql("SELEC * FROM users").unwrap_err();
        assert!(matches!(err, DatabaseError::Sqlite(_)));
        assert!(err.to_string().contains("syntax error"));
    }

    #[test]
    fn test_execute_empty_statement() {
        let mut db = seeded();
        let err = db.execute_sql("   ").unwrap_err();
        assert!(matches!(err, DatabaseError::EmptyStatement));
    }

    #[test]
    fn test_recover_rolls_back_open_transaction() {
        let mut db = seeded();
        db.execute_sql("BEGIN").unwrap();
        db.execute_sql("DELETE FROM users").unwrap();
        assert!(db.execute_sql("INSERT INTO nope VALUES (1)").is_err());

        db.recover().unwrap();

        let outcome = db.execute_sql("SELECT id FROM users").unwrap();
        assert!(matches!(outcome, SqlOutcome::Rows { row_count: 2, .. }));
        // Nothing left to roll back.
        db.recover().unwrap();
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ro.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
        }

        let config = DatabaseConfig {
            path,
            read_only: true,
            max_rows: 10,
            busy_timeout: Duration::from_millis(100),
        };
        let mut db = SqliteBackend::open(&config).unwrap();

        assert_eq!(db.list_tables().unwrap().len(), 1);
        let err = db.execute_sql("INSERT INTO t VALUES (1)").unwrap_err();
        assert!(err.to_string().contains("readonly"));
    }

    #[test]
    fn test_open_missing_read_only_file_fails() {
        let dir = TempDir::new().unwrap();
        let config = DatabaseConfig {
            path: dir.path().join("missing.db"),
            read_only: true,
            ..DatabaseConfig::default()
        };
        let err = SqliteBackend::open(&config).err().unwrap();
        assert!(matches!(err, DatabaseError::Open { .. }));
    }
}
