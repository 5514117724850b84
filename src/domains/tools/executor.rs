//! Tool Executor - runs tool calls against the single database connection.
//!
//! The connection sits behind an async mutex. Each `invoke` takes the lock
//! (FIFO, so concurrent callers queue in arrival order), runs the handler on
//! a blocking thread and releases the lock when the thread is done. A failed
//! or panicking call asks the backend to recover before the lock is
//! released, so the next caller always finds the connection clean.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use super::ToolError;
use super::model::CapabilityManifest;
use super::registry::ToolRegistry;
use crate::domains::database::DatabaseBackend;

/// Shared handle on the database connection.
type SharedBackend = Arc<Mutex<Box<dyn DatabaseBackend>>>;

/// Executes tool calls one at a time on one connection.
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    backend: SharedBackend,
}

impl ToolExecutor {
    /// Create an executor owning `backend`.
    pub fn new(registry: Arc<ToolRegistry>, backend: Box<dyn DatabaseBackend>) -> Self {
        Self {
            registry,
            backend: Arc::new(Mutex::new(backend)),
        }
    }

    /// The capability manifest of the underlying registry.
    pub fn list_tools(&self) -> Arc<CapabilityManifest> {
        self.registry.list_tools()
    }

    /// Look up, validate and execute one tool call.
    #[instrument(skip(self, arguments))]
    pub async fn invoke(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let handler = self.registry.get(name).ok_or_else(|| {
            warn!("Unknown tool requested: {}", name);
            ToolError::not_found(name)
        })?;

        let guard = Arc::clone(&self.backend).lock_owned().await;
        debug!("Acquired database connection");

        let task = tokio::task::spawn_blocking(move || {
            let mut guard = guard;
            let db: &mut dyn DatabaseBackend = &mut **guard;

            let result = catch_unwind(AssertUnwindSafe(|| handler.call(arguments, &mut *db)))
                .unwrap_or_else(|panic| {
                    error!("Tool handler panicked: {}", panic_message(&*panic));
                    Err(ToolError::internal(format!(
                        "tool '{}' panicked: {}",
                        handler.name(),
                        panic_message(&*panic)
                    )))
                });
            if matches!(
                result,
                Err(ToolError::ExecutionFailed(_) | ToolError::Internal(_))
            ) {
                if let Err(e) = db.recover() {
                    error!("Connection recovery failed: {}", e);
                }
            }
            result
        });

        match task.await {
            Ok(Ok(payload)) => {
                info!("Tool call succeeded");
                Ok(payload)
            }
            Ok(Err(e)) => {
                warn!("Tool call failed: {}", e);
                Err(e)
            }
            Err(join_error) => {
                error!("Tool call aborted: {}", join_error);
                Err(ToolError::internal(format!(
                    "tool '{name}' aborted: {join_error}"
                )))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::database::{
        DatabaseError, DatabaseResult, SqlOutcome, SqliteBackend, TableDescription, TableRef,
    };
    use crate::domains::tools::definitions::ExecuteSqlTool;
    use crate::domains::tools::{ToolHandler, ToolSpec};
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    fn sqlite_executor() -> ToolExecutor {
        let db = SqliteBackend::open_in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);
             INSERT INTO users (name) VALUES ('ada'), ('bob');",
        )
        .unwrap();
        let registry = Arc::new(ToolRegistry::with_builtin_tools().unwrap());
        ToolExecutor::new(registry, Box::new(db))
    }

    /// Backend that records when each call starts and ends.
    struct RecordingBackend {
        events: Arc<StdMutex<Vec<String>>>,
        recoveries: Arc<StdMutex<usize>>,
    }

    impl RecordingBackend {
        fn record(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl DatabaseBackend for RecordingBackend {
        fn list_tables(&mut self) -> DatabaseResult<Vec<TableRef>> {
            Ok(Vec::new())
        }

        fn describe_table(&mut self, table_name: &str) -> DatabaseResult<TableDescription> {
            Ok(TableDescription {
                table_name: table_name.to_string(),
                columns: Vec::new(),
            })
        }

        fn execute_sql(&mut self, query: &str) -> DatabaseResult<SqlOutcome> {
            self.record(format!("start {query}"));
            std::thread::sleep(Duration::from_millis(50));
            self.record(format!("end {query}"));
            if query == "fail" {
                return Err(DatabaseError::EmptyStatement);
            }
            Ok(SqlOutcome::Affected {
                kind: query.to_string(),
                rows_affected: 0,
                message: String::new(),
            })
        }

        fn recover(&mut self) -> DatabaseResult<()> {
            self.record("recover".to_string());
            *self.recoveries.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn recording_executor() -> (ToolExecutor, Arc<StdMutex<Vec<String>>>, Arc<StdMutex<usize>>) {
        let events = Arc::new(StdMutex::new(Vec::new()));
        let recoveries = Arc::new(StdMutex::new(0));
        let backend = RecordingBackend {
            events: Arc::clone(&events),
            recoveries: Arc::clone(&recoveries),
        };
        let registry = Arc::new(ToolRegistry::with_builtin_tools().unwrap());
        (
            ToolExecutor::new(registry, Box::new(backend)),
            events,
            recoveries,
        )
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let executor = sqlite_executor();
        let err = executor.invoke("drop_database", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let executor = sqlite_executor();
        let err = executor
            .invoke("describe_table", json!({"table": "users"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_concurrent_invokes_are_serialized() {
        let (executor, events, _) = recording_executor();

        let a = executor.invoke("execute_sql", json!({"query": "a"}));
        let b = executor.invoke("execute_sql", json!({"query": "b"}));
        let (ra, rb) = tokio::join!(a, b);
        assert!(ra.is_ok() && rb.is_ok());

        let events = events.lock().unwrap().clone();
        assert_eq!(events.len(), 4);
        // Whatever the order, a call finishes before the next one starts.
        for pair in events.chunks(2) {
            let first = pair[0].strip_prefix("start ").unwrap();
            let second = pair[1].strip_prefix("end ").unwrap();
            assert_eq!(first, second);
        }
    }

    #[tokio::test]
    async fn test_failure_triggers_recovery() {
        let (executor, _, recoveries) = recording_executor();

        let err = executor
            .invoke("execute_sql", json!({"query": "fail"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed(_)));
        assert_eq!(*recoveries.lock().unwrap(), 1);

        executor
            .invoke("execute_sql", json!({"query": "ok"}))
            .await
            .unwrap();
        assert_eq!(*recoveries.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_statement_rolls_back_open_transaction() {
        let executor = sqlite_executor();
        for query in ["BEGIN", "DELETE FROM users"] {
            executor
                .invoke("execute_sql", json!({"query": query}))
                .await
                .unwrap();
        }

        let err = executor
            .invoke("execute_sql", json!({"query": "INSERT INTO missing VALUES (1)"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no such table"));

        let payload = executor
            .invoke("execute_sql", json!({"query": "SELECT COUNT(*) AS n FROM users"}))
            .await
            .unwrap();
        assert_eq!(payload["rows"][0]["n"], 2);
    }

    /// Handler that panics mid-call.
    struct PanickingTool;

    impl ToolHandler for PanickingTool {
        fn name(&self) -> &'static str {
            "explode"
        }

        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "explode".into(),
                description: String::new(),
                input_schema: json!({"type": "object"}),
            }
        }

        fn call(&self, _: Value, _: &mut dyn DatabaseBackend) -> Result<Value, ToolError> {
            panic!("boom")
        }
    }

    #[tokio::test]
    async fn test_panicking_handler_releases_connection() {
        let recoveries = Arc::new(StdMutex::new(0));
        let backend = RecordingBackend {
            events: Arc::new(StdMutex::new(Vec::new())),
            recoveries: Arc::clone(&recoveries),
        };
        let registry =
            ToolRegistry::new(vec![Arc::new(PanickingTool), Arc::new(ExecuteSqlTool)]).unwrap();
        let executor = ToolExecutor::new(Arc::new(registry), Box::new(backend));

        let err = executor.invoke("explode", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::Internal(_)));
        assert_eq!(*recoveries.lock().unwrap(), 1);

        executor
            .invoke("execute_sql", json!({"query": "after"}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_panic_recovery_happens_before_queued_call() {
        let events = Arc::new(StdMutex::new(Vec::new()));
        let backend = RecordingBackend {
            events: Arc::clone(&events),
            recoveries: Arc::new(StdMutex::new(0)),
        };
        let registry =
            ToolRegistry::new(vec![Arc::new(PanickingTool), Arc::new(ExecuteSqlTool)]).unwrap();
        let executor = ToolExecutor::new(Arc::new(registry), Box::new(backend));

        let (exploded, queued) = tokio::join!(
            executor.invoke("explode", json!({})),
            executor.invoke("execute_sql", json!({"query": "queued"})),
        );
        let err = exploded.unwrap_err();
        assert!(err.to_string().contains("boom"));
        queued.unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec!["recover", "start queued", "end queued"]
        );
    }
}
