//! Interactive console front end.
//!
//! Reads one question per line, runs it through the [`Orchestrator`] and
//! prints the answer. Tool activity is echoed by [`ConsoleObserver`] as
//! short human-readable summaries.

use std::future::Future;
use std::io::Write;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use super::error::TurnError;
use super::orchestrator::{Orchestrator, ToolCallObserver};
use crate::domains::database::{SqlOutcome, TableDescription, TableRef};
use crate::domains::tools::{ToolCallRequest, ToolCallResult, ToolOutcome};

const LISTED_TABLES: usize = 5;
const LISTED_COLUMNS: usize = 3;
const SAMPLE_FIELDS: usize = 3;
const GENERIC_PREVIEW: usize = 100;

/// Greeting printed when the console starts.
pub const BANNER: &str =
    "💬 SQL Assistant Ready! Ask me anything about the database (Ctrl-C to quit)";

/// Why the console loop stopped.
#[derive(Debug)]
pub enum ExitReason {
    /// Input reached end of stream.
    EndOfInput,
    /// The interrupt future completed.
    Interrupted,
    /// The tool server is gone.
    Fatal(TurnError),
}

/// Summarize a tool result in a few indented lines.
pub fn format_tool_result(result: &ToolCallResult) -> Vec<String> {
    let payload = match &result.outcome {
        ToolOutcome::Success { payload } => payload,
        ToolOutcome::Failure { kind, message } => {
            return vec![format!("  ❌ Error ({kind}): {message}")];
        }
    };

    let typed = match result.name.as_str() {
        "list_tables" => serde_json::from_value(payload.clone())
            .ok()
            .map(|tables: Vec<TableRef>| format_tables(&tables)),
        "describe_table" => serde_json::from_value(payload.clone())
            .ok()
            .map(|description: TableDescription| format_description(&description)),
        "execute_sql" => serde_json::from_value(payload.clone())
            .ok()
            .map(|outcome: SqlOutcome| format_outcome(&outcome)),
        _ => None,
    };

    typed.unwrap_or_else(|| vec![format_generic(payload)])
}

fn format_tables(tables: &[TableRef]) -> Vec<String> {
    let mut lines = vec![format!("  → Found {} tables:", tables.len())];
    lines.extend(
        tables
            .iter()
            .take(LISTED_TABLES)
            .map(|t| format!("    • {}.{}", t.schema, t.table)),
    );
    if tables.len() > LISTED_TABLES {
        lines.push(format!(
            "    ... and {} more tables",
            tables.len() - LISTED_TABLES
        ));
    }
    lines
}

fn format_description(description: &TableDescription) -> Vec<String> {
    let columns = &description.columns;
    let mut lines = vec![format!(
        "  → Table '{}' has {} columns:",
        description.table_name,
        columns.len()
    )];
    lines.extend(columns.iter().take(LISTED_COLUMNS).map(|c| {
        let nullable = if c.nullable { "NULL" } else { "NOT NULL" };
        format!("    • {} ({}) {}", c.name, c.data_type, nullable)
    }));
    if columns.len() > LISTED_COLUMNS {
        lines.push(format!(
            "    ... and {} more columns",
            columns.len() - LISTED_COLUMNS
        ));
    }
    lines
}

fn format_outcome(outcome: &SqlOutcome) -> Vec<String> {
    match outcome {
        SqlOutcome::Rows {
            columns,
            rows,
            row_count,
            truncated,
            ..
        } => {
            let mut lines = vec![format!("  → Query returned {row_count} rows")];
            if *truncated {
                lines.push("    (result truncated)".to_string());
            }
            if let Some(first) = rows.first() {
                lines.push(format!("    Sample data: {columns:?}"));
                lines.extend(
                    first
                        .iter()
                        .take(SAMPLE_FIELDS)
                        .map(|(k, v)| format!("      {k}: {}", display_value(v))),
                );
            }
            lines
        }
        SqlOutcome::Affected {
            rows_affected,
            message,
            ..
        } => vec![
            format!("  → {message}"),
            format!("    Rows affected: {rows_affected}"),
        ],
    }
}

fn format_generic(payload: &Value) -> String {
    let text = payload.to_string();
    match text.char_indices().nth(GENERIC_PREVIEW) {
        Some((cut, _)) => format!("  → Result: {}...", &text[..cut]),
        None => format!("  → Result: {text}"),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Prints tool activity to stdout.
pub struct ConsoleObserver;

impl ToolCallObserver for ConsoleObserver {
    fn on_call_start(&self, request: &ToolCallRequest) {
        println!("▪ Executing {}({})", request.name, request.arguments);
    }

    fn on_call_finish(&self, result: &ToolCallResult) {
        for line in format_tool_result(result) {
            println!("{line}");
        }
    }
}

/// Run the read-ask-print loop until input ends, the interrupt fires or
/// the tool server goes away.
pub async fn run<R, W, I>(
    orchestrator: &mut Orchestrator,
    input: R,
    out: &mut W,
    interrupt: I,
) -> std::io::Result<ExitReason>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    I: Future<Output = ()>,
{
    tokio::pin!(interrupt);
    let mut lines = input.lines();

    writeln!(out, "{BANNER}\n")?;

    loop {
        write!(out, "User > ")?;
        out.flush()?;

        let line = tokio::select! {
            biased;
            _ = &mut interrupt => return Ok(ExitReason::Interrupted),
            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            info!("Input closed");
            return Ok(ExitReason::EndOfInput);
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }

        let outcome = tokio::select! {
            biased;
            _ = &mut interrupt => return Ok(ExitReason::Interrupted),
            outcome = orchestrator.run_turn(question) => outcome,
        };

        match outcome {
            Ok(answer) => writeln!(out, "Assistant > {answer}\n")?,
            Err(e) if e.is_fatal() => {
                writeln!(out, "❌ {e}")?;
                return Ok(ExitReason::Fatal(e));
            }
            Err(e) => {
                warn!("Turn failed: {}", e);
                writeln!(out, "❌ {e}\n")?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::client::McpClient;
    use crate::core::config::AgentConfig;
    use crate::core::transport::{TransportError, TransportResult};
    use crate::core::{Config, McpServer};
    use crate::domains::agent::engine::mock::ScriptedEngine;
    use crate::domains::agent::engine::{EngineResponse, RequestedCall};
    use crate::domains::agent::orchestrator::ToolInvoker;
    use crate::domains::database::SqliteBackend;
    use crate::domains::tools::{CapabilityManifest, ToolErrorKind};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn request(name: &str) -> ToolCallRequest {
        ToolCallRequest::new("c1", name, json!({}))
    }

    #[test]
    fn test_format_tables_caps_listing() {
        let tables: Vec<Value> = (1..=7)
            .map(|i| json!({"schema": "main", "table": format!("t{i}"), "type": "table"}))
            .collect();
        let result = ToolCallResult::success(&request("list_tables"), Value::Array(tables));

        let lines = format_tool_result(&result);
        assert_eq!(lines[0], "  → Found 7 tables:");
        assert_eq!(lines[1], "    • main.t1");
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[6], "    ... and 2 more tables");
    }

    #[test]
    fn test_format_description() {
        let payload = json!({
            "table_name": "Users",
            "columns": [
                {"name": "id", "type": "INTEGER", "nullable": false, "default": null, "position": 1, "primary_key": true},
                {"name": "name", "type": "TEXT", "nullable": true, "default": null, "position": 2, "primary_key": false},
            ]
        });
        let result = ToolCallResult::success(&request("describe_table"), payload);

        assert_eq!(
            format_tool_result(&result),
            vec![
                "  → Table 'Users' has 2 columns:",
                "    • id (INTEGER) NOT NULL",
                "    • name (TEXT) NULL",
            ]
        );
    }

    #[test]
    fn test_format_select_and_update() {
        let select = json!({
            "type": "select",
            "columns": ["id", "name"],
            "rows": [{"id": 1, "name": "Ada"}],
            "row_count": 1,
            "truncated": false
        });
        let lines = format_tool_result(&ToolCallResult::success(&request("execute_sql"), select));
        assert_eq!(lines[0], "  → Query returned 1 rows");
        assert!(lines.contains(&"      name: Ada".to_string()));

        let update = json!({"type": "update", "rows_affected": 3, "message": "UPDATE executed successfully"});
        let lines = format_tool_result(&ToolCallResult::success(&request("execute_sql"), update));
        assert_eq!(
            lines,
            vec!["  → UPDATE executed successfully", "    Rows affected: 3"]
        );
    }

    #[test]
    fn test_format_failure_and_unknown_payload() {
        let failed = ToolCallResult::failure(
            &request("execute_sql"),
            ToolErrorKind::ExecutionError,
            "near \"SELEC\": syntax error",
        );
        assert!(format_tool_result(&failed)[0].starts_with("  ❌ Error (ExecutionError)"));

        let long = ToolCallResult::success(&request("something_else"), json!("x".repeat(300)));
        let line = &format_tool_result(&long)[0];
        assert!(line.starts_with("  → Result: "));
        assert!(line.ends_with("..."));
    }

    async fn orchestrator(engine: Arc<ScriptedEngine>) -> Orchestrator {
        let db = SqliteBackend::open_in_memory().unwrap();
        db.execute_batch("CREATE TABLE Users (id INTEGER PRIMARY KEY);")
            .unwrap();
        let server = McpServer::with_backend(Config::default(), Box::new(db)).unwrap();
        let client = McpClient::start(server.connect_in_process(), Duration::from_secs(5))
            .await
            .unwrap();
        Orchestrator::start(engine, Arc::new(client), AgentConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_run_answers_each_line() {
        let engine = Arc::new(ScriptedEngine::new([
            EngineResponse::RequestedCalls(vec![RequestedCall::new("a", "list_tables", json!({}))]),
            EngineResponse::FinalAnswer("One table: Users.".into()),
        ]));
        let mut orchestrator = orchestrator(engine.clone()).await;
        let mut out = Vec::new();

        let reason = run(
            &mut orchestrator,
            &b"\n   \nwhich tables?\n"[..],
            &mut out,
            std::future::pending(),
        )
        .await
        .unwrap();

        assert!(matches!(reason, ExitReason::EndOfInput));
        assert_eq!(engine.calls(), 2);
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.starts_with(BANNER));
        assert!(printed.contains("Assistant > One table: Users."));
    }

    #[tokio::test]
    async fn test_run_survives_engine_errors() {
        let engine = Arc::new(ScriptedEngine::default());
        engine.push_error("bad gateway");
        engine.push(EngineResponse::FinalAnswer("fine now".into()));
        let mut orchestrator = orchestrator(engine).await;
        let mut out = Vec::new();

        run(&mut orchestrator, &b"one\ntwo\n"[..], &mut out, std::future::pending())
            .await
            .unwrap();

        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("bad gateway"));
        assert!(printed.contains("Assistant > fine now"));
    }

    #[tokio::test]
    async fn test_run_stops_on_interrupt() {
        let engine = Arc::new(ScriptedEngine::default());
        let mut orchestrator = orchestrator(engine.clone()).await;
        // Input that never produces a line while the writer is alive.
        let (_keep_open, input) = tokio::io::duplex(64);
        let mut out = Vec::new();

        let reason = run(
            &mut orchestrator,
            tokio::io::BufReader::new(input),
            &mut out,
            async {},
        )
        .await
        .unwrap();

        assert!(matches!(reason, ExitReason::Interrupted));
        assert_eq!(engine.calls(), 0);
    }

    struct GoneInvoker;

    #[async_trait]
    impl ToolInvoker for GoneInvoker {
        async fn discover(&self) -> TransportResult<Arc<CapabilityManifest>> {
            Ok(Arc::new(CapabilityManifest::default()))
        }

        async fn invoke(&self, _: &ToolCallRequest) -> TransportResult<ToolCallResult> {
            Err(TransportError::closed("server exited"))
        }
    }

    #[tokio::test]
    async fn test_run_ends_on_fatal_error() {
        let engine = Arc::new(ScriptedEngine::new([EngineResponse::RequestedCalls(vec![
            RequestedCall::new("a", "list_tables", json!({})),
        ])]));
        let mut orchestrator =
            Orchestrator::start(engine, Arc::new(GoneInvoker), AgentConfig::default())
                .await
                .unwrap();
        let mut out = Vec::new();

        let reason = run(
            &mut orchestrator,
            &b"tables?\nnever read\n"[..],
            &mut out,
            std::future::pending(),
        )
        .await
        .unwrap();

        assert!(matches!(reason, ExitReason::Fatal(_)));
        assert!(String::from_utf8(out).unwrap().contains("❌ Lost connection to the tool server"));
    }
}
